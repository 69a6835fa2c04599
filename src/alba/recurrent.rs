//! Recurring payment directives
//!
//! A directive is merged into the payment initiation request. The first
//! payment registers a by-request mandate, the following ones reference the
//! order that created it.

use crate::alba::types::RequestParams;

const FIRST: &str = "first";
const NEXT: &str = "next";
const BY_REQUEST: &str = "byrequest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrentParams(Directive);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Directive {
    First { return_url: String, comment: String },
    Next { order_id: String },
}

impl RecurrentParams {
    /// First payment of a by-request recurring series
    pub fn first_payment(return_url: impl Into<String>, comment: impl Into<String>) -> Self {
        Self(Directive::First {
            return_url: return_url.into(),
            comment: comment.into(),
        })
    }

    /// Follow-up charge against the mandate created by `order_id`
    pub fn next_payment(order_id: impl Into<String>) -> Self {
        Self(Directive::Next {
            order_id: order_id.into(),
        })
    }

    pub fn fields(&self) -> RequestParams {
        match &self.0 {
            Directive::First {
                return_url,
                comment,
            } => RequestParams::new()
                .with("recurrent_type", FIRST)
                .with("recurrent_comment", comment)
                .with("recurrent_url", return_url)
                .with("recurrent_period", BY_REQUEST),
            Directive::Next { order_id } => RequestParams::new()
                .with("recurrent_type", NEXT)
                .with("recurrent_order_id", order_id),
        }
    }
}
