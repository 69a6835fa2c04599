//! Alba API types and data structures
//!
//! Credentials, request parameter sets, endpoint configuration and the
//! request/response value objects shared by the client and the callback router.

use crate::alba::errors::{AlbaError, AlbaResult};
use crate::alba::recurrent::RecurrentParams;
use crate::alba::signer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Production API host
pub const BASE_URL: &str = "https://partner.rficb.ru/";
/// Card tokenization host
pub const CARD_TOKEN_URL: &str = "https://secure.rficb.ru/cardtoken/";
/// Card tokenization sandbox host
pub const CARD_TOKEN_TEST_URL: &str = "https://test.rficb.ru/cardtoken/";
/// Protocol version sent with every signed request
pub const API_VERSION: &str = "2.0";
/// Commission payer used when the caller does not pick one
pub const DEFAULT_COMMISSION: &str = "partner";

/// Merchant service credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Service identifier issued by RFI Bank
    pub service_id: u64,
    /// Service secret key
    pub secret: String,
}

impl Credentials {
    pub fn new(service_id: u64, secret: impl Into<String>) -> Self {
        Self {
            service_id,
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("service_id", &self.service_id)
            .field("secret", &"***")
            .finish()
    }
}

/// API flavour of the service
///
/// Both flavours speak the same protocol under different path prefixes. The
/// lite flavour does not accept commission, card token or recurrent options
/// on payment initiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVariant {
    #[default]
    Alba,
    A1Lite,
}

impl ApiVariant {
    pub fn path_prefix(&self) -> &'static str {
        match self {
            ApiVariant::Alba => "alba/",
            ApiVariant::A1Lite => "a1lite/",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ApiVariant::Alba => "alba",
            ApiVariant::A1Lite => "a1lite",
        }
    }

    /// Whether payment initiation accepts commission, card token and recurrent fields
    pub fn supports_extended_payment(&self) -> bool {
        matches!(self, ApiVariant::Alba)
    }
}

impl fmt::Display for ApiVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ApiVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alba" => Ok(ApiVariant::Alba),
            "a1lite" => Ok(ApiVariant::A1Lite),
            other => Err(format!("unknown API variant '{}', expected alba or a1lite", other)),
        }
    }
}

/// Remote hosts the client talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub base_url: String,
    pub card_token_url: String,
    pub card_token_test_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            card_token_url: CARD_TOKEN_URL.to_string(),
            card_token_test_url: CARD_TOKEN_TEST_URL.to_string(),
        }
    }
}

impl Endpoints {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = with_trailing_slash(base_url.into());
        self
    }

    pub fn with_card_token_urls(
        mut self,
        card_token_url: impl Into<String>,
        card_token_test_url: impl Into<String>,
    ) -> Self {
        self.card_token_url = with_trailing_slash(card_token_url.into());
        self.card_token_test_url = with_trailing_slash(card_token_test_url.into());
        self
    }

    /// Full URL of an API operation, e.g. `https://partner.rficb.ru/alba/input/`
    pub fn operation_url(&self, variant: ApiVariant, operation: &str) -> String {
        format!(
            "{}{}{}",
            with_trailing_slash(self.base_url.clone()),
            variant.path_prefix(),
            operation
        )
    }

    /// Card token creation URL on the production or sandbox host
    pub fn card_token_create_url(&self, test: bool) -> String {
        let host = if test {
            &self.card_token_test_url
        } else {
            &self.card_token_url
        };
        format!("{}create", with_trailing_slash(host.clone()))
    }
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Request parameter set
///
/// Values are stored as strings. Re-inserting a key replaces its value.
/// Iteration order is byte order of the keys; signing uses [`RequestParams::sorted`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequestParams(BTreeMap<String, String>);

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    /// Merge another parameter set; entries from `other` win on conflict
    pub fn merge(&mut self, other: RequestParams) {
        self.0.extend(other.0);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in signing order
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self.iter().collect();
        entries.sort_by(|a, b| signer::collate(a.0, b.0));
        entries
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = RequestParams::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Decoded success body of an API call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiPayload(Map<String, Value>);

impl ApiPayload {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<&str> {
        self.get_str("status")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for ApiPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Classified API response
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Success(ApiPayload),
    Error { message: String, code: String },
}

impl ApiResponse {
    /// Decode a raw response body
    pub fn from_body(body: &str) -> AlbaResult<Self> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> AlbaResult<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(AlbaError::decode(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        if map.get("status").and_then(Value::as_str) == Some("error") {
            // `msg` wins over `message`, code falls back to "unknown"
            let message = map
                .get("msg")
                .or_else(|| map.get("message"))
                .map(value_text)
                .unwrap_or_default();
            let code = map
                .get("code")
                .map(value_text)
                .unwrap_or_else(|| "unknown".to_string());
            return Ok(ApiResponse::Error { message, code });
        }

        Ok(ApiResponse::Success(ApiPayload(map)))
    }

    pub fn into_result(self) -> AlbaResult<ApiPayload> {
        match self {
            ApiResponse::Success(payload) => Ok(payload),
            ApiResponse::Error { message, code } => Err(AlbaError::api(message, code)),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Payment initiation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Payment method, one of the codes returned by `list_payment_types`
    pub pay_type: String,
    /// Amount as a decimal string, e.g. "100.00"
    pub cost: String,
    /// Goods or service name
    pub name: String,
    /// Customer e-mail
    pub email: String,
    /// Customer phone number
    pub phone: String,
    /// Merchant-side order identifier
    pub order_id: Option<String>,
    /// Who pays the commission; "partner" when unset
    pub commission: Option<String>,
    /// Card token obtained from `create_card_token`
    pub card_token: Option<String>,
    /// Recurring payment directive
    pub recurrent: Option<RecurrentParams>,
}

impl PaymentRequest {
    pub fn new(
        pay_type: impl Into<String>,
        cost: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            pay_type: pay_type.into(),
            cost: cost.into(),
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            order_id: None,
            commission: None,
            card_token: None,
            recurrent: None,
        }
    }

    pub fn order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn commission(mut self, commission: impl Into<String>) -> Self {
        self.commission = Some(commission.into());
        self
    }

    pub fn card_token(mut self, card_token: impl Into<String>) -> Self {
        self.card_token = Some(card_token.into());
        self
    }

    pub fn recurrent(mut self, recurrent: RecurrentParams) -> Self {
        self.recurrent = Some(recurrent);
        self
    }
}

/// Refund request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    pub tid: u64,
    /// Partial refund amount; the whole payment is refunded when unset
    pub amount: Option<String>,
    /// Run a test refund
    pub test: bool,
    pub reason: Option<String>,
}

impl RefundRequest {
    pub fn new(tid: u64) -> Self {
        Self {
            tid,
            amount: None,
            test: false,
            reason: None,
        }
    }

    pub fn amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    pub fn test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Card tokenization request
#[derive(Clone, PartialEq, Eq)]
pub struct CardTokenRequest {
    pub card: String,
    pub exp_month: String,
    pub exp_year: String,
    pub cvc: String,
    /// Use the sandbox tokenization host
    pub test: bool,
    pub card_holder: Option<String>,
}

impl CardTokenRequest {
    pub fn new(
        card: impl Into<String>,
        exp_month: impl ToString,
        exp_year: impl ToString,
        cvc: impl Into<String>,
    ) -> Self {
        Self {
            card: card.into(),
            exp_month: exp_month.to_string(),
            exp_year: exp_year.to_string(),
            cvc: cvc.into(),
            test: false,
            card_holder: None,
        }
    }

    pub fn test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn card_holder(mut self, card_holder: impl Into<String>) -> Self {
        self.card_holder = Some(card_holder.into());
        self
    }

    /// Expiry month left-padded with zeros to two characters
    pub fn padded_exp_month(&self) -> String {
        format!("{:0>2}", self.exp_month)
    }
}

impl fmt::Debug for CardTokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last4: String = self
            .card
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        f.debug_struct("CardTokenRequest")
            .field("card", &format!("****{}", last4))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvc", &"***")
            .field("test", &self.test)
            .field("card_holder", &self.card_holder)
            .finish()
    }
}
