//! Client library for the RFI Bank Alba payment API.
//!
//! ```no_run
//! use rficb_alba::{ApiVariant, Credentials, PaymentClient, PaymentRequest};
//!
//! # async fn run() -> rficb_alba::AlbaResult<()> {
//! let client = PaymentClient::new(Credentials::new(42, "secret"), ApiVariant::Alba)?;
//! let payment = client
//!     .initiate_payment(PaymentRequest::new("spg", "100.00", "Order 1", "a@b.ru", "+79990000000"))
//!     .await?;
//! println!("{:?}", payment.get("tid"));
//! # Ok(())
//! # }
//! ```

pub mod alba;
pub mod config;

pub use alba::*;
pub use config::AlbaConfig;
