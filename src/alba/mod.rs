//! RFI Bank Alba payment API
//!
//! Signed requests for payment initiation, transaction lookup, refunds,
//! gateway details and card tokenization, plus verification and dispatch of
//! the callback notifications the bank sends back.

pub mod callback;
pub mod client;
pub mod errors;
pub mod recurrent;
pub mod signer;
pub mod transport;
pub mod types;

pub use callback::{CallbackCommand, CallbackPayload, CallbackRouter};
pub use client::PaymentClient;
pub use errors::{AlbaError, AlbaResult};
pub use recurrent::RecurrentParams;
pub use transport::HttpTransport;
#[cfg(feature = "reqwest-transport")]
pub use transport::ReqwestTransport;
pub use types::{
    ApiPayload, ApiResponse, ApiVariant, CardTokenRequest, Credentials, Endpoints,
    PaymentRequest, RefundRequest, RequestParams,
};
