//! HTTP transport
//!
//! The client never talks to the network directly. It hands a fully signed
//! parameter set to an [`HttpTransport`] and gets the raw response body back.

use crate::alba::errors::AlbaResult;
use crate::alba::types::RequestParams;
use async_trait::async_trait;
use std::sync::Arc;

/// Request timeout used when none is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 45;

/// Transport used by [`crate::alba::PaymentClient`]
///
/// Implementations perform exactly one round trip per call and must map
/// connection failures, timeouts and HTTP error statuses to
/// [`crate::alba::AlbaError::Transport`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a GET request with `query` appended to `url`
    ///
    /// # Returns
    /// * `String` - Raw response body
    async fn get(&self, url: &str, query: &RequestParams) -> AlbaResult<String>;

    /// Send `form` as an `application/x-www-form-urlencoded` POST body
    ///
    /// # Returns
    /// * `String` - Raw response body
    async fn post_form(&self, url: &str, form: &RequestParams) -> AlbaResult<String>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn get(&self, url: &str, query: &RequestParams) -> AlbaResult<String> {
        (**self).get(url, query).await
    }

    async fn post_form(&self, url: &str, form: &RequestParams) -> AlbaResult<String> {
        (**self).post_form(url, form).await
    }
}

#[cfg(feature = "reqwest-transport")]
pub use reqwest_impl::ReqwestTransport;

#[cfg(feature = "reqwest-transport")]
mod reqwest_impl {
    use super::{HttpTransport, DEFAULT_TIMEOUT_SECS};
    use crate::alba::errors::{AlbaError, AlbaResult};
    use crate::alba::types::RequestParams;
    use async_trait::async_trait;
    use reqwest::{Client, Response};
    use std::time::Duration;

    /// [`HttpTransport`] backed by `reqwest`
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: Client,
        timeout: Duration,
    }

    impl ReqwestTransport {
        pub fn new() -> AlbaResult<Self> {
            Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        }

        pub fn with_timeout(timeout: Duration) -> AlbaResult<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .user_agent(concat!("rficb-alba/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| {
                    AlbaError::transport(format!("Failed to create HTTP client: {}", e))
                })?;

            Ok(Self { client, timeout })
        }

        pub fn timeout(&self) -> Duration {
            self.timeout
        }

        async fn read_body(response: Response) -> AlbaResult<String> {
            let response = response.error_for_status()?;
            Ok(response.text().await?)
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn get(&self, url: &str, query: &RequestParams) -> AlbaResult<String> {
            let response = self.client.get(url).query(query).send().await?;
            Self::read_body(response).await
        }

        async fn post_form(&self, url: &str, form: &RequestParams) -> AlbaResult<String> {
            let response = self.client.post(url).form(form).send().await?;
            Self::read_body(response).await
        }
    }
}
