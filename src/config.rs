use anyhow::{anyhow, Context, Result};
use std::env;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::alba::transport::DEFAULT_TIMEOUT_SECS;
use crate::alba::types::{ApiVariant, Credentials, Endpoints};

#[derive(Clone)]
pub struct AlbaConfig {
    pub service_id: u64,
    pub secret: String,
    pub variant: ApiVariant,
    pub endpoints: Endpoints,
    pub timeout_secs: u64,
}

impl AlbaConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_id = var("ALBA_SERVICE_ID")
            .context("ALBA_SERVICE_ID not set")?
            .trim()
            .parse()
            .context("ALBA_SERVICE_ID must be a valid number")?;

        let secret = var("ALBA_SECRET").context("ALBA_SECRET not set")?;

        let variant = match var("ALBA_VARIANT") {
            Some(raw) => raw.parse::<ApiVariant>().map_err(|e| anyhow!(e))?,
            None => ApiVariant::default(),
        };

        let defaults = Endpoints::default();
        let endpoints = Endpoints::default()
            .with_base_url(var("ALBA_BASE_URL").unwrap_or(defaults.base_url))
            .with_card_token_urls(
                var("ALBA_CARD_TOKEN_URL").unwrap_or(defaults.card_token_url),
                var("ALBA_CARD_TOKEN_TEST_URL").unwrap_or(defaults.card_token_test_url),
            );

        let timeout_secs = match var("ALBA_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .context("ALBA_TIMEOUT_SECS must be a valid number")?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let config = AlbaConfig {
            service_id,
            secret,
            variant,
            endpoints,
            timeout_secs,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_id == 0 {
            return Err(anyhow!("ALBA_SERVICE_ID must be greater than 0"));
        }

        if self.secret.trim().is_empty() {
            return Err(anyhow!("ALBA_SECRET cannot be empty"));
        }

        let urls = [
            ("ALBA_BASE_URL", &self.endpoints.base_url),
            ("ALBA_CARD_TOKEN_URL", &self.endpoints.card_token_url),
            ("ALBA_CARD_TOKEN_TEST_URL", &self.endpoints.card_token_test_url),
        ];
        for (name, value) in urls {
            let parsed = Url::parse(value).with_context(|| format!("{} is not a valid URL", name))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(anyhow!(
                    "{} must be an http(s) URL, got {}",
                    name,
                    value
                ));
            }
        }

        if self.timeout_secs == 0 {
            return Err(anyhow!("ALBA_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.service_id, self.secret.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for AlbaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlbaConfig")
            .field("service_id", &self.service_id)
            .field("secret", &"***")
            .field("variant", &self.variant)
            .field("endpoints", &self.endpoints)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
