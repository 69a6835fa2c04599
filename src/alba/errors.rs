use thiserror::Error;

pub type AlbaResult<T> = Result<T, AlbaError>;

#[derive(Debug, Error)]
pub enum AlbaError {
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Alba API error: {message} ({code})")]
    Api { message: String, code: String },

    #[error("Invalid response body: {message}")]
    Decode { message: String },

    #[error("Response is missing field: {field}")]
    MissingField { field: String },

    #[error("Option '{option}' is not supported by the {variant} API")]
    UnsupportedOption {
        option: &'static str,
        variant: &'static str,
    },

    #[error("Missing required callback parameter: {name}")]
    MissingParameter { name: String },

    #[error("Unknown service: {service_id}")]
    UnknownService { service_id: String },

    #[error("Callback signature mismatch")]
    Signature,

    #[error("Unexpected notification command: {command}")]
    UnknownCommand { command: String },
}

impl AlbaError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn api(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            code: code.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    pub fn unknown_service(service_id: impl Into<String>) -> Self {
        Self::UnknownService {
            service_id: service_id.into(),
        }
    }

    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }

    /// Error code reported by the remote service, if this is an API rejection.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// True for the errors raised while handling an inbound notification.
    pub fn is_callback_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter { .. }
                | Self::UnknownService { .. }
                | Self::Signature
                | Self::UnknownCommand { .. }
        )
    }
}

#[cfg(feature = "reqwest-transport")]
impl From<reqwest::Error> for AlbaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AlbaError::transport(format!("Request timed out: {}", err))
        } else if let Some(status) = err.status() {
            AlbaError::transport(format!("HTTP status {}: {}", status, err))
        } else {
            AlbaError::transport(format!("Request error: {}", err))
        }
    }
}

impl From<serde_json::Error> for AlbaError {
    fn from(err: serde_json::Error) -> Self {
        AlbaError::decode(format!("JSON error: {}", err))
    }
}
