//! Callback notifications
//!
//! RFI Bank reports payment events by POSTing a form to the merchant. The
//! [`CallbackRouter`] finds the service the notification belongs to, checks
//! its MD5 signature and hands it to the handler registered for its command.

use crate::alba::client::PaymentClient;
use crate::alba::errors::{AlbaError, AlbaResult};
use crate::alba::signer;
use crate::alba::transport::HttpTransport;
use crate::alba::types::Credentials;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Fields of an inbound notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackPayload(HashMap<String, String>);

impl CallbackPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` notification body
    pub fn from_form(body: &str) -> Self {
        url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn service_id(&self) -> Option<&str> {
        self.get("service_id")
    }

    pub fn command(&self) -> Option<&str> {
        self.get("command")
    }

    pub fn check(&self) -> Option<&str> {
        self.get("check")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<HashMap<String, String>> for CallbackPayload {
    fn from(fields: HashMap<String, String>) -> Self {
        Self(fields)
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for CallbackPayload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut payload = CallbackPayload::new();
        for (key, value) in iter {
            payload.insert(key, value);
        }
        payload
    }
}

/// Verify the `check` field of a notification against `secret`
///
/// Returns false when `check` is absent.
pub fn verify_signature(payload: &CallbackPayload, secret: &str) -> bool {
    let Some(provided) = payload.check() else {
        return false;
    };

    let expected = signer::callback_check(|name| payload.get(name), secret);
    signer::constant_time_eq(&expected, provided)
}

/// Notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackCommand {
    /// Any payment received, including partial ones
    Process,
    /// The service has been paid in full
    Success,
    /// The cardholder cancelled the recurring mandate
    RecurrentCancel,
    /// Result of a refund
    Refund,
}

impl CallbackCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackCommand::Process => "process",
            CallbackCommand::Success => "success",
            CallbackCommand::RecurrentCancel => "recurrent_cancel",
            CallbackCommand::Refund => "refund",
        }
    }
}

impl fmt::Display for CallbackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallbackCommand {
    type Err = AlbaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "process" => Ok(CallbackCommand::Process),
            "success" => Ok(CallbackCommand::Success),
            "recurrent_cancel" => Ok(CallbackCommand::RecurrentCancel),
            "refund" => Ok(CallbackCommand::Refund),
            other => Err(AlbaError::unknown_command(other)),
        }
    }
}

type Handler = Box<dyn Fn(&CallbackPayload) + Send + Sync>;

/// Verifies and dispatches callback notifications
///
/// The service registry and handlers are fixed once the router is built, so
/// a shared router can serve concurrent notifications.
pub struct CallbackRouter {
    services: HashMap<u64, Credentials>,
    handlers: HashMap<CallbackCommand, Handler>,
}

impl CallbackRouter {
    pub fn new<I>(services: I) -> Self
    where
        I: IntoIterator<Item = Credentials>,
    {
        Self {
            services: services
                .into_iter()
                .map(|credentials| (credentials.service_id, credentials))
                .collect(),
            handlers: HashMap::new(),
        }
    }

    pub fn from_clients<'a, T, I>(clients: I) -> Self
    where
        T: HttpTransport + 'a,
        I: IntoIterator<Item = &'a PaymentClient<T>>,
    {
        Self::new(clients.into_iter().map(|client| client.credentials().clone()))
    }

    /// Register the handler for `command`, replacing any previous one
    pub fn on<F>(mut self, command: CallbackCommand, handler: F) -> Self
    where
        F: Fn(&CallbackPayload) + Send + Sync + 'static,
    {
        self.handlers.insert(command, Box::new(handler));
        self
    }

    pub fn on_process<F>(self, handler: F) -> Self
    where
        F: Fn(&CallbackPayload) + Send + Sync + 'static,
    {
        self.on(CallbackCommand::Process, handler)
    }

    pub fn on_success<F>(self, handler: F) -> Self
    where
        F: Fn(&CallbackPayload) + Send + Sync + 'static,
    {
        self.on(CallbackCommand::Success, handler)
    }

    pub fn on_recurrent_cancel<F>(self, handler: F) -> Self
    where
        F: Fn(&CallbackPayload) + Send + Sync + 'static,
    {
        self.on(CallbackCommand::RecurrentCancel, handler)
    }

    pub fn on_refund<F>(self, handler: F) -> Self
    where
        F: Fn(&CallbackPayload) + Send + Sync + 'static,
    {
        self.on(CallbackCommand::Refund, handler)
    }

    pub fn is_registered(&self, service_id: u64) -> bool {
        self.services.contains_key(&service_id)
    }

    /// Verify a notification and run its handler
    ///
    /// Commands without a registered handler are accepted and ignored.
    ///
    /// # Returns
    /// * `CallbackCommand` - The command that was dispatched
    pub fn handle(&self, payload: &CallbackPayload) -> AlbaResult<CallbackCommand> {
        let raw_service_id = payload
            .service_id()
            .ok_or_else(|| AlbaError::missing_parameter("service_id"))?;

        let credentials = raw_service_id
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|id| self.services.get(&id))
            .ok_or_else(|| {
                warn!("Callback for unknown service: {}", raw_service_id);
                AlbaError::unknown_service(raw_service_id)
            })?;

        if !verify_signature(payload, &credentials.secret) {
            warn!(
                "Callback signature mismatch for service {}",
                credentials.service_id
            );
            return Err(AlbaError::Signature);
        }

        let command: CallbackCommand = payload
            .command()
            .ok_or_else(|| AlbaError::missing_parameter("command"))?
            .parse()?;

        info!(
            "Dispatching {} notification for service {}, tid={}",
            command,
            credentials.service_id,
            payload.get("tid").unwrap_or("-")
        );

        if let Some(handler) = self.handlers.get(&command) {
            handler(payload);
        }

        Ok(command)
    }

    /// [`CallbackRouter::handle`] for a raw form-encoded body
    pub fn handle_form(&self, body: &str) -> AlbaResult<CallbackCommand> {
        self.handle(&CallbackPayload::from_form(body))
    }
}

impl fmt::Debug for CallbackRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRouter")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
