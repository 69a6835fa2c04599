//! Alba API client
//!
//! One client per merchant service. Every operation builds its parameter set,
//! signs it, performs a single HTTP round trip through the configured
//! [`HttpTransport`] and classifies the JSON answer.

use crate::alba::callback::{self, CallbackPayload};
use crate::alba::errors::{AlbaError, AlbaResult};
use crate::alba::signer;
use crate::alba::transport::HttpTransport;
use crate::alba::types::{
    ApiPayload, ApiResponse, ApiVariant, CardTokenRequest, Credentials, Endpoints,
    PaymentRequest, RefundRequest, RequestParams, API_VERSION, DEFAULT_COMMISSION,
};
use tracing::{debug, error, info};

#[cfg(feature = "reqwest-transport")]
use crate::alba::transport::ReqwestTransport;
#[cfg(feature = "reqwest-transport")]
use crate::config::AlbaConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
}

/// Alba payment API client
pub struct PaymentClient<T> {
    credentials: Credentials,
    variant: ApiVariant,
    endpoints: Endpoints,
    transport: T,
}

#[cfg(feature = "reqwest-transport")]
impl PaymentClient<ReqwestTransport> {
    /// Create a client talking to the production hosts over `reqwest`
    pub fn new(credentials: Credentials, variant: ApiVariant) -> AlbaResult<Self> {
        Ok(Self::with_transport(
            credentials,
            variant,
            ReqwestTransport::new()?,
        ))
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &AlbaConfig) -> AlbaResult<Self> {
        let transport = ReqwestTransport::with_timeout(config.timeout())?;
        Ok(
            Self::with_transport(config.credentials(), config.variant, transport)
                .with_endpoints(config.endpoints.clone()),
        )
    }
}

impl<T: HttpTransport> PaymentClient<T> {
    pub fn with_transport(credentials: Credentials, variant: ApiVariant, transport: T) -> Self {
        Self {
            credentials,
            variant,
            endpoints: Endpoints::default(),
            transport,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn service_id(&self) -> u64 {
        self.credentials.service_id
    }

    pub fn variant(&self) -> ApiVariant {
        self.variant
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn operation_url(&self, operation: &str) -> String {
        self.endpoints.operation_url(self.variant, operation)
    }

    /// Append the HMAC `check` field to `params`
    fn signed(&self, method: &str, url: &str, mut params: RequestParams) -> RequestParams {
        let check = signer::sign(method, url, &params, &self.credentials.secret, false);
        params.insert("check", check);
        params
    }

    async fn call(&self, method: Method, url: &str, params: &RequestParams) -> AlbaResult<ApiPayload> {
        let sent = match method {
            Method::Get => {
                info!("Sent GET request: {}", url);
                self.transport.get(url, params).await
            }
            Method::Post => {
                info!(
                    "Sent POST request: {}, fields: {}",
                    url,
                    params.keys().collect::<Vec<_>>().join(",")
                );
                self.transport.post_form(url, params).await
            }
        };

        let body = sent.map_err(|e| {
            error!("Request to {} failed: {}", url, e);
            e
        })?;

        let response = ApiResponse::from_body(&body).map_err(|e| {
            error!("Unreadable response from {}: {}", url, e);
            e
        })?;

        match response {
            ApiResponse::Success(payload) => {
                debug!("Received response: {}", body);
                Ok(payload)
            }
            ApiResponse::Error { message, code } => {
                error!("{} ({})", message, code);
                Err(AlbaError::api(message, code))
            }
        }
    }

    /// List payment methods enabled for the service
    ///
    /// This endpoint authenticates with md5(service_id . secret) rather than
    /// the HMAC request signature.
    pub async fn list_payment_types(&self) -> AlbaResult<Vec<String>> {
        let url = self.operation_url("pay_types/");
        let query = RequestParams::new()
            .with("service_id", self.credentials.service_id)
            .with(
                "check",
                signer::pay_types_check(self.credentials.service_id, &self.credentials.secret),
            );

        let payload = self.call(Method::Get, &url, &query).await?;
        let types = payload
            .get("types")
            .cloned()
            .ok_or_else(|| AlbaError::missing_field("types"))?;

        Ok(serde_json::from_value(types)?)
    }

    /// Initiate a payment
    ///
    /// # Returns
    /// * `ApiPayload` - Gateway answer (transaction id, redirect data, etc.)
    pub async fn initiate_payment(&self, request: PaymentRequest) -> AlbaResult<ApiPayload> {
        if !self.variant.supports_extended_payment() {
            let unsupported = [
                ("commission", request.commission.is_some()),
                ("card_token", request.card_token.is_some()),
                ("recurrent", request.recurrent.is_some()),
            ];
            if let Some((option, _)) = unsupported.into_iter().find(|(_, used)| *used) {
                return Err(AlbaError::UnsupportedOption {
                    option,
                    variant: self.variant.name(),
                });
            }
        }

        info!(
            "Initiating payment: type={}, cost={}, order_id={}",
            request.pay_type,
            request.cost,
            request.order_id.as_deref().unwrap_or("-")
        );

        let mut fields = RequestParams::new()
            .with("cost", &request.cost)
            .with("name", &request.name)
            .with("email", &request.email)
            .with("phone_number", &request.phone)
            .with("background", "1")
            .with("type", &request.pay_type)
            .with("service_id", self.credentials.service_id)
            .with("version", API_VERSION);

        if self.variant.supports_extended_payment() {
            fields.insert(
                "commission",
                request.commission.as_deref().unwrap_or(DEFAULT_COMMISSION),
            );
        }

        if let Some(order_id) = &request.order_id {
            fields.insert("order_id", order_id);
        }

        if let Some(card_token) = &request.card_token {
            fields.insert("card_token", card_token);
        }

        if let Some(recurrent) = &request.recurrent {
            fields.merge(recurrent.fields());
        }

        let url = self.operation_url("input/");
        let fields = self.signed("POST", &url, fields);
        self.call(Method::Post, &url, &fields).await
    }

    /// Fetch the details of a transaction
    pub async fn transaction_details(&self, tid: u64) -> AlbaResult<ApiPayload> {
        let url = self.operation_url("details/");
        let fields = RequestParams::new()
            .with("tid", tid)
            .with("version", API_VERSION);

        let fields = self.signed("POST", &url, fields);
        self.call(Method::Post, &url, &fields).await
    }

    /// Refund a transaction, fully or partially
    pub async fn refund(&self, request: RefundRequest) -> AlbaResult<ApiPayload> {
        info!(
            "Refunding transaction: tid={}, amount={}, test={}",
            request.tid,
            request.amount.as_deref().unwrap_or("full"),
            request.test
        );

        let url = self.operation_url("refund/");
        let mut fields = RequestParams::new()
            .with("version", API_VERSION)
            .with("tid", request.tid);

        // empty optional values are left out, as if not given
        if let Some(amount) = request.amount.as_deref().filter(|a| !a.is_empty()) {
            fields.insert("amount", amount);
        }

        if request.test {
            fields.insert("test", "1");
        }

        if let Some(reason) = request.reason.as_deref().filter(|r| !r.is_empty()) {
            fields.insert("reason", reason);
        }

        let fields = self.signed("POST", &url, fields);
        self.call(Method::Post, &url, &fields).await
    }

    /// Fetch the description of a payment gateway by its short name
    pub async fn gate_details(&self, gate: &str) -> AlbaResult<ApiPayload> {
        let url = self.operation_url("gate_details/");
        let fields = RequestParams::new()
            .with("version", API_VERSION)
            .with("gate", gate)
            .with("service_id", self.credentials.service_id);

        let query = self.signed("GET", &url, fields);
        self.call(Method::Get, &url, &query).await
    }

    /// Exchange card details for a single-use card token
    ///
    /// Sent to the tokenization host, unsigned.
    pub async fn create_card_token(&self, request: CardTokenRequest) -> AlbaResult<String> {
        info!("Requesting card token: test={}", request.test);

        let mut fields = RequestParams::new()
            .with("service_id", self.credentials.service_id)
            .with("card", &request.card)
            .with("exp_month", request.padded_exp_month())
            .with("exp_year", &request.exp_year)
            .with("cvc", &request.cvc);

        if let Some(card_holder) = request.card_holder.as_deref().filter(|c| !c.is_empty()) {
            fields.insert("card_holder", card_holder);
        }

        let url = self.endpoints.card_token_create_url(request.test);
        let payload = self.call(Method::Post, &url, &fields).await?;

        payload
            .get_str("token")
            .map(str::to_string)
            .ok_or_else(|| AlbaError::missing_field("token"))
    }

    /// Check the MD5 signature of a callback notification against this service's secret
    pub fn verify_callback_signature(&self, payload: &CallbackPayload) -> bool {
        callback::verify_signature(payload, &self.credentials.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alba::recurrent::RecurrentParams;
    use crate::alba::transport::testing::RecordingTransport;

    const SECRET: &str = "s3cr3t";
    const OK_BODY: &str = r#"{"status":"success","tid":100}"#;

    fn create_test_client(variant: ApiVariant, body: &str) -> PaymentClient<RecordingTransport> {
        PaymentClient::with_transport(
            Credentials::new(42, SECRET),
            variant,
            RecordingTransport::responding(body),
        )
    }

    fn assert_signed(method: &str, url: &str, params: &RequestParams) {
        let check = params.get("check").expect("check present");
        let unsigned: RequestParams = params.iter().filter(|(key, _)| *key != "check").collect();
        assert_eq!(check, signer::sign(method, url, &unsigned, SECRET, false));
    }

    #[tokio::test]
    async fn test_list_payment_types() {
        let client = create_test_client(
            ApiVariant::Alba,
            r#"{"status":"success","types":["spg","mc"]}"#,
        );

        let types = client.list_payment_types().await.unwrap();
        assert_eq!(types, vec!["spg".to_string(), "mc".to_string()]);

        let request = client.transport.last_request();
        assert_eq!(request.method, "GET");
        assert_eq!(request.url, "https://partner.rficb.ru/alba/pay_types/");
        assert_eq!(request.params.get("service_id"), Some("42"));
        assert_eq!(
            request.params.get("check"),
            Some("3300b05366f7c38ec6f3fc8eab5b498e")
        );
    }

    #[tokio::test]
    async fn test_list_payment_types_without_types_field() {
        let client = create_test_client(ApiVariant::Alba, OK_BODY);
        let err = client.list_payment_types().await.unwrap_err();
        assert!(matches!(err, AlbaError::MissingField { ref field } if field == "types"));
    }

    #[tokio::test]
    async fn test_initiate_payment_fields() {
        let client = create_test_client(ApiVariant::Alba, OK_BODY);
        let request = PaymentRequest::new("spg", "100.00", "Order 1", "a@b.ru", "+79990000000")
            .order_id("ord-1")
            .card_token("tok")
            .recurrent(RecurrentParams::first_payment("https://cb", "monthly"));

        let payload = client.initiate_payment(request).await.unwrap();
        assert_eq!(payload.get("tid"), Some(&serde_json::json!(100)));

        let sent = client.transport.last_request();
        assert_eq!(sent.method, "POST");
        assert_eq!(sent.url, "https://partner.rficb.ru/alba/input/");

        let params = &sent.params;
        assert_eq!(params.get("cost"), Some("100.00"));
        assert_eq!(params.get("name"), Some("Order 1"));
        assert_eq!(params.get("email"), Some("a@b.ru"));
        assert_eq!(params.get("phone_number"), Some("+79990000000"));
        assert_eq!(params.get("background"), Some("1"));
        assert_eq!(params.get("type"), Some("spg"));
        assert_eq!(params.get("service_id"), Some("42"));
        assert_eq!(params.get("version"), Some("2.0"));
        assert_eq!(params.get("commission"), Some("partner"));
        assert_eq!(params.get("order_id"), Some("ord-1"));
        assert_eq!(params.get("card_token"), Some("tok"));
        assert_eq!(params.get("recurrent_type"), Some("first"));
        assert_eq!(params.get("recurrent_period"), Some("byrequest"));
        assert_signed("POST", &sent.url, params);
    }

    #[tokio::test]
    async fn test_initiate_payment_explicit_commission() {
        let client = create_test_client(ApiVariant::Alba, OK_BODY);
        let request = PaymentRequest::new("mc", "10", "x", "a@b.ru", "1").commission("abonent");
        client.initiate_payment(request).await.unwrap();

        assert_eq!(
            client.transport.last_request().params.get("commission"),
            Some("abonent")
        );
    }

    #[tokio::test]
    async fn test_lite_variant_payment() {
        let client = create_test_client(ApiVariant::A1Lite, OK_BODY);
        let request = PaymentRequest::new("mc", "10", "x", "a@b.ru", "1");
        client.initiate_payment(request).await.unwrap();

        let sent = client.transport.last_request();
        assert_eq!(sent.url, "https://partner.rficb.ru/a1lite/input/");
        assert!(!sent.params.contains_key("commission"));
        assert_signed("POST", &sent.url, &sent.params);
    }

    #[tokio::test]
    async fn test_lite_variant_rejects_extended_options() {
        let client = create_test_client(ApiVariant::A1Lite, OK_BODY);
        let request = PaymentRequest::new("mc", "10", "x", "a@b.ru", "1")
            .recurrent(RecurrentParams::next_payment("ord-1"));

        let err = client.initiate_payment(request).await.unwrap_err();
        assert!(matches!(
            err,
            AlbaError::UnsupportedOption {
                option: "recurrent",
                variant: "a1lite"
            }
        ));
        assert!(client.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_details() {
        let client = create_test_client(ApiVariant::Alba, OK_BODY);
        client.transaction_details(100).await.unwrap();

        let sent = client.transport.last_request();
        assert_eq!(sent.url, "https://partner.rficb.ru/alba/details/");
        assert_eq!(sent.params.len(), 3);
        assert_eq!(sent.params.get("tid"), Some("100"));
        assert_eq!(sent.params.get("version"), Some("2.0"));
        assert_signed("POST", &sent.url, &sent.params);
    }

    #[tokio::test]
    async fn test_refund_optional_fields() {
        let client = create_test_client(ApiVariant::Alba, OK_BODY);

        client.refund(RefundRequest::new(100)).await.unwrap();
        let plain = client.transport.last_request();
        assert_eq!(
            plain.params.keys().collect::<Vec<_>>(),
            vec!["check", "tid", "version"]
        );

        client
            .refund(RefundRequest::new(100).amount("5.50").test(true).reason("damaged"))
            .await
            .unwrap();
        let full = client.transport.last_request();
        assert_eq!(full.url, "https://partner.rficb.ru/alba/refund/");
        assert_eq!(full.params.get("amount"), Some("5.50"));
        assert_eq!(full.params.get("test"), Some("1"));
        assert_eq!(full.params.get("reason"), Some("damaged"));
        assert_signed("POST", &full.url, &full.params);
    }

    #[tokio::test]
    async fn test_empty_optional_values_are_not_sent() {
        let client = create_test_client(
            ApiVariant::Alba,
            r#"{"status":"success","token":"ct_1"}"#,
        );

        client
            .refund(RefundRequest::new(100).amount("").reason(""))
            .await
            .unwrap();
        let refund = client.transport.last_request();
        assert!(!refund.params.contains_key("amount"));
        assert!(!refund.params.contains_key("reason"));
        assert_signed("POST", &refund.url, &refund.params);

        client
            .create_card_token(CardTokenRequest::new("4111", 1, 2030, "000").card_holder(""))
            .await
            .unwrap();
        assert!(!client.transport.last_request().params.contains_key("card_holder"));
    }

    #[tokio::test]
    async fn test_gate_details_signed_as_get() {
        let client = create_test_client(ApiVariant::Alba, OK_BODY);
        client.gate_details("mc").await.unwrap();

        let sent = client.transport.last_request();
        assert_eq!(sent.method, "GET");
        assert_eq!(sent.url, "https://partner.rficb.ru/alba/gate_details/");
        assert_eq!(sent.params.get("gate"), Some("mc"));
        assert_eq!(sent.params.get("service_id"), Some("42"));
        assert_signed("GET", &sent.url, &sent.params);
    }

    #[tokio::test]
    async fn test_create_card_token() {
        let client = create_test_client(
            ApiVariant::Alba,
            r#"{"status":"success","token":"ct_123"}"#,
        );
        let request = CardTokenRequest::new("4111111111111111", 3, 2030, "123")
            .test(true)
            .card_holder("IVAN IVANOV");

        let token = client.create_card_token(request).await.unwrap();
        assert_eq!(token, "ct_123");

        let sent = client.transport.last_request();
        assert_eq!(sent.url, "https://test.rficb.ru/cardtoken/create");
        assert_eq!(sent.params.get("exp_month"), Some("03"));
        assert_eq!(sent.params.get("exp_year"), Some("2030"));
        assert_eq!(sent.params.get("card_holder"), Some("IVAN IVANOV"));
        assert!(!sent.params.contains_key("check"));
    }

    #[tokio::test]
    async fn test_create_card_token_production_host() {
        let client = create_test_client(
            ApiVariant::Alba,
            r#"{"status":"success","token":"ct_1"}"#,
        );
        client
            .create_card_token(CardTokenRequest::new("4111", "12", "2031", "000"))
            .await
            .unwrap();
        assert_eq!(
            client.transport.last_request().url,
            "https://secure.rficb.ru/cardtoken/create"
        );
    }

    #[tokio::test]
    async fn test_api_error_is_surfaced() {
        let client = create_test_client(
            ApiVariant::Alba,
            r#"{"status":"error","msg":"Неверная подпись","code":"sign"}"#,
        );
        let err = client.transaction_details(1).await.unwrap_err();
        match err {
            AlbaError::Api { message, code } => {
                assert_eq!(message, "Неверная подпись");
                assert_eq!(code, "sign");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_surfaced() {
        let client = PaymentClient::with_transport(
            Credentials::new(42, SECRET),
            ApiVariant::Alba,
            RecordingTransport::failing("connection refused"),
        );
        let err = client.gate_details("mc").await.unwrap_err();
        assert!(matches!(err, AlbaError::Transport { .. }));
    }

    #[test]
    fn test_verify_callback_signature() {
        let client = create_test_client(ApiVariant::Alba, OK_BODY);
        let mut payload: CallbackPayload = [
            ("tid", "100"),
            ("service_id", "42"),
            ("cost", "10.00"),
            ("command", "success"),
            ("check", "2333a9fb37534103a5a184c22202133d"),
        ]
        .into_iter()
        .collect();
        assert!(client.verify_callback_signature(&payload));

        payload.insert("cost", "11.00");
        assert!(!client.verify_callback_signature(&payload));
    }
}
