use crate::domain::transaction::PaymentMethod;
use crate::error::AppError;
use bigdecimal::rounding::RoundingMode;
use bigdecimal::{BigDecimal, ToPrimitive};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

// Service untuk integrasi PayMongo
#[derive(Clone)]
pub struct PaymongoService {
    client: Client,
    secret_key: String,
    webhook_secret: Option<String>,
    api_url: String,
    live_mode: bool,
}

// Wrapper request PayMongo: { data: { attributes: {...} } }
#[derive(Debug, Serialize)]
struct GatewayRequest<T> {
    data: GatewayRequestData<T>,
}

#[derive(Debug, Serialize)]
struct GatewayRequestData<T> {
    attributes: T,
}

impl<T> GatewayRequest<T> {
    fn new(attributes: T) -> Self {
        Self {
            data: GatewayRequestData { attributes },
        }
    }
}

// Wrapper response PayMongo: { data: { id, type, attributes } }
#[derive(Debug, Deserialize)]
pub struct GatewayDocument<T> {
    pub data: GatewayResource<T>,
}

#[derive(Debug, Deserialize)]
pub struct GatewayResource<T> {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: T,
}

#[derive(Debug, Deserialize)]
pub struct GatewayCollection<T> {
    pub data: Vec<GatewayResource<T>>,
    #[serde(default)]
    pub has_more: Option<bool>,
}

// Error body PayMongo: { errors: [{ code, detail }] }
#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    #[serde(default)]
    errors: Vec<GatewayErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

// Attributes payment intent
#[derive(Debug, Serialize)]
struct CreateIntentAttributes {
    amount: i64,
    currency: String,
    payment_method_allowed: Vec<&'static str>,
    capture_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentAttributes {
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub client_key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub last_payment_error: Option<serde_json::Value>,
}

// Attributes source (e-wallet redirect flow)
#[derive(Debug, Serialize)]
struct CreateSourceAttributes {
    amount: i64,
    currency: String,
    #[serde(rename = "type")]
    source_type: &'static str,
    redirect: RedirectUrls,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RedirectUrls {
    pub success: String,
    pub failed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SourceAttributes {
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(rename = "type", default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub redirect: Option<RedirectUrls>,
}

// Attributes refund
#[derive(Debug, Serialize)]
struct CreateRefundAttributes {
    amount: i64,
    payment_id: String,
    reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefundAttributes {
    pub amount: i64,
    pub payment_id: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentAttributes {
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// Filter untuk list payments
#[derive(Debug, Default)]
pub struct ListPaymentsFilter {
    pub limit: Option<u8>,
    pub before: Option<String>,
    pub after: Option<String>,
}

// Hasil validasi signature webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    /// Secret tidak dikonfigurasi; validasi dilewati (hanya untuk non-production)
    Skipped,
}

// Bagian-bagian header Paymongo-Signature: t=<ts>,te=<test>,li=<live>
#[derive(Debug, PartialEq, Eq)]
pub struct SignatureParts {
    pub timestamp: String,
    pub test_signature: String,
    pub live_signature: String,
}

impl PaymongoService {
    // Buat PayMongo service baru
    pub fn new(
        secret_key: String,
        api_url: String,
        webhook_secret: Option<String>,
    ) -> Result<Self, AppError> {
        let live_mode = secret_key.starts_with("sk_live_");
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            secret_key,
            webhook_secret,
            api_url,
            live_mode,
        })
    }

    /// Check apakah environment live/production
    pub fn is_live_mode(&self) -> bool {
        self.live_mode
    }

    pub fn has_webhook_secret(&self) -> bool {
        self.webhook_secret
            .as_deref()
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }

    /// Get environment info for service endpoint
    pub fn get_environment_info(&self) -> String {
        if self.live_mode {
            "live".to_string()
        } else {
            "test".to_string()
        }
    }

    // Create payment intent untuk card/Maya flow
    pub async fn create_payment_intent(
        &self,
        amount: &BigDecimal,
        currency: &str,
        allowed_methods: &[PaymentMethod],
        description: Option<String>,
    ) -> Result<GatewayResource<PaymentIntentAttributes>, AppError> {
        let attributes = CreateIntentAttributes {
            amount: to_minor_units(amount)?,
            currency: currency.to_string(),
            payment_method_allowed: allowed_methods
                .iter()
                .filter_map(|m| gateway_method_code(*m))
                .collect(),
            capture_type: "automatic",
            description,
        };

        self.post_resource("/payment_intents", &GatewayRequest::new(attributes))
            .await
    }

    // Retrieve payment intent by id
    pub async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<GatewayResource<PaymentIntentAttributes>, AppError> {
        self.get_resource(&format!("/payment_intents/{}", intent_id))
            .await
    }

    // Create source untuk e-wallet redirect flow (GCash, GrabPay, QR Ph)
    pub async fn create_source(
        &self,
        amount: &BigDecimal,
        currency: &str,
        method: PaymentMethod,
        redirect: RedirectUrls,
    ) -> Result<GatewayResource<SourceAttributes>, AppError> {
        let source_type = gateway_method_code(method).ok_or_else(|| {
            AppError::validation(format!("Payment method {} has no gateway source type", method))
        })?;

        let attributes = CreateSourceAttributes {
            amount: to_minor_units(amount)?,
            currency: currency.to_string(),
            source_type,
            redirect,
        };

        self.post_resource("/sources", &GatewayRequest::new(attributes))
            .await
    }

    // Retrieve source by id
    pub async fn retrieve_source(
        &self,
        source_id: &str,
    ) -> Result<GatewayResource<SourceAttributes>, AppError> {
        self.get_resource(&format!("/sources/{}", source_id)).await
    }

    // Create refund untuk payment yang sudah settled
    pub async fn create_refund(
        &self,
        payment_id: &str,
        amount: &BigDecimal,
        reason: &'static str,
        notes: Option<String>,
    ) -> Result<GatewayResource<RefundAttributes>, AppError> {
        let attributes = CreateRefundAttributes {
            amount: to_minor_units(amount)?,
            payment_id: payment_id.to_string(),
            reason,
            notes,
        };

        self.post_resource("/refunds", &GatewayRequest::new(attributes))
            .await
    }

    // List payments dengan pagination filter
    pub async fn list_payments(
        &self,
        filter: &ListPaymentsFilter,
    ) -> Result<GatewayCollection<PaymentAttributes>, AppError> {
        let mut request = self
            .client
            .get(format!("{}/payments", self.api_url))
            .basic_auth(&self.secret_key, Some(""))
            .header("Accept", "application/json");

        if let Some(limit) = filter.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        if let Some(before) = &filter.before {
            request = request.query(&[("before", before.as_str())]);
        }
        if let Some(after) = &filter.after {
            request = request.query(&[("after", after.as_str())]);
        }

        let response = request.send().await.map_err(send_error)?;
        Self::parse_response(response).await
    }

    /// Verify webhook signature dari PayMongo.
    /// Signature = HMAC-SHA256 atas "{timestamp}.{raw_body}" dengan webhook
    /// secret; perbandingan constant-time lewat Mac::verify_slice.
    pub fn verify_webhook_signature(
        &self,
        raw_body: &str,
        signature_header: Option<&str>,
    ) -> Result<SignatureCheck, AppError> {
        let secret = match self.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    "PAYMONGO_WEBHOOK_SECRET not configured, webhook signature validation skipped"
                );
                return Ok(SignatureCheck::Skipped);
            }
        };

        let header = signature_header
            .ok_or_else(|| AppError::signature("Missing Paymongo-Signature header"))?;
        let parts = parse_signature_header(header)?;

        let expected_hex = if self.live_mode {
            &parts.live_signature
        } else {
            &parts.test_signature
        };
        let expected = hex::decode(expected_hex)
            .map_err(|_| AppError::signature("Signature is not valid hex"))?;

        let message = format!("{}.{}", parts.timestamp, raw_body);
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| AppError::internal("Failed to initialize HMAC"))?;
        mac.update(message.as_bytes());

        mac.verify_slice(&expected)
            .map_err(|_| AppError::signature("Webhook signature mismatch"))?;

        Ok(SignatureCheck::Valid)
    }

    // POST resource dengan idempotency key untuk mutating calls
    async fn post_resource<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<GatewayResource<T>, AppError> {
        let response = self
            .client
            .post(format!("{}{}", self.api_url, path))
            .basic_auth(&self.secret_key, Some(""))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .json(body)
            .send()
            .await
            .map_err(send_error)?;

        let document: GatewayDocument<T> = Self::parse_response(response).await?;
        Ok(document.data)
    }

    // GET resource
    async fn get_resource<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<GatewayResource<T>, AppError> {
        let response = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .basic_auth(&self.secret_key, Some(""))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(send_error)?;

        let document: GatewayDocument<T> = Self::parse_response(response).await?;
        Ok(document.data)
    }

    // Parse response body, non-2xx jadi GatewayError dengan detail PayMongo
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();

        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<GatewayErrorBody>(&raw)
                .ok()
                .map(|body| {
                    body.errors
                        .iter()
                        .map(|e| {
                            format!(
                                "{}: {}",
                                e.code.as_deref().unwrap_or("unknown"),
                                e.detail.as_deref().unwrap_or("no detail")
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .filter(|d| !d.is_empty())
                .unwrap_or(raw);

            return Err(AppError::gateway(status.as_u16(), detail));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::gateway(status.as_u16(), format!("Failed to parse gateway response: {}", e)))
    }
}

// Transport failure ke gateway dihitung sebagai gateway error; timeout
// dibedakan supaya caller bisa memutuskan retry policy-nya sendiri
fn send_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::gateway(504, format!("Gateway request timed out: {}", e))
    } else {
        AppError::gateway(502, format!("Gateway request failed: {}", e))
    }
}

/// Convert amount major units (PHP) ke minor units (centavos) untuk gateway
pub fn to_minor_units(amount: &BigDecimal) -> Result<i64, AppError> {
    let scaled = (amount * BigDecimal::from(100)).with_scale_round(0, RoundingMode::HalfUp);
    scaled
        .to_i64()
        .ok_or_else(|| AppError::validation("Amount cannot be represented in minor units"))
}

/// Convert minor units dari gateway ke major units
pub fn from_minor_units(minor: i64) -> BigDecimal {
    BigDecimal::from(minor) / BigDecimal::from(100)
}

// Mapping payment method ke code yang dikenal PayMongo; cash tidak lewat gateway
fn gateway_method_code(method: PaymentMethod) -> Option<&'static str> {
    match method {
        PaymentMethod::Gcash => Some("gcash"),
        PaymentMethod::Card => Some("card"),
        PaymentMethod::Paymaya => Some("paymaya"),
        PaymentMethod::GrabPay => Some("grab_pay"),
        PaymentMethod::QrPh => Some("qrph"),
        PaymentMethod::Cash => None,
    }
}

/// Parse header Paymongo-Signature (format: t=<ts>,te=<test>,li=<live>)
pub fn parse_signature_header(header: &str) -> Result<SignatureParts, AppError> {
    let mut timestamp = None;
    let mut test_signature = None;
    let mut live_signature = None;

    for part in header.split(',') {
        let mut kv = part.splitn(2, '=');
        let key = kv.next().unwrap_or("").trim();
        let value = kv.next().unwrap_or("").trim();
        match key {
            "t" => timestamp = Some(value.to_string()),
            "te" => test_signature = Some(value.to_string()),
            "li" => live_signature = Some(value.to_string()),
            _ => {}
        }
    }

    match timestamp {
        Some(timestamp) if !timestamp.is_empty() => Ok(SignatureParts {
            timestamp,
            test_signature: test_signature.unwrap_or_default(),
            live_signature: live_signature.unwrap_or_default(),
        }),
        _ => Err(AppError::signature(
            "Signature header is missing the timestamp component",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn sign(secret: &str, timestamp: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, body).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn test_service(webhook_secret: Option<&str>) -> PaymongoService {
        PaymongoService::new(
            "sk_test_abc".to_string(),
            "https://api.paymongo.test/v1".to_string(),
            webhook_secret.map(|s| s.to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(&dec("1000.00")).unwrap(), 100000);
        assert_eq!(to_minor_units(&dec("0.01")).unwrap(), 1);
        assert_eq!(to_minor_units(&dec("123.456")).unwrap(), 12346);
        assert_eq!(to_minor_units(&dec("850")).unwrap(), 85000);
    }

    #[test]
    fn test_from_minor_units_roundtrip() {
        assert_eq!(from_minor_units(100000), dec("1000.00"));
        assert_eq!(from_minor_units(1), dec("0.01"));
    }

    #[test]
    fn test_parse_signature_header() {
        let parts = parse_signature_header("t=1699000000,te=abc123,li=def456").unwrap();
        assert_eq!(parts.timestamp, "1699000000");
        assert_eq!(parts.test_signature, "abc123");
        assert_eq!(parts.live_signature, "def456");

        assert!(parse_signature_header("te=abc,li=def").is_err());
        assert!(parse_signature_header("").is_err());
    }

    #[test]
    fn test_valid_signature_accepted() {
        let secret = "whsk_test_secret";
        let service = test_service(Some(secret));
        let body = r#"{"data":{"attributes":{"type":"payment.paid","data":{"id":"pay_1"}}}}"#;
        let header = format!("t=1699000000,te={},li=", sign(secret, "1699000000", body));

        assert_eq!(
            service
                .verify_webhook_signature(body, Some(&header))
                .unwrap(),
            SignatureCheck::Valid
        );
    }

    #[test]
    fn test_tampered_body_rejected() {
        let secret = "whsk_test_secret";
        let service = test_service(Some(secret));
        let body = r#"{"data":{"attributes":{"type":"payment.paid","data":{"id":"pay_1"}}}}"#;
        let header = format!("t=1699000000,te={},li=", sign(secret, "1699000000", body));

        let tampered = body.replace("pay_1", "pay_2");
        assert!(service
            .verify_webhook_signature(&tampered, Some(&header))
            .is_err());
    }

    #[test]
    fn test_missing_header_rejected_when_secret_configured() {
        let service = test_service(Some("whsk_test_secret"));
        assert!(service.verify_webhook_signature("{}", None).is_err());
    }

    #[test]
    fn test_validation_skipped_without_secret() {
        let service = test_service(None);
        assert_eq!(
            service.verify_webhook_signature("{}", None).unwrap(),
            SignatureCheck::Skipped
        );

        let empty = test_service(Some(""));
        assert_eq!(
            empty.verify_webhook_signature("{}", None).unwrap(),
            SignatureCheck::Skipped
        );
    }

    #[test]
    fn test_gateway_method_codes() {
        assert_eq!(gateway_method_code(PaymentMethod::Gcash), Some("gcash"));
        assert_eq!(gateway_method_code(PaymentMethod::QrPh), Some("qrph"));
        assert_eq!(gateway_method_code(PaymentMethod::Cash), None);
    }
}
