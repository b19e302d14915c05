use crate::error::AppError;
use serde::{Deserialize, Serialize};

// Envelope event dari PayMongo: { data: { id, attributes: { type, data } } }
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct WebhookEnvelope {
    pub data: WebhookData,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct WebhookData {
    /// Event id dari gateway (evt_...)
    pub id: Option<String>,
    pub attributes: WebhookAttributes,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct WebhookAttributes {
    #[serde(rename = "type")]
    pub event_type: String,
    /// Resource yang memicu event (payment, source, refund)
    pub data: EventResource,
}

// Resource di dalam event, bentuknya sama dengan resource API biasa
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct EventResource {
    pub id: String,
    #[serde(default)]
    pub attributes: EventResourceAttributes,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct EventResourceAttributes {
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// payment.paid / payment.failed membawa intent id
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    /// Source yang mendanai payment (kalau e-wallet flow)
    #[serde(default)]
    pub source: Option<SourceRef>,
    #[serde(default)]
    pub failed_message: Option<String>,
    /// payment.refunded membawa payment id asal
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SourceRef {
    pub id: String,
    #[serde(rename = "type", default)]
    pub source_type: Option<String>,
}

// Event types yang dikenali dispatcher. Closed enum dengan default arm,
// bukan lookup dinamis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventKind {
    SourceChargeable,
    PaymentPaid,
    PaymentFailed,
    PaymentRefunded,
    Unknown,
}

impl WebhookEventKind {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "source.chargeable" => WebhookEventKind::SourceChargeable,
            "payment.paid" => WebhookEventKind::PaymentPaid,
            "payment.failed" => WebhookEventKind::PaymentFailed,
            "payment.refunded" => WebhookEventKind::PaymentRefunded,
            _ => WebhookEventKind::Unknown,
        }
    }
}

// Response untuk gateway callback
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub event_type: String,
}

/// Parse raw body ke envelope. Fail fast di boundary: bentuk yang tidak
/// sesuai ditolak sebelum menyentuh business logic.
pub fn parse_envelope(raw_body: &str) -> Result<WebhookEnvelope, AppError> {
    let envelope: WebhookEnvelope = serde_json::from_str(raw_body)
        .map_err(|e| AppError::malformed(format!("Invalid webhook payload: {}", e)))?;

    if envelope.data.attributes.event_type.trim().is_empty() {
        return Err(AppError::malformed("Webhook event type is empty"));
    }

    Ok(envelope)
}

impl WebhookEnvelope {
    pub fn event_kind(&self) -> WebhookEventKind {
        WebhookEventKind::parse(&self.data.attributes.event_type)
    }

    /// Identifier untuk resolve transaction: payment_intent_id ATAU source id.
    /// Untuk source event, resource id-nya sendiri adalah source id.
    pub fn lookup_candidates(&self) -> Vec<&str> {
        let resource = &self.data.attributes.data;
        let mut candidates: Vec<&str> = Vec::new();

        if let Some(intent_id) = resource.attributes.payment_intent_id.as_deref() {
            candidates.push(intent_id);
        }
        if let Some(source) = &resource.attributes.source {
            candidates.push(source.id.as_str());
        }
        candidates.push(resource.id.as_str());
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payment_paid_envelope() {
        let body = r#"{
            "data": {
                "id": "evt_abc123",
                "attributes": {
                    "type": "payment.paid",
                    "data": {
                        "id": "pay_xyz",
                        "attributes": {
                            "amount": 100000,
                            "currency": "PHP",
                            "status": "paid",
                            "payment_intent_id": "pi_abc",
                            "source": { "id": "src_123", "type": "gcash" }
                        }
                    }
                }
            }
        }"#;

        let envelope = parse_envelope(body).unwrap();
        assert_eq!(envelope.event_kind(), WebhookEventKind::PaymentPaid);
        assert_eq!(
            envelope.lookup_candidates(),
            vec!["pi_abc", "src_123", "pay_xyz"]
        );
    }

    #[test]
    fn test_parse_source_chargeable_envelope() {
        let body = r#"{
            "data": {
                "id": "evt_def",
                "attributes": {
                    "type": "source.chargeable",
                    "data": {
                        "id": "src_456",
                        "attributes": { "amount": 50000, "status": "chargeable" }
                    }
                }
            }
        }"#;

        let envelope = parse_envelope(body).unwrap();
        assert_eq!(envelope.event_kind(), WebhookEventKind::SourceChargeable);
        assert_eq!(envelope.lookup_candidates(), vec!["src_456"]);
    }

    #[test]
    fn test_unknown_event_type() {
        let body = r#"{
            "data": {
                "id": "evt_x",
                "attributes": {
                    "type": "link.payment.paid",
                    "data": { "id": "link_1", "attributes": {} }
                }
            }
        }"#;

        let envelope = parse_envelope(body).unwrap();
        assert_eq!(envelope.event_kind(), WebhookEventKind::Unknown);
    }

    #[test]
    fn test_malformed_body_rejected() {
        assert!(parse_envelope("not json at all").is_err());
        assert!(parse_envelope(r#"{"data": {}}"#).is_err());
        assert!(parse_envelope(r#"{"data": {"attributes": {}}}"#).is_err());
        assert!(parse_envelope(r#"{"something": "else"}"#).is_err());
    }

    #[test]
    fn test_empty_event_type_rejected() {
        let body = r#"{
            "data": {
                "attributes": {
                    "type": "  ",
                    "data": { "id": "pay_1", "attributes": {} }
                }
            }
        }"#;
        assert!(parse_envelope(body).is_err());
    }
}
