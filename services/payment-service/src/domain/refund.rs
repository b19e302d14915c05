use crate::domain::transaction::PaymentMethod;
use crate::error::AppError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata flag untuk refund yang dibuat tanpa provider payment id.
/// Dipakai reconciliation untuk menandai record yang butuh investigasi.
pub const METADATA_MISSING_PAYMENT_ID: &str = "missing_payment_id";

// Model refund request per booking
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct RefundRecord {
    pub id: i32,
    pub booking_id: i32,
    pub user_id: i32,

    #[schema(value_type = f64)]
    pub amount: BigDecimal,
    pub reason: RefundReason,
    pub status: RefundStatus,
    pub refund_type: RefundType,
    pub payment_method: PaymentMethod,

    // Gateway references (nullable sampai settled)
    pub transaction_id: Option<String>,
    pub gateway_refund_id: Option<String>,

    pub processed_by: Option<i32>,

    // Manual flow: receipt harus diupload dan diverifikasi staff
    pub receipt_path: Option<String>,
    pub receipt_verified: bool,
    pub receipt_verified_by: Option<i32>,

    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,

    // Timestamps
    pub initiated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

// Status refund lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Processing => "processing",
            RefundStatus::Completed => "completed",
            RefundStatus::Failed => "failed",
            RefundStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefundStatus::Completed | RefundStatus::Failed | RefundStatus::Cancelled
        )
    }

    /// Refund dengan status ini masih mengunci saldo refundable booking
    pub fn counts_against_refundable(&self) -> bool {
        !matches!(self, RefundStatus::Failed | RefundStatus::Cancelled)
    }

    /// Guard state machine: pending -> processing -> {completed, failed, cancelled}
    pub fn can_transition_to(&self, next: RefundStatus) -> bool {
        match (self, next) {
            (RefundStatus::Pending, RefundStatus::Processing) => true,
            (RefundStatus::Pending, RefundStatus::Failed) => true,
            (RefundStatus::Pending, RefundStatus::Cancelled) => true,
            (RefundStatus::Processing, n) if n.is_terminal() => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Tipe refund: automatic lewat gateway, manual dengan bukti transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundType {
    Automatic,
    Manual,
}

impl std::fmt::Display for RefundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundType::Automatic => write!(f, "automatic"),
            RefundType::Manual => write!(f, "manual"),
        }
    }
}

// Kode alasan refund yang dikenali sistem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    RequestedByCustomer,
    CancelledByProvider,
    ServiceNotRendered,
    DuplicatePayment,
    Fraudulent,
    Others,
}

impl RefundReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundReason::RequestedByCustomer => "requested_by_customer",
            RefundReason::CancelledByProvider => "cancelled_by_provider",
            RefundReason::ServiceNotRendered => "service_not_rendered",
            RefundReason::DuplicatePayment => "duplicate_payment",
            RefundReason::Fraudulent => "fraudulent",
            RefundReason::Others => "others",
        }
    }

    /// Mapping ke reason code yang diterima PayMongo
    pub fn gateway_code(&self) -> &'static str {
        match self {
            RefundReason::RequestedByCustomer => "requested_by_customer",
            RefundReason::DuplicatePayment => "duplicate",
            RefundReason::Fraudulent => "fraudulent",
            RefundReason::CancelledByProvider
            | RefundReason::ServiceNotRendered
            | RefundReason::Others => "others",
        }
    }
}

impl std::fmt::Display for RefundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Siapa yang melakukan transisi (untuk audit trail)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PerformedByType {
    System,
    Admin,
    Staff,
}

impl PerformedByType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformedByType::System => "system",
            PerformedByType::Admin => "admin",
            PerformedByType::Staff => "staff",
        }
    }
}

// Append-only audit trail per refund transition
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct RefundAuditLog {
    pub id: i32,
    pub refund_id: i32,
    pub action: String,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub performed_by: Option<i32>,
    pub performed_by_type: PerformedByType,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Actor yang tercatat di audit log
#[derive(Debug, Clone, Copy)]
pub struct AuditActor {
    pub performed_by: Option<i32>,
    pub performed_by_type: PerformedByType,
}

impl AuditActor {
    pub fn system() -> Self {
        Self {
            performed_by: None,
            performed_by_type: PerformedByType::System,
        }
    }

    // Map role user ke actor type; customer tercatat sebagai system-initiated
    pub fn from_role(user_id: i32, role: &str) -> Self {
        let performed_by_type = match role {
            "admin" => PerformedByType::Admin,
            "staff" => PerformedByType::Staff,
            _ => PerformedByType::System,
        };
        Self {
            performed_by: Some(user_id),
            performed_by_type,
        }
    }
}

// Request refund dari customer
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateRefundRequest {
    pub booking_id: i32,
    pub reason: RefundReason,
    /// Default: seluruh sisa refundable amount
    #[schema(value_type = Option<f64>)]
    pub amount: Option<BigDecimal>,
    pub notes: Option<String>,
}

// Hasil eligibility check untuk refund
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RefundEligibility {
    pub eligible: bool,
    /// Machine-readable code kalau tidak eligible
    pub reason_code: Option<String>,
    #[schema(value_type = f64)]
    pub paid_amount: BigDecimal,
    #[schema(value_type = f64)]
    pub refunded_amount: BigDecimal,
    #[schema(value_type = f64)]
    pub refundable_amount: BigDecimal,
}

impl RefundEligibility {
    pub fn ineligible(code: &str) -> Self {
        let zero = BigDecimal::from(0);
        Self {
            eligible: false,
            reason_code: Some(code.to_string()),
            paid_amount: zero.clone(),
            refunded_amount: zero.clone(),
            refundable_amount: zero,
        }
    }
}

impl RefundRecord {
    pub fn is_manual(&self) -> bool {
        self.refund_type == RefundType::Manual
    }

    /// Receipt hanya bisa diupload untuk manual refund yang belum terminal
    pub fn receipt_uploadable(&self) -> bool {
        self.is_manual()
            && matches!(self.status, RefundStatus::Pending | RefundStatus::Processing)
    }

    /// Guard untuk transisi ke completed. Manual refund memindahkan uang di
    /// luar garansi gateway, jadi wajib ada receipt yang sudah diverifikasi.
    pub fn ensure_completable(&self) -> Result<(), AppError> {
        if self.status != RefundStatus::Processing {
            return Err(AppError::conflict(format!(
                "Refund cannot be completed from status '{}'",
                self.status
            )));
        }
        if self.is_manual() && !self.receipt_verified {
            return Err(AppError::conflict(
                "Manual refund requires a verified receipt before completion",
            ));
        }
        Ok(())
    }

    /// Flag metadata missing_payment_id (dipakai reconciliation)
    pub fn is_flagged_missing_payment(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(METADATA_MISSING_PAYMENT_ID))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Validasi amount refund terhadap sisa refundable booking
pub fn check_refund_amount(
    requested: &BigDecimal,
    refundable: &BigDecimal,
) -> Result<(), AppError> {
    if requested <= &BigDecimal::from(0) {
        return Err(AppError::ineligible(
            "invalid_amount",
            "Refund amount must be greater than 0",
        ));
    }
    if requested > refundable {
        return Err(AppError::ineligible(
            "amount_exceeds_refundable",
            "Refund amount exceeds the refundable balance for this booking",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_refund(refund_type: RefundType, status: RefundStatus) -> RefundRecord {
        RefundRecord {
            id: 7,
            booking_id: 42,
            user_id: 9,
            amount: BigDecimal::from_str("500.00").unwrap(),
            reason: RefundReason::RequestedByCustomer,
            status,
            refund_type,
            payment_method: PaymentMethod::Gcash,
            transaction_id: None,
            gateway_refund_id: None,
            processed_by: None,
            receipt_path: None,
            receipt_verified: false,
            receipt_verified_by: None,
            notes: None,
            metadata: None,
            initiated_at: Utc::now(),
            processed_at: None,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_refund_transitions() {
        assert!(RefundStatus::Pending.can_transition_to(RefundStatus::Processing));
        assert!(RefundStatus::Pending.can_transition_to(RefundStatus::Cancelled));
        assert!(RefundStatus::Processing.can_transition_to(RefundStatus::Completed));
        assert!(RefundStatus::Processing.can_transition_to(RefundStatus::Failed));
        assert!(!RefundStatus::Pending.can_transition_to(RefundStatus::Completed));
        assert!(!RefundStatus::Completed.can_transition_to(RefundStatus::Pending));
        assert!(!RefundStatus::Cancelled.can_transition_to(RefundStatus::Processing));
    }

    #[test]
    fn test_manual_refund_blocked_without_verified_receipt() {
        // Bahkan kalau admin memanggil complete langsung, guard menolak
        let mut refund = sample_refund(RefundType::Manual, RefundStatus::Processing);
        refund.receipt_path = Some("refunds/receipts/refund-7".to_string());
        assert!(refund.ensure_completable().is_err());

        refund.receipt_verified = true;
        refund.receipt_verified_by = Some(3);
        assert!(refund.ensure_completable().is_ok());
    }

    #[test]
    fn test_automatic_refund_completable_from_processing_only() {
        let refund = sample_refund(RefundType::Automatic, RefundStatus::Processing);
        assert!(refund.ensure_completable().is_ok());

        let pending = sample_refund(RefundType::Automatic, RefundStatus::Pending);
        assert!(pending.ensure_completable().is_err());
    }

    #[test]
    fn test_receipt_uploadable_states() {
        assert!(sample_refund(RefundType::Manual, RefundStatus::Pending).receipt_uploadable());
        assert!(sample_refund(RefundType::Manual, RefundStatus::Processing).receipt_uploadable());
        assert!(!sample_refund(RefundType::Manual, RefundStatus::Completed).receipt_uploadable());
        assert!(!sample_refund(RefundType::Automatic, RefundStatus::Pending).receipt_uploadable());
    }

    #[test]
    fn test_check_refund_amount_bounds() {
        let refundable = BigDecimal::from_str("1000.00").unwrap();

        assert!(check_refund_amount(&BigDecimal::from_str("1000.00").unwrap(), &refundable).is_ok());
        assert!(check_refund_amount(&BigDecimal::from_str("0.01").unwrap(), &refundable).is_ok());
        assert!(check_refund_amount(&BigDecimal::from_str("1000.01").unwrap(), &refundable).is_err());
        assert!(check_refund_amount(&BigDecimal::from(0), &refundable).is_err());
        assert!(check_refund_amount(&BigDecimal::from(-5), &refundable).is_err());
    }

    #[test]
    fn test_counts_against_refundable() {
        assert!(RefundStatus::Pending.counts_against_refundable());
        assert!(RefundStatus::Processing.counts_against_refundable());
        assert!(RefundStatus::Completed.counts_against_refundable());
        assert!(!RefundStatus::Failed.counts_against_refundable());
        assert!(!RefundStatus::Cancelled.counts_against_refundable());
    }

    #[test]
    fn test_missing_payment_flag() {
        let mut refund = sample_refund(RefundType::Manual, RefundStatus::Pending);
        assert!(!refund.is_flagged_missing_payment());

        refund.metadata = Some(serde_json::json!({ METADATA_MISSING_PAYMENT_ID: true }));
        assert!(refund.is_flagged_missing_payment());
    }

    #[test]
    fn test_gateway_reason_mapping() {
        assert_eq!(RefundReason::DuplicatePayment.gateway_code(), "duplicate");
        assert_eq!(RefundReason::ServiceNotRendered.gateway_code(), "others");
        assert_eq!(
            RefundReason::RequestedByCustomer.gateway_code(),
            "requested_by_customer"
        );
    }
}
