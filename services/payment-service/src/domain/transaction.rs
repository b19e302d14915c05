use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Model ledger untuk satu attempted payment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct PaymentTransaction {
    pub id: i32,
    pub booking_id: i32,

    // Amount & currency (major units, NUMERIC di database)
    #[schema(value_type = f64)]
    pub amount: BigDecimal,
    pub currency: String,

    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,

    // Gateway identifiers
    pub source_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub provider_transaction_id: Option<String>,

    pub failure_reason: Option<String>,

    // Timestamps
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Status transaction ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Succeeded => "succeeded",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal state tidak boleh transisi lagi
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Succeeded | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
    }

    /// Guard state machine: pending -> processing -> {succeeded, failed, cancelled}
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        match (self, next) {
            (TransactionStatus::Pending, TransactionStatus::Processing) => true,
            (TransactionStatus::Pending, n) if n.is_terminal() => true,
            (TransactionStatus::Processing, n) if n.is_terminal() => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Metode pembayaran yang didukung platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Gcash,
    Card,
    Paymaya,
    GrabPay,
    QrPh,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Gcash => "gcash",
            PaymentMethod::Card => "card",
            PaymentMethod::Paymaya => "paymaya",
            PaymentMethod::GrabPay => "grab_pay",
            PaymentMethod::QrPh => "qr_ph",
            PaymentMethod::Cash => "cash",
        }
    }

    /// Cash dibayar di lokasi, tidak lewat gateway
    pub fn is_gateway_backed(&self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }

    /// E-wallet methods pakai source flow (redirect checkout)
    pub fn uses_source(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Gcash | PaymentMethod::GrabPay | PaymentMethod::QrPh
        )
    }

    /// Card dan Maya pakai payment intent flow
    pub fn uses_intent(&self) -> bool {
        matches!(self, PaymentMethod::Card | PaymentMethod::Paymaya)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Hasil apply status dari webhook atau reconciliation
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Transisi berhasil di-apply
    Applied(PaymentTransaction),
    /// Transaction sudah terminal, event duplikat di-drop (no-op)
    AlreadyTerminal,
    /// Tidak ada transaction dengan identifier tersebut
    NotTracked,
}

// Request untuk initiate payment baru
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreatePaymentRequest {
    pub booking_id: i32,
    pub payment_method: PaymentMethod,
    pub description: Option<String>,
}

impl PaymentTransaction {
    /// Identifier yang dipakai resolve webhook event (intent ATAU source)
    pub fn lookup_ids(&self) -> Vec<&str> {
        self.payment_intent_id
            .iter()
            .chain(self.source_id.iter())
            .map(|s| s.as_str())
            .collect()
    }

    /// Generate reference unik untuk gateway description
    pub fn generate_reference(booking_id: i32) -> String {
        let date = Utc::now().format("%Y%m%d");
        let random: u32 = rand::random();
        format!("SRB-{}-{}-{:05}", booking_id, date, random % 100000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_do_not_transition() {
        for terminal in [
            TransactionStatus::Succeeded,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                TransactionStatus::Pending,
                TransactionStatus::Processing,
                TransactionStatus::Succeeded,
                TransactionStatus::Failed,
                TransactionStatus::Cancelled,
            ] {
                assert!(
                    !terminal.can_transition_to(next),
                    "{} should not transition to {}",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn test_pending_transitions() {
        let pending = TransactionStatus::Pending;
        assert!(pending.can_transition_to(TransactionStatus::Processing));
        assert!(pending.can_transition_to(TransactionStatus::Succeeded));
        assert!(pending.can_transition_to(TransactionStatus::Failed));
        assert!(pending.can_transition_to(TransactionStatus::Cancelled));
        assert!(!pending.can_transition_to(TransactionStatus::Pending));
    }

    #[test]
    fn test_first_terminal_transition_wins() {
        // payment.paid diikuti payment.failed untuk id yang sama:
        // transisi kedua harus ditolak oleh guard
        let status = TransactionStatus::Pending;
        assert!(status.can_transition_to(TransactionStatus::Succeeded));
        let settled = TransactionStatus::Succeeded;
        assert!(!settled.can_transition_to(TransactionStatus::Failed));
    }

    #[test]
    fn test_payment_method_flows() {
        assert!(PaymentMethod::Gcash.uses_source());
        assert!(PaymentMethod::QrPh.uses_source());
        assert!(PaymentMethod::Card.uses_intent());
        assert!(PaymentMethod::Paymaya.uses_intent());
        assert!(!PaymentMethod::Cash.is_gateway_backed());
        assert!(!PaymentMethod::Cash.uses_source());
        assert!(!PaymentMethod::Cash.uses_intent());
    }

    #[test]
    fn test_generate_reference_format() {
        let reference = PaymentTransaction::generate_reference(42);
        assert!(reference.starts_with("SRB-42-"));
    }
}
