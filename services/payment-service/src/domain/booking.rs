use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Read model booking. Booking dimiliki booking-service; payment-service hanya
// membaca identitas/amount/status dan menulis satu field: payment_status.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Booking {
    pub id: i32,
    pub customer_id: i32,
    pub provider_id: i32,
    pub service_name: String,

    #[schema(value_type = f64)]
    pub total_amount: BigDecimal,
    pub currency: String,

    /// Rate komisi di-snapshot saat booking dibuat
    #[schema(value_type = f64)]
    pub commission_rate: BigDecimal,

    pub status: BookingStatus,
    pub payment_status: BookingPaymentStatus,

    pub created_at: DateTime<Utc>,
}

// Status booking (dikelola booking-service)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Booking yang sudah selesai atau sedang berjalan tidak bisa direfund
    /// lewat engine ini
    pub fn allows_refund(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Cancelled
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Payment status booking, satu-satunya field yang ditulis engine ini
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingPaymentStatus {
    NotPaid,
    Paid,
    Refunded,
}

impl BookingPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingPaymentStatus::NotPaid => "not_paid",
            BookingPaymentStatus::Paid => "paid",
            BookingPaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for BookingPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Booking {
    /// Cek apakah user terlibat di booking ini (customer atau provider)
    pub fn involves_user(&self, user_id: i32) -> bool {
        self.customer_id == user_id || self.provider_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refundable_statuses() {
        assert!(BookingStatus::Pending.allows_refund());
        assert!(BookingStatus::Confirmed.allows_refund());
        assert!(BookingStatus::Cancelled.allows_refund());
        assert!(!BookingStatus::InProgress.allows_refund());
        assert!(!BookingStatus::Completed.allows_refund());
    }
}
