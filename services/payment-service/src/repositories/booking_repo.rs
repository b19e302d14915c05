use crate::domain::booking::{Booking, BookingPaymentStatus};
use crate::error::AppError;
use sqlx::PgPool;

// Read/write akses ke booking collaborator. Booking dimiliki booking-service;
// repository ini hanya membaca dan menulis field payment_status.
#[derive(Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ambil booking berdasarkan ID
    pub async fn get_booking(&self, booking_id: i32) -> Result<Option<Booking>, AppError> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, customer_id, provider_id, service_name, total_amount,
                   currency, commission_rate, status, payment_status, created_at
            FROM bookings
            WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Tulis payment_status booking. Return false kalau booking tidak ada.
    pub async fn set_payment_status(
        &self,
        booking_id: i32,
        status: BookingPaymentStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE bookings SET payment_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(booking_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
