use crate::domain::split::{PaymentSplit, SplitPaymentTransaction, SplitStatus};
use crate::error::AppError;
use bigdecimal::BigDecimal;
use sqlx::PgPool;

// Repository untuk split payment records
#[derive(Clone)]
pub struct SplitRepository {
    pool: PgPool,
}

impl SplitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Catat breakdown split untuk payment yang settled. One-to-one dengan
    /// payment transaction; insert kedua untuk payment yang sama jadi no-op
    /// (duplicate webhook protection lapis kedua).
    pub async fn create_split(
        &self,
        booking_id: i32,
        main_payment_id: i32,
        split: &PaymentSplit,
        total_amount: &BigDecimal,
        status: SplitStatus,
    ) -> Result<Option<SplitPaymentTransaction>, AppError> {
        let record = sqlx::query_as::<_, SplitPaymentTransaction>(
            r#"
            INSERT INTO split_payment_transactions (
                booking_id, main_payment_id, platform_fee_amount,
                provider_amount, total_amount, split_status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (main_payment_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(main_payment_id)
        .bind(&split.platform_fee_amount)
        .bind(&split.provider_amount)
        .bind(total_amount)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Split untuk satu payment transaction
    pub async fn find_by_payment(
        &self,
        main_payment_id: i32,
    ) -> Result<Option<SplitPaymentTransaction>, AppError> {
        let record = sqlx::query_as::<_, SplitPaymentTransaction>(
            "SELECT * FROM split_payment_transactions WHERE main_payment_id = $1",
        )
        .bind(main_payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Semua split untuk satu booking
    pub async fn find_by_booking(
        &self,
        booking_id: i32,
    ) -> Result<Vec<SplitPaymentTransaction>, AppError> {
        let records = sqlx::query_as::<_, SplitPaymentTransaction>(
            "SELECT * FROM split_payment_transactions WHERE booking_id = $1 ORDER BY created_at DESC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
