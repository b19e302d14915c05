use crate::domain::booking::BookingPaymentStatus;
use crate::domain::transaction::{
    ApplyOutcome, PaymentMethod, PaymentTransaction, TransactionStatus,
};
use crate::error::AppError;
use bigdecimal::BigDecimal;
use sqlx::PgPool;

// Repository untuk transaction ledger
#[derive(Clone)]
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Catat payment attempt baru dengan status pending
    pub async fn record_attempt(
        &self,
        booking_id: i32,
        amount: &BigDecimal,
        currency: &str,
        method: PaymentMethod,
        source_id: Option<&str>,
        payment_intent_id: Option<&str>,
    ) -> Result<PaymentTransaction, AppError> {
        let transaction = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            INSERT INTO payment_transactions (
                booking_id, amount, currency, payment_method, status,
                source_id, payment_intent_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, 'pending', $5, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(amount)
        .bind(currency)
        .bind(method.as_str())
        .bind(source_id)
        .bind(payment_intent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(transaction)
    }

    /// Cari transaction berdasarkan ID
    pub async fn find_by_id(&self, id: i32) -> Result<Option<PaymentTransaction>, AppError> {
        let transaction = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM payment_transactions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    /// Semua transactions untuk satu booking, terbaru dulu
    pub async fn find_by_booking(
        &self,
        booking_id: i32,
    ) -> Result<Vec<PaymentTransaction>, AppError> {
        let transactions = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM payment_transactions WHERE booking_id = $1 ORDER BY created_at DESC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    /// Transaction succeeded untuk booking (kalau ada)
    pub async fn find_succeeded_for_booking(
        &self,
        booking_id: i32,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        let transaction = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            SELECT * FROM payment_transactions
            WHERE booking_id = $1 AND status = 'succeeded'
            ORDER BY paid_at DESC
            LIMIT 1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    /// Cari transaction berdasarkan provider payment id (pay_...)
    pub async fn find_by_provider_transaction_id(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        let transaction = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM payment_transactions WHERE provider_transaction_id = $1",
        )
        .bind(provider_transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    /// Total amount yang sudah settled untuk booking
    pub async fn paid_total(&self, booking_id: i32) -> Result<BigDecimal, AppError> {
        let total = sqlx::query_scalar::<_, BigDecimal>(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM payment_transactions
            WHERE booking_id = $1 AND status = 'succeeded'
            "#,
        )
        .bind(booking_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Apply status transition dari webhook event.
    ///
    /// Lookup pakai payment_intent_id ATAU source_id (keduanya bisa match
    /// tergantung flow). Transisi hanya terjadi kalau row masih non-terminal:
    /// satu UPDATE compare-and-set, bukan read-then-write, supaya duplicate
    /// delivery yang concurrent tetap menghasilkan tepat satu transisi.
    /// Update booking payment_status terjadi di transaction database yang sama.
    pub async fn apply_status(
        &self,
        lookup_id: &str,
        new_status: TransactionStatus,
        provider_transaction_id: Option<&str>,
        failure_reason: Option<&str>,
    ) -> Result<ApplyOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            UPDATE payment_transactions
            SET status = $2,
                provider_transaction_id = COALESCE($3, provider_transaction_id),
                failure_reason = COALESCE($4, failure_reason),
                paid_at = CASE WHEN $2 = 'succeeded' THEN NOW() ELSE paid_at END,
                updated_at = NOW()
            WHERE (payment_intent_id = $1 OR source_id = $1)
              AND status IN ('pending', 'processing')
            RETURNING *
            "#,
        )
        .bind(lookup_id)
        .bind(new_status.as_str())
        .bind(provider_transaction_id)
        .bind(failure_reason)
        .fetch_optional(&mut *tx)
        .await?;

        match updated {
            Some(transaction) => {
                if transaction.status == TransactionStatus::Succeeded {
                    sqlx::query(
                        "UPDATE bookings SET payment_status = $2, updated_at = NOW() WHERE id = $1",
                    )
                    .bind(transaction.booking_id)
                    .bind(BookingPaymentStatus::Paid.as_str())
                    .execute(&mut *tx)
                    .await?;
                }

                tx.commit().await?;
                Ok(ApplyOutcome::Applied(transaction))
            }
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    r#"
                    SELECT EXISTS(
                        SELECT 1 FROM payment_transactions
                        WHERE payment_intent_id = $1 OR source_id = $1
                    )
                    "#,
                )
                .bind(lookup_id)
                .fetch_one(&mut *tx)
                .await?;

                tx.commit().await?;

                if exists {
                    Ok(ApplyOutcome::AlreadyTerminal)
                } else {
                    Ok(ApplyOutcome::NotTracked)
                }
            }
        }
    }

    /// Batalkan pending attempts untuk booking (misal customer ganti metode)
    pub async fn cancel_pending_attempts(&self, booking_id: i32) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = 'cancelled', updated_at = NOW()
            WHERE booking_id = $1 AND status = 'pending'
            "#,
        )
        .bind(booking_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ===== Reconciliation queries =====

    /// Booking yang marked paid tapi tidak punya succeeded transaction
    pub async fn find_orphaned_paid(
        &self,
        booking_id: Option<i32>,
    ) -> Result<Vec<i32>, AppError> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT b.id FROM bookings b
            WHERE b.payment_status = 'paid'
              AND ($1::INT IS NULL OR b.id = $1)
              AND NOT EXISTS (
                  SELECT 1 FROM payment_transactions t
                  WHERE t.booking_id = b.id AND t.status = 'succeeded'
              )
            ORDER BY b.id
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Booking yang marked not_paid padahal punya succeeded transaction
    pub async fn find_orphaned_unpaid(
        &self,
        booking_id: Option<i32>,
    ) -> Result<Vec<i32>, AppError> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT b.id FROM bookings b
            WHERE b.payment_status = 'not_paid'
              AND ($1::INT IS NULL OR b.id = $1)
              AND EXISTS (
                  SELECT 1 FROM payment_transactions t
                  WHERE t.booking_id = b.id AND t.status = 'succeeded'
              )
            ORDER BY b.id
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
