use crate::domain::refund::{
    AuditActor, RefundAuditLog, RefundReason, RefundRecord, RefundStatus, RefundType,
};
use crate::domain::transaction::PaymentMethod;
use crate::error::AppError;
use bigdecimal::BigDecimal;
use sqlx::{PgPool, Postgres, Transaction};

// Data untuk insert refund baru
#[derive(Debug)]
pub struct NewRefund<'a> {
    pub booking_id: i32,
    pub user_id: i32,
    pub amount: &'a BigDecimal,
    pub reason: RefundReason,
    pub refund_type: RefundType,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub metadata: Option<serde_json::Value>,
}

// Repository untuk refund records + audit trail.
// Setiap status transition dan audit row ditulis dalam satu database
// transaction: transisi tanpa audit row adalah data-integrity bug.
#[derive(Clone)]
pub struct RefundRepository {
    pool: PgPool,
}

impl RefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Insert refund pending baru + audit row "created"
    pub async fn create_refund(
        &self,
        new_refund: NewRefund<'_>,
        actor: AuditActor,
        ip_address: Option<&str>,
    ) -> Result<RefundRecord, AppError> {
        let mut tx = self.pool.begin().await?;

        let refund = sqlx::query_as::<_, RefundRecord>(
            r#"
            INSERT INTO refund_records (
                booking_id, user_id, amount, reason, status, refund_type,
                payment_method, transaction_id, notes, metadata,
                receipt_verified, initiated_at, updated_at
            ) VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8, $9, FALSE, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(new_refund.booking_id)
        .bind(new_refund.user_id)
        .bind(new_refund.amount)
        .bind(new_refund.reason.as_str())
        .bind(new_refund.refund_type.to_string())
        .bind(new_refund.payment_method.as_str())
        .bind(new_refund.transaction_id)
        .bind(new_refund.notes)
        .bind(new_refund.metadata)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_audit(
            &mut tx,
            refund.id,
            "created",
            None,
            Some(RefundStatus::Pending),
            actor,
            Some(format!(
                "Refund requested for booking {} ({} {})",
                refund.booking_id, refund.amount, refund.reason
            )),
            ip_address,
        )
        .await?;

        tx.commit().await?;
        Ok(refund)
    }

    /// Cari refund berdasarkan ID
    pub async fn find_by_id(&self, id: i32) -> Result<Option<RefundRecord>, AppError> {
        let refund =
            sqlx::query_as::<_, RefundRecord>("SELECT * FROM refund_records WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(refund)
    }

    /// Semua refunds untuk satu booking
    pub async fn find_by_booking(&self, booking_id: i32) -> Result<Vec<RefundRecord>, AppError> {
        let refunds = sqlx::query_as::<_, RefundRecord>(
            "SELECT * FROM refund_records WHERE booking_id = $1 ORDER BY initiated_at DESC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(refunds)
    }

    /// Cari refund berdasarkan gateway refund id (untuk duplicate webhook)
    pub async fn find_by_gateway_refund_id(
        &self,
        gateway_refund_id: &str,
    ) -> Result<Option<RefundRecord>, AppError> {
        let refund = sqlx::query_as::<_, RefundRecord>(
            "SELECT * FROM refund_records WHERE gateway_refund_id = $1",
        )
        .bind(gateway_refund_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(refund)
    }

    /// Refund automatic yang masih aktif untuk booking (dipakai webhook
    /// payment.refunded untuk resolve record)
    pub async fn find_active_automatic_for_booking(
        &self,
        booking_id: i32,
    ) -> Result<Option<RefundRecord>, AppError> {
        let refund = sqlx::query_as::<_, RefundRecord>(
            r#"
            SELECT * FROM refund_records
            WHERE booking_id = $1
              AND refund_type = 'automatic'
              AND status IN ('pending', 'processing')
            ORDER BY initiated_at ASC
            LIMIT 1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(refund)
    }

    /// Total refund yang mengunci saldo refundable booking
    /// (failed dan cancelled tidak dihitung)
    pub async fn refunded_total(&self, booking_id: i32) -> Result<BigDecimal, AppError> {
        let total = sqlx::query_scalar::<_, BigDecimal>(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM refund_records
            WHERE booking_id = $1 AND status NOT IN ('failed', 'cancelled')
            "#,
        )
        .bind(booking_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Total refund yang sudah selesai untuk booking
    pub async fn completed_total(&self, booking_id: i32) -> Result<BigDecimal, AppError> {
        let total = sqlx::query_scalar::<_, BigDecimal>(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM refund_records
            WHERE booking_id = $1 AND status = 'completed'
            "#,
        )
        .bind(booking_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Refund IDs yang di-flag missing_payment_id (untuk reconciliation report)
    pub async fn find_flagged_missing_payment(&self) -> Result<Vec<i32>, AppError> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT id FROM refund_records
            WHERE (metadata ->> 'missing_payment_id')::BOOLEAN IS TRUE
              AND status IN ('pending', 'processing')
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Audit trail untuk satu refund, urut kronologis
    pub async fn audit_trail(&self, refund_id: i32) -> Result<Vec<RefundAuditLog>, AppError> {
        let logs = sqlx::query_as::<_, RefundAuditLog>(
            "SELECT * FROM refund_audit_logs WHERE refund_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(refund_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    /// Transisi status refund + satu audit row, atomic dalam satu database
    /// transaction. Row di-lock dulu (SELECT ... FOR UPDATE) supaya guard
    /// state machine dan receipt gating dievaluasi tanpa race.
    pub async fn transition_status(
        &self,
        refund_id: i32,
        new_status: RefundStatus,
        actor: AuditActor,
        details: Option<String>,
        ip_address: Option<&str>,
    ) -> Result<RefundRecord, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, RefundRecord>(
            "SELECT * FROM refund_records WHERE id = $1 FOR UPDATE",
        )
        .bind(refund_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Refund not found"))?;

        if !current.status.can_transition_to(new_status) {
            return Err(AppError::conflict(format!(
                "Refund cannot move from '{}' to '{}'",
                current.status, new_status
            )));
        }

        // Manual refund butuh receipt terverifikasi sebelum completed
        if new_status == RefundStatus::Completed {
            current.ensure_completable()?;
        }

        let updated = sqlx::query_as::<_, RefundRecord>(
            r#"
            UPDATE refund_records
            SET status = $2,
                processed_by = COALESCE($3, processed_by),
                processed_at = CASE WHEN $2 = 'processing' THEN NOW() ELSE processed_at END,
                completed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(refund_id)
        .bind(new_status.as_str())
        .bind(actor.performed_by)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_audit(
            &mut tx,
            refund_id,
            "status_changed",
            Some(current.status),
            Some(new_status),
            actor,
            details,
            ip_address,
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Simpan receipt path untuk manual refund + audit row.
    /// Hanya valid saat refund manual dan belum terminal.
    pub async fn set_receipt(
        &self,
        refund_id: i32,
        receipt_path: &str,
        actor: AuditActor,
        ip_address: Option<&str>,
    ) -> Result<RefundRecord, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, RefundRecord>(
            "SELECT * FROM refund_records WHERE id = $1 FOR UPDATE",
        )
        .bind(refund_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Refund not found"))?;

        if !current.receipt_uploadable() {
            return Err(AppError::conflict(format!(
                "Refund is not in a state that accepts a receipt (type: {}, status: {})",
                current.refund_type, current.status
            )));
        }

        let updated = sqlx::query_as::<_, RefundRecord>(
            r#"
            UPDATE refund_records
            SET receipt_path = $2,
                receipt_verified = FALSE,
                receipt_verified_by = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(refund_id)
        .bind(receipt_path)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_audit(
            &mut tx,
            refund_id,
            "receipt_uploaded",
            None,
            None,
            actor,
            Some(format!("Receipt stored at {}", receipt_path)),
            ip_address,
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Verifikasi receipt oleh staff (gate kedua manual flow) + audit row
    pub async fn verify_receipt(
        &self,
        refund_id: i32,
        actor: AuditActor,
        ip_address: Option<&str>,
    ) -> Result<RefundRecord, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, RefundRecord>(
            "SELECT * FROM refund_records WHERE id = $1 FOR UPDATE",
        )
        .bind(refund_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Refund not found"))?;

        if current.receipt_path.is_none() {
            return Err(AppError::conflict(
                "Refund has no uploaded receipt to verify",
            ));
        }
        if current.status.is_terminal() {
            return Err(AppError::conflict(format!(
                "Refund is already terminal ({})",
                current.status
            )));
        }

        let updated = sqlx::query_as::<_, RefundRecord>(
            r#"
            UPDATE refund_records
            SET receipt_verified = TRUE,
                receipt_verified_by = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(refund_id)
        .bind(actor.performed_by)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_audit(
            &mut tx,
            refund_id,
            "receipt_verified",
            None,
            None,
            actor,
            None,
            ip_address,
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Simpan gateway refund id setelah create refund di PayMongo
    pub async fn set_gateway_refund_id(
        &self,
        refund_id: i32,
        gateway_refund_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE refund_records SET gateway_refund_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(refund_id)
        .bind(gateway_refund_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Insert satu audit row di dalam transaction yang sedang berjalan
    async fn insert_audit(
        tx: &mut Transaction<'_, Postgres>,
        refund_id: i32,
        action: &str,
        previous_status: Option<RefundStatus>,
        new_status: Option<RefundStatus>,
        actor: AuditActor,
        details: Option<String>,
        ip_address: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refund_audit_logs (
                refund_id, action, previous_status, new_status,
                performed_by, performed_by_type, details, ip_address, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            "#,
        )
        .bind(refund_id)
        .bind(action)
        .bind(previous_status.map(|s| s.as_str()))
        .bind(new_status.map(|s| s.as_str()))
        .bind(actor.performed_by)
        .bind(actor.performed_by_type.as_str())
        .bind(details)
        .bind(ip_address)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
