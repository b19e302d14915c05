use crate::domain::booking::BookingPaymentStatus;
use crate::error::AppError;
use crate::middleware::auth::{require_back_office, AuthUser};
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa;

// Request reconciliation run
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ReconciliationRequest {
    /// Kalau diisi, hanya booking ini yang dicek (operator spot check)
    pub booking_id: Option<i32>,
    /// Default true: laporkan diff tanpa menulis apapun
    pub dry_run: Option<bool>,
}

// Satu repair action yang diambil (atau gagal) saat apply mode
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ReconciliationAction {
    pub booking_id: i32,
    pub action: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ReconciliationConflict {
    pub booking_id: i32,
    pub error: String,
}

/// Detect dan repair drift antara booking payment_status dan transaction
/// ledger.
///
/// Ledger update dan booking update tidak selalu atomic (webhook bisa gagal
/// di tengah), jadi service ini adalah compensating mechanism yang disengaja:
/// - orphaned_paid: booking 'paid' tanpa succeeded transaction -> not_paid
/// - orphaned_unpaid: booking 'not_paid' dengan succeeded transaction -> paid
///
/// Apply mode melakukan repair per booking secara independen; kegagalan satu
/// booking masuk ke report, tidak membatalkan sisanya. Idempotent: run kedua
/// setelah apply melaporkan tidak ada drift.
#[utoipa::path(
    post,
    path = "/api/reconciliation",
    tag = "Payment Service",
    summary = "Run payment reconciliation",
    request_body = ReconciliationRequest,
    responses(
        (status = 200, description = "Diff/repair report", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Insufficient role"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn run_reconciliation(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Json(request): Json<ReconciliationRequest>,
) -> Result<Json<Value>, AppError> {
    require_back_office(&auth)?;

    let dry_run = request.dry_run.unwrap_or(true);

    let orphaned_paid = app_state
        .transaction_repository
        .find_orphaned_paid(request.booking_id)
        .await?;
    let orphaned_unpaid = app_state
        .transaction_repository
        .find_orphaned_unpaid(request.booking_id)
        .await?;
    let flagged_refunds = app_state
        .refund_repository
        .find_flagged_missing_payment()
        .await?;

    tracing::info!(
        "Reconciliation scan by user {}: {} orphaned paid, {} orphaned unpaid, {} flagged refunds (dry_run={})",
        auth.user_id,
        orphaned_paid.len(),
        orphaned_unpaid.len(),
        flagged_refunds.len(),
        dry_run
    );

    let mut actions_taken: Vec<ReconciliationAction> = Vec::new();
    let mut conflicts: Vec<ReconciliationConflict> = Vec::new();

    if !dry_run {
        // Repair per booking, masing-masing statement sendiri; tidak ada
        // long-lived lock untuk full sweep
        for booking_id in &orphaned_paid {
            match app_state
                .booking_repository
                .set_payment_status(*booking_id, BookingPaymentStatus::NotPaid)
                .await
            {
                Ok(true) => actions_taken.push(ReconciliationAction {
                    booking_id: *booking_id,
                    action: "reset_to_not_paid".to_string(),
                }),
                Ok(false) => conflicts.push(ReconciliationConflict {
                    booking_id: *booking_id,
                    error: "Booking disappeared during repair".to_string(),
                }),
                Err(e) => {
                    tracing::error!("Reconciliation repair failed for booking {}: {}", booking_id, e);
                    conflicts.push(ReconciliationConflict {
                        booking_id: *booking_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        for booking_id in &orphaned_unpaid {
            match app_state
                .booking_repository
                .set_payment_status(*booking_id, BookingPaymentStatus::Paid)
                .await
            {
                Ok(true) => actions_taken.push(ReconciliationAction {
                    booking_id: *booking_id,
                    action: "set_to_paid".to_string(),
                }),
                Ok(false) => conflicts.push(ReconciliationConflict {
                    booking_id: *booking_id,
                    error: "Booking disappeared during repair".to_string(),
                }),
                Err(e) => {
                    tracing::error!("Reconciliation repair failed for booking {}: {}", booking_id, e);
                    conflicts.push(ReconciliationConflict {
                        booking_id: *booking_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Reconciliation applied: {} repairs, {} conflicts",
            actions_taken.len(),
            conflicts.len()
        );
    }

    Ok(Json(json!({
        "success": true,
        "dry_run": dry_run,
        "data": {
            "orphaned_paid": orphaned_paid,
            "orphaned_unpaid": orphaned_unpaid,
            "flagged_refunds": flagged_refunds,
            "actions_taken": actions_taken,
            "conflicts": conflicts
        }
    })))
}
