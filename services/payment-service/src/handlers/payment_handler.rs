use crate::domain::booking::{Booking, BookingPaymentStatus};
use crate::domain::transaction::{CreatePaymentRequest, PaymentTransaction, TransactionStatus};
use crate::error::AppError;
use crate::handlers::paymongo_service::{ListPaymentsFilter, RedirectUrls};
use crate::middleware::auth::{require_back_office, AuthUser};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa;

/// Initiate payment untuk booking: catat ledger attempt + buat gateway
/// source/intent sesuai metode
#[utoipa::path(
    post,
    path = "/api/payments",
    tag = "Payment Service",
    summary = "Initiate payment",
    description = "Record a payment attempt for a booking and create the gateway source or intent",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Payment attempt recorded", body = serde_json::Value),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Booking not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_payment(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = app_state
        .booking_repository
        .get_booking(request.booking_id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking not found"))?;

    // Security: hanya customer booking yang boleh bayar
    if booking.customer_id != auth.user_id && !auth.is_back_office() {
        return Err(AppError::forbidden(
            "Access denied: only the booking customer can pay for this booking",
        ));
    }

    if booking.payment_status == BookingPaymentStatus::Paid {
        return Err(AppError::validation("Booking is already paid"));
    }

    let method = request.payment_method;
    let reference = PaymentTransaction::generate_reference(booking.id);
    let description = request
        .description
        .clone()
        .unwrap_or_else(|| format!("{} booking #{} ({})", booking.service_name, booking.id, reference));

    let (transaction, checkout_url, client_key) = if !method.is_gateway_backed() {
        // Cash dibayar di lokasi; ledger row tetap dibuat untuk reconciliation
        let transaction = app_state
            .transaction_repository
            .record_attempt(
                booking.id,
                &booking.total_amount,
                &booking.currency,
                method,
                None,
                None,
            )
            .await?;
        (transaction, None, None)
    } else if method.uses_source() {
        let redirect = RedirectUrls {
            success: app_state.config.checkout_success_url.clone(),
            failed: app_state.config.checkout_failed_url.clone(),
            checkout_url: None,
        };

        let source = app_state
            .paymongo
            .create_source(&booking.total_amount, &booking.currency, method, redirect)
            .await
            .map_err(|e| {
                tracing::error!("Source creation failed for booking {}: {}", booking.id, e);
                e
            })?;

        let checkout_url = source
            .attributes
            .redirect
            .as_ref()
            .and_then(|r| r.checkout_url.clone());

        let transaction = app_state
            .transaction_repository
            .record_attempt(
                booking.id,
                &booking.total_amount,
                &booking.currency,
                method,
                Some(&source.id),
                None,
            )
            .await?;
        (transaction, checkout_url, None)
    } else {
        let intent = app_state
            .paymongo
            .create_payment_intent(
                &booking.total_amount,
                &booking.currency,
                &[method],
                Some(description.clone()),
            )
            .await
            .map_err(|e| {
                tracing::error!("Intent creation failed for booking {}: {}", booking.id, e);
                e
            })?;

        let client_key = intent.attributes.client_key.clone();

        let transaction = app_state
            .transaction_repository
            .record_attempt(
                booking.id,
                &booking.total_amount,
                &booking.currency,
                method,
                None,
                Some(&intent.id),
            )
            .await?;
        (transaction, None, client_key)
    };

    tracing::info!(
        "Payment attempt recorded: booking={}, transaction={}, method={}, amount={}",
        booking.id,
        transaction.id,
        method,
        transaction.amount
    );

    Ok(Json(json!({
        "success": true,
        "message": "Payment attempt recorded",
        "data": {
            "transaction_id": transaction.id,
            "booking_id": booking.id,
            "amount": transaction.amount,
            "currency": transaction.currency,
            "payment_method": method,
            "status": transaction.status,
            "source_id": transaction.source_id,
            "payment_intent_id": transaction.payment_intent_id,
            "checkout_url": checkout_url,
            "client_key": client_key,
            "reference": reference,
            "description": description
        }
    })))
}

/// Get transaction detail by ID
#[utoipa::path(
    get,
    path = "/api/payments/{payment_id}",
    tag = "Payment Service",
    summary = "Get transaction details",
    params(
        ("payment_id" = i32, Path, description = "Transaction ledger ID")
    ),
    responses(
        (status = 200, description = "Transaction details", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Transaction not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_payment_details(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Path(payment_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let transaction = app_state
        .transaction_repository
        .find_by_id(payment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Transaction not found"))?;

    let booking = require_booking_access(&auth, &app_state, transaction.booking_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "transaction": transaction,
            "booking_payment_status": booking.payment_status
        }
    })))
}

/// Semua transactions untuk satu booking (ledger view)
#[utoipa::path(
    get,
    path = "/api/payments/booking/{booking_id}",
    tag = "Payment Service",
    summary = "List booking transactions",
    params(
        ("booking_id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Transaction list", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Booking not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_booking_payments(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Path(booking_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let booking = require_booking_access(&auth, &app_state, booking_id).await?;

    let transactions = app_state
        .transaction_repository
        .find_by_booking(booking_id)
        .await?;
    let paid_total = app_state.transaction_repository.paid_total(booking_id).await?;
    let splits = app_state.split_repository.find_by_booking(booking_id).await?;

    Ok(Json(json!({
        "success": true,
        "count": transactions.len(),
        "data": {
            "booking_id": booking.id,
            "payment_status": booking.payment_status,
            "paid_total": paid_total,
            "transactions": transactions,
            "splits": splits
        }
    })))
}

/// Sync status transaction pending dari gateway (polling fallback untuk
/// webhook yang tidak sampai)
#[utoipa::path(
    post,
    path = "/api/payments/{payment_id}/sync",
    tag = "Payment Service",
    summary = "Sync transaction status from gateway",
    params(
        ("payment_id" = i32, Path, description = "Transaction ledger ID")
    ),
    responses(
        (status = 200, description = "Sync result", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Transaction not found"),
        (status = 502, description = "Gateway error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn sync_payment_status(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Path(payment_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    require_back_office(&auth)?;

    let transaction = app_state
        .transaction_repository
        .find_by_id(payment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Transaction not found"))?;

    if transaction.status.is_terminal() {
        return Ok(Json(json!({
            "success": false,
            "message": "Transaction is already terminal",
            "status": transaction.status
        })));
    }

    // Resolve status terkini dari gateway: intent dulu, lalu source
    let gateway_status = if let Some(intent_id) = &transaction.payment_intent_id {
        let intent = app_state.paymongo.retrieve_payment_intent(intent_id).await?;
        intent.attributes.status
    } else if let Some(source_id) = &transaction.source_id {
        let source = app_state.paymongo.retrieve_source(source_id).await?;
        source.attributes.status
    } else {
        return Ok(Json(json!({
            "success": false,
            "message": "Transaction has no gateway identifier to sync from"
        })));
    };

    let new_status = match gateway_status.as_str() {
        "succeeded" | "paid" | "chargeable" => Some(TransactionStatus::Succeeded),
        "cancelled" | "expired" => Some(TransactionStatus::Failed),
        _ => None,
    };

    let applied = match new_status {
        Some(status) => {
            let lookup_id = transaction
                .payment_intent_id
                .as_deref()
                .or(transaction.source_id.as_deref())
                .unwrap_or_default();

            let failure_reason = (status == TransactionStatus::Failed)
                .then(|| format!("Gateway reported '{}' during sync", gateway_status));

            let outcome = app_state
                .transaction_repository
                .apply_status(lookup_id, status, None, failure_reason.as_deref())
                .await?;

            if let crate::domain::transaction::ApplyOutcome::Applied(applied) = &outcome {
                let kind = if applied.status == TransactionStatus::Succeeded {
                    crate::handlers::webhook_handler::record_split(&app_state, applied).await?;
                    crate::utils::notifier::PaymentEventKind::PaymentConfirmed
                } else {
                    crate::utils::notifier::PaymentEventKind::PaymentFailed
                };
                app_state.notifier.notify_detached(applied.booking_id, kind);
            }

            matches!(outcome, crate::domain::transaction::ApplyOutcome::Applied(_))
        }
        None => false,
    };

    tracing::info!(
        "Gateway sync for transaction {}: gateway_status={}, applied={}",
        payment_id,
        gateway_status,
        applied
    );

    Ok(Json(json!({
        "success": true,
        "data": {
            "transaction_id": payment_id,
            "gateway_status": gateway_status,
            "applied": applied
        }
    })))
}

// Query params untuk gateway payment listing
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct GatewayListQuery {
    pub limit: Option<u8>,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// List payments langsung dari gateway (operator tooling)
#[utoipa::path(
    get,
    path = "/api/payments/gateway",
    tag = "Payment Service",
    summary = "List gateway payments",
    responses(
        (status = 200, description = "Gateway payment list", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 502, description = "Gateway error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_gateway_payments(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Query(query): Query<GatewayListQuery>,
) -> Result<Json<Value>, AppError> {
    require_back_office(&auth)?;

    let filter = ListPaymentsFilter {
        limit: query.limit,
        before: query.before,
        after: query.after,
    };

    let payments = app_state.paymongo.list_payments(&filter).await?;

    let data: Vec<Value> = payments
        .data
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "amount": p.attributes.amount,
                "currency": p.attributes.currency,
                "status": p.attributes.status,
                "payment_intent_id": p.attributes.payment_intent_id,
                "description": p.attributes.description
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "count": data.len(),
        "has_more": payments.has_more,
        "data": data
    })))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Payment Service",
    summary = "Health check",
    responses(
        (status = 200, description = "Service is healthy", body = serde_json::Value)
    )
)]
pub async fn health_check(
    State(app_state): State<crate::config::AppState>,
) -> Result<Json<Value>, AppError> {
    let status = app_state.health_check().await;

    Ok(Json(json!({
        "status": status.overall,
        "database": status.database,
        "service": "payment-service",
        "timestamp": Utc::now(),
        "version": app_state.config.app_version,
    })))
}

/// Get service information
#[utoipa::path(
    get,
    path = "/info",
    tag = "Payment Service",
    summary = "Get service information",
    responses(
        (status = 200, description = "Service information", body = serde_json::Value)
    )
)]
pub async fn get_service_info(
    State(app_state): State<crate::config::AppState>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({
        "service": "payment-service",
        "version": app_state.config.app_version,
        "environment": app_state.paymongo.get_environment_info(),
        "is_live_mode": app_state.paymongo.is_live_mode(),
        "currency": app_state.config.currency,
        "split_payment_mode": match app_state.config.split_payment_mode {
            crate::domain::split::SplitMode::Live => "live",
            crate::domain::split::SplitMode::Simulated => "simulated",
        },
        "supported_payment_methods": ["gcash", "card", "paymaya", "grab_pay", "qr_ph", "cash"],
        "features": [
            "PayMongo payment gateway integration",
            "HMAC SHA256 webhook verification",
            "Idempotent webhook processing",
            "Automatic and manual refunds with audit trail",
            "Booking payment reconciliation",
            "Platform commission split"
        ],
        "timestamp": Utc::now()
    })))
}

// Security: validasi user boleh akses data payment booking ini
pub(crate) async fn require_booking_access(
    auth: &AuthUser,
    app_state: &crate::config::AppState,
    booking_id: i32,
) -> Result<Booking, AppError> {
    let booking = app_state
        .booking_repository
        .get_booking(booking_id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking not found"))?;

    if !booking.involves_user(auth.user_id) && !auth.is_back_office() {
        return Err(AppError::forbidden(
            "Access denied: not involved in this booking",
        ));
    }

    Ok(booking)
}
