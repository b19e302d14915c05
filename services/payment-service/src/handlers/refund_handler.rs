use crate::domain::booking::{Booking, BookingPaymentStatus};
use crate::domain::refund::{
    check_refund_amount, AuditActor, CreateRefundRequest, RefundEligibility, RefundStatus,
    RefundType, METADATA_MISSING_PAYMENT_ID,
};
use crate::domain::transaction::PaymentTransaction;
use crate::error::AppError;
use crate::handlers::payment_handler::require_booking_access;
use crate::middleware::auth::{client_ip, require_back_office, AuthUser};
use crate::repositories::refund_repo::NewRefund;
use crate::utils::notifier::PaymentEventKind;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
};
use axum_extra::extract::Multipart;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::utils::cloudinary::CloudinaryClient;
use shared::utils::validation::{is_valid_note, sanitize_html};
use utoipa;

// Constants untuk receipt upload validation
const MAX_RECEIPT_SIZE: usize = 10 * 1024 * 1024;
const ALLOWED_RECEIPT_TYPES: &[&str] = &[
    "image/jpeg", "image/jpg", "image/png", "application/pdf",
];

/// Check refund eligibility untuk booking
#[utoipa::path(
    get,
    path = "/api/bookings/{booking_id}/refund-eligibility",
    tag = "Payment Service",
    summary = "Check refund eligibility",
    params(
        ("booking_id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Eligibility report", body = RefundEligibility),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Booking not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn check_refund_eligibility(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Path(booking_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let booking = require_booking_access(&auth, &app_state, booking_id).await?;
    let (eligibility, _settled) = compute_eligibility(&app_state, &booking).await?;

    Ok(Json(json!({
        "success": true,
        "data": eligibility
    })))
}

/// Request refund untuk booking (customer-facing)
#[utoipa::path(
    post,
    path = "/api/refunds",
    tag = "Payment Service",
    summary = "Request refund",
    description = "Create a refund record for a paid booking",
    request_body = CreateRefundRequest,
    responses(
        (status = 200, description = "Refund created", body = serde_json::Value),
        (status = 400, description = "Ineligible refund (machine-readable reason in details)"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the booking owner"),
        (status = 404, description = "Booking not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn request_refund(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateRefundRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = app_state
        .booking_repository
        .get_booking(request.booking_id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking not found"))?;

    // Security: hanya customer booking (atau staff) yang boleh minta refund
    if booking.customer_id != auth.user_id && !auth.is_back_office() {
        return Err(AppError::forbidden(
            "Access denied: not the booking owner",
        ));
    }

    let (eligibility, settled) = compute_eligibility(&app_state, &booking).await?;
    let settled = match (eligibility.eligible, settled) {
        (true, Some(settled)) => settled,
        _ => {
            let code = eligibility
                .reason_code
                .unwrap_or_else(|| "ineligible".to_string());
            return Err(AppError::ineligible(
                code,
                "Booking is not eligible for a refund",
            ));
        }
    };

    // Default: refund seluruh sisa refundable
    let amount = request
        .amount
        .clone()
        .unwrap_or_else(|| eligibility.refundable_amount.clone());
    check_refund_amount(&amount, &eligibility.refundable_amount)?;

    let notes = match request.notes.as_deref() {
        Some(notes) if !notes.trim().is_empty() => {
            if !is_valid_note(notes) {
                return Err(AppError::validation("Refund note is too long"));
            }
            Some(sanitize_html(notes))
        }
        _ => None,
    };

    // Refund type: cash dan payment tanpa provider id harus manual
    let (refund_type, metadata) = if !settled.payment_method.is_gateway_backed() {
        (RefundType::Manual, None)
    } else if settled.provider_transaction_id.is_none() {
        // Settled lewat source.chargeable tanpa payment resource; ditandai
        // untuk investigasi reconciliation
        (
            RefundType::Manual,
            Some(json!({ METADATA_MISSING_PAYMENT_ID: true })),
        )
    } else {
        (RefundType::Automatic, None)
    };

    let actor = AuditActor::from_role(auth.user_id, &auth.role);
    let refund = app_state
        .refund_repository
        .create_refund(
            NewRefund {
                booking_id: booking.id,
                user_id: booking.customer_id,
                amount: &amount,
                reason: request.reason,
                refund_type,
                payment_method: settled.payment_method,
                transaction_id: settled.provider_transaction_id.as_deref(),
                notes: notes.as_deref(),
                metadata,
            },
            actor,
            client_ip(&headers).as_deref(),
        )
        .await?;

    tracing::info!(
        "Refund requested: refund={}, booking={}, amount={}, type={}, reason={}",
        refund.id,
        booking.id,
        refund.amount,
        refund.refund_type,
        refund.reason
    );

    app_state
        .notifier
        .notify_detached(booking.id, PaymentEventKind::RefundInitiated);

    Ok(Json(json!({
        "success": true,
        "message": "Refund request recorded",
        "data": {
            "refund_id": refund.id,
            "status": refund.status,
            "amount": refund.amount,
            "refund_type": refund.refund_type
        }
    })))
}

/// Get refund details (termasuk audit trail untuk staff)
#[utoipa::path(
    get,
    path = "/api/refunds/{refund_id}",
    tag = "Payment Service",
    summary = "Get refund details",
    params(
        ("refund_id" = i32, Path, description = "Refund ID")
    ),
    responses(
        (status = 200, description = "Refund details", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Refund not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_refund(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Path(refund_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let refund = app_state
        .refund_repository
        .find_by_id(refund_id)
        .await?
        .ok_or_else(|| AppError::not_found("Refund not found"))?;

    if refund.user_id != auth.user_id && !auth.is_back_office() {
        return Err(AppError::forbidden("Access denied: not your refund"));
    }

    // Audit trail hanya untuk back office
    let audit_trail = if auth.is_back_office() {
        Some(app_state.refund_repository.audit_trail(refund_id).await?)
    } else {
        None
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "refund": refund,
            "audit_trail": audit_trail
        }
    })))
}

/// Semua refunds untuk satu booking
#[utoipa::path(
    get,
    path = "/api/refunds/booking/{booking_id}",
    tag = "Payment Service",
    summary = "List booking refunds",
    params(
        ("booking_id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Refund list", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Booking not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_booking_refunds(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Path(booking_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    require_booking_access(&auth, &app_state, booking_id).await?;

    let refunds = app_state.refund_repository.find_by_booking(booking_id).await?;
    let refunded_total = app_state
        .refund_repository
        .refunded_total(booking_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": refunds.len(),
        "refunded_total": refunded_total,
        "data": refunds
    })))
}

/// Upload receipt untuk manual refund (staff-facing, multipart)
#[utoipa::path(
    post,
    path = "/api/refunds/{refund_id}/receipt",
    tag = "Payment Service",
    summary = "Upload refund receipt",
    description = "Upload the transfer receipt for a manual refund (jpeg/png/pdf, max 10 MB)",
    params(
        ("refund_id" = i32, Path, description = "Refund ID")
    ),
    request_body(
        description = "Multipart form data dengan satu file receipt",
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 200, description = "Receipt stored", body = serde_json::Value),
        (status = 400, description = "Invalid file type or size"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Insufficient role"),
        (status = 404, description = "Refund not found"),
        (status = 409, description = "Refund not in an uploadable state"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_refund_receipt(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Path(refund_id): Path<i32>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    require_back_office(&auth)?;

    let refund = app_state
        .refund_repository
        .find_by_id(refund_id)
        .await?
        .ok_or_else(|| AppError::not_found("Refund not found"))?;

    if !refund.receipt_uploadable() {
        return Err(AppError::conflict(format!(
            "Refund is not in a state that accepts a receipt (type: {}, status: {})",
            refund.refund_type, refund.status
        )));
    }

    // Ambil file field pertama dari multipart
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Multipart error: {}", e)))?
    {
        if field.file_name().is_none() {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("Read file error: {}", e)))?;

        file = Some((content_type, data.to_vec()));
        break;
    }

    let (content_type, data) =
        file.ok_or_else(|| AppError::receipt("No receipt file in request"))?;

    validate_receipt_file(&content_type, data.len())?;

    // Simpan ke storage collaborator
    let cloudinary = CloudinaryClient::new()
        .map_err(|e| AppError::internal(format!("Storage client init failed: {}", e)))?;

    let upload = cloudinary
        .upload_receipt(data, &content_type, Some(format!("refund-{}", refund.id)))
        .await
        .map_err(|e| AppError::internal(format!("Receipt upload failed: {}", e)))?;

    let actor = AuditActor::from_role(auth.user_id, &auth.role);
    let updated = app_state
        .refund_repository
        .set_receipt(refund.id, &upload.secure_url, actor, client_ip(&headers).as_deref())
        .await?;

    tracing::info!(
        "Receipt uploaded for refund {} by user {} ({} bytes)",
        refund.id,
        auth.user_id,
        upload.bytes
    );

    Ok(Json(json!({
        "success": true,
        "data": {
            "refund_id": updated.id,
            "receipt_path": updated.receipt_path
        }
    })))
}

/// Verifikasi receipt manual refund (gate kedua sebelum completion)
#[utoipa::path(
    post,
    path = "/api/refunds/{refund_id}/receipt/verify",
    tag = "Payment Service",
    summary = "Verify refund receipt",
    params(
        ("refund_id" = i32, Path, description = "Refund ID")
    ),
    responses(
        (status = 200, description = "Receipt verified", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Insufficient role"),
        (status = 404, description = "Refund not found"),
        (status = 409, description = "No receipt to verify"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn verify_refund_receipt(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Path(refund_id): Path<i32>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_back_office(&auth)?;

    let actor = AuditActor::from_role(auth.user_id, &auth.role);
    let refund = app_state
        .refund_repository
        .verify_receipt(refund_id, actor, client_ip(&headers).as_deref())
        .await?;

    tracing::info!(
        "Receipt verified for refund {} by user {}",
        refund.id,
        auth.user_id
    );

    Ok(Json(json!({
        "success": true,
        "data": {
            "refund_id": refund.id,
            "receipt_verified": refund.receipt_verified,
            "receipt_verified_by": refund.receipt_verified_by
        }
    })))
}

/// Mulai proses refund: manual jadi processing, automatic dibuatkan
/// gateway refund
#[utoipa::path(
    post,
    path = "/api/refunds/{refund_id}/process",
    tag = "Payment Service",
    summary = "Process refund",
    params(
        ("refund_id" = i32, Path, description = "Refund ID")
    ),
    responses(
        (status = 200, description = "Refund moved to processing", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Insufficient role"),
        (status = 404, description = "Refund not found"),
        (status = 409, description = "Refund not pending"),
        (status = 502, description = "Gateway error"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn process_refund(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Path(refund_id): Path<i32>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_back_office(&auth)?;

    let refund = app_state
        .refund_repository
        .find_by_id(refund_id)
        .await?
        .ok_or_else(|| AppError::not_found("Refund not found"))?;

    if refund.status != RefundStatus::Pending {
        return Err(AppError::conflict(format!(
            "Refund cannot be processed from status '{}'",
            refund.status
        )));
    }

    let actor = AuditActor::from_role(auth.user_id, &auth.role);
    let ip = client_ip(&headers);

    let details = match refund.refund_type {
        RefundType::Manual => "Manual refund moved to processing".to_string(),
        RefundType::Automatic => {
            // Gateway call dulu; kalau gagal, refund tetap pending dan caller
            // yang memutuskan retry (engine tidak auto-retry mutating call)
            let payment_id = refund.transaction_id.clone().ok_or_else(|| {
                AppError::conflict(
                    "Automatic refund has no provider payment id; reclassify as manual",
                )
            })?;

            let gateway_refund = app_state
                .paymongo
                .create_refund(
                    &payment_id,
                    &refund.amount,
                    refund.reason.gateway_code(),
                    refund.notes.clone(),
                )
                .await
                .map_err(|e| {
                    tracing::error!("Gateway refund creation failed for refund {}: {}", refund.id, e);
                    e
                })?;

            app_state
                .refund_repository
                .set_gateway_refund_id(refund.id, &gateway_refund.id)
                .await?;

            format!("Gateway refund {} created", gateway_refund.id)
        }
    };

    let updated = app_state
        .refund_repository
        .transition_status(
            refund.id,
            RefundStatus::Processing,
            actor,
            Some(details),
            ip.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "refund_id": updated.id,
            "status": updated.status,
            "gateway_refund_id": updated.gateway_refund_id
        }
    })))
}

/// Complete refund. Manual refund ditolak selama receipt belum diverifikasi.
#[utoipa::path(
    post,
    path = "/api/refunds/{refund_id}/complete",
    tag = "Payment Service",
    summary = "Complete refund",
    params(
        ("refund_id" = i32, Path, description = "Refund ID")
    ),
    responses(
        (status = 200, description = "Refund completed", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Insufficient role"),
        (status = 404, description = "Refund not found"),
        (status = 409, description = "Refund not completable (state or unverified receipt)"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn complete_refund(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Path(refund_id): Path<i32>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_back_office(&auth)?;

    let actor = AuditActor::from_role(auth.user_id, &auth.role);
    let refund = app_state
        .refund_repository
        .transition_status(
            refund_id,
            RefundStatus::Completed,
            actor,
            Some("Refund completed by staff".to_string()),
            client_ip(&headers).as_deref(),
        )
        .await?;

    sync_booking_refund_status(&app_state, refund.booking_id).await?;

    tracing::info!(
        "Refund {} completed by user {} ({} {})",
        refund.id,
        auth.user_id,
        refund.amount,
        refund.payment_method
    );

    app_state
        .notifier
        .notify_detached(refund.booking_id, PaymentEventKind::RefundCompleted);

    Ok(Json(json!({
        "success": true,
        "data": {
            "refund_id": refund.id,
            "status": refund.status,
            "completed_at": refund.completed_at
        }
    })))
}

// Request cancel refund
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CancelRefundRequest {
    pub reason: Option<String>,
}

/// Cancel refund yang belum selesai
#[utoipa::path(
    post,
    path = "/api/refunds/{refund_id}/cancel",
    tag = "Payment Service",
    summary = "Cancel refund",
    params(
        ("refund_id" = i32, Path, description = "Refund ID")
    ),
    request_body = CancelRefundRequest,
    responses(
        (status = 200, description = "Refund cancelled", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Refund not found"),
        (status = 409, description = "Refund not cancellable"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn cancel_refund(
    auth: AuthUser,
    State(app_state): State<crate::config::AppState>,
    Path(refund_id): Path<i32>,
    headers: HeaderMap,
    Json(request): Json<CancelRefundRequest>,
) -> Result<Json<Value>, AppError> {
    let refund = app_state
        .refund_repository
        .find_by_id(refund_id)
        .await?
        .ok_or_else(|| AppError::not_found("Refund not found"))?;

    if refund.user_id != auth.user_id && !auth.is_back_office() {
        return Err(AppError::forbidden("Access denied: not your refund"));
    }

    // Customer hanya boleh cancel selama masih pending; setelah diproses
    // staff yang memutuskan
    if !auth.is_back_office() && refund.status != RefundStatus::Pending {
        return Err(AppError::conflict(
            "Refund is already being processed and can only be cancelled by staff",
        ));
    }

    let details = request
        .reason
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(sanitize_html)
        .unwrap_or_else(|| "Refund cancelled".to_string());

    let actor = AuditActor::from_role(auth.user_id, &auth.role);
    let updated = app_state
        .refund_repository
        .transition_status(
            refund.id,
            RefundStatus::Cancelled,
            actor,
            Some(details),
            client_ip(&headers).as_deref(),
        )
        .await?;

    app_state
        .notifier
        .notify_detached(updated.booking_id, PaymentEventKind::RefundCancelled);

    Ok(Json(json!({
        "success": true,
        "data": {
            "refund_id": updated.id,
            "status": updated.status
        }
    })))
}

// Hitung eligibility refund untuk booking + transaction settled-nya
pub(crate) async fn compute_eligibility(
    app_state: &crate::config::AppState,
    booking: &Booking,
) -> Result<(RefundEligibility, Option<PaymentTransaction>), AppError> {
    let settled = app_state
        .transaction_repository
        .find_succeeded_for_booking(booking.id)
        .await?;

    if settled.is_none() {
        return Ok((RefundEligibility::ineligible("no_settled_payment"), None));
    }

    if !booking.status.allows_refund() {
        return Ok((
            RefundEligibility::ineligible("booking_not_refundable"),
            settled,
        ));
    }

    let paid_amount = app_state.transaction_repository.paid_total(booking.id).await?;
    let refunded_amount = app_state
        .refund_repository
        .refunded_total(booking.id)
        .await?;
    let refundable_amount = &paid_amount - &refunded_amount;

    if refundable_amount <= BigDecimal::from(0) {
        return Ok((
            RefundEligibility {
                eligible: false,
                reason_code: Some("already_fully_refunded".to_string()),
                paid_amount,
                refunded_amount,
                refundable_amount: BigDecimal::from(0),
            },
            settled,
        ));
    }

    Ok((
        RefundEligibility {
            eligible: true,
            reason_code: None,
            paid_amount,
            refunded_amount,
            refundable_amount,
        },
        settled,
    ))
}

/// Booking payment_status jadi refunded kalau seluruh paid amount sudah
/// dikembalikan
pub(crate) async fn sync_booking_refund_status(
    app_state: &crate::config::AppState,
    booking_id: i32,
) -> Result<(), AppError> {
    let paid_total = app_state.transaction_repository.paid_total(booking_id).await?;
    let completed_total = app_state
        .refund_repository
        .completed_total(booking_id)
        .await?;

    if paid_total > BigDecimal::from(0) && completed_total >= paid_total {
        app_state
            .booking_repository
            .set_payment_status(booking_id, BookingPaymentStatus::Refunded)
            .await?;
        tracing::info!("Booking {} marked refunded (fully refunded)", booking_id);
    }

    Ok(())
}

// Validasi MIME type dan size receipt
fn validate_receipt_file(content_type: &str, size: usize) -> Result<(), AppError> {
    if !ALLOWED_RECEIPT_TYPES.contains(&content_type) {
        return Err(AppError::receipt(format!(
            "Receipt file type not allowed: {}. Allowed: jpeg, png, pdf",
            content_type
        )));
    }

    if size == 0 {
        return Err(AppError::receipt("Receipt file is empty"));
    }

    if size > MAX_RECEIPT_SIZE {
        return Err(AppError::receipt(format!(
            "Receipt file too large. Maximum {}MB",
            MAX_RECEIPT_SIZE / (1024 * 1024)
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_type_validation() {
        assert!(validate_receipt_file("image/jpeg", 1024).is_ok());
        assert!(validate_receipt_file("image/png", 1024).is_ok());
        assert!(validate_receipt_file("application/pdf", 1024).is_ok());
        assert!(validate_receipt_file("image/gif", 1024).is_err());
        assert!(validate_receipt_file("text/html", 1024).is_err());
        assert!(validate_receipt_file("application/octet-stream", 1024).is_err());
    }

    #[test]
    fn test_receipt_size_validation() {
        assert!(validate_receipt_file("image/png", MAX_RECEIPT_SIZE).is_ok());
        assert!(validate_receipt_file("image/png", MAX_RECEIPT_SIZE + 1).is_err());
        assert!(validate_receipt_file("image/png", 0).is_err());
    }
}
