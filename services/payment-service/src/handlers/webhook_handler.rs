use crate::domain::refund::{AuditActor, RefundStatus};
use crate::domain::split::compute_split;
use crate::domain::transaction::{ApplyOutcome, PaymentTransaction, TransactionStatus};
use crate::domain::webhook::{parse_envelope, WebhookEnvelope, WebhookEventKind, WebhookResponse};
use crate::error::AppError;
use crate::handlers::paymongo_service::SignatureCheck;
use crate::utils::notifier::PaymentEventKind;
use axum::{extract::State, http::HeaderMap, response::Json};
use utoipa;

/// Handle PayMongo webhook notifications.
///
/// Kontrak dengan gateway:
/// - 401 kalau signature validation gagal
/// - 400 kalau body tidak parseable / envelope tidak sesuai
/// - 200 untuk event yang diterima ATAU di-ignore; error di dalam handler
///   per-event di-log sebagai operational alert tapi tetap dibalas 200,
///   supaya bug lokal tidak memicu retry storm dari gateway
#[utoipa::path(
    post,
    path = "/api/webhooks/paymongo",
    tag = "Payment Service",
    summary = "Handle PayMongo webhook",
    description = "Process payment status updates from PayMongo via webhook",
    responses(
        (status = 200, description = "Webhook accepted or ignored", body = WebhookResponse),
        (status = 400, description = "Malformed event payload"),
        (status = 401, description = "Signature validation failed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn paymongo_webhook(
    State(app_state): State<crate::config::AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, AppError> {
    // Verify signature atas raw body sebelum parsing apapun
    let signature = headers
        .get("paymongo-signature")
        .and_then(|h| h.to_str().ok());

    if app_state.paymongo.verify_webhook_signature(&body, signature)? == SignatureCheck::Skipped {
        tracing::warn!("Processing webhook WITHOUT signature validation");
    }

    // Parse envelope; bentuk yang salah ditolak di boundary
    let envelope = parse_envelope(&body)?;
    let event_type = envelope.data.attributes.event_type.clone();
    let event_id = envelope
        .data
        .id
        .clone()
        .unwrap_or_else(|| "unknown".to_string());

    tracing::info!("Webhook received: {} ({})", event_type, event_id);

    // Dispatch statis per event kind; unknown di-ack supaya gateway tidak retry
    let result = match envelope.event_kind() {
        WebhookEventKind::SourceChargeable => {
            handle_source_chargeable(&app_state, &envelope).await
        }
        WebhookEventKind::PaymentPaid => handle_payment_paid(&app_state, &envelope).await,
        WebhookEventKind::PaymentFailed => handle_payment_failed(&app_state, &envelope).await,
        WebhookEventKind::PaymentRefunded => handle_payment_refunded(&app_state, &envelope).await,
        WebhookEventKind::Unknown => {
            tracing::warn!(
                "Ignoring unrecognized webhook event type: {} ({})",
                event_type,
                event_id
            );
            Ok(())
        }
    };

    // Failure isolation: event finansial yang gagal diproses adalah
    // operational alert, bukan alasan menyuruh gateway retry
    if let Err(e) = result {
        tracing::error!(
            "🚨 Webhook handler error for {} ({}): {}",
            event_type,
            event_id,
            e
        );
    }

    Ok(Json(WebhookResponse {
        success: true,
        message: "Webhook accepted".to_string(),
        event_type,
    }))
}

// source.chargeable: source e-wallet sudah bisa di-charge, transaction
// dianggap settled lewat source id
async fn handle_source_chargeable(
    app_state: &crate::config::AppState,
    envelope: &WebhookEnvelope,
) -> Result<(), AppError> {
    let outcome = apply_first_match(
        app_state,
        &envelope.lookup_candidates(),
        TransactionStatus::Succeeded,
        None,
        None,
    )
    .await?;

    handle_settlement_outcome(app_state, outcome, "source.chargeable").await
}

// payment.paid: resolve lewat payment_intent_id ATAU source id, mark succeeded
async fn handle_payment_paid(
    app_state: &crate::config::AppState,
    envelope: &WebhookEnvelope,
) -> Result<(), AppError> {
    let provider_payment_id = envelope.data.attributes.data.id.clone();

    let outcome = apply_first_match(
        app_state,
        &envelope.lookup_candidates(),
        TransactionStatus::Succeeded,
        Some(&provider_payment_id),
        None,
    )
    .await?;

    handle_settlement_outcome(app_state, outcome, "payment.paid").await
}

// payment.failed: mark failed dengan pesan dari gateway
async fn handle_payment_failed(
    app_state: &crate::config::AppState,
    envelope: &WebhookEnvelope,
) -> Result<(), AppError> {
    let resource = &envelope.data.attributes.data;
    let failure_reason = resource
        .attributes
        .failed_message
        .clone()
        .unwrap_or_else(|| "Payment failed at the gateway".to_string());

    let outcome = apply_first_match(
        app_state,
        &envelope.lookup_candidates(),
        TransactionStatus::Failed,
        None,
        Some(&failure_reason),
    )
    .await?;

    match outcome {
        ApplyOutcome::Applied(transaction) => {
            tracing::info!(
                "Transaction {} marked failed for booking {}: {}",
                transaction.id,
                transaction.booking_id,
                failure_reason
            );
            app_state
                .notifier
                .notify_detached(transaction.booking_id, PaymentEventKind::PaymentFailed);
            Ok(())
        }
        ApplyOutcome::AlreadyTerminal => {
            tracing::debug!("Duplicate payment.failed event dropped (already terminal)");
            Ok(())
        }
        ApplyOutcome::NotTracked => {
            log_untracked("payment.failed", envelope);
            Ok(())
        }
    }
}

// payment.refunded: gateway refund settled, advance refund record sebagai system
async fn handle_payment_refunded(
    app_state: &crate::config::AppState,
    envelope: &WebhookEnvelope,
) -> Result<(), AppError> {
    let resource = &envelope.data.attributes.data;
    let gateway_refund_id = resource.id.clone();

    // Duplicate delivery: refund dengan gateway id ini sudah selesai
    if let Some(existing) = app_state
        .refund_repository
        .find_by_gateway_refund_id(&gateway_refund_id)
        .await?
    {
        if existing.status.is_terminal() {
            tracing::debug!(
                "Duplicate payment.refunded event dropped (refund {} already {})",
                existing.id,
                existing.status
            );
            return Ok(());
        }
    }

    let Some(payment_id) = resource.attributes.payment_id.as_deref() else {
        tracing::warn!(
            "payment.refunded event {} has no payment_id, dropped",
            gateway_refund_id
        );
        return Ok(());
    };

    let Some(transaction) = app_state
        .transaction_repository
        .find_by_provider_transaction_id(payment_id)
        .await?
    else {
        tracing::warn!(
            "payment.refunded event for untracked payment {}, dropped",
            payment_id
        );
        return Ok(());
    };

    let Some(refund) = app_state
        .refund_repository
        .find_active_automatic_for_booking(transaction.booking_id)
        .await?
    else {
        tracing::warn!(
            "No active automatic refund found for booking {} (payment {}), dropped",
            transaction.booking_id,
            payment_id
        );
        return Ok(());
    };

    app_state
        .refund_repository
        .set_gateway_refund_id(refund.id, &gateway_refund_id)
        .await?;

    // pending -> processing -> completed; setiap step menulis audit row
    if refund.status == RefundStatus::Pending {
        app_state
            .refund_repository
            .transition_status(
                refund.id,
                RefundStatus::Processing,
                AuditActor::system(),
                Some("Gateway refund in flight".to_string()),
                None,
            )
            .await?;
    }

    app_state
        .refund_repository
        .transition_status(
            refund.id,
            RefundStatus::Completed,
            AuditActor::system(),
            Some(format!("Gateway refund {} settled", gateway_refund_id)),
            None,
        )
        .await?;

    crate::handlers::refund_handler::sync_booking_refund_status(app_state, transaction.booking_id)
        .await?;

    tracing::info!(
        "Refund {} completed via gateway webhook for booking {}",
        refund.id,
        transaction.booking_id
    );

    app_state
        .notifier
        .notify_detached(transaction.booking_id, PaymentEventKind::RefundCompleted);

    Ok(())
}

// Coba apply status ke kandidat identifier satu per satu.
// Kandidat yang tidak dikenal dilewati; hasil pertama yang match menang.
async fn apply_first_match(
    app_state: &crate::config::AppState,
    candidates: &[&str],
    new_status: TransactionStatus,
    provider_transaction_id: Option<&str>,
    failure_reason: Option<&str>,
) -> Result<ApplyOutcome, AppError> {
    for candidate in candidates {
        let outcome = app_state
            .transaction_repository
            .apply_status(candidate, new_status, provider_transaction_id, failure_reason)
            .await?;

        if !matches!(outcome, ApplyOutcome::NotTracked) {
            return Ok(outcome);
        }
    }

    Ok(ApplyOutcome::NotTracked)
}

// Shared path untuk settlement (source.chargeable dan payment.paid):
// split dicatat dan notifikasi payment-confirmed dikirim sekali saja,
// yaitu saat transisi benar-benar ter-apply
async fn handle_settlement_outcome(
    app_state: &crate::config::AppState,
    outcome: ApplyOutcome,
    event_label: &str,
) -> Result<(), AppError> {
    match outcome {
        ApplyOutcome::Applied(transaction) => {
            tracing::info!(
                "Transaction {} settled for booking {} via {}",
                transaction.id,
                transaction.booking_id,
                event_label
            );

            record_split(app_state, &transaction).await?;

            app_state
                .notifier
                .notify_detached(transaction.booking_id, PaymentEventKind::PaymentConfirmed);
            Ok(())
        }
        ApplyOutcome::AlreadyTerminal => {
            tracing::debug!("Duplicate {} event dropped (already terminal)", event_label);
            Ok(())
        }
        ApplyOutcome::NotTracked => {
            tracing::warn!("{} event references an untracked payment, dropped", event_label);
            Ok(())
        }
    }
}

// Catat commission split untuk payment yang settled
pub(crate) async fn record_split(
    app_state: &crate::config::AppState,
    transaction: &PaymentTransaction,
) -> Result<(), AppError> {
    let Some(booking) = app_state
        .booking_repository
        .get_booking(transaction.booking_id)
        .await?
    else {
        tracing::warn!(
            "Settled transaction {} references missing booking {}, split skipped",
            transaction.id,
            transaction.booking_id
        );
        return Ok(());
    };

    let split = compute_split(&transaction.amount, &booking.commission_rate)?;
    let status = app_state.config.split_payment_mode.initial_status();

    if let Some(record) = app_state
        .split_repository
        .create_split(booking.id, transaction.id, &split, &transaction.amount, status)
        .await?
    {
        tracing::info!(
            "Split recorded for booking {}: platform fee {}, provider {} ({})",
            booking.id,
            record.platform_fee_amount,
            record.provider_amount,
            record.split_status.as_str()
        );
    }

    Ok(())
}

fn log_untracked(event_label: &str, envelope: &WebhookEnvelope) {
    tracing::warn!(
        "{} event references an untracked payment (candidates: {:?}), dropped",
        event_label,
        envelope.lookup_candidates()
    );
}
