// Notification collaborator untuk payment events.
// Outbound notification bersifat fire-and-forget: kegagalan kirim di-log,
// tidak pernah membatalkan perubahan status finansial.

use crate::error::AppError;
use serde_json::json;
use shared::utils::http_client::ServiceClient;

// Event kinds yang dikirim ke notification-service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventKind {
    PaymentConfirmed,
    PaymentFailed,
    RefundInitiated,
    RefundCompleted,
    RefundCancelled,
}

impl PaymentEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEventKind::PaymentConfirmed => "payment_confirmed",
            PaymentEventKind::PaymentFailed => "payment_failed",
            PaymentEventKind::RefundInitiated => "refund_initiated",
            PaymentEventKind::RefundCompleted => "refund_completed",
            PaymentEventKind::RefundCancelled => "refund_cancelled",
        }
    }
}

impl std::fmt::Display for PaymentEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationClient;

impl NotificationClient {
    pub fn new() -> Self {
        Self
    }

    // Kirim satu payment event ke notification-service
    pub async fn notify(
        &self,
        booking_id: i32,
        kind: PaymentEventKind,
    ) -> Result<(), AppError> {
        let client = ServiceClient::new("notification")
            .map_err(|e| AppError::internal(format!("Notification client init failed: {}", e)))?;

        let payload = json!({
            "booking_id": booking_id,
            "event": kind.as_str(),
            "source": "payment-service",
        });

        let _response: serde_json::Value = client
            .post("/api/notifications/events", &payload, None)
            .await
            .map_err(|e| AppError::internal(format!("Notification delivery failed: {}", e)))?;

        Ok(())
    }

    /// Spawn pengiriman notifikasi tanpa menunggu hasil
    pub fn notify_detached(&self, booking_id: i32, kind: PaymentEventKind) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(booking_id, kind).await {
                tracing::warn!(
                    "Failed to deliver {} notification for booking {}: {}",
                    kind,
                    booking_id,
                    e
                );
            }
        });
    }
}
