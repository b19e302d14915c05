// API Routes untuk Payment Service dengan JWT-Only architecture

use crate::config::AppState;
use crate::handlers::{
    payment_handler, reconciliation_handler, refund_handler, webhook_handler,
};
use crate::middleware::{auth::jwt_auth_middleware, rate_limit::rate_limit_middleware};
use axum::{
    extract::Request,
    http::{header::HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// OpenAPI Documentation untuk Payment Service
#[derive(OpenApi)]
#[openapi(
    paths(
        payment_handler::create_payment,
        payment_handler::get_payment_details,
        payment_handler::get_booking_payments,
        payment_handler::sync_payment_status,
        payment_handler::list_gateway_payments,
        payment_handler::health_check,
        payment_handler::get_service_info,
        webhook_handler::paymongo_webhook,
        refund_handler::check_refund_eligibility,
        refund_handler::request_refund,
        refund_handler::get_refund,
        refund_handler::list_booking_refunds,
        refund_handler::upload_refund_receipt,
        refund_handler::verify_refund_receipt,
        refund_handler::process_refund,
        refund_handler::complete_refund,
        refund_handler::cancel_refund,
        reconciliation_handler::run_reconciliation,
    ),
    components(
        schemas(
            crate::domain::transaction::CreatePaymentRequest,
            crate::domain::transaction::PaymentTransaction,
            crate::domain::transaction::TransactionStatus,
            crate::domain::transaction::PaymentMethod,
            crate::domain::refund::CreateRefundRequest,
            crate::domain::refund::RefundRecord,
            crate::domain::refund::RefundStatus,
            crate::domain::refund::RefundType,
            crate::domain::refund::RefundReason,
            crate::domain::refund::PerformedByType,
            crate::domain::refund::RefundAuditLog,
            crate::domain::refund::RefundEligibility,
            crate::domain::split::SplitPaymentTransaction,
            crate::domain::split::SplitStatus,
            crate::domain::booking::Booking,
            crate::domain::booking::BookingStatus,
            crate::domain::booking::BookingPaymentStatus,
            crate::domain::webhook::WebhookResponse,
            crate::handlers::refund_handler::CancelRefundRequest,
            crate::handlers::reconciliation_handler::ReconciliationRequest,
            crate::handlers::reconciliation_handler::ReconciliationAction,
            crate::handlers::reconciliation_handler::ReconciliationConflict,
        )
    ),
    tags(
        (name = "Payment Service", description = "Payment, refund, and reconciliation engine for the Serbisyo marketplace")
    ),
    info(
        title = "Payment Service API",
        description = "Payment transaction & refund reconciliation engine for the Serbisyo services marketplace with PayMongo integration\n\n## Features\n\n- 💳 PayMongo payment gateway integration (GCash, card, Maya, GrabPay, QR Ph)\n- 🔒 JWT-Only authentication\n- 🔁 Idempotent webhook processing\n- 💸 Automatic and manual refunds with append-only audit trail\n- 🧮 Platform commission split\n- 🩺 Booking payment status reconciliation",
        version = "1.0.0",
        contact(
            name = "Serbisyo Support",
            email = "support@serbisyo.ph"
        )
    ),
    servers(
        (url = "https://api.serbisyo.ph", description = "Production server")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub struct ApiDoc;

// Security scheme modifier untuk Bearer JWT authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build()
                ),
            )
        }
    }
}

// Security headers middleware
async fn security_headers_middleware(
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("Content-Security-Policy",
        "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; font-src 'self'; connect-src 'self'; frame-ancestors 'none';"
            .parse().unwrap());
    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());
    headers.insert("X-XSS-Protection", "1; mode=block".parse().unwrap());
    headers.insert("Referrer-Policy", "strict-origin-when-cross-origin".parse().unwrap());
    headers.insert("Permissions-Policy", "camera=(), microphone=(), geolocation=()".parse().unwrap());
    headers.insert("Strict-Transport-Security", "max-age=31536000; includeSubDomains".parse().unwrap());

    response
}

// Buat router dengan JWT-only security dan Redis rate limiting
pub async fn create_routes(state: AppState) -> Router {
    if state.config.is_production() {
        tracing::warn!("Payment Service running in PRODUCTION mode");
    } else {
        tracing::info!("Payment Service running in DEVELOPMENT mode");
    }

    // CORS configuration
    let frontend_url = std::env::var("FRONTEND_URL")
        .expect("FRONTEND_URL environment variable HARUS diisi di .env file");

    let allowed_origin = frontend_url.parse::<HeaderValue>()
        .expect("FRONTEND_URL harus valid URL format");

    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
            axum::http::header::CONTENT_TYPE,
        ])
        .allow_credentials(false)
        .max_age(Duration::from_secs(86400));

    // Setup OpenAPI documentation
    let mut openapi = ApiDoc::openapi();
    SecurityAddon.modify(&mut openapi);

    // Public routes - tanpa JWT authentication
    let public_routes = Router::new()
        .route("/health", get(payment_handler::health_check))
        .route("/info", get(payment_handler::get_service_info))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi))
        .with_state(state.clone());

    // Protected API routes - dengan JWT authentication
    // (webhook route ikut di sini; middleware skip path webhooks)
    let protected_routes = build_api_routes(state.clone())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_middleware,
        ));

    // Combine semua routes dengan shared middleware
    public_routes
        .nest("/api", protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(cors)
        )
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
}

// Build API routes dengan JWT authentication
fn build_api_routes(state: AppState) -> Router {
    Router::new()
        // ===== Payment Operations =====
        .route("/payments", post(payment_handler::create_payment))
        .route("/payments/gateway", get(payment_handler::list_gateway_payments))
        .route("/payments/{payment_id}", get(payment_handler::get_payment_details))
        .route("/payments/{payment_id}/sync", post(payment_handler::sync_payment_status))
        .route("/payments/booking/{booking_id}", get(payment_handler::get_booking_payments))

        // ===== Refund Operations =====
        .route("/bookings/{booking_id}/refund-eligibility", get(refund_handler::check_refund_eligibility))
        .route("/refunds", post(refund_handler::request_refund))
        .route("/refunds/{refund_id}", get(refund_handler::get_refund))
        .route("/refunds/booking/{booking_id}", get(refund_handler::list_booking_refunds))
        .route("/refunds/{refund_id}/receipt", post(refund_handler::upload_refund_receipt))
        .route("/refunds/{refund_id}/receipt/verify", post(refund_handler::verify_refund_receipt))
        .route("/refunds/{refund_id}/process", post(refund_handler::process_refund))
        .route("/refunds/{refund_id}/complete", post(refund_handler::complete_refund))
        .route("/refunds/{refund_id}/cancel", post(refund_handler::cancel_refund))

        // ===== Reconciliation =====
        .route("/reconciliation", post(reconciliation_handler::run_reconciliation))

        // ===== Webhook (External - PayMongo) =====
        .route("/webhooks/paymongo", post(webhook_handler::paymongo_webhook))
        .with_state(state)
}
