// Payment Service Configuration
use crate::domain::split::SplitMode;
use crate::handlers::paymongo_service::PaymongoService;
use crate::middleware::rate_limit::RateLimiter;
use crate::repositories::booking_repo::BookingRepository;
use crate::repositories::refund_repo::RefundRepository;
use crate::repositories::split_repo::SplitRepository;
use crate::repositories::transaction_repo::TransactionRepository;
use crate::utils::notifier::NotificationClient;
use sqlx::{postgres::PgConnectOptions, postgres::PgPoolOptions, PgPool};
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Konfigurasi aplikasi dari environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub jwt_secret: String,
    pub paymongo_secret_key: String,
    pub paymongo_api_url: String,
    /// Kosong berarti signature validation dilewati; tidak boleh di production
    pub paymongo_webhook_secret: Option<String>,
    pub checkout_success_url: String,
    pub checkout_failed_url: String,
    /// Mode split payment, diteruskan eksplisit ke fee calculator
    pub split_payment_mode: SplitMode,
    pub currency: String,
    pub app_version: String,
}

impl AppConfig {
    // Load konfigurasi dari environment dengan validasi
    pub fn from_env() -> Result<Self, String> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL harus diset")?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| "JWT_SECRET harus diset")?;

        if !cfg!(debug_assertions) && jwt_secret.contains("change-this") {
            return Err("JWT_SECRET masih default! Ganti untuk production".to_string());
        }

        let server_host = env::var("PAYMENT_SERVICE_HOST")
            .map_err(|_| "PAYMENT_SERVICE_HOST harus diset")?;

        let server_port = env::var("PAYMENT_SERVICE_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or("PAYMENT_SERVICE_PORT harus diset dan berupa angka")?;

        let environment = env::var("RUST_ENV")
            .map_err(|_| "RUST_ENV harus diset")?;

        let paymongo_secret_key = env::var("PAYMONGO_SECRET_KEY")
            .map_err(|_| "PAYMONGO_SECRET_KEY harus diset")?;

        let paymongo_api_url = env::var("PAYMONGO_API_URL")
            .unwrap_or_else(|_| "https://api.paymongo.com/v1".to_string());

        let paymongo_webhook_secret = env::var("PAYMONGO_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        let checkout_success_url = env::var("CHECKOUT_SUCCESS_URL")
            .map_err(|_| "CHECKOUT_SUCCESS_URL harus diset")?;

        let checkout_failed_url = env::var("CHECKOUT_FAILED_URL")
            .map_err(|_| "CHECKOUT_FAILED_URL harus diset")?;

        let split_payment_mode = SplitMode::from_env_value(
            &env::var("SPLIT_PAYMENT_MODE").unwrap_or_else(|_| "simulated".to_string()),
        );

        let currency = env::var("PAYMENT_CURRENCY")
            .unwrap_or_else(|_| "PHP".to_string());

        if !shared::utils::validation::is_valid_currency(&currency) {
            return Err(format!("PAYMENT_CURRENCY tidak valid: {}", currency));
        }

        let app_version = env::var("APP_VERSION")
            .unwrap_or_else(|_| "1.0.0".to_string());

        let config = AppConfig {
            database_url,
            server_host,
            server_port,
            environment,
            jwt_secret,
            paymongo_secret_key,
            paymongo_api_url,
            paymongo_webhook_secret,
            checkout_success_url,
            checkout_failed_url,
            split_payment_mode,
            currency,
            app_version,
        };

        // Skip signature validation hanya boleh di non-production
        if config.is_production() && config.paymongo_webhook_secret.is_none() {
            return Err(
                "PAYMONGO_WEBHOOK_SECRET wajib diset di production environment".to_string()
            );
        }

        Ok(config)
    }

    // Helper cek production mode
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

// Inisialisasi database connection pool
pub async fn init_db_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    tracing::info!("🔌 Initializing Payment Service database connection...");

    // Parse connection options dan disable prepared statements
    let options = PgConnectOptions::from_str(database_url)?
        .statement_cache_capacity(0);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(3)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect_with(options)
        .await?;

    tracing::info!("✅ Payment Service database pool initialized");
    Ok(pool)
}

// Health check database connection
pub async fn check_db_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1")
        .fetch_optional(pool)
        .await
        .is_ok()
}

// Application state yang di-share ke semua handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: AppConfig,
    pub paymongo: PaymongoService,
    pub notifier: NotificationClient,
    pub transaction_repository: TransactionRepository,
    pub refund_repository: RefundRepository,
    pub split_repository: SplitRepository,
    pub booking_repository: BookingRepository,
    pub rate_limiter: RateLimiter,
}

impl axum::extract::FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl axum::extract::FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl axum::extract::FromRef<AppState> for RateLimiter {
    fn from_ref(state: &AppState) -> Self {
        state.rate_limiter.clone()
    }
}

impl AppState {
    // Inisialisasi application state
    pub async fn new(config: AppConfig) -> Result<Self, String> {
        let db = init_db_pool(&config.database_url)
            .await
            .map_err(|e| format!("Failed to init database: {}", e))?;

        let paymongo = PaymongoService::new(
            config.paymongo_secret_key.clone(),
            config.paymongo_api_url.clone(),
            config.paymongo_webhook_secret.clone(),
        )
        .map_err(|e| format!("Failed to init PayMongo client: {}", e))?;

        if !paymongo.has_webhook_secret() {
            tracing::warn!(
                "⚠️ Webhook signature validation is DISABLED (no PAYMONGO_WEBHOOK_SECRET)"
            );
        }

        let transaction_repository = TransactionRepository::new(db.clone());
        let refund_repository = RefundRepository::new(db.clone());
        let split_repository = SplitRepository::new(db.clone());
        let booking_repository = BookingRepository::new(db.clone());
        let notifier = NotificationClient::new();

        // Redis MANDATORY untuk rate limiting
        let redis_url = env::var("REDIS_URL")
            .map_err(|_| "REDIS_URL environment variable is REQUIRED for rate limiting")?;

        tracing::info!("🔄 Initializing Redis rate limiter...");
        let rate_limiter = RateLimiter::new(&redis_url)
            .map_err(|e| format!("Failed to initialize Redis rate limiter: {}", e))?;
        tracing::info!("✅ Redis rate limiter initialized");

        Ok(AppState {
            db,
            config,
            paymongo,
            notifier,
            transaction_repository,
            refund_repository,
            split_repository,
            booking_repository,
            rate_limiter,
        })
    }

    // Inisialisasi application state dari environment
    pub async fn from_env() -> Result<Self, String> {
        let config = AppConfig::from_env()?;
        Self::new(config).await
    }

    // Health check semua dependencies
    pub async fn health_check(&self) -> HealthStatus {
        let db_healthy = check_db_health(&self.db).await;

        HealthStatus {
            database: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
            overall: if db_healthy { "healthy" } else { "degraded" }.to_string(),
        }
    }
}

// Response untuk health check endpoint
#[derive(Debug, serde::Serialize)]
pub struct HealthStatus {
    pub database: String,
    pub overall: String,
}
