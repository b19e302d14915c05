use crate::error::AppError;
use bigdecimal::rounding::RoundingMode;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Breakdown settlement per payment: komisi platform + payout provider
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct SplitPaymentTransaction {
    pub id: i32,
    pub booking_id: i32,
    pub main_payment_id: i32,

    #[schema(value_type = f64)]
    pub platform_fee_amount: BigDecimal,
    #[schema(value_type = f64)]
    pub provider_amount: BigDecimal,
    #[schema(value_type = f64)]
    pub total_amount: BigDecimal,

    pub split_status: SplitStatus,
    pub created_at: DateTime<Utc>,
}

// Status split settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SplitStatus {
    /// Multiparty settlement belum diaktifkan gateway; split dicatat saja
    Simulated,
    Pending,
    Settled,
}

impl SplitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitStatus::Simulated => "simulated",
            SplitStatus::Pending => "pending",
            SplitStatus::Settled => "settled",
        }
    }
}

// Mode split dari konfigurasi, diteruskan eksplisit saat pembuatan record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    Simulated,
    Live,
}

impl SplitMode {
    pub fn from_env_value(value: &str) -> Self {
        match value {
            "live" => SplitMode::Live,
            _ => SplitMode::Simulated,
        }
    }

    pub fn initial_status(&self) -> SplitStatus {
        match self {
            SplitMode::Simulated => SplitStatus::Simulated,
            SplitMode::Live => SplitStatus::Pending,
        }
    }
}

// Hasil perhitungan split
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSplit {
    pub platform_fee_amount: BigDecimal,
    pub provider_amount: BigDecimal,
}

/// Hitung komisi platform dan payout provider dari total booking.
/// Fee dibulatkan ke 2 desimal; provider amount dihitung dengan pengurangan
/// supaya fee + provider == total selalu exact.
pub fn compute_split(
    total_amount: &BigDecimal,
    commission_rate_percent: &BigDecimal,
) -> Result<PaymentSplit, AppError> {
    if total_amount <= &BigDecimal::from(0) {
        return Err(AppError::validation("Total amount must be greater than 0"));
    }
    if commission_rate_percent < &BigDecimal::from(0)
        || commission_rate_percent > &BigDecimal::from(100)
    {
        return Err(AppError::validation(
            "Commission rate must be between 0 and 100",
        ));
    }

    let platform_fee_amount = ((total_amount * commission_rate_percent)
        / BigDecimal::from(100))
    .with_scale_round(2, RoundingMode::HalfUp);
    let provider_amount = total_amount - &platform_fee_amount;

    Ok(PaymentSplit {
        platform_fee_amount,
        provider_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_split_booking_scenario() {
        // Booking 1000.00 PHP, komisi 15%
        let split = compute_split(&dec("1000.00"), &dec("15")).unwrap();
        assert_eq!(split.platform_fee_amount, dec("150.00"));
        assert_eq!(split.provider_amount, dec("850.00"));
    }

    #[test]
    fn test_split_sum_invariant() {
        let samples = [
            ("1000.00", "15"),
            ("999.99", "33.33"),
            ("0.01", "50"),
            ("1234.56", "7.5"),
            ("88888.88", "12.34"),
            ("500.00", "0"),
            ("500.00", "100"),
        ];

        for (total, rate) in samples {
            let total = dec(total);
            let split = compute_split(&total, &dec(rate)).unwrap();
            assert_eq!(
                &split.platform_fee_amount + &split.provider_amount,
                total,
                "sum invariant broken for rate {}",
                rate
            );
        }
    }

    #[test]
    fn test_split_rate_bounds() {
        assert!(compute_split(&dec("100.00"), &dec("-1")).is_err());
        assert!(compute_split(&dec("100.00"), &dec("100.01")).is_err());
        assert!(compute_split(&dec("0"), &dec("10")).is_err());
        assert!(compute_split(&dec("-5"), &dec("10")).is_err());
    }

    #[test]
    fn test_split_rounding_half_up() {
        // 10.01 * 2.5% = 0.25025 -> fee 0.25
        let split = compute_split(&dec("10.01"), &dec("2.5")).unwrap();
        assert_eq!(split.platform_fee_amount, dec("0.25"));
        assert_eq!(split.provider_amount, dec("9.76"));
    }

    #[test]
    fn test_split_mode() {
        assert_eq!(SplitMode::from_env_value("live"), SplitMode::Live);
        assert_eq!(SplitMode::from_env_value("simulated"), SplitMode::Simulated);
        assert_eq!(SplitMode::from_env_value("anything"), SplitMode::Simulated);
        assert_eq!(SplitMode::Simulated.initial_status(), SplitStatus::Simulated);
        assert_eq!(SplitMode::Live.initial_status(), SplitStatus::Pending);
    }
}
