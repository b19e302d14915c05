use serde::{Deserialize, Serialize};

/// Model JWT claims yang digunakan di seluruh sistem untuk authentication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub sub: i32,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
    pub jti: String,
}

impl TokenClaims {
    /// Cek apakah token adalah access token
    pub fn is_access_token(&self) -> bool {
        self.token_type == "access"
    }

    /// Cek apakah token adalah refresh token
    pub fn is_refresh_token(&self) -> bool {
        self.token_type == "refresh"
    }

    /// Cek apakah user memiliki role provider
    pub fn is_provider(&self) -> bool {
        self.role == "provider"
    }

    /// Cek apakah user memiliki role customer
    pub fn is_customer(&self) -> bool {
        self.role == "customer"
    }

    /// Staff dan admin boleh mengelola refund dan reconciliation
    pub fn is_back_office(&self) -> bool {
        self.role == "staff" || self.role == "admin"
    }

    /// Cek apakah token sudah expired berdasarkan current time
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp <= now
    }

    /// Get remaining validity duration dalam detik
    pub fn remaining_validity(&self) -> i64 {
        let now = chrono::Utc::now().timestamp();
        (self.exp - now).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_claims() -> TokenClaims {
        let now = chrono::Utc::now().timestamp();
        TokenClaims {
            sub: 123,
            email: "test@example.com".to_string(),
            role: "customer".to_string(),
            exp: now + 900,
            iat: now,
            token_type: "access".to_string(),
            jti: "unique-jti-123".to_string(),
        }
    }

    #[test]
    fn test_is_access_token() {
        let claims = create_test_claims();
        assert!(claims.is_access_token());
        assert!(!claims.is_refresh_token());
    }

    #[test]
    fn test_is_provider() {
        let mut claims = create_test_claims();
        claims.role = "provider".to_string();
        assert!(claims.is_provider());
        assert!(!claims.is_customer());
    }

    #[test]
    fn test_is_back_office() {
        let mut claims = create_test_claims();
        assert!(!claims.is_back_office());
        claims.role = "staff".to_string();
        assert!(claims.is_back_office());
        claims.role = "admin".to_string();
        assert!(claims.is_back_office());
    }

    #[test]
    fn test_is_expired() {
        let mut claims = create_test_claims();
        assert!(!claims.is_expired());
        claims.exp = chrono::Utc::now().timestamp() - 10;
        assert!(claims.is_expired());
        assert_eq!(claims.remaining_validity(), 0);
    }
}
