use regex::Regex;

// Validate format email
pub fn is_valid_email(email: &str) -> bool {
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"
    ).unwrap();

    email_regex.is_match(email)
}

// Validate nomor HP Filipina (format: 09xxx atau +639xxx)
pub fn is_valid_phone(phone: &str) -> bool {
    let phone_regex = Regex::new(r"^(\+63|63|0)9[0-9]{9}$").unwrap();
    phone_regex.is_match(phone)
}

// Validate currency code (ISO-4217, 3 huruf uppercase)
pub fn is_valid_currency(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

// Validate free-text note (non-empty setelah trim, max 1000 chars)
pub fn is_valid_note(note: &str) -> bool {
    let trimmed = note.trim();
    !trimmed.is_empty() && trimmed.len() <= 1000
}

// Validate rating (1-5)
pub fn is_valid_rating(rating: i32) -> bool {
    (1..=5).contains(&rating)
}

// Sanitize string untuk prevent XSS
pub fn sanitize_html(input: &str) -> String {
    input
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name+tag@example.com.ph"));
        assert!(!is_valid_email("invalid.email"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn test_phone_validation() {
        assert!(is_valid_phone("09171234567"));
        assert!(is_valid_phone("+639171234567"));
        assert!(is_valid_phone("639171234567"));
        assert!(!is_valid_phone("0812345678"));
        assert!(!is_valid_phone("12345"));
    }

    #[test]
    fn test_currency_validation() {
        assert!(is_valid_currency("PHP"));
        assert!(is_valid_currency("USD"));
        assert!(!is_valid_currency("php"));
        assert!(!is_valid_currency("PESO"));
        assert!(!is_valid_currency(""));
    }

    #[test]
    fn test_note_validation() {
        assert!(is_valid_note("Customer requested cancellation"));
        assert!(!is_valid_note("   "));
        assert!(!is_valid_note(&"x".repeat(1001)));
    }

    #[test]
    fn test_rating_validation() {
        assert!(is_valid_rating(1));
        assert!(is_valid_rating(5));
        assert!(!is_valid_rating(0));
        assert!(!is_valid_rating(6));
    }

    #[test]
    fn test_sanitize_html() {
        assert_eq!(
            sanitize_html("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"
        );
    }
}
