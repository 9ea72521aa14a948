use chrono::{DateTime, Duration, Local};
use rand::Rng;

/// OTP 有效期（分钟）
pub const OTP_TTL_MINUTES: i64 = 10;

/// 生成 5 位数字 OTP
pub fn generate_otp() -> String {
    rand::rng().random_range(10000..100000u32).to_string()
}

/// 从当前时刻起算的 OTP 过期时间
pub fn otp_expiry() -> DateTime<Local> {
    Local::now() + Duration::minutes(OTP_TTL_MINUTES)
}

/// 提交值与存储值逐字符相等且未过期才算有效
pub fn otp_valid(
    stored: Option<&str>,
    expiry: Option<DateTime<Local>>,
    submitted: &str,
) -> bool {
    let (Some(stored), Some(expiry)) = (stored, expiry) else {
        return false;
    };
    stored == submitted && Local::now() <= expiry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_five_digits() {
        for _ in 0..32 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 5);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn expired_otp_rejected_even_on_exact_match() {
        let expired = Local::now() - Duration::minutes(1);
        assert!(!otp_valid(Some("12345"), Some(expired), "12345"));
    }

    #[test]
    fn mismatch_rejected_within_window() {
        let expiry = Local::now() + Duration::minutes(5);
        assert!(!otp_valid(Some("12345"), Some(expiry), "54321"));
        assert!(otp_valid(Some("12345"), Some(expiry), "12345"));
    }

    #[test]
    fn missing_columns_rejected() {
        assert!(!otp_valid(None, None, "12345"));
        assert!(!otp_valid(Some("12345"), None, "12345"));
    }
}
