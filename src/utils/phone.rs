use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

fn phone_regex() -> &'static Regex {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    PHONE_REGEX.get_or_init(|| Regex::new(r"^\+[1-9]\d{7,14}$").expect("valid phone regex"))
}

/// 验证国际手机号格式 (E.164: '+' 加 8 到 15 位数字)
pub fn validate_phone(phone: &str) -> AppResult<()> {
    if !phone_regex().is_match(phone) {
        return Err(AppError::ValidationError(
            "Invalid phone number, expected international format (+36xxxxxxxxx)".to_string(),
        ));
    }
    Ok(())
}

/// 去除空格、括号和横线；00 前缀转换为 +
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if trimmed.starts_with('+') {
        format!("+{digits}")
    } else if let Some(rest) = digits.strip_prefix("00") {
        format!("+{rest}")
    } else {
        trimmed.to_string()
    }
}
