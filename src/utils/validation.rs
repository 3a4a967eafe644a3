use crate::utils::error::{HspError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(HspError::validation(format!(
            "{}: URL cannot be empty",
            field_name
        )));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(HspError::validation(format!(
                "{}: unsupported URL scheme '{}' in '{}'",
                field_name, scheme, url_str
            ))),
        },
        Err(e) => Err(HspError::validation(format!(
            "{}: invalid URL format '{}': {}",
            field_name, url_str, e
        ))),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(HspError::validation(format!(
            "{}: value {} must be at least {}",
            field_name, value, min_value
        )));
    }
    Ok(())
}

/// 不回顯欄位值，密碼也會經過這裡
pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(HspError::validation(format!(
            "{} cannot be empty",
            field_name
        )));
    }
    Ok(())
}

pub fn validate_contains(field_name: &str, value: &str, needle: &str) -> Result<()> {
    if !value.contains(needle) {
        return Err(HspError::validation(format!(
            "{}: '{}' must contain '{}'",
            field_name, value, needle
        )));
    }
    Ok(())
}

/// 將同一步驟中發現的多個驗證錯誤合併成一個
pub fn join_violations<I>(checks: I) -> Result<()>
where
    I: IntoIterator<Item = Result<()>>,
{
    let mut messages = Vec::new();
    for check in checks {
        match check {
            Ok(()) => {}
            Err(HspError::ValidationError { messages: found }) => messages.extend(found),
            Err(other) => messages.push(other.to_string()),
        }
    }

    if messages.is_empty() {
        Ok(())
    } else {
        Err(HspError::ValidationError { messages })
    }
}
