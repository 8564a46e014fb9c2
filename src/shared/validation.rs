use crate::shared::error::AppError;

pub(crate) const DEFAULT_LIMIT: u32 = 50;
pub(crate) const MAX_LIMIT: u32 = 200;

/// `0x` + 40桁の16進数であることを検証し、小文字に正規化する
pub fn normalize_address(value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| AppError::invalid_input(format!("Address must start with 0x: {trimmed}")))?;

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::invalid_input(format!(
            "Address must be 20 bytes of hex: {trimmed}"
        )));
    }

    Ok(format!("0x{}", hex.to_ascii_lowercase()))
}

/// uint256 を10進文字列として検証する（wei 金額や token id）
pub fn normalize_uint(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::invalid_input(format!(
            "{field} must be a non-negative decimal integer"
        )));
    }
    let normalized = trimmed.trim_start_matches('0');
    if normalized.is_empty() {
        Ok("0".to_string())
    } else {
        Ok(normalized.to_string())
    }
}

pub fn clamp_limit(limit: Option<u32>) -> Result<u32, AppError> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(0) => Err(AppError::invalid_input("limit must be greater than 0")),
        Some(value) => Ok(value.min(MAX_LIMIT)),
    }
}

/// LIKE 検索用に `%` `_` `\` をエスケープする
pub fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_checksummed_address() {
        let addr = "0xAbCdEf0123456789aBcDeF0123456789ABCDEF01";
        assert_eq!(
            normalize_address(addr).unwrap(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn rejects_short_or_non_hex_address() {
        assert!(normalize_address("0x1234").is_err());
        assert!(normalize_address("abcdef0123456789abcdef0123456789abcdef01").is_err());
        assert!(normalize_address("0xzzcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn uint_strips_leading_zeros() {
        assert_eq!(normalize_uint("000123", "price").unwrap(), "123");
        assert_eq!(normalize_uint("0", "price").unwrap(), "0");
        assert!(normalize_uint("-1", "price").is_err());
        assert!(normalize_uint("1.5", "price").is_err());
    }

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(clamp_limit(None).unwrap(), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(10_000)).unwrap(), MAX_LIMIT);
        assert!(clamp_limit(Some(0)).is_err());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
