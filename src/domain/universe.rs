//! Symbol list parsing for batch scans.
//!
//! Numeric exchange codes lose their leading zeros easily on the way in
//! (spreadsheets, shells), so all-digit codes up to six digits are padded
//! back to six. Longer all-digit codes are rejected.

use std::collections::HashSet;

pub const CODE_WIDTH: usize = 6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    #[error("invalid code '{code}': {reason}")]
    InvalidCode { code: String, reason: String },
}

/// Normalizes one code: all-digit codes are zero-padded to six digits,
/// anything else is kept as written.
pub fn normalize_code(token: &str) -> Result<String, UniverseError> {
    let code = token.trim();
    if code.is_empty() {
        return Err(UniverseError::EmptyToken);
    }

    if code.bytes().all(|b| b.is_ascii_digit()) {
        if code.len() > CODE_WIDTH {
            return Err(UniverseError::InvalidCode {
                code: code.to_string(),
                reason: format!("numeric codes have at most {CODE_WIDTH} digits"),
            });
        }
        return Ok(format!("{code:0>width$}", width = CODE_WIDTH));
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(UniverseError::InvalidCode {
            code: code.to_string(),
            reason: "only letters, digits, '.', '_' and '-' are allowed".to_string(),
        });
    }
    Ok(code.to_string())
}

/// Parses codes from one or more items, each of which may itself be a
/// comma-separated list. Order is kept; duplicates are an error.
pub fn parse_codes<S: AsRef<str>>(items: &[S]) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for item in items {
        for token in item.as_ref().split(',') {
            let code = normalize_code(token)?;
            if !seen.insert(code.clone()) {
                return Err(UniverseError::DuplicateCode(code));
            }
            codes.push(code);
        }
    }

    Ok(codes)
}
