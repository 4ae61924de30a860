//! Input validation utilities
//!
//! - Intake form text (non-empty, length limits)
//! - Chilean RUT account identifiers (mod-11 checksum)
//! - Client identifiers (RUT or free-form name)
//! - Outbound endpoint URLs

use thiserror::Error;
use url::Url;

use crate::core::config::form;
use crate::core::models::TicketPatch;

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty or whitespace-only input
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Input longer than the allowed number of characters
    #[error("{field} is too long ({len} characters, at most {max})")]
    TooLong { field: &'static str, len: usize, max: usize },

    /// RUT with a wrong verifier digit or malformed body
    #[error("Invalid RUT: {0}")]
    InvalidRut(String),

    /// Name-like identifier shorter than 3 characters
    #[error("Name must have at least 3 characters")]
    NameTooShort,

    /// Malformed or non-HTTP URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Which form field a piece of free text is captured into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    Response,
    Comment,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Title => "title",
            FormField::Description => "description",
            FormField::Response => "response",
            FormField::Comment => "comment",
        }
    }

    fn max_chars(&self) -> usize {
        match self {
            FormField::Title => form::MAX_TITLE_CHARS,
            _ => form::MAX_DESCRIPTION_CHARS,
        }
    }
}

/// Validates free text submitted for a form field and returns it unchanged.
///
/// Blankness and length are judged on the trimmed text; the stored value is
/// exactly what the user sent.
///
/// # Examples
/// ```
/// use fincore::core::validation::{validate_form_text, FormField};
///
/// assert_eq!(validate_form_text(FormField::Title, "  Office supplies ").unwrap(), "  Office supplies ");
/// assert!(validate_form_text(FormField::Title, "   ").is_err());
/// ```
pub fn validate_form_text(field: FormField, text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field.as_str()));
    }

    let len = trimmed.chars().count();
    let max = field.max_chars();
    if len > max {
        return Err(ValidationError::TooLong {
            field: field.as_str(),
            len,
            max,
        });
    }

    Ok(text.to_string())
}

/// Applies [`validate_form_text`] to every text field a patch sets.
pub fn validate_ticket_patch(patch: &TicketPatch) -> Result<(), ValidationError> {
    let fields = [
        (FormField::Title, &patch.title),
        (FormField::Description, &patch.description),
        (FormField::Response, &patch.response),
    ];
    for (field, value) in fields {
        if let Some(text) = value {
            validate_form_text(field, text)?;
        }
    }
    Ok(())
}

/// Strips formatting from a RUT, keeping digits and the `k` verifier (lowercased).
pub fn clean_rut(rut: &str) -> String {
    rut.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'k' || *c == 'K')
        .collect::<String>()
        .to_lowercase()
}

/// Computes the verifier character for a numeric RUT body.
///
/// Digits are weighted right-to-left with 2, 3, 4, 5, 6, 7, 2, 3, ...;
/// the verifier is `11 - (sum mod 11)`, where 11 maps to `0` and 10 to `k`.
pub fn rut_verifier(body: &str) -> Option<char> {
    if body.is_empty() {
        return None;
    }

    let mut sum = 0u32;
    let mut multiplier = 2;
    for c in body.chars().rev() {
        sum += c.to_digit(10)? * multiplier;
        multiplier = if multiplier == 7 { 2 } else { multiplier + 1 };
    }

    match 11 - (sum % 11) {
        11 => Some('0'),
        10 => Some('k'),
        n => char::from_digit(n, 10),
    }
}

/// Validates a RUT such as `12.345.678-5` or `123456785`.
///
/// # Examples
/// ```
/// use fincore::core::validation::validate_rut;
///
/// assert!(validate_rut("12.345.678-5"));
/// assert!(!validate_rut("12.345.678-4"));
/// ```
pub fn validate_rut(rut: &str) -> bool {
    let cleaned = clean_rut(rut);
    if cleaned.len() < 2 {
        return false;
    }

    let (body, verifier) = cleaned.split_at(cleaned.len() - 1);
    match (rut_verifier(body), verifier.chars().next()) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    }
}

/// Formats a RUT with thousands separators: `123456785` → `12.345.678-5`.
///
/// Input too short to contain a body and verifier is returned unchanged.
pub fn format_rut(rut: &str) -> String {
    let cleaned = clean_rut(rut);
    if cleaned.len() < 2 {
        return rut.to_string();
    }

    let (body, verifier) = cleaned.split_at(cleaned.len() - 1);
    let mut grouped = String::with_capacity(body.len() + body.len() / 3);
    for (i, c) in body.chars().enumerate() {
        if i > 0 && (body.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    format!("{}-{}", grouped, verifier)
}

/// Whether the input only uses RUT characters (digits, dots, dash, `k`).
pub fn looks_like_rut(identifier: &str) -> bool {
    identifier
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | 'k' | 'K'))
}

/// Validates a client identifier: RUT-shaped input must pass the checksum,
/// anything else is treated as a name and needs at least 3 characters.
pub fn validate_client_identifier(identifier: &str) -> Result<(), ValidationError> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty("identifier"));
    }

    if looks_like_rut(trimmed) {
        if validate_rut(trimmed) {
            return Ok(());
        }
        return Err(ValidationError::InvalidRut(trimmed.to_string()));
    }

    if trimmed.chars().count() < 3 {
        return Err(ValidationError::NameTooShort);
    }

    Ok(())
}

/// Validates that an outbound endpoint is an absolute HTTP(S) URL.
pub fn validate_endpoint_url(raw: &str) -> Result<Url, ValidationError> {
    let parsed = Url::parse(raw).map_err(|_| ValidationError::InvalidUrl(raw.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ValidationError::InvalidUrl(format!("{} (invalid scheme: {})", raw, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_text_is_kept_verbatim() {
        assert_eq!(
            validate_form_text(FormField::Description, "\n Q4 licenses \t").unwrap(),
            "\n Q4 licenses \t"
        );
    }

    #[test]
    fn test_surrounding_whitespace_does_not_count_toward_limit() {
        let padded = format!("  {}  ", "a".repeat(form::MAX_TITLE_CHARS));
        assert_eq!(validate_form_text(FormField::Title, &padded).unwrap(), padded);
    }

    #[test]
    fn test_ticket_patch_checks_every_text_field() {
        let patch = TicketPatch {
            title: Some(" Taxi ".to_string()),
            priority: Some(crate::core::types::Priority::High),
            ..TicketPatch::default()
        };
        assert!(validate_ticket_patch(&patch).is_ok());

        let blank_description = TicketPatch {
            description: Some("  ".to_string()),
            ..TicketPatch::default()
        };
        assert_eq!(
            validate_ticket_patch(&blank_description),
            Err(ValidationError::Empty("description"))
        );

        let long_response = TicketPatch {
            response: Some("x".repeat(form::MAX_DESCRIPTION_CHARS + 1)),
            ..TicketPatch::default()
        };
        assert!(matches!(
            validate_ticket_patch(&long_response),
            Err(ValidationError::TooLong { field: "response", .. })
        ));
    }

    #[test]
    fn test_form_text_rejects_blank() {
        assert_eq!(
            validate_form_text(FormField::Title, " \n "),
            Err(ValidationError::Empty("title"))
        );
    }

    #[test]
    fn test_title_length_limit_counts_chars() {
        let at_limit = "ñ".repeat(form::MAX_TITLE_CHARS);
        assert!(validate_form_text(FormField::Title, &at_limit).is_ok());

        let over = "a".repeat(form::MAX_TITLE_CHARS + 1);
        assert!(matches!(
            validate_form_text(FormField::Title, &over),
            Err(ValidationError::TooLong { field: "title", .. })
        ));
    }

    #[test]
    fn test_rut_valid_numeric_verifier() {
        assert!(validate_rut("12.345.678-5"));
        assert!(validate_rut("123456785"));
        assert!(validate_rut("11.111.111-1"));
    }

    #[test]
    fn test_rut_k_verifier_when_remainder_is_one() {
        // 6 * 2 = 12, 12 mod 11 = 1, 11 - 1 = 10 -> k
        assert_eq!(rut_verifier("6"), Some('k'));
        assert!(validate_rut("6-k"));
        assert!(validate_rut("6-K"));
        assert!(!validate_rut("6-1"));
    }

    #[test]
    fn test_rut_zero_verifier() {
        // 0 mod 11 = 0, 11 - 0 = 11 -> 0
        assert_eq!(rut_verifier("0"), Some('0'));
    }

    #[test]
    fn test_rut_rejects_garbage() {
        assert!(!validate_rut("1"));
        assert!(!validate_rut(""));
        assert!(!validate_rut("1k2-3"));
    }

    #[test]
    fn test_format_rut() {
        assert_eq!(format_rut("123456785"), "12.345.678-5");
        assert_eq!(format_rut("12345678-5"), "12.345.678-5");
        assert_eq!(format_rut("6k"), "6-k");
        assert_eq!(format_rut("1"), "1");
    }

    #[test]
    fn test_client_identifier() {
        assert!(validate_client_identifier("12.345.678-5").is_ok());
        assert!(matches!(
            validate_client_identifier("12.345.678-0"),
            Err(ValidationError::InvalidRut(_))
        ));
        assert!(validate_client_identifier("Acme Ltda").is_ok());
        assert_eq!(validate_client_identifier("Ab"), Err(ValidationError::NameTooShort));
    }

    #[test]
    fn test_endpoint_url() {
        assert!(validate_endpoint_url("https://collector.example.com/api").is_ok());
        assert!(validate_endpoint_url("ftp://collector.example.com").is_err());
        assert!(validate_endpoint_url("not a url").is_err());
    }
}
