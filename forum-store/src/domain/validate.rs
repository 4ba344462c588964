use validator::ValidateEmail;

use super::error::DomainError;

pub(crate) fn normalize_required(
    field: &'static str,
    value: &str,
    max_len: usize,
    message: &'static str,
) -> Result<String, DomainError> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > max_len {
        return Err(DomainError::Validation { field, message });
    }
    Ok(value.to_string())
}

pub(crate) fn normalize_email(field: &'static str, email: &str) -> Result<String, DomainError> {
    let email = email.trim().to_lowercase();
    if !email.validate_email() {
        return Err(DomainError::Validation {
            field,
            message: "must be a valid email",
        });
    }
    Ok(email)
}

/// Authors may post anonymously; a blank email means "no known user".
pub(crate) fn normalize_optional_email(
    field: &'static str,
    email: Option<String>,
) -> Result<Option<String>, DomainError> {
    match email {
        Some(email) if !email.trim().is_empty() => normalize_email(field, &email).map(Some),
        _ => Ok(None),
    }
}

pub(crate) fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

pub(crate) fn same_email(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}

#[cfg(test)]
mod tests {
    use super::{normalize_email, normalize_optional_email, normalize_required, normalize_tags};

    #[test]
    fn normalize_email_trims_and_lowercases() {
        let value = normalize_email("email", "  TeSt@Example.COM ").expect("must be valid");
        assert_eq!(value, "test@example.com");
    }

    #[test]
    fn blank_optional_email_is_none() {
        assert_eq!(
            normalize_optional_email("author_email", Some("   ".into())).expect("blank is fine"),
            None
        );
        assert!(normalize_optional_email("author_email", Some("nope".into())).is_err());
    }

    #[test]
    fn required_rejects_blank_and_oversized() {
        assert!(normalize_required("title", "   ", 10, "must be 1..10 chars").is_err());
        assert!(normalize_required("title", "eleven chars", 10, "must be 1..10 chars").is_err());
        assert_eq!(
            normalize_required("title", " ok ", 10, "must be 1..10 chars").expect("valid"),
            "ok"
        );
    }

    #[test]
    fn tags_are_deduplicated_case_insensitively() {
        let tags = normalize_tags(vec![
            " Rust ".into(),
            "rust".into(),
            "".into(),
            "Async".into(),
        ]);
        assert_eq!(tags, vec!["rust".to_string(), "async".to_string()]);
    }
}
