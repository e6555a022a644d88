//! Normalize -> syntax stages of the verifier pipeline.

use crate::errors::VerifyError;

/// Trim, split on the last `@`, IDN-convert the domain to ASCII, lowercase
/// the domain. The local part's case is preserved (most mail systems treat
/// it case-sensitively even though almost none actually enforce it).
pub fn normalize(raw: &str) -> Result<(String, String), VerifyError> {
    let trimmed = raw.trim();
    let at_pos = trimmed
        .rfind('@')
        .ok_or_else(|| VerifyError::InvalidSyntax(format!("no @ in {trimmed}")))?;

    let (local, domain) = trimmed.split_at(at_pos);
    let domain = &domain[1..];

    let ascii_domain = idna::domain_to_ascii(domain)
        .map_err(|_| VerifyError::InvalidSyntax(format!("invalid IDN domain: {domain}")))?
        .to_lowercase();

    Ok((local.to_string(), ascii_domain))
}

/// Total length <= 254, local part 1..64, each domain label 1..63, local
/// part matches a dot-atom or quoted-string shape, domain matches
/// `(label\.)+TLD{2,}`.
pub fn check_syntax(local: &str, domain: &str) -> Result<(), VerifyError> {
    let total_len = local.len() + 1 + domain.len();
    if total_len > 254 {
        return Err(VerifyError::InvalidSyntax("address exceeds 254 characters".to_string()));
    }
    if local.is_empty() || local.len() > 64 {
        return Err(VerifyError::InvalidSyntax("local part must be 1..64 characters".to_string()));
    }
    if !is_dot_atom_or_quoted(local) {
        return Err(VerifyError::InvalidSyntax(format!("malformed local part: {local}")));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(VerifyError::InvalidSyntax("domain needs at least a label and TLD".to_string()));
    }
    for label in &labels {
        if label.is_empty() || label.len() > 63 {
            return Err(VerifyError::InvalidSyntax(format!("invalid domain label: {label}")));
        }
    }
    let tld = labels.last().unwrap();
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(VerifyError::InvalidSyntax(format!("invalid TLD: {tld}")));
    }

    Ok(())
}

fn is_dot_atom_or_quoted(local: &str) -> bool {
    if local.starts_with('"') && local.ends_with('"') && local.len() >= 2 {
        return true;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_lowercases_domain() {
        let (local, domain) = normalize("  Owner@Acme.COM ").unwrap();
        assert_eq!(local, "Owner");
        assert_eq!(domain, "acme.com");
    }

    #[test]
    fn normalize_is_idempotent() {
        let first = normalize("owner@acme.com").unwrap();
        let rejoined = format!("{}@{}", first.0, first.1);
        let second = normalize(&rejoined).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_missing_at_sign() {
        assert!(normalize("not-an-email").is_err());
    }

    #[test]
    fn syntax_rejects_double_dot_local_part() {
        assert!(check_syntax("a..b", "acme.com").is_err());
    }

    #[test]
    fn syntax_accepts_well_formed_address() {
        assert!(check_syntax("owner", "acme.com").is_ok());
    }

    #[test]
    fn syntax_rejects_short_tld() {
        assert!(check_syntax("owner", "acme.c").is_err());
    }
}
