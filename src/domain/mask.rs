//! Masking and normalization helpers.
//!
//! `mask_email` output is user facing: the two-step flow returns it verbatim
//! as the `email_hint` the person uses to recognize which address to type.

const FULL_MASK: &str = "***";
const FULL_EMAIL_MASK: &str = "***@***";

/// Reveal the first 3 and last 2 characters of a tax ID. Anything shorter
/// than 6 characters is masked entirely. For logs only.
pub fn mask_tax_id(tax_id: &str) -> String {
    let chars: Vec<char> = tax_id.chars().collect();
    if chars.len() < 6 {
        return FULL_MASK.to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}.***.***-{}", head, tail)
}

/// Reveal at most the 3 characters right before `@` plus the domain.
/// Local parts shorter than 3 characters reveal only their last character.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return FULL_EMAIL_MASK.to_string();
    };
    let local: Vec<char> = local.chars().collect();
    if local.is_empty() || domain.is_empty() {
        return FULL_EMAIL_MASK.to_string();
    }

    let visible = if local.len() < 3 { 1 } else { 3 };
    let revealed: String = local[local.len() - visible..].iter().collect();
    format!("{}{}@{}", FULL_MASK, revealed, domain)
}

/// Lowercase and strip every whitespace character
pub fn normalize_email(email: &str) -> String {
    email
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Keep only ASCII digits (e.g. "123.456.789-00" -> "12345678900")
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// First token of a full name, split on the first space
pub fn first_name(full_name: &str) -> &str {
    if full_name.is_empty() {
        return "usuário";
    }
    match full_name.split_once(' ') {
        Some((first, _)) => first,
        None => full_name,
    }
}
