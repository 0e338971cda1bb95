//! Shared helpers for identifiers the checkout pipeline reserves up
//! front: store slugs, human-facing order numbers, and Malaysian phone
//! numbers in their canonical `+60` form.

use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

const SLUG_SUFFIX_LEN: usize = 6;
const ORDER_SUFFIX_LEN: usize = 5;
const BASE36: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,98}[a-z0-9]$").expect("slug regex"));
static MY_MOBILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+60[1][0-9]{8,9}$").expect("phone regex"));

/// Lowercases, folds common accented characters, and reduces the rest
/// to `a-z0-9` separated by single hyphens.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.trim().to_lowercase().chars() {
        let mapped = match ch {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        };
        match mapped {
            'a'..='z' | '0'..='9' => out.push(mapped),
            ' ' | '-' | '_' => {
                if !out.is_empty() && !out.ends_with('-') {
                    out.push('-');
                }
            }
            _ => {}
        }
    }
    out.trim_matches('-').to_string()
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Slug reserved at order-creation time; the random suffix keeps two
/// stores with the same display name from colliding.
pub fn generate_unique_slug(text: &str) -> String {
    let base = slugify(text);
    let suffix = random_base36(SLUG_SUFFIX_LEN);
    if base.is_empty() {
        return suffix;
    }
    format!("{base}-{suffix}")
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug) && !slug.contains("--")
}

/// Order number format: `KD-YYYYMMDD-XXXXX` with an uppercase base36
/// suffix.
pub fn generate_order_number() -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = random_base36(ORDER_SUFFIX_LEN).to_uppercase();
    format!("KD-{date}-{suffix}")
}

/// Normalizes a phone number to the canonical `+60XXXXXXXXX` form.
/// Idempotent: already-normalized input passes through unchanged.
pub fn normalize_phone(phone: &str) -> String {
    let cleaned: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if let Some(rest) = cleaned.strip_prefix('0') {
        return format!("+60{rest}");
    }
    if !cleaned.starts_with('+') {
        return format!("+60{cleaned}");
    }
    cleaned
}

pub fn is_valid_malaysian_phone(phone: &str) -> bool {
    MY_MOBILE_RE.is_match(&normalize_phone(phone))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_handles_spacing_and_punctuation() {
        assert_eq!(slugify("Kedai Bunga Sari"), "kedai-bunga-sari");
        assert_eq!(slugify("  Baju -- Murah!  "), "baju-murah");
        assert_eq!(slugify("Café Ðelight"), "cafe-elight");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn unique_slug_is_valid_and_suffixed() {
        let slug = generate_unique_slug("Kedai Aisyah");
        assert!(slug.starts_with("kedai-aisyah-"));
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn unique_slug_survives_unsluggable_names() {
        let slug = generate_unique_slug("!!");
        assert_eq!(slug.len(), 6);
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn order_number_has_expected_shape() {
        let number = generate_order_number();
        let re = Regex::new(r"^KD-\d{8}-[A-Z0-9]{5}$").unwrap();
        assert!(re.is_match(&number), "unexpected order number {number}");
    }

    #[test]
    fn phone_normalization_canonicalizes_local_numbers() {
        assert_eq!(normalize_phone("0123456789"), "+60123456789");
        assert_eq!(normalize_phone("+60123456789"), "+60123456789");
        assert_eq!(normalize_phone("60123456789"), "+6060123456789");
        assert_eq!(normalize_phone("012-345 6789"), "+60123456789");
    }

    #[test]
    fn malaysian_mobile_validation() {
        assert!(is_valid_malaysian_phone("0123456789"));
        assert!(is_valid_malaysian_phone("+60123456789"));
        assert!(!is_valid_malaysian_phone("+4930123456"));
        assert!(!is_valid_malaysian_phone("abc"));
    }
}
