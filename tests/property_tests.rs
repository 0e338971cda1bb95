//! Property-based tests for the normalization helpers.

use kedai_api::common::{
    generate_order_number, generate_unique_slug, is_valid_slug, normalize_phone,
};
use proptest::prelude::*;

proptest! {
    /// normalize(normalize(x)) == normalize(x) for any input string.
    #[test]
    fn phone_normalization_is_idempotent(input in ".{0,30}") {
        let once = normalize_phone(&input);
        let twice = normalize_phone(&once);
        prop_assert_eq!(once, twice);
    }

    /// Normalized output contains nothing but digits after a single
    /// leading plus.
    #[test]
    fn normalized_phones_are_canonical(input in "[0-9+ ()-]{1,20}") {
        let normalized = normalize_phone(&input);
        prop_assert!(normalized.starts_with('+'));
        prop_assert!(normalized[1..].chars().all(|c| c.is_ascii_digit() || c == '+'));
    }

    /// Any store name yields a URL-safe reserved slug.
    #[test]
    fn generated_slugs_are_always_valid(name in ".{2,40}") {
        let slug = generate_unique_slug(&name);
        prop_assert!(is_valid_slug(&slug), "invalid slug {} from {:?}", slug, name);
    }
}

#[test]
fn known_phone_fixtures() {
    assert_eq!(normalize_phone("0123456789"), "+60123456789");
    assert_eq!(normalize_phone("+60123456789"), "+60123456789");
}

#[test]
fn order_numbers_are_well_formed_and_distinct() {
    let first = generate_order_number();
    assert_eq!(first.len(), "KD-20250801-ABCDE".len());
    assert!(first.starts_with("KD-"));

    let batch: std::collections::HashSet<String> =
        (0..64).map(|_| generate_order_number()).collect();
    assert!(batch.len() > 1, "order number suffixes should vary");
}
