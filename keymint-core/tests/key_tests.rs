mod common;

use common::test_codec;
use keymint_core::{KeyCodec, LicenseTypeId};
use proptest::prelude::*;

// ── Format validation ───────────────────────────────────────────────────

#[test]
fn accepts_plain_uppercase_alphanumeric() {
    assert!(KeyCodec::validate_format("ABCDE12345FGHIJ67890"));
}

#[test]
fn accepts_dashed_and_lowercase_forms() {
    assert!(KeyCodec::validate_format("abcde-12345-fghij-67890"));
    assert!(KeyCodec::validate_format("AbCdE-12345-FGHIJ-67890-KLMNO"));
}

#[test]
fn rejects_bad_lengths() {
    assert!(!KeyCodec::validate_format(""));
    assert!(!KeyCodec::validate_format("ABCDE-12345"));
    assert!(!KeyCodec::validate_format(&"A".repeat(19)));
    assert!(KeyCodec::validate_format(&"A".repeat(20)));
    assert!(KeyCodec::validate_format(&"A".repeat(30)));
    assert!(!KeyCodec::validate_format(&"A".repeat(31)));
}

#[test]
fn rejects_bad_characters() {
    assert!(!KeyCodec::validate_format("ABCDE 12345 FGHIJ 67890"));
    assert!(!KeyCodec::validate_format("ABCDE*12345&FGHIJ+6789"));
    assert!(!KeyCodec::validate_format("ÄBCDE12345FGHIJ67890"));
}

#[test]
fn dashes_do_not_count_toward_length() {
    // 20 significant characters spread over many groups
    assert!(KeyCodec::validate_format("AB-CD-E1-23-45-FG-HI-J6-78-90"));
}

// ── Generation ──────────────────────────────────────────────────────────

#[test]
fn generated_keys_pass_format_validation() {
    let codec = test_codec();
    let key = codec.generate(None, None, None);
    assert!(
        KeyCodec::validate_format(&key),
        "generated key failed the format check: {key}"
    );
}

#[test]
fn generated_key_is_25_chars_in_5_char_groups() {
    let codec = test_codec();
    let key = codec.generate(None, None, None);
    assert_eq!(key.replace('-', "").len(), 25);
    for chunk in key.split('-') {
        assert_eq!(chunk.len(), 5, "uneven group in {key}");
    }
}

#[test]
fn prefixed_key_keeps_the_prefix_up_front() {
    let codec = test_codec();
    let key = codec.generate(Some("ACME"), None, None);
    assert!(key.starts_with("ACME"), "prefix lost in {key}");
    assert!(KeyCodec::validate_format(&key));
    assert_eq!(key.replace('-', "").len(), 29);
}

#[test]
fn repeated_generation_is_unique() {
    let codec = test_codec();
    let first = codec.generate(None, Some("alice"), None);
    let second = codec.generate(None, Some("alice"), None);
    assert_ne!(first, second);
}

#[test]
fn owner_and_type_context_do_not_break_format() {
    let codec = test_codec();
    let key = codec.generate(Some("PRO"), Some("bob@example.com"), Some(LicenseTypeId::new()));
    assert!(KeyCodec::validate_format(&key));
}

#[test]
fn different_secrets_derive_different_keys() {
    let key_a = KeyCodec::new("secret-a").generate(None, None, None);
    let key_b = KeyCodec::new("secret-b").generate(None, None, None);
    assert_ne!(key_a, key_b);
}

// ── Prefix validation ───────────────────────────────────────────────────

#[test]
fn prefix_rules() {
    assert!(KeyCodec::validate_prefix("A"));
    assert!(KeyCodec::validate_prefix("ACME"));
    assert!(KeyCodec::validate_prefix("R2D2X"));
    assert!(!KeyCodec::validate_prefix(""));
    assert!(!KeyCodec::validate_prefix("TOOLONG"));
    assert!(!KeyCodec::validate_prefix("acme"));
    assert!(!KeyCodec::validate_prefix("AC-ME"));
    assert!(!KeyCodec::validate_prefix("AB CD"));
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    /// Every generated key passes the surface-format check, with or
    /// without a prefix.
    #[test]
    fn generate_then_validate(
        prefix in proptest::option::of("[A-Z0-9]{1,5}"),
        owner in proptest::option::of("[a-z]{1,12}"),
    ) {
        let codec = test_codec();
        let key = codec.generate(prefix.as_deref(), owner.as_deref(), None);
        prop_assert!(KeyCodec::validate_format(&key), "rejected: {key}");
    }

    /// Format checking is invariant under dash-removal and case-folding.
    #[test]
    fn format_check_ignores_dashes_and_case(raw in "[A-Za-z0-9-]{0,40}") {
        let stripped = raw.replace('-', "");
        let folded = raw.to_uppercase();
        prop_assert_eq!(
            KeyCodec::validate_format(&raw),
            KeyCodec::validate_format(&stripped)
        );
        prop_assert_eq!(
            KeyCodec::validate_format(&raw),
            KeyCodec::validate_format(&folded)
        );
    }
}
