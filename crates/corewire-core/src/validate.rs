//! Reusable field validators.
//!
//! Every validator is a pure function returning `Ok(())` or the
//! [`FieldError`] describing the violation. Schemas feed the results into a
//! [`Validation`](crate::params::Validation) accumulator so all violations
//! are reported together.

use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Comparison, FieldError, Violation};

/// Bitcoin address length bounds (shortest Base58 to longest bech32m).
pub const ADDRESS_MIN_LEN: usize = 26;
pub const ADDRESS_MAX_LEN: usize = 90;

/// Transaction ids and block hashes are 32 bytes rendered as hex.
pub const HASH_HEX_LEN: usize = 64;

static HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]*$").expect("static hex pattern is valid"));

static BASE58_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[1-9A-HJ-NP-Za-km-z]+$").expect("static base58 pattern is valid")
});

// Checked against the lowercased address; mixed case is rejected separately.
static BECH32_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(bc|tb|bcrt)1[qpzry9x8gf2tvdw0s3jn54khce6mua7l]+$")
        .expect("static bech32 pattern is valid")
});

const BECH32_PREFIXES: [&str; 3] = ["bc1", "tb1", "bcrt1"];

// ==============================================================================
// Presence and Length
// ==============================================================================

pub fn required<T>(field: &str, value: &Option<T>) -> Result<(), FieldError> {
    match value {
        Some(_) => Ok(()),
        None => Err(FieldError::required(field)),
    }
}

/// Character-count bounds for a string.
pub fn length(
    field: &str,
    value: &str,
    min: Option<usize>,
    max: Option<usize>,
) -> Result<(), FieldError> {
    check_count(field, value.chars().count(), min, max, "character")
}

pub fn exact_length(field: &str, value: &str, len: usize) -> Result<(), FieldError> {
    length(field, value, Some(len), Some(len))
}

/// Item-count bounds for a list.
pub fn count(
    field: &str,
    len: usize,
    min: Option<usize>,
    max: Option<usize>,
) -> Result<(), FieldError> {
    check_count(field, len, min, max, "item")
}

fn check_count(
    field: &str,
    actual: usize,
    min: Option<usize>,
    max: Option<usize>,
    unit: &str,
) -> Result<(), FieldError> {
    let violation = Violation::Length { min, max };
    let plural = |n: usize| if n == 1 { unit.to_owned() } else { format!("{unit}s") };

    match (min, max) {
        (Some(lo), Some(hi)) if lo == hi && actual != lo => Err(FieldError::new(
            field,
            format!("should be {lo} {}", plural(lo)),
            violation,
        )),
        (Some(lo), _) if actual < lo => Err(FieldError::new(
            field,
            format!("should be at least {lo} {}", plural(lo)),
            violation,
        )),
        (_, Some(hi)) if actual > hi => Err(FieldError::new(
            field,
            format!("should be at most {hi} {}", plural(hi)),
            violation,
        )),
        _ => Ok(()),
    }
}

// ==============================================================================
// Membership and Range
// ==============================================================================

pub fn inclusion(field: &str, value: &str, allowed: &[&str]) -> Result<(), FieldError> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(FieldError::new(
        field,
        format!("is invalid, expected one of: {}", allowed.join(", ")),
        Violation::Inclusion {
            allowed: allowed.iter().map(|s| (*s).to_owned()).collect(),
        },
    ))
}

/// Numeric types the range validator accepts.
pub trait Numeric: PartialOrd + Copy + Display {
    fn as_f64(self) -> f64;
}

impl Numeric for i64 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Numeric for u64 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Numeric for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

pub fn number<T: Numeric>(
    field: &str,
    value: T,
    op: Comparison,
    bound: T,
) -> Result<(), FieldError> {
    if op.holds(value, bound) {
        return Ok(());
    }
    Err(FieldError::new(
        field,
        format!("must be {} {bound}", op.describe()),
        Violation::Number {
            op,
            bound: bound.as_f64(),
        },
    ))
}

// ==============================================================================
// Formats
// ==============================================================================

pub fn hex_format(field: &str, value: &str) -> Result<(), FieldError> {
    if HEX_RE.is_match(value) {
        return Ok(());
    }
    Err(FieldError::new(
        field,
        "has invalid format, expected hex",
        Violation::Format { expected: "hex" },
    ))
}

/// A 64-character hex identifier (txid, block hash).
pub fn hash_format(field: &str, value: &str) -> Result<(), FieldError> {
    exact_length(field, value, HASH_HEX_LEN)?;
    hex_format(field, value)
}

/// Length and charset check for Base58 and bech32/bech32m addresses.
///
/// No checksum is verified; Bitcoin Core remains the authority on whether
/// an address decodes.
pub fn bitcoin_address_format(field: &str, value: &str) -> Result<(), FieldError> {
    length(field, value, Some(ADDRESS_MIN_LEN), Some(ADDRESS_MAX_LEN))?;

    let lower = value.to_ascii_lowercase();
    let charset_ok = if BECH32_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        let single_case = value == lower || value == value.to_ascii_uppercase();
        single_case && BECH32_RE.is_match(&lower)
    } else {
        BASE58_RE.is_match(value)
    };

    if charset_ok {
        Ok(())
    } else {
        Err(FieldError::new(
            field,
            "has invalid format, expected a bitcoin address",
            Violation::Format {
                expected: "bitcoin_address",
            },
        ))
    }
}

// ==============================================================================
// Cross-field Rules
// ==============================================================================

/// Fails on `field_a` when both values are present.
pub fn mutually_exclusive<A, B>(
    field_a: &str,
    a: &Option<A>,
    field_b: &str,
    b: &Option<B>,
) -> Result<(), FieldError> {
    if a.is_some() && b.is_some() {
        return Err(FieldError::new(
            field_a,
            format!("cannot be set together with {field_b}"),
            Violation::Exclusive {
                other: field_b.to_owned(),
            },
        ));
    }
    Ok(())
}

/// Fails when `field` is set while `condition_field` equals `condition_value`.
pub fn conditional_forbidden(
    field: &str,
    is_set: bool,
    condition_field: &str,
    actual: &Value,
    condition_value: &Value,
) -> Result<(), FieldError> {
    if is_set && actual == condition_value {
        return Err(FieldError::new(
            field,
            format!("is not allowed when {condition_field} is {condition_value}"),
            Violation::Forbidden {
                condition_field: condition_field.to_owned(),
                condition_value: condition_value.clone(),
            },
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ViolationKind;

    #[test]
    fn length_bounds_and_messages() {
        let err = length("address", "1abc", Some(26), Some(90)).expect_err("too short");
        assert_eq!(err.kind(), ViolationKind::Length);
        assert_eq!(err.message, "should be at least 26 characters");

        let err = length("wallet_name", &"w".repeat(65), Some(1), Some(64)).expect_err("too long");
        assert_eq!(err.message, "should be at most 64 characters");

        assert!(length("label", "", None, Some(10)).is_ok());
    }

    #[test]
    fn exact_length_for_hashes() {
        let err = exact_length("txid", "abcd", 64).expect_err("wrong length");
        assert_eq!(err.message, "should be 64 characters");
        assert!(exact_length("txid", &"a".repeat(64), 64).is_ok());
    }

    #[test]
    fn count_uses_item_wording() {
        let err = count("requests", 0, Some(1), None).expect_err("empty list");
        assert_eq!(err.message, "should be at least 1 item");
    }

    #[test]
    fn inclusion_lists_allowed_values() {
        let allowed = ["legacy", "p2sh-segwit", "bech32", "bech32m"];
        assert!(inclusion("address_type", "bech32m", &allowed).is_ok());
        let err = inclusion("address_type", "taproot", &allowed).expect_err("not allowed");
        assert_eq!(err.kind(), ViolationKind::Inclusion);
        assert!(matches!(
            err.violation,
            Violation::Inclusion { ref allowed } if allowed.len() == 4
        ));
    }

    #[test]
    fn number_comparisons() {
        assert!(number("minconf", 0_i64, Comparison::GreaterThanOrEqual, 0).is_ok());
        let err = number("timeout", 0_i64, Comparison::GreaterThan, 0).expect_err("not > 0");
        assert_eq!(err.message, "must be greater than 0");
        let err = number(
            "timeout",
            100_000_001_i64,
            Comparison::LessThanOrEqual,
            100_000_000,
        )
        .expect_err("over max");
        assert_eq!(err.message, "must be less than or equal to 100000000");
        assert!(number("fee_rate", 0.5_f64, Comparison::GreaterThan, 0.0).is_ok());
    }

    #[test]
    fn hex_and_hash_formats() {
        assert!(hex_format("hex", "deadBEEF").is_ok());
        let err = hex_format("hex", "xyz").expect_err("not hex");
        assert_eq!(err.kind(), ViolationKind::Format);

        let err = hash_format("txid", &"g".repeat(64)).expect_err("not hex");
        assert_eq!(err.kind(), ViolationKind::Format);
        let err = hash_format("txid", "00").expect_err("short");
        assert_eq!(err.kind(), ViolationKind::Length);
    }

    #[test]
    fn address_format_accepts_base58_and_bech32() {
        assert!(bitcoin_address_format("a", "bc1q09vm5lfy0j5reeulh4x5752q25uqqvz34hufdl").is_ok());
        for address in [
            "BC1Q09VM5LFY0J5REEULH4X5752Q25UQQVZ34HUFDL",
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            "bcrt1qs758ursh4q9z627kt3pp5yysm78ddny6txaqgw",
        ] {
            assert!(bitcoin_address_format("a", address).is_ok(), "{address}");
        }
    }

    #[test]
    fn address_format_rejects_bad_charset_and_mixed_case() {
        // '0', 'O', 'I' and 'l' are not Base58.
        let err = bitcoin_address_format("a", "1A1zP1eP5QGefi2DMPTfTL5SLmv7Divf0O")
            .expect_err("base58");
        assert_eq!(err.kind(), ViolationKind::Format);
        // 'b' is outside the bech32 data charset.
        let err = bitcoin_address_format("a", "bc1qb9vm5lfy0j5reeulh4x5752q25uqqvz34hufdl")
            .expect_err("bech32 charset");
        assert_eq!(err.kind(), ViolationKind::Format);
        let err = bitcoin_address_format("a", "bc1Q09vm5lfy0j5reeulh4x5752q25uqqvz34hufdl")
            .expect_err("mixed case");
        assert_eq!(err.kind(), ViolationKind::Format);
    }

    #[test]
    fn short_address_reports_length_only() {
        let err = bitcoin_address_format("address", "1abc").expect_err("short");
        assert_eq!(err.kind(), ViolationKind::Length);
    }

    #[test]
    fn mutually_exclusive_fails_only_when_both_set() {
        assert!(mutually_exclusive("fee_rate", &Some(1.0), "fee_rate_btc", &None::<f64>).is_ok());
        let err = mutually_exclusive("fee_rate", &Some(1.0), "fee_rate_btc", &Some(0.0001))
            .expect_err("both set");
        assert_eq!(err.kind(), ViolationKind::Exclusive);
    }

    #[test]
    fn conditional_forbidden_checks_condition_value() {
        let (yes, no) = (json!(true), json!(false));
        assert!(conditional_forbidden("label", true, "internal", &no, &yes).is_ok());
        assert!(conditional_forbidden("label", false, "internal", &yes, &yes).is_ok());
        let err = conditional_forbidden("label", true, "internal", &json!(true), &json!(true))
            .expect_err("forbidden");
        assert_eq!(err.message, "is not allowed when internal is true");
    }
}
