// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Payload distribution.
//!
//! Turns a request payload into exactly `count` serialized payloads.
//! Classification and generation are separate steps so callers can inspect
//! how an input was interpreted before any invocation happens:
//!
//! 1. [`classify_payload`] decides whether a value is a weighted-entry list
//!    or a single literal payload.
//! 2. [`generate_payloads`] allocates slots by largest remainder and
//!    serializes each entry.
//!
//! # Example
//!
//! ```ignore
//! use power_tuning_engine::payload::{classify_payload, generate_payloads};
//!
//! let spec = classify_payload(&serde_json::json!([
//!     {"payload": {"size": "small"}, "weight": 3},
//!     {"payload": {"size": "large"}, "weight": 1},
//! ]))?;
//! let payloads = generate_payloads(20, &spec)?;
//! assert_eq!(payloads.len(), 20);
//! ```

use power_tuning_core::WeightedPayloadEntry;
use serde_json::Value;
use thiserror::Error;

const PAYLOAD_KEY: &str = "payload";
const WEIGHT_KEY: &str = "weight";

/// Errors that can occur during payload distribution.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Zero payloads requested.
    #[error("Invalid payload count: count must be positive")]
    ZeroCount,

    /// Fewer invocations than weighted entries.
    #[error("Invalid payload count: {count} invocations cannot cover {entries} weighted payloads")]
    CountBelowEntries {
        /// Requested invocations
        count: usize,
        /// Number of weighted entries
        entries: usize,
    },

    /// A list that looks weighted has a malformed element.
    #[error("Invalid weighted payload at index {index}: {reason}")]
    MalformedEntry {
        /// Position in the list
        index: usize,
        /// What is wrong with it
        reason: String,
    },

    /// A payload value could not be serialized.
    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for payload operations.
pub type Result<T> = std::result::Result<T, PayloadError>;

/// How a payload value is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadSpec {
    /// One payload repeated for every invocation.
    Single(Value),
    /// Alternative payloads with relative frequencies.
    Weighted(Vec<WeightedPayloadEntry>),
}

/// Decide how a payload value is interpreted.
///
/// An array whose elements are all objects with exactly `payload` and a
/// positive integer `weight` is weighted. An array where some element
/// carries either key but the list is not fully valid is rejected. Any
/// other value, arrays included, is a single literal payload.
pub fn classify_payload(value: &Value) -> Result<PayloadSpec> {
    let Value::Array(items) = value else {
        return Ok(PayloadSpec::Single(value.clone()));
    };

    if items.is_empty() {
        return Ok(PayloadSpec::Single(value.clone()));
    }

    let mut entries = Vec::with_capacity(items.len());
    let mut first_error = None;

    for (index, item) in items.iter().enumerate() {
        match parse_entry(item) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                if first_error.is_none() {
                    first_error = Some(PayloadError::MalformedEntry { index, reason });
                }
            }
        }
    }

    match first_error {
        None => Ok(PayloadSpec::Weighted(entries)),
        Some(err) if looks_weighted(items) => Err(err),
        Some(_) => Ok(PayloadSpec::Single(value.clone())),
    }
}

fn looks_weighted(items: &[Value]) -> bool {
    items.iter().any(|item| {
        item.as_object()
            .is_some_and(|obj| obj.contains_key(PAYLOAD_KEY) || obj.contains_key(WEIGHT_KEY))
    })
}

fn parse_entry(item: &Value) -> std::result::Result<WeightedPayloadEntry, String> {
    let obj = item
        .as_object()
        .ok_or_else(|| "entry is not an object".to_string())?;

    let payload = obj
        .get(PAYLOAD_KEY)
        .ok_or_else(|| format!("missing `{PAYLOAD_KEY}`"))?;
    let weight = obj
        .get(WEIGHT_KEY)
        .ok_or_else(|| format!("missing `{WEIGHT_KEY}`"))?;

    if obj.len() != 2 {
        let extra: Vec<&str> = obj
            .keys()
            .map(String::as_str)
            .filter(|k| *k != PAYLOAD_KEY && *k != WEIGHT_KEY)
            .collect();
        return Err(format!("unexpected keys {:?}", extra));
    }

    let weight = weight
        .as_u64()
        .filter(|w| *w > 0)
        .ok_or_else(|| format!("`{WEIGHT_KEY}` must be a positive integer, got {weight}"))?;

    Ok(WeightedPayloadEntry {
        payload: payload.clone(),
        weight,
    })
}

/// Canonical serialized form of a payload value.
///
/// A string that already holds JSON text is sent verbatim; every other
/// value is serialized.
pub fn canonical_payload(value: &Value) -> Result<String> {
    if let Value::String(s) = value {
        if serde_json::from_str::<Value>(s).is_ok() {
            return Ok(s.clone());
        }
    }
    Ok(serde_json::to_string(value)?)
}

/// Slot count per entry by largest remainder.
///
/// Every entry receives `floor(count * weight / total)` slots. Leftover
/// slots go to the largest remainders; among equal remainders the entry
/// declared later wins, so an even split leaves the extra slot on the last
/// entry. Entries left with zero slots take one from the entry with the
/// largest surplus over its exact share.
pub fn allocate(count: usize, weights: &[u64]) -> Result<Vec<usize>> {
    if count == 0 {
        return Err(PayloadError::ZeroCount);
    }
    if count < weights.len() {
        return Err(PayloadError::CountBelowEntries {
            count,
            entries: weights.len(),
        });
    }
    if weights.is_empty() {
        return Ok(Vec::new());
    }

    let count_wide = count as u128;
    let total: u128 = weights.iter().map(|w| u128::from(*w)).sum();

    let mut slots: Vec<usize> = Vec::with_capacity(weights.len());
    let mut remainders: Vec<(u128, usize)> = Vec::with_capacity(weights.len());
    for (i, w) in weights.iter().enumerate() {
        let exact = count_wide * u128::from(*w);
        slots.push((exact / total) as usize);
        remainders.push((exact % total, i));
    }

    let assigned: usize = slots.iter().sum();
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    for &(_, i) in remainders.iter().take(count - assigned) {
        slots[i] += 1;
    }

    // surplus of entry i over its exact share, scaled by `total`
    let surplus = |slots: &[usize], i: usize| -> i128 {
        (slots[i] as i128) * (total as i128) - (count_wide * u128::from(weights[i])) as i128
    };

    while let Some(starved) = slots.iter().position(|s| *s == 0) {
        let donor = (0..slots.len())
            .filter(|&i| slots[i] > 1)
            .max_by(|&a, &b| surplus(&slots, a).cmp(&surplus(&slots, b)).then(b.cmp(&a)));
        let Some(donor) = donor else {
            break;
        };
        slots[donor] -= 1;
        slots[starved] += 1;
    }

    Ok(slots)
}

/// Produce exactly `count` serialized payloads for `spec`.
///
/// Weighted entries appear in declaration order, each repeated for its
/// allocated slot count.
pub fn generate_payloads(count: usize, spec: &PayloadSpec) -> Result<Vec<String>> {
    match spec {
        PayloadSpec::Single(value) => {
            if count == 0 {
                return Err(PayloadError::ZeroCount);
            }
            let payload = canonical_payload(value)?;
            Ok(vec![payload; count])
        }
        PayloadSpec::Weighted(entries) => {
            let weights: Vec<u64> = entries.iter().map(|e| e.weight).collect();
            let slots = allocate(count, &weights)?;

            let mut payloads = Vec::with_capacity(count);
            for (entry, n) in entries.iter().zip(slots) {
                let payload = canonical_payload(&entry.payload)?;
                payloads.extend(std::iter::repeat(payload).take(n));
            }
            Ok(payloads)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counts(payloads: &[String], needle: &str) -> usize {
        payloads.iter().filter(|p| p.as_str() == needle).count()
    }

    #[test]
    fn test_single_value_repeated() {
        let spec = classify_payload(&json!({"key": "value"})).unwrap();
        let payloads = generate_payloads(3, &spec).unwrap();
        assert_eq!(payloads, vec![r#"{"key":"value"}"#; 3]);
    }

    #[test]
    fn test_json_string_kept_verbatim() {
        let spec = classify_payload(&json!("{\"a\": 1}")).unwrap();
        assert_eq!(generate_payloads(1, &spec).unwrap(), vec!["{\"a\": 1}"]);

        let spec = classify_payload(&json!("plain text")).unwrap();
        assert_eq!(generate_payloads(1, &spec).unwrap(), vec!["\"plain text\""]);
    }

    #[test]
    fn test_even_split_last_entry_absorbs_remainder() {
        let spec = classify_payload(&json!([
            {"payload": "A", "weight": 1},
            {"payload": "B", "weight": 1},
            {"payload": "C", "weight": 1},
        ]))
        .unwrap();
        let payloads = generate_payloads(100, &spec).unwrap();

        assert_eq!(payloads.len(), 100);
        assert_eq!(counts(&payloads, "\"A\""), 33);
        assert_eq!(counts(&payloads, "\"B\""), 33);
        assert_eq!(counts(&payloads, "\"C\""), 34);
        assert_eq!(payloads[0], "\"A\"");
        assert_eq!(payloads[99], "\"C\"");
    }

    #[test]
    fn test_largest_remainder_wins() {
        // exact shares 2.5, 6.5, 1.0; the tie goes to the later entry
        assert_eq!(allocate(10, &[5, 13, 2]).unwrap(), vec![2, 7, 1]);
        // exact shares 0.7, 2.3
        assert_eq!(allocate(3, &[7, 23]).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_counts_within_one_of_exact_share() {
        let weights = [3u64, 7, 1, 9, 4];
        let total: u64 = weights.iter().sum();
        for count in weights.len()..60 {
            let slots = allocate(count, &weights).unwrap();
            assert_eq!(slots.iter().sum::<usize>(), count);
            for (slot, w) in slots.iter().zip(weights) {
                let exact = count as f64 * w as f64 / total as f64;
                assert!((*slot as f64 - exact).abs() < 1.0 + 1e-9, "count {count}");
                assert!(*slot >= 1);
            }
        }
    }

    #[test]
    fn test_every_entry_gets_a_slot() {
        let slots = allocate(3, &[100, 1, 1]).unwrap();
        assert_eq!(slots, vec![1, 1, 1]);
    }

    #[test]
    fn test_count_below_entries_fails() {
        let spec = classify_payload(&json!([
            {"payload": 1, "weight": 1},
            {"payload": 2, "weight": 1},
        ]))
        .unwrap();
        assert!(matches!(
            generate_payloads(1, &spec),
            Err(PayloadError::CountBelowEntries { count: 1, entries: 2 })
        ));
    }

    #[test]
    fn test_zero_count_fails() {
        let spec = classify_payload(&json!(null)).unwrap();
        assert!(matches!(generate_payloads(0, &spec), Err(PayloadError::ZeroCount)));
    }

    #[test]
    fn test_plain_array_is_single_payload() {
        let value = json!([1, 2, 3]);
        assert_eq!(
            classify_payload(&value).unwrap(),
            PayloadSpec::Single(value.clone())
        );
        let value = json!([{"name": "x"}]);
        assert!(matches!(
            classify_payload(&value).unwrap(),
            PayloadSpec::Single(_)
        ));
    }

    #[test]
    fn test_partially_weighted_list_fails() {
        let value = json!([
            {"payload": "A", "weight": 1},
            {"payload": "B"},
        ]);
        assert!(matches!(
            classify_payload(&value),
            Err(PayloadError::MalformedEntry { index: 1, .. })
        ));
    }

    #[test]
    fn test_non_positive_weight_fails() {
        let value = json!([{"payload": "A", "weight": 0}]);
        assert!(classify_payload(&value).is_err());
        let value = json!([{"payload": "A", "weight": 1.5}]);
        assert!(classify_payload(&value).is_err());
    }

    #[test]
    fn test_extra_keys_fail() {
        let value = json!([{"payload": "A", "weight": 1, "note": "x"}]);
        assert!(classify_payload(&value).is_err());
    }

    #[test]
    fn test_weighted_output_in_entry_order() {
        let spec = classify_payload(&json!([
            {"payload": {"n": 1}, "weight": 1},
            {"payload": {"n": 2}, "weight": 3},
        ]))
        .unwrap();
        let payloads = generate_payloads(4, &spec).unwrap();
        assert_eq!(
            payloads,
            vec![r#"{"n":1}"#, r#"{"n":2}"#, r#"{"n":2}"#, r#"{"n":2}"#]
        );
    }
}
