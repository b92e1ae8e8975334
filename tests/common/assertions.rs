//! Domain-specific assertion macros for logagg harnesses.
//!
//! These add context-rich failure messages that say which pipeline
//! invariant was violated.

/// Assert two record collections hold the same records, ignoring order.
///
/// ```rust
/// assert_same_records!(store.snapshot(), submitted);
/// ```
#[macro_export]
macro_rules! assert_same_records {
    ($actual:expr, $expected:expr) => {{
        let mut actual: Vec<logagg::Record> = $actual.into_iter().collect();
        let mut expected: Vec<logagg::Record> = $expected.into_iter().collect();
        let key = |r: &logagg::Record| {
            (
                r.timestamp(),
                r.source().to_string(),
                r.message().to_string(),
                r.level().to_string(),
            )
        };
        actual.sort_by_key(key);
        expected.sort_by_key(key);
        if actual.len() != expected.len() {
            panic!(
                "assert_same_records! failed: store holds {} records, expected {}",
                actual.len(),
                expected.len()
            );
        }
        pretty_assertions::assert_eq!(actual, expected, "stored records differ from submitted");
    }};
}

/// Assert no record message appears twice (each record stored exactly once).
#[macro_export]
macro_rules! assert_no_duplicates {
    ($records:expr) => {{
        let records: &[logagg::Record] = &$records;
        let mut seen = std::collections::HashSet::new();
        for r in records {
            if !seen.insert(r.message().to_string()) {
                panic!(
                    "assert_no_duplicates! failed: {:?} was stored more than once",
                    r.message()
                );
            }
        }
    }};
}
