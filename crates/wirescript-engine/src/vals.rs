//! Value-to-label mapping tables.
//!
//! A [`ValueStrings`] maps numeric field values to display labels, the way
//! header fields annotate enumerated values. Ownership is encoded in the
//! variant: `Owned` tables hold duplicated label storage and free it on
//! drop, while `Static` tables borrow process-lifetime data and never free
//! anything. The distinction matters because built-in tables such as
//! [`CKSUM_VALS`] are handed to scripts without any finalizer.

use std::fmt::Write as _;

/// Labels for the checksum-status field values, in status order
/// (bad, good, unverified, not present).
pub const CKSUM_VALS: &[(u64, &str)] = &[
    (0, "Bad"),
    (1, "Good"),
    (2, "Unverified"),
    (3, "Not present"),
];

/// A value-to-label table with ownership tracked by variant.
#[derive(Debug, Clone)]
pub enum ValueStrings {
    /// Duplicated storage, freed when the table drops.
    Owned(Vec<(u64, String)>),
    /// Duplicated range storage: (low, high, label), inclusive bounds.
    OwnedRange(Vec<(u64, u64, String)>),
    /// Borrowed process-lifetime storage.
    Static(&'static [(u64, &'static str)]),
}

impl ValueStrings {
    /// Builds an owned table, duplicating every label.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        ValueStrings::Owned(pairs.into_iter().map(|(v, s)| (v, s.into())).collect())
    }

    /// True when dropping this table frees label storage.
    pub fn is_owned(&self) -> bool {
        !matches!(self, ValueStrings::Static(_))
    }

    pub fn lookup(&self, value: u64) -> Option<&str> {
        match self {
            ValueStrings::Owned(pairs) => pairs
                .iter()
                .find(|(v, _)| *v == value)
                .map(|(_, s)| s.as_str()),
            ValueStrings::OwnedRange(ranges) => ranges
                .iter()
                .find(|(lo, hi, _)| (*lo..=*hi).contains(&value))
                .map(|(_, _, s)| s.as_str()),
            ValueStrings::Static(pairs) => pairs
                .iter()
                .find(|(v, _)| *v == value)
                .map(|(_, s)| *s),
        }
    }

    /// Looks up `value`, falling back to `fallback_fmt` with any `{}`
    /// replaced by the numeric value (appended if the placeholder is
    /// missing).
    pub fn to_str(&self, value: u64, fallback_fmt: &str) -> String {
        if let Some(label) = self.lookup(value) {
            return label.to_owned();
        }
        if fallback_fmt.contains("{}") {
            fallback_fmt.replace("{}", &value.to_string())
        } else {
            let mut out = fallback_fmt.to_owned();
            let _ = write!(out, " {value}");
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_lookup_and_fallback() {
        let vs = ValueStrings::from_pairs([(1u64, "one"), (2, "two")]);
        assert!(vs.is_owned());
        assert_eq!(vs.lookup(2), Some("two"));
        assert_eq!(vs.lookup(99), None);
        assert_eq!(vs.to_str(99, "Unknown ({})"), "Unknown (99)");
        assert_eq!(vs.to_str(1, "Unknown ({})"), "one");
    }

    #[test]
    fn static_table_is_borrowed() {
        let vs = ValueStrings::Static(CKSUM_VALS);
        assert!(!vs.is_owned());
        assert_eq!(vs.lookup(1), Some("Good"));
        assert_eq!(vs.lookup(3), Some("Not present"));
    }

    #[test]
    fn range_lookup() {
        let vs = ValueStrings::OwnedRange(vec![(0, 9, "low".into()), (10, 20, "high".into())]);
        assert_eq!(vs.lookup(9), Some("low"));
        assert_eq!(vs.lookup(10), Some("high"));
        assert_eq!(vs.lookup(21), None);
    }
}
