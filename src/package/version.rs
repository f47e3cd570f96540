//! Version comparison for store path versions.
//!
//! Nixpkgs versions are not semver: they range from `258.1` through
//! `0.9.8z` to `2024-01-01` and `unstable-…` snapshots. Only strings that
//! start with a digit and do not look like dates are ordered; everything
//! else is never reported as outdated.

use std::cmp::Ordering;

/// Version comparator - pure functions over version strings.
pub struct VersionComparator;

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Num(&'a str),
    Alpha(&'a str),
}

impl VersionComparator {
    /// Whether `a` is strictly, meaningfully older than `b`.
    pub fn is_older(a: &str, b: &str) -> bool {
        if a == b || !Self::is_comparable(a) || !Self::is_comparable(b) {
            return false;
        }
        Self::compare(a, b) == Ordering::Less
    }

    /// Whether a version string can be ordered at all.
    pub fn is_comparable(version: &str) -> bool {
        version.chars().next().is_some_and(|c| c.is_ascii_digit())
            && !looks_like_iso_date(version)
            && !looks_like_compact_date(version)
    }

    /// Natural ordering: numeric runs compare numerically, alphabetic runs
    /// lexically, and separators only delimit runs.
    pub fn compare(a: &str, b: &str) -> Ordering {
        let mut left = tokenize(a);
        let mut right = tokenize(b);
        loop {
            match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(x), Some(y)) => {
                    let ord = compare_tokens(&x, &y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }
    }
}

fn compare_tokens(a: &Token<'_>, b: &Token<'_>) -> Ordering {
    match (a, b) {
        (Token::Num(x), Token::Num(y)) => compare_numeric(x, y),
        (Token::Alpha(x), Token::Alpha(y)) => x.cmp(y),
        (Token::Num(_), Token::Alpha(_)) => Ordering::Greater,
        (Token::Alpha(_), Token::Num(_)) => Ordering::Less,
    }
}

/// Compare digit runs of any length without overflowing.
fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn tokenize(version: &str) -> impl Iterator<Item = Token<'_>> {
    let mut rest = version;
    std::iter::from_fn(move || {
        rest = rest.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());
        let first = rest.chars().next()?;
        let numeric = first.is_ascii_digit();
        let end = rest
            .find(|c: char| {
                !c.is_ascii_alphanumeric() || c.is_ascii_digit() != numeric
            })
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some(if numeric { Token::Num(run) } else { Token::Alpha(run) })
    })
}

/// `YYYY-MM-DD…`
fn looks_like_iso_date(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}

/// `YYYYMMDD…`
fn looks_like_compact_date(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() >= 8 && bytes[..8].iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_versions_are_not_older() {
        assert!(!VersionComparator::is_older("1.0", "1.0"));
        assert!(!VersionComparator::is_older("258.1", "258.1"));
    }

    #[test]
    fn test_numeric_segments_compare_numerically() {
        assert!(VersionComparator::is_older("9", "10"));
        assert!(VersionComparator::is_older("1.9.0", "1.10.0"));
        assert!(VersionComparator::is_older("8.16.0", "8.17.0"));
        assert!(VersionComparator::is_older("258.1", "258.2"));
        assert!(!VersionComparator::is_older("1.10.0", "1.9.0"));
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert!(VersionComparator::is_older("1.0", "1.0.1"));
        assert!(!VersionComparator::is_older("1.0.1", "1.0"));
    }

    #[test]
    fn test_alphabetic_runs() {
        assert!(VersionComparator::is_older("0.9.8y", "0.9.8z"));
        assert!(VersionComparator::is_older("1.0rc1", "1.0.1"));
        assert!(VersionComparator::is_older("2.0-alpha", "2.0-beta"));
    }

    #[test]
    fn test_leading_zeros_and_long_numbers() {
        assert_eq!(VersionComparator::compare("1.01", "1.1"), Ordering::Equal);
        assert!(!VersionComparator::is_older("1.01", "1.1"));
        assert!(VersionComparator::is_older(
            "1.99999999999999999999999",
            "1.100000000000000000000000"
        ));
    }

    #[test]
    fn test_date_like_versions_are_never_compared() {
        assert!(!VersionComparator::is_older("2024-01-01", "2024-06-01"));
        assert!(!VersionComparator::is_older("20240101", "20240601"));
        assert!(!VersionComparator::is_older("1.0", "2024-06-01"));
        assert!(!VersionComparator::is_older("20240101.1", "2.0"));
    }

    #[test]
    fn test_non_digit_versions_are_never_compared() {
        assert!(!VersionComparator::is_older("unstable-2024-01-01", "1.0"));
        assert!(!VersionComparator::is_older("1.0", "v2.0"));
        assert!(!VersionComparator::is_older("", "1.0"));
    }

    #[test]
    fn test_ordering_is_irreflexive_and_transitive() {
        let versions = [
            "0.9", "0.9.8y", "0.9.8z", "1", "1.0", "1.0rc1", "1.0.1", "1.2", "1.10", "2.0-alpha",
            "2.0-beta", "2.0", "10.0", "258.1", "258.2",
        ];
        for a in versions {
            assert!(!VersionComparator::is_older(a, a));
            for b in versions {
                for c in versions {
                    if VersionComparator::is_older(a, b) && VersionComparator::is_older(b, c) {
                        assert!(VersionComparator::is_older(a, c), "{a} < {b} < {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_tokenize() {
        let tokens: Vec<_> = tokenize("1.0rc1-beta_2").collect();
        assert_eq!(
            tokens,
            vec![
                Token::Num("1"),
                Token::Num("0"),
                Token::Alpha("rc"),
                Token::Num("1"),
                Token::Alpha("beta"),
                Token::Num("2"),
            ]
        );
    }
}
