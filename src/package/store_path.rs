//! Heuristic `name-version` extraction from Nix store paths.

use super::InstalledPackage;

/// Length of `<32-char hash>-` at the start of every store path basename.
pub const HASH_PREFIX_LEN: usize = 33;

/// Splits store path basenames into a package name and version.
///
/// Parsing never fails: when no usable version can be found the returned
/// package has an empty version and callers are expected to skip it.
#[derive(Debug, Clone, Default)]
pub struct StorePathParser {
    strip_suffixes: Vec<String>,
}

impl StorePathParser {
    pub fn new(strip_suffixes: Vec<String>) -> Self {
        Self { strip_suffixes }
    }

    pub fn parse(&self, path: &str) -> InstalledPackage {
        let basename = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        let remainder = match basename.char_indices().nth(HASH_PREFIX_LEN) {
            Some((offset, _)) => &basename[offset..],
            None => "",
        };

        let Some((name, raw_version)) = split_name_version(remainder) else {
            return InstalledPackage::new(remainder, "");
        };

        let version = self.strip_output_suffix(raw_version);

        // `foo-2` is far more likely a name with a trailing numeral than
        // package `foo` at version 2.
        let short_numeric = version.len() <= 2 && version.chars().all(|c| c.is_ascii_digit());
        let name_ends_in_digit = name.chars().last().is_some_and(|c| c.is_ascii_digit());
        if short_numeric && !name_ends_in_digit {
            return InstalledPackage::new(remainder, "");
        }

        InstalledPackage::new(name, version)
    }

    /// Remove trailing output names such as `-lib` or `_dev`.
    fn strip_output_suffix<'a>(&self, mut version: &'a str) -> &'a str {
        'strip: loop {
            for suffix in &self.strip_suffixes {
                if let Some(head) = version.strip_suffix(suffix.as_str())
                    && let Some(head) = head.strip_suffix(['-', '_'])
                    && !head.is_empty()
                {
                    version = head;
                    continue 'strip;
                }
            }
            return version;
        }
    }
}

/// Split at the first `-` that is followed by a well-formed version.
fn split_name_version(s: &str) -> Option<(&str, &str)> {
    s.match_indices('-')
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .find_map(|i| {
            let version = &s[i + 1..];
            is_version_like(version).then(|| (&s[..i], version))
        })
}

fn is_version_like(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
