use log::warn;

/// Glob based filter for package names that should never be reported.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<glob::Pattern>,
}

impl ExclusionFilter {
    /// Compile the given glob patterns. Invalid patterns are skipped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p.as_ref()) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid exclusion pattern {:?}: {}", p.as_ref(), e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }
}
