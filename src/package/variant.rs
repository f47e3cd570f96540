use super::RepositoryIndex;

/// Detects installed packages that are pinned major-version variants.
///
/// An installed `tesseract 4.2.0` is not outdated just because the
/// unqualified `tesseract` moved to 5.x when nixpkgs still ships
/// `tesseract4 = 4.2.0`.
#[derive(Debug, Clone, Default)]
pub struct VariantReconciler {
    prefix_templates: Vec<String>,
}

impl VariantReconciler {
    /// `prefix_templates` are namespace names with a `{major}` placeholder,
    /// e.g. `qt{major}` looks up `qt5.<name>` for an installed 5.x package.
    pub fn new(prefix_templates: Vec<String>) -> Self {
        Self { prefix_templates }
    }

    /// Whether reporting `installed -> latest` for `name` would be a false
    /// positive caused by a major-version variant.
    pub fn is_variant(
        &self,
        index: &RepositoryIndex,
        name: &str,
        installed: &str,
        latest: &str,
    ) -> bool {
        let Some(installed_major) = major_version(installed) else {
            return false;
        };
        if major_version(latest) == Some(installed_major) {
            return false;
        }

        let matches = |key: &str| index.get(key).is_some_and(|v| v == installed);

        if matches(&format!("{}{}", name, installed_major)) {
            return true;
        }

        self.prefix_templates.iter().any(|template| {
            let namespace = template.replace("{major}", installed_major);
            matches(&format!("{}.{}", namespace, name))
        })
    }
}

/// Leading numeric major version: `4` for `4.2.0` and for `4`.
fn major_version(version: &str) -> Option<&str> {
    let major = version.split('.').next()?;
    (!major.is_empty() && major.chars().all(|c| c.is_ascii_digit())).then_some(major)
}
