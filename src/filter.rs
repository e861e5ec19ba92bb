//! Forbidden path filtering.

/// Substrings that exclude a path from processing by default.
///
/// Both separator variants are listed since matching is done on the literal path string.
pub const DEFAULT_FORBIDDEN: &[&str] = &[
    "Program Files/",
    "AppData/",
    "CrossDevice/",
    "Program Files\\",
    "AppData\\",
    "CrossDevice\\",
    "VS-Code",
    "vscode",
];

/// Case-sensitive substring filter for discovered paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFilter {
    forbidden: Vec<String>,
}

impl PathFilter {
    /// Create a filter from the given substrings. Empty strings are dropped.
    pub fn new<I, S>(forbidden: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let forbidden = forbidden
            .into_iter()
            .map(Into::into)
            .filter(|substring: &String| !substring.is_empty())
            .collect();
        Self { forbidden }
    }

    /// Filter with [`DEFAULT_FORBIDDEN`] plus the given extra substrings.
    pub fn with_defaults<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut forbidden: Vec<String> = DEFAULT_FORBIDDEN.iter().map(ToString::to_string).collect();
        for substring in extra.into_iter().map(Into::into) {
            if !forbidden.contains(&substring) {
                forbidden.push(substring);
            }
        }
        Self::new(forbidden)
    }

    /// Returns true if the path contains any forbidden substring.
    #[must_use]
    pub fn is_forbidden(&self, path: &str) -> bool {
        is_forbidden(path, &self.forbidden)
    }

    /// Configured substrings.
    #[must_use]
    pub fn substrings(&self) -> &[String] {
        &self.forbidden
    }

    /// Forbidden names without separators for display, deduplicated.
    #[must_use]
    pub fn display_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for substring in &self.forbidden {
            let name = substring.replace(['/', '\\'], "");
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new(DEFAULT_FORBIDDEN.iter().copied())
    }
}

/// Returns true if any of the substrings appears anywhere in `path`.
#[must_use]
pub fn is_forbidden(path: &str, forbidden_substrings: &[impl AsRef<str>]) -> bool {
    forbidden_substrings
        .iter()
        .map(AsRef::as_ref)
        .any(|substring| !substring.is_empty() && path.contains(substring))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_default_directories_with_both_separators() {
        let filter = PathFilter::default();
        assert!(filter.is_forbidden("C:/Users/me/AppData/cache.ts"));
        assert!(filter.is_forbidden(r"C:\Users\me\AppData\cache.ts"));
        assert!(filter.is_forbidden("/mnt/c/Program Files/app/intro.ts"));
        assert!(filter.is_forbidden("/home/me/.vscode/extensions/x.ts"));
    }

    #[test]
    fn allows_regular_recordings() {
        let filter = PathFilter::default();
        assert!(!filter.is_forbidden("/home/me/Videos/match.ts"));
        assert!(!filter.is_forbidden(r"D:\Recordings\2024\final.ts"));
    }

    #[test]
    fn match_is_case_sensitive() {
        let filter = PathFilter::default();
        assert!(!filter.is_forbidden("/home/me/appdata/clip.ts"));
        assert!(!filter.is_forbidden("/home/me/VSCODE/clip.ts"));
    }

    #[test]
    fn directory_name_without_separator_is_not_matched() {
        // "AppData/" requires the separator so a file named AppData.ts is allowed
        let filter = PathFilter::default();
        assert!(!filter.is_forbidden("/home/me/AppData.ts"));
    }

    #[test]
    fn empty_substring_never_matches() {
        assert!(!is_forbidden("/videos/clip.ts", &[""]));
        let filter = PathFilter::new(["", "tmp"]);
        assert_eq!(filter.substrings(), ["tmp"]);
    }

    #[test]
    fn extra_substrings_are_appended_once() {
        let filter = PathFilter::with_defaults(["Trash", "vscode"]);
        assert_eq!(filter.substrings().len(), DEFAULT_FORBIDDEN.len() + 1);
        assert!(filter.is_forbidden("/home/me/Trash/old.ts"));
    }

    #[test]
    fn display_names_strip_separators() {
        let filter = PathFilter::default();
        assert_eq!(
            filter.display_names(),
            vec!["Program Files", "AppData", "CrossDevice", "VS-Code", "vscode"]
        );
    }
}
