//! Secret Manager resource names.
//!
//! Secret Manager is picky about the characters allowed in secret ids, so every key
//! handed to the cache is passed through [`sanitize`] before it becomes part of a
//! resource name.
//!
//! NOTE: any change to the sanitization rule breaks access to entries stored under
//! the old names.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DISALLOWED_CHARACTERS: Regex = Regex::new(r"[^a-zA-Z0-9_-]")
        .expect("DISALLOWED_CHARACTERS should be a valid regex pattern");
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
///
/// Distinct inputs can map to the same output (`a.b` and `a/b` both become `a_b`).
pub fn sanitize(value: &str) -> String {
    DISALLOWED_CHARACTERS.replace_all(value, "_").into_owned()
}

/// Resource names for one cache entry.
///
/// `project` is used verbatim; `prefix` and `key` are expected to be sanitized already.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretNames {
    project: String,
    secret_id: String,
}

impl SecretNames {
    pub fn new(project: &str, prefix: &str, key: &str) -> Self {
        Self { project: project.to_string(), secret_id: format!("{}{}", prefix, key) }
    }

    /// `<prefix><key>`
    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }

    /// `projects/<project>`
    pub fn project(&self) -> String {
        format!("projects/{}", self.project)
    }

    /// `projects/<project>/secrets/<prefix><key>`
    pub fn secret(&self) -> String {
        format!("projects/{}/secrets/{}", self.project, self.secret_id)
    }

    /// `projects/<project>/secrets/<prefix><key>/versions/latest`
    pub fn latest_version(&self) -> String {
        format!("{}/versions/latest", self.secret())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_passes_legal_characters() {
        assert_eq!(sanitize("abc-XYZ_019"), "abc-XYZ_019");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_sanitize_replaces_each_disallowed_character() {
        assert_eq!(sanitize("www.example.com"), "www_example_com");
        assert_eq!(sanitize("d!@#$$%^&*()"), "d___________");
        assert_eq!(sanitize("b.)(*&^$#@-_"), "b_________-_");
        assert_eq!(sanitize("example.com+rsa"), "example_com_rsa");
    }

    #[test]
    fn test_sanitize_non_ascii_is_one_underscore_per_character() {
        assert_eq!(sanitize("bücher.de"), "b_cher_de");
        assert_eq!(sanitize("日本"), "__");
    }

    #[test]
    fn test_sanitize_collisions_are_possible() {
        assert_eq!(sanitize("a.b"), sanitize("a/b"));
    }

    #[test]
    fn test_secret_names() {
        let names = SecretNames::new("my-project", "site-", "www_example_com");
        assert_eq!(names.secret_id(), "site-www_example_com");
        assert_eq!(names.project(), "projects/my-project");
        assert_eq!(names.secret(), "projects/my-project/secrets/site-www_example_com");
        assert_eq!(
            names.latest_version(),
            "projects/my-project/secrets/site-www_example_com/versions/latest"
        );
    }

    #[test]
    fn test_secret_names_do_not_touch_project() {
        let names = SecretNames::new("a!@#$_^&*()-", &sanitize("b.)(*&^$#@-_"), &sanitize("d!@#$$%^&*()"));
        assert_eq!(
            names.latest_version(),
            "projects/a!@#$_^&*()-/secrets/b_________-_d___________/versions/latest"
        );
    }
}
