// ABOUTME: Validated project names.
// ABOUTME: Names end up in remote paths and supervisor process names, so the charset is restricted.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectNameError {
    #[error("project name cannot be empty")]
    Empty,

    #[error("project name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("project name must start with a letter or digit")]
    BadStart,

    #[error("invalid character in project name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectName(String);

impl ProjectName {
    pub fn new(value: &str) -> Result<Self, ProjectNameError> {
        let first = value.chars().next().ok_or(ProjectNameError::Empty)?;

        if value.len() > 63 {
            return Err(ProjectNameError::TooLong);
        }

        if !first.is_ascii_alphanumeric() {
            return Err(ProjectNameError::BadStart);
        }

        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(ProjectNameError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        for name in ["shop", "api-v2", "my_app", "site.example.com", "App1"] {
            assert!(ProjectName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_path_and_shell_characters() {
        assert_eq!(
            ProjectName::new("../etc"),
            Err(ProjectNameError::BadStart)
        );
        assert_eq!(
            ProjectName::new("a b"),
            Err(ProjectNameError::InvalidChar(' '))
        );
        assert_eq!(
            ProjectName::new("app;rm"),
            Err(ProjectNameError::InvalidChar(';'))
        );
        assert_eq!(ProjectName::new(""), Err(ProjectNameError::Empty));
        assert_eq!(
            ProjectName::new(&"a".repeat(64)),
            Err(ProjectNameError::TooLong)
        );
    }
}
