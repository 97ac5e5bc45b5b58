//! Image identity: `repository:tag` derived from a short user-supplied name.

use std::fmt;
use std::str::FromStr;

use super::error::RuntimeError;

pub const DEFAULT_TAG: &str = "latest";

/// A fully resolved image identity. Neither component is ever empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// Split `name` on its first `:`. A missing or empty tag becomes `latest`.
    pub fn parse(name: &str) -> Result<Self, RuntimeError> {
        let name = name.trim();
        let (repository, tag) = match name.split_once(':') {
            Some((repo, tag)) => (repo, tag),
            None => (name, ""),
        };

        if repository.is_empty() {
            return Err(RuntimeError::InvalidImageReference(name.to_string()));
        }

        let tag = if tag.is_empty() { DEFAULT_TAG } else { tag };

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    /// The `repository:tag` string used as cache key and pull target.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    /// Lowercase alphanumeric form of the repository, safe inside a container name.
    pub fn slug(&self) -> String {
        let last = self
            .repository
            .rsplit('/')
            .next()
            .unwrap_or(&self.repository);
        last.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect()
    }
}

impl FromStr for ImageRef {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_tag_to_latest() {
        let image = ImageRef::parse("redis").unwrap();
        assert_eq!(image.repository, "redis");
        assert_eq!(image.tag, "latest");
        assert_eq!(image.identity(), "redis:latest");
    }

    #[test]
    fn test_parse_keeps_explicit_tag() {
        let image = ImageRef::parse("redis:6-alpine").unwrap();
        assert_eq!(image.repository, "redis");
        assert_eq!(image.tag, "6-alpine");
    }

    #[test]
    fn test_parse_splits_on_first_colon() {
        let image = ImageRef::parse("postgres:13:extra").unwrap();
        assert_eq!(image.repository, "postgres");
        assert_eq!(image.tag, "13:extra");
    }

    #[test]
    fn test_parse_trailing_colon_gets_latest() {
        let image = ImageRef::parse("mongo:").unwrap();
        assert_eq!(image.identity(), "mongo:latest");
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        assert!(ImageRef::parse("").is_err());
        assert!(ImageRef::parse("   ").is_err());
        assert!(ImageRef::parse(":6").is_err());
    }

    #[test]
    fn test_display_matches_identity() {
        let image: ImageRef = "nginx:1.25".parse().unwrap();
        assert_eq!(image.to_string(), image.identity());
    }

    #[test]
    fn test_slug_uses_last_path_segment() {
        let image = ImageRef::parse("bitnami/Kafka_Server:3").unwrap();
        assert_eq!(image.slug(), "kafka-server");
    }
}
