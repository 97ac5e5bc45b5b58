use std::fmt;

use thiserror::Error;

use crate::containers::RuntimeError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Infrastructure failures while provisioning. Except for [`ProvisionError::Ready`],
/// the convenience entry points route these through `Reporter::fatal`.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Failed to load settings: {0}")]
    Settings(#[source] anyhow::Error),

    #[error("Invalid container name {name:?}: {source}")]
    InvalidImage {
        name: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to get local image list - {0}")]
    CacheQuery(#[source] RuntimeError),

    #[error("Failed to pull image {image} - {source}")]
    Pull {
        image: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Bad image {image} - {source}")]
    Inspect {
        image: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to create container {image} - {source}")]
    Create {
        image: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to start container {image} ({id}) - {source}")]
    Start {
        image: String,
        id: String,
        #[source]
        source: RuntimeError,
    },

    #[error(transparent)]
    Ready(#[from] ReadyError),
}

/// A caller-supplied readiness callback returned an error.
#[derive(Debug, Error)]
#[error("Readiness callback for {image} failed: {source}")]
pub struct ReadyError {
    pub image: String,
    #[source]
    pub source: BoxError,
}

#[derive(Debug)]
pub struct TeardownFailure {
    pub id: String,
    pub image: String,
    pub source: RuntimeError,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.image, self.id, self.source)
    }
}

/// Every container that could not be stopped or removed during one close.
#[derive(Debug, Error)]
pub struct TeardownError {
    pub failures: Vec<TeardownFailure>,
}

impl fmt::Display for TeardownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} container(s) failed to tear down",
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_error_names_image_and_cause() {
        let err = ProvisionError::Pull {
            image: "postgres:13".into(),
            source: RuntimeError::PullFailed("manifest unknown".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("postgres:13"));
        assert!(msg.contains("manifest unknown"));
    }

    #[test]
    fn test_ready_error_is_transparent() {
        let err = ProvisionError::from(ReadyError {
            image: "redis:6".into(),
            source: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "Readiness callback for redis:6 failed: connection refused"
        );
    }

    #[test]
    fn test_teardown_error_lists_each_failure() {
        let err = TeardownError {
            failures: vec![
                TeardownFailure {
                    id: "a1".into(),
                    image: "redis:6".into(),
                    source: RuntimeError::ContainerNotFound("a1".into()),
                },
                TeardownFailure {
                    id: "b2".into(),
                    image: "postgres:13".into(),
                    source: RuntimeError::StopFailed("timeout".into()),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 container(s) failed to tear down"));
        assert!(msg.contains("redis:6 (a1)"));
        assert!(msg.contains("postgres:13 (b2)"));
    }
}
