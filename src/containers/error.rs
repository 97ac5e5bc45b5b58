use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Container runtime is not installed")]
    NotInstalled,

    #[error("Container daemon is not running")]
    DaemonNotRunning,

    #[error("Permission denied talking to the container daemon")]
    PermissionDenied,

    #[error("Invalid image reference: {0:?}")]
    InvalidImageReference(String),

    #[error("Invalid port binding {0:?}, expected containerPort[/proto]:hostPort")]
    InvalidPortBinding(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Failed to pull image: {0}")]
    PullFailed(String),

    #[error("Failed to inspect image: {0}")]
    InspectFailed(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Container already exists: {0}")]
    ContainerAlreadyExists(String),

    #[error("Failed to create container: {0}")]
    CreateFailed(String),

    #[error("Failed to start container: {0}")]
    StartFailed(String),

    #[error("Failed to stop container: {0}")]
    StopFailed(String),

    #[error("Failed to kill container: {0}")]
    KillFailed(String),

    #[error("Failed to remove container: {0}")]
    RemoveFailed(String),

    #[error("Failed to fetch logs: {0}")]
    LogsFailed(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
