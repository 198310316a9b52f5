use thiserror::Error;

#[derive(Error, Debug)]
pub enum BurstError {
    #[error("Unknown plugin kind '{0}', choices are {1}")]
    UnknownPluginKind(String, String),

    #[error("Plugin module '{0}' is malformed: {1}")]
    MalformedPluginModule(String, String),

    #[error("Plugin '{0}' is not valid: {1}")]
    InvalidPlugin(String, String),

    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Invalid plugin parameters: {0}")]
    Params(#[from] serde_json::Error),

    #[error("Burst execution failed: {0}")]
    Execution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BurstError>;
