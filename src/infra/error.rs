use thiserror::Error;

/// Failures raised while wiring the service together or talking to its
/// backing infrastructure.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("database: {0}")]
    Database(String),
    #[error("telemetry: {0}")]
    Telemetry(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl InfraError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
