use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("config error: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("confirmation email not received after {cycles} resend cycles")]
    TimeoutExhausted { cycles: u32 },
}

impl EnrollError {
    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            EnrollError::Configuration(_) => "configuration",
            EnrollError::Transport(_) => "transport",
            EnrollError::Protocol(_) => "protocol",
            EnrollError::TimeoutExhausted { .. } => "timeout",
        }
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        EnrollError::Transport(err.to_string())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        EnrollError::Protocol(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, EnrollError>;
