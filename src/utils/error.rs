use crate::core::startup::StartupStage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("{message}")]
    ValidationError { message: String },

    #[error("{message}")]
    TonalityError { message: String },

    #[error("File not found: {filename}")]
    NotFoundError { filename: String },

    #[error("Startup failed at stage '{stage}': {source}")]
    StartupError {
        stage: StartupStage,
        #[source]
        source: std::io::Error,
    },

    #[error("Privilege error: {message}")]
    PrivilegeError { message: String },
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Storage,
    Startup,
    Security,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError {
            message: message.into(),
        }
    }

    pub fn tonality(message: impl Into<String>) -> Self {
        AppError::TonalityError {
            message: message.into(),
        }
    }

    pub fn startup(stage: StartupStage, source: std::io::Error) -> Self {
        AppError::StartupError { stage, source }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::ConfigError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            AppError::ValidationError { .. }
            | AppError::TonalityError { .. } => ErrorCategory::Input,
            AppError::IoError(_) | AppError::NotFoundError { .. } => ErrorCategory::Storage,
            AppError::StartupError { .. } => ErrorCategory::Startup,
            AppError::PrivilegeError { .. } => ErrorCategory::Security,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Storage => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Startup | ErrorCategory::Security => ErrorSeverity::Critical,
        }
    }

    /// 依錯誤嚴重程度決定程序退出碼
    pub fn exit_code(&self) -> u8 {
        match self.severity() {
            ErrorSeverity::Low => 2,
            ErrorSeverity::Medium => 1,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            AppError::ConfigError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::ConfigValidationError { .. } => {
                "Check the command line flags, environment variables and config file"
            }
            AppError::ValidationError { .. } => "Check the request payload",
            AppError::TonalityError { .. } => {
                "Pass an explicit key (e.g. --key F) or provide more chords"
            }
            AppError::NotFoundError { .. } => "Check the file name",
            AppError::IoError(_) => "Check that the results directory exists and is writable",
            AppError::StartupError { stage, .. } => match stage {
                StartupStage::Bind => "Make sure the port is free (set PORT to pick another one)",
                StartupStage::AssignOwnership | StartupStage::DropPrivileges => {
                    "Start the server as root or as the run-as user itself"
                }
                _ => "Check that the results directory is writable by the run-as user",
            },
            AppError::PrivilegeError { .. } => {
                "Configure a non-root run-as uid/gid (RUN_AS_UID / RUN_AS_GID)"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AppError::StartupError { stage, source } => {
                format!("Server could not start ({}): {}", stage, source)
            }
            other => other.to_string(),
        }
    }
}
