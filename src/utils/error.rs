use thiserror::Error;

#[derive(Error, Debug)]
pub enum CurriculumError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown curriculum: {name}")]
    UnknownCurriculum { name: String },

    #[error("Log processing error: {message}")]
    ProcessingError { message: String },

    #[error("Maximum vocabulary capacity reached ({max_size} tokens)")]
    VocabularyFull { max_size: usize },

    #[error("Command '{program}' failed: {message}")]
    CommandError { program: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Storage,
    Data,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CurriculumError {
    pub fn processing(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TomlError(_)
            | Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::UnknownCurriculum { .. }
            | Self::ValidationError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::Storage,
            Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::ProcessingError { .. }
            | Self::VocabularyFull { .. } => ErrorCategory::Data,
            Self::CommandError { .. } => ErrorCategory::External,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::External => ErrorSeverity::Medium,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::TomlError(_) => "Check the TOML syntax of the configuration file".to_string(),
            Self::ConfigError { .. } | Self::MissingConfigError { .. } => {
                "Review the configuration file and command-line flags".to_string()
            }
            Self::InvalidConfigValueError { field, .. } => {
                format!("Provide a valid value for '{}'", field)
            }
            Self::UnknownCurriculum { .. } => {
                "Run `auto-curriculum curricula` to list the known curricula".to_string()
            }
            Self::CsvError(_) | Self::ProcessingError { .. } => {
                "Check that the model directory contains well-formed log.csv files".to_string()
            }
            Self::SerializationError(_) => "Delete the corrupted JSON file and retry".to_string(),
            Self::VocabularyFull { .. } => {
                "Use a fresh run directory or shorten the instruction set".to_string()
            }
            Self::CommandError { program, .. } => {
                format!("Make sure '{}' is installed and on PATH", program)
            }
            Self::IoError(_) => "Check file permissions and available disk space".to_string(),
            Self::ValidationError { .. } => "Fix the reported value and retry".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Storage => format!("Storage failure: {}", self),
            ErrorCategory::Data => format!("Could not process data: {}", self),
            ErrorCategory::External => format!("External program failed: {}", self),
        }
    }

    /// Process exit code for the binaries, keyed on severity.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, CurriculumError>;
