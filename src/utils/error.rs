use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: u64, message: String },

    #[error("Encoding error: {message}")]
    EncodingError { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

/// 錯誤分類，供 CLI 記錄與決定處理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 匯入檔案或匯出資料本身的問題
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl MigrateError {
    pub fn parse(line: u64, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ParseError { .. }
            | Self::EncodingError { .. }
            | Self::CsvError(_)
            | Self::ValidationError { .. } => ErrorCategory::Data,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ParseError { .. } | Self::EncodingError { .. } | Self::CsvError(_) => {
                ErrorSeverity::Medium
            }
            Self::ValidationError { .. }
            | Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorSeverity::High,
            Self::IoError(_) | Self::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ParseError { line, .. } => format!(
                "Fix line {} of the import file or re-export it from the source site",
                line
            ),
            Self::EncodingError { .. } => {
                "Check the source site's shipping zones for duplicate ids or empty keys".to_string()
            }
            Self::CsvError(_) => "Make sure the file is a CSV/TSV export of this tool".to_string(),
            Self::IoError(_) => "Check that the paths exist and are writable".to_string(),
            Self::SerializationError(_) => {
                "The site document is not valid JSON; restore it from a backup".to_string()
            }
            Self::ConfigError { .. } | Self::ConfigValidationError { .. } => {
                "Check the configuration file syntax".to_string()
            }
            Self::InvalidConfigValueError { field, .. } => {
                format!("Correct the value of '{}'", field)
            }
            Self::MissingConfigError { field } => {
                format!("Provide '{}' on the command line or in the config file", field)
            }
            Self::ValidationError { .. } => {
                "Fix the reported shipping settings and try again".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ParseError { line, message } => {
                format!("Import rejected, line {}: {}", line, message)
            }
            Self::EncodingError { message } => format!("Export aborted: {}", message),
            Self::MissingConfigError { field } => format!("Missing setting: {}", field),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_reports_line() {
        let err = MigrateError::parse(7, "expected 9 columns, found 4");
        assert_eq!(
            err.to_string(),
            "Parse error at line 7: expected 9 columns, found 4"
        );
        assert_eq!(err.category(), ErrorCategory::Data);
        assert!(err.recovery_suggestion().contains("line 7"));
    }

    #[test]
    fn test_severity_ordering() {
        let io = MigrateError::IoError(std::io::Error::other("disk"));
        let missing = MigrateError::MissingConfigError {
            field: "site.path".to_string(),
        };
        assert!(io.severity() > missing.severity());
        assert!(missing.severity() > MigrateError::encoding("x").severity());
    }

    #[test]
    fn test_every_error_maps_to_an_exit_severity() {
        let cases = [
            (MigrateError::parse(2, "bad"), ErrorSeverity::Medium),
            (MigrateError::encoding("dup"), ErrorSeverity::Medium),
            (
                MigrateError::ValidationError {
                    message: "empty key".to_string(),
                },
                ErrorSeverity::High,
            ),
            (
                MigrateError::ConfigError {
                    message: "toml".to_string(),
                },
                ErrorSeverity::High,
            ),
            (
                MigrateError::IoError(std::io::Error::other("disk")),
                ErrorSeverity::Critical,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.severity(), expected, "{}", err);
        }
    }
}
