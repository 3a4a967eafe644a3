use crate::domain::model::{BookingFailure, BookingState};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HspError {
    #[error("HTTP request failed: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("HTTP {status} returned by {url}")]
    HttpStatusError { status: u16, url: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error in '{field}': {message}")]
    ConfigError { field: String, message: String },

    #[error("Parse error in {context}: {message} (raw: {fragment:?})")]
    ParseError {
        context: String,
        message: String,
        fragment: String,
    },

    #[error("Validation failed: {}", .messages.join("; "))]
    ValidationError { messages: Vec<String> },

    #[error("Course '{number}' not found in catalog of '{sport}'")]
    CourseNotFound { sport: String, number: String },

    #[error("Booking failed during {stage}: {failure}")]
    BookingError {
        stage: BookingState,
        failure: BookingFailure,
    },
}

/// 錯誤分類，對應傳輸、結構解析、前置驗證、協議狀態四大類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    Parse,
    Validation,
    Protocol,
    Config,
    NotFound,
}

impl ErrorCategory {
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCategory::Transport => 2,
            ErrorCategory::Parse => 3,
            ErrorCategory::Validation => 4,
            ErrorCategory::Protocol => 5,
            ErrorCategory::Config => 6,
            ErrorCategory::NotFound => 7,
        }
    }
}

impl HspError {
    pub fn parse(
        context: impl Into<String>,
        message: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        HspError::ParseError {
            context: context.into(),
            message: message.into(),
            fragment: fragment.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        HspError::ValidationError {
            messages: vec![message.into()],
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            HspError::TransportError(_) | HspError::HttpStatusError { .. } => {
                ErrorCategory::Transport
            }
            HspError::IoError(_) | HspError::UrlError(_) | HspError::ConfigError { .. } => {
                ErrorCategory::Config
            }
            HspError::ParseError { .. } => ErrorCategory::Parse,
            HspError::ValidationError { .. } => ErrorCategory::Validation,
            HspError::CourseNotFound { .. } => ErrorCategory::NotFound,
            HspError::BookingError { .. } => ErrorCategory::Protocol,
        }
    }

    /// 只有暫時性的傳輸錯誤可以重試；協議與解析錯誤代表與網站實際狀態不符
    pub fn is_retryable(&self) -> bool {
        match self {
            HspError::TransportError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            HspError::HttpStatusError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// 表單 POST 不是冪等的：只重試請求送出前的連線錯誤與伺服器拒絕的回應，
    /// 逾時可能代表伺服器已經處理過這一步
    pub fn is_safe_to_resend(&self) -> bool {
        match self {
            HspError::TransportError(e) => e.is_connect(),
            HspError::HttpStatusError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            HspError::TransportError(_) | HspError::HttpStatusError { .. } => {
                "Check the network connection and try again later".to_string()
            }
            HspError::IoError(_) | HspError::UrlError(_) | HspError::ConfigError { .. } => {
                "Check the configuration file and its URLs".to_string()
            }
            HspError::ParseError { .. } => {
                "The site markup changed; adjust the [selectors] section of the configuration"
                    .to_string()
            }
            HspError::ValidationError { .. } => {
                "Fix the listed inputs before retrying".to_string()
            }
            HspError::CourseNotFound { .. } => {
                "List the catalog of the sport to see the available course numbers".to_string()
            }
            HspError::BookingError { failure, .. } => match failure {
                BookingFailure::WrongCredentials { .. } => {
                    "Check email and password of the booking account".to_string()
                }
                BookingFailure::AlreadyRegistered { link } => {
                    format!("Open the existing booking: {}", link)
                }
                BookingFailure::DateMismatch { offered, .. } => {
                    format!("The next bookable date is {}", offered)
                }
                BookingFailure::AmbiguousResult => {
                    "If no confirmation email arrives, the booking did not go through".to_string()
                }
                BookingFailure::Rejected { .. } | BookingFailure::MissingFields { .. } => {
                    "Try booking through the website to see the full message".to_string()
                }
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, HspError>;
