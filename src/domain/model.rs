use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

/// 網站上「開放報名」按鈕的值
pub const STATE_OPEN: &str = "Vormerkliste";
pub const STATE_WAITING_LIST: &str = "Warteliste";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sport {
    pub name: String,
    pub href: String,
    pub in_flexicard: bool,
    pub extra_info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub sport: String,
    pub catalog_url: String,
    pub number: String,
    pub details: String,
    pub day: String,
    pub time: String,
    pub location: String,
    /// `None` when sessions were not requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<Session>>,
    pub instructor: Instructor,
    pub price: Price,
    pub state: EnrollmentState,
    /// 伺服器端表單欄位名稱，只在單次報名流程中有意義
    #[serde(skip)]
    pub(crate) booking_id: String,
}

impl Course {
    pub fn is_open(&self) -> bool {
        self.state == EnrollmentState::Open
    }

    pub fn is_bookable(&self) -> bool {
        self.is_open() && !self.booking_id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub date: NaiveDate,
    pub duration: Option<Duration>,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EnrollmentState {
    Open,
    WaitingList,
    Other(String),
}

impl EnrollmentState {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            STATE_OPEN => EnrollmentState::Open,
            STATE_WAITING_LIST => EnrollmentState::WaitingList,
            other => EnrollmentState::Other(other.to_string()),
        }
    }

    pub fn as_raw(&self) -> &str {
        match self {
            EnrollmentState::Open => STATE_OPEN,
            EnrollmentState::WaitingList => STATE_WAITING_LIST,
            EnrollmentState::Other(raw) => raw,
        }
    }
}

impl fmt::Display for EnrollmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrollmentState::Open => write!(f, "open"),
            EnrollmentState::WaitingList => write!(f, "waiting list"),
            EnrollmentState::Other(raw) if raw.is_empty() => write!(f, "unknown"),
            EnrollmentState::Other(raw) => write!(f, "{}", raw),
        }
    }
}

static PRICE_AMOUNT: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(\d+)(?:[.,](\d{1,2}))?").expect("valid price regex"));

const FREE_MARKERS: &[&str] = &["entgeltfrei", "kostenlos", "kostenfrei", "gebührenfrei"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Price {
    Free { raw: String },
    /// 依會員身分排列的金額（分），順序與網頁相同
    Tiered { amounts_cents: Vec<u32>, raw: String },
    Unparsed { raw: String },
}

impl Price {
    pub fn parse(text: &str) -> Self {
        let raw = text.trim().to_string();
        let lower = raw.to_lowercase();

        if FREE_MARKERS.iter().any(|marker| lower.contains(marker)) {
            return Price::Free { raw };
        }

        if lower.contains("eur") || raw.contains('€') {
            let amounts_cents: Vec<u32> = PRICE_AMOUNT
                .captures_iter(&raw)
                .filter_map(|caps| {
                    let euros: u32 = caps[1].parse().ok()?;
                    let cents = match caps.get(2).map(|m| m.as_str()) {
                        Some(c) if c.len() == 1 => c.parse::<u32>().ok()? * 10,
                        Some(c) => c.parse::<u32>().ok()?,
                        None => 0,
                    };
                    euros.checked_mul(100)?.checked_add(cents)
                })
                .collect();

            if !amounts_cents.is_empty() {
                return Price::Tiered { amounts_cents, raw };
            }
        }

        Price::Unparsed { raw }
    }

    pub fn raw(&self) -> &str {
        match self {
            Price::Free { raw } | Price::Tiered { raw, .. } | Price::Unparsed { raw } => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Instructor {
    Named(Vec<String>),
    Unassigned,
}

impl Instructor {
    pub fn parse(text: &str) -> Self {
        let names: Vec<String> = text
            .split([',', '/'])
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            Instructor::Unassigned
        } else {
            Instructor::Named(names)
        }
    }
}

impl fmt::Display for Instructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instructor::Named(names) => write!(f, "{}", names.join(", ")),
            Instructor::Unassigned => Ok(()),
        }
    }
}

/// 報名流程的狀態機
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BookingState {
    Validated,
    TokenAcquired,
    SlotReserved,
    IdentityChallenged,
    DetailsSubmitted,
    Confirmed,
    Failed,
}

impl BookingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingState::Confirmed | BookingState::Failed)
    }
}

impl fmt::Display for BookingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingState::Validated => "Validated",
            BookingState::TokenAcquired => "TokenAcquired",
            BookingState::SlotReserved => "SlotReserved",
            BookingState::IdentityChallenged => "IdentityChallenged",
            BookingState::DetailsSubmitted => "DetailsSubmitted",
            BookingState::Confirmed => "Confirmed",
            BookingState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingFailure {
    #[error("requested date {expected} does not match the offered slot {offered}")]
    DateMismatch {
        expected: NaiveDate,
        offered: NaiveDate,
    },

    #[error("expected form fields missing: {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("personal details empty ({}), email or password is probably wrong", .empty_fields.join(", "))]
    WrongCredentials { empty_fields: Vec<String> },

    #[error("already registered: {link}")]
    AlreadyRegistered { link: String },

    #[error("booking rejected: {message}")]
    Rejected { message: String },

    #[error("no confirmation found; if no email arrives, you are probably not registered")]
    AmbiguousResult,
}
