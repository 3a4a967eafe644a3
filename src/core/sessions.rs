use crate::core::dom::{element_text, first, joined_text, Selectors};
use crate::core::{Page, Session};
use crate::utils::error::{HspError, Result};
use chrono::{NaiveDate, NaiveTime, Utc};
use std::time::Duration;

pub const DATE_FORMAT: &str = "%d.%m.%Y";
/// 網站的時間格式用句點分隔，例如 18.00-19.30
pub const TIME_FORMAT: &str = "%H.%M";

pub fn parse_date(cell: &str) -> std::result::Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(cell.trim(), DATE_FORMAT)
}

/// `None` for a malformed range or one whose end precedes its start.
pub fn parse_duration(cell: &str) -> Option<Duration> {
    let (from, to) = cell.split_once('-')?;
    let start = NaiveTime::parse_from_str(from.trim(), TIME_FORMAT).ok()?;
    let end = NaiveTime::parse_from_str(to.trim(), TIME_FORMAT).ok()?;
    (end - start).to_std().ok()
}

/// 解析課程日期子頁面；日期錯誤會中止整個解析，時間錯誤只會讓 duration 為空
pub fn parse_sessions(page: &Page, selectors: &Selectors) -> Result<Vec<Session>> {
    let doc = page.document();
    let discovered_at = Utc::now();
    let mut sessions = Vec::new();

    for row in doc.select(&selectors.course_row) {
        if first(row, &selectors.cell).is_none() {
            continue;
        }

        let raw_row = joined_text(row);
        let date_text = first(row, &selectors.session_date)
            .map(element_text)
            .ok_or_else(|| HspError::parse("session row", "date cell missing", raw_row.as_str()))?;

        let date = parse_date(&date_text).map_err(|e| {
            HspError::parse(
                "session row",
                format!("invalid date '{}': {}", date_text, e),
                raw_row.as_str(),
            )
        })?;

        let duration = first(row, &selectors.session_time)
            .and_then(|cell| parse_duration(&element_text(cell)));

        sessions.push(Session {
            date,
            duration,
            discovered_at,
        });
    }

    tracing::debug!("📅 Parsed {} sessions from {}", sessions.len(), page.url);
    Ok(sessions)
}
