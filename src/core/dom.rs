//! Small query layer over `scraper`: first-match text and attribute lookups
//! where a missing node reads as an empty string.

use crate::config::SelectorConfig;
use crate::utils::error::{HspError, Result};
use scraper::{ElementRef, Selector};

/// Personal-details form fields the booking form echoes back, by form field name.
pub const PERSONAL_FIELDS: &[(&str, &str)] = &[
    ("sex", "input[name='sex'][checked]"),
    ("vorname", "input[name='vorname']"),
    ("name", "input[name='name']"),
    ("strasse", "input[name='strasse']"),
    ("ort", "input[name='ort']"),
    ("email", "input[name='email']"),
    ("telefon", "input[name='telefon']"),
    ("statusorig", "select[name='statusorig'] > option[selected]"),
];

#[derive(Debug, Clone)]
pub struct Selectors {
    pub sport_item: Selector,
    pub course_row: Selector,
    pub course_number: Selector,
    pub course_details: Selector,
    pub course_day: Selector,
    pub course_time: Selector,
    pub course_location: Selector,
    pub course_sessions: Selector,
    pub course_instructor: Selector,
    pub course_price: Selector,
    pub course_booking: Selector,
    pub session_date: Selector,
    pub session_time: Selector,
    pub cell: Selector,
    pub booking_token: Selector,
    pub booking_slot: Selector,
    pub form_data: Selector,
    pub price_count: Selector,
    pub consent: Selector,
    pub error_banner: Selector,
    pub error_message: Selector,
    pub error_link: Selector,
    pub confirmation: Selector,
    pub personal: Vec<(String, Selector)>,
}

impl Selectors {
    pub fn compile(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            sport_item: parse_selector("sport_item", &config.sport_item)?,
            course_row: parse_selector("course_row", &config.course_row)?,
            course_number: parse_selector("course_number", &config.course_number)?,
            course_details: parse_selector("course_details", &config.course_details)?,
            course_day: parse_selector("course_day", &config.course_day)?,
            course_time: parse_selector("course_time", &config.course_time)?,
            course_location: parse_selector("course_location", &config.course_location)?,
            course_sessions: parse_selector("course_sessions", &config.course_sessions)?,
            course_instructor: parse_selector("course_instructor", &config.course_instructor)?,
            course_price: parse_selector("course_price", &config.course_price)?,
            course_booking: parse_selector("course_booking", &config.course_booking)?,
            session_date: parse_selector("session_date", &config.session_date)?,
            session_time: parse_selector("session_time", &config.session_time)?,
            cell: parse_selector("cell", "td")?,
            booking_token: parse_selector("booking_token", &config.booking_token)?,
            booking_slot: parse_selector("booking_slot", &config.booking_slot)?,
            form_data: parse_selector("form_data", &config.form_data)?,
            price_count: parse_selector("price_count", &config.price_count)?,
            consent: parse_selector("consent", &config.consent)?,
            error_banner: parse_selector("error_banner", &config.error_banner)?,
            error_message: parse_selector("error_message", &config.error_message)?,
            error_link: parse_selector("error_link", &config.error_link)?,
            confirmation: parse_selector("confirmation", &config.confirmation)?,
            personal: PERSONAL_FIELDS
                .iter()
                .map(|(field, css)| Ok((field.to_string(), parse_selector(field, css)?)))
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

fn parse_selector(name: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| HspError::ConfigError {
        field: format!("selectors.{}", name),
        message: format!("invalid CSS selector '{}': {}", css, e),
    })
}

pub fn first<'a>(scope: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    scope.select(selector).next()
}

/// Whitespace-normalized text of the first match, empty when nothing matches.
pub fn text_of(scope: ElementRef<'_>, selector: &Selector) -> String {
    first(scope, selector)
        .map(element_text)
        .unwrap_or_default()
}

/// Attribute values are returned untouched; form tokens must round-trip byte for byte.
pub fn attr_of(scope: ElementRef<'_>, selector: &Selector, attr: &str) -> String {
    first(scope, selector)
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
        .unwrap_or_default()
}

pub fn value_of(scope: ElementRef<'_>, selector: &Selector) -> String {
    attr_of(scope, selector, "value")
}

pub fn element_text(el: ElementRef<'_>) -> String {
    normalize_ws(&el.text().collect::<String>())
}

/// Text nodes joined with spaces, for quoting whole rows in error messages.
pub fn joined_text(el: ElementRef<'_>) -> String {
    normalize_ws(&el.text().collect::<Vec<_>>().join(" "))
}

pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
