#[cfg(feature = "cli")]
pub mod cli;

use crate::core::dom::Selectors;
use crate::utils::error::{HspError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"));

pub const SPORT_PLACEHOLDER: &str = "{sport}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site: SiteSection,
    pub http: HttpConfig,
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    pub directory_url: String,
    pub sport_url_template: String,
    pub booking_url: String,
    pub flexicard_marker: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            directory_url: "https://www.hochschulsport.uni-hamburg.de/sportcampus/vona-z.html"
                .to_string(),
            sport_url_template:
                "https://buchung.hochschulsport-hamburg.de/angebote/aktueller_zeitraum/_{sport}.html"
                    .to_string(),
            booking_url: "https://buchung.hochschulsport-hamburg.de/cgi/anmeldung.fcgi"
                .to_string(),
            flexicard_marker: "♥".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    /// 額外重試次數，不含第一次請求
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub concurrent_requests: usize,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 2,
            retry_delay_ms: 500,
            concurrent_requests: 4,
            user_agent: concat!("hsp-booker/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// CSS selectors for every piece of markup the scraper reads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub sport_item: String,
    pub course_row: String,
    pub course_number: String,
    pub course_details: String,
    pub course_day: String,
    pub course_time: String,
    pub course_location: String,
    pub course_sessions: String,
    pub course_instructor: String,
    pub course_price: String,
    pub course_booking: String,
    pub session_date: String,
    pub session_time: String,
    pub booking_token: String,
    pub booking_slot: String,
    pub form_data: String,
    pub price_count: String,
    pub consent: String,
    pub error_banner: String,
    pub error_message: String,
    pub error_link: String,
    pub confirmation: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            sport_item: "main table li".to_string(),
            course_row: "table.bs_kurse > tbody > tr".to_string(),
            course_number: "td.bs_sknr".to_string(),
            course_details: "td.bs_sdet".to_string(),
            course_day: "td.bs_stag".to_string(),
            course_time: "td.bs_szeit".to_string(),
            course_location: "td.bs_sort a".to_string(),
            course_sessions: "td.bs_szr a".to_string(),
            course_instructor: "td.bs_skl".to_string(),
            course_price: "td.bs_spreis".to_string(),
            course_booking: "td.bs_sbuch input".to_string(),
            session_date: "td:nth-child(2)".to_string(),
            session_time: "td:nth-child(3)".to_string(),
            booking_token: "input[name='fid']".to_string(),
            booking_slot: "input[value='buchen']".to_string(),
            form_data: "input[name='_formdata']".to_string(),
            price_count: "input[name='preis_anz']".to_string(),
            consent: "input[name='tnbed']".to_string(),
            error_banner: "div.bs_meldung".to_string(),
            error_message: "div.bs_meldung > div".to_string(),
            error_link: "div.bs_meldung a".to_string(),
            confirmation: "div.content > div > span:first-of-type".to_string(),
        }
    }
}

impl SiteConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置，未列出的欄位使用預設值
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| HspError::ConfigError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${HSP_BOOKING_URL})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn sport_url(&self, sport_name: &str) -> String {
        self.site
            .sport_url_template
            .replace(SPORT_PLACEHOLDER, &sport_name.trim().replace(' ', "_"))
    }

    pub fn compile_selectors(&self) -> Result<Selectors> {
        Selectors::compile(&self.selectors)
    }
}

impl Validate for SiteConfig {
    fn validate(&self) -> Result<()> {
        let sample_sport_url = self.sport_url("Judo");

        validation::join_violations([
            validation::validate_url("site.directory_url", &self.site.directory_url),
            validation::validate_url("site.booking_url", &self.site.booking_url),
            validation::validate_contains(
                "site.sport_url_template",
                &self.site.sport_url_template,
                SPORT_PLACEHOLDER,
            ),
            validation::validate_url("site.sport_url_template", &sample_sport_url),
            validation::validate_non_empty_string(
                "site.flexicard_marker",
                &self.site.flexicard_marker,
            ),
            validation::validate_positive_number("http.timeout_seconds", self.http.timeout_seconds, 1),
            validation::validate_positive_number(
                "http.concurrent_requests",
                self.http.concurrent_requests as u64,
                1,
            ),
            self.compile_selectors().map(|_| ()),
        ])
    }
}
