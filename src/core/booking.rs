use crate::config::SiteConfig;
use crate::core::dom::{self, Selectors};
use crate::core::{BookingFailure, BookingState, Course, Page, PageFetcher, STATE_OPEN};
use crate::utils::error::{HspError, Result};
use crate::utils::validation::{self, Validate};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

const SLOT_PREFIX: &str = "BS_Termin_";
const SLOT_DATE_FORMAT: &str = "%Y-%m-%d";
const SLOT_ACTION: &str = "buchen";

/// 報名帳號；密碼不會出現在 Debug 輸出與日誌中
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub course_number: String,
    pub date: NaiveDate,
    pub message: String,
    /// 本次報名經過的狀態，依序排列
    pub states: Vec<BookingState>,
}

/// Form values threaded between protocol steps. Keys are only ever added or
/// overwritten, never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(BTreeMap<String, String>);

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[cfg(test)]
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn empty_fields(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(k, _)| k.clone())
            .collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.len()
    }
}

/// 單次報名的暫存狀態；fid 與時段欄位名只存在於這個值中
struct BookingAttempt<'a> {
    course: &'a Course,
    token: String,
    slot_key: String,
    slot: String,
    fields: FormFields,
    state: BookingState,
    history: Vec<BookingState>,
}

impl<'a> BookingAttempt<'a> {
    fn new(course: &'a Course) -> Self {
        Self {
            course,
            token: String::new(),
            slot_key: String::new(),
            slot: String::new(),
            fields: FormFields::new(),
            state: BookingState::Validated,
            history: vec![BookingState::Validated],
        }
    }

    fn advance(&mut self, next: BookingState) {
        debug_assert!(
            !self.state.is_terminal(),
            "advance from terminal state {}",
            self.state
        );
        tracing::info!(
            "🔄 Course {}: {} -> {}",
            self.course.number,
            self.state,
            next
        );
        self.state = next;
        self.history.push(next);
    }

    /// `stage` is the step that was in progress, not the last one reached.
    fn fail(&mut self, stage: BookingState, failure: BookingFailure) -> HspError {
        debug_assert!(!self.state.is_terminal());
        tracing::warn!(
            "❌ Course {}: failed during {} after {}: {}",
            self.course.number,
            stage,
            self.state,
            failure
        );
        self.state = BookingState::Failed;
        self.history.push(BookingState::Failed);
        HspError::BookingError { stage, failure }
    }
}

struct BookingRequest<'a> {
    course: &'a Course,
    credentials: &'a Credentials,
}

impl Validate for BookingRequest<'_> {
    fn validate(&self) -> Result<()> {
        let state_check = if self.course.is_open() {
            Ok(())
        } else {
            Err(HspError::validation(format!(
                "course {} is not open for booking (state: {})",
                self.course.number, self.course.state
            )))
        };

        validation::join_violations([
            validation::validate_non_empty_string("booking identifier", &self.course.booking_id),
            validation::validate_non_empty_string("sport", &self.course.sport),
            state_check,
            validation::validate_non_empty_string("email", &self.credentials.email),
            validation::validate_non_empty_string("password", &self.credentials.password),
        ])
    }
}

/// 依序執行報名協議的每個步驟，每個步驟只送出一次請求
pub struct BookingEngine<F: PageFetcher> {
    fetcher: Arc<F>,
    booking_url: String,
    selectors: Arc<Selectors>,
}

impl<F: PageFetcher> BookingEngine<F> {
    pub fn new(fetcher: Arc<F>, config: &SiteConfig, selectors: Arc<Selectors>) -> Self {
        Self {
            fetcher,
            booking_url: config.site.booking_url.clone(),
            selectors,
        }
    }

    pub async fn register(
        &self,
        course: &Course,
        credentials: &Credentials,
        date: NaiveDate,
    ) -> Result<Confirmation> {
        BookingRequest {
            course,
            credentials,
        }
        .validate()?;

        let mut attempt = BookingAttempt::new(course);
        tracing::info!(
            "📝 Booking {} course {} on {}",
            course.sport,
            course.number,
            date
        );

        self.acquire_token(&mut attempt, date).await?;
        self.reserve_slot(&mut attempt).await?;
        let details = self.challenge_identity(&mut attempt, credentials).await?;
        let summary = self.submit_details(&mut attempt, &details).await?;
        let message = self.confirm(&mut attempt, &summary).await?;

        Ok(Confirmation {
            course_number: course.number.clone(),
            date,
            message,
            states: attempt.history,
        })
    }

    async fn acquire_token(&self, attempt: &mut BookingAttempt<'_>, date: NaiveDate) -> Result<()> {
        let stage = BookingState::TokenAcquired;
        let fields = vec![(attempt.course.booking_id.clone(), STATE_OPEN.to_string())];
        let page = self
            .fetcher
            .post_form(&self.booking_url, &fields, &attempt.course.catalog_url)
            .await?;

        let (token, slot_key) = read_token_and_slot(&page, &self.selectors);
        let missing: Vec<String> = [("fid", &token), ("time slot", &slot_key)]
            .into_iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(k, _)| k.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(attempt.fail(stage, BookingFailure::MissingFields { fields: missing }));
        }

        let (slot, offered) = parse_slot_key(&slot_key)?;
        if offered != date {
            return Err(attempt.fail(
                stage,
                BookingFailure::DateMismatch {
                    expected: date,
                    offered,
                },
            ));
        }

        attempt.token = token;
        attempt.slot_key = slot_key;
        attempt.slot = slot;
        attempt.advance(stage);
        Ok(())
    }

    async fn reserve_slot(&self, attempt: &mut BookingAttempt<'_>) -> Result<()> {
        let fields = vec![
            ("fid".to_string(), attempt.token.clone()),
            (attempt.slot_key.clone(), SLOT_ACTION.to_string()),
        ];
        self.post(&fields).await?;
        attempt.advance(BookingState::SlotReserved);
        Ok(())
    }

    async fn challenge_identity(
        &self,
        attempt: &mut BookingAttempt<'_>,
        credentials: &Credentials,
    ) -> Result<Page> {
        let fields = vec![
            ("fid".to_string(), attempt.token.clone()),
            ("Termin".to_string(), attempt.slot.clone()),
            ("pw_email".to_string(), credentials.email.clone()),
            (format!("pw_pwd_{}", attempt.token), credentials.password.clone()),
        ];
        let page = self.post(&fields).await?;
        attempt.advance(BookingState::IdentityChallenged);
        Ok(page)
    }

    async fn submit_details(&self, attempt: &mut BookingAttempt<'_>, details: &Page) -> Result<Page> {
        let stage = BookingState::DetailsSubmitted;
        let mut fields = read_personal_details(details, &self.selectors);

        let empty_fields = fields.empty_fields();
        if !empty_fields.is_empty() {
            return Err(attempt.fail(stage, BookingFailure::WrongCredentials { empty_fields }));
        }

        fields.set("fid", attempt.token.clone());
        fields.set("Termin", attempt.slot.clone());
        fields.set("tnbed", "1");

        let page = self.post(&fields.pairs()).await?;
        attempt.fields = fields;
        attempt.advance(stage);
        Ok(page)
    }

    async fn confirm(&self, attempt: &mut BookingAttempt<'_>, summary: &Page) -> Result<String> {
        let stage = BookingState::Confirmed;
        let (form_data, price_count, consent) = read_final_fields(summary, &self.selectors);
        attempt.fields.set("Phase", "final");
        attempt.fields.set("_formdata", form_data);
        attempt.fields.set("preis_anz", price_count);
        attempt.fields.set("tnbed", consent);

        let fields = attempt.fields.empty_fields();
        if !fields.is_empty() {
            return Err(attempt.fail(stage, BookingFailure::MissingFields { fields }));
        }

        let page = self.post(&attempt.fields.pairs()).await?;
        match classify_outcome(&page, &self.selectors) {
            Ok(message) => {
                attempt.advance(stage);
                tracing::info!("✅ Course {} booked: {}", attempt.course.number, message);
                Ok(message)
            }
            Err(failure) => Err(attempt.fail(stage, failure)),
        }
    }

    async fn post(&self, fields: &[(String, String)]) -> Result<Page> {
        self.fetcher
            .post_form(&self.booking_url, fields, &self.booking_url)
            .await
    }
}

/// 第二步回應中的 fid 與時段欄位名 (例如 `BS_Termin_2024-01-09`)
pub fn read_token_and_slot(page: &Page, selectors: &Selectors) -> (String, String) {
    let doc = page.document();
    let root = doc.root_element();
    (
        dom::value_of(root, &selectors.booking_token),
        dom::attr_of(root, &selectors.booking_slot, "name"),
    )
}

/// Splits `BS_Termin_YYYY-MM-DD` into the raw slot value and its date.
pub fn parse_slot_key(slot_key: &str) -> Result<(String, NaiveDate)> {
    let slot = slot_key.strip_prefix(SLOT_PREFIX).unwrap_or(slot_key);
    let date = NaiveDate::parse_from_str(slot, SLOT_DATE_FORMAT).map_err(|e| {
        HspError::parse("booking time slot", format!("invalid slot date: {}", e), slot_key)
    })?;
    Ok((slot.to_string(), date))
}

pub fn read_personal_details(page: &Page, selectors: &Selectors) -> FormFields {
    let doc = page.document();
    let root = doc.root_element();
    let mut fields = FormFields::new();
    for (name, selector) in &selectors.personal {
        fields.set(name.clone(), dom::value_of(root, selector));
    }
    fields
}

/// `_formdata`, `preis_anz` and `tnbed` echoed by the summary page
pub fn read_final_fields(page: &Page, selectors: &Selectors) -> (String, String, String) {
    let doc = page.document();
    let root = doc.root_element();
    (
        dom::value_of(root, &selectors.form_data),
        dom::value_of(root, &selectors.price_count),
        dom::value_of(root, &selectors.consent),
    )
}

/// 判斷最終頁面：錯誤訊息優先，其次是確認文字，兩者皆無則無法判定
pub fn classify_outcome(
    page: &Page,
    selectors: &Selectors,
) -> std::result::Result<String, BookingFailure> {
    let doc = page.document();
    let root = doc.root_element();

    if let Some(banner) = dom::first(root, &selectors.error_banner) {
        let banner_text = dom::element_text(banner);
        if !banner_text.is_empty() {
            let link = dom::attr_of(root, &selectors.error_link, "href");
            if !link.is_empty() {
                return Err(BookingFailure::AlreadyRegistered { link });
            }
            let message = dom::text_of(root, &selectors.error_message);
            return Err(BookingFailure::Rejected {
                message: if message.is_empty() { banner_text } else { message },
            });
        }
    }

    let confirmation = dom::text_of(root, &selectors.confirmation);
    if confirmation.is_empty() {
        Err(BookingFailure::AmbiguousResult)
    } else {
        Ok(confirmation)
    }
}
