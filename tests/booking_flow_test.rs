mod common;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use common::{catalog_page, course_row};
use hsp_booker::config::SiteConfig;
use hsp_booker::core::catalog::parse_catalog;
use hsp_booker::{
    BookingEngine, BookingFailure, BookingState, Course, Credentials, HspError, Page,
    PageFetcher, Selectors,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const BOOKING_URL: &str = "https://booking.example.com/cgi/anmeldung.fcgi";
const CATALOG_URL: &str = "https://booking.example.com/angebote/_Judo.html";

#[derive(Debug, Clone)]
struct RecordedPost {
    fields: Vec<(String, String)>,
    referer: String,
}

impl RecordedPost {
    fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// 依序回傳預先準備的頁面，並記錄每一次請求
#[derive(Default)]
struct ScriptedFetcher {
    responses: Mutex<VecDeque<String>>,
    posts: Mutex<Vec<RecordedPost>>,
}

impl ScriptedFetcher {
    fn new(responses: &[String]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().cloned().collect()),
            posts: Mutex::new(Vec::new()),
        }
    }

    fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn get(&self, url: &str) -> hsp_booker::Result<Page> {
        panic!("unexpected GET {}", url);
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
        referer: &str,
    ) -> hsp_booker::Result<Page> {
        assert_eq!(url, BOOKING_URL);
        self.posts.lock().unwrap().push(RecordedPost {
            fields: fields.to_vec(),
            referer: referer.to_string(),
        });
        let body = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted response left");
        Ok(Page::new(url, body))
    }
}

fn config() -> SiteConfig {
    let mut config = SiteConfig::default();
    config.site.booking_url = BOOKING_URL.to_string();
    config
}

fn engine(fetcher: Arc<ScriptedFetcher>) -> BookingEngine<ScriptedFetcher> {
    let config = config();
    let selectors = Arc::new(config.compile_selectors().unwrap());
    BookingEngine::new(fetcher, &config, selectors)
}

fn course(state: &str) -> Course {
    let selectors = Selectors::compile(&config().selectors).unwrap();
    let page = Page::new(CATALOG_URL, catalog_page(&course_row("4711", "", state)));
    parse_catalog(&page, "Judo", &selectors).remove(0)
}

fn credentials() -> Credentials {
    Credentials::new("erika@example.com", "geheim")
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()
}

fn slot_page(slot_date: &str) -> String {
    format!(
        r#"<form><input type="hidden" name="fid" value="fid/+42">
           <input type="submit" name="BS_Termin_{}" value="buchen"></form>"#,
        slot_date
    )
}

fn identity_page() -> String {
    r#"<form><input name="pw_email"><input type="password" name="pw_pwd_fid/+42"></form>"#
        .to_string()
}

fn details_page(telefon: &str) -> String {
    format!(
        r#"<form>
           <input type="radio" name="sex" value="W" checked>
           <input name="vorname" value="Erika"><input name="name" value="Mustermann">
           <input name="strasse" value="Mittelweg 177"><input name="ort" value="20148 Hamburg">
           <input name="email" value="erika@example.com"><input name="telefon" value="{}">
           <select name="statusorig"><option value="S-UHH" selected>Student</option></select>
           </form>"#,
        telefon
    )
}

fn summary_page() -> String {
    r#"<form><input type="hidden" name="_formdata" value="b64+data==">
       <input type="hidden" name="preis_anz" value="20,00 EUR">
       <input type="hidden" name="tnbed" value="1"></form>"#
        .to_string()
}

fn protocol_pages(final_page: &str) -> Vec<String> {
    vec![
        slot_page("2024-01-09"),
        identity_page(),
        details_page("040 123456"),
        summary_page(),
        final_page.to_string(),
    ]
}

#[tokio::test]
async fn test_successful_booking_walks_every_state() -> Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new(&protocol_pages(
        r#"<div class="content"><div><span>Ihre Buchung war erfolgreich.</span></div></div>"#,
    )));

    let confirmation = engine(fetcher.clone())
        .register(&course("Vormerkliste"), &credentials(), date())
        .await?;

    assert_eq!(confirmation.course_number, "4711");
    assert_eq!(confirmation.date, date());
    assert_eq!(confirmation.message, "Ihre Buchung war erfolgreich.");
    assert_eq!(
        confirmation.states,
        vec![
            BookingState::Validated,
            BookingState::TokenAcquired,
            BookingState::SlotReserved,
            BookingState::IdentityChallenged,
            BookingState::DetailsSubmitted,
            BookingState::Confirmed,
        ]
    );

    let posts = fetcher.posts();
    assert_eq!(posts.len(), 5);

    assert_eq!(posts[0].referer, CATALOG_URL);
    assert_eq!(posts[0].field("BS_Kursid_4711"), Some("Vormerkliste"));
    assert!(posts[1..].iter().all(|p| p.referer == BOOKING_URL));

    assert_eq!(posts[1].field("fid"), Some("fid/+42"));
    assert_eq!(posts[1].field("BS_Termin_2024-01-09"), Some("buchen"));

    assert_eq!(posts[2].field("Termin"), Some("2024-01-09"));
    assert_eq!(posts[2].field("pw_email"), Some("erika@example.com"));
    assert_eq!(posts[2].field("pw_pwd_fid/+42"), Some("geheim"));

    assert_eq!(posts[3].field("sex"), Some("W"));
    assert_eq!(posts[3].field("statusorig"), Some("S-UHH"));
    assert_eq!(posts[3].field("tnbed"), Some("1"));
    assert_eq!(posts[3].field("Phase"), None);

    assert_eq!(posts[4].field("Phase"), Some("final"));
    assert_eq!(posts[4].field("_formdata"), Some("b64+data=="));
    assert_eq!(posts[4].field("preis_anz"), Some("20,00 EUR"));
    assert_eq!(posts[4].field("vorname"), Some("Erika"));
    assert_eq!(posts[4].field("fid"), Some("fid/+42"));
    Ok(())
}

#[tokio::test]
async fn test_banner_with_link_reports_already_registered() -> Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new(&protocol_pages(
        r#"<div class="bs_meldung"><div>Sie sind bereits für diesen Kurs angemeldet.</div>
           <a href="https://booking.example.com/buchung/4711">Zur Buchung</a></div>"#,
    )));

    let result = engine(fetcher.clone())
        .register(&course("Vormerkliste"), &credentials(), date())
        .await;

    match result {
        Err(HspError::BookingError { stage, failure }) => {
            assert_eq!(stage, BookingState::Confirmed);
            assert_eq!(
                failure,
                BookingFailure::AlreadyRegistered {
                    link: "https://booking.example.com/buchung/4711".to_string()
                }
            );
        }
        other => panic!("expected already registered, got {:?}", other),
    }
    assert_eq!(fetcher.posts().len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_banner_without_link_is_rejected() -> Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new(&protocol_pages(
        r#"<div class="bs_meldung"><div>Der Kurs ist leider ausgebucht.</div></div>"#,
    )));

    let result = engine(fetcher)
        .register(&course("Vormerkliste"), &credentials(), date())
        .await;

    assert!(matches!(
        result,
        Err(HspError::BookingError {
            failure: BookingFailure::Rejected { ref message },
            ..
        }) if message == "Der Kurs ist leider ausgebucht."
    ));
    Ok(())
}

#[tokio::test]
async fn test_final_page_without_banner_or_confirmation_is_ambiguous() -> Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new(&protocol_pages("<p>Vielen Dank</p>")));

    let result = engine(fetcher)
        .register(&course("Vormerkliste"), &credentials(), date())
        .await;

    assert!(matches!(
        result,
        Err(HspError::BookingError {
            stage: BookingState::Confirmed,
            failure: BookingFailure::AmbiguousResult,
        })
    ));
    Ok(())
}

#[tokio::test]
async fn test_date_mismatch_stops_after_first_request() -> Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new(&[slot_page("2024-01-16")]));

    let result = engine(fetcher.clone())
        .register(&course("Vormerkliste"), &credentials(), date())
        .await;

    match result {
        Err(HspError::BookingError { stage, failure }) => {
            assert_eq!(stage, BookingState::TokenAcquired);
            assert_eq!(
                failure,
                BookingFailure::DateMismatch {
                    expected: date(),
                    offered: NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
                }
            );
        }
        other => panic!("expected date mismatch, got {:?}", other),
    }
    assert_eq!(fetcher.posts().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_token_fails_at_token_step() -> Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new(&["<p>Kurs nicht buchbar</p>".to_string()]));

    let result = engine(fetcher.clone())
        .register(&course("Vormerkliste"), &credentials(), date())
        .await;

    match result {
        Err(HspError::BookingError {
            stage: BookingState::TokenAcquired,
            failure: BookingFailure::MissingFields { fields },
        }) => assert_eq!(fields, vec!["fid".to_string(), "time slot".to_string()]),
        other => panic!("expected missing fields, got {:?}", other),
    }
    assert_eq!(fetcher.posts().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_validation_failure_sends_nothing() -> Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::default());

    let result = engine(fetcher.clone())
        .register(
            &course("Warteliste"),
            &Credentials::new("erika@example.com", ""),
            date(),
        )
        .await;

    match result {
        Err(HspError::ValidationError { messages }) => {
            assert_eq!(messages.len(), 2, "{:?}", messages);
            assert!(messages.iter().any(|m| m.contains("not open")));
            assert!(messages.iter().any(|m| m == "password cannot be empty"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(fetcher.posts().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_empty_personal_details_mean_wrong_credentials() -> Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        slot_page("2024-01-09"),
        identity_page(),
        details_page(""),
    ]));

    let result = engine(fetcher.clone())
        .register(&course("Vormerkliste"), &credentials(), date())
        .await;

    match result {
        Err(HspError::BookingError {
            stage: BookingState::DetailsSubmitted,
            failure: BookingFailure::WrongCredentials { empty_fields },
        }) => assert_eq!(empty_fields, vec!["telefon".to_string()]),
        other => panic!("expected wrong credentials, got {:?}", other),
    }
    assert_eq!(fetcher.posts().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_missing_summary_fields_are_all_named() -> Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        slot_page("2024-01-09"),
        identity_page(),
        details_page("040 123456"),
        r#"<form><input type="hidden" name="tnbed" value="1"></form>"#.to_string(),
    ]));

    let result = engine(fetcher.clone())
        .register(&course("Vormerkliste"), &credentials(), date())
        .await;

    match result {
        Err(HspError::BookingError {
            stage: BookingState::Confirmed,
            failure: BookingFailure::MissingFields { fields },
        }) => assert_eq!(fields, vec!["_formdata".to_string(), "preis_anz".to_string()]),
        other => panic!("expected missing fields, got {:?}", other),
    }
    assert_eq!(fetcher.posts().len(), 4);
    Ok(())
}
