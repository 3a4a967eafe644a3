use crate::config::SiteConfig;
use crate::core::dom::{self, Selectors};
use crate::core::sessions::parse_sessions;
use crate::core::{Course, EnrollmentState, Instructor, Page, PageFetcher, Price, Sport};
use crate::utils::error::{HspError, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use scraper::{ElementRef, Node};
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

/// 課程列與其日期子頁面連結；連結只在解析階段使用
#[derive(Debug, Clone)]
struct CourseRow {
    course: Course,
    sessions_href: Option<String>,
}

/// Course catalog extractor: sport directory, per-sport course tables and
/// the optional session sub-pages behind each course row.
pub struct CatalogExtractor<F: PageFetcher> {
    fetcher: Arc<F>,
    config: Arc<SiteConfig>,
    selectors: Arc<Selectors>,
    /// 所有 GET 共用的上限，巢狀的並行抓取也不會超過 concurrent_requests
    limiter: Semaphore,
}

impl<F: PageFetcher> CatalogExtractor<F> {
    pub fn new(fetcher: Arc<F>, config: Arc<SiteConfig>, selectors: Arc<Selectors>) -> Self {
        let limiter = Semaphore::new(config.http.concurrent_requests.max(1));
        Self {
            fetcher,
            config,
            selectors,
            limiter,
        }
    }

    /// 讀取 A–Z 運動項目目錄
    pub async fn list_sports(&self) -> Result<Vec<Sport>> {
        let page = self.get(&self.config.site.directory_url).await?;
        let sports = parse_sports(&page, &self.selectors, &self.config.site.flexicard_marker);
        tracing::info!("🏷️ Found {} bookable sports", sports.len());
        Ok(sports)
    }

    pub async fn list_flexicard_sports(&self) -> Result<Vec<Sport>> {
        let sports = self.list_sports().await?;
        Ok(sports.into_iter().filter(|s| s.in_flexicard).collect())
    }

    pub async fn courses(&self, sport: &Sport) -> Result<Vec<Course>> {
        self.load_catalog(&sport.name, &sport.href, false).await
    }

    pub async fn courses_with_sessions(&self, sport: &Sport) -> Result<Vec<Course>> {
        self.load_catalog(&sport.name, &sport.href, true).await
    }

    /// 同時抓取多個運動項目的課程表，結果順序與輸入相同
    pub async fn courses_for_sports(
        &self,
        sports: &[Sport],
        with_sessions: bool,
    ) -> Result<Vec<(Sport, Vec<Course>)>> {
        stream::iter(sports)
            .map(|sport| async move {
                let courses = self
                    .load_catalog(&sport.name, &sport.href, with_sessions)
                    .await?;
                Ok::<_, HspError>((sport.clone(), courses))
            })
            .buffered(self.concurrency())
            .try_collect()
            .await
    }

    /// Look up one course by its exact course number, sessions included.
    /// With duplicate numbers the first row in document order wins.
    pub async fn find_course(&self, sport_name: &str, number: &str) -> Result<Course> {
        let catalog_url = self.config.sport_url(sport_name);
        let page = self.get(&catalog_url).await?;

        let row = parse_course_rows(&page, sport_name, &self.selectors)
            .into_iter()
            .find(|row| row.course.number == number.trim())
            .ok_or_else(|| HspError::CourseNotFound {
                sport: sport_name.to_string(),
                number: number.to_string(),
            })?;

        let base = Url::parse(&page.url)?;
        self.attach_sessions(row, &base).await
    }

    async fn load_catalog(
        &self,
        sport_name: &str,
        catalog_url: &str,
        with_sessions: bool,
    ) -> Result<Vec<Course>> {
        tracing::debug!("📡 {}: Loading catalog from {}", sport_name, catalog_url);
        let page = self.get(catalog_url).await?;
        let rows = parse_course_rows(&page, sport_name, &self.selectors);

        if !with_sessions {
            tracing::info!("📥 {}: Extracted {} courses", sport_name, rows.len());
            return Ok(rows.into_iter().map(|row| row.course).collect());
        }

        let base = Url::parse(&page.url)?;
        let courses: Vec<Course> = stream::iter(rows)
            .map(|row| self.attach_sessions(row, &base))
            .buffered(self.concurrency())
            .try_collect()
            .await?;

        tracing::info!(
            "📥 {}: Extracted {} courses with {} sessions",
            sport_name,
            courses.len(),
            courses
                .iter()
                .map(|c| c.sessions.as_ref().map_or(0, Vec::len))
                .sum::<usize>()
        );
        Ok(courses)
    }

    async fn attach_sessions(&self, row: CourseRow, base: &Url) -> Result<Course> {
        let CourseRow {
            mut course,
            sessions_href,
        } = row;

        let sessions = match sessions_href.filter(|href| !href.is_empty()) {
            Some(href) => {
                let url = base.join(&href)?;
                let page = self.get(url.as_str()).await?;
                parse_sessions(&page, &self.selectors).inspect_err(|e| {
                    tracing::error!(
                        "❌ {}: Sessions of course {} failed: {}",
                        course.sport,
                        course.number,
                        e
                    );
                })?
            }
            None => Vec::new(),
        };

        course.sessions = Some(sessions);
        Ok(course)
    }

    async fn get(&self, url: &str) -> Result<Page> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| HspError::ConfigError {
                field: "http.concurrent_requests".to_string(),
                message: format!("request limiter unavailable: {}", e),
            })?;
        self.fetcher.get(url).await
    }

    fn concurrency(&self) -> usize {
        self.config.http.concurrent_requests.max(1)
    }
}

/// 解析課程表頁面（不含日期子頁面），保留網頁中的順序
pub fn parse_catalog(page: &Page, sport_name: &str, selectors: &Selectors) -> Vec<Course> {
    parse_course_rows(page, sport_name, selectors)
        .into_iter()
        .map(|row| row.course)
        .collect()
}

fn parse_course_rows(page: &Page, sport_name: &str, selectors: &Selectors) -> Vec<CourseRow> {
    let doc = page.document();
    let rows = doc
        .select(&selectors.course_row)
        .filter(|row| dom::first(*row, &selectors.cell).is_some())
        .map(|row| parse_course_row(row, sport_name, &page.url, selectors))
        .collect();
    rows
}

/// 每個欄位都可能缺少，缺少時為空字串而不是錯誤
fn parse_course_row(
    row: ElementRef<'_>,
    sport_name: &str,
    catalog_url: &str,
    selectors: &Selectors,
) -> CourseRow {
    let sessions_href = dom::first(row, &selectors.course_sessions)
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string());

    let course = Course {
        sport: sport_name.to_string(),
        catalog_url: catalog_url.to_string(),
        number: dom::text_of(row, &selectors.course_number),
        details: dom::text_of(row, &selectors.course_details),
        day: dom::text_of(row, &selectors.course_day),
        time: dom::text_of(row, &selectors.course_time),
        location: dom::text_of(row, &selectors.course_location),
        sessions: None,
        instructor: Instructor::parse(&dom::text_of(row, &selectors.course_instructor)),
        price: Price::parse(&dom::text_of(row, &selectors.course_price)),
        state: EnrollmentState::from_raw(&dom::value_of(row, &selectors.course_booking)),
        booking_id: dom::attr_of(row, &selectors.course_booking, "name"),
    };

    CourseRow {
        course,
        sessions_href,
    }
}

/// 目錄中只有絕對網址 (http/https) 的項目才是可預約的課程頁
pub fn parse_sports(page: &Page, selectors: &Selectors, flexicard_marker: &str) -> Vec<Sport> {
    let doc = page.document();
    let mut sports = Vec::new();

    for item in doc.select(&selectors.sport_item) {
        let Some(anchor) = item
            .children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "a")
        else {
            continue;
        };

        let name = dom::element_text(anchor);
        let href = anchor.value().attr("href").unwrap_or_default().trim().to_string();

        if name.is_empty() || !is_absolute_http(&href) {
            tracing::debug!("⏭️ Skipping directory entry '{}' ({})", name, href);
            continue;
        }

        let extra_info = dom::normalize_ws(
            &anchor
                .next_siblings()
                .map(|node| match node.value() {
                    Node::Text(text) => text.to_string(),
                    Node::Element(_) => ElementRef::wrap(node)
                        .map(|el| el.text().collect::<String>())
                        .unwrap_or_default(),
                    _ => String::new(),
                })
                .collect::<String>(),
        );

        sports.push(Sport {
            in_flexicard: extra_info.contains(flexicard_marker),
            name,
            href,
            extra_info,
        });
    }

    sports
}

fn is_absolute_http(href: &str) -> bool {
    Url::parse(href)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;

    fn selectors() -> Selectors {
        Selectors::compile(&SelectorConfig::default()).unwrap()
    }

    const CATALOG: &str = r#"<html><body><table class="bs_kurse">
        <thead><tr><th>Kursnr</th><th>Details</th></tr></thead>
        <tbody>
        <tr>
          <td class="bs_sknr">4711</td>
          <td class="bs_sdet">Anfänger</td>
          <td class="bs_stag">Di</td>
          <td class="bs_szeit">18:00-19:30</td>
          <td class="bs_sort"><a href="/halle1.html">Halle 1</a></td>
          <td class="bs_szr"><a href="/kurstermine/4711.html">17.10.-30.01.</a></td>
          <td class="bs_skl">Anna Meier</td>
          <td class="bs_spreis"><span>20/ 30/ 40/ 50 EUR</span></td>
          <td class="bs_sbuch"><input type="submit" name="BS_Kursid_4711" value="Vormerkliste"></td>
        </tr>
        <tr>
          <td class="bs_sknr">4712</td>
          <td class="bs_sdet">Fortgeschrittene</td>
          <td class="bs_stag">Do</td>
          <td class="bs_szeit">19:30-21:00</td>
          <td class="bs_sort"></td>
          <td class="bs_skl"></td>
          <td class="bs_spreis">entgeltfrei</td>
          <td class="bs_sbuch"><input type="submit" name="BS_Kursid_4712" value="Warteliste"></td>
        </tr>
        </tbody></table></body></html>"#;

    #[test]
    fn test_parse_catalog_full_and_sparse_rows() {
        let page = Page::new("https://example.com/_Judo.html", CATALOG);
        let courses = parse_catalog(&page, "Judo", &selectors());

        assert_eq!(courses.len(), 2);

        let a = &courses[0];
        assert_eq!(a.sport, "Judo");
        assert_eq!(a.catalog_url, "https://example.com/_Judo.html");
        assert_eq!(a.number, "4711");
        assert_eq!(a.details, "Anfänger");
        assert_eq!(a.day, "Di");
        assert_eq!(a.time, "18:00-19:30");
        assert_eq!(a.location, "Halle 1");
        assert_eq!(a.instructor, Instructor::Named(vec!["Anna Meier".to_string()]));
        assert!(matches!(a.price, Price::Tiered { .. }));
        assert_eq!(a.state, EnrollmentState::Open);
        assert_eq!(a.booking_id, "BS_Kursid_4711");
        assert!(a.sessions.is_none());
        assert!(a.is_bookable());

        let b = &courses[1];
        assert_eq!(b.location, "");
        assert_eq!(b.instructor, Instructor::Unassigned);
        assert!(matches!(b.price, Price::Free { .. }));
        assert_eq!(b.state, EnrollmentState::WaitingList);
        assert!(!b.is_bookable());
    }

    #[test]
    fn test_parse_catalog_empty_row_yields_empty_fields() {
        let page = Page::new(
            "https://example.com/_Judo.html",
            r#"<table class="bs_kurse"><tbody><tr><td></td></tr></tbody></table>"#,
        );
        let courses = parse_catalog(&page, "Judo", &selectors());

        assert_eq!(courses.len(), 1);
        let course = &courses[0];
        assert_eq!(course.number, "");
        assert_eq!(course.details, "");
        assert_eq!(course.location, "");
        assert_eq!(course.price.raw(), "");
        assert_eq!(course.state, EnrollmentState::Other(String::new()));
        assert_eq!(course.booking_id, "");
        assert!(!course.is_bookable());
    }

    #[test]
    fn test_parse_sports_filters_relative_links() {
        let page = Page::new(
            "https://example.com/vona-z.html",
            r#"<html><body><main><table><tr><td><ul>
              <li><a href="https://buchung.example.com/_Judo.html">Judo</a> ♥</li>
              <li><a href="https://buchung.example.com/_Yoga.html">Yoga</a> (nur Frauen)</li>
              <li><a href="/sportcampus/kinder.html">Kindersport</a></li>
              <li>ohne Link</li>
            </ul></td></tr></table></main></body></html>"#,
        );

        let sports = parse_sports(&page, &selectors(), "♥");

        assert_eq!(sports.len(), 2);
        assert_eq!(sports[0].name, "Judo");
        assert_eq!(sports[0].href, "https://buchung.example.com/_Judo.html");
        assert!(sports[0].in_flexicard);
        assert_eq!(sports[0].extra_info, "♥");
        assert_eq!(sports[1].name, "Yoga");
        assert!(!sports[1].in_flexicard);
        assert_eq!(sports[1].extra_info, "(nur Frauen)");
    }

    #[test]
    fn test_is_absolute_http() {
        assert!(is_absolute_http("https://example.com/a.html"));
        assert!(is_absolute_http("http://example.com/a.html"));
        assert!(!is_absolute_http("/a.html"));
        assert!(!is_absolute_http("mailto:info@example.com"));
        assert!(!is_absolute_http(""));
    }
}
