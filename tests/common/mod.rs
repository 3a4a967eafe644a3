#![allow(dead_code)]

use hsp_booker::SiteConfig;

/// 以 MockServer 位址取代所有網站網址，並關閉重試延遲
pub fn site_config(base_url: &str) -> SiteConfig {
    let mut config = SiteConfig::default();
    config.site.directory_url = format!("{}/sportcampus/vona-z.html", base_url);
    config.site.sport_url_template = format!("{}/angebote/_{{sport}}.html", base_url);
    config.site.booking_url = format!("{}/cgi/anmeldung.fcgi", base_url);
    config.http.retry_delay_ms = 1;
    config.http.timeout_seconds = 5;
    config
}

pub fn catalog_page(rows: &str) -> String {
    format!(
        r#"<html><body><div class="bs_head">Judo</div>
        <table class="bs_kurse">
        <thead><tr><th>Kursnr</th><th>Details</th><th>Tag</th><th>Zeit</th></tr></thead>
        <tbody>{}</tbody></table></body></html>"#,
        rows
    )
}

pub fn course_row(number: &str, sessions_href: &str, state: &str) -> String {
    format!(
        r#"<tr>
          <td class="bs_sknr">{number}</td>
          <td class="bs_sdet">Anfänger</td>
          <td class="bs_stag">Di</td>
          <td class="bs_szeit">18:00-19:30</td>
          <td class="bs_sort"><a href="/halle.html">Sporthalle</a></td>
          <td class="bs_szr"><a href="{sessions_href}">17.10.-31.10.</a></td>
          <td class="bs_skl">Anna Meier</td>
          <td class="bs_spreis">20/ 30/ 40 EUR</td>
          <td class="bs_sbuch"><input type="submit" name="BS_Kursid_{number}" value="{state}"></td>
        </tr>"#
    )
}

pub fn sessions_page(rows: &str) -> String {
    format!(
        r#"<html><body><table class="bs_kurse">
        <thead><tr><th>Tag</th><th>Datum</th><th>Uhrzeit</th></tr></thead>
        <tbody>{}</tbody></table></body></html>"#,
        rows
    )
}
