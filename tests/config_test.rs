use anyhow::Result;
use hsp_booker::utils::validation::Validate;
use hsp_booker::{HspError, SiteConfig};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_file_with_selector_override() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
[site]
booking_url = "https://staging.example.org/cgi/anmeldung.fcgi"
sport_url_template = "https://staging.example.org/angebote/_{{sport}}.html"

[http]
retry_attempts = 0

[selectors]
confirmation = "div#bestaetigung"
"#
    )?;

    let config = SiteConfig::from_file(file.path())?;
    config.validate()?;

    assert_eq!(config.http.retry_attempts, 0);
    assert_eq!(config.selectors.confirmation, "div#bestaetigung");
    assert_eq!(config.selectors.course_row, "table.bs_kurse > tbody > tr");
    assert_eq!(
        config.sport_url("Judo"),
        "https://staging.example.org/angebote/_Judo.html"
    );
    Ok(())
}

#[test]
fn test_missing_config_file_is_io_error() {
    let result = SiteConfig::from_file("/nonexistent/hsp-booker.toml");
    assert!(matches!(result, Err(HspError::IoError(_))));
}
