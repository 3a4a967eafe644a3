use anyhow::Context;
use clap::Parser;
use hsp_booker::config::cli::{Cli, Command};
use hsp_booker::utils::{logger, validation::Validate};
use hsp_booker::{
    BookingEngine, CatalogExtractor, Course, Credentials, HspError, HttpFetcher, SiteConfig, Sport,
};
use serde::Serialize;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<HspError>() {
            Some(err) => {
                tracing::error!("❌ {} (Category: {:?})", err, err.category());
                eprintln!("❌ {}", err);
                eprintln!("💡 {}", err.recovery_suggestion());
                std::process::exit(err.category().exit_code());
            }
            None => {
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path.display());
            SiteConfig::from_file(path)?
        }
        None => SiteConfig::default(),
    };
    config.validate()?;

    let selectors = Arc::new(config.compile_selectors()?);
    let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
    let config = Arc::new(config);
    let catalog = CatalogExtractor::new(fetcher.clone(), config.clone(), selectors.clone());

    match cli.command {
        Command::Sports { flexicard } => {
            let sports = if flexicard {
                catalog.list_flexicard_sports().await?
            } else {
                catalog.list_sports().await?
            };
            print_records(&sports, cli.json, print_sport)?;
        }
        Command::Courses { sport, sessions } => {
            let sport = Sport {
                href: config.sport_url(&sport),
                name: sport,
                in_flexicard: false,
                extra_info: String::new(),
            };
            let courses = if sessions {
                catalog.courses_with_sessions(&sport).await?
            } else {
                catalog.courses(&sport).await?
            };
            print_records(&courses, cli.json, print_course)?;
        }
        Command::Course { sport, number } => {
            let course = catalog.find_course(&sport, &number).await?;
            print_records(std::slice::from_ref(&course), cli.json, print_course)?;
        }
        Command::Book {
            sport,
            number,
            date,
            email,
            password,
        } => {
            let course = catalog.find_course(&sport, &number).await?;
            let engine = BookingEngine::new(fetcher, &config, selectors);
            let credentials = Credentials::new(email, password);
            let confirmation = engine.register(&course, &credentials, date).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&confirmation)?);
            } else {
                println!(
                    "✅ Booked course {} on {}: {}",
                    confirmation.course_number, confirmation.date, confirmation.message
                );
            }
        }
    }

    Ok(())
}

fn print_records<T: Serialize>(records: &[T], json: bool, line: fn(&T)) -> anyhow::Result<()> {
    if json {
        let out = serde_json::to_string_pretty(records).context("serializing records")?;
        println!("{}", out);
    } else {
        records.iter().for_each(line);
    }
    Ok(())
}

fn print_sport(sport: &Sport) {
    let marker = if sport.in_flexicard { "♥" } else { " " };
    if sport.extra_info.is_empty() {
        println!("{} {}", marker, sport.name);
    } else {
        println!("{} {} ({})", marker, sport.name, sport.extra_info);
    }
}

fn print_course(course: &Course) {
    println!(
        "{:<6} {:<4} {:<12} {:<24} {:<10} {}",
        course.number,
        course.day,
        course.time,
        course.location,
        course.state.to_string(),
        course.details
    );
    for session in course.sessions.iter().flatten() {
        match session.duration {
            Some(duration) => println!("       {} ({} min)", session.date, duration.as_secs() / 60),
            None => println!("       {}", session.date),
        }
    }
}
