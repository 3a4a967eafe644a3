use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hsp-booker")]
#[command(about = "Browse the university sports catalog and book courses")]
pub struct Cli {
    /// Path to TOML configuration file; built-in defaults when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print records as JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List all sports from the directory page
    Sports {
        /// Only sports bookable with the FlexiCard
        #[arg(long)]
        flexicard: bool,
    },

    /// List the courses of one sport
    Courses {
        sport: String,

        /// Also fetch the session dates of every course
        #[arg(long)]
        sessions: bool,
    },

    /// Show one course with its sessions
    Course { sport: String, number: String },

    /// Book a course on a given date
    Book {
        sport: String,
        number: String,

        /// Date of the session to book (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        email: String,

        #[arg(long, env = "HSP_PASSWORD", hide_env_values = true)]
        password: String,
    },
}
