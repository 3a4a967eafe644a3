pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::HttpFetcher;
pub use config::SiteConfig;
pub use core::booking::{BookingEngine, Confirmation, Credentials};
pub use core::catalog::CatalogExtractor;
pub use core::dom::Selectors;
pub use domain::model::{
    BookingFailure, BookingState, Course, EnrollmentState, Instructor, Price, Session, Sport,
};
pub use domain::ports::{Page, PageFetcher};
pub use utils::error::{HspError, Result};
