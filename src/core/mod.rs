pub mod booking;
pub mod catalog;
pub mod dom;
pub mod sessions;

pub use crate::domain::model::{
    BookingFailure, BookingState, Course, EnrollmentState, Instructor, Price, Session, Sport,
    STATE_OPEN, STATE_WAITING_LIST,
};
pub use crate::domain::ports::{Page, PageFetcher};
pub use crate::utils::error::Result;
