// Domain layer: records scraped from the booking site and the fetcher port.

pub mod model;
pub mod ports;
