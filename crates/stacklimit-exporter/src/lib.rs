pub mod encoder;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod router;

pub use encoder::{MetricLine, SampleValue, encode, render_body};
pub use error::ScrapeError;
pub use pipeline::Scraper;
pub use router::{ExporterState, exporter_router};
