//! Offer report rendering and publishing.
//!
//! Reports are rendered to JSON Lines or a JSON array and uploaded with
//! `rusty-multipart-storage`, one multipart session per report.

mod error;
mod publisher;
mod report;

pub use error::ReportError;
pub use publisher::{PublishOutcome, ReportPublisher};
pub use report::{parse_json_lines, render_report, write_json_lines, OfferReport, ReportFormat};
