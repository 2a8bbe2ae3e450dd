//! Offer report records and their wire formats.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// One failed offer for a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferReport {
    pub customer_id: String,
    pub product_id: String,
    pub error_message: String,
}

impl OfferReport {
    /// Create a record.
    pub fn new(
        customer_id: impl Into<String>,
        product_id: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            product_id: product_id.into(),
            error_message: error_message.into(),
        }
    }
}

/// Serialized layout of a report object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// One JSON object per line.
    #[default]
    JsonLines,
    /// A single JSON array.
    JsonArray,
}

impl ReportFormat {
    /// MIME type of the rendered object.
    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::JsonLines => "application/x-ndjson",
            ReportFormat::JsonArray => "application/json",
        }
    }

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::JsonLines => "jsonl",
            ReportFormat::JsonArray => "json",
        }
    }
}

/// Render records in the given format.
///
/// # Returns
/// UTF-8 bytes. JSON Lines output ends with a newline unless empty.
pub fn render_report(records: &[OfferReport], format: ReportFormat) -> Result<Vec<u8>, ReportError> {
    match format {
        ReportFormat::JsonArray => Ok(serde_json::to_vec(records)?),
        ReportFormat::JsonLines => {
            let mut out: Vec<u8> = Vec::new();
            write_json_lines(&mut out, records)?;
            Ok(out)
        }
    }
}

/// Parse a JSON Lines report. Blank lines are skipped.
pub fn parse_json_lines(data: &[u8]) -> Result<Vec<OfferReport>, ReportError> {
    data.split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| serde_json::from_slice(line).map_err(ReportError::from))
        .collect()
}

/// Write records as JSON Lines to any writer.
pub fn write_json_lines<W: Write>(mut writer: W, records: &[OfferReport]) -> Result<(), ReportError> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer
            .write_all(b"\n")
            .map_err(|e| ReportError::Serialize(serde_json::Error::io(e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<OfferReport> {
        vec![
            OfferReport::new("c-1", "p-9", "price expired"),
            OfferReport::new("c-1", "p-7", "out of stock"),
        ]
    }

    #[test]
    fn test_field_names_are_snake_case() {
        let json: String = serde_json::to_string(&records()[0]).unwrap();
        assert_eq!(
            json,
            r#"{"customer_id":"c-1","product_id":"p-9","error_message":"price expired"}"#
        );
    }

    #[test]
    fn test_json_lines_has_one_record_per_line() {
        let out = render_report(&records(), ReportFormat::JsonLines).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with('\n'));
        assert_eq!(parse_json_lines(text.as_bytes()).unwrap(), records());
    }

    #[test]
    fn test_json_array_parses_back() {
        let out = render_report(&records(), ReportFormat::JsonArray).unwrap();
        let parsed: Vec<OfferReport> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, records());
    }

    #[test]
    fn test_empty_report() {
        assert!(render_report(&[], ReportFormat::JsonLines).unwrap().is_empty());
        assert_eq!(render_report(&[], ReportFormat::JsonArray).unwrap(), b"[]");
    }

    #[test]
    fn test_write_json_lines_matches_render() {
        let mut out: Vec<u8> = Vec::new();
        write_json_lines(&mut out, &records()).unwrap();
        assert_eq!(out, render_report(&records(), ReportFormat::JsonLines).unwrap());
    }

    #[test]
    fn test_format_metadata() {
        assert_eq!(ReportFormat::default(), ReportFormat::JsonLines);
        assert_eq!(ReportFormat::JsonLines.extension(), "jsonl");
        assert_eq!(ReportFormat::JsonArray.content_type(), "application/json");
        let format: ReportFormat = serde_json::from_str("\"json_array\"").unwrap();
        assert_eq!(format, ReportFormat::JsonArray);
    }
}
