//! JSON output for payloads.

use forkpool::pool::RunReport;
use serde::Serialize;

/// A delivered payload, decoded lossily for display.
#[derive(Debug, Serialize)]
pub struct PayloadRecord<'a> {
    /// Position in delivery order.
    pub index: usize,
    pub bytes: usize,
    pub text: std::borrow::Cow<'a, str>,
}

#[derive(Debug, Serialize)]
struct Document<'a> {
    report: &'a RunReport,
    payloads: Vec<PayloadRecord<'a>>,
}

/// Render payloads and the run report as pretty JSON.
pub fn render_json(payloads: &[Vec<u8>], report: &RunReport) -> serde_json::Result<String> {
    let document = Document {
        report,
        payloads: payloads
            .iter()
            .enumerate()
            .map(|(index, payload)| PayloadRecord {
                index,
                bytes: payload.len(),
                text: String::from_utf8_lossy(payload),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&document)
}

/// Print payloads as JSON.
pub fn print_json(payloads: &[Vec<u8>], report: &RunReport) {
    let json = render_json(payloads, report).unwrap_or_else(|_| "{}".to_string());
    println!("{}", json);
}
