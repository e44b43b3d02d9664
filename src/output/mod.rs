//! Output formatting for delivered payloads.

pub mod json;
pub mod plain;

use forkpool::pool::RunReport;

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Raw payloads, one per line (default).
    #[default]
    Plain,
    /// JSON document with payloads and the run report.
    Json,
    /// Byte length of each payload, one per line.
    Lengths,
}

/// Print delivered payloads in delivery order.
pub fn print_payloads(payloads: &[Vec<u8>], report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Plain => plain::print_plain(payloads),
        OutputFormat::Json => json::print_json(payloads, report),
        OutputFormat::Lengths => plain::print_lengths(payloads),
    }
}
