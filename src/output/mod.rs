//! Human-readable reports
//!
//! - The end-of-session summary printed after a crawl
//! - The stored-page statistics printed by `--stats`

pub mod stats;

pub use stats::{format_statistics, print_statistics};

use crate::crawler::SessionSummary;

/// Renders a finished session as plain text
pub fn format_summary(summary: &SessionSummary) -> String {
    let mut out = String::new();

    out.push_str("=== Crawl Session Summary ===\n\n");
    out.push_str(&format!("Session: {}\n", summary.session_id));
    out.push_str(&format!(
        "Status: {}\n",
        if summary.interrupted {
            "interrupted"
        } else {
            "completed"
        }
    ));
    out.push_str(&format!(
        "Duration: {:.1}s ({:.2} pages/sec)\n\n",
        summary.duration.as_secs_f64(),
        summary.pages_per_second
    ));

    out.push_str("Pages:\n");
    out.push_str(&format!("  Discovered: {}\n", summary.discovered));
    out.push_str(&format!("  Processed:  {}\n", summary.processed));
    out.push_str(&format!("  Stored:     {}\n", summary.succeeded));
    out.push_str(&format!("  Filtered:   {}\n", summary.filtered));
    out.push_str(&format!("  Failed:     {}\n", summary.failed));
    out.push_str(&format!("  Skipped:    {}\n\n", summary.skipped));

    out.push_str(&format!(
        "Downloaded: {}\n",
        format_bytes(summary.bytes_downloaded)
    ));
    out.push_str(&format!("Error rate: {:.1}%\n", summary.error_rate * 100.0));
    if summary.open_circuits > 0 {
        out.push_str(&format!("Open circuits: {}\n", summary.open_circuits));
    }

    out
}

/// Prints the session summary to stdout
pub fn print_summary(summary: &SessionSummary) {
    print!("{}", format_summary(summary));
}

/// Formats a byte count with a binary unit
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
