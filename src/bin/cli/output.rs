//! Output formatting for CLI operations.

use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

use burrow::ScanSummary;

/// One delivered entry, as printed by `burrow scan`.
pub struct EntryLine {
    pub address: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Formats one delivered entry
    fn format_entry(&self, entry: &EntryLine) -> String;

    /// Formats the outcome of scanning one root
    fn format_summary(&self, root: &str, summary: &ScanSummary) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_entry(&self, entry: &EntryLine) -> String {
        let mtime = entry
            .modified
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{:>10} {:>19} {}",
            humanize_bytes(entry.size),
            mtime,
            entry.address
        )
    }

    fn format_summary(&self, root: &str, summary: &ScanSummary) -> String {
        let mut output = format!("{}: {} entries", root, summary.entries_delivered);
        if !summary.is_complete() {
            output.push_str(&format!(", {} failed branches:", summary.branches_failed));
            for (entry, error) in &summary.failures {
                output.push_str(&format!("\n  {}: {}", entry, error));
            }
        }
        output
    }
}

/// JSON lines output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_entry(&self, entry: &EntryLine) -> String {
        json!({
            "address": entry.address,
            "size": entry.size,
            "modified": entry
                .modified
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs()),
        })
        .to_string()
    }

    fn format_summary(&self, root: &str, summary: &ScanSummary) -> String {
        json!({
            "root": root,
            "entries_delivered": summary.entries_delivered,
            "branches_failed": summary.branches_failed,
            "failures": summary
                .failures
                .iter()
                .map(|(entry, error)| json!({"entry": entry, "error": error}))
                .collect::<Vec<_>>(),
        })
        .to_string()
    }
}

/// Creates the appropriate formatter based on output format
pub fn create_formatter(format: super::OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        super::OutputFormat::Human => Box::new(HumanFormatter),
        super::OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Converts bytes to a human-readable string
pub fn humanize_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Formats a SystemTime as a UTC `YYYY-MM-DD HH:MM:SS` string
pub fn format_timestamp(time: SystemTime) -> String {
    let Ok(duration) = time.duration_since(UNIX_EPOCH) else {
        return "-".to_string();
    };
    let secs = duration.as_secs();
    let (year, month, day) = civil_from_days((secs / 86400) as i64);
    let time_of_day = secs % 86400;
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year,
        month,
        day,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_humanize_bytes() {
        assert_eq!(humanize_bytes(512), "512 B");
        assert_eq!(humanize_bytes(1536), "1.5 KB");
        assert_eq!(humanize_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_timestamp() {
        let t = UNIX_EPOCH + Duration::from_secs(1_709_294_400);
        assert_eq!(format_timestamp(t), "2024-03-01 12:00:00");
        assert_eq!(format_timestamp(UNIX_EPOCH), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_json_entry_line() {
        let line = JsonFormatter.format_entry(&EntryLine {
            address: "a.zip!b".into(),
            size: 3,
            modified: None,
        });
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["address"], "a.zip!b");
        assert_eq!(value["size"], 3);
        assert!(value["modified"].is_null());
    }
}
