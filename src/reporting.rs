// Reporting and output for proxyscan
// Renders findings as console rows and exports the log to CSV and Markdown

use chrono::Local;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::finding::Finding;

pub const COLUMNS: [&str; 5] = ["Timestamp", "Analyzer", "URL", "Body", "Message"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Escape CSV field to prevent formula injection attacks
/// Cells starting with =, +, -, @, or tab are prefixed with single quote
fn escape_csv_field(field: &str) -> String {
    let Some(first_char) = field.chars().next() else {
        return String::new();
    };
    let needs_escaping = matches!(first_char, '=' | '+' | '-' | '@' | '\t');

    if needs_escaping {
        format!("\"'{}\"", field.replace('"', "\"\""))
    } else if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Markdown table cells cannot hold raw pipes or newlines
fn escape_markdown_cell(field: &str) -> String {
    field.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Column values for one finding, in `COLUMNS` order
pub fn row_values(finding: &Finding) -> [String; 5] {
    [
        finding.timestamp().format(TIMESTAMP_FORMAT).to_string(),
        finding.analyzer_name().to_string(),
        finding.url().to_string(),
        finding.request_body().to_string(),
        finding.message().to_string(),
    ]
}

/// One console line for a live viewer
pub fn format_row(index: usize, finding: &Finding) -> String {
    let [timestamp, analyzer, url, _, message] = row_values(finding);
    format!("#{} [{}] {} {}: {}", index, timestamp, analyzer, url, message)
}

fn report_path(dir: &Path, extension: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("proxyscan_report_{}.{}", timestamp, extension))
}

pub fn export_csv(findings: &[Arc<Finding>], dir: &Path) -> Result<PathBuf, std::io::Error> {
    let path = report_path(dir, "csv");
    let mut file = File::create(&path)?;

    writeln!(file, "{}", COLUMNS.join(","))?;
    for finding in findings {
        let row: Vec<String> = row_values(finding).iter().map(|v| escape_csv_field(v)).collect();
        writeln!(file, "{}", row.join(","))?;
    }

    Ok(path)
}

pub fn export_markdown(findings: &[Arc<Finding>], dir: &Path) -> Result<PathBuf, std::io::Error> {
    let path = report_path(dir, "md");
    let mut file = File::create(&path)?;

    writeln!(file, "# proxyscan Report\n")?;
    if findings.is_empty() {
        writeln!(file, "No issues detected.")?;
        return Ok(path);
    }

    writeln!(file, "| {} |", COLUMNS.join(" | "))?;
    writeln!(file, "|{}", "---|".repeat(COLUMNS.len()))?;
    for finding in findings {
        let row: Vec<String> = row_values(finding).iter().map(|v| escape_markdown_cell(v)).collect();
        writeln!(file, "| {} |", row.join(" | "))?;
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_escaping_rules() {
        assert_eq!(escape_csv_field(""), "");
        assert_eq!(escape_csv_field("plain"), "plain");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("=1+1"), "\"'=1+1\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_field("a=1\r\nb=2"), "\"a=1\r\nb=2\"");
        assert_eq!(escape_csv_field("a=1\rb=2"), "\"a=1\rb=2\"");
    }

    #[test]
    fn markdown_cells_drop_pipes_and_newlines() {
        assert_eq!(escape_markdown_cell("a|b\nc"), "a\\|b c");
    }
}
