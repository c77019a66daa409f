//! Report Export
//!
//! On-demand serialization of a room's export snapshot to a report file.
//! Never polled; fetch errors propagate to the caller instead of touching
//! any loop state.

use crate::backend_client::{BackendClient, ExportData};
use crate::error::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Output format for a report download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
    /// Tab-separated values, opens in Excel
    Excel,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Excel => "xls",
        }
    }
}

/// Fetch a room's export snapshot and write it as a report file
///
/// Returns the path of the written file,
/// `Report_{room}_{unix_millis}.{ext}` under `output_dir`.
pub async fn write_report(
    client: &BackendClient,
    room: &str,
    format: ReportFormat,
    output_dir: &Path,
) -> Result<PathBuf> {
    let data = client.export(room).await?;
    let content = render(&data, format)?;

    let filename = format!(
        "Report_{}_{}.{}",
        room,
        Utc::now().timestamp_millis(),
        format.extension()
    );
    let path = output_dir.join(filename);
    tokio::fs::write(&path, content).await?;

    tracing::info!(room = %room, path = %path.display(), "Report written");
    Ok(path)
}

fn render(data: &ExportData, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        ReportFormat::Csv => Ok(render_delimited(data, ",")),
        ReportFormat::Excel => Ok(render_delimited(data, "\t")),
    }
}

fn render_delimited(data: &ExportData, separator: &str) -> String {
    let mut out = String::new();
    out.push_str(&["time", "attention_rate", "total_people"].join(separator));
    out.push('\n');
    for point in &data.history {
        out.push_str(
            &[
                point.time.clone(),
                point.attention_rate.to_string(),
                point.total_people.to_string(),
            ]
            .join(separator),
        );
        out.push('\n');
    }
    out
}
