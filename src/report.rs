/*!
Reader for the simulation report.

Report sections are found by a case-insensitive substring of their title. Node
tables only start after their column header line (the one naming both `Node`
and `Type`). Inside a table, blank lines, comment lines and dash separator lines
are skipped, and an asterisk banner after the body has started marks the next
section. Values may carry a trailing `*` warning marker, which is stripped.
*/
use std::io::ErrorKind;
use std::path::Path;

use indexmap::IndexMap;
use tracing::warn;

use crate::error::{ExtractError, Result};
use crate::section::{parse_number, read_text};

pub const NODE_DEPTH_SUMMARY: &str = "Node Depth Summary";
pub const NODE_INFLOW_SUMMARY: &str = "Node Inflow Summary";
pub const SUBCATCHMENT_RUNOFF_SUMMARY: &str = "Subcatchment Runoff Summary";

// Ordered key -> raw value of one report column
pub type ReportTable = IndexMap<String, String>;

#[derive(Clone, Copy, PartialEq)]
enum Scan {
    Searching,
    Header,     // inside the section, waiting for the column header
    Body(bool), // table body; true once a separator or data row was seen
}

// Whitespace-split rows of the body of one report section
fn section_rows<'a>(text: &'a str, section: &str, needs_header: bool) -> Vec<Vec<&'a str>> {
    let title = section.to_uppercase();
    let mut rows = Vec::new();
    let mut scan = Scan::Searching;

    for line in text.lines() {
        let line = line.trim();

        if scan == Scan::Searching {
            if line.to_uppercase().contains(&title) {
                scan = if needs_header { Scan::Header } else { Scan::Body(false) };
            }
            continue;
        }
        if line.starts_with('[') {
            break;
        }
        if scan == Scan::Header {
            if line.contains("Node") && line.contains("Type") {
                scan = Scan::Body(false);
            }
            continue;
        }

        let started = scan == Scan::Body(true);
        if line.starts_with("**") {
            if started {
                break;
            }
            continue;
        }
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        scan = Scan::Body(true);
        if is_separator(line) {
            continue;
        }
        rows.push(line.split_whitespace().collect());
    }

    rows
}

fn is_separator(line: &str) -> bool {
    line.chars().all(|c| c == '-')
}

fn strip_marker(raw: &str) -> &str {
    raw.trim_end_matches('*')
}

// Whole `column` of a report section in one pass. Rows too short for `column`
// are skipped; a repeated key keeps its first position and takes the later value.
pub fn parse_report_column(text: &str, section: &str, column: usize) -> ReportTable {
    let mut table = ReportTable::new();
    for row in section_rows(text, section, true) {
        if let (Some(key), Some(value)) = (row.first(), row.get(column)) {
            table.insert(key.to_string(), strip_marker(value).to_string());
        }
    }
    table
}

/**
Looks up a single value by re-reading the report file.

# Arguments
* `path` - report file.
* `section` - section title, matched case-insensitively.
* `column` - 0-based whitespace token of the value.
* `key` - row key (first token).

# Returns
The first matching row's value without its trailing `*`, or `None`.

Every call scans the file from the start. Use `parse_report_column` when many
keys of a section are needed.
*/
pub fn lookup_report_value(
    path: &Path,
    section: &str,
    column: usize,
    key: &str,
) -> Result<Option<String>> {
    let text = read_text(path)?;
    let value = section_rows(&text, section, true)
        .into_iter()
        .find(|row| row.len() > column && row[0] == key)
        .map(|row| strip_marker(row[column]).to_string());
    Ok(value)
}

// A missing report (scenario never simulated) gives None with a warning; any
// other I/O failure is returned.
pub fn load_report(path: &Path) -> Result<Option<String>> {
    match read_text(path) {
        Ok(text) => Ok(Some(text)),
        Err(ExtractError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            warn!(report = %path.display(), "report file not found, report columns stay empty");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

// Per-unit water balance from the runoff summary. Volumes are in the report's
// depth units [mm]; shares are percentages of the generated volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunoffBalance {
    pub initial: f64,         // Initial volume
    pub evaporated: f64,      // Evaporation losses
    pub retained: f64,        // Depression retention
    pub infiltrated: f64,     // Infiltration losses
    pub surface: f64,         // Surface runoff
    pub final_storage: f64,   // Volume stored at the end of the run
    pub generated: f64,       // Total generated volume
    pub error: f64,           // Continuity error [%]
    pub surface_pct: f64,     // surface / generated * 100
    pub infiltrated_pct: f64, // infiltrated / generated * 100
}

impl RunoffBalance {
    // Builds a balance from the eight numeric columns after the key
    fn from_row(row: &[&str]) -> Option<Self> {
        let mut values = [0.0; 8];
        for (slot, raw) in values.iter_mut().zip(row.get(1..9)?) {
            *slot = parse_number(strip_marker(raw))?;
        }
        let [initial, evaporated, retained, infiltrated, surface, final_storage, generated, error] =
            values;
        let share = |v: f64| if generated > 0.0 { v / generated * 100.0 } else { 0.0 };

        Some(RunoffBalance {
            initial,
            evaporated,
            retained,
            infiltrated,
            surface,
            final_storage,
            generated,
            error,
            surface_pct: share(surface),
            infiltrated_pct: share(infiltrated),
        })
    }
}

// Per-subcatchment runoff summary. Rows need numbers in fields 2 to 9; column
// titles and unit rows are dropped.
pub fn parse_runoff_summary(text: &str) -> IndexMap<String, RunoffBalance> {
    section_rows(text, SUBCATCHMENT_RUNOFF_SUMMARY, false)
        .into_iter()
        .filter_map(|row| {
            let balance = RunoffBalance::from_row(&row)?;
            Some((row[0].to_string(), balance))
        })
        .collect()
}
