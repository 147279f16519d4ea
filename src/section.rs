/*!
Reader for the section-delimited network definition file.

A section starts at a line holding its bracketed name (`[SUBCATCHMENTS]`, any
case) and runs until the next bracketed header or the first blank line. Lines
starting with `;` are comments. Every other line is split on whitespace; the
first token is the entity key and the whole token list is kept as its row.
*/
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{ExtractError, Result};
use crate::record::Category;

pub const SUBCATCHMENTS: &str = "SUBCATCHMENTS";
pub const JUNCTIONS: &str = "JUNCTIONS";
pub const INFILTRATION: &str = "INFILTRATION";
pub const CONDUITS: &str = "CONDUITS";
pub const XSECTIONS: &str = "XSECTIONS";

// Ordered key -> raw fields of one section, in file order. A repeated key keeps
// the position of its first occurrence and the fields of its last one.
pub type SectionTable = IndexMap<String, Vec<String>>;

static END_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)END_TIME\s+(\d{1,2}):(\d{2}):(\d{2})").expect("END_TIME pattern is valid")
});

// Reads a text file, dropping invalid UTF-8 sequences
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| ExtractError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn parse_section(text: &str, section: &str) -> SectionTable {
    let header = format!("[{}]", section.to_uppercase());
    let mut table = SectionTable::new();
    let mut reading = false;

    for line in text.lines() {
        let line = line.trim();

        if !reading {
            reading = line.to_uppercase().contains(&header);
            continue;
        }
        if line.is_empty() || line.starts_with('[') {
            break;
        }
        if line.starts_with(';') {
            continue;
        }

        let fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if let Some(key) = fields.first() {
            table.insert(key.clone(), fields);
        }
    }

    table
}

/**
Extracts the simulation end time (`END_TIME hh:mm:ss`) in whole minutes.

Seconds of 30 or more round the minute up. Returns 0 when the field is
missing or cannot be parsed.
*/
pub fn parse_duration(text: &str) -> u32 {
    let Some(caps) = END_TIME.captures(text) else {
        return 0;
    };
    let part = |i: usize| caps[i].parse::<u32>().ok();
    match (part(1), part(2), part(3)) {
        (Some(h), Some(m), Some(s)) => h * 60 + m + u32::from(s >= 30),
        _ => 0,
    }
}

// Lot-type units are named `<PREFIX>_<n>`; the prefix before the first
// underscore (or the whole key when there is none) is matched case-insensitively.
pub fn classify_category(key: &str, lot_prefixes: &[String]) -> Category {
    let code = key.split('_').next().unwrap_or(key).to_uppercase();
    if lot_prefixes.iter().any(|p| p.eq_ignore_ascii_case(&code)) {
        Category::Lot
    } else {
        Category::Street
    }
}

// Junction max depth (third field) per node; rows with a missing or
// non-numeric field are left out.
pub fn junction_heights(junctions: &SectionTable) -> IndexMap<String, f64> {
    junctions
        .iter()
        .filter_map(|(key, fields)| numeric_field(fields, 2).map(|h| (key.clone(), h)))
        .collect()
}

// Positional numeric field; absent, non-numeric or non-finite gives None
pub fn numeric_field(fields: &[String], index: usize) -> Option<f64> {
    fields.get(index).and_then(|raw| parse_number(raw))
}

pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
