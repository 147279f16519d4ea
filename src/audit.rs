/*!
Per-column audit of a record table: first non-empty value, how many rows are
filled, the declared unit and how many rows are empty. Reading only; the table
itself is never touched.
*/
use std::io::Read;

use crate::error::Result;
use crate::record::{COLUMNS, Cell, Record};

#[derive(Debug, Clone, PartialEq)]
pub struct AuditRow {
    pub column: &'static str,
    pub first_value: Option<String>,
    pub filled: usize,
    pub unit: &'static str,
    pub empty: usize,
}

fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) => s.clone(),
        Cell::Integer(i) => i.to_string(),
        Cell::Real(v) => format!("{v:.4}"),
    }
}

pub fn audit_records(records: &[Record]) -> Vec<AuditRow> {
    let mut rows: Vec<AuditRow> = COLUMNS
        .iter()
        .map(|col| AuditRow {
            column: col.name,
            first_value: None,
            filled: 0,
            unit: col.unit,
            empty: 0,
        })
        .collect();

    for rec in records {
        for (row, cell) in rows.iter_mut().zip(rec.cells()) {
            match cell {
                Some(cell) => {
                    row.filled += 1;
                    if row.first_value.is_none() {
                        row.first_value = Some(format_cell(&cell));
                    }
                }
                None => row.empty += 1,
            }
        }
    }

    rows
}

const RULE_WIDTH: usize = 86;

pub fn render_audit(title: &str, rows: &[AuditRow]) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let line = |column: &str, first: &str, filled: &str, unit: &str, empty: &str| {
        format!("| {column:<19} | {first:<18} | {filled:<6} | {unit:<8} | {empty:<6} |")
    };

    let mut lines = vec![
        format!("Audit report - {title}"),
        rule.clone(),
        line("Column", "First value", "Values", "Unit", "Empty"),
        rule,
    ];
    for row in rows {
        lines.push(line(
            row.column,
            row.first_value.as_deref().unwrap_or("EMPTY"),
            &row.filled.to_string(),
            row.unit,
            &row.empty.to_string(),
        ));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

// Reads back a record table written by a previous run
pub fn read_table<R: Read>(reader: R) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for rec in reader.deserialize::<Record>() {
        records.push(rec?);
    }
    Ok(records)
}
