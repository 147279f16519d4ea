/*!
Scenario driver: one definition/report pair in, a record table, its audit and
the peak depth statistics out.

Scenarios share nothing but the read-only configuration, so a batch can run
them in any order or in parallel. Every output is written to a sibling
temporary file first and renamed into place.
*/
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, error, info};

use crate::aggregate::{NetworkTables, ReportTables, aggregate};
use crate::audit::{audit_records, render_audit};
use crate::config::ExtractConfig;
use crate::error::{ExtractError, Result};
use crate::peaks::{PeakStats, render_peak_table};
use crate::record::{COLUMNS, Record};
use crate::report::load_report;
use crate::section::read_text;

pub const BATCH_PEAKS_FILE: &str = "peak_stats_all.csv";

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub definition: PathBuf, // <name>.inp
    pub report: PathBuf,     // <name>.rpt
}

impl Scenario {
    pub fn in_dir(dir: &Path, name: &str) -> Self {
        Scenario {
            name: name.to_string(),
            definition: dir.join(format!("{name}.inp")),
            report: dir.join(format!("{name}.rpt")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub name: String,
    pub records: usize,
    pub report_found: bool,
    pub peaks: Option<PeakStats>,
    pub table: PathBuf,
    pub audit: PathBuf,
    pub peak_table: PathBuf,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<ScenarioOutcome>,
    pub failures: Vec<ExtractError>,
}

impl BatchSummary {
    pub fn all_failed(&self) -> bool {
        self.outcomes.is_empty() && !self.failures.is_empty()
    }
}

// Record table as CSV. The header is always written, even for an empty table.
pub fn render_table(records: &[Record]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(COLUMNS.iter().map(|c| c.name))?;
    for rec in records {
        writer.serialize(rec)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExtractError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// Writes `contents` next to `path` and renames it over `path`
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).map_err(|e| ExtractError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| ExtractError::io(path, e))
}

/**
Runs one scenario end to end.

# Arguments
* `scenario` - input file pair.
* `config` - key conventions, rainfall tables and report columns.
* `out_dir` - folder receiving the three output files; created when missing.

# Returns
The outcome, or an error when the definition file cannot be read or an output
cannot be written. A missing report is not an error: the report columns stay
empty.
*/
pub fn run_scenario(
    scenario: &Scenario,
    config: &ExtractConfig,
    out_dir: &Path,
) -> Result<ScenarioOutcome> {
    info!(scenario = %scenario.name, "processing scenario");

    let definition = read_text(&scenario.definition)?;
    let network = NetworkTables::parse(&definition);
    debug!(
        scenario = %scenario.name,
        subcatchments = network.subcatchments.len(),
        junctions = network.junctions.len(),
        conduits = network.conduits.len(),
        xsections = network.xsections.len(),
        infiltration = network.infiltration.len(),
        duration = network.duration,
        "definition parsed"
    );

    let report_text = load_report(&scenario.report)?;
    let report = match &report_text {
        Some(text) => ReportTables::parse(text, &config.report),
        None => ReportTables::empty(),
    };
    debug!(
        scenario = %scenario.name,
        depth_rows = report.max_depth.len(),
        inflow_rows = report.max_inflow.len(),
        runoff_rows = report.runoff.len(),
        "report parsed"
    );

    let rainfall = config.rainfall_for(&scenario.name);
    let records = aggregate(&network, &report, rainfall, config);
    let peaks = PeakStats::from_depths(&scenario.name, report.max_depth.values().copied());

    fs::create_dir_all(out_dir).map_err(|e| ExtractError::io(out_dir, e))?;
    let table = out_dir.join(format!("{}.csv", scenario.name));
    let audit = out_dir.join(format!("{}_audit.txt", scenario.name));
    let peak_table = out_dir.join(format!("{}_peak_stats.csv", scenario.name));

    write_atomic(&table, &render_table(&records)?)?;
    write_atomic(&audit, &render_audit(&scenario.name, &audit_records(&records)))?;
    write_atomic(&peak_table, &render_peak_table(peaks.as_slice())?)?;

    info!(
        scenario = %scenario.name,
        records = records.len(),
        rainfall,
        table = %table.display(),
        "scenario done"
    );

    Ok(ScenarioOutcome {
        name: scenario.name.clone(),
        records: records.len(),
        report_found: report_text.is_some(),
        peaks,
        table,
        audit,
        peak_table,
    })
}

/**
Runs every configured scenario and writes the batch peak table.

A failing scenario is logged and collected; the others still run. With
`parallel` the scenarios are spread over the rayon pool, and results keep the
configured order either way.
*/
pub fn run_batch(config: &ExtractConfig, out_dir: &Path, parallel: bool) -> Result<BatchSummary> {
    let base_dir = &config.base_dir;
    let run_one = |name: &String| {
        let scenario = Scenario::in_dir(base_dir, name);
        run_scenario(&scenario, config, out_dir).map_err(|err| {
            error!(scenario = %name, error = %err, "scenario failed");
            ExtractError::Scenario {
                scenario: name.clone(),
                message: err.to_string(),
            }
        })
    };

    let results: Vec<Result<ScenarioOutcome>> = if parallel {
        config.scenarios.par_iter().map(run_one).collect()
    } else {
        config.scenarios.iter().map(run_one).collect()
    };

    let mut summary = BatchSummary::default();
    for result in results {
        match result {
            Ok(outcome) => summary.outcomes.push(outcome),
            Err(err) => summary.failures.push(err),
        }
    }

    let stats: Vec<PeakStats> = summary
        .outcomes
        .iter()
        .filter_map(|o| o.peaks.clone())
        .collect();
    if !summary.outcomes.is_empty() {
        fs::create_dir_all(out_dir).map_err(|e| ExtractError::io(out_dir, e))?;
        write_atomic(&out_dir.join(BATCH_PEAKS_FILE), &render_peak_table(&stats)?)?;
    }

    info!(
        succeeded = summary.outcomes.len(),
        failed = summary.failures.len(),
        "batch done"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Category;

    #[test]
    fn paths_follow_scenario_name() {
        let s = Scenario::in_dir(Path::new("runs"), "cenario_03");
        assert_eq!(s.definition, Path::new("runs/cenario_03.inp"));
        assert_eq!(s.report, Path::new("runs/cenario_03.rpt"));
    }

    #[test]
    fn empty_table_still_has_header() {
        let text = render_table(&[]).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("name,area,slope,duration,rainfall,"));
    }

    #[test]
    fn null_cells_are_empty_fields() {
        let rec = Record::new("P1", Category::Street, 90, 57.9);
        let text = render_table(&[rec]).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("P1,,,90,57.9,,street,"));
        assert_eq!(row.split(',').count(), COLUMNS.len());
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_atomic(&path, "a,b\n").unwrap();
        write_atomic(&path, "c,d\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "c,d\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_definition_is_a_scenario_error() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = Scenario::in_dir(dir.path(), "cenario_01");
        let err = run_scenario(&scenario, &ExtractConfig::default(), dir.path()).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
