/*!
Record aggregation for one scenario.

Records are created for every unit (in unit-table order), then for every
junction that is not also a unit. Four passes then fill them in order:

1. creation: geometry from the unit row, diameter from the topology, junction
   height, infiltration rate, and node results of the outlet node;
2. load: junction height re-read for the measurement node, depth ratio, load class;
3. volumes from the outlet inflow volume and the event rainfall;
4. the subcatchment runoff summary, which replaces the volumes of pass 3 for
   every unit it lists.
*/
use indexmap::IndexMap;
use tracing::debug;

use crate::config::{ExtractConfig, ReportColumns};
use crate::metrics::{VolumeBalance, classify_load, depth_ratio};
use crate::record::Record;
use crate::report::{
    NODE_DEPTH_SUMMARY, NODE_INFLOW_SUMMARY, RunoffBalance, parse_report_column,
    parse_runoff_summary,
};
use crate::section::{
    self, CONDUITS, INFILTRATION, JUNCTIONS, SUBCATCHMENTS, SectionTable, XSECTIONS,
    classify_category, junction_heights, numeric_field, parse_number, parse_section,
};
use crate::topology::{Resolution, resolve};

// Sections of the definition file used by the aggregator
#[derive(Debug, Default)]
pub struct NetworkTables {
    pub subcatchments: SectionTable,
    pub junctions: SectionTable,
    pub infiltration: SectionTable,
    pub conduits: SectionTable,
    pub xsections: SectionTable,
    pub duration: u32, // Event duration [min]
}

impl NetworkTables {
    pub fn parse(text: &str) -> Self {
        NetworkTables {
            subcatchments: parse_section(text, SUBCATCHMENTS),
            junctions: parse_section(text, JUNCTIONS),
            infiltration: parse_section(text, INFILTRATION),
            conduits: parse_section(text, CONDUITS),
            xsections: parse_section(text, XSECTIONS),
            duration: section::parse_duration(text),
        }
    }

    pub fn resolve(&self) -> Resolution {
        resolve(&self.subcatchments, &self.conduits, &self.xsections)
    }
}

// Numeric node results and runoff balances read once from the report
#[derive(Debug, Default)]
pub struct ReportTables {
    pub max_depth: IndexMap<String, f64>,
    pub max_inflow: IndexMap<String, f64>,
    pub inflow_volume: IndexMap<String, f64>,
    pub runoff: IndexMap<String, RunoffBalance>,
}

impl ReportTables {
    pub fn parse(text: &str, columns: &ReportColumns) -> Self {
        let numeric = |section: &str, column: usize| -> IndexMap<String, f64> {
            parse_report_column(text, section, column)
                .into_iter()
                .filter_map(|(key, raw)| parse_number(&raw).map(|v| (key, v)))
                .collect()
        };
        ReportTables {
            max_depth: numeric(NODE_DEPTH_SUMMARY, columns.depth_column),
            max_inflow: numeric(NODE_INFLOW_SUMMARY, columns.max_inflow_column),
            inflow_volume: numeric(NODE_INFLOW_SUMMARY, columns.inflow_volume_column),
            runoff: parse_runoff_summary(text),
        }
    }

    // Report results for a missing report file
    pub fn empty() -> Self {
        Self::default()
    }
}

/**
Builds the ordered record table of a scenario.

# Arguments
* `network` - parsed definition file.
* `report` - parsed report, or `ReportTables::empty()` when there is none.
* `rainfall` - event rainfall of the scenario [mm].
* `config` - key conventions.
*/
pub fn aggregate(
    network: &NetworkTables,
    report: &ReportTables,
    rainfall: f64,
    config: &ExtractConfig,
) -> Vec<Record> {
    let topology = network.resolve();
    let heights = junction_heights(&network.junctions);
    let builder = RecordBuilder {
        network,
        topology: &topology,
        rainfall,
        config,
    };

    let mut records = Vec::with_capacity(network.subcatchments.len() + network.junctions.len());
    for (key, fields) in &network.subcatchments {
        let mut rec = builder.create(key, fields);
        if let Some(outlet) = topology.outlet(key) {
            rec.junction_height = heights.get(outlet).copied();
            fill_node_results(&mut rec, report, outlet);
        }
        records.push(rec);
    }
    for (key, fields) in &network.junctions {
        if network.subcatchments.contains_key(key) {
            continue;
        }
        let mut rec = builder.create(key, fields);
        rec.junction_height = heights.get(key).copied();
        if topology.is_outlet(key) {
            fill_node_results(&mut rec, report, key);
        }
        records.push(rec);
    }
    debug!(
        units = network.subcatchments.len(),
        records = records.len(),
        "records created"
    );

    for rec in &mut records {
        apply_load(rec, &topology, network, &heights);
    }
    for rec in &mut records {
        apply_inflow_volumes(rec);
    }
    for rec in &mut records {
        if let Some(balance) = report.runoff.get(&rec.name) {
            apply_runoff_balance(rec, balance);
        }
    }

    records
}

struct RecordBuilder<'a> {
    network: &'a NetworkTables,
    topology: &'a Resolution,
    rainfall: f64,
    config: &'a ExtractConfig,
}

impl RecordBuilder<'_> {
    // Pass 1 fields that depend only on the entity's own rows
    fn create(&self, key: &str, fields: &[String]) -> Record {
        let category = classify_category(key, &self.config.lot_prefixes);
        let mut rec = Record::new(key, category, self.network.duration, self.rainfall);

        rec.diameter = self.topology.diameter(key);
        if key.starts_with(&self.config.unit_prefix) {
            rec.area = numeric_field(fields, 3);
            rec.impervious = numeric_field(fields, 4);
            rec.width = numeric_field(fields, 5);
            rec.slope = numeric_field(fields, 6);
        }
        rec.ksat = self
            .network
            .infiltration
            .get(key)
            .and_then(|row| numeric_field(row, 1));
        rec
    }
}

fn fill_node_results(rec: &mut Record, report: &ReportTables, node: &str) {
    rec.max_depth = report.max_depth.get(node).copied();
    rec.max_inflow = report.max_inflow.get(node).copied();
    rec.total_inflow_volume = report.inflow_volume.get(node).copied();
}

// Pass 2. The measurement node is the outlet for units and the junction itself
// otherwise; its height always replaces the pass 1 value, even with None.
fn apply_load(
    rec: &mut Record,
    topology: &Resolution,
    network: &NetworkTables,
    heights: &IndexMap<String, f64>,
) {
    let node = match topology.outlet(&rec.name) {
        Some(outlet) => outlet,
        None if network.junctions.contains_key(&rec.name) => rec.name.as_str(),
        None => return,
    };
    let height = heights.get(node).copied();
    rec.junction_height = height;
    rec.depth_ratio = depth_ratio(rec.max_depth, height);
    rec.load_class = rec.depth_ratio.map(classify_load);
}

// Pass 3
fn apply_inflow_volumes(rec: &mut Record) {
    let Some(volume) = rec.total_inflow_volume else {
        return;
    };
    let balance = VolumeBalance::from_inflow(volume, rec.rainfall, rec.area);
    rec.surface_volume = Some(balance.surface);
    rec.generated_volume = balance.generated;
    rec.infiltrated_volume = balance.infiltrated;
    rec.surface_pct = balance.surface_pct;
    rec.infiltrated_pct = balance.infiltrated_pct;
}

// Pass 4
fn apply_runoff_balance(rec: &mut Record, balance: &RunoffBalance) {
    rec.surface_volume = Some(balance.surface);
    rec.infiltrated_volume = Some(balance.infiltrated);
    rec.generated_volume = Some(balance.generated);
    rec.surface_pct = Some(balance.surface_pct);
    rec.infiltrated_pct = Some(balance.infiltrated_pct);
    rec.initial_volume = Some(balance.initial);
    rec.evaporated_volume = Some(balance.evaporated);
    rec.retained_volume = Some(balance.retained);
    rec.final_storage = Some(balance.final_storage);
    rec.balance_error = Some(balance.error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Category, LoadClass};
    use approx::assert_relative_eq;

    const INP: &str = "\
[OPTIONS]
END_TIME             01:30:00

[SUBCATCHMENTS]
;;Name  Gage  Outlet  Area   %Imperv  Width  %Slope  CurbLen
B_1     TS5   P1      100    60       20     1.5     0
B_2     TS5   P2      200    abc      10
R_1     TS5   P2      50     90       5      0.5     0

[INFILTRATION]
;;Subcatchment  Ksat  Suction  IMD
B_1             10.5  3.5      0.25
R_1             oops  3.5      0.25

[JUNCTIONS]
;;Name  Elevation  MaxDepth
P1      10.0       1.0
P2      9.5        1.5
P3      9.0        0
P4      8.5        2.0

[CONDUITS]
;;Name  From  To    Length
C1      P1    P2    30
C2      P2    P3    25
C3      P3    OUT1  10

[XSECTIONS]
;;Link  Shape     Geom1
C1      CIRCULAR  0.6
C2      CIRCULAR  0.8
";

    const RPT: &str = "\
  ***************************
  Subcatchment Runoff Summary
  ***************************

  -----------------------------------------------------------------------------
  Subcatchment       mm     mm     mm     mm     mm     mm     mm     %
  -----------------------------------------------------------------------------
  B_2             57.90   0.00   1.00  20.00  30.00   6.90  50.00   0.20

  ******************
  Node Depth Summary
  ******************

  -----------------------------------------------------------------
  Node                 Type       Meters   Meters   Meters  days hr:mn
  -----------------------------------------------------------------
  P1                   JUNCTION     0.05     0.90    10.90     0  01:05
  P2                   JUNCTION     0.10     1.50    10.70     0  01:10
  P3                   JUNCTION     0.10     0.40    10.70     0  01:10

  *******************
  Node Inflow Summary
  *******************

  -----------------------------------------------------------------------------
  Node                 Type           LPS      LPS  days hr:mn   10^6 ltr  10^6 ltr
  -----------------------------------------------------------------------------
  P1                   JUNCTION      0.12     0.12     0  01:00     0.004     0.004
  P2                   JUNCTION      0.00     0.31     0  01:05     0.009     0.013
";

    fn run(report: Option<&str>) -> Vec<Record> {
        let config = ExtractConfig::default();
        let network = NetworkTables::parse(INP);
        let tables = match report {
            Some(text) => ReportTables::parse(text, &config.report),
            None => ReportTables::empty(),
        };
        aggregate(&network, &tables, 57.9, &config)
    }

    fn find<'a>(records: &'a [Record], name: &str) -> &'a Record {
        records.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn units_first_then_remaining_junctions() {
        let records = run(Some(RPT));
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["B_1", "B_2", "R_1", "P1", "P2", "P3", "P4"]);
        assert!(records.iter().all(|r| r.duration == 90 && r.rainfall == 57.9));
    }

    #[test]
    fn unit_fields_from_rows_and_topology() {
        let records = run(Some(RPT));
        let b1 = find(&records, "B_1");
        assert_eq!(b1.category, Category::Lot);
        assert_eq!(b1.area, Some(100.0));
        assert_eq!(b1.impervious, Some(60.0));
        assert_eq!(b1.width, Some(20.0));
        assert_eq!(b1.slope, Some(1.5));
        assert_eq!(b1.diameter, Some(0.6));
        assert_eq!(b1.ksat, Some(10.5));

        // short row: fields past the end stay empty, bad numbers too
        let b2 = find(&records, "B_2");
        assert_eq!(b2.area, Some(200.0));
        assert_eq!(b2.impervious, None);
        assert_eq!(b2.width, Some(10.0));
        assert_eq!(b2.slope, None);
        assert_eq!(b2.diameter, Some(0.8));

        // not a unit prefix: geometry is not read
        let r1 = find(&records, "R_1");
        assert_eq!(r1.category, Category::Street);
        assert_eq!(r1.area, None);
        assert_eq!(r1.ksat, None);
    }

    #[test]
    fn depth_ratio_and_load_class() {
        let records = run(Some(RPT));
        let b1 = find(&records, "B_1");
        assert_eq!(b1.max_depth, Some(0.9));
        assert_eq!(b1.junction_height, Some(1.0));
        assert_relative_eq!(b1.depth_ratio.unwrap(), 0.9);
        assert_eq!(b1.load_class, Some(LoadClass::Overload));

        let b2 = find(&records, "B_2");
        assert_eq!(b2.depth_ratio, Some(1.0));
        assert_eq!(b2.load_class, Some(LoadClass::Overflow));

        // P3 is no outlet: no node results, no class
        let p3 = find(&records, "P3");
        assert_eq!(p3.max_depth, None);
        assert_eq!(p3.junction_height, Some(0.0));
        assert_eq!(p3.load_class, None);

        // outlet junctions carry their own results
        let p1 = find(&records, "P1");
        assert_eq!(p1.max_inflow, Some(0.12));
        assert_eq!(p1.load_class, Some(LoadClass::Overload));
        assert_eq!(p1.diameter, None);
    }

    #[test]
    fn inflow_volumes_then_runoff_summary_overlay() {
        let records = run(Some(RPT));
        let b1 = find(&records, "B_1");
        assert_relative_eq!(b1.surface_volume.unwrap(), 4.0, max_relative = 1e-12);
        assert_relative_eq!(b1.generated_volume.unwrap(), 5.79, max_relative = 1e-12);
        assert_eq!(b1.initial_volume, None);

        // B_2 is in the runoff summary, which wins over pass 3
        let b2 = find(&records, "B_2");
        assert_eq!(b2.surface_volume, Some(30.0));
        assert_eq!(b2.generated_volume, Some(50.0));
        assert_relative_eq!(b2.surface_pct.unwrap(), 60.0);
        assert_eq!(b2.retained_volume, Some(1.0));
        assert_eq!(b2.balance_error, Some(0.2));

        // no area: surface volume only
        let r1 = find(&records, "R_1");
        assert_relative_eq!(r1.surface_volume.unwrap(), 9.0, max_relative = 1e-12);
        assert_eq!(r1.generated_volume, None);
        assert_eq!(r1.surface_pct, None);
    }

    #[test]
    fn missing_report_leaves_report_columns_empty() {
        let records = run(None);
        assert_eq!(records.len(), 7);
        for rec in &records {
            assert_eq!(rec.max_depth, None);
            assert_eq!(rec.max_inflow, None);
            assert_eq!(rec.total_inflow_volume, None);
            assert_eq!(rec.depth_ratio, None);
            assert_eq!(rec.load_class, None);
            assert_eq!(rec.surface_volume, None);
            assert_eq!(rec.balance_error, None);
        }
        assert_eq!(find(&records, "B_1").diameter, Some(0.6));
    }
}
