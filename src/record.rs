use std::fmt;

use serde::{Deserialize, Serialize};

// Land-use category of an entity, from its key prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Lot,    // drainage unit (lot, block, green area...)
    Street, // street surface or network node
}

// Load state of a measurement node from its depth / height ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadClass {
    Normal,   // ratio < 0.7
    Overload, // 0.7 <= ratio < 1.0
    Overflow, // ratio >= 1.0
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Lot => "lot",
            Category::Street => "street",
        })
    }
}

impl fmt::Display for LoadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadClass::Normal => "normal",
            LoadClass::Overload => "overload",
            LoadClass::Overflow => "overflow",
        })
    }
}

// One output row per unit or junction. Field order is the column order of the
// emitted table; every optional column is written as an empty cell when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub area: Option<f64>,                // Unit area [m²]
    pub slope: Option<f64>,               // Surface slope [%]
    pub duration: u32,                    // Event duration [min]
    pub rainfall: f64,                    // Event rainfall total [mm]
    pub impervious: Option<f64>,          // Impervious share [%]
    pub category: Category,               // Lot or street
    pub diameter: Option<f64>,            // Downstream conduit diameter [m]
    pub width: Option<f64>,               // Overland flow width [m]
    pub max_depth: Option<f64>,           // Peak depth at the outlet node [m]
    pub max_inflow: Option<f64>,          // Peak total inflow at the outlet node [m³/s]
    pub total_inflow_volume: Option<f64>, // Total inflow volume [10^6 L]
    pub depth_ratio: Option<f64>,         // max_depth / junction_height [-]
    pub ksat: Option<f64>,                // Saturated infiltration rate [mm/h]
    pub junction_height: Option<f64>,     // Manhole depth of the outlet node [m]
    pub load_class: Option<LoadClass>,
    pub surface_volume: Option<f64>,     // Surface runoff volume [m³]
    pub infiltrated_volume: Option<f64>, // Infiltrated volume [m³]
    pub generated_volume: Option<f64>,   // Generated (rain) volume [m³]
    pub surface_pct: Option<f64>,        // Surface share of generated volume
    pub infiltrated_pct: Option<f64>,    // Infiltrated share of generated volume
    pub initial_volume: Option<f64>,     // Runoff summary: initial volume [mm]
    pub evaporated_volume: Option<f64>,  // Runoff summary: evaporation [mm]
    pub retained_volume: Option<f64>,    // Runoff summary: retention [mm]
    pub final_storage: Option<f64>,      // Runoff summary: final stored volume [mm]
    pub balance_error: Option<f64>,      // Runoff summary: continuity error [%]
}

impl Record {
    // Fresh row with only the scenario-wide values filled
    pub fn new(name: &str, category: Category, duration: u32, rainfall: f64) -> Self {
        Record {
            name: name.to_string(),
            area: None,
            slope: None,
            duration,
            rainfall,
            impervious: None,
            category,
            diameter: None,
            width: None,
            max_depth: None,
            max_inflow: None,
            total_inflow_volume: None,
            depth_ratio: None,
            ksat: None,
            junction_height: None,
            load_class: None,
            surface_volume: None,
            infiltrated_volume: None,
            generated_volume: None,
            surface_pct: None,
            infiltrated_pct: None,
            initial_volume: None,
            evaporated_volume: None,
            retained_volume: None,
            final_storage: None,
            balance_error: None,
        }
    }

    // Cell values in column order, None for null
    pub fn cells(&self) -> [Option<Cell>; COLUMNS.len()] {
        let real = |v: Option<f64>| v.map(Cell::Real);
        [
            Some(Cell::Text(self.name.clone())),
            real(self.area),
            real(self.slope),
            Some(Cell::Integer(i64::from(self.duration))),
            Some(Cell::Real(self.rainfall)),
            real(self.impervious),
            Some(Cell::Text(self.category.to_string())),
            real(self.diameter),
            real(self.width),
            real(self.max_depth),
            real(self.max_inflow),
            real(self.total_inflow_volume),
            real(self.depth_ratio),
            real(self.ksat),
            real(self.junction_height),
            self.load_class.map(|c| Cell::Text(c.to_string())),
            real(self.surface_volume),
            real(self.infiltrated_volume),
            real(self.generated_volume),
            real(self.surface_pct),
            real(self.infiltrated_pct),
            real(self.initial_volume),
            real(self.evaporated_volume),
            real(self.retained_volume),
            real(self.final_storage),
            real(self.balance_error),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Real(f64),
}

// Declared column of the output table
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub unit: &'static str,
}

const fn col(name: &'static str, unit: &'static str) -> Column {
    Column { name, unit }
}

// Must stay in the field order of `Record`
pub const COLUMNS: [Column; 26] = [
    col("name", "-"),
    col("area", "m²"),
    col("slope", "%"),
    col("duration", "min"),
    col("rainfall", "mm"),
    col("impervious", "%"),
    col("category", "-"),
    col("diameter", "m"),
    col("width", "m"),
    col("max_depth", "m"),
    col("max_inflow", "m³/s"),
    col("total_inflow_volume", "10^6 L"),
    col("depth_ratio", "-"),
    col("ksat", "mm/h"),
    col("junction_height", "m"),
    col("load_class", "-"),
    col("surface_volume", "m³"),
    col("infiltrated_volume", "m³"),
    col("generated_volume", "m³"),
    col("surface_pct", "-"),
    col("infiltrated_pct", "-"),
    col("initial_volume", "mm"),
    col("evaporated_volume", "mm"),
    col("retained_volume", "mm"),
    col("final_storage", "mm"),
    col("balance_error", "%"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_has_only_globals() {
        let rec = Record::new("B_1", Category::Lot, 90, 57.9);
        let cells = rec.cells();
        // name, duration, rainfall, category
        let filled: Vec<usize> = (0..cells.len()).filter(|&i| cells[i].is_some()).collect();
        assert_eq!(filled, vec![0, 3, 4, 6]);
        assert_eq!(cells[0], Some(Cell::Text("B_1".into())));
        assert_eq!(cells[4], Some(Cell::Real(57.9)));
        assert_eq!(cells[3], Some(Cell::Integer(90)));
        assert_eq!(cells[6], Some(Cell::Text("lot".into())));
    }

    #[test]
    fn serialized_header_matches_declared_columns() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .serialize(Record::new("P1", Category::Street, 0, 0.0))
            .unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header = out.lines().next().unwrap();
        let expected: Vec<&str> = COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(header, expected.join(","));
    }
}
