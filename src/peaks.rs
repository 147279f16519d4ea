/*!
Peak depth statistics of a scenario.

The peak depth of a node is its maximum depth from the report's depth summary.
Nodes that never filled (peak 0) are left out of the statistics.
*/
use crate::error::{ExtractError, Result};

pub const PEAK_HEADER: [&str; 5] = [
    "scenario",
    "peak_max_m",
    "peak_min_m",
    "peak_mean_m",
    "peak_std_m",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PeakStats {
    pub scenario: String,
    pub max: f64,     // Highest node peak [m]
    pub min: f64,     // Lowest non-zero node peak [m]
    pub mean: f64,    // [m]
    pub std_dev: f64, // Population standard deviation [m]
}

impl PeakStats {
    /**
    Summarizes the node peaks of one scenario.

    # Arguments
    * `scenario` - scenario name written in the first column.
    * `depths` - peak depth per node [m].

    # Returns
    `None` when no node has a positive peak.
    */
    pub fn from_depths(scenario: &str, depths: impl IntoIterator<Item = f64>) -> Option<Self> {
        let peaks: Vec<f64> = depths.into_iter().filter(|d| *d > 0.0).collect();
        if peaks.is_empty() {
            return None;
        }

        let n = peaks.len() as f64;
        let mean = peaks.iter().sum::<f64>() / n;
        let variance = peaks.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

        Some(PeakStats {
            scenario: scenario.to_string(),
            max: peaks.iter().copied().fold(f64::MIN, f64::max),
            min: peaks.iter().copied().fold(f64::MAX, f64::min),
            mean,
            std_dev: variance.sqrt(),
        })
    }

    fn row(&self) -> [String; 5] {
        [
            self.scenario.clone(),
            format!("{:.4}", self.max),
            format!("{:.4}", self.min),
            format!("{:.4}", self.mean),
            format!("{:.4}", self.std_dev),
        ]
    }
}

// CSV text with a header and one row per scenario, values to 4 decimals
pub fn render_peak_table(stats: &[PeakStats]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(PEAK_HEADER)?;
    for s in stats {
        writer.write_record(s.row())?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExtractError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_peaks_are_ignored() {
        let stats = PeakStats::from_depths("cenario_01", [0.0, 0.5, 1.5, 0.0, 1.0]).unwrap();
        assert_relative_eq!(stats.max, 1.5);
        assert_relative_eq!(stats.min, 0.5);
        assert_relative_eq!(stats.mean, 1.0);
        // population deviation of 0.5, 1.5, 1.0
        assert_relative_eq!(stats.std_dev, (1.0f64 / 6.0).sqrt(), max_relative = 1e-12);
    }

    #[test]
    fn dry_scenario_has_no_stats() {
        assert_eq!(PeakStats::from_depths("cenario_02", [0.0, 0.0]), None);
        assert_eq!(PeakStats::from_depths("cenario_02", Vec::new()), None);
    }

    #[test]
    fn table_uses_four_decimals() {
        let stats = PeakStats::from_depths("cenario_01", [0.9, 1.2]).unwrap();
        let text = render_peak_table(&[stats]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "scenario,peak_max_m,peak_min_m,peak_mean_m,peak_std_m");
        assert_eq!(lines[1], "cenario_01,1.2000,0.9000,1.0500,0.1500");
    }

    #[test]
    fn empty_table_is_header_only() {
        let text = render_peak_table(&[]).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
