/*!
Derived hydrological metrics for a drainage record.

Depth ratio and load class describe how close a measurement node came to
surcharging; the volume balance splits the rain that fell on a unit into the
part that ran off at the surface and the part that did not.
*/
use crate::record::LoadClass;

// Ratio boundaries of the load classes [-]
pub const OVERLOAD_RATIO: f64 = 0.7;
pub const OVERFLOW_RATIO: f64 = 1.0;

/**
Peak depth over manhole height.

# Returns
`None` unless the height is positive and the depth is known.
*/
pub fn depth_ratio(max_depth: Option<f64>, junction_height: Option<f64>) -> Option<f64> {
    match (max_depth, junction_height) {
        (Some(depth), Some(height)) if height > 0.0 => Some(depth / height),
        _ => None,
    }
}

// Lower bounds are inclusive: 0.7 is already an overload, 1.0 an overflow
pub fn classify_load(ratio: f64) -> LoadClass {
    if ratio < OVERLOAD_RATIO {
        LoadClass::Normal
    } else if ratio < OVERFLOW_RATIO {
        LoadClass::Overload
    } else {
        LoadClass::Overflow
    }
}

// Surface/infiltrated split of the generated volume [m³]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeBalance {
    pub surface: f64,                 // Surface runoff volume [m³]
    pub generated: Option<f64>,       // Rain volume over the unit area [m³]
    pub infiltrated: Option<f64>,     // generated - surface [m³]
    pub surface_pct: Option<f64>,     // surface / generated [-]
    pub infiltrated_pct: Option<f64>, // infiltrated / generated [-]
}

impl VolumeBalance {
    /**
    Builds the balance from the node inflow volume and the event rainfall.

    # Arguments
    * `inflow_volume` - total inflow volume at the outlet [10^6 L].
    * `rainfall` - event rainfall [mm].
    * `area` - unit area [m²]; without it only the surface volume is known.

    Shares are left empty when the generated volume is not positive.
    */
    pub fn from_inflow(inflow_volume: f64, rainfall: f64, area: Option<f64>) -> Self {
        let surface = inflow_volume * 1000.0; // 10^6 L -> m³
        let generated = area.map(|a| rainfall * a / 1000.0); // mm·m² -> m³
        let infiltrated = generated.map(|g| g - surface);
        let share = |v: Option<f64>| match generated {
            Some(g) if g > 0.0 => v.map(|v| v / g),
            _ => None,
        };

        VolumeBalance {
            surface,
            generated,
            infiltrated,
            surface_pct: share(Some(surface)),
            infiltrated_pct: share(infiltrated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ratio_needs_positive_height() {
        assert_relative_eq!(depth_ratio(Some(0.9), Some(1.0)).unwrap(), 0.9);
        assert_eq!(depth_ratio(Some(0.9), Some(0.0)), None);
        assert_eq!(depth_ratio(Some(0.9), Some(-1.0)), None);
        assert_eq!(depth_ratio(None, Some(1.0)), None);
        assert_eq!(depth_ratio(Some(0.9), None), None);
    }

    #[test]
    fn class_boundaries_are_inclusive_below() {
        assert_eq!(classify_load(0.0), LoadClass::Normal);
        assert_eq!(classify_load(0.6999), LoadClass::Normal);
        assert_eq!(classify_load(0.7), LoadClass::Overload);
        assert_eq!(classify_load(0.9), LoadClass::Overload);
        assert_eq!(classify_load(1.0), LoadClass::Overflow);
        assert_eq!(classify_load(2.5), LoadClass::Overflow);
    }

    #[test]
    fn balance_from_inflow() {
        // 0.004 x 10^6 L over 100 m² with 57.9 mm of rain
        let b = VolumeBalance::from_inflow(0.004, 57.9, Some(100.0));
        assert_relative_eq!(b.surface, 4.0, max_relative = 1e-12);
        assert_relative_eq!(b.generated.unwrap(), 5.79, max_relative = 1e-12);
        assert_relative_eq!(b.infiltrated.unwrap(), 1.79, epsilon = 1e-12);
        assert_relative_eq!(b.surface_pct.unwrap(), 4.0 / 5.79, max_relative = 1e-12);
        assert_relative_eq!(b.infiltrated_pct.unwrap(), 1.79 / 5.79, epsilon = 1e-12);
    }

    #[test]
    fn no_shares_without_generated_volume() {
        let dry = VolumeBalance::from_inflow(0.002, 0.0, Some(100.0));
        assert_eq!(dry.generated, Some(0.0));
        assert_eq!(dry.surface_pct, None);
        assert_eq!(dry.infiltrated_pct, None);

        let no_area = VolumeBalance::from_inflow(0.002, 30.0, None);
        assert_relative_eq!(no_area.surface, 2.0, max_relative = 1e-12);
        assert_eq!(no_area.generated, None);
        assert_eq!(no_area.infiltrated, None);
        assert_eq!(no_area.surface_pct, None);
    }
}
