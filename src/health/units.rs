//! Unit normalization and the effort heuristic used by the extractors.

const LB_PER_KG: f64 = 2.20462;
const MI_PER_KM: f64 = 0.621371;
const KJ_PER_KCAL: f64 = 4.184;

pub fn pounds_from_kilograms(kg: f64) -> f64 {
    kg * LB_PER_KG
}

pub fn miles_from_kilometers(km: f64) -> f64 {
    km * MI_PER_KM
}

/// Convert a duration to seconds. `unit` is `sec`, `min` or `hr`;
/// anything else is read as seconds.
pub fn seconds_from_duration(value: f64, unit: &str) -> f64 {
    match unit {
        "min" => value * 60.0,
        "hr" => value * 3600.0,
        _ => value,
    }
}

/// Distance in miles from a value in one of the export's length units.
/// Returns `None` for units that are not a distance.
pub fn miles_from_distance(value: f64, unit: &str) -> Option<f64> {
    match unit {
        "km" | "" => Some(miles_from_kilometers(value)),
        "mi" => Some(value),
        "m" => Some(miles_from_kilometers(value / 1000.0)),
        "yd" => Some(value / 1760.0),
        _ => None,
    }
}

/// Energy in kilocalories. Returns `None` for units that are not an energy.
pub fn kilocalories_from_energy(value: f64, unit: &str) -> Option<f64> {
    match unit {
        "kcal" | "Cal" | "" => Some(value),
        "kJ" => Some(value / KJ_PER_KCAL),
        _ => None,
    }
}

/// Body mass in pounds. Returns `None` for units that are not a mass.
pub fn pounds_from_mass(value: f64, unit: &str) -> Option<f64> {
    match unit {
        "kg" => Some(pounds_from_kilograms(value)),
        "lb" => Some(value),
        "g" => Some(pounds_from_kilograms(value / 1000.0)),
        _ => None,
    }
}

/// Coarse 1-10 effort score from the average energy burn rate.
///
/// This is a lookup table, not a physiological model. Any workout that
/// recorded energy lands on 2 or above; callers skip the estimate entirely
/// when no energy figure exists.
pub fn estimate_effort(active_energy_kcal: f64, duration_seconds: f64) -> u8 {
    const THRESHOLDS: [(f64, u8); 8] = [
        (3.0, 2),
        (5.0, 3),
        (7.0, 4),
        (9.0, 5),
        (11.0, 6),
        (13.0, 7),
        (15.0, 8),
        (18.0, 9),
    ];

    let kcal_per_minute = active_energy_kcal / (duration_seconds / 60.0);
    THRESHOLDS
        .iter()
        .find(|(limit, _)| kcal_per_minute < *limit)
        .map(|(_, score)| *score)
        .unwrap_or(10)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
