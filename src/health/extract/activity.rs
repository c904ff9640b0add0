use regex::Regex;
use std::sync::OnceLock;

use super::{parse_date, Attributes, ExtractionAccumulator};
use crate::error::Result;
use crate::health::model::ActivityDay;

fn activity_summary_regex() -> &'static Regex {
    static ACTIVITY_SUMMARY: OnceLock<Regex> = OnceLock::new();
    ACTIVITY_SUMMARY.get_or_init(|| {
        Regex::new(r"<ActivitySummary\s([^>]*)>").expect("Invalid activity summary pattern")
    })
}

/// One `ActivityDay` per daily summary record. Same-date duplicates are kept
/// here and resolved when merging into the store.
pub fn extract_activity_days(fragment: &str, acc: &mut ExtractionAccumulator) {
    for cap in activity_summary_regex().captures_iter(fragment) {
        let Some(raw) = cap.get(1) else {
            continue;
        };
        let attrs = Attributes::parse(raw.as_str().trim_end().trim_end_matches('/'));
        match read_activity_day(&attrs) {
            Ok(day) => acc.activity_days.push(day),
            Err(e) => acc.skip("activity summary", e),
        }
    }
}

fn read_activity_day(attrs: &Attributes<'_>) -> Result<ActivityDay> {
    Ok(ActivityDay {
        date: parse_date(attrs.require("dateComponents")?)?,
        active_energy: attrs.number("activeEnergyBurned")?.round() as i64,
        exercise_minutes: attrs.number("appleExerciseTime")?.round() as i64,
        stand_hours: attrs.number("appleStandHours")?.round() as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn extract(fragment: &str) -> ExtractionAccumulator {
        let mut acc = ExtractionAccumulator::new();
        extract_activity_days(fragment, &mut acc);
        acc
    }

    #[test]
    fn test_activity_summary_rounded() {
        let acc = extract(
            r#"<ActivitySummary dateComponents="2024-01-15" activeEnergyBurned="451.6" activeEnergyBurnedGoal="500" activeEnergyBurnedUnit="Cal" appleMoveTime="0" appleExerciseTime="31.5" appleExerciseTimeGoal="30" appleStandHours="9.4" appleStandHoursGoal="12"/>"#,
        );
        assert_eq!(
            acc.activity_days,
            vec![ActivityDay {
                date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                active_energy: 452,
                exercise_minutes: 32,
                stand_hours: 9,
            }]
        );
    }

    #[test]
    fn test_duplicates_kept_in_order() {
        let acc = extract(
            r#"<ActivitySummary appleStandHours="10" appleExerciseTime="20" activeEnergyBurned="300" dateComponents="2024-01-16"/>
<ActivitySummary dateComponents="2024-01-16" activeEnergyBurned="310" appleExerciseTime="22" appleStandHours="11"/>"#,
        );
        assert_eq!(acc.activity_days.len(), 2);
        assert_eq!(acc.activity_days[1].active_energy, 310);
    }

    #[test]
    fn test_missing_field_is_skipped() {
        let acc = extract(
            r#"<ActivitySummary dateComponents="2024-01-17" activeEnergyBurned="300" appleExerciseTime="20"/>"#,
        );
        assert!(acc.activity_days.is_empty());
        assert_eq!(acc.skipped, 1);
    }
}
