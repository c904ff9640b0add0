use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

use super::{parse_number, parse_timestamp, resolve_activity_type, Attributes, ExtractionAccumulator};
use crate::error::{LiftlogError, Result};
use crate::health::model::{ExtractedWorkout, WorkoutBlock};
use crate::health::units::{
    estimate_effort, kilocalories_from_energy, miles_from_distance, round_to, seconds_from_duration,
};

const WORKOUT_CLOSE: &str = "</Workout>";

/// Distance statistics in preference order; the first one present wins.
const DISTANCE_TYPES: &[&str] = &[
    "HKQuantityTypeIdentifierDistanceWalkingRunning",
    "HKQuantityTypeIdentifierDistanceCycling",
    "HKQuantityTypeIdentifierDistanceSwimming",
    "HKQuantityTypeIdentifierDistanceWheelchair",
];

const ACTIVE_ENERGY_TYPE: &str = "HKQuantityTypeIdentifierActiveEnergyBurned";

fn workout_regex() -> &'static Regex {
    static WORKOUT: OnceLock<Regex> = OnceLock::new();
    WORKOUT.get_or_init(|| Regex::new(r"<Workout\s([^>]*)>").expect("Invalid workout pattern"))
}

fn statistics_regex() -> &'static Regex {
    static STATISTICS: OnceLock<Regex> = OnceLock::new();
    STATISTICS.get_or_init(|| {
        Regex::new(r"<WorkoutStatistics\s([^>]*)>").expect("Invalid statistics pattern")
    })
}

/// Extract every workout in `fragment` into the accumulator
pub fn extract_workouts(fragment: &str, acc: &mut ExtractionAccumulator) {
    for cap in workout_regex().captures_iter(fragment) {
        let (Some(tag), Some(raw)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        let raw_attrs = raw.as_str().trim_end();
        let self_closing = raw_attrs.ends_with('/');
        let attrs = Attributes::parse(raw_attrs.trim_end_matches('/'));

        // Children live between the opening tag and the container close
        let body = if self_closing {
            ""
        } else {
            let rest = &fragment[tag.end()..];
            rest.find(WORKOUT_CLOSE).map_or(rest, |close| &rest[..close])
        };

        match build_workout(&attrs, body) {
            Ok(workout) => acc.workouts.push(workout),
            Err(e) => acc.skip("workout", e),
        }
    }
}

fn build_workout(attrs: &Attributes<'_>, body: &str) -> Result<ExtractedWorkout> {
    let kind = resolve_activity_type(attrs.require("workoutActivityType")?);

    let duration = seconds_from_duration(attrs.number("duration")?, attrs.require("durationUnit")?);
    if duration < 0.0 {
        return Err(LiftlogError::MalformedRecord(format!("negative duration {}", duration)));
    }

    let start = parse_timestamp(attrs.require("startDate")?)?.with_timezone(&Utc);
    let end = parse_timestamp(attrs.require("endDate")?)?.with_timezone(&Utc);
    if end < start {
        return Err(LiftlogError::MalformedRecord(format!(
            "workout ends ({}) before it starts ({})",
            end, start
        )));
    }

    let statistics: Vec<Attributes<'_>> = statistics_regex()
        .captures_iter(body)
        .filter_map(|cap| cap.get(1))
        .map(|m| Attributes::parse(m.as_str().trim_end().trim_end_matches('/')))
        .collect();

    let distance = find_distance(attrs, &statistics).map(|mi| round_to(mi, 2));
    let energy = find_active_energy(attrs, &statistics);
    let effort = energy
        .filter(|_| duration > 0.0)
        .map(|kcal| estimate_effort(kcal, duration));

    Ok(ExtractedWorkout {
        id: Uuid::new_v4().to_string(),
        name: kind.display_name,
        block: WorkoutBlock {
            id: Uuid::new_v4().to_string(),
            category: kind.category,
        },
        start,
        end,
        total_duration: duration.round() as u64,
        effort,
        cardio_type: kind.cardio_type,
        distance,
    })
}

/// Miles from the first distance statistic, falling back to the workout's own total
fn find_distance(attrs: &Attributes<'_>, statistics: &[Attributes<'_>]) -> Option<f64> {
    statistics
        .iter()
        .filter(|s| s.get("type").is_some_and(|t| DISTANCE_TYPES.contains(&t)))
        .find_map(|s| positive_quantity(s, "sum", s.get("unit"), miles_from_distance))
        .or_else(|| {
            positive_quantity(attrs, "totalDistance", attrs.get("totalDistanceUnit"), miles_from_distance)
        })
}

/// Kilocalories from the active-energy statistic, falling back to the workout total
fn find_active_energy(attrs: &Attributes<'_>, statistics: &[Attributes<'_>]) -> Option<f64> {
    statistics
        .iter()
        .filter(|s| s.get("type") == Some(ACTIVE_ENERGY_TYPE))
        .find_map(|s| positive_quantity(s, "sum", s.get("unit"), kilocalories_from_energy))
        .or_else(|| {
            positive_quantity(
                attrs,
                "totalEnergyBurned",
                attrs.get("totalEnergyBurnedUnit"),
                kilocalories_from_energy,
            )
        })
}

/// A zero or unreadable auxiliary figure counts as absent rather than malformed.
fn positive_quantity(
    attrs: &Attributes<'_>,
    field: &str,
    unit: Option<&str>,
    convert: fn(f64, &str) -> Option<f64>,
) -> Option<f64> {
    let value = parse_number(attrs.get(field)?, field).ok()?;
    if value <= 0.0 {
        return None;
    }
    convert(value, unit.unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::model::{BlockCategory, CardioType};

    fn extract(fragment: &str) -> ExtractionAccumulator {
        let mut acc = ExtractionAccumulator::new();
        extract_workouts(fragment, &mut acc);
        acc
    }

    #[test]
    fn test_running_workout_with_distance_statistic() {
        let acc = extract(
            r#"<Workout workoutActivityType="HKWorkoutActivityTypeRunning" duration="1800" durationUnit="sec" startDate="2024-01-15 07:00:00 -0500" endDate="2024-01-15 07:30:00 -0500">
  <MetadataEntry key="HKIndoorWorkout" value="0"/>
  <WorkoutStatistics type="HKQuantityTypeIdentifierDistanceWalkingRunning" startDate="2024-01-15 07:00:00 -0500" sum="5" unit="km"/>
 </Workout>"#,
        );
        assert_eq!(acc.workouts.len(), 1);
        let w = &acc.workouts[0];
        assert_eq!(w.name, "Running");
        assert_eq!(w.total_duration, 1800);
        assert_eq!(w.distance, Some(3.11));
        assert_eq!(w.cardio_type, Some(CardioType::Run));
        assert_eq!(w.block.category, BlockCategory::Cardio);
        assert_eq!(w.effort, None);
        assert_eq!(w.start.to_rfc3339(), "2024-01-15T12:00:00+00:00");
        assert!(w.start <= w.end);
    }

    #[test]
    fn test_attribute_order_does_not_matter() {
        let acc = extract(
            r#"<Workout endDate="2024-02-01 10:45:00 +0000" durationUnit="min" startDate="2024-02-01 10:00:00 +0000" duration="45" workoutActivityType="HKWorkoutActivityTypeTraditionalStrengthTraining"/>"#,
        );
        assert_eq!(acc.workouts.len(), 1);
        assert_eq!(acc.workouts[0].total_duration, 2700);
        assert_eq!(acc.workouts[0].block.category, BlockCategory::Strength);
        assert_eq!(acc.workouts[0].distance, None);
    }

    #[test]
    fn test_energy_drives_effort_estimate() {
        let acc = extract(
            r#"<Workout workoutActivityType="HKWorkoutActivityTypeHighIntensityIntervalTraining" duration="30" durationUnit="min" startDate="2024-03-01 06:00:00 +0000" endDate="2024-03-01 06:30:00 +0000">
  <WorkoutStatistics type="HKQuantityTypeIdentifierActiveEnergyBurned" sum="300" unit="kcal"/>
 </Workout>"#,
        );
        assert_eq!(acc.workouts[0].effort, Some(6));
        assert_eq!(acc.workouts[0].name, "HIIT");
    }

    #[test]
    fn test_totals_on_opening_tag_are_fallbacks() {
        let acc = extract(
            r#"<Workout workoutActivityType="HKWorkoutActivityTypeCycling" duration="1" durationUnit="hr" totalDistance="20" totalDistanceUnit="mi" totalEnergyBurned="2510.4" totalEnergyBurnedUnit="kJ" startDate="2024-03-02 06:00:00 +0000" endDate="2024-03-02 07:00:00 +0000"></Workout>"#,
        );
        let w = &acc.workouts[0];
        assert_eq!(w.distance, Some(20.0));
        // 600 kcal over 60 minutes = 10 kcal/min
        assert_eq!(w.effort, Some(6));
        assert_eq!(w.cardio_type, Some(CardioType::Bike));
    }

    #[test]
    fn test_first_distance_identifier_wins() {
        let acc = extract(
            r#"<Workout workoutActivityType="HKWorkoutActivityTypeWalking" duration="60" durationUnit="min" totalDistance="9" totalDistanceUnit="km" startDate="2024-03-03 06:00:00 +0000" endDate="2024-03-03 07:00:00 +0000">
  <WorkoutStatistics type="HKQuantityTypeIdentifierDistanceCycling" sum="2" unit="km"/>
  <WorkoutStatistics type="HKQuantityTypeIdentifierDistanceWalkingRunning" sum="4" unit="km"/>
 </Workout>"#,
        );
        assert_eq!(acc.workouts[0].distance, Some(1.24));
    }

    #[test]
    fn test_statistics_of_next_workout_are_not_borrowed() {
        let acc = extract(
            r#"<Workout workoutActivityType="HKWorkoutActivityTypeYoga" duration="20" durationUnit="min" startDate="2024-03-04 06:00:00 +0000" endDate="2024-03-04 06:20:00 +0000">
 </Workout>
 <Workout workoutActivityType="HKWorkoutActivityTypeRunning" duration="20" durationUnit="min" startDate="2024-03-04 18:00:00 +0000" endDate="2024-03-04 18:20:00 +0000">
  <WorkoutStatistics type="HKQuantityTypeIdentifierDistanceWalkingRunning" sum="3" unit="km"/>
 </Workout>"#,
        );
        assert_eq!(acc.workouts.len(), 2);
        assert_eq!(acc.workouts[0].distance, None);
        assert_eq!(acc.workouts[1].distance, Some(1.86));
    }

    #[test]
    fn test_malformed_duration_is_skipped() {
        let acc = extract(
            r#"<Workout workoutActivityType="HKWorkoutActivityTypeRunning" duration="abc" durationUnit="sec" startDate="2024-01-15 07:00:00 +0000" endDate="2024-01-15 07:30:00 +0000"/>
<Workout workoutActivityType="HKWorkoutActivityTypeRunning" duration="10" durationUnit="min" startDate="2024-01-16 07:00:00 +0000" endDate="2024-01-16 07:10:00 +0000"/>"#,
        );
        assert_eq!(acc.workouts.len(), 1);
        assert_eq!(acc.skipped, 1);
    }

    #[test]
    fn test_end_before_start_is_skipped() {
        let acc = extract(
            r#"<Workout workoutActivityType="HKWorkoutActivityTypeRunning" duration="10" durationUnit="min" startDate="2024-01-16 07:10:00 +0000" endDate="2024-01-16 07:00:00 +0000"/>"#,
        );
        assert!(acc.workouts.is_empty());
        assert_eq!(acc.skipped, 1);
    }

    #[test]
    fn test_workout_children_are_not_workouts() {
        let acc = extract(r#"<WorkoutStatistics type="x" sum="1"/><WorkoutEvent type="pause"/>"#);
        assert!(acc.workouts.is_empty());
        assert_eq!(acc.skipped, 0);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let acc = extract(
            r#"<Workout workoutActivityType="HKWorkoutActivityTypeRowing" duration="10" durationUnit="min" startDate="2024-01-16 07:00:00 +0000" endDate="2024-01-16 07:10:00 +0000"/>
<Workout workoutActivityType="HKWorkoutActivityTypeRowing" duration="10" durationUnit="min" startDate="2024-01-17 07:00:00 +0000" endDate="2024-01-17 07:10:00 +0000"/>"#,
        );
        assert_eq!(acc.workouts.len(), 2);
        assert_ne!(acc.workouts[0].id, acc.workouts[1].id);
        assert_eq!(acc.workouts[0].id.len(), 36);
    }
}
