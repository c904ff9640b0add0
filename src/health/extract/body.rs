use regex::Regex;
use std::sync::OnceLock;

use super::{parse_timestamp, Attributes, ExtractionAccumulator};
use crate::error::{LiftlogError, Result};
use crate::health::model::BodyMetric;
use crate::health::units::{pounds_from_mass, round_to};

const BODY_MASS_TYPE: &str = "HKQuantityTypeIdentifierBodyMass";
const BODY_FAT_TYPE: &str = "HKQuantityTypeIdentifierBodyFatPercentage";

fn record_regex() -> &'static Regex {
    static RECORD: OnceLock<Regex> = OnceLock::new();
    RECORD.get_or_init(|| Regex::new(r"<Record\s([^>]*)>").expect("Invalid record pattern"))
}

/// Fold body-mass and body-fat records into the per-date accumulator.
///
/// Each record only touches its own field, so a weigh-in and a body-fat
/// reading on the same day end up in one entry.
pub fn extract_body_metrics(fragment: &str, acc: &mut ExtractionAccumulator) {
    for cap in record_regex().captures_iter(fragment) {
        let Some(raw) = cap.get(1) else {
            continue;
        };
        let attrs = Attributes::parse(raw.as_str().trim_end().trim_end_matches('/'));

        match attrs.get("type") {
            Some(BODY_MASS_TYPE) => match read_body_mass(&attrs) {
                Ok((date, weight)) => {
                    acc.body_metrics
                        .entry(date)
                        .or_insert_with(|| BodyMetric::empty(date))
                        .weight = Some(weight);
                }
                Err(e) => acc.skip("body mass", e),
            },
            Some(BODY_FAT_TYPE) => match read_body_fat(&attrs) {
                Ok((date, body_fat)) => {
                    acc.body_metrics
                        .entry(date)
                        .or_insert_with(|| BodyMetric::empty(date))
                        .body_fat = Some(body_fat);
                }
                Err(e) => acc.skip("body fat", e),
            },
            _ => {}
        }
    }
}

fn read_body_mass(attrs: &Attributes<'_>) -> Result<(chrono::NaiveDate, f64)> {
    let value = attrs.number("value")?;
    let unit = attrs.require("unit")?;
    let pounds = pounds_from_mass(value, unit)
        .ok_or_else(|| LiftlogError::MalformedRecord(format!("unknown mass unit {:?}", unit)))?;
    let date = parse_timestamp(attrs.require("startDate")?)?.date_naive();
    Ok((date, round_to(pounds, 1)))
}

fn read_body_fat(attrs: &Attributes<'_>) -> Result<(chrono::NaiveDate, f64)> {
    let fraction = attrs.number("value")?;
    let date = parse_timestamp(attrs.require("startDate")?)?.date_naive();
    Ok((date, round_to(fraction * 100.0, 1)))
}
