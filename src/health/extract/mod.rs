//! Pattern-based record extractors.
//!
//! Each extractor scans one boundary-safe fragment with regexes and pushes
//! what it finds into the shared [`ExtractionAccumulator`]. Fragments are not
//! well-formed sub-documents, so nothing here builds a tree. Attributes are
//! read into a map, which makes matching independent of attribute order.

mod activity;
mod activity_types;
mod body;
mod workouts;

pub use activity::extract_activity_days;
pub use activity_types::{resolve_activity_type, ActivityKind};
pub use body::extract_body_metrics;
pub use workouts::extract_workouts;

use chrono::{DateTime, FixedOffset, NaiveDate};
use regex::Regex;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use super::model::{ActivityDay, BodyMetric, ExtractedWorkout};
use crate::error::{LiftlogError, Result};

/// State that outlives a single fragment during one import.
#[derive(Debug, Default)]
pub struct ExtractionAccumulator {
    pub workouts: Vec<ExtractedWorkout>,
    pub body_metrics: BTreeMap<NaiveDate, BodyMetric>,
    pub activity_days: Vec<ActivityDay>,
    /// Records dropped because a field failed to convert.
    pub skipped: usize,
}

impl ExtractionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every extractor over `fragment` in the fixed order
    /// workouts, body metrics, activity summaries.
    pub fn ingest_fragment(&mut self, fragment: &str) {
        extract_workouts(fragment, self);
        extract_body_metrics(fragment, self);
        extract_activity_days(fragment, self);
    }

    /// Drop a record that failed conversion; never aborts the import.
    pub(crate) fn skip(&mut self, kind: &str, err: LiftlogError) {
        self.skipped += 1;
        log::debug!("Skipping {} record: {}", kind, err);
    }
}

fn attribute_regex() -> &'static Regex {
    static ATTRIBUTE: OnceLock<Regex> = OnceLock::new();
    ATTRIBUTE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][\w:.\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("Invalid attribute pattern")
    })
}

/// Attributes of one element's opening tag, unescaped.
pub(crate) struct Attributes<'a> {
    values: HashMap<&'a str, Cow<'a, str>>,
}

impl<'a> Attributes<'a> {
    pub(crate) fn parse(raw: &'a str) -> Self {
        let mut values = HashMap::new();
        for cap in attribute_regex().captures_iter(raw) {
            let (Some(name), Some(value)) = (cap.get(1), cap.get(2).or_else(|| cap.get(3))) else {
                continue;
            };
            let value = value.as_str();
            let value = quick_xml::escape::unescape(value).unwrap_or(Cow::Borrowed(value));
            values.insert(name.as_str(), value);
        }
        Self { values }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_ref())
    }

    pub(crate) fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| LiftlogError::MalformedRecord(format!("missing attribute {}", name)))
    }

    pub(crate) fn number(&self, name: &str) -> Result<f64> {
        parse_number(self.require(name)?, name)
    }
}

pub(crate) fn parse_number(raw: &str, field: &str) -> Result<f64> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        LiftlogError::MalformedRecord(format!("{} is not a number: {:?}", field, raw))
    })?;
    if !value.is_finite() {
        return Err(LiftlogError::MalformedRecord(format!("{} is not finite: {:?}", field, raw)));
    }
    Ok(value)
}

/// Export timestamps look like `2024-01-15 07:30:00 -0500`; RFC 3339 is accepted too.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map_err(|e| LiftlogError::MalformedRecord(format!("bad timestamp {:?}: {}", raw, e)))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| LiftlogError::MalformedRecord(format!("bad date {:?}: {}", raw, e)))
}
