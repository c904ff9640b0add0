use crate::health::model::{BlockCategory, CardioType};

const TYPE_PREFIX: &str = "HKWorkoutActivityType";

/// Internal classification of an export activity-type tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityKind {
    pub display_name: String,
    pub category: BlockCategory,
    pub cardio_type: Option<CardioType>,
}

/// (tag suffix, display name, category, cardio subtype)
const KNOWN_TYPES: &[(&str, &str, BlockCategory, Option<CardioType>)] = &[
    ("Running", "Running", BlockCategory::Cardio, Some(CardioType::Run)),
    ("Walking", "Walking", BlockCategory::Cardio, Some(CardioType::Walk)),
    ("Hiking", "Hiking", BlockCategory::Cardio, Some(CardioType::Hike)),
    ("Cycling", "Cycling", BlockCategory::Cardio, Some(CardioType::Bike)),
    ("HandCycling", "Hand Cycling", BlockCategory::Cardio, Some(CardioType::Bike)),
    ("Swimming", "Swimming", BlockCategory::Cardio, Some(CardioType::Swim)),
    ("Rowing", "Rowing", BlockCategory::Cardio, Some(CardioType::Row)),
    ("Elliptical", "Elliptical", BlockCategory::Cardio, Some(CardioType::Elliptical)),
    ("StairClimbing", "Stair Climbing", BlockCategory::Cardio, Some(CardioType::Stairs)),
    ("Stairs", "Stairs", BlockCategory::Cardio, Some(CardioType::Stairs)),
    ("MixedCardio", "Mixed Cardio", BlockCategory::Cardio, None),
    ("JumpRope", "Jump Rope", BlockCategory::Cardio, None),
    ("TraditionalStrengthTraining", "Strength Training", BlockCategory::Strength, None),
    ("FunctionalStrengthTraining", "Functional Strength", BlockCategory::Strength, None),
    ("CoreTraining", "Core Training", BlockCategory::Strength, None),
    ("HighIntensityIntervalTraining", "HIIT", BlockCategory::Conditioning, None),
    ("CrossTraining", "Cross Training", BlockCategory::Conditioning, None),
    ("Boxing", "Boxing", BlockCategory::Conditioning, None),
    ("Kickboxing", "Kickboxing", BlockCategory::Conditioning, None),
    ("Yoga", "Yoga", BlockCategory::Cooldown, None),
    ("Pilates", "Pilates", BlockCategory::Cooldown, None),
    ("Flexibility", "Flexibility", BlockCategory::Cooldown, None),
    ("Cooldown", "Cooldown", BlockCategory::Cooldown, None),
    ("MindAndBody", "Mind & Body", BlockCategory::Cooldown, None),
];

/// Map an export activity-type tag to a display name and categorization.
///
/// Unknown tags keep a readable version of the tag text and are filed under
/// conditioning.
pub fn resolve_activity_type(tag: &str) -> ActivityKind {
    let suffix = tag.strip_prefix(TYPE_PREFIX).unwrap_or(tag);

    if let Some((_, name, category, cardio)) = KNOWN_TYPES.iter().find(|(key, ..)| *key == suffix) {
        return ActivityKind {
            display_name: name.to_string(),
            category: *category,
            cardio_type: *cardio,
        };
    }

    ActivityKind {
        display_name: humanize_tag(suffix),
        category: BlockCategory::Conditioning,
        cardio_type: None,
    }
}

/// "TableTennis" -> "Table Tennis", "snow_sports" -> "Snow Sports"
fn humanize_tag(tag: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in tag.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    let name = words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        "Workout".to_string()
    } else {
        name
    }
}
