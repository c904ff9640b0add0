use serde::Serialize;

/// Share of the progress bar owned by the parsing phase; the rest is finalization.
pub const PARSING_PERCENT_CEILING: u64 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Parsing,
    Done,
}

/// Transient status emitted while an import runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportProgress {
    pub phase: ImportPhase,
    /// 0..=100
    pub percent: u8,
    pub detail: String,
}

impl ImportProgress {
    pub fn parsing(bytes_consumed: u64, total_bytes: u64, detail: String) -> Self {
        Self {
            phase: ImportPhase::Parsing,
            percent: parsing_percent(bytes_consumed, total_bytes),
            detail,
        }
    }

    pub fn done(detail: String) -> Self {
        Self {
            phase: ImportPhase::Done,
            percent: 100,
            detail,
        }
    }
}

/// floor(consumed / total * 95), clamped to the parsing ceiling
pub fn parsing_percent(bytes_consumed: u64, total_bytes: u64) -> u8 {
    if total_bytes == 0 {
        return 0;
    }
    let consumed = bytes_consumed.min(total_bytes) as u128;
    let percent = consumed * PARSING_PERCENT_CEILING as u128 / total_bytes as u128;
    percent as u8
}
