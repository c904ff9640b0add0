//! Chunked reader that hands out boundary-safe fragments of a large export.
//!
//! Only the chunk being read and the carry-over are held in memory. A fragment
//! always ends where no record the extractors need is left half-read, so the
//! concatenation of every fragment is exactly the source document.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::source::DocumentSource;
use crate::error::{LiftlogError, Result};

/// Shared flag a caller sets to stop an import between chunk reads.
pub type CancelFlag = Arc<AtomicBool>;

const SELF_CLOSE: &str = "/>";
const WORKOUT_OPEN: &str = "<Workout";
const WORKOUT_CLOSE: &str = "</Workout>";

pub struct ChunkedScanner<S> {
    source: S,
    chunk_size: usize,
    max_carry_over: usize,
    total: u64,
    offset: u64,
    /// Decoded text not yet handed out.
    pending: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    undecoded: Vec<u8>,
    finished: bool,
    cancel: Option<CancelFlag>,
}

impl<S: DocumentSource> ChunkedScanner<S> {
    pub fn new(source: S, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let total = source.size();
        Self {
            source,
            chunk_size,
            max_carry_over: chunk_size.saturating_mul(4),
            total,
            offset: 0,
            pending: String::new(),
            undecoded: Vec::new(),
            finished: false,
            cancel: None,
        }
    }

    /// Abort once the carry-over grows past `chunks` chunk sizes without a safe cut.
    pub fn with_carry_over_limit(mut self, chunks: usize) -> Self {
        self.max_carry_over = self.chunk_size.saturating_mul(chunks.max(1));
        self
    }

    pub fn with_cancel(mut self, cancel: Option<CancelFlag>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.offset
    }

    /// Read chunks until a safe fragment can be emitted.
    ///
    /// Returns `Ok(None)` once the terminal fragment has been handed out.
    /// Several chunks may be consumed before a fragment appears.
    pub async fn next_fragment(&mut self) -> Result<Option<String>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            if let Some(cancel) = &self.cancel {
                if cancel.load(Ordering::Relaxed) {
                    return Err(LiftlogError::Cancelled {
                        bytes_consumed: self.offset,
                    });
                }
            }

            let remaining = self.total.saturating_sub(self.offset);
            let len = remaining.min(self.chunk_size as u64) as usize;
            let bytes = if len > 0 {
                self.source
                    .read_range(self.offset, len)
                    .await
                    .map_err(|source| LiftlogError::SourceRead {
                        offset: self.offset,
                        source,
                    })?
            } else {
                Vec::new()
            };

            if bytes.len() != len {
                return Err(LiftlogError::SourceRead {
                    offset: self.offset,
                    source: std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("expected {} bytes, got {}", len, bytes.len()),
                    ),
                });
            }

            self.offset += len as u64;
            let is_final = self.offset >= self.total;
            self.decode_into_pending(bytes, is_final);

            if is_final {
                self.finished = true;
                return Ok(Some(std::mem::take(&mut self.pending)));
            }

            match find_safe_cut(&self.pending) {
                Some(cut) => {
                    let rest = self.pending.split_off(cut);
                    return Ok(Some(std::mem::replace(&mut self.pending, rest)));
                }
                None if self.pending.len() > self.max_carry_over => {
                    return Err(LiftlogError::SourceRead {
                        offset: self.offset,
                        source: std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!(
                                "no record boundary found in {} bytes of carry-over",
                                self.pending.len()
                            ),
                        ),
                    });
                }
                None => {
                    log::debug!(
                        "No safe cut yet at byte {}, carrying {} bytes",
                        self.offset,
                        self.pending.len()
                    );
                }
            }
        }
    }

    /// Decode `bytes` after any carried tail. Invalid sequences become U+FFFD;
    /// an incomplete sequence at the very end waits for the next read unless
    /// this is the last chunk.
    fn decode_into_pending(&mut self, bytes: Vec<u8>, is_final: bool) {
        let mut buf = std::mem::take(&mut self.undecoded);
        buf.extend_from_slice(&bytes);

        let mut rest = buf.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.pending.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    self.pending.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(invalid) => {
                            self.pending.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[invalid..];
                        }
                        None if is_final => {
                            self.pending.push(char::REPLACEMENT_CHARACTER);
                            return;
                        }
                        None => {
                            self.undecoded = after.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Rightmost index after which `text` holds no partial record.
///
/// The candidate is the later of the last self-closing element and the last
/// workout container close. A self-closing child of a workout that has not
/// closed yet is not safe, so the cut then falls back to just before that
/// workout's opening tag.
pub fn find_safe_cut(text: &str) -> Option<usize> {
    let self_closing = text.rfind(SELF_CLOSE).map(|i| i + SELF_CLOSE.len());
    let container = text.rfind(WORKOUT_CLOSE).map(|i| i + WORKOUT_CLOSE.len());
    let candidate = self_closing.max(container)?;

    let search_from = container.unwrap_or(0).min(candidate);
    match open_workout_start(&text[search_from..candidate]) {
        Some(open) => {
            let cut = search_from + open;
            (cut > 0).then_some(cut)
        }
        None => Some(candidate),
    }
}

/// Start of a `<Workout …>` container in `text` whose close tag is not in `text`.
fn open_workout_start(text: &str) -> Option<usize> {
    let (start, _) = text
        .match_indices(WORKOUT_OPEN)
        .filter(|(i, _)| {
            text[i + WORKOUT_OPEN.len()..]
                .chars()
                .next()
                .is_some_and(char::is_whitespace)
        })
        .last()?;

    match text[start..].find('>') {
        Some(end) if text[..start + end].ends_with('/') => None,
        _ => Some(start),
    }
}
