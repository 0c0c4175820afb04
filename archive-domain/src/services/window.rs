use thiserror::Error;

use crate::value_objects::TimeRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub range: TimeRange,
    /// The window reaches the end of the outer range; nothing is left to fetch after it.
    pub is_final: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("range {outer} is already covered up to {next_start_ms}")]
pub struct WindowCovered {
    pub outer: TimeRange,
    pub next_start_ms: i64,
}

/// Computes the next time window to fetch.
///
/// `max_committed_ms` is the durable high-water mark (already restricted to `outer` when one
/// is given). `now_ms` seeds the start only when nothing is committed and there is no outer
/// range.
pub fn next_window(
    max_committed_ms: Option<i64>,
    outer: Option<TimeRange>,
    duration_ms: i64,
    now_ms: i64,
) -> Result<Window, WindowCovered> {
    let after_max = max_committed_ms.map(|max| max + 1);
    let Some(outer) = outer else {
        let start = after_max.unwrap_or(now_ms);
        return Ok(Window {
            range: TimeRange::new(start, start + duration_ms),
            is_final: false,
        });
    };

    let start = after_max.map_or(outer.start_ms, |next| next.max(outer.start_ms));
    if outer.end_ms <= start {
        return Err(WindowCovered {
            outer,
            next_start_ms: start,
        });
    }

    let candidate_end = start + duration_ms;
    if candidate_end >= outer.end_ms {
        Ok(Window {
            range: TimeRange::new(start, outer.end_ms),
            is_final: true,
        })
    } else {
        Ok(Window {
            range: TimeRange::new(start, candidate_end),
            is_final: false,
        })
    }
}
