use std::cmp::Ordering;

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{RankedEvent, RawEventCounts};

/// Orders events by count, highest first, and keeps the first `top_n`.
///
/// Equal counts are ordered by event name (byte-wise, case-sensitive).
/// Events with a zero count never appear.
pub fn rank(raw: &RawEventCounts, top_n: usize) -> Result<Vec<RankedEvent>> {
    if top_n == 0 {
        return Err(Error::InvalidTopN(top_n));
    }
    raw.validate()?;

    let mut events: Vec<(&str, u64)> = raw
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(name, count)| (name, count as u64))
        .collect();

    events.sort_by(|a, b| compare_entries(*a, *b));

    let ranked: Vec<RankedEvent> = events
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(index, (name, count))| RankedEvent {
            name: name.to_string(),
            count,
            rank: index + 1,
        })
        .collect();

    debug!(top_n, ranked = ranked.len(), "ranked events");
    Ok(ranked)
}

fn compare_entries(a: (&str, u64), b: (&str, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}
