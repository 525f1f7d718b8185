//! Cumulative hourly engagement curve.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// First displayed slot boundary, as an hour of the local day.
pub const FIRST_SLOT_HOUR: u32 = 8;
/// Last displayed slot boundary, inclusive.
pub const LAST_SLOT_HOUR: u32 = 23;

/// One point on the curve: how many ballots were cast before `hour` o'clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Display label, e.g. `"09:00"`.
    pub slot: String,
    pub hour: u32,
    pub cumulative_votes: u64,
}

/// Build the left-cumulative curve over the fixed display window.
///
/// Slot `h` counts every timestamp whose local hour is strictly less than
/// `h`, so the values never decrease from one slot to the next.
pub fn build(timestamps: &[DateTime<Utc>], utc_offset: FixedOffset) -> Vec<CurvePoint> {
    let mut per_hour = [0u64; 24];
    for timestamp in timestamps {
        per_hour[timestamp.with_timezone(&utc_offset).hour() as usize] += 1;
    }

    (FIRST_SLOT_HOUR..=LAST_SLOT_HOUR)
        .map(|hour| CurvePoint {
            slot: format!("{hour:02}:00"),
            hour,
            cumulative_votes: per_hour[..hour as usize].iter().sum(),
        })
        .collect()
}
