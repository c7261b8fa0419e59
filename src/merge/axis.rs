//! Common time axis and resampling

use crate::timeline::IntermediateEvent;

/// Sorted union of `times`, with values within `tolerance_ms` of the last
/// kept tick folded into it.
///
/// Consecutive ticks of the result are always more than `tolerance_ms` apart.
pub fn common_timeline(times: impl IntoIterator<Item = f64>, tolerance_ms: f64) -> Vec<f64> {
    let mut times: Vec<f64> = times.into_iter().filter(|t| t.is_finite()).collect();
    times.sort_by(f64::total_cmp);

    times.into_iter().fold(Vec::new(), |mut ticks, t| {
        match ticks.last() {
            Some(&last) if t - last <= tolerance_ms => {}
            _ => ticks.push(t),
        }
        ticks
    })
}

/// One event per tick for a single port.
///
/// An event belongs to the latest tick at or before its start (within
/// tolerance). Ticks without an event of their own repeat the most recent
/// event; ticks before the first event are idle `NoChange`.
pub fn resample(
    events: &[IntermediateEvent],
    timeline: &[f64],
    tolerance_ms: f64,
) -> Vec<IntermediateEvent> {
    let mut cursor = 0;
    let mut current: Option<&IntermediateEvent> = None;

    timeline
        .iter()
        .enumerate()
        .map(|(i, &tick)| {
            let next = timeline.get(i + 1).copied();
            while let Some(event) = events.get(cursor) {
                let belongs = event.start_ms <= tick + tolerance_ms
                    && next.map_or(true, |n| event.start_ms < n);
                if !belongs {
                    break;
                }
                current = Some(event);
                cursor += 1;
            }
            match current {
                Some(event) => IntermediateEvent {
                    start_ms: tick,
                    ..event.clone()
                },
                None => IntermediateEvent::idle(tick),
            }
        })
        .collect()
}
