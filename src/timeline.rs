//! # Timeline Builder
//!
//! Turns one part's measures into absolute-time actuation events.
//!
//! ## Timing
//! A division lasts `60000 / (bpm * divisions)` ms, where `divisions` is the
//! enclosing measure's divisions per quarter note. Start times are computed
//! from whole-division offsets within each measure, so integer note lengths
//! land on exact millisecond values whenever the arithmetic allows it.
//!
//! ## Event Mapping
//! | Note        | Events                                                   |
//! |-------------|----------------------------------------------------------|
//! | `Rest`      | `Release`                                                |
//! | `Hold`      | `NoChange`                                               |
//! | `Actuate`   | `Inflate`                                                |
//! | `Trill`     | `floor(D / interval)` x alternating `Inflate`/`NoChange` |
//! | `HardTrill` | `floor(D / interval)` x `TrillInflate`/`TrillRelease`    |
//!
//! A trailing `NoChange` event marks the part's end time.

use serde::Serialize;

use crate::score::{Dynamic, Measure, Note};

/// What a single port asks the pump to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IntermediateAction {
    Inflate,
    Release,
    NoChange,
    TrillInflate,
    TrillRelease,
}

impl IntermediateAction {
    /// True for the two actions that add air.
    pub fn is_inflating(&self) -> bool {
        matches!(self, IntermediateAction::Inflate | IntermediateAction::TrillInflate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntermediateEvent {
    /// Milliseconds from the start of the score.
    pub start_ms: f64,
    pub action: IntermediateAction,
    pub dynamic: Dynamic,
    pub measure: u32,
    /// Index of the source note within its measure.
    pub note: usize,
}

impl IntermediateEvent {
    /// The event a port is in before its first real event.
    pub fn idle(start_ms: f64) -> Self {
        Self {
            start_ms,
            action: IntermediateAction::NoChange,
            dynamic: Dynamic::LOWEST,
            measure: 0,
            note: 0,
        }
    }
}

fn divisions_to_ms(count: u64, bpm: u32, divisions: u32) -> f64 {
    (count as f64 * 60_000.0) / (bpm as f64 * divisions as f64)
}

/// Build the event list for one part.
///
/// `bpm` and `trill_interval_ms` must be positive; the caller validates them.
pub fn build_timeline(bpm: u32, measures: &[Measure], trill_interval_ms: f64) -> Vec<IntermediateEvent> {
    let mut events = Vec::new();
    let mut measure_start = 0.0;
    let mut last_location = (0, 0);

    for (position, measure) in measures.iter().enumerate() {
        let number = measure.label(position);
        let mut offset: u64 = 0;

        for (index, note) in measure.notes.iter().enumerate() {
            let start = measure_start + divisions_to_ms(offset, bpm, measure.divisions);
            offset += note.duration() as u64;
            let end = measure_start + divisions_to_ms(offset, bpm, measure.divisions);
            last_location = (number, index + 1);

            if end <= start {
                log::warn!("measure {} note {} has zero duration, skipped", number, index + 1);
                continue;
            }

            let event = |start_ms: f64, action: IntermediateAction| IntermediateEvent {
                start_ms,
                action,
                dynamic: note.dynamic(),
                measure: number,
                note: index,
            };

            match note {
                Note::Rest { .. } => events.push(event(start, IntermediateAction::Release)),
                Note::Hold { .. } => events.push(event(start, IntermediateAction::NoChange)),
                Note::Actuate { .. } => events.push(event(start, IntermediateAction::Inflate)),
                Note::Trill { .. } => events.extend(
                    trill_starts(start, end - start, trill_interval_ms)
                        .zip([IntermediateAction::Inflate, IntermediateAction::NoChange].into_iter().cycle())
                        .map(|(t, action)| event(t, action)),
                ),
                Note::HardTrill { .. } => events.extend(
                    trill_starts(start, end - start, trill_interval_ms)
                        .zip(
                            [IntermediateAction::TrillInflate, IntermediateAction::TrillRelease]
                                .into_iter()
                                .cycle(),
                        )
                        .map(|(t, action)| event(t, action)),
                ),
            }
        }

        measure_start += divisions_to_ms(offset, bpm, measure.divisions);
    }

    let (measure, note) = last_location;
    events.push(IntermediateEvent {
        measure,
        note,
        ..IntermediateEvent::idle(measure_start)
    });
    events
}

/// Start times of the sub-events a trill of `duration_ms` expands into.
fn trill_starts(start: f64, duration_ms: f64, interval_ms: f64) -> impl Iterator<Item = f64> {
    // Absorb float noise so 100 / 20 counts as 5
    let count = (duration_ms / interval_ms + 1e-9).floor() as u64;
    (0..count).map(move |k| start + k as f64 * interval_ms)
}
