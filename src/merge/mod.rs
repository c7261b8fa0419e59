//! # Timeline Merger
//!
//! Brings the port timelines of one role onto a shared time axis and settles
//! each tick into a single hardware [`Command`].
//!
//! ## Sub-modules
//! - `axis` - Common timeline construction and resampling with carry-forward
//! - `resolver` - Per-tick precedence rules and conflict detection
//!
//! ## Precedence
//! | Requested actions present            | Result                         |
//! |--------------------------------------|--------------------------------|
//! | none of the four active actions      | `NoChange` (pump stops)        |
//! | `Inflate` only / `Release` only      | that action                    |
//! | `Inflate` and `Release`              | conflict                       |
//! | `TrillInflate` and `TrillRelease`    | conflict                       |
//! | one trill variant, anything plain    | the trill variant              |
//!
//! ## Entry Points
//! - [`common_timeline()`] - Tolerance-deduplicated union of start times
//! - [`merge_role()`] - Resolve a role against a given time axis

mod axis;
mod resolver;


pub use axis::{common_timeline, resample};
pub use resolver::{resolve_tick, PortRequest};

use crate::error::ConvertError;
use crate::params::DynamicsCurve;
use crate::roles::RoleTimelines;
use crate::schedule::Command;

/// Resolve every tick of `timeline` for one role.
///
/// `timeline` must contain the role's own event times (it may contain more,
/// e.g. the union over all roles). The first conflict aborts the role.
pub fn merge_role(
    role: &RoleTimelines,
    timeline: &[f64],
    curve: &DynamicsCurve,
    tolerance_ms: f64,
) -> Result<Vec<Command>, ConvertError> {
    let resampled: Vec<_> = role
        .ports
        .iter()
        .map(|port| (port, resample(&port.events, timeline, tolerance_ms)))
        .collect();

    timeline
        .iter()
        .enumerate()
        .map(|(tick, &time_ms)| {
            let requests: Vec<PortRequest> = resampled
                .iter()
                .map(|(port, events)| PortRequest {
                    port: port.port,
                    part: &port.part,
                    event: &events[tick],
                })
                .collect();
            resolve_tick(&role.role, time_ms, &requests, curve).map_err(ConvertError::from)
        })
        .collect()
}
