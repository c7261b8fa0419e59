//! Per-tick conflict resolution

use crate::error::{Conflict, ConflictKind, NoteLocation};
use crate::params::{DynamicsCurve, PortIndex};
use crate::schedule::{Command, PortState, PortStates, PumpAction};
use crate::timeline::{IntermediateAction, IntermediateEvent};

/// What one occupied port asks for at a tick.
#[derive(Debug, Clone, Copy)]
pub struct PortRequest<'a> {
    pub port: PortIndex,
    pub part: &'a str,
    pub event: &'a IntermediateEvent,
}

impl PortRequest<'_> {
    fn location(&self) -> NoteLocation {
        NoteLocation {
            part: self.part.to_string(),
            port: self.port,
            measure: self.event.measure,
            note: self.event.note,
        }
    }
}

/// Settle one tick of a role into a command.
///
/// Ports missing from `requests` count as `NoChange`.
pub fn resolve_tick(
    role: &str,
    time_ms: f64,
    requests: &[PortRequest],
    curve: &DynamicsCurve,
) -> Result<Command, Conflict> {
    let find = |action: IntermediateAction| requests.iter().find(|r| r.event.action == action);
    let conflict = |kind: ConflictKind, first: &PortRequest, second: &PortRequest| Conflict {
        role: role.to_string(),
        time_ms,
        kind,
        first: first.location(),
        second: second.location(),
    };

    let settled = match (
        find(IntermediateAction::TrillInflate),
        find(IntermediateAction::TrillRelease),
    ) {
        (Some(up), Some(down)) => return Err(conflict(ConflictKind::TrillInflateRelease, up, down)),
        (Some(_), None) => IntermediateAction::TrillInflate,
        (None, Some(_)) => IntermediateAction::TrillRelease,
        (None, None) => match (
            find(IntermediateAction::Inflate),
            find(IntermediateAction::Release),
        ) {
            (Some(up), Some(down)) => return Err(conflict(ConflictKind::InflateRelease, up, down)),
            (Some(_), None) => IntermediateAction::Inflate,
            (None, Some(_)) => IntermediateAction::Release,
            (None, None) => IntermediateAction::NoChange,
        },
    };

    let intensity = requests
        .iter()
        .filter(|r| r.event.action.is_inflating())
        .map(|r| curve.intensity(r.event.dynamic))
        .max()
        .unwrap_or(0);

    let ports = PortStates::from_fn(|port| {
        let requested = requests
            .iter()
            .find(|r| r.port == port)
            .map_or(IntermediateAction::NoChange, |r| r.event.action);
        if settled != IntermediateAction::NoChange && requested == settled {
            PortState::Open
        } else {
            PortState::Closed
        }
    });

    Ok(Command {
        action: PumpAction::from(settled),
        intensity,
        ports,
    })
}
