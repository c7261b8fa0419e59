//! # Schedule
//!
//! The compiler's output: one shared time axis and, per role, one hardware
//! command per tick.
//!
//! ## JSON Format
//! ```json
//! {
//!   "time": [0.0, 250.0, 1000.0],
//!   "instructions": {
//!     "R": [
//!       {"action": "actuate", "pumpPwm": 192,
//!        "ports": {"port1": "open", "port2": "closed", "port3": "closed",
//!                  "port4": "closed", "port5": "closed"}}
//!     ]
//!   }
//! }
//! ```
//! Every instruction array has the same length as `time`. Playback and
//! storage depend on this layout, so field names are fixed here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConvertError;
use crate::params::PortIndex;
use crate::timeline::IntermediateAction;

/// What the pump does for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpAction {
    Stop,
    Actuate,
    Release,
}

impl From<IntermediateAction> for PumpAction {
    fn from(action: IntermediateAction) -> Self {
        match action {
            IntermediateAction::Inflate | IntermediateAction::TrillInflate => PumpAction::Actuate,
            IntermediateAction::Release | IntermediateAction::TrillRelease => PumpAction::Release,
            IntermediateAction::NoChange => PumpAction::Stop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
}

/// Valve state of the five ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStates {
    pub port1: PortState,
    pub port2: PortState,
    pub port3: PortState,
    pub port4: PortState,
    pub port5: PortState,
}

impl PortStates {
    pub fn closed() -> Self {
        Self::from_fn(|_| PortState::Closed)
    }

    pub fn from_fn(mut state: impl FnMut(PortIndex) -> PortState) -> Self {
        let mut states = [PortState::Closed; 5];
        for port in PortIndex::all() {
            states[port.slot()] = state(port);
        }
        let [port1, port2, port3, port4, port5] = states;
        Self {
            port1,
            port2,
            port3,
            port4,
            port5,
        }
    }

    pub fn get(&self, port: PortIndex) -> PortState {
        self.as_array()[port.slot()]
    }

    pub fn as_array(&self) -> [PortState; 5] {
        [self.port1, self.port2, self.port3, self.port4, self.port5]
    }

    pub fn open_ports(&self) -> impl Iterator<Item = PortIndex> + '_ {
        PortIndex::all().filter(|port| self.get(*port) == PortState::Open)
    }
}

/// One hardware command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub action: PumpAction,
    #[serde(rename = "pumpPwm")]
    pub intensity: u8,
    pub ports: PortStates,
}

impl Command {
    pub fn stop() -> Self {
        Self {
            action: PumpAction::Stop,
            intensity: 0,
            ports: PortStates::closed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schedule {
    /// Tick times in milliseconds, strictly increasing.
    pub time: Vec<f64>,
    /// Role name to one command per tick.
    pub instructions: BTreeMap<String, Vec<Command>>,
}

impl Schedule {
    /// Combine per-role results into a schedule.
    ///
    /// Every role is examined; if any failed, all failures are returned
    /// together and no schedule is produced.
    pub fn assemble<I>(time: Vec<f64>, results: I) -> Result<Self, ConvertError>
    where
        I: IntoIterator<Item = (String, Result<Vec<Command>, ConvertError>)>,
    {
        let mut instructions = BTreeMap::new();
        let mut errors = Vec::new();

        for (role, result) in results {
            match result {
                Ok(commands) => {
                    if commands.len() != time.len() {
                        errors.push(ConvertError::ConfigError(format!(
                            "role '{}' produced {} commands for {} ticks",
                            role,
                            commands.len(),
                            time.len()
                        )));
                        continue;
                    }
                    instructions.insert(role, commands);
                }
                Err(err) => {
                    log::debug!("role '{}' failed: {}", role, err);
                    errors.push(err);
                }
            }
        }

        match ConvertError::accumulate(errors) {
            Some(err) => Err(err),
            None => Ok(Self { time, instructions }),
        }
    }

    /// Time of the last tick.
    pub fn duration_ms(&self) -> f64 {
        self.time.last().copied().unwrap_or(0.0)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.instructions.keys().map(String::as_str)
    }

    pub fn commands(&self, role: &str) -> Option<&[Command]> {
        self.instructions.get(role).map(Vec::as_slice)
    }

    pub fn to_json(&self) -> Result<String, ConvertError> {
        serde_json::to_string(self).map_err(|e| ConvertError::OutputError(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, ConvertError> {
        serde_json::to_string_pretty(self).map_err(|e| ConvertError::OutputError(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, ConvertError> {
        serde_json::from_str(text).map_err(|e| ConvertError::DocumentError {
            part: None,
            message: format!("invalid schedule JSON: {}", e),
        })
    }
}
