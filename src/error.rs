//! # Error Types
//!
//! This module defines all error types for the score-to-schedule compiler.
//!
//! Every error carries enough structure (part ids, measure numbers, note
//! indices, ports) for an editor to highlight the offending score locations,
//! plus a human-readable message through `Display`.
//!
//! ## Error Types
//! - `DocumentError` - Malformed XML, or `score-part`/`part` that do not correlate
//! - `SemanticError` - Missing time/divisions on a first measure, notes with no dynamic
//! - `MappingError` - Role with 0 or more than 5 parts, duplicate port, unknown part
//! - `ConflictError` - Contradictory simultaneous port actions within a role
//! - `ConfigError` - Invalid conversion parameters
//! - `OutputError` - The schedule could not be encoded
//! - `Multiple` - Several of the above from one conversion
//!
//! ## Usage
//! ```rust,ignore
//! use hapticscore::{convert, ConvertError};
//!
//! match convert(xml, &params) {
//!     Ok(schedule) => println!("{} ticks", schedule.time.len()),
//!     Err(ConvertError::ConflictError(conflict)) => {
//!         eprintln!("conflict in measure {}", conflict.first.measure);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::params::PortIndex;
use crate::score::PartId;

/// Where in the score something happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreLocation {
    pub part: PartId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PortIndex>,
}

impl ScoreLocation {
    pub fn part(part: &str) -> Self {
        Self {
            part: part.to_string(),
            measure: None,
            note: None,
            port: None,
        }
    }
}

/// A note that took part in a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteLocation {
    pub part: PartId,
    pub port: PortIndex,
    pub measure: u32,
    /// Index of the note within its measure, 0-based.
    pub note: usize,
}

impl From<&NoteLocation> for ScoreLocation {
    fn from(loc: &NoteLocation) -> Self {
        Self {
            part: loc.part.clone(),
            measure: Some(loc.measure),
            note: Some(loc.note),
            port: Some(loc.port),
        }
    }
}

/// Which pair of actions collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    InflateRelease,
    TrillInflateRelease,
}

/// Two ports of one role asking for opposite pump actions at the same tick.
#[derive(Error, Debug, Clone, PartialEq)]
#[error(
    "Conflict in role '{role}' at {time_ms} ms: {} (part '{}', port {}, measure {}, note {}) against {} (part '{}', port {}, measure {}, note {})",
    first_action(.kind), .first.part, .first.port, .first.measure, .first.note + 1,
    second_action(.kind), .second.part, .second.port, .second.measure, .second.note + 1
)]
pub struct Conflict {
    pub role: String,
    pub time_ms: f64,
    pub kind: ConflictKind,
    /// The port requesting the inflating action.
    pub first: NoteLocation,
    /// The port requesting the releasing action.
    pub second: NoteLocation,
}

fn first_action(kind: &ConflictKind) -> &'static str {
    match kind {
        ConflictKind::InflateRelease => "inflate",
        ConflictKind::TrillInflateRelease => "trill inflate",
    }
}

fn second_action(kind: &ConflictKind) -> &'static str {
    match kind {
        ConflictKind::InflateRelease => "release",
        ConflictKind::TrillInflateRelease => "trill release",
    }
}

/// A role/port assignment that cannot be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingProblem {
    #[error("role '{role}' has no mapped parts")]
    NoParts { role: String },

    #[error("role '{role}' has too many parts ({} mapped, at most 5): {}", .parts.len(), .parts.join(", "))]
    TooManyParts { role: String, parts: Vec<PartId> },

    #[error("port {port} of role '{role}' is assigned to both '{first}' and '{second}'")]
    DuplicatePort {
        role: String,
        port: PortIndex,
        first: PartId,
        second: PartId,
    },

    #[error("part '{part}' is mapped to role '{role}' but is not in the score")]
    UnknownPart { part: PartId, role: String },
}

impl MappingProblem {
    pub fn locations(&self) -> Vec<ScoreLocation> {
        match self {
            MappingProblem::NoParts { .. } => Vec::new(),
            MappingProblem::TooManyParts { parts, .. } => {
                parts.iter().map(|p| ScoreLocation::part(p)).collect()
            }
            MappingProblem::DuplicatePort {
                port, first, second, ..
            } => [first, second]
                .into_iter()
                .map(|p| ScoreLocation {
                    port: Some(*port),
                    ..ScoreLocation::part(p)
                })
                .collect(),
            MappingProblem::UnknownPart { part, .. } => vec![ScoreLocation::part(part)],
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    /// Malformed document, or parts whose name and measures do not correlate.
    #[error("Document error{}: {message}", .part.as_ref().map(|p| format!(" in part '{}'", p)).unwrap_or_default())]
    DocumentError {
        part: Option<PartId>,
        message: String,
    },

    /// Well-formed XML that does not satisfy the score rules.
    #[error("Semantic error in part '{part}' at {}: {message}", measure_label(.measure))]
    SemanticError {
        part: PartId,
        measure: Option<u32>,
        message: String,
    },

    #[error("Mapping error: {0}")]
    MappingError(#[from] MappingProblem),

    #[error("{0}")]
    ConflictError(#[from] Box<Conflict>),

    #[error("Invalid conversion parameters: {0}")]
    ConfigError(String),

    #[error("Schedule encoding error: {0}")]
    OutputError(String),

    #[error("{} errors: {}", .0.len(), .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ConvertError>),
}

fn measure_label(measure: &Option<u32>) -> String {
    match measure {
        Some(n) => format!("measure {}", n),
        None => "measure unknown".to_string(),
    }
}

impl From<Conflict> for ConvertError {
    fn from(conflict: Conflict) -> Self {
        ConvertError::ConflictError(Box::new(conflict))
    }
}

impl ConvertError {
    /// Collapse a list of failures: one error stays itself, several become `Multiple`.
    pub fn accumulate(mut errors: Vec<ConvertError>) -> Option<ConvertError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ConvertError::Multiple(errors)),
        }
    }

    /// Score locations an editor should highlight for this error.
    pub fn locations(&self) -> Vec<ScoreLocation> {
        match self {
            ConvertError::DocumentError { part, .. } => {
                part.iter().map(|p| ScoreLocation::part(p)).collect()
            }
            ConvertError::SemanticError { part, measure, .. } => vec![ScoreLocation {
                measure: *measure,
                ..ScoreLocation::part(part)
            }],
            ConvertError::MappingError(problem) => problem.locations(),
            ConvertError::ConflictError(conflict) => vec![
                ScoreLocation::from(&conflict.first),
                ScoreLocation::from(&conflict.second),
            ],
            ConvertError::ConfigError(_) | ConvertError::OutputError(_) => Vec::new(),
            ConvertError::Multiple(errors) => errors.iter().flat_map(|e| e.locations()).collect(),
        }
    }

    /// One diagnostic per underlying failure, `Multiple` flattened.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            ConvertError::Multiple(errors) => errors.iter().flat_map(|e| e.diagnostics()).collect(),
            other => vec![Diagnostic {
                kind: other.kind(),
                message: other.to_string(),
                locations: other.locations(),
            }],
        }
    }

    fn kind(&self) -> DiagnosticKind {
        match self {
            ConvertError::DocumentError { .. } => DiagnosticKind::Document,
            ConvertError::SemanticError { .. } => DiagnosticKind::Semantic,
            ConvertError::MappingError(_) => DiagnosticKind::Mapping,
            ConvertError::ConflictError(_) => DiagnosticKind::Conflict,
            ConvertError::OutputError(_) => DiagnosticKind::Output,
            ConvertError::ConfigError(_) | ConvertError::Multiple(_) => DiagnosticKind::Config,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Document,
    Semantic,
    Mapping,
    Conflict,
    Config,
    Output,
}

/// Serializable flattening of a `ConvertError` for editors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub locations: Vec<ScoreLocation>,
}
