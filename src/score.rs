//! # Score Types
//!
//! Typed representation of the MusicXML subset the compiler understands.
//!
//! ## Type Hierarchy
//! ```text
//! Score
//!   ├── tempo: Option<u32> (first <sound tempo> in the document)
//!   └── BTreeMap<PartId, Part>
//!         ├── name: String
//!         └── Vec<Measure>
//!               ├── number: Option<u32>
//!               ├── signature: TimeSignature (resolved, never missing)
//!               ├── divisions: u32 (per quarter note, resolved)
//!               └── Vec<Note>
//!
//! Note (enum)
//!   ├── Rest { dynamic, duration }
//!   ├── Hold { duration }
//!   ├── Actuate { dynamic, duration }
//!   ├── Trill { dynamic, duration }
//!   └── HardTrill { dynamic, duration }
//! ```
//!
//! Durations on notes are MusicXML divisions, not wall-clock time. The
//! timeline builder turns them into milliseconds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a part, the `id` attribute of `<score-part>` / `<part>`.
pub type PartId = String;

/// Eight musical loudness levels, softest first.
///
/// The ordering matters: `Dynamic::ALL` is indexed by the intensity curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dynamic {
    #[serde(rename = "ppp")]
    Pianississimo,
    #[serde(rename = "pp")]
    Pianissimo,
    #[serde(rename = "p")]
    Piano,
    #[serde(rename = "mp")]
    MezzoPiano,
    #[serde(rename = "mf")]
    MezzoForte,
    #[serde(rename = "f")]
    Forte,
    #[serde(rename = "ff")]
    Fortissimo,
    #[serde(rename = "fff")]
    Fortississimo,
}

impl Dynamic {
    pub const ALL: [Dynamic; 8] = [
        Dynamic::Pianississimo,
        Dynamic::Pianissimo,
        Dynamic::Piano,
        Dynamic::MezzoPiano,
        Dynamic::MezzoForte,
        Dynamic::Forte,
        Dynamic::Fortissimo,
        Dynamic::Fortississimo,
    ];

    /// The softest level, used for silent holds.
    pub const LOWEST: Dynamic = Dynamic::Pianississimo;

    /// Map a MusicXML dynamics element name (`ppp`, `mf`, ...) to a level.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ppp" => Some(Dynamic::Pianississimo),
            "pp" => Some(Dynamic::Pianissimo),
            "p" => Some(Dynamic::Piano),
            "mp" => Some(Dynamic::MezzoPiano),
            "mf" => Some(Dynamic::MezzoForte),
            "f" => Some(Dynamic::Forte),
            "ff" => Some(Dynamic::Fortissimo),
            "fff" => Some(Dynamic::Fortississimo),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Dynamic::Pianississimo => "ppp",
            Dynamic::Pianissimo => "pp",
            Dynamic::Piano => "p",
            Dynamic::MezzoPiano => "mp",
            Dynamic::MezzoForte => "mf",
            Dynamic::Forte => "f",
            Dynamic::Fortissimo => "ff",
            Dynamic::Fortississimo => "fff",
        }
    }

    /// Position in `Dynamic::ALL`.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSignature {
    pub beats: u32,
    pub beat_type: u32,
}

/// A single note element after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Note {
    /// Silence; the port releases.
    Rest { dynamic: Dynamic, duration: u32 },
    /// An `x` notehead: keep whatever state the port is in.
    Hold { duration: u32 },
    /// A sounding note; the port inflates at the note's dynamic.
    Actuate { dynamic: Dynamic, duration: u32 },
    /// Soft ornament: alternates inflating with holding.
    Trill { dynamic: Dynamic, duration: u32 },
    /// Trill mark: alternates inflating with releasing.
    HardTrill { dynamic: Dynamic, duration: u32 },
}

impl Note {
    /// Duration in divisions.
    pub fn duration(&self) -> u32 {
        match *self {
            Note::Rest { duration, .. }
            | Note::Hold { duration }
            | Note::Actuate { duration, .. }
            | Note::Trill { duration, .. }
            | Note::HardTrill { duration, .. } => duration,
        }
    }

    /// The dynamic the note sounds at. Holds are always the softest level.
    pub fn dynamic(&self) -> Dynamic {
        match *self {
            Note::Hold { .. } => Dynamic::LOWEST,
            Note::Rest { dynamic, .. }
            | Note::Actuate { dynamic, .. }
            | Note::Trill { dynamic, .. }
            | Note::HardTrill { dynamic, .. } => dynamic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    /// `None` when the `number` attribute is missing or not an integer.
    pub number: Option<u32>,
    pub signature: TimeSignature,
    /// Divisions per quarter note.
    pub divisions: u32,
    pub notes: Vec<Note>,
}

impl Measure {
    /// Measure number for reporting, falling back to the 1-based position.
    pub fn label(&self, position: usize) -> u32 {
        self.number.unwrap_or(position as u32 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub name: String,
    pub measures: Vec<Measure>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Score {
    /// Tempo hint in BPM from the first `<sound tempo="...">`.
    pub tempo: Option<u32>,
    pub parts: BTreeMap<PartId, Part>,
}

impl Score {
    pub fn part(&self, id: &str) -> Option<&Part> {
        self.parts.get(id)
    }

    /// (id, name) pairs in id order, for listing parts to a user.
    pub fn part_names(&self) -> Vec<(&str, &str)> {
        self.parts
            .iter()
            .map(|(id, part)| (id.as_str(), part.name.as_str()))
            .collect()
    }
}
