pub mod api;
pub mod error;
pub mod merge;
pub mod musicxml;
pub mod params;
pub mod roles;
pub mod schedule;
pub mod score;
pub mod timeline;

pub use api::{check, convert, convert_score, convert_to_json};
pub use error::*;
pub use musicxml::parse_musicxml;
pub use params::{ConversionParameters, DynamicsCurve, PortIndex, RoleAssignment};
pub use roles::validate_mapping;
pub use schedule::{Command, PortState, PortStates, PumpAction, Schedule};
pub use score::*;
pub use timeline::{build_timeline, IntermediateAction, IntermediateEvent};
