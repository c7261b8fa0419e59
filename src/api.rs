//! # Public API
//!
//! Main entry points of the score-to-schedule compiler.
//!
//! ## Conversion Functions
//!
//! - [`convert()`] - MusicXML text to [`Schedule`]
//! - [`convert_score()`] - Already-parsed [`Score`] to [`Schedule`]
//! - [`convert_to_json()`] - MusicXML text straight to the schedule JSON
//! - [`check()`] - Run the whole pipeline and report diagnostics only
//!
//! ## Typical Usage
//!
//! ```rust,ignore
//! use hapticscore::{convert, ConversionParameters};
//!
//! let params = ConversionParameters::new(60).assign("P1", "left-arm", 1)?;
//! let schedule = convert(&std::fs::read_to_string("score.musicxml")?, &params)?;
//! println!("{}", schedule.to_json()?);
//! ```

use crate::error::{ConvertError, Diagnostic};
use crate::merge::{common_timeline, merge_role};
use crate::musicxml::parse_musicxml;
use crate::params::ConversionParameters;
use crate::roles::aggregate;
use crate::schedule::Schedule;
use crate::score::Score;

/// Convert MusicXML text into an actuation schedule.
///
/// # Pipeline
/// 1. Parse and classify notes ([`parse_musicxml`])
/// 2. Validate the role mapping and build per-port timelines
/// 3. Build the common time axis over every role
/// 4. Resolve each role tick by tick
/// 5. Assemble; any failing role fails the whole conversion
///
/// # Errors
/// Returns [`ConvertError`] from whichever stage failed. Role failures are
/// collected, so several conflicting roles come back as one
/// [`ConvertError::Multiple`].
pub fn convert(source: &str, params: &ConversionParameters) -> Result<Schedule, ConvertError> {
    let score = parse_musicxml(source)?;
    convert_score(&score, params)
}

/// Convert an already-parsed score.
pub fn convert_score(score: &Score, params: &ConversionParameters) -> Result<Schedule, ConvertError> {
    params.validate()?;
    let bpm = params.effective_bpm(score.tempo)?;
    if params.roles.is_empty() {
        return Err(ConvertError::ConfigError(
            "no part is assigned to a role".to_string(),
        ));
    }

    let roles = aggregate(score, params, bpm)?;
    let time = common_timeline(
        roles.iter().flat_map(|role| role.start_times()),
        params.tolerance_ms,
    );
    log::debug!("{} roles share a timeline of {} ticks", roles.len(), time.len());

    let results: Vec<_> = roles
        .iter()
        .map(|role| {
            let commands = merge_role(role, &time, &params.dynamics, params.tolerance_ms);
            (role.role.clone(), commands)
        })
        .collect();
    let schedule = Schedule::assemble(time, results)?;

    log::info!(
        "converted {} roles at {} bpm: {} ticks over {} ms",
        schedule.instructions.len(),
        bpm,
        schedule.time.len(),
        schedule.duration_ms()
    );
    Ok(schedule)
}

/// Convert and serialize in one step.
pub fn convert_to_json(source: &str, params: &ConversionParameters) -> Result<String, ConvertError> {
    convert(source, params)?.to_json()
}

/// Diagnostics for a score and parameters; empty when conversion succeeds.
pub fn check(source: &str, params: &ConversionParameters) -> Vec<Diagnostic> {
    match convert(source, params) {
        Ok(_) => Vec::new(),
        Err(err) => err.diagnostics(),
    }
}
