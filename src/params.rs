//! # Conversion Parameters
//!
//! Everything the editor supplies next to the score: tempo, the
//! dynamics-to-intensity curve, the role/port assignment of each part, the
//! trill interval and the timeline tolerance.
//!
//! Parameters are either built in code or loaded from YAML:
//!
//! ```yaml
//! bpm: 60
//! trill-interval: 20
//! tolerance: 1.0
//! dynamics:
//!   p: 80
//!   f: 200
//! roles:
//!   P1: { role: left-arm, port: 1 }
//!   P2: { role: left-arm, port: 2 }
//! ```
//!
//! Missing dynamics keys fall back to `DynamicsCurve::default()`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::ConvertError;
use crate::score::{Dynamic, PartId};

/// Default spacing of trill sub-events in milliseconds.
pub const DEFAULT_TRILL_INTERVAL_MS: f64 = 20.0;

/// Event times closer than this are treated as the same tick.
pub const DEFAULT_TOLERANCE_MS: f64 = 1.0;

pub const MIN_TOLERANCE_MS: f64 = 0.1;
pub const MAX_TOLERANCE_MS: f64 = 4.0;

/// Number of valved ports on one device.
pub const PORT_COUNT: usize = 5;

/// A port number, 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PortIndex(u8);

impl PortIndex {
    pub fn new(n: u8) -> Option<Self> {
        if (1..=PORT_COUNT as u8).contains(&n) {
            Some(Self(n))
        } else {
            None
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// 0-based slot, for indexing port arrays.
    pub fn slot(&self) -> usize {
        self.0 as usize - 1
    }

    pub fn all() -> impl Iterator<Item = PortIndex> {
        (1..=PORT_COUNT as u8).map(PortIndex)
    }
}

impl TryFrom<u8> for PortIndex {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        PortIndex::new(n).ok_or_else(|| format!("port {} is out of range (1-{})", n, PORT_COUNT))
    }
}

impl From<PortIndex> for u8 {
    fn from(port: PortIndex) -> u8 {
        port.0
    }
}

impl fmt::Display for PortIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a part is played: a logical role and one of its ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: String,
    pub port: PortIndex,
}

impl RoleAssignment {
    pub fn new(role: &str, port: PortIndex) -> Self {
        Self {
            role: role.to_string(),
            port,
        }
    }
}

/// Intensity (0-255) for each of the eight dynamic levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicsCurve([u8; 8]);

impl Default for DynamicsCurve {
    fn default() -> Self {
        Self([32, 64, 96, 128, 160, 192, 224, 255])
    }
}

impl DynamicsCurve {
    pub fn new(levels: [u8; 8]) -> Self {
        Self(levels)
    }

    pub fn intensity(&self, dynamic: Dynamic) -> u8 {
        self.0[dynamic.index()]
    }

    pub fn with(mut self, dynamic: Dynamic, intensity: u8) -> Self {
        self.0[dynamic.index()] = intensity;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionParameters {
    /// Quarter notes per minute. `None` defers to the score's tempo hint.
    pub bpm: Option<u32>,
    pub dynamics: DynamicsCurve,
    pub roles: BTreeMap<PartId, RoleAssignment>,
    pub trill_interval_ms: f64,
    pub tolerance_ms: f64,
}

impl Default for ConversionParameters {
    fn default() -> Self {
        Self {
            bpm: None,
            dynamics: DynamicsCurve::default(),
            roles: BTreeMap::new(),
            trill_interval_ms: DEFAULT_TRILL_INTERVAL_MS,
            tolerance_ms: DEFAULT_TOLERANCE_MS,
        }
    }
}

impl ConversionParameters {
    pub fn new(bpm: u32) -> Self {
        Self {
            bpm: Some(bpm),
            ..Self::default()
        }
    }

    /// Builder-style role assignment.
    pub fn assign(mut self, part: &str, role: &str, port: u8) -> Result<Self, ConvertError> {
        let port = PortIndex::try_from(port).map_err(ConvertError::ConfigError)?;
        self.roles
            .insert(part.to_string(), RoleAssignment::new(role, port));
        Ok(self)
    }

    /// Check ranges that YAML or callers could get wrong.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.bpm == Some(0) {
            return Err(ConvertError::ConfigError("bpm must be positive".to_string()));
        }
        if !(self.trill_interval_ms.is_finite() && self.trill_interval_ms > 0.0) {
            return Err(ConvertError::ConfigError(format!(
                "trill interval must be a positive number of milliseconds, got {}",
                self.trill_interval_ms
            )));
        }
        if !(MIN_TOLERANCE_MS..=MAX_TOLERANCE_MS).contains(&self.tolerance_ms) {
            return Err(ConvertError::ConfigError(format!(
                "tolerance must be between {} and {} ms, got {}",
                MIN_TOLERANCE_MS, MAX_TOLERANCE_MS, self.tolerance_ms
            )));
        }
        // Sub-events closer than the tolerance would fold into one tick
        if self.trill_interval_ms <= self.tolerance_ms {
            return Err(ConvertError::ConfigError(format!(
                "trill interval ({} ms) must be longer than the tolerance ({} ms)",
                self.trill_interval_ms, self.tolerance_ms
            )));
        }
        Ok(())
    }

    /// The tempo to convert with: configured bpm first, then the score's hint.
    pub fn effective_bpm(&self, score_tempo: Option<u32>) -> Result<u32, ConvertError> {
        match self.bpm.or(score_tempo) {
            Some(0) => Err(ConvertError::ConfigError("bpm must be positive".to_string())),
            Some(bpm) => Ok(bpm),
            None => Err(ConvertError::ConfigError(
                "no bpm configured and the score has no tempo marking".to_string(),
            )),
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConvertError> {
        let raw: RawParameters =
            serde_yaml::from_str(content).map_err(|e| ConvertError::ConfigError(e.to_string()))?;
        let params = raw.into_parameters();
        params.validate()?;
        Ok(params)
    }

    /// Same keys as the YAML form, for callers that already speak JSON.
    pub fn from_json_str(content: &str) -> Result<Self, ConvertError> {
        let raw: RawParameters =
            serde_json::from_str(content).map_err(|e| ConvertError::ConfigError(e.to_string()))?;
        let params = raw.into_parameters();
        params.validate()?;
        Ok(params)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConvertError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConvertError::ConfigError(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }
}

/// Parameters as they appear in YAML
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawParameters {
    bpm: Option<u32>,
    #[serde(default)]
    dynamics: BTreeMap<Dynamic, u8>,
    #[serde(default)]
    roles: BTreeMap<PartId, RoleAssignment>,
    trill_interval: Option<f64>,
    tolerance: Option<f64>,
}

impl RawParameters {
    fn into_parameters(self) -> ConversionParameters {
        let dynamics = self
            .dynamics
            .into_iter()
            .fold(DynamicsCurve::default(), |curve, (dynamic, intensity)| {
                curve.with(dynamic, intensity)
            });
        ConversionParameters {
            bpm: self.bpm,
            dynamics,
            roles: self.roles,
            trill_interval_ms: self.trill_interval.unwrap_or(DEFAULT_TRILL_INTERVAL_MS),
            tolerance_ms: self.tolerance.unwrap_or(DEFAULT_TOLERANCE_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_port_index_range() {
        assert!(PortIndex::new(0).is_none());
        assert!(PortIndex::new(6).is_none());
        assert_eq!(PortIndex::new(5).map(|p| p.slot()), Some(4));
        assert_eq!(PortIndex::all().count(), 5);
    }

    #[test]
    fn test_yaml_parameters() {
        let yaml = r#"
bpm: 90
trill-interval: 25
dynamics:
  f: 210
  ppp: 5
roles:
  P1: { role: left-arm, port: 1 }
  P2: { role: left-arm, port: 3 }
"#;
        let params = ConversionParameters::from_yaml_str(yaml).unwrap();
        assert_eq!(params.bpm, Some(90));
        assert_eq!(params.trill_interval_ms, 25.0);
        assert_eq!(params.tolerance_ms, DEFAULT_TOLERANCE_MS);
        assert_eq!(params.dynamics.intensity(Dynamic::Forte), 210);
        assert_eq!(params.dynamics.intensity(Dynamic::Pianississimo), 5);
        assert_eq!(params.dynamics.intensity(Dynamic::Piano), 96);
        assert_eq!(params.roles["P2"].port.get(), 3);
        assert_eq!(params.roles["P1"].role, "left-arm");
    }

    #[test]
    fn test_yaml_rejects_bad_port() {
        let yaml = "roles:\n  P1: { role: arm, port: 6 }\n";
        let err = ConversionParameters::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConvertError::ConfigError(_)));
    }

    #[test]
    fn test_yaml_rejects_bad_tolerance() {
        let err = ConversionParameters::from_yaml_str("tolerance: 10\n").unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_json_parameters() {
        let json = r#"{"bpm": 100, "tolerance": 2.5, "roles": {"P1": {"role": "R", "port": 2}}}"#;
        let params = ConversionParameters::from_json_str(json).unwrap();
        assert_eq!(params.bpm, Some(100));
        assert_eq!(params.tolerance_ms, 2.5);
        assert_eq!(params.roles["P1"].port.get(), 2);
        assert!(ConversionParameters::from_json_str(r#"{"tempo": 100}"#).is_err());
    }

    #[test]
    fn test_trill_interval_must_exceed_tolerance() {
        let params = ConversionParameters {
            trill_interval_ms: 1e-3,
            ..ConversionParameters::new(60)
        };
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("trill interval"));

        let params = ConversionParameters {
            trill_interval_ms: 2.0,
            tolerance_ms: 2.0,
            ..ConversionParameters::new(60)
        };
        assert!(params.validate().is_err());

        let yaml = "trill-interval: 0.5\ntolerance: 1.0\n";
        assert!(matches!(
            ConversionParameters::from_yaml_str(yaml),
            Err(ConvertError::ConfigError(_))
        ));
        assert!(ConversionParameters::new(60).validate().is_ok());
    }

    #[test]
    fn test_zero_bpm_rejected() {
        let params = ConversionParameters::new(0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_effective_bpm_prefers_configured() {
        let params = ConversionParameters::new(72);
        assert_eq!(params.effective_bpm(Some(120)).unwrap(), 72);
        let params = ConversionParameters::default();
        assert_eq!(params.effective_bpm(Some(120)).unwrap(), 120);
        assert!(params.effective_bpm(None).is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bpm: 60\nroles:\n  P1: {{ role: R, port: 1 }}").unwrap();
        let params = ConversionParameters::from_path(file.path()).unwrap();
        assert_eq!(params.bpm, Some(60));
        assert_eq!(params.roles.len(), 1);
    }

    #[test]
    fn test_from_missing_path() {
        let err = ConversionParameters::from_path(Path::new("/nonexistent/params.yaml")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
