//! # Role Aggregator
//!
//! Groups the score's parts by the role they are assigned to and builds one
//! timeline per occupied port.
//!
//! ## Validation Rules
//! - Every part named in the mapping must exist in the score
//! - A role holds at least one and at most five parts
//! - Within a role, each port is used by one part only
//!
//! Problems are collected across all roles before failing, so an editor can
//! show every bad assignment at once. Parts without an assignment are skipped.

use std::collections::BTreeMap;

use crate::error::{ConvertError, MappingProblem};
use crate::params::{ConversionParameters, PortIndex, PORT_COUNT};
use crate::score::{PartId, Score};
use crate::timeline::{build_timeline, IntermediateEvent};

/// The parts of one role and the ports they drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMembers {
    pub role: String,
    /// Sorted by part id.
    pub parts: Vec<(PartId, PortIndex)>,
}

/// Events for one port of a role.
#[derive(Debug, Clone, PartialEq)]
pub struct PortTimeline {
    pub part: PartId,
    pub port: PortIndex,
    pub events: Vec<IntermediateEvent>,
}

/// All port timelines of one role, sorted by port.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleTimelines {
    pub role: String,
    pub ports: Vec<PortTimeline>,
}

impl RoleTimelines {
    pub fn port(&self, port: PortIndex) -> Option<&PortTimeline> {
        self.ports.iter().find(|p| p.port == port)
    }

    /// Start times of every event on every port.
    pub fn start_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.ports
            .iter()
            .flat_map(|p| p.events.iter().map(|e| e.start_ms))
    }
}

/// Check one role's assignment.
pub fn check_role(members: &RoleMembers) -> Result<(), MappingProblem> {
    if members.parts.is_empty() {
        return Err(MappingProblem::NoParts {
            role: members.role.clone(),
        });
    }
    if members.parts.len() > PORT_COUNT {
        return Err(MappingProblem::TooManyParts {
            role: members.role.clone(),
            parts: members.parts.iter().map(|(part, _)| part.clone()).collect(),
        });
    }

    let mut used: BTreeMap<PortIndex, &PartId> = BTreeMap::new();
    for (part, port) in &members.parts {
        if let Some(first) = used.insert(*port, part) {
            return Err(MappingProblem::DuplicatePort {
                role: members.role.clone(),
                port: *port,
                first: first.clone(),
                second: part.clone(),
            });
        }
    }
    Ok(())
}

/// Group mapped parts by role and validate every role.
///
/// # Errors
/// A [`ConvertError::MappingError`] for a single problem, or
/// [`ConvertError::Multiple`] when several roles are wrong.
pub fn validate_mapping(
    score: &Score,
    params: &ConversionParameters,
) -> Result<Vec<RoleMembers>, ConvertError> {
    let mut problems = Vec::new();
    let mut grouped: BTreeMap<&str, Vec<(PartId, PortIndex)>> = BTreeMap::new();

    for (part, assignment) in &params.roles {
        if score.part(part).is_none() {
            problems.push(MappingProblem::UnknownPart {
                part: part.clone(),
                role: assignment.role.clone(),
            });
            continue;
        }
        grouped
            .entry(assignment.role.as_str())
            .or_default()
            .push((part.clone(), assignment.port));
    }

    for id in score.parts.keys().filter(|id| !params.roles.contains_key(*id)) {
        log::warn!("part '{}' has no role assignment and is ignored", id);
    }

    let roles: Vec<RoleMembers> = grouped
        .into_iter()
        .map(|(role, parts)| RoleMembers {
            role: role.to_string(),
            parts,
        })
        .collect();
    problems.extend(roles.iter().filter_map(|members| check_role(members).err()));

    match ConvertError::accumulate(problems.into_iter().map(ConvertError::from).collect()) {
        Some(err) => Err(err),
        None => Ok(roles),
    }
}

/// Build the port timelines of one validated role.
pub fn aggregate_role(
    score: &Score,
    members: &RoleMembers,
    bpm: u32,
    trill_interval_ms: f64,
) -> Result<RoleTimelines, ConvertError> {
    check_role(members)?;

    let mut ports = members
        .parts
        .iter()
        .map(|(id, port)| -> Result<PortTimeline, ConvertError> {
            let part = score.part(id).ok_or_else(|| MappingProblem::UnknownPart {
                part: id.clone(),
                role: members.role.clone(),
            })?;
            let events = build_timeline(bpm, &part.measures, trill_interval_ms);
            log::debug!(
                "role '{}' port {}: part '{}' has {} events",
                members.role,
                port,
                id,
                events.len()
            );
            Ok(PortTimeline {
                part: id.clone(),
                port: *port,
                events,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    ports.sort_by_key(|p| p.port);

    Ok(RoleTimelines {
        role: members.role.clone(),
        ports,
    })
}

/// Validate the mapping and build every role's port timelines.
pub fn aggregate(
    score: &Score,
    params: &ConversionParameters,
    bpm: u32,
) -> Result<Vec<RoleTimelines>, ConvertError> {
    validate_mapping(score, params)?
        .iter()
        .map(|members| aggregate_role(score, members, bpm, params.trill_interval_ms))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{Dynamic, Measure, Note, Part, TimeSignature};

    fn score(ids: &[&str]) -> Score {
        let measure = Measure {
            number: Some(1),
            signature: TimeSignature { beats: 4, beat_type: 4 },
            divisions: 1,
            notes: vec![Note::Actuate { dynamic: Dynamic::Forte, duration: 4 }],
        };
        Score {
            tempo: None,
            parts: ids
                .iter()
                .map(|id| {
                    (
                        id.to_string(),
                        Part {
                            name: format!("Part {}", id),
                            measures: vec![measure.clone()],
                        },
                    )
                })
                .collect(),
        }
    }

    fn port(n: u8) -> PortIndex {
        PortIndex::new(n).unwrap()
    }

    #[test]
    fn test_groups_by_role_and_skips_unmapped() {
        let score = score(&["A", "B", "C"]);
        let params = ConversionParameters::new(60)
            .assign("A", "left", 2)
            .unwrap()
            .assign("B", "left", 1)
            .unwrap();
        let roles = aggregate(&score, &params, 60).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].role, "left");
        let ports: Vec<u8> = roles[0].ports.iter().map(|p| p.port.get()).collect();
        assert_eq!(ports, vec![1, 2]);
        assert_eq!(roles[0].port(port(1)).unwrap().part, "B");
        assert_eq!(roles[0].port(port(2)).unwrap().events.len(), 2);
    }

    #[test]
    fn test_too_many_parts() {
        let ids = ["A", "B", "C", "D", "E", "F"];
        let score = score(&ids);
        let params = ids
            .iter()
            .enumerate()
            .fold(ConversionParameters::new(60), |params, (i, id)| {
                params.assign(id, "R", (i % 5) as u8 + 1).unwrap()
            });
        match validate_mapping(&score, &params) {
            Err(ConvertError::MappingError(MappingProblem::TooManyParts { role, parts })) => {
                assert_eq!(role, "R");
                assert_eq!(parts.len(), 6);
            }
            other => panic!("expected too many parts, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_port() {
        let score = score(&["A", "B"]);
        let params = ConversionParameters::new(60)
            .assign("A", "R", 3)
            .unwrap()
            .assign("B", "R", 3)
            .unwrap();
        let err = validate_mapping(&score, &params).unwrap_err();
        assert_eq!(
            err,
            ConvertError::MappingError(MappingProblem::DuplicatePort {
                role: "R".to_string(),
                port: port(3),
                first: "A".to_string(),
                second: "B".to_string(),
            })
        );
    }

    #[test]
    fn test_same_port_in_different_roles_is_fine() {
        let score = score(&["A", "B"]);
        let params = ConversionParameters::new(60)
            .assign("A", "left", 1)
            .unwrap()
            .assign("B", "right", 1)
            .unwrap();
        assert_eq!(validate_mapping(&score, &params).unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_part() {
        let score = score(&["A"]);
        let params = ConversionParameters::new(60).assign("Z", "R", 1).unwrap();
        let err = validate_mapping(&score, &params).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::MappingError(MappingProblem::UnknownPart { .. })
        ));
    }

    #[test]
    fn test_problems_accumulate() {
        let score = score(&["A", "B"]);
        let params = ConversionParameters::new(60)
            .assign("A", "R", 1)
            .unwrap()
            .assign("B", "R", 1)
            .unwrap()
            .assign("Q", "S", 2)
            .unwrap();
        match validate_mapping(&score, &params) {
            Err(ConvertError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected multiple errors, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_role() {
        let members = RoleMembers {
            role: "R".to_string(),
            parts: vec![],
        };
        assert_eq!(
            check_role(&members),
            Err(MappingProblem::NoParts { role: "R".to_string() })
        );
        assert!(aggregate_role(&score(&[]), &members, 60, 20.0).is_err());
    }
}
