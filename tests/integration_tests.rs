//! Integration tests for the score-to-schedule compiler
//!
//! Tests the full pipeline from MusicXML text to schedule JSON.

use hapticscore::{
    check, convert, convert_to_json, ConversionParameters, ConvertError, DynamicsCurve, Dynamic,
    MappingProblem, PortIndex, PortState, PumpAction, Schedule,
};

fn score(parts: &[(&str, String)]) -> String {
    let list: String = parts
        .iter()
        .map(|(id, _)| format!(r#"<score-part id="{0}"><part-name>Part {0}</part-name></score-part>"#, id))
        .collect();
    let body: String = parts
        .iter()
        .map(|(id, measures)| format!(r#"<part id="{}">{}</part>"#, id, measures))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="4.0">
  <part-list>{}</part-list>
  {}
</score-partwise>
"#,
        list, body
    )
}

fn measure(number: u32, divisions: Option<u32>, content: &str) -> String {
    let attributes = divisions
        .map(|d| {
            format!(
                "<attributes><divisions>{}</divisions><time><beats>4</beats><beat-type>4</beat-type></time></attributes>",
                d
            )
        })
        .unwrap_or_default();
    format!(r#"<measure number="{}">{}{}</measure>"#, number, attributes, content)
}

fn dynamic(tag: &str) -> String {
    format!(
        "<direction placement=\"below\"><direction-type><dynamics><{}/></dynamics></direction-type></direction>",
        tag
    )
}

fn note(duration: u32) -> String {
    format!(
        "<note><pitch><step>C</step><octave>4</octave></pitch><duration>{}</duration><type>quarter</type></note>",
        duration
    )
}

fn rest(duration: u32) -> String {
    format!("<note><rest/><duration>{}</duration></note>", duration)
}

fn hold(duration: u32) -> String {
    format!(
        "<note><unpitched><display-step>E</display-step><display-octave>4</display-octave></unpitched><duration>{}</duration><notehead>x</notehead></note>",
        duration
    )
}

fn trill(duration: u32) -> String {
    format!(
        "<note><pitch><step>G</step><octave>4</octave></pitch><duration>{}</duration><notations><ornaments><trill-mark/></ornaments></notations></note>",
        duration
    )
}

fn port(n: u8) -> PortIndex {
    PortIndex::new(n).unwrap()
}

fn single_part_score() -> String {
    score(&[(
        "P1",
        measure(1, Some(24), &format!("{}{}{}", dynamic("f"), note(6), rest(18))),
    )])
}

#[test]
fn test_single_part_scenario() {
    let params = ConversionParameters::new(60).assign("P1", "R", 1).unwrap();
    let schedule = convert(&single_part_score(), &params).unwrap();

    assert_eq!(schedule.time, vec![0.0, 250.0, 1000.0]);
    let commands = schedule.commands("R").unwrap();
    assert_eq!(commands.len(), 3);

    let forte = DynamicsCurve::default().intensity(Dynamic::Forte);
    assert_eq!(commands[0].action, PumpAction::Actuate);
    assert_eq!(commands[0].intensity, forte);
    assert_eq!(commands[0].ports.get(port(1)), PortState::Open);

    assert_eq!(commands[1].action, PumpAction::Release);
    assert_eq!(commands[1].intensity, 0);
    assert_eq!(commands[1].ports.get(port(1)), PortState::Open);

    assert_eq!(commands[2].action, PumpAction::Stop);
    assert_eq!(commands[2].intensity, 0);
    assert!(commands[2].ports.open_ports().next().is_none());
}

#[test]
fn test_single_part_json() {
    let params = ConversionParameters::new(60).assign("P1", "R", 1).unwrap();
    let json = convert_to_json(&single_part_score(), &params).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["time"], serde_json::json!([0.0, 250.0, 1000.0]));
    assert_eq!(value["instructions"]["R"][0]["action"], "actuate");
    assert_eq!(value["instructions"]["R"][0]["pumpPwm"], 192);
    assert_eq!(value["instructions"]["R"][0]["ports"]["port1"], "open");
    assert_eq!(value["instructions"]["R"][0]["ports"]["port2"], "closed");
    assert_eq!(value["instructions"]["R"][1]["action"], "release");
    assert_eq!(value["instructions"]["R"][2]["action"], "stop");
}

#[test]
fn test_hold_and_actuate_share_role() {
    let xml = score(&[
        ("A", measure(1, Some(1), &format!("{}{}", dynamic("p"), hold(4)))),
        ("B", measure(1, Some(1), &format!("{}{}", dynamic("mf"), note(4)))),
    ]);
    let params = ConversionParameters::new(60)
        .assign("A", "R", 1)
        .unwrap()
        .assign("B", "R", 2)
        .unwrap();
    let schedule = convert(&xml, &params).unwrap();
    let first = schedule.commands("R").unwrap()[0];
    assert_eq!(first.action, PumpAction::Actuate);
    assert_eq!(first.ports.get(port(1)), PortState::Closed);
    assert_eq!(first.ports.get(port(2)), PortState::Open);
    assert_eq!(first.intensity, DynamicsCurve::default().intensity(Dynamic::MezzoForte));
}

#[test]
fn test_conversion_is_idempotent() {
    let xml = score(&[
        ("P1", measure(1, Some(4), &format!("{}{}{}", dynamic("pp"), trill(8), note(8)))),
        ("P2", measure(1, Some(2), &format!("{}{}{}", dynamic("ff"), hold(4), hold(4)))),
    ]);
    let params = ConversionParameters::new(90)
        .assign("P1", "left", 1)
        .unwrap()
        .assign("P2", "right", 4)
        .unwrap();
    let first = convert_to_json(&xml, &params).unwrap();
    let second = convert_to_json(&xml, &params).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_schedule_round_trips_through_json() {
    let params = ConversionParameters::new(60).assign("P1", "R", 3).unwrap();
    let schedule = convert(&single_part_score(), &params).unwrap();
    let json = schedule.to_json().unwrap();
    assert_eq!(Schedule::from_json(&json).unwrap(), schedule);
}

#[test]
fn test_fractional_times_round_trip_through_json() {
    for (bpm, divisions) in [(61, 3), (67, 7), (101, 11), (149, 13)] {
        let measures: String = (1..=8)
            .map(|n| {
                let attributes = if n == 1 { Some(divisions) } else { None };
                let content = if n == 1 {
                    format!("{}{}{}", dynamic("mp"), note(1), rest(1))
                } else {
                    format!("{}{}", note(1), rest(1))
                };
                measure(n, attributes, &content)
            })
            .collect();
        let params = ConversionParameters::new(bpm).assign("P1", "R", 1).unwrap();
        let schedule = convert(&score(&[("P1", measures)]), &params).unwrap();
        assert!(schedule.time.iter().any(|t| t.fract() != 0.0));
        let decoded = Schedule::from_json(&schedule.to_json().unwrap()).unwrap();
        assert_eq!(decoded, schedule, "bpm {} divisions {}", bpm, divisions);
    }
}

#[test]
fn test_timeline_strictly_increasing_across_roles() {
    let xml = score(&[
        ("P1", measure(1, Some(3), &format!("{}{}{}{}", dynamic("f"), note(1), trill(5), rest(6)))),
        ("P2", measure(1, Some(7), &format!("{}{}{}", dynamic("p"), note(9), rest(19)))),
    ]);
    let params = ConversionParameters::new(97)
        .assign("P1", "left", 1)
        .unwrap()
        .assign("P2", "right", 1)
        .unwrap();
    let schedule = convert(&xml, &params).unwrap();
    assert!(schedule
        .time
        .windows(2)
        .all(|w| w[1] - w[0] > params.tolerance_ms));
    for role in schedule.roles() {
        assert_eq!(schedule.commands(role).unwrap().len(), schedule.time.len());
    }
}

#[test]
fn test_missing_first_measure_attributes() {
    let xml = score(&[(
        "Violin",
        measure(1, None, &format!("{}{}", dynamic("f"), note(4))),
    )]);
    let params = ConversionParameters::new(60).assign("Violin", "R", 1).unwrap();
    match convert(&xml, &params) {
        Err(ConvertError::SemanticError { part, measure, .. }) => {
            assert_eq!(part, "Violin");
            assert_eq!(measure, Some(1));
        }
        other => panic!("expected semantic error, got {:?}", other),
    }
}

#[test]
fn test_six_parts_in_one_role() {
    let ids = ["A", "B", "C", "D", "E", "F"];
    let parts: Vec<(&str, String)> = ids
        .iter()
        .map(|id| (*id, measure(1, Some(1), &format!("{}{}", dynamic("f"), hold(4)))))
        .collect();
    let xml = score(&parts);
    let params = ids
        .iter()
        .enumerate()
        .fold(ConversionParameters::new(60), |params, (i, id)| {
            params.assign(id, "R", (i % 5) as u8 + 1).unwrap()
        });
    let err = convert(&xml, &params).unwrap_err();
    assert!(matches!(
        err,
        ConvertError::MappingError(MappingProblem::TooManyParts { .. })
    ));
    assert!(err.to_string().contains("too many parts"));
}

#[test]
fn test_inflate_release_conflict() {
    let xml = score(&[
        ("A", measure(1, Some(1), &format!("{}{}", dynamic("f"), note(4)))),
        (
            "B",
            measure(1, Some(1), &format!("{}{}{}", dynamic("f"), hold(2), rest(2))),
        ),
    ]);
    let params = ConversionParameters::new(60)
        .assign("A", "R", 1)
        .unwrap()
        .assign("B", "R", 2)
        .unwrap();
    match convert(&xml, &params) {
        Err(ConvertError::ConflictError(conflict)) => {
            assert_eq!(conflict.role, "R");
            assert_eq!(conflict.time_ms, 2000.0);
            assert_eq!((conflict.first.part.as_str(), conflict.first.measure, conflict.first.note), ("A", 1, 0));
            assert_eq!((conflict.second.part.as_str(), conflict.second.measure, conflict.second.note), ("B", 1, 1));
            assert_eq!(conflict.second.port, port(2));
        }
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[test]
fn test_failing_role_fails_whole_conversion() {
    let xml = score(&[
        ("A", measure(1, Some(1), &format!("{}{}", dynamic("f"), note(4)))),
        ("B", measure(1, Some(1), &format!("{}{}", dynamic("f"), rest(4)))),
        ("C", measure(1, Some(1), &format!("{}{}", dynamic("f"), note(4)))),
    ]);
    let params = ConversionParameters::new(60)
        .assign("A", "bad", 1)
        .unwrap()
        .assign("B", "bad", 2)
        .unwrap()
        .assign("C", "good", 1)
        .unwrap();
    match convert(&xml, &params) {
        Err(ConvertError::ConflictError(conflict)) => {
            assert_eq!(conflict.role, "bad");
            assert_eq!(conflict.time_ms, 0.0);
        }
        other => panic!("expected conflict in role bad, got {:?}", other),
    }
}

#[test]
fn test_conflicts_in_several_roles_accumulate() {
    let xml = score(&[
        ("A", measure(1, Some(1), &format!("{}{}", dynamic("f"), note(4)))),
        ("B", measure(1, Some(1), &format!("{}{}", dynamic("f"), rest(4)))),
        ("C", measure(1, Some(1), &format!("{}{}", dynamic("f"), note(4)))),
        ("D", measure(1, Some(1), &format!("{}{}", dynamic("f"), rest(4)))),
    ]);
    let params = ConversionParameters::new(60)
        .assign("A", "left", 1)
        .unwrap()
        .assign("B", "left", 2)
        .unwrap()
        .assign("C", "right", 1)
        .unwrap()
        .assign("D", "right", 2)
        .unwrap();
    match convert(&xml, &params) {
        Err(ConvertError::Multiple(errors)) => {
            assert_eq!(errors.len(), 2);
            assert!(errors
                .iter()
                .all(|e| matches!(e, ConvertError::ConflictError(_))));
        }
        other => panic!("expected accumulated conflicts, got {:?}", other),
    }
    let diagnostics = check(&xml, &params);
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].locations.len(), 2);
}

#[test]
fn test_tempo_hint_used_without_bpm() {
    let xml = score(&[(
        "P1",
        measure(
            1,
            Some(1),
            &format!(
                "<direction><direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>120</per-minute></metronome></direction-type><sound tempo=\"120\"/></direction>{}{}",
                dynamic("f"),
                note(4)
            ),
        ),
    )]);
    let params = ConversionParameters::default().assign("P1", "R", 1).unwrap();
    let schedule = convert(&xml, &params).unwrap();
    assert_eq!(schedule.time, vec![0.0, 2000.0]);
}

#[test]
fn test_no_roles_assigned() {
    let err = convert(&single_part_score(), &ConversionParameters::new(60)).unwrap_err();
    assert!(matches!(err, ConvertError::ConfigError(_)));
}

#[test]
fn test_yaml_parameters_end_to_end() {
    let params = ConversionParameters::from_yaml_str(
        r#"
bpm: 60
dynamics:
  f: 77
roles:
  P1: { role: R, port: 5 }
"#,
    )
    .unwrap();
    let schedule = convert(&single_part_score(), &params).unwrap();
    let first = schedule.commands("R").unwrap()[0];
    assert_eq!(first.intensity, 77);
    assert_eq!(first.ports.get(port(5)), PortState::Open);
}

#[test]
fn test_check_passes_clean_score() {
    let params = ConversionParameters::new(60).assign("P1", "R", 1).unwrap();
    assert!(check(&single_part_score(), &params).is_empty());
}
