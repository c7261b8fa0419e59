//! # MusicXML Reader
//!
//! Parses the partwise MusicXML subset used by haptic scores into a [`Score`].
//!
//! ## Pipeline
//! 1. Strip the `<!DOCTYPE ...>` declaration (DTDs are never fetched).
//! 2. Walk the document with `quick_xml`, collecting raw parts and measures.
//!    Nothing is classified yet; each measure keeps its attributes and a list
//!    of raw notes and dynamics markings in reading order.
//! 3. Resolve each part with a fold that threads three values from measure to
//!    measure: the last dynamic marking, the time signature and the divisions.
//!    Notes are classified during this fold.
//!
//! ## Note Classification
//! Checked in this order for every `<note>`:
//! - `<rest/>` -> [`Note::Rest`] (needs a dynamic in scope)
//! - `<notehead>x</notehead>` -> [`Note::Hold`]
//! - `<trill-mark/>` -> [`Note::HardTrill`]; `<tremolo>` -> [`Note::Trill`]
//!   (both use the dynamic in scope, or [`ORNAMENT_DEFAULT_DYNAMIC`])
//! - anything else -> [`Note::Actuate`] (needs a dynamic in scope)
//!
//! `<chord/>` members and `<grace/>` notes do not advance time and are skipped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ConvertError;
use crate::score::{Dynamic, Measure, Note, Part, PartId, Score, TimeSignature};

/// Dynamic for ornaments that appear before any dynamics marking.
pub const ORNAMENT_DEFAULT_DYNAMIC: Dynamic = Dynamic::MezzoForte;

/// Remove a `<!DOCTYPE ...>` declaration, including any internal subset.
pub fn strip_doctype(text: &str) -> Cow<'_, str> {
    let Some(start) = text.find("<!DOCTYPE") else {
        return Cow::Borrowed(text);
    };

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (offset, c) in text[start..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '>') if depth == 0 => {
                let end = start + offset + 1;
                let mut stripped = String::with_capacity(text.len() - (end - start));
                stripped.push_str(&text[..start]);
                stripped.push_str(&text[end..]);
                return Cow::Owned(stripped);
            }
            _ => {}
        }
    }

    // Unterminated declaration: leave it for the XML reader to reject
    Cow::Borrowed(text)
}

/// Parse MusicXML text into a typed score.
///
/// # Errors
/// - [`ConvertError::DocumentError`] for malformed XML, a non-partwise root,
///   or a part that has a name but no measures (or the reverse)
/// - [`ConvertError::SemanticError`] for missing time/divisions on a part's
///   first measure, notes without duration, or notes with no dynamic in scope
pub fn parse_musicxml(text: &str) -> Result<Score, ConvertError> {
    let text = strip_doctype(text);
    let mut reader = Reader::from_str(&text);
    reader.trim_text(true);

    let mut doc = RawDocument::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = element_name(&e);
                doc.open(&name, &e, &path)?;
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = element_name(&e);
                doc.open(&name, &e, &path)?;
                doc.close(&name);
            }
            Ok(Event::End(_)) => {
                if let Some(name) = path.pop() {
                    doc.close(&name);
                }
            }
            Ok(Event::Text(e)) => {
                let value = e.unescape().map_err(|err| doc.document_error(err.to_string()))?;
                doc.text(&path, value.trim())?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(doc.document_error(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    err
                )))
            }
        }
    }

    if !doc.seen_root {
        return Err(ConvertError::DocumentError {
            part: None,
            message: "document has no <score-partwise> root".to_string(),
        });
    }

    doc.finish()
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
}

/// A `<note>` before classification
#[derive(Debug, Default, Clone)]
struct RawNote {
    rest: bool,
    x_notehead: bool,
    trill_mark: bool,
    tremolo: bool,
    chord: bool,
    grace: bool,
    duration: Option<u32>,
    /// Dynamics written in the note's own `<notations>`.
    dynamic: Option<Dynamic>,
}

#[derive(Debug, Clone)]
enum RawItem {
    Dynamic(Dynamic),
    Note(RawNote),
}

#[derive(Debug, Default, Clone)]
struct RawMeasure {
    number: Option<u32>,
    divisions: Option<u32>,
    beats: Option<u32>,
    beat_type: Option<u32>,
    items: Vec<RawItem>,
}

#[derive(Debug, Default)]
struct RawDocument {
    seen_root: bool,
    tempo: Option<u32>,
    names: BTreeMap<PartId, String>,
    parts: BTreeMap<PartId, Vec<RawMeasure>>,
    score_part: Option<PartId>,
    part: Option<PartId>,
    measure: Option<RawMeasure>,
    note: Option<RawNote>,
}

impl RawDocument {
    fn document_error(&self, message: String) -> ConvertError {
        ConvertError::DocumentError {
            part: self.part.clone().or_else(|| self.score_part.clone()),
            message,
        }
    }

    fn semantic_error(&self, message: String) -> ConvertError {
        ConvertError::SemanticError {
            part: self.part.clone().unwrap_or_default(),
            measure: self.measure.as_ref().and_then(|m| m.number),
            message,
        }
    }

    fn number(&self, element: &str, value: &str) -> Result<u32, ConvertError> {
        value
            .parse::<u32>()
            .map_err(|_| self.semantic_error(format!("invalid <{}> value '{}'", element, value)))
    }

    fn open(&mut self, name: &str, e: &BytesStart, ancestors: &[String]) -> Result<(), ConvertError> {
        let parent = ancestors.last().map(String::as_str);

        if ancestors.is_empty() {
            if name != "score-partwise" {
                return Err(ConvertError::DocumentError {
                    part: None,
                    message: format!("unsupported root element <{}>, expected <score-partwise>", name),
                });
            }
            self.seen_root = true;
            return Ok(());
        }

        match name {
            "score-part" => {
                let id = attribute(e, "id")
                    .ok_or_else(|| self.document_error("<score-part> without id".to_string()))?;
                self.names.entry(id.clone()).or_default();
                self.score_part = Some(id);
            }
            "part" if parent == Some("score-partwise") => {
                let id = attribute(e, "id")
                    .ok_or_else(|| self.document_error("<part> without id".to_string()))?;
                self.parts.entry(id.clone()).or_default();
                self.part = Some(id);
            }
            "measure" if self.part.is_some() => {
                self.measure = Some(RawMeasure {
                    number: attribute(e, "number").and_then(|n| n.parse().ok()),
                    ..RawMeasure::default()
                });
            }
            "note" if self.measure.is_some() => self.note = Some(RawNote::default()),
            "sound" => {
                if self.tempo.is_none() {
                    self.tempo = attribute(e, "tempo").and_then(|t| parse_tempo(&t));
                }
            }
            _ => {
                if let Some(note) = self.note.as_mut() {
                    match name {
                        "rest" => note.rest = true,
                        "chord" => note.chord = true,
                        "grace" => note.grace = true,
                        "trill-mark" => note.trill_mark = true,
                        "tremolo" => note.tremolo = true,
                        _ => {
                            if parent == Some("dynamics") {
                                if let Some(dynamic) = Dynamic::from_tag(name) {
                                    note.dynamic = Some(dynamic);
                                }
                            }
                        }
                    }
                } else if parent == Some("dynamics") && ancestors.iter().any(|a| a == "direction") {
                    if let (Some(measure), Some(dynamic)) =
                        (self.measure.as_mut(), Dynamic::from_tag(name))
                    {
                        measure.items.push(RawItem::Dynamic(dynamic));
                    }
                }
            }
        }
        Ok(())
    }

    fn close(&mut self, name: &str) {
        match name {
            "score-part" => self.score_part = None,
            "part" => self.part = None,
            "measure" => {
                if let (Some(measure), Some(part)) = (self.measure.take(), self.part.as_ref()) {
                    self.parts.entry(part.clone()).or_default().push(measure);
                }
            }
            "note" => {
                if let (Some(note), Some(measure)) = (self.note.take(), self.measure.as_mut()) {
                    measure.items.push(RawItem::Note(note));
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, path: &[String], value: &str) -> Result<(), ConvertError> {
        let Some(current) = path.last().map(String::as_str) else {
            return Ok(());
        };
        let parent = path.len().checked_sub(2).map(|i| path[i].as_str());

        match (current, parent) {
            ("part-name", _) => {
                if let Some(id) = self.score_part.clone() {
                    self.names.insert(id, value.to_string());
                }
            }
            ("divisions", _) if self.measure.is_some() => {
                let divisions = self.number("divisions", value)?;
                if divisions == 0 {
                    return Err(self.semantic_error("<divisions> must be positive".to_string()));
                }
                if let Some(measure) = self.measure.as_mut() {
                    measure.divisions = Some(divisions);
                }
            }
            ("beats", Some("time")) if self.measure.is_some() => {
                // Composite signatures such as 3+2 count as their sum
                let beats = value
                    .split('+')
                    .map(|b| self.number("beats", b.trim()))
                    .sum::<Result<u32, _>>()?;
                if let Some(measure) = self.measure.as_mut() {
                    measure.beats = Some(beats);
                }
            }
            ("beat-type", Some("time")) if self.measure.is_some() => {
                let beat_type = self.number("beat-type", value)?;
                if let Some(measure) = self.measure.as_mut() {
                    measure.beat_type = Some(beat_type);
                }
            }
            ("duration", Some("note")) if self.note.is_some() => {
                let duration = self.number("duration", value)?;
                if let Some(note) = self.note.as_mut() {
                    note.duration = Some(duration);
                }
            }
            ("notehead", _) => {
                if let Some(note) = self.note.as_mut() {
                    note.x_notehead = value == "x";
                }
            }
            ("per-minute", Some("metronome")) => {
                if self.tempo.is_none() {
                    self.tempo = parse_tempo(value);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<Score, ConvertError> {
        let ids: BTreeSet<PartId> = self.names.keys().chain(self.parts.keys()).cloned().collect();
        let mut names = self.names;
        let mut raw_parts = self.parts;
        let mut parts = BTreeMap::new();

        for id in ids {
            let name = names.remove(&id);
            let measures = raw_parts.remove(&id).filter(|m| !m.is_empty());
            let (name, measures) = match (name, measures) {
                (Some(name), Some(measures)) => (name, measures),
                (Some(_), None) => {
                    return Err(ConvertError::DocumentError {
                        part: Some(id.clone()),
                        message: format!("part '{}' has a name but no measures", id),
                    })
                }
                (None, _) => {
                    return Err(ConvertError::DocumentError {
                        part: Some(id.clone()),
                        message: format!("part '{}' has measures but no <score-part> name", id),
                    })
                }
            };
            let measures = resolve_part(&id, measures)?;
            log::debug!("parsed part '{}' ({}) with {} measures", id, name, measures.len());
            parts.insert(id, Part { name, measures });
        }

        Ok(Score {
            tempo: self.tempo,
            parts,
        })
    }
}

fn parse_tempo(value: &str) -> Option<u32> {
    value
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite() && *t >= 1.0)
        .map(|t| t.round() as u32)
}

/// State threaded through a part's measures.
#[derive(Debug, Clone, Copy, Default)]
struct PartContext {
    dynamic: Option<Dynamic>,
    signature: Option<TimeSignature>,
    divisions: Option<u32>,
}

fn resolve_part(id: &str, raw_measures: Vec<RawMeasure>) -> Result<Vec<Measure>, ConvertError> {
    let mut measures = Vec::with_capacity(raw_measures.len());
    raw_measures
        .into_iter()
        .try_fold(PartContext::default(), |context, raw| {
            let (measure, context) = resolve_measure(id, raw, context)?;
            measures.push(measure);
            Ok::<_, ConvertError>(context)
        })?;
    Ok(measures)
}

fn resolve_measure(
    id: &str,
    raw: RawMeasure,
    context: PartContext,
) -> Result<(Measure, PartContext), ConvertError> {
    let error = |message: String| ConvertError::SemanticError {
        part: id.to_string(),
        measure: raw.number,
        message,
    };

    let signature = match (raw.beats, raw.beat_type) {
        (Some(beats), Some(beat_type)) => Some(TimeSignature { beats, beat_type }),
        (None, None) => context.signature,
        _ => return Err(error("time signature needs both <beats> and <beat-type>".to_string())),
    };
    let divisions = raw.divisions.or(context.divisions);
    let (signature, divisions) = match (signature, divisions) {
        (Some(signature), Some(divisions)) => (signature, divisions),
        (None, _) => return Err(error("first measure must define a time signature".to_string())),
        (_, None) => return Err(error("first measure must define <divisions>".to_string())),
    };

    let mut notes = Vec::new();
    let dynamic = raw.items.iter().try_fold(
        context.dynamic,
        |dynamic, item| -> Result<Option<Dynamic>, ConvertError> {
            let note = match item {
                RawItem::Dynamic(marked) => return Ok(Some(*marked)),
                RawItem::Note(note) => note,
            };
            let dynamic = note.dynamic.or(dynamic);
            if note.chord || note.grace {
                return Ok(dynamic);
            }
            let position = notes.len() + 1;
            let duration = note
                .duration
                .ok_or_else(|| error(format!("note {} has no <duration>", position)))?;
            let classified = classify(note, duration, dynamic).ok_or_else(|| {
                error(format!("note {} has no dynamic marking in scope", position))
            })?;
            notes.push(classified);
            Ok(dynamic)
        },
    )?;

    let measure = Measure {
        number: raw.number,
        signature,
        divisions,
        notes,
    };
    let context = PartContext {
        dynamic,
        signature: Some(signature),
        divisions: Some(divisions),
    };
    Ok((measure, context))
}

/// Classify a note. `None` when the note needs a dynamic and none is in scope.
fn classify(note: &RawNote, duration: u32, dynamic: Option<Dynamic>) -> Option<Note> {
    if note.rest {
        return dynamic.map(|dynamic| Note::Rest { dynamic, duration });
    }
    if note.x_notehead {
        return Some(Note::Hold { duration });
    }
    if note.trill_mark {
        let dynamic = dynamic.unwrap_or(ORNAMENT_DEFAULT_DYNAMIC);
        return Some(Note::HardTrill { dynamic, duration });
    }
    if note.tremolo {
        let dynamic = dynamic.unwrap_or(ORNAMENT_DEFAULT_DYNAMIC);
        return Some(Note::Trill { dynamic, duration });
    }
    dynamic.map(|dynamic| Note::Actuate { dynamic, duration })
}
