//! Rule-based extractor.
//!
//! Deterministic: normalizes the text, picks the first archetype whose
//! triggers match, runs that archetype's dimension rules, then reads each
//! hole clause into a [`HolePattern`]. Confidence is the fraction of
//! required fields captured, scaled down when any measurement had no unit.
//! Never touches the network.

use crate::grammar::{self, Capture, CompiledRule, HoleLexicon};
use crate::normalizer::{normalize, parse_measurement};
use crate::patterns::{self, HolePattern, Layout, PLACEMENT_FIELD};
use partspec_core::{Candidate, ParameterSet, Source, UnitError};
use regex_lite::Captures;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Confidence multiplier applied when a measurement carried no unit.
pub const UNITLESS_PENALTY: f64 = 0.9;

const DIAMETER_FIELD: &str = "hole_diameter";

/// The deterministic, pattern-driven extractor.
#[derive(Debug, Clone, Default)]
pub struct RuleExtractor {
    strict_units: bool,
}

impl RuleExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject unit-less measurements instead of reading them as millimetres.
    pub fn with_strict_units(mut self, strict: bool) -> Self {
        self.strict_units = strict;
        self
    }

    /// Extract a candidate. Unit failures are recovered into the null
    /// candidate.
    pub fn extract(&self, text: &str) -> Candidate {
        match self.try_extract(text) {
            Ok(Some(set)) => {
                debug!(
                    archetype = %set.archetype,
                    confidence = set.metadata.confidence,
                    unresolved = ?set.metadata.unresolved,
                    "Rule-based candidate"
                );
                Candidate::found(set)
            }
            Ok(None) => {
                debug!("No archetype trigger matched");
                Candidate::none()
            }
            Err(e) => {
                warn!(error = %e, "Rule-based extraction rejected a measurement");
                Candidate::none()
            }
        }
    }

    /// Extract, surfacing unit errors. `Ok(None)` means no archetype matched.
    pub fn try_extract(&self, text: &str) -> Result<Option<ParameterSet>, UnitError> {
        let registry = match grammar::registry() {
            Ok(registry) => registry,
            Err(e) => {
                warn!(error = %e, "Grammar registry unavailable");
                return Ok(None);
            }
        };

        let normalized = normalize(text).text.to_lowercase();
        let Some(archetype) = registry.archetype_of(&normalized) else {
            return Ok(None);
        };

        let clauses = split_clauses(&registry.holes, &normalized);
        let mut reader = Reader {
            strict_units: self.strict_units,
            unitless: false,
        };
        let mut set = ParameterSet::new(archetype, Source::RuleBased, text);

        reader.capture_dimensions(registry.rules_for(archetype), &clauses.outline, &mut set)?;

        let mut required = archetype.required_dimensions().len();
        let mut missing = set.missing_required().len();
        let mut unresolved: BTreeSet<String> =
            set.missing_required().iter().map(|s| s.to_string()).collect();

        for clause in &clauses.holes {
            required += 2;
            let parsed = reader.read_hole_clause(&registry.holes, clause)?;

            let Some(diameter) = parsed.diameter else {
                missing += 1;
                unresolved.insert(DIAMETER_FIELD.into());
                if parsed.layout.is_none() {
                    missing += 1;
                    unresolved.insert(PLACEMENT_FIELD.into());
                }
                continue;
            };
            let Some(layout) = parsed.layout else {
                missing += 1;
                unresolved.insert(PLACEMENT_FIELD.into());
                continue;
            };

            let mut pattern = HolePattern::new(layout, diameter);
            pattern.count = parsed.count;
            match layout {
                Layout::Corners => pattern.offset = parsed.distance,
                Layout::PitchCircle => pattern.pitch_diameter = parsed.distance,
                Layout::Center | Layout::Offset => {}
            }
            if let Err(field) = patterns::expand(&pattern, &mut set) {
                missing += 1;
                unresolved.insert(field.into());
            }
        }

        let mut confidence = (required - missing) as f64 / required as f64;
        if reader.unitless {
            confidence *= UNITLESS_PENALTY;
        }
        set.metadata.confidence = confidence;
        set.metadata.unresolved = unresolved.into_iter().collect();
        Ok(Some(set))
    }
}

/// Lower-cased text split into the outline description and hole clauses.
#[derive(Debug, Default, PartialEq)]
struct Clauses {
    outline: String,
    holes: Vec<String>,
}

/// Split on `,` `;` `with` `and` `plus`. A clause naming a hole starts a hole
/// clause; a following clause that only carries placement or diameter
/// wording continues it. When the leading clause runs straight from the
/// outline into a hole phrase, it is cut where the hole phrase begins.
fn split_clauses(lexicon: &HoleLexicon, text: &str) -> Clauses {
    let mut clauses = Clauses::default();
    let mut outline = Vec::new();

    for piece in lexicon.clause_split.split(text) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if lexicon.hole_word.is_match(piece) {
            let at = if outline.is_empty() && clauses.holes.is_empty() {
                hole_phrase_start(lexicon, piece)
            } else {
                0
            };
            let (head, tail) = piece.split_at(at);
            let head = head.trim();
            if !head.is_empty() {
                outline.push(head);
            }
            clauses.holes.push(tail.trim().to_string());
            continue;
        }
        let continues = lexicon.continuation.is_match(piece) && !lexicon.outline_hint.is_match(piece);
        match clauses.holes.last_mut() {
            Some(current) if continues => {
                current.push(' ');
                current.push_str(piece);
            }
            _ => outline.push(piece),
        }
    }

    clauses.outline = outline.join(", ");
    clauses
}

/// Byte offset where the hole phrase in `piece` begins: its count word, a
/// "center hole" phrase, or the hole word itself, whichever comes first.
fn hole_phrase_start(lexicon: &HoleLexicon, piece: &str) -> usize {
    let word = lexicon.hole_word.find(piece).map(|m| m.start());
    let count = lexicon.count.find(piece).map(|m| m.start());
    let center = lexicon
        .center
        .find(piece)
        .filter(|m| lexicon.hole_word.is_match(m.as_str()))
        .map(|m| m.start());
    [word, count, center].into_iter().flatten().min().unwrap_or(0)
}

#[derive(Debug, Default)]
struct HoleClause {
    count: Option<u32>,
    diameter: Option<f64>,
    layout: Option<Layout>,
    /// Corner offset or pitch diameter, depending on the layout.
    distance: Option<f64>,
}

struct Reader {
    strict_units: bool,
    unitless: bool,
}

impl Reader {
    fn measure(&mut self, caps: &Captures<'_>, index: usize) -> Result<Option<f64>, UnitError> {
        let Some((value, unit)) = grammar::measurement(caps, index) else {
            return Ok(None);
        };
        match parse_measurement(&format!("{value}{unit}")) {
            Ok(mm) => Ok(Some(mm)),
            Err(UnitError::MissingUnit { value, .. }) if !self.strict_units => {
                self.unitless = true;
                Ok(Some(value))
            }
            Err(UnitError::MissingUnit { value, .. }) => Err(UnitError::MissingUnit {
                value,
                context: caps.get(0).map_or("", |m| m.as_str()).to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    fn capture_dimensions<'r>(
        &mut self,
        rules: impl Iterator<Item = &'r CompiledRule>,
        text: &str,
        set: &mut ParameterSet,
    ) -> Result<(), UnitError> {
        // Names a rule found contradictory; later rules may not fill them.
        let mut blocked: BTreeSet<&'static str> = BTreeSet::new();

        for rule in rules {
            let Some(caps) = rule.regex.captures(text) else {
                continue;
            };
            let open = |name: &str, set: &ParameterSet| {
                !blocked.contains(name) && set.dimension(name).is_none()
            };

            match rule.capture {
                Capture::One(name) => {
                    if open(name, set) {
                        if let Some(v) = self.measure(&caps, 0)? {
                            set.set_dimension(name, v);
                        }
                    }
                }
                Capture::Pair(a, b) => {
                    if open(a, set) && open(b, set) {
                        if let (Some(x), Some(y)) = (self.measure(&caps, 0)?, self.measure(&caps, 1)?) {
                            set.set_dimension(a, x);
                            set.set_dimension(b, y);
                        }
                    }
                }
                Capture::Triple(a, b, c) => {
                    if open(a, set) && open(b, set) && open(c, set) {
                        if let (Some(x), Some(y), Some(z)) = (
                            self.measure(&caps, 0)?,
                            self.measure(&caps, 1)?,
                            self.measure(&caps, 2)?,
                        ) {
                            set.set_dimension(a, x);
                            set.set_dimension(b, y);
                            set.set_dimension(c, z);
                        }
                    }
                }
                Capture::Equal(name) => {
                    if open(name, set) {
                        if let (Some(x), Some(y)) = (self.measure(&caps, 0)?, self.measure(&caps, 1)?) {
                            if x == y {
                                set.set_dimension(name, x);
                            } else {
                                debug!(dimension = name, first = x, second = y, "Conflicting values");
                                blocked.insert(name);
                            }
                        }
                    }
                }
                Capture::Fixed(name, value) => {
                    if open(name, set) {
                        set.set_dimension(name, value);
                    }
                }
            }
        }
        Ok(())
    }

    fn read_hole_clause(
        &mut self,
        lexicon: &HoleLexicon,
        clause: &str,
    ) -> Result<HoleClause, UnitError> {
        let mut parsed = HoleClause {
            count: read_count(lexicon, clause),
            ..HoleClause::default()
        };
        // Placement phrases are cut out before the diameter search so their
        // measurements are not mistaken for the hole size.
        let mut rest = clause.to_string();

        if let Some((caps, layout)) = lexicon
            .pitch
            .iter()
            .find_map(|re| re.captures(clause))
            .map(|c| (c, Layout::PitchCircle))
            .or_else(|| lexicon.corner.captures(clause).map(|c| (c, Layout::Corners)))
        {
            parsed.distance = self.measure(&caps, 0)?;
            parsed.layout = Some(layout);
            if let Some(m) = caps.get(0) {
                rest.replace_range(m.range(), &" ".repeat(m.len()));
            }
        } else if lexicon.center.is_match(clause) {
            parsed.layout = Some(Layout::Center);
        }

        for re in &lexicon.diameter {
            if let Some(caps) = re.captures(&rest) {
                parsed.diameter = self.measure(&caps, 0)?;
                break;
            }
        }

        Ok(parsed)
    }
}

fn read_count(lexicon: &HoleLexicon, clause: &str) -> Option<u32> {
    let caps = lexicon.count.captures(clause)?;
    let adjectives = caps.get(2).map_or("", |m| m.as_str());
    // "10 diameter holes" names a size, not a count
    if adjectives.contains("diameter") || adjectives.contains("dia ") {
        return None;
    }
    let word = caps.get(1)?.as_str();
    let count = match word {
        "a" | "an" | "single" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        digits => digits.parse().ok()?,
    };
    Some(count)
}
