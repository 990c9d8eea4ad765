//! Archetype grammar registry.
//!
//! Each supported [`ShapeArchetype`] owns an ordered table of dimension
//! rules. Rules are tried in order and the first rule to capture a name
//! wins, so paired `W by H` patterns sit ahead of single labelled ones.
//!
//! Patterns are written against lower-cased, normalized text. `{M}` stands
//! for a measurement (`150mm`, or a bare `150` that the extractor accepts
//! at reduced confidence); `{MU}` for a measurement that must carry `mm`.

use partspec_core::ShapeArchetype;
use regex_lite::{Captures, Regex};
use std::sync::LazyLock;

const MEASURE: &str = r"\b(\d+(?:\.\d+)?)(mm)?\b";
const MEASURE_UNIT: &str = r"\b(\d+(?:\.\d+)?)(mm)\b";
const ASSIGN: &str = r"\s*(?:of\s*|=\s*|:\s*)?";

/// How a rule's measurements map onto dimension names.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capture {
    One(&'static str),
    Pair(&'static str, &'static str),
    Triple(&'static str, &'static str, &'static str),
    /// Two measurements that must agree, e.g. the sides of a square.
    Equal(&'static str),
    /// A fixed value when the phrase matches ("no chamfer").
    Fixed(&'static str, f64),
}

/// One dimension-capture rule.
#[derive(Debug, Clone, Copy)]
pub struct DimensionRule {
    pub pattern: &'static str,
    pub capture: Capture,
}

const fn rule(pattern: &'static str, capture: Capture) -> DimensionRule {
    DimensionRule { pattern, capture }
}

/// Archetype triggers, tried in order; every pattern of an entry must match.
const TRIGGERS: &[(ShapeArchetype, &[&str])] = &[
    (ShapeArchetype::CircularFlange, &[r"\bflanges?\b"]),
    (
        ShapeArchetype::LBracket,
        &[r"\bl[\s-]?(?:shaped\s+)?brackets?\b|\bangle\s+brackets?\b"],
    ),
    (
        ShapeArchetype::TBracket,
        &[r"\bt[\s-]?(?:shaped\s+)?brackets?\b|\btee\s+brackets?\b"],
    ),
    (ShapeArchetype::TriangularPlate, &[r"\btriang(?:le|ular)\b"]),
    (ShapeArchetype::RectangularPlate, &[r"\brectang(?:le|ular)\b"]),
    (
        ShapeArchetype::SquarePlate,
        &[r"\bsquare\b", r"\b(?:plate|sheet|panel)s?\b"],
    ),
    (ShapeArchetype::RectangularPlate, &[r"\b(?:plate|sheet|panel)s?\b"]),
];

const PAIR: &str = r"{M}\s*(?:x|by|×)\s*{M}";

const RECTANGULAR_RULES: &[DimensionRule] = &[
    rule(PAIR, Capture::Pair("width", "height")),
    rule(r"\bwidth{A}{M}", Capture::One("width")),
    rule(r"{M}\s*wide\b", Capture::One("width")),
    rule(r"\b(?:height|length){A}{M}", Capture::One("height")),
    rule(r"{M}\s*(?:high|tall|long)\b", Capture::One("height")),
];

const SQUARE_RULES: &[DimensionRule] = &[
    rule(PAIR, Capture::Equal("side")),
    rule(r"\bsides?\s*(?:length)?{A}{M}", Capture::One("side")),
    rule(r"{M}\s*square\b", Capture::One("side")),
    rule(r"\b(?:plate|sheet|panel)\s*(?:of\s*)?{M}", Capture::One("side")),
];

const FLANGE_RULES: &[DimensionRule] = &[
    rule(
        r"\b(?:outer|outside)\s*(?:diameter|dia\b\.?|ø)?{A}{M}",
        Capture::One("outer_diameter"),
    ),
    rule(r"\bod{A}{M}", Capture::One("outer_diameter")),
    rule(
        r"{M}\s*(?:od\b|outer\s+diameter|outside\s+diameter)",
        Capture::One("outer_diameter"),
    ),
    rule(
        r"\b(?:inner|inside)\s*(?:diameter|dia\b\.?|ø)?{A}{M}",
        Capture::One("inner_diameter"),
    ),
    rule(r"\b(?:id|bore)\s*(?:diameter)?{A}{M}", Capture::One("inner_diameter")),
    rule(
        r"{M}\s*(?:id\b|bore\b|inner\s+diameter|inside\s+diameter)",
        Capture::One("inner_diameter"),
    ),
];

const BRACKET_RULES: &[DimensionRule] = &[
    rule(
        r"{M}\s*(?:x|by|×)\s*{M}\s*(?:x|by|×)\s*{M}",
        Capture::Triple("width", "height", "thickness"),
    ),
    rule(PAIR, Capture::Pair("width", "height")),
    rule(r"\bwidth{A}{M}", Capture::One("width")),
    rule(r"\b(?:height|length){A}{M}", Capture::One("height")),
];

const TRIANGULAR_RULES: &[DimensionRule] = &[
    rule(PAIR, Capture::Pair("base", "height")),
    rule(r"\bbase{A}{M}", Capture::One("base")),
    rule(r"\b(?:height|altitude){A}{M}", Capture::One("height")),
];

/// Optional dimensions shared by every archetype that accepts them.
const COMMON_RULES: &[DimensionRule] = &[
    rule(r"\bthickness{A}{M}", Capture::One("thickness")),
    rule(r"{M}\s*thick\b", Capture::One("thickness")),
    rule(
        r"\bfillet(?:s|ed)?\s*(?:radius)?{A}{M}",
        Capture::One("fillet_radius"),
    ),
    rule(r"{M}\s*(?:radius\s*)?fillets?\b", Capture::One("fillet_radius")),
    rule(r"\bcorner\s+radius{A}{M}", Capture::One("fillet_radius")),
    rule(r"{M}\s*corner\s+radius\b", Capture::One("fillet_radius")),
    rule(r"\bno\s+chamfers?\b", Capture::Fixed("chamfer", 0.0)),
    rule(r"\bchamfer(?:s|ed)?{A}{M}", Capture::One("chamfer")),
    rule(r"{M}\s*chamfers?\b", Capture::One("chamfer")),
];

/// The ordered dimension rules for an archetype.
pub fn dimension_rules(archetype: ShapeArchetype) -> &'static [DimensionRule] {
    match archetype {
        ShapeArchetype::RectangularPlate => RECTANGULAR_RULES,
        ShapeArchetype::SquarePlate => SQUARE_RULES,
        ShapeArchetype::CircularFlange => FLANGE_RULES,
        ShapeArchetype::LBracket | ShapeArchetype::TBracket => BRACKET_RULES,
        ShapeArchetype::TriangularPlate => TRIANGULAR_RULES,
    }
}

fn expand(pattern: &str) -> String {
    pattern
        .replace("{MU}", MEASURE_UNIT)
        .replace("{M}", MEASURE)
        .replace("{A}", ASSIGN)
}

/// A dimension rule with its compiled pattern.
#[derive(Debug)]
pub struct CompiledRule {
    pub regex: Regex,
    pub capture: Capture,
}

impl CompiledRule {
    fn compile(rule: &DimensionRule) -> Result<Self, regex_lite::Error> {
        Ok(Self {
            regex: Regex::new(&expand(rule.pattern))?,
            capture: rule.capture,
        })
    }
}

/// Vocabulary for hole clauses.
#[derive(Debug)]
pub struct HoleLexicon {
    pub clause_split: Regex,
    pub hole_word: Regex,
    /// Hints that a clause without the word "hole" continues a hole clause.
    pub continuation: Regex,
    /// Hints that a clause is about the outline, not the holes.
    pub outline_hint: Regex,
    /// Captures (count word, adjectives).
    pub count: Regex,
    pub center: Regex,
    pub corner: Regex,
    pub pitch: Vec<Regex>,
    pub diameter: Vec<Regex>,
}

/// Every compiled pattern the rule-based extractor uses.
#[derive(Debug)]
pub struct Registry {
    triggers: Vec<(ShapeArchetype, Vec<Regex>)>,
    rules: Vec<(ShapeArchetype, Vec<CompiledRule>)>,
    common: Vec<CompiledRule>,
    pub holes: HoleLexicon,
}

impl Registry {
    fn compile() -> Result<Self, regex_lite::Error> {
        let triggers = TRIGGERS
            .iter()
            .map(|(archetype, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|p| Regex::new(p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((*archetype, compiled))
            })
            .collect::<Result<Vec<_>, regex_lite::Error>>()?;

        let rules = ShapeArchetype::ALL
            .iter()
            .map(|archetype| {
                let compiled = dimension_rules(*archetype)
                    .iter()
                    .map(CompiledRule::compile)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((*archetype, compiled))
            })
            .collect::<Result<Vec<_>, regex_lite::Error>>()?;

        let common = COMMON_RULES
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;

        let re = |p: &str| Regex::new(&expand(p));
        let holes = HoleLexicon {
            clause_split: re(r"\s*(?:[,;]|\bwith\b|\band\b|\bplus\b)\s*")?,
            hole_word: re(r"\bholes?\b")?,
            continuation: re(
                r"\bfrom\s+(?:the\s+|each\s+|all\s+)?(?:corners?|edges?)\b|\bpitch\b|\bp\.?c\.?d\b|\bbolt\s*circle\b|\bdiameter\b|\bdia\b|ø|\bcent(?:er|re)\b",
            )?,
            outline_hint: re(
                r"\b(?:outer|outside|inner|inside|bore|thick|thickness|fillets?|chamfers?)\b",
            )?,
            count: re(
                r"\b(\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|a|an|single)\s+((?:[a-z0-9.]+\s+){0,2})holes?\b",
            )?,
            center: re(
                r"\b(?:cent(?:er|re)d?|central|middle)\s+(?:[a-z]+\s+)?holes?\b|\bholes?\s+(?:in|at)\s+(?:the\s+)?(?:cent(?:er|re)|middle)\b|\b(?:in|at)\s+the\s+(?:cent(?:er|re)|middle)\b",
            )?,
            corner: re(r"{M}\s*(?:in\s+)?from\s+(?:the\s+|each\s+|all\s+)?(?:corners?|edges?)\b")?,
            pitch: vec![
                re(r"{M}\s*(?:pitch\s*circle(?:\s*diameter)?|p\.?c\.?d\b\.?|bolt\s*circle(?:\s*diameter)?|b\.?c\.?d\b\.?)")?,
                re(r"\b(?:pitch\s*circle(?:\s*diameter)?|p\.?c\.?d\b\.?|bolt\s*circle(?:\s*diameter)?){A}{M}")?,
            ],
            diameter: vec![
                re(r"{M}\s*(?:diameter|dia\b|ø)")?,
                re(r"(?:\bdiameter|\bdia\b|ø){A}{M}")?,
                re(r"\bholes?\s*(?:of\s*)?{MU}")?,
                re(r"{MU}\s*(?:[a-z]+\s+)?holes?\b")?,
            ],
        };

        Ok(Self {
            triggers,
            rules,
            common,
            holes,
        })
    }

    /// First archetype whose triggers all match.
    pub fn archetype_of(&self, text: &str) -> Option<ShapeArchetype> {
        self.triggers
            .iter()
            .find(|(_, patterns)| patterns.iter().all(|p| p.is_match(text)))
            .map(|(archetype, _)| *archetype)
    }

    /// Archetype rules followed by the shared optional-dimension rules that
    /// apply to it.
    pub fn rules_for(&self, archetype: ShapeArchetype) -> impl Iterator<Item = &CompiledRule> {
        self.rules
            .iter()
            .filter(move |(a, _)| *a == archetype)
            .flat_map(|(_, rules)| rules.iter())
            .chain(self.common.iter().filter(move |r| {
                let name = match r.capture {
                    Capture::One(name) | Capture::Equal(name) | Capture::Fixed(name, _) => name,
                    Capture::Pair(name, _) | Capture::Triple(name, _, _) => name,
                };
                archetype.accepts_dimension(name)
            }))
    }
}

static REGISTRY: LazyLock<Result<Registry, regex_lite::Error>> = LazyLock::new(Registry::compile);

/// The process-wide compiled registry.
pub fn registry() -> Result<&'static Registry, &'static regex_lite::Error> {
    REGISTRY.as_ref()
}

/// The raw number and unit text of the `index`-th measurement in a match.
pub fn measurement<'t>(caps: &Captures<'t>, index: usize) -> Option<(&'t str, &'t str)> {
    let value = caps.get(2 * index + 1)?.as_str();
    let unit = caps.get(2 * index + 2).map_or("", |m| m.as_str());
    Some((value, unit))
}
