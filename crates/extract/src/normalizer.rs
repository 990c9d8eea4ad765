//! Unit & number normalizer.
//!
//! Rewrites every `<number><unit>` token in free text as a canonical
//! millimetre token (`150mm`, `25.4mm`) and keeps a side list of the
//! conversions for traceability. A run of numbers joined by `x`/`by`
//! with one trailing unit (`20 x 10cm`) applies that unit to every number
//! in the run.
//!
//! Canonical tokens use the shortest decimal that round-trips, so
//! normalizing already-normalized text returns it unchanged.

use partspec_core::UnitError;
use regex_lite::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// A length unit the normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Millimetre,
    Centimetre,
    Metre,
    Inch,
}

impl Unit {
    /// Recognise a unit token (case-insensitive).
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => {
                Some(Unit::Millimetre)
            }
            "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => {
                Some(Unit::Centimetre)
            }
            "m" | "meter" | "meters" | "metre" | "metres" => Some(Unit::Metre),
            "in" | "inch" | "inches" | "\"" => Some(Unit::Inch),
            _ => None,
        }
    }

    /// Millimetres per unit.
    pub fn factor(self) -> f64 {
        match self {
            Unit::Millimetre => 1.0,
            Unit::Centimetre => 10.0,
            Unit::Metre => 1000.0,
            Unit::Inch => 25.4,
        }
    }

    pub fn to_mm(self, value: f64) -> f64 {
        value * self.factor()
    }
}

/// One rewritten measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// Byte span in the original text.
    pub span: Range<usize>,
    /// The original token text.
    pub original: String,
    pub unit: Unit,
    pub value_mm: f64,
}

/// Normalizer output.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub text: String,
    pub conversions: Vec<Conversion>,
}

const UNIT_ALTERNATION: &str = r#"((?:millimet(?:er|re)s?|centimet(?:er|re)s?|met(?:er|re)s?|inch(?:es)?|mm|cm|in|m)\b|")"#;

struct Lexer {
    run: Regex,
    number: Regex,
}

impl Lexer {
    fn compile() -> Result<Self, regex_lite::Error> {
        let number = r"\d+(?:\.\d+)?";
        let run = format!(r"(?i)\b({number}(?:\s*(?:x|by|×)\s*{number})*)\s*{UNIT_ALTERNATION}");
        Ok(Self {
            run: Regex::new(&run)?,
            number: Regex::new(number)?,
        })
    }
}

static LEXER: LazyLock<Result<Lexer, regex_lite::Error>> = LazyLock::new(Lexer::compile);

/// Words that mark a bare `in` as a preposition ("30 in the center").
const PREPOSITION_FOLLOWERS: &[&str] = &["the", "a", "an", "each", "its", "middle", "center", "centre"];

fn is_preposition(unit_token: &str, after: &str) -> bool {
    if !unit_token.eq_ignore_ascii_case("in") {
        return false;
    }
    let next: String = after
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase();
    PREPOSITION_FOLLOWERS.contains(&next.as_str())
}

/// The canonical token for a millimetre value.
pub fn canonical(value_mm: f64) -> String {
    format!("{value_mm}mm")
}

/// Rewrite every recognised measurement in `text` as canonical millimetres.
pub fn normalize(text: &str) -> Normalized {
    let lexer = match LEXER.as_ref() {
        Ok(lexer) => lexer,
        Err(e) => {
            warn!(error = %e, "Measurement patterns unavailable; text left as-is");
            return Normalized {
                text: text.to_string(),
                conversions: Vec::new(),
            };
        }
    };

    let mut out = String::with_capacity(text.len());
    let mut conversions = Vec::new();
    let mut last = 0;

    for caps in lexer.run.captures_iter(text) {
        let (Some(whole), Some(numbers), Some(unit_token)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let Some(unit) = Unit::parse(unit_token.as_str()) else {
            continue;
        };
        if is_preposition(unit_token.as_str(), &text[whole.end()..]) {
            debug!(token = whole.as_str(), "Bare 'in' read as a preposition");
            continue;
        }

        let found: Vec<_> = lexer.number.find_iter(numbers.as_str()).collect();
        let mut tokens = Vec::with_capacity(found.len());
        for (i, m) in found.iter().enumerate() {
            let Ok(value) = m.as_str().parse::<f64>() else {
                continue;
            };
            let start = numbers.start() + m.start();
            // The last number in a run owns the unit text.
            let end = if i + 1 == found.len() {
                whole.end()
            } else {
                numbers.start() + m.end()
            };
            let value_mm = unit.to_mm(value);
            tokens.push(canonical(value_mm));
            conversions.push(Conversion {
                span: start..end,
                original: text[start..end].to_string(),
                unit,
                value_mm,
            });
        }

        out.push_str(&text[last..whole.start()]);
        out.push_str(&tokens.join(" x "));
        last = whole.end();
    }
    out.push_str(&text[last..]);

    debug!(conversions = conversions.len(), "Normalized measurements");
    Normalized {
        text: out,
        conversions,
    }
}

/// Parse a single measurement token such as `"150mm"` or `"2.5 in"` into
/// millimetres.
pub fn parse_measurement(token: &str) -> Result<f64, UnitError> {
    let trimmed = token.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, rest) = trimmed.split_at(split);

    if number.is_empty() {
        return Err(UnitError::InvalidNumber(trimmed.to_string()));
    }
    let value: f64 = number
        .parse()
        .map_err(|_| UnitError::InvalidNumber(trimmed.to_string()))?;

    let unit_text = rest.trim();
    if unit_text.is_empty() {
        return Err(UnitError::MissingUnit {
            value,
            context: trimmed.to_string(),
        });
    }

    let unit = Unit::parse(unit_text).ok_or_else(|| UnitError::UnknownUnit {
        token: trimmed.to_string(),
        unit: unit_text.to_string(),
    })?;
    Ok(unit.to_mm(value))
}
