//! Arbitration between the two extraction paths.
//!
//! In forced modes the named path wins or the call fails. In auto mode the
//! higher-confidence candidate wins outright when the two disagree on the
//! archetype; when they agree, their fields are merged with each field taken
//! from whichever source is more confident about it.

use partspec_core::{
    Candidate, ExtractionError, ExtractionMode, HoleFeature, HoleGroup, ParameterSet, Placement,
    Source,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Key used for holes that belong to no group when merging.
const UNGROUPED: &str = "ungrouped";

/// Pick or merge a final parameter set from the two candidates.
pub fn resolve(
    rule: Candidate,
    llm: Candidate,
    mode: ExtractionMode,
) -> Result<ParameterSet, ExtractionError> {
    match mode {
        ExtractionMode::ForceRule => rule.parameters.ok_or(ExtractionError::ForcedUnavailable {
            path: Source::RuleBased.to_string(),
        }),
        ExtractionMode::ForceLlm => llm.parameters.ok_or(ExtractionError::ForcedUnavailable {
            path: Source::Llm.to_string(),
        }),
        ExtractionMode::Auto => auto(rule, llm),
    }
}

fn auto(rule: Candidate, llm: Candidate) -> Result<ParameterSet, ExtractionError> {
    match (rule.parameters, llm.parameters) {
        (None, None) => Err(ExtractionError::NoCandidate),
        (Some(set), None) => {
            debug!("Only the rule-based path produced a candidate");
            Ok(set)
        }
        (None, Some(set)) => {
            debug!("Only the LLM path produced a candidate");
            Ok(set)
        }
        (Some(r), Some(l)) if r.archetype != l.archetype => {
            let rule_wins = rule.confidence >= llm.confidence;
            info!(
                rule_archetype = %r.archetype,
                llm_archetype = %l.archetype,
                rule_confidence = rule.confidence,
                llm_confidence = llm.confidence,
                winner = if rule_wins { "rule-based" } else { "llm" },
                "Candidates disagree on archetype"
            );
            Ok(if rule_wins { r } else { l })
        }
        (Some(r), Some(l)) => Ok(merge(r, rule.confidence, l, llm.confidence)),
    }
}

/// Merge two candidates of the same archetype.
///
/// Ties go to the rule-based side.
pub fn merge(rule: ParameterSet, rule_confidence: f64, llm: ParameterSet, llm_confidence: f64) -> ParameterSet {
    let rule_first = rule_confidence >= llm_confidence;
    let (primary, secondary) = if rule_first {
        (&rule, &llm)
    } else {
        (&llm, &rule)
    };

    let mut merged = ParameterSet::new(rule.archetype, Source::Merged, rule.metadata.raw_text.clone());
    merged.metadata.confidence = rule_confidence.max(llm_confidence);

    for (name, value) in secondary.dimensions.iter().chain(primary.dimensions.iter()) {
        merged.dimensions.insert(name.clone(), *value);
    }

    // Holes merge per group: a group comes whole from one side.
    let keys: BTreeSet<&str> = primary
        .holes
        .iter()
        .chain(secondary.holes.iter())
        .map(group_key)
        .collect();
    let mut pitch_from: Option<&ParameterSet> = None;
    for key in keys {
        let from = if primary.holes.iter().any(|h| group_key(h) == key) {
            primary
        } else {
            secondary
        };
        merged
            .holes
            .extend(from.holes.iter().filter(|h| group_key(h) == key).cloned());
        if key != UNGROUPED {
            merged.groups.extend(group_declaration(from, key));
            let polar = from
                .holes_in_group(key)
                .any(|h| matches!(h.placement, Placement::Polar { .. }));
            if polar && pitch_from.is_none() {
                pitch_from = Some(from);
            }
        }
    }
    // The pitch diameter belongs to whichever side supplied the pitch-circle holes.
    if let Some(pcd) = pitch_from.and_then(|side| side.dimension("pitch_diameter")) {
        merged.set_dimension("pitch_diameter", pcd);
    }

    let mut unresolved = BTreeSet::new();
    for (side, other) in [(&rule, &llm), (&llm, &rule)] {
        for field in &side.metadata.unresolved {
            if !supplies(other, field) {
                unresolved.insert(field.clone());
            }
        }
    }
    merged.metadata.unresolved = unresolved.into_iter().collect();

    info!(
        archetype = %merged.archetype,
        preferred = if rule_first { "rule-based" } else { "llm" },
        dimensions = merged.dimensions.len(),
        holes = merged.holes.len(),
        confidence = merged.metadata.confidence,
        "Merged candidates"
    );
    merged
}

fn group_key(hole: &HoleFeature) -> &str {
    hole.group_id.as_deref().unwrap_or(UNGROUPED)
}

fn group_declaration(set: &ParameterSet, id: &str) -> Option<HoleGroup> {
    set.groups.iter().find(|g| g.id == id).cloned()
}

/// Whether `set` provides a value for an unresolved field name.
fn supplies(set: &ParameterSet, field: &str) -> bool {
    if field.starts_with("hole_") {
        !set.holes.is_empty()
    } else {
        set.dimensions.contains_key(field)
    }
}
