//! Design session — revision history for an iteratively refined part.

use chrono::{DateTime, Utc};
use partspec_core::{ParameterSet, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded state of the design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub parameters: ParameterSet,
    /// What changed (usually the description that produced it).
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

/// A free-form remark about the design, kept apart from the revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

/// An ordered history of parameter sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignSession {
    pub id: String,
    revisions: Vec<Revision>,
    #[serde(default)]
    feedback: Vec<Feedback>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DesignSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            revisions: Vec::new(),
            feedback: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a revision.
    pub fn record(&mut self, parameters: ParameterSet, note: impl Into<String>) {
        let now = Utc::now();
        self.updated_at = now;
        self.revisions.push(Revision {
            parameters,
            note: note.into(),
            recorded_at: now,
        });
    }

    /// Record a feedback note. Undo leaves feedback alone.
    pub fn add_feedback(&mut self, note: impl Into<String>) {
        let now = Utc::now();
        self.updated_at = now;
        self.feedback.push(Feedback {
            note: note.into(),
            recorded_at: now,
        });
    }

    pub fn feedback(&self) -> &[Feedback] {
        &self.feedback
    }

    /// The last `last_n` feedback notes, one `- note` line each.
    pub fn feedback_context(&self, last_n: usize) -> String {
        let start = self.feedback.len().saturating_sub(last_n);
        self.feedback[start..]
            .iter()
            .map(|f| format!("- {}", f.note))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Drop the latest revision and return the one now current.
    ///
    /// The first revision is never removed; `None` when there is nothing to
    /// undo.
    pub fn undo(&mut self) -> Option<&Revision> {
        if self.revisions.len() < 2 {
            return None;
        }
        self.revisions.pop();
        self.updated_at = Utc::now();
        self.revisions.last()
    }

    pub fn current(&self) -> Option<&Revision> {
        self.revisions.last()
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Pretty JSON of the current parameter set (`{}` when empty).
    pub fn summary(&self) -> Result<String> {
        match self.current() {
            Some(revision) => revision.parameters.to_json(),
            None => Ok("{}".into()),
        }
    }

    /// A compact, one-line-per-revision digest of the last `last_n`
    /// revisions, oldest first.
    pub fn context(&self, last_n: usize) -> String {
        let start = self.revisions.len().saturating_sub(last_n);
        self.revisions[start..]
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let dims: Vec<String> = r
                    .parameters
                    .dimensions
                    .iter()
                    .map(|(name, d)| format!("{name}={}", d.value()))
                    .collect();
                format!(
                    "{}. {} -> {} [{}] holes={}",
                    start + i + 1,
                    r.note,
                    r.parameters.archetype,
                    dims.join(", "),
                    r.parameters.holes.len()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for DesignSession {
    fn default() -> Self {
        Self::new()
    }
}
