//! Access decisions.
//!
//! Rules combine permit-overrides: a request is permitted if any rule matches
//! it, and denied otherwise. A request naming an undeclared subject or object
//! is denied rather than treated as an error.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analytics::AccessTriple;
use crate::attributes::Entity;
use crate::error::{QueryError, RequestError};
use crate::store::PolicyStore;

// ============================================================================
// Effect and Decision
// ============================================================================

/// The outcome of an access request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Some rule grants the request.
    Permit,
    /// No rule grants the request.
    #[default]
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permit => f.write_str("Permit"),
            Self::Deny => f.write_str("Deny"),
        }
    }
}

/// The result of evaluating an access request, with an explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether access is permitted.
    pub effect: Effect,
    /// Index of the first rule that matched, or `None` on deny.
    pub matched_rule: Option<usize>,
    /// Human-readable explanation of why this decision was made.
    pub reason: String,
}

impl Decision {
    fn deny(reason: String) -> Self {
        Self {
            effect: Effect::Deny,
            matched_rule: None,
            reason,
        }
    }
}

// ============================================================================
// Strategy
// ============================================================================

/// How candidate rules are found for a request.
///
/// Both strategies produce identical results; `Indexed` skips rules whose
/// action set cannot contain the requested action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Try every rule for every request.
    BruteForce,
    /// Pre-filter rules by action (and, in analytics, subjects by rule).
    #[default]
    Indexed,
}

impl Strategy {
    /// Name used in configuration files and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BruteForce => "brute-force",
            Self::Indexed => "indexed",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brute-force" => Ok(Self::BruteForce),
            "indexed" => Ok(Self::Indexed),
            other => Err(format!(
                "unknown strategy '{other}' (expected 'brute-force' or 'indexed')"
            )),
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Evaluates one request against every rule in load order.
///
/// # Postcondition
///
/// Always returns a `Decision`; unknown identifiers yield `Deny`.
pub fn evaluate(store: &PolicyStore, subject: &str, object: &str, action: &str) -> Decision {
    Evaluator::with_strategy(store, Strategy::BruteForce).evaluate(subject, object, action)
}

/// Returns only the effect of [`evaluate`].
pub fn decide(store: &PolicyStore, subject: &str, object: &str, action: &str) -> Effect {
    evaluate(store, subject, object, action).effect
}

/// A `subject,object,action` access request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    pub subject: String,
    pub object: String,
    pub action: String,
}

/// Parses one request line. Fields are trimmed and must be non-empty.
pub fn parse_request(line: usize, text: &str) -> Result<Request, RequestError> {
    let reject = |reason: String| RequestError {
        line,
        text: text.to_string(),
        reason,
    };

    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    let [subject, object, action] = fields.as_slice() else {
        return Err(reject(format!(
            "expected 3 comma-separated fields, found {}",
            fields.len()
        )));
    };
    if let Some(position) = fields.iter().position(|field| field.is_empty()) {
        return Err(reject(format!("field {} is empty", position + 1)));
    }

    Ok(Request {
        subject: (*subject).to_string(),
        object: (*object).to_string(),
        action: (*action).to_string(),
    })
}

/// One evaluated line of a request batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// 1-based line number in the batch input.
    pub line: usize,
    /// The request as written, trimmed.
    pub text: String,
    /// The decision, or why the line was rejected.
    pub outcome: Result<Effect, RequestError>,
}

// ============================================================================
// Evaluator
// ============================================================================

/// Answers requests against one store, optionally with an action index.
#[derive(Debug)]
pub struct Evaluator<'a> {
    store: &'a PolicyStore,
    action_index: Option<HashMap<&'a str, Vec<usize>>>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator using the default strategy.
    pub fn new(store: &'a PolicyStore) -> Self {
        Self::with_strategy(store, Strategy::default())
    }

    /// Creates an evaluator using `strategy`.
    pub fn with_strategy(store: &'a PolicyStore, strategy: Strategy) -> Self {
        let action_index = match strategy {
            Strategy::BruteForce => None,
            Strategy::Indexed => {
                let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
                for (i, rule) in store.rules().iter().enumerate() {
                    for action in &rule.actions {
                        index.entry(action.as_str()).or_default().push(i);
                    }
                }
                Some(index)
            }
        };
        Self {
            store,
            action_index,
        }
    }

    /// Evaluates a request. See [`evaluate`].
    pub fn evaluate(&self, subject_id: &str, object_id: &str, action: &str) -> Decision {
        let Some(subject) = self.store.subject(subject_id) else {
            return Decision::deny(format!("Unknown subject '{subject_id}'"));
        };
        let Some(object) = self.store.object(object_id) else {
            return Decision::deny(format!("Unknown object '{object_id}'"));
        };

        match self.matching_rule(subject, object, action) {
            Some(index) => Decision {
                effect: Effect::Permit,
                matched_rule: Some(index),
                reason: format!("Matched rule #{index}: {}", self.store.rules()[index]),
            },
            None => Decision::deny(format!(
                "No rule permits '{subject_id}' to '{action}' '{object_id}'"
            )),
        }
    }

    /// Lowest-index rule matching the request.
    fn matching_rule(&self, subject: &Entity, object: &Entity, action: &str) -> Option<usize> {
        let rules = self.store.rules();
        match &self.action_index {
            // Index lists are in ascending rule order, so the first hit is
            // the lowest matching index either way.
            Some(index) => index.get(action).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .find(|&i| rules[i].matches(subject, object, action))
            }),
            None => rules
                .iter()
                .position(|rule| rule.matches(subject, object, action)),
        }
    }

    /// Lists the permitted requests among those matching the given fields.
    ///
    /// An omitted field ranges over every declared subject, every declared
    /// object, or every action some rule grants. Named fields must exist in
    /// the policy. Results are sorted by subject, object, then action.
    pub fn permitted(
        &self,
        subject: Option<&str>,
        object: Option<&str>,
        action: Option<&str>,
    ) -> Result<Vec<AccessTriple>, QueryError> {
        let subjects: Vec<&Entity> = match subject {
            Some(id) => vec![
                self.store
                    .subject(id)
                    .ok_or_else(|| QueryError::UnknownSubject(id.to_string()))?,
            ],
            None => self.store.subjects().values().collect(),
        };
        let objects: Vec<&Entity> = match object {
            Some(id) => vec![
                self.store
                    .object(id)
                    .ok_or_else(|| QueryError::UnknownObject(id.to_string()))?,
            ],
            None => self.store.objects().values().collect(),
        };
        let actions_in_use = self.store.actions_in_use();
        let actions: Vec<&str> = match action {
            Some(action) if actions_in_use.contains(action) => vec![action],
            Some(action) => return Err(QueryError::UnknownAction(action.to_string())),
            None => actions_in_use.into_iter().collect(),
        };

        let mut permitted = Vec::new();
        for subject in &subjects {
            for object in &objects {
                for &action in &actions {
                    if self.matching_rule(subject, object, action).is_some() {
                        permitted.push(AccessTriple::new(subject.id(), object.id(), action));
                    }
                }
            }
        }
        debug!(
            candidates = subjects.len() * objects.len() * actions.len(),
            permitted = permitted.len(),
            "Permission query answered"
        );
        Ok(permitted)
    }

    /// Returns only the effect of [`Evaluator::evaluate`].
    pub fn decide(&self, subject: &str, object: &str, action: &str) -> Effect {
        self.evaluate(subject, object, action).effect
    }

    /// Decides every request line in `input`, in order.
    ///
    /// Blank lines and `#` comments produce no entry. Malformed lines
    /// produce an error entry and do not stop the batch.
    pub fn decide_batch(&self, input: &str) -> Vec<BatchEntry> {
        input
            .lines()
            .enumerate()
            .filter_map(|(i, text)| {
                let line = i + 1;
                let trimmed = text.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    return None;
                }
                let outcome = parse_request(line, trimmed)
                    .map(|request| self.decide(&request.subject, &request.object, &request.action))
                    .inspect_err(|err| warn!(line, reason = %err.reason, "Malformed request line"));
                Some(BatchEntry {
                    line,
                    text: trimmed.to_string(),
                    outcome,
                })
            })
            .collect()
    }
}
