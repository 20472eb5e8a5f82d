//! Policy language loader.
//!
//! The loader is line-oriented: each non-blank line that does not start with
//! `#` is one statement.
//!
//! ```text
//! userAttrib(<id>, <key>=<value>, ...)
//! resourceAttrib(<id>, <key>=<value>, ...)
//! rule(<subject conditions>; <object conditions>; <actions>; <constraints>)
//! ```
//!
//! A value starting with `{` is a set of whitespace-separated tokens; anything
//! else is a scalar taken verbatim. Commas inside braces do not split clauses.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::attributes::{AttributeValue, Entity, EntityKind};
use crate::error::{ParseError, ParseErrorKind, PolicyError, Result};
use crate::rule::{ConditionOperator, ConstraintOperator, RelationalConstraint, Rule, SingleCondition};
use crate::store::PolicyStore;

type KindResult<T> = std::result::Result<T, ParseErrorKind>;

// ============================================================================
// Public API
// ============================================================================

/// Parses policy text into a store.
pub fn parse_str(text: &str) -> std::result::Result<PolicyStore, ParseError> {
    let mut loader = PolicyLoader::new();
    for line in text.lines() {
        loader.feed_line(line)?;
    }
    Ok(loader.finish())
}

/// Reads and parses a policy file, one line at a time.
pub fn load_path(path: impl AsRef<Path>) -> Result<PolicyStore> {
    let path = path.as_ref();
    let io_error = |source| PolicyError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_error)?;
    let mut loader = PolicyLoader::new();
    for line in BufReader::new(file).lines() {
        loader.feed_line(&line.map_err(io_error)?)?;
    }

    let store = loader.finish();
    info!(path = %path.display(), "Policy file loaded");
    Ok(store)
}

/// Incremental policy parser. Feed lines in order, then call [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct PolicyLoader {
    store: PolicyStore,
    line: usize,
}

impl PolicyLoader {
    /// Creates a loader with an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one line of policy text.
    ///
    /// Blank lines and `#` comments are skipped. Any other line must be a
    /// complete statement.
    pub fn feed_line(&mut self, raw: &str) -> std::result::Result<(), ParseError> {
        self.line += 1;
        let text = if self.line == 1 {
            raw.trim_start_matches('\u{feff}').trim()
        } else {
            raw.trim()
        };
        if text.is_empty() || text.starts_with('#') {
            return Ok(());
        }

        let statement = parse_statement(text).map_err(|kind| ParseError {
            line: self.line,
            text: raw.to_string(),
            kind,
        })?;

        match statement {
            Statement::Entity(entity) => self.insert_entity(entity),
            Statement::Rule(rule) => {
                debug!(line = self.line, index = self.store.rules().len(), "Parsed rule");
                self.store.push_rule(rule);
            }
        }
        Ok(())
    }

    /// Returns the populated store.
    pub fn finish(self) -> PolicyStore {
        info!(
            subjects = self.store.subjects().len(),
            objects = self.store.objects().len(),
            rules = self.store.rules().len(),
            "Policy parsed"
        );
        self.store
    }

    fn insert_entity(&mut self, entity: Entity) {
        let kind = entity.kind();
        let id = entity.id().to_string();
        debug!(line = self.line, ?kind, id = %id, "Parsed entity");
        if self.store.insert_entity(entity).is_some() {
            warn!(
                line = self.line,
                ?kind,
                id = %id,
                "Entity declared more than once; later declaration replaces earlier"
            );
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

enum Statement {
    Entity(Entity),
    Rule(Rule),
}

fn parse_statement(text: &str) -> KindResult<Statement> {
    for kind in [EntityKind::Subject, EntityKind::Object] {
        if let Some(args) = statement_args(text, kind.keyword()) {
            return parse_entity(kind, args?).map(Statement::Entity);
        }
    }
    if let Some(args) = statement_args(text, "rule") {
        return parse_rule(args?).map(Statement::Rule);
    }
    Err(ParseErrorKind::UnknownStatement)
}

/// Returns the text between the first `(` and the last `)` if `text` is a
/// `keyword(...)` statement, `None` if it is some other statement. The
/// closing `)` must end the statement.
fn statement_args<'a>(text: &'a str, keyword: &str) -> Option<KindResult<&'a str>> {
    let rest = text.strip_prefix(keyword)?;
    let after_keyword = rest.trim_start();
    if !after_keyword.starts_with('(') {
        // `rules(...)` is a different statement; `rule x` is a broken one.
        return (rest.is_empty() || rest.starts_with(char::is_whitespace))
            .then_some(Err(ParseErrorKind::MissingParenthesis));
    }

    let open = text.find('(')?;
    Some(match text.rfind(')') {
        Some(close) if close > open => match text[close + 1..].trim() {
            "" => Ok(&text[open + 1..close]),
            trailing => Err(ParseErrorKind::TrailingText(trailing.to_string())),
        },
        _ => Err(ParseErrorKind::MissingParenthesis),
    })
}

fn parse_entity(kind: EntityKind, args: &str) -> KindResult<Entity> {
    let mut parts = split_top_level(args).into_iter();
    let id = parts.next().map(str::trim).unwrap_or_default();
    if id.is_empty() {
        return Err(ParseErrorKind::MissingIdentifier);
    }

    let mut entity = Entity::new(kind, id);
    for pair in parts.map(str::trim).filter(|pair| !pair.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ParseErrorKind::MissingAssignment(pair.to_string()));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseErrorKind::MissingAssignment(pair.to_string()));
        }
        let value = parse_value(value.trim())?;

        if key == kind.id_attribute() {
            // Restating the identifier is allowed, changing it is not.
            if value.as_scalar() != Some(id) {
                return Err(ParseErrorKind::IdentifierMismatch {
                    attribute: key.to_string(),
                    expected: id.to_string(),
                    found: value.to_string(),
                });
            }
            continue;
        }
        entity.add_attribute(key, value);
    }
    Ok(entity)
}

fn parse_rule(args: &str) -> KindResult<Rule> {
    let sections: Vec<&str> = args.split(';').collect();
    let [subject, object, actions, constraints] = sections.as_slice() else {
        return Err(ParseErrorKind::SectionCount {
            found: sections.len(),
        });
    };

    Ok(Rule {
        subject_conditions: parse_conditions(subject)?,
        object_conditions: parse_conditions(object)?,
        actions: parse_actions(actions)?,
        constraints: parse_constraints(constraints)?,
    })
}

// ============================================================================
// Sections
// ============================================================================

fn parse_conditions(section: &str) -> KindResult<Vec<SingleCondition>> {
    clauses(section)
        .map(|clause| {
            if let Some((attribute, operand)) = clause.split_once('[') {
                let attribute = non_empty_name(attribute, clause)?;
                // Both `attr [ {a b}` and `attr[{a b}]` are accepted.
                let operand = operand.trim();
                let operand = operand.strip_suffix(']').map_or(operand, str::trim_end);
                let operand = if operand.starts_with('{') {
                    parse_value(operand)?
                } else {
                    AttributeValue::scalar(operand)
                };
                Ok(SingleCondition::new(
                    attribute,
                    ConditionOperator::ValueInLiteralSet,
                    operand,
                ))
            } else if let Some((attribute, literal)) = clause.split_once(']') {
                let attribute = non_empty_name(attribute, clause)?;
                Ok(SingleCondition::new(
                    attribute,
                    ConditionOperator::LiteralInAttributeSet,
                    AttributeValue::scalar(literal.trim()),
                ))
            } else {
                Err(ParseErrorKind::MissingOperator(clause.to_string()))
            }
        })
        .collect()
}

fn parse_actions(section: &str) -> KindResult<BTreeSet<String>> {
    let section = section.trim();
    if section.starts_with('{') {
        return match parse_value(section)? {
            AttributeValue::Set(actions) => Ok(actions),
            AttributeValue::Scalar(action) => Ok([action].into()),
        };
    }
    if section.is_empty() {
        return Ok(BTreeSet::new());
    }
    Ok([section.to_string()].into())
}

fn parse_constraints(section: &str) -> KindResult<Vec<RelationalConstraint>> {
    clauses(section)
        .map(|clause| {
            let (operator, left, right) = ConstraintOperator::PRECEDENCE
                .iter()
                .find_map(|op| {
                    clause
                        .split_once(op.symbol())
                        .map(|(left, right)| (*op, left, right))
                })
                .ok_or_else(|| ParseErrorKind::MissingOperator(clause.to_string()))?;
            Ok(RelationalConstraint::new(
                non_empty_name(left, clause)?,
                operator,
                non_empty_name(right, clause)?,
            ))
        })
        .collect()
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses an attribute value literal: `{a b}` is a set, anything else a scalar.
fn parse_value(text: &str) -> KindResult<AttributeValue> {
    if !text.starts_with('{') {
        return Ok(AttributeValue::scalar(text));
    }
    let inner = text
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| ParseErrorKind::UnterminatedSet(text.to_string()))?;
    Ok(AttributeValue::set(
        inner
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty()),
    ))
}

/// Non-empty, trimmed comma-separated clauses of a section.
fn clauses(section: &str) -> impl Iterator<Item = &str> {
    split_top_level(section)
        .into_iter()
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
}

/// Splits on commas that are not inside `{ }`.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn non_empty_name<'a>(name: &'a str, clause: &str) -> KindResult<&'a str> {
    let name = name.trim();
    if name.is_empty() {
        Err(ParseErrorKind::EmptyOperand(clause.to_string()))
    } else {
        Ok(name)
    }
}

// ============================================================================
// Tests
// ============================================================================
