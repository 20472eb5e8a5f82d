//! The loaded policy: subjects, objects and rules.
//!
//! A store is built once (by the loader, a JSON import, or the builder
//! methods) and is read-only afterwards. Decisions and analytics borrow it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attributes::{Entity, EntityKind};
use crate::error::{ParseError, PolicyError, Result};
use crate::loader;
use crate::rule::Rule;

/// Subjects and objects keyed by identifier, plus rules in load order.
///
/// Rule indices (positions in [`PolicyStore::rules`]) are stable and are
/// what decisions and reports refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyStore {
    subjects: BTreeMap<String, Entity>,
    objects: BTreeMap<String, Entity>,
    rules: Vec<Rule>,
}

impl PolicyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a policy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        loader::load_path(path)
    }

    /// Parses policy text.
    pub fn parse(text: &str) -> std::result::Result<Self, ParseError> {
        loader::parse_str(text)
    }

    /// Adds a subject or object (builder pattern). A later entity with the
    /// same kind and identifier replaces the earlier one.
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.insert_entity(entity);
        self
    }

    /// Appends a rule (builder pattern).
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.push_rule(rule);
        self
    }

    pub(crate) fn insert_entity(&mut self, entity: Entity) -> Option<Entity> {
        let table = match entity.kind() {
            EntityKind::Subject => &mut self.subjects,
            EntityKind::Object => &mut self.objects,
        };
        table.insert(entity.id().to_string(), entity)
    }

    pub(crate) fn push_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Looks up a subject by `uid`.
    pub fn subject(&self, id: &str) -> Option<&Entity> {
        self.subjects.get(id)
    }

    /// Looks up an object by `rid`.
    pub fn object(&self, id: &str) -> Option<&Entity> {
        self.objects.get(id)
    }

    /// All subjects, ordered by identifier.
    pub fn subjects(&self) -> &BTreeMap<String, Entity> {
        &self.subjects
    }

    /// All objects, ordered by identifier.
    pub fn objects(&self) -> &BTreeMap<String, Entity> {
        &self.objects
    }

    /// Rules in load order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Union of every rule's action set.
    pub fn actions_in_use(&self) -> BTreeSet<&str> {
        self.rules
            .iter()
            .flat_map(|rule| rule.actions.iter().map(String::as_str))
            .collect()
    }

    // ========================================================================
    // JSON
    // ========================================================================

    /// Serializes the store as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        let document = DocumentRef {
            subjects: self.subjects.values().collect(),
            objects: self.objects.values().collect(),
            rules: &self.rules,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Decodes a store written by [`to_json`](Self::to_json).
    ///
    /// Entities are checked for the identifier invariant and for being in
    /// the right table; duplicate identifiers are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Document = serde_json::from_str(json)?;
        let mut store = Self::new();

        for (expected, entities) in [
            (EntityKind::Subject, document.subjects),
            (EntityKind::Object, document.objects),
        ] {
            for entity in entities {
                if entity.kind() != expected {
                    return Err(PolicyError::Invalid(format!(
                        "entity '{}' is a {:?} but is listed with {:?}s",
                        entity.id(),
                        entity.kind(),
                        expected
                    )));
                }
                if !entity.is_well_formed() {
                    return Err(PolicyError::Invalid(format!(
                        "entity '{}' must carry its identifier as the first and only '{}' attribute",
                        entity.id(),
                        expected.id_attribute()
                    )));
                }
                let id = entity.id().to_string();
                if store.insert_entity(entity).is_some() {
                    return Err(PolicyError::Invalid(format!(
                        "{expected:?} '{id}' appears more than once"
                    )));
                }
            }
        }

        store.rules = document.rules;
        Ok(store)
    }
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    subjects: Vec<&'a Entity>,
    objects: Vec<&'a Entity>,
    rules: &'a [Rule],
}

#[derive(Deserialize)]
struct Document {
    subjects: Vec<Entity>,
    objects: Vec<Entity>,
    rules: Vec<Rule>,
}

impl FromStr for PolicyStore {
    type Err = ParseError;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl fmt::Display for PolicyStore {
    /// Writes canonical policy text: subjects, then objects, then rules,
    /// each group separated by a blank line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: [Vec<String>; 3] = [
            self.subjects.values().map(ToString::to_string).collect(),
            self.objects.values().map(ToString::to_string).collect(),
            self.rules.iter().map(ToString::to_string).collect(),
        ];
        for (i, lines) in groups.iter().filter(|lines| !lines.is_empty()).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for line in lines {
                writeln!(f, "{line}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeValue;

    const POLICY: &str = "\
userAttrib(alice, role=manager, teams={})
resourceAttrib(doc1, owner=alice)
rule(role[{manager}]; ; {view}; uid=owner)
rule(; ; {edit view}; )
";

    #[test]
    fn test_actions_in_use() {
        let store = PolicyStore::parse(POLICY).expect("parse policy");
        assert_eq!(
            store.actions_in_use().into_iter().collect::<Vec<_>>(),
            vec!["edit", "view"]
        );
    }

    #[test]
    fn test_canonical_text() {
        let store = PolicyStore::parse(POLICY).expect("parse policy");
        assert_eq!(
            store.to_string(),
            "userAttrib(alice, role=manager, teams={})\n\
             \n\
             resourceAttrib(doc1, owner=alice)\n\
             \n\
             rule(role[{manager}]; ; {view}; uid=owner)\n\
             rule(; ; {edit view}; )\n"
        );
        let reparsed: PolicyStore = store.to_string().parse().expect("reparse policy");
        assert_eq!(reparsed, store);
    }

    #[test]
    fn test_empty_store_prints_nothing() {
        assert_eq!(PolicyStore::new().to_string(), "");
    }

    #[test]
    fn test_json_preserves_empty_set() {
        let store = PolicyStore::parse(POLICY).expect("parse policy");
        let json = store.to_json().expect("serialize store");
        let back = PolicyStore::from_json(&json).expect("deserialize store");
        assert_eq!(back, store);
        assert_eq!(
            back.subject("alice").and_then(|s| s.get_attribute("teams")),
            Some(&AttributeValue::set(Vec::<String>::new()))
        );
    }

    #[test]
    fn test_json_rejects_misplaced_entity() {
        let json = r#"{
            "subjects": [{"kind":"object","id":"doc1","attributes":[["rid","doc1"]]}],
            "objects": [],
            "rules": []
        }"#;
        assert!(matches!(
            PolicyStore::from_json(json),
            Err(PolicyError::Invalid(_))
        ));
    }

    #[test]
    fn test_json_rejects_duplicate_identifier() {
        let json = r#"{
            "subjects": [
                {"kind":"subject","id":"a","attributes":[["uid","a"]]},
                {"kind":"subject","id":"a","attributes":[["uid","a"]]}
            ],
            "objects": [],
            "rules": []
        }"#;
        assert!(matches!(
            PolicyStore::from_json(json),
            Err(PolicyError::Invalid(_))
        ));
    }

    #[test]
    fn test_json_rejects_garbage() {
        assert!(matches!(
            PolicyStore::from_json("not json"),
            Err(PolicyError::Json(_))
        ));
    }

    #[test]
    fn test_builder() {
        let store = PolicyStore::new()
            .with_entity(Entity::subject("alice"))
            .with_entity(Entity::object("doc1"))
            .with_rule(Rule::new().with_action("view"));
        assert!(store.subject("alice").is_some());
        assert!(store.object("doc1").is_some());
        assert!(store.object("alice").is_none());
        assert_eq!(store.rules().len(), 1);
    }
}
