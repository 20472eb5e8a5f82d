//! Attribute model for subjects and objects.
//!
//! Both kinds of entity are an identifier plus an ordered list of named
//! attributes. The identifier is stored as the first attribute (`uid` for
//! subjects, `rid` for objects) and cannot be replaced once the entity exists.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier attribute carried by every subject.
pub const SUBJECT_ID_ATTRIBUTE: &str = "uid";

/// Identifier attribute carried by every object.
pub const OBJECT_ID_ATTRIBUTE: &str = "rid";

// ============================================================================
// Attribute Value
// ============================================================================

/// The value of a single attribute: one string, or a set of strings.
///
/// A value is a `Set` exactly when its policy literal was wrapped in braces.
/// `{}` is an empty set, which is different from the attribute being absent.
///
/// Serialized untagged: a scalar is a JSON string and a set is a JSON array,
/// so the distinction survives a round-trip (including empty sets).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A single string value, e.g. `role=manager`.
    Scalar(String),
    /// A set of string values, e.g. `projects={p1 p2}`.
    Set(BTreeSet<String>),
}

impl AttributeValue {
    /// Creates a scalar value.
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    /// Creates a set value from any collection of strings.
    pub fn set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(values.into_iter().map(Into::into).collect())
    }

    /// Returns true if this value is a set.
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// Returns the scalar string, or `None` for a set.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value),
            Self::Set(_) => None,
        }
    }

    /// Returns the set members, or `None` for a scalar.
    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Scalar(_) => None,
            Self::Set(values) => Some(values),
        }
    }
}

impl fmt::Display for AttributeValue {
    /// Writes the value as a policy literal. Set members are emitted in
    /// sorted order, so the output is canonical.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => f.write_str(value),
            Self::Set(values) => {
                f.write_str("{")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    f.write_str(value)?;
                }
                f.write_str("}")
            }
        }
    }
}

// ============================================================================
// Entity Kind
// ============================================================================

/// Whether an entity is a subject (user) or an object (resource).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A user requesting access.
    Subject,
    /// A resource being accessed.
    Object,
}

impl EntityKind {
    /// Name of the identifier attribute for this kind of entity.
    pub fn id_attribute(self) -> &'static str {
        match self {
            Self::Subject => SUBJECT_ID_ATTRIBUTE,
            Self::Object => OBJECT_ID_ATTRIBUTE,
        }
    }

    /// Policy statement keyword that declares this kind of entity.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Subject => "userAttrib",
            Self::Object => "resourceAttrib",
        }
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A subject or an object with its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    kind: EntityKind,
    id: String,
    attributes: Vec<(String, AttributeValue)>,
}

impl Entity {
    /// Creates an entity whose only attribute is its identifier.
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            kind,
            attributes: vec![(
                kind.id_attribute().to_string(),
                AttributeValue::Scalar(id.clone()),
            )],
            id,
        }
    }

    /// Creates a subject with `uid` set to `id`.
    pub fn subject(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Subject, id)
    }

    /// Creates an object with `rid` set to `id`.
    pub fn object(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Object, id)
    }

    /// Adds an attribute (builder pattern). See [`Entity::add_attribute`].
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.add_attribute(key, value);
        self
    }

    /// Sets an attribute during construction.
    ///
    /// A later value for the same key replaces the earlier one in place.
    /// The identifier attribute is immutable: attempts to set it are ignored
    /// and `false` is returned.
    pub fn add_attribute(&mut self, key: impl Into<String>, value: AttributeValue) -> bool {
        let key = key.into();
        if key == self.kind.id_attribute() {
            return false;
        }
        match self.attributes.iter_mut().find(|(name, _)| *name == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key, value)),
        }
        true
    }

    /// Looks up an attribute. Absence is not an error.
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Returns true if the attribute is present.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.get_attribute(key).is_some()
    }

    /// The entity identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this is a subject or an object.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Attributes in insertion order, identifier first.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Checks the identifier invariant. Used after deserialization, where
    /// the constructor could not enforce it.
    pub(crate) fn is_well_formed(&self) -> bool {
        let id_first = matches!(
            self.attributes.first(),
            Some((name, AttributeValue::Scalar(value)))
                if name == self.kind.id_attribute() && *value == self.id
        );
        let id_once = self
            .attributes
            .iter()
            .filter(|(name, _)| name == self.kind.id_attribute())
            .count()
            == 1;
        id_first && id_once
    }
}

impl fmt::Display for Entity {
    /// Writes the entity as the policy statement that declares it.
    /// The identifier attribute is implied by the statement and not repeated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.kind.keyword(), self.id)?;
        for (name, value) in self.attributes.iter().skip(1) {
            write!(f, ", {name}={value}")?;
        }
        f.write_str(")")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_inserted_first() {
        let subject =
            Entity::subject("alice").with_attribute("role", AttributeValue::scalar("manager"));

        let names: Vec<&str> = subject.attributes().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["uid", "role"]);
        assert_eq!(
            subject.get_attribute("uid"),
            Some(&AttributeValue::scalar("alice"))
        );
    }

    #[test]
    fn test_identifier_is_immutable() {
        let mut object = Entity::object("doc1");
        assert!(!object.add_attribute("rid", AttributeValue::scalar("doc2")));
        assert_eq!(
            object.get_attribute("rid"),
            Some(&AttributeValue::scalar("doc1"))
        );
        assert!(object.is_well_formed());
    }

    #[test]
    fn test_redefined_attribute_keeps_position() {
        let subject = Entity::subject("bob")
            .with_attribute("a", AttributeValue::scalar("1"))
            .with_attribute("b", AttributeValue::scalar("2"))
            .with_attribute("a", AttributeValue::scalar("3"));

        let pairs: Vec<(&str, String)> = subject
            .attributes()
            .map(|(name, value)| (name, value.to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("uid", "bob".to_string()),
                ("a", "3".to_string()),
                ("b", "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_attribute_is_none() {
        let subject = Entity::subject("carol");
        assert!(subject.get_attribute("department").is_none());
        assert!(!subject.has_attribute("department"));
    }

    #[test]
    fn test_empty_set_is_not_absent() {
        let subject = Entity::subject("dave")
            .with_attribute("teams", AttributeValue::set(Vec::<String>::new()));
        let teams = subject.get_attribute("teams").expect("teams present");
        assert!(teams.is_set());
        assert_eq!(teams.as_set().map(BTreeSet::len), Some(0));
    }

    #[test]
    fn test_set_display_is_sorted() {
        let value = AttributeValue::set(["b", "c", "a"]);
        assert_eq!(value.to_string(), "{a b c}");
        assert_eq!(AttributeValue::set(Vec::<String>::new()).to_string(), "{}");
    }

    #[test]
    fn test_entity_display() {
        let subject = Entity::subject("alice")
            .with_attribute("role", AttributeValue::scalar("manager"))
            .with_attribute("teams", AttributeValue::set(["t2", "t1"]));
        assert_eq!(
            subject.to_string(),
            "userAttrib(alice, role=manager, teams={t1 t2})"
        );

        let object = Entity::object("doc1");
        assert_eq!(object.to_string(), "resourceAttrib(doc1)");
    }

    #[test]
    fn test_value_serialization_roundtrip() {
        for value in [
            AttributeValue::scalar("x"),
            AttributeValue::set(["a", "b"]),
            AttributeValue::set(Vec::<String>::new()),
        ] {
            let json = serde_json::to_string(&value).expect("serialize value");
            let back: AttributeValue = serde_json::from_str(&json).expect("deserialize value");
            assert_eq!(value, back);
        }
        assert_eq!(
            serde_json::to_string(&AttributeValue::set(Vec::<String>::new())).expect("serialize"),
            "[]"
        );
    }

    #[test]
    fn test_well_formed_rejects_tampered_identifier() {
        let json = r#"{"kind":"subject","id":"alice","attributes":[["uid","mallory"]]}"#;
        let entity: Entity = serde_json::from_str(json).expect("deserialize entity");
        assert!(!entity.is_well_formed());
    }
}
