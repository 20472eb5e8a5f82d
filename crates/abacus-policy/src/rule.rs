//! Authorization rules and their matching semantics.
//!
//! A rule grants access when the requested action is in its action set, every
//! subject condition holds on the subject, every object condition holds on the
//! object, and every relational constraint holds between the two.
//!
//! The single-entity conditions are deliberately lenient in two places, both
//! inherited from the policy grammar and kept for compatibility:
//!
//! - `attr[literal]` with a bare (non-set) literal is never checked.
//! - `attr]literal` against a scalar attribute is never checked.
//!
//! Relational constraints have no such leniency: any type mismatch fails.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeValue, Entity};

// ============================================================================
// Single-entity conditions
// ============================================================================

/// Operator of a condition on one entity's own attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// `attr[{v1 v2}]`: the attribute value is one of the listed literals.
    ValueInLiteralSet,
    /// `attr]literal`: the set-valued attribute contains the literal.
    LiteralInAttributeSet,
}

impl ConditionOperator {
    /// Grammar symbol for this operator.
    pub fn symbol(self) -> char {
        match self {
            Self::ValueInLiteralSet => '[',
            Self::LiteralInAttributeSet => ']',
        }
    }
}

/// A condition on a single attribute of the subject or of the object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SingleCondition {
    /// Attribute name looked up on the entity.
    pub attribute: String,
    /// How the attribute is compared with the operand.
    pub operator: ConditionOperator,
    /// Literal operand from the policy text.
    pub operand: AttributeValue,
}

impl SingleCondition {
    /// Creates a condition.
    pub fn new(
        attribute: impl Into<String>,
        operator: ConditionOperator,
        operand: AttributeValue,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            operand,
        }
    }

    /// Evaluates the condition against one entity.
    pub fn is_satisfied_by(&self, entity: &Entity) -> bool {
        let Some(value) = entity.get_attribute(&self.attribute) else {
            return false;
        };

        match (self.operator, &self.operand, value) {
            (ConditionOperator::ValueInLiteralSet, AttributeValue::Set(allowed), entity_value) => {
                match entity_value {
                    AttributeValue::Scalar(v) => allowed.contains(v),
                    AttributeValue::Set(_) => false,
                }
            }
            // Bare literal without braces: accepted without comparison.
            (ConditionOperator::ValueInLiteralSet, AttributeValue::Scalar(_), _) => true,
            (ConditionOperator::LiteralInAttributeSet, operand, AttributeValue::Set(members)) => {
                match operand {
                    AttributeValue::Scalar(literal) => members.contains(literal),
                    AttributeValue::Set(_) => false,
                }
            }
            // Scalar attribute: the containment check does not apply.
            (ConditionOperator::LiteralInAttributeSet, _, AttributeValue::Scalar(_)) => true,
        }
    }
}

impl fmt::Display for SingleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            ConditionOperator::ValueInLiteralSet => {
                write!(f, "{}[{}]", self.attribute, self.operand)
            }
            ConditionOperator::LiteralInAttributeSet => {
                write!(f, "{}]{}", self.attribute, self.operand)
            }
        }
    }
}

// ============================================================================
// Relational constraints
// ============================================================================

/// Operator comparing a subject attribute (left) with an object attribute (right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintOperator {
    /// `left=right`: identical values, same variant.
    Equals,
    /// `left>right`: both sets, left is a superset of right.
    LeftSupersetOfRight,
    /// `left]right`: left is a set containing the scalar right.
    LeftContainsRight,
    /// `left[right`: right is a set containing the scalar left.
    RightContainsLeft,
}

impl ConstraintOperator {
    /// Operators in the order the parser tries them. The first symbol found
    /// in a clause decides its operator.
    pub const PRECEDENCE: [Self; 4] = [
        Self::Equals,
        Self::LeftSupersetOfRight,
        Self::LeftContainsRight,
        Self::RightContainsLeft,
    ];

    /// Grammar symbol for this operator.
    pub fn symbol(self) -> char {
        match self {
            Self::Equals => '=',
            Self::LeftSupersetOfRight => '>',
            Self::LeftContainsRight => ']',
            Self::RightContainsLeft => '[',
        }
    }
}

/// A constraint relating a subject attribute to an object attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationalConstraint {
    /// Attribute looked up on the subject.
    pub left_attr: String,
    /// How the two values are compared.
    pub operator: ConstraintOperator,
    /// Attribute looked up on the object.
    pub right_attr: String,
}

impl RelationalConstraint {
    /// Creates a constraint.
    pub fn new(
        left_attr: impl Into<String>,
        operator: ConstraintOperator,
        right_attr: impl Into<String>,
    ) -> Self {
        Self {
            left_attr: left_attr.into(),
            operator,
            right_attr: right_attr.into(),
        }
    }

    /// Evaluates the constraint. Absent attributes and type mismatches fail.
    pub fn holds(&self, subject: &Entity, object: &Entity) -> bool {
        let (Some(left), Some(right)) = (
            subject.get_attribute(&self.left_attr),
            object.get_attribute(&self.right_attr),
        ) else {
            return false;
        };

        match (self.operator, left, right) {
            (ConstraintOperator::Equals, left, right) => left == right,
            (
                ConstraintOperator::LeftSupersetOfRight,
                AttributeValue::Set(left),
                AttributeValue::Set(right),
            ) => left.is_superset(right),
            (
                ConstraintOperator::LeftContainsRight,
                AttributeValue::Set(left),
                AttributeValue::Scalar(right),
            ) => left.contains(right),
            (
                ConstraintOperator::RightContainsLeft,
                AttributeValue::Scalar(left),
                AttributeValue::Set(right),
            ) => right.contains(left),
            (
                ConstraintOperator::LeftSupersetOfRight
                | ConstraintOperator::LeftContainsRight
                | ConstraintOperator::RightContainsLeft,
                _,
                _,
            ) => false,
        }
    }
}

impl fmt::Display for RelationalConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.left_attr,
            self.operator.symbol(),
            self.right_attr
        )
    }
}

// ============================================================================
// Rule
// ============================================================================

/// Attribute names a rule refers to, split by the entity they are read from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageAttributes {
    /// Attributes read from the subject.
    pub subject: BTreeSet<String>,
    /// Attributes read from the object.
    pub object: BTreeSet<String>,
}

/// An authorization rule. Matching any rule permits the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Conditions on the subject's own attributes.
    pub subject_conditions: Vec<SingleCondition>,
    /// Conditions on the object's own attributes.
    pub object_conditions: Vec<SingleCondition>,
    /// Actions this rule permits. Empty means the rule permits nothing.
    pub actions: BTreeSet<String>,
    /// Constraints between subject and object attributes.
    pub constraints: Vec<RelationalConstraint>,
}

impl Rule {
    /// Creates an empty rule (no conditions, no actions).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subject condition (builder pattern).
    pub fn with_subject_condition(mut self, condition: SingleCondition) -> Self {
        self.subject_conditions.push(condition);
        self
    }

    /// Adds an object condition (builder pattern).
    pub fn with_object_condition(mut self, condition: SingleCondition) -> Self {
        self.object_conditions.push(condition);
        self
    }

    /// Adds a permitted action (builder pattern).
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.insert(action.into());
        self
    }

    /// Adds a relational constraint (builder pattern).
    pub fn with_constraint(mut self, constraint: RelationalConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Returns true if `action` is in this rule's action set.
    pub fn permits_action(&self, action: &str) -> bool {
        self.actions.contains(action)
    }

    /// Returns true if every subject condition holds on `subject`.
    pub fn matches_subject(&self, subject: &Entity) -> bool {
        self.subject_conditions
            .iter()
            .all(|condition| condition.is_satisfied_by(subject))
    }

    /// Returns true if every object condition holds on `object`.
    pub fn matches_object(&self, object: &Entity) -> bool {
        self.object_conditions
            .iter()
            .all(|condition| condition.is_satisfied_by(object))
    }

    /// Returns true if every relational constraint holds for the pair.
    pub fn satisfies_constraints(&self, subject: &Entity, object: &Entity) -> bool {
        self.constraints
            .iter()
            .all(|constraint| constraint.holds(subject, object))
    }

    /// Returns true if this rule permits `subject` to perform `action` on `object`.
    pub fn matches(&self, subject: &Entity, object: &Entity, action: &str) -> bool {
        self.permits_action(action)
            && self.matches_subject(subject)
            && self.matches_object(object)
            && self.satisfies_constraints(subject, object)
    }

    fn single_action(&self) -> Option<&str> {
        match self.actions.len() {
            1 => self.actions.first().map(String::as_str),
            _ => None,
        }
    }

    /// Attribute names this rule reads, for coverage reporting.
    ///
    /// Every constraint contributes its left attribute to the subject side
    /// and its right attribute to the object side.
    pub fn coverage_attributes(&self) -> CoverageAttributes {
        let mut coverage = CoverageAttributes::default();
        for condition in &self.subject_conditions {
            coverage.subject.insert(condition.attribute.clone());
        }
        for condition in &self.object_conditions {
            coverage.object.insert(condition.attribute.clone());
        }
        for constraint in &self.constraints {
            match constraint.operator {
                ConstraintOperator::Equals
                | ConstraintOperator::LeftSupersetOfRight
                | ConstraintOperator::LeftContainsRight
                | ConstraintOperator::RightContainsLeft => {
                    coverage.subject.insert(constraint.left_attr.clone());
                    coverage.object.insert(constraint.right_attr.clone());
                }
            }
        }
        coverage
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Rule {
    /// Writes the rule as a `rule(...)` statement with all four sections.
    ///
    /// A single action is written bare, since a bare action section is taken
    /// whole (`read write` is one action). It is braced only when it starts
    /// with `{` and would otherwise read as a set literal.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("rule(")?;
        write_joined(f, &self.subject_conditions)?;
        f.write_str("; ")?;
        write_joined(f, &self.object_conditions)?;
        f.write_str("; ")?;
        match self.single_action() {
            Some(action) if !action.starts_with('{') => f.write_str(action)?,
            _ => write!(f, "{}", AttributeValue::Set(self.actions.clone()))?,
        }
        f.write_str("; ")?;
        write_joined(f, &self.constraints)?;
        f.write_str(")")
    }
}

// ============================================================================
// Tests
// ============================================================================
