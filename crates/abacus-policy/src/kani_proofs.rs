//! Kani proofs for access decisions
//!
//! These proofs verify safety properties of the decision engine using
//! bounded model checking.
//!
//! **Proof Count**: 3 proofs
//!
//! Run with: `cargo kani --tests --harness verify_*`

#[cfg(kani)]
use crate::attributes::{AttributeValue, Entity};
#[cfg(kani)]
use crate::evaluator::{self, Effect};
#[cfg(kani)]
use crate::rule::{ConditionOperator, ConstraintOperator, RelationalConstraint, Rule, SingleCondition};
#[cfg(kani)]
use crate::store::PolicyStore;

#[cfg(kani)]
fn owner_policy() -> PolicyStore {
    PolicyStore::new()
        .with_entity(Entity::subject("alice").with_attribute("role", AttributeValue::scalar("manager")))
        .with_entity(Entity::object("doc1").with_attribute("owner", AttributeValue::scalar("alice")))
        .with_rule(
            Rule::new()
                .with_subject_condition(SingleCondition::new(
                    "role",
                    ConditionOperator::ValueInLiteralSet,
                    AttributeValue::set(["manager"]),
                ))
                .with_action("view")
                .with_constraint(RelationalConstraint::new("uid", ConstraintOperator::Equals, "owner")),
        )
}

/// Proof: Decision determinism
///
/// **Property**: Same store and request always produce the same decision
///
/// **Verification**:
/// - Evaluate the same request twice
/// - Both decisions must be identical (effect and matched rule)
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(10)]
fn verify_decision_determinism() {
    let store = owner_policy();

    let decision1 = evaluator::evaluate(&store, "alice", "doc1", "view");
    let decision2 = evaluator::evaluate(&store, "alice", "doc1", "view");

    assert_eq!(decision1.effect, decision2.effect);
    assert_eq!(decision1.matched_rule, decision2.matched_rule);
}

/// Proof: Default deny for undeclared subjects
///
/// **Property**: A request naming an undeclared subject is denied, whatever
/// the rules say
///
/// **Verification**:
/// - Add a rule with no conditions that permits `view` for everyone
/// - Request `view` for an undeclared subject
/// - Must be denied with no matched rule
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(10)]
fn verify_default_deny_safety() {
    let store = owner_policy().with_rule(Rule::new().with_action("view"));

    let decision = evaluator::evaluate(&store, "bob", "doc1", "view");

    assert_eq!(decision.effect, Effect::Deny);
    assert!(decision.matched_rule.is_none());
}

/// Proof: Rules without actions never permit
///
/// **Property**: A rule whose action set is empty matches no request
///
/// **Verification**:
/// - Store with a single condition-free rule and no actions
/// - Any action must be denied
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(10)]
fn verify_empty_action_rule_never_permits() {
    let store = PolicyStore::new()
        .with_entity(Entity::subject("alice"))
        .with_entity(Entity::object("doc1"))
        .with_rule(Rule::new());

    let action = if kani::any::<bool>() { "view" } else { "" };
    let decision = evaluator::evaluate(&store, "alice", "doc1", action);

    assert_eq!(decision.effect, Effect::Deny);
}
