//! # abacus-policy: Attribute-Based Access Control decisions
//!
//! Loads a policy written in a small rule language, answers
//! `(subject, object, action)` requests against it, and enumerates the whole
//! request space for reporting.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Policy text                                 │
//! │  userAttrib(..) resourceAttrib(..) rule(..)  │
//! └─────────────────┬───────────────────────────┘
//!                   │ loader
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  PolicyStore (immutable once built)          │
//! │  ├─ subjects by uid                          │
//! │  ├─ objects by rid                           │
//! │  └─ rules in load order                      │
//! └───────┬─────────────────────────┬───────────┘
//!         │ evaluator               │ analytics
//!         ▼                         ▼
//! ┌───────────────────┐   ┌─────────────────────────┐
//! │  Decision          │   │  Analysis                │
//! │  - Permit / Deny   │   │  - ACL                   │
//! │  - matched rule    │   │  - resource ranking      │
//! │  - reason          │   │  - rule coverage, stats  │
//! └───────────────────┘   └─────────────────────────┘
//! ```
//!
//! A request is permitted if any rule matches it; everything else, including
//! requests naming undeclared entities, is denied.
//!
//! ## Examples
//!
//! ```
//! use abacus_policy::{Effect, PolicyStore, evaluate};
//!
//! let store = PolicyStore::parse(
//!     "userAttrib(alice, role=manager)\n\
//!      resourceAttrib(doc1, owner=alice)\n\
//!      rule(role[{manager}]; ; {view}; uid=owner)\n",
//! )
//! .unwrap();
//!
//! assert_eq!(evaluate(&store, "alice", "doc1", "view").effect, Effect::Permit);
//! assert_eq!(evaluate(&store, "alice", "doc1", "edit").effect, Effect::Deny);
//! assert_eq!(evaluate(&store, "bob", "doc1", "view").effect, Effect::Deny);
//! ```

pub mod analytics;
pub mod attributes;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod rule;
pub mod store;

// Kani proofs for bounded model checking
#[cfg(any(test, kani))]
mod kani_proofs;


pub use analytics::{
    AccessTriple, Acl, AclDiff, Analysis, Analyzer, PolicyStats, ResourceCount, ResourceRanking,
    RuleCoverage,
};
pub use attributes::{AttributeValue, Entity, EntityKind};
pub use error::{ParseError, ParseErrorKind, PolicyError, QueryError, RequestError, Result};
pub use evaluator::{
    BatchEntry, Decision, Effect, Evaluator, Request, Strategy, decide, evaluate, parse_request,
};
pub use rule::{
    ConditionOperator, ConstraintOperator, CoverageAttributes, RelationalConstraint, Rule,
    SingleCondition,
};
pub use store::PolicyStore;
