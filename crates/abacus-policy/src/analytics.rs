//! Bulk enumeration over every (rule, subject, object, action).
//!
//! One scan of the request space feeds every report: the access control
//! list, per-resource access counts, per-rule attribute coverage and
//! per-rule permission counts. The scan is partitioned by object, so it can
//! run on the rayon pool and merge partial tallies afterwards.
//!
//! ```text
//! objects ──┬─ scan(o₁) ─ Tally ─┐
//!           ├─ scan(o₂) ─ Tally ─┼─ merge ─ Analysis
//!           └─ scan(oₙ) ─ Tally ─┘
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attributes::Entity;
use crate::error::RequestError;
use crate::evaluator::{Strategy, parse_request};
use crate::rule::Rule;
use crate::store::PolicyStore;

// ============================================================================
// Access control list
// ============================================================================

/// One permitted `(subject, object, action)` combination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccessTriple {
    pub subject: String,
    pub object: String,
    pub action: String,
}

impl AccessTriple {
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
        }
    }
}

/// A deduplicated, sorted set of permitted triples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acl {
    entries: BTreeSet<AccessTriple>,
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a triple. Returns false if it was already present.
    pub fn insert(&mut self, triple: AccessTriple) -> bool {
        self.entries.insert(triple)
    }

    pub fn contains(&self, subject: &str, object: &str, action: &str) -> bool {
        self.entries
            .contains(&AccessTriple::new(subject, object, action))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Triples in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &AccessTriple> {
        self.entries.iter()
    }

    /// Writes one `subject, object, action` line per triple.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for triple in &self.entries {
            writeln!(
                writer,
                "{}, {}, {}",
                triple.subject, triple.object, triple.action
            )?;
        }
        writer.flush()
    }

    /// Reads the format written by [`write_to`](Self::write_to). Blank lines
    /// and `#` comments are ignored; duplicates collapse.
    pub fn parse(text: &str) -> Result<Self, RequestError> {
        let mut acl = Self::new();
        for (i, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let request = parse_request(i + 1, trimmed)?;
            acl.insert(AccessTriple {
                subject: request.subject,
                object: request.object,
                action: request.action,
            });
        }
        Ok(acl)
    }
}

impl FromIterator<AccessTriple> for Acl {
    fn from_iter<I: IntoIterator<Item = AccessTriple>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Comparison of a reference ACL with a candidate ACL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AclDiff {
    /// Triples present in both.
    pub common: BTreeSet<AccessTriple>,
    /// Triples only the expected ACL grants.
    pub only_expected: BTreeSet<AccessTriple>,
    /// Triples only the actual ACL grants.
    pub only_actual: BTreeSet<AccessTriple>,
}

impl AclDiff {
    pub fn between(expected: &Acl, actual: &Acl) -> Self {
        Self {
            common: expected
                .entries
                .intersection(&actual.entries)
                .cloned()
                .collect(),
            only_expected: expected
                .entries
                .difference(&actual.entries)
                .cloned()
                .collect(),
            only_actual: actual
                .entries
                .difference(&expected.entries)
                .cloned()
                .collect(),
        }
    }

    /// True when neither side grants anything the other does not.
    pub fn is_exact_match(&self) -> bool {
        self.only_expected.is_empty() && self.only_actual.is_empty()
    }

    pub fn total_differences(&self) -> usize {
        self.only_expected.len() + self.only_actual.len()
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Number of matching (subject, rule, action) combinations for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceCount {
    pub object: String,
    pub count: u64,
}

/// Objects ranked by access count, highest first, ties by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResourceRanking {
    entries: Vec<ResourceCount>,
}

impl ResourceRanking {
    fn from_counts(counts: BTreeMap<&str, u64>) -> Self {
        let mut entries: Vec<ResourceCount> = counts
            .into_iter()
            .map(|(object, count)| ResourceCount {
                object: object.to_string(),
                count,
            })
            .collect();
        // Stable sort keeps the identifier order of the BTreeMap for ties.
        entries.sort_by_key(|entry| Reverse(entry.count));
        Self { entries }
    }

    /// The full ranking.
    pub fn entries(&self) -> &[ResourceCount] {
        &self.entries
    }

    /// The first `n` entries of the ranking.
    pub fn most_accessed(&self, n: usize) -> &[ResourceCount] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// The last `n` entries of the ranking, still in ranked order.
    pub fn least_accessed(&self, n: usize) -> &[ResourceCount] {
        &self.entries[self.entries.len().saturating_sub(n)..]
    }
}

/// How often each attribute a rule reads was present across its matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleCoverage {
    /// Rule index in load order.
    pub rule: usize,
    /// Number of matching (subject, object, action) tuples.
    pub matches: u64,
    /// Subject attribute name to number of matches where it was present.
    pub subject: BTreeMap<String, u64>,
    /// Object attribute name to number of matches where it was present.
    pub object: BTreeMap<String, u64>,
}

/// Summary counts for a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PolicyStats {
    pub subjects: usize,
    pub objects: usize,
    /// Distinct attribute names across all subjects, `uid` included.
    pub subject_attributes: usize,
    /// Distinct attribute names across all objects, `rid` included.
    pub object_attributes: usize,
    pub rules: usize,
    /// Size of the deduplicated ACL.
    pub permissions: usize,
}

/// Every report produced by one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    acl: Acl,
    ranking: ResourceRanking,
    coverage: Vec<RuleCoverage>,
    stats: PolicyStats,
}

impl Analysis {
    pub fn acl(&self) -> &Acl {
        &self.acl
    }

    pub fn resource_ranking(&self) -> &ResourceRanking {
        &self.ranking
    }

    /// Per-rule attribute coverage, in rule order.
    pub fn rule_coverage(&self) -> &[RuleCoverage] {
        &self.coverage
    }

    /// Per-rule number of matching (subject, object, action) tuples.
    pub fn rule_permission_counts(&self) -> Vec<u64> {
        self.coverage.iter().map(|rule| rule.matches).collect()
    }

    pub fn stats(&self) -> PolicyStats {
        self.stats
    }

    /// Consumes the analysis, keeping only the ACL.
    pub fn into_acl(self) -> Acl {
        self.acl
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Runs the bulk scan over a store.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer<'a> {
    store: &'a PolicyStore,
    strategy: Strategy,
    parallel: bool,
}

impl<'a> Analyzer<'a> {
    /// Creates an analyzer with the indexed strategy on the current thread.
    pub fn new(store: &'a PolicyStore) -> Self {
        Self {
            store,
            strategy: Strategy::default(),
            parallel: false,
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Partitions the scan by object across the rayon pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enumerates every matching request and builds all reports.
    pub fn run(&self) -> Analysis {
        let store = self.store;
        let plan = ScanPlan::new(store, self.strategy);
        let objects: Vec<&Entity> = store.objects().values().collect();
        debug!(
            strategy = %self.strategy,
            parallel = self.parallel,
            rules = store.rules().len(),
            subjects = store.subjects().len(),
            objects = objects.len(),
            actions = plan.actions_in_use.len(),
            "Starting policy scan"
        );

        let tally = if self.parallel {
            objects
                .par_iter()
                .fold(
                    || Tally::new(&plan),
                    |mut tally, &object| {
                        plan.scan_object(object, &mut tally);
                        tally
                    },
                )
                .reduce(|| Tally::new(&plan), Tally::merge)
        } else {
            let mut tally = Tally::new(&plan);
            for &object in &objects {
                plan.scan_object(object, &mut tally);
            }
            tally
        };

        let analysis = tally.finish(&plan, store);
        info!(
            permissions = analysis.stats.permissions,
            rules = analysis.stats.rules,
            "Policy scan complete"
        );
        analysis
    }
}

/// Per-rule data computed once before the scan.
struct RulePlan<'s> {
    rule: &'s Rule,
    subject_attributes: Vec<String>,
    object_attributes: Vec<String>,
    /// Subjects passing the rule's subject conditions (indexed strategy only).
    candidates: Vec<&'s Entity>,
}

struct ScanPlan<'s> {
    strategy: Strategy,
    subjects: Vec<&'s Entity>,
    actions_in_use: Vec<&'s str>,
    rules: Vec<RulePlan<'s>>,
}

impl<'s> ScanPlan<'s> {
    fn new(store: &'s PolicyStore, strategy: Strategy) -> Self {
        let subjects: Vec<&Entity> = store.subjects().values().collect();
        let rules = store
            .rules()
            .iter()
            .map(|rule| {
                let coverage = rule.coverage_attributes();
                let candidates = match strategy {
                    Strategy::Indexed if !rule.actions.is_empty() => subjects
                        .iter()
                        .copied()
                        .filter(|subject| rule.matches_subject(subject))
                        .collect(),
                    _ => Vec::new(),
                };
                RulePlan {
                    rule,
                    subject_attributes: coverage.subject.into_iter().collect(),
                    object_attributes: coverage.object.into_iter().collect(),
                    candidates,
                }
            })
            .collect();

        Self {
            strategy,
            actions_in_use: store.actions_in_use().into_iter().collect(),
            subjects,
            rules,
        }
    }

    fn scan_object(&self, object: &'s Entity, tally: &mut Tally<'s>) {
        for (index, plan) in self.rules.iter().enumerate() {
            match self.strategy {
                Strategy::BruteForce => {
                    for &subject in &self.subjects {
                        for &action in &self.actions_in_use {
                            if plan.rule.matches(subject, object, action) {
                                tally.record(index, plan, subject, object, action);
                            }
                        }
                    }
                }
                Strategy::Indexed => {
                    let rule = plan.rule;
                    if !rule.matches_object(object) {
                        continue;
                    }
                    for &subject in &plan.candidates {
                        if !rule.satisfies_constraints(subject, object) {
                            continue;
                        }
                        for action in &rule.actions {
                            tally.record(index, plan, subject, object, action);
                        }
                    }
                }
            }
        }
    }
}

/// Partial counts for a subset of objects.
struct Tally<'s> {
    acl: BTreeSet<(&'s str, &'s str, &'s str)>,
    object_counts: BTreeMap<&'s str, u64>,
    rule_matches: Vec<u64>,
    subject_presence: Vec<Vec<u64>>,
    object_presence: Vec<Vec<u64>>,
}

impl<'s> Tally<'s> {
    fn new(plan: &ScanPlan<'s>) -> Self {
        Self {
            acl: BTreeSet::new(),
            object_counts: BTreeMap::new(),
            rule_matches: vec![0; plan.rules.len()],
            subject_presence: plan
                .rules
                .iter()
                .map(|rule| vec![0; rule.subject_attributes.len()])
                .collect(),
            object_presence: plan
                .rules
                .iter()
                .map(|rule| vec![0; rule.object_attributes.len()])
                .collect(),
        }
    }

    fn record(
        &mut self,
        index: usize,
        plan: &RulePlan<'s>,
        subject: &'s Entity,
        object: &'s Entity,
        action: &'s str,
    ) {
        self.acl.insert((subject.id(), object.id(), action));
        *self.object_counts.entry(object.id()).or_default() += 1;
        self.rule_matches[index] += 1;
        for (count, name) in self.subject_presence[index]
            .iter_mut()
            .zip(&plan.subject_attributes)
        {
            if subject.has_attribute(name) {
                *count += 1;
            }
        }
        for (count, name) in self.object_presence[index]
            .iter_mut()
            .zip(&plan.object_attributes)
        {
            if object.has_attribute(name) {
                *count += 1;
            }
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.acl.extend(other.acl);
        for (object, count) in other.object_counts {
            *self.object_counts.entry(object).or_default() += count;
        }
        add_into(&mut self.rule_matches, &other.rule_matches);
        for (mine, theirs) in self.subject_presence.iter_mut().zip(&other.subject_presence) {
            add_into(mine, theirs);
        }
        for (mine, theirs) in self.object_presence.iter_mut().zip(&other.object_presence) {
            add_into(mine, theirs);
        }
        self
    }

    fn finish(mut self, plan: &ScanPlan<'s>, store: &'s PolicyStore) -> Analysis {
        for id in store.objects().keys() {
            self.object_counts.entry(id.as_str()).or_default();
        }

        let acl: Acl = self
            .acl
            .into_iter()
            .map(|(subject, object, action)| AccessTriple::new(subject, object, action))
            .collect();

        let coverage = plan
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| RuleCoverage {
                rule: index,
                matches: self.rule_matches[index],
                subject: rule
                    .subject_attributes
                    .iter()
                    .cloned()
                    .zip(self.subject_presence[index].iter().copied())
                    .collect(),
                object: rule
                    .object_attributes
                    .iter()
                    .cloned()
                    .zip(self.object_presence[index].iter().copied())
                    .collect(),
            })
            .collect();

        let stats = PolicyStats {
            subjects: store.subjects().len(),
            objects: store.objects().len(),
            subject_attributes: distinct_attribute_names(store.subjects().values()),
            object_attributes: distinct_attribute_names(store.objects().values()),
            rules: store.rules().len(),
            permissions: acl.len(),
        };

        Analysis {
            acl,
            ranking: ResourceRanking::from_counts(self.object_counts),
            coverage,
            stats,
        }
    }
}

fn add_into(target: &mut [u64], source: &[u64]) {
    for (t, s) in target.iter_mut().zip(source) {
        *t += s;
    }
}

fn distinct_attribute_names<'e>(entities: impl Iterator<Item = &'e Entity>) -> usize {
    entities
        .flat_map(|entity| entity.attributes().map(|(name, _)| name))
        .collect::<BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELPDESK: &str = "\
userAttrib(tech1, position=technician)
userAttrib(mgr, position=manager, managedStaff={tech1 tech2})
userAttrib(op, position=helpdeskOperator)
resourceAttrib(t1, assignedTechnician=tech1, tags={urgent})
resourceAttrib(t2, assignedTechnician=tech2)
resourceAttrib(t3)
rule(position[{technician}]; ; {read update}; uid=assignedTechnician)
rule(position[{manager}]; ; {read}; managedStaff]assignedTechnician)
rule(position[{manager}]; ; {read}; managedStaff]assignedTechnician)
";

    fn analysis(strategy: Strategy, parallel: bool) -> Analysis {
        let store = PolicyStore::parse(HELPDESK).expect("parse policy");
        Analyzer::new(&store)
            .with_strategy(strategy)
            .with_parallel(parallel)
            .run()
    }

    #[test]
    fn test_acl_deduplicates_duplicate_rules() {
        let analysis = analysis(Strategy::BruteForce, false);
        let acl: Vec<String> = analysis
            .acl()
            .iter()
            .map(|t| format!("{},{},{}", t.subject, t.object, t.action))
            .collect();
        assert_eq!(
            acl,
            vec![
                "mgr,t1,read",
                "mgr,t2,read",
                "tech1,t1,read",
                "tech1,t1,update",
            ]
        );
    }

    #[test]
    fn test_resource_counts_include_unreached_objects() {
        let analysis = analysis(Strategy::Indexed, false);
        let ranking: Vec<(&str, u64)> = analysis
            .resource_ranking()
            .entries()
            .iter()
            .map(|entry| (entry.object.as_str(), entry.count))
            .collect();
        // t1: tech1 x2 actions, mgr x2 duplicate rules. t2: mgr x2.
        assert_eq!(ranking, vec![("t1", 4), ("t2", 2), ("t3", 0)]);
    }

    #[test]
    fn test_ranking_slices() {
        let analysis = analysis(Strategy::Indexed, false);
        let ranking = analysis.resource_ranking();
        assert_eq!(ranking.most_accessed(1)[0].object, "t1");
        assert_eq!(ranking.least_accessed(1)[0].object, "t3");
        assert_eq!(ranking.most_accessed(10).len(), 3);
        assert_eq!(ranking.least_accessed(10).len(), 3);
        assert!(ranking.most_accessed(0).is_empty());
    }

    #[test]
    fn test_rule_coverage() {
        let analysis = analysis(Strategy::BruteForce, false);
        let coverage = &analysis.rule_coverage()[0];
        assert_eq!(coverage.matches, 2);
        assert_eq!(
            coverage.subject,
            BTreeMap::from([("position".to_string(), 2), ("uid".to_string(), 2)])
        );
        assert_eq!(
            coverage.object,
            BTreeMap::from([("assignedTechnician".to_string(), 2)])
        );
        assert_eq!(analysis.rule_permission_counts(), vec![2, 2, 2]);
    }

    #[test]
    fn test_stats() {
        let stats = analysis(Strategy::Indexed, true).stats();
        assert_eq!(
            stats,
            PolicyStats {
                subjects: 3,
                objects: 3,
                subject_attributes: 3,
                object_attributes: 3,
                rules: 3,
                permissions: 4,
            }
        );
    }

    #[test]
    fn test_strategies_agree() {
        let baseline = analysis(Strategy::BruteForce, false);
        for (strategy, parallel) in [
            (Strategy::BruteForce, true),
            (Strategy::Indexed, false),
            (Strategy::Indexed, true),
        ] {
            assert_eq!(analysis(strategy, parallel), baseline);
        }
    }

    #[test]
    fn test_empty_action_rule_contributes_nothing() {
        let store = PolicyStore::parse("userAttrib(a)\nresourceAttrib(o)\nrule(;;;)").expect("parse");
        let analysis = Analyzer::new(&store).run();
        assert!(analysis.acl().is_empty());
        assert_eq!(analysis.rule_permission_counts(), vec![0]);
    }

    #[test]
    fn test_acl_file_format() {
        let acl: Acl = [
            AccessTriple::new("b", "o", "read"),
            AccessTriple::new("a", "o", "read"),
            AccessTriple::new("a", "o", "read"),
        ]
        .into_iter()
        .collect();

        let mut out = Vec::new();
        acl.write_to(&mut out).expect("write acl");
        let text = String::from_utf8(out).expect("utf-8");
        assert_eq!(text, "a, o, read\nb, o, read\n");
        assert_eq!(Acl::parse(&text).expect("parse acl"), acl);
    }

    #[test]
    fn test_acl_parse_rejects_malformed_line() {
        let err = Acl::parse("a, o, read\n\na, o\n").expect_err("malformed line");
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_acl_diff() {
        let expected: Acl = [
            AccessTriple::new("a", "o", "read"),
            AccessTriple::new("a", "o", "write"),
        ]
        .into_iter()
        .collect();
        let actual: Acl = [
            AccessTriple::new("a", "o", "read"),
            AccessTriple::new("b", "o", "read"),
        ]
        .into_iter()
        .collect();

        let diff = AclDiff::between(&expected, &actual);
        assert_eq!(diff.common.len(), 1);
        assert!(diff.only_expected.contains(&AccessTriple::new("a", "o", "write")));
        assert!(diff.only_actual.contains(&AccessTriple::new("b", "o", "read")));
        assert_eq!(diff.total_differences(), 2);
        assert!(!diff.is_exact_match());
        assert!(AclDiff::between(&expected, &expected).is_exact_match());
    }
}
