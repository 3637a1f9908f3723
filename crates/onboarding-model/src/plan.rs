//! Service-set planning
//!
//! Computes which services to attach and detach to move a resource from its
//! current service set to a desired one.

use crate::service::DesiredServiceSpec;
use std::collections::{BTreeMap, BTreeSet};

/// The add/remove diff for one reconciliation.
///
/// `to_add` never names a service that is already attached and `to_remove`
/// never names a desired service. A plan is computed, applied once and then
/// dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    /// Desired services missing from the current set
    pub to_add: Vec<DesiredServiceSpec>,

    /// Attached services missing from the desired set
    pub to_remove: Vec<String>,
}

impl ReconciliationPlan {
    /// Diff the current service names against the desired specs.
    ///
    /// Duplicate current names are treated as one. Duplicate desired names
    /// collapse to the last spec given. Output order is not part of the
    /// contract.
    pub fn compute<I, S>(current: I, desired: &[DesiredServiceSpec]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let current: BTreeSet<String> = current.into_iter().map(Into::into).collect();

        let mut wanted: BTreeMap<&str, &DesiredServiceSpec> = BTreeMap::new();
        for spec in desired {
            wanted.insert(spec.service_name.as_str(), spec);
        }

        let to_add = wanted
            .iter()
            .filter(|(name, _)| !current.contains(**name))
            .map(|(_, spec)| (*spec).clone())
            .collect();

        let to_remove = current
            .into_iter()
            .filter(|name| !wanted.contains_key(name.as_str()))
            .collect();

        Self { to_add, to_remove }
    }

    /// Whether the resource is already converged.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Names of the services to add.
    pub fn added_names(&self) -> Vec<&str> {
        self.to_add.iter().map(|s| s.service_name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn specs(names: &[&str]) -> Vec<DesiredServiceSpec> {
        names.iter().map(|n| DesiredServiceSpec::new(*n)).collect()
    }

    fn set<'a>(names: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
        names.into_iter().map(str::to_string).collect()
    }

    #[test]
    fn test_swap_one_service() {
        let plan = ReconciliationPlan::compute(["A", "B"], &specs(&["B", "C"]));

        assert_eq!(set(plan.added_names()), set(["C"]));
        assert_eq!(set(plan.to_remove.iter().map(String::as_str)), set(["A"]));
    }

    #[test]
    fn test_empty_current_adds_everything() {
        let plan = ReconciliationPlan::compute(Vec::<String>::new(), &specs(&["A", "B"]));

        assert_eq!(set(plan.added_names()), set(["A", "B"]));
        assert!(plan.to_remove.is_empty());
    }

    #[test]
    fn test_empty_desired_removes_everything() {
        let plan = ReconciliationPlan::compute(["A", "B", "C"], &[]);

        assert!(plan.to_add.is_empty());
        assert_eq!(
            set(plan.to_remove.iter().map(String::as_str)),
            set(["A", "B", "C"])
        );
    }

    #[test]
    fn test_identical_sets_give_empty_plan() {
        let plan = ReconciliationPlan::compute(["B", "A", "A"], &specs(&["A", "B"]));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_duplicate_desired_last_write_wins() {
        let desired = vec![
            DesiredServiceSpec::new("A").with_config("tier", "basic"),
            DesiredServiceSpec::new("A").with_config("tier", "full"),
        ];
        let plan = ReconciliationPlan::compute(Vec::<String>::new(), &desired);

        assert_eq!(plan.to_add.len(), 1);
        assert_eq!(plan.to_add[0].resource_config["tier"], "full");
    }

    #[test]
    fn test_plan_is_disjoint_for_all_subsets() {
        let universe = ["A", "B", "C", "D"];
        let subset = |mask: u32| -> Vec<&str> {
            universe
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, n)| *n)
                .collect()
        };

        for current_mask in 0..16 {
            for desired_mask in 0..16 {
                let current = subset(current_mask);
                let desired = subset(desired_mask);
                let plan = ReconciliationPlan::compute(current.clone(), &specs(&desired));

                let current = set(current);
                let desired = set(desired);
                let added = set(plan.added_names());
                let removed = set(plan.to_remove.iter().map(String::as_str));

                assert!(added.is_disjoint(&current));
                assert!(removed.is_disjoint(&desired));
                assert_eq!(added, &desired - &current);
                assert_eq!(removed, &current - &desired);
                assert_eq!(plan.is_empty(), current == desired);
            }
        }
    }
}
