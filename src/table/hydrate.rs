//! Hydrator dependency resolution
//!
//! Hydrators declare the hydrators they depend on by name. The declared
//! lists form a directed acyclic graph, resolved once per query into a
//! deterministic topological execution order: each round scans hydrators in
//! declaration order and emits those whose dependencies are satisfied.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Resolve the execution order for `(name, depends)` pairs, returned as
/// indices into the input slice. Unknown dependencies and cycles are errors.
pub(crate) fn execution_order(
    nodes: &[(&'static str, &'static [&'static str])],
) -> Result<Vec<usize>> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (*name, i))
        .collect();

    for (name, depends) in nodes {
        for dep in *depends {
            if !index.contains_key(dep) {
                return Err(Error::UnknownHydrator(format!("{dep} (required by {name})")));
            }
        }
    }

    let mut emitted = vec![false; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());

    while order.len() < nodes.len() {
        let before = order.len();

        for (i, (_, depends)) in nodes.iter().enumerate() {
            if emitted[i] {
                continue;
            }
            if depends.iter().all(|dep| emitted[index[dep]]) {
                emitted[i] = true;
                order.push(i);
            }
        }

        if order.len() == before {
            let stuck = nodes
                .iter()
                .enumerate()
                .find(|(i, _)| !emitted[*i])
                .map(|(_, (name, _))| *name)
                .unwrap_or_default();
            return Err(Error::HydrateCycle(stuck.to_string()));
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_hydrators_keep_declaration_order() {
        let order = execution_order(&[("a", &[]), ("b", &[]), ("c", &[])]).unwrap();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn dependency_runs_before_dependent() {
        // declaration order must not matter for correctness
        let order = execution_order(&[("inline_policies", &["inline_policy_names"]), ("inline_policy_names", &[])])
            .unwrap();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn diamond_resolves_deterministically() {
        let nodes: &[(&str, &[&str])] = &[
            ("d", &["b", "c"]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("a", &[]),
        ];
        let order = execution_order(nodes).unwrap();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let result = execution_order(&[("a", &["ghost"])]);
        assert!(matches!(result, Err(Error::UnknownHydrator(_))));
    }

    #[test]
    fn cycle_is_rejected() {
        let result = execution_order(&[("a", &["b"]), ("b", &["a"])]);
        assert!(matches!(result, Err(Error::HydrateCycle(_))));
    }
}
