//! Startup ordering: dependencies first, then priority.

use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::config::ServiceConfig;

/// Compute the startup order for a set of services.
///
/// Kahn's algorithm over the dependency graph; among services whose
/// dependencies are all satisfied, lower priority ordinal starts first,
/// with the name as a stable tiebreak. Dependencies on names not in the
/// set are ignored (they may belong to services registered later).
///
/// A dependency cycle is a configuration defect, not a reason to abort
/// startup: the acyclic portion is ordered normally and the cyclic
/// remainder is appended in priority order with a warning.
pub fn startup_order(configs: &[ServiceConfig]) -> Vec<String> {
    let known: HashSet<&str> = configs.iter().map(|c| c.name.as_str()).collect();

    // Remaining unsatisfied dependencies per service
    let mut pending: HashMap<&str, HashSet<&str>> = configs
        .iter()
        .map(|c| {
            let deps: HashSet<&str> = c
                .dependencies
                .iter()
                .map(String::as_str)
                .filter(|d| known.contains(d))
                .collect();
            (c.name.as_str(), deps)
        })
        .collect();
    let by_name: HashMap<&str, &ServiceConfig> =
        configs.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut order = Vec::with_capacity(configs.len());
    while !pending.is_empty() {
        let mut ready: Vec<&str> = pending
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(name, _)| *name)
            .collect();

        if ready.is_empty() {
            // Cycle: everything left depends on something left
            let mut remainder: Vec<&str> = pending.keys().copied().collect();
            remainder.sort_by_key(|name| (by_name[name].priority.ordinal(), *name));
            warn!(
                "Dependency cycle among services {:?}; appending in priority order",
                remainder
            );
            for name in remainder {
                order.push(name.to_string());
            }
            break;
        }

        ready.sort_by_key(|name| (by_name[name].priority.ordinal(), *name));
        for name in ready {
            order.push(name.to_string());
            pending.remove(name);
            for deps in pending.values_mut() {
                deps.remove(name);
            }
        }
    }

    order
}
