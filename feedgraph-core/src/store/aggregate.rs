//! Snapshots of every known value.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::warn;

use super::Store;
use crate::func::Value;

impl Store {
    /// Snapshot every computation's current value, in registration order.
    ///
    /// Computations marked as changed are re-evaluated first, dependencies
    /// before dependents. A computation that fails to re-evaluate is left
    /// out of the snapshot, as is one that has never produced a value.
    ///
    /// The snapshot is best effort: writes racing with it may or may not be
    /// reflected.
    pub fn all(&self) -> IndexMap<String, Value> {
        let ordered = {
            let registry = self.registry.read();
            let dirty: Vec<String> = registry
                .records
                .values()
                .filter(|record| record.has_changes())
                .map(|record| record.name().to_owned())
                .collect();
            registry.graph.topological_order(&dirty)
        };

        let mut failed = HashSet::new();
        for name in ordered {
            let record = match self.lookup(&name) {
                Ok(record) => record,
                Err(_) => continue,
            };
            // An earlier evaluation in this pass may have settled it.
            if !record.has_changes() {
                continue;
            }
            if let Err(error) = self.merge(&name) {
                warn!(name = %name, error = %error, "omitting computation from snapshot");
                failed.insert(name);
            }
        }

        let registry = self.registry.read();
        registry
            .records
            .keys()
            .filter(|name| !failed.contains(name.as_str()))
            .filter_map(|name| {
                registry
                    .values
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }
}
