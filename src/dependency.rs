//! Dependency Tracking (C8): per-type strong/weak in/out edges.
//!
//! Out-edges live on the [`TypeRecord`] itself (`out_edges`/`set_out_edges`);
//! in-edge counts are two atomic counters on the *target* record. This
//! module is the diffing step that keeps both in sync whenever a record's
//! dependency-walking pass produces a new out-edge list.

use std::sync::Arc;

use crate::asset::DependencyRef;
use crate::record::TypeRecord;

/// Replaces `record`'s out-edges with `new_edges`, incrementing/decrementing
/// in-edge counters on resolved targets so they stay consistent with the
/// new edge set. Targets that don't currently resolve (not yet loaded, or
/// outside the domain) are recorded as out-edges but contribute no in-edge
/// adjustment until they do resolve.
pub fn update_dependencies(
    record: &Arc<TypeRecord>,
    new_edges: Vec<DependencyRef>,
    resolve: impl Fn(&crate::path::AssetPath) -> Option<Arc<TypeRecord>>,
) {
    let old_edges = record.out_edges();

    for old in &old_edges {
        let still_present = new_edges
            .iter()
            .any(|n| n.target == old.target && n.strength == old.strength);
        if !still_present {
            if let Some(target) = resolve(&old.target) {
                target.dec_dep_in(old.strength);
            }
        }
    }

    for new in &new_edges {
        let was_present = old_edges
            .iter()
            .any(|o| o.target == new.target && o.strength == new.strength);
        if !was_present {
            if let Some(target) = resolve(&new.target) {
                target.inc_dep_in(new.strength);
            }
        }
    }

    record.set_out_edges(new_edges);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetObject, DependencyStrength};
    use crate::path::AssetPath;
    use crate::registry::TypeDescriptor;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone, Debug)]
    struct Dummy;
    impl AssetObject for Dummy {
        fn encode(&self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(Vec::new())
        }
        fn decode(_bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
            Ok(Dummy)
        }
    }

    static DUMMY_TYPE: TypeDescriptor = TypeDescriptor {
        id: crate::registry::TypeId32::from_name("dependency::tests::Dummy"),
        name: "dependency::tests::Dummy",
        construct_empty: || Box::new(Dummy),
        decode: |_| Ok(Box::new(Dummy)),
        overlay: crate::registry::overlay_by_round_trip::<Dummy>,
    };

    #[test]
    fn adding_and_removing_edges_updates_in_edge_counts() {
        let a = TypeRecord::new(AssetPath::new("engine//a.obj"), &DUMMY_TYPE);
        let b = TypeRecord::new(AssetPath::new("engine//b.obj"), &DUMMY_TYPE);
        let c = TypeRecord::new(AssetPath::new("engine//c.obj"), &DUMMY_TYPE);

        let registry: Mutex<HashMap<String, Arc<TypeRecord>>> = Mutex::new(
            [
                (b.path().as_str().to_string(), b.clone()),
                (c.path().as_str().to_string(), c.clone()),
            ]
            .into_iter()
            .collect(),
        );
        let resolve = |p: &AssetPath| registry.lock().unwrap().get(p.as_str()).cloned();

        update_dependencies(
            &a,
            vec![DependencyRef {
                target: AssetPath::new("engine//b.obj"),
                strength: DependencyStrength::Strong,
            }],
            resolve,
        );
        assert_eq!(b.dep_strong_in(), 1);
        assert_eq!(c.dep_strong_in(), 0);

        update_dependencies(
            &a,
            vec![DependencyRef {
                target: AssetPath::new("engine//c.obj"),
                strength: DependencyStrength::Weak,
            }],
            resolve,
        );
        assert_eq!(b.dep_strong_in(), 0);
        assert_eq!(c.dep_weak_in(), 1);
    }
}
