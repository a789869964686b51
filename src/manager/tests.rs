use std::time::Duration;

use super::*;
use crate::asset::{DependencyRef, DependencyStrength};

#[derive(Clone, Debug, PartialEq, Eq)]
struct Counter(u32);

impl AssetObject for Counter {
    fn encode(&self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.0.to_le_bytes().to_vec())
    }

    fn decode(bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if bytes.len() != 4 {
            return Err("wrong length".into());
        }
        Ok(Counter(u32::from_le_bytes(bytes.try_into().unwrap())))
    }
}

static COUNTER_TYPE: TypeDescriptor = TypeDescriptor {
    id: crate::registry::TypeId32::from_name("manager::tests::Counter"),
    name: "manager::tests::Counter",
    construct_empty: || Box::new(Counter(0)),
    decode: |bytes| Counter::decode(bytes).map(|c| Box::new(c) as Box<dyn AssetObject>),
    overlay: crate::registry::overlay_by_round_trip::<Counter>,
};

#[derive(Clone, Debug, PartialEq, Eq)]
struct Linker {
    target: AssetPath,
    strength: DependencyStrength,
}

impl AssetObject for Linker {
    fn encode(&self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.target.as_str().as_bytes().to_vec())
    }

    fn decode(_bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Err("not needed in tests".into())
    }

    fn walk_dependencies(&self) -> Vec<DependencyRef> {
        vec![DependencyRef {
            target: self.target.clone(),
            strength: self.strength,
        }]
    }
}

static LINKER_TYPE: TypeDescriptor = TypeDescriptor {
    id: crate::registry::TypeId32::from_name("manager::tests::Linker"),
    name: "manager::tests::Linker",
    construct_empty: || {
        Box::new(Linker {
            target: AssetPath::new(""),
            strength: DependencyStrength::Weak,
        })
    },
    decode: |_| Err("not needed in tests".into()),
    overlay: crate::registry::overlay_by_round_trip::<Linker>,
};

/// A type with a genuine partial/diff representation: unset fields fall
/// through to the parent's value, exercising `instantiate`'s overlay fold
/// beyond the round-trip-clone default the other fixtures here use.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Layer {
    a: Option<i32>,
    b: Option<i32>,
}

impl AssetObject for Layer {
    fn encode(&self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let mut bytes = Vec::with_capacity(10);
        bytes.push(self.a.is_some() as u8);
        bytes.extend_from_slice(&self.a.unwrap_or(0).to_le_bytes());
        bytes.push(self.b.is_some() as u8);
        bytes.extend_from_slice(&self.b.unwrap_or(0).to_le_bytes());
        Ok(bytes)
    }

    fn decode(bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if bytes.len() != 10 {
            return Err("wrong length".into());
        }
        let a = (bytes[0] != 0).then(|| i32::from_le_bytes(bytes[1..5].try_into().unwrap()));
        let b = (bytes[5] != 0).then(|| i32::from_le_bytes(bytes[6..10].try_into().unwrap()));
        Ok(Layer { a, b })
    }
}

static LAYER_TYPE: TypeDescriptor = TypeDescriptor {
    id: crate::registry::TypeId32::from_name("manager::tests::Layer"),
    name: "manager::tests::Layer",
    construct_empty: || Box::new(Layer { a: None, b: None }),
    decode: |bytes| Layer::decode(bytes).map(|l| Box::new(l) as Box<dyn AssetObject>),
    overlay: |child, base| {
        let child = Layer::decode(&child.encode().expect("encode a published prototype")).expect("decode");
        let base = Layer::decode(&base.encode().expect("encode a published prototype")).expect("decode");
        Box::new(Layer {
            a: child.a.or(base.a),
            b: child.b.or(base.b),
        })
    },
};

fn test_manager() -> (AssetManager, tempfile::TempDir, tempfile::TempDir) {
    let _ = env_logger::try_init();
    let source_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let manager = AssetManager::new(ManagerConfig {
        source_root: source_dir.path().to_owned(),
        cache_root: cache_dir.path().to_owned(),
        dispatch_capacity: 16,
        op_timeout: Some(Duration::from_secs(5)),
    });
    (manager, source_dir, cache_dir)
}

/// Submits `create`, drains the op controller, and returns the settled
/// result — tests run single-threaded, so nothing else drains the queue
/// between submission and `wait()`.
fn create_and_settle(
    manager: &AssetManager,
    path: &AssetPath,
    concrete_type: &'static TypeDescriptor,
    prototype: Box<dyn AssetObject>,
) -> Result<(), OpError> {
    let promise = manager.create(path, concrete_type, prototype, None);
    manager.update();
    promise.wait()
}

#[test]
fn create_then_load_round_trips_through_cache() {
    let (manager, _source_dir, _cache_dir) = test_manager();
    let path = AssetPath::new("engine//counters/a.bin");

    create_and_settle(&manager, &path, &COUNTER_TYPE, Box::new(Counter(7))).unwrap();

    let record = manager.find_type(&path).unwrap();
    assert_eq!(record.load_state(), LoadState::Loaded);

    let save_promise = manager.save_domain_cache("engine");
    manager.update();
    save_promise.wait().unwrap();

    let handle = manager.acquire_strong(&path, Some(&COUNTER_TYPE), LoadFlags::default());
    assert!(!handle.is_null());
}

#[test]
fn import_reads_existing_source_bytes() {
    let (manager, source_dir, _cache_dir) = test_manager();
    let path = AssetPath::new("engine//counters/b.bin");

    std::fs::create_dir_all(source_dir.path().join("engine/counters")).unwrap();
    std::fs::write(
        source_dir.path().join("engine/counters/b.bin"),
        42u32.to_le_bytes(),
    )
    .unwrap();

    let promise = manager.import(&path, &COUNTER_TYPE);
    manager.update();
    promise.wait().unwrap();

    let record = manager.find_type(&path).unwrap();
    assert_eq!(record.load_state(), LoadState::Loaded);
    let prototype = record.handle().prototype().unwrap();
    assert_eq!(prototype.type_name(), std::any::type_name::<Counter>());
}

#[test]
fn import_missing_source_rejects_not_found() {
    let (manager, _source_dir, _cache_dir) = test_manager();
    let path = AssetPath::new("engine//counters/missing.bin");
    let promise = manager.import(&path, &COUNTER_TYPE);
    manager.update();
    assert!(matches!(promise.wait(), Err(OpError::NotFound(_))));
}

#[test]
fn delete_refuses_while_strong_handle_outstanding() {
    let (manager, _source_dir, _cache_dir) = test_manager();
    let path = AssetPath::new("engine//counters/c.bin");

    create_and_settle(&manager, &path, &COUNTER_TYPE, Box::new(Counter(1))).unwrap();

    let handle = manager.acquire_strong(&path, Some(&COUNTER_TYPE), LoadFlags::default());
    assert!(!handle.is_null());

    let promise = manager.delete(&path);
    manager.update();
    assert!(matches!(promise.wait(), Err(OpError::InvalidParent(_))));

    drop(handle);
}

#[test]
fn delete_succeeds_once_refcount_reaches_zero() {
    let (manager, _source_dir, _cache_dir) = test_manager();
    let path = AssetPath::new("engine//counters/d.bin");

    create_and_settle(&manager, &path, &COUNTER_TYPE, Box::new(Counter(1))).unwrap();

    let promise = manager.delete(&path);
    manager.update();
    promise.wait().unwrap();

    assert!(manager.find_type(&path).is_none());
}

#[test]
fn acquire_strong_returns_null_handle_for_unknown_path() {
    let (manager, _source_dir, _cache_dir) = test_manager();
    let handle = manager.acquire_strong(
        &AssetPath::new("engine//nothing.bin"),
        Some(&COUNTER_TYPE),
        LoadFlags::default(),
    );
    assert!(handle.is_null());
}

#[test]
fn acquire_strong_returns_null_handle_for_wrong_concrete_type() {
    let (manager, _source_dir, _cache_dir) = test_manager();
    let path = AssetPath::new("engine//counters/e.bin");
    create_and_settle(&manager, &path, &COUNTER_TYPE, Box::new(Counter(1))).unwrap();

    let handle = manager.acquire_strong(&path, Some(&LINKER_TYPE), LoadFlags::default());
    assert!(handle.is_null());
}

#[test]
fn add_dependency_blocks_delete_until_removed() {
    let (manager, _source_dir, _cache_dir) = test_manager();
    let target_path = AssetPath::new("engine//counters/target.bin");
    let dependant_path = AssetPath::new("engine//counters/dependant.bin");

    create_and_settle(&manager, &target_path, &COUNTER_TYPE, Box::new(Counter(1))).unwrap();
    create_and_settle(&manager, &dependant_path, &COUNTER_TYPE, Box::new(Counter(2))).unwrap();

    let target = manager.find_type(&target_path).unwrap();
    let dependant = manager.find_type(&dependant_path).unwrap();

    assert!(manager.add_dependency(&dependant, &target, false));

    let refused = manager.delete(&target_path);
    manager.update();
    assert!(matches!(refused.wait(), Err(OpError::InvalidParent(_))));

    assert!(manager.remove_dependency(&dependant, &target, false));

    let allowed = manager.delete(&target_path);
    manager.update();
    allowed.wait().unwrap();
    assert!(manager.find_type(&target_path).is_none());
}

#[test]
fn create_walks_dependencies_and_sets_in_edge_count() {
    let (manager, _source_dir, _cache_dir) = test_manager();
    let target_path = AssetPath::new("engine//counters/linked_target.bin");
    let linker_path = AssetPath::new("engine//linkers/a.bin");

    create_and_settle(&manager, &target_path, &COUNTER_TYPE, Box::new(Counter(1))).unwrap();

    create_and_settle(
        &manager,
        &linker_path,
        &LINKER_TYPE,
        Box::new(Linker {
            target: target_path.clone(),
            strength: DependencyStrength::Strong,
        }),
    )
    .unwrap();

    let target = manager.find_type(&target_path).unwrap();
    assert_eq!(target.dep_strong_in(), 1);
    assert!(!target.can_delete());
}

#[test]
fn instantiate_overlays_parent_chain_root_first() {
    let (manager, _source_dir, _cache_dir) = test_manager();
    let root_path = AssetPath::new("engine//layers/root.bin");
    let mid_path = AssetPath::new("engine//layers/mid.bin");
    let leaf_path = AssetPath::new("engine//layers/leaf.bin");

    create_and_settle(
        &manager,
        &root_path,
        &LAYER_TYPE,
        Box::new(Layer {
            a: Some(1),
            b: Some(2),
        }),
    )
    .unwrap();
    let root = manager.find_type(&root_path).unwrap();

    let mid_promise = manager.create(
        &mid_path,
        &LAYER_TYPE,
        Box::new(Layer { a: None, b: Some(20) }),
        Some(root),
    );
    manager.update();
    mid_promise.wait().unwrap();
    let mid = manager.find_type(&mid_path).unwrap();

    let leaf_promise = manager.create(
        &leaf_path,
        &LAYER_TYPE,
        Box::new(Layer {
            a: Some(100),
            b: None,
        }),
        Some(mid),
    );
    manager.update();
    leaf_promise.wait().unwrap();

    let instance = manager.instantiate(&leaf_path).unwrap();
    let decoded = Layer::decode(&instance.encode().unwrap()).unwrap();
    assert_eq!(
        decoded,
        Layer {
            a: Some(100),
            b: Some(20),
        }
    );

    let leaf_record = manager.find_type(&leaf_path).unwrap();
    assert_eq!(leaf_record.live_instances().len(), 1);
}

#[test]
fn instantiate_with_no_parent_is_just_the_prototype() {
    let (manager, _source_dir, _cache_dir) = test_manager();
    let path = AssetPath::new("engine//layers/only.bin");
    create_and_settle(
        &manager,
        &path,
        &LAYER_TYPE,
        Box::new(Layer {
            a: Some(5),
            b: None,
        }),
    )
    .unwrap();

    let instance = manager.instantiate(&path).unwrap();
    let decoded = Layer::decode(&instance.encode().unwrap()).unwrap();
    assert_eq!(
        decoded,
        Layer {
            a: Some(5),
            b: None,
        }
    );
}

#[test]
fn instantiate_missing_path_is_not_found() {
    let (manager, _source_dir, _cache_dir) = test_manager();
    let path = AssetPath::new("engine//layers/missing.bin");
    assert!(matches!(
        manager.instantiate(&path),
        Err(OpError::NotFound(_))
    ));
}
