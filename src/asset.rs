//! Collaborator traits the core consumes but never implements.
//!
//! The embedding application supplies concrete asset body types by
//! implementing [`AssetObject`] (the serialisation-stream + reflection
//! collaborator from the external-interfaces contract). The core only ever
//! talks to prototypes through this trait; it never knows about shaders,
//! meshes, or any other concrete asset body.

use crate::path::AssetPath;

/// How strongly a prototype references another asset, extracted by the
/// dependency-walking pass (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStrength {
    /// Keeps the referenced record loaded; blocks its deletion.
    Strong,
    /// Does not keep the referenced record loaded or block its deletion.
    Weak,
}

/// One dependency discovered while walking a prototype.
#[derive(Debug, Clone)]
pub struct DependencyRef {
    pub target: AssetPath,
    pub strength: DependencyStrength,
}

/// The serialisation-stream + reflection collaborator for one concrete
/// asset type.
///
/// Implementors are supplied by the embedding application; the core never
/// implements this trait for a concrete body type itself. `encode`/`decode`
/// are the "serialisation stream" of §6; `walk_dependencies` is the
/// dependency-walking pass of §4.8; `overlay` is the reflection
/// descriptor's "field-level copy operation" used by prototype inheritance
/// (§4.4).
pub trait AssetObject: Send + Sync + 'static {
    /// Serialises `self` to bytes understood by a matching `decode`.
    fn encode(&self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;

    /// Deserialises bytes produced by `encode` into a new prototype.
    ///
    /// Must succeed entirely or fail atomically: a partially populated
    /// prototype must never be returned.
    fn decode(bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>
    where
        Self: Sized;

    /// Extracts every path this prototype references, with its strength.
    /// Called once per successful Load/Create/Update to refresh the
    /// record's dependency edges (§4.8).
    fn walk_dependencies(&self) -> Vec<DependencyRef> {
        Vec::new()
    }

    /// Overlays `self`'s fields onto a clone of `base`, implementing the
    /// "clone parent chain then overlay child fields" step of prototype
    /// inheritance (§4.4). The default overlay simply returns a boxed
    /// clone of `self`, appropriate for asset types with no partial/diff
    /// representation.
    ///
    /// `Self: Sized` means this can't be called through a `dyn AssetObject`,
    /// which is the only way the manager ever holds a prototype — concrete
    /// types instead expose the equivalent behaviour to the manager via
    /// `TypeDescriptor::overlay` (see [`crate::registry::overlay_by_round_trip`]
    /// for the usual implementation of that function pointer).
    fn overlay(&self, _base: &dyn AssetObject) -> Box<dyn AssetObject>
    where
        Self: Sized + Clone,
    {
        Box::new(self.clone())
    }

    /// A debug-friendly short name, defaulting to the Rust type name.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
