//! Replacement for run-time reflection: a static registration table mapping
//! a stable type id to constructor/dependency-walker function pointers.
//!
//! The source relies on a reflection system keyed by a `Type*` pointer.
//! Here each concrete asset type is identified by [`TypeId32`], a 64-bit
//! FNV-1a hash of its fully-qualified Rust type name, computed once and
//! stored in a `&'static TypeDescriptor`.

use std::any::type_name;
use std::fmt;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over raw bytes, matching `FNV::Hash1A` exactly (xor-then-multiply
/// per byte, same offset basis and prime).
const fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// A stable identifier for a concrete asset type, derived from its
/// fully-qualified Rust type name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId32(u64);

impl TypeId32 {
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeId32(fnv1a(type_name::<T>().as_bytes()))
    }

    pub const fn from_name(name: &str) -> Self {
        TypeId32(fnv1a(name.as_bytes()))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeId32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId32({:#018x})", self.0)
    }
}

/// Everything the core needs to know about a concrete asset type without
/// depending on reflection: how to build an empty prototype, how to walk a
/// prototype's dependencies, and what name to report in diagnostics.
pub struct TypeDescriptor {
    pub id: TypeId32,
    pub name: &'static str,
    /// Produces an empty/default prototype, used as the base of a
    /// prototype-inheritance chain when there is no parent.
    pub construct_empty: fn() -> Box<dyn crate::asset::AssetObject>,
    /// Decodes bytes into a boxed prototype of this concrete type.
    ///
    /// `AssetObject::decode` can't be called through a `dyn AssetObject`
    /// (it's `Self: Sized`), so the manager — which only ever holds a
    /// `&'static TypeDescriptor`, never a static type parameter — needs
    /// this function pointer to load bytes generically. Analogous to the
    /// reflection descriptor's constructor named in §6.
    pub decode:
        fn(&[u8]) -> Result<Box<dyn crate::asset::AssetObject>, Box<dyn std::error::Error + Send + Sync>>,
    /// Overlays a child prototype's fields onto a clone of `base`,
    /// implementing prototype inheritance's "clone the parent chain then
    /// overlay" step (§4.4) for the manager, which only ever holds prototypes
    /// as `dyn AssetObject`.
    ///
    /// `AssetObject::overlay` can't be called through a `dyn AssetObject`
    /// either (same `Self: Sized` problem as `decode`), so this function
    /// pointer is the manager's only way to dispatch overlay generically;
    /// [`overlay_by_round_trip`] is the usual value for concrete types with
    /// no partial/diff representation.
    pub overlay: fn(
        child: &dyn crate::asset::AssetObject,
        base: &dyn crate::asset::AssetObject,
    ) -> Box<dyn crate::asset::AssetObject>,
}

impl TypeDescriptor {
    pub fn is(&self, id: TypeId32) -> bool {
        self.id == id
    }
}

/// The usual value for [`TypeDescriptor::overlay`]: round-trips `child`
/// through its own `encode`/`decode` and ignores `base` entirely, matching
/// `AssetObject::overlay`'s default ("return a clone of self") without
/// needing `Self: Sized` at the call site.
pub fn overlay_by_round_trip<T: crate::asset::AssetObject>(
    child: &dyn crate::asset::AssetObject,
    _base: &dyn crate::asset::AssetObject,
) -> Box<dyn crate::asset::AssetObject> {
    let bytes = child
        .encode()
        .expect("encoding a published prototype should not fail");
    let restored = T::decode(&bytes).expect("decode should round-trip what encode just produced");
    Box::new(restored)
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_known_vector() {
        // FNV-1a 64-bit of the empty string is the offset basis itself.
        assert_eq!(fnv1a(b""), FNV_OFFSET_BASIS);
    }

    #[test]
    fn type_id_is_stable_and_distinguishes_types() {
        let a = TypeId32::of::<u32>();
        let b = TypeId32::of::<u32>();
        let c = TypeId32::of::<u64>();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn from_name_matches_of_for_same_type_name() {
        let by_name = TypeId32::from_name(type_name::<u32>());
        let by_type = TypeId32::of::<u32>();
        assert_eq!(by_name, by_type);
    }
}
