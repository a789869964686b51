//! Content-addressed, reference-counted asset management core.
//!
//! This crate implements the storage and bookkeeping side of an asset
//! pipeline: an editable source tree of per-asset files, a packed binary
//! cache derived from it, and a reference-counted, concurrently-accessed
//! in-memory record for every known asset. It does not itself decide what
//! an "asset" looks like on disk beyond bytes in, bytes out — callers
//! implement [`AssetObject`] for their own concrete types and register a
//! [`TypeDescriptor`] so the core can construct and decode them.
//!
//! ## Shape
//!
//! - [`AssetPath`] names an asset (`domain//scope/scope/name`, case
//!   insensitive).
//! - [`TypeRecord`] is the one live record a path resolves to: load state,
//!   reference counts, dependency edges, and a [`Handle`] to the current
//!   published instance.
//! - [`DomainMap`] is the sharded per-domain path → record table.
//! - [`source`] and [`cache`] are the two on-disk representations; an
//!   [`op`] operation moves a record between them.
//! - [`AssetManager`] ties all of the above into the single entry point
//!   embedding applications use: `create`, `import`, `load`, `delete`,
//!   `save_domain`, `save_domain_cache`, `acquire_strong`/`acquire_weak`.
//!
//! ## Cargo features
//!
//! - `ahash`: use the `ahash` algorithm for the domain maps and type
//!   registry instead of the standard library's SipHash. Enabled by
//!   default; disabling it falls back to `std`'s `RandomState`.
//!
//! ## Example
//!
//! ```
//! use asset_core::{AssetManager, ManagerConfig, AssetObject, TypeDescriptor, AssetPath};
//!
//! #[derive(Clone, Debug)]
//! struct Point { x: i32, y: i32 }
//!
//! impl AssetObject for Point {
//!     fn encode(&self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
//!         Ok([self.x.to_le_bytes(), self.y.to_le_bytes()].concat())
//!     }
//!
//!     fn decode(bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
//!         let x = i32::from_le_bytes(bytes[0..4].try_into()?);
//!         let y = i32::from_le_bytes(bytes[4..8].try_into()?);
//!         Ok(Point { x, y })
//!     }
//! }
//!
//! static POINT_TYPE: TypeDescriptor = TypeDescriptor {
//!     id: asset_core::TypeId32::from_name("doctest::Point"),
//!     name: "doctest::Point",
//!     construct_empty: || Box::new(Point { x: 0, y: 0 }),
//!     decode: |bytes| Point::decode(bytes).map(|p| Box::new(p) as Box<dyn AssetObject>),
//!     overlay: asset_core::registry::overlay_by_round_trip::<Point>,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source_dir = tempfile::tempdir()?;
//! let cache_dir = tempfile::tempdir()?;
//! let manager = AssetManager::new(ManagerConfig {
//!     source_root: source_dir.path().to_owned(),
//!     cache_root: cache_dir.path().to_owned(),
//!     ..ManagerConfig::default()
//! });
//!
//! let path = AssetPath::new("common//position");
//! let promise = manager.create(&path, &POINT_TYPE, Box::new(Point { x: 5, y: -6 }), None);
//! manager.update();
//! promise.wait()?;
//!
//! let handle = manager.acquire_strong(&path, Some(&POINT_TYPE), Default::default());
//! assert!(!handle.is_null());
//! # Ok(()) }
//! ```

pub mod asset;
pub mod cache;
pub mod dependency;
pub mod domain;
pub mod error;
pub mod executor;
pub mod handle;
pub mod manager;
pub mod op;
pub mod path;
pub mod record;
pub mod registry;
pub mod source;
mod util;

pub use asset::{AssetObject, DependencyRef, DependencyStrength};
pub use cache::{CacheBlock, CacheController};
pub use domain::DomainMap;
pub use error::{CacheError, OpError, SourceError};
pub use executor::{CondvarSignal, TaskExecutor, ThreadPoolExecutor, ThreadSignal};
pub use handle::{Handle, StrongHandle, WeakHandle};
pub use manager::{AlreadyGlobal, AssetManager, LoadFlags, ManagerConfig};
pub use op::{OpKind, Operation, OperationController, Promise};
pub use path::AssetPath;
pub use record::{CacheIndex, LoadState, TypeRecord};
pub use registry::{TypeDescriptor, TypeId32};
pub use source::SourceController;
