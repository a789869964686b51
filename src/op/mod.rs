//! Operation Controller (C5): scheduling, queueing, and promise machinery
//! for the seven mutating operation kinds. `AssetManager` supplies the
//! closures that actually touch the Source/Cache/Data controllers — this
//! module only owns ordering, backpressure, retry, and completion
//! signalling.

pub mod controller;
pub mod promise;
pub mod queue;

pub use controller::{OpKind, Operation, OperationController, RetryPolicy, TargetKey};
pub use promise::Promise;
