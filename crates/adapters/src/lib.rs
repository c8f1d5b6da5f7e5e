//! `adapters` crate: the `StepAdapter` contract, the run context it receives,
//! and the registry the engine dispatches through.
//!
//! Every adapter, built-in or external, must implement [`StepAdapter`]. The
//! engine crate resolves adapters by kind through an [`AdapterRegistry`] and
//! never looks inside their inputs or outputs.

pub mod builtin;
pub mod clock;
pub mod context;
pub mod error;
pub mod ids;
pub mod mock;
pub mod registry;
pub mod traits;

pub use builtin::{builtin_registry, EchoAdapter, NoopAdapter};
pub use clock::{Clock, DeterministicClock, SystemClock};
pub use context::{ContextSnapshot, PlatformInfo, RunContext, RunContextBuilder};
pub use error::{AdapterError, ContextError, RegistryError};
pub use ids::{IdFactory, SeededIdFactory, UuidIdFactory};
pub use registry::AdapterRegistry;
pub use traits::StepAdapter;
