//! Aspect synchronization for networked objects.
//!
//! A networked object splits its state into up to 28 independently dirty
//! [`EntityAspects`]. For each dirty aspect the object runs one call sequence
//! against a [`CrySync`] medium; the same sequence serializes on the sender
//! and deserializes on the receiver.
//!
//! # Example
//!
//! ```
//! use sync::{CrySync, Limits, SyncContext, SyncResult, Synchronizable, Vec3};
//!
//! #[derive(Default, PartialEq, Clone)]
//! struct Door {
//!     open: bool,
//!     pivot: Vec3,
//! }
//!
//! impl Synchronizable for Door {
//!     fn synchronize(&mut self, sync: &mut CrySync) -> SyncResult<()> {
//!         sync.sync("open", &mut self.open)?;
//!         sync.sync_elided("pivot", &mut self.pivot, &Vec3::ZERO)
//!     }
//! }
//!
//! let mut door = Door { open: true, pivot: Vec3::ZERO };
//! let mut writer = CrySync::writer(SyncContext::Network);
//! door.synchronize(&mut writer).unwrap();
//! let bytes = writer.finish().unwrap();
//!
//! let mut remote = Door::default();
//! let mut reader = CrySync::reader(&bytes, &Limits::default()).unwrap();
//! remote.synchronize(&mut reader).unwrap();
//! assert!(remote.open);
//! ```
//!
//! # Design Principles
//!
//! - **One call sequence** - Writers and readers run identical code.
//! - **Lookup by name** - Readers find fields by name within their group, so
//!   optional data can be elided without a schema.
//! - **Local errors only** - [`SyncError`] reports bugs in the calling code;
//!   problems with incoming data surface as partial reception.

mod aspects;
mod error;
mod medium;
mod scheduler;
mod value;

pub use aspects::{AspectTracker, EntityAspects, Profile};
pub use error::{SyncError, SyncResult};
pub use medium::{CrySync, Synchronizable};
pub use scheduler::{read_aspect, write_dirty_aspects, AspectPayload, AspectReceipt, NetworkSync};
pub use value::{Quat, SyncValue, Vec2, Vec3};
pub use wire::{FieldValue, LimitKind, Limits, SyncContext, ValueKind};
