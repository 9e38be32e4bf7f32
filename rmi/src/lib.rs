//! Remote method invocation for networked objects.
//!
//! Methods are declared once in a [`MethodRegistry`] with their
//! [`RmiFlags`]. A [`Dispatcher`] validates every outgoing call against the
//! declaration, the local [`Role`] and the requested [`RmiTarget`], encodes
//! the optional parameter [`Carrier`] through a writing
//! [`CrySync`](sync::CrySync) and hands the result to a [`Transport`]. On the
//! receiving side it rebuilds the carrier by name and invokes the method.
//!
//! # Errors
//!
//! Mistakes in the calling code are [`RmiError`]s, one variant per rule.
//! Conditions caused by a remote peer (unknown method, wrong direction,
//! unreadable payload) are logged and reported as `false`.

mod carrier;
mod config;
mod descriptor;
mod dispatcher;
mod error;
mod flags;
mod outbox;
mod registry;
mod target;
mod validator;

pub use carrier::{Carrier, CarrierRegistry, RmiParameters};
pub use config::{RmiConfig, Role, ValidationChecks};
pub use descriptor::{MethodBuilder, MethodDescriptor, Signature, TypeShape};
pub use dispatcher::{
    Dispatcher, ErrorReporter, IncomingCall, InvocationFailure, LogReporter, NetworkedObject,
    OutgoingCall, Transport,
};
pub use error::{InvokeError, RmiError, RmiResult};
pub use flags::{Attachment, FlagCorrections, FlagDecodeError, RmiFlags};
pub use outbox::{AttachedCalls, FrameOutbox, FramePlan};
pub use registry::MethodRegistry;
pub use target::{validate_target, ChannelId, EntityId, RmiTarget};
pub use validator::validate_method;
