//! Sending and receiving remote calls.

use std::any::Any;

use sync::{CrySync, SyncContext};

use crate::carrier::{Carrier, CarrierRegistry};
use crate::config::RmiConfig;
use crate::error::{InvokeError, RmiError, RmiResult};
use crate::flags::RmiFlags;
use crate::registry::MethodRegistry;
use crate::target::{validate_target, ChannelId, EntityId, RmiTarget};
use crate::validator::validate_method;

/// An object that can send and receive remote calls.
pub trait NetworkedObject: Any {
    fn network_id(&self) -> EntityId;

    /// Channel of the client that owns this object, if any.
    fn owner_channel(&self) -> ChannelId {
        ChannelId::NONE
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A validated call handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingCall {
    pub sender: EntityId,
    pub method: String,
    /// Stable name of the carrier type, when the method takes one.
    pub carrier_type: Option<String>,
    /// Carrier state encoded by a writing [`CrySync`]; empty without carrier.
    pub payload: Vec<u8>,
    pub target: RmiTarget,
    pub channel: ChannelId,
    pub flags: RmiFlags,
}

/// A call delivered by the transport to the receiving object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCall {
    pub sender: EntityId,
    pub method: String,
    pub carrier_type: Option<String>,
    pub payload: Vec<u8>,
}

impl From<OutgoingCall> for IncomingCall {
    fn from(call: OutgoingCall) -> Self {
        Self {
            sender: call.sender,
            method: call.method,
            carrier_type: call.carrier_type,
            payload: call.payload,
        }
    }
}

/// The transport collaborator. Sending is fire-and-forget.
pub trait Transport {
    fn send(&mut self, call: OutgoingCall);
}

impl Transport for Vec<OutgoingCall> {
    fn send(&mut self, call: OutgoingCall) {
        self.push(call);
    }
}

/// A reliable remote call whose body failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationFailure {
    pub receiver: EntityId,
    pub sender: EntityId,
    pub method: String,
    pub error: InvokeError,
}

/// Sink for failures of reliable calls, which indicate a broken contract.
pub trait ErrorReporter {
    fn report(&mut self, failure: InvocationFailure);
}

/// Reports failures through `tracing` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&mut self, failure: InvocationFailure) {
        tracing::error!(
            receiver = %failure.receiver,
            sender = %failure.sender,
            method = %failure.method,
            error = %failure.error,
            "reliable remote call failed"
        );
    }
}

/// Validates and routes remote calls for one local instance.
pub struct Dispatcher<T: Transport> {
    config: RmiConfig,
    methods: MethodRegistry,
    carriers: CarrierRegistry,
    transport: T,
    reporter: Box<dyn ErrorReporter>,
}

impl<T: Transport> Dispatcher<T> {
    #[must_use]
    pub fn new(
        config: RmiConfig,
        methods: MethodRegistry,
        carriers: CarrierRegistry,
        transport: T,
    ) -> Self {
        Self {
            config,
            methods,
            carriers,
            transport,
            reporter: Box::new(LogReporter),
        }
    }

    /// Replaces the default [`LogReporter`].
    #[must_use]
    pub fn with_reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &RmiConfig {
        &self.config
    }

    #[must_use]
    pub const fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    #[must_use]
    pub const fn carriers(&self) -> &CarrierRegistry {
        &self.carriers
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Validates a call to `method` on `sender` and hands it to the transport.
    ///
    /// Every error is local and synchronous; nothing is sent on failure.
    /// Once this returns `Ok` the call is committed.
    pub fn call_remote(
        &mut self,
        sender: &dyn NetworkedObject,
        method: &str,
        target: RmiTarget,
        carrier: Option<&mut dyn Carrier>,
        channel: ChannelId,
    ) -> RmiResult<RmiFlags> {
        let descriptor = self
            .methods
            .get(sender.as_any().type_id(), method)
            .ok_or_else(|| RmiError::MethodNotFound {
                type_name: sender.type_name().to_owned(),
                method: method.to_owned(),
            })?;

        let flags = validate_method(
            descriptor,
            carrier.as_deref(),
            target,
            self.config.role,
            self.config.checks,
        )?;
        validate_target(target, channel, sender.owner_channel())?;

        let (carrier_type, payload) = match carrier {
            Some(carrier) => {
                let mut sync = CrySync::writer_with_limits(SyncContext::Network, &self.config.limits);
                carrier.synchronize_carrier(&mut sync)?;
                (Some(carrier.carrier_type().to_owned()), sync.finish()?)
            }
            None => (None, Vec::new()),
        };

        tracing::debug!(
            sender = %sender.network_id(),
            method = %descriptor.qualified_name(),
            ?target,
            channel = channel.raw(),
            %flags,
            "rmi sent"
        );
        self.transport.send(OutgoingCall {
            sender: sender.network_id(),
            method: method.to_owned(),
            carrier_type,
            payload,
            target,
            channel,
            flags,
        });
        Ok(flags)
    }

    /// Invokes a delivered call on `receiver`.
    ///
    /// Returns `false` without invoking when the call cannot be matched to a
    /// remote-callable method for the local role or its carrier cannot be
    /// rebuilt. These are remote conditions and are only logged.
    pub fn on_remote_call_received(
        &mut self,
        receiver: &mut dyn NetworkedObject,
        call: &IncomingCall,
    ) -> bool {
        let receiver_id = receiver.network_id();
        let Some(descriptor) = self.methods.get(receiver.as_any().type_id(), &call.method) else {
            tracing::warn!(
                receiver = %receiver_id,
                type_name = receiver.type_name(),
                method = %call.method,
                "rmi for unknown method dropped"
            );
            return false;
        };
        let method = descriptor.qualified_name();

        let Some(flags) = descriptor.marker() else {
            tracing::warn!(%method, "rmi for method without remote marker dropped");
            return false;
        };
        let role = self.config.role;
        let accepted = if flags.is_to_server() {
            role.is_server()
        } else {
            role.is_client()
        };
        if !accepted {
            tracing::warn!(%method, ?role, %flags, "rmi direction does not match local role");
            return false;
        }

        let carrier = match descriptor.carrier_type() {
            Some(expected) => match self.rebuild_carrier(&method, expected, call) {
                Some(carrier) => Some(carrier),
                None => return false,
            },
            None => None,
        };

        match descriptor.invoke(receiver.as_any_mut(), carrier.as_deref()) {
            Ok(true) => {
                tracing::trace!(%method, receiver = %receiver_id, "rmi invoked");
                true
            }
            Ok(false) => {
                tracing::debug!(%method, receiver = %receiver_id, "rmi reported failure");
                false
            }
            Err(error) if flags.is_reliable() => {
                self.reporter.report(InvocationFailure {
                    receiver: receiver_id,
                    sender: call.sender,
                    method,
                    error,
                });
                false
            }
            Err(error) => {
                tracing::debug!(%method, %error, "unreliable rmi failed, dropped");
                false
            }
        }
    }

    fn rebuild_carrier(
        &self,
        method: &str,
        expected: &str,
        call: &IncomingCall,
    ) -> Option<Box<dyn Carrier>> {
        if call.carrier_type.as_deref() != Some(expected) {
            tracing::warn!(
                method,
                expected,
                found = ?call.carrier_type,
                "rmi carrier type mismatch"
            );
            return None;
        }
        let Some(mut carrier) = self.carriers.create(expected) else {
            tracing::warn!(method, carrier = expected, "rmi carrier type not registered");
            return None;
        };
        let mut sync = match CrySync::reader(&call.payload, &self.config.limits) {
            Ok(sync) => sync,
            Err(err) => {
                tracing::warn!(method, %err, "rmi payload undecodable");
                return None;
            }
        };
        if let Err(err) = carrier.synchronize_carrier(&mut sync) {
            tracing::warn!(method, %err, "rmi carrier failed to read");
            return None;
        }
        if sync.is_partial() {
            tracing::warn!(method, "rmi carrier received partially");
            return None;
        }
        Some(carrier)
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("methods", &self.methods)
            .field("carriers", &self.carriers)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}
