//! Dispatcher configuration.

use wire::Limits;

/// Network role of the local instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Server,
    Client,
    /// A server that also hosts a local client.
    ListenServer,
}

impl Role {
    #[must_use]
    pub const fn is_client(self) -> bool {
        matches!(self, Self::Client | Self::ListenServer)
    }

    #[must_use]
    pub const fn is_server(self) -> bool {
        matches!(self, Self::Server | Self::ListenServer)
    }
}

/// Optional declaration checks run by the method validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationChecks {
    /// Require remote methods to return a success flag.
    pub return_type: bool,
    /// Require 0 or 1 carrier parameters matching the supplied carrier.
    pub parameters: bool,
}

impl ValidationChecks {
    pub const ALL: Self = Self {
        return_type: true,
        parameters: true,
    };

    pub const NONE: Self = Self {
        return_type: false,
        parameters: false,
    };
}

impl Default for ValidationChecks {
    fn default() -> Self {
        Self::ALL
    }
}

/// Configuration of a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RmiConfig {
    pub role: Role,
    pub checks: ValidationChecks,
    /// Bounds applied when decoding incoming carrier payloads.
    pub limits: Limits,
}

impl RmiConfig {
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    /// Small limits and every check enabled.
    #[must_use]
    pub const fn for_testing(role: Role) -> Self {
        Self {
            role,
            checks: ValidationChecks::ALL,
            limits: Limits::for_testing(),
        }
    }
}
