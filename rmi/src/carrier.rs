//! Parameter carriers and the registry that rebuilds them by name.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use sync::{CrySync, SyncResult, Synchronizable};

use crate::error::{RmiError, RmiResult};

/// The single parameter object of a remote method.
///
/// `TYPE_NAME` is the stable wire name of the carrier; it must be identical
/// on every peer and unique within a [`CarrierRegistry`].
pub trait RmiParameters: Synchronizable + Default + Any {
    const TYPE_NAME: &'static str;
}

/// Object-safe view of an [`RmiParameters`] value.
pub trait Carrier: Any {
    fn carrier_type(&self) -> &'static str;
    fn synchronize_carrier(&mut self, sync: &mut CrySync) -> SyncResult<()>;
    fn as_any(&self) -> &dyn Any;
}

impl<P: RmiParameters> Carrier for P {
    fn carrier_type(&self) -> &'static str {
        P::TYPE_NAME
    }

    fn synchronize_carrier(&mut self, sync: &mut CrySync) -> SyncResult<()> {
        self.synchronize(sync)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type CarrierFactory = fn() -> Box<dyn Carrier>;

fn make<P: RmiParameters>() -> Box<dyn Carrier> {
    Box::new(P::default())
}

/// Carrier constructors keyed by stable type name.
#[derive(Default)]
pub struct CarrierRegistry {
    factories: HashMap<&'static str, CarrierFactory>,
}

impl CarrierRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `P` under its type name.
    pub fn register<P: RmiParameters>(&mut self) -> RmiResult<()> {
        if self.factories.contains_key(P::TYPE_NAME) {
            return Err(RmiError::DuplicateCarrier {
                name: P::TYPE_NAME.to_owned(),
            });
        }
        self.factories.insert(P::TYPE_NAME, make::<P>);
        Ok(())
    }

    /// Creates an empty carrier to deserialize into.
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn Carrier>> {
        self.factories.get(name).map(|factory| factory())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for CarrierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort_unstable();
        f.debug_struct("CarrierRegistry")
            .field("carriers", &names)
            .finish()
    }
}
