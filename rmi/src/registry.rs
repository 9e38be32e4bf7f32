//! Registry of remotely callable methods, keyed by receiver type and name.

use std::any::TypeId;
use std::collections::HashMap;

use blake3::Hasher;

use crate::descriptor::{MethodDescriptor, TypeShape};
use crate::error::{RmiError, RmiResult};

/// Explicit method table owned by a dispatcher.
///
/// Populated once at startup; lookups never reflect over types.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    types: HashMap<TypeId, HashMap<&'static str, MethodDescriptor>>,
}

impl MethodRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor. A type may not declare the same method twice.
    pub fn register(&mut self, descriptor: MethodDescriptor) -> RmiResult<()> {
        let methods = self.types.entry(descriptor.type_id()).or_default();
        if methods.contains_key(descriptor.name()) {
            return Err(RmiError::DuplicateMethod {
                type_name: descriptor.type_name().to_owned(),
                method: descriptor.name().to_owned(),
            });
        }
        tracing::trace!(method = %descriptor.qualified_name(), "registered rmi method");
        methods.insert(descriptor.name(), descriptor);
        Ok(())
    }

    /// Looks up `name` on the type identified by `type_id`.
    #[must_use]
    pub fn get(&self, type_id: TypeId, name: &str) -> Option<&MethodDescriptor> {
        self.types.get(&type_id)?.get(name)
    }

    #[must_use]
    pub fn get_for<T: 'static>(&self, name: &str) -> Option<&MethodDescriptor> {
        self.get(TypeId::of::<T>(), name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.values().all(HashMap::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.types.values().flat_map(HashMap::values)
    }

    /// Stable 64-bit digest of every registered declaration.
    ///
    /// Two peers built from the same declarations produce the same digest,
    /// regardless of registration order.
    #[must_use]
    pub fn digest(&self) -> u64 {
        let mut entries: Vec<(String, &MethodDescriptor)> = self
            .iter()
            .map(|descriptor| (descriptor.qualified_name(), descriptor))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut hasher = Hasher::new();
        write_u32(&mut hasher, entries.len() as u32);
        for (name, descriptor) in entries {
            write_str(&mut hasher, &name);
            match descriptor.marker() {
                Some(flags) => {
                    write_u8(&mut hasher, 1);
                    write_u8(&mut hasher, flags.encode());
                }
                None => write_u8(&mut hasher, 0),
            }
            let signature = descriptor.signature();
            write_shape(&mut hasher, &signature.returns);
            write_u32(&mut hasher, signature.parameters.len() as u32);
            for shape in &signature.parameters {
                write_shape(&mut hasher, shape);
            }
        }

        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }
}

fn write_shape(hasher: &mut Hasher, shape: &TypeShape) {
    match shape {
        TypeShape::Unit => write_u8(hasher, 0),
        TypeShape::Bool => write_u8(hasher, 1),
        TypeShape::Carrier(name) => {
            write_u8(hasher, 2);
            write_str(hasher, name);
        }
        TypeShape::Other(name) => {
            write_u8(hasher, 3);
            write_str(hasher, name);
        }
    }
}

fn write_u8(hasher: &mut Hasher, value: u8) {
    hasher.update(&[value]);
}

fn write_u32(hasher: &mut Hasher, value: u32) {
    hasher.update(&value.to_le_bytes());
}

fn write_str(hasher: &mut Hasher, value: &str) {
    write_u32(hasher, value.len() as u32);
    hasher.update(value.as_bytes());
}
