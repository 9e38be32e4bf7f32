//! Method descriptors: the registered form of a remotely callable method.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

use crate::carrier::{Carrier, RmiParameters};
use crate::error::InvokeError;
use crate::flags::RmiFlags;

/// Shape of a declared return or parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeShape {
    Unit,
    Bool,
    /// A parameter carrier, by stable type name.
    Carrier(&'static str),
    /// Any other type, by display name.
    Other(&'static str),
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("()"),
            Self::Bool => f.write_str("bool"),
            Self::Carrier(name) | Self::Other(name) => f.write_str(name),
        }
    }
}

/// Declared signature of a remote method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub returns: TypeShape,
    pub parameters: Vec<TypeShape>,
}

impl Signature {
    /// `fn(&mut self) -> bool`
    #[must_use]
    pub const fn no_parameters() -> Self {
        Self {
            returns: TypeShape::Bool,
            parameters: Vec::new(),
        }
    }

    /// `fn(&mut self, &P) -> bool`
    #[must_use]
    pub fn with_carrier<P: RmiParameters>() -> Self {
        Self {
            returns: TypeShape::Bool,
            parameters: vec![TypeShape::Carrier(P::TYPE_NAME)],
        }
    }
}

type Invoker = Box<dyn Fn(&mut dyn Any, Option<&dyn Carrier>) -> Result<bool, InvokeError>>;

/// A method registered for remote invocation.
pub struct MethodDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    name: &'static str,
    marker: Option<RmiFlags>,
    signature: Signature,
    invoker: Invoker,
}

impl MethodDescriptor {
    /// Starts describing method `name` of `T`.
    #[must_use]
    pub fn of<T: Any>(name: &'static str) -> MethodBuilder<T> {
        MethodBuilder {
            name,
            marker: None,
            signature: None,
            _owner: PhantomData,
        }
    }

    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// `Type::method`, for diagnostics.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        let short = self.type_name.rsplit("::").next().unwrap_or(self.type_name);
        format!("{short}::{}", self.name)
    }

    /// Declared transfer semantics; `None` if the method is not remote-callable.
    #[must_use]
    pub const fn marker(&self) -> Option<RmiFlags> {
        self.marker
    }

    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Declared carrier type name, if the single parameter is a carrier.
    #[must_use]
    pub fn carrier_type(&self) -> Option<&'static str> {
        match self.signature.parameters.as_slice() {
            [TypeShape::Carrier(name)] => Some(*name),
            _ => None,
        }
    }

    /// Calls the method on `receiver`.
    pub fn invoke(
        &self,
        receiver: &mut dyn Any,
        carrier: Option<&dyn Carrier>,
    ) -> Result<bool, InvokeError> {
        (self.invoker)(receiver, carrier)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("marker", &self.marker)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`MethodDescriptor::of`].
#[must_use]
pub struct MethodBuilder<T> {
    name: &'static str,
    marker: Option<RmiFlags>,
    signature: Option<Signature>,
    _owner: PhantomData<fn(&mut T)>,
}

impl<T: Any> MethodBuilder<T> {
    /// Marks the method remote-callable with `flags`.
    pub fn marker(mut self, flags: RmiFlags) -> Self {
        self.marker = Some(flags);
        self
    }

    /// Overrides the signature derived from the invoker.
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Finishes a method without parameters.
    pub fn invoke<F>(self, body: F) -> MethodDescriptor
    where
        F: Fn(&mut T) -> Result<bool, InvokeError> + 'static,
    {
        let name = self.name;
        self.build(
            Signature::no_parameters(),
            Box::new(move |receiver: &mut dyn Any, _carrier: Option<&dyn Carrier>| {
                body(downcast::<T>(receiver, name)?)
            }),
        )
    }

    /// Finishes a method taking carrier `P`.
    pub fn invoke_with<P, F>(self, body: F) -> MethodDescriptor
    where
        P: RmiParameters,
        F: Fn(&mut T, &P) -> Result<bool, InvokeError> + 'static,
    {
        let name = self.name;
        self.build(
            Signature::with_carrier::<P>(),
            Box::new(move |receiver: &mut dyn Any, carrier: Option<&dyn Carrier>| {
                let params = carrier
                    .and_then(|carrier| carrier.as_any().downcast_ref::<P>())
                    .ok_or_else(|| {
                        InvokeError::new(format!("{name} expects carrier {}", P::TYPE_NAME))
                    })?;
                body(downcast::<T>(receiver, name)?, params)
            }),
        )
    }

    fn build(self, derived: Signature, invoker: Invoker) -> MethodDescriptor {
        MethodDescriptor {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: self.name,
            marker: self.marker,
            signature: self.signature.unwrap_or(derived),
            invoker,
        }
    }
}

fn downcast<'a, T: Any>(receiver: &'a mut dyn Any, method: &str) -> Result<&'a mut T, InvokeError> {
    receiver.downcast_mut::<T>().ok_or_else(|| {
        InvokeError::new(format!(
            "{method} invoked on a receiver that is not {}",
            std::any::type_name::<T>()
        ))
    })
}
