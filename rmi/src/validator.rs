//! Call-site legality of a method declaration.

use crate::carrier::Carrier;
use crate::config::{Role, ValidationChecks};
use crate::descriptor::{MethodDescriptor, TypeShape};
use crate::error::{RmiError, RmiResult};
use crate::flags::RmiFlags;
use crate::target::RmiTarget;

/// Checks that `descriptor` may be called with `carrier` towards `target`
/// from an instance playing `role`. Returns the declared flags.
///
/// Rules run in a fixed order and the first failure is returned.
pub fn validate_method(
    descriptor: &MethodDescriptor,
    carrier: Option<&dyn Carrier>,
    target: RmiTarget,
    role: Role,
    checks: ValidationChecks,
) -> RmiResult<RmiFlags> {
    let method = || descriptor.qualified_name();
    let signature = descriptor.signature();

    if checks.return_type && signature.returns != TypeShape::Bool {
        return Err(RmiError::MustReturnSuccessFlag { method: method() });
    }

    if checks.parameters {
        let count = signature.parameters.len();
        match (count, carrier) {
            (0, Some(_)) => return Err(RmiError::UnexpectedCarrier { method: method() }),
            (1.., None) => return Err(RmiError::MissingCarrier { method: method() }),
            _ => {}
        }
        if count > 1 {
            return Err(RmiError::TooManyParameters {
                method: method(),
                count,
            });
        }
        if let (Some(shape), Some(carrier)) = (signature.parameters.first(), carrier) {
            let TypeShape::Carrier(expected) = shape else {
                return Err(RmiError::ParameterNotCarrier {
                    method: method(),
                    parameter: shape.to_string(),
                });
            };
            if *expected != carrier.carrier_type() {
                return Err(RmiError::CarrierTypeMismatch {
                    method: method(),
                    expected: (*expected).to_owned(),
                    found: carrier.carrier_type().to_owned(),
                });
            }
        }
    }

    let Some(flags) = descriptor.marker() else {
        return Err(RmiError::NotRemoteCallable { method: method() });
    };

    if flags.is_to_server() {
        if !role.is_client() {
            return Err(RmiError::MustBeCalledFromClient { method: method() });
        }
        if !target.contains(RmiTarget::TO_SERVER) {
            return Err(RmiError::MustBeDirectedToServer { method: method() });
        }
    }

    Ok(flags)
}
