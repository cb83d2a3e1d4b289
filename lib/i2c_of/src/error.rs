//! Errors of the node-to-client binding.
use crate::registry::RegistryError;
use core::fmt;

/// Failures of building, claiming, registering or resolving a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cOfError {
    /// The node has no usable `compatible` to derive the client type from.
    InvalidType,
    /// The node's `reg` is missing, malformed or does not fit a client address.
    InvalidAddress,
    /// Another caller already instantiated (or is instantiating) this node. Not a failure:
    /// callers skip the node.
    AlreadyClaimed,
    /// The registry refused to create the client. The node's claim has been rolled back.
    RegistrationFailed(RegistryError),
    /// No registered object matches.
    NotFound,
}

impl I2cOfError {
    pub fn is_already_claimed(&self) -> bool {
        matches!(self, I2cOfError::AlreadyClaimed)
    }
}

impl fmt::Display for I2cOfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            I2cOfError::InvalidType => f.write_str("modalias failure"),
            I2cOfError::InvalidAddress => f.write_str("invalid reg"),
            I2cOfError::AlreadyClaimed => f.write_str("node already populated"),
            I2cOfError::RegistrationFailed(err) => write!(f, "registration failed: {}", err),
            I2cOfError::NotFound => f.write_str("not found"),
        }
    }
}

impl core::error::Error for I2cOfError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            I2cOfError::RegistrationFailed(err) => Some(err),
            _ => None,
        }
    }
}
