pub mod ads;
pub mod broadcast;
pub mod config;
pub mod events;
pub mod review;

use adboard_core::actor::CapabilitySet;

use crate::error::AppError;

/// Gate a handler on a capability.
pub(crate) fn require(caps: &CapabilitySet, capability: &str) -> Result<(), AppError> {
    if caps.has(capability) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "missing capability '{capability}'"
        )))
    }
}
