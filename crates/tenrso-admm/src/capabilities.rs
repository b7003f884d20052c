//! Backend capability queries
//!
//! Some operators rely on serial column kernels (the 1-D total variation
//! solver, unimodal regression) that a given build may not provide. Whether a
//! capability exists is a pure function of the [`CapabilityProvider`] handed to
//! the operator's constructor, so a driver can inspect it before constructing
//! anything and tests can substitute their own provider.
//!
//! ```
//! use tenrso_admm::capabilities::{Capability, CapabilityProvider, NativeBackend};
//!
//! if NativeBackend.supports(Capability::TotalVariation) {
//!     let tv = tenrso_admm::TotalVariation::new(1.0, 0.0)?;
//! #   let _ = tv;
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PenaltyError, PenaltyResult};

/// Optional backend features required by specific operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Capability {
    /// Serial 1-D fused lasso (total variation) solver
    TotalVariation,
    /// Serial isotonic/unimodal regression
    UnimodalRegression,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::TotalVariation, Capability::UnimodalRegression];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::TotalVariation => write!(f, "total variation"),
            Capability::UnimodalRegression => write!(f, "unimodal regression"),
        }
    }
}

/// Something that can answer "is this capability available?"
pub trait CapabilityProvider {
    fn supports(&self, capability: Capability) -> bool;
}

/// The backend compiled into this crate
///
/// Kernel availability follows the `total-variation` and `unimodality`
/// cargo features.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl CapabilityProvider for NativeBackend {
    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::TotalVariation => cfg!(feature = "total-variation"),
            Capability::UnimodalRegression => cfg!(feature = "unimodality"),
        }
    }
}

/// All capabilities supported by [`NativeBackend`]
pub fn supported_capabilities() -> Vec<Capability> {
    Capability::ALL
        .into_iter()
        .filter(|&cap| NativeBackend.supports(cap))
        .collect()
}

/// Fail with [`PenaltyError::MissingCapability`] unless `provider` supports `capability`
pub(crate) fn require<P: CapabilityProvider + ?Sized>(
    provider: &P,
    operator: &'static str,
    capability: Capability,
) -> PenaltyResult<()> {
    if provider.supports(capability) {
        Ok(())
    } else {
        Err(PenaltyError::MissingCapability {
            operator,
            capability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct Bare;

    impl CapabilityProvider for Bare {
        fn supports(&self, _capability: Capability) -> bool {
            false
        }
    }

    #[test]
    fn test_require_reports_missing_capability() {
        let err = require(&Bare, "Unimodality", Capability::UnimodalRegression).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capability);
    }

    #[test]
    fn test_native_backend_matches_features() {
        let caps = supported_capabilities();
        assert_eq!(
            caps.contains(&Capability::TotalVariation),
            cfg!(feature = "total-variation")
        );
        assert_eq!(
            caps.contains(&Capability::UnimodalRegression),
            cfg!(feature = "unimodality")
        );
    }
}
