//! Per-input extraction outcomes

use crate::provider::LookupError;
use crate::sighash::DigestError;
use crate::signature::DerError;
use crate::tx::Txid;
use thiserror::Error;

/// Why an input did not yield a tuple.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("skipping due to empty sig")]
    EmptySig,

    #[error("skipping due to witness")]
    Witness,

    #[error("skipping due to m-of-n")]
    MofN,

    #[error("skipping due to sig offset being out of bounds")]
    SigOffset,

    #[error("skipping due to failure to parse signature: {0}")]
    SigParse(DerError),

    #[error("skipping due to key len index being out of bounds")]
    KeyLenOffset,

    #[error("skipping due to key end being out of bounds")]
    KeyOffset,

    #[error("skipping due to failure to parse key")]
    KeyParse,

    #[error("skipping due to failure to get prevout {0}")]
    CantFindPrevOut(Txid),

    #[error("transaction lookup failed: {0}")]
    Provider(LookupError),

    #[error("skipping due to failure to extract Z value: {0}")]
    FailedZValExtract(DigestError),
}

impl SkipReason {
    /// Benign skips expected in normal operation. Everything else points at
    /// malformed data or a failing collaborator.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SkipReason::EmptySig | SkipReason::Witness | SkipReason::MofN
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;

    #[test]
    fn test_warning_classification() {
        assert!(SkipReason::EmptySig.is_warning());
        assert!(SkipReason::Witness.is_warning());
        assert!(SkipReason::MofN.is_warning());
        assert!(!SkipReason::SigOffset.is_warning());
        assert!(!SkipReason::KeyParse.is_warning());
        assert!(!SkipReason::CantFindPrevOut(Txid::all_zeros()).is_warning());
        assert!(!SkipReason::Provider(LookupError::Unavailable("down".into())).is_warning());
    }
}
