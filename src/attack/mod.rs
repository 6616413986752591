//! Key recovery over accumulated signature tuples

use crate::math::{scalar_to_decimal_string, scalar_to_hex_string};
use crate::signature::SignatureHashPair;
use k256::Scalar;
use serde::Serialize;
use thiserror::Error;

pub mod nonce_reuse;
pub use nonce_reuse::{recover_private_key, NonceReuseAttack};

pub trait Attack: Send + Sync {
    fn name(&self) -> &'static str;
    fn min_pairs(&self) -> usize;
    fn solve(&self, pairs: &[SignatureHashPair]) -> SolveReport;
}

/// Why a pair of tuples did not yield a key.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecoveryError {
    #[error("no R value reuse between the two tuples")]
    NoRValueReuse,

    #[error("tuples with different public keys are not candidates for recovery")]
    PubkeyMismatch,

    #[error("failed to parse the public key of a tuple")]
    CorruptPubkey,

    #[error("need two distinct tuples to recover a key")]
    IdenticalInputs,

    #[error("unable to derive a private key despite shared R and matching public keys")]
    NoResult,
}

impl RecoveryError {
    /// Expected negatives while scanning a bucket.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            RecoveryError::NoRValueReuse
                | RecoveryError::PubkeyMismatch
                | RecoveryError::IdenticalInputs
        )
    }

    /// Preconditions held yet no candidate verified: a bug or corrupted data.
    pub fn is_alarm(&self) -> bool {
        matches!(self, RecoveryError::NoResult)
    }
}

#[derive(Debug, Clone)]
pub struct RecoveredKey {
    pub private_key: Scalar,
    pub private_key_decimal: String,
    pub private_key_hex: String,
    /// Uncompressed SEC1 public key, hex encoded.
    pub pubkey: String,
    /// Insertion indices of the two tuples the key was recovered from.
    pub pair: (usize, usize),
}

impl RecoveredKey {
    pub fn new(private_key: Scalar, pubkey: &[u8], pair: (usize, usize)) -> Self {
        Self {
            private_key,
            private_key_decimal: scalar_to_decimal_string(&private_key),
            private_key_hex: scalar_to_hex_string(&private_key),
            pubkey: hex::encode(pubkey),
            pair,
        }
    }
}

/// Outcome of one examined pair that shared an R value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairReport {
    pub lhs: usize,
    pub rhs: usize,
    pub outcome: Result<(), RecoveryError>,
}

#[derive(Debug, Clone, Default)]
pub struct SolveReport {
    pub keys: Vec<RecoveredKey>,
    /// Every pair that got past the R comparison, in scan order.
    pub pairs: Vec<PairReport>,
    pub examined: usize,
    pub no_reuse: usize,
}

impl SolveReport {
    pub fn alarms(&self) -> impl Iterator<Item = &PairReport> {
        self.pairs
            .iter()
            .filter(|p| matches!(p.outcome, Err(e) if e.is_alarm()))
    }

    pub fn count(&self, error: RecoveryError) -> usize {
        if error == RecoveryError::NoRValueReuse {
            return self.no_reuse;
        }
        self.pairs
            .iter()
            .filter(|p| p.outcome == Err(error))
            .count()
    }
}
