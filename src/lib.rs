//! ECDSA nonce reuse key recovery from legacy Bitcoin transactions
//!
//! Legacy P2PKH inputs are decoded into (public key, R, S, Z) tuples, where Z
//! is the SIGHASH_ALL digest the signature commits to. Tuples collected in a
//! [`PairBucket`] are scanned pairwise; two signatures by the same key that
//! share R give away the private key.

pub mod attack;
pub mod bucket;
pub mod error;
pub mod math;
pub mod provider;
pub mod scriptsig;
pub mod sighash;
pub mod signature;
pub mod tx;

pub use attack::{Attack, NonceReuseAttack, RecoveredKey, RecoveryError, SolveReport};
pub use bucket::{Extraction, InputOutcome, PairBucket};
pub use error::SkipReason;
pub use provider::{MemoryLookup, TransactionLookup};
pub use signature::{Signature, SignatureHashPair};
pub use tx::{Transaction, Txid};
