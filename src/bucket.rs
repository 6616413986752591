//! Tuple extraction and accumulation
//!
//! A [`PairBucket`] walks the inputs of each transaction it is given, turns
//! every decodable legacy scriptSig into a [`SignatureHashPair`] and keeps
//! them in insertion order until the solver is run over a snapshot.

use crate::attack::{Attack, NonceReuseAttack, SolveReport};
use crate::error::SkipReason;
use crate::provider::{EntrySink, SinkError, TransactionLookup};
use crate::scriptsig;
use crate::sighash::prevout_sighash;
use crate::signature::SignatureHashPair;
use crate::tx::{self, DecodeError, Transaction, TxIn, Txid};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    Extracted(SignatureHashPair),
    /// Expected in normal operation (empty sig, witness, m-of-n).
    Skipped(SkipReason),
    Failed(SkipReason),
}

impl InputOutcome {
    fn from_skip(reason: SkipReason) -> Self {
        if reason.is_warning() {
            InputOutcome::Skipped(reason)
        } else {
            InputOutcome::Failed(reason)
        }
    }

    pub fn reason(&self) -> Option<&SkipReason> {
        match self {
            InputOutcome::Extracted(_) => None,
            InputOutcome::Skipped(reason) | InputOutcome::Failed(reason) => Some(reason),
        }
    }
}

/// Result of adding one transaction to a bucket.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub txid: Txid,
    pub extracted: usize,
    /// One entry per input index.
    pub outcomes: BTreeMap<usize, InputOutcome>,
}

impl Extraction {
    pub fn warnings(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, InputOutcome::Skipped(_)))
            .count()
    }

    pub fn errors(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, InputOutcome::Failed(_)))
            .count()
    }

    pub fn pairs(&self) -> impl Iterator<Item = &SignatureHashPair> {
        self.outcomes.values().filter_map(|o| match o {
            InputOutcome::Extracted(pair) => Some(pair),
            _ => None,
        })
    }
}

pub struct PairBucket<L: TransactionLookup> {
    pairs: Mutex<Vec<SignatureHashPair>>,
    lookup: L,
}

impl<L: TransactionLookup> PairBucket<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            pairs: Mutex::new(Vec::new()),
            lookup,
        }
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    fn guard(&self) -> MutexGuard<'_, Vec<SignatureHashPair>> {
        self.pairs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, pair: SignatureHashPair) {
        self.guard().push(pair);
    }

    /// Copy of the tuples in insertion order.
    pub fn snapshot(&self) -> Vec<SignatureHashPair> {
        self.guard().clone()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Extracts a tuple from every usable input of `tx`.
    ///
    /// Per-input problems are recorded in the returned outcomes and never
    /// stop the remaining inputs from being processed.
    pub fn add_transaction(&self, tx: &Transaction) -> Extraction {
        let txid = tx.compute_txid();
        let mut extraction = Extraction {
            txid,
            extracted: 0,
            outcomes: BTreeMap::new(),
        };

        for (index, input) in tx.input.iter().enumerate() {
            let outcome = match self.extract_input(tx, index, input) {
                Ok(pair) => {
                    self.append(pair.clone());
                    extraction.extracted += 1;
                    InputOutcome::Extracted(pair)
                }
                Err(reason) => {
                    if reason.is_warning() {
                        debug!("tx {txid} input {index}: {reason}");
                    } else {
                        warn!("tx {txid} input {index}: {reason}");
                    }
                    InputOutcome::from_skip(reason)
                }
            };
            extraction.outcomes.insert(index, outcome);
        }

        debug!(
            "tx {txid}: {} extracted, {} skipped, {} failed",
            extraction.extracted,
            extraction.warnings(),
            extraction.errors()
        );
        extraction
    }

    /// Decodes `bytes` as a transaction and extracts from it.
    pub fn add_raw_transaction(&self, bytes: &[u8]) -> Result<Extraction, DecodeError> {
        let tx = tx::decode(bytes)?;
        Ok(self.add_transaction(&tx))
    }

    /// Like [`add_transaction`](Self::add_transaction), also handing every
    /// extracted tuple to `sink`.
    ///
    /// The first sink failure is returned once extraction has finished; the
    /// tuples stay in the bucket either way.
    pub fn add_transaction_with_sink(
        &self,
        tx: &Transaction,
        sink: &mut dyn EntrySink,
    ) -> Result<Extraction, SinkError> {
        let extraction = self.add_transaction(tx);
        let mut first_error = None;
        for pair in extraction.pairs() {
            let (Some(r), Some(s)) = (pair.r_bytes(), pair.s_bytes()) else {
                warn!("tx {}: tuple with out-of-range R or S not stored", extraction.txid);
                continue;
            };
            let stored = sink.put_entry(&extraction.txid, &pair.public_key, &pair.z, &r, &s);
            if let Err(e) = stored {
                warn!("tx {}: failed to store entry: {e}", extraction.txid);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(extraction),
        }
    }

    /// Runs nonce reuse recovery over the current contents.
    pub fn solve(&self) -> SolveReport {
        self.solve_with(&NonceReuseAttack)
    }

    pub fn solve_with(&self, attack: &dyn Attack) -> SolveReport {
        let pairs = self.snapshot();
        attack.solve(&pairs)
    }

    fn extract_input(
        &self,
        tx: &Transaction,
        index: usize,
        input: &TxIn,
    ) -> Result<SignatureHashPair, SkipReason> {
        if !input.witness.is_empty() {
            return Err(SkipReason::Witness);
        }

        let (signature, public_key) = scriptsig::decode(input.script_sig.as_bytes())?;

        let prev_txid = input.previous_output.txid;
        let prev_tx = self
            .lookup
            .get_transaction(&prev_txid)
            .map_err(SkipReason::Provider)?
            .ok_or(SkipReason::CantFindPrevOut(prev_txid))?;

        let z = prevout_sighash(tx, index, &prev_tx).map_err(SkipReason::FailedZValExtract)?;

        Ok(SignatureHashPair::new(&public_key, signature, z))
    }
}
