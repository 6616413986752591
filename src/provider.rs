//! Transaction sources and tuple sinks
//!
//! The extraction pipeline only needs two collaborators: something that can
//! resolve a previous transaction by id, and optionally somewhere to record
//! extracted tuples. Local file-backed implementations of both live here.

use crate::tx::{self, Transaction, Txid};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("transaction source unavailable: {0}")]
    Unavailable(String),
}

/// Resolves previous transactions by id.
///
/// `Ok(None)` means the source answered but does not know the transaction.
/// Implementations may block on I/O; callers never hold locks across a call.
pub trait TransactionLookup: Send + Sync {
    fn get_transaction(&self, txid: &Txid) -> Result<Option<Transaction>, LookupError>;
}

impl<T: TransactionLookup + ?Sized> TransactionLookup for &T {
    fn get_transaction(&self, txid: &Txid) -> Result<Option<Transaction>, LookupError> {
        (**self).get_transaction(txid)
    }
}

impl<T: TransactionLookup + ?Sized> TransactionLookup for Arc<T> {
    fn get_transaction(&self, txid: &Txid) -> Result<Option<Transaction>, LookupError> {
        (**self).get_transaction(txid)
    }
}

/// In-memory transaction index keyed by computed txid.
#[derive(Debug, Clone, Default)]
pub struct MemoryLookup {
    transactions: HashMap<Txid, Transaction>,
}

impl MemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tx: Transaction) -> Txid {
        let txid = tx.compute_txid();
        self.transactions.insert(txid, tx);
        txid
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl FromIterator<Transaction> for MemoryLookup {
    fn from_iter<I: IntoIterator<Item = Transaction>>(iter: I) -> Self {
        let mut lookup = MemoryLookup::new();
        for tx in iter {
            lookup.insert(tx);
        }
        lookup
    }
}

impl Extend<Transaction> for MemoryLookup {
    fn extend<I: IntoIterator<Item = Transaction>>(&mut self, iter: I) {
        for tx in iter {
            self.insert(tx);
        }
    }
}

impl TransactionLookup for MemoryLookup {
    fn get_transaction(&self, txid: &Txid) -> Result<Option<Transaction>, LookupError> {
        Ok(self.transactions.get(txid).cloned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Format {
    Json,
    Csv,
}

/// A JSON entry is either a bare hex string or an object with `rawtx`.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonEntry {
    Hex(String),
    Object { rawtx: String },
}

#[derive(Deserialize)]
struct CsvRecord {
    rawtx: String,
}

/// Reads raw transactions from a file, or stdin when `input` is `-`.
pub fn load_transactions(input: &str) -> Result<Vec<Transaction>> {
    let content = if input == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {input}"))?
    };

    parse_transactions(&content)
}

pub fn parse_transactions(content: &str) -> Result<Vec<Transaction>> {
    let content = content.strip_prefix(BOM).unwrap_or(content);
    let raw = match detect_format(content)? {
        Format::Json => parse_json(content)?,
        Format::Csv => parse_csv(content)?,
    };

    raw.iter()
        .enumerate()
        .map(|(i, hex)| {
            tx::from_hex(hex).with_context(|| format!("transaction #{i} is not decodable"))
        })
        .collect()
}

const BOM: &str = "\u{FEFF}";

pub fn detect_format(content: &str) -> Result<Format> {
    let trimmed = content.strip_prefix(BOM).unwrap_or(content).trim_start();

    if trimmed.starts_with('[') {
        return Ok(Format::Json);
    }

    if let Some(first_line) = trimmed.lines().next() {
        let has_rawtx = first_line
            .split(',')
            .any(|c| c.trim().eq_ignore_ascii_case("rawtx"));
        if has_rawtx {
            return Ok(Format::Csv);
        }
    }

    bail!("Unable to detect input format. Use a JSON array of hex strings or CSV with a rawtx header.")
}

fn parse_json(content: &str) -> Result<Vec<String>> {
    let entries: Vec<JsonEntry> = serde_json::from_str(content)?;
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            JsonEntry::Hex(hex) => hex,
            JsonEntry::Object { rawtx } => rawtx,
        })
        .collect())
}

fn parse_csv(content: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect::<Vec<_>>();
    reader.set_headers(csv::StringRecord::from(headers));

    let mut raw = Vec::new();
    for result in reader.deserialize() {
        let record: CsvRecord = result?;
        raw.push(record.rawtx);
    }
    Ok(raw)
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("csv sink: {0}")]
    Csv(#[from] csv::Error),

    #[error("sink io: {0}")]
    Io(#[from] io::Error),
}

/// Receives every extracted tuple, keyed by the transaction it came from.
pub trait EntrySink {
    fn put_entry(
        &mut self,
        source: &Txid,
        public_key: &[u8],
        z: &[u8],
        r: &[u8],
        s: &[u8],
    ) -> Result<(), SinkError>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EntrySink for NullSink {
    fn put_entry(&mut self, _: &Txid, _: &[u8], _: &[u8], _: &[u8], _: &[u8]) -> Result<(), SinkError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct SinkRecord<'a> {
    txid: String,
    pubkey: &'a str,
    z: &'a str,
    r: &'a str,
    s: &'a str,
}

/// Writes tuples as hex-encoded CSV rows: `txid,pubkey,z,r,s`.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
        }
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
    }
}

impl<W: Write> EntrySink for CsvSink<W> {
    fn put_entry(
        &mut self,
        source: &Txid,
        public_key: &[u8],
        z: &[u8],
        r: &[u8],
        s: &[u8],
    ) -> Result<(), SinkError> {
        let (pubkey, z, r, s) = (hex::encode(public_key), hex::encode(z), hex::encode(r), hex::encode(s));
        self.writer.serialize(SinkRecord {
            txid: source.to_string(),
            pubkey: &pubkey,
            z: &z,
            r: &r,
            s: &s,
        })?;
        Ok(())
    }
}
