//! Legacy SIGHASH_ALL digest
//!
//! Reproduces the pre-segwit signature hash byte for byte: the spending
//! transaction is re-serialized with every scriptSig emptied except the one
//! being signed, which is replaced by the previous output's locking script,
//! then the 4-byte sighash type is appended and the result double-SHA256'd.

use bitcoin::consensus;
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::{ScriptBuf, Transaction, Witness};
use std::borrow::Cow;
use thiserror::Error;

pub const SIGHASH_ALL: u32 = 0x01;

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_CODESEPARATOR: u8 = 0xab;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    #[error("input index {index} out of range for {count} inputs")]
    InputIndex { index: usize, count: usize },

    #[error("previous output index {index} out of range for {count} outputs")]
    PrevOutIndex { index: u32, count: usize },

    #[error("push at offset {0} runs past the end of the subscript")]
    MalformedScript(usize),
}

/// Computes the SIGHASH_ALL digest signed by input `input_index` of `tx`.
///
/// `script_code` is the locking script of the output being spent. The digest
/// is returned in hash byte order, ready to be read as a big-endian integer.
pub fn legacy_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
) -> Result<[u8; 32], DigestError> {
    if input_index >= tx.input.len() {
        return Err(DigestError::InputIndex {
            index: input_index,
            count: tx.input.len(),
        });
    }
    let script_code = ScriptBuf::from_bytes(strip_code_separators(script_code)?.into_owned());

    // Witnesses are cleared so the copy serializes in the legacy format.
    let mut signing_tx = tx.clone();
    for (i, input) in signing_tx.input.iter_mut().enumerate() {
        input.script_sig = if i == input_index {
            script_code.clone()
        } else {
            ScriptBuf::new()
        };
        input.witness = Witness::new();
    }

    let mut buf = consensus::serialize(&signing_tx);
    buf.extend_from_slice(&SIGHASH_ALL.to_le_bytes());

    Ok(sha256d::Hash::hash(&buf).to_byte_array())
}

/// Like [`legacy_sighash`], taking the subscript from the output of
/// `prev_tx` that input `input_index` spends.
pub fn prevout_sighash(
    tx: &Transaction,
    input_index: usize,
    prev_tx: &Transaction,
) -> Result<[u8; 32], DigestError> {
    let input = tx.input.get(input_index).ok_or(DigestError::InputIndex {
        index: input_index,
        count: tx.input.len(),
    })?;
    let vout = input.previous_output.vout;
    let prev_out = prev_tx
        .output
        .get(vout as usize)
        .ok_or(DigestError::PrevOutIndex {
            index: vout,
            count: prev_tx.output.len(),
        })?;
    legacy_sighash(tx, input_index, prev_out.script_pubkey.as_bytes())
}

/// Removes every OP_CODESEPARATOR, walking pushes so data bytes equal to
/// 0xab are left alone.
fn strip_code_separators(script: &[u8]) -> Result<Cow<'_, [u8]>, DigestError> {
    let mut out: Option<Vec<u8>> = None;
    let mut pos = 0;

    while pos < script.len() {
        let start = pos;
        let opcode = script[pos];
        pos += 1;

        let data_len = match opcode {
            0x01..=0x4b => opcode as usize,
            OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4 => {
                let width = match opcode {
                    OP_PUSHDATA1 => 1,
                    OP_PUSHDATA2 => 2,
                    _ => 4,
                };
                let len_bytes = script
                    .get(pos..pos + width)
                    .ok_or(DigestError::MalformedScript(start))?;
                pos += width;
                len_bytes
                    .iter()
                    .rev()
                    .fold(0usize, |acc, b| (acc << 8) | *b as usize)
            }
            _ => 0,
        };
        if data_len > script.len() - pos {
            return Err(DigestError::MalformedScript(start));
        }
        pos += data_len;

        if opcode == OP_CODESEPARATOR {
            out.get_or_insert_with(|| script[..start].to_vec());
        } else if let Some(buf) = out.as_mut() {
            buf.extend_from_slice(&script[start..pos]);
        }
    }

    Ok(match out {
        Some(stripped) => Cow::Owned(stripped),
        None => Cow::Borrowed(script),
    })
}
