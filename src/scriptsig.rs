//! Legacy P2PKH unlocking-script decoding
//!
//! A pay-to-pubkey-hash scriptSig is two direct pushes:
//! `<len> <DER signature + sighash byte> <len> <SEC1 public key>`.
//! Anything that does not fit that shape is reported with the reason it was
//! rejected; this module never panics on its input.

use crate::error::SkipReason;
use crate::signature::Signature;
use k256::PublicKey;

/// Leading placeholder push of an m-of-n redeem (CHECKMULTISIG off-by-one).
pub const OP_0: u8 = 0x00;

/// Splits a scriptSig into its signature and public key.
///
/// The key is returned as a parsed point; tuples built from it always store
/// the uncompressed encoding so compressed and uncompressed pushes of the
/// same key compare equal downstream.
pub fn decode(script: &[u8]) -> Result<(Signature, PublicKey), SkipReason> {
    let first = *script.first().ok_or(SkipReason::EmptySig)?;
    if first == OP_0 {
        return Err(SkipReason::MofN);
    }

    let sig_end = 1 + first as usize;
    let sig_bytes = script.get(1..sig_end).ok_or(SkipReason::SigOffset)?;
    let signature = Signature::from_der(sig_bytes).map_err(SkipReason::SigParse)?;

    let key_len = *script.get(sig_end).ok_or(SkipReason::KeyLenOffset)? as usize;
    let key_begin = sig_end + 1;
    let key_bytes = script
        .get(key_begin..key_begin + key_len)
        .ok_or(SkipReason::KeyOffset)?;
    let public_key = PublicKey::from_sec1_bytes(key_bytes).map_err(|_| SkipReason::KeyParse)?;

    Ok((signature, public_key))
}
