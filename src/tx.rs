//! Transaction decoding
//!
//! The wire format is handled by `bitcoin`; this module adapts its errors and
//! adds the hex entry point the loaders use.

use bitcoin::consensus::{self, encode};
use thiserror::Error;

pub use bitcoin::{OutPoint, Transaction, TxIn, TxOut, Txid};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid transaction: {0}")]
    Consensus(#[from] encode::Error),
}

/// Decodes a consensus-serialized transaction, with or without witness data.
///
/// Bytes left over after the transaction are an error.
pub fn decode(bytes: &[u8]) -> Result<Transaction, DecodeError> {
    Ok(consensus::deserialize(bytes)?)
}

pub fn from_hex(s: &str) -> Result<Transaction, DecodeError> {
    decode(&hex::decode(s.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, Witness};

    const VULN_TX: &str = "0100000002f64c603e2f9f4daf70c2f4252b2dcdb07cc0192b7238bc9c3dacbae555baf701010000008a4730440220d47ce4c025c35ec440bc81d99834a624875161a26bf56ef7fdc0f5d52f843ad1022044e1ff2dfd8102cf7a47c21d5c9fd5701610d04953c6836596b4fe9dd2f53e3e014104dbd0c61532279cf72981c3584fc32216e0127699635c2789f549e0730c059b81ae133016a69c21e23f1859a95f06d52b7bf149a8f2fe4e8535c8a829b449c5ffffffffff29f841db2ba0cafa3a2a893cd1d8c3e962e8678fc61ebe89f415a46bc8d9854a010000008a4730440220d47ce4c025c35ec440bc81d99834a624875161a26bf56ef7fdc0f5d52f843ad102209a5f1c75e461d7ceb1cf3cab9013eb2dc85b6d0da8c3c6e27e3a5a5b3faa5bab014104dbd0c61532279cf72981c3584fc32216e0127699635c2789f549e0730c059b81ae133016a69c21e23f1859a95f06d52b7bf149a8f2fe4e8535c8a829b449c5ffffffffff01a0860100000000001976a91470792fb74a5df745bac07df6fe020f871cbb293b88ac00000000";

    #[test]
    fn test_decode_legacy_transaction() {
        let tx = from_hex(VULN_TX).unwrap();
        assert_eq!(tx.version, Version::ONE);
        assert_eq!(tx.input.len(), 2);
        assert_eq!(tx.output.len(), 1);
        assert_eq!(tx.lock_time, LockTime::ZERO);
        assert_eq!(tx.output[0].value, Amount::from_sat(100_000));
        assert!(tx.input.iter().all(|input| input.witness.is_empty()));
    }

    #[test]
    fn test_txid() {
        let tx = from_hex(VULN_TX).unwrap();
        assert_eq!(
            tx.compute_txid().to_string(),
            "9ec4bc49e828d924af1d1029cacf709431abbde46d59554b62bc270e3b29c4b1"
        );
    }

    #[test]
    fn test_outpoints() {
        let tx = from_hex(VULN_TX).unwrap();
        assert_eq!(
            tx.input[0].previous_output.txid.to_string(),
            "01f7ba55e5baac3d9cbc38722b19c07cb0cd2d2b25f4c270af4d9f2f3e604cf6"
        );
        assert_eq!(tx.input[0].previous_output.vout, 1);
        assert_eq!(
            tx.input[1].previous_output.txid.to_string(),
            "4a85d9c86ba415f489be1ec68f67e862e9c3d8d13c892a3afacaa02bdb41f829"
        );
        assert_eq!(tx.input[1].previous_output.vout, 1);
        assert_eq!(tx.input[0].script_sig.len(), 0x8a);
    }

    #[test]
    fn test_reencoding_matches_input() {
        let raw = hex::decode(VULN_TX).unwrap();
        let tx = decode(&raw).unwrap();
        assert_eq!(consensus::serialize(&tx), raw);
    }

    #[test]
    fn test_witness_does_not_change_txid() {
        let mut tx = from_hex(VULN_TX).unwrap();
        tx.input[1].witness = Witness::from_slice(&[vec![0x30, 0x01], vec![0x02; 33]]);
        let raw = consensus::serialize(&tx);
        assert_eq!(&raw[4..6], &[0x00, 0x01]);

        let decoded = decode(&raw).unwrap();
        assert!(decoded.input[0].witness.is_empty());
        assert!(!decoded.input[1].witness.is_empty());
        assert_eq!(
            decoded.compute_txid(),
            from_hex(VULN_TX).unwrap().compute_txid()
        );
    }

    #[test]
    fn test_truncated_input_is_error() {
        let raw = hex::decode(VULN_TX).unwrap();
        for len in [0, 3, 5, 40, 150, raw.len() - 1] {
            assert!(decode(&raw[..len]).is_err(), "len {len}");
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut raw = hex::decode(VULN_TX).unwrap();
        raw.push(0);
        assert!(matches!(decode(&raw), Err(DecodeError::Consensus(_))));
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(from_hex("01zz"), Err(DecodeError::Hex(_))));
    }
}
