//! Signature data types and DER encoding

use crate::math::{curve_order, to_be_bytes_32};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Serialize, Serializer};
use thiserror::Error;

const MIN_SIG_LEN: usize = 8;
const ASN1_SEQUENCE: u8 = 0x30;
const ASN1_INTEGER: u8 = 0x02;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerError {
    #[error("signature too short: {0} bytes")]
    TooShort(usize),
    #[error("missing SEQUENCE tag")]
    NoSequence,
    #[error("SEQUENCE length {declared} does not fit in {available} bytes")]
    BadLength { declared: usize, available: usize },
    #[error("missing INTEGER tag for {0}")]
    NoInteger(&'static str),
    #[error("{0} has an invalid length")]
    BadIntegerLength(&'static str),
    #[error("{0} is zero")]
    Zero(&'static str),
    #[error("{0} is not below the curve order")]
    OutOfRange(&'static str),
    #[error("{0} unexpected bytes after S")]
    TrailingBytes(usize),
}

/// The (R, S) pair of an ECDSA signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: BigUint,
    pub s: BigUint,
}

impl Signature {
    /// Parses a DER signature with the leniency historically accepted on
    /// chain: integers may carry superfluous padding, and anything after the
    /// declared SEQUENCE length (the sighash type byte) is ignored.
    pub fn from_der(bytes: &[u8]) -> Result<Self, DerError> {
        if bytes.len() < MIN_SIG_LEN {
            return Err(DerError::TooShort(bytes.len()));
        }
        if bytes[0] != ASN1_SEQUENCE {
            return Err(DerError::NoSequence);
        }

        let declared = bytes[1] as usize;
        if declared + 2 > bytes.len() || declared + 2 < MIN_SIG_LEN {
            return Err(DerError::BadLength {
                declared,
                available: bytes.len(),
            });
        }
        let body = &bytes[..declared + 2];

        let mut index = 2;
        let r = read_integer(body, &mut index, "R")?;
        let s = read_integer(body, &mut index, "S")?;
        if index != body.len() {
            return Err(DerError::TrailingBytes(body.len() - index));
        }

        let order = curve_order();
        for (name, value) in [("R", &r), ("S", &s)] {
            if value.is_zero() {
                return Err(DerError::Zero(name));
            }
            if *value >= order {
                return Err(DerError::OutOfRange(name));
            }
        }

        Ok(Signature { r, s })
    }

    /// Strict, minimally encoded DER.
    pub fn to_der(&self) -> Vec<u8> {
        let r = encode_integer(&self.r);
        let s = encode_integer(&self.s);
        let mut out = Vec::with_capacity(2 + r.len() + s.len());
        out.push(ASN1_SEQUENCE);
        out.push((r.len() + s.len()) as u8);
        out.extend_from_slice(&r);
        out.extend_from_slice(&s);
        out
    }
}

fn read_integer(body: &[u8], index: &mut usize, name: &'static str) -> Result<BigUint, DerError> {
    if *index + 2 > body.len() || body[*index] != ASN1_INTEGER {
        return Err(DerError::NoInteger(name));
    }
    let len = body[*index + 1] as usize;
    *index += 2;
    if len == 0 || *index + len > body.len() {
        return Err(DerError::BadIntegerLength(name));
    }
    let value = BigUint::from_bytes_be(&body[*index..*index + len]);
    *index += len;
    Ok(value)
}

fn encode_integer(value: &BigUint) -> Vec<u8> {
    let mut magnitude = value.to_bytes_be();
    if magnitude[0] & 0x80 != 0 {
        magnitude.insert(0, 0x00);
    }
    let mut out = Vec::with_capacity(magnitude.len() + 2);
    out.push(ASN1_INTEGER);
    out.push(magnitude.len() as u8);
    out.extend_from_slice(&magnitude);
    out
}

/// One extracted (PublicKey, R, S, Z) tuple.
///
/// Construction requires the digest, so a tuple without Z cannot exist.
/// R and S come from [`Signature::from_der`] and lie in `[1, n)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureHashPair {
    /// SEC1 uncompressed encoding.
    #[serde(serialize_with = "serialize_hex")]
    pub public_key: Vec<u8>,
    #[serde(serialize_with = "serialize_scalar_hex")]
    pub r: BigUint,
    #[serde(serialize_with = "serialize_scalar_hex")]
    pub s: BigUint,
    #[serde(serialize_with = "serialize_hex")]
    pub z: [u8; 32],
}

impl SignatureHashPair {
    pub fn new(public_key: &PublicKey, signature: Signature, z: [u8; 32]) -> Self {
        Self {
            public_key: public_key.to_encoded_point(false).as_bytes().to_vec(),
            r: signature.r,
            s: signature.s,
            z,
        }
    }

    /// R as 32 big-endian bytes, `None` if it does not fit.
    pub fn r_bytes(&self) -> Option<[u8; 32]> {
        to_be_bytes_32(&self.r)
    }

    pub fn s_bytes(&self) -> Option<[u8; 32]> {
        to_be_bytes_32(&self.s)
    }
}

fn serialize_hex<S: Serializer, T: AsRef<[u8]>>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

fn serialize_scalar_hex<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:064x}", value))
}
