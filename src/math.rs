//! Modular arithmetic over the secp256k1 scalar field

use k256::elliptic_curve::ff::PrimeField;
use k256::Scalar;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Num, One, Signed, Zero};

/// Returns the secp256k1 group order n.
pub fn curve_order() -> BigUint {
    BigUint::from_str_radix(
        "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141",
        16,
    )
    .unwrap()
}

/// Returns the group order as a signed integer for arithmetic that can go negative.
pub fn curve_order_signed() -> BigInt {
    BigInt::from_biguint(Sign::Plus, curve_order())
}

/// Reduces `value` into `[0, n)`, including negative inputs.
pub fn reduce(value: &BigInt, n: &BigInt) -> BigInt {
    let mut reduced = value % n;
    if reduced.is_negative() {
        reduced += n;
    }
    reduced
}

/// Modular inverse by the extended Euclidean algorithm.
///
/// Returns `None` when `a` and `n` are not coprime, including `a ≡ 0 (mod n)`.
pub fn mod_inverse(a: &BigInt, n: &BigInt) -> Option<BigInt> {
    let mut t = BigInt::zero();
    let mut new_t = BigInt::one();
    let mut r = n.clone();
    let mut new_r = reduce(a, n);

    while !new_r.is_zero() {
        let quotient = &r / &new_r;
        let temp_t = &t - &quotient * &new_t;
        t = new_t;
        new_t = temp_t;
        let temp_r = &r - &quotient * &new_r;
        r = new_r;
        new_r = temp_r;
    }

    if r != BigInt::one() {
        return None;
    }

    Some(reduce(&t, n))
}

/// Left-pads a big-endian magnitude to 32 bytes.
///
/// Returns `None` if the value needs more than 32 bytes.
pub fn to_be_bytes_32(value: &BigUint) -> Option<[u8; 32]> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return None;
    }
    let mut padded = [0u8; 32];
    let offset = 32 - bytes.len();
    padded[offset..].copy_from_slice(&bytes);
    Some(padded)
}

/// Converts a value in `[0, n)` to a k256 scalar.
pub fn biguint_to_scalar(value: &BigUint) -> Option<Scalar> {
    let padded = to_be_bytes_32(value)?;
    Option::<Scalar>::from(Scalar::from_repr(padded.into()))
}

pub fn scalar_to_decimal_string(scalar: &Scalar) -> String {
    let bytes = scalar.to_bytes();
    let biguint = BigUint::from_bytes_be(&bytes);
    biguint.to_string()
}

pub fn scalar_to_hex_string(scalar: &Scalar) -> String {
    hex::encode(scalar.to_bytes())
}
