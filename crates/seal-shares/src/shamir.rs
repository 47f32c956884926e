//! Threshold secret sharing over GF(2^8).
//!
//! Each of the 32 key bytes is the constant term of an independent random
//! polynomial of degree `quorum - 1`; share `i` holds every polynomial
//! evaluated at `x = i`. Any `quorum` shares determine the polynomials,
//! while fewer than `quorum` are consistent with every possible key.
//!
//! Field arithmetic uses the AES reduction polynomial (x^8 + x^4 + x^3 +
//! x + 1) and is branch-free on secret data.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::ContentKey;
use crate::error::{Result, SharesError};

/// Domain separation for the key commitment carried by every share.
const KEY_CHECK_DOMAIN: &str = "seal-shares-v1-key-check";

/// Maximum number of shares: x-coordinates are the non-zero field elements.
pub const MAX_SHARES: usize = 255;

/// One share of a split key.
///
/// `key_check` commits to the key so that a combination of shares from
/// different splits, or of tampered shares, is detected instead of
/// silently yielding a wrong key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// Evaluation point, 1..=n.
    pub index: u8,
    /// Quorum the key was split with.
    pub threshold: u8,
    /// Commitment to the shared key.
    pub key_check: [u8; 32],
    /// Polynomial values at `index`, one per key byte.
    pub value: [u8; 32],
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

fn key_check(key: &ContentKey) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KEY_CHECK_DOMAIN);
    hasher.update(key.as_bytes());
    *hasher.finalize().as_bytes()
}

fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    for _ in 0..8 {
        product ^= a & (b & 1).wrapping_neg();
        let carry = (a >> 7).wrapping_neg();
        a = (a << 1) ^ (0x1b & carry);
        b >>= 1;
    }
    product
}

/// Multiplicative inverse as a^254. Zero maps to zero.
fn gf_inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp > 0 {
        if exp & 1 == 1 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

/// Evaluate a polynomial (constant term first) at `x` by Horner's rule.
fn eval(coeffs: &[u8], x: u8) -> u8 {
    coeffs.iter().rev().fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
}

/// Lagrange interpolation at zero over the points `(xs[j], ys[j])`.
fn interpolate_at_zero(xs: &[u8], ys: &[u8]) -> u8 {
    let mut secret = 0u8;
    for (j, (&xj, &yj)) in xs.iter().zip(ys).enumerate() {
        let mut basis = 1u8;
        for (m, &xm) in xs.iter().enumerate() {
            if m != j {
                basis = gf_mul(basis, gf_mul(xm, gf_inv(xm ^ xj)));
            }
        }
        secret ^= gf_mul(yj, basis);
    }
    secret
}

/// Split `key` into `n` shares, any `quorum` of which reconstruct it.
pub fn split(key: &ContentKey, n: usize, quorum: usize) -> Result<Vec<Share>> {
    if quorum == 0 {
        return Err(SharesError::InvalidParameters("quorum must be at least 1".into()));
    }
    if n < quorum {
        return Err(SharesError::InvalidParameters(format!(
            "cannot split into {} shares with quorum {}",
            n, quorum
        )));
    }
    if n > MAX_SHARES {
        return Err(SharesError::InvalidParameters(format!(
            "at most {} shares supported, got {}",
            MAX_SHARES, n
        )));
    }

    let check = key_check(key);
    let mut rng = rand::thread_rng();
    let mut shares: Vec<Share> = (1..=n)
        .map(|i| Share {
            index: i as u8,
            threshold: quorum as u8,
            key_check: check,
            value: [0u8; 32],
        })
        .collect();

    let mut coeffs = Zeroizing::new(vec![0u8; quorum]);
    for (byte_pos, &secret_byte) in key.as_bytes().iter().enumerate() {
        coeffs[0] = secret_byte;
        rng.fill_bytes(&mut coeffs[1..]);
        for share in shares.iter_mut() {
            share.value[byte_pos] = eval(&coeffs, share.index);
        }
    }

    Ok(shares)
}

/// Reconstruct a key from at least `quorum` shares of one split.
///
/// Byte-identical duplicates are tolerated; two different shares claiming
/// the same index are not. All given shares take part in interpolation,
/// so a tampered share surfaces as [`SharesError::InconsistentShare`].
pub fn combine(shares: &[Share], quorum: usize) -> Result<ContentKey> {
    if quorum == 0 {
        return Err(SharesError::InvalidParameters("quorum must be at least 1".into()));
    }

    let mut distinct: Vec<&Share> = Vec::with_capacity(shares.len());
    for share in shares {
        if share.index == 0 {
            return Err(SharesError::InconsistentShare("share index 0".into()));
        }
        if usize::from(share.threshold) != quorum {
            return Err(SharesError::InconsistentShare(format!(
                "share {} was split with quorum {}, expected {}",
                share.index, share.threshold, quorum
            )));
        }
        match distinct.iter().find(|s| s.index == share.index) {
            Some(existing) if *existing == share => continue,
            Some(_) => {
                return Err(SharesError::InconsistentShare(format!(
                    "conflicting shares for index {}",
                    share.index
                )))
            }
            None => distinct.push(share),
        }
    }

    if distinct.len() < quorum {
        return Err(SharesError::InsufficientShares {
            needed: quorum,
            got: distinct.len(),
        });
    }

    let expected_check = distinct[0].key_check;
    if distinct.iter().any(|s| s.key_check != expected_check) {
        return Err(SharesError::InconsistentShare(
            "shares come from different keys".into(),
        ));
    }

    let xs: Vec<u8> = distinct.iter().map(|s| s.index).collect();
    let mut ys = Zeroizing::new(vec![0u8; distinct.len()]);
    let mut key_bytes = [0u8; 32];
    for (byte_pos, out) in key_bytes.iter_mut().enumerate() {
        for (y, share) in ys.iter_mut().zip(&distinct) {
            *y = share.value[byte_pos];
        }
        *out = interpolate_at_zero(&xs, &ys);
    }

    let key = ContentKey::from_bytes(key_bytes);
    key_bytes.zeroize();

    if key_check(&key) != expected_check {
        return Err(SharesError::InconsistentShare(
            "reconstructed key does not match commitment".into(),
        ));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_gf_inverse() {
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1, "a = {}", a);
        }
    }

    #[test]
    fn test_gf_mul_known_value() {
        // FIPS-197 worked example: {57} x {83} = {c1}.
        assert_eq!(gf_mul(0x57, 0x83), 0xc1);
    }

    #[test]
    fn test_two_of_two() {
        let key = ContentKey::generate();
        let shares = split(&key, 2, 2).unwrap();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].index, 1);
        assert_eq!(shares[1].index, 2);

        let recovered = combine(&shares, 2).unwrap();
        assert_eq!(recovered.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_one_share_is_consistent_with_any_key() {
        // With quorum 2, a single point admits a line through every
        // possible constant term.
        let key = ContentKey::from_bytes([0x11; 32]);
        let shares = split(&key, 2, 2).unwrap();
        let y1 = shares[0].value[0];

        for candidate in [0x00u8, 0x11, 0x7f, 0xff] {
            let slope = y1 ^ candidate;
            let y2 = eval(&[candidate, slope], 2);
            assert_eq!(interpolate_at_zero(&[1, 2], &[y1, y2]), candidate);
        }
    }

    #[test]
    fn test_insufficient_shares() {
        let key = ContentKey::generate();
        let shares = split(&key, 3, 2).unwrap();
        assert!(matches!(
            combine(&shares[..1], 2),
            Err(SharesError::InsufficientShares { needed: 2, got: 1 })
        ));
        assert!(matches!(
            combine(&[], 2),
            Err(SharesError::InsufficientShares { needed: 2, got: 0 })
        ));
    }

    #[test]
    fn test_duplicate_share_does_not_count_twice() {
        let key = ContentKey::generate();
        let shares = split(&key, 3, 2).unwrap();
        let doubled = vec![shares[0].clone(), shares[0].clone()];
        assert!(matches!(
            combine(&doubled, 2),
            Err(SharesError::InsufficientShares { needed: 2, got: 1 })
        ));
    }

    #[test]
    fn test_tampered_share_detected() {
        let key = ContentKey::generate();
        let mut shares = split(&key, 3, 2).unwrap();
        shares[1].value[5] ^= 0x40;

        assert!(matches!(
            combine(&shares[..2], 2),
            Err(SharesError::InconsistentShare(_))
        ));
    }

    #[test]
    fn test_mixed_splits_detected() {
        let a = split(&ContentKey::generate(), 2, 2).unwrap();
        let b = split(&ContentKey::generate(), 2, 2).unwrap();
        assert!(matches!(
            combine(&[a[0].clone(), b[1].clone()], 2),
            Err(SharesError::InconsistentShare(_))
        ));
    }

    #[test]
    fn test_conflicting_index_detected() {
        let key = ContentKey::generate();
        let shares = split(&key, 2, 2).unwrap();
        let mut forged = shares[0].clone();
        forged.value[0] ^= 1;
        assert!(matches!(
            combine(&[shares[0].clone(), forged, shares[1].clone()], 2),
            Err(SharesError::InconsistentShare(_))
        ));
    }

    #[test]
    fn test_quorum_mismatch_detected() {
        let key = ContentKey::generate();
        let shares = split(&key, 3, 3).unwrap();
        assert!(matches!(
            combine(&shares[..2], 2),
            Err(SharesError::InconsistentShare(_))
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        let key = ContentKey::generate();
        assert!(matches!(split(&key, 2, 0), Err(SharesError::InvalidParameters(_))));
        assert!(matches!(split(&key, 1, 2), Err(SharesError::InvalidParameters(_))));
        assert!(matches!(split(&key, 256, 2), Err(SharesError::InvalidParameters(_))));
        assert!(split(&key, 255, 2).is_ok());
    }

    #[test]
    fn test_quorum_one_shares_carry_key() {
        let key = ContentKey::generate();
        let shares = split(&key, 3, 1).unwrap();
        for share in &shares {
            assert_eq!(share.value, *key.as_bytes());
            assert_eq!(combine(std::slice::from_ref(share), 1).unwrap().as_bytes(), key.as_bytes());
        }
    }

    #[test]
    fn test_debug_hides_value() {
        let shares = split(&ContentKey::from_bytes([0xee; 32]), 2, 2).unwrap();
        let rendered = format!("{:?}", shares[0]);
        assert!(rendered.contains("index"));
        assert!(!rendered.contains("value"));
    }

    fn key_and_params() -> impl Strategy<Value = ([u8; 32], usize, usize)> {
        (any::<[u8; 32]>(), 1usize..=8)
            .prop_flat_map(|(key, n)| (Just(key), Just(n), 1usize..=n))
    }

    proptest! {
        #[test]
        fn prop_any_quorum_subset_reconstructs(
            (key_bytes, n, quorum) in key_and_params(),
            seed in any::<u64>(),
        ) {
            let key = ContentKey::from_bytes(key_bytes);
            let shares = split(&key, n, quorum).unwrap();

            // Deterministic subset selection from the seed.
            let mut picked: Vec<Share> = shares.clone();
            let rotate = (seed as usize) % n;
            picked.rotate_left(rotate);
            picked.truncate(quorum);

            let recovered = combine(&picked, quorum).unwrap();
            prop_assert_eq!(recovered.as_bytes(), key.as_bytes());
        }

        #[test]
        fn prop_below_quorum_is_insufficient(
            (key_bytes, n, quorum) in key_and_params(),
        ) {
            let key = ContentKey::from_bytes(key_bytes);
            let shares = split(&key, n, quorum).unwrap();

            for take in 0..quorum {
                let is_insufficient = matches!(
                    combine(&shares[..take], quorum),
                    Err(SharesError::InsufficientShares { .. })
                );
                prop_assert!(is_insufficient);
            }
        }
    }
}
