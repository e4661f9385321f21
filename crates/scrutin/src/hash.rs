//! Domain-separated hashing over the protocol field.
//!
//! The protocol field is $\mathbb{F}_p$, the Pallas base field. Every
//! commitment and nullifier is a field element produced by a BLAKE2b-512
//! hash with a family-specific 16-byte personalization, reduced into the
//! field via `FromUniformBytes` (unbiased 64-byte reduction).
//!
//! The circuit-side hash must agree with these values as **field
//! elements**, not merely as byte strings: all byte⇄field conversions are
//! big-endian and reduced modulo the field prime, applied uniformly
//! end-to-end ([`field_from_be_bytes`] / [`field_to_be_bytes`]).

use ff::{FromUniformBytes as _, PrimeField as _};
use pasta_curves::Fp;

use crate::constants::{
    POSITION_DOMAIN, TOKEN_DOMAIN, VOTE_COMMITMENT_DOMAIN, VOTE_NULLIFIER_DOMAIN,
};

/// A hash family, selecting the BLAKE2b personalization.
///
/// Families are mutually collision-free by personalization; within a
/// family, preimages of different arity are unambiguous because the input
/// stream length differs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Domain {
    /// Vote nullifiers — `H(D_VOTE_NULL, nk, ballot_id)`.
    VoteNullifier,
    /// Vote commitments (both stages) and stale-commitment nullifiers.
    VoteCommitment,
    /// Position commitments (both stages) and position nullifiers.
    Position,
    /// Payout commitments on the token leg.
    Token,
}

impl Domain {
    const fn personal(self) -> &'static [u8; 16] {
        match self {
            Self::VoteNullifier => VOTE_NULLIFIER_DOMAIN,
            Self::VoteCommitment => VOTE_COMMITMENT_DOMAIN,
            Self::Position => POSITION_DOMAIN,
            Self::Token => TOKEN_DOMAIN,
        }
    }
}

/// Hash field elements into the field under a domain.
///
/// `BLAKE2b-512(personal = domain, input_1 || ... || input_n)` reduced via
/// `from_uniform_bytes`. Inputs are fed as their canonical 32-byte reprs.
#[must_use]
pub fn hash_to_field(domain: Domain, inputs: &[Fp]) -> Fp {
    let mut state = blake2b_simd::Params::new()
        .hash_length(64)
        .personal(domain.personal())
        .to_state();
    for input in inputs {
        state.update(&input.to_repr());
    }
    Fp::from_uniform_bytes(state.finalize().as_array())
}

/// Interpret 32 big-endian bytes as an integer and reduce it modulo the
/// field prime.
///
/// Total (never fails): non-canonical byte strings reduce. Use
/// [`field_from_canonical_be`] where a canonical encoding is required.
#[must_use]
pub fn field_from_be_bytes(bytes: &[u8; 32]) -> Fp {
    let mut wide = [0u8; 64];
    for (dst, src) in wide.iter_mut().zip(bytes.iter().rev()) {
        *dst = *src;
    }
    Fp::from_uniform_bytes(&wide)
}

/// Canonical big-endian encoding of a field element.
#[must_use]
pub fn field_to_be_bytes(element: Fp) -> [u8; 32] {
    let mut repr = element.to_repr();
    repr.reverse();
    repr
}

/// Parse 32 big-endian bytes as a canonical field element.
///
/// Returns `None` when the integer is not below the field prime — unlike
/// [`field_from_be_bytes`], this rejects rather than reduces.
#[must_use]
pub fn field_from_canonical_be(bytes: &[u8; 32]) -> Option<Fp> {
    let mut le = *bytes;
    le.reverse();
    Option::from(Fp::from_repr(le))
}
