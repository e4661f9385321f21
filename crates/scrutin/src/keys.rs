//! Voter key material.
//!
//! ## Key hierarchy
//!
//! A stealth spending key (`sk`) is raw 32-byte entropy held by the
//! voter's wallet. Two children are derived from it by `PRF^expand`
//! ([`PrfExpand`](crate::constants)), each under its own single-byte
//! domain separator:
//!
//! - `nk`: the **nullifier key** — the only path by which `sk` enters a
//!   public artifact. Vote and position nullifiers are
//!   `H(domain, nk, context)`; publishing them reveals nothing about `sk`.
//! - `vk`: the **voter key** — the public identifier committed into vote
//!   and position commitments. Not an on-chain address; eligibility and
//!   payment coordination happen through the external collaborators.
//!
//! Spending keys are never hashed directly into a public artifact, only
//! through this indirection.

use ff::{FromUniformBytes as _, PrimeField as _};
use pasta_curves::Fp;
use rand::{CryptoRng, RngCore};

use crate::constants::PrfExpand;

/// A stealth spending key — raw 32-byte entropy.
///
/// The root key from which all other keys are derived. Must be kept
/// secret: it carries full voting (and, for spend-to-vote ballots,
/// claiming) authority.
///
/// Raw `[u8; 32]`, not a field element, preserving the full 256-bit key
/// space.
#[derive(Clone, Copy, Debug)]
pub struct StealthSpendingKey([u8; 32]);

impl From<[u8; 32]> for StealthSpendingKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl StealthSpendingKey {
    /// Sample a fresh spending key.
    pub fn random(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derive `nk` from `sk`.
    ///
    /// `nk = ToField(PRF^expand_sk([0x01]))` — BLAKE2b-512 reduced to Fp.
    #[must_use]
    pub fn nullifier_key(&self) -> NullifierKey {
        NullifierKey(Fp::from_uniform_bytes(&PrfExpand::NK.with(&self.0)))
    }

    /// Derive `vk` from `sk`.
    ///
    /// `vk = ToField(PRF^expand_sk([0x02]))` — BLAKE2b-512 reduced to Fp.
    #[must_use]
    pub fn voter_key(&self) -> VoterKey {
        VoterKey(Fp::from_uniform_bytes(&PrfExpand::VK.with(&self.0)))
    }
}

/// The nullifier key `nk`.
///
/// Deterministic per spending key. Used in every nullifier derivation:
/// `nf = H(domain, nk, context)`. Knowledge of `nk` allows observing
/// whether this voter's artifacts have been spent, but does not confer
/// voting authority on its own — proofs also require the private opening
/// of the commitment being acted on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NullifierKey(Fp);

impl From<NullifierKey> for Fp {
    fn from(nk: NullifierKey) -> Self {
        nk.0
    }
}

/// The voter key `vk` — the public identifier bound into commitments.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "[u8; 32]", try_from = "[u8; 32]"))]
pub struct VoterKey(Fp);

impl From<Fp> for VoterKey {
    fn from(element: Fp) -> Self {
        Self(element)
    }
}

impl From<VoterKey> for Fp {
    fn from(vk: VoterKey) -> Self {
        vk.0
    }
}

impl From<VoterKey> for [u8; 32] {
    fn from(vk: VoterKey) -> Self {
        vk.0.to_repr()
    }
}

impl TryFrom<[u8; 32]> for VoterKey {
    type Error = &'static str;

    fn try_from(bytes: [u8; 32]) -> Result<Self, Self::Error> {
        Option::from(Fp::from_repr(bytes))
            .map(Self)
            .ok_or("invalid field element")
    }
}
