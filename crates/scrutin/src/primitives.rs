//! Field-element newtypes shared across the protocol.

use ff::{Field as _, PrimeField as _};
use pasta_curves::Fp;
use rand::RngCore;

use crate::constants::{RANK_BITS, RANKED_SLOTS};

/// A 256-bit ballot identifier, carried as a field element.
///
/// Ballot ids thread through every commitment and nullifier derivation,
/// binding artifacts to one ballot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "[u8; 32]", try_from = "[u8; 32]"))]
pub struct BallotId(Fp);

/// A 256-bit operation identifier threading all phases of one voting
/// action together.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "[u8; 32]", try_from = "[u8; 32]"))]
pub struct OperationId(Fp);

/// An addressed leaf in the compressed state tree.
///
/// The tree does not distinguish commitments from nullifiers; both are
/// opaque field-element addresses owned by the collaborator. Every
/// commitment and nullifier type converts into a `Leaf` at the tree
/// boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "[u8; 32]", try_from = "[u8; 32]"))]
pub struct Leaf(Fp);

/// A merkle root of the compressed state tree or of an eligibility set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "[u8; 32]", try_from = "[u8; 32]"))]
pub struct MerkleRoot(Fp);

/// A token mint identifier on the confidential token leg.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "[u8; 32]", try_from = "[u8; 32]"))]
pub struct TokenMint(Fp);

/// Commitment randomness — the trapdoor that blinds a vote or position
/// commitment. Fresh per commitment; replaced on every vote change.
#[derive(Clone, Copy, Debug)]
pub struct Randomness(Fp);

impl Randomness {
    /// Generate a fresh random trapdoor.
    pub fn random(rng: &mut impl RngCore) -> Self {
        Self(Fp::random(rng))
    }
}

macro_rules! field_conversions {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<Fp> for $name {
                fn from(element: Fp) -> Self {
                    Self(element)
                }
            }

            impl From<$name> for Fp {
                fn from(value: $name) -> Self {
                    value.0
                }
            }

            impl From<$name> for [u8; 32] {
                fn from(value: $name) -> Self {
                    value.0.to_repr()
                }
            }

            impl TryFrom<[u8; 32]> for $name {
                type Error = &'static str;

                fn try_from(bytes: [u8; 32]) -> Result<Self, Self::Error> {
                    Option::from(Fp::from_repr(bytes))
                        .map(Self)
                        .ok_or("invalid field element")
                }
            }
        )*
    };
}

field_conversions!(BallotId, OperationId, Leaf, MerkleRoot, TokenMint, Randomness);

impl From<u64> for BallotId {
    fn from(id: u64) -> Self {
        Self(Fp::from(id))
    }
}

impl From<u64> for OperationId {
    fn from(id: u64) -> Self {
        Self(Fp::from(id))
    }
}

// =============================================================================
// Vote choice
// =============================================================================

/// A vote choice, encoded in one 64-bit word whose meaning depends on the
/// ballot's vote kind:
///
/// - **Single / Weighted**: the option index
/// - **Approval**: a bitmap — bit `k` approves option `k`
/// - **Ranked**: sixteen 4-bit ranking slots, most preferred in the
///   lowest slot; each filled slot stores `option + 1` so that zero
///   always means an empty slot
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoteChoice(u64);

impl VoteChoice {
    /// A single-option choice (also used by weighted ballots).
    #[must_use]
    pub const fn single(option: u8) -> Self {
        Self(option as u64)
    }

    /// An approval bitmap over the given option indexes.
    #[must_use]
    pub fn approval(options: &[u8]) -> Self {
        Self(options.iter().fold(0u64, |acc, &opt| acc | (1u64 << opt)))
    }

    /// A ranking, most preferred first. Each filled slot stores
    /// `option + 1`; slots beyond the given list stay zero (empty), so
    /// a partial ranking never aliases option 0. At most
    /// [`RANKED_SLOTS`] preferences are encoded.
    #[must_use]
    pub fn ranked(preferences: &[u8]) -> Self {
        let mut word = 0u64;
        for (slot, &opt) in preferences.iter().take(RANKED_SLOTS as usize).enumerate() {
            // slot < 16, so the shift stays below 64; option indexes
            // are below 15 by config, so option + 1 fits the slot.
            let encoded = (u64::from(opt) + 1) & 0x0f;
            word |= encoded << (slot * RANK_BITS as usize);
        }
        Self(word)
    }

    /// The raw choice word.
    #[must_use]
    pub const fn word(self) -> u64 {
        self.0
    }

    /// The choice as a field element (for hashing and circuit inputs).
    #[must_use]
    pub fn to_field(self) -> Fp {
        Fp::from(self.0)
    }
}

impl From<u64> for VoteChoice {
    fn from(word: u64) -> Self {
        Self(word)
    }
}
