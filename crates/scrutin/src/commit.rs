//! The commitment/nullifier engine.
//!
//! Pure, deterministic derivations. Every output is a field element and
//! every family hashes under its own domain ([`Domain`]) so no two
//! families can collide:
//!
//! | Artifact | Derivation |
//! | -------- | ---------- |
//! | [`VoteNullifier`] | `H(D_VOTE_NULL, nk, ballot_id)` |
//! | [`VoteCommitment`] | `H2(H1(D_VOTE_COMMIT, ballot_id, nf, vk), choice, weight, rho)` |
//! | [`CommitmentNullifier`] | `H(D_VOTE_COMMIT, nk, old_commitment)` |
//! | [`PositionCommitment`] | `H2(H1(D_POSITION, ballot_id, vk, choice), amount, weight, rho)` |
//! | [`PositionNullifier`] | `H(D_POSITION, nk, position_commitment)` |
//! | [`PayoutCommitment`] | `H(D_TOKEN, vk, mint, net_payout, rho)` |
//!
//! The vote nullifier is derived **once** per `(voter, ballot)` and stays
//! stable across vote changes: it is the double-vote guard, not
//! re-randomized. Changing a vote retires the stale commitment through a
//! [`CommitmentNullifier`] instead, which invalidates it without exposing
//! the nullifier key.
//!
//! The two-stage `H1`/`H2` split exists only to respect the circuit
//! hash's arity limit; any single six-ary hash over the same unambiguous
//! preimage would be equivalent.

use ff::PrimeField as _;
use pasta_curves::Fp;

use crate::{
    hash::{Domain, hash_to_field},
    keys::{NullifierKey, VoterKey},
    primitives::{BallotId, Leaf, Randomness, TokenMint, VoteChoice},
};

macro_rules! engine_output {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(into = "[u8; 32]", try_from = "[u8; 32]"))]
        pub struct $name(Fp);

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

        impl From<$name> for Leaf {
            fn from(value: $name) -> Self {
                Self::from(value.0)
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
    };
}

engine_output! {
    /// The double-vote guard: one per `(voter, ballot)`, registered on the
    /// first vote, stable across vote changes.
    ///
    /// Registering the same value twice is the sole double-voting defense,
    /// enforced by the state tree's insert-if-absent semantics — never
    /// re-derived and checked locally.
    VoteNullifier
}

engine_output! {
    /// A hiding, binding digest of one snapshot vote:
    /// `(ballot_id, nf, vk, choice, weight, rho)`.
    ///
    /// Replaced on every vote change; the retired value is marked stale by
    /// a [`CommitmentNullifier`].
    VoteCommitment
}

engine_output! {
    /// Retires a stale [`VoteCommitment`] on a vote change without
    /// exposing the nullifier key.
    CommitmentNullifier
}

engine_output! {
    /// A hiding, binding digest of one locked token position
    /// (spend-to-vote): `(ballot_id, vk, choice, amount, weight, rho)`.
    PositionCommitment
}

engine_output! {
    /// Marks a [`PositionCommitment`] superseded, closed, or claimed.
    PositionNullifier
}

engine_output! {
    /// A commitment to the net payout owed to a winning position on the
    /// confidential token leg.
    PayoutCommitment
}

impl VoteNullifier {
    /// `nf_vote = H(D_VOTE_NULL, nk, ballot_id)`.
    #[must_use]
    pub fn derive(nk: &NullifierKey, ballot: BallotId) -> Self {
        Self(hash_to_field(
            Domain::VoteNullifier,
            &[(*nk).into(), ballot.into()],
        ))
    }
}

impl VoteCommitment {
    /// Two-stage commitment over the full vote preimage.
    ///
    /// `H1 = H(D_VOTE_COMMIT, ballot_id, nf, vk)`, then
    /// `cm = H(D_VOTE_COMMIT, H1, choice, weight, rho)`.
    #[must_use]
    pub fn derive(
        ballot: BallotId,
        nullifier: VoteNullifier,
        voter: VoterKey,
        choice: VoteChoice,
        weight: u64,
        rho: Randomness,
    ) -> Self {
        let stage1 = hash_to_field(
            Domain::VoteCommitment,
            &[ballot.into(), nullifier.into(), voter.into()],
        );
        Self(hash_to_field(
            Domain::VoteCommitment,
            &[stage1, choice.to_field(), Fp::from(weight), rho.into()],
        ))
    }
}

impl CommitmentNullifier {
    /// `nf_cm = H(D_VOTE_COMMIT, nk, old_commitment)`.
    #[must_use]
    pub fn derive(nk: &NullifierKey, stale: VoteCommitment) -> Self {
        Self(hash_to_field(
            Domain::VoteCommitment,
            &[(*nk).into(), stale.into()],
        ))
    }
}

impl PositionCommitment {
    /// Two-stage commitment over the full position preimage.
    ///
    /// `H1 = H(D_POSITION, ballot_id, vk, choice)`, then
    /// `cm = H(D_POSITION, H1, amount, weight, rho)`.
    #[must_use]
    pub fn derive(
        ballot: BallotId,
        voter: VoterKey,
        choice: VoteChoice,
        locked_amount: u64,
        weight: u64,
        rho: Randomness,
    ) -> Self {
        let stage1 = hash_to_field(
            Domain::Position,
            &[ballot.into(), voter.into(), choice.to_field()],
        );
        Self(hash_to_field(
            Domain::Position,
            &[stage1, Fp::from(locked_amount), Fp::from(weight), rho.into()],
        ))
    }
}

impl PositionNullifier {
    /// `nf_pos = H(D_POSITION, nk, position_commitment)`.
    #[must_use]
    pub fn derive(nk: &NullifierKey, commitment: PositionCommitment) -> Self {
        Self(hash_to_field(
            Domain::Position,
            &[(*nk).into(), commitment.into()],
        ))
    }
}

impl PayoutCommitment {
    /// `cm_payout = H(D_TOKEN, vk, mint, net_payout, rho)`.
    #[must_use]
    pub fn derive(voter: VoterKey, mint: TokenMint, net_payout: u64, rho: Randomness) -> Self {
        Self(hash_to_field(
            Domain::Token,
            &[voter.into(), mint.into(), Fp::from(net_payout), rho.into()],
        ))
    }
}

// =============================================================================
// Encrypted commitment preimages
// =============================================================================

/// An encrypted commitment preimage attached to a leaf at registration,
/// enabling later recovery of `(choice, weight, randomness)`.
///
/// Opaque ciphertext: the protocol only routes it; encryption is the
/// wallet collaborator's concern. The tag records which key can open it.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ciphertext {
    /// Keyed to the voter's own key (permanent-private ballots).
    UserKey(Vec<u8>),
    /// Keyed to a time-lock key that becomes available after the reveal
    /// delay (time-locked ballots).
    TimelockKey(Vec<u8>),
}
