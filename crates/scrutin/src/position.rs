//! Per-voter vote records and locked token positions.
//!
//! Wallet-side bookkeeping for the two binding modes:
//!
//! - **Snapshot**: a [`VoteRecord`] pairs the stable vote nullifier with
//!   the current commitment. Created on first vote, its commitment is
//!   replaced on change-vote, never deleted.
//! - **SpendToVote**: a [`Position`] binds the locked amount and choice.
//!   Created when tokens lock; superseded (old nullified, new created)
//!   on change-vote; terminated on close-position or claim.
//!
//! Both hold only the voter's own openings; the ledger sees the derived
//! commitments and nullifiers as opaque tree leaves.

use rand::RngCore;

use crate::{
    commit::{PositionCommitment, PositionNullifier, VoteCommitment, VoteNullifier},
    keys::{NullifierKey, VoterKey},
    primitives::{BallotId, Randomness, VoteChoice},
};

/// A snapshot-mode vote record, keyed by `(ballot, voter)`.
///
/// The nullifier is derived once and stays stable across vote changes;
/// the commitment is replaced on change.
#[derive(Clone, Copy, Debug)]
pub struct VoteRecord {
    /// The ballot voted on.
    pub ballot: BallotId,
    /// The stable double-vote guard.
    pub nullifier: VoteNullifier,
    /// The live commitment.
    pub commitment: VoteCommitment,
}

impl VoteRecord {
    /// Record a first vote.
    #[must_use]
    pub const fn new(ballot: BallotId, nullifier: VoteNullifier, commitment: VoteCommitment) -> Self {
        Self {
            ballot,
            nullifier,
            commitment,
        }
    }

    /// Swap in the commitment of a changed vote, returning the stale one
    /// (whose [`CommitmentNullifier`](crate::commit::CommitmentNullifier)
    /// the change proof registers).
    pub fn replace_commitment(&mut self, fresh: VoteCommitment) -> VoteCommitment {
        core::mem::replace(&mut self.commitment, fresh)
    }
}

/// A spend-to-vote position: the voter's private opening of a
/// [`PositionCommitment`].
#[derive(Clone, Copy, Debug)]
pub struct Position {
    /// The ballot voted on.
    pub ballot: BallotId,
    /// The owning voter key.
    pub voter: VoterKey,
    /// The committed choice.
    pub choice: VoteChoice,
    /// Tokens locked in the ballot vault.
    pub amount: u64,
    /// Voting weight (per the ballot's weight formula).
    pub weight: u64,
    /// Commitment trapdoor.
    pub randomness: Randomness,
}

impl Position {
    /// The position commitment over this opening.
    #[must_use]
    pub fn commitment(&self) -> PositionCommitment {
        PositionCommitment::derive(
            self.ballot,
            self.voter,
            self.choice,
            self.amount,
            self.weight,
            self.randomness,
        )
    }

    /// The nullifier retiring this position once superseded, closed, or
    /// claimed.
    #[must_use]
    pub fn nullifier(&self, nk: &NullifierKey) -> PositionNullifier {
        PositionNullifier::derive(nk, self.commitment())
    }

    /// The successor position for a change-vote: same lock, new choice,
    /// fresh randomness.
    #[must_use]
    pub fn supersede(&self, choice: VoteChoice, rng: &mut impl RngCore) -> Self {
        Self {
            choice,
            randomness: Randomness::random(rng),
            ..*self
        }
    }
}
