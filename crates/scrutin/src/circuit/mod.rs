//! Circuit input assembly for the six proof families.
//!
//! The external proof backend declares, per family, a flat ABI-level
//! list of public and private inputs — ordered vectors, not maps. The
//! builders here assemble those vectors deterministically from ballot
//! and vote data plus fresh randomness; the result is never persisted
//! past proof generation.
//!
//! Common rules across all families:
//!
//! - Under `TimeLocked` / `PermanentPrivate` reveal, the **public**
//!   vote-choice input is zeroed while the true choice is always passed
//!   privately, so the circuit can check commitment consistency either
//!   way.
//! - Externally supplied merkle paths are zero-padded to
//!   [`MERKLE_DEPTH`](crate::constants::MERKLE_DEPTH), with per-level
//!   indicator bits derived from the leaf index ([`MerklePath::padded`]).
//! - Voting weight comes from the ballot's pluggable [`WeightFormula`]
//!   (default `weight = amount`).
//!
//! ## Families
//!
//! | Family | Registers | Retires |
//! | ------ | --------- | ------- |
//! | [`cast_vote`] | vote nullifier + commitment | — |
//! | [`change_vote`] | new commitment | stale commitment |
//! | [`lock_position`] | position commitment | — |
//! | [`change_position`] | new position commitment | old position |
//! | [`close_position`] | — | position |
//! | [`claim_payout`] | payout commitment | position |

use core::error::Error;
use core::fmt;

use ff::Field as _;
use pasta_curves::Fp;

use crate::{
    ballot::{BallotConfig, RevealMode},
    commit::{
        CommitmentNullifier, PayoutCommitment, PositionCommitment, VoteCommitment, VoteNullifier,
    },
    constants::MERKLE_DEPTH,
    keys::{NullifierKey, VoterKey},
    position::Position,
    primitives::{MerkleRoot, Randomness, TokenMint, VoteChoice},
};

mod attest;
mod merkle;
mod weight;

pub use attest::Attestation;
pub use merkle::MerklePath;
pub use weight::{WeightFormula, WeightOp};

/// Identifies one proof family at the backend boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CircuitId {
    /// First snapshot vote.
    CastVote,
    /// Snapshot vote change.
    ChangeVote,
    /// Spend-to-vote lock.
    LockPosition,
    /// Spend-to-vote vote change.
    ChangePosition,
    /// Early position close.
    ClosePosition,
    /// Post-resolution payout claim.
    ClaimPayout,
}

impl CircuitId {
    /// The backend's numeric circuit index.
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Self::CastVote => 0,
            Self::ChangeVote => 1,
            Self::LockPosition => 2,
            Self::ChangePosition => 3,
            Self::ClosePosition => 4,
            Self::ClaimPayout => 5,
        }
    }
}

/// Ordered public/private input vectors for one circuit invocation.
#[derive(Clone, Debug)]
pub struct ProofInputs {
    /// Public inputs, in the backend's declared order.
    pub public: Vec<Fp>,
    /// Private inputs (the witness), in the backend's declared order.
    pub private: Vec<Fp>,
}

/// Shared per-voter context for input assembly.
#[derive(Clone, Copy, Debug)]
pub struct VoterContext<'ballot> {
    /// The ballot being voted on.
    pub config: &'ballot BallotConfig,
    /// The voter's nullifier key.
    pub nullifier_key: &'ballot NullifierKey,
    /// The voter's public key.
    pub voter: VoterKey,
    /// The ballot's weight formula.
    pub formula: &'ballot WeightFormula,
}

impl VoterContext<'_> {
    /// The public form of a choice under this ballot's reveal mode.
    fn public_choice(&self, choice: VoteChoice) -> Fp {
        match self.config.reveal {
            RevealMode::Public => choice.to_field(),
            RevealMode::TimeLocked | RevealMode::PermanentPrivate => Fp::ZERO,
        }
    }

    /// Resolve the eligibility path slot: required when the ballot
    /// declares an eligibility root, empty otherwise.
    fn eligibility(
        &self,
        path: Option<&MerklePath>,
    ) -> Result<(Fp, Vec<Fp>, Vec<Fp>), InputError> {
        match (self.config.eligibility_root, path) {
            (Some(root), Some(path)) => {
                let (siblings, bits) = path.padded(MERKLE_DEPTH)?;
                Ok((root.into(), siblings, bits))
            }
            (Some(_), None) => Err(InputError::MissingEligibilityPath),
            (None, _) => {
                let (siblings, bits) = MerklePath::empty().padded(MERKLE_DEPTH)?;
                Ok((Fp::ZERO, siblings, bits))
            }
        }
    }
}

/// The prior vote's private opening, needed to retire its commitment.
#[derive(Clone, Copy, Debug)]
pub struct PriorVote {
    /// The committed choice being changed away from.
    pub choice: VoteChoice,
    /// The stale commitment's trapdoor.
    pub randomness: Randomness,
    /// The attested weight (unchanged by a vote change).
    pub weight: u64,
}

/// `CastVote` — first snapshot vote.
///
/// Public: `[ballot_id, vote_nullifier, vote_commitment, choice, weight,
/// eligibility_root]`.
/// Private: `[nk, vk, choice, amount, rho, attestation x3,
/// eligibility siblings x D, eligibility bits x D]`.
pub fn cast_vote(
    ctx: &VoterContext<'_>,
    choice: VoteChoice,
    amount: u64,
    rho: Randomness,
    attestation: &[u8],
    eligibility_path: Option<&MerklePath>,
) -> Result<ProofInputs, InputError> {
    let attestation = Attestation::parse(attestation)?;
    let weight = ctx.formula.evaluate(amount)?;
    let (root, siblings, bits) = ctx.eligibility(eligibility_path)?;

    let nullifier = VoteNullifier::derive(ctx.nullifier_key, ctx.config.id);
    let commitment =
        VoteCommitment::derive(ctx.config.id, nullifier, ctx.voter, choice, weight, rho);

    let public = vec![
        ctx.config.id.into(),
        nullifier.into(),
        commitment.into(),
        ctx.public_choice(choice),
        Fp::from(weight),
        root,
    ];
    let mut private = vec![
        (*ctx.nullifier_key).into(),
        ctx.voter.into(),
        choice.to_field(),
        Fp::from(amount),
        rho.into(),
    ];
    private.extend(attestation.elements);
    private.extend(siblings);
    private.extend(bits);
    Ok(ProofInputs { public, private })
}

/// `ChangeVote` — replace a live snapshot vote.
///
/// Requires the prior commitment's opening and its inclusion path in
/// the state tree; the stale commitment is retired through its
/// commitment nullifier without exposing the vote nullifier key.
///
/// Public: `[ballot_id, commitment_nullifier, new_commitment, choice,
/// weight, state_root]`.
/// Private: `[nk, vk, old_choice, old_rho, new_choice, new_rho,
/// prior siblings x D, prior bits x D]`.
pub fn change_vote(
    ctx: &VoterContext<'_>,
    prior: &PriorVote,
    choice: VoteChoice,
    rho: Randomness,
    prior_path: &MerklePath,
    state_root: MerkleRoot,
) -> Result<ProofInputs, InputError> {
    let nullifier = VoteNullifier::derive(ctx.nullifier_key, ctx.config.id);
    let stale = VoteCommitment::derive(
        ctx.config.id,
        nullifier,
        ctx.voter,
        prior.choice,
        prior.weight,
        prior.randomness,
    );
    let retired = CommitmentNullifier::derive(ctx.nullifier_key, stale);
    let fresh =
        VoteCommitment::derive(ctx.config.id, nullifier, ctx.voter, choice, prior.weight, rho);
    let (siblings, bits) = prior_path.padded(MERKLE_DEPTH)?;

    let public = vec![
        ctx.config.id.into(),
        retired.into(),
        fresh.into(),
        ctx.public_choice(choice),
        Fp::from(prior.weight),
        state_root.into(),
    ];
    let mut private = vec![
        (*ctx.nullifier_key).into(),
        ctx.voter.into(),
        prior.choice.to_field(),
        prior.randomness.into(),
        choice.to_field(),
        rho.into(),
    ];
    private.extend(siblings);
    private.extend(bits);
    Ok(ProofInputs { public, private })
}

/// `LockPosition` — lock tokens and vote (spend-to-vote).
///
/// The locked amount is public: the vault leg of the transaction is
/// not confidential, only the choice (per reveal mode) and the link to
/// the voter are.
///
/// Public: `[ballot_id, position_commitment, choice, amount, weight,
/// eligibility_root]`.
/// Private: `[vk, choice, rho, attestation x3, eligibility siblings x D,
/// eligibility bits x D]`.
pub fn lock_position(
    ctx: &VoterContext<'_>,
    choice: VoteChoice,
    amount: u64,
    rho: Randomness,
    attestation: &[u8],
    eligibility_path: Option<&MerklePath>,
) -> Result<ProofInputs, InputError> {
    let attestation = Attestation::parse(attestation)?;
    let weight = ctx.formula.evaluate(amount)?;
    let (root, siblings, bits) = ctx.eligibility(eligibility_path)?;

    let commitment =
        PositionCommitment::derive(ctx.config.id, ctx.voter, choice, amount, weight, rho);

    let public = vec![
        ctx.config.id.into(),
        commitment.into(),
        ctx.public_choice(choice),
        Fp::from(amount),
        Fp::from(weight),
        root,
    ];
    let mut private = vec![ctx.voter.into(), choice.to_field(), rho.into()];
    private.extend(attestation.elements);
    private.extend(siblings);
    private.extend(bits);
    Ok(ProofInputs { public, private })
}

/// `ChangePosition` — supersede a position with a new choice.
///
/// Public: `[ballot_id, position_nullifier, new_position_commitment,
/// choice, weight, state_root]`.
/// Private: `[nk, vk, old_choice, old_rho, new_choice, new_rho, amount,
/// prior siblings x D, prior bits x D]`.
pub fn change_position(
    ctx: &VoterContext<'_>,
    prior: &Position,
    next: &Position,
    prior_path: &MerklePath,
    state_root: MerkleRoot,
) -> Result<ProofInputs, InputError> {
    if prior.voter != ctx.voter || next.voter != ctx.voter {
        return Err(InputError::ForeignPosition);
    }
    let retired = prior.nullifier(ctx.nullifier_key);
    let (siblings, bits) = prior_path.padded(MERKLE_DEPTH)?;

    let public = vec![
        ctx.config.id.into(),
        retired.into(),
        next.commitment().into(),
        ctx.public_choice(next.choice),
        Fp::from(next.weight),
        state_root.into(),
    ];
    let mut private = vec![
        (*ctx.nullifier_key).into(),
        ctx.voter.into(),
        prior.choice.to_field(),
        prior.randomness.into(),
        next.choice.to_field(),
        next.randomness.into(),
        Fp::from(prior.amount),
    ];
    private.extend(siblings);
    private.extend(bits);
    Ok(ProofInputs { public, private })
}

/// `ClosePosition` — unlock tokens before resolution, withdrawing the
/// vote.
///
/// Public: `[ballot_id, position_nullifier, choice, amount, weight,
/// state_root]`.
/// Private: `[nk, vk, choice, rho, siblings x D, bits x D]`.
pub fn close_position(
    ctx: &VoterContext<'_>,
    position: &Position,
    path: &MerklePath,
    state_root: MerkleRoot,
) -> Result<ProofInputs, InputError> {
    if position.voter != ctx.voter {
        return Err(InputError::ForeignPosition);
    }
    let retired = position.nullifier(ctx.nullifier_key);
    let (siblings, bits) = path.padded(MERKLE_DEPTH)?;

    let public = vec![
        ctx.config.id.into(),
        retired.into(),
        ctx.public_choice(position.choice),
        Fp::from(position.amount),
        Fp::from(position.weight),
        state_root.into(),
    ];
    let mut private = vec![
        (*ctx.nullifier_key).into(),
        ctx.voter.into(),
        position.choice.to_field(),
        position.randomness.into(),
    ];
    private.extend(siblings);
    private.extend(bits);
    Ok(ProofInputs { public, private })
}

/// `ClaimPayout` — redeem a winning position after resolution.
///
/// Public: `[ballot_id, position_nullifier, payout_commitment,
/// net_payout, outcome, state_root]`.
/// Private: `[nk, vk, choice, rho, amount, weight, mint, payout_rho,
/// siblings x D, bits x D]`.
#[expect(clippy::too_many_arguments, reason = "flat ABI assembly")]
pub fn claim_payout(
    ctx: &VoterContext<'_>,
    position: &Position,
    mint: TokenMint,
    net_payout: u64,
    payout_rho: Randomness,
    outcome: u8,
    path: &MerklePath,
    state_root: MerkleRoot,
) -> Result<ProofInputs, InputError> {
    if position.voter != ctx.voter {
        return Err(InputError::ForeignPosition);
    }
    let retired = position.nullifier(ctx.nullifier_key);
    let payout = PayoutCommitment::derive(ctx.voter, mint, net_payout, payout_rho);
    let (siblings, bits) = path.padded(MERKLE_DEPTH)?;

    let public = vec![
        ctx.config.id.into(),
        retired.into(),
        payout.into(),
        Fp::from(net_payout),
        Fp::from(u64::from(outcome)),
        state_root.into(),
    ];
    let mut private = vec![
        (*ctx.nullifier_key).into(),
        ctx.voter.into(),
        position.choice.to_field(),
        position.randomness.into(),
        Fp::from(position.amount),
        Fp::from(position.weight),
        mint.into(),
        payout_rho.into(),
    ];
    private.extend(siblings);
    private.extend(bits);
    Ok(ProofInputs { public, private })
}

/// Errors from circuit input assembly.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputError {
    /// An attestation that is not three canonical field components.
    InvalidAttestationSignature,
    /// A supplied path deeper than the circuit's fixed depth.
    PathTooDeep {
        /// Levels supplied by the collaborator.
        supplied: usize,
        /// The circuit's fixed depth.
        depth: usize,
    },
    /// The ballot declares an eligibility root but no path was supplied.
    MissingEligibilityPath,
    /// A weight-formula opcode outside the declared set.
    UnknownOpcode(u8),
    /// A weight formula popping an empty stack.
    StackUnderflow,
    /// Weight-formula arithmetic overflow or division by zero.
    FormulaOverflow,
    /// A weight formula not leaving exactly one result.
    UnbalancedFormula,
    /// An empty weight formula.
    EmptyFormula,
    /// A position owned by a different voter key.
    ForeignPosition,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAttestationSignature => {
                write!(f, "attestation is not three canonical field components")
            }
            Self::PathTooDeep { supplied, depth } => {
                write!(f, "merkle path of {supplied} levels exceeds circuit depth {depth}")
            }
            Self::MissingEligibilityPath => {
                write!(f, "ballot declares an eligibility root but no path was supplied")
            }
            Self::UnknownOpcode(code) => write!(f, "unknown weight-formula opcode {code:#x}"),
            Self::StackUnderflow => write!(f, "weight formula popped an empty stack"),
            Self::FormulaOverflow => write!(f, "weight formula arithmetic overflow"),
            Self::UnbalancedFormula => {
                write!(f, "weight formula must leave exactly one result")
            }
            Self::EmptyFormula => write!(f, "weight formula is empty"),
            Self::ForeignPosition => write!(f, "position belongs to a different voter"),
        }
    }
}

impl Error for InputError {}
