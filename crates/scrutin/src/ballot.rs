//! Ballot configuration and the running tally.
//!
//! A ballot combines four independent mode axes in one validated config,
//! built once at creation. Invalid combinations are either rejected by
//! [`Ballot::create`] or made unrepresentable by carrying mode-specific
//! data in the axis enums (an `Oracle` resolution cannot exist without an
//! oracle key; a `Snapshot` binding cannot exist without its height).
//!
//! Tally updates ([`Ballot::apply_vote`] and friends) are pure,
//! invariant-preserving operations. Each must be applied at most once per
//! logical event; deduplication is the caller's responsibility,
//! guaranteed upstream by nullifier uniqueness in the phase orchestrator
//! — never re-checked here.

use core::error::Error;
use core::fmt;

use crate::{
    constants::{BPS_DENOMINATOR, MAX_OPTIONS, MIN_OPTIONS, RANK_BITS},
    keys::VoterKey,
    primitives::{BallotId, MerkleRoot, VoteChoice},
};

/// Whether voting proves token ownership at a snapshot or locks tokens
/// for the ballot's duration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BindingMode {
    /// Weight is attested against balances at a ledger height; tokens
    /// stay liquid.
    Snapshot {
        /// The ledger height at which balances are attested.
        snapshot_height: u64,
    },
    /// Tokens lock in the ballot vault until close or claim.
    SpendToVote {
        /// Last instant at which winning positions may claim payouts.
        claim_deadline: i64,
    },
}

/// When, if ever, a vote choice becomes public beyond aggregates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RevealMode {
    /// The choice is a public circuit input.
    Public,
    /// The choice is hidden until a time-lock key becomes available.
    TimeLocked,
    /// The choice never leaves the commitment; only aggregates are
    /// visible.
    PermanentPrivate,
}

/// How a single choice word is interpreted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VoteKind {
    /// One option index.
    Single,
    /// A bitmap of approved options.
    Approval,
    /// Sixteen 4-bit ranking slots, most preferred first. Each filled
    /// slot stores `option + 1`; zero marks an empty slot.
    Ranked,
    /// One option index, weight-scaled (weight semantics live in the
    /// weight formula, not the choice word).
    Weighted,
}

/// How the outcome is determined after voting closes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResolutionMode {
    /// `argmax(option_weights)`, ties broken by lowest option index.
    TallyBased,
    /// A designated authority declares the outcome.
    Authority {
        /// The key entitled to declare.
        authority: VoterKey,
    },
    /// An oracle feed declares the outcome.
    Oracle {
        /// The oracle's key.
        oracle: VoterKey,
    },
}

/// Ballot lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BallotStatus {
    /// Created, voting not yet open.
    Pending,
    /// Voting window open.
    Active,
    /// Voting window ended, outcome not yet determined.
    Closed,
    /// Outcome set; spend-to-vote claims may run.
    Resolved,
    /// Terminal.
    Finalized,
}

/// The validated, immutable ballot configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BallotConfig {
    /// 256-bit ballot id.
    pub id: BallotId,
    /// Binding mode axis.
    pub binding: BindingMode,
    /// Reveal mode axis.
    pub reveal: RevealMode,
    /// Vote kind axis.
    pub kind: VoteKind,
    /// Resolution mode axis.
    pub resolution: ResolutionMode,
    /// Number of options, `2..=10`.
    pub option_count: u8,
    /// Minimum total weight for the ballot to resolve; `0` disables the
    /// quorum gate.
    pub quorum: u64,
    /// Protocol fee in basis points, at most 10 000.
    pub fee_bps: u16,
    /// Voting window open (inclusive).
    pub start_time: i64,
    /// Voting window close (exclusive). Must exceed `start_time`.
    pub end_time: i64,
    /// Optional eligibility-set root; when present, every vote proves
    /// membership.
    pub eligibility_root: Option<MerkleRoot>,
}

/// A ballot record: config plus running tally.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ballot {
    /// Immutable configuration.
    pub config: BallotConfig,
    /// Accumulated weight per option. `len() == option_count`, always.
    pub option_weights: Vec<u64>,
    /// Number of live votes.
    pub vote_count: u64,
    /// Total credited weight; equals `option_weights.iter().sum()` at
    /// all times (approval voters are credited once per approved
    /// option).
    pub total_weight: u64,
    /// Locked tokens (spend-to-vote); equals the sum of live position
    /// amounts until finalization.
    pub vault_balance: u64,
    /// Lifecycle status.
    pub status: BallotStatus,
    /// Set only in `Resolved` / `Finalized`.
    pub outcome: Option<u8>,
}

impl Ballot {
    /// Validate a config and create the ballot in `Pending`.
    pub fn create(config: BallotConfig) -> Result<Self, BallotError> {
        if config.option_count < MIN_OPTIONS || config.option_count > MAX_OPTIONS {
            return Err(BallotError::OptionCountOutOfRange(config.option_count));
        }
        if u64::from(config.fee_bps) > BPS_DENOMINATOR {
            return Err(BallotError::FeeExceedsMax(config.fee_bps));
        }
        if config.end_time <= config.start_time {
            return Err(BallotError::WindowInverted);
        }
        if let BindingMode::SpendToVote { claim_deadline } = config.binding {
            if claim_deadline < config.end_time {
                return Err(BallotError::ClaimDeadlineBeforeClose);
            }
        }
        Ok(Self {
            option_weights: vec![0; usize::from(config.option_count)],
            vote_count: 0,
            total_weight: 0,
            vault_balance: 0,
            status: BallotStatus::Pending,
            outcome: None,
            config,
        })
    }

    /// Whether the voting window is open at `now`.
    #[must_use]
    pub fn is_open(&self, now: i64) -> bool {
        matches!(self.status, BallotStatus::Active)
            && now >= self.config.start_time
            && now < self.config.end_time
    }

    /// `Pending -> Active` once the window has opened.
    pub fn activate(&mut self, now: i64) -> Result<(), BallotError> {
        match self.status {
            BallotStatus::Pending if now >= self.config.start_time => {
                self.status = BallotStatus::Active;
                Ok(())
            }
            BallotStatus::Pending => Err(BallotError::NotActive),
            BallotStatus::Active
            | BallotStatus::Closed
            | BallotStatus::Resolved
            | BallotStatus::Finalized => Err(BallotError::StatusConflict(self.status)),
        }
    }

    /// `Active -> Closed` once the window has ended.
    ///
    /// Fails `VotingPeriodNotEnded` while votes may still land.
    pub fn close(&mut self, now: i64) -> Result<(), BallotError> {
        match self.status {
            BallotStatus::Active if now >= self.config.end_time => {
                self.status = BallotStatus::Closed;
                Ok(())
            }
            BallotStatus::Active => Err(BallotError::VotingPeriodNotEnded),
            BallotStatus::Pending
            | BallotStatus::Closed
            | BallotStatus::Resolved
            | BallotStatus::Finalized => Err(BallotError::StatusConflict(self.status)),
        }
    }

    /// Apply one new vote to the tally.
    ///
    /// Credits `weight` to each of the choice's tally buckets, counts
    /// the voter, and grows `total_weight` by the credited amount, so
    /// `sum(option_weights) == total_weight` holds across every vote
    /// kind. Fails `NotActive` if the window has closed since the
    /// vote's proof was produced.
    pub fn apply_vote(
        &mut self,
        choice: VoteChoice,
        weight: u64,
        now: i64,
    ) -> Result<(), BallotError> {
        if !self.is_open(now) {
            return Err(BallotError::NotActive);
        }
        let credited = self.credit(choice, weight)?;
        self.total_weight = self
            .total_weight
            .checked_add(credited)
            .ok_or(BallotError::WeightOverflow)?;
        self.vote_count = self.vote_count.saturating_add(1);
        Ok(())
    }

    /// Move a live vote's weight from `old` to `new` buckets.
    ///
    /// `vote_count` is unchanged: the voter was already counted.
    /// `total_weight` moves only when the bucket counts differ (an
    /// approval vote widening or narrowing its set).
    pub fn apply_vote_change(
        &mut self,
        old: VoteChoice,
        new: VoteChoice,
        weight: u64,
        now: i64,
    ) -> Result<(), BallotError> {
        if !self.is_open(now) {
            return Err(BallotError::NotActive);
        }
        // Validate the new choice before the old buckets are touched.
        self.buckets(new)?;
        let debited = self.debit(old, weight)?;
        let credited = self.credit(new, weight)?;
        let total = self
            .total_weight
            .checked_sub(debited)
            .ok_or(BallotError::WeightUnderflow)?;
        self.total_weight = total
            .checked_add(credited)
            .ok_or(BallotError::WeightOverflow)?;
        Ok(())
    }

    /// Remove a live vote entirely (close-position).
    pub fn apply_close(
        &mut self,
        choice: VoteChoice,
        weight: u64,
        now: i64,
    ) -> Result<(), BallotError> {
        if !self.is_open(now) {
            return Err(BallotError::NotActive);
        }
        let debited = self.debit(choice, weight)?;
        self.total_weight = self
            .total_weight
            .checked_sub(debited)
            .ok_or(BallotError::WeightUnderflow)?;
        self.vote_count = self.vote_count.saturating_sub(1);
        Ok(())
    }

    /// Record tokens entering the vault (spend-to-vote lock).
    pub fn lock_tokens(&mut self, amount: u64) -> Result<(), BallotError> {
        self.vault_balance = self
            .vault_balance
            .checked_add(amount)
            .ok_or(BallotError::WeightOverflow)?;
        Ok(())
    }

    /// Record tokens leaving the vault (close-position or claim).
    pub fn release_tokens(&mut self, amount: u64) -> Result<(), BallotError> {
        self.vault_balance = self
            .vault_balance
            .checked_sub(amount)
            .ok_or(BallotError::WeightUnderflow)?;
        Ok(())
    }

    /// The option indexes a choice word credits under this ballot's vote
    /// kind. Rejects indexes at or beyond `option_count`.
    fn buckets(&self, choice: VoteChoice) -> Result<Vec<usize>, BallotError> {
        let count = u64::from(self.config.option_count);
        let word = choice.word();
        match self.config.kind {
            VoteKind::Single | VoteKind::Weighted => {
                if word >= count {
                    return Err(BallotError::InvalidChoice(choice));
                }
                usize::try_from(word)
                    .map(|ix| vec![ix])
                    .map_err(|_| BallotError::InvalidChoice(choice))
            }
            VoteKind::Approval => {
                if word == 0 || word >> self.config.option_count != 0 {
                    return Err(BallotError::InvalidChoice(choice));
                }
                Ok((0..usize::from(self.config.option_count))
                    .filter(|ix| word & (1u64 << ix) != 0)
                    .collect())
            }
            VoteKind::Ranked => {
                // Slots store option + 1; zero is an empty slot. Only
                // the top preference is bucketed; full rankings are
                // consulted at resolution via `is_winner`.
                let top = word & ((1u64 << RANK_BITS) - 1);
                if top == 0 || top - 1 >= count {
                    return Err(BallotError::InvalidChoice(choice));
                }
                usize::try_from(top - 1)
                    .map(|ix| vec![ix])
                    .map_err(|_| BallotError::InvalidChoice(choice))
            }
        }
    }

    /// Credit `weight` to each bucket, returning the total credited.
    fn credit(&mut self, choice: VoteChoice, weight: u64) -> Result<u64, BallotError> {
        let mut credited = 0u64;
        for ix in self.buckets(choice)? {
            let Some(slot) = self.option_weights.get_mut(ix) else {
                return Err(BallotError::InvalidChoice(choice));
            };
            *slot = slot.checked_add(weight).ok_or(BallotError::WeightOverflow)?;
            credited = credited
                .checked_add(weight)
                .ok_or(BallotError::WeightOverflow)?;
        }
        Ok(credited)
    }

    /// Debit `weight` from each bucket, returning the total debited.
    fn debit(&mut self, choice: VoteChoice, weight: u64) -> Result<u64, BallotError> {
        let mut debited = 0u64;
        for ix in self.buckets(choice)? {
            let Some(slot) = self.option_weights.get_mut(ix) else {
                return Err(BallotError::InvalidChoice(choice));
            };
            *slot = slot
                .checked_sub(weight)
                .ok_or(BallotError::WeightUnderflow)?;
            debited = debited
                .checked_add(weight)
                .ok_or(BallotError::WeightOverflow)?;
        }
        Ok(debited)
    }
}

/// Errors from ballot construction and tally updates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BallotError {
    /// Option count outside `2..=10`.
    OptionCountOutOfRange(u8),
    /// Fee above 10 000 bps.
    FeeExceedsMax(u16),
    /// `end_time <= start_time`.
    WindowInverted,
    /// A spend-to-vote claim deadline before the voting window closes.
    ClaimDeadlineBeforeClose,
    /// The ballot is not accepting votes (window closed, or status is
    /// not `Active`).
    NotActive,
    /// Close/resolve attempted while the voting window is still open.
    VotingPeriodNotEnded,
    /// A lifecycle transition from the wrong status.
    StatusConflict(BallotStatus),
    /// A choice word naming options beyond `option_count`, or empty.
    InvalidChoice(VoteChoice),
    /// Tally arithmetic overflow.
    WeightOverflow,
    /// Debit below zero — a change/close event replayed or never
    /// credited.
    WeightUnderflow,
}

impl fmt::Display for BallotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OptionCountOutOfRange(n) => write!(f, "option count {n} outside 2..=10"),
            Self::FeeExceedsMax(bps) => write!(f, "fee {bps} bps exceeds 10000"),
            Self::WindowInverted => write!(f, "end_time must exceed start_time"),
            Self::ClaimDeadlineBeforeClose => {
                write!(f, "claim deadline precedes the voting window close")
            }
            Self::NotActive => write!(f, "ballot is not accepting votes"),
            Self::VotingPeriodNotEnded => write!(f, "voting period has not ended"),
            Self::StatusConflict(status) => write!(f, "invalid transition from {status:?}"),
            Self::InvalidChoice(choice) => write!(f, "choice {:#x} is invalid", choice.word()),
            Self::WeightOverflow => write!(f, "tally weight overflow"),
            Self::WeightUnderflow => write!(f, "tally weight underflow"),
        }
    }
}

impl Error for BallotError {}
