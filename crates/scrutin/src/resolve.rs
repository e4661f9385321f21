//! Outcome resolution and payout computation.
//!
//! After the voting window closes a ballot resolves to one winning
//! option per its resolution mode, gated by quorum. Failing quorum is a
//! valid terminal result, not a fault: the outcome stays unset and
//! spend-to-vote finalization is blocked.
//!
//! Payout arithmetic is integer-only with wide (u128) intermediates so
//! the product `weight * total_pool` cannot overflow before division,
//! and truncating division throughout.

use core::error::Error;
use core::fmt;

use crate::{
    ballot::{Ballot, BallotError, BallotStatus, BindingMode, ResolutionMode, VoteKind},
    constants::{BPS_DENOMINATOR, RANK_BITS, RANKED_SLOTS},
    primitives::VoteChoice,
};

/// Resolve a closed ballot to its outcome.
///
/// - `TallyBased`: `argmax(option_weights)`, ties broken by lowest
///   option index; `declared` is ignored.
/// - `Authority` / `Oracle`: the caller- or oracle-declared outcome
///   (signature verification happens at the ledger boundary).
///
/// Accepts an `Active` ballot whose window has ended and closes it
/// first. Fails `QuorumNotMet` when a nonzero quorum exceeds the total
/// live weight.
pub fn resolve(ballot: &mut Ballot, declared: Option<u8>, now: i64) -> Result<u8, ResolveError> {
    match ballot.status {
        BallotStatus::Active => ballot.close(now).map_err(|err| match err {
            BallotError::VotingPeriodNotEnded => ResolveError::VotingPeriodNotEnded,
            _ => ResolveError::NotClosed(ballot.status),
        })?,
        BallotStatus::Closed => {}
        BallotStatus::Resolved | BallotStatus::Finalized => {
            return Err(ResolveError::AlreadyResolved);
        }
        BallotStatus::Pending => return Err(ResolveError::NotClosed(BallotStatus::Pending)),
    }

    if ballot.config.quorum > 0 && ballot.total_weight < ballot.config.quorum {
        return Err(ResolveError::QuorumNotMet {
            total_weight: ballot.total_weight,
            quorum: ballot.config.quorum,
        });
    }

    let outcome = match ballot.config.resolution {
        ResolutionMode::TallyBased => leading_option(&ballot.option_weights),
        ResolutionMode::Authority { .. } | ResolutionMode::Oracle { .. } => {
            let declared = declared.ok_or(ResolveError::OutcomeRequired)?;
            if declared >= ballot.config.option_count {
                return Err(ResolveError::InvalidOutcome(declared));
            }
            declared
        }
    };

    ballot.outcome = Some(outcome);
    ballot.status = BallotStatus::Resolved;
    Ok(outcome)
}

/// `Resolved -> Finalized`.
///
/// For spend-to-vote ballots the claim window must have passed so that
/// every winning position had its chance to claim.
pub fn finalize(ballot: &mut Ballot, now: i64) -> Result<(), ResolveError> {
    match ballot.status {
        BallotStatus::Resolved => {}
        BallotStatus::Pending | BallotStatus::Active | BallotStatus::Closed => {
            return Err(ResolveError::NotResolved(ballot.status));
        }
        BallotStatus::Finalized => return Err(ResolveError::AlreadyResolved),
    }
    if let BindingMode::SpendToVote { claim_deadline } = ballot.config.binding {
        if now <= claim_deadline {
            return Err(ResolveError::ClaimWindowOpen);
        }
    }
    ballot.status = BallotStatus::Finalized;
    Ok(())
}

/// `argmax(option_weights)` with ties broken by lowest index.
fn leading_option(option_weights: &[u64]) -> u8 {
    let mut best_ix = 0usize;
    let mut best = 0u64;
    for (ix, &weight) in option_weights.iter().enumerate() {
        if weight > best {
            best = weight;
            best_ix = ix;
        }
    }
    u8::try_from(best_ix).unwrap_or(u8::MAX)
}

/// Whether a committed choice wins under the resolved outcome.
///
/// - `Single` / `Weighted`: exact match
/// - `Approval`: bit `outcome` set in the choice bitmap
/// - `Ranked`: `outcome` present in any filled 4-bit ranking slot
///   (slots store `option + 1`; zero slots are empty)
#[must_use]
pub fn is_winner(choice: VoteChoice, outcome: u8, kind: VoteKind) -> bool {
    let word = choice.word();
    match kind {
        VoteKind::Single | VoteKind::Weighted => word == u64::from(outcome),
        VoteKind::Approval => word & (1u64 << outcome) != 0,
        VoteKind::Ranked => (0..RANKED_SLOTS).any(|slot| {
            (word >> (slot * RANK_BITS)) & ((1u64 << RANK_BITS) - 1) == u64::from(outcome) + 1
        }),
    }
}

/// Pro-rata share of the pool for one winning position.
///
/// `gross = weight * total_pool / winner_weight`, truncating; zero for
/// non-winners and when `winner_weight == 0`.
#[must_use]
pub fn gross_payout(weight: u64, total_pool: u64, winner_weight: u64) -> u64 {
    if winner_weight == 0 {
        return 0;
    }
    let wide = u128::from(weight) * u128::from(total_pool) / u128::from(winner_weight);
    // weight <= winner_weight, so the quotient fits in u64.
    u64::try_from(wide).unwrap_or(u64::MAX)
}

/// Gross payout minus the protocol fee.
///
/// `net = gross - gross * fee_bps / 10000`, truncating.
#[must_use]
pub fn net_payout(gross: u64, fee_bps: u16) -> u64 {
    let fee = u128::from(gross) * u128::from(fee_bps) / u128::from(BPS_DENOMINATOR);
    // fee <= gross since fee_bps <= 10000.
    gross.saturating_sub(u64::try_from(fee).unwrap_or(u64::MAX))
}

/// The full payout for one position: zero unless it wins.
#[must_use]
pub fn position_payout(
    choice: VoteChoice,
    weight: u64,
    outcome: u8,
    kind: VoteKind,
    total_pool: u64,
    winner_weight: u64,
    fee_bps: u16,
) -> u64 {
    if !is_winner(choice, outcome, kind) {
        return 0;
    }
    net_payout(gross_payout(weight, total_pool, winner_weight), fee_bps)
}

/// Errors from resolution and finalization.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolveError {
    /// Nonzero quorum not reached; the ballot stays `Closed` with no
    /// outcome. A first-class terminal result.
    QuorumNotMet {
        /// Live weight at close.
        total_weight: u64,
        /// The configured quorum.
        quorum: u64,
    },
    /// The voting window is still open.
    VotingPeriodNotEnded,
    /// Resolution attempted before the ballot closed.
    NotClosed(BallotStatus),
    /// The outcome was already set.
    AlreadyResolved,
    /// Authority/Oracle resolution without a declared outcome.
    OutcomeRequired,
    /// A declared outcome beyond `option_count`.
    InvalidOutcome(u8),
    /// Finalization attempted before resolution.
    NotResolved(BallotStatus),
    /// Spend-to-vote finalization attempted during the claim window.
    ClaimWindowOpen,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuorumNotMet {
                total_weight,
                quorum,
            } => write!(f, "quorum not met: {total_weight} of {quorum}"),
            Self::VotingPeriodNotEnded => write!(f, "voting period has not ended"),
            Self::NotClosed(status) => write!(f, "cannot resolve from {status:?}"),
            Self::AlreadyResolved => write!(f, "outcome already set"),
            Self::OutcomeRequired => write!(f, "resolution mode requires a declared outcome"),
            Self::InvalidOutcome(outcome) => write!(f, "declared outcome {outcome} out of range"),
            Self::NotResolved(status) => write!(f, "cannot finalize from {status:?}"),
            Self::ClaimWindowOpen => write!(f, "claim window still open"),
        }
    }
}

impl Error for ResolveError {}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        ballot::{BallotConfig, BindingMode, ResolutionMode, RevealMode},
        primitives::BallotId,
    };

    fn ballot(quorum: u64, resolution: ResolutionMode) -> Ballot {
        let mut ballot = Ballot::create(BallotConfig {
            id: BallotId::from(1u64),
            binding: BindingMode::Snapshot { snapshot_height: 5 },
            reveal: RevealMode::Public,
            kind: VoteKind::Single,
            resolution,
            option_count: 4,
            quorum,
            fee_bps: 100,
            start_time: 0,
            end_time: 100,
            eligibility_root: None,
        })
        .unwrap();
        ballot.activate(0).unwrap();
        ballot
    }

    /// Weights [15, 30, 0, 0] resolve to option 1.
    #[test]
    fn tally_based_picks_argmax() {
        let mut ballot = ballot(0, ResolutionMode::TallyBased);
        ballot.apply_vote(VoteChoice::single(0), 10, 1).unwrap();
        ballot.apply_vote(VoteChoice::single(1), 30, 2).unwrap();
        ballot.apply_vote(VoteChoice::single(0), 5, 3).unwrap();

        assert_eq!(resolve(&mut ballot, None, 100).unwrap(), 1);
        assert_eq!(ballot.outcome, Some(1));
        assert_eq!(ballot.status, BallotStatus::Resolved);
    }

    /// Equal weights resolve to the lowest option index.
    #[test]
    fn ties_break_to_lowest_index() {
        let mut ballot = ballot(0, ResolutionMode::TallyBased);
        ballot.apply_vote(VoteChoice::single(2), 10, 1).unwrap();
        ballot.apply_vote(VoteChoice::single(1), 10, 2).unwrap();
        assert_eq!(resolve(&mut ballot, None, 100).unwrap(), 1);
    }

    /// Quorum boundary: Q-1 fails, Q resolves.
    #[test]
    fn quorum_boundary() {
        let mut short = ballot(20, ResolutionMode::TallyBased);
        short.apply_vote(VoteChoice::single(0), 19, 1).unwrap();
        assert_eq!(
            resolve(&mut short, None, 100).unwrap_err(),
            ResolveError::QuorumNotMet {
                total_weight: 19,
                quorum: 20
            }
        );
        assert_eq!(short.outcome, None);
        assert_eq!(short.status, BallotStatus::Closed);

        let mut exact = ballot(20, ResolutionMode::TallyBased);
        exact.apply_vote(VoteChoice::single(0), 20, 1).unwrap();
        assert_eq!(resolve(&mut exact, None, 100).unwrap(), 0);
    }

    #[test]
    fn resolve_before_window_end_rejected() {
        let mut ballot = ballot(0, ResolutionMode::TallyBased);
        assert_eq!(
            resolve(&mut ballot, None, 50).unwrap_err(),
            ResolveError::VotingPeriodNotEnded
        );
    }

    #[test]
    fn authority_requires_declared_outcome() {
        let authority = crate::keys::StealthSpendingKey::from([1u8; 32]).voter_key();
        let mut ballot = ballot(0, ResolutionMode::Authority { authority });
        ballot.apply_vote(VoteChoice::single(0), 5, 1).unwrap();
        assert_eq!(
            resolve(&mut ballot, None, 100).unwrap_err(),
            ResolveError::OutcomeRequired
        );
        assert_eq!(resolve(&mut ballot, Some(3), 100).unwrap(), 3);

        let mut out_of_range = ballot_with_outcome();
        assert_eq!(
            resolve(&mut out_of_range, Some(4), 100).unwrap_err(),
            ResolveError::InvalidOutcome(4)
        );
    }

    fn ballot_with_outcome() -> Ballot {
        let authority = crate::keys::StealthSpendingKey::from([1u8; 32]).voter_key();
        let mut ballot = ballot(0, ResolutionMode::Authority { authority });
        ballot.apply_vote(VoteChoice::single(0), 5, 1).unwrap();
        ballot
    }

    /// Approval bitmap with bit k set wins only for outcome k.
    #[test]
    fn approval_winner_round_trip() {
        for k in 0u8..8 {
            let choice = VoteChoice::approval(&[k]);
            for outcome in 0u8..8 {
                assert_eq!(
                    is_winner(choice, outcome, VoteKind::Approval),
                    outcome == k,
                );
            }
        }
    }

    /// A ranked choice placing option k in any slot wins for outcome k.
    #[test]
    fn ranked_winner_any_slot() {
        let choice = VoteChoice::ranked(&[3, 1, 2]);
        assert!(is_winner(choice, 3, VoteKind::Ranked));
        assert!(is_winner(choice, 1, VoteKind::Ranked));
        assert!(is_winner(choice, 2, VoteKind::Ranked));
        assert!(!is_winner(choice, 5, VoteKind::Ranked));
    }

    /// Empty slots in a partial ranking are not a ranking of option 0:
    /// only a choice that actually ranks option 0 wins for it.
    #[test]
    fn partial_ranking_never_wins_unranked_options() {
        assert!(!is_winner(
            VoteChoice::ranked(&[3, 1, 2]),
            0,
            VoteKind::Ranked
        ));
        assert!(is_winner(VoteChoice::ranked(&[0]), 0, VoteKind::Ranked));
        assert!(!is_winner(VoteChoice::ranked(&[]), 0, VoteKind::Ranked));
    }

    /// fee 100 bps, pool 1_000_000, winner weight 400_000, position
    /// weight 100_000.
    #[test]
    fn payout_scenario() {
        let gross = gross_payout(100_000, 1_000_000, 400_000);
        assert_eq!(gross, 250_000);
        assert_eq!(net_payout(gross, 100), 247_500);
    }

    #[test]
    fn losers_and_empty_pools_pay_zero() {
        assert_eq!(gross_payout(10, 100, 0), 0);
        assert_eq!(
            position_payout(
                VoteChoice::single(0),
                10,
                1,
                VoteKind::Single,
                100,
                50,
                0
            ),
            0
        );
    }

    proptest! {
        /// Summing gross payouts over winners whose weights sum to the
        /// winner weight recovers the pool, up to one truncated unit per
        /// winner.
        #[test]
        fn payout_conservation(
            weights in proptest::collection::vec(1u64..=1_000_000, 1..10),
            pool in 1u64..=1_000_000_000,
        ) {
            let winner_weight: u64 = weights.iter().sum();
            let paid: u64 = weights
                .iter()
                .map(|&w| gross_payout(w, pool, winner_weight))
                .sum();
            prop_assert!(paid <= pool);
            prop_assert!(u128::from(paid) + weights.len() as u128 > u128::from(pool));
        }

        /// The fee never exceeds the gross and vanishes at 0 bps.
        #[test]
        fn net_payout_bounds(gross in 0u64..=u64::MAX / 2, fee_bps in 0u16..=10_000) {
            let net = net_payout(gross, fee_bps);
            prop_assert!(net <= gross);
            prop_assert_eq!(net_payout(gross, 0), gross);
        }
    }
}
