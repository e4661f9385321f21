//! The phase orchestrator.
//!
//! Every protocol action runs the same pipeline against the two external
//! collaborators:
//!
//! 1. **submit** — verify the zero-knowledge proof against the declared
//!    public inputs;
//! 2. **verify prior** — for actions that retire an existing commitment,
//!    prove it is present in the state tree;
//! 3. **nullify** — atomically register the action's nullifier (the
//!    double-spend arbitration point; skipped for lock actions, which
//!    have nothing to retire);
//! 4. **execute** — apply the tally/vault effect to the ballot (lock
//!    actions conflict-check their new commitment first, making it
//!    their arbitration point);
//! 5. **commit** — register the new commitment (with its encrypted
//!    preimage under non-public reveal), then close.
//!
//! Each [`PendingOperation`] tracks its [`Phase`]; every orchestrator
//! method checks the phase before acting, and all phase movement
//! funnels through one internal transition function, so a crashed or
//! retried driver can never run a step twice or out of order. Failures split into retryable ([`PhaseError::retryable`]) and
//! terminal; on a retryable failure the phase is left unchanged and the
//! same call may simply be repeated. Terminal failures leave the
//! operation stuck for [`Orchestrator::abandon`].
//!
//! The orchestrator holds no lock and no leaf set of its own. Ordering
//! between concurrent voters is decided entirely by the state tree's
//! insert-if-absent: whichever nullifier insertion lands first wins, and
//! the loser sees a terminal `NullifierAlreadyExists` before any ballot
//! state was touched.

use core::error::Error;
use core::fmt;

use crate::{
    backend::{InclusionProof, ProofBackend, StateTree, TreeError},
    ballot::{Ballot, BallotError, BallotStatus, BindingMode, RevealMode},
    circuit::CircuitId,
    commit::Ciphertext,
    primitives::{BallotId, Leaf, OperationId, VoteChoice},
};

use pasta_curves::Fp;

// ==============================================================
// Pipeline state
// ==============================================================

/// Where a pending operation stands in the pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Proof verified; declaration accepted.
    ProofVerified,
    /// The prior commitment's inclusion is proven (actions with a prior
    /// only).
    CommitmentVerified,
    /// The nullifier landed in the state tree. Point of no return: the
    /// action is now the unique live action for its nullifier.
    NullifierRegistered,
    /// The ballot effect is applied.
    Executed,
    /// The new commitment landed in the state tree.
    CommitmentRegistered,
    /// Terminal: pipeline complete.
    Closed,
    /// Terminal: given up after a terminal failure.
    Abandoned,
}

/// A completed pipeline step, reported to `PendingOperation::advance`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Event {
    PriorVerified,
    NullifierRegistered,
    Executed,
    CommitmentRegistered,
    Closed,
    Abandoned,
}

/// Which protocol action an operation performs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActionKind {
    /// First vote on a snapshot ballot.
    CastVote,
    /// Replace a live vote's choice (snapshot ballots).
    ChangeVote,
    /// First vote on a spend-to-vote ballot, locking tokens.
    LockPosition,
    /// Re-point a locked position at a different option.
    ChangePosition,
    /// Unlock a position and leave the ballot before close.
    ClosePosition,
    /// Collect a winning position's payout after resolution.
    ClaimPayout,
}

impl ActionKind {
    /// The circuit family proving this action.
    #[must_use]
    pub fn circuit(self) -> CircuitId {
        match self {
            Self::CastVote => CircuitId::CastVote,
            Self::ChangeVote => CircuitId::ChangeVote,
            Self::LockPosition => CircuitId::LockPosition,
            Self::ChangePosition => CircuitId::ChangePosition,
            Self::ClosePosition => CircuitId::ClosePosition,
            Self::ClaimPayout => CircuitId::ClaimPayout,
        }
    }

    /// Whether the action retires an existing commitment and therefore
    /// runs the inclusion-proof phase.
    fn requires_prior_commitment(self) -> bool {
        matches!(
            self,
            Self::ChangeVote | Self::ChangePosition | Self::ClosePosition | Self::ClaimPayout
        )
    }

    /// Whether the action registers a new commitment. `ClosePosition`
    /// only retires state.
    fn registers_commitment(self) -> bool {
        !matches!(self, Self::ClosePosition)
    }

    /// Whether the action registers a nullifier. `LockPosition` does
    /// not: a fresh position has nothing to retire, and its commitment
    /// is the unique leaf. The position nullifier is spent later, by
    /// whichever action retires the position.
    fn registers_nullifier(self) -> bool {
        !matches!(self, Self::LockPosition)
    }
}

/// The declared (public) content of one operation, fixed at submission.
///
/// `public` is the exact public-input vector the proof was produced
/// against; the structured fields repeat the values the orchestrator
/// acts on. The proof binds the two together — the orchestrator trusts
/// the declaration only after `verify` passes.
#[derive(Clone, Debug)]
pub struct Declared {
    /// Public inputs, in the circuit's ABI order.
    pub public: Vec<Fp>,
    /// The nullifier to register. `None` for lock actions, which have
    /// nothing to retire.
    pub nullifier: Option<Leaf>,
    /// The commitment to register, for actions that produce one.
    pub commitment: Option<Leaf>,
    /// The commitment being retired, for actions with a prior.
    pub prior_commitment: Option<Leaf>,
    /// The (possibly zeroed, under private reveal) choice word.
    pub choice: VoteChoice,
    /// The choice being moved away from (change actions).
    pub prior_choice: Option<VoteChoice>,
    /// Voting weight.
    pub weight: u64,
    /// Token amount: the locked amount for position actions, the net
    /// payout for claims, zero for snapshot votes.
    pub amount: u64,
}

/// One in-flight protocol action.
#[derive(Clone, Debug)]
pub struct PendingOperation {
    /// Caller-assigned operation id, echoed in every error.
    pub operation: OperationId,
    /// The ballot acted on.
    pub ballot: BallotId,
    /// The action performed.
    pub kind: ActionKind,
    /// The verified declaration.
    pub declared: Declared,
    phase: Phase,
}

impl PendingOperation {
    /// Current pipeline phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The phase this operation must be in before its nullifier may be
    /// registered.
    fn nullify_gate(&self) -> Phase {
        if self.kind.requires_prior_commitment() {
            Phase::CommitmentVerified
        } else {
            Phase::ProofVerified
        }
    }

    /// The phase this operation must be in before execution. Lock
    /// actions skip the nullifier phase entirely.
    fn execute_gate(&self) -> Phase {
        if self.kind.registers_nullifier() {
            Phase::NullifierRegistered
        } else {
            self.nullify_gate()
        }
    }

    /// The phase that counts as "pipeline done" for this action.
    fn close_gate(&self) -> Phase {
        if self.kind.registers_commitment() {
            Phase::CommitmentRegistered
        } else {
            Phase::Executed
        }
    }

    fn expect(&self, expected: Phase) -> Result<(), Failure> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(Failure::OutOfOrder { expected })
        }
    }

    /// The single transition function. Every phase mutation funnels
    /// through here: orchestrator methods perform their external side
    /// effects (after pre-checking the same gate) and then report the
    /// completed step as an event.
    fn advance(&mut self, event: Event) -> Result<Phase, Failure> {
        let next = match event {
            Event::PriorVerified => {
                self.expect(Phase::ProofVerified)?;
                Phase::CommitmentVerified
            }
            Event::NullifierRegistered => {
                self.expect(self.nullify_gate())?;
                Phase::NullifierRegistered
            }
            Event::Executed => {
                self.expect(self.execute_gate())?;
                Phase::Executed
            }
            Event::CommitmentRegistered => {
                self.expect(Phase::Executed)?;
                Phase::CommitmentRegistered
            }
            Event::Closed => {
                // Idempotent: a driver that crashed between closing and
                // recording the close can replay it.
                if self.phase == Phase::Closed {
                    return Ok(Phase::Closed);
                }
                self.expect(self.close_gate())?;
                Phase::Closed
            }
            Event::Abandoned => {
                if self.phase == Phase::Closed {
                    return Err(Failure::AlreadyClosed);
                }
                Phase::Abandoned
            }
        };
        self.phase = next;
        Ok(next)
    }

    fn fail(&self, kind: Failure) -> PhaseError {
        PhaseError {
            ballot: self.ballot,
            operation: self.operation,
            phase: self.phase,
            kind,
        }
    }
}

// ==============================================================
// Orchestrator
// ==============================================================

/// Drives pending operations through the pipeline against the proof
/// backend and the state tree.
///
/// Stateless apart from the collaborator handles; all per-operation
/// state lives in [`PendingOperation`], all ballot state in [`Ballot`].
pub struct Orchestrator<'coll, P, T> {
    backend: &'coll P,
    tree: &'coll T,
}

impl<P, T> fmt::Debug for Orchestrator<'_, P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

impl<'coll, P: ProofBackend, T: StateTree> Orchestrator<'coll, P, T> {
    /// Bind the pipeline to its collaborators.
    pub fn new(backend: &'coll P, tree: &'coll T) -> Self {
        Self { backend, tree }
    }

    /// Phase 1: verify the proof and accept the declaration.
    ///
    /// Rejections are terminal — no `PendingOperation` is created. Also
    /// rejects structurally incomplete declarations (a change action
    /// without a prior commitment, for example) before touching the
    /// backend.
    pub fn submit_proof(
        &self,
        operation: OperationId,
        ballot: BallotId,
        kind: ActionKind,
        declared: Declared,
        proof: &[u8],
    ) -> Result<PendingOperation, PhaseError> {
        let fail = |failure| PhaseError {
            ballot,
            operation,
            phase: Phase::ProofVerified,
            kind: failure,
        };
        if kind.requires_prior_commitment() && declared.prior_commitment.is_none() {
            return Err(fail(Failure::IncompleteDeclaration("prior commitment")));
        }
        if kind.registers_nullifier() && declared.nullifier.is_none() {
            return Err(fail(Failure::IncompleteDeclaration("nullifier")));
        }
        if kind.registers_commitment() && declared.commitment.is_none() {
            return Err(fail(Failure::IncompleteDeclaration("new commitment")));
        }
        if matches!(kind, ActionKind::ChangeVote | ActionKind::ChangePosition)
            && declared.prior_choice.is_none()
        {
            return Err(fail(Failure::IncompleteDeclaration("prior choice")));
        }
        if !self.backend.verify(kind.circuit(), proof, &declared.public) {
            return Err(fail(Failure::ProofRejected));
        }
        Ok(PendingOperation {
            operation,
            ballot,
            kind,
            declared,
            phase: Phase::ProofVerified,
        })
    }

    /// Phase 2: prove the prior commitment exists (actions with a prior
    /// only).
    ///
    /// Returns the inclusion proof for audit. A missing leaf means the
    /// declaration names a commitment that was never created or was
    /// already retired — terminal.
    pub fn verify_prior_commitment(
        &self,
        op: &mut PendingOperation,
    ) -> Result<InclusionProof, PhaseError> {
        if !op.kind.requires_prior_commitment() {
            return Err(op.fail(Failure::Inapplicable));
        }
        op.expect(Phase::ProofVerified).map_err(|f| op.fail(f))?;
        let Some(prior) = op.declared.prior_commitment else {
            return Err(op.fail(Failure::IncompleteDeclaration("prior commitment")));
        };
        let inclusion = self.tree.inclusion_proof(prior).map_err(|err| {
            op.fail(match err {
                TreeError::NotFound => Failure::UnknownCommitment,
                other => tree_failure(other),
            })
        })?;
        op.advance(Event::PriorVerified).map_err(|f| op.fail(f))?;
        Ok(inclusion)
    }

    /// Phase 3: register the nullifier — the arbitration point.
    ///
    /// `AlreadyExists` from the tree is the protocol's double-vote
    /// rejection and is terminal. `StaleProof` and `Transient` leave the
    /// phase unchanged; the call may be repeated as-is.
    pub fn create_nullifier(&self, op: &mut PendingOperation) -> Result<(), PhaseError> {
        if !op.kind.registers_nullifier() {
            return Err(op.fail(Failure::Inapplicable));
        }
        op.expect(op.nullify_gate()).map_err(|f| op.fail(f))?;
        let Some(nullifier) = op.declared.nullifier else {
            return Err(op.fail(Failure::IncompleteDeclaration("nullifier")));
        };
        let validity = self
            .tree
            .validity_proof(nullifier)
            .map_err(|err| op.fail(nullifier_failure(err)))?;
        self.tree
            .insert(nullifier, &validity, None)
            .map_err(|err| op.fail(nullifier_failure(err)))?;
        op.advance(Event::NullifierRegistered)
            .map_err(|f| op.fail(f))?;
        Ok(())
    }

    /// Phase 4: apply the ballot effect.
    ///
    /// Checks the declaration against the ballot it claims to act on;
    /// a vote landing after the window closed fails `BallotNotActive`
    /// here even though its proof verified earlier — the race is decided
    /// by the ballot clock, not by proof time.
    ///
    /// Lock actions skip the nullifier phase, so their new commitment is
    /// the arbitration point instead: it is conflict-checked against the
    /// tree here, before the tally is touched, and a replayed lock fails
    /// `CommitmentAlreadyExists` with the ballot unchanged.
    pub fn execute(
        &self,
        op: &mut PendingOperation,
        ballot: &mut Ballot,
        now: i64,
    ) -> Result<(), PhaseError> {
        op.expect(op.execute_gate()).map_err(|f| op.fail(f))?;
        if ballot.config.id != op.ballot {
            return Err(op.fail(Failure::BallotMismatch));
        }
        if !op.kind.registers_nullifier() {
            let Some(commitment) = op.declared.commitment else {
                return Err(op.fail(Failure::IncompleteDeclaration("new commitment")));
            };
            self.tree
                .validity_proof(commitment)
                .map_err(|err| op.fail(commitment_failure(err)))?;
        }
        let d = &op.declared;
        let result = match op.kind {
            ActionKind::CastVote => ballot.apply_vote(d.choice, d.weight, now),
            ActionKind::ChangeVote | ActionKind::ChangePosition => {
                let Some(prior) = d.prior_choice else {
                    return Err(op.fail(Failure::IncompleteDeclaration("prior choice")));
                };
                ballot.apply_vote_change(prior, d.choice, d.weight, now)
            }
            ActionKind::LockPosition => ballot
                .apply_vote(d.choice, d.weight, now)
                .and_then(|()| ballot.lock_tokens(d.amount)),
            ActionKind::ClosePosition => ballot
                .apply_close(d.choice, d.weight, now)
                .and_then(|()| ballot.release_tokens(d.amount)),
            ActionKind::ClaimPayout => {
                let BindingMode::SpendToVote { claim_deadline } = ballot.config.binding else {
                    return Err(op.fail(Failure::NotClaimable));
                };
                match ballot.status {
                    BallotStatus::Resolved => {}
                    _ => return Err(op.fail(Failure::NotResolved)),
                }
                if now > claim_deadline {
                    return Err(op.fail(Failure::ClaimDeadlinePassed));
                }
                // d.amount is the proof-bound net payout.
                ballot.release_tokens(d.amount)
            }
        };
        result.map_err(|err| {
            op.fail(match err {
                BallotError::NotActive => Failure::BallotNotActive,
                other => Failure::Tally(other),
            })
        })?;
        op.advance(Event::Executed).map_err(|f| op.fail(f))?;
        Ok(())
    }

    /// Phase 5a: register the new commitment.
    ///
    /// `attachment` must match the ballot's reveal mode: nothing under
    /// `Public`, a time-lock ciphertext under `TimeLocked`, a user-key
    /// ciphertext under `PermanentPrivate`.
    pub fn create_commitment(
        &self,
        op: &mut PendingOperation,
        ballot: &Ballot,
        attachment: Option<Ciphertext>,
    ) -> Result<(), PhaseError> {
        if !op.kind.registers_commitment() {
            return Err(op.fail(Failure::Inapplicable));
        }
        op.expect(Phase::Executed).map_err(|f| op.fail(f))?;
        let Some(commitment) = op.declared.commitment else {
            return Err(op.fail(Failure::IncompleteDeclaration("new commitment")));
        };
        let well_formed = matches!(
            (ballot.config.reveal, &attachment),
            (RevealMode::Public, None)
                | (RevealMode::TimeLocked, Some(Ciphertext::TimelockKey(_)))
                | (RevealMode::PermanentPrivate, Some(Ciphertext::UserKey(_)))
        );
        if !well_formed {
            return Err(op.fail(Failure::WrongCiphertext));
        }
        let validity = self
            .tree
            .validity_proof(commitment)
            .map_err(|err| op.fail(commitment_failure(err)))?;
        self.tree
            .insert(commitment, &validity, attachment)
            .map_err(|err| op.fail(commitment_failure(err)))?;
        op.advance(Event::CommitmentRegistered)
            .map_err(|f| op.fail(f))?;
        Ok(())
    }

    /// Phase 5b: mark the pipeline complete.
    ///
    /// Idempotent: closing a closed operation is a no-op, so a driver
    /// that crashed between closing and recording the close can retry.
    pub fn close_pending(&self, op: &mut PendingOperation) -> Result<(), PhaseError> {
        op.advance(Event::Closed).map_err(|f| op.fail(f))?;
        Ok(())
    }

    /// Give up on an operation after a terminal failure.
    ///
    /// Allowed from any phase except `Closed`. Note that abandoning
    /// after `NullifierRegistered` leaves the nullifier in the tree: the
    /// voter's one action for that nullifier is spent. That is the
    /// intended outcome for double-vote losers and the reason drivers
    /// should abandon rather than resubmit.
    pub fn abandon(&self, op: &mut PendingOperation) -> Result<(), PhaseError> {
        op.advance(Event::Abandoned).map_err(|f| op.fail(f))?;
        Ok(())
    }
}

/// Tree errors during nullifier registration.
fn nullifier_failure(err: TreeError) -> Failure {
    match err {
        TreeError::AlreadyExists => Failure::NullifierAlreadyExists,
        other => tree_failure(other),
    }
}

/// Tree errors during commitment registration.
fn commitment_failure(err: TreeError) -> Failure {
    match err {
        TreeError::AlreadyExists => Failure::CommitmentAlreadyExists,
        other => tree_failure(other),
    }
}

fn tree_failure(err: TreeError) -> Failure {
    match err {
        TreeError::AlreadyExists | TreeError::NotFound => Failure::UnknownCommitment,
        TreeError::StaleProof => Failure::StaleProof,
        TreeError::Transient => Failure::Transient,
    }
}

// ==============================================================
// Errors
// ==============================================================

/// A pipeline failure, tagged with the operation it happened to and the
/// phase it happened in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PhaseError {
    /// The ballot the operation targets.
    pub ballot: BallotId,
    /// The failing operation.
    pub operation: OperationId,
    /// The phase the operation was in when the failure occurred (left
    /// unchanged by the failure).
    pub phase: Phase,
    /// What went wrong.
    pub kind: Failure,
}

impl PhaseError {
    /// Whether repeating the same call may succeed. Everything else is
    /// terminal: abandon the operation.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self.kind, Failure::StaleProof | Failure::Transient)
    }
}

/// The failure taxonomy of the pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Failure {
    /// The proof did not verify against the declared public inputs.
    ProofRejected,
    /// The declaration names fields the action kind requires but which
    /// were not supplied.
    IncompleteDeclaration(&'static str),
    /// This step does not apply to the operation's action kind.
    Inapplicable,
    /// The declared prior commitment is not in the state tree.
    UnknownCommitment,
    /// The nullifier is already registered — a double vote. Terminal.
    NullifierAlreadyExists,
    /// The new commitment is already registered.
    CommitmentAlreadyExists,
    /// The validity proof went stale; reissue and retry.
    StaleProof,
    /// Collaborator fault; retry the same call.
    Transient,
    /// The supplied ballot is not the one the operation declared.
    BallotMismatch,
    /// The ballot stopped accepting votes between proof and execution.
    BallotNotActive,
    /// A claim against a ballot that is not a spend-to-vote ballot.
    NotClaimable,
    /// A claim before the outcome was resolved.
    NotResolved,
    /// A claim after the claim deadline.
    ClaimDeadlinePassed,
    /// The commitment attachment does not match the ballot's reveal
    /// mode.
    WrongCiphertext,
    /// A pipeline step ran out of order.
    OutOfOrder {
        /// The phase the operation must be in for the attempted step.
        expected: Phase,
    },
    /// Close or abandon on an already-closed operation.
    AlreadyClosed,
    /// A tally update failed for a reason other than the window closing.
    Tally(BallotError),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProofRejected => write!(f, "proof rejected"),
            Self::IncompleteDeclaration(field) => {
                write!(f, "declaration is missing its {field}")
            }
            Self::Inapplicable => write!(f, "step does not apply to this action kind"),
            Self::UnknownCommitment => write!(f, "prior commitment not found"),
            Self::NullifierAlreadyExists => write!(f, "nullifier already registered"),
            Self::CommitmentAlreadyExists => write!(f, "commitment already registered"),
            Self::StaleProof => write!(f, "validity proof is stale"),
            Self::Transient => write!(f, "transient collaborator failure"),
            Self::BallotMismatch => write!(f, "operation declared a different ballot"),
            Self::BallotNotActive => write!(f, "ballot is no longer accepting votes"),
            Self::NotClaimable => write!(f, "ballot holds no claimable vault"),
            Self::NotResolved => write!(f, "ballot outcome is not resolved"),
            Self::ClaimDeadlinePassed => write!(f, "claim deadline has passed"),
            Self::WrongCiphertext => write!(f, "attachment does not match the reveal mode"),
            Self::OutOfOrder { expected } => {
                write!(f, "step out of order, operation must be {expected:?}")
            }
            Self::AlreadyClosed => write!(f, "operation already closed"),
            Self::Tally(err) => write!(f, "tally update failed: {err}"),
        }
    }
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation {:?} on ballot {:?} in phase {:?}: {}",
            self.operation, self.ballot, self.phase, self.kind
        )
    }
}

impl Error for PhaseError {}
