//! End-to-end protocol flows over the mock collaborators.
//!
//! Each test drives real circuit input assembly, mock proof generation,
//! and the full phase pipeline against [`mock_ledger`]'s backend and
//! state tree, asserting the resulting ballot tallies, vault balances,
//! and tree contents.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rand::{SeedableRng as _, rngs::StdRng};

use mock_ledger::{MockBackend, MockStateTree};
use scrutin::{
    BallotId, Leaf, OperationId, Randomness, TokenMint, VoteChoice,
    backend::{ProofBackend as _, StateTree as _},
    ballot::{
        Ballot, BallotConfig, BallotStatus, BindingMode, ResolutionMode, RevealMode, VoteKind,
    },
    circuit::{self, CircuitId, VoterContext, WeightFormula},
    commit::{
        Ciphertext, CommitmentNullifier, PayoutCommitment, PositionNullifier, VoteCommitment,
        VoteNullifier,
    },
    hash::field_to_be_bytes,
    keys::StealthSpendingKey,
    phase::{ActionKind, Declared, Failure, Orchestrator, Phase},
    position::Position,
    resolve,
};

use ff::Field as _;
use pasta_curves::Fp;

fn attestation() -> Vec<u8> {
    [Fp::from(11u64), Fp::from(12u64), Fp::from(13u64)]
        .iter()
        .flat_map(|element| field_to_be_bytes(*element))
        .collect()
}

fn snapshot_config(reveal: RevealMode) -> BallotConfig {
    BallotConfig {
        id: BallotId::from(1u64),
        binding: BindingMode::Snapshot {
            snapshot_height: 50,
        },
        reveal,
        kind: VoteKind::Single,
        resolution: ResolutionMode::TallyBased,
        option_count: 4,
        quorum: 0,
        fee_bps: 0,
        start_time: 0,
        end_time: 100,
        eligibility_root: None,
    }
}

/// Cast one snapshot vote through the whole pipeline, returning what the
/// voter keeps: the commitment opening.
#[expect(clippy::too_many_arguments, reason = "test fixture plumbing")]
fn cast_vote(
    driver: &Orchestrator<'_, MockBackend, MockStateTree>,
    backend: &MockBackend,
    ballot: &mut Ballot,
    operation: u64,
    sk: &StealthSpendingKey,
    choice: VoteChoice,
    amount: u64,
    rng: &mut StdRng,
) -> Result<(VoteCommitment, Randomness), Failure> {
    let nk = sk.nullifier_key();
    let formula = WeightFormula::default();
    let ctx = VoterContext {
        config: &ballot.config,
        nullifier_key: &nk,
        voter: sk.voter_key(),
        formula: &formula,
    };
    let rho = Randomness::random(rng);
    let inputs = circuit::cast_vote(&ctx, choice, amount, rho, &attestation(), None).unwrap();
    let proof = backend.prove(CircuitId::CastVote, &inputs).unwrap();

    let weight = formula.evaluate(amount).unwrap();
    let nullifier = VoteNullifier::derive(&nk, ballot.config.id);
    let commitment = VoteCommitment::derive(
        ballot.config.id,
        nullifier,
        sk.voter_key(),
        choice,
        weight,
        rho,
    );

    let declared = Declared {
        public: inputs.public,
        nullifier: Some(nullifier.into()),
        commitment: Some(commitment.into()),
        prior_commitment: None,
        choice,
        prior_choice: None,
        weight,
        amount: 0,
    };
    let mut op = driver
        .submit_proof(
            OperationId::from(operation),
            ballot.config.id,
            ActionKind::CastVote,
            declared,
            &proof,
        )
        .map_err(|err| err.kind)?;
    driver.create_nullifier(&mut op).map_err(|err| err.kind)?;
    driver.execute(&mut op, ballot, 10).map_err(|err| err.kind)?;
    let attachment = match ballot.config.reveal {
        RevealMode::Public => None,
        RevealMode::TimeLocked => Some(Ciphertext::TimelockKey(vec![0x77])),
        RevealMode::PermanentPrivate => Some(Ciphertext::UserKey(vec![0x66])),
    };
    driver
        .create_commitment(&mut op, ballot, attachment)
        .map_err(|err| err.kind)?;
    driver.close_pending(&mut op).map_err(|err| err.kind)?;
    assert_eq!(op.phase(), Phase::Closed);
    Ok((commitment, rho))
}

/// Lock one spend-to-vote position through the pipeline. Locking
/// registers only the position commitment; the position nullifier stays
/// unspent until a later change, close, or claim retires it.
fn lock_position(
    driver: &Orchestrator<'_, MockBackend, MockStateTree>,
    backend: &MockBackend,
    ballot: &mut Ballot,
    operation: u64,
    sk: &StealthSpendingKey,
    position: &Position,
) -> Result<(), Failure> {
    let nk = sk.nullifier_key();
    let formula = WeightFormula::default();
    let ctx = VoterContext {
        config: &ballot.config,
        nullifier_key: &nk,
        voter: sk.voter_key(),
        formula: &formula,
    };
    let inputs = circuit::lock_position(
        &ctx,
        position.choice,
        position.amount,
        position.randomness,
        &attestation(),
        None,
    )
    .unwrap();
    let proof = backend.prove(CircuitId::LockPosition, &inputs).unwrap();
    let declared = Declared {
        public: inputs.public,
        nullifier: None,
        commitment: Some(position.commitment().into()),
        prior_commitment: None,
        choice: position.choice,
        prior_choice: None,
        weight: position.weight,
        amount: position.amount,
    };
    let mut op = driver
        .submit_proof(
            OperationId::from(operation),
            ballot.config.id,
            ActionKind::LockPosition,
            declared,
            &proof,
        )
        .map_err(|err| err.kind)?;
    driver.execute(&mut op, ballot, 10).map_err(|err| err.kind)?;
    driver
        .create_commitment(&mut op, ballot, None)
        .map_err(|err| err.kind)?;
    driver.close_pending(&mut op).map_err(|err| err.kind)?;
    Ok(())
}

#[test]
fn snapshot_vote_end_to_end() {
    let mut rng = StdRng::seed_from_u64(100);
    let backend = MockBackend;
    let tree = MockStateTree::new();
    let driver = Orchestrator::new(&backend, &tree);

    let mut ballot = Ballot::create(snapshot_config(RevealMode::Public)).unwrap();
    ballot.activate(0).unwrap();

    let alice = StealthSpendingKey::random(&mut rng);
    let bob = StealthSpendingKey::random(&mut rng);
    cast_vote(
        &driver,
        &backend,
        &mut ballot,
        1,
        &alice,
        VoteChoice::single(1),
        300,
        &mut rng,
    )
    .unwrap();
    cast_vote(
        &driver,
        &backend,
        &mut ballot,
        2,
        &bob,
        VoteChoice::single(2),
        200,
        &mut rng,
    )
    .unwrap();

    assert_eq!(ballot.option_weights, vec![0, 300, 200, 0]);
    assert_eq!(ballot.total_weight, 500);
    assert_eq!(ballot.vote_count, 2);
    // Two nullifiers and two commitments landed.
    assert_eq!(tree.len(), 4);

    ballot.close(100).unwrap();
    let outcome = resolve::resolve(&mut ballot, None, 100).unwrap();
    assert_eq!(outcome, 1);
    assert_eq!(ballot.status, BallotStatus::Resolved);
}

#[test]
fn second_vote_by_same_voter_rejected() {
    let mut rng = StdRng::seed_from_u64(101);
    let backend = MockBackend;
    let tree = MockStateTree::new();
    let driver = Orchestrator::new(&backend, &tree);

    let mut ballot = Ballot::create(snapshot_config(RevealMode::Public)).unwrap();
    ballot.activate(0).unwrap();

    let voter = StealthSpendingKey::random(&mut rng);
    cast_vote(
        &driver,
        &backend,
        &mut ballot,
        1,
        &voter,
        VoteChoice::single(0),
        100,
        &mut rng,
    )
    .unwrap();

    // A second cast by the same voter derives the same vote nullifier,
    // however different the choice and randomness.
    let err = cast_vote(
        &driver,
        &backend,
        &mut ballot,
        2,
        &voter,
        VoteChoice::single(3),
        100,
        &mut rng,
    )
    .unwrap_err();
    assert_eq!(err, Failure::NullifierAlreadyExists);

    // The loser's tally effect never ran.
    assert_eq!(ballot.option_weights, vec![100, 0, 0, 0]);
    assert_eq!(ballot.vote_count, 1);
}

#[test]
fn change_vote_moves_weight_and_retires_commitment() {
    let mut rng = StdRng::seed_from_u64(102);
    let backend = MockBackend;
    let tree = MockStateTree::new();
    let driver = Orchestrator::new(&backend, &tree);

    let mut ballot = Ballot::create(snapshot_config(RevealMode::Public)).unwrap();
    ballot.activate(0).unwrap();

    let voter = StealthSpendingKey::random(&mut rng);
    let nk = voter.nullifier_key();
    let (stale, stale_rho) = cast_vote(
        &driver,
        &backend,
        &mut ballot,
        1,
        &voter,
        VoteChoice::single(0),
        500,
        &mut rng,
    )
    .unwrap();
    assert_eq!(ballot.option_weights, vec![500, 0, 0, 0]);

    // Assemble the change proof against the prior commitment's
    // inclusion in the current tree.
    let formula = WeightFormula::default();
    let ctx = VoterContext {
        config: &ballot.config,
        nullifier_key: &nk,
        voter: voter.voter_key(),
        formula: &formula,
    };
    let prior = circuit::PriorVote {
        choice: VoteChoice::single(0),
        randomness: stale_rho,
        weight: 500,
    };
    let new_choice = VoteChoice::single(2);
    let new_rho = Randomness::random(&mut rng);
    let inclusion = tree.inclusion_proof(stale.into()).unwrap();
    let inputs = circuit::change_vote(
        &ctx,
        &prior,
        new_choice,
        new_rho,
        &inclusion.path,
        inclusion.root,
    )
    .unwrap();
    let proof = backend.prove(CircuitId::ChangeVote, &inputs).unwrap();

    let vote_nullifier = VoteNullifier::derive(&nk, ballot.config.id);
    let retired = CommitmentNullifier::derive(&nk, stale);
    let fresh = VoteCommitment::derive(
        ballot.config.id,
        vote_nullifier,
        voter.voter_key(),
        new_choice,
        500,
        new_rho,
    );

    let declared = Declared {
        public: inputs.public,
        nullifier: Some(retired.into()),
        commitment: Some(fresh.into()),
        prior_commitment: Some(stale.into()),
        choice: new_choice,
        prior_choice: Some(VoteChoice::single(0)),
        weight: 500,
        amount: 0,
    };
    let mut op = driver
        .submit_proof(
            OperationId::from(2u64),
            ballot.config.id,
            ActionKind::ChangeVote,
            declared,
            &proof,
        )
        .unwrap();
    driver.verify_prior_commitment(&mut op).unwrap();
    driver.create_nullifier(&mut op).unwrap();
    driver.execute(&mut op, &mut ballot, 50).unwrap();
    driver.create_commitment(&mut op, &ballot, None).unwrap();
    driver.close_pending(&mut op).unwrap();

    // Weight moved; the voter is still counted once.
    assert_eq!(ballot.option_weights, vec![0, 0, 500, 0]);
    assert_eq!(ballot.total_weight, 500);
    assert_eq!(ballot.vote_count, 1);

    // The vote nullifier itself was never re-registered; the change
    // registered the commitment nullifier and the fresh commitment.
    assert!(tree.contains(Leaf::from(retired)));
    assert!(tree.contains(Leaf::from(fresh)));
    assert!(tree.contains(Leaf::from(vote_nullifier)));
}

#[test]
fn spend_to_vote_lock_resolve_claim() {
    let mut rng = StdRng::seed_from_u64(103);
    let backend = MockBackend;
    let tree = MockStateTree::new();
    let driver = Orchestrator::new(&backend, &tree);

    let authority = StealthSpendingKey::random(&mut rng);
    let mut ballot = Ballot::create(BallotConfig {
        id: BallotId::from(7u64),
        binding: BindingMode::SpendToVote {
            claim_deadline: 200,
        },
        reveal: RevealMode::Public,
        kind: VoteKind::Single,
        resolution: ResolutionMode::Authority {
            authority: authority.voter_key(),
        },
        option_count: 2,
        quorum: 0,
        fee_bps: 100,
        start_time: 0,
        end_time: 100,
        eligibility_root: None,
    })
    .unwrap();
    ballot.activate(0).unwrap();

    // The claimant locks 100_000 on option 1 through the full pipeline.
    let claimant = StealthSpendingKey::random(&mut rng);
    let nk = claimant.nullifier_key();
    let position = Position {
        ballot: ballot.config.id,
        voter: claimant.voter_key(),
        choice: VoteChoice::single(1),
        amount: 100_000,
        weight: 100_000,
        randomness: Randomness::random(&mut rng),
    };
    lock_position(&driver, &backend, &mut ballot, 1, &claimant, &position).unwrap();
    assert_eq!(ballot.vault_balance, 100_000);

    // Two more positions land directly on the tally: 300_000 more on
    // option 1, 600_000 on option 0. Pool is 1_000_000; option 1 holds
    // 400_000 of weight.
    ballot.apply_vote(VoteChoice::single(1), 300_000, 20).unwrap();
    ballot.lock_tokens(300_000).unwrap();
    ballot.apply_vote(VoteChoice::single(0), 600_000, 30).unwrap();
    ballot.lock_tokens(600_000).unwrap();
    assert_eq!(ballot.vault_balance, 1_000_000);

    // The authority declares option 1 after close.
    ballot.close(100).unwrap();
    let outcome = resolve::resolve(&mut ballot, Some(1), 100).unwrap();
    assert_eq!(outcome, 1);

    // Pro-rata payout for 100_000 of 400_000 winning weight over a
    // 1_000_000 pool, minus the 100 bps fee.
    let gross = resolve::gross_payout(position.weight, 1_000_000, 400_000);
    assert_eq!(gross, 250_000);
    let net = resolve::net_payout(gross, ballot.config.fee_bps);
    assert_eq!(net, 247_500);
    assert!(resolve::is_winner(position.choice, outcome, ballot.config.kind));

    // Claim through the pipeline.
    let formula = WeightFormula::default();
    let ctx = VoterContext {
        config: &ballot.config,
        nullifier_key: &nk,
        voter: claimant.voter_key(),
        formula: &formula,
    };
    let mint = TokenMint::from(Fp::from(88u64));
    let payout_rho = Randomness::random(&mut rng);
    let inclusion = tree.inclusion_proof(position.commitment().into()).unwrap();
    let inputs = circuit::claim_payout(
        &ctx,
        &position,
        mint,
        net,
        payout_rho,
        outcome,
        &inclusion.path,
        inclusion.root,
    )
    .unwrap();
    let proof = backend.prove(CircuitId::ClaimPayout, &inputs).unwrap();
    let payout = PayoutCommitment::derive(claimant.voter_key(), mint, net, payout_rho);
    let declared = Declared {
        public: inputs.public,
        nullifier: Some(PositionNullifier::derive(&nk, position.commitment()).into()),
        commitment: Some(payout.into()),
        prior_commitment: Some(position.commitment().into()),
        choice: position.choice,
        prior_choice: None,
        weight: position.weight,
        amount: net,
    };
    let mut claim = driver
        .submit_proof(
            OperationId::from(2u64),
            ballot.config.id,
            ActionKind::ClaimPayout,
            declared.clone(),
            &proof,
        )
        .unwrap();
    driver.verify_prior_commitment(&mut claim).unwrap();
    driver.create_nullifier(&mut claim).unwrap();
    driver.execute(&mut claim, &mut ballot, 150).unwrap();
    driver.create_commitment(&mut claim, &ballot, None).unwrap();
    driver.close_pending(&mut claim).unwrap();

    // The vault paid out the net amount; the payout commitment landed.
    assert_eq!(ballot.vault_balance, 1_000_000 - 247_500);
    assert!(tree.contains(Leaf::from(payout)));

    // A replayed claim loses at the position nullifier.
    let mut replay = driver
        .submit_proof(
            OperationId::from(3u64),
            ballot.config.id,
            ActionKind::ClaimPayout,
            declared,
            &proof,
        )
        .unwrap();
    driver.verify_prior_commitment(&mut replay).unwrap();
    let err = driver.create_nullifier(&mut replay).unwrap_err();
    assert_eq!(err.kind, Failure::NullifierAlreadyExists);
    driver.abandon(&mut replay).unwrap();

    // Finalize after the claim window.
    resolve::finalize(&mut ballot, 201).unwrap();
    assert_eq!(ballot.status, BallotStatus::Finalized);
}

fn spend_config(id: u64, option_count: u8) -> BallotConfig {
    BallotConfig {
        id: BallotId::from(id),
        binding: BindingMode::SpendToVote {
            claim_deadline: 200,
        },
        reveal: RevealMode::Public,
        kind: VoteKind::Single,
        resolution: ResolutionMode::TallyBased,
        option_count,
        quorum: 0,
        fee_bps: 0,
        start_time: 0,
        end_time: 100,
        eligibility_root: None,
    }
}

#[test]
fn change_position_repoints_locked_weight() {
    let mut rng = StdRng::seed_from_u64(105);
    let backend = MockBackend;
    let tree = MockStateTree::new();
    let driver = Orchestrator::new(&backend, &tree);

    let mut ballot = Ballot::create(spend_config(11, 3)).unwrap();
    ballot.activate(0).unwrap();

    let voter = StealthSpendingKey::random(&mut rng);
    let nk = voter.nullifier_key();
    let prior = Position {
        ballot: ballot.config.id,
        voter: voter.voter_key(),
        choice: VoteChoice::single(0),
        amount: 2_000,
        weight: 2_000,
        randomness: Randomness::random(&mut rng),
    };
    lock_position(&driver, &backend, &mut ballot, 1, &voter, &prior).unwrap();
    assert_eq!(ballot.option_weights, vec![2_000, 0, 0]);
    assert_eq!(ballot.vault_balance, 2_000);

    // Supersede the position: same lock, new choice, fresh randomness.
    let next = prior.supersede(VoteChoice::single(2), &mut rng);
    let formula = WeightFormula::default();
    let ctx = VoterContext {
        config: &ballot.config,
        nullifier_key: &nk,
        voter: voter.voter_key(),
        formula: &formula,
    };
    let inclusion = tree.inclusion_proof(prior.commitment().into()).unwrap();
    let inputs =
        circuit::change_position(&ctx, &prior, &next, &inclusion.path, inclusion.root).unwrap();
    let proof = backend.prove(CircuitId::ChangePosition, &inputs).unwrap();

    let declared = Declared {
        public: inputs.public,
        nullifier: Some(prior.nullifier(&nk).into()),
        commitment: Some(next.commitment().into()),
        prior_commitment: Some(prior.commitment().into()),
        choice: next.choice,
        prior_choice: Some(prior.choice),
        weight: next.weight,
        amount: next.amount,
    };
    let mut op = driver
        .submit_proof(
            OperationId::from(2u64),
            ballot.config.id,
            ActionKind::ChangePosition,
            declared,
            &proof,
        )
        .unwrap();
    driver.verify_prior_commitment(&mut op).unwrap();
    driver.create_nullifier(&mut op).unwrap();
    driver.execute(&mut op, &mut ballot, 50).unwrap();
    driver.create_commitment(&mut op, &ballot, None).unwrap();
    driver.close_pending(&mut op).unwrap();

    // The weight moved; the lock did not.
    assert_eq!(ballot.option_weights, vec![0, 0, 2_000]);
    assert_eq!(ballot.total_weight, 2_000);
    assert_eq!(ballot.vote_count, 1);
    assert_eq!(ballot.vault_balance, 2_000);
    // The old position is retired, the successor live.
    assert!(tree.contains(Leaf::from(prior.nullifier(&nk))));
    assert!(tree.contains(Leaf::from(next.commitment())));
}

#[test]
fn close_position_unlocks_before_resolution() {
    let mut rng = StdRng::seed_from_u64(106);
    let backend = MockBackend;
    let tree = MockStateTree::new();
    let driver = Orchestrator::new(&backend, &tree);

    let mut ballot = Ballot::create(spend_config(12, 2)).unwrap();
    ballot.activate(0).unwrap();

    let voter = StealthSpendingKey::random(&mut rng);
    let nk = voter.nullifier_key();
    let position = Position {
        ballot: ballot.config.id,
        voter: voter.voter_key(),
        choice: VoteChoice::single(1),
        amount: 800,
        weight: 800,
        randomness: Randomness::random(&mut rng),
    };
    lock_position(&driver, &backend, &mut ballot, 1, &voter, &position).unwrap();
    assert_eq!(ballot.vault_balance, 800);
    assert_eq!(ballot.total_weight, 800);

    let formula = WeightFormula::default();
    let ctx = VoterContext {
        config: &ballot.config,
        nullifier_key: &nk,
        voter: voter.voter_key(),
        formula: &formula,
    };
    let inclusion = tree.inclusion_proof(position.commitment().into()).unwrap();
    let inputs =
        circuit::close_position(&ctx, &position, &inclusion.path, inclusion.root).unwrap();
    let proof = backend.prove(CircuitId::ClosePosition, &inputs).unwrap();

    let declared = Declared {
        public: inputs.public,
        nullifier: Some(position.nullifier(&nk).into()),
        commitment: None,
        prior_commitment: Some(position.commitment().into()),
        choice: position.choice,
        prior_choice: None,
        weight: position.weight,
        amount: position.amount,
    };
    let mut op = driver
        .submit_proof(
            OperationId::from(2u64),
            ballot.config.id,
            ActionKind::ClosePosition,
            declared,
            &proof,
        )
        .unwrap();
    driver.verify_prior_commitment(&mut op).unwrap();
    driver.create_nullifier(&mut op).unwrap();
    driver.execute(&mut op, &mut ballot, 50).unwrap();

    // The vote is withdrawn and the tokens released.
    assert_eq!(ballot.option_weights, vec![0, 0]);
    assert_eq!(ballot.total_weight, 0);
    assert_eq!(ballot.vote_count, 0);
    assert_eq!(ballot.vault_balance, 0);

    // Nothing to register: the close only retires state.
    let err = driver.create_commitment(&mut op, &ballot, None).unwrap_err();
    assert_eq!(err.kind, Failure::Inapplicable);
    driver.close_pending(&mut op).unwrap();
    assert_eq!(op.phase(), Phase::Closed);
    assert!(tree.contains(Leaf::from(position.nullifier(&nk))));
}

#[test]
fn private_ballot_zeroes_public_choice_and_stores_ciphertext() {
    let mut rng = StdRng::seed_from_u64(104);
    let backend = MockBackend;
    let tree = MockStateTree::new();
    let driver = Orchestrator::new(&backend, &tree);

    let mut ballot = Ballot::create(snapshot_config(RevealMode::PermanentPrivate)).unwrap();
    ballot.activate(0).unwrap();

    let voter = StealthSpendingKey::random(&mut rng);
    let nk = voter.nullifier_key();
    let formula = WeightFormula::default();
    let ctx = VoterContext {
        config: &ballot.config,
        nullifier_key: &nk,
        voter: voter.voter_key(),
        formula: &formula,
    };
    let rho = Randomness::random(&mut rng);
    let choice = VoteChoice::single(3);
    let inputs = circuit::cast_vote(&ctx, choice, 250, rho, &attestation(), None).unwrap();
    // The public choice slot is zeroed under private reveal.
    assert_eq!(inputs.public[3], Fp::ZERO);

    let (commitment, _) = cast_vote(
        &driver,
        &backend,
        &mut ballot,
        1,
        &voter,
        choice,
        250,
        &mut rng,
    )
    .unwrap();

    // The tally still sees the weight; the commitment carries an
    // encrypted preimage openable by the voter alone.
    assert_eq!(ballot.option_weights, vec![0, 0, 0, 250]);
    assert_eq!(
        tree.attachment(Leaf::from(commitment)),
        Some(Ciphertext::UserKey(vec![0x66]))
    );
}
