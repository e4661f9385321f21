//! External collaborator interfaces.
//!
//! The protocol core never talks to the proof system or the compressed
//! state tree directly; both sit behind traits so the phase orchestrator
//! is independently testable (the `mock_ledger` crate implements both
//! over BLAKE2b).
//!
//! Correctness under concurrent voters rests entirely on the tree
//! collaborator's atomic insert-if-absent semantics — the single
//! arbitration point preventing two submissions of the same vote from
//! both succeeding. The core performs no locking of its own.

use core::error::Error;
use core::fmt;

use pasta_curves::Fp;

use crate::{
    circuit::{CircuitId, MerklePath, ProofInputs},
    commit::Ciphertext,
    primitives::{Leaf, MerkleRoot},
};

/// The zero-knowledge proof backend.
///
/// Proof generation is CPU-bound and single-threaded per proof;
/// independent proofs may run in parallel across voters. The backend
/// bounds its own runtime; the core imposes no timeout.
pub trait ProofBackend {
    /// Backend-specific proving failure.
    type Error: fmt::Debug + fmt::Display;

    /// Produce a proof for one circuit invocation.
    fn prove(&self, circuit: CircuitId, inputs: &ProofInputs) -> Result<Vec<u8>, Self::Error>;

    /// Verify a proof against the declared public inputs.
    ///
    /// A `false` return is a definitive rejection, never retried.
    fn verify(&self, circuit: CircuitId, proof: &[u8], public: &[Fp]) -> bool;
}

/// A non-inclusion witness issued before inserting a new leaf.
#[derive(Clone, Debug)]
pub struct ValidityProof {
    /// Opaque proof bytes, consumed by [`StateTree::insert`].
    pub proof: Vec<u8>,
    /// Index of the tree root this proof was issued against.
    pub root_index: u64,
}

/// An inclusion witness for an existing leaf.
#[derive(Clone, Debug)]
pub struct InclusionProof {
    /// Opaque proof bytes.
    pub proof: Vec<u8>,
    /// Authentication path for circuit consumption.
    pub path: MerklePath,
    /// The root the path authenticates against.
    pub root: MerkleRoot,
}

/// The compressed state tree: an append-only authenticated store of
/// opaque leaves (commitments and nullifiers alike).
///
/// Leaves are owned by the collaborator and never duplicated locally.
pub trait StateTree {
    /// Prove `candidate` is not yet present (pre-insertion).
    fn validity_proof(&self, candidate: Leaf) -> Result<ValidityProof, TreeError>;

    /// Prove `existing` is present, with its authentication path.
    fn inclusion_proof(&self, existing: Leaf) -> Result<InclusionProof, TreeError>;

    /// Atomically insert-if-absent.
    ///
    /// `attachment` carries the encrypted commitment preimage for
    /// commitment leaves under non-public reveal; nullifier leaves carry
    /// none. Fails [`TreeError::AlreadyExists`] if the leaf is present —
    /// the protocol's sole double-vote defense.
    fn insert(
        &self,
        address: Leaf,
        proof: &ValidityProof,
        attachment: Option<Ciphertext>,
    ) -> Result<Leaf, TreeError>;
}

/// Failures at the state-tree boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TreeError {
    /// The leaf is already registered — a replay or double-vote.
    /// Terminal; never retried.
    AlreadyExists,
    /// No such leaf (inclusion proof against a never-created leaf).
    NotFound,
    /// A stale non-inclusion proof; reissue against the current root
    /// and retry.
    StaleProof,
    /// Collaborator/network fault; the same call may be retried.
    Transient,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "leaf already exists"),
            Self::NotFound => write!(f, "leaf not found"),
            Self::StaleProof => write!(f, "validity proof issued against a stale root"),
            Self::Transient => write!(f, "transient state-tree failure"),
        }
    }
}

impl Error for TreeError {}
