//! BLAKE2b-based mocks of the scrutin collaborators.
//!
//! [`MockBackend`] stands in for the zero-knowledge proof system: a
//! "proof" is a keyed BLAKE2b transcript over the circuit index and the
//! public inputs, and verification recomputes it. Nothing is proven —
//! the mock only gives proofs the two properties the orchestrator
//! relies on: deterministic verification and binding to the declared
//! public inputs.
//!
//! [`MockStateTree`] stands in for the compressed state tree: an
//! in-memory, mutex-guarded leaf list with insert-if-absent semantics,
//! fabricated authentication paths, and a running root digest. Validity
//! proofs are issued against the root index at issue time and go stale
//! when the tree grows, matching the real collaborator's behavior.

use std::convert::Infallible;
use std::sync::{Mutex, PoisonError};

use ff::{FromUniformBytes as _, PrimeField as _};
use pasta_curves::Fp;

use scrutin::{
    Leaf, MerkleRoot,
    backend::{InclusionProof, ProofBackend, StateTree, TreeError, ValidityProof},
    circuit::{CircuitId, MerklePath, ProofInputs},
    commit::Ciphertext,
    constants::PROOF_TRANSCRIPT_PERSONALIZATION,
};

/// 32-byte keyed transcript over one circuit invocation's public data.
fn transcript(circuit: CircuitId, public: &[Fp]) -> Vec<u8> {
    let mut state = blake2b_simd::Params::new()
        .hash_length(32)
        .personal(PROOF_TRANSCRIPT_PERSONALIZATION)
        .to_state();
    state.update(&circuit.index().to_le_bytes());
    for element in public {
        state.update(&element.to_repr());
    }
    state.finalize().as_bytes().to_vec()
}

/// A proof backend whose proofs are public-input transcripts.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockBackend;

impl ProofBackend for MockBackend {
    type Error = Infallible;

    fn prove(&self, circuit: CircuitId, inputs: &ProofInputs) -> Result<Vec<u8>, Self::Error> {
        // The witness never enters the transcript; like a real proof,
        // the bytes reveal nothing private and verify against the
        // public inputs alone.
        Ok(transcript(circuit, &inputs.public))
    }

    fn verify(&self, circuit: CircuitId, proof: &[u8], public: &[Fp]) -> bool {
        transcript(circuit, public) == proof
    }
}

#[derive(Debug)]
struct Entry {
    leaf: Leaf,
    attachment: Option<Ciphertext>,
}

/// An in-memory state tree with atomic insert-if-absent.
#[derive(Debug, Default)]
pub struct MockStateTree {
    entries: Mutex<Vec<Entry>>,
}

impl MockStateTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leaves, which doubles as the root index.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no leaves have been registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a leaf has been registered.
    pub fn contains(&self, leaf: Leaf) -> bool {
        self.lock().iter().any(|entry| entry.leaf == leaf)
    }

    /// The attachment stored with a leaf, if any.
    pub fn attachment(&self, leaf: Leaf) -> Option<Ciphertext> {
        self.lock()
            .iter()
            .find(|entry| entry.leaf == leaf)
            .and_then(|entry| entry.attachment.clone())
    }

    /// The current root: a running digest over all leaves in insertion
    /// order, reduced to the field.
    pub fn root(&self) -> MerkleRoot {
        let entries = self.lock();
        let mut state = blake2b_simd::Params::new()
            .hash_length(64)
            .personal(PROOF_TRANSCRIPT_PERSONALIZATION)
            .to_state();
        for entry in entries.iter() {
            let bytes: [u8; 32] = entry.leaf.into();
            state.update(&bytes);
        }
        let digest = *state.finalize().as_array();
        MerkleRoot::from(Fp::from_uniform_bytes(&digest))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateTree for MockStateTree {
    fn validity_proof(&self, candidate: Leaf) -> Result<ValidityProof, TreeError> {
        let entries = self.lock();
        if entries.iter().any(|entry| entry.leaf == candidate) {
            return Err(TreeError::AlreadyExists);
        }
        let bytes: [u8; 32] = candidate.into();
        Ok(ValidityProof {
            proof: bytes.to_vec(),
            root_index: entries.len() as u64,
        })
    }

    fn inclusion_proof(&self, existing: Leaf) -> Result<InclusionProof, TreeError> {
        let entries = self.lock();
        let position = entries
            .iter()
            .position(|entry| entry.leaf == existing)
            .ok_or(TreeError::NotFound)?;
        let bytes: [u8; 32] = existing.into();
        drop(entries);
        // A flat tree has no real siblings; the path still carries the
        // leaf's position so indicator bits are exercised downstream.
        Ok(InclusionProof {
            proof: bytes.to_vec(),
            path: MerklePath {
                siblings: Vec::new(),
                leaf_index: position as u64,
            },
            root: self.root(),
        })
    }

    fn insert(
        &self,
        address: Leaf,
        proof: &ValidityProof,
        attachment: Option<Ciphertext>,
    ) -> Result<Leaf, TreeError> {
        let mut entries = self.lock();
        if entries.iter().any(|entry| entry.leaf == address) {
            return Err(TreeError::AlreadyExists);
        }
        if proof.root_index != entries.len() as u64 {
            return Err(TreeError::StaleProof);
        }
        entries.push(Entry {
            leaf: address,
            attachment,
        });
        Ok(address)
    }
}
