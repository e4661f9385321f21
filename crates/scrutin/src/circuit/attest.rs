//! Balance and eligibility attestations.
//!
//! Snapshot ballots attest a voter's balance at the snapshot height; the
//! attestation service signs off-ledger and the circuit checks the
//! signature relation. At this boundary an attestation is exactly three
//! canonical big-endian field elements: the attested value digest, the
//! signature's commitment component, and its response component. How the
//! service computes them is its own concern.

use pasta_curves::Fp;

use super::InputError;
use crate::hash::field_from_canonical_be;

/// Byte length of one wire attestation: three 32-byte field encodings.
const ATTESTATION_LEN: usize = 96;

/// A parsed attestation, ready for the circuit's private inputs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Attestation {
    /// `(value_digest, commitment, response)`.
    pub elements: [Fp; 3],
}

impl Attestation {
    /// Parse a wire attestation.
    ///
    /// Fails `InvalidAttestationSignature` unless the input is exactly
    /// 96 bytes of three canonical big-endian field elements.
    pub fn parse(bytes: &[u8]) -> Result<Self, InputError> {
        if bytes.len() != ATTESTATION_LEN {
            return Err(InputError::InvalidAttestationSignature);
        }
        let mut elements = [Fp::from(0u64); 3];
        for (chunk, element) in bytes.chunks_exact(32).zip(elements.iter_mut()) {
            let mut be = [0u8; 32];
            be.copy_from_slice(chunk);
            *element =
                field_from_canonical_be(&be).ok_or(InputError::InvalidAttestationSignature)?;
        }
        Ok(Self { elements })
    }
}
