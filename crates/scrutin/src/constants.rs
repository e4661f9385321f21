//! Protocol-wide domain separators and limits.
//!
//! All BLAKE2b personalizations are at most 16 bytes (the BLAKE2b personal
//! field width). Every hash family in the protocol carries a distinct
//! personalization so no two families can produce colliding outputs from
//! the same inputs.

/// BLAKE2b-512 personalization for `PRF^expand`: child key derivation from
/// a stealth spending key (`nk`, `vk`).
///
/// The spending key is never hashed directly into a public artifact; it
/// only reaches the protocol through this expansion.
pub const PRF_EXPAND_PERSONALIZATION: &[u8; 16] = b"Scrutin_ExpandSd";

/// Domain for vote nullifiers: one per `(voter, ballot)`, stable across
/// vote changes. The double-vote guard.
pub const VOTE_NULLIFIER_DOMAIN: &[u8; 16] = b"Scrutin-VoteNull";

/// Domain for vote commitments and the nullifiers that retire a stale
/// commitment on a vote change.
pub const VOTE_COMMITMENT_DOMAIN: &[u8; 16] = b"Scrutin-VoteCmnt";

/// Domain for token position commitments and nullifiers (spend-to-vote).
pub const POSITION_DOMAIN: &[u8; 16] = b"Scrutin-Position";

/// Domain for payout commitments on the confidential token leg.
pub const TOKEN_DOMAIN: &[u8; 16] = b"Scrutin-TokenCmt";

/// BLAKE2b personalization for the mockable proof transcript. Not used by
/// the protocol itself; reserved so mocks and the real backend cannot
/// collide with protocol hashes.
pub const PROOF_TRANSCRIPT_PERSONALIZATION: &[u8; 16] = b"Scrutin-ProofTrn";

/// Fixed merkle depth of the compressed state tree circuits. Externally
/// supplied paths are zero-padded up to this depth.
pub const MERKLE_DEPTH: usize = 26;

/// Inclusive option count bounds for a ballot.
pub const MIN_OPTIONS: u8 = 2;
/// Inclusive option count bounds for a ballot.
pub const MAX_OPTIONS: u8 = 10;

/// Protocol fee denominator: fees are expressed in basis points.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Ranked ballots encode a preference list as 4-bit slots in the choice
/// word, most preferred first; a filled slot stores `option + 1`, zero
/// marks an empty slot.
pub const RANKED_SLOTS: u32 = 16;
/// Width of one ranking slot in bits.
pub const RANK_BITS: u32 = 4;

/// Domain-separated child key expansion from a stealth spending key.
///
/// `PRF^expand_sk(t) = BLAKE2b-512("Scrutin_ExpandSd", sk || t)`
///
/// A struct with a single-byte domain separator and associated constants
/// for each child key derivation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PrfExpand {
    domain_separator: u8,
}

impl PrfExpand {
    /// `[0x01]` -> `nk` (nullifier key, base field)
    pub(crate) const NK: Self = Self {
        domain_separator: 0x01,
    };
    /// `[0x02]` -> `vk` (voter key, base field)
    pub(crate) const VK: Self = Self {
        domain_separator: 0x02,
    };

    /// Evaluate the PRF: `BLAKE2b-512("Scrutin_ExpandSd", sk || domain_sep)`.
    ///
    /// Returns 64 bytes suitable for unbiased reduction into the field via
    /// `FromUniformBytes`.
    pub(crate) fn with(self, sk: &[u8; 32]) -> [u8; 64] {
        *blake2b_simd::Params::new()
            .hash_length(64)
            .personal(PRF_EXPAND_PERSONALIZATION)
            .to_state()
            .update(sk)
            .update(&[self.domain_separator])
            .finalize()
            .as_array()
    }
}
