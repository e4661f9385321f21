//! # scrutin
//!
//! A confidential ballot protocol.
//!
//! Scrutin lets participants cast votes whose choice and voting weight stay
//! hidden on a public ledger while the ledger still verifies eligibility,
//! prevents double-voting, and tallies outcomes:
//!
//! - **Commitments and nullifiers**: every vote and token position is a
//!   hiding, binding digest over the Pallas base field; a deterministic
//!   nullifier marks it used without revealing the key ([`commit`])
//! - **Six proof families**: ordered public/private input vectors for the
//!   external proof backend ([`circuit`])
//! - **Multi-phase ledger flow**: each voting action moves through proof
//!   verification, nullifier registration, tally execution, and commitment
//!   registration with an explicit phase cursor ([`phase`])
//!
//! ## Configuration axes
//!
//! A ballot combines four independent mode axes, validated once at creation
//! ([`ballot::BallotConfig`]):
//!
//! | Axis | Variants |
//! | ---- | -------- |
//! | binding | `Snapshot`, `SpendToVote` |
//! | reveal | `Public`, `TimeLocked`, `PermanentPrivate` |
//! | vote kind | `Single`, `Approval`, `Ranked`, `Weighted` |
//! | resolution | `TallyBased`, `Authority`, `Oracle` |
//!
//! ## External collaborators
//!
//! The zero-knowledge proof backend and the compressed state tree are
//! reached only through the [`backend`] traits. Commitments and nullifiers
//! live exclusively in the tree collaborator as opaque addressed leaves;
//! the [`Ballot`](ballot::Ballot) record and the
//! [`PendingOperation`](phase::PendingOperation) record are the only
//! durable artifacts on this side of the boundary.
//!
//! ## Nomenclature
//!
//! All types in the `scrutin` crate, unless otherwise specified, are
//! protocol-specific types.

pub mod backend;
pub mod ballot;
pub mod circuit;
pub mod commit;
pub mod constants;
pub mod hash;
pub mod keys;
pub mod phase;
pub mod position;
pub mod resolve;

mod primitives;

pub use primitives::{BallotId, Leaf, MerkleRoot, OperationId, Randomness, TokenMint, VoteChoice};
