//! Merkle path normalization for circuit inputs.
//!
//! The state-tree collaborator returns paths of whatever depth its tree
//! currently has; the circuits have a fixed depth
//! ([`MERKLE_DEPTH`](crate::constants::MERKLE_DEPTH)). Externally supplied
//! paths are zero-padded with zero siblings up to the circuit depth, and
//! the per-level indicator bits (left/right at each level) are derived
//! from the supplied leaf index rather than trusted separately.

use bitvec::{order::Lsb0, view::BitView as _};
use ff::Field as _;
use pasta_curves::Fp;

use super::InputError;

/// An authentication path from a leaf to a root, as supplied by the
/// state-tree collaborator.
#[derive(Clone, Debug, Default)]
pub struct MerklePath {
    /// Sibling hashes, leaf level first. May be shorter than the circuit
    /// depth.
    pub siblings: Vec<Fp>,
    /// Position of the leaf; its bits select the hash order per level.
    pub leaf_index: u64,
}

impl MerklePath {
    /// A path of no siblings at index 0, used when a family's path slot
    /// is unused (e.g. no eligibility set).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Normalize to the circuit depth.
    ///
    /// Returns `(siblings, indicator_bits)`, each exactly `depth` long:
    /// siblings padded with `Fp::ZERO`, indicator bits taken from the
    /// little-endian bits of `leaf_index` as 0/1 field elements.
    pub fn padded(&self, depth: usize) -> Result<(Vec<Fp>, Vec<Fp>), InputError> {
        if self.siblings.len() > depth {
            return Err(InputError::PathTooDeep {
                supplied: self.siblings.len(),
                depth,
            });
        }
        let mut siblings = self.siblings.clone();
        siblings.resize(depth, Fp::ZERO);

        let bits = self
            .leaf_index
            .view_bits::<Lsb0>()
            .iter()
            .take(depth)
            .map(|bit| if *bit { Fp::ONE } else { Fp::ZERO })
            .chain(core::iter::repeat(Fp::ZERO))
            .take(depth)
            .collect();
        Ok((siblings, bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_depth_with_zero_siblings() {
        let path = MerklePath {
            siblings: vec![Fp::from(5u64), Fp::from(6u64)],
            leaf_index: 0,
        };
        let (siblings, bits) = path.padded(8).unwrap();
        assert_eq!(siblings.len(), 8);
        assert_eq!(bits.len(), 8);
        assert_eq!(siblings[0], Fp::from(5u64));
        assert_eq!(siblings[2], Fp::ZERO);
    }

    #[test]
    fn indicator_bits_follow_leaf_index() {
        let path = MerklePath {
            siblings: vec![],
            leaf_index: 0b1101,
        };
        let (_, bits) = path.padded(6).unwrap();
        assert_eq!(
            bits,
            vec![Fp::ONE, Fp::ZERO, Fp::ONE, Fp::ONE, Fp::ZERO, Fp::ZERO]
        );
    }

    #[test]
    fn oversized_path_rejected() {
        let path = MerklePath {
            siblings: vec![Fp::ZERO; 9],
            leaf_index: 0,
        };
        assert!(matches!(
            path.padded(8),
            Err(InputError::PathTooDeep {
                supplied: 9,
                depth: 8
            })
        ));
    }

    /// Depths beyond the 64 index bits still pad bits with zero.
    #[test]
    fn deep_circuits_zero_extend_index_bits() {
        let path = MerklePath {
            siblings: vec![],
            leaf_index: u64::MAX,
        };
        let (_, bits) = path.padded(70).unwrap();
        assert_eq!(bits.len(), 70);
        assert_eq!(bits[63], Fp::ONE);
        assert_eq!(bits[64], Fp::ZERO);
    }
}
