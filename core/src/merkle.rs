//! Merkle trees over transactions and audited block summaries

use prcy_crypto::{hash256_pair, Hash256};

/// Flattened merkle tree: leaves first, then each level up to the root.
///
/// Odd levels pad by pairing the last node with itself. `mutated` is set
/// when any combined pair holds two identical hashes, which means a
/// different leaf sequence (with a duplicated entry) yields the same root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    nodes: Vec<Hash256>,
    leaf_count: usize,
    mutated: bool,
}

impl MerkleTree {
    pub fn build(leaves: Vec<Hash256>) -> Self {
        let leaf_count = leaves.len();
        let mut nodes = leaves;
        let mut mutated = false;

        let mut level_start = 0;
        let mut level_size = leaf_count;
        while level_size > 1 {
            for i in (0..level_size).step_by(2) {
                let i2 = (i + 1).min(level_size - 1);
                let left = nodes[level_start + i];
                let right = nodes[level_start + i2];
                if i2 == i + 1 && left == right {
                    mutated = true;
                }
                nodes.push(hash256_pair(&left, &right));
            }
            level_start += level_size;
            level_size = (level_size + 1) / 2;
        }

        Self {
            nodes,
            leaf_count,
            mutated,
        }
    }

    /// Zero hash for an empty tree
    pub fn root(&self) -> Hash256 {
        self.nodes.last().copied().unwrap_or(Hash256::ZERO)
    }

    pub fn is_mutated(&self) -> bool {
        self.mutated
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Sibling hashes from leaf `index` up to the root
    pub fn branch(&self, index: usize) -> Vec<Hash256> {
        let mut branch = Vec::new();
        if index >= self.leaf_count {
            return branch;
        }

        let mut index = index;
        let mut level_start = 0;
        let mut level_size = self.leaf_count;
        while level_size > 1 {
            let sibling = (index ^ 1).min(level_size - 1);
            branch.push(self.nodes[level_start + sibling]);
            index >>= 1;
            level_start += level_size;
            level_size = (level_size + 1) / 2;
        }
        branch
    }

    /// Fold `leaf` up through `branch`; compare the result with a root
    pub fn check_branch(leaf: Hash256, branch: &[Hash256], index: usize) -> Hash256 {
        let mut hash = leaf;
        let mut index = index;
        for sibling in branch {
            hash = if index & 1 == 1 {
                hash256_pair(sibling, &hash)
            } else {
                hash256_pair(&hash, sibling)
            };
            index >>= 1;
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prcy_crypto::hash256;

    fn leaves(n: u8) -> Vec<Hash256> {
        (0..n).map(|i| hash256(&[i])).collect()
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(MerkleTree::build(vec![]).root(), Hash256::ZERO);

        let leaf = hash256(b"only");
        let tree = MerkleTree::build(vec![leaf]);
        assert_eq!(tree.root(), leaf);
        assert!(!tree.is_mutated());
    }

    #[test]
    fn test_odd_level_duplicates_last() {
        let l = leaves(3);
        let tree = MerkleTree::build(l.clone());
        let expected = hash256_pair(&hash256_pair(&l[0], &l[1]), &hash256_pair(&l[2], &l[2]));
        assert_eq!(tree.root(), expected);
        // padding is not a mutation
        assert!(!tree.is_mutated());
    }

    #[test]
    fn test_deterministic_and_order_sensitive() {
        let l = leaves(5);
        assert_eq!(MerkleTree::build(l.clone()).root(), MerkleTree::build(l.clone()).root());

        let mut swapped = l.clone();
        swapped.swap(1, 3);
        assert_ne!(MerkleTree::build(l).root(), MerkleTree::build(swapped).root());
    }

    #[test]
    fn test_duplicate_tail_is_mutated() {
        let mut l = leaves(3);
        l.push(l[2]);
        let tree = MerkleTree::build(l);
        assert!(tree.is_mutated());

        // same root as the three-leaf tree it forges
        assert_eq!(tree.root(), MerkleTree::build(leaves(3)).root());
    }

    #[test]
    fn test_duplicate_pair_inside_level_is_mutated() {
        let mut l = leaves(6);
        l[1] = l[0];
        assert!(MerkleTree::build(l).is_mutated());
    }

    #[test]
    fn test_branches_verify() {
        for n in 1..=9u8 {
            let l = leaves(n);
            let tree = MerkleTree::build(l.clone());
            for (i, leaf) in l.iter().enumerate() {
                let branch = tree.branch(i);
                assert_eq!(MerkleTree::check_branch(*leaf, &branch, i), tree.root());
            }
        }
        assert!(MerkleTree::build(leaves(2)).branch(5).is_empty());
    }
}
