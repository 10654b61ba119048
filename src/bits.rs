//! Compact bit vector over word indexes.
//!
//! Projected coverage and complement vectors, as well as the per-side
//! unaligned-word masks, are sets of small word positions; a handful of
//! `u64` blocks covers any realistic sentence. Only the operations the
//! aligner actually performs are provided.

const BITS: usize = u64::BITS as usize;

/// A growable bit vector indexed by word position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitVec {
    blocks: Vec<u64>,
}

impl BitVec {
    pub fn new() -> Self {
        BitVec { blocks: Vec::new() }
    }

    pub fn set(&mut self, index: usize) {
        let block = index / BITS;
        if block >= self.blocks.len() {
            self.blocks.resize(block + 1, 0);
        }
        self.blocks[block] |= 1 << (index % BITS);
    }

    pub fn get(&self, index: usize) -> bool {
        let block = index / BITS;
        block < self.blocks.len() && self.blocks[block] & (1 << (index % BITS)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| *b == 0)
    }

    pub fn cardinality(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Lowest set index, if any.
    pub fn min_set(&self) -> Option<usize> {
        for (i, b) in self.blocks.iter().enumerate() {
            if *b != 0 {
                return Some(i * BITS + b.trailing_zeros() as usize);
            }
        }
        None
    }

    /// Highest set index, if any.
    pub fn max_set(&self) -> Option<usize> {
        for (i, b) in self.blocks.iter().enumerate().rev() {
            if *b != 0 {
                return Some(i * BITS + (BITS - 1 - b.leading_zeros() as usize));
            }
        }
        None
    }

    pub fn or(&mut self, other: &BitVec) {
        if other.blocks.len() > self.blocks.len() {
            self.blocks.resize(other.blocks.len(), 0);
        }
        for (i, b) in other.blocks.iter().enumerate() {
            self.blocks[i] |= b;
        }
    }

    /// True if any index in `start..end` is set.
    pub fn intersects_range(&self, start: usize, end: usize) -> bool {
        (start..end).any(|i| self.get(i))
    }

    /// Iterate set indexes in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .flat_map(|(i, b)| (0..BITS).filter(move |j| b & (1 << j) != 0).map(move |j| i * BITS + j))
    }
}

impl FromIterator<usize> for BitVec {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut out = BitVec::new();
        for i in iter {
            out.set(i);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_across_blocks() {
        let mut v = BitVec::new();
        assert!(v.is_empty());
        v.set(3);
        v.set(70);
        assert!(v.get(3));
        assert!(v.get(70));
        assert!(!v.get(4));
        assert_eq!(v.cardinality(), 2);
        assert_eq!(v.min_set(), Some(3));
        assert_eq!(v.max_set(), Some(70));
    }

    #[test]
    fn range_queries() {
        let v: BitVec = [2, 3, 4, 9].into_iter().collect();
        assert!(v.intersects_range(0, 3));
        assert!(!v.intersects_range(5, 9));
        assert_eq!(v.iter().collect::<Vec<_>>(), vec![2, 3, 4, 9]);
    }

    #[test]
    fn or_keeps_both_sides() {
        let mut a: BitVec = [1, 5].into_iter().collect();
        let b: BitVec = [5, 64].into_iter().collect();
        a.or(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 5, 64]);
    }
}
