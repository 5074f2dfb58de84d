//! The result of a [`crate::shortest_path`] query: the sequence of rids
//! from the query's `from` endpoint to its `to` endpoint, inclusive.
//!
//! Real Fossil threads this as a doubly-linked list of heap-allocated
//! nodes; a plain `Vec` gives the same midpoint/length/forward/reverse
//! operations without the unsafe intrusive-list plumbing that shape would
//! need in Rust.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChain {
    rids: Vec<i64>,
}

impl PathChain {
    pub(crate) fn new(rids: Vec<i64>) -> Self {
        Self { rids }
    }

    pub fn len(&self) -> usize {
        self.rids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rids.is_empty()
    }

    /// The rid halfway along the chain, rounding down.
    pub fn midpoint(&self) -> Option<i64> {
        self.rids.get(self.rids.len() / 2).copied()
    }

    pub fn forward(&self) -> impl DoubleEndedIterator<Item = i64> + '_ {
        self.rids.iter().copied()
    }

    pub fn reverse(&self) -> impl DoubleEndedIterator<Item = i64> + '_ {
        self.rids.iter().rev().copied()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.rids
    }

    pub fn contains(&self, rid: i64) -> bool {
        self.rids.contains(&rid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_rounds_down_on_even_length() {
        let chain = PathChain::new(vec![1, 2, 3, 4]);
        assert_eq!(chain.midpoint(), Some(3));
    }

    #[test]
    fn reverse_undoes_forward() {
        let chain = PathChain::new(vec![1, 2, 3]);
        let fwd: Vec<i64> = chain.forward().collect();
        let mut rev: Vec<i64> = chain.reverse().collect();
        rev.reverse();
        assert_eq!(fwd, rev);
    }
}
