//! Disjoint-set (union-find) forest.
//!
//! Used both for connected-component labeling and for clustering
//! segment-pair separation vectors into baseline classes. The smaller index
//! always becomes the root of a merged set, so the canonical representative
//! of every set is its minimum member regardless of the order in which
//! unions were performed.

/// Disjoint-set forest over the indices `0..len`.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    /// Create a forest where every index is its own singleton set.
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    /// Number of elements tracked by the forest
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Append a new singleton set and return its index.
    pub fn push(&mut self) -> usize {
        let index = self.parent.len();
        self.parent.push(index);
        index
    }

    /// Find the root of the set containing `index`.
    ///
    /// Performs path halving on the way up so repeated queries stay close to
    /// constant time.
    pub fn find(&mut self, index: usize) -> usize {
        let mut current = index;

        while current != self.parent[current] {
            self.parent[current] = self.parent[self.parent[current]];
            current = self.parent[current];
        }

        current
    }

    /// Merge the sets containing `a` and `b`.
    ///
    /// # Returns
    /// The root of the merged set (the smaller of the two roots).
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let root_a = self.find(a);
        let root_b = self.find(b);

        if root_a == root_b {
            return root_a;
        }

        if root_a < root_b {
            self.parent[root_b] = root_a;
            root_a
        } else {
            self.parent[root_a] = root_b;
            root_b
        }
    }

    /// Whether `a` and `b` belong to the same set
    pub fn connected(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Resolve every element to its root.
    ///
    /// The returned vector maps each index to the minimum member of its set.
    pub fn roots(&mut self) -> Vec<usize> {
        (0..self.parent.len()).map(|i| self.find(i)).collect()
    }
}
