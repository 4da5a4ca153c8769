use std::collections::{BTreeMap, HashMap};

use crate::goal::Goal;
use crate::value::{Value, ValueVector};

/// Index from value vectors (one value per example) to the first term that
/// produced them. Lookups by partial goal descend a trie keyed by the value
/// at each example; while the index is sparse a linear scan is used instead.
pub struct ValueVectorTree<T> {
    depth: usize,
    threshold: f64,
    elements: Vec<(ValueVector, T)>,
    exact: HashMap<ValueVector, usize>,
    trie: Option<TrieNode>,
}

enum TrieNode {
    Leaf(usize),
    Branch(BTreeMap<Value, TrieNode>),
}

impl TrieNode {
    fn insert(&mut self, vector: &[Value], idx: usize) {
        match (self, vector.split_first()) {
            (TrieNode::Branch(children), Some((first, rest))) => {
                let child = children.entry(first.clone()).or_insert_with(|| {
                    if rest.is_empty() {
                        TrieNode::Leaf(idx)
                    } else {
                        TrieNode::Branch(BTreeMap::new())
                    }
                });

                child.insert(rest, idx)
            },
            // NOTE: leaves are only reached with the vector exhausted, and
            // duplicates are filtered out before we get here
            _ => (),
        }
    }

    fn search(&self, goal: &Goal, depth: usize) -> Option<usize> {
        match self {
            TrieNode::Leaf(idx) => Some(*idx),
            TrieNode::Branch(children) => match goal.get(depth) {
                Some(want) => children.get(want)?.search(goal, depth + 1),
                None => children.values().find_map(|c| c.search(goal, depth + 1)),
            },
        }
    }
}

impl<T> ValueVectorTree<T> {
    pub fn new(depth: usize, threshold: f64) -> Self {
        Self {
            depth,
            threshold,
            elements: Vec::new(),
            exact: HashMap::new(),
            trie: None,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Adds an entry. A vector already present keeps its first term.
    pub fn insert(&mut self, vector: ValueVector, term: T) -> bool {
        assert_eq!(vector.len(), self.depth, "vector length must match the tree depth");

        if self.exact.contains_key(&vector) {
            return false;
        }

        let idx = self.elements.len();
        self.exact.insert(vector.clone(), idx);
        if let Some(trie) = &mut self.trie {
            trie.insert(&vector, idx);
        }
        self.elements.push((vector, term));

        if self.trie.is_none() && self.dense_enough() {
            self.build_trie();
        }

        true
    }

    pub fn get(&self, vector: &[Value]) -> Option<&T> {
        self.exact.get(vector).map(|idx| &self.elements[*idx].1)
    }

    /// Some entry agreeing with `goal` on every goal position.
    pub fn search_partial(&self, goal: &Goal) -> Option<(&ValueVector, &T)> {
        let idx = match &self.trie {
            Some(trie) => trie.search(goal, 0),
            None => self.linear_search(goal),
        }?;
        let (vector, term) = &self.elements[idx];

        Some((vector, term))
    }

    /// The term for `goal`: an exact lookup when the goal constrains every
    /// example, a partial search otherwise.
    pub fn search(&self, goal: &Goal) -> Option<&T> {
        if goal.len() == self.depth {
            let vector = goal.iter().map(|(_, v)| v.clone()).collect::<ValueVector>();

            return self.get(&vector);
        }

        self.search_partial(goal).map(|(_, t)| t)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ValueVector, &T)> + '_ {
        self.elements.iter().map(|(v, t)| (v, t))
    }

    pub fn has_trie(&self) -> bool {
        self.trie.is_some()
    }

    fn linear_search(&self, goal: &Goal) -> Option<usize> {
        self.elements.iter().position(|(v, _)| goal.matches(v))
    }

    fn dense_enough(&self) -> bool {
        self.depth > 0 && self.elements.len() as f64 / self.depth as f64 >= self.threshold
    }

    fn build_trie(&mut self) {
        let mut trie = TrieNode::Branch(BTreeMap::new());

        for (idx, (vector, _)) in self.elements.iter().enumerate() {
            trie.insert(vector, idx);
        }

        self.trie = Some(trie);
    }
}
