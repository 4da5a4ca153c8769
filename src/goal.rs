use std::collections::BTreeMap;
use std::fmt;

use crate::value::{ExtendedValue, Value};

/// Desired outputs on a subset of the examples, keyed by example index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Goal(BTreeMap<usize, Value>);

/// How an extended vector relates to a goal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchResult {
    NoMatch,
    Exact,
    /// Every known position agrees; these positions are still unknown.
    Possible(Goal),
}

impl Goal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every position of `vector`.
    pub fn from_vector(vector: &[Value]) -> Self {
        Self(vector.iter().cloned().enumerate().collect())
    }

    /// The positions of `vector` that are not `Error`.
    pub fn known_positions(vector: &[Value]) -> Self {
        Self(
            vector.iter()
                .cloned()
                .enumerate()
                .filter(|(_, v)| !v.is_error())
                .collect(),
        )
    }

    pub fn insert(&mut self, idx: usize, value: Value) {
        self.0.insert(idx, value);
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(&idx)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value)> + '_ {
        self.0.iter().map(|(idx, v)| (*idx, v))
    }

    /// Sorted example indices, used as a memoisation key.
    pub fn key_set(&self) -> Vec<usize> {
        self.0.keys().copied().collect()
    }

    pub fn matches(&self, vector: &[Value]) -> bool {
        self.iter().all(|(idx, v)| vector.get(idx) == Some(v))
    }

    pub fn match_extended(&self, vector: &[ExtendedValue]) -> MatchResult {
        let mut left = Goal::new();

        for (idx, want) in self.iter() {
            match vector.get(idx) {
                Some(ExtendedValue::Known(v)) if v == want => (),
                Some(ExtendedValue::Unknown) => left.insert(idx, want.clone()),
                _ => return MatchResult::NoMatch,
            }
        }

        if left.is_empty() {
            MatchResult::Exact
        } else {
            MatchResult::Possible(left)
        }
    }

    /// Splits by a boolean vector into the positions where it is true and
    /// where it is false. Fails when the condition errors on a goal
    /// position or does not actually split the goal.
    pub fn split_by_condition(&self, cond: &[Value]) -> Option<(Goal, Goal)> {
        let mut then_goal = Goal::new();
        let mut else_goal = Goal::new();

        for (idx, want) in self.iter() {
            match cond.get(idx)? {
                Value::Bool(true) => then_goal.insert(idx, want.clone()),
                Value::Bool(false) => else_goal.insert(idx, want.clone()),
                _ => return None,
            }
        }

        if then_goal.is_empty() || else_goal.is_empty() {
            None
        } else {
            Some((then_goal, else_goal))
        }
    }

    /// Splits by a candidate branch: the goal of a condition that selects
    /// the positions `vector` already solves, those positions, and the rest.
    pub fn split_by_value(&self, vector: &[Value]) -> Option<(Goal, Goal, Goal)> {
        let mut cond_goal = Goal::new();
        let mut then_goal = Goal::new();
        let mut else_goal = Goal::new();

        for (idx, want) in self.iter() {
            let hit = vector.get(idx) == Some(want);

            cond_goal.insert(idx, Value::Bool(hit));
            if hit {
                then_goal.insert(idx, want.clone());
            } else {
                else_goal.insert(idx, want.clone());
            }
        }

        if then_goal.is_empty() || else_goal.is_empty() {
            None
        } else {
            Some((cond_goal, then_goal, else_goal))
        }
    }

    /// Shows the goal as `<v0, ?, v2>` over `example_count` positions.
    pub fn show(&self, example_count: usize) -> ShowGoal<'_> {
        ShowGoal {
            goal: self,
            example_count,
        }
    }
}

impl FromIterator<(usize, Value)> for Goal {
    fn from_iter<I: IntoIterator<Item = (usize, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub struct ShowGoal<'a> {
    goal: &'a Goal,
    example_count: usize,
}

impl fmt::Display for ShowGoal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<")?;
        for idx in 0..self.example_count {
            if idx > 0 {
                write!(f, ", ")?;
            }
            match self.goal.get(idx) {
                Some(v) => write!(f, "{v}")?,
                None => write!(f, "?")?,
            }
        }
        write!(f, ">")
    }
}
