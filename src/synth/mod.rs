pub mod assemble;
pub mod goal_graph;
pub mod state;

use crate::term::Term;

use self::state::SynthesisState;

/// Turns the libraries of closed levels into a candidate body. A fresh
/// search is created for every attempt, so implementations may keep state
/// between levels of one attempt.
pub trait CandidateSearch {
    /// Called once a level has been built and closed, in increasing order.
    fn level_closed(&mut self, state: &SynthesisState, level: usize);

    /// A candidate body and its cost, using levels up to `level`.
    fn candidate(&mut self, state: &SynthesisState, level: usize) -> Option<(usize, Term)>;
}
