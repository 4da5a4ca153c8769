use std::collections::HashSet;
use std::fmt::Write as _;
use std::rc::Rc;

use im_rc::Vector;
use log::{debug, trace};
use thiserror::Error;

use crate::config::CostModel;
use crate::goal::Goal;
use crate::synth::state::SynthesisState;
use crate::synth::CandidateSearch;
use crate::term::Term;
use crate::value::Value;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum GoalGraphError {
    #[error("goal {0} is still unsolved")]
    Unsolved(String),
    #[error("the root goal has already been solved")]
    AlreadySolved,
}

/// Where the goal graph looks up terms for freshly created sub-goals.
pub trait GoalLibraries {
    fn bool_term(&self, goal: &Goal) -> Option<Term>;
    fn value_term(&self, goal: &Goal) -> Option<Term>;
}

impl GoalLibraries for SynthesisState {
    fn bool_term(&self, goal: &Goal) -> Option<Term> {
        self.bool_library(goal)
    }

    fn value_term(&self, goal: &Goal) -> Option<Term> {
        self.return_library(goal)
    }
}

#[derive(Debug)]
pub enum GoalNode {
    Unsolved {
        goal: Goal,
        children: Vector<Rc<Resolver>>,
    },
    SolvedByTerm(Term),
    SolvedByResolver(Rc<Resolver>),
}

/// `if cond then then_term else ...` for the goal of the owning node.
/// `then_term` already solves the positions `cond_goal` marks true.
#[derive(Debug)]
pub struct Resolver {
    pub cond_goal: Goal,
    pub cond: Rc<GoalNode>,
    pub then_term: Term,
    pub else_branch: Rc<GoalNode>,
}

impl Resolver {
    pub fn is_solved(&self) -> bool {
        self.cond.is_solved() && self.else_branch.is_solved()
    }
}

impl GoalNode {
    fn unsolved(goal: Goal) -> Rc<Self> {
        Rc::new(GoalNode::Unsolved {
            goal,
            children: Vector::new(),
        })
    }

    pub fn is_solved(&self) -> bool {
        !matches!(self, GoalNode::Unsolved { .. })
    }

    pub fn to_term(&self, example_count: usize) -> Result<Term, GoalGraphError> {
        match self {
            GoalNode::Unsolved { goal, .. } => Err(GoalGraphError::Unsolved(goal.show(example_count).to_string())),
            GoalNode::SolvedByTerm(term) => Ok(term.clone()),
            GoalNode::SolvedByResolver(r) => Ok(Term::if_then_else(
                r.cond.to_term(example_count)?,
                r.then_term.clone(),
                r.else_branch.to_term(example_count)?,
            )),
        }
    }
}

/// A persistent tree of goals. Each inserted term closes the goals it
/// matches and splits the others into a condition and an else-branch;
/// every update returns a new graph sharing untouched nodes with the old.
#[derive(Clone, Debug)]
pub struct GoalGraph {
    root: Rc<GoalNode>,
    example_count: usize,
}

struct Insertion<'a> {
    vector: &'a [Value],
    term: &'a Term,
    libs: &'a dyn GoalLibraries,
}

impl Insertion<'_> {
    fn close_goals(&self, node: &Rc<GoalNode>) -> Rc<GoalNode> {
        let GoalNode::Unsolved { goal, children } = node.as_ref() else {
            return node.clone();
        };

        if goal.matches(self.vector) {
            return Rc::new(GoalNode::SolvedByTerm(self.term.clone()));
        }

        let mut new_children = Vector::new();
        for r in children {
            let r = Resolver {
                cond_goal: r.cond_goal.clone(),
                cond: self.close_goals(&r.cond),
                then_term: r.then_term.clone(),
                else_branch: self.close_goals(&r.else_branch),
            };

            if r.is_solved() {
                return Rc::new(GoalNode::SolvedByResolver(Rc::new(r)));
            }
            new_children.push_back(Rc::new(r));
        }

        Rc::new(GoalNode::Unsolved {
            goal: goal.clone(),
            children: new_children,
        })
    }

    fn split_goal(&self, node: &Rc<GoalNode>) -> Rc<GoalNode> {
        let GoalNode::Unsolved { goal, children } = node.as_ref() else {
            return node.clone();
        };

        let mut children = children.iter()
            .map(|r| self.split_resolver(r))
            .collect::<Vector<_>>();

        if let Some((cond_goal, _, else_goal)) = goal.split_by_value(self.vector) {
            if children.iter().all(|r| r.cond_goal != cond_goal) {
                let cond = match self.libs.bool_term(&cond_goal) {
                    Some(t) => Rc::new(GoalNode::SolvedByTerm(t)),
                    None => GoalNode::unsolved(cond_goal.clone()),
                };
                let else_branch = match self.libs.value_term(&else_goal) {
                    Some(t) => Rc::new(GoalNode::SolvedByTerm(t)),
                    None => GoalNode::unsolved(else_goal),
                };

                children.push_back(Rc::new(Resolver {
                    cond_goal,
                    cond,
                    then_term: self.term.clone(),
                    else_branch,
                }));
            }
        }

        if let Some(r) = children.iter().find(|r| r.is_solved()) {
            return Rc::new(GoalNode::SolvedByResolver(r.clone()));
        }

        Rc::new(GoalNode::Unsolved {
            goal: goal.clone(),
            children,
        })
    }

    fn split_resolver(&self, r: &Rc<Resolver>) -> Rc<Resolver> {
        if r.else_branch.is_solved() {
            return r.clone();
        }

        Rc::new(Resolver {
            cond_goal: r.cond_goal.clone(),
            cond: r.cond.clone(),
            then_term: r.then_term.clone(),
            else_branch: self.split_goal(&r.else_branch),
        })
    }
}

impl GoalGraph {
    pub fn new(goal: Goal, example_count: usize) -> Self {
        Self {
            root: GoalNode::unsolved(goal),
            example_count,
        }
    }

    pub fn root(&self) -> &GoalNode {
        &self.root
    }

    pub fn is_solved(&self) -> bool {
        self.root.is_solved()
    }

    pub fn insert_new_term(
        &self,
        vector: &[Value],
        term: &Term,
        libs: &dyn GoalLibraries,
    ) -> Result<GoalGraph, GoalGraphError> {
        if self.root.is_solved() {
            return Err(GoalGraphError::AlreadySolved);
        }

        let ins = Insertion { vector, term, libs };
        let closed = ins.close_goals(&self.root);
        let root = if closed.is_solved() {
            closed
        } else {
            ins.split_goal(&closed)
        };

        Ok(Self {
            root,
            example_count: self.example_count,
        })
    }

    pub fn to_term(&self) -> Result<Term, GoalGraphError> {
        self.root.to_term(self.example_count)
    }

    /// Indented dump of the graph.
    pub fn show_tree(&self) -> String {
        let mut out = String::new();
        self.show_node(&self.root, 0, &mut out);
        out
    }

    fn show_node(&self, node: &GoalNode, indent: usize, out: &mut String) {
        let pad = "  ".repeat(indent);

        match node {
            GoalNode::Unsolved { goal, children } => {
                let _ = writeln!(out, "{pad}Unsolved: {}", goal.show(self.example_count));
                children.iter().for_each(|r| self.show_resolver(r, indent + 1, out));
            },
            GoalNode::SolvedByTerm(t) => {
                let _ = writeln!(out, "{pad}SolvedByTerm({t})");
            },
            GoalNode::SolvedByResolver(r) => {
                let _ = writeln!(out, "{pad}SolvedByResolver:");
                self.show_resolver(r, indent + 1, out);
            },
        }
    }

    fn show_resolver(&self, r: &Resolver, indent: usize, out: &mut String) {
        let pad = "  ".repeat(indent);

        let _ = writeln!(
            out,
            "{pad}Resolver(condition = {}, then = {})",
            r.cond_goal.show(self.example_count),
            r.then_term,
        );
        self.show_node(&r.cond, indent + 1, out);
        self.show_node(&r.else_branch, indent + 1, out);
    }
}

/// Feeds every known return-typed and boolean term of each closed level
/// into a goal graph and reports the root once it is solved.
pub struct GoalGraphSearch {
    graph: Option<GoalGraph>,
    cost_model: CostModel,
    log_goals: bool,
}

impl GoalGraphSearch {
    pub fn new(cost_model: CostModel, log_goals: bool) -> Self {
        Self {
            graph: None,
            cost_model,
            log_goals,
        }
    }
}

impl CandidateSearch for GoalGraphSearch {
    fn level_closed(&mut self, state: &SynthesisState, level: usize) {
        let graph = self.graph.get_or_insert_with(|| {
            GoalGraph::new(state.root_goal(), state.example_count())
        });
        let mut seen = HashSet::new();

        let terms = state.return_terms(level)
            .iter()
            .chain(state.bool_terms(level).iter());
        for (vector, term) in terms {
            if graph.is_solved() {
                break;
            }
            if !seen.insert(term) {
                continue;
            }

            match graph.insert_new_term(vector, term, state) {
                Ok(next) => *graph = next,
                Err(e) => {
                    debug!("Goal graph rejected {term}: {e}");
                    break;
                },
            }
        }

        if self.log_goals {
            trace!("Goal graph after level {level}:\n{}", graph.show_tree());
        }
    }

    fn candidate(&mut self, _state: &SynthesisState, _level: usize) -> Option<(usize, Term)> {
        let term = self.graph.as_ref()?.to_term().ok()?;

        Some((self.cost_model.cost(&term), term))
    }
}
