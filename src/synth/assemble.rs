use std::collections::HashMap;

use log::trace;

use crate::eval::{evaluate, EvalError};
use crate::component::Binding;
use crate::goal::{Goal, MatchResult};
use crate::synth::state::SynthesisState;
use crate::synth::CandidateSearch;
use crate::term::Term;
use crate::value::{ExtendedValue, ExtendedVector};

/// Memoised outcome for one set of example indices.
#[derive(Clone, Debug)]
enum Memo {
    FoundAtCost(usize, Term),
    NotFoundUnder(usize),
}

struct Searched {
    best: Option<(usize, Term)>,
    /// No candidate was checked against the enclosing partial program.
    context_free: bool,
}

/// Assembles `if`/`else` chains out of the level libraries. Conditions are
/// enumerated first; the cheapest then-branch is taken for each condition
/// and the else-branch is searched recursively.
pub struct Assembler {
    search_size_factor: usize,
    if_cost: usize,
    log_goals: bool,
}

impl Assembler {
    pub fn new(search_size_factor: usize, if_cost: usize, log_goals: bool) -> Self {
        Self {
            search_size_factor,
            if_cost,
            log_goals,
        }
    }
}

impl CandidateSearch for Assembler {
    fn level_closed(&mut self, _state: &SynthesisState, _level: usize) {}

    fn candidate(&mut self, state: &SynthesisState, level: usize) -> Option<(usize, Term)> {
        let mut search = AssembleSearch {
            state,
            max_comp_cost: level,
            if_cost: self.if_cost,
            log_goals: self.log_goals,
            memo: HashMap::new(),
        };
        let budget = self.search_size_factor * level;

        search.search_min(budget, &state.root_goal(), &|t: Term| t, true).best
    }
}

/// One search over a fixed set of closed levels.
pub struct AssembleSearch<'a> {
    state: &'a SynthesisState,
    max_comp_cost: usize,
    if_cost: usize,
    log_goals: bool,
    memo: HashMap<Vec<usize>, Memo>,
}

impl<'a> AssembleSearch<'a> {
    pub fn new(state: &'a SynthesisState, max_comp_cost: usize, if_cost: usize) -> Self {
        Self {
            state,
            max_comp_cost: max_comp_cost.min(state.levels()),
            if_cost,
            log_goals: false,
            memo: HashMap::new(),
        }
    }

    /// The cheapest term (and its cost) that agrees with `goal` within
    /// `budget`. `fill` places a term into the partial program assembled
    /// around this goal; `first` marks the outermost branch, where recursive
    /// candidates cannot be checked yet.
    pub fn search(&mut self, budget: usize, goal: &Goal, fill: &dyn Fn(Term) -> Term, first: bool) -> Option<(usize, Term)> {
        self.search_min(budget, goal, fill, first).best
    }

    fn search_min(
        &mut self,
        budget: usize,
        goal: &Goal,
        fill: &dyn Fn(Term) -> Term,
        first: bool,
    ) -> Searched {
        if budget == 0 {
            return Searched { best: None, context_free: true };
        }

        let key = goal.key_set();
        match self.memo.get(&key) {
            Some(Memo::FoundAtCost(c, t)) if *c <= budget => {
                return Searched { best: Some((*c, t.clone())), context_free: true };
            },
            Some(Memo::NotFoundUnder(c)) if *c >= budget => {
                return Searched { best: None, context_free: true };
            },
            _ => (),
        }

        if self.log_goals {
            trace!("Goal {} under {budget}", goal.show(self.state.example_count()));
        }

        let mut context_free = true;
        let direct = self.direct_match(budget, goal, fill, first, &mut context_free);

        // A direct match bounds the split search: splits must beat it.
        let limit = match &direct {
            Some((c, _)) => budget.min(c - 1),
            None => budget,
        };
        let split = self.split_search(limit, goal, fill, &mut context_free);
        let best = split.or(direct);

        if context_free {
            let memo = match &best {
                Some((c, t)) => Memo::FoundAtCost(*c, t.clone()),
                None => Memo::NotFoundUnder(budget),
            };
            self.memo.insert(key, memo);
        }

        Searched { best, context_free }
    }

    fn direct_match(
        &self,
        budget: usize,
        goal: &Goal,
        fill: &dyn Fn(Term) -> Term,
        first: bool,
        context_free: &mut bool,
    ) -> Option<(usize, Term)> {
        for c in 1..=self.max_comp_cost.min(budget) {
            if let Some(term) = self.state.return_terms(c).search(goal) {
                return Some((c, term.clone()));
            }

            if first {
                continue;
            }

            for (term, vector) in self.state.rec_terms(c) {
                match goal.match_extended(vector) {
                    MatchResult::NoMatch => (),
                    MatchResult::Exact => return Some((c, term.clone())),
                    MatchResult::Possible(left) => {
                        *context_free = false;
                        if self.completes(fill(term.clone()), &left) {
                            return Some((c, term.clone()));
                        }
                    },
                }
            }
        }

        None
    }

    /// Runs the whole program on the examples still left to check.
    fn completes(&self, program: Term, left: &Goal) -> bool {
        let imp = self.state.recursive_impl(program);

        left.iter().all(|(idx, want)| {
            matches!(imp.execute(self.state.inputs(idx)), Ok(v) if v == *want)
        })
    }

    fn split_search(
        &mut self,
        limit: usize,
        goal: &Goal,
        fill: &dyn Fn(Term) -> Term,
        context_free: &mut bool,
    ) -> Option<(usize, Term)> {
        let state = self.state;
        let mut best: Option<(usize, Term)> = None;
        let max_cond = self.max_comp_cost.min(limit.saturating_sub(self.if_cost + 2));

        for c_cond in 1..=max_cond {
            for (cond_vec, cond) in state.bool_terms(c_cond).iter() {
                let Some((then_goal, else_goal)) = goal.split_by_condition(cond_vec) else {
                    continue;
                };

                let then_max = self.max_comp_cost.min(limit - self.if_cost - c_cond - 1);
                let Some((c_then, then)) = self.then_candidate(then_max, &then_goal, cond, fill, context_free) else {
                    continue;
                };

                let cost_so_far = c_then + c_cond + self.if_cost;
                let ceiling = match &best {
                    Some((c, _)) => limit.min(c - 1),
                    None => limit,
                };
                let Some(else_budget) = ceiling.checked_sub(cost_so_far) else {
                    continue;
                };

                let fill_else = |t: Term| fill(Term::if_then_else(cond.clone(), then.clone(), t));
                let searched = self.search_min(else_budget, &else_goal, &fill_else, false);
                *context_free &= searched.context_free;

                if let Some((c_else, otherwise)) = searched.best {
                    best = Some((
                        cost_so_far + c_else,
                        Term::if_then_else(cond.clone(), then.clone(), otherwise),
                    ));
                }
            }
        }

        best
    }

    /// The cheapest then-branch for `cond`. Recursive candidates are checked
    /// by running them inside `if cond then candidate else HOLE`.
    fn then_candidate(
        &self,
        max_cost: usize,
        then_goal: &Goal,
        cond: &Term,
        fill: &dyn Fn(Term) -> Term,
        context_free: &mut bool,
    ) -> Option<(usize, Term)> {
        for c in 1..=max_cost {
            if let Some(term) = self.state.return_terms(c).search(then_goal) {
                return Some((c, term.clone()));
            }

            for (term, vector) in self.state.rec_terms(c) {
                *context_free = false;
                if self.then_holds(term, vector, then_goal, cond, fill) {
                    return Some((c, term.clone()));
                }
            }
        }

        None
    }

    fn then_holds(
        &self,
        term: &Term,
        vector: &ExtendedVector,
        then_goal: &Goal,
        cond: &Term,
        fill: &dyn Fn(Term) -> Term,
    ) -> bool {
        let partial = fill(Term::if_then_else(cond.clone(), term.clone(), Term::hole()));
        let imp = self.state.recursive_impl(partial);
        let name = &self.state.signature().name;
        let env = self.state.environment().with_binding(name, Binding::Recursive(imp));

        then_goal.iter().all(|(idx, want)| match &vector[idx] {
            ExtendedValue::Known(v) => v == want,
            ExtendedValue::Unknown => match evaluate(term, self.state.var_env(idx), &env) {
                Ok(v) => v == *want,
                Err(EvalError::HoleReached) => false,
                Err(e) => {
                    trace!("Then-branch {term} failed: {e}");
                    false
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Signature;
    use crate::config::{Config, DecreaseCheck};
    use crate::library;
    use crate::oracle::{BufferedOracle, Example};
    use crate::types::Type;
    use crate::value::Value;

    fn built_state(
        signature: Signature,
        examples: Vec<Example>,
        comps: &[crate::component::ComponentImpl],
        levels: usize,
    ) -> SynthesisState {
        built_state_with(signature, examples, comps, levels, Config::default())
    }

    fn built_state_with(
        signature: Signature,
        examples: Vec<Example>,
        comps: &[crate::component::ComponentImpl],
        levels: usize,
        config: Config,
    ) -> SynthesisState {
        let mut state = SynthesisState::new(signature, examples, comps, HashMap::new(), config);
        let mut oracle = BufferedOracle::new(state.examples(), None, vec![]);

        for _ in 0..levels {
            state.build_next_level(&mut oracle);
        }

        state
    }

    fn length_state(levels: usize) -> SynthesisState {
        let signature = Signature {
            name: "length".to_string(),
            arg_names: vec!["xs".to_string()],
            input_types: vec![Type::list(Type::Fixed(0))],
            return_type: Type::int(),
        };
        let examples = [(&[][..], 0), (&[1][..], 1), (&[1, 2][..], 2)]
            .iter()
            .map(|(xs, n)| Example::new(vec![Value::int_list(xs)], Value::Int(*n)))
            .collect();
        let comps = [
            library::zero(),
            library::inc(),
            library::is_empty(),
            library::head(),
            library::tail(),
        ];

        built_state(signature, examples, &comps, levels)
    }

    #[test]
    fn assembles_recursive_length() {
        let state = length_state(4);
        let mut assembler = Assembler::new(3, 1, false);

        let (cost, term) = assembler.candidate(&state, 4).unwrap();

        assert_eq!(cost, 8);
        assert_eq!(term.to_string(), "if isEmpty(xs) then zero() else inc(length(tail(xs)))");
    }

    #[test]
    fn too_small_levels_find_nothing() {
        let state = length_state(3);
        let mut assembler = Assembler::new(3, 1, false);

        assert!(assembler.candidate(&state, 3).is_none());
    }

    #[test]
    fn results_agree_with_the_goal() {
        let state = length_state(4);
        let goal = Goal::from_iter([(0, Value::Int(0)), (1, Value::Int(1))]);
        let mut search = AssembleSearch::new(&state, 4, 1);

        let (cost, term) = search.search(12, &goal, &|t: Term| t, true).unwrap();
        let imp = state.recursive_impl(term.clone());

        assert!(cost <= 12);
        for (idx, want) in goal.iter() {
            assert_eq!(imp.execute(state.inputs(idx)).as_ref(), Ok(want), "{term}");
        }
    }

    #[test]
    fn cheap_direct_match_wins() {
        let signature = Signature {
            name: "f".to_string(),
            arg_names: vec!["n".to_string()],
            input_types: vec![Type::int()],
            return_type: Type::int(),
        };
        let examples = [0, 1, 2]
            .iter()
            .map(|n| Example::new(vec![Value::Int(*n)], Value::Int(*n)))
            .collect();
        let comps = [library::zero(), library::is_zero(), library::inc()];
        let state = built_state(signature, examples, &comps, 3);
        let mut search = AssembleSearch::new(&state, 3, 1);

        assert_eq!(search.search(9, &state.root_goal(), &|t: Term| t, true), Some((1, Term::var("n"))));
    }

    /// Plain integer maximum, with recursion ruled out so that every
    /// library term has a fully known vector.
    fn max_state(levels: usize) -> SynthesisState {
        let signature = Signature {
            name: "max".to_string(),
            arg_names: vec!["a".to_string(), "b".to_string()],
            input_types: vec![Type::int(), Type::int()],
            return_type: Type::int(),
        };
        let examples = [(1, 2), (3, 1), (0, 5), (6, 4), (2, 2)]
            .iter()
            .map(|(a, b)| Example::new(vec![Value::Int(*a), Value::Int(*b)], Value::Int(*a.max(b))))
            .collect();
        let comps = [library::zero(), library::inc(), library::lt()];
        let config = Config {
            decrease_check: DecreaseCheck::custom(|_, _| false),
            ..Config::default()
        };

        built_state_with(signature, examples, &comps, levels, config)
    }

    /// Cheapest `if` chain agreeing with `goal`, by trying every condition
    /// and then-branch of every level.
    fn cheapest_chain(state: &SynthesisState, goal: &Goal, budget: usize) -> Option<usize> {
        let fits = |c: usize, goal: &Goal| state.return_terms(c).iter().any(|(v, _)| goal.matches(v));
        let mut best = (1..=state.levels().min(budget)).find(|c| fits(*c, goal));

        for c_cond in 1..=state.levels() {
            for (cond, _) in state.bool_terms(c_cond).iter() {
                let Some((then_goal, else_goal)) = goal.split_by_condition(cond) else {
                    continue;
                };

                for c_then in (1..=state.levels()).filter(|c| fits(*c, &then_goal)) {
                    let used = 1 + c_cond + c_then;
                    if used >= budget {
                        continue;
                    }

                    if let Some(c_else) = cheapest_chain(state, &else_goal, budget - used) {
                        let total = used + c_else;
                        best = Some(best.map_or(total, |b| b.min(total)));
                    }
                }
            }
        }

        best
    }

    #[test]
    fn costs_match_exhaustive_chains() {
        let state = max_state(3);
        let root = state.root_goal();

        assert!(state.rec_terms(3).is_empty());
        assert_eq!(cheapest_chain(&state, &root, 12), Some(6));

        for mask in 1u32..(1 << state.example_count()) {
            let goal = root.iter()
                .filter(|(idx, _)| mask >> idx & 1 == 1)
                .map(|(idx, v)| (idx, v.clone()))
                .collect::<Goal>();

            for budget in 1..=12 {
                let mut search = AssembleSearch::new(&state, 3, 1);
                let found = search.search(budget, &goal, &|t: Term| t, true);

                assert_eq!(
                    found.as_ref().map(|(c, _)| *c),
                    cheapest_chain(&state, &goal, budget),
                    "goal {} under {budget}",
                    goal.show(state.example_count()),
                );
                if let Some((cost, term)) = found {
                    assert_eq!(Config::default().cost_model.cost(&term), cost);
                }
            }
        }
    }
}
