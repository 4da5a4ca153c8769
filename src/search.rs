use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

use crate::component::{ComponentImpl, Environment, RecursiveImpl, ReductionRule, Signature};
use crate::config::{Config, DecreaseCheck, GoalSearchMode, RebootStrategy};
use crate::oracle::{BufferedOracle, Example, Oracle};
use crate::synth::assemble::Assembler;
use crate::synth::goal_graph::GoalGraphSearch;
use crate::synth::state::SynthesisState;
use crate::synth::CandidateSearch;
use crate::term::{Term, HOLE};
use crate::types::Type;
use crate::value::{args_cmp, ShowArgs, Value};

/// Misuse of the API. These are never produced by the search itself.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("{names} argument names for {types} input types")]
    SignatureArity { names: usize, types: usize },
    #[error("component name {0} is taken")]
    ComponentCollision(String),
    #[error("example has {found} arguments, expected {expected}")]
    ExampleArity { expected: usize, found: usize },
}

/// Everything needed to synthesize one function.
pub struct SynthesisRequest {
    pub name: String,
    pub arg_names: Vec<String>,
    pub input_types: Vec<Type>,
    pub return_type: Type,
    pub examples: Vec<Example>,
    pub components: Vec<ComponentImpl>,
    pub reduction_rules: HashMap<String, ReductionRule>,
    pub oracle: Option<Rc<dyn Oracle>>,
    /// Examples known up front but only used to check candidates.
    pub held_back: Vec<Example>,
}

impl SynthesisRequest {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        arg_names: impl IntoIterator<Item = S>,
        input_types: Vec<Type>,
        return_type: Type,
    ) -> Self {
        Self {
            name: name.into(),
            arg_names: arg_names.into_iter().map(Into::into).collect(),
            input_types,
            return_type,
            examples: Vec::new(),
            components: Vec::new(),
            reduction_rules: HashMap::new(),
            oracle: None,
            held_back: Vec::new(),
        }
    }

    pub fn examples(mut self, examples: impl IntoIterator<Item = Example>) -> Self {
        self.examples.extend(examples);
        self
    }

    pub fn components(mut self, components: impl IntoIterator<Item = ComponentImpl>) -> Self {
        self.components.extend(components);
        self
    }

    pub fn reduction_rules(mut self, rules: HashMap<String, ReductionRule>) -> Self {
        self.reduction_rules.extend(rules);
        self
    }

    pub fn oracle(mut self, oracle: impl Oracle + 'static) -> Self {
        self.oracle = Some(Rc::new(oracle));
        self
    }

    pub fn held_back(mut self, examples: impl IntoIterator<Item = Example>) -> Self {
        self.held_back.extend(examples);
        self
    }

    fn validate(&self) -> Result<(), SynthesisError> {
        let arity = self.input_types.len();

        if self.arg_names.len() != arity {
            return Err(SynthesisError::SignatureArity {
                names: self.arg_names.len(),
                types: arity,
            });
        }

        let mut names = vec![self.name.as_str(), HOLE];
        for comp in &self.components {
            if names.contains(&comp.name.as_str()) {
                return Err(SynthesisError::ComponentCollision(comp.name.clone()));
            }
            names.push(&comp.name);
        }

        let wrong = self.examples.iter()
            .chain(&self.held_back)
            .find(|e| e.args.len() != arity);
        if let Some(e) = wrong {
            return Err(SynthesisError::ExampleArity {
                expected: arity,
                found: e.args.len(),
            });
        }

        Ok(())
    }
}

/// A synthesized recursive definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesizedComponent {
    pub signature: Signature,
    pub body: Term,
    pub cost: usize,
    /// Enumeration level the body was assembled at.
    pub level: usize,
}

impl SynthesizedComponent {
    /// The definition as a callable, running in `components`.
    pub fn implementation(
        &self,
        components: &[ComponentImpl],
        decrease: DecreaseCheck,
    ) -> Rc<RecursiveImpl> {
        RecursiveImpl::new(
            self.signature.clone(),
            self.body.clone(),
            Environment::new(components),
            decrease,
        )
    }
}

impl fmt::Display for SynthesizedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.signature, self.body)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub reboots: usize,
    pub levels_searched: usize,
    /// Time spent in each attempt that ended in a reboot.
    pub reboot_times: Vec<Duration>,
    pub total_time: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotFoundReason {
    /// Two examples share their arguments but not their output.
    ConflictingExamples,
    /// Every level up to the configured maximum was searched.
    LevelsExhausted,
}

impl fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundReason::ConflictingExamples => write!(f, "examples contradict each other"),
            NotFoundReason::LevelsExhausted => write!(f, "no term under the cost limit"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum SynthesisOutcome {
    Success {
        component: SynthesizedComponent,
        /// The trusted examples, including those promoted by reboots.
        examples: Vec<Example>,
        stats: SearchStats,
    },
    NotFound {
        reason: NotFoundReason,
        examples: Vec<Example>,
        stats: SearchStats,
    },
}

impl SynthesisOutcome {
    pub fn component(&self) -> Option<&SynthesizedComponent> {
        match self {
            SynthesisOutcome::Success { component, .. } => Some(component),
            SynthesisOutcome::NotFound { .. } => None,
        }
    }

    pub fn examples(&self) -> &[Example] {
        match self {
            SynthesisOutcome::Success { examples, .. } => examples,
            SynthesisOutcome::NotFound { examples, .. } => examples,
        }
    }

    pub fn stats(&self) -> &SearchStats {
        match self {
            SynthesisOutcome::Success { stats, .. } => stats,
            SynthesisOutcome::NotFound { stats, .. } => stats,
        }
    }
}

/// What one call to [`CegisSearch::step`] did.
#[derive(Clone, Debug)]
pub enum SearchStep {
    /// A level was built and no candidate came out of it.
    Level {
        level: usize,
    },
    Candidate {
        level: usize,
        cost: usize,
        body: Term,
    },
    /// The last candidate was run on the buffered oracle examples.
    Validated {
        passed: usize,
        failed: usize,
    },
    /// A failing example became trusted and the search restarted.
    Reboot {
        example: Example,
        example_count: usize,
    },
    Solved(SynthesizedComponent),
    Exhausted(NotFoundReason),
}

enum Phase {
    Searching(usize),
    CandidateFound {
        level: usize,
        cost: usize,
        body: Term,
    },
    Rebooting {
        failed: Vec<Example>,
        passed: Vec<Example>,
    },
    Succeeded(SynthesizedComponent),
    Exhausted(NotFoundReason),
    Done,
}

/// The libraries, oracle buffer and candidate search of one attempt.
/// A reboot throws all of it away.
struct Attempt {
    state: SynthesisState,
    oracle: BufferedOracle,
    search: Box<dyn CandidateSearch>,
    started: Instant,
}

/// Counterexample-guided search: builds levels until a candidate shows up,
/// checks it against every example the oracle has produced so far, and on
/// a mismatch trusts one failing example and starts over.
pub struct CegisSearch {
    signature: Signature,
    components: Vec<ComponentImpl>,
    reduction_rules: HashMap<String, ReductionRule>,
    oracle: Option<Rc<dyn Oracle>>,
    config: Config,
    examples: Vec<Example>,
    attempt: Attempt,
    phase: Phase,
    stats: SearchStats,
    started: Instant,
}

impl CegisSearch {
    pub fn new(request: SynthesisRequest, config: Config) -> Result<Self, SynthesisError> {
        request.validate()?;

        let signature = Signature {
            name: request.name,
            arg_names: request.arg_names,
            input_types: request.input_types.iter().map(Type::fix_vars).collect(),
            return_type: request.return_type.fix_vars(),
        };
        let mut examples = request.examples;
        sort_examples(&mut examples);
        let mut held_back = request.held_back;
        sort_examples(&mut held_back);

        let phase = if has_conflicts(examples.iter().chain(&held_back)) {
            warn!("Conflicting examples for {}", signature.name);
            Phase::Exhausted(NotFoundReason::ConflictingExamples)
        } else {
            Phase::Searching(1)
        };

        let attempt = new_attempt(
            &signature,
            &request.components,
            &request.reduction_rules,
            request.oracle.clone(),
            &config,
            &examples,
            held_back,
        );

        Ok(Self {
            signature,
            components: request.components,
            reduction_rules: request.reduction_rules,
            oracle: request.oracle,
            config,
            examples,
            attempt,
            phase,
            stats: SearchStats::default(),
            started: Instant::now(),
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The trusted examples, in canonical order.
    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn step(&mut self) -> Option<SearchStep> {
        let phase = std::mem::replace(&mut self.phase, Phase::Done);

        let (next, step) = match phase {
            Phase::Searching(level) => self.search_level(level),
            Phase::CandidateFound { level, cost, body } => self.validate(level, cost, body),
            Phase::Rebooting { failed, passed } => self.reboot(failed, passed),
            Phase::Succeeded(component) => (Phase::Done, SearchStep::Solved(component)),
            Phase::Exhausted(reason) => (Phase::Done, SearchStep::Exhausted(reason)),
            Phase::Done => return None,
        };

        self.phase = next;
        self.stats.total_time = self.started.elapsed();

        Some(step)
    }

    /// Steps until the search ends.
    pub fn run(mut self) -> SynthesisOutcome {
        let mut result = Err(NotFoundReason::LevelsExhausted);

        while let Some(step) = self.step() {
            match step {
                SearchStep::Solved(component) => result = Ok(component),
                SearchStep::Exhausted(reason) => result = Err(reason),
                _ => (),
            }
        }

        match result {
            Ok(component) => SynthesisOutcome::Success {
                component,
                examples: self.examples,
                stats: self.stats,
            },
            Err(reason) => SynthesisOutcome::NotFound {
                reason,
                examples: self.examples,
                stats: self.stats,
            },
        }
    }

    fn search_level(&mut self, level: usize) -> (Phase, SearchStep) {
        if level > self.config.max_cost {
            return (
                Phase::Done,
                SearchStep::Exhausted(NotFoundReason::LevelsExhausted),
            );
        }

        let attempt = &mut self.attempt;
        attempt.state.build_next_level(&mut attempt.oracle);
        attempt.search.level_closed(&attempt.state, level);
        self.stats.levels_searched += 1;

        match attempt.search.candidate(&attempt.state, level) {
            Some((cost, body)) => {
                debug!("Candidate at level {level} (cost {cost}): {body}");

                let step = SearchStep::Candidate {
                    level,
                    cost,
                    body: body.clone(),
                };

                (Phase::CandidateFound { level, cost, body }, step)
            },
            None if level >= self.config.max_cost => (
                Phase::Exhausted(NotFoundReason::LevelsExhausted),
                SearchStep::Level { level },
            ),
            None => (Phase::Searching(level + 1), SearchStep::Level { level }),
        }
    }

    fn validate(&mut self, level: usize, cost: usize, body: Term) -> (Phase, SearchStep) {
        let imp = self.attempt.state.recursive_impl(body.clone());
        let (passed, failed): (Vec<_>, Vec<_>) = self.attempt.oracle
            .buffer()
            .iter()
            .cloned()
            .partition(|e| match imp.execute(&e.args) {
                Ok(v) => v == e.output,
                Err(err) => {
                    warn!("Candidate {body} failed to run on {}: {err}", ShowArgs(&e.args));
                    false
                },
            });

        let step = SearchStep::Validated {
            passed: passed.len(),
            failed: failed.len(),
        };

        if failed.is_empty() {
            let component = SynthesizedComponent {
                signature: self.signature.clone(),
                body,
                cost,
                level,
            };
            info!("Solved: {component}");

            return (Phase::Succeeded(component), step);
        }

        if self.config.log.reboots {
            info!("Candidate {body} fails on:");
            for e in &failed {
                info!("  {e}");
            }
        }

        (Phase::Rebooting { failed, passed }, step)
    }

    fn reboot(&mut self, mut failed: Vec<Example>, passed: Vec<Example>) -> (Phase, SearchStep) {
        let pick = match self.config.reboot_strategy {
            RebootStrategy::Simplest => failed.iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| args_cmp(&a.args, &b.args)),
            RebootStrategy::MostComplex => failed.iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| args_cmp(&a.args, &b.args)),
        }
        .map(|(idx, _)| idx);

        // NOTE: validation only reboots with at least one failure
        let Some(idx) = pick else {
            return (
                Phase::Done,
                SearchStep::Exhausted(NotFoundReason::LevelsExhausted),
            );
        };
        let example = failed.remove(idx);

        self.stats.reboots += 1;
        self.stats.reboot_times.push(self.attempt.started.elapsed());

        self.examples.push(example.clone());
        sort_examples(&mut self.examples);

        if self.config.log.reboots {
            info!("Reboot {}: trusting {example}", self.stats.reboots);
            for e in &self.examples {
                info!("  {e}");
            }
        }

        let mut buffer = failed;
        buffer.extend(passed);
        self.attempt = new_attempt(
            &self.signature,
            &self.components,
            &self.reduction_rules,
            self.oracle.clone(),
            &self.config,
            &self.examples,
            buffer,
        );

        let step = SearchStep::Reboot {
            example,
            example_count: self.examples.len(),
        };

        (Phase::Searching(1), step)
    }
}

fn new_attempt(
    signature: &Signature,
    components: &[ComponentImpl],
    reduction_rules: &HashMap<String, ReductionRule>,
    oracle: Option<Rc<dyn Oracle>>,
    config: &Config,
    examples: &[Example],
    buffer: Vec<Example>,
) -> Attempt {
    let search: Box<dyn CandidateSearch> = match config.goal_search {
        GoalSearchMode::Assembler => Box::new(Assembler::new(
            config.search_size_factor,
            config.cost_model.if_then_else,
            config.log.goals,
        )),
        GoalSearchMode::GoalGraph => Box::new(GoalGraphSearch::new(
            config.cost_model,
            config.log.goals,
        )),
    };

    Attempt {
        state: SynthesisState::new(
            signature.clone(),
            examples.to_vec(),
            components,
            reduction_rules.clone(),
            config.clone(),
        ),
        oracle: BufferedOracle::new(examples, oracle, buffer),
        search,
        started: Instant::now(),
    }
}

/// Simplest arguments first. Exact duplicates are dropped.
fn sort_examples(examples: &mut Vec<Example>) {
    examples.sort_by(|a, b| args_cmp(&a.args, &b.args));
    examples.dedup();
}

/// Two examples with the same arguments and different outputs.
fn has_conflicts<'a>(examples: impl IntoIterator<Item = &'a Example>) -> bool {
    let mut seen: HashMap<&[Value], &Value> = HashMap::new();

    examples.into_iter().any(|e| match seen.insert(&e.args, &e.output) {
        Some(prev) => *prev != e.output,
        None => false,
    })
}

pub fn synthesize(
    request: SynthesisRequest,
    config: &Config,
) -> Result<SynthesisOutcome, SynthesisError> {
    Ok(CegisSearch::new(request, config.clone())?.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library;

    fn length_request() -> SynthesisRequest {
        SynthesisRequest::new("length", ["xs"], vec![Type::list(Type::Var(0))], Type::int())
            .components([
                library::zero(),
                library::inc(),
                library::is_empty(),
                library::head(),
                library::tail(),
            ])
    }

    fn list_example(xs: &[i64], n: i64) -> Example {
        Example::new(vec![Value::int_list(xs)], Value::Int(n))
    }

    #[test]
    fn rejects_misuse() {
        let arity = SynthesisRequest::new("f", ["a", "b"], vec![Type::int()], Type::int());
        assert_eq!(
            CegisSearch::new(arity, Config::default()).err(),
            Some(SynthesisError::SignatureArity { names: 2, types: 1 }),
        );

        let collision = length_request().components([library::zero()]);
        assert_eq!(
            CegisSearch::new(collision, Config::default()).err(),
            Some(SynthesisError::ComponentCollision("zero".to_string())),
        );

        let shadow = length_request().components([
            ComponentImpl::constant("length", Type::int(), Value::Int(0)),
        ]);
        assert!(matches!(
            CegisSearch::new(shadow, Config::default()),
            Err(SynthesisError::ComponentCollision(_)),
        ));

        let bad_example = length_request().examples([
            Example::new(vec![], Value::Int(0)),
        ]);
        assert_eq!(
            CegisSearch::new(bad_example, Config::default()).err(),
            Some(SynthesisError::ExampleArity { expected: 1, found: 0 }),
        );
    }

    #[test]
    fn steps_through_levels() {
        let request = length_request().examples([
            list_example(&[1, 2], 2),
            list_example(&[], 0),
            list_example(&[1], 1),
        ]);
        let mut search = CegisSearch::new(request, Config::default()).unwrap();

        // examples are put in canonical order
        assert_eq!(search.examples()[0], list_example(&[], 0));

        let mut steps = Vec::new();
        while let Some(step) = search.step() {
            steps.push(step);
        }

        assert!(matches!(steps[0], SearchStep::Level { level: 1 }));
        assert!(matches!(steps[3], SearchStep::Candidate { level: 4, cost: 8, .. }));
        assert!(matches!(steps[4], SearchStep::Validated { passed: 0, failed: 0 }));
        assert!(matches!(steps.last(), Some(SearchStep::Solved(_))));
        assert!(search.step().is_none());
    }

    #[test]
    fn conflicting_examples_stop_at_once() {
        let request = length_request().examples([
            list_example(&[1], 1),
            list_example(&[1], 2),
        ]);
        let outcome = synthesize(request, &Config::default()).unwrap();

        assert!(matches!(
            outcome,
            SynthesisOutcome::NotFound { reason: NotFoundReason::ConflictingExamples, .. },
        ));
        assert_eq!(outcome.stats().levels_searched, 0);
    }

    #[test]
    fn exhausting_levels() {
        let request = length_request().examples([
            list_example(&[], 3),
            list_example(&[1], 7),
            list_example(&[1, 2], 1),
        ]);
        let config = Config {
            max_cost: 3,
            ..Config::default()
        };
        let outcome = synthesize(request, &config).unwrap();

        assert!(matches!(
            outcome,
            SynthesisOutcome::NotFound { reason: NotFoundReason::LevelsExhausted, .. },
        ));
        assert_eq!(outcome.stats().levels_searched, 3);
    }

    #[test]
    fn held_back_examples_are_checked() {
        let length = |args: &[Value]| args[0].as_list().map(|xs| Value::Int(xs.len() as i64));
        let request = length_request()
            .examples([list_example(&[], 0), list_example(&[1], 1), list_example(&[1, 2], 2)])
            .held_back([list_example(&[4, 5, 6], 3)])
            .oracle(length);
        let outcome = synthesize(request, &Config::default()).unwrap();
        let component = outcome.component().unwrap();
        let imp = component.implementation(&length_request().components, DecreaseCheck::AnyArgSmaller);

        assert_eq!(imp.execute(&[Value::int_list(&[9, 9, 9, 9])]), Ok(Value::Int(4)));
        assert_eq!(outcome.stats().reboots, 0);
        assert_eq!(component.signature.input_types, vec![Type::list(Type::Fixed(0))]);
    }

    #[test]
    fn held_back_conflicts_stop_at_once() {
        let request = length_request()
            .examples([list_example(&[], 0), list_example(&[1], 1)])
            .held_back([list_example(&[1], 2), list_example(&[1, 2], 2)]);
        let outcome = synthesize(request, &Config::default()).unwrap();

        assert!(matches!(
            outcome,
            SynthesisOutcome::NotFound { reason: NotFoundReason::ConflictingExamples, .. },
        ));
        assert_eq!(outcome.stats().levels_searched, 0);
    }

    #[test]
    fn most_complex_failure_is_trusted_first() {
        let reverse = |args: &[Value]| args[0].as_list().map(|xs| Value::list(xs.iter().rev().cloned()));
        let reversed = |xs: &[i64]| {
            let output = Value::list(xs.iter().rev().map(|x| Value::Int(*x)));

            Example::new(vec![Value::int_list(xs)], output)
        };
        let request = SynthesisRequest::new("reverse", ["xs"], vec![Type::list(Type::Var(0))], Type::list(Type::Var(0)))
            .components([
                library::nil(),
                library::snoc(),
                library::is_empty(),
                library::head(),
                library::tail(),
            ])
            .examples([reversed(&[]), reversed(&[1])])
            .held_back([reversed(&[1, 2]), reversed(&[1, 2, 3])])
            .oracle(reverse);
        let config = Config {
            reboot_strategy: RebootStrategy::MostComplex,
            ..Config::default()
        };
        let mut search = CegisSearch::new(request, config).unwrap();

        let reboot = std::iter::from_fn(|| search.step())
            .take(20)
            .find_map(|step| match step {
                SearchStep::Reboot { example, example_count } => Some((example, example_count)),
                _ => None,
            });

        // `xs` fits both trusted examples and fails both held-back ones
        let (example, example_count) = reboot.unwrap();
        assert_eq!(example.args, vec![Value::int_list(&[1, 2, 3])]);
        assert_eq!(example_count, 3);
        assert_eq!(search.examples()[2], reversed(&[1, 2, 3]));
    }
}
