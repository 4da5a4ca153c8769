use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use itertools::Itertools;
use log::{debug, trace};

use crate::component::{ComponentImpl, Environment, ExtendedComponent, RecursiveImpl, ReductionRule, Signature};
use crate::config::Config;
use crate::eval::VarEnv;
use crate::goal::Goal;
use crate::oracle::{BufferedOracle, Example};
use crate::term::Term;
use crate::types::{unify, Subst, Type};
use crate::value::{
    to_value_vector, ArgList, ExtendedValue, ExtendedVector, ShowVector, Value, ValueVector,
};
use crate::vector_tree::ValueVectorTree;

/// Vector to term, keeping the first term registered for each vector.
#[derive(Default)]
pub struct ValueTermMap {
    entries: Vec<(ValueVector, Term)>,
    index: HashMap<ValueVector, usize>,
}

impl ValueTermMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, vector: &[Value]) -> bool {
        self.index.contains_key(vector)
    }

    pub fn insert(&mut self, vector: ValueVector, term: Term) {
        if self.index.contains_key(&vector) {
            return;
        }

        self.index.insert(vector.clone(), self.entries.len());
        self.entries.push((vector, term));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ValueVector, &Term)> + '_ {
        self.entries.iter().map(|(v, t)| (v, t))
    }
}

/// Alpha-normal type to the fully known terms of that type.
pub type TypeMap = BTreeMap<Type, ValueTermMap>;

/// Alpha-normal type to terms whose vectors are still partly unknown.
pub type RecTypeMap = BTreeMap<Type, Vec<(Term, ExtendedVector)>>;

fn stat_string<V>(map: &BTreeMap<Type, V>, size: impl Fn(&V) -> usize) -> String {
    let terms = map.values().map(size).sum::<usize>();

    format!("{terms} terms, {} types", map.len())
}

/// All ways to write `number` as an ordered sum of `parts` positive numbers.
pub fn divide_number_as_sum(number: usize, parts: usize) -> Vec<Vec<usize>> {
    if parts == 0 {
        return if number == 0 { vec![vec![]] } else { vec![] };
    }
    if number < parts {
        return vec![];
    }

    (1..=number - (parts - 1))
        .flat_map(|first| {
            divide_number_as_sum(number - first, parts - 1)
                .into_iter()
                .map(move |mut rest| {
                    rest.insert(0, first);
                    rest
                })
        })
        .collect()
}

/// One way to type a component application from stored argument types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeChoice {
    /// Keys into the level maps, one per argument.
    pub keys: Vec<Type>,
    /// Argument types after unification.
    pub args: Vec<Type>,
    /// Alpha-normal return type after unification.
    pub ret: Type,
}

/// Unifies a signature against every combination of stored types, one
/// list per argument. A single substitution is threaded through the
/// arguments so shared variables stay consistent.
pub fn types_for_costs(
    candidates: &[Vec<Type>],
    input_types: &[Type],
    return_type: &Type,
) -> Vec<TypeChoice> {
    let next_free = input_types.iter()
        .chain(std::iter::once(return_type))
        .map(Type::next_free_id)
        .max()
        .unwrap_or(0);
    let mut res = Vec::new();

    types_for_costs_aux(
        candidates,
        input_types,
        return_type,
        next_free,
        Subst::empty(),
        &mut Vec::new(),
        &mut res,
    );

    res
}

fn types_for_costs_aux(
    candidates: &[Vec<Type>],
    input_types: &[Type],
    return_type: &Type,
    next_free: usize,
    subst: Subst,
    keys: &mut Vec<Type>,
    res: &mut Vec<TypeChoice>,
) {
    let arg_idx = keys.len();

    if arg_idx == input_types.len() {
        res.push(TypeChoice {
            keys: keys.clone(),
            args: input_types.iter().map(|t| subst.apply(t)).collect(),
            ret: subst.apply(return_type).alpha_normal(),
        });
        return;
    }

    let required = subst.apply(&input_types[arg_idx]);
    for key in &candidates[arg_idx] {
        let shifted = key.shift_id(next_free);
        let Some(unifier) = unify(&required, &shifted) else {
            continue;
        };

        keys.push(key.clone());
        types_for_costs_aux(
            candidates,
            input_types,
            return_type,
            next_free + key.next_free_id(),
            subst.compose(&unifier),
            keys,
            res,
        );
        keys.pop();
    }
}

/// The library of terms built so far, level by level (a level is the cost
/// of its terms), for one synthesis attempt.
pub struct SynthesisState {
    signature: Signature,
    examples: Vec<Example>,
    var_envs: Vec<VarEnv>,
    env: Environment,
    components: Vec<ExtendedComponent>,
    reduction_rules: HashMap<String, ReductionRule>,
    config: Config,
    total: TypeMap,
    level_non_rec: Vec<TypeMap>,
    level_rec: Vec<RecTypeMap>,
    return_trees: Vec<ValueVectorTree<Term>>,
    bool_trees: Vec<ValueVectorTree<Term>>,
    rec_return_terms: Vec<Vec<(Term, ExtendedVector)>>,
}

impl SynthesisState {
    /// `examples` must already be in canonical order; `signature` must have
    /// its variables fixed.
    pub fn new(
        signature: Signature,
        examples: Vec<Example>,
        components: &[ComponentImpl],
        reduction_rules: HashMap<String, ReductionRule>,
        config: Config,
    ) -> Self {
        let var_envs = examples.iter()
            .map(|e| signature.arg_names.iter()
                .cloned()
                .zip(e.args.iter().cloned())
                .collect::<VarEnv>())
            .collect();

        Self {
            env: Environment::new(components),
            components: components.iter().map(ExtendedComponent::lift).collect(),
            signature,
            examples,
            var_envs,
            reduction_rules,
            config,
            total: TypeMap::new(),
            level_non_rec: Vec::new(),
            level_rec: Vec::new(),
            return_trees: Vec::new(),
            bool_trees: Vec::new(),
            rec_return_terms: Vec::new(),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn example_count(&self) -> usize {
        self.examples.len()
    }

    pub fn inputs(&self, idx: usize) -> &ArgList {
        &self.examples[idx].args
    }

    pub fn var_env(&self, idx: usize) -> &VarEnv {
        &self.var_envs[idx]
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// The goal of the whole search: every example output.
    pub fn root_goal(&self) -> Goal {
        self.examples.iter()
            .map(|e| e.output.clone())
            .enumerate()
            .collect()
    }

    pub fn levels(&self) -> usize {
        self.level_non_rec.len()
    }

    pub fn non_rec_of_cost(&self, cost: usize) -> &TypeMap {
        &self.level_non_rec[cost - 1]
    }

    pub fn rec_of_cost(&self, cost: usize) -> &RecTypeMap {
        &self.level_rec[cost - 1]
    }

    /// Known terms of the goal return type at exactly `cost`.
    pub fn return_terms(&self, cost: usize) -> &ValueVectorTree<Term> {
        &self.return_trees[cost - 1]
    }

    /// Known boolean terms at exactly `cost`.
    pub fn bool_terms(&self, cost: usize) -> &ValueVectorTree<Term> {
        &self.bool_trees[cost - 1]
    }

    /// Return-typed terms at exactly `cost` that call the target on
    /// inputs with no known answer.
    pub fn rec_terms(&self, cost: usize) -> &[(Term, ExtendedVector)] {
        &self.rec_return_terms[cost - 1]
    }

    /// Packages `body` as the function under synthesis.
    pub fn recursive_impl(&self, body: Term) -> Rc<RecursiveImpl> {
        RecursiveImpl::new(
            self.signature.clone(),
            body,
            self.env.clone(),
            self.config.decrease_check.clone(),
        )
    }

    /// The cheapest known boolean term matching `goal`, over all levels.
    pub fn bool_library(&self, goal: &Goal) -> Option<Term> {
        self.bool_trees.iter()
            .find_map(|tree| tree.search(goal))
            .cloned()
    }

    /// The cheapest known return-typed term matching `goal`, over all levels.
    pub fn return_library(&self, goal: &Goal) -> Option<Term> {
        self.return_trees.iter()
            .find_map(|tree| tree.search(goal))
            .cloned()
    }

    /// Builds every term of the next level and closes it.
    pub fn build_next_level(&mut self, oracle: &mut BufferedOracle) -> usize {
        let cost = self.open_next_level();

        if cost == self.config.cost_model.component {
            self.register_inputs(cost);
        }

        let target = self.target_component();
        let components = self.components.iter()
            .cloned()
            .chain(std::iter::once(target))
            .collect::<Vec<_>>();
        for comp in &components {
            self.build_component(cost, comp, oracle);
        }

        self.close_level();

        if self.config.log.levels {
            debug!(
                "Level {cost}: non-recursive ({}), recursive ({})",
                stat_string(self.non_rec_of_cost(cost), ValueTermMap::len),
                stat_string(self.rec_of_cost(cost), Vec::len),
            );
        }
        if self.config.log.total_map {
            debug!("Total map: ({})", stat_string(&self.total, ValueTermMap::len));
        }

        cost
    }

    fn open_next_level(&mut self) -> usize {
        self.level_non_rec.push(TypeMap::new());
        self.level_rec.push(RecTypeMap::new());

        self.levels()
    }

    fn register_inputs(&mut self, cost: usize) {
        let names = self.signature.arg_names.clone();
        let types = self.signature.input_types.clone();

        for (idx, (name, ty)) in names.into_iter().zip(types).enumerate() {
            let vector = self.examples.iter()
                .map(|e| e.args[idx].clone())
                .collect();

            self.register_non_rec(cost, &ty, Term::Var(name), vector);
        }
    }

    // NOTE: the target's answers come from the buffered oracle, which needs
    // the example index for the decrease check, so the executor here is a
    // placeholder and the real work happens in `build_component`.
    fn target_component(&self) -> ExtendedComponent {
        ExtendedComponent::new(
            self.signature.name.clone(),
            self.signature.input_types.clone(),
            self.signature.return_type.clone(),
            |_| ExtendedValue::Unknown,
        )
    }

    fn build_component(
        &mut self,
        cost: usize,
        comp: &ExtendedComponent,
        oracle: &mut BufferedOracle,
    ) {
        let comp_cost = self.config.cost_model.component;
        let is_rec = comp.name == self.signature.name;
        let arity = comp.arity();

        if comp_cost > cost {
            return;
        }

        if arity == 0 {
            if comp_cost == cost && !is_rec {
                let value = comp.execute(&[]);
                let vector = vec![value; self.example_count()];

                self.register_term(cost, &comp.return_type, Term::component(comp.name.clone(), vec![]), vector);
            }
            return;
        }

        for costs in divide_number_as_sum(cost - comp_cost, arity) {
            let candidate_types = costs.iter()
                .map(|c| {
                    let mut types = self.non_rec_of_cost(*c).keys().cloned().collect::<Vec<_>>();
                    if !is_rec {
                        types.extend(self.rec_of_cost(*c).keys().cloned());
                        types.sort();
                        types.dedup();
                    }
                    types
                })
                .collect::<Vec<_>>();

            for choice in types_for_costs(&candidate_types, &comp.input_types, &comp.return_type) {
                if !self.is_interesting(&choice.args, &choice.ret) {
                    continue;
                }

                let arg_candidates = costs.iter()
                    .zip(&choice.keys)
                    .map(|(c, key)| self.candidates(*c, key, !is_rec))
                    .collect::<Vec<_>>();

                let mut built = Vec::new();
                for product in arg_candidates.iter().map(|c| c.iter()).multi_cartesian_product() {
                    let vector = if is_rec {
                        self.rec_call_vector(&product, oracle)
                    } else {
                        (0..self.example_count())
                            .map(|idx| {
                                let args = product.iter()
                                    .map(|(_, v)| v[idx].clone())
                                    .collect::<Vec<_>>();

                                comp.execute(&args)
                            })
                            .collect()
                    };

                    if self.config.delete_all_err && vector.iter().all(ExtendedValue::is_error) {
                        continue;
                    }

                    let term = Term::component(
                        comp.name.clone(),
                        product.iter().map(|(t, _)| t.clone()).collect(),
                    );
                    built.push((term, vector));
                }

                for (term, vector) in built {
                    self.register_term(cost, &choice.ret, term, vector);
                }
            }
        }
    }

    fn candidates(&self, cost: usize, key: &Type, with_rec: bool) -> Vec<(Term, ExtendedVector)> {
        let mut res = Vec::new();

        if let Some(map) = self.non_rec_of_cost(cost).get(key) {
            res.extend(map.iter().map(|(v, t)| {
                (t.clone(), v.iter().cloned().map(ExtendedValue::Known).collect())
            }));
        }
        if with_rec {
            if let Some(terms) = self.rec_of_cost(cost).get(key) {
                res.extend(terms.iter().cloned());
            }
        }

        res
    }

    /// Calls to the target: arguments that fail the decrease check against
    /// the example's own inputs evaluate to `Error`.
    fn rec_call_vector(
        &self,
        product: &[&(Term, ExtendedVector)],
        oracle: &mut BufferedOracle,
    ) -> ExtendedVector {
        (0..self.example_count())
            .map(|idx| {
                let args = product.iter()
                    .map(|(_, v)| v[idx].known().cloned())
                    .collect::<Option<Vec<_>>>();

                match args {
                    Some(args) if args.iter().any(Value::is_error) => ExtendedValue::Known(Value::Error),
                    Some(args) if !self.config.decrease_check.holds(&args, self.inputs(idx)) =>
                        ExtendedValue::Known(Value::Error),
                    Some(args) => oracle.answer(&args),
                    None => ExtendedValue::Unknown,
                }
            })
            .collect()
    }

    /// A signature is worth exploring when its result, or else every
    /// argument, can occur inside a boolean, the goal type or an input.
    fn is_interesting(&self, args: &[Type], ret: &Type) -> bool {
        let good = std::iter::once(Type::bool())
            .chain(std::iter::once(self.signature.return_type.clone()))
            .chain(self.signature.input_types.iter().cloned())
            .collect::<Vec<_>>();
        let fits = |t: &Type| good.iter().any(|g| t.can_appear_in(g));

        fits(ret) || args.iter().all(fits)
    }

    fn register_term(&mut self, cost: usize, ty: &Type, term: Term, vector: ExtendedVector) -> bool {
        match to_value_vector(&vector) {
            Some(vector) => self.register_non_rec(cost, ty, term, vector),
            None => self.register_rec(cost, ty, term, vector),
        }
    }

    /// Stores a fully known term unless a compatible type already holds the
    /// same vector, or a vector agreeing with it wherever it does not error.
    fn register_non_rec(&mut self, cost: usize, ty: &Type, term: Term, vector: ValueVector) -> bool {
        let ty = ty.alpha_normal();
        let has_error = vector.iter().any(Value::is_error);
        let known = Goal::known_positions(&vector);

        for (stored_ty, map) in &self.total {
            if !ty.instance_of(stored_ty) {
                continue;
            }
            if map.contains(&vector) {
                return false;
            }
            if has_error && map.iter().any(|(v, _)| known.matches(v)) {
                return false;
            }
        }

        if self.config.log.components {
            trace!("[{cost}] {term}: {ty} = {}", ShowVector(&vector));
        }

        self.total.entry(ty.clone()).or_default().insert(vector.clone(), term.clone());
        self.level_non_rec[cost - 1].entry(ty).or_default().insert(vector, term);

        true
    }

    fn register_rec(&mut self, cost: usize, ty: &Type, term: Term, vector: ExtendedVector) -> bool {
        if self.config.use_reduction_rules && self.is_reducible(&term) {
            trace!("Reducible: {term}");
            return false;
        }

        if self.config.log.components {
            trace!("[{cost}] (rec) {term}: {ty} = {}", ShowVector(&vector));
        }

        self.level_rec[cost - 1].entry(ty.alpha_normal()).or_default().push((term, vector));

        true
    }

    fn is_reducible(&self, term: &Term) -> bool {
        match term {
            Term::Component(name, args) => self.reduction_rules
                .get(name)
                .is_some_and(|rule| rule(args)),
            _ => false,
        }
    }

    /// Compiles the boolean and return-typed terms of the newest level into
    /// value-vector trees and collects its recursive return-typed terms.
    fn close_level(&mut self) {
        let cost = self.levels();
        let depth = self.example_count();
        let threshold = self.config.tree_threshold;
        let goal_type = &self.signature.return_type;
        let bool_type = Type::bool();

        let mut return_tree = ValueVectorTree::new(depth, threshold);
        let mut bool_tree = ValueVectorTree::new(depth, threshold);
        for (ty, map) in &self.level_non_rec[cost - 1] {
            if goal_type.instance_of(ty) {
                map.iter().for_each(|(v, t)| {
                    return_tree.insert(v.clone(), t.clone());
                });
            }
            if bool_type.instance_of(ty) {
                map.iter().for_each(|(v, t)| {
                    bool_tree.insert(v.clone(), t.clone());
                });
            }
        }

        let rec_terms = self.level_rec[cost - 1].iter()
            .filter(|(ty, _)| goal_type.instance_of(ty))
            .flat_map(|(_, terms)| terms.iter().cloned())
            .collect();

        self.return_trees.push(return_tree);
        self.bool_trees.push(bool_tree);
        self.rec_return_terms.push(rec_terms);
    }
}
