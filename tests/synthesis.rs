use ascend::component::ComponentImpl;
use ascend::config::{Config, DecreaseCheck, GoalSearchMode};
use ascend::library;
use ascend::oracle::Example;
use ascend::search::{synthesize, NotFoundReason, SynthesisOutcome, SynthesisRequest};
use ascend::types::Type;
use ascend::value::{BinaryTree, Value};

type Reference = fn(&[Value]) -> Option<Value>;

/// One synthesis problem together with a reference implementation the
/// result must agree with on inputs it was never shown.
pub struct SynthChallenge {
    name: &'static str,
    args: Vec<&'static str>,
    input_types: Vec<Type>,
    return_type: Type,
    components: Vec<ComponentImpl>,
    examples: Vec<Vec<Value>>,
    held_back: Vec<Vec<Value>>,
    use_oracle: bool,
    reference: Reference,
    unseen: Vec<Vec<Value>>,
    max_cost: Option<usize>,
}

impl SynthChallenge {
    pub fn perform_tests(tests: impl IntoIterator<Item = SynthChallenge>, config: &Config) {
        tests.into_iter().for_each(|x| x.perform(config));
    }

    fn example(&self, args: &[Value]) -> Example {
        let output = (self.reference)(args).unwrap();

        Example::new(args.to_vec(), output)
    }

    fn perform(self, config: &Config) {
        let mut request = SynthesisRequest::new(
            self.name,
            self.args.clone(),
            self.input_types.clone(),
            self.return_type.clone(),
        )
            .components(self.components.clone())
            .examples(self.examples.iter().map(|a| self.example(a)))
            .held_back(self.held_back.iter().map(|a| self.example(a)))
            .reduction_rules(library::reduction_rules());
        if self.use_oracle {
            request = request.oracle(self.reference);
        }

        let config = Config {
            max_cost: self.max_cost.unwrap_or(config.max_cost),
            ..config.clone()
        };
        let outcome = synthesize(request, &config).unwrap();
        let Some(component) = outcome.component() else {
            panic!("{}: nothing found", self.name);
        };
        let imp = component.implementation(&self.components, config.decrease_check.clone());

        for args in self.unseen.iter().chain(&self.examples) {
            assert_eq!(
                imp.execute(args).ok(),
                (self.reference)(args),
                "{}: {component} on {args:?}",
                self.name,
            );
        }
    }
}

pub fn init_logging() {
    let _ = colog::default_builder()
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

fn l(xs: &[i64]) -> Value {
    Value::int_list(xs)
}

fn length(args: &[Value]) -> Option<Value> {
    Some(Value::Int(args[0].as_list()?.len() as i64))
}

fn reverse(args: &[Value]) -> Option<Value> {
    Some(Value::list(args[0].as_list()?.iter().rev().cloned()))
}

fn is_zero(args: &[Value]) -> Option<Value> {
    Some(Value::Bool(args[0].as_int()? == 0))
}

fn max(args: &[Value]) -> Option<Value> {
    Some(Value::Int(args[0].as_int()?.max(args[1].as_int()?)))
}

fn last(args: &[Value]) -> Option<Value> {
    args[0].as_list()?.last().cloned()
}

fn left_depth(args: &[Value]) -> Option<Value> {
    let mut tree = args[0].as_tree()?;
    let mut depth = 0;
    while let BinaryTree::Node(_, left, _) = tree {
        depth += 1;
        tree = &**left;
    }

    Some(Value::Int(depth))
}

fn t(tree: BinaryTree) -> Value {
    Value::Tree(tree)
}

fn single(tag: i64) -> BinaryTree {
    BinaryTree::single(Value::Int(tag))
}

fn node(tag: i64, left: BinaryTree, right: BinaryTree) -> BinaryTree {
    BinaryTree::node(Value::Int(tag), left, right)
}

pub fn list_challenges() -> Vec<SynthChallenge> {
    let list_of_a = Type::list(Type::Var(0));

    vec![
        SynthChallenge {
            name: "length",
            args: vec!["xs"],
            input_types: vec![list_of_a.clone()],
            return_type: Type::int(),
            components: vec![
                library::zero(),
                library::inc(),
                library::is_empty(),
                library::head(),
                library::tail(),
            ],
            examples: vec![vec![l(&[])], vec![l(&[1])], vec![l(&[1, 2])]],
            held_back: vec![],
            use_oracle: false,
            reference: length,
            unseen: vec![vec![l(&[7, 7, 7])], vec![l(&[1, 2, 3, 4, 5])]],
            max_cost: None,
        },
        SynthChallenge {
            name: "last",
            args: vec!["xs"],
            input_types: vec![list_of_a.clone()],
            return_type: Type::Var(0),
            components: vec![library::is_empty(), library::head(), library::tail()],
            examples: vec![vec![l(&[1])], vec![l(&[1, 2])], vec![l(&[1, 2, 3])]],
            held_back: vec![vec![l(&[3, 1, 4, 1])]],
            use_oracle: true,
            reference: last,
            unseen: vec![vec![l(&[9, 8, 7, 6, 5])]],
            max_cost: None,
        },
        SynthChallenge {
            name: "reverse",
            args: vec!["xs"],
            input_types: vec![list_of_a.clone()],
            return_type: list_of_a,
            components: vec![
                library::nil(),
                library::snoc(),
                library::is_empty(),
                library::head(),
                library::tail(),
            ],
            examples: vec![vec![l(&[])], vec![l(&[1])]],
            held_back: vec![vec![l(&[1, 2])], vec![l(&[1, 2, 3])]],
            use_oracle: true,
            reference: reverse,
            unseen: vec![vec![l(&[4, 5, 6, 7])]],
            max_cost: None,
        },
    ]
}

pub fn tree_challenges() -> Vec<SynthChallenge> {
    vec![
        SynthChallenge {
            name: "leftDepth",
            args: vec!["t"],
            input_types: vec![Type::tree(Type::Var(0))],
            return_type: Type::int(),
            components: vec![
                library::zero(),
                library::inc(),
                library::is_leaf(),
                library::tag(),
                library::left(),
                library::right(),
            ],
            examples: vec![
                vec![t(BinaryTree::Leaf)],
                vec![t(single(1))],
                vec![t(node(1, single(2), BinaryTree::Leaf))],
            ],
            held_back: vec![],
            use_oracle: true,
            reference: left_depth,
            unseen: vec![
                vec![t(node(1, node(2, single(3), BinaryTree::Leaf), single(4)))],
                vec![t(node(5, BinaryTree::Leaf, single(6)))],
            ],
            max_cost: Some(6),
        },
    ]
}

#[test]
fn test_list_challenges() {
    init_logging();

    SynthChallenge::perform_tests(list_challenges(), &Config::default());
}

#[test]
fn test_tree_challenges() {
    init_logging();

    SynthChallenge::perform_tests(tree_challenges(), &Config::default());
}

#[test]
fn test_alphabetic_decrease() {
    init_logging();

    let config = Config {
        decrease_check: DecreaseCheck::AlphabeticSmaller,
        ..Config::default()
    };

    SynthChallenge::perform_tests(list_challenges().into_iter().chain(tree_challenges()), &config);
}

#[test]
fn test_direct_match_needs_no_conditional() {
    init_logging();

    let request = SynthesisRequest::new("f", ["n"], vec![Type::int()], Type::bool())
        .components([library::and(), library::or(), library::not(), library::is_zero()])
        .examples([0, 1, 2].map(|n| {
            let args = vec![Value::Int(n)];
            let output = is_zero(&args).unwrap();

            Example::new(args, output)
        }));
    let outcome = synthesize(request, &Config::default()).unwrap();
    let component = outcome.component().unwrap();

    assert_eq!(component.body.to_string(), "isZero(n)");
    assert_eq!(component.cost, 2);
    assert_eq!(component.level, 2);
}

#[test]
fn test_conflicting_examples() {
    init_logging();

    let request = SynthesisRequest::new("length", ["xs"], vec![Type::list(Type::Var(0))], Type::int())
        .components([library::zero(), library::inc(), library::tail()])
        .examples([
            Example::new(vec![l(&[1, 2])], Value::Int(2)),
            Example::new(vec![l(&[1, 2])], Value::Int(3)),
        ]);
    let outcome = synthesize(request, &Config::default()).unwrap();

    match outcome {
        SynthesisOutcome::NotFound { reason, stats, .. } => {
            assert_eq!(reason, NotFoundReason::ConflictingExamples);
            assert_eq!(stats.levels_searched, 0);
        },
        SynthesisOutcome::Success { component, .. } => panic!("found {component}"),
    }
}

#[test]
fn test_reverse_reboots() {
    init_logging();

    let example = |xs: Value| {
        let output = reverse(&[xs.clone()]).unwrap();

        Example::new(vec![xs], output)
    };
    let examples = [l(&[]), l(&[1])].map(example);
    let held_back = [l(&[1, 2]), l(&[1, 2, 3])].map(example);
    let request = SynthesisRequest::new("reverse", ["xs"], vec![Type::list(Type::Var(0))], Type::list(Type::Var(0)))
        .components([
            library::nil(),
            library::snoc(),
            library::is_empty(),
            library::head(),
            library::tail(),
        ])
        .examples(examples)
        .held_back(held_back)
        .oracle(reverse as Reference);
    let outcome = synthesize(request, &Config::default()).unwrap();

    let SynthesisOutcome::Success { component, examples, stats } = outcome else {
        panic!("reverse was not found");
    };
    let imp = component.implementation(
        &[library::nil(), library::snoc(), library::is_empty(), library::head(), library::tail()],
        Config::default().decrease_check,
    );

    assert_eq!(imp.execute(&[l(&[4, 5, 6, 7])]), Ok(l(&[7, 6, 5, 4])));
    assert!(stats.reboots >= 1);
    assert_eq!(examples.len(), 2 + stats.reboots);
    assert_eq!(stats.reboot_times.len(), stats.reboots);
    // the simplest failing example is promoted first
    assert_eq!(examples[2].args, vec![l(&[1, 2])]);
}

#[test]
fn test_goal_graph_max() {
    init_logging();

    let config = Config {
        goal_search: GoalSearchMode::GoalGraph,
        ..Config::default()
    };
    let challenge = SynthChallenge {
        name: "max",
        args: vec!["a", "b"],
        input_types: vec![Type::int(), Type::int()],
        return_type: Type::int(),
        components: vec![library::lt()],
        examples: [(1, 2), (3, 1), (0, 5), (6, 4)]
            .iter()
            .map(|(a, b)| vec![Value::Int(*a), Value::Int(*b)])
            .collect(),
        held_back: vec![],
        use_oracle: false,
        reference: max,
        unseen: vec![
            vec![Value::Int(10), Value::Int(-3)],
            vec![Value::Int(-8), Value::Int(2)],
        ],
        max_cost: Some(6),
    };

    SynthChallenge::perform_tests([challenge], &config);
}
