use ascend::config::{Config, DecreaseCheck, GoalSearchMode, LogConfig, RebootStrategy};
use ascend::library;
use ascend::oracle::Example;
use ascend::search::{synthesize, SynthesisOutcome, SynthesisRequest};
use ascend::types::Type;
use ascend::value::Value;
use clap::{ArgAction, Parser, ValueEnum};
use log::{error, info, LevelFilter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Problem {
    Length,
    Reverse,
    Max,
    Contains,
    Stutter,
}

/// Synthesizes a recursive function for one of the built-in problems.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(value_enum)]
    problem: Problem,
    /// Highest enumeration level.
    #[arg(long, default_value_t = 12)]
    max_cost: usize,
    /// Assembler budget per level, as a multiple of the level.
    #[arg(long, default_value_t = 3)]
    search_size_factor: usize,
    #[arg(long, value_enum, default_value_t = DecreaseCheck::AnyArgSmaller)]
    decrease_check: DecreaseCheck,
    #[arg(long, value_enum, default_value_t = RebootStrategy::Simplest)]
    reboot_strategy: RebootStrategy,
    #[arg(long, value_enum, default_value_t = GoalSearchMode::Assembler)]
    goal_search: GoalSearchMode,
    /// Keep terms that evaluate to an error on every example.
    #[arg(long)]
    keep_all_err: bool,
    #[arg(long)]
    no_reduction_rules: bool,
    #[arg(long, default_value_t = 4.0)]
    tree_threshold: f64,
    /// Log goals, components and the total map as well.
    #[arg(long)]
    log_all: bool,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            max_cost: self.max_cost,
            search_size_factor: self.search_size_factor,
            delete_all_err: !self.keep_all_err,
            decrease_check: self.decrease_check.clone(),
            reboot_strategy: self.reboot_strategy,
            use_reduction_rules: !self.no_reduction_rules,
            goal_search: self.goal_search,
            tree_threshold: self.tree_threshold,
            log: if self.log_all { LogConfig::all() } else { LogConfig::default() },
            ..Config::default()
        }
    }

    fn level_filter(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Warn;
        }

        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn list(xs: &[i64]) -> Value {
    Value::int_list(xs)
}

fn list_examples(xs: &[&[i64]], f: impl Fn(&[Value]) -> Option<Value>) -> Vec<Example> {
    xs.iter()
        .filter_map(|xs| {
            let args = vec![list(xs)];
            let output = f(&args)?;

            Some(Example::new(args, output))
        })
        .collect()
}

fn length(args: &[Value]) -> Option<Value> {
    Some(Value::Int(args[0].as_list()?.len() as i64))
}

fn reverse(args: &[Value]) -> Option<Value> {
    Some(Value::list(args[0].as_list()?.iter().rev().cloned()))
}

fn max(args: &[Value]) -> Option<Value> {
    Some(Value::Int(args[0].as_int()?.max(args[1].as_int()?)))
}

fn contains(args: &[Value]) -> Option<Value> {
    Some(Value::Bool(args[0].as_list()?.contains(&args[1])))
}

fn stutter(args: &[Value]) -> Option<Value> {
    Some(Value::list(args[0].as_list()?.iter().flat_map(|x| [x.clone(), x.clone()])))
}

fn request(problem: Problem) -> SynthesisRequest {
    let elem_list = Type::list(Type::Var(0));

    let request = match problem {
        Problem::Length => SynthesisRequest::new("length", ["xs"], vec![elem_list], Type::int())
            .components([library::zero(), library::inc(), library::is_empty(), library::head(), library::tail()])
            .examples(list_examples(&[&[2, 3, 4], &[1], &[]], length))
            .oracle(length),
        Problem::Reverse => SynthesisRequest::new("reverse", ["xs"], vec![elem_list.clone()], elem_list)
            .components([library::nil(), library::snoc(), library::is_empty(), library::head(), library::tail()])
            .examples(list_examples(&[&[], &[1]], reverse))
            .held_back(list_examples(&[&[1, 2], &[1, 2, 3], &[2, 3, 4]], reverse))
            .oracle(reverse),
        Problem::Max => SynthesisRequest::new("max", ["a", "b"], vec![Type::int(), Type::int()], Type::int())
            .components([library::lt(), library::zero(), library::inc()])
            .examples([(1, 2), (3, 1), (0, 5), (6, 4)].map(|(a, b)| {
                let args = vec![Value::Int(a), Value::Int(b)];
                let output = Value::Int(a.max(b));

                Example::new(args, output)
            }))
            .oracle(max),
        Problem::Contains => {
            let cases: [(&[i64], i64); 7] = [
                (&[1, 2, 3], 1),
                (&[1, 2, 3], 2),
                (&[1, 2, 3], 3),
                (&[1, 2, 3], 4),
                (&[1, 2, 3], -1),
                (&[1, 2], 3),
                (&[], 1),
            ];

            SynthesisRequest::new("contains", ["xs", "x"], vec![Type::list(Type::int()), Type::int()], Type::bool())
                .components([
                    library::true_(),
                    library::false_(),
                    library::or(),
                    library::eq(),
                    library::is_empty(),
                    library::head(),
                    library::tail(),
                ])
                .examples(cases.map(|(xs, x)| {
                    let args = vec![list(xs), Value::Int(x)];
                    let output = Value::Bool(xs.contains(&x));

                    Example::new(args, output)
                }))
                .oracle(contains)
        },
        Problem::Stutter => SynthesisRequest::new("stutter", ["xs"], vec![elem_list.clone()], elem_list)
            .components([library::nil(), library::cons(), library::is_empty(), library::head(), library::tail()])
            .examples(list_examples(&[&[], &[5], &[5, 6, 3]], stutter))
            .oracle(stutter),
    };

    request.reduction_rules(library::reduction_rules())
}

fn main() {
    let args = Args::parse();

    colog::default_builder()
        .filter_level(args.level_filter())
        .init();

    let config = args.config();
    info!("Synthesizing {:?}", args.problem);

    match synthesize(request(args.problem), &config) {
        Ok(SynthesisOutcome::Success { component, examples, stats }) => {
            println!("{component}");
            println!("cost {}, level {}", component.cost, component.level);
            println!("{} examples, {} reboots", examples.len(), stats.reboots);
            for (idx, time) in stats.reboot_times.iter().enumerate() {
                println!("  attempt {}: {time:?}", idx + 1);
            }
            println!("total time {:?}", stats.total_time);
        },
        Ok(SynthesisOutcome::NotFound { reason, examples, stats }) => {
            println!("synthesis failed: {reason}");
            println!("{} examples, {} reboots, {} levels searched", examples.len(), stats.reboots, stats.levels_searched);
            println!("total time {:?}", stats.total_time);
        },
        Err(e) => {
            error!("Bad request: {e}");
            std::process::exit(2);
        },
    }
}
