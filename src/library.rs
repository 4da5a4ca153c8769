//! A standard set of components over integers, booleans, lists, binary
//! trees and pairs. Polymorphic components use `Type::Var` so they can be
//! instantiated at any element type.

use std::collections::HashMap;
use std::rc::Rc;

use crate::component::{ComponentImpl, ReductionRule};
use crate::term::Term;
use crate::types::Type;
use crate::value::{BinaryTree, Value};

fn a() -> Type {
    Type::Var(0)
}

fn b() -> Type {
    Type::Var(1)
}

fn int_op(name: &str, f: impl Fn(i64) -> Option<i64> + 'static) -> ComponentImpl {
    ComponentImpl::new(name, vec![Type::int()], Type::int(), move |args| {
        f(args[0].as_int()?).map(Value::Int)
    })
}

fn int_binop(name: &str, f: impl Fn(i64, i64) -> Option<Value> + 'static) -> ComponentImpl {
    ComponentImpl::new(name, vec![Type::int(), Type::int()], Type::int(), move |args| {
        f(args[0].as_int()?, args[1].as_int()?)
    })
}

fn int_pred(name: &str, f: impl Fn(i64, i64) -> bool + 'static) -> ComponentImpl {
    ComponentImpl::new(name, vec![Type::int(), Type::int()], Type::bool(), move |args| {
        Some(Value::Bool(f(args[0].as_int()?, args[1].as_int()?)))
    })
}

pub fn zero() -> ComponentImpl {
    ComponentImpl::constant("zero", Type::int(), Value::Int(0))
}

pub fn inc() -> ComponentImpl {
    int_op("inc", |x| x.checked_add(1))
}

pub fn dec() -> ComponentImpl {
    int_op("dec", |x| x.checked_sub(1))
}

pub fn neg() -> ComponentImpl {
    int_op("neg", i64::checked_neg)
}

pub fn add() -> ComponentImpl {
    int_binop("add", |x, y| x.checked_add(y).map(Value::Int))
}

pub fn sub() -> ComponentImpl {
    int_binop("sub", |x, y| x.checked_sub(y).map(Value::Int))
}

pub fn is_zero() -> ComponentImpl {
    ComponentImpl::new("isZero", vec![Type::int()], Type::bool(), |args| {
        Some(Value::Bool(args[0].as_int()? == 0))
    })
}

pub fn is_negative() -> ComponentImpl {
    ComponentImpl::new("isNegative", vec![Type::int()], Type::bool(), |args| {
        Some(Value::Bool(args[0].as_int()? < 0))
    })
}

pub fn lt() -> ComponentImpl {
    int_pred("lt", |x, y| x < y)
}

pub fn eq() -> ComponentImpl {
    ComponentImpl::new("eq", vec![a(), a()], Type::bool(), |args| {
        Some(Value::Bool(args[0] == args[1]))
    })
}

pub fn true_() -> ComponentImpl {
    ComponentImpl::constant("true", Type::bool(), Value::Bool(true))
}

pub fn false_() -> ComponentImpl {
    ComponentImpl::constant("false", Type::bool(), Value::Bool(false))
}

pub fn and() -> ComponentImpl {
    ComponentImpl::new("and", vec![Type::bool(), Type::bool()], Type::bool(), |args| {
        Some(Value::Bool(args[0].as_bool()? && args[1].as_bool()?))
    })
}

pub fn or() -> ComponentImpl {
    ComponentImpl::new("or", vec![Type::bool(), Type::bool()], Type::bool(), |args| {
        Some(Value::Bool(args[0].as_bool()? || args[1].as_bool()?))
    })
}

pub fn not() -> ComponentImpl {
    ComponentImpl::new("not", vec![Type::bool()], Type::bool(), |args| {
        Some(Value::Bool(!args[0].as_bool()?))
    })
}

pub fn nil() -> ComponentImpl {
    ComponentImpl::constant("nil", Type::list(a()), Value::List(Vec::new()))
}

pub fn cons() -> ComponentImpl {
    ComponentImpl::new("cons", vec![a(), Type::list(a())], Type::list(a()), |args| {
        let mut xs = vec![args[0].clone()];
        xs.extend_from_slice(args[1].as_list()?);

        Some(Value::List(xs))
    })
}

pub fn snoc() -> ComponentImpl {
    ComponentImpl::new("snoc", vec![Type::list(a()), a()], Type::list(a()), |args| {
        let mut xs = args[0].as_list()?.to_vec();
        xs.push(args[1].clone());

        Some(Value::List(xs))
    })
}

pub fn concat() -> ComponentImpl {
    ComponentImpl::new("concat", vec![Type::list(a()), Type::list(a())], Type::list(a()), |args| {
        let xs = args[0].as_list()?;
        let ys = args[1].as_list()?;

        Some(Value::list(xs.iter().chain(ys).cloned()))
    })
}

pub fn is_empty() -> ComponentImpl {
    ComponentImpl::new("isEmpty", vec![Type::list(a())], Type::bool(), |args| {
        Some(Value::Bool(args[0].as_list()?.is_empty()))
    })
}

pub fn head() -> ComponentImpl {
    ComponentImpl::new("head", vec![Type::list(a())], a(), |args| {
        args[0].as_list()?.first().cloned()
    })
}

pub fn tail() -> ComponentImpl {
    ComponentImpl::new("tail", vec![Type::list(a())], Type::list(a()), |args| {
        match args[0].as_list()? {
            [] => None,
            [_, rest @ ..] => Some(Value::List(rest.to_vec())),
        }
    })
}

pub fn leaf() -> ComponentImpl {
    ComponentImpl::constant("leaf", Type::tree(a()), Value::Tree(BinaryTree::Leaf))
}

pub fn node() -> ComponentImpl {
    ComponentImpl::new(
        "node",
        vec![a(), Type::tree(a()), Type::tree(a())],
        Type::tree(a()),
        |args| Some(Value::Tree(BinaryTree::node(
            args[0].clone(),
            args[1].as_tree()?.clone(),
            args[2].as_tree()?.clone(),
        ))),
    )
}

pub fn is_leaf() -> ComponentImpl {
    ComponentImpl::new("isLeaf", vec![Type::tree(a())], Type::bool(), |args| {
        Some(Value::Bool(matches!(args[0].as_tree()?, BinaryTree::Leaf)))
    })
}

pub fn tag() -> ComponentImpl {
    ComponentImpl::new("tag", vec![Type::tree(a())], a(), |args| match args[0].as_tree()? {
        BinaryTree::Leaf => None,
        BinaryTree::Node(tag, _, _) => Some(tag.as_ref().clone()),
    })
}

pub fn left() -> ComponentImpl {
    ComponentImpl::new("left", vec![Type::tree(a())], Type::tree(a()), |args| match args[0].as_tree()? {
        BinaryTree::Leaf => None,
        BinaryTree::Node(_, l, _) => Some(Value::Tree(l.as_ref().clone())),
    })
}

pub fn right() -> ComponentImpl {
    ComponentImpl::new("right", vec![Type::tree(a())], Type::tree(a()), |args| match args[0].as_tree()? {
        BinaryTree::Leaf => None,
        BinaryTree::Node(_, _, r) => Some(Value::Tree(r.as_ref().clone())),
    })
}

pub fn pair() -> ComponentImpl {
    ComponentImpl::new("pair", vec![a(), b()], Type::pair(a(), b()), |args| {
        Some(Value::pair(args[0].clone(), args[1].clone()))
    })
}

pub fn fst() -> ComponentImpl {
    ComponentImpl::new("fst", vec![Type::pair(a(), b())], a(), |args| {
        args[0].as_pair().map(|(x, _)| x.clone())
    })
}

pub fn snd() -> ComponentImpl {
    ComponentImpl::new("snd", vec![Type::pair(a(), b())], b(), |args| {
        args[0].as_pair().map(|(_, y)| y.clone())
    })
}

pub fn ints() -> Vec<ComponentImpl> {
    vec![zero(), inc(), dec(), neg(), add(), sub(), is_zero(), is_negative(), lt()]
}

pub fn bools() -> Vec<ComponentImpl> {
    vec![true_(), false_(), and(), or(), not(), eq()]
}

pub fn lists() -> Vec<ComponentImpl> {
    vec![nil(), cons(), snoc(), concat(), is_empty(), head(), tail()]
}

pub fn trees() -> Vec<ComponentImpl> {
    vec![leaf(), node(), is_leaf(), tag(), left(), right()]
}

pub fn pairs() -> Vec<ComponentImpl> {
    vec![pair(), fst(), snd()]
}

fn is_call(term: &Term, name: &str) -> bool {
    matches!(term, Term::Component(n, _) if n == name)
}

fn first_arg_is(names: &'static [&'static str]) -> ReductionRule {
    Rc::new(move |args: &[Term]| {
        args.first().is_some_and(|t| names.iter().any(|n| is_call(t, n)))
    })
}

/// Filters for applications that obviously reduce to something simpler,
/// keyed by the outer component.
pub fn reduction_rules() -> HashMap<String, ReductionRule> {
    let same_args: ReductionRule = Rc::new(|args: &[Term]| args.len() == 2 && args[0] == args[1]);

    [
        ("head", first_arg_is(&["cons", "nil"])),
        ("tail", first_arg_is(&["cons", "nil"])),
        ("isEmpty", first_arg_is(&["cons", "nil", "snoc"])),
        ("inc", first_arg_is(&["dec"])),
        ("dec", first_arg_is(&["inc"])),
        ("neg", first_arg_is(&["neg"])),
        ("not", first_arg_is(&["not", "true", "false"])),
        ("isLeaf", first_arg_is(&["node", "leaf"])),
        ("tag", first_arg_is(&["node", "leaf"])),
        ("left", first_arg_is(&["node", "leaf"])),
        ("right", first_arg_is(&["node", "leaf"])),
        ("fst", first_arg_is(&["pair"])),
        ("snd", first_arg_is(&["pair"])),
        ("concat", first_arg_is(&["nil"])),
        ("eq", same_args.clone()),
        ("lt", same_args.clone()),
        ("sub", same_args),
    ]
    .into_iter()
    .map(|(name, rule)| (name.to_string(), rule))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(comps: &[ComponentImpl]) -> Vec<&str> {
        comps.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn partial_components_error_outside_their_domain() {
        assert_eq!(tail().execute(&[Value::int_list(&[])]), Value::Error);
        assert_eq!(tag().execute(&[Value::Tree(BinaryTree::Leaf)]), Value::Error);
        assert_eq!(inc().execute(&[Value::Int(i64::MAX)]), Value::Error);
        assert_eq!(
            snoc().execute(&[Value::int_list(&[1]), Value::Int(2)]),
            Value::int_list(&[1, 2]),
        );
        assert_eq!(
            left().execute(&[Value::Tree(BinaryTree::node(
                Value::Int(1),
                BinaryTree::single(Value::Int(2)),
                BinaryTree::Leaf,
            ))]),
            Value::Tree(BinaryTree::single(Value::Int(2))),
        );
    }

    #[test]
    fn no_name_collisions() {
        let all = [ints(), bools(), lists(), trees(), pairs()].concat();
        let mut seen = names(&all);
        seen.sort();
        seen.dedup();

        assert_eq!(seen.len(), all.len());
    }

    #[test]
    fn rules_spot_reducible_terms() {
        let rules = reduction_rules();
        let xs = Term::var("xs");
        let cons = Term::component("cons", vec![Term::var("x"), xs.clone()]);

        assert!(rules["tail"](&[cons]));
        assert!(!rules["tail"](&[Term::component("tail", vec![xs.clone()])]));
        assert!(rules["eq"](&[xs.clone(), xs.clone()]));
        assert!(!rules["eq"](&[xs, Term::var("ys")]));
    }
}
