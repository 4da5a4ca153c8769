use std::cmp::Ordering;
use std::fmt;

/// Runtime values. `Error` is ordinary data: it marks a runtime mismatch
/// (a partial component applied outside its domain, or a recursive call
/// that does not decrease) and is stored and compared like any other value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Error,
    Bool(bool),
    Int(i64),
    List(Vec<Value>),
    Tree(BinaryTree),
    Pair(Box<Value>, Box<Value>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryTree {
    Leaf,
    Node(Box<Value>, Box<BinaryTree>, Box<BinaryTree>),
}

impl BinaryTree {
    pub fn node(tag: Value, left: BinaryTree, right: BinaryTree) -> Self {
        BinaryTree::Node(Box::new(tag), Box::new(left), Box::new(right))
    }

    pub fn single(tag: Value) -> Self {
        Self::node(tag, BinaryTree::Leaf, BinaryTree::Leaf)
    }

    /// Number of nodes.
    pub fn size(&self) -> usize {
        match self {
            BinaryTree::Leaf => 0,
            BinaryTree::Node(_, l, r) => 1 + l.size() + r.size(),
        }
    }
}

/// Arguments of one call, in declaration order.
pub type ArgList = Vec<Value>;

/// One value per example.
pub type ValueVector = Vec<Value>;

impl Value {
    pub fn list(elems: impl IntoIterator<Item = Value>) -> Self {
        Value::List(elems.into_iter().collect())
    }

    pub fn int_list(elems: &[i64]) -> Self {
        Self::list(elems.iter().copied().map(Value::Int))
    }

    pub fn pair(fst: Value, snd: Value) -> Self {
        Value::Pair(Box::new(fst), Box::new(snd))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(elems) => Some(elems),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&BinaryTree> {
        match self {
            Value::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<(&Value, &Value)> {
        match self {
            Value::Pair(a, b) => Some((a, b)),
            _ => None,
        }
    }

    /// The well-founded "smaller than" measure used to prove recursive
    /// calls terminate. Only defined between values of the same shape;
    /// everything else (including `Error`) is never smaller.
    pub fn smaller_than(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => !a && *b,
            (Value::Int(a), Value::Int(b)) => a.unsigned_abs() < b.unsigned_abs(),
            (Value::List(a), Value::List(b)) => a.len() < b.len(),
            (Value::Tree(a), Value::Tree(b)) => a.size() < b.size(),
            (Value::Pair(a1, a2), Value::Pair(b1, b2)) =>
                a1.smaller_than(b1) || (a1 == b1 && a2.smaller_than(b2)),
            _ => false,
        }
    }

    pub fn greater_than(&self, other: &Value) -> bool {
        other.smaller_than(self)
    }

    /// A total order that refines `smaller_than`: sizes first, then the
    /// structural order. Used to sort examples from simplest to most complex.
    pub fn size_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.unsigned_abs()
                .cmp(&b.unsigned_abs())
                .then(a.cmp(b)),
            (Value::List(a), Value::List(b)) => a.len()
                .cmp(&b.len())
                .then_with(|| args_cmp(a, b)),
            (Value::Tree(a), Value::Tree(b)) => a.size()
                .cmp(&b.size())
                .then_with(|| a.cmp(b)),
            (Value::Pair(a1, a2), Value::Pair(b1, b2)) => a1.size_cmp(b1)
                .then_with(|| a2.size_cmp(b2)),
            _ => self.cmp(other),
        }
    }
}

/// Lexicographic `size_cmp` over argument lists.
pub fn args_cmp(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.size_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

/// The first differing argument decides. An `Error` argument always fails.
pub fn alphabetic_smaller(args: &[Value], than: &[Value]) -> bool {
    // NOTE: a length mismatch means the call was built against a
    // different signature, which is a bug
    assert_eq!(args.len(), than.len(), "arg lists must have the same length");

    if args.iter().any(Value::is_error) {
        return false;
    }

    for (a, b) in args.iter().zip(than) {
        if a.greater_than(b) {
            return false;
        }
        if a.smaller_than(b) {
            return true;
        }
    }

    false
}

/// No argument grows and at least one shrinks. An `Error` argument always
/// fails.
pub fn any_arg_smaller(args: &[Value], than: &[Value]) -> bool {
    assert_eq!(args.len(), than.len(), "arg lists must have the same length");

    if args.iter().any(Value::is_error) {
        return false;
    }

    let mut smaller = false;
    for (a, b) in args.iter().zip(than) {
        if a.greater_than(b) {
            return false;
        }
        if a.smaller_than(b) {
            smaller = true;
        }
    }

    smaller
}

/// A value that may not be known yet. `Unknown` only appears while the
/// function under synthesis is still undetermined on some inputs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExtendedValue {
    Known(Value),
    Unknown,
}

pub type ExtendedVector = Vec<ExtendedValue>;

impl ExtendedValue {
    pub fn known(&self) -> Option<&Value> {
        match self {
            ExtendedValue::Known(v) => Some(v),
            ExtendedValue::Unknown => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ExtendedValue::Known(Value::Error))
    }
}

impl From<Value> for ExtendedValue {
    fn from(v: Value) -> Self {
        ExtendedValue::Known(v)
    }
}

/// `Some` when every position is known.
pub fn to_value_vector(vector: &[ExtendedValue]) -> Option<ValueVector> {
    vector.iter()
        .map(|v| v.known().cloned())
        .collect()
}

fn write_seq<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: &[T],
    close: &str,
) -> fmt::Result {
    write!(f, "{open}")?;
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "{close}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Error => write!(f, "Err"),
            Value::Bool(true) => write!(f, "T"),
            Value::Bool(false) => write!(f, "F"),
            Value::Int(i) => write!(f, "{i}"),
            Value::List(elems) => write_seq(f, "[", elems, "]"),
            Value::Tree(t) => write!(f, "{t}"),
            Value::Pair(a, b) => write!(f, "({a}, {b})"),
        }
    }
}

impl fmt::Display for BinaryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryTree::Leaf => write!(f, "L"),
            BinaryTree::Node(tag, l, r) => write!(f, "({tag}: {l}, {r})"),
        }
    }
}

impl fmt::Display for ExtendedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtendedValue::Known(v) => write!(f, "{v}"),
            ExtendedValue::Unknown => write!(f, "?"),
        }
    }
}

/// Shows a vector as `<v0, v1, ..>`.
pub struct ShowVector<'a, T>(pub &'a [T]);

impl<T: fmt::Display> fmt::Display for ShowVector<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_seq(f, "<", self.0, ">")
    }
}

/// Shows an argument list as `(a0, a1, ..)`.
pub struct ShowArgs<'a>(pub &'a [Value]);

impl fmt::Display for ShowArgs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_seq(f, "(", self.0, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_order_same_shaped_values() {
        assert!(Value::Int(-1).smaller_than(&Value::Int(2)));
        assert!(!Value::Int(-3).smaller_than(&Value::Int(2)));
        assert!(Value::int_list(&[5]).smaller_than(&Value::int_list(&[1, 2])));
        assert!(Value::Bool(false).smaller_than(&Value::Bool(true)));
        assert!(!Value::Error.smaller_than(&Value::Int(1)));
        assert!(!Value::Int(0).smaller_than(&Value::Error));

        let small = Value::Tree(BinaryTree::single(Value::Int(9)));
        let big = Value::Tree(BinaryTree::node(
            Value::Int(0),
            BinaryTree::single(Value::Int(1)),
            BinaryTree::Leaf,
        ));
        assert!(small.smaller_than(&big));
    }

    #[test]
    fn pairs_compare_lexicographically() {
        let a = Value::pair(Value::Int(1), Value::Int(5));
        let b = Value::pair(Value::Int(1), Value::Int(6));
        let c = Value::pair(Value::Int(2), Value::Int(0));

        assert!(a.smaller_than(&b));
        assert!(b.smaller_than(&c));
        assert!(!c.smaller_than(&a));
    }

    #[test]
    fn decrease_checks() {
        let orig = vec![Value::int_list(&[1, 2]), Value::Int(3)];

        assert!(any_arg_smaller(&[Value::int_list(&[2]), Value::Int(3)], &orig));
        assert!(!any_arg_smaller(&[Value::int_list(&[2]), Value::Int(4)], &orig));
        assert!(!any_arg_smaller(&orig, &orig));
        assert!(alphabetic_smaller(&[Value::int_list(&[2]), Value::Int(4)], &orig));
        // an erroring argument never counts as progress
        assert!(!any_arg_smaller(&[Value::Error, Value::Int(1)], &orig));
        assert!(!alphabetic_smaller(&[Value::Error, Value::Int(1)], &orig));
    }

    #[test]
    fn size_cmp_refines_smaller_than() {
        let mut vals = vec![
            Value::int_list(&[1, 2]),
            Value::int_list(&[]),
            Value::int_list(&[3]),
        ];
        vals.sort_by(Value::size_cmp);

        assert_eq!(vals[0], Value::int_list(&[]));
        assert_eq!(vals[2], Value::int_list(&[1, 2]));
        assert_eq!(Value::Int(-1).size_cmp(&Value::Int(1)), Ordering::Less);
        assert_eq!(Value::Int(-2).size_cmp(&Value::Int(1)), Ordering::Greater);
    }

    #[test]
    fn unknown_blocks_conversion() {
        let known = vec![ExtendedValue::from(Value::Int(1))];
        let partial = vec![ExtendedValue::from(Value::Int(1)), ExtendedValue::Unknown];

        assert_eq!(to_value_vector(&known), Some(vec![Value::Int(1)]));
        assert_eq!(to_value_vector(&partial), None);
    }

    #[test]
    fn display() {
        let tree = Value::Tree(BinaryTree::single(Value::Bool(true)));

        assert_eq!(tree.to_string(), "(T: L, L)");
        assert_eq!(Value::int_list(&[1, 2]).to_string(), "[1, 2]");
        assert_eq!(ShowVector(&[Value::Int(1), Value::Error]).to_string(), "<1, Err>");
    }
}
