use std::fmt;

/// Name of the placeholder component standing for "the rest of the
/// program, not assembled yet".
pub const HOLE: &str = "HOLE";

/// Synthesized terms. The derived order (variables, then applications,
/// then conditionals; names before arguments) is the canonical one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Var(String),
    Component(String, Vec<Term>),
    If(Box<Term>, Box<Term>, Box<Term>),
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn component(name: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Component(name.into(), args)
    }

    pub fn if_then_else(cond: Term, then: Term, otherwise: Term) -> Self {
        Term::If(Box::new(cond), Box::new(then), Box::new(otherwise))
    }

    pub fn hole() -> Self {
        Term::Component(HOLE.to_string(), Vec::new())
    }

    pub fn is_hole(&self) -> bool {
        matches!(self, Term::Component(name, args) if name == HOLE && args.is_empty())
    }

    pub fn contains_hole(&self) -> bool {
        match self {
            Term::Var(_) => false,
            Term::Component(_, args) => self.is_hole() || args.iter().any(Term::contains_hole),
            Term::If(c, t, e) => c.contains_hole() || t.contains_hole() || e.contains_hole(),
        }
    }

    /// Replaces every hole with `filler`.
    pub fn fill_hole(&self, filler: &Term) -> Term {
        if self.is_hole() {
            return filler.clone();
        }

        match self {
            Term::Var(_) => self.clone(),
            Term::Component(name, args) => Term::Component(
                name.clone(),
                args.iter().map(|a| a.fill_hole(filler)).collect(),
            ),
            Term::If(c, t, e) => Term::if_then_else(
                c.fill_hole(filler),
                t.fill_hole(filler),
                e.fill_hole(filler),
            ),
        }
    }

    /// Whether the term calls the component `name` anywhere.
    pub fn calls(&self, name: &str) -> bool {
        match self {
            Term::Var(_) => false,
            Term::Component(n, args) => n == name || args.iter().any(|a| a.calls(name)),
            Term::If(c, t, e) => c.calls(name) || t.calls(name) || e.calls(name),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(name) => write!(f, "{name}"),
            Term::Component(name, args) => {
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    match arg {
                        Term::If(..) => write!(f, "({arg})")?,
                        _ => write!(f, "{arg}")?,
                    }
                }
                write!(f, ")")
            },
            Term::If(c, t, e) => {
                // NOTE: conditions nest to the left only through parens
                match c.as_ref() {
                    Term::If(..) => write!(f, "if ({c}) then {t} else {e}"),
                    _ => write!(f, "if {c} then {t} else {e}"),
                }
            },
        }
    }
}
