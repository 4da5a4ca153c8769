use std::collections::BTreeMap;
use std::fmt;

/// Type constructors. The arity of each one is fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeCon {
    Int,
    Bool,
    List,
    Tree,
    Pair,
    Map,
}

impl TypeCon {
    pub fn arity(self) -> usize {
        match self {
            TypeCon::Int | TypeCon::Bool => 0,
            TypeCon::List | TypeCon::Tree => 1,
            TypeCon::Pair | TypeCon::Map => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeCon::Int => "Int",
            TypeCon::Bool => "Bool",
            TypeCon::List => "List",
            TypeCon::Tree => "Tree",
            TypeCon::Pair => "Pair",
            TypeCon::Map => "Map",
        }
    }
}

/// First-order types. There are no function types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    /// A unifiable type variable.
    Var(usize),
    /// A variable that only unifies with itself. Used to keep the
    /// signature being synthesized abstract.
    Fixed(usize),
    Apply(TypeCon, Vec<Type>),
}

impl Type {
    pub fn apply(con: TypeCon, params: Vec<Type>) -> Self {
        // NOTE: a wrong parameter count is a bug in the caller
        assert_eq!(con.arity(), params.len(), "wrong arity for {}", con.name());

        Type::Apply(con, params)
    }

    pub fn int() -> Self {
        Type::Apply(TypeCon::Int, Vec::new())
    }

    pub fn bool() -> Self {
        Type::Apply(TypeCon::Bool, Vec::new())
    }

    pub fn list(elem: Type) -> Self {
        Type::Apply(TypeCon::List, vec![elem])
    }

    pub fn tree(tag: Type) -> Self {
        Type::Apply(TypeCon::Tree, vec![tag])
    }

    pub fn pair(fst: Type, snd: Type) -> Self {
        Type::Apply(TypeCon::Pair, vec![fst, snd])
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Apply(TypeCon::Map, vec![key, value])
    }

    /// The smallest id such that every free variable is below it.
    pub fn next_free_id(&self) -> usize {
        match self {
            Type::Var(id) => id + 1,
            Type::Fixed(_) => 0,
            Type::Apply(_, params) => params.iter()
                .map(Type::next_free_id)
                .max()
                .unwrap_or(0),
        }
    }

    pub fn shift_id(&self, amount: usize) -> Type {
        self.rename_vars(&mut |id| id + amount)
    }

    pub fn rename_vars<F>(&self, f: &mut F) -> Type
    where
        F: FnMut(usize) -> usize,
    {
        match self {
            Type::Var(id) => Type::Var(f(*id)),
            Type::Fixed(id) => Type::Fixed(*id),
            Type::Apply(con, params) => Type::Apply(
                *con,
                params.iter().map(|p| p.rename_vars(f)).collect(),
            ),
        }
    }

    /// Turns every free variable into a fixed one.
    pub fn fix_vars(&self) -> Type {
        match self {
            Type::Var(id) => Type::Fixed(*id),
            Type::Fixed(id) => Type::Fixed(*id),
            Type::Apply(con, params) => Type::Apply(
                *con,
                params.iter().map(Type::fix_vars).collect(),
            ),
        }
    }

    pub fn contains_var(&self, id: usize) -> bool {
        match self {
            Type::Var(x) => *x == id,
            Type::Fixed(_) => false,
            Type::Apply(_, params) => params.iter().any(|p| p.contains_var(id)),
        }
    }

    /// Renames variables to `0, 1, ..` in order of first occurrence, so two
    /// types that only differ in variable names get the same key.
    pub fn alpha_normal(&self) -> Type {
        let mut renaming = BTreeMap::new();
        self.alpha_renaming(&mut renaming);

        self.rename_vars(&mut |id| renaming[&id])
    }

    fn alpha_renaming(&self, renaming: &mut BTreeMap<usize, usize>) {
        match self {
            Type::Var(id) => {
                let next = renaming.len();
                renaming.entry(*id).or_insert(next);
            },
            Type::Fixed(_) => (),
            Type::Apply(_, params) => params.iter().for_each(|p| p.alpha_renaming(renaming)),
        }
    }

    /// `self` is an instance of `parent` if some substitution of `parent`'s
    /// variables turns it into `self` without touching `self`.
    pub fn instance_of(&self, parent: &Type) -> bool {
        let parent = parent.shift_id(self.next_free_id());

        match unify(&parent, self) {
            Some(subst) => subst.apply(self) == *self,
            None => false,
        }
    }

    /// Whether a value of this type could show up somewhere inside a value
    /// of `big`. Used to prune signatures that can never contribute to
    /// the goal.
    pub fn can_appear_in(&self, big: &Type) -> bool {
        let small = self.shift_id(big.next_free_id());

        small.appears_in_shifted(big)
    }

    fn appears_in_shifted(&self, big: &Type) -> bool {
        if unify(self, big).is_some() {
            return true;
        }

        match big {
            Type::Apply(_, params) => params.iter().any(|p| self.appears_in_shifted(p)),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(id) => write!(f, "?{id}"),
            Type::Fixed(id) => write!(f, "'{id}"),
            Type::Apply(con, params) if params.is_empty() => write!(f, "{}", con.name()),
            Type::Apply(con, params) => {
                write!(f, "{}[", con.name())?;
                for (idx, p) in params.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, "]")
            },
        }
    }
}

/// A substitution from variable ids to types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subst(BTreeMap<usize, Type>);

impl Subst {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(id: usize, ty: Type) -> Self {
        Subst(BTreeMap::from([(id, ty)]))
    }

    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Var(id) => match self.0.get(id) {
                Some(t) => t.clone(),
                None => ty.clone(),
            },
            Type::Fixed(_) => ty.clone(),
            Type::Apply(con, params) => Type::Apply(
                *con,
                params.iter().map(|p| self.apply(p)).collect(),
            ),
        }
    }

    /// The substitution that first applies `self` and then `that`.
    pub fn compose(&self, that: &Subst) -> Subst {
        let mut map = self.0.iter()
            .map(|(id, ty)| (*id, that.apply(ty)))
            .collect::<BTreeMap<_, _>>();

        for (id, ty) in &that.0 {
            map.entry(*id).or_insert_with(|| ty.clone());
        }

        Subst(map)
    }
}

/// Structural unification. A failure is a normal outcome, it is what
/// prunes ill-typed applications during enumeration.
pub fn unify(t1: &Type, t2: &Type) -> Option<Subst> {
    if t1 == t2 {
        return Some(Subst::empty());
    }

    match (t1, t2) {
        (Type::Var(id), other) | (other, Type::Var(id)) => {
            if other.contains_var(*id) {
                None
            } else {
                Some(Subst::single(*id, other.clone()))
            }
        },
        (Type::Fixed(_), _) | (_, Type::Fixed(_)) => None,
        (Type::Apply(c1, p1), Type::Apply(c2, p2)) => {
            if c1 != c2 || p1.len() != p2.len() {
                return None;
            }

            let mut subst = Subst::empty();
            for (a, b) in p1.iter().zip(p2) {
                let unifier = unify(&subst.apply(a), &subst.apply(b))?;
                subst = subst.compose(&unifier);
            }

            Some(subst)
        },
    }
}
