use std::fmt;
use std::rc::Rc;

use crate::config::DecreaseCheck;
use crate::eval::{evaluate, EvalError, VarEnv};
use crate::term::{Term, HOLE};
use crate::types::Type;
use crate::value::{ExtendedValue, Value};

/// Syntactic filter for reducible applications, e.g. `tail(cons(x, xs))`.
/// Receives the arguments of the application.
pub type ReductionRule = Rc<dyn Fn(&[Term]) -> bool>;

/// A named, typed, executable library function. Execution is strict:
/// an `Error` argument yields `Error`, and so does a `None` from the
/// implementation (the function is undefined on that input).
#[derive(Clone)]
pub struct ComponentImpl {
    pub name: String,
    pub input_types: Vec<Type>,
    pub return_type: Type,
    exec: Rc<dyn Fn(&[Value]) -> Option<Value>>,
}

impl ComponentImpl {
    pub fn new<F>(
        name: impl Into<String>,
        input_types: Vec<Type>,
        return_type: Type,
        exec: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Option<Value> + 'static,
    {
        Self {
            name: name.into(),
            input_types,
            return_type,
            exec: Rc::new(exec),
        }
    }

    /// A constant.
    pub fn constant(name: impl Into<String>, ty: Type, value: Value) -> Self {
        Self::new(name, vec![], ty, move |_| Some(value.clone()))
    }

    pub fn arity(&self) -> usize {
        self.input_types.len()
    }

    pub fn execute(&self, args: &[Value]) -> Value {
        if args.iter().any(Value::is_error) {
            return Value::Error;
        }

        (self.exec)(args).unwrap_or(Value::Error)
    }
}

impl fmt::Debug for ComponentImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: (", self.name)?;
        for (idx, ty) in self.input_types.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ty}")?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

/// A component lifted over possibly unknown arguments.
#[derive(Clone)]
pub struct ExtendedComponent {
    pub name: String,
    pub input_types: Vec<Type>,
    pub return_type: Type,
    exec: Rc<dyn Fn(&[Value]) -> ExtendedValue>,
}

impl ExtendedComponent {
    pub fn new<F>(
        name: impl Into<String>,
        input_types: Vec<Type>,
        return_type: Type,
        exec: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> ExtendedValue + 'static,
    {
        Self {
            name: name.into(),
            input_types,
            return_type,
            exec: Rc::new(exec),
        }
    }

    pub fn lift(comp: &ComponentImpl) -> Self {
        let inner = comp.clone();

        Self::new(
            comp.name.clone(),
            comp.input_types.clone(),
            comp.return_type.clone(),
            move |args| ExtendedValue::Known(inner.execute(args)),
        )
    }

    pub fn arity(&self) -> usize {
        self.input_types.len()
    }

    /// Runs the component once every argument is known. Otherwise the
    /// result is `Error` if some known argument is `Error`, `Unknown` if not.
    pub fn execute(&self, args: &[ExtendedValue]) -> ExtendedValue {
        let known = args.iter()
            .map(|a| a.known().cloned())
            .collect::<Option<Vec<_>>>();

        match known {
            Some(args) => (self.exec)(&args),
            None if args.iter().any(ExtendedValue::is_error) => ExtendedValue::Known(Value::Error),
            None => ExtendedValue::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub arg_names: Vec<String>,
    pub input_types: Vec<Type>,
    pub return_type: Type,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (idx, (name, ty)) in self.arg_names.iter().zip(&self.input_types).enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {ty}")?;
        }
        write!(f, "): {}", self.return_type)
    }
}

#[derive(Clone)]
pub enum Binding {
    Native(Rc<ComponentImpl>),
    Recursive(Rc<RecursiveImpl>),
    /// Evaluating it reports `EvalError::HoleReached`.
    Hole,
}

/// Component names in scope. Cloning is cheap and overriding a name
/// leaves the original untouched.
#[derive(Clone)]
pub struct Environment {
    bindings: im_rc::HashMap<String, Binding>,
}

impl Environment {
    pub fn new<'a>(components: impl IntoIterator<Item = &'a ComponentImpl>) -> Self {
        let mut bindings = im_rc::HashMap::new();

        bindings.insert(HOLE.to_string(), Binding::Hole);
        for comp in components {
            bindings.insert(comp.name.clone(), Binding::Native(Rc::new(comp.clone())));
        }

        Self { bindings }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn with_binding(&self, name: &str, binding: Binding) -> Self {
        Self {
            bindings: self.bindings.update(name.to_string(), binding),
        }
    }
}

/// A synthesized (or partially synthesized) body packaged as a callable
/// component. Recursive calls go through the decrease check first and
/// evaluate to `Error` when the arguments do not shrink.
pub struct RecursiveImpl {
    signature: Signature,
    body: Term,
    env: Environment,
    decrease: DecreaseCheck,
}

impl RecursiveImpl {
    pub fn new(
        signature: Signature,
        body: Term,
        env: Environment,
        decrease: DecreaseCheck,
    ) -> Rc<Self> {
        Rc::new(Self {
            signature,
            body,
            env,
            decrease,
        })
    }

    pub fn body(&self) -> &Term {
        &self.body
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The environment the body runs in: everything plus `self`.
    pub fn environment(self: &Rc<Self>) -> Environment {
        self.env.with_binding(&self.signature.name, Binding::Recursive(self.clone()))
    }

    pub fn execute(self: &Rc<Self>, args: &[Value]) -> Result<Value, EvalError> {
        if args.iter().any(Value::is_error) {
            return Ok(Value::Error);
        }

        let vars = self.signature.arg_names.iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect::<VarEnv>();

        evaluate(&self.body, &vars, &self.environment())
    }

    /// A call made from a context whose own arguments are in `vars`.
    pub fn call_from(self: &Rc<Self>, args: &[Value], vars: &VarEnv) -> Result<Value, EvalError> {
        if args.iter().any(Value::is_error) {
            return Ok(Value::Error);
        }

        let caller = self.signature.arg_names.iter()
            .map(|name| vars.get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnboundVariable(name.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        if !self.decrease.holds(args, &caller) {
            return Ok(Value::Error);
        }

        self.execute(args)
    }
}
