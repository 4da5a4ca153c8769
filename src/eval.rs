use std::collections::HashMap;

use thiserror::Error;

use crate::component::{Binding, Environment};
use crate::term::Term;
use crate::value::Value;

/// Argument name to value, for one example.
pub type VarEnv = HashMap<String, Value>;

/// Signals that stop evaluation. `Value::Error` is not one of them: it is
/// an ordinary result.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum EvalError {
    #[error("unbound variable `{0}`")]
    UnboundVariable(String),
    #[error("unbound component `{0}`")]
    UnboundComponent(String),
    #[error("evaluation reached a hole")]
    HoleReached,
    #[error("condition evaluated to a non-boolean value {0}")]
    NonBoolCondition(Value),
}

pub fn evaluate(term: &Term, vars: &VarEnv, env: &Environment) -> Result<Value, EvalError> {
    match term {
        Term::Var(name) => vars.get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
        Term::Component(name, args) => {
            let binding = env.get(name)
                .ok_or_else(|| EvalError::UnboundComponent(name.clone()))?;

            if let Binding::Hole = binding {
                return Err(EvalError::HoleReached);
            }

            let args = args.iter()
                .map(|a| evaluate(a, vars, env))
                .collect::<Result<Vec<_>, _>>()?;

            match binding {
                Binding::Native(comp) => Ok(comp.execute(&args)),
                Binding::Recursive(imp) => imp.call_from(&args, vars),
                Binding::Hole => Err(EvalError::HoleReached),
            }
        },
        Term::If(cond, then, otherwise) => match evaluate(cond, vars, env)? {
            Value::Bool(true) => evaluate(then, vars, env),
            Value::Bool(false) => evaluate(otherwise, vars, env),
            Value::Error => Ok(Value::Error),
            other => Err(EvalError::NonBoolCondition(other)),
        },
    }
}
