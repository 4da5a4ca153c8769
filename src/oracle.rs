use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::value::{ArgList, ExtendedValue, ShowArgs, Value};

/// An input/output pair of the function being synthesized.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Example {
    pub args: ArgList,
    pub output: Value,
}

impl Example {
    pub fn new(args: ArgList, output: Value) -> Self {
        Self { args, output }
    }
}

impl fmt::Display for Example {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", ShowArgs(&self.args), self.output)
    }
}

/// Reference behaviour of the function being synthesized. `None` means the
/// function is not defined on that input.
pub trait Oracle {
    fn query(&self, args: &[Value]) -> Option<Value>;
}

impl<F> Oracle for F
where
    F: Fn(&[Value]) -> Option<Value>,
{
    fn query(&self, args: &[Value]) -> Option<Value> {
        self(args)
    }
}

/// Answers calls to the function under synthesis during one attempt:
/// trusted examples first, then the buffer of examples seen but not
/// trusted yet, then the oracle itself. Each argument list reaches the
/// oracle at most once.
pub struct BufferedOracle {
    known: HashMap<ArgList, Value>,
    buffer: Vec<Example>,
    buffered: HashMap<ArgList, usize>,
    undefined: HashSet<ArgList>,
    oracle: Option<Rc<dyn Oracle>>,
}

impl BufferedOracle {
    pub fn new(
        examples: &[Example],
        oracle: Option<Rc<dyn Oracle>>,
        init_buffer: Vec<Example>,
    ) -> Self {
        let known = examples.iter()
            .map(|e| (e.args.clone(), e.output.clone()))
            .collect::<HashMap<_, _>>();
        let mut res = Self {
            known,
            buffer: Vec::new(),
            buffered: HashMap::new(),
            undefined: HashSet::new(),
            oracle,
        };

        for example in init_buffer {
            res.push(example);
        }

        res
    }

    /// Examples seen through the oracle (or held back by the caller) that
    /// are not part of the trusted set.
    pub fn buffer(&self) -> &[Example] {
        &self.buffer
    }

    pub fn answer(&mut self, args: &[Value]) -> ExtendedValue {
        if let Some(v) = self.known.get(args) {
            return ExtendedValue::Known(v.clone());
        }
        if let Some(idx) = self.buffered.get(args) {
            return ExtendedValue::Known(self.buffer[*idx].output.clone());
        }
        if self.undefined.contains(args) {
            return ExtendedValue::Known(Value::Error);
        }

        let Some(oracle) = &self.oracle else {
            return ExtendedValue::Unknown;
        };

        match oracle.query(args) {
            Some(output) => {
                trace!("Oracle: {} -> {output}", ShowArgs(args));
                self.push(Example::new(args.to_vec(), output.clone()));

                ExtendedValue::Known(output)
            },
            None => {
                debug!("Oracle undefined on {}", ShowArgs(args));
                self.undefined.insert(args.to_vec());

                ExtendedValue::Known(Value::Error)
            },
        }
    }

    fn push(&mut self, example: Example) {
        let seen = self.known.get(&example.args)
            .or_else(|| self.buffered.get(&example.args).map(|idx| &self.buffer[*idx].output));

        if let Some(output) = seen {
            if *output != example.output {
                warn!("Dropping {example}: {} already maps to {output}", ShowArgs(&example.args));
            }
            return;
        }

        self.buffered.insert(example.args.clone(), self.buffer.len());
        self.buffer.push(example);
    }
}
