//! Dynamic value model for promise outcomes
//!
//! Fulfillment values and rejection reasons are untyped from the promise's
//! point of view, so outcomes are carried as a small dynamic [`Value`] enum.
//! Foreign asynchronous objects participate through the [`Thenable`] trait,
//! which is the seam the resolution procedure probes before adopting a value.

use crate::error::Error;
use crate::promise::{Callback, Promise};
use crate::Result;
use std::fmt;
use std::rc::Rc;

/// A foreign object exposing a callable `then` capability.
///
/// The resolution procedure invokes `call_then` exactly once per adoption
/// attempt, passing guarded resolve/reject paths. Implementations are
/// untrusted: they may call either path any number of times, call both, or
/// return `Err` after calling one — the guards make all of that safe.
pub trait Thenable {
    /// Invoke the capability with the adopting promise's settle paths.
    ///
    /// Returning `Err` counts as throwing synchronously: the adopting
    /// promise is rejected with the error unless a path already fired.
    fn call_then(&self, resolve: Callback, reject: Callback) -> Result<()>;
}

/// A promise outcome: fulfillment value or rejection reason.
#[derive(Clone)]
pub enum Value {
    /// Absent value (`delay` fulfills with this)
    Undefined,
    /// Boolean
    Bool(bool),
    /// Double-precision number
    Number(f64),
    /// Owned string
    String(String),
    /// Ordered sequence (`all` fulfills with one of these)
    Array(Vec<Value>),
    /// A library error used as a rejection reason
    Error(Rc<Error>),
    /// A native promise; subject to the resolution procedure
    Promise(Promise),
    /// A foreign thenable; subject to the resolution procedure
    Thenable(Rc<dyn Thenable>),
}

impl Value {
    /// Whether the resolution procedure would adopt this value rather than
    /// fulfill with it directly.
    pub fn is_thenable(&self) -> bool {
        matches!(self, Value::Promise(_) | Value::Thenable(_))
    }

    /// Type name used in diagnostics and invalid-argument errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Error(_) => "error",
            Value::Promise(_) => "promise",
            Value::Thenable(_) => "thenable",
        }
    }
}

impl PartialEq for Value {
    /// Structural equality for plain data; reference identity for promises
    /// and thenables (the identity the resolution procedure uses).
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Promise(a), Value::Promise(b)) => Promise::ptr_eq(a, b),
            (Value::Thenable(a), Value::Thenable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Value::Promise(p) => write!(f, "Promise({:?})", p.state()),
            Value::Thenable(_) => write!(f, "Thenable"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::String(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Error(e) => write!(f, "{e}"),
            Value::Promise(_) => write!(f, "[promise]"),
            Value::Thenable(_) => write!(f, "[thenable]"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::Array(items)
    }
}

impl From<Promise> for Value {
    fn from(promise: Promise) -> Value {
        Value::Promise(promise)
    }
}
