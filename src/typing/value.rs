//! Dynamically typed values flowing through tree evaluation.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EvalError;

/// A value produced by an operation.
///
/// Cloning is cheap: the payload is shared.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wrap a Rust value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Borrow the payload if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Borrow the payload as `T`, failing with a type mismatch otherwise.
    pub fn get<T: Any>(&self) -> Result<&T, EvalError> {
        self.downcast_ref::<T>().ok_or(EvalError::TypeMismatch {
            expected: type_name::<T>(),
            found: self.type_name,
        })
    }

    /// Rust type name of the payload.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>", self.type_name)
    }
}

/// Values bound to named inputs for one evaluation.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, Value>,
}

impl Bindings {
    /// Create an empty binding set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, replacing any earlier binding.
    pub fn bind<T: Any + Send + Sync>(mut self, name: &str, value: T) -> Self {
        self.set(name, Value::new(value));
        self
    }

    /// Bind `name` to an already wrapped value.
    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_owned(), value);
    }

    /// Look up a bound value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}
