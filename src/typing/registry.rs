//! Operation catalog indexed by canonical return type.

use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{EvalError, GpError};

use super::types::{Type, TypeDecl, TypeShape};
use super::value::{Bindings, Value};

/// Callable body of an operation.
pub type Body = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// A set of operations, used to restrict construction to a subset of the catalog.
pub type OperationSet = HashSet<Operation>;

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(0);

enum OperationKind {
    Function(Body),
    Input { initial: Option<Value> },
}

struct OperationInner {
    id: u64,
    name: String,
    params: Vec<Type>,
    return_type: Type,
    kind: OperationKind,
}

/// A registered function, constant or input.
///
/// Handles are cheap to clone. Equality, hashing and ordering follow the
/// identity of the declaration, so two declarations with identical
/// behaviour are still distinct operations.
#[derive(Clone)]
pub struct Operation(Arc<OperationInner>);

impl Operation {
    fn new(name: String, params: Vec<Type>, return_type: Type, kind: OperationKind) -> Self {
        Self(Arc::new(OperationInner {
            id: NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed),
            name,
            params,
            return_type,
            kind,
        }))
    }

    /// Unique declaration identifier.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Declared parameter types, in order.
    pub fn params(&self) -> &[Type] {
        &self.0.params
    }

    /// Declared return type.
    pub fn return_type(&self) -> &Type {
        &self.0.return_type
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.0.params.len()
    }

    /// True for zero-parameter operations (constants and inputs).
    pub fn is_leaf(&self) -> bool {
        self.0.params.is_empty()
    }

    /// True for named inputs.
    pub fn is_input(&self) -> bool {
        matches!(self.0.kind, OperationKind::Input { .. })
    }

    /// Function signature of this operation.
    pub fn signature(&self) -> Type {
        Type::function(self.0.params.clone(), self.0.return_type.clone())
    }

    /// Apply the operation to already evaluated arguments.
    ///
    /// Inputs read their value from `bindings`, falling back to the value
    /// they were declared with.
    pub fn apply(&self, args: &[Value], bindings: &Bindings) -> Result<Value, EvalError> {
        if args.len() != self.arity() {
            return Err(EvalError::Arity {
                operation: self.0.name.clone(),
                expected: self.arity(),
                found: args.len(),
            });
        }
        match &self.0.kind {
            OperationKind::Function(body) => body(args),
            OperationKind::Input { initial } => bindings
                .get(&self.0.name)
                .or(initial.as_ref())
                .cloned()
                .ok_or_else(|| EvalError::UnboundInput(self.0.name.clone())),
        }
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Operation {}

impl Hash for Operation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl PartialOrd for Operation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Operation {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operation({}: {})", self.0.name, self.signature())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// A first-class function value produced by a `_FC_` constant.
#[derive(Debug, Clone)]
pub struct FunctionValue {
    operation: Operation,
}

impl FunctionValue {
    /// The wrapped operation.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Call the wrapped operation.
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        self.operation.apply(args, &Bindings::default())
    }
}

/// Registry mapping canonical return types to the operations producing them.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    by_return: HashMap<Type, Vec<Operation>>,
    operations: Vec<Operation>,
    known_types: BTreeSet<Type>,
    inputs: HashMap<String, Operation>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an operation from its parameter types, return type and body.
    ///
    /// The body receives exactly one value per parameter. The operation is
    /// also made available as a first-class value: a zero-parameter constant
    /// `_FC_<name>` whose return type is the operation's signature and whose
    /// value is a [`FunctionValue`] wrapping it. Use
    /// [`declare_plain`](Self::declare_plain) to skip the companion.
    pub fn declare<I, D, F>(
        &mut self,
        name: &str,
        params: I,
        ret: impl Into<TypeDecl>,
        body: F,
    ) -> Operation
    where
        I: IntoIterator<Item = D>,
        D: Into<TypeDecl>,
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let operation = self.declare_plain(name, params, ret, body);
        let value = Value::new(FunctionValue {
            operation: operation.clone(),
        });
        let companion = Operation::new(
            format!("_FC_{name}"),
            Vec::new(),
            operation.signature(),
            OperationKind::Function(Arc::new(move |_: &[Value]| {
                Ok::<_, EvalError>(value.clone())
            })),
        );
        self.insert(companion);
        operation
    }

    /// Declare an operation without a first-class companion.
    pub fn declare_plain<I, D, F>(
        &mut self,
        name: &str,
        params: I,
        ret: impl Into<TypeDecl>,
        body: F,
    ) -> Operation
    where
        I: IntoIterator<Item = D>,
        D: Into<TypeDecl>,
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let params: Vec<Type> = params
            .into_iter()
            .map(|p| Into::<TypeDecl>::into(p).canonicalize())
            .collect();
        let ret = Into::<TypeDecl>::into(ret).canonicalize();
        let operation = Operation::new(
            name.to_owned(),
            params,
            ret,
            OperationKind::Function(Arc::new(body)),
        );
        self.insert(operation)
    }

    /// Declare a constant of type `ty`.
    pub fn declare_constant<T>(&mut self, ty: impl Into<TypeDecl>, value: T) -> Operation
    where
        T: Any + Send + Sync + fmt::Debug,
    {
        let name = format!("{value:?}");
        let value = Value::new(value);
        self.declare(&name, Vec::<Type>::new(), ty, move |_| Ok(value.clone()))
    }

    /// Declare a one-parameter operation over concrete Rust types.
    pub fn declare_unary<A, R, F>(
        &mut self,
        name: &str,
        param: impl Into<TypeDecl>,
        ret: impl Into<TypeDecl>,
        f: F,
    ) -> Operation
    where
        A: Any,
        R: Any + Send + Sync,
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        let param: TypeDecl = param.into();
        self.declare(name, [param], ret, move |args| {
            Ok(Value::new(f(args[0].get::<A>()?)))
        })
    }

    /// Declare a two-parameter operation over concrete Rust types.
    pub fn declare_binary<A, B, R, F>(
        &mut self,
        name: &str,
        params: (impl Into<TypeDecl>, impl Into<TypeDecl>),
        ret: impl Into<TypeDecl>,
        f: F,
    ) -> Operation
    where
        A: Any,
        B: Any,
        R: Any + Send + Sync,
        F: Fn(&A, &B) -> R + Send + Sync + 'static,
    {
        let params: [TypeDecl; 2] = [params.0.into(), params.1.into()];
        self.declare(name, params, ret, move |args| {
            Ok(Value::new(f(args[0].get::<A>()?, args[1].get::<B>()?)))
        })
    }

    /// Declare a named input that can be rebound before evaluation.
    pub fn declare_input(
        &mut self,
        name: &str,
        ty: impl Into<TypeDecl>,
        initial: Option<Value>,
    ) -> Operation {
        let operation = Operation::new(
            name.to_owned(),
            Vec::new(),
            Into::<TypeDecl>::into(ty).canonicalize(),
            OperationKind::Input { initial },
        );
        self.inputs.insert(name.to_owned(), operation.clone());
        self.insert(operation)
    }

    fn insert(&mut self, operation: Operation) -> Operation {
        for param in operation.params() {
            self.record(param);
        }
        self.record(operation.return_type());
        self.by_return
            .entry(operation.return_type().clone())
            .or_default()
            .push(operation.clone());
        self.operations.push(operation.clone());
        operation
    }

    fn record(&mut self, ty: &Type) {
        if !self.known_types.insert(ty.clone()) {
            return;
        }
        match ty.shape() {
            TypeShape::Nominal(_) => {}
            TypeShape::Sequence(inner) => self.record(inner),
            TypeShape::Mapping(key, value) => {
                self.record(key);
                self.record(value);
            }
            TypeShape::Function(params, ret) => {
                for param in params {
                    self.record(param);
                }
                self.record(ret);
            }
        }
    }

    /// Operations returning `ty`, in declaration order.
    pub fn returning(&self, ty: &Type) -> &[Operation] {
        self.by_return.get(ty).map_or(&[], Vec::as_slice)
    }

    /// Operations returning `ty`, optionally restricted to `allowed`.
    ///
    /// Fails with [`GpError::UnsatisfiableType`] when a restriction leaves
    /// no candidate.
    pub fn lookup(
        &self,
        ty: &Type,
        allowed: Option<&OperationSet>,
    ) -> Result<Vec<Operation>, GpError> {
        let candidates = self.returning(ty);
        let Some(allowed) = allowed else {
            return Ok(candidates.to_vec());
        };
        let filtered: Vec<Operation> = candidates
            .iter()
            .filter(|op| allowed.contains(*op))
            .cloned()
            .collect();
        if filtered.is_empty() {
            return Err(GpError::UnsatisfiableType(format!(
                "No allowable operations satisfying {ty}"
            )));
        }
        Ok(filtered)
    }

    /// Every type seen in a declaration, including nested components.
    pub fn known_types(&self) -> impl Iterator<Item = &Type> {
        self.known_types.iter()
    }

    /// Every registered operation, in declaration order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Look up a declared input by name.
    pub fn input(&self, name: &str) -> Option<&Operation> {
        self.inputs.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arithmetic() -> (TypeRegistry, Operation, Operation, Operation) {
        let mut registry = TypeRegistry::new();
        let add = registry.declare_binary("add", ("Num", "Num"), "Num", |x: &i64, y: &i64| x + y);
        let one = registry.declare_constant("Num", 1i64);
        let two = registry.declare_constant("Num", 2i64);
        (registry, add, one, two)
    }

    #[test]
    fn test_lookup_by_return_type() {
        let (registry, add, one, two) = arithmetic();
        let found = registry.lookup(&Type::named("Num"), None).unwrap();
        assert_eq!(found, vec![add, one, two]);
        for op in &found {
            assert_eq!(op.return_type(), &Type::named("Num"));
        }
    }

    #[test]
    fn test_lookup_restricted_to_allowed() {
        let (registry, add, one, _) = arithmetic();
        let allowed: OperationSet = [one.clone()].into_iter().collect();
        let found = registry.lookup(&Type::named("Num"), Some(&allowed)).unwrap();
        assert_eq!(found, vec![one]);

        let only_add: OperationSet = [add].into_iter().collect();
        let err = registry.lookup(&Type::named("Text"), Some(&only_add)).unwrap_err();
        assert!(matches!(err, GpError::UnsatisfiableType(_)));
    }

    #[test]
    fn test_identical_declarations_are_distinct() {
        let mut registry = TypeRegistry::new();
        let a = registry.declare_constant("Num", 1i64);
        let b = registry.declare_constant("Num", 1i64);
        assert_ne!(a, b);
        assert_eq!(registry.returning(&Type::named("Num")).len(), 2);
    }

    #[test]
    fn test_apply_checks_arity() {
        let (_, add, one, _) = arithmetic();
        let bindings = Bindings::default();
        let x = one.apply(&[], &bindings).unwrap();
        let sum = add.apply(&[x.clone(), x.clone()], &bindings).unwrap();
        assert_eq!(sum.get::<i64>().unwrap(), &2);
        assert!(matches!(
            add.apply(&[x], &bindings),
            Err(EvalError::Arity { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_declare_registers_first_class_companion() {
        let mut registry = TypeRegistry::new();
        let double = registry.declare("double", ["Num"], "Num", |args| {
            Ok(Value::new(args[0].get::<i64>()? * 2))
        });
        let signature = double.signature();
        let constants = registry.returning(&signature);
        assert_eq!(constants.len(), 1);
        assert_eq!(constants[0].name(), "_FC_double");
        assert!(constants[0].is_leaf());

        let value = constants[0].apply(&[], &Bindings::default()).unwrap();
        let function = value.get::<FunctionValue>().unwrap();
        let result = function.call(&[Value::new(21i64)]).unwrap();
        assert_eq!(result.get::<i64>().unwrap(), &42);
    }

    #[test]
    fn test_helpers_register_companions() {
        let mut registry = TypeRegistry::new();
        let neg = registry.declare_unary("neg", "Num", "Num", |x: &i64| -x);
        let one = registry.declare_constant("Num", 1i64);
        registry.declare_input("x", "Num", None);

        let names = |ty: &Type| -> Vec<String> {
            registry
                .returning(ty)
                .iter()
                .map(|op| op.name().to_owned())
                .collect()
        };
        assert_eq!(names(&neg.signature()), vec!["_FC_neg".to_string()]);
        assert_eq!(names(&one.signature()), vec!["_FC_1".to_string()]);
        assert_eq!(registry.returning(&Type::named("Num")).len(), 3);
    }

    #[test]
    fn test_declare_plain_skips_companion() {
        let mut registry = TypeRegistry::new();
        let double = registry.declare_plain("double", ["Num"], "Num", |args| {
            Ok(Value::new(args[0].get::<i64>()? * 2))
        });
        assert!(registry.returning(&double.signature()).is_empty());
        assert_eq!(registry.operations().len(), 1);
    }

    #[test]
    fn test_inputs_read_bindings() {
        let mut registry = TypeRegistry::new();
        let x = registry.declare_input("x", "Num", Some(Value::new(5i64)));
        let y = registry.declare_input("y", "Num", None);
        assert!(x.is_input());
        assert_eq!(registry.input("x"), Some(&x));

        let empty = Bindings::default();
        assert_eq!(x.apply(&[], &empty).unwrap().get::<i64>().unwrap(), &5);
        assert!(matches!(y.apply(&[], &empty), Err(EvalError::UnboundInput(_))));

        let bound = Bindings::new().bind("x", 9i64).bind("y", 1i64);
        assert_eq!(x.apply(&[], &bound).unwrap().get::<i64>().unwrap(), &9);
        assert_eq!(y.apply(&[], &bound).unwrap().get::<i64>().unwrap(), &1);
    }

    #[test]
    fn test_known_types_include_components() {
        let mut registry = TypeRegistry::new();
        registry.declare(
            "lengths",
            [TypeDecl::sequence("Word")],
            TypeDecl::mapping("Word", TypeDecl::of::<usize>()),
            |_| Ok(Value::new(())),
        );
        let known: Vec<String> = registry.known_types().map(ToString::to_string).collect();
        assert!(known.contains(&"Word".to_string()));
        assert!(known.contains(&"[Word]".to_string()));
        assert!(known.contains(&"usize".to_string()));
        assert!(known.contains(&"{Word: usize}".to_string()));
    }
}
