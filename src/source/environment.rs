use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::builtins;
use super::expression::{parse_program, BinaryOp, Expression, Statement, UnaryOp};
use super::{SourceError, Value};
use crate::data::Dataset;
use crate::error::Result;
use crate::function::{Callable, FunctionSource, TargetFunction};

/// Nesting limit for user function calls.
const MAX_CALL_DEPTH: usize = 64;

#[derive(Debug)]
struct FunctionDef {
    params: Vec<String>,
    body: Expression,
}

#[derive(Debug, Clone)]
enum Binding {
    Data(Value),
    Function(Arc<FunctionDef>),
}

/// Named definitions in the order they were first made.
#[derive(Debug, Clone, Default)]
struct Bindings {
    entries: Vec<(String, Binding)>,
}

impl Bindings {
    fn get(&self, name: &str) -> Option<&Binding> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
    }

    /// Redefining a name keeps its original position.
    fn insert(&mut self, name: &str, binding: Binding) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = binding,
            None => self.entries.push((name.to_string(), binding)),
        }
    }
}

struct Evaluator<'a> {
    bindings: &'a Bindings,
    rng: Option<&'a mut StdRng>,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    fn eval(&mut self, expr: &Expression, locals: &[(&str, Value)]) -> std::result::Result<Value, SourceError> {
        match expr {
            Expression::Number(n) => Ok(Value::Scalar(*n)),
            Expression::Variable(name) => self.lookup(name, locals),
            Expression::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match self.eval(item, locals)? {
                        Value::Scalar(v) => values.push(v),
                        Value::Array(_) => {
                            return Err(SourceError::InvalidArgument {
                                function: "array literal".to_string(),
                                message: "elements must be scalars".to_string(),
                            })
                        }
                    }
                }
                Ok(Value::Array(Array1::from_vec(values)))
            }
            Expression::Unary(UnaryOp::Neg, operand) => Ok(self.eval(operand, locals)?.map(|v| -v)),
            Expression::Binary(op, left, right) => {
                let op = *op;
                let a = self.eval(left, locals)?;
                let b = self.eval(right, locals)?;
                a.zip_with(&b, |x, y| op.apply(x, y))
            }
            Expression::Call(name, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, locals)?);
                }
                self.call(name, values)
            }
        }
    }

    fn lookup(&self, name: &str, locals: &[(&str, Value)]) -> std::result::Result<Value, SourceError> {
        if let Some((_, value)) = locals.iter().find(|(n, _)| *n == name) {
            return Ok(value.clone());
        }
        match self.bindings.get(name) {
            Some(Binding::Data(value)) => Ok(value.clone()),
            Some(Binding::Function(_)) => Err(SourceError::NotAValue {
                name: name.to_string(),
            }),
            None => builtins::constant(name)
                .map(Value::Scalar)
                .ok_or_else(|| SourceError::UndefinedName {
                    name: name.to_string(),
                }),
        }
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> std::result::Result<Value, SourceError> {
        let bindings = self.bindings;
        match bindings.get(name) {
            Some(Binding::Function(def)) => self.invoke(name, def, args),
            Some(Binding::Data(_)) => Err(SourceError::NotCallable {
                name: name.to_string(),
            }),
            None => builtins::call(name, &args, self.rng.as_deref_mut()),
        }
    }

    fn invoke(
        &self,
        name: &str,
        def: &FunctionDef,
        args: Vec<Value>,
    ) -> std::result::Result<Value, SourceError> {
        if args.len() != def.params.len() {
            return Err(SourceError::Arity {
                name: name.to_string(),
                expected: def.params.len().to_string(),
                found: args.len(),
            });
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(SourceError::InvalidArgument {
                function: name.to_string(),
                message: "maximum call depth exceeded".to_string(),
            });
        }

        let locals: Vec<(&str, Value)> = def.params.iter().map(String::as_str).zip(args).collect();
        let mut inner = Evaluator {
            bindings: self.bindings,
            rng: None,
            depth: self.depth + 1,
        };
        inner.eval(&def.body, &locals)
    }
}

/// Resolve every name in a function body against its formals and the
/// definitions made so far.
fn check_body(
    expr: &Expression,
    params: &[String],
    bindings: &Bindings,
) -> std::result::Result<(), SourceError> {
    match expr {
        Expression::Number(_) => Ok(()),
        Expression::Variable(name) => {
            if params.contains(name) || builtins::constant(name).is_some() {
                return Ok(());
            }
            match bindings.get(name) {
                Some(Binding::Data(_)) => Ok(()),
                Some(Binding::Function(_)) => Err(SourceError::NotAValue { name: name.clone() }),
                None => Err(SourceError::UndefinedName { name: name.clone() }),
            }
        }
        Expression::Array(items) => items
            .iter()
            .try_for_each(|item| check_body(item, params, bindings)),
        Expression::Unary(_, operand) => check_body(operand, params, bindings),
        Expression::Binary(_, left, right) => {
            check_body(left, params, bindings)?;
            check_body(right, params, bindings)
        }
        Expression::Call(name, args) => {
            for arg in args {
                check_body(arg, params, bindings)?;
            }
            let expected = match bindings.get(name) {
                Some(Binding::Function(def)) => def.params.len()..=def.params.len(),
                Some(Binding::Data(_)) => {
                    return Err(SourceError::NotCallable { name: name.clone() })
                }
                None => {
                    if builtins::is_random(name) {
                        return Err(SourceError::InvalidArgument {
                            function: name.clone(),
                            message: "random numbers are not available inside function definitions"
                                .to_string(),
                        });
                    }
                    builtins::arity(name)
                        .ok_or_else(|| SourceError::UndefinedName { name: name.clone() })?
                }
            };
            if !expected.contains(&args.len()) {
                return Err(SourceError::Arity {
                    name: name.clone(),
                    expected: builtins::describe_arity(&expected),
                    found: args.len(),
                });
            }
            Ok(())
        }
    }
}

/// Names a function body depends on, transitively.
#[derive(Debug, Default)]
struct Dependencies {
    seen: HashSet<String>,
    /// Data names, first reference first
    data: Vec<String>,
    /// Function names, each after every function it calls
    functions: Vec<String>,
}

fn collect_dependencies(
    expr: &Expression,
    params: &[String],
    bindings: &Bindings,
    deps: &mut Dependencies,
) {
    match expr {
        Expression::Number(_) => {}
        Expression::Variable(name) => {
            if !params.contains(name)
                && matches!(bindings.get(name), Some(Binding::Data(_)))
                && deps.seen.insert(name.clone())
            {
                deps.data.push(name.clone());
            }
        }
        Expression::Array(items) => {
            for item in items {
                collect_dependencies(item, params, bindings, deps);
            }
        }
        Expression::Unary(_, operand) => collect_dependencies(operand, params, bindings, deps),
        Expression::Binary(_, left, right) => {
            collect_dependencies(left, params, bindings, deps);
            collect_dependencies(right, params, bindings, deps);
        }
        Expression::Call(name, args) => {
            for arg in args {
                collect_dependencies(arg, params, bindings, deps);
            }
            if let Some(Binding::Function(def)) = bindings.get(name) {
                if deps.seen.insert(name.clone()) {
                    collect_dependencies(&def.body, &def.params, bindings, deps);
                    deps.functions.push(name.clone());
                }
            }
        }
    }
}

fn literal(value: f64) -> Expression {
    if value.is_nan() {
        Expression::Binary(
            BinaryOp::Div,
            Box::new(Expression::Number(0.0)),
            Box::new(Expression::Number(0.0)),
        )
    } else if value.is_infinite() {
        let inf = Expression::Variable("inf".to_string());
        if value > 0.0 {
            inf
        } else {
            Expression::Unary(UnaryOp::Neg, Box::new(inf))
        }
    } else if value.is_sign_negative() {
        Expression::Unary(UnaryOp::Neg, Box::new(Expression::Number(-value)))
    } else {
        Expression::Number(value)
    }
}

/// A callable defined by a `def` statement.
///
/// Holds a snapshot of the definitions it was created from, so later edits
/// to the environment do not change its behavior.
#[derive(Debug, Clone)]
pub struct ExprFunction {
    name: String,
    def: Arc<FunctionDef>,
    bindings: Arc<Bindings>,
}

impl ExprFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source text that redefines this function and everything it depends
    /// on, data values written out exactly.
    pub fn standalone_source(&self) -> String {
        let mut deps = Dependencies::default();
        collect_dependencies(&self.def.body, &self.def.params, &self.bindings, &mut deps);

        // Data are literals, so they go first; functions follow their callees.
        let mut lines = Vec::new();
        for name in &deps.data {
            let value = match self.bindings.get(name) {
                Some(Binding::Data(Value::Scalar(v))) => literal(*v),
                Some(Binding::Data(Value::Array(values))) => {
                    Expression::Array(values.iter().map(|v| literal(*v)).collect())
                }
                _ => continue,
            };
            lines.push(
                Statement::Assign {
                    name: name.clone(),
                    value,
                }
                .to_string(),
            );
        }
        for name in deps.functions.iter().filter(|n| *n != &self.name) {
            if let Some(Binding::Function(def)) = self.bindings.get(name) {
                lines.push(
                    Statement::Define {
                        name: name.clone(),
                        params: def.params.clone(),
                        body: def.body.clone(),
                    }
                    .to_string(),
                );
            }
        }
        lines.push(
            Statement::Define {
                name: self.name.clone(),
                params: self.def.params.clone(),
                body: self.def.body.clone(),
            }
            .to_string(),
        );
        lines.join("\n")
    }

    /// Evaluate with arbitrary arguments, arrays broadcasting element-wise.
    pub fn evaluate(&self, args: &[Value]) -> std::result::Result<Value, SourceError> {
        let evaluator = Evaluator {
            bindings: &self.bindings,
            rng: None,
            depth: 0,
        };
        evaluator.invoke(&self.name, &self.def, args.to_vec())
    }
}

impl Callable for ExprFunction {
    /// Evaluation errors and non-scalar results become NaN, which the solver
    /// rejects.
    fn call(&self, x: f64, params: &[f64]) -> f64 {
        let mut args = Vec::with_capacity(params.len() + 1);
        args.push(Value::Scalar(x));
        args.extend(params.iter().copied().map(Value::Scalar));
        match self.evaluate(&args) {
            Ok(Value::Scalar(v)) => v,
            _ => f64::NAN,
        }
    }

    fn signature(&self) -> Option<Vec<String>> {
        Some(self.def.params.clone())
    }

    fn source(&self) -> Option<FunctionSource> {
        Some(FunctionSource {
            text: self.standalone_source(),
            entry_point: self.name.clone(),
        })
    }
}

/// Executes source text and holds the functions and data it defines.
///
/// # Examples
///
/// ```
/// use actfit::source::SourceEnvironment;
///
/// let mut env = SourceEnvironment::with_seed(0);
/// env.exec("def line(x, a, b) = a * x + b\nxs = linspace(0, 1, 11)").unwrap();
/// assert_eq!(env.callables(), vec!["line"]);
/// assert_eq!(env.non_callables(), vec!["xs"]);
///
/// let line = env.function("line").unwrap();
/// assert_eq!(line.parameter_names(), &["a", "b"]);
/// assert_eq!(line.eval(2.0, &[3.0, 1.0]), 7.0);
/// ```
#[derive(Debug, Clone)]
pub struct SourceEnvironment {
    bindings: Arc<Bindings>,
    rng: StdRng,
    source: String,
}

impl Default for SourceEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceEnvironment {
    /// An empty environment with an entropy-seeded generator.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// An empty environment whose `rand`/`randn` output is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            bindings: Arc::new(Bindings::default()),
            rng,
            source: String::new(),
        }
    }

    /// Execute `text`. On error nothing from `text` is kept.
    pub fn exec(&mut self, text: &str) -> std::result::Result<(), SourceError> {
        let program = parse_program(text)?;
        let mut staged = (*self.bindings).clone();
        let mut rng = self.rng.clone();

        for (line, statement) in &program {
            Self::apply(&mut staged, &mut rng, statement).map_err(|e| e.at_line(*line))?;
        }

        self.bindings = Arc::new(staged);
        self.rng = rng;
        if !self.source.is_empty() && !self.source.ends_with('\n') {
            self.source.push('\n');
        }
        self.source.push_str(text);

        info!(
            statements = program.len(),
            callables = self.callables().len(),
            sequences = self.non_callables().len(),
            "executed source"
        );
        Ok(())
    }

    fn apply(
        bindings: &mut Bindings,
        rng: &mut StdRng,
        statement: &Statement,
    ) -> std::result::Result<(), SourceError> {
        match statement {
            Statement::Define { name, params, body } => {
                for (i, param) in params.iter().enumerate() {
                    if params[..i].contains(param) {
                        return Err(SourceError::InvalidArgument {
                            function: name.clone(),
                            message: format!("duplicate argument '{}'", param),
                        });
                    }
                }
                check_body(body, params, bindings)?;
                bindings.insert(
                    name,
                    Binding::Function(Arc::new(FunctionDef {
                        params: params.clone(),
                        body: body.clone(),
                    })),
                );
            }
            Statement::Assign { name, value } => {
                let result = {
                    let mut evaluator = Evaluator {
                        bindings: &*bindings,
                        rng: Some(&mut *rng),
                        depth: 0,
                    };
                    evaluator.eval(value, &[])?
                };
                bindings.insert(name, Binding::Data(result));
            }
        }
        debug!(name = statement.name(), "defined");
        Ok(())
    }

    /// Drop every definition and the accumulated source text.
    pub fn reset(&mut self) {
        self.bindings = Arc::new(Bindings::default());
        self.source.clear();
    }

    /// All source text executed so far.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.get(name).is_some()
    }

    /// Names of defined functions, in definition order.
    pub fn callables(&self) -> Vec<&str> {
        self.bindings
            .entries
            .iter()
            .filter(|(_, b)| matches!(b, Binding::Function(_)))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Names of defined data, in definition order.
    pub fn non_callables(&self) -> Vec<&str> {
        self.bindings
            .entries
            .iter()
            .filter(|(_, b)| matches!(b, Binding::Data(_)))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.bindings.get(name) {
            Some(Binding::Data(value)) => Some(value),
            _ => None,
        }
    }

    /// The callable `name`, wrapped and introspected.
    pub fn function(&self, name: &str) -> Result<TargetFunction> {
        match self.bindings.get(name) {
            Some(Binding::Function(def)) => {
                let callable = ExprFunction {
                    name: name.to_string(),
                    def: Arc::clone(def),
                    bindings: Arc::clone(&self.bindings),
                };
                TargetFunction::new(name, callable)
            }
            Some(Binding::Data(_)) => Err(SourceError::NotCallable {
                name: name.to_string(),
            }
            .into()),
            None => Err(SourceError::UndefinedName {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// The data sequence `name`. Scalars are not sequences.
    pub fn sequence(&self, name: &str) -> std::result::Result<Array1<f64>, SourceError> {
        match self.bindings.get(name) {
            Some(Binding::Data(Value::Array(values))) => Ok(values.clone()),
            Some(_) => Err(SourceError::NotASequence {
                name: name.to_string(),
            }),
            None => Err(SourceError::UndefinedName {
                name: name.to_string(),
            }),
        }
    }

    /// Pair two sequences into a dataset.
    pub fn dataset(&self, xs: &str, ys: &str) -> Result<Dataset> {
        Dataset::new(self.sequence(xs)?, self.sequence(ys)?)
    }
}
