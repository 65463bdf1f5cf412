mod array;
mod builtins;
mod callable;
mod class;
mod environment;

use std::{
    cell::RefCell,
    fmt::{Debug, Display},
    io::{BufRead, BufReader, Write},
    rc::Rc,
};

use crate::{
    ast::{
        ExprId, Expression, Identifier, InfixOperator, Literal, LogicalOperator, Program,
        Statement, UnaryOperator,
    },
    resolver::{Locals, ResolveErrors, Resolver},
    span::Span,
};

pub use self::{
    array::Array,
    callable::{Callable, CallableFunction, NativeFunction},
    class::{Class, Instance},
    environment::Environment,
};

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    Array(Array),
    Callable(Rc<Callable>),
    Instance(Rc<RefCell<Instance>>),
    Nil,
}

impl Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Boolean(b) => *b,
            _ => true,
        }
    }
}

/// Primitives compare by value, NaN included. Arrays, callables and
/// instances compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) if n.is_infinite() => {
                write!(f, "{}", if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Array(array) => write!(f, "{}", array),
            Value::Callable(callable) => write!(f, "{}", callable),
            Value::Instance(instance) => write!(f, "{}", instance.borrow()),
            Value::Nil => write!(f, "nil"),
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Nil => Value::Nil,
        }
    }
}

/// How a statement finished. `Return` unwinds to the nearest function call.
#[derive(Debug)]
enum Completion {
    Normal,
    Return(Value),
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Operands must be numbers: {0} < {1}")]
    InvalidLess(Value, Value),
    #[error("Operands must be numbers: {0} <= {1}")]
    InvalidLessEqual(Value, Value),
    #[error("Operands must be numbers: {0} > {1}")]
    InvalidGreater(Value, Value),
    #[error("Operands must be numbers: {0} >= {1}")]
    InvalidGreaterEqual(Value, Value),
    #[error("Operands must be two numbers or two strings: {0} + {1}")]
    InvalidAdd(Value, Value),
    #[error("Operands must be numbers: {0} - {1}")]
    InvalidSub(Value, Value),
    #[error("Operands must be numbers: {0} * {1}")]
    InvalidMult(Value, Value),
    #[error("Operands must be numbers: {0} / {1}")]
    InvalidDiv(Value, Value),
    #[error("Operand must be a number: -{0}")]
    InvalidNegate(Value),
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),
    #[error("Can only call functions and classes, not {0}.")]
    NotCallable(Value),
    #[error("{callee} expected {expected} arguments but got {got}.")]
    InvalidArity {
        callee: String,
        expected: usize,
        got: usize,
    },
    #[error("Only instances have properties, not {0}.")]
    GetOnNonInstance(Value),
    #[error("Only instances have fields, not {0}.")]
    SetOnNonInstance(Value),
    #[error("Superclass must be a class, not {0}.")]
    NotAClass(Value),
    #[error("Array index {index} is out of range for size {len}.")]
    IndexOutOfRange { index: f64, len: usize },
    #[error("{function}(): {message}")]
    Native {
        function: &'static str,
        message: String,
    },
    #[error("Stack overflow.")]
    StackOverflow,
}

/// A runtime failure together with the source location it is attributed to.
#[derive(Debug)]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    pub span: Option<Span>,
}

impl ExecutionError {
    fn at(kind: ExecutionErrorKind, span: Span) -> Self {
        Self {
            kind,
            span: Some(span),
        }
    }

    pub fn line(&self) -> Option<usize> {
        self.span.map(|span| span.start_line)
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(error: std::io::Error) -> Self {
        Self {
            kind: error.into(),
            span: None,
        }
    }
}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(line) = self.line() {
            write!(f, "\n[line {}]", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Deepest chain of interpreted calls allowed before a program is stopped
/// with a stack overflow error. Hosts should run the interpreter on a thread
/// whose stack can hold this many calls.
pub const MAX_CALL_DEPTH: usize = 1024;

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: Locals,
    depth: usize,
    stdout: Rc<RefCell<dyn Write>>,
    stdin: Rc<RefCell<dyn BufRead>>,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("globals", &self.globals)
            .field("environment", &self.environment)
            .field("locals", &self.locals.len())
            .field("depth", &self.depth)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Rc::new(RefCell::new(std::io::stdout())))
    }
}

impl Interpreter {
    /// Creates an interpreter printing to `stdout` and reading process stdin.
    pub fn new(stdout: Rc<RefCell<dyn Write>>) -> Self {
        Self::with_io(stdout, Rc::new(RefCell::new(BufReader::new(std::io::stdin()))))
    }

    pub fn with_io(stdout: Rc<RefCell<dyn Write>>, stdin: Rc<RefCell<dyn BufRead>>) -> Self {
        let globals = Environment::boxed(None);
        for native in builtins::all() {
            let (name, alias) = (native.name, native.alias);
            let value = Value::Callable(Rc::new(Callable::Native(native)));
            let mut globals = globals.borrow_mut();
            globals.define(name, value.clone());
            globals.define(alias, value);
        }

        Self {
            environment: globals.clone(),
            globals,
            locals: Locals::default(),
            depth: 0,
            stdout,
            stdin,
        }
    }

    /// Resolves `program` and remembers its scope distances. Annotations from
    /// earlier programs are kept so functions defined by them keep working.
    pub fn resolve(&mut self, program: &Program) -> Result<(), ResolveErrors> {
        let locals = Resolver::new().resolve(program)?;
        tracing::debug!(resolved = locals.len(), "resolved program");
        self.locals.extend(locals);
        Ok(())
    }

    /// Runs a resolved program. Stops at the first runtime error. Output
    /// written before the error stays written, and global definitions made
    /// before it stay defined.
    pub fn interpret(&mut self, program: &Program) -> Result<(), ExecutionError> {
        for statement in program.0.iter() {
            if let Completion::Return(_) = self.execute(statement)? {
                break;
            }
        }
        Ok(())
    }

    fn execute(&mut self, statement: &Statement) -> Result<Completion, ExecutionError> {
        let completion = match statement {
            Statement::Expression(expression) => {
                self.evaluate(expression)?;
                Completion::Normal
            }
            Statement::Print(expression) => {
                let value = self.evaluate(expression)?;
                writeln!(self.stdout.borrow_mut(), "{}", value)?;
                Completion::Normal
            }
            Statement::VarDeclaration(name, initializer) => {
                let value = match initializer {
                    Some(initializer) => self.evaluate(initializer)?,
                    None => Value::Nil,
                };
                self.environment
                    .borrow_mut()
                    .define(name.name.clone(), value);
                Completion::Normal
            }
            Statement::Block(statements) => {
                let environment = Environment::boxed(Some(self.environment.clone()));
                self.execute_block(statements, environment)?
            }
            Statement::If(condition, then_branch, else_branch) => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?
                } else {
                    Completion::Normal
                }
            }
            Statement::While(condition, body) => {
                let mut completion = Completion::Normal;
                while self.evaluate(condition)?.is_truthy() {
                    completion = self.execute(body)?;
                    if let Completion::Return(_) = completion {
                        break;
                    }
                }
                completion
            }
            Statement::FunctionDeclaration(decl) => {
                let function = CallableFunction {
                    closure: self.environment.clone(),
                    decl: decl.clone(),
                    is_initializer: false,
                };
                self.environment.borrow_mut().define(
                    decl.name.name.clone(),
                    Value::Callable(Rc::new(Callable::Function(function))),
                );
                Completion::Normal
            }
            Statement::Return(_, value) => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Nil,
                };
                Completion::Return(value)
            }
            Statement::ClassDeclaration(class_decl) => {
                let superclass = match &class_decl.superclass {
                    Some(expression) => match self.evaluate(expression)? {
                        Value::Callable(callable) => match callable.as_ref() {
                            Callable::Class(class) => Some(class.clone()),
                            _ => {
                                return Err(not_a_class(
                                    Value::Callable(callable.clone()),
                                    expression,
                                ))
                            }
                        },
                        value => return Err(not_a_class(value, expression)),
                    },
                    None => None,
                };

                let closure = match &superclass {
                    Some(superclass) => {
                        let environment = Environment::boxed(Some(self.environment.clone()));
                        environment.borrow_mut().define(
                            "super",
                            Value::Callable(Rc::new(Callable::Class(superclass.clone()))),
                        );
                        environment
                    }
                    None => self.environment.clone(),
                };

                let methods = class_decl
                    .methods
                    .iter()
                    .map(|method| {
                        let function = CallableFunction {
                            closure: closure.clone(),
                            decl: method.clone(),
                            is_initializer: method.name.name == "init",
                        };
                        (method.name.name.clone(), function)
                    })
                    .collect();

                tracing::trace!(class = %class_decl.name, "declare class");
                let class = Class {
                    name: class_decl.name.name.clone(),
                    superclass,
                    methods,
                };
                self.environment.borrow_mut().define(
                    class_decl.name.name.clone(),
                    Value::Callable(Rc::new(Callable::Class(Rc::new(class)))),
                );
                Completion::Normal
            }
        };

        Ok(completion)
    }

    fn execute_block(
        &mut self,
        statements: &[Statement],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Completion, ExecutionError> {
        self.execute_in_environment(environment, |interpreter| {
            for statement in statements {
                if let Completion::Return(value) = interpreter.execute(statement)? {
                    return Ok(Completion::Return(value));
                }
            }
            Ok(Completion::Normal)
        })
    }

    /// Runs `f` with `environment` current, restoring the previous one however
    /// `f` exits.
    fn execute_in_environment<T>(
        &mut self,
        environment: Rc<RefCell<Environment>>,
        f: impl FnOnce(&mut Self) -> Result<T, ExecutionError>,
    ) -> Result<T, ExecutionError> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = f(self);
        self.environment = previous;
        result
    }

    /// Runs `f` one call deeper, failing at `paren` once the call chain
    /// exceeds [`MAX_CALL_DEPTH`].
    fn execute_call<T>(
        &mut self,
        paren: Span,
        f: impl FnOnce(&mut Self) -> Result<T, ExecutionError>,
    ) -> Result<T, ExecutionError> {
        if self.depth >= MAX_CALL_DEPTH {
            tracing::debug!(depth = self.depth, "call depth exceeded");
            return Err(ExecutionError::at(ExecutionErrorKind::StackOverflow, paren));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn look_up_variable(&self, id: ExprId, name: &Identifier) -> Result<Value, ExecutionError> {
        let value = match self.locals.get(&id) {
            Some(distance) => Environment::get_at(&self.environment, *distance, &name.name),
            None => self.globals.borrow().get(&name.name),
        };
        value.ok_or_else(|| {
            ExecutionError::at(
                ExecutionErrorKind::UndefinedVariable(name.name.clone()),
                name.span,
            )
        })
    }

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, ExecutionError> {
        match expression {
            Expression::Literal(literal) => Ok(literal.into()),
            Expression::Grouping(expression) => self.evaluate(expression),
            Expression::Variable { id, name } => self.look_up_variable(*id, name),
            Expression::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                let assigned = match self.locals.get(id) {
                    Some(distance) => Environment::assign_at(
                        &self.environment,
                        *distance,
                        &name.name,
                        value.clone(),
                    ),
                    None => self.globals.borrow_mut().assign(&name.name, value.clone()),
                };
                assigned.ok_or_else(|| {
                    ExecutionError::at(
                        ExecutionErrorKind::UndefinedVariable(name.name.clone()),
                        name.span,
                    )
                })?;
                Ok(value)
            }
            Expression::Unary(op, span, right) => {
                let right = self.evaluate(right)?;
                match op {
                    UnaryOperator::Negate => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        right => Err(ExecutionError::at(
                            ExecutionErrorKind::InvalidNegate(right),
                            *span,
                        )),
                    },
                    UnaryOperator::Not => Ok(Value::Boolean(!right.is_truthy())),
                }
            }
            Expression::Logical(left, op, right) => {
                let left = self.evaluate(left)?;
                match op {
                    LogicalOperator::Or if left.is_truthy() => Ok(left),
                    LogicalOperator::And if !left.is_truthy() => Ok(left),
                    _ => self.evaluate(right),
                }
            }
            Expression::Binary(left, op, span, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(*op, left, right).map_err(|kind| ExecutionError::at(kind, *span))
            }
            Expression::Call {
                callee,
                paren,
                args,
            } => {
                let callee = self.evaluate(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>, _>>()?;

                let Value::Callable(callable) = callee else {
                    return Err(ExecutionError::at(
                        ExecutionErrorKind::NotCallable(callee),
                        *paren,
                    ));
                };

                if args.len() != callable.arity() {
                    return Err(ExecutionError::at(
                        ExecutionErrorKind::InvalidArity {
                            callee: callable.name().to_string(),
                            expected: callable.arity(),
                            got: args.len(),
                        },
                        *paren,
                    ));
                }

                callable.call(self, args, *paren)
            }
            Expression::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, &name.name).ok_or_else(|| {
                    ExecutionError::at(
                        ExecutionErrorKind::UndefinedProperty(name.name.clone()),
                        name.span,
                    )
                }),
                value => Err(ExecutionError::at(
                    ExecutionErrorKind::GetOnNonInstance(value),
                    name.span,
                )),
            },
            Expression::Set {
                object,
                name,
                value,
            } => {
                let instance = match self.evaluate(object)? {
                    Value::Instance(instance) => instance,
                    object => {
                        return Err(ExecutionError::at(
                            ExecutionErrorKind::SetOnNonInstance(object),
                            name.span,
                        ))
                    }
                };
                let value = self.evaluate(value)?;
                instance.borrow_mut().set(&name.name, value.clone());
                Ok(value)
            }
            Expression::This { id, span } => self.look_up_variable(
                *id,
                &Identifier {
                    name: "this".to_string(),
                    span: *span,
                },
            ),
            Expression::Super { id, span, method } => {
                let undefined = |name: &str| {
                    ExecutionError::at(ExecutionErrorKind::UndefinedVariable(name.to_string()), *span)
                };
                let distance = *self.locals.get(id).ok_or_else(|| undefined("super"))?;

                let superclass = match Environment::get_at(&self.environment, distance, "super") {
                    Some(Value::Callable(callable)) => match callable.as_ref() {
                        Callable::Class(class) => class.clone(),
                        _ => return Err(undefined("super")),
                    },
                    _ => return Err(undefined("super")),
                };
                let this = match distance
                    .checked_sub(1)
                    .and_then(|d| Environment::get_at(&self.environment, d, "this"))
                {
                    Some(Value::Instance(instance)) => instance,
                    _ => return Err(undefined("this")),
                };

                let method = superclass.find_method(&method.name).ok_or_else(|| {
                    ExecutionError::at(
                        ExecutionErrorKind::UndefinedProperty(method.name.clone()),
                        method.span,
                    )
                })?;
                Ok(Value::Callable(Rc::new(Callable::Function(
                    method.bind(&this),
                ))))
            }
        }
    }
}

fn not_a_class(value: Value, expression: &Expression) -> ExecutionError {
    let span = match expression {
        Expression::Variable { name, .. } => name.span,
        _ => Span::default(),
    };
    ExecutionError::at(ExecutionErrorKind::NotAClass(value), span)
}

fn binary(op: InfixOperator, left: Value, right: Value) -> Result<Value, ExecutionErrorKind> {
    match op {
        InfixOperator::Equal => Ok(Value::Boolean(left == right)),
        InfixOperator::NotEqual => Ok(Value::Boolean(left != right)),
        InfixOperator::LessThan => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Boolean(a < b)),
            (a, b) => Err(ExecutionErrorKind::InvalidLess(a, b)),
        },
        InfixOperator::LessThanOrEqual => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Boolean(a <= b)),
            (a, b) => Err(ExecutionErrorKind::InvalidLessEqual(a, b)),
        },
        InfixOperator::GreaterThan => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Boolean(a > b)),
            (a, b) => Err(ExecutionErrorKind::InvalidGreater(a, b)),
        },
        InfixOperator::GreaterThanOrEqual => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Boolean(a >= b)),
            (a, b) => Err(ExecutionErrorKind::InvalidGreaterEqual(a, b)),
        },
        InfixOperator::Plus => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (a, b) => Err(ExecutionErrorKind::InvalidAdd(a, b)),
        },
        InfixOperator::Minus => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
            (a, b) => Err(ExecutionErrorKind::InvalidSub(a, b)),
        },
        InfixOperator::Multiply => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
            (a, b) => Err(ExecutionErrorKind::InvalidMult(a, b)),
        },
        InfixOperator::Divide => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
            (a, b) => Err(ExecutionErrorKind::InvalidDiv(a, b)),
        },
    }
}
