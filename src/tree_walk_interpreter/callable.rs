use std::{cell::RefCell, fmt::Display, rc::Rc};

use crate::{ast::FunctionDecl, span::Span};

use super::{
    environment::Environment, Class, Completion, ExecutionError, ExecutionErrorKind, Instance,
    Interpreter, Value,
};

#[derive(Clone)]
pub struct CallableFunction {
    pub closure: Rc<RefCell<Environment>>,
    pub decl: Rc<FunctionDecl>,
    pub is_initializer: bool,
}

impl std::fmt::Debug for CallableFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableFunction")
            .field("closure", &self.closure.as_ptr())
            .field("name", &self.decl.name.name)
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}

impl CallableFunction {
    /// Wraps the closure in a frame where `this` is `instance`.
    pub fn bind(&self, instance: &Rc<RefCell<Instance>>) -> Self {
        let closure = Environment::boxed(Some(self.closure.clone()));
        closure
            .borrow_mut()
            .define("this", Value::Instance(instance.clone()));
        Self {
            closure,
            decl: self.decl.clone(),
            is_initializer: self.is_initializer,
        }
    }

    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        paren: Span,
    ) -> Result<Value, ExecutionError> {
        tracing::trace!(function = %self.decl.name, args = args.len(), "call");

        let environment = Environment::boxed(Some(self.closure.clone()));
        for (param, arg) in self.decl.params.iter().zip(args) {
            environment.borrow_mut().define(param.name.clone(), arg);
        }

        let completion = interpreter.execute_call(paren, |interpreter| {
            interpreter.execute_block(&self.decl.body, environment)
        })?;
        if self.is_initializer {
            return Ok(Environment::get_at(&self.closure, 0, "this").unwrap_or(Value::Nil));
        }

        match completion {
            Completion::Return(value) => Ok(value),
            Completion::Normal => Ok(Value::Nil),
        }
    }
}

pub type NativeFn = fn(&mut Interpreter, &[Value]) -> Result<Value, ExecutionErrorKind>;

/// A host-provided function, reachable under both of its names.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub alias: &'static str,
    pub arity: usize,
    pub function: NativeFn,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Callable {
    Function(CallableFunction),
    Native(NativeFunction),
    Class(Rc<Class>),
}

impl Callable {
    /// Invokes the callable with already evaluated arguments. Arity has been
    /// checked by the caller. Errors raised by natives and call depth
    /// overflows are attributed to `paren`.
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        paren: Span,
    ) -> Result<Value, ExecutionError> {
        match self {
            Callable::Function(function) => function.call(interpreter, args, paren),
            Callable::Native(native) => {
                tracing::trace!(function = native.name, "native call");
                (native.function)(interpreter, &args).map_err(|kind| ExecutionError::at(kind, paren))
            }
            Callable::Class(class) => {
                tracing::trace!(class = %class.name, "construct instance");
                let instance = Rc::new(RefCell::new(Instance::new(class.clone())));
                if let Some(init) = class.find_method("init") {
                    init.bind(&instance).call(interpreter, args, paren)?;
                }
                Ok(Value::Instance(instance))
            }
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(function) => function.arity(),
            Callable::Native(native) => native.arity,
            Callable::Class(class) => class.arity(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Callable::Function(function) => &function.decl.name.name,
            Callable::Native(native) => native.name,
            Callable::Class(class) => &class.name,
        }
    }
}

impl Display for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Function(function) => write!(f, "<fn {}>", function.decl.name),
            Callable::Native(native) => write!(f, "<native fn {}>", native.name),
            Callable::Class(class) => write!(f, "{}", class),
        }
    }
}
