use std::fmt::Display;

use rustc_hash::FxHashMap;

use crate::{
    ast::{ExprId, Expression, FunctionDecl, Identifier, Program, Statement},
    span::Span,
};

/// Scope distance of every locally bound variable, `this` and `super`
/// expression. Expressions missing from the table are globals.
pub type Locals = FxHashMap<ExprId, usize>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum BindingState {
    Declared,
    Defined,
}

#[derive(Debug, Clone, Copy)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Clone, Copy)]
enum ClassType {
    None,
    Class,
    Subclass,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveErrorKind {
    #[error("Can't return from top-level code.")]
    ReturnFromTopLevel,
    #[error("Can't return a value from an initializer.")]
    ReturnValueFromInitializer,
    #[error("Can't use 'this' outside of a class.")]
    ThisOutsideClass,
    #[error("Can't use 'super' outside of a class.")]
    SuperOutsideClass,
    #[error("Can't use 'super' in a class with no superclass.")]
    SuperWithoutSuperclass,
    #[error("A class can't inherit from itself.")]
    SelfInheritance,
    #[error("Can't read local variable in its own initializer.")]
    ReadInOwnInitializer,
    #[error("Already a variable with this name in this scope.")]
    AlreadyDeclared,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[line {}] Error at '{lexeme}': {kind}", .span.start_line)]
pub struct ResolveError {
    pub kind: ResolveErrorKind,
    pub lexeme: String,
    pub span: Span,
}

#[derive(Debug)]
pub struct ResolveErrors(pub Vec<ResolveError>);

impl std::error::Error for ResolveErrors {}

impl Display for ResolveErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for error in &self.0 {
            writeln!(f, "{}", error)?;
        }
        Ok(())
    }
}

pub struct Resolver {
    scopes: Vec<FxHashMap<String, BindingState>>,
    function_type: FunctionType,
    class_type: ClassType,
    locals: Locals,
    errors: Vec<ResolveError>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver {
            scopes: vec![],
            function_type: FunctionType::None,
            class_type: ClassType::None,
            locals: Locals::default(),
            errors: vec![],
        }
    }

    /// Walks the whole program, reporting every scoping error rather than
    /// stopping at the first.
    pub fn resolve(mut self, program: &Program) -> Result<Locals, ResolveErrors> {
        for statement in &program.0 {
            self.resolve_statement(statement);
        }

        if self.errors.is_empty() {
            Ok(self.locals)
        } else {
            Err(ResolveErrors(self.errors))
        }
    }

    fn resolve_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(statements) => {
                self.begin_scope();
                for statement in statements {
                    self.resolve_statement(statement);
                }
                self.end_scope();
            }
            Statement::Expression(expression) | Statement::Print(expression) => {
                self.resolve_expression(expression)
            }
            Statement::VarDeclaration(name, initializer) => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expression(initializer);
                }
                self.define(name);
            }
            Statement::FunctionDeclaration(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }
            Statement::If(condition, then_branch, else_branch) => {
                self.resolve_expression(condition);
                self.resolve_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch);
                }
            }
            Statement::While(condition, body) => {
                self.resolve_expression(condition);
                self.resolve_statement(body);
            }
            Statement::Return(keyword, value) => {
                if matches!(self.function_type, FunctionType::None) {
                    self.error(ResolveErrorKind::ReturnFromTopLevel, "return", *keyword);
                }

                if let Some(value) = value {
                    if matches!(self.function_type, FunctionType::Initializer) {
                        self.error(ResolveErrorKind::ReturnValueFromInitializer, "return", *keyword);
                    }
                    self.resolve_expression(value);
                }
            }
            Statement::ClassDeclaration(class_decl) => {
                let enclosing_class = self.class_type;
                self.class_type = ClassType::Class;

                self.declare(&class_decl.name);
                self.define(&class_decl.name);

                if let Some(superclass) = &class_decl.superclass {
                    if let Expression::Variable { name, .. } = superclass {
                        if name.name == class_decl.name.name {
                            self.error(ResolveErrorKind::SelfInheritance, &name.name, name.span);
                        }
                    }

                    self.class_type = ClassType::Subclass;
                    self.resolve_expression(superclass);

                    self.begin_scope();
                    self.bind_implicit("super");
                }

                self.begin_scope();
                self.bind_implicit("this");

                for method in &class_decl.methods {
                    let function_type = if method.name.name == "init" {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };
                    self.resolve_function(method, function_type);
                }

                self.end_scope();
                if class_decl.superclass.is_some() {
                    self.end_scope();
                }

                self.class_type = enclosing_class;
            }
        }
    }

    fn resolve_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Variable { id, name } => {
                let declared_only = self
                    .scopes
                    .last()
                    .and_then(|scope| scope.get(&name.name))
                    == Some(&BindingState::Declared);
                if declared_only {
                    self.error(ResolveErrorKind::ReadInOwnInitializer, &name.name, name.span);
                }
                self.resolve_local(*id, &name.name);
            }
            Expression::Assign { id, name, value } => {
                self.resolve_expression(value);
                self.resolve_local(*id, &name.name);
            }
            Expression::Literal(_) => {}
            Expression::Grouping(expression) => self.resolve_expression(expression),
            Expression::Binary(left, _, _, right) | Expression::Logical(left, _, right) => {
                self.resolve_expression(left);
                self.resolve_expression(right);
            }
            Expression::Unary(_, _, right) => self.resolve_expression(right),
            Expression::Call { callee, args, .. } => {
                self.resolve_expression(callee);
                for arg in args {
                    self.resolve_expression(arg);
                }
            }
            Expression::Get { object, .. } => self.resolve_expression(object),
            Expression::Set { object, value, .. } => {
                self.resolve_expression(value);
                self.resolve_expression(object);
            }
            Expression::This { id, span } => {
                if matches!(self.class_type, ClassType::None) {
                    self.error(ResolveErrorKind::ThisOutsideClass, "this", *span);
                    return;
                }
                self.resolve_local(*id, "this");
            }
            Expression::Super { id, span, .. } => {
                match self.class_type {
                    ClassType::None => {
                        self.error(ResolveErrorKind::SuperOutsideClass, "super", *span)
                    }
                    ClassType::Class => {
                        self.error(ResolveErrorKind::SuperWithoutSuperclass, "super", *span)
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, "super");
            }
        };
    }

    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                self.locals.insert(id, depth);
                return;
            }
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, function_type: FunctionType) {
        let enclosing_function = self.function_type;
        self.function_type = function_type;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        for statement in &decl.body {
            self.resolve_statement(statement);
        }
        self.end_scope();

        self.function_type = enclosing_function;
    }

    fn begin_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Globals are left untracked so they can be redeclared and referenced
    /// before their definition.
    fn declare(&mut self, name: &Identifier) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope
            .insert(name.name.clone(), BindingState::Declared)
            .is_some()
        {
            self.error(ResolveErrorKind::AlreadyDeclared, &name.name, name.span);
        }
    }

    fn define(&mut self, name: &Identifier) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.name.clone(), BindingState::Defined);
        }
    }

    fn bind_implicit(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), BindingState::Defined);
        }
    }

    fn error(&mut self, kind: ResolveErrorKind, lexeme: &str, span: Span) {
        self.errors.push(ResolveError {
            kind,
            lexeme: lexeme.to_string(),
            span,
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{parser, tokenizer};

    fn parse(source: &str) -> Program {
        parser::program(&tokenizer::tokens(source).unwrap()).unwrap()
    }

    fn errors(source: &str) -> Vec<ResolveErrorKind> {
        Resolver::new()
            .resolve(&parse(source))
            .unwrap_err()
            .0
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }

    /// Depths of every variable read, in source order, `None` for globals.
    fn read_depths(source: &str) -> Vec<(String, Option<usize>)> {
        fn collect_statement(statement: &Statement, out: &mut Vec<(ExprId, String)>) {
            match statement {
                Statement::Expression(e) | Statement::Print(e) => collect(e, out),
                Statement::VarDeclaration(_, Some(e)) => collect(e, out),
                Statement::Block(statements) => {
                    statements.iter().for_each(|s| collect_statement(s, out))
                }
                Statement::FunctionDeclaration(decl) => {
                    decl.body.iter().for_each(|s| collect_statement(s, out))
                }
                Statement::Return(_, Some(e)) => collect(e, out),
                _ => {}
            }
        }
        fn collect(expression: &Expression, out: &mut Vec<(ExprId, String)>) {
            match expression {
                Expression::Variable { id, name } => out.push((*id, name.name.clone())),
                Expression::Assign { value, .. } => collect(value, out),
                Expression::Binary(l, _, _, r) => {
                    collect(l, out);
                    collect(r, out);
                }
                _ => {}
            }
        }

        let program = parse(source);
        let locals = Resolver::new().resolve(&program).unwrap();
        let mut reads = vec![];
        program.0.iter().for_each(|s| collect_statement(s, &mut reads));
        reads
            .into_iter()
            .map(|(id, name)| (name, locals.get(&id).copied()))
            .collect()
    }

    #[test]
    fn test_depths() {
        let source = r#"
        var g = 1;
        fun outer(a) {
            var b = 2;
            {
                var c = 3;
                print a + b + c + g;
            }
        }
        "#;
        assert_eq!(
            read_depths(source),
            vec![
                ("a".to_string(), Some(1)),
                ("b".to_string(), Some(1)),
                ("c".to_string(), Some(0)),
                ("g".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_return_from_top_level() {
        assert_eq!(errors("return 1;"), vec![ResolveErrorKind::ReturnFromTopLevel]);
    }

    #[test]
    fn test_return_value_from_initializer() {
        assert_eq!(
            errors("class A { init() { return 1; } }"),
            vec![ResolveErrorKind::ReturnValueFromInitializer]
        );
        assert!(Resolver::new()
            .resolve(&parse("class A { init() { return; } }"))
            .is_ok());
    }

    #[test]
    fn test_this_and_super_placement() {
        assert_eq!(errors("print this;"), vec![ResolveErrorKind::ThisOutsideClass]);
        assert_eq!(
            errors("fun f() { super.g(); }"),
            vec![ResolveErrorKind::SuperOutsideClass]
        );
        assert_eq!(
            errors("class A { f() { super.f(); } }"),
            vec![ResolveErrorKind::SuperWithoutSuperclass]
        );
    }

    #[test]
    fn test_self_inheritance() {
        assert_eq!(errors("class A < A {}"), vec![ResolveErrorKind::SelfInheritance]);
    }

    #[test]
    fn test_own_initializer_and_duplicates() {
        assert_eq!(
            errors("{ var x = x; }"),
            vec![ResolveErrorKind::ReadInOwnInitializer]
        );
        assert_eq!(
            errors("{ var a = 1; var a = 2; }"),
            vec![ResolveErrorKind::AlreadyDeclared]
        );
        assert_eq!(
            errors("fun f(a, a) {}"),
            vec![ResolveErrorKind::AlreadyDeclared]
        );
        assert!(Resolver::new()
            .resolve(&parse("var a = 1; var a = 2;"))
            .is_ok());
    }

    #[test]
    fn test_all_errors_are_collected() {
        let errors = Resolver::new()
            .resolve(&parse("return;\nprint this;\n{ var y = y; }"))
            .unwrap_err()
            .0;
        let lines: Vec<_> = errors.iter().map(|e| e.span.start_line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
        assert_eq!(
            errors[2].to_string(),
            "[line 3] Error at 'y': Can't read local variable in its own initializer."
        );
    }
}
