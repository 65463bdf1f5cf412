use std::{
    fmt::Display,
    rc::Rc,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::span::Span;

#[derive(Debug, Clone)]
pub struct Program(pub Vec<Statement>);

/// Identity of a variable-like expression, used to key resolved scope
/// depths. Ids are unique for the life of the process so annotations from
/// separate parses never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

impl ExprId {
    pub fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Expression(Expression),
    Print(Expression),
    VarDeclaration(Identifier, Option<Expression>),
    Block(Vec<Statement>),
    If(Expression, Box<Statement>, Option<Box<Statement>>),
    While(Expression, Box<Statement>),
    FunctionDeclaration(Rc<FunctionDecl>),
    Return(Span, Option<Expression>),
    ClassDeclaration(ClassDecl),
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Identifier,
    pub params: Vec<Identifier>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Identifier,
    /// Always an `Expression::Variable` when present.
    pub superclass: Option<Expression>,
    pub methods: Vec<Rc<FunctionDecl>>,
}

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Literal),
    Grouping(Box<Expression>),
    Unary(UnaryOperator, Span, Box<Expression>),
    Binary(Box<Expression>, InfixOperator, Span, Box<Expression>),
    Logical(Box<Expression>, LogicalOperator, Box<Expression>),
    Variable {
        id: ExprId,
        name: Identifier,
    },
    Assign {
        id: ExprId,
        name: Identifier,
        value: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        paren: Span,
        args: Vec<Expression>,
    },
    Get {
        object: Box<Expression>,
        name: Identifier,
    },
    Set {
        object: Box<Expression>,
        name: Identifier,
        value: Box<Expression>,
    },
    This {
        id: ExprId,
        span: Span,
    },
    Super {
        id: ExprId,
        span: Span,
        method: Identifier,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InfixOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

fn write_block(f: &mut std::fmt::Formatter<'_>, statements: &[Statement]) -> std::fmt::Result {
    write!(f, "(block")?;
    for statement in statements {
        write!(f, " {}", statement)?;
    }
    write!(f, ")")
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Expression(expr) => write!(f, "(; {})", expr),
            Statement::Print(expr) => write!(f, "(print {})", expr),
            Statement::VarDeclaration(name, Some(expr)) => write!(f, "(var {} = {})", name, expr),
            Statement::VarDeclaration(name, None) => write!(f, "(var {})", name),
            Statement::Block(statements) => write_block(f, statements),
            Statement::If(condition, then_branch, else_branch) => {
                write!(f, "(if {} {}", condition, then_branch)?;
                if let Some(else_branch) = else_branch {
                    write!(f, " {}", else_branch)?;
                }
                write!(f, ")")
            }
            Statement::While(condition, body) => write!(f, "(while {} {})", condition, body),
            Statement::FunctionDeclaration(decl) => write!(f, "(fun {})", decl),
            Statement::Return(_, Some(expr)) => write!(f, "(return {})", expr),
            Statement::Return(_, None) => write!(f, "(return)"),
            Statement::ClassDeclaration(decl) => {
                write!(f, "(class {}", decl.name)?;
                if let Some(superclass) = &decl.superclass {
                    write!(f, " < {}", superclass)?;
                }
                for method in &decl.methods {
                    write!(f, " {}", method)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Display for FunctionDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") ")?;
        write_block(f, &self.body)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::Grouping(expr) => write!(f, "(group {})", expr),
            Expression::Unary(op, _, right) => write!(f, "({} {})", op, right),
            Expression::Binary(left, op, _, right) => write!(f, "({} {} {})", op, left, right),
            Expression::Logical(left, op, right) => write!(f, "({} {} {})", op, left, right),
            Expression::Variable { name, .. } => write!(f, "{}", name),
            Expression::Assign { name, value, .. } => write!(f, "(= {} {})", name, value),
            Expression::Call { callee, args, .. } => {
                write!(f, "(call {}", callee)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Expression::Get { object, name } => write!(f, "(. {} {})", object, name),
            Expression::Set {
                object,
                name,
                value,
            } => write!(f, "(= (. {} {}) {})", object, name, value),
            Expression::This { .. } => write!(f, "this"),
            Expression::Super { method, .. } => write!(f, "(super {})", method),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "\"{}\"", s),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Nil => write!(f, "nil"),
        }
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Equal => write!(f, "=="),
            InfixOperator::NotEqual => write!(f, "!="),
            InfixOperator::LessThan => write!(f, "<"),
            InfixOperator::LessThanOrEqual => write!(f, "<="),
            InfixOperator::GreaterThan => write!(f, ">"),
            InfixOperator::GreaterThanOrEqual => write!(f, ">="),
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
        }
    }
}

impl Display for LogicalOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "and"),
            LogicalOperator::Or => write!(f, "or"),
        }
    }
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Not => write!(f, "!"),
        }
    }
}
