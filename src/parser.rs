use std::{cell::RefCell, rc::Rc};

use crate::{
    ast::{
        ClassDecl, ExprId, Expression, FunctionDecl, Identifier, InfixOperator, Literal,
        LogicalOperator, Program, Statement, UnaryOperator,
    },
    tokenizer::{Token, TokenType},
};

const MAX_ARGUMENTS: usize = 255;

#[derive(Debug)]
pub struct ParseErrors(pub Vec<ParseErrorWithContext>);

impl std::error::Error for ParseErrors {}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Found {} errors during parsing", self.0.len())?;
        for error in &self.0 {
            writeln!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl From<ParseErrorWithContext> for ParseErrors {
    fn from(error: ParseErrorWithContext) -> Self {
        ParseErrors(vec![error])
    }
}

#[derive(Debug, Clone)]
pub struct ParseErrorWithContext {
    pub error: ParseError,
    context: Vec<&'static str>,
    pub token: Option<Token>,
    /// Number of tokens left (offending token included) where the error was
    /// raised; used to resynchronize from the failure point.
    remaining: usize,
}

impl ParseErrorWithContext {
    pub fn line(&self) -> Option<usize> {
        self.token.as_ref().map(Token::line)
    }
}

impl std::fmt::Display for ParseErrorWithContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.token {
            Some(token) if token.token_type == TokenType::Eof => {
                write!(f, "[line {}] Error at end: {}", token.line(), self.error)?
            }
            Some(token) => write!(
                f,
                "[line {}] Error at '{}': {}",
                token.line(),
                token.lexeme,
                self.error
            )?,
            None => write!(f, "Error: {}", self.error)?,
        }
        write!(f, "\n    while parsing {}", self.context.join(" > "))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Expected \"{0}\"")]
    Expected(TokenType),
    #[error("Expected one of {0:?}")]
    ExpectedOneOf(Vec<TokenType>),
    #[error("Expected expression")]
    ExpectedExpression,
    #[error("Expected identifier")]
    ExpectedIdentifier,
    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("Can't have more than 255 parameters")]
    TooManyParameters,
    #[error("Can't have more than 255 arguments")]
    TooManyArguments,
}

#[derive(Debug)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
    errors: RefCell<Vec<ParseErrorWithContext>>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            stack: RefCell::new(vec![]),
            errors: RefCell::new(vec![]),
        }
    }

    fn push(&self, name: &'static str) -> ParseContextGuard<'_> {
        self.stack.borrow_mut().push(name);
        ParseContextGuard::new(self)
    }

    fn pop(&self) {
        self.stack.borrow_mut().pop();
    }

    fn error(&self, error: ParseError, tokens: &[Token]) -> ParseErrorWithContext {
        ParseErrorWithContext {
            error,
            context: self.stack.borrow().clone(),
            token: tokens.first().cloned(),
            remaining: tokens.len(),
        }
    }

    /// Records an error without unwinding the current rule.
    fn report(&self, error: ParseErrorWithContext) {
        self.errors.borrow_mut().push(error);
    }
}

struct ParseContextGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> ParseContextGuard<'a> {
    fn new(context: &'a ParseContext) -> Self {
        Self { context }
    }
}

impl<'a> Drop for ParseContextGuard<'a> {
    fn drop(&mut self) {
        self.context.pop();
    }
}

type ParseResult<'a, T> = Result<(T, &'a [Token]), ParseErrorWithContext>;

pub fn program(tokens: &[Token]) -> Result<Program, ParseErrors> {
    let context = ParseContext::new();
    let mut statements = Vec::new();
    let mut rest = tokens;

    {
        let _guard = context.push("program");

        while !at_end(rest) {
            match declaration(&context, rest) {
                Ok((stmt, after)) => {
                    statements.push(stmt);
                    rest = after;
                }
                Err(err) => {
                    rest = synchronize(rest, &err, false);
                    context.report(err);
                }
            }
        }
    }

    let errors = context.errors.into_inner();
    if !errors.is_empty() {
        return Err(ParseErrors(errors));
    }

    Ok(Program(statements))
}

fn at_end(tokens: &[Token]) -> bool {
    matches!(
        tokens.first().map(Token::token_type),
        None | Some(TokenType::Eof)
    )
}

fn starts_statement(tokens: &[Token]) -> bool {
    matches!(
        tokens.first().map(Token::token_type),
        Some(
            TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return
        )
    )
}

/// Skips from the point of failure to the next statement boundary: just past
/// a `;`, or right before a token that starts a statement. The offending
/// token is always skipped unless it ends the input (or, inside a block,
/// closes it).
fn synchronize<'a>(
    tokens: &'a [Token],
    error: &ParseErrorWithContext,
    in_block: bool,
) -> &'a [Token] {
    let mut tokens = &tokens[tokens.len().saturating_sub(error.remaining)..];
    let at_boundary = |tokens: &[Token]| {
        at_end(tokens)
            || (in_block && tokens.first().map(Token::token_type) == Some(&TokenType::RightBrace))
    };

    if at_boundary(tokens) {
        return tokens;
    }

    while let Some((token, rest)) = tokens.split_first() {
        tokens = rest;
        if token.token_type == TokenType::Semicolon || at_boundary(tokens) || starts_statement(tokens)
        {
            break;
        }
    }
    tokens
}

fn declaration<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("declaration");
    match tokens.first().map(Token::token_type) {
        Some(TokenType::Class) => class_declaration(context, &tokens[1..]),
        Some(TokenType::Fun) => {
            let (decl, tokens) = function(context, &tokens[1..])?;
            Ok((Statement::FunctionDeclaration(Rc::new(decl)), tokens))
        }
        Some(TokenType::Var) => var_declaration(context, &tokens[1..]),
        _ => statement(context, tokens),
    }
}

fn class_declaration<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> ParseResult<'a, Statement> {
    let _guard = context.push("class_declaration");
    let (name, tokens) = match_identifier(context, tokens)?;

    let (superclass, tokens) = match tokens.first().map(Token::token_type) {
        Some(TokenType::Less) => {
            let (superclass, tokens) = match_identifier(context, &tokens[1..])?;
            (
                Some(Expression::Variable {
                    id: ExprId::next(),
                    name: superclass,
                }),
                tokens,
            )
        }
        _ => (None, tokens),
    };

    let mut tokens = consume(context, tokens, TokenType::LeftBrace)?;
    let mut methods = Vec::new();
    loop {
        match tokens.first().map(Token::token_type) {
            Some(TokenType::RightBrace) => break,
            None | Some(TokenType::Eof) => {
                return Err(context.error(ParseError::Expected(TokenType::RightBrace), tokens))
            }
            _ => {
                let (method, rest) = function(context, tokens)?;
                methods.push(Rc::new(method));
                tokens = rest;
            }
        }
    }

    Ok((
        Statement::ClassDeclaration(ClassDecl {
            name,
            superclass,
            methods,
        }),
        &tokens[1..],
    ))
}

fn function<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, FunctionDecl> {
    let _guard = context.push("function");
    let (name, tokens) = match_identifier(context, tokens)?;
    let mut tokens = consume(context, tokens, TokenType::LeftParen)?;

    let mut params = vec![];
    if tokens.first().map(Token::token_type) != Some(&TokenType::RightParen) {
        loop {
            if params.len() >= MAX_ARGUMENTS {
                context.report(context.error(ParseError::TooManyParameters, tokens));
            }

            let (param, rest) = match_identifier(context, tokens)?;
            params.push(param);
            tokens = rest;

            match tokens.first().map(Token::token_type) {
                Some(TokenType::Comma) => tokens = &tokens[1..],
                _ => break,
            }
        }
    }

    let tokens = consume(context, tokens, TokenType::RightParen)?;
    let tokens = consume(context, tokens, TokenType::LeftBrace)?;
    let (body, tokens) = block(context, tokens)?;
    Ok((FunctionDecl { name, params, body }, tokens))
}

fn var_declaration<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("var_declaration");
    let (name, tokens) = match_identifier(context, tokens)?;
    let (initializer, tokens) = match tokens.first().map(Token::token_type) {
        Some(TokenType::Equal) => {
            let (expr, tokens) = expression(context, &tokens[1..])?;
            (Some(expr), tokens)
        }
        _ => (None, tokens),
    };
    let tokens = consume(context, tokens, TokenType::Semicolon)?;
    Ok((Statement::VarDeclaration(name, initializer), tokens))
}

fn statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("statement");
    match tokens.first().map(Token::token_type) {
        Some(TokenType::Print) => print_statement(context, &tokens[1..]),
        Some(TokenType::LeftBrace) => {
            let (statements, tokens) = block(context, &tokens[1..])?;
            Ok((Statement::Block(statements), tokens))
        }
        Some(TokenType::If) => if_statement(context, &tokens[1..]),
        Some(TokenType::While) => while_statement(context, &tokens[1..]),
        Some(TokenType::For) => for_statement(context, &tokens[1..]),
        Some(TokenType::Return) => return_statement(context, tokens),
        _ => expression_statement(context, tokens),
    }
}

fn while_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("while_statement");
    let tokens = consume(context, tokens, TokenType::LeftParen)?;
    let (condition, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::RightParen)?;
    let (body, tokens) = statement(context, tokens)?;
    Ok((Statement::While(condition, Box::new(body)), tokens))
}

fn if_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("if_statement");
    let tokens = consume(context, tokens, TokenType::LeftParen)?;
    let (condition, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::RightParen)?;
    let (then_branch, tokens) = statement(context, tokens)?;
    if let Some(TokenType::Else) = tokens.first().map(Token::token_type) {
        let (else_branch, tokens) = statement(context, &tokens[1..])?;
        Ok((
            Statement::If(
                condition,
                Box::new(then_branch),
                Some(Box::new(else_branch)),
            ),
            tokens,
        ))
    } else {
        Ok((
            Statement::If(condition, Box::new(then_branch), None),
            tokens,
        ))
    }
}

/// `for` has no node of its own: it becomes a block holding the initializer
/// and a `while` whose body runs the increment last.
fn for_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("for_statement");
    let tokens = consume(context, tokens, TokenType::LeftParen)?;

    let (initializer, tokens) = match tokens.first().map(Token::token_type) {
        Some(TokenType::Semicolon) => (None, &tokens[1..]),
        Some(TokenType::Var) => {
            let (stmt, tokens) = var_declaration(context, &tokens[1..])?;
            (Some(stmt), tokens)
        }
        _ => {
            let (stmt, tokens) = expression_statement(context, tokens)?;
            (Some(stmt), tokens)
        }
    };

    let (condition, tokens) = match tokens.first().map(Token::token_type) {
        Some(TokenType::Semicolon) => (Expression::Literal(Literal::Boolean(true)), tokens),
        _ => expression(context, tokens)?,
    };
    let tokens = consume(context, tokens, TokenType::Semicolon)?;

    let (increment, tokens) = match tokens.first().map(Token::token_type) {
        Some(TokenType::RightParen) => (None, tokens),
        _ => {
            let (expr, tokens) = expression(context, tokens)?;
            (Some(expr), tokens)
        }
    };
    let tokens = consume(context, tokens, TokenType::RightParen)?;

    let (mut body, tokens) = statement(context, tokens)?;

    if let Some(increment) = increment {
        body = Statement::Block(vec![body, Statement::Expression(increment)]);
    }

    let mut statements = Vec::with_capacity(2);
    statements.extend(initializer);
    statements.push(Statement::While(condition, Box::new(body)));

    Ok((Statement::Block(statements), tokens))
}

fn return_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("return_statement");
    let keyword = tokens[0].span;
    let tokens = &tokens[1..];

    let (value, tokens) = match tokens.first().map(Token::token_type) {
        Some(TokenType::Semicolon) => (None, tokens),
        _ => {
            let (expr, tokens) = expression(context, tokens)?;
            (Some(expr), tokens)
        }
    };
    let tokens = consume(context, tokens, TokenType::Semicolon)?;
    Ok((Statement::Return(keyword, value), tokens))
}

/// Parses declarations up to and including the closing `}`. Broken
/// declarations are reported and skipped so the rest of the block is still
/// checked.
fn block<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Vec<Statement>> {
    let _guard = context.push("block");
    let mut statements = Vec::new();
    let mut tokens = tokens;

    loop {
        match tokens.first().map(Token::token_type) {
            Some(TokenType::RightBrace) => return Ok((statements, &tokens[1..])),
            None | Some(TokenType::Eof) => {
                return Err(context.error(ParseError::Expected(TokenType::RightBrace), tokens))
            }
            _ => {}
        }

        match declaration(context, tokens) {
            Ok((stmt, rest)) => {
                statements.push(stmt);
                tokens = rest;
            }
            Err(err) => {
                tokens = synchronize(tokens, &err, true);
                context.report(err);
            }
        }
    }
}

fn expression_statement<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> ParseResult<'a, Statement> {
    let _guard = context.push("expression_statement");
    let (expr, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::Semicolon)?;
    Ok((Statement::Expression(expr), tokens))
}

fn print_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("print_statement");
    let (expr, rest) = expression(context, tokens)?;
    let tokens = consume(context, rest, TokenType::Semicolon)?;
    Ok((Statement::Print(expr), tokens))
}

fn expression<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("expression");
    assignment(context, tokens)
}

/// The target is parsed as an ordinary expression first and only then
/// checked for being assignable, which keeps `a.b.c = x` and `a = b = c`
/// working without lookahead.
fn assignment<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("assignment");
    let (expr, rest) = logical_or(context, tokens)?;

    let Some(TokenType::Equal) = rest.first().map(Token::token_type) else {
        return Ok((expr, rest));
    };

    let (value, after) = assignment(context, &rest[1..])?;
    let value = Box::new(value);
    match expr {
        Expression::Variable { name, .. } => Ok((
            Expression::Assign {
                id: ExprId::next(),
                name,
                value,
            },
            after,
        )),
        Expression::Get { object, name } => Ok((
            Expression::Set {
                object,
                name,
                value,
            },
            after,
        )),
        expr => {
            context.report(context.error(ParseError::InvalidAssignmentTarget, rest));
            Ok((expr, after))
        }
    }
}

fn logical<'a>(
    context: &ParseContext,
    precedence: impl Fn(&ParseContext, &'a [Token]) -> ParseResult<'a, Expression>,
    token_type: TokenType,
    operator: LogicalOperator,
    tokens: &'a [Token],
) -> ParseResult<'a, Expression> {
    let (mut expr, mut tokens) = precedence(context, tokens)?;

    while tokens.first().map(Token::token_type) == Some(&token_type) {
        let (right, rest) = precedence(context, &tokens[1..])?;
        expr = Expression::Logical(Box::new(expr), operator, Box::new(right));
        tokens = rest;
    }

    Ok((expr, tokens))
}

fn logical_or<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("logical_or");
    logical(context, logical_and, TokenType::Or, LogicalOperator::Or, tokens)
}

fn logical_and<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("logical_and");
    logical(context, equality, TokenType::And, LogicalOperator::And, tokens)
}

fn binary<'a>(
    context: &ParseContext,
    precedence: impl Fn(&ParseContext, &'a [Token]) -> ParseResult<'a, Expression>,
    operator: impl Fn(&TokenType) -> Option<InfixOperator>,
    tokens: &'a [Token],
) -> ParseResult<'a, Expression> {
    let (mut expr, mut tokens) = precedence(context, tokens)?;

    while let Some(token) = tokens.first() {
        let op = match operator(token.token_type()) {
            Some(op) => op,
            None => break,
        };
        let (right, rest) = precedence(context, &tokens[1..])?;
        expr = Expression::Binary(Box::new(expr), op, token.span, Box::new(right));
        tokens = rest;
    }

    Ok((expr, tokens))
}

fn equality<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("equality");
    binary(
        context,
        comparison,
        |token_type| match token_type {
            TokenType::EqualEqual => Some(InfixOperator::Equal),
            TokenType::BangEqual => Some(InfixOperator::NotEqual),
            _ => None,
        },
        tokens,
    )
}

fn comparison<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("comparison");
    binary(
        context,
        term,
        |token_type| match token_type {
            TokenType::Less => Some(InfixOperator::LessThan),
            TokenType::LessEqual => Some(InfixOperator::LessThanOrEqual),
            TokenType::Greater => Some(InfixOperator::GreaterThan),
            TokenType::GreaterEqual => Some(InfixOperator::GreaterThanOrEqual),
            _ => None,
        },
        tokens,
    )
}

fn term<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("term");
    binary(
        context,
        factor,
        |token_type| match token_type {
            TokenType::Plus => Some(InfixOperator::Plus),
            TokenType::Minus => Some(InfixOperator::Minus),
            _ => None,
        },
        tokens,
    )
}

fn factor<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("factor");
    binary(
        context,
        unary,
        |token_type| match token_type {
            TokenType::Star => Some(InfixOperator::Multiply),
            TokenType::Slash => Some(InfixOperator::Divide),
            _ => None,
        },
        tokens,
    )
}

fn unary<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("unary");

    let operator = match tokens.first().map(Token::token_type) {
        Some(TokenType::Minus) => UnaryOperator::Negate,
        Some(TokenType::Bang) => UnaryOperator::Not,
        _ => return call(context, tokens),
    };

    let (right, rest) = unary(context, &tokens[1..])?;
    Ok((
        Expression::Unary(operator, tokens[0].span, Box::new(right)),
        rest,
    ))
}

fn call<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("call");
    let (mut expr, mut tokens) = primary(context, tokens)?;

    loop {
        match tokens.first().map(Token::token_type) {
            Some(TokenType::LeftParen) => {
                let (call, rest) = finish_call(context, expr, &tokens[1..])?;
                expr = call;
                tokens = rest;
            }
            Some(TokenType::Dot) => {
                let (name, rest) = match_identifier(context, &tokens[1..])?;
                expr = Expression::Get {
                    object: Box::new(expr),
                    name,
                };
                tokens = rest;
            }
            _ => break,
        }
    }

    Ok((expr, tokens))
}

fn finish_call<'a>(
    context: &ParseContext,
    callee: Expression,
    tokens: &'a [Token],
) -> ParseResult<'a, Expression> {
    let mut tokens = tokens;
    let mut args = Vec::new();

    if tokens.first().map(Token::token_type) != Some(&TokenType::RightParen) {
        loop {
            if args.len() >= MAX_ARGUMENTS {
                context.report(context.error(ParseError::TooManyArguments, tokens));
            }

            let (arg, rest) = expression(context, tokens)?;
            args.push(arg);
            tokens = rest;

            match tokens.first().map(Token::token_type) {
                Some(TokenType::Comma) => tokens = &tokens[1..],
                Some(TokenType::RightParen) => break,
                _ => {
                    return Err(context.error(
                        ParseError::ExpectedOneOf(vec![TokenType::Comma, TokenType::RightParen]),
                        tokens,
                    ))
                }
            }
        }
    }

    let paren = tokens[0].span;
    let tokens = consume(context, tokens, TokenType::RightParen)?;
    Ok((
        Expression::Call {
            callee: Box::new(callee),
            paren,
            args,
        },
        tokens,
    ))
}

fn primary<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("primary");
    let Some(token) = tokens.first() else {
        return Err(context.error(ParseError::ExpectedExpression, tokens));
    };

    let rest = &tokens[1..];
    match token.token_type() {
        TokenType::Number(n) => Ok((Expression::Literal(Literal::Number(*n)), rest)),
        TokenType::String(s) => Ok((Expression::Literal(Literal::String(s.clone())), rest)),
        TokenType::True => Ok((Expression::Literal(Literal::Boolean(true)), rest)),
        TokenType::False => Ok((Expression::Literal(Literal::Boolean(false)), rest)),
        TokenType::Nil => Ok((Expression::Literal(Literal::Nil), rest)),
        TokenType::This => Ok((
            Expression::This {
                id: ExprId::next(),
                span: token.span,
            },
            rest,
        )),
        TokenType::Super => {
            let rest = consume(context, rest, TokenType::Dot)?;
            let (method, rest) = match_identifier(context, rest)?;
            Ok((
                Expression::Super {
                    id: ExprId::next(),
                    span: token.span,
                    method,
                },
                rest,
            ))
        }
        TokenType::LeftParen => {
            let (expr, rest) = expression(context, rest)?;
            let tokens = consume(context, rest, TokenType::RightParen)?;
            Ok((Expression::Grouping(Box::new(expr)), tokens))
        }
        TokenType::Identifier(name) => Ok((
            Expression::Variable {
                id: ExprId::next(),
                name: Identifier {
                    name: name.clone(),
                    span: token.span,
                },
            },
            rest,
        )),
        _ => Err(context.error(ParseError::ExpectedExpression, tokens)),
    }
}

fn consume<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    token_type: TokenType,
) -> Result<&'a [Token], ParseErrorWithContext> {
    match tokens.first().map(Token::token_type) {
        Some(t) if t == &token_type => Ok(&tokens[1..]),
        _ => Err(context.error(ParseError::Expected(token_type), tokens)),
    }
}

fn match_identifier<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Identifier> {
    match tokens.first() {
        Some(Token {
            token_type: TokenType::Identifier(name),
            span,
            ..
        }) => Ok((
            Identifier {
                name: name.clone(),
                span: *span,
            },
            &tokens[1..],
        )),
        _ => Err(context.error(ParseError::ExpectedIdentifier, tokens)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tokenizer::tokens;

    fn parse(source: &str) -> Result<Program, ParseErrors> {
        program(&tokens(source).unwrap())
    }

    fn printed(source: &str) -> String {
        parse(source).unwrap().to_string()
    }

    fn errors(source: &str) -> Vec<ParseError> {
        parse(source)
            .unwrap_err()
            .0
            .into_iter()
            .map(|e| e.error)
            .collect()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(printed("print 1 + 2 * 3;"), "(print (+ 1 (* 2 3)))\n");
        assert_eq!(printed("print -a - b;"), "(print (- (- a) b))\n");
        assert_eq!(
            printed("print a or b and c == d;"),
            "(print (or a (and b (== c d))))\n"
        );
        assert_eq!(printed("print (1 + 2) * 3;"), "(print (* (group (+ 1 2)) 3))\n");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(printed("a = b = 5;"), "(; (= a (= b 5)))\n");
        assert_eq!(printed("a.b.c = x;"), "(; (= (. (. a b) c) x))\n");
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(
            errors("a + 1 = 5;"),
            vec![ParseError::InvalidAssignmentTarget]
        );
    }

    #[test]
    fn test_for_is_desugared() {
        assert_eq!(
            printed("for (var i = 0; i < 3; i = i + 1) print i;"),
            "(block (var i = 0) (while (< i 3) (block (print i) (; (= i (+ i 1))))))\n"
        );
        assert_eq!(printed("for (;;) print 1;"), "(block (while true (print 1)))\n");
    }

    #[test]
    fn test_calls_and_properties() {
        assert_eq!(
            printed("print a.b(1, 2)(c).d;"),
            "(print (. (call (call (. a b) 1 2) c) d))\n"
        );
        assert_eq!(printed("f();"), "(; (call f))\n");
    }

    #[test]
    fn test_class_declaration() {
        assert_eq!(
            printed("class B < A { init(x) { this.x = x; } get() { return super.get(); } }"),
            "(class B < A init(x) (block (; (= (. this x) x))) get() (block (return (call (super get)))))\n"
        );
    }

    #[test]
    fn test_localized_program() {
        assert_eq!(
            printed("함수 더하기(가, 나) { 반환 가 + 나; } 출력 더하기(1, 2);"),
            "(fun 더하기(가 나) (block (return (+ 가 나))))\n(print (call 더하기 1 2))\n"
        );
    }

    #[test]
    fn test_resynchronizes_after_error() {
        let errors = parse("var = 1;\nprint 1 +;\nprint 1 + 1;\nvar x 2;")
            .unwrap_err()
            .0;
        let lines: Vec<_> = errors.iter().filter_map(ParseErrorWithContext::line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
        assert_eq!(errors[0].error, ParseError::ExpectedIdentifier);
        assert_eq!(errors[1].error, ParseError::ExpectedExpression);
        assert_eq!(errors[2].error, ParseError::Expected(TokenType::Semicolon));
    }

    #[test]
    fn test_errors_inside_blocks_are_all_reported() {
        let errors = errors("fun f() { print ; var 1; }\nprint 2;");
        assert_eq!(
            errors,
            vec![ParseError::ExpectedExpression, ParseError::ExpectedIdentifier]
        );
    }

    #[test]
    fn test_missing_closing_brace() {
        assert_eq!(
            errors("{ print 1;"),
            vec![ParseError::Expected(TokenType::RightBrace)]
        );
    }

    #[test]
    fn test_too_many_arguments_is_not_fatal() {
        let args = vec!["1"; 256].join(", ");
        assert_eq!(
            errors(&format!("f({args}); print 1;")),
            vec![ParseError::TooManyArguments]
        );

        let params = (0..256).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ");
        assert_eq!(
            errors(&format!("fun f({params}) {{}}")),
            vec![ParseError::TooManyParameters]
        );
    }

    #[test]
    fn test_error_message_names_the_rule() {
        let message = parse("print 1").unwrap_err().0[0].to_string();
        assert_eq!(
            message,
            "[line 1] Error at end: Expected \";\"\n    while parsing program > declaration > statement > print_statement"
        );
    }
}
