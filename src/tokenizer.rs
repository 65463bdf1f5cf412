use std::fmt::Display;

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Single-character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // One or two character tokens
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals
    Identifier(String),
    String(String),
    Number(f64),

    // Keywords
    And,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    // End of file
    Eof,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::LeftBrace => write!(f, "{{"),
            TokenType::RightBrace => write!(f, "}}"),
            TokenType::Comma => write!(f, ","),
            TokenType::Dot => write!(f, "."),
            TokenType::Minus => write!(f, "-"),
            TokenType::Plus => write!(f, "+"),
            TokenType::Semicolon => write!(f, ";"),
            TokenType::Slash => write!(f, "/"),
            TokenType::Star => write!(f, "*"),
            TokenType::Bang => write!(f, "!"),
            TokenType::BangEqual => write!(f, "!="),
            TokenType::Equal => write!(f, "="),
            TokenType::EqualEqual => write!(f, "=="),
            TokenType::Greater => write!(f, ">"),
            TokenType::GreaterEqual => write!(f, ">="),
            TokenType::Less => write!(f, "<"),
            TokenType::LessEqual => write!(f, "<="),
            TokenType::Identifier(name) => write!(f, "{name}"),
            TokenType::String(s) => write!(f, "\"{s}\""),
            TokenType::Number(n) => write!(f, "{n}"),
            TokenType::And => write!(f, "and"),
            TokenType::Class => write!(f, "class"),
            TokenType::Else => write!(f, "else"),
            TokenType::False => write!(f, "false"),
            TokenType::Fun => write!(f, "fun"),
            TokenType::For => write!(f, "for"),
            TokenType::If => write!(f, "if"),
            TokenType::Nil => write!(f, "nil"),
            TokenType::Or => write!(f, "or"),
            TokenType::Print => write!(f, "print"),
            TokenType::Return => write!(f, "return"),
            TokenType::Super => write!(f, "super"),
            TokenType::This => write!(f, "this"),
            TokenType::True => write!(f, "true"),
            TokenType::Var => write!(f, "var"),
            TokenType::While => write!(f, "while"),
            TokenType::Eof => write!(f, "end of file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    pub fn line(&self) -> usize {
        self.span.start_line
    }
}

/// Maps both surface spellings of every keyword onto one kind.
fn keyword(text: &str) -> Option<TokenType> {
    let token_type = match text {
        "and" | "그리고" => TokenType::And,
        "class" | "클래스" => TokenType::Class,
        "else" | "아니면" => TokenType::Else,
        "false" | "거짓" => TokenType::False,
        "for" | "반복" => TokenType::For,
        "fun" | "함수" => TokenType::Fun,
        "if" | "만약" => TokenType::If,
        "nil" | "널" => TokenType::Nil,
        "or" | "또는" => TokenType::Or,
        "print" | "출력" => TokenType::Print,
        "return" | "반환" => TokenType::Return,
        "super" | "상위" => TokenType::Super,
        "this" | "자신" => TokenType::This,
        "true" | "참" => TokenType::True,
        "var" | "변수" => TokenType::Var,
        "while" | "하는동안" => TokenType::While,
        _ => return None,
    };
    Some(token_type)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenizeErrorKind {
    #[error("Unexpected character '{0}'.")]
    UnexpectedCharacter(char),
    #[error("Unterminated string.")]
    UnterminatedString,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[line {}] Error: {kind}", .span.start_line)]
pub struct TokenizeError {
    pub kind: TokenizeErrorKind,
    pub span: Span,
}

#[derive(Debug)]
pub struct TokenizeErrors(pub Vec<TokenizeError>);

impl std::error::Error for TokenizeErrors {}

impl Display for TokenizeErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for error in &self.0 {
            writeln!(f, "{}", error)?;
        }
        Ok(())
    }
}

/// Produces tokens one at a time. Errors do not stop the tokenizer: the
/// offending text is skipped and the next call carries on after it.
pub struct Tokenizer<'a> {
    rest: &'a str,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            rest: source,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    pub fn token(&mut self) -> Result<Token, TokenizeError> {
        while let Some(((), rest)) = maximal(&[whitespace, comment], self.rest) {
            self.advance_to(rest);
        }

        let start = Span::point(self.line, self.column);

        if self.rest.is_empty() {
            self.finished = true;
            return Ok(Token {
                token_type: TokenType::Eof,
                lexeme: String::new(),
                span: start,
            });
        }

        let source = self.rest;
        match maximal(
            &[
                // Single-character tokens
                left_paren,
                right_paren,
                left_brace,
                right_brace,
                comma,
                dot,
                minus,
                plus,
                semicolon,
                slash,
                star,
                // one or two character tokens
                bang,
                bang_equal,
                equal,
                equal_equal,
                greater,
                greater_equal,
                less,
                less_equal,
                // literals and keywords
                identifier,
                string,
                number,
            ],
            source,
        ) {
            Some((token_type, rest)) => {
                let lexeme = source[..source.len() - rest.len()].to_string();
                self.advance_to(rest);
                Ok(Token {
                    token_type,
                    lexeme,
                    span: start + self.end_point(),
                })
            }
            None if source.starts_with('"') => {
                self.advance_to("");
                Err(TokenizeError {
                    kind: TokenizeErrorKind::UnterminatedString,
                    span: start + self.end_point(),
                })
            }
            None => {
                let mut chars = source.chars();
                let c = chars.next().unwrap_or_default();
                self.advance_to(chars.as_str());
                Err(TokenizeError {
                    kind: TokenizeErrorKind::UnexpectedCharacter(c),
                    span: start,
                })
            }
        }
    }

    fn advance_to(&mut self, rest: &'a str) {
        let consumed = &self.rest[..self.rest.len() - rest.len()];
        for c in consumed.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.rest = rest;
    }

    fn end_point(&self) -> Span {
        Span::point(self.line, self.column.saturating_sub(1).max(1))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token, TokenizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            None
        } else {
            Some(self.token())
        }
    }
}

/// Tokenizes the whole source, collecting every lexical error instead of
/// stopping at the first one. The token list always ends with `Eof`.
pub fn scan(source: &str) -> (Vec<Token>, Vec<TokenizeError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for result in Tokenizer::new(source) {
        match result {
            Ok(token) => tokens.push(token),
            Err(error) => errors.push(error),
        }
    }

    (tokens, errors)
}

pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeErrors> {
    let (tokens, errors) = scan(source);
    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(TokenizeErrors(errors))
    }
}

fn maximal<'a, T: std::fmt::Debug>(
    parsers: &[fn(&str) -> Option<(T, &str)>],
    source: &'a str,
) -> Option<(T, &'a str)> {
    let mut min_left = source.len() + 1;
    let mut max_match = None;

    let matching_parsers = parsers.iter().filter_map(|parser| parser(source));
    for (m, rest) in matching_parsers {
        let left = rest.len();
        if left < min_left {
            min_left = left;
            max_match = Some((m, rest));
        }
    }

    max_match
}

fn whitespace(source: &str) -> Option<((), &str)> {
    let len = source
        .chars()
        .take_while(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
        .map(char::len_utf8)
        .sum::<usize>();
    if len > 0 {
        Some(((), &source[len..]))
    } else {
        None
    }
}

fn comment(source: &str) -> Option<((), &str)> {
    if source.starts_with("//") {
        let len = source
            .chars()
            .take_while(|c| *c != '\n')
            .map(char::len_utf8)
            .sum::<usize>();
        Some(((), &source[len..]))
    } else {
        None
    }
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            if source.starts_with($word) {
                Some(($token, &source[$word.len()..]))
            } else {
                None
            }
        }
    };
}

match_literal! { left_paren, "(", TokenType::LeftParen }
match_literal! { right_paren, ")", TokenType::RightParen }
match_literal! { left_brace, "{", TokenType::LeftBrace }
match_literal! { right_brace, "}", TokenType::RightBrace }
match_literal! { comma, ",", TokenType::Comma }
match_literal! { dot, ".", TokenType::Dot }
match_literal! { minus, "-", TokenType::Minus }
match_literal! { plus, "+", TokenType::Plus }
match_literal! { semicolon, ";", TokenType::Semicolon }
match_literal! { slash, "/", TokenType::Slash }
match_literal! { star, "*", TokenType::Star }
match_literal! { bang, "!", TokenType::Bang }
match_literal! { equal, "=", TokenType::Equal }
match_literal! { greater, ">", TokenType::Greater }
match_literal! { less, "<", TokenType::Less }
match_literal! { bang_equal, "!=", TokenType::BangEqual }
match_literal! { equal_equal, "==", TokenType::EqualEqual }
match_literal! { greater_equal, ">=", TokenType::GreaterEqual }
match_literal! { less_equal, "<=", TokenType::LessEqual }

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || ('가'..='힣').contains(&c)
}

fn identifier(source: &str) -> Option<(TokenType, &str)> {
    let mut chars = source.chars();

    let first = chars.next()?;
    if !is_alpha(first) {
        return None;
    }

    let len = first.len_utf8()
        + chars
            .take_while(|c| is_alpha(*c) || c.is_ascii_digit())
            .map(char::len_utf8)
            .sum::<usize>();

    let text = &source[..len];
    let token_type = keyword(text).unwrap_or_else(|| TokenType::Identifier(text.to_string()));
    Some((token_type, &source[len..]))
}

fn string(source: &str) -> Option<(TokenType, &str)> {
    let body = source.strip_prefix('"')?;
    let end = body.find('"')?;
    Some((
        TokenType::String(body[..end].to_string()),
        &body[end + 1..],
    ))
}

fn number(source: &str) -> Option<(TokenType, &str)> {
    let digits = |s: &str| s.chars().take_while(char::is_ascii_digit).count();

    let mut len = digits(source);
    if len == 0 {
        return None;
    }

    if let Some(fraction) = source[len..].strip_prefix('.') {
        let fraction_len = digits(fraction);
        if fraction_len > 0 {
            len += 1 + fraction_len;
        }
    }

    let value = source[..len].parse().ok()?;
    Some((TokenType::Number(value), &source[len..]))
}
