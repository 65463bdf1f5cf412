use std::fmt::Display;

use tracing::debug;

use crate::{
    ast::Program,
    parser::{self, ParseErrorWithContext, ParseErrors},
    resolver::ResolveErrors,
    tokenizer::{self, TokenizeError},
    tree_walk_interpreter::{ExecutionError, Interpreter},
};

/// Every lexical and grammatical error found in one source text.
#[derive(Debug)]
pub struct SyntaxErrors {
    pub tokenize: Vec<TokenizeError>,
    pub parse: Vec<ParseErrorWithContext>,
}

impl SyntaxErrors {
    pub fn len(&self) -> usize {
        self.tokenize.len() + self.parse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::error::Error for SyntaxErrors {}

/// Errors are listed in source order, lexical errors first within a line.
impl Display for SyntaxErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut lines: Vec<(usize, String)> = self
            .tokenize
            .iter()
            .map(|e| (e.span.start_line, e.to_string()))
            .chain(
                self.parse
                    .iter()
                    .map(|e| (e.line().unwrap_or(usize::MAX), e.to_string())),
            )
            .collect();
        lines.sort_by_key(|(line, _)| *line);

        for (_, message) in lines {
            writeln!(f, "{}", message)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error(transparent)]
    Syntax(#[from] SyntaxErrors),
    #[error(transparent)]
    Resolve(#[from] ResolveErrors),
    #[error(transparent)]
    Runtime(#[from] ExecutionError),
}

impl InterpretError {
    /// Conventional sysexits status: 65 for bad input, 70 for a failure while
    /// running.
    pub fn exit_code(&self) -> i32 {
        match self {
            InterpretError::Syntax(_) | InterpretError::Resolve(_) => 65,
            InterpretError::Runtime(_) => 70,
        }
    }
}

/// Tokenizes and parses `source`, collecting errors from both stages.
pub fn parse(source: &str) -> Result<Program, SyntaxErrors> {
    let (tokens, tokenize) = tokenizer::scan(source);
    debug!(tokens = tokens.len(), errors = tokenize.len(), "tokenized");

    let parse = match parser::program(&tokens) {
        Ok(program) if tokenize.is_empty() => {
            debug!(statements = program.0.len(), "parsed");
            return Ok(program);
        }
        Ok(_) => vec![],
        Err(ParseErrors(errors)) => errors,
    };

    debug!(tokenize = tokenize.len(), parse = parse.len(), "syntax errors");
    Err(SyntaxErrors { tokenize, parse })
}

/// Runs one unit of source on `interpreter`. Nothing is executed unless the
/// whole unit tokenizes, parses and resolves cleanly. Globals defined by
/// earlier units stay visible.
pub fn run(interpreter: &mut Interpreter, source: &str) -> Result<(), InterpretError> {
    let program = parse(source)?;
    interpreter.resolve(&program)?;
    interpreter.interpret(&program)?;
    Ok(())
}
