use std::{
    cell::RefCell,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use clap::{Args, Parser, Subcommand};
use hanlox::{pipeline, tokenizer, tree_walk_interpreter::Interpreter};
use tracing_subscriber::EnvFilter;

/// Interpreter for a Lox dialect with Korean keywords.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a script file
    Run(FileArgs),
    /// Start an interactive session (the default)
    Repl,
    /// Print the tokens of a script file
    Tokens(FileArgs),
    /// Print the syntax tree of a script file
    Ast(FileArgs),
}

#[derive(Debug, Args)]
struct FileArgs {
    file: PathBuf,
}

const EXIT_SOFTWARE: i32 = 70;
const EXIT_IO_ERROR: i32 = 74;

/// Room for `MAX_CALL_DEPTH` interpreted calls in an unoptimized build.
const WORKER_STACK_SIZE: usize = 256 * 1024 * 1024;

fn main() {
    install_tracing();
    let args = Cli::parse();

    let worker = std::thread::Builder::new()
        .name("hanlox".to_string())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || match args.command() {
            Command::Repl => repl_command(),
            Command::Run(args) => run_command(args),
            Command::Tokens(args) => tokens_command(args),
            Command::Ast(args) => ast_command(args),
        });

    let code = match worker {
        Ok(handle) => handle.join().unwrap_or(EXIT_SOFTWARE),
        Err(e) => {
            eprintln!("Could not start interpreter thread: {}", e);
            EXIT_SOFTWARE
        }
    };
    std::process::exit(code);
}

/// Diagnostics go to stderr so they never mix with program output.
fn install_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_source(path: &Path) -> Result<String, i32> {
    std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Could not read {}: {}", path.display(), e);
        EXIT_IO_ERROR
    })
}

/// Multi-error reports already end in a newline, single errors do not.
fn report(error: &dyn std::error::Error) {
    eprintln!("{}", error.to_string().trim_end());
}

fn repl_command() -> i32 {
    println!("Welcome to the hanlox REPL!");
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    let stdin: Rc<RefCell<dyn BufRead>> = Rc::new(RefCell::new(BufReader::new(std::io::stdin())));
    let mut interpreter =
        Interpreter::with_io(Rc::new(RefCell::new(std::io::stdout())), stdin.clone());

    let mut input = String::new();
    loop {
        print!("> ");
        if std::io::stdout().flush().is_err() {
            break;
        }

        input.clear();
        match stdin.borrow_mut().read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Could not read input: {}", e);
                return EXIT_IO_ERROR;
            }
        }

        if let Err(e) = pipeline::run(&mut interpreter, input.trim()) {
            report(&e);
        }
    }

    0
}

fn run_command(args: &FileArgs) -> i32 {
    let source = match read_source(&args.file) {
        Ok(source) => source,
        Err(code) => return code,
    };

    let mut interpreter = Interpreter::default();
    match pipeline::run(&mut interpreter, &source) {
        Ok(()) => 0,
        Err(e) => {
            tracing::debug!(exit_code = e.exit_code(), "run failed");
            report(&e);
            e.exit_code()
        }
    }
}

fn tokens_command(args: &FileArgs) -> i32 {
    let source = match read_source(&args.file) {
        Ok(source) => source,
        Err(code) => return code,
    };

    let (tokens, errors) = tokenizer::scan(&source);
    let mut line = 0;
    for token in &tokens {
        if token.line() != line {
            print!("{:4} ", token.line());
            line = token.line();
        } else {
            print!("   | ");
        }
        println!("{:<14} {}", format!("{:?}", token.token_type()), token.lexeme);
    }

    for error in &errors {
        eprintln!("{}", error);
    }
    if errors.is_empty() {
        0
    } else {
        65
    }
}

fn ast_command(args: &FileArgs) -> i32 {
    let source = match read_source(&args.file) {
        Ok(source) => source,
        Err(code) => return code,
    };

    match pipeline::parse(&source) {
        Ok(program) => {
            print!("{}", program);
            0
        }
        Err(e) => {
            report(&e);
            65
        }
    }
}
