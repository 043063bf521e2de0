use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::info;
use memmap2::Mmap;

use loxide::ast::Stmt;
use loxide::ast_printer::AstPrinter;
use loxide::error::LoxError;
use loxide::interpreter::Interpreter;
use loxide::parser::Parser;
use loxide::resolver::Resolver;
use loxide::scanner::Scanner;
use loxide::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking Lox interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes a file, printing each token
    Tokenize { filename: PathBuf },

    /// Parses a file and prints its syntax tree
    Parse {
        filename: PathBuf,

        /// Emit the statement list as JSON instead of prefix form
        #[arg(long)]
        json: bool,
    },

    /// Evaluates a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs a file as a program
    Run { filename: PathBuf },
}

/// Script bytes, memory-mapped when possible. Mapping a zero-length file is
/// an error on most platforms, so empty scripts fall back to an owned
/// buffer.
enum Source {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Source {
    fn bytes(&self) -> &[u8] {
        match self {
            Source::Mapped(map) => map,
            Source::Owned(buf) => buf,
        }
    }
}

fn read_file(filename: &Path) -> Result<Source> {
    info!("reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let len = file
        .metadata()
        .context(format!("Failed to stat file {:?}", filename))?
        .len();

    if len == 0 {
        return Ok(Source::Owned(Vec::new()));
    }

    let map = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    info!("mapped {} bytes from {:?}", map.len(), filename);

    Ok(Source::Mapped(map))
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Log records carry the module path and source line, with the crate
    // prefix stripped for brevity.
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("loxide::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // override with RUST_LOG
        .init();

    info!("logger initialized, writing to app.log");

    Ok(())
}

fn report(errors: &[LoxError]) -> bool {
    for error in errors {
        eprintln!("{}", error);
    }

    !errors.is_empty()
}

fn tokenize(filename: &Path) -> Result<()> {
    let source = read_file(filename)?;
    let scanner = Scanner::new(source.bytes());
    let mut had_error = false;

    for item in scanner {
        match item {
            Ok(token) => println!("{}", token),
            Err(e) => {
                had_error = true;
                eprintln!("{}", e);
            }
        }
    }

    if had_error {
        exit(65);
    }

    Ok(())
}

fn parse(filename: &Path, json: bool) -> Result<()> {
    let source = read_file(filename)?;
    let (tokens, scan_errors) = Scanner::new(source.bytes()).scan();

    let mut parser = Parser::new(&tokens);
    let (statements, parse_errors) = parser.parse();

    let had_error = report(&scan_errors) | report(&parse_errors);
    if had_error {
        exit(65);
    }

    if json {
        let rendered =
            serde_json::to_string_pretty(&statements).context("Failed to serialize syntax tree")?;
        println!("{}", rendered);
    } else {
        for stmt in &statements {
            println!("{}", AstPrinter::print_stmt(stmt));
        }
    }

    Ok(())
}

fn evaluate(filename: &Path) -> Result<()> {
    let source = read_file(filename)?;
    let (tokens, scan_errors) = Scanner::new(source.bytes()).scan();

    if report(&scan_errors) {
        exit(65);
    }

    let mut parser = Parser::new(&tokens);

    match parser.parse_expression() {
        Ok(expr) => {
            let mut stdout = io::stdout();
            let mut interpreter = Interpreter::new(&mut stdout);

            match interpreter.evaluate(&expr) {
                Ok(value) => println!("{}", value),
                Err(e) => {
                    eprintln!("{}", e);
                    exit(70);
                }
            }
        }

        Err(e) => {
            eprintln!("{}", e);
            exit(65);
        }
    }

    Ok(())
}

fn run_file(filename: &Path) -> Result<()> {
    let source = read_file(filename)?;
    let (tokens, scan_errors) = Scanner::new(source.bytes()).scan();

    let mut parser = Parser::new(&tokens);
    let (statements, parse_errors) = parser.parse();

    let (locals, resolve_errors) = Resolver::new().resolve(&statements);

    // All static diagnostics in one run, then evaluation is suppressed.
    let had_error = report(&scan_errors) | report(&parse_errors) | report(&resolve_errors);
    if had_error {
        exit(65);
    }

    info!("executing {} statement(s)", statements.len());

    let mut stdout = io::stdout();
    let mut interpreter = Interpreter::new(&mut stdout);

    if let Err(e) = interpreter.interpret(&statements, locals) {
        eprintln!("{}", e);
        exit(70);
    }

    Ok(())
}

fn run_prompt() -> Result<()> {
    let mut stdout = io::stdout();
    let mut interpreter = Interpreter::new(&mut stdout);

    loop {
        print!(">>> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break; // EOF
        }

        if line.trim().is_empty() {
            continue;
        }

        // The interpreter outlives this line: closures defined here may be
        // called later, holding references into this line's tokens and AST,
        // so the buffers live for the rest of the session.
        let src: &'static str = Box::leak(line.into_boxed_str());

        let (tokens, scan_errors) = Scanner::new(src.as_bytes()).scan();
        let tokens: &'static [Token<'static>] = Vec::leak(tokens);

        let mut parser = Parser::new(tokens);
        let (statements, parse_errors) = parser.parse();
        let statements: &'static [Stmt<'static>] = Vec::leak(statements);

        let (locals, resolve_errors) = Resolver::new().resolve(statements);

        // Static errors do not kill the session; the next line starts clean.
        let had_error =
            report(&scan_errors) | report(&parse_errors) | report(&resolve_errors);
        if had_error {
            continue;
        }

        if let Err(e) = interpreter.interpret(statements, locals) {
            eprintln!("{}", e);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize the logger only when --log is given; otherwise install a
    // disabled logger so log macros have a sink.
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.command {
        Some(Commands::Tokenize { filename }) => tokenize(&filename),
        Some(Commands::Parse { filename, json }) => parse(&filename, json),
        Some(Commands::Evaluate { filename }) => evaluate(&filename),
        Some(Commands::Run { filename }) => run_file(&filename),
        None => run_prompt(),
    }
}
