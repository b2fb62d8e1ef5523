use clap::{Parser as ClapParser, Subcommand};
use fig_lang::{
    cli::{self, Action, CheckOptions, CheckResult, CliError},
    output::render,
};
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(ClapParser)]
#[command(name = "fig")]
#[command(about = "Fig - A configuration language with expressions, variables and structural macros")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Import the process environment as @variables
    #[arg(long, global = true)]
    env: bool,

    /// Define an @variable (repeatable)
    #[arg(short = 'D', value_name = "NAME=VALUE", global = true)]
    define: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and expand a document
    Check {
        /// Document file, or '-' for stdin
        file: String,
    },

    /// Print the value of one option
    Get {
        /// Document file, or '-' for stdin
        file: String,

        /// Path segments (or a single dotted path)
        #[arg(required = true)]
        path: Vec<String>,
    },

    /// Print the whole document as JSON
    Dump {
        /// Document file, or '-' for stdin
        file: String,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let (file, action, pretty) = match cli.command {
        Commands::Check { file } => (file, Action::Validate, false),
        Commands::Get { file, path } => (file, Action::Get(path), false),
        Commands::Dump { file, pretty } => (file, Action::Dump, pretty),
    };

    if let Err(e) = run(&file, action, pretty, cli.env, cli.define) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn read_input(file: &str) -> Result<(String, Option<PathBuf>), CliError> {
    if file != "-" {
        let input = fs::read_to_string(file)?;
        return Ok((input, Path::new(file).parent().map(Path::to_path_buf)));
    }
    if atty::is(atty::Stream::Stdin) {
        return Err(CliError::NoInput);
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok((buffer, None))
}

fn run(
    file: &str,
    action: Action,
    pretty: bool,
    import_env: bool,
    defines: Vec<String>,
) -> Result<(), CliError> {
    let (input, base_dir) = read_input(file)?;

    let options = CheckOptions {
        input,
        base_dir,
        defines,
        import_env,
        action,
    };

    match cli::execute_check(&options)? {
        CheckResult::Valid => println!("Document is valid"),
        CheckResult::Value(value) => println!("{}", value),
        CheckResult::Json(json) => println!("{}", render(&json, pretty)),
    }
    Ok(())
}
