use anyhow::Context;
use clap::Parser;

use cel_core::{CelEnv, EmptyActivation, Extension};

#[derive(Parser, Debug)]
#[command(author, version, about = "Evaluate a CEL expression")]
struct Cli {
    /// The expression to evaluate.
    expression: String,

    /// Print the checked AST as JSON instead of evaluating.
    #[arg(long)]
    dump_ast: bool,

    /// Print the canonical unparsed form instead of evaluating.
    #[arg(long)]
    unparse: bool,

    /// Apply constant folding and subexpression elimination first.
    #[arg(long)]
    fold: bool,

    /// Log verbosity (-v debug, -vv trace).
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = match args.verbose {
        0 => log::Level::Warn,
        1 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    simple_logger::init_with_level(level).context("logger setup failed")?;

    let env = CelEnv::builder()
        .with_extension(Extension::Strings)
        .with_extension(Extension::Math)
        .with_extension(Extension::Sets)
        .with_extension(Extension::Regex)
        .with_extension(Extension::Optional)
        .build()
        .map_err(anyhow::Error::msg)?;

    let program = if args.fold {
        env.compile_optimized(&args.expression)
    } else {
        env.compile(&args.expression)
    };
    let program = match program {
        Ok(program) => program,
        Err(issues) => {
            log::error!("compilation failed");
            eprintln!("{issues}");
            std::process::exit(1);
        }
    };

    if args.dump_ast {
        let rendered = serde_json::to_string_pretty(program.checked())
            .context("could not serialize AST")?;
        println!("{rendered}");
        return Ok(());
    }

    if args.unparse {
        println!("{}", program.unparse());
        return Ok(());
    }

    match program.eval(&EmptyActivation) {
        Ok(value) => println!("{value}"),
        Err(error) => {
            eprintln!("evaluation failed: {error}");
            std::process::exit(1);
        }
    }

    Ok(())
}
