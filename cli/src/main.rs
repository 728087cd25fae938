mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use log::debug;

use interpreter::{LocalSources, ModelInterpreter, Options, RuntimeError};
use xdra::directive::DirectiveKind;
use xdra::parser::ParseError;

const SUBCOMMANDS: &[&str] = &["run", "test", "help"];

#[derive(Parser)]
#[command(name = "xdra", version, about = "Render documents from xdra models")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a model and print the generated document
    Run(RunArgs),

    /// Run .test.xdra conformance files
    Test(TestArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum LocalSourcesArg {
    /// Sources declared in a query are visible inside that query only
    Scoped,
    /// Sources declared in a query are registered globally
    Global,
}

impl From<LocalSourcesArg> for LocalSources {
    fn from(arg: LocalSourcesArg) -> Self {
        match arg {
            LocalSourcesArg::Scoped => LocalSources::Scoped,
            LocalSourcesArg::Global => LocalSources::Global,
        }
    }
}

#[derive(clap::Args)]
struct RunArgs {
    /// Model file to evaluate
    file: String,

    /// Parse only, don't evaluate (exit 0 if the model is valid)
    #[arg(long)]
    check: bool,

    /// Dump the parsed model tree
    #[arg(long)]
    dump_tree: bool,

    /// Don't print the generated document
    #[arg(short, long)]
    quiet: bool,

    /// Ignore the model's output attribute
    #[arg(long)]
    no_write: bool,

    /// Spaces per pass-through nesting level
    #[arg(long, value_name = "N")]
    indent: Option<usize>,

    /// Scoping of sources declared inside a query
    #[arg(long, value_enum, default_value = "scoped")]
    local_sources: LocalSourcesArg,

    /// Log directive evaluation to stderr (also enabled by the DEBUG variable)
    #[arg(long)]
    debug: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.xdra file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `xdra model.xml` is shorthand for `xdra run model.xml`.
    let mut args: Vec<String> = std::env::args().collect();
    let first_pos = args
        .iter()
        .skip(1)
        .position(|a| !a.starts_with('-'))
        .map(|i| i + 1);
    if let Some(pos) = first_pos {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "run".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    match cli.command {
        Command::Run(run_args) => {
            init_logging(run_args.debug);
            do_run(run_args, cli.no_color);
        }
        Command::Test(test_args) => {
            init_logging(false);
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

/// `RUST_LOG` wins; otherwise errors only, or everything with `--debug`/`DEBUG`.
fn init_logging(debug: bool) {
    let default = if debug || std::env::var_os("DEBUG").is_some() {
        "debug"
    } else {
        "error"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn do_run(args: RunArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let model = match xdra::parser::Parser::new(source, file_id).parse() {
        Ok(model) => model,
        Err(error) => {
            let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &error.to_diagnostic());
            process::exit(1);
        }
    };

    if args.check {
        if DirectiveKind::of(&model) != DirectiveKind::Model {
            eprintln!("error: {}", RuntimeError::InvalidRoot(model.name.to_string()));
            process::exit(1);
        }
        eprintln!("ok: {} parsed successfully", args.file);
        return;
    }

    if args.dump_tree {
        println!("{:#?}", model);
        return;
    }

    let base_dir = Path::new(&args.file)
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut options = Options {
        local_sources: args.local_sources.into(),
        base_dir,
        write_output: !args.no_write,
        ..Options::default()
    };
    if let Some(width) = args.indent {
        options.indent = " ".repeat(width);
    }
    debug!("evaluating {} with {:?}", args.file, options);

    match ModelInterpreter::with_options(options).run(&model) {
        Ok(output) if output.is_empty() => {
            eprintln!("no output was generated using the current model");
        }
        Ok(output) => {
            if !args.quiet {
                println!("{}", output);
            }
        }
        Err(error) => {
            emit_runtime_error(&writer, &config, &mut files, &args.file, &error);
            process::exit(1);
        }
    }
}

fn emit_runtime_error(
    writer: &StandardStream,
    config: &term::Config,
    files: &mut SimpleFiles<String, String>,
    model_name: &str,
    error: &RuntimeError,
) {
    match error {
        RuntimeError::ScriptCompile { script, error } => {
            let script_id = files.add(format!("{} (extension script)", model_name), script.clone());
            emit_parse_error(writer, config, files, script_id, error);
        }
        RuntimeError::ModelParse { path, error } => {
            let text = std::fs::read_to_string(path).unwrap_or_default();
            let model_id = files.add(path.clone(), text);
            emit_parse_error(writer, config, files, model_id, error);
        }
        other => eprintln!("runtime error: {}", other),
    }
}

/// Render a parse error against the file registered as `file_id`.
fn emit_parse_error(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    file_id: usize,
    error: &ParseError,
) {
    let relabeled = ParseError {
        file_id,
        ..error.clone()
    };
    let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &relabeled.to_diagnostic());
}
