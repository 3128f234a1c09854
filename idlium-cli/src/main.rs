#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # idlium CLI
//!
//! A command-line front end for the idlium IDL parser: preprocesses and
//! parses an IDL file and dumps the resulting model as text or JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use idlium::{Diagnostic, IdlParser, Model, ParserConfig, SequenceBound, Severity};

/// Exit codes for different error conditions
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const IO_ERROR: i32 = 2;
    pub const PARSE_ERROR: i32 = 3;
}

/// Command-line interface for the idlium IDL parser
#[derive(Parser)]
#[command(
    name = "idlium",
    version,
    author,
    about = "An OMG IDL subset parser",
    long_about = "idlium preprocesses (#include, #define, conditional compilation) and parses \
an OMG IDL subset (modules, structs, typedefs, sequences, @key annotations) into a data model \
for code generators.",
    after_help = "EXAMPLES:
  # Parse a file and dump the model
  $ idlium messages.idl

  # Parse with a predefined macro and an include directory
  $ idlium messages.idl -D WITH_EXTRAS -I idl/common

  # Read from stdin, emit JSON
  $ cat messages.idl | idlium - --json

  # Write the dump to a file
  $ idlium messages.idl -o messages.txt"
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Input IDL file (use '-' for stdin)
    #[arg(help = "Input IDL file to parse (use '-' for stdin)")]
    input: PathBuf,

    /// Output file (use '-' for stdout, default: stdout)
    #[arg(
        short = 'o',
        long,
        help = "Output file for the model dump (use '-' for stdout, default: stdout)"
    )]
    output: Option<PathBuf>,

    /// Predefine a macro
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME[=VALUE]",
        help = "Predefine a macro; the value is empty when omitted"
    )]
    defines: Vec<String>,

    /// Add include directory
    #[arg(
        short = 'I',
        long = "include",
        value_name = "DIR",
        help = "Add directory to the include search path"
    )]
    include_dirs: Vec<PathBuf>,

    /// Maximum include nesting depth
    #[arg(long, default_value = "64", help = "Maximum #include nesting depth")]
    max_include_depth: usize,

    /// Output the model in JSON format
    #[arg(long, help = "Output the parsed model in JSON format")]
    #[cfg(feature = "json")]
    json: bool,

    /// Enable verbose output
    #[arg(
        short = 'v',
        long,
        help = "Enable verbose output with table counts and timing"
    )]
    verbose: bool,

    /// Suppress warnings and informational output
    #[arg(short = 'q', long, help = "Suppress warnings and informational output")]
    quiet: bool,

    /// Disable colored output
    #[arg(long, help = "Disable colored output")]
    no_color: bool,

    /// Force colored output
    #[arg(long, help = "Force colored output even when not a terminal")]
    force_color: bool,
}

/// Main application entry point
fn main() {
    std::process::exit(match run() {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            determine_exit_code(&e)
        }
    });
}

/// Determine the appropriate exit code based on the error
fn determine_exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<std::io::Error>().is_some() {
        exit_code::IO_ERROR
    } else if let Some(parse_error) = error.downcast_ref::<idlium::ParseError>() {
        match parse_error {
            idlium::ParseError::Io(_) => exit_code::IO_ERROR,
            _ => exit_code::PARSE_ERROR,
        }
    } else {
        exit_code::GENERAL_ERROR
    }
}

/// Run the main application logic
fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    } else if cli.force_color {
        colored::control::set_override(true);
    }

    if cli.max_include_depth == 0 {
        return Err(anyhow::anyhow!("include depth must be greater than 0"));
    }

    let config = create_config(&cli);
    let mut engine = IdlParser::with_config(&config);

    let start_time = std::time::Instant::now();
    let parse_result = if cli.input == PathBuf::from("-") {
        let source = read_stdin()?;
        engine.parse_source("<stdin>", &source)
    } else {
        engine.parse_file(&cli.input.to_string_lossy())
    };
    let parse_time = start_time.elapsed();

    report_diagnostics(&cli, &engine);

    if let Err(error) = parse_result {
        return Err(anyhow::Error::new(error)
            .context(format!("failed to parse {}", format_input(&cli.input))));
    }

    let model = engine.take_model();
    let dump = render(&cli, &model)?;
    write_output(&cli, &dump)?;

    if cli.verbose && !cli.quiet {
        eprintln!(
            "parsed {}: {} structs, {} typedefs, {} variables in {parse_time:?}",
            format_input(&cli.input),
            model.structs.len(),
            model.typedefs.len(),
            model.variables.len(),
        );
    }

    Ok(())
}

/// Create a parser configuration from the CLI arguments
fn create_config(cli: &Cli) -> ParserConfig {
    let mut config = ParserConfig::new();
    config.max_include_depth = cli.max_include_depth;
    config.include_dirs = cli.include_dirs.clone();
    for define in &cli.defines {
        let (name, value) = match define.split_once('=') {
            Some((name, value)) => (name, value),
            None => (define.as_str(), ""),
        };
        config.defines.push((name.to_string(), value.to_string()));
    }
    config
}

/// Print collected diagnostics with colored severity tags
fn report_diagnostics(cli: &Cli, engine: &IdlParser) {
    for diagnostic in engine.diagnostics() {
        if cli.quiet && diagnostic.severity == Severity::Warning {
            continue;
        }
        eprintln!("{}", format_diagnostic(diagnostic));
    }
}

fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    let tag = match diagnostic.severity {
        Severity::Warning => "warning:".yellow().bold(),
        Severity::Error => "error:".red().bold(),
    };
    match diagnostic.line {
        Some(line) => format!("{tag} line {line}: {}", diagnostic.message),
        None => format!("{tag} {}", diagnostic.message),
    }
}

/// Read all of stdin
fn read_stdin() -> Result<String> {
    use std::io::Read;
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read from stdin")?;
    Ok(buffer)
}

/// Render the model as text or JSON
fn render(cli: &Cli, model: &Model) -> Result<String> {
    #[cfg(feature = "json")]
    if cli.json {
        return render_json(model);
    }
    let _ = cli;
    Ok(render_text(model))
}

/// Render the model back as IDL-flavored text
fn render_text(model: &Model) -> String {
    let mut out = String::new();

    for typedef in &model.typedefs {
        match typedef.sequence {
            Some(SequenceBound::Bounded(n)) => out.push_str(&format!(
                "typedef sequence<{}, {n}> {};\n",
                typedef.base_name, typedef.name
            )),
            Some(SequenceBound::Unbounded) => out.push_str(&format!(
                "typedef sequence<{}> {};\n",
                typedef.base_name, typedef.name
            )),
            None => out.push_str(&format!(
                "typedef {} {};\n",
                typedef.base_name, typedef.name
            )),
        }
    }

    for def in &model.structs {
        if def.namespace.is_empty() {
            out.push_str(&format!("struct {} {{\n", def.name));
        } else {
            out.push_str(&format!("struct {}::{} {{\n", def.namespace, def.name));
        }
        for field in &def.fields {
            out.push_str("    ");
            if field.is_key {
                out.push_str("@key ");
            }
            out.push_str(&field.render_idl());
        }
        out.push_str("};\n");
    }

    for line in &model.user_lines {
        out.push_str(line);
        out.push('\n');
    }

    out
}

/// JSON view of the model
#[cfg(feature = "json")]
#[derive(serde::Serialize)]
struct ModelReport<'a> {
    structs: Vec<StructReport<'a>>,
    typedefs: Vec<TypedefReport<'a>>,
    user_lines: &'a [String],
}

#[cfg(feature = "json")]
#[derive(serde::Serialize)]
struct StructReport<'a> {
    name: &'a str,
    namespace: &'a str,
    fields: Vec<FieldReport<'a>>,
}

#[cfg(feature = "json")]
#[derive(serde::Serialize)]
struct FieldReport<'a> {
    name: &'a str,
    type_name: &'a str,
    is_key: bool,
    origin_namespace: &'a str,
}

#[cfg(feature = "json")]
#[derive(serde::Serialize)]
struct TypedefReport<'a> {
    name: &'a str,
    base: &'a str,
    is_sequence: bool,
    bound: Option<u64>,
}

#[cfg(feature = "json")]
impl<'a> ModelReport<'a> {
    fn new(model: &'a Model) -> Self {
        ModelReport {
            structs: model
                .structs
                .iter()
                .map(|def| StructReport {
                    name: &def.name,
                    namespace: &def.namespace,
                    fields: def
                        .fields
                        .iter()
                        .map(|field| FieldReport {
                            name: &field.name,
                            type_name: &field.resolved.name,
                            is_key: field.is_key,
                            origin_namespace: &field.origin_namespace,
                        })
                        .collect(),
                })
                .collect(),
            typedefs: model
                .typedefs
                .iter()
                .map(|typedef| TypedefReport {
                    name: &typedef.name,
                    base: &typedef.base_name,
                    is_sequence: typedef.sequence.is_some(),
                    bound: match typedef.sequence {
                        Some(SequenceBound::Bounded(n)) => Some(n),
                        _ => None,
                    },
                })
                .collect(),
            user_lines: &model.user_lines,
        }
    }
}

/// Render the model as pretty-printed JSON
#[cfg(feature = "json")]
fn render_json(model: &Model) -> Result<String> {
    let report = ModelReport::new(model);
    let mut rendered =
        serde_json::to_string_pretty(&report).context("failed to serialize the model")?;
    rendered.push('\n');
    Ok(rendered)
}

/// Write output to file or stdout
fn write_output(cli: &Cli, content: &str) -> Result<()> {
    match &cli.output {
        Some(path) if path != &PathBuf::from("-") => std::fs::write(path, content)
            .with_context(|| format!("failed to write output file: {}", path.display())),
        _ => {
            print!("{content}");
            Ok(())
        }
    }
}

/// Format the input path for display
fn format_input(path: &PathBuf) -> String {
    if path == &PathBuf::from("-") {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}
