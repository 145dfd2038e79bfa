use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use repogen_lib::args::OPTIONS;
use repogen_lib::{PluginRequest, PluginResponse, handle_request, write_all_or_nothing};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Generate MongoDB repository implementations and interfaces from
/// annotated schema structs.
#[derive(Parser, Debug)]
#[command(name = "repogen", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate repository files from a request file and write them to disk
    Generate {
        /// Request JSON file, or `-` for stdin
        #[arg(short, long)]
        request: PathBuf,

        /// Extra key=value parameter, appended to the request's own
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,

        /// Print the generated files instead of writing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Read a request from stdin and print the response JSON on stdout
    Plugin,
    /// List the recognised parameters
    Options,
}

/// Initialize tracing with an env filter driven by RUST_LOG or `-v`.
fn init_tracing(verbose: u8, json: bool) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,repogen_lib=info,repogen=info".to_string(),
            2 => "info,repogen_lib=debug,repogen=debug".to_string(),
            _ => "debug,repogen_lib=trace,repogen=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(verbose >= 3)
                    .with_line_number(verbose >= 3)
                    .with_writer(io::stderr)
                    .compact(),
            )
            .init();
    }
}

fn read_request(source: &Path) -> Result<PluginRequest, String> {
    let text = if source == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        buf
    } else {
        std::fs::read_to_string(source)
            .map_err(|e| format!("failed to read {}: {e}", source.display()))?
    };
    PluginRequest::from_json(&text).map_err(|e| e.to_string())
}

fn generate(request: &Path, params: Vec<String>, dry_run: bool) -> ExitCode {
    let mut request = match read_request(request) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    request.parameters.extend(params);
    debug!(parameters = ?request.parameters, "running request");

    let response = handle_request(&request);
    if let Some(error) = response.error {
        eprintln!("error: {error}");
        return ExitCode::FAILURE;
    }

    if dry_run {
        for file in &response.contents {
            println!("// ==> {}\n{}", file.name, file.content);
        }
        return ExitCode::SUCCESS;
    }

    if let Err(e) = write_all_or_nothing(&response.contents) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    for file in &response.contents {
        println!("{}", file.name);
    }
    info!(files = response.contents.len(), "done");
    ExitCode::SUCCESS
}

fn plugin() -> ExitCode {
    let response = match read_request(Path::new("-")) {
        Ok(request) => handle_request(&request),
        Err(e) => PluginResponse::failure(e),
    };
    let failed = response.error.is_some();

    match serde_json::to_string(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: failed to encode response: {e}");
            return ExitCode::FAILURE;
        }
    }
    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn options() -> ExitCode {
    let width = OPTIONS.iter().map(|o| o.key.len()).max().unwrap_or(0);
    for option in OPTIONS {
        println!(
            "{:width$}  {:<9}  {}",
            option.key,
            format!("{:?}", option.kind).to_lowercase(),
            option.help
        );
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    match cli.command {
        Command::Generate {
            request,
            params,
            dry_run,
        } => generate(&request, params, dry_run),
        Command::Plugin => plugin(),
        Command::Options => options(),
    }
}
