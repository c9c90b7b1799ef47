pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "companyinfo",
    about = "Companyinfo operator CLI",
    long_about = "Inspect configuration, sign webhook payloads, and query the entity services without posting to a space.",
    after_help = "Examples:\n  companyinfo config\n  companyinfo sign --body '{\"type\":\"verification\",\"challenge\":\"abc\"}'\n  companyinfo lookup \"Meeting the Acme team tomorrow\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Compute the X-OUTBOUND-TOKEN signature for a webhook body")]
    Sign(SignArgs),
    #[command(about = "Recognize companies in a text and print their metadata as JSON")]
    Lookup {
        #[arg(help = "Free text to run entity recognition on")]
        text: String,
    },
}

#[derive(Debug, Args)]
struct SignArgs {
    #[arg(
        long,
        conflicts_with = "file",
        required_unless_present = "file",
        help = "Raw body to sign, exactly as it will be sent"
    )]
    body: Option<String>,
    #[arg(long, help = "Read the raw body from a file")]
    file: Option<PathBuf>,
    #[arg(long, help = "Shared secret; defaults to the configured webhook secret")]
    secret: Option<String>,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Sign(args) => {
            let input = match (args.body, args.file) {
                (Some(body), _) => commands::sign::SignInput::Body(body),
                (None, Some(path)) => commands::sign::SignInput::File(path),
                (None, None) => commands::sign::SignInput::Body(String::new()),
            };
            commands::sign::run(input, args.secret)
        }
        Command::Lookup { text } => commands::lookup::run(&text),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
