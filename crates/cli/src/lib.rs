pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "shopsense",
    about = "Shopsense operator CLI",
    long_about = "Operate the Shopsense catalog: migrations, demo data, recommendations, product search and intent checks.",
    after_help = "Examples:\n  shopsense migrate\n  shopsense recommend --product-id 1 --limit 3\n  shopsense search \"tees under 30 bucks\"\n  shopsense classify \"who owns this store?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo streetwear catalog (idempotent)")]
    Seed,
    #[command(about = "Build the similarity index and list products similar to one product")]
    Recommend {
        #[arg(long, help = "Product id to find neighbours for")]
        product_id: i64,
        #[arg(long, help = "Maximum number of recommendations (defaults to recommender.default_top_n)")]
        limit: Option<usize>,
    },
    #[command(about = "Run the keyword product filter over the catalog")]
    Search {
        #[arg(help = "Shopper message, e.g. \"tees under 30 bucks\"")]
        message: String,
    },
    #[command(about = "Show which chat intent a message is routed to")]
    Classify {
        #[arg(help = "Shopper message")]
        message: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Recommend { product_id, limit } => commands::recommend::run(product_id, limit),
        Command::Search { message } => commands::search::run(&message),
        Command::Classify { message } => commands::classify::run(&message),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
