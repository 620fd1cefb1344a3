use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use room_formats::{Category, PopupCatalog};

/// Inspect a popup catalog and list the messages each category resolves to.
#[derive(Parser)]
struct Args {
    /// Path to the popup catalog text file
    path: PathBuf,

    /// Print the resolved catalog as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Fail instead of substituting the built-in messages
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let catalog = if args.strict {
        PopupCatalog::from_file(&args.path)?
    } else {
        PopupCatalog::load(&args.path)
    };

    if args.json {
        let json = serde_json::to_string_pretty(&catalog).context("serializing catalog")?;
        println!("{json}");
        return Ok(());
    }

    println!("source: {:?}", catalog.source);
    for category in [Category::Negative, Category::Positive] {
        let messages = catalog.messages(category);
        println!("\n{} ({} messages)", category.label(), messages.len());
        for message in messages {
            println!("  {:>3}. {}", message.index, message.text);
        }
    }

    Ok(())
}
