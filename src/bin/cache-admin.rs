use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use caching_proxy::cache::{CacheKey, CacheStore, DiskStore};
use caching_proxy::http::ResponseRecord;

#[derive(Parser)]
#[command(name = "cache-admin")]
#[command(about = "Inspect and manage the caching proxy's disk cache", long_about = None)]
struct Cli {
    /// Cache directory
    #[arg(short, long, default_value = "cache", global = true)]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cache key for a method and absolute origin URL
    Key { method: String, url: String },
    /// List cached entries
    List,
    /// Show one cached entry
    Show { key: String },
    /// Remove every cached entry
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    execute(cli.command, &cli.dir, &mut stdout).await
}

async fn execute(
    command: Commands,
    dir: &Path,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Key { method, url } => {
            writeln!(out, "{}", CacheKey::new(&method, &url))?;
        }
        Commands::List => {
            let store = DiskStore::open(dir)?;
            let keys = store.keys().await?;
            for key in &keys {
                match store.get(key).await {
                    Some(record) => writeln!(
                        out,
                        "{}  {}  {} bytes",
                        key,
                        record.status_line,
                        record.body.len()
                    )?,
                    None => writeln!(out, "{}  <unreadable>", key)?,
                }
            }
            writeln!(out, "{} entries", keys.len())?;
        }
        Commands::Show { key } => {
            let key = CacheKey::parse(&key).ok_or_else(|| format!("'{}' is not a cache key", key))?;
            let store = DiskStore::open(dir)?;
            let record = store
                .get(&key)
                .await
                .ok_or_else(|| format!("no readable entry for {}", key))?;
            writeln!(out, "{}", serde_json::to_string_pretty(&describe(&record))?)?;
        }
        Commands::Clear => {
            let removed = DiskStore::open(dir)?.clear().await?;
            writeln!(out, "Cache cleared ({} entries removed).", removed)?;
        }
    }

    Ok(())
}

/// Render a record for humans: the body as text when it is valid UTF-8.
fn describe(record: &ResponseRecord) -> Value {
    let headers: serde_json::Map<String, Value> = record
        .headers
        .iter()
        .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
        .collect();

    let body = match std::str::from_utf8(&record.body) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => json!({ "binary_bytes": record.body.len() }),
    };

    json!({
        "status": record.status_line,
        "headers": headers,
        "body": body,
    })
}
