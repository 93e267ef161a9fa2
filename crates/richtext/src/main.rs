//! Trovato rich text administration tool.
//!
//! Usage:
//!   richtext ingest body.xml --edit
//!   richtext text body.xml --short
//!   richtext migrate --map namespaces.toml --dry-run

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use trovato_richtext::config::Config;
use trovato_richtext::migration::{
    NamespaceMigrationGateway, PgNamespaceMigrationGateway, load_namespace_map,
};
use trovato_richtext::{Document, RichTextService, db};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Securely ingest a document and print its storage form.
    Ingest {
        /// Rich text XML file.
        file: PathBuf,

        /// Print the edit form instead.
        #[arg(long)]
        edit: bool,
    },

    /// Print the indexable text of a document.
    Text {
        /// Rich text XML file.
        file: PathBuf,

        /// Print the one-line summary instead of the full text.
        #[arg(long)]
        short: bool,
    },

    /// Rewrite legacy namespace URIs in stored rich text.
    Migrate {
        /// TOML file of `[[rewrite]]` entries.
        #[arg(long)]
        map: PathBuf,

        /// Only count the documents that would change.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    let settings = config.load_settings()?;

    match args.command {
        Command::Ingest { file, edit } => {
            let service = RichTextService::new(&settings);
            let doc = ingest_file(&service, &file)?;
            let doc = if edit { service.to_edit(doc) } else { doc };
            println!("{}", doc.to_xml());
        }
        Command::Text { file, short } => {
            let service = RichTextService::new(&settings);
            let doc = ingest_file(&service, &file)?;
            let text = if short {
                service.short_text(&doc)
            } else {
                service.full_text(&doc)
            };
            println!("{text}");
        }
        Command::Migrate { map, dry_run } => {
            let map = load_namespace_map(&map)?;
            let pool = db::create_pool(&config).await?;
            let gateway = PgNamespaceMigrationGateway::new(pool, settings.migration.clone());

            if dry_run {
                let pending = gateway
                    .count_pending(&map)
                    .await
                    .context("failed to count pending documents")?;
                info!(pending, rewrites = map.len(), "dry run, nothing changed");
                println!("{pending}");
            } else {
                let affected = gateway
                    .migrate(&map)
                    .await
                    .context("namespace migration failed")?;
                println!("{affected}");
            }
        }
    }

    Ok(())
}

fn ingest_file(service: &RichTextService, path: &Path) -> Result<Document> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    service.ingest(&raw).map_err(|e| {
        for message in e.messages() {
            warn!(file = %path.display(), "{message}");
        }
        anyhow::Error::new(e).context(format!("{} is not valid rich text", path.display()))
    })
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
