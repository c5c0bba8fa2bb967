//! gitddb CLI: a thin operator surface over [`gitddb_core::Database`] —
//! open/create a repository, read/write documents by collection, and run a
//! sync cycle against a configured remote.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gitddb_core::config::DatabaseOptions;
use gitddb_core::serialize::Serializer;
use gitddb_core::{Database, OpenOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gitddb")]
#[command(version, about = "Git-backed document database")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the database's working directory.
    #[arg(long, global = true, default_value = ".")]
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a database at `--path` if one doesn't exist yet, then print its info.
    Init,

    /// Insert-or-update a document.
    Put {
        /// Collection prefix (empty for the root collection).
        #[arg(long, default_value = "")]
        collection: String,
        /// The document's short id.
        id: String,
        /// The document body, as a JSON object.
        json: String,
    },

    /// Read a document's current value.
    Get {
        #[arg(long, default_value = "")]
        collection: String,
        id: String,
    },

    /// Delete a document.
    Delete {
        #[arg(long, default_value = "")]
        collection: String,
        id: String,
    },

    /// List every document in a collection.
    Find {
        #[arg(long, default_value = "")]
        collection: String,
        /// Recurse into sub-collections.
        #[arg(long)]
        recursive: bool,
    },

    /// Run one sync cycle (fetch, classify, fast-forward/push/merge) against a remote.
    Sync {
        /// Remote name, as configured in `gitddb.toml`.
        remote: String,
    },

    /// Push local HEAD to a remote without fetching first.
    Push {
        remote: String,
        #[arg(long)]
        force: bool,
    },
}

fn open(path: &std::path::Path) -> Result<Database> {
    let config = DatabaseOptions::load(&path.join("gitddb.toml")).context("loading gitddb.toml")?;
    Database::open(OpenOptions {
        path: path.to_owned(),
        create_if_not_exists: false,
        config,
        search_index: None,
    })
    .context("opening database")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let config = DatabaseOptions::load(&cli.path.join("gitddb.toml")).context("loading gitddb.toml")?;
            let db = Database::open(OpenOptions {
                path: cli.path.clone(),
                create_if_not_exists: true,
                config,
                search_index: None,
            })
            .context("creating database")?;
            println!("{}", serde_json::to_string_pretty(db.info())?);
            Ok(())
        }
        Commands::Put { collection, id, json } => {
            let db = open(&cli.path)?;
            let value: serde_json::Value = serde_json::from_str(&json).context("parsing document JSON")?;
            let coll = db.collection(&collection, Serializer::Json)?;
            let result = coll.put(&id, value, None)?;
            println!("{}", result.commit.oid);
            Ok(())
        }
        Commands::Get { collection, id } => {
            let db = open(&cli.path)?;
            let coll = db.collection(&collection, Serializer::Json)?;
            let value = coll.get(&id)?;
            match value {
                gitddb_core::DocValue::Json(v) => println!("{}", serde_json::to_string_pretty(&v)?),
                gitddb_core::DocValue::Text(t) => println!("{t}"),
                gitddb_core::DocValue::Binary(b) => println!("<{} bytes>", b.len()),
            }
            Ok(())
        }
        Commands::Delete { collection, id } => {
            let db = open(&cli.path)?;
            let coll = db.collection(&collection, Serializer::Json)?;
            coll.delete(&id, None)?;
            Ok(())
        }
        Commands::Find { collection, recursive } => {
            let db = open(&cli.path)?;
            let coll = db.collection(&collection, Serializer::Json)?;
            for doc in coll.find_fat_doc(recursive)? {
                println!("{}", doc.name);
            }
            Ok(())
        }
        Commands::Sync { remote } => {
            let db = open(&cli.path)?;
            let result = db.sync(&remote)?;
            println!("{:?}", result.action);
            Ok(())
        }
        Commands::Push { remote, force } => {
            let db = open(&cli.path)?;
            db.push(&remote, force)?;
            Ok(())
        }
    }
}
