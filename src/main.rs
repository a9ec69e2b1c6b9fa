//! Cortex - hierarchical, file-backed memory store
//!
//! Command-line front end over the store registry and client facade.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use cortex::{
    config::{CortexConfig, OutputFormat, StoreDefinition},
    domain::{FieldUpdate, MemoryBuilder, MemoryUpdate},
    policy::CategoryMode,
    registry::{StoreResolver, LOCAL_STORE_DIR, LOCAL_STORE_NAME},
    storage::ConfigFileStorage,
    CategoryPath, MemoryPath, MemoryRecord, Registry, Slug, StoreClient,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cortex")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Hierarchical, file-backed memory store")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CORTEX_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Store to operate on (defaults to the local store, then the default store)
    #[arg(short, long, env = "CORTEX_STORE", global = true)]
    store: Option<String>,

    /// Output format: yaml or json
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, read and change memories
    #[command(subcommand)]
    Memory(MemoryCommand),

    /// Manage categories
    #[command(subcommand)]
    Category(CategoryCommand),

    /// Manage stores and run maintenance
    #[command(subcommand)]
    Store(StoreCommand),
}

#[derive(Subcommand)]
enum MemoryCommand {
    /// Add a new memory; content is read from stdin unless --content is given
    Add {
        /// Memory path (category/slug)
        path: String,
        #[command(flatten)]
        fields: MemoryFields,
        /// Turn the last path segment into a slug instead of rejecting it
        #[arg(long)]
        slugify: bool,
    },

    /// Show one memory
    Show { path: String },

    /// Change fields of a memory; unspecified fields are kept
    Update {
        path: String,
        #[command(flatten)]
        fields: MemoryFields,
        /// Remove all tags
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
        /// Remove the source
        #[arg(long, conflicts_with = "source")]
        clear_source: bool,
        /// Remove all citations
        #[arg(long, conflicts_with = "citations")]
        clear_citations: bool,
        /// Remove the expiry
        #[arg(long, conflicts_with = "expires_at")]
        clear_expiry: bool,
    },

    /// Delete a memory
    Remove { path: String },

    /// Move a memory to another path
    Move { from: String, to: String },

    /// List the memories of one category
    List {
        /// Category path (root when omitted)
        #[arg(default_value = "")]
        category: String,
        /// Include expired memories
        #[arg(long)]
        include_expired: bool,
    },

    /// Most recently updated memories under a category
    Recent {
        #[arg(default_value = "")]
        category: String,
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Args)]
struct MemoryFields {
    /// Memory content
    #[arg(long)]
    content: Option<String>,
    /// Tags (repeatable or comma separated)
    #[arg(short, long = "tag", value_delimiter = ',')]
    tags: Option<Vec<String>>,
    /// Where the memory came from
    #[arg(long)]
    source: Option<String>,
    /// Supporting file or URL (repeatable)
    #[arg(long = "citation")]
    citations: Option<Vec<String>>,
    /// Expiry instant (RFC 3339)
    #[arg(long)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Subcommand)]
enum CategoryCommand {
    /// Create a category and any missing ancestors
    Create { path: String },
    /// Set a category description; omit the text to clear it
    Describe {
        path: String,
        description: Option<String>,
    },
    /// Delete a category and everything beneath it
    Delete { path: String },
    /// Show a category with its memories and subcategories
    Show { path: String },
}

#[derive(Subcommand)]
enum StoreCommand {
    /// List registered stores
    List,
    /// Register a store
    Add {
        name: String,
        /// Absolute root directory
        path: PathBuf,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "free")]
        category_mode: String,
    },
    /// Unregister a store; its files are left in place
    Remove { name: String },
    /// Create the store root and root index
    Init {
        /// Create a store in ./.cortex instead of initializing the resolved one
        #[arg(long)]
        local: bool,
    },
    /// Rebuild index files from the documents on disk
    Reindex {
        #[arg(default_value = "")]
        scope: String,
    },
    /// Delete expired memories
    Prune {
        #[arg(default_value = "")]
        scope: String,
        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cortex={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<cortex::Error>() {
            Some(err) => eprintln!("error [{}]: {}", err.code(), err),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => CortexConfig::default_path()
            .context("cannot determine the configuration directory; pass --config")?,
    };
    let registry = Registry::new(Arc::new(ConfigFileStorage::new(&config_path)));
    registry.load().await?;
    let format = cli.format.unwrap_or(registry.settings().output_format);
    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    let output = Output { format };

    match cli.command {
        Commands::Store(command) => {
            run_store(command, &registry, cli.store.as_deref(), cwd, &output).await
        }
        Commands::Memory(command) => {
            let client = open_client(&registry, cli.store.as_deref(), cwd)?;
            run_memory(command, &client, &output).await
        }
        Commands::Category(command) => {
            let client = open_client(&registry, cli.store.as_deref(), cwd)?;
            run_category(command, &client, &output).await
        }
    }
}

fn open_client(registry: &Registry, store: Option<&str>, cwd: PathBuf) -> Result<StoreClient> {
    let (store, source) = StoreResolver::new(registry, cwd).resolve(store)?;
    tracing::debug!("Using store '{}' ({:?})", store.name(), source);
    Ok(StoreClient::open(store))
}

async fn run_memory(command: MemoryCommand, client: &StoreClient, output: &Output) -> Result<()> {
    match command {
        MemoryCommand::Add {
            path,
            fields,
            slugify,
        } => {
            let path = parse_memory_path(&path, slugify)?;
            let content = match fields.content {
                Some(content) => content,
                None => read_stdin().await?,
            };
            let memory = MemoryBuilder::new(content)
                .tags(fields.tags.unwrap_or_default())
                .source(fields.source.unwrap_or_default())
                .expires_at(fields.expires_at);
            let memory = fields
                .citations
                .unwrap_or_default()
                .into_iter()
                .fold(memory, |b, c| b.citation(c))
                .build()?;
            let stored = client.memory(path.clone()).create(memory).await?;
            output.print(&MemoryRecord::new(&path, &stored))
        }
        MemoryCommand::Show { path } => {
            let path = MemoryPath::parse(&path)?;
            let memory = client.memory(path.clone()).get().await?;
            output.print(&MemoryRecord::new(&path, &memory))
        }
        MemoryCommand::Update {
            path,
            fields,
            clear_tags,
            clear_source,
            clear_citations,
            clear_expiry,
        } => {
            let path = MemoryPath::parse(&path)?;
            let update = MemoryUpdate {
                content: fields.content.map_or(FieldUpdate::Keep, FieldUpdate::Set),
                tags: field(fields.tags, clear_tags),
                source: field(fields.source, clear_source),
                citations: field(fields.citations, clear_citations),
                expires_at: field(fields.expires_at, clear_expiry),
            };
            let updated = client.memory(path.clone()).update(&update).await?;
            output.print(&MemoryRecord::new(&path, &updated))
        }
        MemoryCommand::Remove { path } => {
            let path = MemoryPath::parse(&path)?;
            client.memory(path.clone()).delete().await?;
            output.print(&Removed { removed: path.to_string() })
        }
        MemoryCommand::Move { from, to } => {
            let from = MemoryPath::parse(&from)?;
            let to = MemoryPath::parse(&to)?;
            let moved = client.memory(from).move_to(&to).await?;
            output.print(&MemoryRecord::new(&to, &moved))
        }
        MemoryCommand::List {
            category,
            include_expired,
        } => {
            let category = CategoryPath::parse(&category)?;
            let entries = client
                .category(category)
                .list_memories(include_expired)
                .await?;
            output.print(&entries)
        }
        MemoryCommand::Recent { category, limit } => {
            let category = CategoryPath::parse(&category)?;
            output.print(&client.recent(&category, limit).await?)
        }
    }
}

async fn run_category(command: CategoryCommand, client: &StoreClient, output: &Output) -> Result<()> {
    match command {
        CategoryCommand::Create { path } => {
            let path = CategoryPath::parse(&path)?;
            let created = client.category(path.clone()).create().await?;
            output.print(&Created {
                path: path.to_string(),
                created,
            })
        }
        CategoryCommand::Describe { path, description } => {
            let path = CategoryPath::parse(&path)?;
            let category = client.category(path);
            category.set_description(description).await?;
            output.print(&category.get().await?)
        }
        CategoryCommand::Delete { path } => {
            let path = CategoryPath::parse(&path)?;
            client.category(path.clone()).delete().await?;
            output.print(&Removed { removed: path.to_string() })
        }
        CategoryCommand::Show { path } => {
            let path = CategoryPath::parse(&path)?;
            output.print(&client.category(path).get().await?)
        }
    }
}

async fn run_store(
    command: StoreCommand,
    registry: &Registry,
    store: Option<&str>,
    cwd: PathBuf,
    output: &Output,
) -> Result<()> {
    match command {
        StoreCommand::List => output.print(&registry.stores()?),
        StoreCommand::Add {
            name,
            path,
            description,
            category_mode,
        } => {
            let category_mode: CategoryMode =
                serde_json::from_value(serde_json::Value::String(category_mode))
                    .context("category mode must be one of free, subcategories, strict")?;
            let mut definition = StoreDefinition::new(path);
            definition.description = description;
            definition.category_mode = category_mode;
            let store = registry.register(&name, definition).await?;
            output.print(&store)
        }
        StoreCommand::Remove { name } => {
            registry.unregister(&name).await?;
            output.print(&Removed { removed: name })
        }
        StoreCommand::Init { local } => {
            let client = if local {
                let store = cortex::domain::Store::new(LOCAL_STORE_NAME, cwd.join(LOCAL_STORE_DIR))?;
                StoreClient::open(store)
            } else {
                open_client(registry, store, cwd)?
            };
            let created = client.initialize().await?;
            output.print(&Created {
                path: client.store().root().display().to_string(),
                created,
            })
        }
        StoreCommand::Reindex { scope } => {
            let client = open_client(registry, store, cwd)?;
            let scope = CategoryPath::parse(&scope)?;
            output.print(&client.reindex(&scope).await?)
        }
        StoreCommand::Prune { scope, dry_run } => {
            let client = open_client(registry, store, cwd)?;
            let scope = CategoryPath::parse(&scope)?;
            output.print(&client.prune(&scope, dry_run).await?)
        }
    }
}

/// Three-state update from a value flag and its clearing flag
fn field<T>(value: Option<T>, clear: bool) -> FieldUpdate<T> {
    match (value, clear) {
        (Some(v), _) => FieldUpdate::Set(v),
        (None, true) => FieldUpdate::Clear,
        (None, false) => FieldUpdate::Keep,
    }
}

fn parse_memory_path(raw: &str, slugify: bool) -> Result<MemoryPath> {
    if !slugify {
        return Ok(MemoryPath::parse(raw)?);
    }
    let trimmed = raw.trim().trim_matches('/');
    let (category, name) = match trimmed.rsplit_once('/') {
        Some((category, name)) => (category, name),
        None => ("", trimmed),
    };
    Ok(MemoryPath::new(CategoryPath::parse(category)?, Slug::slugify(name)?))
}

async fn read_stdin() -> Result<String> {
    let mut content = String::new();
    tokio::io::stdin()
        .read_to_string(&mut content)
        .await
        .context("failed to read memory content from stdin")?;
    Ok(content)
}

#[derive(Serialize)]
struct Removed {
    removed: String,
}

#[derive(Serialize)]
struct Created {
    path: String,
    created: bool,
}

struct Output {
    format: OutputFormat,
}

impl Output {
    fn print<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let rendered = match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(value)?),
        };
        print!("{}", rendered);
        Ok(())
    }
}
