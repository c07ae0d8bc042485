//! # Vault Chat CLI (`vchat`)
//!
//! ```bash
//! vchat --config ./config/vchat.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vchat index` | Build or refresh the cache and print statistics |
//! | `vchat search "<query>"` | Rank documents |
//! | `vchat context "<query>"` | Print the context an LLM request would carry |
//! | `vchat ask "<query>"` | Ask one question |
//! | `vchat chat` | Interactive conversation |
//! | `vchat watch` | Recompute documents as they change |
//! | `vchat continue <id>` | Continue writing a document |
//! | `vchat flowchart <id> "<request>"` | Draw a mermaid flowchart of a document |
//! | `vchat link "[[note]]"` | Resolve a wiki link |
//!
//! Logs go to stderr; `-v` enables debug output and `RUST_LOG` overrides
//! both.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vault_chat::ask::{self, AskOptions};
use vault_chat::engine::ContextRequest;
use vault_chat::search::SearchOverrides;
use vault_chat::{config, index, search, watch, writing};

/// Vault Chat: retrieval-augmented chat over a local Markdown vault.
#[derive(Parser)]
#[command(
    name = "vchat",
    about = "Vault Chat: retrieval-augmented chat over a local Markdown vault",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vchat.toml")]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the cache and print corpus statistics.
    Index {
        /// Remove cached documents that are no longer in the vault.
        #[arg(long)]
        prune: bool,
    },

    /// Rank documents against a query.
    Search {
        query: String,

        /// `BM25` or `TF-IDF`. Defaults to `retrieval.search_algorithm`.
        #[arg(long)]
        algorithm: Option<String>,

        /// Maximum number of documents. Defaults to `retrieval.document_num`.
        #[arg(long)]
        limit: Option<usize>,

        /// Score heading-delimited chunks instead of whole documents.
        #[arg(long)]
        chunks: bool,
    },

    /// Print the assembled context for a query.
    Context {
        query: String,

        #[command(flatten)]
        editor: EditorArgs,
    },

    /// Ask a single question.
    Ask {
        query: String,

        #[command(flatten)]
        editor: EditorArgs,

        /// Selected prompt sent ahead of the conversation.
        #[arg(long)]
        prompt: Option<String>,

        /// Print the answer as it is generated.
        #[arg(long)]
        stream: bool,
    },

    /// Interactive conversation. `/clear` resets history, `/quit` exits.
    Chat {
        #[arg(long)]
        stream: bool,
    },

    /// Poll the vault and recompute modified documents.
    Watch,

    /// Continue writing a document.
    Continue {
        /// Document id (vault-relative path).
        id: String,

        /// Character offset to continue from. Defaults to the end.
        #[arg(long)]
        cursor: Option<usize>,

        /// Insert the continuation into the file instead of printing it.
        #[arg(long)]
        write: bool,
    },

    /// Draw a mermaid flowchart of a document.
    Flowchart {
        /// Document id (vault-relative path).
        id: String,

        /// What the flowchart should show.
        request: String,
    },

    /// Resolve a wiki link to a document id.
    Link { text: String },
}

/// Editor state that frames a query.
#[derive(clap::Args)]
struct EditorArgs {
    /// Id of the currently open document.
    #[arg(long)]
    current: Option<String>,

    /// Currently selected text.
    #[arg(long)]
    selection: Option<String>,
}

impl From<EditorArgs> for ContextRequest {
    fn from(args: EditorArgs) -> Self {
        ContextRequest {
            current: args.current,
            current_content: None,
            selection: args.selection,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "vault_chat=debug,vault_chat_core=debug"
    } else {
        "vault_chat=info,vault_chat_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { prune } => {
            index::run_index(&cfg, prune).await?;
        }
        Commands::Search {
            query,
            algorithm,
            limit,
            chunks,
        } => {
            let overrides = SearchOverrides {
                algorithm,
                limit,
                chunks,
            };
            search::run_search(&cfg, &query, &overrides).await?;
        }
        Commands::Context { query, editor } => {
            search::run_context(&cfg, &query, &editor.into()).await?;
        }
        Commands::Ask {
            query,
            editor,
            prompt,
            stream,
        } => {
            let options = AskOptions {
                context: editor.into(),
                prompt,
                stream,
            };
            ask::run_ask(&cfg, &query, &options).await?;
        }
        Commands::Chat { stream } => {
            ask::run_chat(&cfg, stream).await?;
        }
        Commands::Watch => {
            watch::run_watch(&cfg).await?;
        }
        Commands::Continue { id, cursor, write } => {
            writing::run_continue(&cfg, &id, cursor, write).await?;
        }
        Commands::Flowchart { id, request } => {
            writing::run_flowchart(&cfg, &id, &request).await?;
        }
        Commands::Link { text } => {
            search::run_link(&cfg, &text).await?;
        }
    }

    Ok(())
}
