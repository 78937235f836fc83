use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;
use uema_chat::{Assistant, AssistantReply};
use uema_core::{
    Document, OutputFormat, Sector, UemaConfig, UemaError, UserContext, UserRole, API_KEY_ENV,
};
use uema_rag::{CancelToken, Retrieval};
use uema_store::DocumentStore;

const CONFIG_FILE: &str = ".uema.toml";

#[derive(Parser)]
#[command(
    name = "uema",
    version,
    about = "Grounded search and chat over UEMA institutional documents",
    long_about = "Search and ask questions about institutional documents.\n\n\
                   Answers are grounded in the documents you are allowed to see. Without a\n\
                   provider API key, search falls back to keyword matching.\n\n\
                   Examples:\n  \
                     uema docs import documentos.json --role admin   Load documents\n  \
                     uema search 'prazo edital 01/2025'              Rank documents\n  \
                     uema chat 'Qual o prazo do edital de monitoria?'  Ask a question\n  \
                     uema doctor                                     Check setup"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .uema.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable listings (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,

    /// Name of the acting user
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Role of the acting user: admin, manager, staff or viewer
    #[arg(long, global = true, default_value = "viewer")]
    role: UserRole,

    /// Sector of the acting user, e.g. PROG
    #[arg(long, global = true)]
    sector: Option<Sector>,
}

#[derive(Subcommand)]
enum Command {
    /// Rank documents against a query
    #[command(long_about = "Rank documents against a query.\n\n\
        Uses semantic embeddings for small candidate sets, the reranker above the\n\
        rerank threshold, and keyword matching when no provider is configured or a\n\
        provider call fails.\n\n\
        Examples:\n  uema search 'prazo edital 01/2025'\n  uema search 'férias servidores' --limit 3")]
    Search {
        /// Search query
        query: String,

        /// Maximum results (default: retrieval.top_k)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Ask a question answered from the documents
    #[command(long_about = "Ask a question answered only from retrieved documents.\n\n\
        Starts a new chat session unless --session is given. The question and\n\
        answer are saved to the session.\n\n\
        Examples:\n  uema chat 'Qual o prazo do edital?'\n  uema chat 'E para a pós?' --session 3")]
    Chat {
        /// The question
        message: String,

        /// Continue an existing session
        #[arg(long)]
        session: Option<i64>,
    },
    /// List the acting user's chat sessions
    Sessions,
    /// Manage stored documents
    Docs {
        #[command(subcommand)]
        action: DocsCommand,
    },
    /// Create a default .uema.toml configuration file
    #[command(long_about = "Create a default .uema.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .uema.toml already exists.")]
    Init,
    /// Check your UEMA setup and environment
    #[command(long_about = "Check your UEMA setup and environment.\n\n\
        Runs diagnostics for the config file, provider API key and document store.\n\
        Use --format json for machine-readable output.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum DocsCommand {
    /// Import documents from a JSON array, replacing any with the same id
    Import {
        /// JSON file to import
        file: PathBuf,
    },
    /// List documents visible to the acting user
    List,
    /// Delete a document
    Delete {
        /// Document id
        id: String,
    },
    /// Show store statistics
    Stats,
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1muema\x1b[0m v{version} - grounded search and chat over institutional documents\n");
        println!("Quick start:");
        println!("  \x1b[36muema init\x1b[0m                        Create a .uema.toml config file");
        println!("  \x1b[36muema docs import docs.json\x1b[0m       Load documents into the store");
        println!("  \x1b[36muema chat 'sua pergunta'\x1b[0m         Ask a question\n");
    } else {
        println!("uema v{version} - grounded search and chat over institutional documents\n");
        println!("Quick start:");
        println!("  uema init                        Create a .uema.toml config file");
        println!("  uema docs import docs.json       Load documents into the store");
        println!("  uema chat 'sua pergunta'         Ask a question\n");
    }

    println!("Run 'uema <command> --help' for details.");
}

fn init_tracing(verbose: bool, use_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("uema=debug,uema_rag=debug,uema_chat=debug,uema_store=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(use_color)
        .with_target(verbose)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<UemaConfig> {
    match path {
        Some(path) => Ok(UemaConfig::from_file(path)?),
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                Ok(UemaConfig::from_file(default_path)?)
            } else {
                Ok(UemaConfig::default())
            }
        }
    }
}

/// A token cancelled when the user presses Ctrl-C.
fn interrupt_token() -> CancelToken {
    let token = CancelToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupted, cancelling in-flight request");
            on_interrupt.cancel();
        }
    });
    token
}

fn excerpt(doc: &Document, max_chars: usize) -> Option<String> {
    let text = doc
        .summary
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(doc.content.as_deref())?;
    let line = text.lines().next().unwrap_or_default();
    let cut = uema_core::truncate_chars(line, max_chars);
    Some(if cut.len() < line.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    })
}

fn strategy_line(retrieval: &Retrieval) -> String {
    match retrieval.degraded_from {
        Some(from) => format!("{} (fallback from {from})", retrieval.strategy),
        None => retrieval.strategy.to_string(),
    }
}

fn print_retrieval(retrieval: &Retrieval, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(retrieval).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Search Results\n");
            println!("_Strategy: {}_\n", strategy_line(retrieval));
            if retrieval.documents.is_empty() {
                println!("No documents found.");
            }
            for (i, scored) in retrieval.documents.iter().enumerate() {
                let doc = &scored.document;
                println!(
                    "## {}. {} (score: {:.4})\n\n- **Id:** `{}`\n- **Sector:** {} ({})",
                    i + 1,
                    doc.title,
                    scored.score,
                    doc.id,
                    doc.sector.code(),
                    doc.sector.full_name(),
                );
                if let Some(text) = excerpt(doc, 200) {
                    println!("\n> {text}");
                }
                println!();
            }
        }
        OutputFormat::Text => {
            eprintln!("strategy: {}", strategy_line(retrieval));
            if retrieval.documents.is_empty() {
                println!("No documents found.");
            }
            for (i, scored) in retrieval.documents.iter().enumerate() {
                let doc = &scored.document;
                println!(
                    "{}. [{}] {} (score: {:.4})  id: {}",
                    i + 1,
                    doc.sector,
                    doc.title,
                    scored.score,
                    doc.id,
                );
                if let Some(text) = excerpt(doc, 120) {
                    println!("   {text}");
                }
            }
        }
    }
    Ok(())
}

fn print_answer(answer: &AssistantReply, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(answer).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("{}\n", answer.reply.text);
            if !answer.related.is_empty() {
                println!("## Documentos relacionados\n");
                for scored in &answer.related {
                    println!("- {} (`{}`)", scored.document.title, scored.document.id);
                }
            }
        }
        OutputFormat::Text => {
            println!("{}", answer.reply.text);
            if !answer.related.is_empty() {
                println!("\nDocumentos relacionados:");
                for scored in &answer.related {
                    println!(
                        "  - [{}] {}  id: {}",
                        scored.document.sector, scored.document.title, scored.document.id
                    );
                }
            }
            eprintln!(
                "\nsession: {}  strategy: {}",
                answer.session_id, answer.strategy
            );
        }
    }
    Ok(())
}

fn print_documents(documents: &[Document], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(documents).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("| Id | Title | Sector | Status | Type |");
            println!("|----|-------|--------|--------|------|");
            for doc in documents {
                println!(
                    "| `{}` | {} | {} | {} | {} |",
                    doc.id, doc.title, doc.sector, doc.status, doc.doc_type
                );
            }
        }
        OutputFormat::Text => {
            if documents.is_empty() {
                println!("No documents.");
            }
            for doc in documents {
                println!(
                    "{:<16} {:<9} {:<10} {}",
                    doc.id,
                    doc.sector.code(),
                    doc.status.to_string(),
                    doc.title
                );
            }
        }
    }
    Ok(())
}

fn run_docs(
    action: &DocsCommand,
    config: &UemaConfig,
    user: &UserContext,
    format: OutputFormat,
) -> Result<()> {
    let mut store = DocumentStore::open(&config.store.path)?;

    match action {
        DocsCommand::Import { file } => {
            let json = std::fs::read_to_string(file)
                .into_diagnostic()
                .wrap_err(format!("reading {}", file.display()))?;
            let count = store
                .import_json(&json, user)
                .wrap_err(format!("importing {}", file.display()))?;
            println!("Imported {count} documents into {}", config.store.path.display());
        }
        DocsCommand::List => {
            let documents: Vec<Document> = store
                .list_documents()?
                .into_iter()
                .filter(|doc| user.can_view(doc))
                .collect();
            print_documents(&documents, format)?;
        }
        DocsCommand::Delete { id } => {
            let doc = store
                .get_document(id)?
                .filter(|doc| user.can_view(doc))
                .ok_or_else(|| UemaError::NotFound(format!("document '{id}'")))?;
            if !user.can_edit(&doc) {
                return Err(UemaError::PermissionDenied(format!(
                    "{} ({}) may not delete document '{id}'",
                    user.name, user.role
                ))
                .into());
            }
            store.delete_document(id)?;
            println!("Deleted document '{id}'");
        }
        DocsCommand::Stats => {
            let stats = store.stats()?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&stats).into_diagnostic()?);
                }
                _ => {
                    println!(
                        "documents:  {} ({} published)",
                        stats.total_documents, stats.published_documents
                    );
                    println!("size:       {} bytes", stats.total_size_bytes);
                    println!("sessions:   {}", stats.total_sessions);
                    println!("messages:   {}", stats.total_messages);
                }
            }
        }
    }

    Ok(())
}

/// Outcome of one `uema doctor` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    /// Neither a pass nor a problem, e.g. running on defaults.
    Info,
}

impl CheckStatus {
    fn symbol(self) -> &'static str {
        match self {
            CheckStatus::Pass => "\u{2713}",
            CheckStatus::Fail => "\u{2717}",
            CheckStatus::Info => "~",
        }
    }

    /// ANSI color code for the symbol.
    fn color(self) -> u8 {
        match self {
            CheckStatus::Pass => 32,
            CheckStatus::Fail => 31,
            CheckStatus::Info => 33,
        }
    }
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
            hint: None,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn marker(&self, use_color: bool) -> String {
        let symbol = self.status.symbol();
        if use_color {
            format!("\x1b[{}m{symbol}\x1b[0m", self.status.color())
        } else {
            symbol.to_string()
        }
    }
}

/// Number of checks with the given status.
fn count_status(checks: &[DoctorCheck], status: CheckStatus) -> usize {
    checks.iter().filter(|c| c.status == status).count()
}

fn run_doctor(
    config_path: Option<&Path>,
    config: &UemaConfig,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    use CheckStatus::{Fail, Info, Pass};

    let mut checks: Vec<DoctorCheck> = Vec::new();

    let path = config_path.unwrap_or(Path::new(CONFIG_FILE));
    checks.push(if path.exists() {
        DoctorCheck::new("config_file", Pass, format!("{} loaded", path.display()))
    } else {
        DoctorCheck::new(
            "config_file",
            Info,
            "no .uema.toml, using defaults (run 'uema init' to create one)",
        )
    });

    let file_key = config
        .provider
        .api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());
    checks.push(match config.provider.resolved_api_key() {
        Some(_) if file_key => DoctorCheck::new("provider_api_key", Pass, "set in config file"),
        Some(_) => DoctorCheck::new("provider_api_key", Pass, format!("{API_KEY_ENV} set")),
        None => DoctorCheck::new(
            "provider_api_key",
            Fail,
            "not set; search runs in keyword mode and chat cannot answer",
        )
        .with_hint(format!(
            "Set {API_KEY_ENV} or add api_key under [provider] in .uema.toml"
        )),
    });

    checks.push(DoctorCheck::new(
        "models",
        Info,
        format!(
            "{} | {} | {} at {}",
            config.provider.embed_model,
            config.provider.rerank_model,
            config.provider.chat_model,
            config.provider.base_url
        ),
    ));

    let store_path = &config.store.path;
    checks.push(if store_path.exists() {
        match DocumentStore::open(store_path).and_then(|store| store.stats()) {
            Ok(stats) if stats.total_documents > 0 => DoctorCheck::new(
                "document_store",
                Pass,
                format!(
                    "{} documents ({} published) in {}",
                    stats.total_documents,
                    stats.published_documents,
                    store_path.display()
                ),
            ),
            Ok(_) => DoctorCheck::new(
                "document_store",
                Fail,
                format!("{} is empty", store_path.display()),
            )
            .with_hint("Run 'uema docs import <file.json> --role admin'"),
            Err(e) => DoctorCheck::new(
                "document_store",
                Fail,
                format!("cannot open {}: {e}", store_path.display()),
            )
            .with_hint("Check the [store] path in .uema.toml"),
        }
    } else {
        DoctorCheck::new(
            "document_store",
            Fail,
            format!("{} not found", store_path.display()),
        )
        .with_hint("Run 'uema docs import <file.json> --role admin' to create it")
    });

    let version = env!("CARGO_PKG_VERSION");
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            println!("uema v{version} - Environment Check\n");

            for check in &checks {
                let label = check.name.replace('_', " ");
                println!("  {} {label:<18} {}", check.marker(use_color), check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            println!(
                "\n{} checks passed, {} failed, {} info",
                count_status(&checks, Pass),
                count_status(&checks, Fail),
                count_status(&checks, Info)
            );
        }
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# UEMA Digital configuration

[provider]
# Cohere-compatible API. The key may also come from COHERE_API_KEY.
# api_key = "..."
# base_url = "https://api.cohere.ai"
# embed_model = "embed-multilingual-v3.0"
# rerank_model = "rerank-multilingual-v3.0"
# chat_model = "command-r-plus"
# timeout_secs = 30

[retrieval]
# top_k = 5
# Candidate sets larger than this use the reranker.
# rerank_threshold = 10
# cache_capacity = 1024
# cache_prefix_chars = 512
# rerank_content_chars = 1000

[chat]
# temperature = 0.3
# excerpt_chars = 500
# history_limit = 10

[store]
# path = ".uema/store.db"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };
    init_tracing(cli.verbose, use_color);

    let config = load_config(cli.config.as_deref())?;

    let mut user = UserContext::new(cli.user.clone(), cli.role);
    if let Some(sector) = cli.sector {
        user = user.with_sector(sector);
    }
    tracing::debug!(user = %user.name, role = %user.role, format = %cli.format, "starting");

    match cli.command {
        None => {
            print_welcome(use_color);
        }
        Some(Command::Search { ref query, limit }) => {
            let mut config = config;
            if let Some(limit) = limit {
                config.retrieval.top_k = limit.max(1);
            }
            let store = DocumentStore::open(&config.store.path)?;
            let assistant = Assistant::from_config(store, &config)?;
            let retrieval = assistant.search(&user, query, &interrupt_token()).await?;
            if retrieval.cancelled {
                return Err(UemaError::Cancelled.into());
            }
            print_retrieval(&retrieval, cli.format)?;
        }
        Some(Command::Chat {
            ref message,
            session,
        }) => {
            let store = DocumentStore::open(&config.store.path)?;
            let assistant = Assistant::from_config(store, &config)?;
            let answer = assistant
                .ask(&user, session, message, &interrupt_token())
                .await?;
            print_answer(&answer, cli.format)?;
        }
        Some(Command::Sessions) => {
            let store = DocumentStore::open(&config.store.path)?;
            let sessions = store.list_sessions(&user.name)?;
            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&sessions).into_diagnostic()?);
                }
                _ => {
                    if sessions.is_empty() {
                        println!("No chat sessions for {}.", user.name);
                    }
                    for s in &sessions {
                        println!(
                            "{:>5}  {}  {} messages",
                            s.id,
                            s.created_at.format("%Y-%m-%d %H:%M"),
                            s.message_count
                        );
                    }
                }
            }
        }
        Some(Command::Docs { ref action }) => {
            run_docs(action, &config, &user, cli.format)?;
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Doctor) => {
            run_doctor(cli.config.as_deref(), &config, cli.format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "uema", &mut std::io::stdout());
        }
    }

    Ok(())
}
