use std::sync::Arc;

use chat_router::config::RouterConfig;
use chat_router::nlu::{IntentDb, KeywordToneClassifier, PatternIntentClassifier};
use chat_router::plugins::{self, PluginRegistry, ProcessSandbox, Sandbox, builtin};
use chat_router::privacy::RegexSanitizer;
use chat_router::responders::{
    DialogueResponder, GenerativeResponder, InMemoryIndex, LocalResponder, Responder,
    RetrievalResponder,
};
use chat_router::router::{FallbackRouter, RouterDeps};
use chat_router::session::{AuditSink, InMemoryAuditSink, InMemorySessionStore, SessionStore};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Worker mode: this binary re-executed by the sandbox. Raw stdio
    // protocol, no tracing, no config.
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some(plugins::worker::WORKER_ARG) {
        let plugin = args.get(2).map(String::as_str).unwrap_or("");
        let sender = args.get(3).map(String::as_str).unwrap_or("");
        std::process::exit(plugins::worker::run(plugin, sender));
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = RouterConfig::from_env()?;

    eprintln!("💬 Chat Router v{}", env!("CARGO_PKG_VERSION"));

    // ── Classification ──────────────────────────────────────────────────
    let intent_db = match &config.intents_path {
        Some(path) => IntentDb::load(path),
        None => IntentDb::default_db(),
    };
    let intent = Arc::new(PatternIntentClassifier::new(intent_db.clone()));
    let tone = Arc::new(KeywordToneClassifier::default_rules());

    // ── Plugins ─────────────────────────────────────────────────────────
    let registry = Arc::new(PluginRegistry::new(
        builtin::default_plugins(),
        config.plugin_mapping_path.clone(),
    ));
    let sandbox: Arc<dyn Sandbox> = Arc::new(ProcessSandbox::new()?);

    // Opt the CLI user into plugins listed in the environment; everything
    // else stays disabled.
    let cli_user = "cli";
    if let Ok(enabled) = std::env::var("CHAT_ROUTER_ENABLED_PLUGINS") {
        for name in enabled.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            registry.enable(cli_user, name).await;
        }
    }
    let enabled = registry.list_enabled(cli_user).await;
    eprintln!(
        "   Plugins: {} registered, {} enabled",
        registry.plugins().len(),
        enabled.len()
    );

    // ── Responder tiers ─────────────────────────────────────────────────
    let dialogue: Option<Arc<dyn Responder>> = if config.dialogue.enabled {
        eprintln!("   Dialogue: {}", config.dialogue.base_url);
        Some(Arc::new(DialogueResponder::new(&config.dialogue)?))
    } else {
        eprintln!("   Dialogue: disabled");
        None
    };

    let documents = match &config.docs_path {
        Some(dir) => load_documents(dir),
        None => Vec::new(),
    };
    eprintln!("   Retrieval: {} documents", documents.len());
    let retrieval: Arc<dyn Responder> = Arc::new(RetrievalResponder::new(
        Arc::new(InMemoryIndex::new(documents)),
        config.retrieval_k,
    ));

    eprintln!(
        "   Generative: {} @ {}",
        config.generative.model, config.generative.api_url
    );
    let generative: Arc<dyn Responder> =
        Arc::new(GenerativeResponder::new(config.generative.clone())?);

    // ── Router ──────────────────────────────────────────────────────────
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let audit: Arc<dyn AuditSink> = Arc::new(InMemoryAuditSink::new());

    let router = FallbackRouter::new(RouterDeps {
        sanitizer: Arc::new(RegexSanitizer::new()),
        tone,
        intent,
        sessions,
        audit,
        registry,
        sandbox,
        dialogue,
        retrieval,
        generative,
        local: LocalResponder::new(intent_db),
        sandbox_timeout: config.sandbox_timeout,
    });

    eprintln!("   Type a message and press Enter. /quit to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "/quit" {
            break;
        }
        let reply = router.route(message, cli_user, None).await;
        match reply.source {
            Some(source) => println!("[{source}] {}", reply.text),
            None => println!("{}", reply.text),
        }
    }

    Ok(())
}

/// Read every regular file in a directory as one retrieval document.
/// Unreadable entries are skipped with a warning.
fn load_documents(dir: &std::path::Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "Docs directory unreadable");
            return Vec::new();
        }
    };
    let mut documents = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => documents.push(content),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable document");
            }
        }
    }
    documents
}
