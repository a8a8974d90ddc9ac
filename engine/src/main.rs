// Yojana Sahayak
// Main entry point for the yojana binary

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use sdk::errors::{EngineError, ErrorExt};
use sdk::profile::UserProfile;
use yojana_engine::agent::{Orchestrator, SessionManager};
use yojana_engine::catalog::SchemeCatalog;
use yojana_engine::cli::{Cli, Command};
use yojana_engine::config::Config;
use yojana_engine::llm::{groq::GroqBackend, LanguageBackend};
use yojana_engine::retrieval::{HttpRetriever, KeywordRetriever, SchemeRetriever};
use yojana_engine::speech::{SpeechClient, SpeechToText, TextToSpeech};
use yojana_engine::store::ProfileStore;
use yojana_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Basic telemetry before config is loaded
    init_telemetry();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load_or_create(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => return Err(startup_failure(e)),
    };

    // Re-initialize with the configured (or overridden) log level
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    tracing::info!("Yojana Sahayak v{}", env!("CARGO_PKG_VERSION"));

    // Catalog and profile store failures abort startup with an
    // operator-facing diagnostic; everything downstream degrades gracefully.
    let catalog = match SchemeCatalog::load(cli.catalog.as_deref()) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => return Err(startup_failure(e)),
    };

    match cli.command {
        Command::Schemes => handle_schemes(&catalog),
        Command::Ask { text, user, voice } => {
            handle_ask(&config, catalog, text, user, voice).await
        }
        Command::Chat { user } => handle_chat(&config, catalog, user).await,
    }
}

fn startup_failure(e: EngineError) -> anyhow::Error {
    eprintln!("error: {}", e);
    eprintln!("hint: {}", e.user_hint());
    anyhow::Error::new(e)
}

fn build_retriever(config: &Config, catalog: &Arc<SchemeCatalog>) -> Arc<dyn SchemeRetriever> {
    match &config.retrieval.base_url {
        Some(base_url) => Arc::new(HttpRetriever::new(
            base_url.clone(),
            Duration::from_secs(config.retrieval.timeout_secs),
        )),
        None => {
            tracing::info!("No retrieval service configured, using catalog keyword search");
            Arc::new(KeywordRetriever::new(Arc::clone(catalog)))
        }
    }
}

async fn open_store(config: &Config) -> anyhow::Result<ProfileStore> {
    let db_path = config.core.data_dir.join("profiles.db");
    ProfileStore::new(&db_path).await.map_err(|e| {
        let err = EngineError::ProfileStore(e.to_string());
        eprintln!("error: {}", err);
        eprintln!("hint: {}", err.user_hint());
        anyhow::Error::new(err)
    })
}

fn handle_schemes(catalog: &SchemeCatalog) -> anyhow::Result<()> {
    println!("{} schemes loaded:\n", catalog.len());
    for scheme in catalog.schemes() {
        println!("  {:<22} {}", scheme.id, scheme.name);
        println!("  {:<22} {} criteria", "", scheme.criteria.len());
    }
    Ok(())
}

/// Resolve the question text, transcribing the voice file when given.
///
/// A transcription failure degrades to a polite request to repeat; it never
/// reaches the orchestrator.
async fn resolve_input(
    config: &Config,
    text: Option<String>,
    voice: Option<std::path::PathBuf>,
) -> anyhow::Result<Option<String>> {
    let Some(path) = voice else {
        return Ok(text);
    };

    let audio = tokio::fs::read(&path).await?;
    let stt = SpeechClient::new(config.speech.clone());
    match stt.transcribe(&audio).await {
        Ok(transcript) => {
            tracing::info!(confidence = transcript.confidence, "Voice input transcribed");
            Ok(Some(transcript.text))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Transcription failed");
            println!("{}", yojana_engine::llm::prompts::repeat_request());
            Ok(None)
        }
    }
}

/// Speak the reply when speech output is enabled; failure degrades to
/// text-only and never blocks the reply.
async fn speak_reply(config: &Config, turn: usize, text: &str) {
    if !config.speech.enabled {
        return;
    }

    let tts = SpeechClient::new(config.speech.clone());
    match tts.synthesize(text).await {
        Ok(clip) => {
            let path = config
                .core
                .data_dir
                .join(format!("reply-{}.{}", turn, clip.format));
            if let Err(e) = tokio::fs::write(&path, &clip.data).await {
                tracing::warn!(error = %e, "Could not write synthesized reply");
            } else {
                println!("(spoken reply saved to {})", path.display());
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Speech synthesis failed, replying with text only");
        }
    }
}

async fn handle_ask(
    config: &Config,
    catalog: Arc<SchemeCatalog>,
    text: Option<String>,
    user: Option<String>,
    voice: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let Some(text) = resolve_input(config, text, voice).await? else {
        return Ok(());
    };

    let store = open_store(config).await?;
    let backend: Arc<dyn LanguageBackend> = Arc::new(GroqBackend::new(config.llm.clone()));
    let retriever = build_retriever(config, &catalog);
    let orchestrator = Orchestrator::new(config, backend, retriever, catalog);

    let profile = match &user {
        Some(user_id) => store.load(user_id).await?.unwrap_or_default(),
        None => UserProfile::default(),
    };

    let mut manager = SessionManager::new(Duration::from_secs(config.agent.session_timeout_secs));
    let session_id = manager.insert(orchestrator.new_session(user, profile));

    if let Some(session) = manager.get_mut(&session_id) {
        let reply = orchestrator.process_turn(session, &text).await;
        println!("{}", reply.text);
        speak_reply(config, 0, &reply.text).await;
    }

    manager.archive(&session_id, &store).await?;
    store.close().await;
    Ok(())
}

async fn handle_chat(
    config: &Config,
    catalog: Arc<SchemeCatalog>,
    user: Option<String>,
) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let backend: Arc<dyn LanguageBackend> = Arc::new(GroqBackend::new(config.llm.clone()));
    let retriever = build_retriever(config, &catalog);
    let orchestrator = Orchestrator::new(config, backend, retriever, catalog);

    let profile = match &user {
        Some(user_id) => store.load(user_id).await?.unwrap_or_default(),
        None => UserProfile::default(),
    };

    let mut manager = SessionManager::new(Duration::from_secs(config.agent.session_timeout_secs));
    let session_id = manager.insert(orchestrator.new_session(user, profile));

    println!("Namaste! Tell me a little about yourself and what you are looking");
    println!("for, and I will try to find government schemes you are eligible");
    println!("for. Type 'exit' to leave.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut turn = 0usize;

    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        if let Some(session) = manager.get_mut(&session_id) {
            let reply = orchestrator.process_turn(session, input).await;
            println!("agent> {}\n", reply.text);
            speak_reply(config, turn, &reply.text).await;
            turn += 1;
        }
    }

    manager.archive(&session_id, &store).await?;
    store.close().await;
    println!("Goodbye!");
    Ok(())
}
