//! One-shot chat exchange from the command line

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::chat::ChatClient;
use crate::api::models::HttpModelDirectory;
use crate::core::catalog::{Catalog, CatalogStore};
use crate::core::chat_stream::{ChatStreamService, StreamMessage, StreamParams};
use crate::core::config::Config;
use crate::core::error::ChatError;
use crate::core::image::encode_image_file;
use crate::core::message::{Message, NewMessage};
use crate::core::request::{RequestConfig, RequestOptions};
use crate::core::store::{HistoryStore, Preferences};
use crate::core::wire::to_wire_format;
use crate::utils::auth::{resolve_credential, API_KEY_ENV};
use crate::utils::logging::TranscriptLog;

pub const IMAGE_ONLY_TEXT: &str = "Sent an image";

pub struct ChatArgs {
    pub prompt: Vec<String>,
    pub image: Option<PathBuf>,
    pub model: Option<String>,
    pub no_stream: bool,
    pub no_system_prompt: bool,
}

/// Model for this exchange: `--model`, then the stored selection if the
/// user picked one, then the config file, then the stored default.
pub fn pick_model(explicit: Option<&str>, prefs: &Preferences, config: &Config) -> String {
    if let Some(model) = explicit.map(str::trim).filter(|m| !m.is_empty()) {
        return model.to_string();
    }
    if prefs.model_chosen && !prefs.selected_model.trim().is_empty() {
        return prefs.selected_model.clone();
    }
    config
        .default_model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| Preferences::default().selected_model)
}

/// Image attachments need a vision model; fall back to the catalog default.
pub fn model_for_attachment(model: String, has_image: bool, catalog: &Catalog) -> String {
    if has_image && !catalog.supports_images(&model) {
        catalog.default_image_model().to_string()
    } else {
        model
    }
}

pub fn request_options(
    credential: Option<String>,
    model: String,
    history: &[Message],
    prefs: &Preferences,
    args: &ChatArgs,
) -> RequestOptions {
    RequestOptions {
        credential: credential.unwrap_or_default(),
        model,
        messages: to_wire_format(history, !args.no_system_prompt),
        temperature: Some(prefs.temperature),
        top_p: Some(prefs.top_p),
        stream: Some(!args.no_stream),
        max_tokens: None,
        data_collection: prefs.data_collection,
        training_data: prefs.training_data,
        output_publishing: prefs.output_publishing,
    }
}

pub async fn run_chat(args: ChatArgs, transcript: Option<TranscriptLog>) -> Result<(), Box<dyn Error>> {
    let prompt = args.prompt.join(" ").trim().to_string();
    if prompt.is_empty() && args.image.is_none() {
        eprintln!("Usage: routechat chat <prompt> [--image PATH]");
        std::process::exit(1);
    }

    let config = Config::load()?;
    let mut store = HistoryStore::open_default()?;
    let mut prefs = store.preferences();
    let credential = resolve_credential(&prefs.api_key, std::env::var(API_KEY_ENV).ok());

    let base_url = config.base_url();
    let http = reqwest::Client::new();
    let catalog_store = CatalogStore::with_builtin(config.catalog_policy());
    let directory = HttpModelDirectory::new(http.clone(), base_url.clone());
    let outcome = catalog_store
        .refresh(&directory, credential.as_deref())
        .await;
    debug!(?outcome, "Catalog refresh before chat");
    let catalog = catalog_store.snapshot();

    let image_url = match &args.image {
        Some(path) => match encode_image_file(path).await {
            Ok(uri) => Some(uri),
            Err(err) => {
                eprintln!("❌ {err}");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let requested = pick_model(args.model.as_deref(), &prefs, &config);
    let model = model_for_attachment(requested.clone(), image_url.is_some(), &catalog);
    if model != requested {
        eprintln!("🖼️  {requested} does not accept images; switching to {model}");
        prefs.choose_model(model.clone());
        store.set_preferences(&prefs)?;
    }

    let content = if prompt.is_empty() {
        IMAGE_ONLY_TEXT.to_string()
    } else {
        prompt
    };
    let mut user_message = NewMessage::user(content);
    if let Some(uri) = image_url {
        user_message = user_message.with_image(uri);
    }
    let user_message = user_message.into_message();

    let mut history = store.messages();
    history.push(user_message.clone());
    let options = request_options(credential, model.clone(), &history, &prefs, &args);
    let request = match config.request_builder().build(options) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("❌ {}", err.user_message());
            std::process::exit(1);
        }
    };

    store.push_message(user_message.clone())?;
    store.save()?;
    if let Some(log) = &transcript {
        log.log_message(&user_message)?;
    }

    let client = ChatClient::new(http, base_url);
    let (answer, failure) = if request.stream {
        stream_answer(client, request).await?
    } else {
        match client.complete(&request).await {
            Ok(text) => {
                print!("{text}");
                (text, None)
            }
            Err(err) => (String::new(), Some(err)),
        }
    };
    println!();

    if !answer.is_empty() {
        let stored = store.append_message(NewMessage::assistant(answer, Some(model)))?;
        if let Some(log) = &transcript {
            log.log_message(&stored)?;
        }
    }
    store.save()?;

    if let Some(err) = failure {
        if let Some(log) = &transcript {
            log.log_note(&format!("Error: {}", err.user_message()))?;
        }
        eprintln!("❌ Error: {}", err.user_message());
        std::process::exit(1);
    }

    info!("Chat exchange complete");
    Ok(())
}

type StreamReceiver = mpsc::UnboundedReceiver<(StreamMessage, u64)>;

/// Accumulated streamed reply.
#[derive(Debug, Default)]
struct StreamedAnswer {
    text: String,
    failure: Option<ChatError>,
}

impl StreamedAnswer {
    /// Record one message; returns `false` once the stream has ended.
    fn absorb(
        &mut self,
        message: Option<StreamMessage>,
        out: &mut impl Write,
    ) -> io::Result<bool> {
        match message {
            Some(StreamMessage::Chunk(content)) => {
                self.text.push_str(&content);
                write!(out, "{content}")?;
                out.flush()?;
                Ok(true)
            }
            Some(StreamMessage::Error(err)) => {
                self.failure = Some(err);
                Ok(true)
            }
            Some(StreamMessage::End) | None => Ok(false),
        }
    }

    /// Take whatever the stream task queued before it was cancelled.
    fn drain(&mut self, rx: &mut StreamReceiver, out: &mut impl Write) -> io::Result<()> {
        while let Ok((message, _)) = rx.try_recv() {
            if !self.absorb(Some(message), out)? {
                break;
            }
        }
        Ok(())
    }
}

/// Print fragments as they arrive. Ctrl+C cancels the stream and keeps what
/// has been received so far.
async fn stream_answer(
    client: ChatClient,
    request: RequestConfig,
) -> Result<(String, Option<ChatError>), Box<dyn Error>> {
    let cancel_token = CancellationToken::new();
    let (stream_service, mut rx) = ChatStreamService::new();
    let handle = stream_service.spawn_stream(StreamParams {
        client,
        config: request,
        cancel_token: cancel_token.clone(),
        stream_id: 1,
    });
    drop(stream_service);

    let mut stdout = io::stdout();
    let mut answer = StreamedAnswer::default();
    loop {
        tokio::select! {
            message = rx.recv() => {
                if !answer.absorb(message.map(|(message, _)| message), &mut stdout)? {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                cancel_token.cancel();
                answer.drain(&mut rx, &mut stdout)?;
                eprintln!("\n⏹️  Interrupted");
                break;
            }
        }
    }

    let _ = handle.await;
    Ok((answer.text, answer.failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{CatalogPolicy, DEFAULT_IMAGE_MODEL};
    use crate::core::builtin_models::load_builtin_catalog;
    use crate::api::{DataPolicy, WireContent, WireRole};

    fn chat_args(no_stream: bool, no_system_prompt: bool) -> ChatArgs {
        ChatArgs {
            prompt: vec!["hello".into()],
            image: None,
            model: None,
            no_stream,
            no_system_prompt,
        }
    }

    #[test]
    fn explicit_model_wins() {
        let config = Config {
            default_model: Some("openai/gpt-4o".into()),
            ..Config::default()
        };
        let prefs = Preferences::default();
        assert_eq!(
            pick_model(Some("x-ai/grok-4"), &prefs, &config),
            "x-ai/grok-4"
        );
        assert_eq!(pick_model(Some("  "), &prefs, &config), "openai/gpt-4o");
    }

    #[test]
    fn stored_choice_beats_config_default() {
        let config = Config {
            default_model: Some("openai/gpt-4o".into()),
            ..Config::default()
        };
        let mut prefs = Preferences::default();
        assert_eq!(pick_model(None, &prefs, &config), "openai/gpt-4o");

        prefs.choose_model("anthropic/claude-3.5-sonnet");
        assert_eq!(
            pick_model(None, &prefs, &config),
            "anthropic/claude-3.5-sonnet"
        );
        assert_eq!(
            pick_model(None, &Preferences::default(), &Config::default()),
            DEFAULT_IMAGE_MODEL
        );
    }

    #[test]
    fn explicitly_set_default_model_beats_config() {
        let config = Config {
            default_model: Some("openai/gpt-4o".into()),
            ..Config::default()
        };
        let mut prefs = Preferences::default();
        prefs.apply_setting("model", DEFAULT_IMAGE_MODEL).unwrap();
        assert_eq!(pick_model(None, &prefs, &config), DEFAULT_IMAGE_MODEL);

        prefs.clear_setting("model").unwrap();
        assert_eq!(pick_model(None, &prefs, &config), "openai/gpt-4o");
    }

    #[test]
    fn queued_chunks_are_kept_after_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send((StreamMessage::Chunk("Hel".into()), 1)).unwrap();
        tx.send((StreamMessage::Chunk("lo".into()), 1)).unwrap();
        tx.send((StreamMessage::End, 1)).unwrap();
        tx.send((StreamMessage::Chunk("late".into()), 1)).unwrap();

        let mut answer = StreamedAnswer::default();
        let mut out = Vec::new();
        assert!(answer
            .absorb(Some(StreamMessage::Chunk("Say: ".into())), &mut out)
            .unwrap());
        answer.drain(&mut rx, &mut out).unwrap();

        assert_eq!(answer.text, "Say: Hello");
        assert_eq!(String::from_utf8(out).unwrap(), "Say: Hello");
        assert!(answer.failure.is_none());
    }

    #[test]
    fn stream_errors_are_recorded_and_end_stops() {
        let mut answer = StreamedAnswer::default();
        let mut out = Vec::new();
        let err = ChatError::NetworkFailure("reset".into());
        assert!(answer
            .absorb(Some(StreamMessage::Error(err.clone())), &mut out)
            .unwrap());
        assert!(!answer.absorb(Some(StreamMessage::End), &mut out).unwrap());
        assert!(!answer.absorb(None, &mut out).unwrap());
        assert_eq!(answer.failure, Some(err));
        assert!(out.is_empty());
    }

    #[test]
    fn images_switch_to_a_vision_model() {
        let catalog = load_builtin_catalog(&CatalogPolicy::default());
        assert_eq!(
            model_for_attachment("openai/gpt-oss-120b:free".into(), true, &catalog),
            DEFAULT_IMAGE_MODEL
        );
        assert_eq!(
            model_for_attachment("openai/gpt-oss-120b:free".into(), false, &catalog),
            "openai/gpt-oss-120b:free"
        );
        assert_eq!(
            model_for_attachment("openai/gpt-4o".into(), true, &catalog),
            "openai/gpt-4o"
        );
    }

    #[test]
    fn options_carry_preferences_and_flags() {
        let mut prefs = Preferences::default();
        prefs.temperature = 0.2;
        prefs.data_collection = Some(DataPolicy::Allow);
        let history = vec![NewMessage::user("hello").into_message()];

        let options = request_options(
            Some("sk-or-v1-abc".into()),
            "openai/gpt-4o".into(),
            &history,
            &prefs,
            &chat_args(true, false),
        );
        assert_eq!(options.stream, Some(false));
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.data_collection, Some(DataPolicy::Allow));
        assert_eq!(options.training_data, None);
        assert_eq!(options.messages.len(), 2);
        assert_eq!(options.messages[0].role, WireRole::System);

        let bare = request_options(None, "m".into(), &history, &prefs, &chat_args(false, true));
        assert_eq!(bare.credential, "");
        assert_eq!(bare.messages.len(), 1);
        assert_eq!(bare.messages[0].content, WireContent::Text("hello".into()));
    }
}
