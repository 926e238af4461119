//! Chat command - one terminal chat window talking to a relay

use std::future::Future;
use std::io::Write;

use clap::Args;
use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::{
    ChatMessage, ChatProvider, ChatSession, ClientError, CompletedResponse, CompletionEvent,
    CompletionRequest, CompletionStream, RelayClient, Sender,
};
use crate::config::AppConfig;
use crate::domain::{GenerationConfig, ProviderKind};
use crate::infrastructure::logging::{self, LogTarget};

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant answering inside a retro computer terminal. Keep replies concise.";
const DEFAULT_WELCOME: &str = "READY.";

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// Relay base URL (defaults to `client.relay_url` from configuration)
    #[arg(long)]
    pub relay_url: Option<String>,

    /// Session id of this window; a random one is used when omitted
    #[arg(long)]
    pub session: Option<String>,

    /// Provider to use: openai or anthropic
    #[arg(long, default_value = "openai")]
    pub provider: ProviderKind,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Greeting shown at start; kept in history but never sent to the model
    #[arg(long, default_value = DEFAULT_WELCOME)]
    pub welcome: String,
}

/// How one streamed reply ended
#[derive(Debug)]
enum ReplyOutcome {
    Completed(CompletedResponse),
    Failed(ClientError),
    Cancelled,
}

pub async fn run(args: ChatArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging, LogTarget::Stderr);

    let relay_url = args
        .relay_url
        .clone()
        .unwrap_or_else(|| config.client.relay_url.clone());
    let client = RelayClient::new(&relay_url)?;
    let provider = ChatProvider::from_kind(args.provider);

    let session_id = args
        .session
        .clone()
        .unwrap_or_else(|| format!("window-{}", &Uuid::new_v4().simple().to_string()[..8]));
    let mut session = ChatSession::new(session_id);

    check_provider(&client, args.provider).await;

    let mut stdout = std::io::stdout();
    session.push(ChatMessage::welcome(&args.welcome));
    writeln!(stdout, "{}", args.welcome)?;
    writeln!(
        stdout,
        "[{} | session {}] /history shows this window, /quit or Ctrl-D exits, Ctrl-C stops a reply",
        args.provider.display_name(),
        session.id
    )?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let Some(line) = read_prompt(&mut lines, tokio::signal::ctrl_c()).await? else {
            writeln!(stdout)?;
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" => break,
            "/history" => {
                print_history(&mut stdout, &session)?;
                continue;
            }
            _ => {}
        }

        let request = CompletionRequest {
            session_id: session.id.clone(),
            user_text: line.to_string(),
            history: session.history().to_vec(),
            system_prompt: args.system_prompt.clone(),
            config: GenerationConfig {
                provider: None,
                model: args.model.clone(),
                temperature: args.temperature,
                max_tokens: args.max_tokens,
            },
        };

        let stream = provider.stream_completion(&client, request);
        let outcome = stream_reply(stream, &mut stdout, tokio::signal::ctrl_c()).await?;

        match &outcome {
            ReplyOutcome::Completed(response) => {
                debug!(id = %response.id, chars = response.content.len(), "Reply complete");
            }
            ReplyOutcome::Failed(error) => writeln!(stdout, "[error] {}", error)?,
            ReplyOutcome::Cancelled => writeln!(stdout, "[cancelled]")?,
        }
        record_exchange(&mut session, line, outcome);
    }

    Ok(())
}

/// Read the next prompt line. `None` means the window should close: EOF or
/// `cancel` resolved. Once a Ctrl-C listener exists the default SIGINT exit is
/// gone, so the prompt has to listen too.
async fn read_prompt<R, C>(lines: &mut Lines<R>, cancel: C) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    C: Future,
{
    tokio::select! {
        _ = cancel => Ok(None),
        line = lines.next_line() => line,
    }
}

/// Only completed exchanges enter history, so the turns sent next keep
/// alternating user and assistant.
fn record_exchange(session: &mut ChatSession, line: &str, outcome: ReplyOutcome) {
    if let ReplyOutcome::Completed(response) = outcome {
        session.push(ChatMessage::user(line));
        session.push(ChatMessage::assistant(response.content));
    }
}

/// Warn up front when the chosen provider cannot serve this window
async fn check_provider(client: &RelayClient, kind: ProviderKind) {
    match client.providers().await {
        Ok(listing) => {
            let available = listing
                .providers
                .iter()
                .any(|p| p.id == kind.as_str() && p.available);

            if !available {
                eprintln!(
                    "warning: {} is not available on this relay",
                    kind.display_name()
                );
            }
        }
        Err(e) => warn!(error = %e, "Could not query relay providers"),
    }
}

/// Print tokens as they arrive until the stream ends or `cancel` resolves.
/// Cancelling drops the stream, which closes the relay connection.
async fn stream_reply<W, C>(
    mut stream: CompletionStream,
    out: &mut W,
    cancel: C,
) -> std::io::Result<ReplyOutcome>
where
    W: Write,
    C: Future,
{
    tokio::pin!(cancel);
    let mut printed_any = false;

    let outcome = loop {
        tokio::select! {
            _ = &mut cancel => break ReplyOutcome::Cancelled,
            event = stream.next() => match event {
                Some(Ok(CompletionEvent::Token(token))) => {
                    out.write_all(token.as_bytes())?;
                    out.flush()?;
                    printed_any = true;
                }
                Some(Ok(CompletionEvent::Complete(response))) => {
                    break ReplyOutcome::Completed(response);
                }
                Some(Err(error)) => break ReplyOutcome::Failed(error),
                None => {
                    break ReplyOutcome::Failed(ClientError::interrupted(
                        "",
                        "stream ended without a result",
                    ));
                }
            },
        }
    };

    if printed_any {
        writeln!(out)?;
    }

    Ok(outcome)
}

fn print_history<W: Write>(out: &mut W, session: &ChatSession) -> std::io::Result<()> {
    for message in session.history() {
        let who = match message.sender {
            Sender::User => "you",
            Sender::Assistant => "assistant",
            Sender::Welcome => "system",
        };
        writeln!(
            out,
            "[{}] {}: {}",
            message.timestamp.format("%H:%M:%S"),
            who,
            message.content
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use clap::Parser;
    use futures::stream;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ChatArgs,
    }

    fn body(chunks: Vec<Result<&'static str, &'static str>>) -> CompletionStream {
        let chunks: Vec<Result<Bytes, &'static str>> = chunks
            .into_iter()
            .map(|c| c.map(|s| Bytes::from_static(s.as_bytes())))
            .collect();
        CompletionStream::from_body(stream::iter(chunks))
    }

    #[test]
    fn test_args_defaults() {
        let cli = TestCli::parse_from(["chat"]);

        assert_eq!(cli.args.provider, ProviderKind::OpenAi);
        assert_eq!(cli.args.welcome, DEFAULT_WELCOME);
        assert!(cli.args.model.is_none());
    }

    #[test]
    fn test_args_provider_parsing() {
        let cli = TestCli::parse_from(["chat", "--provider", "Anthropic", "--temperature", "0"]);

        assert_eq!(cli.args.provider, ProviderKind::Anthropic);
        assert_eq!(cli.args.temperature, Some(0.0));
        assert!(TestCli::try_parse_from(["chat", "--provider", "gemini"]).is_err());
    }

    #[tokio::test]
    async fn test_stream_reply_prints_tokens() {
        let mut out = Vec::new();
        let outcome = stream_reply(
            body(vec![Ok("HEL"), Ok("LO")]),
            &mut out,
            std::future::pending::<()>(),
        )
        .await
        .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "HELLO\n");
        assert!(matches!(outcome, ReplyOutcome::Completed(ref r) if r.content == "HELLO"));
    }

    #[tokio::test]
    async fn test_stream_reply_reports_interruption() {
        let mut out = Vec::new();
        let outcome = stream_reply(
            body(vec![Ok("HEL"), Err("reset")]),
            &mut out,
            std::future::pending::<()>(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, ReplyOutcome::Failed(ClientError::Interrupted { .. })));
    }

    #[tokio::test]
    async fn test_stream_reply_cancel() {
        let pending = CompletionStream::from_body(stream::pending::<Result<Bytes, &'static str>>());
        let mut out = Vec::new();

        let outcome = stream_reply(pending, &mut out, std::future::ready(()))
            .await
            .unwrap();

        assert!(matches!(outcome, ReplyOutcome::Cancelled));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_read_prompt_returns_line() {
        let mut lines = BufReader::new(&b"hello\n"[..]).lines();

        let line = read_prompt(&mut lines, std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(line.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_read_prompt_stops_on_interrupt() {
        let (_writer, reader) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();

        let line = read_prompt(&mut lines, std::future::ready(())).await.unwrap();

        assert!(line.is_none());
    }

    #[tokio::test]
    async fn test_read_prompt_eof() {
        let mut lines = BufReader::new(&b""[..]).lines();

        let line = read_prompt(&mut lines, std::future::pending::<()>())
            .await
            .unwrap();

        assert!(line.is_none());
    }

    #[tokio::test]
    async fn test_failed_reply_leaves_history_unchanged() {
        let mut session = ChatSession::new("w");
        session.push(ChatMessage::welcome("READY."));

        let mut out = Vec::new();
        let outcome = stream_reply(body(vec![Err("reset")]), &mut out, std::future::pending::<()>())
            .await
            .unwrap();
        record_exchange(&mut session, "hi", outcome);
        record_exchange(&mut session, "again", ReplyOutcome::Cancelled);

        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn test_completed_reply_records_both_turns() {
        let mut session = ChatSession::new("w");

        let mut out = Vec::new();
        let outcome = stream_reply(body(vec![Ok("HI")]), &mut out, std::future::pending::<()>())
            .await
            .unwrap();
        record_exchange(&mut session, "hello", outcome);

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sender, Sender::User);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].sender, Sender::Assistant);
        assert_eq!(history[1].content, "HI");
    }

    #[test]
    fn test_print_history() {
        let mut session = ChatSession::new("w");
        session.push(ChatMessage::welcome("READY."));
        session.push(ChatMessage::user("hi"));

        let mut out = Vec::new();
        print_history(&mut out, &session).unwrap();
        let printed = String::from_utf8(out).unwrap();

        assert!(printed.contains("system: READY."));
        assert!(printed.contains("you: hi"));
    }
}
