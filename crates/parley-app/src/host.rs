//! Line-oriented terminal host.
//!
//! Owns the session and the caller identity, turns input lines into
//! commands or chat turns, and renders replies. Everything it shows about a
//! conversation is read back from the session after each turn.

use std::io::Write;
use std::path::{Path, PathBuf};

use parley_chat::{ChatError, ChatOrchestrator, TurnOutcome};
use parley_core::{ContextField, Role, Session, SessionExport};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Prompts offered by `/samples`.
pub const SAMPLE_PROMPTS: [&str; 4] = [
    "Hello! How can you help me?",
    "What's the weather like?",
    "Tell me a joke",
    "Explain artificial intelligence",
];

const HELP: &str = "\
Commands:
  /help                      show this help
  /status                    conversation, message count and token usage
  /clear                     clear the chat (keeps patient context)
  /new                       start a new session (clears context too)
  /export [path]             save the transcript as JSON
  /user <id>                 change the caller id
  /context                   show patient context
  /context <field> <value>   set age, symptoms, history, medications or urgency
  /context clear             clear patient context
  /samples                   list sample prompts
  /sample <n>                send sample prompt n
  /quit                      exit
Anything else is sent as a message.";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Clear,
    New,
    Export(Option<PathBuf>),
    User(String),
    ShowContext,
    SetContext(ContextField, String),
    ClearContext,
    Samples,
    Sample(usize),
    Quit,
    Send(String),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(Command::Send(line.to_string())));
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    let command = match name {
        "/help" | "/?" => Command::Help,
        "/status" => Command::Status,
        "/clear" => Command::Clear,
        "/new" => Command::New,
        "/quit" | "/exit" => Command::Quit,
        "/samples" => Command::Samples,
        "/export" => Command::Export((!rest.is_empty()).then(|| PathBuf::from(rest))),
        "/user" => {
            if rest.is_empty() {
                return Err("usage: /user <id>".to_string());
            }
            Command::User(rest.to_string())
        }
        "/sample" => {
            let n: usize = rest
                .parse()
                .map_err(|_| format!("usage: /sample <1-{}>", SAMPLE_PROMPTS.len()))?;
            if n == 0 || n > SAMPLE_PROMPTS.len() {
                return Err(format!("no sample {}; choose 1-{}", n, SAMPLE_PROMPTS.len()));
            }
            Command::Sample(n)
        }
        "/context" => {
            if rest.is_empty() {
                Command::ShowContext
            } else if rest == "clear" {
                Command::ClearContext
            } else {
                let (field, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "usage: /context <field> <value>".to_string())?;
                let field: ContextField = field.parse().map_err(|e| format!("{}", e))?;
                Command::SetContext(field, value.trim().to_string())
            }
        }
        other => return Err(format!("unknown command {}; try /help", other)),
    };
    Ok(Some(command))
}

/// Interactive host state.
pub struct Host {
    orchestrator: ChatOrchestrator,
    session: Session,
    user_id: String,
    export_dir: PathBuf,
}

impl Host {
    pub fn new(orchestrator: ChatOrchestrator, user_id: impl Into<String>) -> Self {
        Self {
            orchestrator,
            session: Session::new(),
            user_id: user_id.into(),
            export_dir: PathBuf::from("."),
        }
    }

    /// Directory used by `/export` without a path.
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Read lines until EOF or `/quit`.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(out, "Welcome! Ask me anything to get started. Type /help for commands.")?;
        let mut lines = input.lines();
        loop {
            write!(out, "> ")?;
            out.flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            match parse_command(&line) {
                Ok(Some(command)) => {
                    if !self.execute(command, out).await? {
                        break;
                    }
                }
                Ok(None) => {}
                Err(msg) => writeln!(out, "{}", msg)?,
            }
        }
        Ok(())
    }

    /// Execute one command. Returns `false` when the host should exit.
    pub async fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> std::io::Result<bool> {
        match command {
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Status => {
                writeln!(out, "{}", self.session.status())?;
                writeln!(out, "user: {}", self.user_id)?;
            }
            Command::Clear => {
                self.session.reset();
                writeln!(out, "Chat cleared.")?;
            }
            Command::New => {
                self.session.reset();
                self.session.clear_context();
                writeln!(out, "New session started.")?;
            }
            Command::Export(path) => match self.export(path.as_deref()) {
                Ok(written) => writeln!(out, "Transcript saved to {}", written.display())?,
                Err(e) => writeln!(out, "Export failed: {}", e)?,
            },
            Command::User(id) => {
                self.user_id = id;
                writeln!(out, "User id set to {}", self.user_id)?;
            }
            Command::ShowContext => {
                let entries = self.session.context.entries();
                if entries.is_empty() {
                    writeln!(out, "No patient context set.")?;
                }
                for (field, value) in entries {
                    writeln!(out, "{}: {}", field.label(), value)?;
                }
            }
            Command::SetContext(field, value) => {
                let value = (!value.is_empty()).then_some(value);
                self.session.context.set(field, value);
                writeln!(out, "{} updated.", field.label())?;
            }
            Command::ClearContext => {
                self.session.clear_context();
                writeln!(out, "Patient context cleared.")?;
            }
            Command::Samples => {
                for (i, prompt) in SAMPLE_PROMPTS.iter().enumerate() {
                    writeln!(out, "  {}. {}", i + 1, prompt)?;
                }
            }
            Command::Sample(n) => match n.checked_sub(1).and_then(|i| SAMPLE_PROMPTS.get(i)) {
                Some(prompt) => {
                    writeln!(out, "you: {}", prompt)?;
                    self.send(prompt, out).await?;
                }
                None => writeln!(out, "no sample {}", n)?,
            },
            Command::Send(text) => self.send(&text, out).await?,
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    async fn send<W: Write>(&mut self, text: &str, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "Thinking...")?;
        match self
            .orchestrator
            .handle_message(&mut self.session, text, &self.user_id)
            .await
        {
            Ok(reply) => {
                match reply.outcome {
                    TurnOutcome::Failed(_) => writeln!(out, "assistant (error): {}", reply.display_text)?,
                    TurnOutcome::Discarded => {}
                    TurnOutcome::Answered | TurnOutcome::Fallback => {
                        writeln!(out, "assistant: {}", reply.display_text)?
                    }
                }
                tracing::debug!(attempts = reply.attempts.len(), "Reply rendered");
            }
            Err(ChatError::EmptyMessage) => {}
            Err(e) => writeln!(out, "{}", e)?,
        }
        Ok(())
    }

    fn export(&self, path: Option<&Path>) -> Result<PathBuf, ChatError> {
        if !self.session.history().iter().any(|m| m.role == Role::User) {
            return Err(ChatError::Export("nothing to export yet".to_string()));
        }
        let export = SessionExport::new(&self.session, chrono::Local::now());
        let target = match path {
            Some(p) if p.is_dir() => p.join(export.file_name()),
            Some(p) => p.to_path_buf(),
            None => self.export_dir.join(export.file_name()),
        };
        let json = export
            .to_json()
            .map_err(|e| ChatError::Export(e.to_string()))?;
        std::fs::write(&target, json).map_err(|e| ChatError::Export(e.to_string()))?;
        tracing::info!(path = %target.display(), "Transcript exported");
        Ok(target)
    }
}
