//! Line-based interactive chat session.
//!
//! Input lines and chat-list refresh events are handled on one task; a
//! refresh that lands while a reply is pending is shown right after it.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::api::{Chat, Message, RelationshipStage, Role};
use crate::auth::AuthManager;
use crate::core::chat::{ChatPoller, ChatService, PollEvent, SendOutcome, SkipReason};
use crate::ui::commands::{help_text, parse_input, CommandKind, Input};
use crate::ui::{conversation, render};
use crate::utils::transcript::TranscriptLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    Quit,
}

pub struct Repl<W: Write> {
    auth: Arc<AuthManager>,
    chats: ChatService,
    transcript: TranscriptLog,
    show_memories: bool,
    poll_interval: Duration,
    out: W,
}

impl<W: Write> Repl<W> {
    pub fn new(
        auth: Arc<AuthManager>,
        chats: ChatService,
        transcript: TranscriptLog,
        show_memories: bool,
        poll_interval: Duration,
        out: W,
    ) -> Self {
        Self {
            auth,
            chats,
            transcript,
            show_memories,
            poll_interval,
            out,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    fn print_error(&mut self, err: &dyn Error) {
        let _ = writeln!(self.out, "❌ {err}");
    }

    fn prompt(&mut self) -> std::io::Result<()> {
        write!(self.out, "> ")?;
        self.out.flush()
    }

    /// Loads chats, then reads lines until EOF or `/quit` while the poller
    /// refreshes the list in the background.
    pub async fn run<R>(&mut self, input: R) -> Result<(), Box<dyn Error>>
    where
        R: AsyncBufRead + Unpin,
    {
        if let Some(user) = self.auth.current_user()? {
            writeln!(self.out, "{}", render::profile_header(&user))?;
        }
        match self.chats.fetch_chats(false).await {
            Ok(_) => {
                let store = self.chats.snapshot();
                write!(self.out, "{}", render::chat_list(store.chats(), store.current_id()))?;
            }
            Err(err) => self.print_error(&err),
        }
        write!(self.out, "{}", render::welcome())?;

        let (poller, mut events) = ChatPoller::spawn(self.chats.clone(), self.poll_interval);
        let mut lines = input.lines();
        self.prompt()?;

        let result = loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => break Ok(()),
                        Err(err) => break Err(err.into()),
                    };
                    if self.handle_line(&line).await == CommandResult::Quit {
                        break Ok(());
                    }
                    self.prompt()?;
                }
                Some(event) = events.recv() => {
                    self.on_poll_event(event)?;
                }
            }
        };

        poller.stop().await;
        result
    }

    fn on_poll_event(&mut self, event: PollEvent) -> std::io::Result<()> {
        match event {
            PollEvent::ChatsChanged { count } => {
                writeln!(self.out)?;
                writeln!(self.out, "↻ Chat list updated ({count} chats)")?;
                self.prompt()
            }
        }
    }

    /// Handles one input line. Failures are printed and the session goes on.
    pub async fn handle_line(&mut self, line: &str) -> CommandResult {
        let result = match parse_input(line) {
            Input::Empty => Ok(CommandResult::Continue),
            Input::Message(text) => self.send(text).await.map(|_| CommandResult::Continue),
            Input::Command { command, args } => self.dispatch(command.kind, args).await,
            Input::Unknown(name) => {
                let _ = writeln!(
                    self.out,
                    "Unknown command '/{name}'. Type /help for the list."
                );
                Ok(CommandResult::Continue)
            }
        };
        result.unwrap_or_else(|err| {
            self.print_error(&*err);
            CommandResult::Continue
        })
    }

    async fn dispatch(
        &mut self,
        kind: CommandKind,
        args: &str,
    ) -> Result<CommandResult, Box<dyn Error>> {
        match kind {
            CommandKind::Help => write!(self.out, "{}", help_text())?,
            CommandKind::Chats => {
                self.chats.fetch_chats(false).await?;
                let store = self.chats.snapshot();
                write!(self.out, "{}", render::chat_list(store.chats(), store.current_id()))?;
            }
            CommandKind::New => {
                let message = (!args.is_empty()).then_some(args);
                let chat = self.chats.create_chat(message).await?;
                self.log_transcript(&chat.messages);
                write!(self.out, "{}", render::conversation(&chat))?;
            }
            CommandKind::Open => {
                let chat = self.chats.select(args)?;
                self.print_conversation(&chat).await?;
            }
            CommandKind::Delete => {
                let chat = self.chats.resolve(args)?;
                let was_open = self.chats.delete_chat(&chat.chat_id).await?;
                writeln!(
                    self.out,
                    "Deleted \"{}\"",
                    render::truncate(chat.title(), render::TITLE_WIDTH)
                )?;
                if was_open {
                    write!(self.out, "{}", render::welcome())?;
                }
            }
            CommandKind::Show => match self.chats.snapshot().current().cloned() {
                Some(chat) => self.print_conversation(&chat).await?,
                None => write!(self.out, "{}", render::welcome())?,
            },
            CommandKind::Memories => {
                match args.to_ascii_lowercase().as_str() {
                    "" => {}
                    "on" => self.show_memories = true,
                    "off" => self.show_memories = false,
                    other => return Err(format!("Expected on or off, got '{other}'").into()),
                }
                let state = if self.show_memories { "on" } else { "off" };
                writeln!(self.out, "Related memories: {state}")?;
            }
            CommandKind::Stage => self.stage(args).await?,
            CommandKind::Whoami => match self.auth.current_user()? {
                Some(user) => writeln!(self.out, "{}", render::profile_header(&user))?,
                None => writeln!(self.out, "No profile stored for {}", self.auth.account())?,
            },
            CommandKind::Log => {
                let status = if args.is_empty() {
                    self.transcript.toggle_logging()?
                } else {
                    self.transcript.set_log_file(PathBuf::from(args))?
                };
                writeln!(self.out, "{status}")?;
            }
            CommandKind::Quit => return Ok(CommandResult::Quit),
        }
        Ok(CommandResult::Continue)
    }

    async fn stage(&mut self, args: &str) -> Result<(), Box<dyn Error>> {
        if args.is_empty() {
            let current = self
                .auth
                .current_user()?
                .map(|user| user.stage())
                .unwrap_or_default();
            let options: Vec<&str> = RelationshipStage::ALL.iter().map(|s| s.as_str()).collect();
            writeln!(
                self.out,
                "Relationship stage: {} (options: {})",
                current.label(),
                options.join(", ")
            )?;
            return Ok(());
        }
        let stage: RelationshipStage = args.parse()?;
        self.auth.update_stage(stage).await?;
        writeln!(self.out, "Relationship stage set to {}", stage.label())?;
        Ok(())
    }

    async fn send(&mut self, text: &str) -> Result<(), Box<dyn Error>> {
        let messages = match self.chats.send_message(text).await? {
            SendOutcome::Sent(messages) => messages,
            SendOutcome::Skipped(SkipReason::Empty) => return Ok(()),
            SendOutcome::Skipped(reason) => {
                writeln!(self.out, "{reason}")?;
                return Ok(());
            }
        };
        self.log_transcript(&messages);

        for message in &messages {
            match message.role {
                // The user's own line is already on screen; only its mood is new.
                Role::User => {
                    if let Some(mood) = &message.sentiment {
                        writeln!(self.out, "  {}", render::sentiment(mood))?;
                    }
                }
                Role::Assistant => write!(self.out, "{}", render::message(message))?,
            }
        }

        if self.show_memories {
            let memories = conversation::memories_after_send(&self.chats, &messages, text).await;
            write!(self.out, "{memories}")?;
        }
        Ok(())
    }

    /// With memories on, each user message is followed by its lookups.
    async fn print_conversation(&mut self, chat: &Chat) -> std::io::Result<()> {
        let text = if self.show_memories {
            conversation::with_memories(&self.chats, chat).await
        } else {
            render::conversation(chat)
        };
        write!(self.out, "{text}")
    }

    fn log_transcript(&mut self, messages: &[Message]) {
        if let Err(err) = self.transcript.log_messages(messages) {
            self.print_error(&*err);
        }
    }
}
