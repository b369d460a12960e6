//! Slash commands understood by the interactive session.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Help,
    Chats,
    New,
    Open,
    Delete,
    Show,
    Memories,
    Stage,
    Whoami,
    Log,
    Quit,
}

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub kind: CommandKind,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        kind: CommandKind::Help,
    },
    Command {
        name: "chats",
        usage: "/chats",
        help: "Refresh and list your chats.",
        kind: CommandKind::Chats,
    },
    Command {
        name: "new",
        usage: "/new [message]",
        help: "Start a new chat, optionally with an opening message.",
        kind: CommandKind::New,
    },
    Command {
        name: "open",
        usage: "/open <n|id>",
        help: "Open a chat by list number or id.",
        kind: CommandKind::Open,
    },
    Command {
        name: "delete",
        usage: "/delete <n|id>",
        help: "Delete a chat.",
        kind: CommandKind::Delete,
    },
    Command {
        name: "show",
        usage: "/show",
        help: "Show the open conversation again.",
        kind: CommandKind::Show,
    },
    Command {
        name: "memories",
        usage: "/memories [on|off]",
        help: "Toggle related memories under your messages.",
        kind: CommandKind::Memories,
    },
    Command {
        name: "stage",
        usage: "/stage [acquaintance|friend|girlfriend]",
        help: "Show or change the relationship stage.",
        kind: CommandKind::Stage,
    },
    Command {
        name: "whoami",
        usage: "/whoami",
        help: "Show the signed-in profile.",
        kind: CommandKind::Whoami,
    },
    Command {
        name: "log",
        usage: "/log [file]",
        help: "Log the conversation to a file, or pause/resume logging.",
        kind: CommandKind::Log,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Leave the session.",
        kind: CommandKind::Quit,
    },
];

pub enum Input<'a> {
    Empty,
    Message(&'a str),
    Command {
        command: &'static Command,
        args: &'a str,
    },
    Unknown(&'a str),
}

/// A leading `/` starts a command; anything else is a message.
pub fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Input::Message(trimmed);
    };
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    match find_command(name) {
        Some(command) => Input::Command { command, args },
        None => Input::Unknown(name),
    }
}

pub fn help_text() -> String {
    let width = COMMANDS
        .iter()
        .map(|command| command.usage.len())
        .max()
        .unwrap_or(0);
    let mut out = String::from("Commands:\n");
    for command in COMMANDS {
        out.push_str(&format!("  {:<width$}  {}\n", command.usage, command.help));
    }
    out.push_str("Anything else is sent to the open chat.\n");
    out
}
