use std::num::ParseIntError;
use std::path::PathBuf;

use snafu::{OptionExt, ResultExt, Snafu, ensure};

/// One line of chat input. Attachment and file numbers are 1-based on screen and 0-based here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Send(String),
    Attach(Vec<PathBuf>),
    Remove(usize),
    Files,
    Open(usize),
    Download { message_id: u64, index: usize },
    History,
    Exit,
    Help,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CommandError {
    #[snafu(display("unknown command `/{name}`, try /help"))]
    UnknownCommand { name: String },
    #[snafu(display("missing argument, usage: {usage}"))]
    MissingArgument { usage: &'static str },
    #[snafu(display("`{raw}` is not a number, usage: {usage}"))]
    InvalidNumber {
        raw: String,
        usage: &'static str,
        source: ParseIntError,
    },
    #[snafu(display("numbering starts at 1, usage: {usage}"))]
    ZeroIndex { usage: &'static str },
}

const ATTACH_USAGE: &str = "/attach <path>...";
const REMOVE_USAGE: &str = "/remove <n>";
const OPEN_USAGE: &str = "/open <n>";
const DOWNLOAD_USAGE: &str = "/download <message> <n>";

/// Parses a chat line. Blank lines yield `None`; `//text` sends `/text` verbatim.
pub fn parse_command(line: &str) -> Result<Option<ChatCommand>, CommandError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Some(escaped) = trimmed.strip_prefix("//") {
        return Ok(Some(ChatCommand::Send(format!("/{escaped}"))));
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Some(ChatCommand::Send(trimmed.to_string())));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default();
    let command = match name {
        "attach" => {
            let paths = words.map(PathBuf::from).collect::<Vec<_>>();
            ensure!(!paths.is_empty(), MissingArgumentSnafu { usage: ATTACH_USAGE });
            ChatCommand::Attach(paths)
        }
        "remove" => ChatCommand::Remove(parse_position(words.next(), REMOVE_USAGE)?),
        "files" => ChatCommand::Files,
        "open" => ChatCommand::Open(parse_position(words.next(), OPEN_USAGE)?),
        "download" => {
            let message_id = parse_number(words.next(), DOWNLOAD_USAGE)?;
            let index = parse_position(words.next(), DOWNLOAD_USAGE)?;
            ChatCommand::Download { message_id, index }
        }
        "history" => ChatCommand::History,
        "exit" | "quit" => ChatCommand::Exit,
        "help" | "?" => ChatCommand::Help,
        other => {
            return UnknownCommandSnafu { name: other }.fail();
        }
    };
    Ok(Some(command))
}

fn parse_number(word: Option<&str>, usage: &'static str) -> Result<u64, CommandError> {
    let raw = word.context(MissingArgumentSnafu { usage })?;
    raw.parse::<u64>().context(InvalidNumberSnafu { raw, usage })
}

fn parse_position(word: Option<&str>, usage: &'static str) -> Result<usize, CommandError> {
    let raw = word.context(MissingArgumentSnafu { usage })?;
    let position = raw
        .parse::<usize>()
        .context(InvalidNumberSnafu { raw, usage })?;
    position
        .checked_sub(1)
        .context(ZeroIndexSnafu { usage })
}
