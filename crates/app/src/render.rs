use std::fmt::Write as _;

use scenechat_session::{AttachmentRef, AttachmentStagingList, Scene, Sender, TranscriptMessage};

const MILLIS_PER_MINUTE: u64 = 60_000;

/// `HH:MM` in UTC.
pub fn format_time(unix_millis: u64) -> String {
    let minutes = unix_millis / MILLIS_PER_MINUTE;
    format!("{:02}:{:02}", (minutes / 60) % 24, minutes % 60)
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn render_header(title: &str) -> String {
    let rule = "=".repeat(title.chars().count() + 4);
    format!("{rule}\n  {title}\n{rule}\nType /help for commands.\n")
}

pub fn render_message(message: &TranscriptMessage) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "[{}] #{} {}",
        format_time(message.created_at_unix_millis),
        message.id,
        message.sender.label()
    );
    if let Some(reply_to) = message.in_reply_to {
        let _ = write!(out, " (re #{reply_to})");
    }
    out.push('\n');

    for line in message.content.lines() {
        let _ = writeln!(out, "    {line}");
    }
    for (index, attachment) in message.attachments.iter().enumerate() {
        let _ = writeln!(
            out,
            "    [{}] {} ({})",
            index + 1,
            attachment.name(),
            attachment_marker(attachment)
        );
    }
    if message.sender == Sender::Assistant && !message.attachments.is_empty() {
        let _ = writeln!(
            out,
            "    use /download {} <n> to save a file",
            message.id
        );
    }

    out
}

fn attachment_marker(attachment: &AttachmentRef) -> &'static str {
    match attachment {
        AttachmentRef::Local { .. } => "local",
        AttachmentRef::Remote { .. } => "remote",
    }
}

pub fn render_staging(staging: &AttachmentStagingList) -> String {
    if staging.is_empty() {
        return "No files staged.\n".to_string();
    }

    let mut out = format!("Staged files ({}):\n", staging.len());
    for (index, entry) in staging.entries().iter().enumerate() {
        let _ = writeln!(
            out,
            "    [{}] {} ({}, {})",
            index + 1,
            entry.name(),
            entry.mime_type(),
            format_size(entry.size_bytes())
        );
    }
    out
}

pub fn render_catalog(scenes: &[Scene]) -> String {
    let mut out = String::from("Scenes:\n");
    for (index, scene) in scenes.iter().enumerate() {
        let _ = write!(out, "  {}. {} - {}", index + 1, scene.title, scene.description);
        if !scene.active {
            out.push_str(" (coming soon)");
        }
        out.push('\n');
    }
    out
}

pub const HELP_TEXT: &str = "\
Commands:
  <text>                        send a message with the staged files
  /attach <path>...             stage files for the next message
  /remove <n>                   drop staged file n
  /files                        list staged files
  /open <n>                     save staged file n to the download directory
  /download <message> <n>       save attachment n of a message
  /history                      show the whole conversation
  /exit                         leave the chat
  /help                         show this help
";
