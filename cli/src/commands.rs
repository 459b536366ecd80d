//! Slash command parsing and handling

use reverie_core::{MessageRole, SessionController, SessionError, TurnStatus};
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq)]
pub enum ClearTarget {
    Image,
    Audio,
    All,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    Image(PathBuf),
    Audio(PathBuf),
    Record,
    Clear(ClearTarget),
    Pending,
    History,
}

pub enum CommandResult {
    Continue,
    Exit,
}

impl Command {
    pub fn parse(input: &str) -> Result<Self, String> {
        let Some(body) = input.strip_prefix('/') else {
            return Err("Not a command".to_string());
        };

        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };

        match name {
            "" => Err("Empty command".to_string()),
            "quit" | "exit" => Ok(Command::Quit),
            "help" => Ok(Command::Help),
            "record" => Ok(Command::Record),
            "pending" => Ok(Command::Pending),
            "history" => Ok(Command::History),
            "image" | "audio" => {
                if rest.is_empty() {
                    return Err(format!("Usage: /{} <path>", name));
                }
                let path = PathBuf::from(rest);
                Ok(if name == "image" {
                    Command::Image(path)
                } else {
                    Command::Audio(path)
                })
            }
            "clear" => match rest {
                "image" => Ok(Command::Clear(ClearTarget::Image)),
                "audio" => Ok(Command::Clear(ClearTarget::Audio)),
                "" | "all" => Ok(Command::Clear(ClearTarget::All)),
                other => Err(format!("Unknown clear target: {}. Use image, audio or all", other)),
            },
            _ => Err(format!(
                "Unknown command: /{}. Type /help for available commands.",
                name
            )),
        }
    }

    pub async fn execute(self, session: &SessionController) -> CommandResult {
        match self {
            Command::Quit => {
                println!("Goodbye!");
                return CommandResult::Exit;
            }
            Command::Help => print_help(),
            Command::Image(path) => {
                if let Err(e) = session.set_image(&path).await {
                    eprintln!("Could not attach image: {}", e);
                }
            }
            Command::Audio(path) => {
                if let Err(e) = session.set_audio_file(&path).await {
                    eprintln!("Could not attach audio: {}", e);
                }
            }
            Command::Record => match session.toggle_recording().await {
                // A refused microphone is reported through the alert event
                Ok(()) | Err(SessionError::PermissionDenied(_)) => {}
                Err(e) => eprintln!("Could not save the recording: {}", e),
            },
            Command::Clear(target) => {
                if matches!(target, ClearTarget::Image | ClearTarget::All) {
                    session.clear_image();
                }
                if matches!(target, ClearTarget::Audio | ClearTarget::All) {
                    session.clear_audio();
                }
                println!("Attachments cleared.");
            }
            Command::Pending => print_pending(session),
            Command::History => print_history(session),
        }
        CommandResult::Continue
    }
}

fn print_pending(session: &SessionController) {
    let pending = session.pending();
    if pending.is_empty() {
        println!("Nothing staged.");
        return;
    }
    if !pending.trimmed_text().is_empty() {
        println!("  text:  {}", pending.trimmed_text());
    }
    for (label, attachment) in [("image", &pending.image), ("audio", &pending.audio)] {
        if let Some(attachment) = attachment {
            println!(
                "  {}: {} ({} base64 chars)",
                label,
                attachment.mime_type,
                attachment.data.len()
            );
        }
    }
}

fn print_history(session: &SessionController) {
    let log = session.turn_log();
    if log.is_empty() {
        println!("No messages yet.");
        return;
    }
    for turn in log.turns() {
        let speaker = match turn.role {
            MessageRole::User => "you",
            MessageRole::Model => "analyst",
        };
        let marker = match turn.status {
            TurnStatus::Committed => "",
            TurnStatus::Pending => " (pending)",
            TurnStatus::Failed => " (not sent to model)",
        };
        println!("{}{}: {}", speaker, marker, turn.display);
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  /image <path>          - Attach an image to the next message");
    println!("  /audio <path>          - Attach an audio file to the next message");
    println!("  /record                - Start or stop a microphone voice note");
    println!("  /clear image|audio|all - Drop staged attachments");
    println!("  /pending               - Show what the next message will contain");
    println!("  /history               - Show the conversation with turn status");
    println!("  /quit, /exit           - Exit the session");
    println!("  /help                  - Show this help message");
    println!("  line ending in \\       - Continue the message on the next line");
    println!("  empty line             - Send staged attachments without text");
    println!("  Ctrl+D                 - Exit the session");
}

/// Joins input lines that end with a backslash into one message
#[derive(Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn is_continuing(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns the complete message once a line without a trailing backslash arrives
    pub fn push(&mut self, line: &str) -> Option<String> {
        match line.strip_suffix('\\') {
            Some(head) => {
                self.pending.push_str(head);
                self.pending.push('\n');
                None
            }
            None => {
                self.pending.push_str(line);
                Some(std::mem::take(&mut self.pending))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("/quit"), Ok(Command::Quit));
        assert_eq!(Command::parse("/exit"), Ok(Command::Quit));
        assert_eq!(Command::parse("/record"), Ok(Command::Record));
        assert_eq!(Command::parse("/history"), Ok(Command::History));
        assert_eq!(Command::parse("/pending"), Ok(Command::Pending));
    }

    #[test]
    fn test_parse_paths_keep_spaces() {
        assert_eq!(
            Command::parse("/image  ~/My Pictures/dream.png "),
            Ok(Command::Image(PathBuf::from("~/My Pictures/dream.png")))
        );
        assert_eq!(
            Command::parse("/audio note.wav"),
            Ok(Command::Audio(PathBuf::from("note.wav")))
        );
        assert!(Command::parse("/image").is_err());
    }

    #[test]
    fn test_parse_clear_targets() {
        assert_eq!(Command::parse("/clear"), Ok(Command::Clear(ClearTarget::All)));
        assert_eq!(
            Command::parse("/clear audio"),
            Ok(Command::Clear(ClearTarget::Audio))
        );
        assert!(Command::parse("/clear text").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(Command::parse("/model gemini").is_err());
        assert!(Command::parse("/").is_err());
        assert!(Command::parse("hello").is_err());
    }

    #[test]
    fn test_line_buffer_joins_continuations() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.push("I dreamt \\"), None);
        assert!(buffer.is_continuing());
        assert_eq!(buffer.push("of a house"), Some("I dreamt \nof a house".to_string()));
        assert!(!buffer.is_continuing());
        assert_eq!(buffer.push("again"), Some("again".to_string()));
    }
}
