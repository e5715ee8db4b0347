//! Slash commands available in interactive mode

/// Built-in command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Re-read the knowledge directory and swap the corpus
    Reload,
    /// Print retrieval telemetry
    Stats,
    /// List loaded documents
    Sources,
    Exit,
    Unknown { input: String },
}

/// `None` when the input is a question rather than a command
pub fn parse(input: &str) -> Option<Command> {
    let rest = input.trim().strip_prefix('/')?;
    let name = rest.split_whitespace().next().unwrap_or("").to_lowercase();

    let command = match name.as_str() {
        "help" | "h" => Command::Help,
        "reload" | "r" => Command::Reload,
        "stats" => Command::Stats,
        "sources" | "files" => Command::Sources,
        "exit" | "quit" | "q" => Command::Exit,
        _ => Command::Unknown {
            input: input.trim().to_string(),
        },
    };
    Some(command)
}

pub const HELP: &str = "\
/reload   reload the knowledge directory
/stats    show retrieval statistics
/sources  list loaded documents
/quit     leave interactive mode
Anything else is answered as a question.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_questions_are_not_commands() {
        assert_eq!(parse("入学需要准备哪些材料？"), None);
        assert_eq!(parse("a/b"), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("/reload"), Some(Command::Reload));
        assert_eq!(parse("  /STATS "), Some(Command::Stats));
        assert_eq!(parse("/quit"), Some(Command::Exit));
        assert_eq!(parse("/files"), Some(Command::Sources));
        assert_eq!(parse("/h"), Some(Command::Help));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse("/frobnicate now"),
            Some(Command::Unknown {
                input: "/frobnicate now".to_string()
            })
        );
        assert_eq!(
            parse("/"),
            Some(Command::Unknown {
                input: "/".to_string()
            })
        );
    }
}
