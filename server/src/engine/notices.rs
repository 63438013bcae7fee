//! Server-to-client text: notifications, relayed chat lines, and the roster
//! reply, plus the client command vocabulary.

/// Reply sent on a successful handshake.
pub const JOIN_ACCEPTED: &str = "[+]";

/// Separator between handshake fields.
pub const FIELD_DELIMITER: &str = "<<>>";

const QUIT: &str = "[quit]";
const USERS: &str = "[users]";

/// What a joined client asked for with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand<'a> {
    Quit,
    Users,
    Chat(&'a str),
    /// Whitespace only; nothing to do.
    Blank,
}

impl<'a> ClientCommand<'a> {
    pub fn parse(text: &'a str) -> Self {
        match text {
            QUIT => Self::Quit,
            USERS => Self::Users,
            _ => {
                let line = text.trim();
                if line.is_empty() {
                    Self::Blank
                } else {
                    Self::Chat(line)
                }
            }
        }
    }
}

pub fn joined(username: &str) -> String {
    format!("[NOTIFICATION] : {username} has joined!")
}

pub fn left(username: &str) -> String {
    format!("[NOTIFICATION] : {username} has left!")
}

pub fn blocked(username: &str) -> String {
    format!("[NOTIFICATION] : {username} has been blocked!")
}

pub fn chat(username: &str, line: &str) -> String {
    format!("({username}) > {line}")
}

/// Format elapsed whole seconds the way the roster shows them.
pub fn format_duration(secs: u64) -> String {
    let secs = secs as f64;
    if secs > 3600.0 {
        format!("{:.1} hrs", secs / 3600.0)
    } else if secs > 60.0 {
        format!("{:.1} mins", secs / 60.0)
    } else {
        format!("{secs:.1} secs")
    }
}

/// Roster reply to `[users]`: one numbered line per member, in join order.
/// Entries are `(username, connected_for)`.
pub fn roster<'a>(members: impl IntoIterator<Item = (&'a str, String)>) -> String {
    let mut out = String::from("\n            Channel Users\n            -------------\n\n");
    for (i, (username, active_for)) in members.into_iter().enumerate() {
        out.push_str(&format!(
            "  {:03}   -   {:<16}  (active for: {})\n",
            i + 1,
            username,
            active_for
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ClientCommand::parse("[quit]"), ClientCommand::Quit);
        assert_eq!(ClientCommand::parse("[users]"), ClientCommand::Users);
        assert_eq!(ClientCommand::parse("  hi there "), ClientCommand::Chat("hi there"));
        assert_eq!(ClientCommand::parse("   "), ClientCommand::Blank);
        assert_eq!(ClientCommand::parse(""), ClientCommand::Blank);
        // Commands must match exactly.
        assert_eq!(ClientCommand::parse("[QUIT]"), ClientCommand::Chat("[QUIT]"));
    }

    #[test]
    fn test_notifications() {
        assert_eq!(joined("alice"), "[NOTIFICATION] : alice has joined!");
        assert_eq!(left("bob"), "[NOTIFICATION] : bob has left!");
        assert_eq!(blocked("eve"), "[NOTIFICATION] : eve has been blocked!");
        assert_eq!(chat("alice", "hello"), "(alice) > hello");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0.0 secs");
        assert_eq!(format_duration(60), "60.0 secs");
        assert_eq!(format_duration(90), "1.5 mins");
        assert_eq!(format_duration(3600), "60.0 mins");
        assert_eq!(format_duration(5400), "1.5 hrs");
    }

    #[test]
    fn test_roster_layout() {
        let text = roster([("alice", "1.0 secs".to_string()), ("bob", "2.0 mins".to_string())]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1].trim(), "Channel Users");
        assert_eq!(
            lines[4],
            "  001   -   alice             (active for: 1.0 secs)"
        );
        assert_eq!(
            lines[5],
            "  002   -   bob               (active for: 2.0 mins)"
        );
        assert_eq!(lines.len(), 6);
    }
}
