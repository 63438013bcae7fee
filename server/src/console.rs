//! Line-oriented admin console.
//!
//! Each line is one command; arguments are separated by whitespace and a
//! double-quoted argument may contain spaces (channel names allow them):
//!
//! ```text
//! create "dev chat"
//! passwd "dev chat" hunter2
//! block mallory
//! ```

use std::fmt::Write as _;

use crate::error::{AdminError, ServerError};
use crate::net::listener::Server;
use crate::snapshot::StateSnapshot;

pub const HELP: &str = "\
commands:
  create <channel>              create a channel
  delete <channel>              delete a channel and disconnect its users
  passwd <channel> [password]   set a channel password (omit to clear)
  block <user>                  block a username on every channel
  unblock <user>                remove a username from the block list
  channels                      list channels and member counts
  members <channel>             list a channel's users
  blocked                       list blocked usernames
  status                        show counts
  save <path>                   write channels and block list to a file
  load <path>                   replace channels from a file (server stopped)
  start                         start accepting connections
  stop                          stop the server and disconnect everyone
  exit                          stop the server and quit
  help                          show this text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Create(String),
    Delete(String),
    Passwd { channel: String, password: String },
    Block(String),
    Unblock(String),
    Channels,
    Members(String),
    Blocked,
    Status,
    Save(String),
    Load(String),
    Start,
    Stop,
    Exit,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("unknown command: {0} (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Split a line into arguments, honoring double quotes.
fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_quotes {
        return Err(ParseError::UnterminatedQuote);
    }
    if has_token {
        args.push(current);
    }
    Ok(args)
}

impl AdminCommand {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let args = tokenize(line)?;
        let Some((command, rest)) = args.split_first() else {
            return Err(ParseError::Empty);
        };

        let one = |usage: &'static str| -> Result<String, ParseError> {
            match rest {
                [arg] => Ok(arg.clone()),
                _ => Err(ParseError::Usage(usage)),
            }
        };
        let none = |cmd: AdminCommand, usage: &'static str| -> Result<AdminCommand, ParseError> {
            if rest.is_empty() {
                Ok(cmd)
            } else {
                Err(ParseError::Usage(usage))
            }
        };

        match command.to_lowercase().as_str() {
            "create" => one("create <channel>").map(Self::Create),
            "delete" => one("delete <channel>").map(Self::Delete),
            "passwd" => match rest {
                [channel] => Ok(Self::Passwd {
                    channel: channel.clone(),
                    password: String::new(),
                }),
                [channel, password] => Ok(Self::Passwd {
                    channel: channel.clone(),
                    password: password.clone(),
                }),
                _ => Err(ParseError::Usage("passwd <channel> [password]")),
            },
            "block" => one("block <user>").map(Self::Block),
            "unblock" => one("unblock <user>").map(Self::Unblock),
            "channels" => none(Self::Channels, "channels"),
            "members" => one("members <channel>").map(Self::Members),
            "blocked" => none(Self::Blocked, "blocked"),
            "status" => none(Self::Status, "status"),
            "save" => one("save <path>").map(Self::Save),
            "load" => one("load <path>").map(Self::Load),
            "start" => none(Self::Start, "start"),
            "stop" => none(Self::Stop, "stop"),
            "exit" | "quit" => none(Self::Exit, "exit"),
            "help" => Ok(Self::Help),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// Run one command against the server and return the text to show the admin.
pub async fn execute(server: &mut Server, command: AdminCommand) -> String {
    match run(server, command).await {
        Ok(reply) => reply,
        Err(e) => e.to_string(),
    }
}

async fn stop_reply(server: &mut Server) -> String {
    match server.stop().await {
        Ok(true) => "Server stopped!".to_string(),
        Ok(false) => "Server not running!".to_string(),
        Err(e) => format!("Server error! ({e})"),
    }
}

async fn run(server: &mut Server, command: AdminCommand) -> Result<String, AdminError> {
    let relay = server.relay().clone();
    let reply = match command {
        AdminCommand::Create(name) => {
            relay.create_channel(&name)?;
            "Channel created!".to_string()
        }
        AdminCommand::Delete(name) => {
            let closed = relay.delete_channel(&name).await?;
            format!("Channel deleted! ({closed} users disconnected)")
        }
        AdminCommand::Passwd { channel, password } => {
            relay.set_password(&channel, &password)?;
            if password.is_empty() {
                "Password cleared!".to_string()
            } else {
                "Password set!".to_string()
            }
        }
        AdminCommand::Block(username) => {
            relay.block_user(&username)?;
            "User blocked!".to_string()
        }
        AdminCommand::Unblock(username) => {
            relay.unblock_user(&username)?;
            "User unblocked!".to_string()
        }
        AdminCommand::Channels => {
            let channels = relay.list_channels();
            if channels.is_empty() {
                return Ok("No channel available!".to_string());
            }
            let mut out = String::from("S/N  Channel Name          Users  Locked\n");
            for (i, ch) in channels.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{:<4} {:<20}  {:>5}  {}",
                    i + 1,
                    ch.name,
                    ch.member_count,
                    if ch.has_password { "yes" } else { "no" }
                );
            }
            out.trim_end().to_string()
        }
        AdminCommand::Members(name) => {
            let members = relay.channel_members(&name)?;
            if members.is_empty() {
                return Ok(format!("No users in {name}"));
            }
            let mut out = String::from("S/N  Username              Active for\n");
            for (i, m) in members.iter().enumerate() {
                let _ = writeln!(out, "{:<4} {:<20}  {}", i + 1, m.username, m.connected_for);
            }
            out.trim_end().to_string()
        }
        AdminCommand::Blocked => {
            let blocked = relay.blocked_users();
            if blocked.is_empty() {
                return Ok("Block list is empty!".to_string());
            }
            let mut out = String::from("S/N  Username\n");
            for (i, user) in blocked.iter().enumerate() {
                let _ = writeln!(out, "{:<4} {}", i + 1, user);
            }
            out.trim_end().to_string()
        }
        AdminCommand::Status => {
            let stats = relay.stats();
            format!(
                "active: {}  endpoint: {}  channels: {}  users: {}  blocked: {}  relay loops: {}",
                relay.is_active(),
                server.address(),
                stats.channels,
                stats.users,
                stats.blocked,
                stats.running_loops
            )
        }
        AdminCommand::Save(path) => {
            let mut snapshot = relay.snapshot();
            let (host, port) = server.endpoint();
            snapshot.host = Some(host.to_string());
            snapshot.port = Some(port);
            match snapshot.save(&path) {
                Ok(()) => "Configurations saved!".to_string(),
                Err(e) => format!("Error saving configurations! ({e})"),
            }
        }
        AdminCommand::Load(path) => {
            if server.is_running() {
                return Err(AdminError::ServerRunning);
            }
            let snapshot = match StateSnapshot::load(&path) {
                Ok(snapshot) => snapshot,
                Err(e) => return Ok(format!("Error loading configurations! ({e})")),
            };
            relay.load_snapshot(&snapshot)?;
            let (host, port) = server.endpoint();
            let host = snapshot.host.clone().unwrap_or_else(|| host.to_string());
            let port = snapshot.port.unwrap_or(port);
            server.set_endpoint(host, port);
            "Configuration loaded!".to_string()
        }
        AdminCommand::Start => match server.start().await {
            Ok(addr) => format!("Server started! (listening on {addr})"),
            Err(ServerError::AlreadyRunning) => ServerError::AlreadyRunning.to_string(),
            Err(e) => format!("Error starting server! ({e})"),
        },
        AdminCommand::Stop | AdminCommand::Exit => stop_reply(server).await,
        AdminCommand::Help => HELP.to_string(),
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::RelaySettings;
    use crate::engine::relay::ChatRelay;

    fn stopped_server() -> Server {
        let settings = RelaySettings {
            host: "127.0.0.1".into(),
            port: 0,
            ..RelaySettings::default()
        };
        Server::new(Arc::new(ChatRelay::new(settings)))
    }

    fn temp_path(prefix: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{prefix}-{}.conf", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(AdminCommand::parse("channels").unwrap(), AdminCommand::Channels);
        assert_eq!(AdminCommand::parse("  STATUS  ").unwrap(), AdminCommand::Status);
        assert_eq!(
            AdminCommand::parse("create lobby").unwrap(),
            AdminCommand::Create("lobby".into())
        );
        assert_eq!(
            AdminCommand::parse("block mallory").unwrap(),
            AdminCommand::Block("mallory".into())
        );
    }

    #[test]
    fn test_parse_lifecycle_commands() {
        assert_eq!(AdminCommand::parse("start").unwrap(), AdminCommand::Start);
        assert_eq!(AdminCommand::parse("stop").unwrap(), AdminCommand::Stop);
        assert_eq!(AdminCommand::parse("exit").unwrap(), AdminCommand::Exit);
        assert_eq!(AdminCommand::parse("quit").unwrap(), AdminCommand::Exit);
        assert_eq!(
            AdminCommand::parse("load state.conf").unwrap(),
            AdminCommand::Load("state.conf".into())
        );
        assert_eq!(AdminCommand::parse("load"), Err(ParseError::Usage("load <path>")));
    }

    #[test]
    fn test_parse_quoted_argument() {
        assert_eq!(
            AdminCommand::parse(r#"passwd "dev chat" hunter2"#).unwrap(),
            AdminCommand::Passwd {
                channel: "dev chat".into(),
                password: "hunter2".into()
            }
        );
        assert_eq!(
            AdminCommand::parse(r#"create "dev chat""#).unwrap(),
            AdminCommand::Create("dev chat".into())
        );
    }

    #[test]
    fn test_parse_passwd_without_password_clears() {
        assert_eq!(
            AdminCommand::parse("passwd lobby").unwrap(),
            AdminCommand::Passwd {
                channel: "lobby".into(),
                password: String::new()
            }
        );
        assert_eq!(
            AdminCommand::parse(r#"passwd lobby """#).unwrap(),
            AdminCommand::Passwd {
                channel: "lobby".into(),
                password: String::new()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(AdminCommand::parse(""), Err(ParseError::Empty));
        assert_eq!(AdminCommand::parse("   "), Err(ParseError::Empty));
        assert_eq!(
            AdminCommand::parse("create"),
            Err(ParseError::Usage("create <channel>"))
        );
        assert_eq!(
            AdminCommand::parse("create dev chat"),
            Err(ParseError::Usage("create <channel>"))
        );
        assert_eq!(
            AdminCommand::parse(r#"create "dev"#),
            Err(ParseError::UnterminatedQuote)
        );
        assert!(matches!(
            AdminCommand::parse("launch"),
            Err(ParseError::Unknown(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_admin_flow() {
        let mut server = stopped_server();

        assert_eq!(
            execute(&mut server, AdminCommand::Create("lobby".into())).await,
            "Channel created!"
        );
        assert_eq!(
            execute(&mut server, AdminCommand::Create("lobby".into())).await,
            "Channel already exists!"
        );
        assert_eq!(
            execute(
                &mut server,
                AdminCommand::Passwd {
                    channel: "lobby".into(),
                    password: "pw".into()
                }
            )
            .await,
            "Password set!"
        );

        let listing = execute(&mut server, AdminCommand::Channels).await;
        assert!(listing.contains("lobby"));
        assert!(listing.contains("yes"));

        assert_eq!(
            execute(&mut server, AdminCommand::Members("lobby".into())).await,
            "No users in lobby"
        );
        assert_eq!(
            execute(&mut server, AdminCommand::Block("eve".into())).await,
            "User blocked!"
        );
        assert_eq!(
            execute(&mut server, AdminCommand::Block("eve".into())).await,
            "User already in block list!"
        );
        assert!(execute(&mut server, AdminCommand::Blocked).await.contains("eve"));
        assert_eq!(
            execute(&mut server, AdminCommand::Delete("lobby".into())).await,
            "Channel deleted! (0 users disconnected)"
        );
        assert_eq!(
            execute(&mut server, AdminCommand::Channels).await,
            "No channel available!"
        );
    }

    #[tokio::test]
    async fn test_save_writes_snapshot() {
        let mut server = stopped_server();
        server.relay().create_channel("lobby").unwrap();
        server.relay().block_user("eve").unwrap();

        let path = temp_path("relay-state");
        let reply = execute(&mut server, AdminCommand::Save(path.display().to_string())).await;
        assert_eq!(reply, "Configurations saved!");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Channel:lobby<<>>\n"));
        assert!(text.contains("Blocked:eve\n"));
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_start_stop_start() {
        let mut server = stopped_server();
        assert_eq!(execute(&mut server, AdminCommand::Stop).await, "Server not running!");

        let reply = execute(&mut server, AdminCommand::Start).await;
        assert!(reply.starts_with("Server started!"), "{reply}");
        assert!(server.relay().is_active());
        assert_eq!(
            execute(&mut server, AdminCommand::Start).await,
            "Server already running!"
        );

        assert_eq!(execute(&mut server, AdminCommand::Stop).await, "Server stopped!");
        assert!(!server.relay().is_active());

        let reply = execute(&mut server, AdminCommand::Start).await;
        assert!(reply.starts_with("Server started!"), "{reply}");
        assert_eq!(execute(&mut server, AdminCommand::Exit).await, "Server stopped!");
    }

    #[tokio::test]
    async fn test_load_requires_stopped_server() {
        let path = temp_path("relay-load");
        std::fs::write(
            &path,
            "Host:127.0.0.1\nPort:4545\nChannel:staff<<>>hunter2\nBlocked:mallory\n",
        )
        .unwrap();
        let load = AdminCommand::Load(path.display().to_string());

        let mut server = stopped_server();
        server.start().await.unwrap();
        assert_eq!(execute(&mut server, load.clone()).await, "Stop server first!");
        assert!(server.relay().list_channels().is_empty());

        server.stop().await.unwrap();
        assert_eq!(execute(&mut server, load).await, "Configuration loaded!");
        assert_eq!(server.relay().channel("staff").unwrap().password(), "hunter2");
        assert!(server.relay().block_list().contains("mallory"));
        assert_eq!(server.endpoint(), ("127.0.0.1", 4545));

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let mut server = stopped_server();
        let reply = execute(&mut server, AdminCommand::Load("/nonexistent/state.conf".into())).await;
        assert!(reply.starts_with("Error loading configurations!"), "{reply}");
    }
}
