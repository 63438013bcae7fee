use std::io;

/// Reasons a handshake is refused. The `Display` text is sent to the client
/// verbatim before the connection is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("Server stopped!")]
    ServerStopped,

    #[error("Invalid channel!")]
    InvalidChannel,

    #[error("Maximum channel users attained!")]
    ChannelFull,

    #[error("Username taken/invalid")]
    UsernameRejected,

    #[error("Authentication failed!")]
    AuthenticationFailed,
}

/// Failures of administrative operations against the registry and block list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminError {
    #[error("Channel name too short!")]
    ChannelNameTooShort,

    #[error("Invalid channel name!")]
    InvalidChannelName,

    #[error("Channel name too long!")]
    ChannelNameTooLong,

    #[error("Channel already exists!")]
    ChannelExists,

    #[error("No such channel: {0}")]
    NoSuchChannel(String),

    #[error("Target username required!")]
    EmptyUsername,

    #[error("User already in block list!")]
    AlreadyBlocked,

    #[error("User not in block list!")]
    NotBlocked,

    #[error("Stop server first!")]
    ServerRunning,
}

/// Listener-level failures. These stop the whole server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("Server already running!")]
    AlreadyRunning,

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors while loading configuration or a state snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid port on line {line}: {value:?}")]
    InvalidPort { line: usize, value: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}
