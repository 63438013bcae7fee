use crate::config::LimitsSection;
use crate::error::AdminError;

/// Minimum number of characters in a username.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Maximum number of characters in a username.
pub const MAX_USERNAME_LENGTH: usize = 20;

/// Minimum channel name length.
pub const MIN_CHANNEL_LENGTH: usize = 3;

/// Maximum channel name length.
pub const MAX_CHANNEL_LENGTH: usize = 20;

/// Maximum number of members a channel admits.
pub const DEFAULT_MAX_CHANNEL_USERS: usize = 500;

/// Letters, digits and spaces only, at least one character.
pub fn is_alphanumeric_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ')
}

/// Whether a (trimmed) username is acceptable in form. Duplicate and block-list
/// checks happen against live state in the channel.
pub fn is_valid_username(name: &str, limits: &LimitsSection) -> bool {
    let len = name.chars().count();
    is_alphanumeric_name(name)
        && len >= limits.min_username_length
        && len <= limits.max_username_length
}

/// Validate a channel name for creation. Each failure has its own error so the
/// admin sees which rule was broken.
pub fn validate_channel_name(name: &str, limits: &LimitsSection) -> Result<(), AdminError> {
    let len = name.chars().count();
    if len < limits.min_channel_length {
        return Err(AdminError::ChannelNameTooShort);
    }
    if !is_alphanumeric_name(name) {
        return Err(AdminError::InvalidChannelName);
    }
    if len > limits.max_channel_length {
        return Err(AdminError::ChannelNameTooLong);
    }
    Ok(())
}
