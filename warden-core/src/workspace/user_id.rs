use warden_config::constants::workspace::{MAX_USER_ID_LENGTH, RESERVED_USER_IDS};

use crate::error::SandboxError;

/// Check that `user_id` can name a workspace directory.
///
/// Ids are never trimmed or otherwise coerced: anything outside
/// `[A-Za-z0-9_-]{1,64}`, or a reserved name, is refused.
pub fn validate_user_id(user_id: &str) -> Result<(), SandboxError> {
    let invalid = |reason: &str| SandboxError::InvalidUserId {
        user_id: user_id.to_owned(),
        reason: reason.to_owned(),
    };

    if user_id.is_empty() {
        return Err(invalid("must not be empty"));
    }

    if user_id.chars().count() > MAX_USER_ID_LENGTH {
        return Err(invalid("must be at most 64 characters"));
    }

    if !user_id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(invalid(
            "may only contain ASCII letters, digits, '_' and '-'",
        ));
    }

    let lowered = user_id.to_ascii_lowercase();
    if RESERVED_USER_IDS.contains(&lowered.as_str()) {
        return Err(invalid("is reserved"));
    }

    Ok(())
}
