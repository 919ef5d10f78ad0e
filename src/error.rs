//! Errors surfaced to the caller of a room operation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GameError {
    /// Display name was empty after trimming.
    #[error("invalid name")]
    InvalidName,

    /// Non-spectator tried to join while a match is running.
    #[error("match in progress; wait for it to finish before joining")]
    JoinWhileRunning,

    /// Non-spectator tried to come back after losing every life.
    #[error("you were eliminated; wait for the next match")]
    EliminatedThisMatch,

    #[error("invalid match duration: {0} seconds")]
    InvalidDuration(i64),

    #[error("unknown room: {0}")]
    UnknownRoom(String),

    #[error("host privileges required")]
    NotHost,
}

impl GameError {
    pub fn is_illegal_join(&self) -> bool {
        matches!(self, Self::JoinWhileRunning | Self::EliminatedThisMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_join_class_covers_both_rejections() {
        assert!(GameError::JoinWhileRunning.is_illegal_join());
        assert!(GameError::EliminatedThisMatch.is_illegal_join());
        assert!(!GameError::InvalidName.is_illegal_join());
        assert!(!GameError::UnknownRoom("x".to_string()).is_illegal_join());
    }

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(
            GameError::InvalidDuration(0).to_string(),
            "invalid match duration: 0 seconds"
        );
        assert_eq!(GameError::UnknownRoom("lobby".into()).to_string(), "unknown room: lobby");
    }
}
