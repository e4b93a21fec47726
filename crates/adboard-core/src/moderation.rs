//! Message screening: length bounds and the blacklist filter.

use std::fmt;

use crate::config::ModerationConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    TooShort { min: usize },
    TooLong { max: usize },
    Blacklisted,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooShort { min } => {
                write!(f, "ad must be at least {min} characters")
            }
            Rejection::TooLong { max } => {
                write!(f, "ad must be no more than {max} characters")
            }
            Rejection::Blacklisted => write!(f, "ad contains blacklisted words"),
        }
    }
}

/// Screen a raw ad message. `None` means clean.
pub fn screen(config: &ModerationConfig, message: &str) -> Option<Rejection> {
    let length = message.chars().count();
    if length < config.min_length {
        return Some(Rejection::TooShort {
            min: config.min_length,
        });
    }
    if length > config.max_length {
        return Some(Rejection::TooLong {
            max: config.max_length,
        });
    }

    let lowered = message.to_lowercase();
    if config
        .blacklist
        .iter()
        .any(|word| !word.is_empty() && lowered.contains(&word.to_lowercase()))
    {
        return Some(Rejection::Blacklisted);
    }

    None
}
