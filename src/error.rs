use std::fmt::Display;

use crate::cursor::Position;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GrammarError {
    #[error("lex error at line {position}: {message}")]
    Lex { position: Position, message: String },

    #[error("parse error at line {position}: {message}")]
    Parse { position: Position, message: String },

    #[error("link error at line {position}: referencing unknown rule `{rule}`")]
    Link { position: Position, rule: String },

    #[error("config error in rule `{rule}`: {message}")]
    Config { rule: String, message: String },

    #[error("unknown rule `{0}`")]
    UnknownRule(String),
}

impl GrammarError {
    pub(crate) fn lex<M: Into<String>>(position: Position, message: M) -> Self {
        GrammarError::Lex {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn parse<M: Into<String>>(position: Position, message: M) -> Self {
        GrammarError::Parse {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn config<R: Into<String>, M: Into<String>>(rule: R, message: M) -> Self {
        GrammarError::Config {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Non-fatal finding collected while building a grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub position: Position,
    pub message: String,
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "warning at line {}: {}", self.position, self.message)
    }
}
