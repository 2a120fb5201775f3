pub mod configuration;
pub mod cursor;
pub mod distribution;
pub mod error;
pub mod grammar;
pub mod log;

pub use configuration::{EngineConfig, NodeConfig, RuleConfig};
pub use error::{GrammarError, Warning};
pub use grammar::{
    generation::Sample,
    matching::{BacktraceEntry, MatchFailure, MatchOutcome},
    parse_grammar, Grammar,
};
