use crate::error::GrammarError;

use super::{
    lexer::{Token, TokenKind},
    node::Repetition,
};

peg::parser! {

    grammar quantifier_parser() for str {

        rule number() -> usize =
            n:$(['0'..='9']+) {?
                n.parse().or(Err("repetition count is too large"))
            }

        rule bound() -> Option<usize> =
            _ n:number()? _ { n }

        pub rule quantifier() -> (usize, Option<usize>) =
            "{" _ n:number() _ "}" {
                (n, Some(n))
            }
            /
            "{" min:bound() "," max:bound() "}" {
                (min.unwrap_or(0), max)
            }

        rule _() = quiet!{[' ' | '\r' | '\n' | '\t']*}
    }
}

/// Repetition bounds denoted by a quantifier token.
pub fn repetition_of(token: &Token) -> Result<Repetition, GrammarError> {
    match token.kind {
        TokenKind::Optional => Ok(Repetition::OPTIONAL),
        TokenKind::MinOne => Ok(Repetition::AT_LEAST_ONCE),
        TokenKind::RepeatMany => Ok(Repetition::ANY),
        TokenKind::Repeat => {
            let (min, max) = quantifier_parser::quantifier(&token.text).map_err(|e| {
                GrammarError::parse(
                    token.position,
                    format!("invalid repetition format '{}' ({e})", token.text),
                )
            })?;

            if max.map_or(false, |max| max < min) {
                return Err(GrammarError::parse(
                    token.position,
                    format!("repetition minimum exceeds maximum in '{}'", token.text),
                ));
            }

            Ok(Repetition { min, max })
        }
        _ => Err(GrammarError::parse(
            token.position,
            format!("expected quantifier, found {token}"),
        )),
    }
}
