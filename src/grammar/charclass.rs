use lazy_static::lazy_static;
use rand::Rng;

use crate::{
    cursor::{Cursor, Position},
    distribution::WeightedDistribution,
    error::GrammarError,
};

use super::lexer::unescape;

/// Building block of a character class: a contiguous code point range or a
/// discrete set of characters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CharPrimitive {
    Range { start: char, end: char },
    Fragment(Vec<char>),
}

const DIGIT: CharPrimitive = CharPrimitive::Range {
    start: '0',
    end: '9',
};
const UPPER: CharPrimitive = CharPrimitive::Range {
    start: 'A',
    end: 'Z',
};
const LOWER: CharPrimitive = CharPrimitive::Range {
    start: 'a',
    end: 'z',
};

lazy_static! {
    static ref WHITESPACE: CharPrimitive = CharPrimitive::Fragment(" \u{0C}\n\r\t\u{0B}".chars().collect());
    static ref SPECIALS: CharPrimitive =
        CharPrimitive::Fragment("!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~".chars().collect());
}

impl CharPrimitive {
    pub fn length(&self) -> usize {
        match self {
            CharPrimitive::Range { start, end } => (*end as usize) - (*start as usize) + 1,
            CharPrimitive::Fragment(chars) => chars.len(),
        }
    }

    pub fn contains(&self, c: char) -> bool {
        match self {
            CharPrimitive::Range { start, end } => (*start..=*end).contains(&c),
            CharPrimitive::Fragment(chars) => chars.contains(&c),
        }
    }

    pub fn generate_single<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<char> {
        match self {
            CharPrimitive::Range { start, end } => loop {
                // code points between the bounds may be surrogates, redraw those
                if let Some(c) = char::from_u32(rng.gen_range(*start as u32..=*end as u32)) {
                    break Some(c);
                }
            },
            CharPrimitive::Fragment(chars) if chars.is_empty() => None,
            CharPrimitive::Fragment(chars) => Some(chars[rng.gen_range(0..chars.len())]),
        }
    }
}

/// A parsed `[...]` class. Sampling first picks a primitive weighted by its
/// size, then a character uniformly inside it, so every character of a
/// non-overlapping class is equally likely.
#[derive(Clone, Debug)]
pub struct CharClassSet {
    source: String,
    primitives: WeightedDistribution<CharPrimitive>,
}

impl CharClassSet {
    pub fn parse(source: &str, position: Position) -> Result<Self, GrammarError> {
        let error = |message: &str| GrammarError::parse(position, format!("{message}: {source}"));

        let mut cursor = Cursor::new(source);
        if !cursor.consume("[") {
            return Err(error("expected '[' at the start of a character class"));
        }
        if cursor.is("^") {
            return Err(error("negated character classes are not supported"));
        }

        let mut primitives = vec![];
        let mut fragment = vec![];

        loop {
            let literal = match cursor.next() {
                None => return Err(error("unterminated character class")),
                Some(']') => break,
                Some('\\') => match cursor.next() {
                    None => return Err(error("unterminated character class")),
                    Some('s') => {
                        primitives.push(WHITESPACE.clone());
                        continue;
                    }
                    Some('d') => {
                        primitives.push(DIGIT);
                        continue;
                    }
                    Some('w') => {
                        primitives.extend([DIGIT, UPPER, LOWER]);
                        fragment.push('_');
                        continue;
                    }
                    Some('.') => {
                        primitives.extend([DIGIT, UPPER, LOWER, WHITESPACE.clone(), SPECIALS.clone()]);
                        continue;
                    }
                    Some('S' | 'W' | 'D') => {
                        return Err(error(
                            "negated shorthand classes '\\S', '\\W' and '\\D' are not supported",
                        ))
                    }
                    Some('b' | 'c' | 'x' | 'u' | 'p') => {
                        return Err(error(
                            "escapes '\\b', '\\c', '\\x', '\\u' and '\\p' are not supported",
                        ))
                    }
                    Some(c) => unescape(c),
                },
                Some(c) => c,
            };

            if !cursor.consume("-") {
                fragment.push(literal);
                continue;
            }

            let end = match cursor.next() {
                None | Some(']') => return Err(error("unfinished character class range")),
                Some('\\') => match cursor.next() {
                    Some(c) => unescape(c),
                    None => return Err(error("unfinished character class range")),
                },
                Some(c) => c,
            };

            if literal > end {
                return Err(error("range out of order in character class"));
            }

            primitives.push(CharPrimitive::Range {
                start: literal,
                end,
            });
        }

        if !fragment.is_empty() {
            primitives.push(CharPrimitive::Fragment(fragment));
        }

        if primitives.is_empty() {
            return Err(error("empty character class"));
        }

        let weighted = primitives.into_iter().map(|p| {
            let weight = p.length() as f64;
            (p, weight)
        });

        Ok(CharClassSet {
            source: source.to_string(),
            primitives: WeightedDistribution::new(weighted)
                .map_err(|e| error(&format!("invalid character class weights ({e})")))?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn contains(&self, c: char) -> bool {
        self.primitives.items().iter().any(|p| p.contains(c))
    }

    pub fn generate_single<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<char> {
        self.primitives.sample(rng)?.generate_single(rng)
    }
}
