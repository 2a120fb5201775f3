use std::fmt::Display;

use crate::{
    cursor::{Cursor, Position},
    error::GrammarError,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Name,
    String,
    CharClass,
    Or,
    MinOne,
    Optional,
    RepeatMany,
    Repeat,
    Define,
    ExpStart,
    ExpEnd,
    PosLookAhead,
    NegLookAhead,
    Cut,
    None,
}

/// A lexed token. `text` holds the name, the unescaped string, or the raw
/// bracketed/braced source of char classes and repeat quantifiers; `binding`
/// holds an optional `.name` suffix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
    pub text: String,
    pub binding: Option<String>,
}

impl Token {
    fn new(kind: TokenKind, position: Position, text: &str) -> Self {
        Token {
            kind,
            position,
            text: text.to_string(),
            binding: None,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_quantifier(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::MinOne | TokenKind::Optional | TokenKind::RepeatMany | TokenKind::Repeat
        )
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, self.text.is_empty()) {
            (TokenKind::None, _) => write!(f, "end of input"),
            (kind, true) => write!(f, "{kind:?}"),
            (kind, false) => write!(f, "{kind:?} '{}'", self.text),
        }
    }
}

/// Longest operators first, so a shorter operator never shadows a longer one
/// it is a prefix of.
const OPERATORS: &[(&str, TokenKind)] = &[
    ("::=", TokenKind::Define),
    ("?", TokenKind::Optional),
    ("+", TokenKind::MinOne),
    ("*", TokenKind::RepeatMany),
    ("|", TokenKind::Or),
    ("(", TokenKind::ExpStart),
    (")", TokenKind::ExpEnd),
    ("&", TokenKind::PosLookAhead),
    ("!", TokenKind::NegLookAhead),
    ("~", TokenKind::Cut),
];

const RESERVED: &[char] = &[
    '*', '+', '?', '|', '{', '[', '"', '\'', '(', ')', '&', '!', '~',
];

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'v' => '\u{0B}',
        'f' => '\u{0C}',
        'b' => '\u{08}',
        '0' => '\0',
        other => other,
    }
}

/// Tokenizer for grammar source with one token of lookahead.
pub struct Lexer<'s> {
    cursor: Cursor<'s>,
    peeked: Option<Token>,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        Lexer {
            cursor: Cursor::new(source),
            peeked: None,
        }
    }

    pub fn has_next(&mut self) -> Result<bool, GrammarError> {
        Ok(!self.peek()?.is(TokenKind::None))
    }

    pub fn next(&mut self) -> Result<Token, GrammarError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.read_next(),
        }
    }

    pub fn peek(&mut self) -> Result<&Token, GrammarError> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.read_next()?,
        };

        Ok(self.peeked.insert(token))
    }

    fn read_next(&mut self) -> Result<Token, GrammarError> {
        self.skip_trivia()?;

        let Some(c) = self.cursor.current() else {
            return Ok(Token::new(TokenKind::None, self.cursor.position(), ""));
        };

        let token = if is_name_start(c) {
            self.read_name()
        } else if c == '"' || c == '\'' {
            self.read_string()?
        } else if c == '[' {
            self.read_char_class()?
        } else if c == '{' {
            self.read_repeat()?
        } else if let Some(token) = self.read_operator()? {
            token
        } else {
            self.read_free_string()?
        };

        self.skip_trivia()?;

        Ok(token)
    }

    fn skip_trivia(&mut self) -> Result<(), GrammarError> {
        loop {
            self.cursor.jump_while(char::is_whitespace);

            if self.cursor.consume("//") {
                self.cursor.jump_to("\n");
            } else if self.cursor.is("/*") {
                let start = self.cursor.position();
                self.cursor.consume("/*");
                if !self.cursor.jump_to("*/") {
                    return Err(GrammarError::lex(start, "unterminated block comment"));
                }
            } else {
                return Ok(());
            }
        }
    }

    fn read_name(&mut self) -> Token {
        let start = self.cursor.position();
        self.cursor.jump_while(is_word_char);
        Token::new(TokenKind::Name, start, self.cursor.slice_from(start.index))
    }

    fn read_string(&mut self) -> Result<Token, GrammarError> {
        let start = self.cursor.position();
        let unterminated = || GrammarError::lex(start, "unterminated string");

        let quote = self.cursor.next().ok_or_else(unterminated)?;
        let mut content = String::new();

        loop {
            match self.cursor.next().ok_or_else(unterminated)? {
                '\\' => content.push(unescape(self.cursor.next().ok_or_else(unterminated)?)),
                c if c == quote => break,
                c => content.push(c),
            }
        }

        Ok(Token::new(TokenKind::String, start, &content))
    }

    fn read_char_class(&mut self) -> Result<Token, GrammarError> {
        let start = self.cursor.position();
        let unterminated = || GrammarError::lex(start, "unterminated character class");

        self.cursor.next();
        loop {
            match self.cursor.next().ok_or_else(unterminated)? {
                '\\' => {
                    self.cursor.next().ok_or_else(unterminated)?;
                }
                ']' => break,
                _ => {}
            }
        }

        Ok(Token::new(
            TokenKind::CharClass,
            start,
            self.cursor.slice_from(start.index),
        ))
    }

    fn read_repeat(&mut self) -> Result<Token, GrammarError> {
        let start = self.cursor.position();

        if !self.cursor.jump_to("}") {
            return Err(GrammarError::lex(start, "unterminated repetition quantifier"));
        }

        let mut token = Token::new(TokenKind::Repeat, start, self.cursor.slice_from(start.index));
        token.binding = self.read_binding()?;
        Ok(token)
    }

    fn read_operator(&mut self) -> Result<Option<Token>, GrammarError> {
        let start = self.cursor.position();

        let Some(&(_, kind)) = OPERATORS.iter().find(|(op, _)| self.cursor.consume(op)) else {
            return Ok(None);
        };

        let mut token = Token::new(kind, start, "");
        if matches!(
            kind,
            TokenKind::Optional | TokenKind::MinOne | TokenKind::RepeatMany | TokenKind::ExpEnd
        ) {
            token.binding = self.read_binding()?;
        }

        Ok(Some(token))
    }

    fn read_binding(&mut self) -> Result<Option<String>, GrammarError> {
        let start = self.cursor.position();
        if !self.cursor.consume(".") {
            return Ok(None);
        }

        let name_start = self.cursor.index();
        self.cursor.jump_while(is_word_char);
        let name = self.cursor.slice_from(name_start);

        if name.is_empty() {
            return Err(GrammarError::lex(start, "expected a node name after '.'"));
        }

        Ok(Some(name.to_string()))
    }

    fn read_free_string(&mut self) -> Result<Token, GrammarError> {
        let start = self.cursor.position();
        self.cursor
            .jump_while(|c| !c.is_whitespace() && !RESERVED.contains(&c));

        let text = self.cursor.slice_from(start.index);
        if text.is_empty() {
            return Err(GrammarError::lex(start, "unexpected character"));
        }

        Ok(Token::new(TokenKind::String, start, text))
    }
}
