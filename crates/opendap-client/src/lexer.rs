//! Tokenizer shared by the DDS and DAS parsers.

use crate::error::{OpendapError, OpendapResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Word(String),
    Str(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Equals,
    Semicolon,
    Comma,
    Colon,
}

pub(crate) fn tokenize(text: &str) -> OpendapResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        let punct = match c {
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '=' => Some(Token::Equals),
            ';' => Some(Token::Semicolon),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            _ => None,
        };
        if let Some(token) = punct {
            tokens.push(token);
            chars.next();
            continue;
        }
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    Some('\\') => {
                        if let Some(escaped) = chars.next() {
                            s.push(escaped);
                        }
                    }
                    Some('"') => break,
                    Some(other) => s.push(other),
                    None => return Err(OpendapError::parse("unterminated string")),
                }
            }
            tokens.push(Token::Str(s));
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || "{}[]=;,:\"".contains(c) {
                break;
            }
            word.push(c);
            chars.next();
        }
        tokens.push(Token::Word(word));
    }

    Ok(tokens)
}

/// Cursor over a token stream.
pub(crate) struct Tokens {
    tokens: Vec<Token>,
    position: usize,
}

impl Tokens {
    pub(crate) fn new(text: &str) -> OpendapResult<Self> {
        Ok(Self {
            tokens: tokenize(text)?,
            position: 0,
        })
    }

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset)
    }

    pub(crate) fn next(&mut self) -> OpendapResult<Token> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or_else(|| OpendapError::parse("unexpected end of input"))?;
        self.position += 1;
        Ok(token)
    }

    pub(crate) fn expect(&mut self, expected: Token) -> OpendapResult<()> {
        match self.next()? {
            token if token == expected => Ok(()),
            token => Err(OpendapError::parse(format!(
                "expected {:?}, found {:?}",
                expected, token
            ))),
        }
    }

    /// Next token as a word (or quoted string).
    pub(crate) fn word(&mut self) -> OpendapResult<String> {
        match self.next()? {
            Token::Word(w) | Token::Str(w) => Ok(w),
            token => Err(OpendapError::parse(format!("expected a name, found {:?}", token))),
        }
    }

    /// Consume a case-insensitive keyword.
    pub(crate) fn keyword(&mut self, keyword: &str) -> OpendapResult<()> {
        let word = self.word()?;
        if word.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            Err(OpendapError::parse(format!("expected '{}', found '{}'", keyword, word)))
        }
    }
}
