//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer is a single left-to-right pass with one character of
//! lookahead. Two-character operators are matched before their one-character
//! prefixes. Numeric literals in `0x`/`0o`/`0b` form are converted to decimal
//! text here so later stages only ever see one spelling.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{
  LexResult, MissingDigitsSnafu, NumberOverflowSnafu, UnexpectedCharacterSnafu,
  UnterminatedStringSnafu,
};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  LeftParen,
  RightParen,
  LeftBrace,
  RightBrace,
  Comma,
  Dot,
  Minus,
  Plus,
  Semicolon,
  Slash,
  Star,
  Tilde,
  Bang,
  BangEqual,
  Equal,
  EqualEqual,
  Greater,
  GreaterEqual,
  Less,
  LessEqual,
  Amp,
  AmpAmp,
  Pipe,
  PipePipe,

  Identifier,
  String,
  Number,

  Var,
  If,
  Else,
  True,
  False,
  For,
  While,
  Fun,
  Return,
  Out,
  In,

  Eof,
}

impl TokenKind {
  fn keyword(text: &str) -> Option<Self> {
    let kind = match text {
      "var" => Self::Var,
      "if" => Self::If,
      "else" => Self::Else,
      "true" => Self::True,
      "false" => Self::False,
      "for" => Self::For,
      "while" => Self::While,
      "fun" => Self::Fun,
      "return" => Self::Return,
      "out" => Self::Out,
      "in" => Self::In,
      _ => return None,
    };
    Some(kind)
  }
}

/// A token with the text it stands for and where it started.
///
/// `lexeme` is the source spelling for punctuation, keywords and identifiers,
/// the unescaped contents for strings, and decimal text for numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub line: usize,
  pub column: usize,
}

impl Token {
  pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Self {
    Self {
      kind,
      lexeme: lexeme.into(),
      line,
      column,
    }
  }
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> LexResult<Vec<Token>> {
  let mut scanner = Scanner::new(input);
  let mut tokens = Vec::new();

  while let Some(token) = scanner.next_token()? {
    tokens.push(token);
  }

  tokens.push(Token::new(TokenKind::Eof, "", scanner.line, scanner.column));
  Ok(tokens)
}

fn radix_of(prefix: char) -> Option<u32> {
  match prefix {
    'x' => Some(16),
    'o' => Some(8),
    'b' => Some(2),
    _ => None,
  }
}

/// Character cursor that tracks the 1-based line and column of the next char.
struct Scanner<'a> {
  chars: Peekable<Chars<'a>>,
  line: usize,
  column: usize,
}

impl<'a> Scanner<'a> {
  fn new(input: &'a str) -> Self {
    Self {
      chars: input.chars().peekable(),
      line: 1,
      column: 1,
    }
  }

  fn peek(&mut self) -> Option<char> {
    self.chars.peek().copied()
  }

  fn advance(&mut self) -> Option<char> {
    let c = self.chars.next()?;
    if c == '\n' {
      self.line += 1;
      self.column = 1;
    } else {
      self.column += 1;
    }
    Some(c)
  }

  /// Consume the next char if it equals `expected`.
  fn eat(&mut self, expected: char) -> bool {
    if self.peek() == Some(expected) {
      self.advance();
      return true;
    }
    false
  }

  /// Produce the next token, or `None` once the input is exhausted.
  fn next_token(&mut self) -> LexResult<Option<Token>> {
    loop {
      let (line, column) = (self.line, self.column);
      let Some(c) = self.advance() else {
        return Ok(None);
      };

      let single = |kind: TokenKind| Ok(Some(Token::new(kind, c.to_string(), line, column)));
      let pair = |kind: TokenKind, text: &str| Ok(Some(Token::new(kind, text, line, column)));

      return match c {
        ' ' | '\r' | '\t' | '\n' => continue,
        '(' => single(TokenKind::LeftParen),
        ')' => single(TokenKind::RightParen),
        '{' => single(TokenKind::LeftBrace),
        '}' => single(TokenKind::RightBrace),
        ',' => single(TokenKind::Comma),
        '.' => single(TokenKind::Dot),
        '-' => single(TokenKind::Minus),
        '+' => single(TokenKind::Plus),
        ';' => single(TokenKind::Semicolon),
        '*' => single(TokenKind::Star),
        '~' => single(TokenKind::Tilde),
        '!' if self.eat('=') => pair(TokenKind::BangEqual, "!="),
        '!' => single(TokenKind::Bang),
        '=' if self.eat('=') => pair(TokenKind::EqualEqual, "=="),
        '=' => single(TokenKind::Equal),
        '<' if self.eat('=') => pair(TokenKind::LessEqual, "<="),
        '<' => single(TokenKind::Less),
        '>' if self.eat('=') => pair(TokenKind::GreaterEqual, ">="),
        '>' => single(TokenKind::Greater),
        '&' if self.eat('&') => pair(TokenKind::AmpAmp, "&&"),
        '&' => single(TokenKind::Amp),
        '|' if self.eat('|') => pair(TokenKind::PipePipe, "||"),
        '|' => single(TokenKind::Pipe),
        '/' if self.eat('/') => {
          while self.peek().is_some_and(|c| c != '\n') {
            self.advance();
          }
          continue;
        }
        '/' => single(TokenKind::Slash),
        '"' => self.string(line, column).map(Some),
        c if c.is_ascii_digit() => self.number(c, line, column).map(Some),
        c if c.is_ascii_alphabetic() || c == '_' => Ok(Some(self.identifier(c, line, column))),
        character => UnexpectedCharacterSnafu {
          line,
          column,
          character,
        }
        .fail(),
      };
    }
  }

  fn string(&mut self, line: usize, column: usize) -> LexResult<Token> {
    let mut value = String::new();
    loop {
      match self.advance() {
        None => return UnterminatedStringSnafu { line, column }.fail(),
        Some('"') => break,
        Some('\\') => match self.advance() {
          Some(escaped) => value.push(escaped),
          None => return UnterminatedStringSnafu { line, column }.fail(),
        },
        Some(c) => value.push(c),
      }
    }
    Ok(Token::new(TokenKind::String, value, line, column))
  }

  fn number(&mut self, first: char, line: usize, column: usize) -> LexResult<Token> {
    if first == '0'
      && let Some(prefix) = self.peek().map(|c| c.to_ascii_lowercase())
      && let Some(radix) = radix_of(prefix)
    {
      self.advance();
      let mut digits = String::new();
      while let Some(c) = self.peek().filter(|c| c.is_digit(radix)) {
        digits.push(c);
        self.advance();
      }
      if digits.is_empty() {
        return MissingDigitsSnafu {
          line,
          column,
          prefix,
        }
        .fail();
      }
      let value = u64::from_str_radix(&digits, radix).map_err(|_| {
        NumberOverflowSnafu {
          line,
          column,
          text: format!("0{prefix}{digits}"),
        }
        .build()
      })?;
      return Ok(Token::new(TokenKind::Number, value.to_string(), line, column));
    }

    let mut text = String::from(first);
    while let Some(c) = self.peek().filter(char::is_ascii_digit) {
      text.push(c);
      self.advance();
    }

    // A '.' only belongs to the literal when a digit follows it.
    let mut lookahead = self.chars.clone();
    if lookahead.next() == Some('.') && lookahead.next().is_some_and(|c| c.is_ascii_digit()) {
      self.advance();
      text.push('.');
      while let Some(c) = self.peek().filter(char::is_ascii_digit) {
        text.push(c);
        self.advance();
      }
    }

    Ok(Token::new(TokenKind::Number, text, line, column))
  }

  fn identifier(&mut self, first: char, line: usize, column: usize) -> Token {
    let mut text = String::from(first);
    while let Some(c) = self
      .peek()
      .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
    {
      text.push(c);
      self.advance();
    }
    let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier);
    Token::new(kind, text, line, column)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::LexicalError;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
      .unwrap()
      .into_iter()
      .map(|token| token.kind)
      .collect()
  }

  #[test]
  fn two_character_operators_win_over_prefixes() {
    assert_eq!(
      kinds("a <= b && c || !d != e"),
      vec![
        TokenKind::Identifier,
        TokenKind::LessEqual,
        TokenKind::Identifier,
        TokenKind::AmpAmp,
        TokenKind::Identifier,
        TokenKind::PipePipe,
        TokenKind::Bang,
        TokenKind::Identifier,
        TokenKind::BangEqual,
        TokenKind::Identifier,
        TokenKind::Eof,
      ]
    );
  }

  #[test]
  fn keywords_are_matched_exactly() {
    assert_eq!(
      kinds("var if else true false for while fun return out in input"),
      vec![
        TokenKind::Var,
        TokenKind::If,
        TokenKind::Else,
        TokenKind::True,
        TokenKind::False,
        TokenKind::For,
        TokenKind::While,
        TokenKind::Fun,
        TokenKind::Return,
        TokenKind::Out,
        TokenKind::In,
        TokenKind::Identifier,
        TokenKind::Eof,
      ]
    );
  }

  #[test]
  fn radix_literals_are_normalised_to_decimal() {
    let tokens = tokenize("0xFF 0o17 0b101 42 3.25 0X1a").unwrap();
    let lexemes: Vec<&str> = tokens[..6].iter().map(|t| t.lexeme.as_str()).collect();
    assert_eq!(lexemes, ["255", "15", "5", "42", "3.25", "26"]);
    assert!(tokens[..6].iter().all(|t| t.kind == TokenKind::Number));
  }

  #[test]
  fn trailing_dot_is_not_part_of_a_number() {
    assert_eq!(
      kinds("7."),
      vec![TokenKind::Number, TokenKind::Dot, TokenKind::Eof]
    );
  }

  #[test]
  fn comments_run_to_end_of_line() {
    let tokens = tokenize("out 1 // out 2\nout 3").unwrap();
    let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
    assert_eq!(lexemes, ["out", "1", "out", "3", ""]);
    assert_eq!(tokens[2].line, 2);
    assert_eq!(tokens[2].column, 1);
  }

  #[test]
  fn string_escapes_keep_the_escaped_character() {
    let tokens = tokenize(r#""a\"b\n""#).unwrap();
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[0].lexeme, "a\"bn");
  }

  #[test]
  fn unterminated_string_reports_its_start() {
    let err = tokenize("var s = \"open").unwrap_err();
    assert_eq!(err, LexicalError::UnterminatedString { line: 1, column: 9 });
  }

  #[test]
  fn unexpected_character_is_located() {
    let err = tokenize("var x = 1\n  @").unwrap_err();
    assert_eq!(
      err,
      LexicalError::UnexpectedCharacter {
        line: 2,
        column: 3,
        character: '@',
      }
    );
  }

  #[test]
  fn radix_prefix_without_digits_is_rejected() {
    let err = tokenize("0x").unwrap_err();
    assert!(matches!(err, LexicalError::MissingDigits { prefix: 'x', .. }));
  }
}
