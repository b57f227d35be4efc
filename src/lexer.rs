use tracing::debug;

use crate::diagnostics::{Diagnostic, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Func,
    Main,
    Let,
    Return,
    If,
    Else,
    For,
    Try,
    Catch,
    Import,
    While,
    In,
    True,
    False,
    And,
    Or,
    Not,
    Class,
    This,
    Extends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Keyword(Keyword),
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Less,
    Greater,
    Assign,
    Bang,
    Dot,
    EqualEqual,
    BangEqual,
    LessEqual,
    GreaterEqual,
    Range,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token. For strings this is the unescaped content
    /// without the surrounding quotes.
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    pub fn line(&self) -> usize {
        self.position.line
    }

    pub fn column(&self) -> usize {
        self.position.column
    }

    pub fn is_identifier(&self, text: &str) -> bool {
        self.kind == TokenKind::Identifier && self.lexeme == text
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current: 0,
            line: 1,
            column: 1,
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let (idx, ch) = self.chars.next()?;
        self.current = idx + ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn peek_next(&self) -> Option<char> {
        self.source[self.current..].chars().nth(1)
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), Diagnostic> {
        loop {
            match (self.peek(), self.peek_next()) {
                (Some(' ' | '\t' | '\r' | '\n'), _) => {
                    self.bump();
                }
                (Some('#'), _) | (Some('/'), Some('/')) => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => self.block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn block_comment(&mut self) -> Result<(), Diagnostic> {
        let start = self.position();
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
                None => {
                    return Err(Diagnostic::lexer("unterminated block comment", start)
                        .with_hint("close the comment with '*/'")
                        .incomplete());
                }
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize, position: Position) -> Token {
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let lexeme = self.source[start..self.current].to_string();
        let kind = keyword_for(&lexeme).unwrap_or(TokenKind::Identifier);
        Token {
            kind,
            lexeme,
            position,
        }
    }

    fn number_literal(&mut self, start: usize, position: Position) -> Token {
        let mut seen_dot = false;
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => {
                    self.bump();
                }
                '.' if !seen_dot && self.peek_next() != Some('.') => {
                    seen_dot = true;
                    self.bump();
                }
                _ => break,
            }
        }
        Token {
            kind: TokenKind::Number,
            lexeme: self.source[start..self.current].to_string(),
            position,
        }
    }

    fn string_literal(&mut self, position: Position) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        loop {
            let escape_position = self.position();
            match self.bump() {
                Some('"') => {
                    return Ok(Token {
                        kind: TokenKind::String,
                        lexeme: value,
                        position,
                    });
                }
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => {
                        return Err(Diagnostic::lexer(
                            format!("unsupported escape sequence '\\{other}'"),
                            escape_position,
                        )
                        .with_hint("supported escapes are \\n, \\t, \\\" and \\\\"));
                    }
                    None => break,
                },
                Some(ch) => value.push(ch),
                None => break,
            }
        }
        Err(Diagnostic::lexer("unterminated string literal", position)
            .with_hint("close the string with '\"'")
            .incomplete())
    }

    fn simple_token(&self, start: usize, kind: TokenKind, position: Position) -> Token {
        Token {
            kind,
            lexeme: self.source[start..self.current].to_string(),
            position,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;
            let position = self.position();
            let start = self.current;
            let ch = match self.bump() {
                Some(ch) => ch,
                None => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        lexeme: String::new(),
                        position,
                    });
                    break;
                }
            };

            let kind = match ch {
                c if c.is_alphabetic() || c == '_' => {
                    tokens.push(self.identifier_or_keyword(start, position));
                    continue;
                }
                '0'..='9' => {
                    tokens.push(self.number_literal(start, position));
                    continue;
                }
                '"' => {
                    tokens.push(self.string_literal(position)?);
                    continue;
                }
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                ';' => TokenKind::Semicolon,
                ',' => TokenKind::Comma,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '.' => {
                    if self.match_next('.') {
                        TokenKind::Range
                    } else {
                        TokenKind::Dot
                    }
                }
                '=' => {
                    if self.match_next('=') {
                        TokenKind::EqualEqual
                    } else {
                        TokenKind::Assign
                    }
                }
                '!' => {
                    if self.match_next('=') {
                        TokenKind::BangEqual
                    } else {
                        TokenKind::Bang
                    }
                }
                '<' => {
                    if self.match_next('=') {
                        TokenKind::LessEqual
                    } else {
                        TokenKind::Less
                    }
                }
                '>' => {
                    if self.match_next('=') {
                        TokenKind::GreaterEqual
                    } else {
                        TokenKind::Greater
                    }
                }
                other => {
                    return Err(Diagnostic::lexer(
                        format!("unexpected character '{other}'"),
                        position,
                    ));
                }
            };
            tokens.push(self.simple_token(start, kind, position));
        }
        debug!(tokens = tokens.len(), "tokenized source");
        Ok(tokens)
    }
}

/// Convenience wrapper over [`Lexer::tokenize`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    Lexer::new(source).tokenize()
}

fn keyword_for(ident: &str) -> Option<TokenKind> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "func" => Kw::Func,
        "main" => Kw::Main,
        "let" => Kw::Let,
        "return" => Kw::Return,
        "if" => Kw::If,
        "else" => Kw::Else,
        "for" => Kw::For,
        "try" => Kw::Try,
        "catch" => Kw::Catch,
        "import" => Kw::Import,
        "while" => Kw::While,
        "in" => Kw::In,
        "true" => Kw::True,
        "false" => Kw::False,
        "and" => Kw::And,
        "or" => Kw::Or,
        "not" => Kw::Not,
        "class" => Kw::Class,
        "this" => Kw::This,
        "extends" => Kw::Extends,
        _ => return None,
    };
    Some(TokenKind::Keyword(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn shape(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|t| (t.kind, t.lexeme))
            .collect()
    }

    #[test]
    fn empty_source_yields_single_eof() {
        let tokens = tokenize("").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
        assert_eq!(tokens[0].position, Position::new(1, 1));
    }

    #[test]
    fn eof_is_last_and_unique() {
        let tokens = tokenize("main { let x = 1; } // done").unwrap();
        let eofs = tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
        assert_eq!(eofs, 1);
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }

    #[test]
    fn decimal_number_is_one_token() {
        let tokens = tokenize("3.14").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "3.14");
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn trailing_decimal_point_stays_in_number() {
        assert_eq!(
            shape("1.;"),
            vec![
                (TokenKind::Number, "1.".to_string()),
                (TokenKind::Semicolon, ";".to_string()),
                (TokenKind::Eof, String::new()),
            ]
        );
    }

    #[test]
    fn range_between_numbers() {
        assert_eq!(
            shape("1..5"),
            vec![
                (TokenKind::Number, "1".to_string()),
                (TokenKind::Range, "..".to_string()),
                (TokenKind::Number, "5".to_string()),
                (TokenKind::Eof, String::new()),
            ]
        );
    }

    #[test]
    fn two_char_operators_win() {
        assert_eq!(
            kinds("== != <= >= < > = !"),
            vec![
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Assign,
                TokenKind::Bang,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        let tokens = tokenize("func mainly main _x1 this").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Func));
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].kind, TokenKind::Keyword(Keyword::Main));
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
        assert_eq!(tokens[4].kind, TokenKind::Keyword(Keyword::This));
    }

    #[test]
    fn comments_and_whitespace_do_not_change_tokens() {
        let compact = shape("let x=1+2;");
        let spaced = shape(
            "# leading comment\nlet   x /* inline\n block */ =\n\t1 + // tail\n 2 ;",
        );
        assert_eq!(compact, spaced);
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let tokens = tokenize("let a = 1;\n  py.print(a);").unwrap();
        let py = tokens.iter().find(|t| t.is_identifier("py")).unwrap();
        assert_eq!(py.position, Position::new(2, 3));
        let print = tokens.iter().find(|t| t.is_identifier("print")).unwrap();
        assert_eq!(print.position, Position::new(2, 6));
    }

    #[test]
    fn string_escapes() {
        let tokens = tokenize(r#""a\n\t\"\\b""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "a\n\t\"\\b");
    }

    #[test]
    fn unknown_escape_is_an_error() {
        let err = tokenize(r#"let s = "\q";"#).unwrap_err();
        assert!(err.message.contains("unsupported escape"), "{err}");
        assert_eq!(err.line(), Some(1));
        assert_eq!(err.column(), Some(10));
        assert!(!err.is_incomplete_input());
    }

    #[test]
    fn unterminated_string_reports_opening_quote() {
        let err = tokenize("main {\n  let s = \"abc\n}").unwrap_err();
        assert!(err.message.contains("unterminated string"), "{err}");
        assert_eq!(err.position, Some(Position::new(2, 11)));
        assert!(err.is_incomplete_input());
    }

    #[test]
    fn unterminated_block_comment_is_incomplete() {
        let err = tokenize("/* never closed").unwrap_err();
        assert_eq!(err.position, Some(Position::new(1, 1)));
        assert!(err.is_incomplete_input());
    }

    #[test]
    fn unexpected_character() {
        let err = tokenize("let x = 1 @ 2;").unwrap_err();
        assert!(err.message.contains("'@'"), "{err}");
        assert_eq!(err.position, Some(Position::new(1, 11)));
    }
}
