//! Outline lexer
//!
//! Tokenizes module source with logos. Tokens carry no payload; the parser
//! reads names and literals from the matched slice.

use logos::Logos;

/// Outline tokens
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    // Whitespace and comments (skip)
    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Whitespace,

    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*", lex_block_comment)]
    BlockComment,

    // Keywords (must come before identifiers)
    #[token("from")]
    From,

    #[token("import")]
    Import,

    #[token("as")]
    As,

    #[token("public")]
    Public,

    #[token("private")]
    Private,

    #[token("type")]
    Type,

    #[token("interface")]
    Interface,

    #[token("define")]
    Define,

    #[token("service")]
    Service,

    #[token("inputPort")]
    InputPort,

    #[token("outputPort")]
    OutputPort,

    #[token("embed")]
    Embed,

    #[token("in")]
    In,

    #[token("main")]
    Main,

    #[token("throws")]
    Throws,

    #[token("instanceof")]
    InstanceOf,

    // Identifiers (must come after keywords)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Identifier,

    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLiteral,

    #[regex(r"[0-9]+(\.[0-9]+)?[lLfFdD]?")]
    NumberLiteral,

    // Punctuation
    #[token("{")]
    LeftBrace,

    #[token("}")]
    RightBrace,

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("[")]
    LeftBracket,

    #[token("]")]
    RightBracket,

    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token(".")]
    Dot,

    #[token("|")]
    Pipe,

    #[token("*")]
    Star,

    #[token("?")]
    Question,

    /// Operators that only appear inside behaviour code
    #[regex(r"[=+\-<>!&@/#%^~]+")]
    Operator,
}

impl Token {
    /// Keywords and identifiers, usable wherever a plain name is expected
    pub fn is_word(self) -> bool {
        !matches!(
            self,
            Token::Whitespace
                | Token::LineComment
                | Token::BlockComment
                | Token::StringLiteral
                | Token::NumberLiteral
                | Token::LeftBrace
                | Token::RightBrace
                | Token::LeftParen
                | Token::RightParen
                | Token::LeftBracket
                | Token::RightBracket
                | Token::Colon
                | Token::Comma
                | Token::Semicolon
                | Token::Dot
                | Token::Pipe
                | Token::Star
                | Token::Question
                | Token::Operator
        )
    }
}

fn lex_block_comment(lex: &mut logos::Lexer<'_, Token>) -> logos::Skip {
    let remainder = lex.remainder();
    match remainder.find("*/") {
        Some(end) => lex.bump(end + 2),
        // Unterminated comment - consume to end
        None => lex.bump(remainder.len()),
    }
    logos::Skip
}

/// A token with its source text and line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme<'s> {
    /// Token kind
    pub token: Token,
    /// Matched text
    pub text: &'s str,
    /// 1-based line
    pub line: u32,
}

/// Text that matched no token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidToken {
    /// 1-based line
    pub line: u32,
    /// Offending text
    pub text: String,
}

/// Split source text into lexemes
pub fn tokenize(source: &str) -> Result<Vec<Lexeme<'_>>, InvalidToken> {
    let mut lexemes = Vec::new();
    let mut line = 1u32;
    let mut counted = 0usize;

    for (result, span) in Token::lexer(source).spanned() {
        line += source[counted..span.start].matches('\n').count() as u32;
        counted = span.start;

        let text = &source[span];
        match result {
            Ok(token) => lexemes.push(Lexeme { token, text, line }),
            Err(()) => {
                return Err(InvalidToken {
                    line,
                    text: text.to_string(),
                })
            }
        }
    }
    Ok(lexemes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|l| l.token).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("from .a.b import x as y"),
            vec![
                Token::From,
                Token::Dot,
                Token::Identifier,
                Token::Dot,
                Token::Identifier,
                Token::Import,
                Token::Identifier,
                Token::As,
                Token::Identifier,
            ]
        );
        assert_eq!(kinds("types"), vec![Token::Identifier]);
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("type // trailing\n/* block\n comment */ T"),
            vec![Token::Type, Token::Identifier]
        );
    }

    #[test]
    fn test_lines_are_tracked() {
        let lexemes = tokenize("type A: int\n\n/* x\n*/ type B: string").unwrap();
        let b = lexemes.iter().find(|l| l.text == "B").unwrap();
        assert_eq!(lexemes[0].line, 1);
        assert_eq!(b.line, 4);
    }

    #[test]
    fn test_literals_and_operators() {
        let lexemes = tokenize(r#"location: "socket://localhost:8000" x = 1.5 + y"#).unwrap();
        assert_eq!(lexemes[2].token, Token::StringLiteral);
        assert_eq!(lexemes[2].text, r#""socket://localhost:8000""#);
        assert_eq!(lexemes[4].token, Token::Operator);
        assert_eq!(lexemes[5].token, Token::NumberLiteral);
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("type A: int\n`").unwrap_err();
        assert_eq!(err, InvalidToken { line: 2, text: "`".to_string() });
    }
}
