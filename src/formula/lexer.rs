//! Tokenizer for rule formulas, built on logos.

use super::error::FormulaError;
use logos::Logos;
use std::ops::Range;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),

    // Section-qualified references are dotted: `Costs.Total`.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Str(s) => format!("string {:?}", s),
            Token::Ident(name) => format!("name '{}'", name),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Percent => "'%'".into(),
            Token::Caret => "'^'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Comma => "','".into(),
            Token::Equals => "'='".into(),
        }
    }
}

/// Strips the quotes and resolves `\"`, `\\`, `\n` and `\t`.
fn unescape(slice: &str) -> Option<String> {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            other => out.push(other),
        }
    }
    Some(out)
}

pub fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, FormulaError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(FormulaError::Parse {
                    offset: span.start,
                    message: format!("unexpected input '{}'", &source[span]),
                })
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_tokenizes_arithmetic() {
        assert_eq!(
            kinds("= A+2.5*(b_1)"),
            vec![
                Token::Equals,
                Token::Ident("A".into()),
                Token::Plus,
                Token::Number(2.5),
                Token::Star,
                Token::LParen,
                Token::Ident("b_1".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_qualified_name_is_one_token() {
        assert_eq!(kinds("Costs.Total"), vec![Token::Ident("Costs.Total".into())]);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""say \"hi\"""#), vec![Token::Str("say \"hi\"".into())]);
    }

    #[test]
    fn test_reports_offset_of_bad_input() {
        let err = tokenize("A + $").unwrap_err();
        assert!(matches!(err, FormulaError::Parse { offset: 4, .. }), "{:?}", err);
    }
}
