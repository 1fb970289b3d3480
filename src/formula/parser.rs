//! Recursive-descent parser for the formula grammar.
//!
//! Precedence, lowest first: `+ -`, `* / %`, unary `- +`, `^` (right-assoc).
//! A leading `=` is accepted and ignored.

use super::ast::{BinaryOp, Builtin, Expr, UnaryOp};
use super::error::FormulaError;
use super::lexer::{tokenize, Token};
use std::ops::Range;

/// Deepest expression tree (and deepest parenthesis/unary nesting) a
/// formula may have. Parsing, evaluation and drop all recurse over the tree.
pub const MAX_DEPTH: usize = 256;

/// An expression and the depth of its tree.
type Parsed = (Expr, usize);

pub fn parse(source: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0, end: source.len(), nesting: 0 };

    if parser.peek() == Some(&Token::Equals) {
        parser.pos += 1;
    }
    if parser.peek().is_none() {
        return Err(parser.error_here("empty formula"));
    }

    let (expr, _) = parser.expr()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some((token, span)) => Err(FormulaError::Parse {
            offset: span.start,
            message: format!("unexpected {} after expression", token.describe()),
        }),
    }
}

struct Parser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    end: usize,
    nesting: usize,
}

fn too_deep(offset: usize) -> FormulaError {
    FormulaError::Parse {
        offset,
        message: format!("formula nested too deeply (limit {})", MAX_DEPTH),
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(_, span)| span.start)
    }

    fn error_here(&self, message: &str) -> FormulaError {
        let found = match self.peek() {
            Some(token) => token.describe(),
            None => "end of formula".to_string(),
        };
        FormulaError::Parse { offset: self.offset(), message: format!("{}, found {}", message, found) }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), FormulaError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error_here(&format!("expected {}", what)))
        }
    }

    fn binary(&self, op: BinaryOp, (lhs, ld): Parsed, (rhs, rd): Parsed, offset: usize) -> Result<Parsed, FormulaError> {
        let depth = 1 + ld.max(rd);
        if depth > MAX_DEPTH {
            return Err(too_deep(offset));
        }
        Ok((Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, depth))
    }

    fn expr(&mut self) -> Result<Parsed, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => return Ok(lhs),
            };
            let offset = self.offset();
            self.pos += 1;
            let rhs = self.term()?;
            lhs = self.binary(op, lhs, rhs, offset)?;
        }
    }

    fn term(&mut self) -> Result<Parsed, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                Some(Token::Percent) => BinaryOp::Modulo,
                _ => return Ok(lhs),
            };
            let offset = self.offset();
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = self.binary(op, lhs, rhs, offset)?;
        }
    }

    // Every recursive path (parentheses, call arguments, signs, exponents)
    // re-enters here, so this is where nesting is bounded.
    fn unary(&mut self) -> Result<Parsed, FormulaError> {
        let offset = self.offset();
        if self.nesting >= MAX_DEPTH {
            return Err(too_deep(offset));
        }
        self.nesting += 1;
        let result = self.signed(offset);
        self.nesting -= 1;
        result
    }

    // `-2^2` parses as `-(2^2)`.
    fn signed(&mut self, offset: usize) -> Result<Parsed, FormulaError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Negate,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.power(),
        };
        self.pos += 1;
        let (operand, depth) = self.unary()?;
        if depth + 1 > MAX_DEPTH {
            return Err(too_deep(offset));
        }
        Ok((Expr::Unary { op, operand: Box::new(operand) }, depth + 1))
    }

    fn power(&mut self) -> Result<Parsed, FormulaError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Caret) {
            let offset = self.offset();
            self.pos += 1;
            let exponent = self.unary()?;
            return self.binary(BinaryOp::Power, base, exponent, offset);
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Parsed, FormulaError> {
        let offset = self.offset();
        let found = self.peek().map(Token::describe);
        match self.advance() {
            Some(Token::Number(n)) => Ok((Expr::Number(n), 1)),
            Some(Token::Str(s)) => Ok((Expr::Text(s), 1)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    self.call(name, offset)
                } else {
                    Ok((Expr::Ref(name), 1))
                }
            }
            _ => Err(FormulaError::Parse {
                offset,
                message: format!(
                    "expected a value, found {}",
                    found.unwrap_or_else(|| "end of formula".to_string())
                ),
            }),
        }
    }

    fn call(&mut self, name: String, offset: usize) -> Result<Parsed, FormulaError> {
        let func = Builtin::from_name(&name).ok_or_else(|| FormulaError::Parse {
            offset,
            message: format!("unknown function '{}'", name),
        })?;

        let mut args = Vec::new();
        let mut deepest = 0;
        if self.peek() != Some(&Token::RParen) {
            loop {
                let (arg, depth) = self.expr()?;
                deepest = deepest.max(depth);
                args.push(arg);
                if self.peek() != Some(&Token::Comma) {
                    break;
                }
                self.pos += 1;
            }
        }
        self.expect(Token::RParen, "')' or ','")?;

        let (min, max) = func.arity();
        if args.len() < min || max.is_some_and(|m| args.len() > m) {
            return Err(FormulaError::Parse {
                offset,
                message: format!("'{}' takes {} argument(s), got {}", func.name(), describe_arity(min, max), args.len()),
            });
        }
        if deepest + 1 > MAX_DEPTH {
            return Err(too_deep(offset));
        }
        Ok((Expr::Call { func, args }, deepest + 1))
    }
}

fn describe_arity(min: usize, max: Option<usize>) -> String {
    match max {
        Some(m) if m == min => min.to_string(),
        Some(m) => format!("{} to {}", min, m),
        None => format!("at least {}", min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn num(n: f64) -> Box<Expr> { Box::new(Expr::Number(n)) }
    fn var(name: &str) -> Box<Expr> { Box::new(Expr::Ref(name.into())) }

    #[test]
    fn test_precedence_multiplication_binds_tighter() {
        let expr = parse("A + 2 * B").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: var("A"),
                rhs: Box::new(Expr::Binary { op: BinaryOp::Multiply, lhs: num(2.0), rhs: var("B") }),
            }
        );
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let expr = parse("10 - 4 - 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Subtract,
                lhs: Box::new(Expr::Binary { op: BinaryOp::Subtract, lhs: num(10.0), rhs: num(4.0) }),
                rhs: num(3.0),
            }
        );
    }

    #[test]
    fn test_power_is_right_associative() {
        let expr = parse("2 ^ 3 ^ 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Power,
                lhs: num(2.0),
                rhs: Box::new(Expr::Binary { op: BinaryOp::Power, lhs: num(3.0), rhs: num(2.0) }),
            }
        );
    }

    #[test]
    fn test_leading_equals_is_ignored() {
        assert_eq!(parse("= B").unwrap(), parse("B").unwrap());
    }

    #[test]
    fn test_call_arguments_are_references() {
        let expr = parse("max(A, B * 2, A)").unwrap();
        assert_eq!(expr.references(), vec!["A", "B"]);
    }

    #[rstest]
    #[case(format!("{}1{}", "(".repeat(600), ")".repeat(600)))]
    #[case(format!("{}1", "-".repeat(600)))]
    #[case(vec!["1"; 600].join(" + "))]
    #[case(vec!["2"; 600].join("^"))]
    #[case(format!("{}1{}", "abs(".repeat(600), ")".repeat(600)))]
    fn test_deep_nesting_is_rejected(#[case] src: String) {
        let err = parse(&src).unwrap_err();
        assert!(err.to_string().contains("formula nested too deeply"), "{}", err);
    }

    #[test]
    fn test_nesting_within_limit_parses() {
        let parens = format!("{}A{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(parse(&parens).unwrap(), Expr::Ref("A".into()));

        let chain = vec!["A"; 200].join(" + ");
        assert_eq!(parse(&chain).unwrap().references(), vec!["A"]);
    }

    #[rstest]
    #[case("", "empty formula")]
    #[case("=", "empty formula")]
    #[case("A +", "expected a value")]
    #[case("(A + 1", "expected ')'")]
    #[case("A B", "unexpected name 'B'")]
    #[case("sqrt(4)", "unknown function 'sqrt'")]
    #[case("abs(1, 2)", "takes 1 argument")]
    #[case("min()", "at least 1")]
    #[case("* 3", "expected a value, found '*'")]
    fn test_malformed_formulas(#[case] src: &str, #[case] fragment: &str) {
        let err = parse(src).unwrap_err();
        assert!(err.to_string().contains(fragment), "'{}' -> {}", src, err);
    }
}
