use super::ast::{BinaryOp, Builtin, Expr, UnaryOp};
use super::error::FormulaError;
use super::parser::parse;
use crate::store::{ResolvedValue, ValueKind};
use std::collections::{BTreeMap, HashMap};

/// Read access to already-resolved values, by name.
pub trait Environment {
    fn lookup(&self, name: &str) -> Option<&ResolvedValue>;
}

impl Environment for HashMap<String, ResolvedValue> {
    fn lookup(&self, name: &str) -> Option<&ResolvedValue> { self.get(name) }
}

impl Environment for BTreeMap<String, ResolvedValue> {
    fn lookup(&self, name: &str) -> Option<&ResolvedValue> { self.get(name) }
}

/// Parses and evaluates `formula` against `env`.
pub fn evaluate<E: Environment + ?Sized>(formula: &str, env: &E) -> Result<ResolvedValue, FormulaError> {
    parse(formula)?.eval(env)
}

impl Expr {
    pub fn eval<E: Environment + ?Sized>(&self, env: &E) -> Result<ResolvedValue, FormulaError> {
        match self {
            Expr::Number(n) => Ok(ResolvedValue::Numeric(*n)),
            Expr::Text(s) => Ok(ResolvedValue::Text(s.clone())),
            Expr::Ref(name) => env
                .lookup(name)
                .cloned()
                .ok_or_else(|| FormulaError::UnknownReference(name.clone())),
            Expr::Unary { op, operand } => {
                let n = numeric(operand.eval(env)?, unary_symbol(*op))?;
                Ok(ResolvedValue::Numeric(match op {
                    UnaryOp::Negate => -n,
                    UnaryOp::Plus => n,
                }))
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(env)?;
                let r = rhs.eval(env)?;
                binary(*op, l, r)
            }
            Expr::Call { func, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(numeric(arg.eval(env)?, func.name())?);
                }
                call(*func, &values)
            }
        }
    }
}

fn binary(op: BinaryOp, l: ResolvedValue, r: ResolvedValue) -> Result<ResolvedValue, FormulaError> {
    if let (BinaryOp::Add, ResolvedValue::Text(a), ResolvedValue::Text(b)) = (op, &l, &r) {
        return Ok(ResolvedValue::Text(format!("{}{}", a, b)));
    }

    let symbol = binary_symbol(op);
    let (a, b) = (numeric(l, symbol)?, numeric(r, symbol)?);
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide | BinaryOp::Modulo if b == 0.0 => {
            return Err(FormulaError::Arithmetic("division by zero".into()));
        }
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo => a % b,
        BinaryOp::Power => a.powf(b),
    };
    finite(result)
}

fn call(func: Builtin, args: &[f64]) -> Result<ResolvedValue, FormulaError> {
    let result = match func {
        Builtin::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
        Builtin::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Builtin::Abs => args[0].abs(),
        Builtin::Round => args[0].round(),
        Builtin::Floor => args[0].floor(),
        Builtin::Ceil => args[0].ceil(),
    };
    finite(result)
}

fn numeric(value: ResolvedValue, context: &str) -> Result<f64, FormulaError> {
    match value {
        ResolvedValue::Numeric(n) => Ok(n),
        ResolvedValue::Text(s) => Err(FormulaError::TypeMismatch(format!(
            "'{}' expects {} operands, got Text {:?}",
            context,
            ValueKind::Numeric,
            s
        ))),
    }
}

fn finite(n: f64) -> Result<ResolvedValue, FormulaError> {
    if n.is_finite() {
        Ok(ResolvedValue::Numeric(n))
    } else {
        Err(FormulaError::Arithmetic(format!("result {} is not a finite number", n)))
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Modulo => "%",
        BinaryOp::Power => "^",
    }
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Negate => "-",
        UnaryOp::Plus => "+",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn env() -> HashMap<String, ResolvedValue> {
        HashMap::from([
            ("A".to_string(), ResolvedValue::Numeric(5.0)),
            ("B".to_string(), ResolvedValue::Numeric(-2.0)),
            ("Title".to_string(), ResolvedValue::Text("Goblin".into())),
        ])
    }

    #[rstest]
    #[case("A+2", 7.0)]
    #[case("= A * (B + 1)", -5.0)]
    #[case("2 ^ 3 ^ 2", 512.0)]
    #[case("-2 ^ 2", -4.0)]
    #[case("A % 3", 2.0)]
    #[case("min(A, B, 3)", -2.0)]
    #[case("max(A, B)", 5.0)]
    #[case("abs(B) + round(2.5) + floor(1.9) + ceil(0.1)", 7.0)]
    #[case(".5 + 1e1", 10.5)]
    fn test_numeric_formulas(#[case] src: &str, #[case] expected: f64) {
        assert_eq!(evaluate(src, &env()).unwrap(), ResolvedValue::Numeric(expected));
    }

    #[test]
    fn test_text_concatenation() {
        let out = evaluate(r#"Title + " Chief""#, &env()).unwrap();
        assert_eq!(out, ResolvedValue::Text("Goblin Chief".into()));
    }

    #[rstest]
    #[case("Title + 1")]
    #[case("-Title")]
    #[case("Title * 2")]
    #[case("abs(Title)")]
    fn test_mixed_kinds_are_type_mismatch(#[case] src: &str) {
        let err = evaluate(src, &env()).unwrap_err();
        assert!(matches!(err, FormulaError::TypeMismatch(_)), "{} -> {:?}", src, err);
    }

    #[rstest]
    #[case("A / 0")]
    #[case("A % (B + 2)")]
    #[case("0 ^ -1")]
    #[case("10 ^ 400")]
    fn test_arithmetic_errors(#[case] src: &str) {
        let err = evaluate(src, &env()).unwrap_err();
        assert!(matches!(err, FormulaError::Arithmetic(_)), "{} -> {:?}", src, err);
    }

    #[test]
    fn test_missing_name_is_unknown_reference() {
        let err = evaluate("A + Missing", &env()).unwrap_err();
        assert_eq!(err, FormulaError::UnknownReference("Missing".into()));
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let expr = parse("A / 3 + B * 0.1").unwrap();
        let first = expr.eval(&env()).unwrap();
        let second = expr.eval(&env()).unwrap();
        assert_eq!(first.as_number().map(f64::to_bits), second.as_number().map(f64::to_bits));
    }
}
