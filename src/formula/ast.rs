//! The parsed form of a rule formula.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Min,
    Max,
    Abs,
    Round,
    Floor,
    Ceil,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "min" => Some(Builtin::Min),
            "max" => Some(Builtin::Max),
            "abs" => Some(Builtin::Abs),
            "round" => Some(Builtin::Round),
            "floor" => Some(Builtin::Floor),
            "ceil" => Some(Builtin::Ceil),
            _ => None,
        }
    }

    /// `(minimum, maximum)` argument count; `None` means unbounded.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Builtin::Min | Builtin::Max => (1, None),
            Builtin::Abs | Builtin::Round | Builtin::Floor | Builtin::Ceil => (1, Some(1)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Abs => "abs",
            Builtin::Round => "round",
            Builtin::Floor => "floor",
            Builtin::Ceil => "ceil",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Ref(String),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { func: Builtin, args: Vec<Expr> },
}

impl Expr {
    /// Names this expression reads, in order of first appearance.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) | Expr::Text(_) => {}
            Expr::Ref(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_refs(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_refs(out);
                rhs.collect_refs(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_refs(out);
                }
            }
        }
    }
}
