//! Expression tree and the closed operator set.
//!
//! Every operator node is built through [`Expr::operator`] (or
//! [`Expr::build`]), which checks arity and operand shape once. A tree that
//! exists is well-formed; evaluation never re-checks operand counts.

use std::fmt;

use crate::error::{Arity, MalformedExpression};
use crate::numeric::{ArithOp, CompareOp};
use crate::value::{parse_timestamp, Path, Value};

/// Binding name for the element under iteration.
pub const CURRENT: &str = "$current";
/// Binding name for the running value of `reduce`.
pub const ACCUMULATOR: &str = "$accumulator";

/// Every operator the language knows, keyed by its canonical JSON key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Var,
    VarMap,
    Missing,
    MissingSome,
    And,
    Or,
    Not,
    Truthy,
    If,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
    In,
    Cat,
    Substr,
    Merge,
    Map,
    Filter,
    All,
    Some,
    None,
    Reduce,
    Contains,
    DoesNotContain,
    ContainsAnyOf,
    Before,
    After,
    Constant,
    Timestamp,
    Node,
    MatchesTemplate,
}

impl Operator {
    pub const ALL: [Operator; 41] = [
        Operator::Var,
        Operator::VarMap,
        Operator::Missing,
        Operator::MissingSome,
        Operator::And,
        Operator::Or,
        Operator::Not,
        Operator::Truthy,
        Operator::If,
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Mod,
        Operator::Min,
        Operator::Max,
        Operator::In,
        Operator::Cat,
        Operator::Substr,
        Operator::Merge,
        Operator::Map,
        Operator::Filter,
        Operator::All,
        Operator::Some,
        Operator::None,
        Operator::Reduce,
        Operator::Contains,
        Operator::DoesNotContain,
        Operator::ContainsAnyOf,
        Operator::Before,
        Operator::After,
        Operator::Constant,
        Operator::Timestamp,
        Operator::Node,
        Operator::MatchesTemplate,
    ];

    /// Canonical JSON key.
    pub fn key(&self) -> &'static str {
        match self {
            Operator::Var => "var",
            Operator::VarMap => "var_map",
            Operator::Missing => "missing",
            Operator::MissingSome => "missing_some",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "!",
            Operator::Truthy => "!!",
            Operator::If => "if",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Min => "min",
            Operator::Max => "max",
            Operator::In => "in",
            Operator::Cat => "cat",
            Operator::Substr => "substr",
            Operator::Merge => "merge",
            Operator::Map => "map",
            Operator::Filter => "filter",
            Operator::All => "all",
            Operator::Some => "some",
            Operator::None => "none",
            Operator::Reduce => "reduce",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "does_not_contain",
            Operator::ContainsAnyOf => "contains_any_of",
            Operator::Before => "before",
            Operator::After => "after",
            Operator::Constant => "constant",
            Operator::Timestamp => "timestamp",
            Operator::Node => "node",
            Operator::MatchesTemplate => "matches_template",
        }
    }

    /// Look up an operator by key, including the aliases `===`, `!==` and `?:`.
    pub fn from_key(key: &str) -> Option<Operator> {
        match key {
            "===" => Some(Operator::Eq),
            "!==" => Some(Operator::Ne),
            "?:" => Some(Operator::If),
            _ => Operator::ALL.into_iter().find(|op| op.key() == key),
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Operator::Var | Operator::VarMap => Arity::Between(1, 2),
            Operator::Missing | Operator::Cat | Operator::Merge => Arity::AtLeast(0),
            Operator::And
            | Operator::Or
            | Operator::If
            | Operator::Add
            | Operator::Sub
            | Operator::Mul
            | Operator::Min
            | Operator::Max => Arity::AtLeast(1),
            Operator::Div => Arity::AtLeast(2),
            Operator::Not | Operator::Truthy | Operator::Constant | Operator::Timestamp => {
                Arity::Exactly(1)
            }
            Operator::Node => Arity::Between(0, 1),
            Operator::Lt | Operator::Lte | Operator::Substr => Arity::Between(2, 3),
            Operator::Map | Operator::Filter | Operator::All | Operator::Some | Operator::None => {
                Arity::Between(2, 3)
            }
            Operator::Reduce => Arity::Exactly(3),
            Operator::MissingSome
            | Operator::Eq
            | Operator::Ne
            | Operator::Gt
            | Operator::Gte
            | Operator::Mod
            | Operator::In
            | Operator::Contains
            | Operator::DoesNotContain
            | Operator::ContainsAnyOf
            | Operator::Before
            | Operator::After
            | Operator::MatchesTemplate => Arity::Exactly(2),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Collection operators that evaluate a body once per element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IterOp {
    Map,
    Filter,
    All,
    Some,
    None,
}

impl IterOp {
    pub fn operator(&self) -> Operator {
        match self {
            IterOp::Map => Operator::Map,
            IterOp::Filter => Operator::Filter,
            IterOp::All => Operator::All,
            IterOp::Some => Operator::Some,
            IterOp::None => Operator::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalOp {
    Before,
    After,
}

/// An immutable expression tree. Safe to share across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Value),
    /// A JSON array of expressions; evaluates to a Sequence.
    Array(Vec<Expr>),
    Var {
        path: Path,
        default: Option<Box<Expr>>,
    },
    /// Path lookup that maps unknown keys over sequences, flattening results.
    VarMap {
        path: Box<Expr>,
        data: Option<Box<Expr>>,
    },
    Missing(Vec<Expr>),
    MissingSome {
        need: Box<Expr>,
        paths: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Truthy(Box<Expr>),
    If(Vec<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `low < value < high` (or `<=` throughout).
    Between {
        op: CompareOp,
        low: Box<Expr>,
        value: Box<Expr>,
        high: Box<Expr>,
    },
    Arith {
        op: ArithOp,
        operands: Vec<Expr>,
    },
    Modulo {
        dividend: Box<Expr>,
        divisor: Box<Expr>,
    },
    In {
        needle: Box<Expr>,
        haystack: Box<Expr>,
    },
    Cat(Vec<Expr>),
    Substr {
        text: Box<Expr>,
        start: Box<Expr>,
        length: Option<Box<Expr>>,
    },
    Merge(Vec<Expr>),
    Iterate {
        op: IterOp,
        collection: Box<Expr>,
        binding: Option<String>,
        body: Box<Expr>,
    },
    Reduce {
        collection: Box<Expr>,
        body: Box<Expr>,
        initial: Box<Expr>,
    },
    Contains {
        negated: bool,
        collection: Box<Expr>,
        element: Box<Expr>,
    },
    ContainsAnyOf {
        collection: Box<Expr>,
        candidates: Box<Expr>,
    },
    Temporal {
        op: TemporalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Context of a related node, looked up as `@(id)`. No id reads Null.
    Node(Option<Box<Expr>>),
    MatchesTemplate {
        document: Box<Expr>,
        template: Box<Expr>,
    },
}

/// Operand cursor for a list whose length has already been arity-checked.
struct Operands {
    op: Operator,
    items: std::vec::IntoIter<Expr>,
}

impl Operands {
    fn next(&mut self) -> Result<Expr, MalformedExpression> {
        self.items.next().ok_or_else(|| MalformedExpression::InvalidOperand {
            op: self.op.key().to_string(),
            message: "missing operand".to_string(),
        })
    }

    fn boxed(&mut self) -> Result<Box<Expr>, MalformedExpression> {
        self.next().map(Box::new)
    }

    fn optional(&mut self) -> Option<Box<Expr>> {
        self.items.next().map(Box::new)
    }

    fn rest(self) -> Vec<Expr> {
        self.items.collect()
    }
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn var(path: &str) -> Expr {
        Expr::Var {
            path: Path::parse(path),
            default: None,
        }
    }

    /// Build an operator node from its JSON key and operands.
    pub fn operator(key: &str, operands: Vec<Expr>) -> Result<Expr, MalformedExpression> {
        let op = Operator::from_key(key).ok_or_else(|| MalformedExpression::UnsupportedOperator {
            op: key.to_string(),
        })?;
        Expr::build(op, operands)
    }

    pub fn modulo(dividend: Expr, divisor: Expr) -> Expr {
        Expr::Modulo {
            dividend: Box::new(dividend),
            divisor: Box::new(divisor),
        }
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Expr {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Build an operator node, checking arity and operand shape.
    pub fn build(op: Operator, operands: Vec<Expr>) -> Result<Expr, MalformedExpression> {
        let expected = op.arity();
        if !expected.accepts(operands.len()) {
            return Err(MalformedExpression::Arity {
                op: op.key().to_string(),
                expected,
                got: operands.len(),
            });
        }
        let count = operands.len();
        let mut args = Operands {
            op,
            items: operands.into_iter(),
        };

        let expr = match op {
            Operator::Var => {
                let path = path_literal(op, args.next()?)?;
                Expr::Var {
                    path,
                    default: args.optional(),
                }
            }
            Operator::VarMap => Expr::VarMap {
                path: args.boxed()?,
                data: args.optional(),
            },
            Operator::Missing => Expr::Missing(args.rest()),
            Operator::MissingSome => Expr::MissingSome {
                need: args.boxed()?,
                paths: args.boxed()?,
            },
            Operator::And => Expr::And(args.rest()),
            Operator::Or => Expr::Or(args.rest()),
            Operator::Not => Expr::Not(args.boxed()?),
            Operator::Truthy => Expr::Truthy(args.boxed()?),
            Operator::If => Expr::If(args.rest()),
            Operator::Eq | Operator::Ne | Operator::Gt | Operator::Gte => Expr::Compare {
                op: compare_op(op),
                left: args.boxed()?,
                right: args.boxed()?,
            },
            Operator::Lt | Operator::Lte if count == 3 => Expr::Between {
                op: compare_op(op),
                low: args.boxed()?,
                value: args.boxed()?,
                high: args.boxed()?,
            },
            Operator::Lt | Operator::Lte => Expr::Compare {
                op: compare_op(op),
                left: args.boxed()?,
                right: args.boxed()?,
            },
            Operator::Add => arith(ArithOp::Add, args),
            Operator::Sub => arith(ArithOp::Sub, args),
            Operator::Mul => arith(ArithOp::Mul, args),
            Operator::Div => arith(ArithOp::Div, args),
            Operator::Min => arith(ArithOp::Min, args),
            Operator::Max => arith(ArithOp::Max, args),
            Operator::Mod => Expr::Modulo {
                dividend: args.boxed()?,
                divisor: args.boxed()?,
            },
            Operator::In => Expr::In {
                needle: args.boxed()?,
                haystack: args.boxed()?,
            },
            Operator::Cat => Expr::Cat(args.rest()),
            Operator::Substr => Expr::Substr {
                text: args.boxed()?,
                start: args.boxed()?,
                length: args.optional(),
            },
            Operator::Merge => Expr::Merge(args.rest()),
            Operator::Map => iterate(IterOp::Map, count, args)?,
            Operator::Filter => iterate(IterOp::Filter, count, args)?,
            Operator::All => iterate(IterOp::All, count, args)?,
            Operator::Some => iterate(IterOp::Some, count, args)?,
            Operator::None => iterate(IterOp::None, count, args)?,
            Operator::Reduce => Expr::Reduce {
                collection: args.boxed()?,
                body: args.boxed()?,
                initial: args.boxed()?,
            },
            Operator::Contains | Operator::DoesNotContain => Expr::Contains {
                negated: op == Operator::DoesNotContain,
                collection: args.boxed()?,
                element: args.boxed()?,
            },
            Operator::ContainsAnyOf => Expr::ContainsAnyOf {
                collection: args.boxed()?,
                candidates: args.boxed()?,
            },
            Operator::Before | Operator::After => Expr::Temporal {
                op: if op == Operator::Before {
                    TemporalOp::Before
                } else {
                    TemporalOp::After
                },
                left: args.boxed()?,
                right: args.boxed()?,
            },
            Operator::Node => Expr::Node(args.optional()),
            Operator::MatchesTemplate => Expr::MatchesTemplate {
                document: args.boxed()?,
                template: args.boxed()?,
            },
            Operator::Constant => {
                let operand = args.next()?;
                Expr::Literal(operand.into_literal().ok_or_else(|| {
                    MalformedExpression::InvalidOperand {
                        op: op.key().to_string(),
                        message: "operand must be a literal".to_string(),
                    }
                })?)
            }
            Operator::Timestamp => match args.next()? {
                Expr::Literal(Value::Text(text)) => Expr::Literal(Value::Timestamp(parse_timestamp(&text)?)),
                ts @ Expr::Literal(Value::Timestamp(_)) => ts,
                _ => {
                    return Err(MalformedExpression::InvalidOperand {
                        op: op.key().to_string(),
                        message: "operand must be an RFC 3339 text literal".to_string(),
                    })
                }
            },
        };
        Ok(expr)
    }

    /// The literal value of a literal-only subtree, if it is one.
    pub fn into_literal(self) -> Option<Value> {
        match self {
            Expr::Literal(v) => Some(v),
            Expr::Array(items) => items
                .into_iter()
                .map(Expr::into_literal)
                .collect::<Option<Vec<_>>>()
                .map(Value::Sequence),
            _ => None,
        }
    }

    /// The operator this node encodes as, or `None` for literals and arrays.
    pub fn operator_kind(&self) -> Option<Operator> {
        Some(match self {
            Expr::Literal(Value::Timestamp(_)) => Operator::Timestamp,
            Expr::Literal(_) | Expr::Array(_) => return None,
            Expr::Var { .. } => Operator::Var,
            Expr::VarMap { .. } => Operator::VarMap,
            Expr::Missing(_) => Operator::Missing,
            Expr::MissingSome { .. } => Operator::MissingSome,
            Expr::And(_) => Operator::And,
            Expr::Or(_) => Operator::Or,
            Expr::Not(_) => Operator::Not,
            Expr::Truthy(_) => Operator::Truthy,
            Expr::If(_) => Operator::If,
            Expr::Compare { op, .. } | Expr::Between { op, .. } => match op {
                CompareOp::Eq => Operator::Eq,
                CompareOp::Ne => Operator::Ne,
                CompareOp::Lt => Operator::Lt,
                CompareOp::Lte => Operator::Lte,
                CompareOp::Gt => Operator::Gt,
                CompareOp::Gte => Operator::Gte,
            },
            Expr::Arith { op, .. } => match op {
                ArithOp::Add => Operator::Add,
                ArithOp::Sub => Operator::Sub,
                ArithOp::Mul => Operator::Mul,
                ArithOp::Div => Operator::Div,
                ArithOp::Min => Operator::Min,
                ArithOp::Max => Operator::Max,
            },
            Expr::Modulo { .. } => Operator::Mod,
            Expr::In { .. } => Operator::In,
            Expr::Cat(_) => Operator::Cat,
            Expr::Substr { .. } => Operator::Substr,
            Expr::Merge(_) => Operator::Merge,
            Expr::Iterate { op, .. } => op.operator(),
            Expr::Reduce { .. } => Operator::Reduce,
            Expr::Contains { negated: false, .. } => Operator::Contains,
            Expr::Contains { negated: true, .. } => Operator::DoesNotContain,
            Expr::ContainsAnyOf { .. } => Operator::ContainsAnyOf,
            Expr::Temporal {
                op: TemporalOp::Before,
                ..
            } => Operator::Before,
            Expr::Temporal {
                op: TemporalOp::After,
                ..
            } => Operator::After,
            Expr::Node(_) => Operator::Node,
            Expr::MatchesTemplate { .. } => Operator::MatchesTemplate,
        })
    }

    /// Nesting depth: a literal is 1, every operator or array adds 1.
    pub fn depth(&self) -> usize {
        let children = self.children();
        1 + children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    /// Direct sub-expressions in operand order.
    pub fn children(&self) -> Vec<&Expr> {
        fn boxes<'a>(items: &[&'a Box<Expr>]) -> Vec<&'a Expr> {
            items.iter().map(|&b| b.as_ref()).collect()
        }
        match self {
            Expr::Literal(_) => Vec::new(),
            Expr::Array(items)
            | Expr::Missing(items)
            | Expr::And(items)
            | Expr::Or(items)
            | Expr::If(items)
            | Expr::Cat(items)
            | Expr::Merge(items) => items.iter().collect(),
            Expr::Arith { operands, .. } => operands.iter().collect(),
            Expr::Var { default, .. } => default.iter().map(|b| b.as_ref()).collect(),
            Expr::Node(id) => id.iter().map(|b| b.as_ref()).collect(),
            Expr::VarMap { path, data } => {
                let mut v = vec![path.as_ref()];
                v.extend(data.iter().map(|b| b.as_ref()));
                v
            }
            Expr::MissingSome { need, paths } => boxes(&[need, paths]),
            Expr::Not(e) | Expr::Truthy(e) => vec![e.as_ref()],
            Expr::Compare { left, right, .. } | Expr::Temporal { left, right, .. } => {
                boxes(&[left, right])
            }
            Expr::Between {
                low, value, high, ..
            } => boxes(&[low, value, high]),
            Expr::Modulo { dividend, divisor } => boxes(&[dividend, divisor]),
            Expr::In { needle, haystack } => boxes(&[needle, haystack]),
            Expr::Substr {
                text,
                start,
                length,
            } => {
                let mut v = boxes(&[text, start]);
                v.extend(length.iter().map(|b| b.as_ref()));
                v
            }
            Expr::Iterate {
                collection, body, ..
            } => boxes(&[collection, body]),
            Expr::Reduce {
                collection,
                body,
                initial,
            } => boxes(&[collection, body, initial]),
            Expr::Contains {
                collection,
                element,
                ..
            } => boxes(&[collection, element]),
            Expr::ContainsAnyOf {
                collection,
                candidates,
            } => boxes(&[collection, candidates]),
            Expr::MatchesTemplate { document, template } => boxes(&[document, template]),
        }
    }
}

fn compare_op(op: Operator) -> CompareOp {
    match op {
        Operator::Ne => CompareOp::Ne,
        Operator::Lt => CompareOp::Lt,
        Operator::Lte => CompareOp::Lte,
        Operator::Gt => CompareOp::Gt,
        Operator::Gte => CompareOp::Gte,
        _ => CompareOp::Eq,
    }
}

fn arith(op: ArithOp, args: Operands) -> Expr {
    Expr::Arith {
        op,
        operands: args.rest(),
    }
}

fn iterate(op: IterOp, count: usize, mut args: Operands) -> Result<Expr, MalformedExpression> {
    let collection = args.boxed()?;
    let binding = if count == 3 {
        match args.next()? {
            Expr::Literal(Value::Text(name)) if !name.is_empty() => Some(name),
            _ => {
                return Err(MalformedExpression::InvalidOperand {
                    op: op.operator().key().to_string(),
                    message: "binding name must be a non-empty string literal".to_string(),
                })
            }
        }
    } else {
        None
    };
    Ok(Expr::Iterate {
        op,
        collection,
        binding,
        body: args.boxed()?,
    })
}

fn path_literal(op: Operator, operand: Expr) -> Result<Path, MalformedExpression> {
    match operand {
        Expr::Literal(Value::Text(s)) => Ok(Path::parse(&s)),
        Expr::Literal(Value::Number(n)) => Ok(Path::parse(&n.to_string())),
        _ => Err(MalformedExpression::InvalidOperand {
            op: op.key().to_string(),
            message: "path must be a string or number literal".to_string(),
        }),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(v: impl Into<Value>) -> Expr {
        Expr::literal(v)
    }

    #[test]
    fn every_operator_key_round_trips() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_key(op.key()), Some(op));
        }
        assert_eq!(Operator::from_key("==="), Some(Operator::Eq));
        assert_eq!(Operator::from_key("!=="), Some(Operator::Ne));
        assert_eq!(Operator::from_key("?:"), Some(Operator::If));
        assert_eq!(Operator::from_key("xor"), None);
    }

    #[test]
    fn unsupported_operator() {
        let err = Expr::operator("xor", vec![]).unwrap_err();
        assert_eq!(
            err,
            MalformedExpression::UnsupportedOperator {
                op: "xor".to_string()
            }
        );
    }

    #[test]
    fn modulo_rejects_three_operands() {
        let err = Expr::operator("%", vec![lit(1), lit(2), lit(3)]).unwrap_err();
        assert_eq!(
            err,
            MalformedExpression::Arity {
                op: "%".to_string(),
                expected: Arity::Exactly(2),
                got: 3
            }
        );
    }

    #[test]
    fn modulo_constructor_matches_helper() {
        let built = Expr::operator("%", vec![lit(7), lit(3)]).unwrap();
        assert_eq!(built, Expr::modulo(lit(7), lit(3)));
    }

    #[test]
    fn equality_rejects_single_operand() {
        assert!(matches!(
            Expr::operator("==", vec![lit(1)]),
            Err(MalformedExpression::Arity { .. })
        ));
    }

    #[test]
    fn division_needs_two() {
        assert!(Expr::operator("/", vec![lit(1)]).is_err());
        assert!(Expr::operator("/", vec![lit(1), lit(2), lit(3)]).is_ok());
    }

    #[test]
    fn three_operand_lt_is_between() {
        let e = Expr::operator("<", vec![lit(1), Expr::var("x"), lit(10)]).unwrap();
        assert!(matches!(e, Expr::Between { op: CompareOp::Lt, .. }));
        assert!(Expr::operator(">", vec![lit(1), lit(2), lit(3)]).is_err());
    }

    #[test]
    fn var_path_must_be_literal() {
        let e = Expr::operator("var", vec![lit("a.b")]).unwrap();
        assert_eq!(e, Expr::var("a.b"));
        let numeric = Expr::operator("var", vec![lit(1)]).unwrap();
        assert_eq!(numeric, Expr::var("1"));
        let err = Expr::operator("var", vec![Expr::var("x")]).unwrap_err();
        assert!(matches!(err, MalformedExpression::InvalidOperand { .. }));
    }

    #[test]
    fn iteration_binding_must_be_text() {
        let ok = Expr::operator("some", vec![Expr::var("xs"), lit("x"), lit(true)]).unwrap();
        assert!(matches!(ok, Expr::Iterate { binding: Some(ref b), .. } if b == "x"));
        let err = Expr::operator("some", vec![Expr::var("xs"), lit(1), lit(true)]).unwrap_err();
        assert!(matches!(err, MalformedExpression::InvalidOperand { .. }));
    }

    #[test]
    fn timestamp_literal_folds() {
        let e = Expr::operator("timestamp", vec![lit("2024-01-01T00:00:00Z")]).unwrap();
        assert!(matches!(e, Expr::Literal(Value::Timestamp(_))));
        let err = Expr::operator("timestamp", vec![lit("soon")]).unwrap_err();
        assert!(matches!(err, MalformedExpression::InvalidLiteral(_)));
    }

    #[test]
    fn constant_accepts_literal_arrays() {
        let e = Expr::operator("constant", vec![Expr::Array(vec![lit(1), lit("a")])]).unwrap();
        assert_eq!(
            e,
            Expr::Literal(Value::Sequence(vec![Value::from(1), Value::from("a")]))
        );
        assert!(Expr::operator("constant", vec![Expr::var("x")]).is_err());
    }

    #[test]
    fn depth_counts_nesting() {
        assert_eq!(lit(1).depth(), 1);
        let e = Expr::operator(
            "and",
            vec![Expr::operator("!", vec![Expr::var("a")]).unwrap(), lit(true)],
        )
        .unwrap();
        // and -> ! -> var -> (no operands beyond the path)
        assert_eq!(e.depth(), 3);
    }

    #[test]
    fn operator_kind_matches_build() {
        for (key, operands) in [
            ("and", vec![lit(true)]),
            ("does_not_contain", vec![Expr::var("xs"), lit(1)]),
            ("after", vec![lit("a"), lit("b")]),
            ("min", vec![lit(1)]),
            ("node", vec![lit("n1")]),
            ("matches_template", vec![Expr::var("doc"), Expr::var("tpl")]),
        ] {
            let e = Expr::operator(key, operands).unwrap();
            assert_eq!(e.operator_kind().map(|op| op.key()), Some(key));
        }
    }

    #[test]
    fn node_takes_at_most_one_id() {
        assert_eq!(Expr::operator("node", vec![]).unwrap(), Expr::Node(None));
        let e = Expr::operator("node", vec![Expr::var("ref")]).unwrap();
        assert_eq!(e.children(), vec![&Expr::var("ref")]);
        assert!(Expr::operator("node", vec![lit("a"), lit("b")]).is_err());
    }

    #[test]
    fn matches_template_needs_document_and_template() {
        assert!(Expr::operator("matches_template", vec![Expr::var("doc")]).is_err());
        let e = Expr::operator("matches_template", vec![Expr::var("doc"), lit("t")]).unwrap();
        assert_eq!(e.depth(), 2);
    }

    #[test]
    fn expressions_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Expr>();
    }
}
