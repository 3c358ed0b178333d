//! The expression AST.
//!
//! Nodes are built structurally by front-ends; the checker later assigns
//! types and resolves identifiers. Apart from those two annotations an
//! expression never changes after construction.

use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::position::Position;
use crate::symbol::SymbolId;
use crate::types::Type;

/// A statically computed constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl Value {
    /// Integral view: booleans count as 0/1, doubles do not coerce.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            Value::Double(_) => None,
        }
    }

    pub fn as_double(&self) -> f64 {
        match self {
            Value::Int(n) => *n as f64,
            Value::Double(d) => *d,
            Value::Bool(b) => *b as i64 as f64,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(n) => Some(*n != 0),
            Value::Double(_) => None,
        }
    }

    fn is_double(&self) -> bool {
        matches!(self, Value::Double(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    /// Clock derivative `x'`, only meaningful inside invariants.
    Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    And,
    Or,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    Min,
    Max,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Ge | BinaryOp::Gt
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
                | BinaryOp::Min
                | BinaryOp::Max
        )
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::ShiftLeft
                | BinaryOp::ShiftRight
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::Min => "<?",
            BinaryOp::Max => ">?",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::ShiftLeft => "<<=",
            AssignOp::ShiftRight => ">>=",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    Send,
    Recv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quant {
    Forall,
    Exists,
    Sum,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Constant(Value),
    /// `symbol` is filled in by the checker (or by a resolving front-end).
    Identifier {
        name: String,
        symbol: Option<SymbolId>,
    },
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// `sub = [cond, then, else]`.
    InlineIf,
    /// `sub = [lhs, rhs]`.
    Assign(AssignOp),
    /// `sub[0]` is the callee, the rest are arguments.
    Call,
    /// `sub = [record]`; `index` is the field index, filled by the checker.
    Dot {
        member: String,
        index: Option<usize>,
    },
    /// `sub = [array, index]`.
    Subscript,
    /// `sub = [lhs, rhs]`, value and type of the rhs.
    Comma,
    /// `sub = [channel]`.
    Sync(SyncKind),
    Deadlock,
    /// `sub = [body]`; the binder symbol lives in a frame of its own.
    Quantifier {
        quant: Quant,
        binder: SymbolId,
    },
    /// `sub` are the elements.
    List,
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExprKind,
    pub sub: Vec<Expression>,
    /// Assigned by the checker; `Type::unknown()` until then.
    pub ty: Type,
    pub pos: Position,
}

impl Expression {
    fn node(kind: ExprKind, sub: Vec<Expression>, pos: Position) -> Self {
        Expression {
            kind,
            sub,
            ty: Type::unknown(),
            pos,
        }
    }

    pub fn constant(value: Value, pos: Position) -> Self {
        Expression::node(ExprKind::Constant(value), Vec::new(), pos)
    }

    pub fn int(n: i64, pos: Position) -> Self {
        Expression::constant(Value::Int(n), pos)
    }

    pub fn double(d: f64, pos: Position) -> Self {
        Expression::constant(Value::Double(d), pos)
    }

    pub fn bool_(b: bool, pos: Position) -> Self {
        Expression::constant(Value::Bool(b), pos)
    }

    pub fn ident(name: impl Into<String>, pos: Position) -> Self {
        Expression::node(
            ExprKind::Identifier {
                name: name.into(),
                symbol: None,
            },
            Vec::new(),
            pos,
        )
    }

    /// An identifier already resolved by the front-end.
    pub fn resolved_ident(name: impl Into<String>, symbol: SymbolId, pos: Position) -> Self {
        Expression::node(
            ExprKind::Identifier {
                name: name.into(),
                symbol: Some(symbol),
            },
            Vec::new(),
            pos,
        )
    }

    pub fn unary(op: UnaryOp, operand: Expression, pos: Position) -> Self {
        Expression::node(ExprKind::Unary(op), vec![operand], pos)
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression, pos: Position) -> Self {
        Expression::node(ExprKind::Binary(op), vec![lhs, rhs], pos)
    }

    pub fn inline_if(
        cond: Expression,
        then: Expression,
        otherwise: Expression,
        pos: Position,
    ) -> Self {
        Expression::node(ExprKind::InlineIf, vec![cond, then, otherwise], pos)
    }

    pub fn assign(op: AssignOp, lhs: Expression, rhs: Expression, pos: Position) -> Self {
        Expression::node(ExprKind::Assign(op), vec![lhs, rhs], pos)
    }

    pub fn call(callee: Expression, args: Vec<Expression>, pos: Position) -> Self {
        let mut sub = vec![callee];
        sub.extend(args);
        Expression::node(ExprKind::Call, sub, pos)
    }

    pub fn dot(record: Expression, member: impl Into<String>, pos: Position) -> Self {
        Expression::node(
            ExprKind::Dot {
                member: member.into(),
                index: None,
            },
            vec![record],
            pos,
        )
    }

    pub fn subscript(array: Expression, index: Expression, pos: Position) -> Self {
        Expression::node(ExprKind::Subscript, vec![array, index], pos)
    }

    pub fn comma(lhs: Expression, rhs: Expression, pos: Position) -> Self {
        Expression::node(ExprKind::Comma, vec![lhs, rhs], pos)
    }

    pub fn sync(kind: SyncKind, channel: Expression, pos: Position) -> Self {
        Expression::node(ExprKind::Sync(kind), vec![channel], pos)
    }

    pub fn deadlock(pos: Position) -> Self {
        Expression::node(ExprKind::Deadlock, Vec::new(), pos)
    }

    pub fn quantifier(quant: Quant, binder: SymbolId, body: Expression, pos: Position) -> Self {
        Expression::node(ExprKind::Quantifier { quant, binder }, vec![body], pos)
    }

    pub fn list(elements: Vec<Expression>, pos: Position) -> Self {
        Expression::node(ExprKind::List, elements, pos)
    }

    // -----------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------

    /// The resolved symbol of an identifier node.
    pub fn symbol(&self) -> Option<SymbolId> {
        match &self.kind {
            ExprKind::Identifier { symbol, .. } => *symbol,
            _ => None,
        }
    }

    /// Whether the expression is a plain reference to a symbol.
    pub fn ref_to_symbol(&self) -> Option<SymbolId> {
        self.symbol()
    }

    /// Structural l-value test; constness is checked separately.
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            ExprKind::Identifier { .. } => true,
            ExprKind::Dot { .. } | ExprKind::Subscript => self.sub[0].is_lvalue(),
            _ => false,
        }
    }

    pub fn contains_assignment(&self) -> bool {
        matches!(self.kind, ExprKind::Assign(_))
            || self.sub.iter().any(Expression::contains_assignment)
    }

    pub fn contains_call(&self) -> bool {
        matches!(self.kind, ExprKind::Call) || self.sub.iter().any(Expression::contains_call)
    }

    pub fn contains_rate(&self) -> bool {
        matches!(self.kind, ExprKind::Unary(UnaryOp::Rate))
            || self.sub.iter().any(Expression::contains_rate)
    }

    /// All resolved symbols appearing in the expression.
    pub fn collect_symbols(&self, out: &mut IndexSet<SymbolId>) {
        if let Some(s) = self.symbol() {
            out.insert(s);
        }
        for e in &self.sub {
            e.collect_symbols(out);
        }
    }

    /// Resolved symbols that are free, i.e. not bound by an enclosing
    /// quantifier within this expression.
    pub fn collect_free_symbols(&self, out: &mut IndexSet<SymbolId>) {
        fn walk(e: &Expression, bound: &mut Vec<SymbolId>, out: &mut IndexSet<SymbolId>) {
            match &e.kind {
                ExprKind::Identifier {
                    symbol: Some(s), ..
                } if !bound.contains(s) => {
                    out.insert(*s);
                }
                ExprKind::Quantifier { binder, .. } => {
                    bound.push(*binder);
                    for sub in &e.sub {
                        walk(sub, bound, out);
                    }
                    bound.pop();
                    return;
                }
                _ => {}
            }
            for sub in &e.sub {
                walk(sub, bound, out);
            }
        }
        walk(self, &mut Vec::new(), out);
    }

    /// Replace references to mapped symbols by their expressions.
    pub fn substitute(&self, map: &IndexMap<SymbolId, Expression>) -> Expression {
        if let Some(s) = self.symbol() {
            if let Some(replacement) = map.get(&s) {
                return replacement.clone();
            }
        }
        Expression {
            kind: self.kind.clone(),
            sub: self.sub.iter().map(|e| e.substitute(map)).collect(),
            ty: self.ty.clone(),
            pos: self.pos,
        }
    }

    // -----------------------------------------------------------------
    // Constant folding
    // -----------------------------------------------------------------

    /// Reduce sub-trees whose operands are all literals. The folded node
    /// keeps the position (and any assigned type) of the original root.
    pub fn fold(&self) -> Expression {
        let sub: Vec<Expression> = self.sub.iter().map(Expression::fold).collect();
        if let Some(v) = eval_node(&self.kind, &sub) {
            return Expression {
                kind: ExprKind::Constant(v),
                sub: Vec::new(),
                ty: self.ty.clone(),
                pos: self.pos,
            };
        }
        Expression {
            kind: self.kind.clone(),
            sub,
            ty: self.ty.clone(),
            pos: self.pos,
        }
    }

    /// The value of a literal (or literal-foldable) expression.
    pub fn eval_literal(&self) -> Option<Value> {
        match self.fold().kind {
            ExprKind::Constant(v) => Some(v),
            _ => None,
        }
    }

    /// Evaluate with a caller-supplied meaning for resolved identifiers.
    /// The checker uses this to chase `const` variables' initializers.
    pub fn eval_with(
        &self,
        lookup: &mut dyn FnMut(SymbolId) -> Option<Value>,
    ) -> Option<Value> {
        match &self.kind {
            ExprKind::Constant(v) => Some(*v),
            ExprKind::Identifier {
                symbol: Some(s), ..
            } => lookup(*s),
            ExprKind::Unary(op) => {
                let v = self.sub[0].eval_with(lookup)?;
                match op {
                    UnaryOp::Neg => match v {
                        Value::Int(n) => Some(Value::Int(n.checked_neg()?)),
                        Value::Double(d) => Some(Value::Double(-d)),
                        Value::Bool(_) => None,
                    },
                    UnaryOp::Not => v.as_bool().map(|b| Value::Bool(!b)),
                    UnaryOp::Rate => None,
                }
            }
            ExprKind::Binary(op) => {
                let l = self.sub[0].eval_with(lookup)?;
                let r = self.sub[1].eval_with(lookup)?;
                eval_binary(*op, l, r)
            }
            ExprKind::InlineIf => {
                let c = self.sub[0].eval_with(lookup)?.as_bool()?;
                self.sub[if c { 1 } else { 2 }].eval_with(lookup)
            }
            _ => None,
        }
    }
}

fn literal(e: &Expression) -> Option<Value> {
    match &e.kind {
        ExprKind::Constant(v) => Some(*v),
        _ => None,
    }
}

fn eval_node(kind: &ExprKind, sub: &[Expression]) -> Option<Value> {
    match kind {
        ExprKind::Constant(v) => Some(*v),
        ExprKind::Unary(op) => {
            let v = literal(&sub[0])?;
            match op {
                UnaryOp::Neg => match v {
                    Value::Int(n) => Some(Value::Int(n.checked_neg()?)),
                    Value::Double(d) => Some(Value::Double(-d)),
                    Value::Bool(_) => None,
                },
                UnaryOp::Not => v.as_bool().map(|b| Value::Bool(!b)),
                UnaryOp::Rate => None,
            }
        }
        ExprKind::Binary(op) => {
            let l = literal(&sub[0])?;
            let r = literal(&sub[1])?;
            eval_binary(*op, l, r)
        }
        ExprKind::InlineIf => {
            let c = literal(&sub[0])?.as_bool()?;
            literal(if c { &sub[1] } else { &sub[2] })
        }
        _ => None,
    }
}

fn eval_binary(op: BinaryOp, l: Value, r: Value) -> Option<Value> {
    use BinaryOp::*;
    if op.is_logical() {
        let (a, b) = (l.as_bool()?, r.as_bool()?);
        return Some(Value::Bool(match op {
            And => a && b,
            Or => a || b,
            _ => unreachable!(),
        }));
    }
    if op.is_comparison() {
        let result = if l.is_double() || r.is_double() {
            let (a, b) = (l.as_double(), r.as_double());
            match op {
                Lt => a < b,
                Le => a <= b,
                Eq => a == b,
                Ne => a != b,
                Ge => a >= b,
                Gt => a > b,
                _ => unreachable!(),
            }
        } else {
            let (a, b) = (l.as_int()?, r.as_int()?);
            match op {
                Lt => a < b,
                Le => a <= b,
                Eq => a == b,
                Ne => a != b,
                Ge => a >= b,
                Gt => a > b,
                _ => unreachable!(),
            }
        };
        return Some(Value::Bool(result));
    }
    if op.is_bitwise() {
        let (a, b) = (l.as_int()?, r.as_int()?);
        return Some(Value::Int(match op {
            BitAnd => a & b,
            BitOr => a | b,
            BitXor => a ^ b,
            ShiftLeft => a.checked_shl(u32::try_from(b).ok()?)?,
            ShiftRight => a.checked_shr(u32::try_from(b).ok()?)?,
            _ => unreachable!(),
        }));
    }
    if l.is_double() || r.is_double() {
        let (a, b) = (l.as_double(), r.as_double());
        return Some(Value::Double(match op {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Div => {
                if b == 0.0 {
                    return None;
                }
                a / b
            }
            Min => a.min(b),
            Max => a.max(b),
            Mod => return None,
            _ => unreachable!(),
        }));
    }
    let (a, b) = (l.as_int()?, r.as_int()?);
    Some(Value::Int(match op {
        Add => a.checked_add(b)?,
        Sub => a.checked_sub(b)?,
        Mul => a.checked_mul(b)?,
        Div => a.checked_div(b)?,
        Mod => a.checked_rem(b)?,
        Min => a.min(b),
        Max => a.max(b),
        _ => unreachable!(),
    }))
}

/// Structural equality: kinds and sub-expressions, ignoring positions,
/// computed types, resolved symbol ids, and resolved member indices.
impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        kind_eq(&self.kind, &other.kind)
            && self.sub.len() == other.sub.len()
            && self.sub.iter().zip(&other.sub).all(|(a, b)| a == b)
    }
}

fn kind_eq(a: &ExprKind, b: &ExprKind) -> bool {
    use ExprKind::*;
    match (a, b) {
        (Constant(x), Constant(y)) => x == y,
        (Identifier { name: x, .. }, Identifier { name: y, .. }) => x == y,
        (Unary(x), Unary(y)) => x == y,
        (Binary(x), Binary(y)) => x == y,
        (InlineIf, InlineIf) | (Call, Call) | (Subscript, Subscript) | (Comma, Comma)
        | (Deadlock, Deadlock) | (List, List) => true,
        (Assign(x), Assign(y)) => x == y,
        (Dot { member: x, .. }, Dot { member: y, .. }) => x == y,
        (Sync(x), Sync(y)) => x == y,
        (Quantifier { quant: x, .. }, Quantifier { quant: y, .. }) => x == y,
        _ => false,
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Constant(v) => write!(f, "{v}"),
            ExprKind::Identifier { name, .. } => write!(f, "{name}"),
            ExprKind::Unary(UnaryOp::Neg) => write!(f, "-{}", self.sub[0]),
            ExprKind::Unary(UnaryOp::Not) => write!(f, "!{}", self.sub[0]),
            ExprKind::Unary(UnaryOp::Rate) => write!(f, "{}'", self.sub[0]),
            ExprKind::Binary(op) => write!(f, "({} {op} {})", self.sub[0], self.sub[1]),
            ExprKind::InlineIf => {
                write!(f, "({} ? {} : {})", self.sub[0], self.sub[1], self.sub[2])
            }
            ExprKind::Assign(op) => write!(f, "{} {op} {}", self.sub[0], self.sub[1]),
            ExprKind::Call => {
                write!(f, "{}(", self.sub[0])?;
                for (i, a) in self.sub[1..].iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            ExprKind::Dot { member, .. } => write!(f, "{}.{member}", self.sub[0]),
            ExprKind::Subscript => write!(f, "{}[{}]", self.sub[0], self.sub[1]),
            ExprKind::Comma => write!(f, "{}, {}", self.sub[0], self.sub[1]),
            ExprKind::Sync(SyncKind::Send) => write!(f, "{}!", self.sub[0]),
            ExprKind::Sync(SyncKind::Recv) => write!(f, "{}?", self.sub[0]),
            ExprKind::Deadlock => write!(f, "deadlock"),
            ExprKind::Quantifier { quant, binder } => {
                let word = match quant {
                    Quant::Forall => "forall",
                    Quant::Exists => "exists",
                    Quant::Sum => "sum",
                };
                write!(f, "{word} (#{binder}) {}", self.sub[0])
            }
            ExprKind::List => {
                write!(f, "{{ ")?;
                for (i, e) in self.sub.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, " }}")
            }
        }
    }
}
