//! Proptest strategies for generating well-formed IR fragments.

use proptest::prelude::*;

use crate::expression::{BinaryOp, Expression, UnaryOp, Value};
use crate::position::Position;
use crate::types::{Qualifier, Type};

pub fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1000i64..1000).prop_map(Value::Int),
        any::<bool>().prop_map(Value::Bool),
        (-100.0f64..100.0).prop_map(Value::Double),
    ]
}

fn arb_binary_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![
        Just(BinaryOp::Add),
        Just(BinaryOp::Sub),
        Just(BinaryOp::Mul),
        Just(BinaryOp::Div),
        Just(BinaryOp::Lt),
        Just(BinaryOp::Le),
        Just(BinaryOp::Eq),
        Just(BinaryOp::Ge),
        Just(BinaryOp::Gt),
        Just(BinaryOp::Min),
        Just(BinaryOp::Max),
    ]
}

/// Expression trees over literals and a small identifier pool. Shapes are
/// well-formed; values may still fail to fold (division by zero and the
/// like), which is exactly what the folder tests want to see.
pub fn arb_expression() -> impl Strategy<Value = Expression> {
    let leaf = prop_oneof![
        arb_value().prop_map(|v| Expression::constant(v, Position::UNKNOWN)),
        "[a-d]".prop_map(|name| Expression::ident(name, Position::UNKNOWN)),
    ];
    leaf.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (arb_binary_op(), inner.clone(), inner.clone()).prop_map(|(op, l, r)| {
                Expression::binary(op, l, r, Position::UNKNOWN)
            }),
            inner
                .clone()
                .prop_map(|e| Expression::unary(UnaryOp::Neg, e, Position::UNKNOWN)),
            (inner.clone(), inner.clone(), inner).prop_map(|(c, t, e)| {
                Expression::inline_if(c, t, e, Position::UNKNOWN)
            }),
        ]
    })
}

/// Declared data types: the scalar kinds plus ranges, arrays, and records
/// over them, optionally `const`.
pub fn arb_type() -> impl Strategy<Value = Type> {
    let leaf = prop_oneof![
        Just(Type::int()),
        Just(Type::bool_()),
        Just(Type::double()),
        (0i64..8, 8i64..16).prop_map(|(lo, hi)| {
            Type::range(
                Type::int(),
                Expression::int(lo, Position::UNKNOWN),
                Expression::int(hi, Position::UNKNOWN),
            )
        }),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            (inner.clone(), 1i64..5).prop_map(|(elem, n)| {
                Type::array_of(elem, Expression::int(n, Position::UNKNOWN))
            }),
            proptest::collection::vec(inner.clone(), 1..3).prop_map(|tys| {
                Type::record_of(
                    tys.into_iter()
                        .enumerate()
                        .map(|(i, ty)| (format!("f{i}"), ty))
                        .collect(),
                )
            }),
            inner.prop_map(|t| t.prefixed(Qualifier::Const)),
        ]
    })
}
