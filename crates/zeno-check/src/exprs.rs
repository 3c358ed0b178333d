//! Identifier resolution and type assignment for expressions.

use zeno_ir::diagnostic::DiagnosticKind;
use zeno_ir::document::Document;
use zeno_ir::expression::{AssignOp, BinaryOp, ExprKind, Expression, Quant, UnaryOp};
use zeno_ir::symbol::FrameId;
use zeno_ir::types::{Type, TypeKind};

/// Where an expression occurs; clock comparisons and rates are only legal
/// in some of these places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ctx {
    General,
    Guard,
    Invariant,
    Probability,
}

impl Ctx {
    fn allows_clock_constraints(self) -> bool {
        matches!(self, Ctx::Guard | Ctx::Invariant)
    }
}

fn bool_like(ty: &Type) -> bool {
    ty.is_integral()
}

/// Resolve identifiers and assign a type to every node of `expr`, resolving
/// names in `frame`. Returns false when the sub-tree could not be typed; the
/// caller then skips its own dependent checks so one defect yields one
/// report.
pub(crate) fn check(doc: &mut Document, frame: FrameId, expr: &mut Expression, ctx: Ctx) -> bool {
    // Children first; a few kinds give their children a different context.
    let child_ctx = match &expr.kind {
        ExprKind::Assign(_) | ExprKind::Call => Ctx::General,
        _ => ctx,
    };
    let mut ok = true;
    for sub in &mut expr.sub {
        ok &= check(doc, frame, sub, child_ctx);
    }
    if !ok {
        expr.ty = Type::unknown();
        return false;
    }

    let ty = type_node(doc, frame, expr, ctx);
    match ty {
        Some(ty) => {
            expr.ty = ty;
            true
        }
        None => {
            expr.ty = Type::unknown();
            false
        }
    }
}

fn type_node(doc: &mut Document, frame: FrameId, expr: &mut Expression, ctx: Ctx) -> Option<Type> {
    let pos = expr.pos;
    match &mut expr.kind {
        ExprKind::Constant(v) => Some(match v {
            zeno_ir::expression::Value::Int(_) => Type::int(),
            zeno_ir::expression::Value::Double(_) => Type::double(),
            zeno_ir::expression::Value::Bool(_) => Type::bool_(),
        }),

        ExprKind::Identifier { name, symbol } => {
            if symbol.is_none() {
                match doc.symbols.resolve(frame, name) {
                    Some(s) => *symbol = Some(s),
                    None => {
                        let name = name.clone();
                        doc.add_error(pos, DiagnosticKind::UnknownIdentifier(name));
                        return None;
                    }
                }
            }
            Some(doc.symbols.type_of(symbol.unwrap()).clone())
        }

        ExprKind::Unary(op) => {
            let operand = &expr.sub[0];
            match op {
                UnaryOp::Neg => {
                    if operand.ty.is_arithmetic() {
                        Some(if operand.ty.is_double() {
                            Type::double()
                        } else {
                            Type::int()
                        })
                    } else {
                        doc.add_error(
                            pos,
                            DiagnosticKind::InvalidType(format!(
                                "cannot negate '{}'",
                                operand.ty
                            )),
                        );
                        None
                    }
                }
                UnaryOp::Not => {
                    if bool_like(&operand.ty) {
                        Some(Type::bool_())
                    } else {
                        doc.add_error(
                            pos,
                            DiagnosticKind::TypeMismatch {
                                expected: "bool".into(),
                                found: operand.ty.to_string(),
                            },
                        );
                        None
                    }
                }
                UnaryOp::Rate => {
                    if ctx != Ctx::Invariant {
                        doc.add_error(
                            pos,
                            DiagnosticKind::BadRate(
                                "clock rates are only allowed in invariants".into(),
                            ),
                        );
                        return None;
                    }
                    if !operand.ty.is_clock() {
                        doc.add_error(
                            pos,
                            DiagnosticKind::BadRate(format!(
                                "'{operand}' is not a clock"
                            )),
                        );
                        return None;
                    }
                    Some(Type::double())
                }
            }
        }

        ExprKind::Binary(op) => {
            let op = *op;
            let (l, r) = (&expr.sub[0], &expr.sub[1]);
            type_binary(doc, op, l, r, pos, ctx)
        }

        ExprKind::InlineIf => {
            let cond = &expr.sub[0];
            if !bool_like(&cond.ty) {
                doc.add_error(
                    pos,
                    DiagnosticKind::TypeMismatch {
                        expected: "bool".into(),
                        found: cond.ty.to_string(),
                    },
                );
                return None;
            }
            let (t, e) = (&expr.sub[1], &expr.sub[2]);
            if t.ty.is_arithmetic() && e.ty.is_arithmetic() {
                Some(if t.ty.is_double() || e.ty.is_double() {
                    Type::double()
                } else if t.ty.is(TypeKind::Bool) && e.ty.is(TypeKind::Bool) {
                    Type::bool_()
                } else {
                    Type::int()
                })
            } else if t.ty.compatible(&e.ty) {
                Some(t.ty.clone())
            } else {
                doc.add_error(
                    pos,
                    DiagnosticKind::TypeMismatch {
                        expected: t.ty.to_string(),
                        found: e.ty.to_string(),
                    },
                );
                None
            }
        }

        ExprKind::Assign(op) => {
            let op = *op;
            type_assignment(doc, op, &expr.sub[0], &expr.sub[1], pos)
        }

        ExprKind::Call => type_call(doc, &expr.sub, pos),

        ExprKind::Dot { member, index } => {
            let target = &expr.sub[0];
            if !target.ty.is_record() {
                doc.add_error(pos, DiagnosticKind::IsNotAStruct(target.to_string()));
                return None;
            }
            match target.ty.field_index(member) {
                Some(i) => {
                    let field_ty = target.ty.unfolded().get(i).clone();
                    *index = Some(i);
                    Some(field_ty)
                }
                None => {
                    let (t, m) = (target.to_string(), member.clone());
                    doc.add_error(pos, DiagnosticKind::HasNoMember(t, m));
                    None
                }
            }
        }

        ExprKind::Subscript => {
            let (arr, idx) = (&expr.sub[0], &expr.sub[1]);
            if !arr.ty.is_array() {
                doc.add_error(
                    pos,
                    DiagnosticKind::InvalidType(format!("'{arr}' is not an array")),
                );
                return None;
            }
            if !idx.ty.is_integral() && !idx.ty.is_scalar() {
                doc.add_error(
                    pos,
                    DiagnosticKind::TypeMismatch {
                        expected: "integer".into(),
                        found: idx.ty.to_string(),
                    },
                );
                return None;
            }
            Some(arr.ty.unfolded().get(0).clone())
        }

        ExprKind::Comma => Some(expr.sub[1].ty.clone()),

        ExprKind::Sync(_) => {
            let chan = &expr.sub[0];
            if !chan.ty.is_channel() {
                doc.add_error(
                    pos,
                    DiagnosticKind::BadSync(format!("'{chan}' is not a channel")),
                );
                return None;
            }
            Some(Type::void())
        }

        ExprKind::Deadlock => {
            if ctx == Ctx::Guard {
                doc.add_error(
                    pos,
                    DiagnosticKind::BadGuard("deadlock is only allowed in properties".into()),
                );
                return None;
            }
            Some(Type::bool_())
        }

        ExprKind::Quantifier { quant, binder } => {
            let binder_ty = doc.symbols.type_of(*binder).clone();
            if !binder_ty.is_integral() && !binder_ty.is_scalar() {
                doc.add_error(
                    pos,
                    DiagnosticKind::BadSelect(format!(
                        "quantifier binder has type '{binder_ty}'"
                    )),
                );
                return None;
            }
            let body = &expr.sub[0];
            match quant {
                Quant::Forall | Quant::Exists => {
                    if bool_like(&body.ty) {
                        Some(Type::bool_())
                    } else {
                        doc.add_error(
                            pos,
                            DiagnosticKind::TypeMismatch {
                                expected: "bool".into(),
                                found: body.ty.to_string(),
                            },
                        );
                        None
                    }
                }
                Quant::Sum => {
                    if body.ty.is_arithmetic() {
                        Some(if body.ty.is_double() {
                            Type::double()
                        } else {
                            Type::int()
                        })
                    } else {
                        doc.add_error(
                            pos,
                            DiagnosticKind::TypeMismatch {
                                expected: "int".into(),
                                found: body.ty.to_string(),
                            },
                        );
                        None
                    }
                }
            }
        }

        ExprKind::List => Some(Type::list_of(expr.sub.iter().map(|e| e.ty.clone()).collect())),
    }
}

fn type_binary(
    doc: &mut Document,
    op: BinaryOp,
    l: &Expression,
    r: &Expression,
    pos: zeno_ir::position::Position,
    ctx: Ctx,
) -> Option<Type> {
    let (lt, rt) = (&l.ty, &r.ty);
    let clock_involved = lt.is_clock() || rt.is_clock();
    // A rate node already typed to double counts as a clock constraint too.
    let rate_involved = matches!(l.kind, ExprKind::Unary(UnaryOp::Rate))
        || matches!(r.kind, ExprKind::Unary(UnaryOp::Rate));

    if op.is_comparison() {
        if (clock_involved || rate_involved) && !ctx.allows_clock_constraints() {
            doc.add_error(
                pos,
                DiagnosticKind::InvalidType(
                    "clock constraints are only allowed in guards and invariants".into(),
                ),
            );
            return None;
        }
        if clock_involved {
            let other_ok = |t: &Type| t.is_clock() || t.is_arithmetic();
            if other_ok(lt) && other_ok(rt) {
                return Some(Type::bool_());
            }
            doc.add_error(
                pos,
                DiagnosticKind::TypeMismatch {
                    expected: "clock or integer".into(),
                    found: if lt.is_clock() { rt } else { lt }.to_string(),
                },
            );
            return None;
        }
        if lt.is_scalar() || rt.is_scalar() {
            if matches!(op, BinaryOp::Eq | BinaryOp::Ne) && lt.compatible(rt) {
                return Some(Type::bool_());
            }
            doc.add_error(
                pos,
                DiagnosticKind::InvalidType("scalars only support equality".into()),
            );
            return None;
        }
        if lt.is_arithmetic() && rt.is_arithmetic() {
            return Some(Type::bool_());
        }
        doc.add_error(
            pos,
            DiagnosticKind::TypeMismatch {
                expected: lt.to_string(),
                found: rt.to_string(),
            },
        );
        return None;
    }

    if op.is_logical() {
        if bool_like(lt) && bool_like(rt) {
            return Some(Type::bool_());
        }
        doc.add_error(
            pos,
            DiagnosticKind::TypeMismatch {
                expected: "bool".into(),
                found: if bool_like(lt) { rt } else { lt }.to_string(),
            },
        );
        return None;
    }

    if op.is_bitwise() {
        if lt.is_integral() && rt.is_integral() {
            return Some(Type::int());
        }
        doc.add_error(
            pos,
            DiagnosticKind::TypeMismatch {
                expected: "int".into(),
                found: if lt.is_integral() { rt } else { lt }.to_string(),
            },
        );
        return None;
    }

    // Arithmetic. Clocks admit the difference forms used in guards.
    if clock_involved {
        match op {
            BinaryOp::Sub if lt.is_clock() && rt.is_clock() => return Some(Type::int()),
            BinaryOp::Add | BinaryOp::Sub
                if (lt.is_clock() && rt.is_integral())
                    || (lt.is_integral() && rt.is_clock()) =>
            {
                return Some(Type::clock());
            }
            _ => {
                doc.add_error(
                    pos,
                    DiagnosticKind::InvalidType(format!(
                        "operator '{op}' cannot be applied to a clock"
                    )),
                );
                return None;
            }
        }
    }
    if op == BinaryOp::Mod {
        if lt.is_integral() && rt.is_integral() {
            return Some(Type::int());
        }
        doc.add_error(
            pos,
            DiagnosticKind::TypeMismatch {
                expected: "int".into(),
                found: if lt.is_integral() { rt } else { lt }.to_string(),
            },
        );
        return None;
    }
    if lt.is_arithmetic() && rt.is_arithmetic() {
        return Some(if lt.is_double() || rt.is_double() {
            Type::double()
        } else {
            Type::int()
        });
    }
    doc.add_error(
        pos,
        DiagnosticKind::TypeMismatch {
            expected: lt.to_string(),
            found: rt.to_string(),
        },
    );
    None
}

fn type_assignment(
    doc: &mut Document,
    op: AssignOp,
    lhs: &Expression,
    rhs: &Expression,
    pos: zeno_ir::position::Position,
) -> Option<Type> {
    if !lhs.is_lvalue() {
        doc.add_error(
            pos,
            DiagnosticKind::BadAssignment(format!("'{lhs}' is not an l-value")),
        );
        return None;
    }
    if lhs.ty.is_constant() {
        doc.add_error(
            pos,
            DiagnosticKind::BadAssignment(format!("'{lhs}' is constant")),
        );
        return None;
    }
    if op == AssignOp::Assign {
        if lhs.ty.is_clock() {
            if rhs.ty.is_arithmetic() {
                return Some(Type::clock());
            }
            doc.add_error(
                pos,
                DiagnosticKind::BadAssignment(format!(
                    "clock must be reset to an integer, not '{}'",
                    rhs.ty
                )),
            );
            return None;
        }
        if lhs.ty.compatible(&rhs.ty) {
            return Some(lhs.ty.clone());
        }
        doc.add_error(
            pos,
            DiagnosticKind::TypeMismatch {
                expected: lhs.ty.to_string(),
                found: rhs.ty.to_string(),
            },
        );
        return None;
    }
    // Compound assignments are arithmetic or bitwise; clocks are excluded.
    let integral_only = matches!(
        op,
        AssignOp::Mod
            | AssignOp::BitAnd
            | AssignOp::BitOr
            | AssignOp::BitXor
            | AssignOp::ShiftLeft
            | AssignOp::ShiftRight
    );
    let lhs_ok = if integral_only {
        lhs.ty.is_integral()
    } else {
        lhs.ty.is_arithmetic()
    };
    let rhs_ok = if integral_only {
        rhs.ty.is_integral()
    } else {
        rhs.ty.is_arithmetic()
    };
    if lhs_ok && rhs_ok {
        Some(lhs.ty.clone())
    } else {
        doc.add_error(
            pos,
            DiagnosticKind::BadAssignment(format!(
                "operator '{op}' cannot be applied to '{}' and '{}'",
                lhs.ty, rhs.ty
            )),
        );
        None
    }
}

fn type_call(
    doc: &mut Document,
    sub: &[Expression],
    pos: zeno_ir::position::Position,
) -> Option<Type> {
    let callee = &sub[0];
    if !callee.ty.is_function() {
        doc.add_error(
            pos,
            DiagnosticKind::InvalidType(format!("'{callee}' is not a function")),
        );
        return None;
    }
    let fn_ty = callee.ty.clone();
    let params = fn_ty.parameters();
    let args = &sub[1..];
    if args.len() != params.len() {
        doc.add_error(
            pos,
            DiagnosticKind::InvalidType(format!(
                "'{callee}' takes {} arguments, {} given",
                params.len(),
                args.len()
            )),
        );
        return None;
    }
    let mut ok = true;
    for (arg, param) in args.iter().zip(params) {
        if param.ty.is_reference() {
            let target = param.ty.unfolded().get(0);
            if !arg.is_lvalue() || !target.stripped().same(&arg.ty.stripped()) {
                doc.add_error(
                    pos,
                    DiagnosticKind::TypeMismatch {
                        expected: param.ty.to_string(),
                        found: arg.ty.to_string(),
                    },
                );
                ok = false;
            }
        } else if !param.ty.compatible(&arg.ty) {
            doc.add_error(
                pos,
                DiagnosticKind::TypeMismatch {
                    expected: param.ty.to_string(),
                    found: arg.ty.to_string(),
                },
            );
            ok = false;
        }
    }
    ok.then(|| fn_ty.result().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeno_ir::builder::{Builder, ScopeRef};
    use zeno_ir::expression::SyncKind;
    use zeno_ir::position::Position;
    use zeno_ir::types::Qualifier;

    const P: Position = Position::UNKNOWN;

    fn doc_with(vars: &[(&str, Type)]) -> Document {
        let mut doc = Document::new();
        for (name, ty) in vars {
            doc.add_variable(ScopeRef::Global, ty.clone(), name, None, P)
                .unwrap();
        }
        doc
    }

    #[test]
    fn resolves_and_types_identifiers() {
        let mut doc = doc_with(&[("x", Type::clock()), ("n", Type::int())]);
        let frame = doc.global_frame();
        let mut e = Expression::binary(
            BinaryOp::Gt,
            Expression::ident("x", P),
            Expression::ident("n", P),
            P,
        );
        assert!(check(&mut doc, frame, &mut e, Ctx::Guard));
        assert!(e.ty.is(TypeKind::Bool));
        assert!(e.sub[0].symbol().is_some());
        assert!(doc.errors().is_empty());
    }

    #[test]
    fn unknown_identifier_is_reported_once() {
        let mut doc = doc_with(&[]);
        let frame = doc.global_frame();
        let mut e = Expression::binary(
            BinaryOp::Add,
            Expression::ident("nope", P),
            Expression::int(1, P),
            P,
        );
        assert!(!check(&mut doc, frame, &mut e, Ctx::General));
        assert_eq!(doc.errors().len(), 1);
        assert!(matches!(
            doc.errors()[0].kind,
            DiagnosticKind::UnknownIdentifier(_)
        ));
        assert!(e.ty.is_unknown());
    }

    #[test]
    fn clock_comparison_outside_guard_is_rejected() {
        let mut doc = doc_with(&[("x", Type::clock())]);
        let frame = doc.global_frame();
        let mut e = Expression::binary(
            BinaryOp::Lt,
            Expression::ident("x", P),
            Expression::int(3, P),
            P,
        );
        assert!(!check(&mut doc, frame, &mut e, Ctx::General));
        assert_eq!(doc.errors().len(), 1);
        let mut e2 = Expression::binary(
            BinaryOp::Lt,
            Expression::ident("x", P),
            Expression::int(3, P),
            P,
        );
        assert!(check(&mut doc, frame, &mut e2, Ctx::Guard));
    }

    #[test]
    fn arithmetic_promotes_to_double() {
        let mut doc = doc_with(&[("d", Type::double()), ("n", Type::int())]);
        let frame = doc.global_frame();
        let mut e = Expression::binary(
            BinaryOp::Add,
            Expression::ident("d", P),
            Expression::ident("n", P),
            P,
        );
        assert!(check(&mut doc, frame, &mut e, Ctx::General));
        assert!(e.ty.is_double());
    }

    #[test]
    fn assignment_to_constant_is_rejected() {
        let mut doc = doc_with(&[("k", Type::int().prefixed(Qualifier::Const))]);
        let frame = doc.global_frame();
        let mut e = Expression::assign(
            AssignOp::Assign,
            Expression::ident("k", P),
            Expression::int(1, P),
            P,
        );
        assert!(!check(&mut doc, frame, &mut e, Ctx::General));
        assert!(matches!(
            doc.errors()[0].kind,
            DiagnosticKind::BadAssignment(_)
        ));
    }

    #[test]
    fn record_member_access() {
        let rec = Type::record_of(vec![("a".into(), Type::int()), ("b".into(), Type::bool_())]);
        let mut doc = doc_with(&[("r", rec), ("n", Type::int())]);
        let frame = doc.global_frame();
        let mut e = Expression::dot(Expression::ident("r", P), "b", P);
        assert!(check(&mut doc, frame, &mut e, Ctx::General));
        assert!(e.ty.is(TypeKind::Bool));
        assert!(matches!(e.kind, ExprKind::Dot { index: Some(1), .. }));

        let mut missing = Expression::dot(Expression::ident("r", P), "z", P);
        assert!(!check(&mut doc, frame, &mut missing, Ctx::General));
        assert!(matches!(
            doc.errors()[0].kind,
            DiagnosticKind::HasNoMember(_, _)
        ));

        let mut not_struct = Expression::dot(Expression::ident("n", P), "a", P);
        assert!(!check(&mut doc, frame, &mut not_struct, Ctx::General));
        assert!(matches!(
            doc.errors()[1].kind,
            DiagnosticKind::IsNotAStruct(_)
        ));
    }

    #[test]
    fn subscript_requires_array_and_integral_index() {
        let arr = Type::array_of(Type::bool_(), Expression::int(3, P));
        let mut doc = doc_with(&[("a", arr), ("n", Type::int())]);
        let frame = doc.global_frame();
        let mut e = Expression::subscript(
            Expression::ident("a", P),
            Expression::ident("n", P),
            P,
        );
        assert!(check(&mut doc, frame, &mut e, Ctx::General));
        assert!(e.ty.is(TypeKind::Bool));

        let mut bad = Expression::subscript(Expression::ident("n", P), Expression::int(0, P), P);
        assert!(!check(&mut doc, frame, &mut bad, Ctx::General));
    }

    #[test]
    fn call_checks_arity_and_reference_parameters() {
        let fn_ty = Type::function_of(
            Type::int(),
            vec![
                (Some("out".into()), Type::ref_to(Type::int())),
                (Some("k".into()), Type::int()),
            ],
        );
        let mut doc = doc_with(&[("n", Type::int())]);
        let frame = doc.global_frame();
        doc.add_function(ScopeRef::Global, fn_ty, "f", P).unwrap();

        let mut good = Expression::call(
            Expression::ident("f", P),
            vec![Expression::ident("n", P), Expression::int(1, P)],
            P,
        );
        assert!(check(&mut doc, frame, &mut good, Ctx::General));
        assert!(good.ty.is(TypeKind::Int));

        // literal cannot bind to a reference parameter
        let mut bad = Expression::call(
            Expression::ident("f", P),
            vec![Expression::int(0, P), Expression::int(1, P)],
            P,
        );
        assert!(!check(&mut doc, frame, &mut bad, Ctx::General));

        let mut arity = Expression::call(Expression::ident("f", P), vec![], P);
        assert!(!check(&mut doc, frame, &mut arity, Ctx::General));
    }

    #[test]
    fn deadlock_is_rejected_in_guards() {
        let mut doc = doc_with(&[]);
        let frame = doc.global_frame();
        let mut e = Expression::deadlock(P);
        assert!(!check(&mut doc, frame, &mut e, Ctx::Guard));
        assert!(matches!(doc.errors()[0].kind, DiagnosticKind::BadGuard(_)));
        let mut e2 = Expression::deadlock(P);
        assert!(check(&mut doc, frame, &mut e2, Ctx::General));
    }

    #[test]
    fn sync_requires_channel() {
        let mut doc = doc_with(&[("c", Type::channel()), ("n", Type::int())]);
        let frame = doc.global_frame();
        let mut good = Expression::sync(SyncKind::Send, Expression::ident("c", P), P);
        assert!(check(&mut doc, frame, &mut good, Ctx::General));
        let mut bad = Expression::sync(SyncKind::Recv, Expression::ident("n", P), P);
        assert!(!check(&mut doc, frame, &mut bad, Ctx::General));
        assert!(matches!(doc.errors()[0].kind, DiagnosticKind::BadSync(_)));
    }
}
