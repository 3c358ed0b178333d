//! Function body checking and the derived `changes`/`depends` sets.

use indexmap::IndexSet;

use zeno_ir::diagnostic::DiagnosticKind;
use zeno_ir::document::Document;
use zeno_ir::expression::{ExprKind, Expression};
use zeno_ir::statement::{Block, Statement};
use zeno_ir::symbol::{DeclRef, FrameId, FunctionId, SymbolId};
use zeno_ir::types::Type;

use crate::decls;
use crate::exprs::{self, Ctx};

/// Whether `frame` is `ancestor` or nested inside it.
fn frame_within(doc: &Document, frame: FrameId, ancestor: FrameId) -> bool {
    let mut f = Some(frame);
    while let Some(id) = f {
        if id == ancestor {
            return true;
        }
        f = doc.symbols.parent(id);
    }
    false
}

pub(crate) fn check_function(doc: &mut Document, func: FunctionId) {
    let uid = doc.functions[func].uid;
    let fn_ty = doc.symbols.type_of(uid).clone();
    let pos = doc.symbols.symbol(uid).pos;
    if !fn_ty.is_function() {
        doc.add_error(
            pos,
            DiagnosticKind::InvalidType(format!(
                "'{}' does not have function type",
                doc.symbols.name(uid)
            )),
        );
        return;
    }
    let result = fn_ty.result().clone();

    for i in 0..doc.functions[func].variables.len() {
        let var = doc.functions[func].variables[i];
        decls::check_variable(doc, var);
    }

    let Some(mut body) = doc.functions[func].body.take() else {
        doc.add_error(
            pos,
            DiagnosticKind::InvalidType(format!(
                "function '{}' has no body",
                doc.symbols.name(uid)
            )),
        );
        return;
    };
    check_block(doc, &mut body, &result);

    if !result.is_void() && !Statement::Block(body.clone()).always_returns() {
        doc.add_error(
            pos,
            DiagnosticKind::InvalidType(format!(
                "function '{}' does not return a value on every path",
                doc.symbols.name(uid)
            )),
        );
    }

    // Derived sets are recomputed from scratch so re-checking is stable.
    let mut changes = IndexSet::new();
    let mut depends = IndexSet::new();
    let mut stack = vec![func];
    collect_block_effects(doc, &body, body.frame, &mut changes, &mut depends, &mut stack);
    let f = &mut doc.functions[func];
    f.changes = changes;
    f.depends = depends;
    f.body = Some(body);
}

fn check_block(doc: &mut Document, block: &mut Block, result: &Type) {
    let frame = block.frame;
    for stmt in &mut block.stmts {
        check_stmt(doc, frame, stmt, result);
    }
}

fn check_stmt(doc: &mut Document, frame: FrameId, stmt: &mut Statement, result: &Type) {
    match stmt {
        Statement::Empty => {}
        Statement::Expr(e) => {
            exprs::check(doc, frame, e, Ctx::General);
        }
        Statement::Block(b) => check_block(doc, b, result),
        Statement::If {
            cond,
            then_stmt,
            else_stmt,
        } => {
            check_condition(doc, frame, cond);
            check_stmt(doc, frame, then_stmt, result);
            if let Some(e) = else_stmt {
                check_stmt(doc, frame, e, result);
            }
        }
        Statement::While { cond, body } => {
            check_condition(doc, frame, cond);
            check_stmt(doc, frame, body, result);
        }
        Statement::DoWhile { body, cond } => {
            check_stmt(doc, frame, body, result);
            check_condition(doc, frame, cond);
        }
        Statement::For {
            init,
            cond,
            step,
            body,
        } => {
            exprs::check(doc, frame, init, Ctx::General);
            check_condition(doc, frame, cond);
            exprs::check(doc, frame, step, Ctx::General);
            check_stmt(doc, frame, body, result);
        }
        Statement::Ranged { binder, body } => {
            let ty = doc.symbols.type_of(*binder).clone();
            if !ty.is_integral() && !ty.is_scalar() {
                doc.add_error(
                    doc.symbols.symbol(*binder).pos,
                    DiagnosticKind::BadSelect(format!("cannot iterate over '{ty}'")),
                );
            }
            check_stmt(doc, frame, body, result);
        }
        Statement::Return(value) => {
            let pos = value
                .as_ref()
                .map(|e| e.pos)
                .unwrap_or(zeno_ir::position::Position::UNKNOWN);
            match value {
                Some(e) => {
                    if exprs::check(doc, frame, e, Ctx::General)
                        && !result.is_void()
                        && !result.compatible(&e.ty)
                    {
                        doc.add_error(
                            pos,
                            DiagnosticKind::TypeMismatch {
                                expected: result.to_string(),
                                found: e.ty.to_string(),
                            },
                        );
                    }
                    if result.is_void() {
                        doc.add_error(
                            pos,
                            DiagnosticKind::TypeMismatch {
                                expected: "void".into(),
                                found: e.ty.to_string(),
                            },
                        );
                    }
                }
                None => {
                    if !result.is_void() {
                        doc.add_error(
                            pos,
                            DiagnosticKind::TypeMismatch {
                                expected: result.to_string(),
                                found: "void".into(),
                            },
                        );
                    }
                }
            }
        }
    }
}

fn check_condition(doc: &mut Document, frame: FrameId, cond: &mut Expression) {
    if exprs::check(doc, frame, cond, Ctx::General) && !cond.ty.is_integral() {
        doc.add_error(
            cond.pos,
            DiagnosticKind::TypeMismatch {
                expected: "bool".into(),
                found: cond.ty.to_string(),
            },
        );
    }
}

// -----------------------------------------------------------------
// Effects: what a function (or expression) reads and writes
// -----------------------------------------------------------------

/// The symbol at the root of an l-value chain.
fn lvalue_root(e: &Expression) -> Option<SymbolId> {
    match &e.kind {
        ExprKind::Identifier { symbol, .. } => *symbol,
        ExprKind::Dot { .. } | ExprKind::Subscript => lvalue_root(&e.sub[0]),
        _ => None,
    }
}

fn collect_block_effects(
    doc: &Document,
    block: &Block,
    local_frame: FrameId,
    changes: &mut IndexSet<SymbolId>,
    depends: &mut IndexSet<SymbolId>,
    stack: &mut Vec<FunctionId>,
) {
    for stmt in &block.stmts {
        collect_stmt_effects(doc, stmt, local_frame, changes, depends, stack);
    }
}

fn collect_stmt_effects(
    doc: &Document,
    stmt: &Statement,
    local_frame: FrameId,
    changes: &mut IndexSet<SymbolId>,
    depends: &mut IndexSet<SymbolId>,
    stack: &mut Vec<FunctionId>,
) {
    match stmt {
        Statement::Empty => {}
        Statement::Expr(e) => collect_expr_effects(doc, e, local_frame, changes, depends, stack),
        Statement::Block(b) => collect_block_effects(doc, b, local_frame, changes, depends, stack),
        Statement::If {
            cond,
            then_stmt,
            else_stmt,
        } => {
            collect_expr_effects(doc, cond, local_frame, changes, depends, stack);
            collect_stmt_effects(doc, then_stmt, local_frame, changes, depends, stack);
            if let Some(e) = else_stmt {
                collect_stmt_effects(doc, e, local_frame, changes, depends, stack);
            }
        }
        Statement::While { cond, body } | Statement::DoWhile { body, cond } => {
            collect_expr_effects(doc, cond, local_frame, changes, depends, stack);
            collect_stmt_effects(doc, body, local_frame, changes, depends, stack);
        }
        Statement::For {
            init,
            cond,
            step,
            body,
        } => {
            collect_expr_effects(doc, init, local_frame, changes, depends, stack);
            collect_expr_effects(doc, cond, local_frame, changes, depends, stack);
            collect_expr_effects(doc, step, local_frame, changes, depends, stack);
            collect_stmt_effects(doc, body, local_frame, changes, depends, stack);
        }
        Statement::Ranged { body, .. } => {
            collect_stmt_effects(doc, body, local_frame, changes, depends, stack);
        }
        Statement::Return(Some(e)) => {
            collect_expr_effects(doc, e, local_frame, changes, depends, stack)
        }
        Statement::Return(None) => {}
    }
}

fn is_local(doc: &Document, sym: SymbolId, local_frame: FrameId) -> bool {
    frame_within(doc, doc.symbols.symbol(sym).frame, local_frame)
}

pub(crate) fn collect_expr_effects(
    doc: &Document,
    e: &Expression,
    local_frame: FrameId,
    changes: &mut IndexSet<SymbolId>,
    depends: &mut IndexSet<SymbolId>,
    stack: &mut Vec<FunctionId>,
) {
    match &e.kind {
        ExprKind::Assign(_) => {
            if let Some(root) = lvalue_root(&e.sub[0]) {
                if !is_local(doc, root, local_frame) {
                    changes.insert(root);
                }
            }
            // Subscript indices and struct targets are reads as well.
            for sub in &e.sub {
                collect_reads(doc, sub, local_frame, depends);
            }
            collect_expr_effects(doc, &e.sub[1], local_frame, changes, depends, stack);
        }
        ExprKind::Call => {
            if let Some(callee) = e.sub[0].symbol() {
                if let DeclRef::Function(f) = doc.symbols.decl_of(callee) {
                    if !stack.contains(&f) {
                        stack.push(f);
                        if let Some(body) = &doc.functions[f].body {
                            collect_block_effects(
                                doc,
                                body,
                                body.frame,
                                changes,
                                depends,
                                stack,
                            );
                        }
                        stack.pop();
                    }
                }
            }
            for arg in &e.sub[1..] {
                collect_reads(doc, arg, local_frame, depends);
                collect_expr_effects(doc, arg, local_frame, changes, depends, stack);
            }
        }
        _ => {
            if let Some(s) = e.symbol() {
                if !is_local(doc, s, local_frame) {
                    depends.insert(s);
                }
            }
            for sub in &e.sub {
                collect_expr_effects(doc, sub, local_frame, changes, depends, stack);
            }
        }
    }
}

fn collect_reads(
    doc: &Document,
    e: &Expression,
    local_frame: FrameId,
    depends: &mut IndexSet<SymbolId>,
) {
    if let Some(s) = e.symbol() {
        if !is_local(doc, s, local_frame) {
            depends.insert(s);
        }
    }
    for sub in &e.sub {
        collect_reads(doc, sub, local_frame, depends);
    }
}

/// Whether evaluating `e` can change state: it assigns, or it calls a
/// function that (transitively) assigns to anything non-local.
pub(crate) fn has_side_effects(doc: &Document, e: &Expression) -> bool {
    if e.contains_assignment() {
        return true;
    }
    fn any_changing_call(doc: &Document, e: &Expression, stack: &mut Vec<FunctionId>) -> bool {
        if let ExprKind::Call = e.kind {
            if let Some(callee) = e.sub[0].symbol() {
                if let DeclRef::Function(f) = doc.symbols.decl_of(callee) {
                    if !stack.contains(&f) {
                        stack.push(f);
                        let mut changes = IndexSet::new();
                        let mut depends = IndexSet::new();
                        if let Some(body) = &doc.functions[f].body {
                            collect_block_effects(
                                doc,
                                body,
                                body.frame,
                                &mut changes,
                                &mut depends,
                                stack,
                            );
                        }
                        stack.pop();
                        if !changes.is_empty() {
                            return true;
                        }
                    }
                }
            }
        }
        e.sub.iter().any(|s| any_changing_call(doc, s, stack))
    }
    any_changing_call(doc, e, &mut Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeno_ir::builder::{Builder, ScopeRef};
    use zeno_ir::expression::AssignOp;
    use zeno_ir::position::Position;

    const P: Position = Position::UNKNOWN;

    /// `int f() { count = count + 1; return count; }` with global `count`.
    fn doc_with_counter_fn() -> (Document, FunctionId, SymbolId) {
        let mut doc = Document::new();
        let count = doc
            .add_variable(ScopeRef::Global, Type::int(), "count", Some(Expression::int(0, P)), P)
            .unwrap();
        let count_uid = doc.variables[count].uid;
        let f = doc
            .add_function(
                ScopeRef::Global,
                Type::function_of(Type::int(), vec![]),
                "f",
                P,
            )
            .unwrap();
        let body_frame = doc.fresh_frame(Some(doc.global_frame()));
        let mut body = Block::new(body_frame);
        body.push(Statement::Expr(Expression::assign(
            AssignOp::Assign,
            Expression::ident("count", P),
            Expression::binary(
                zeno_ir::expression::BinaryOp::Add,
                Expression::ident("count", P),
                Expression::int(1, P),
                P,
            ),
            P,
        )));
        body.push(Statement::Return(Some(Expression::ident("count", P))));
        doc.set_function_body(f, body).unwrap();
        (doc, f, count_uid)
    }

    #[test]
    fn changes_and_depends_are_collected() {
        let (mut doc, f, count_uid) = doc_with_counter_fn();
        check_function(&mut doc, f);
        assert!(doc.errors().is_empty(), "{:?}", doc.errors());
        let func = &doc.functions[f];
        assert!(func.changes.contains(&count_uid));
        assert!(func.depends.contains(&count_uid));
    }

    #[test]
    fn locals_are_not_effects() {
        let mut doc = Document::new();
        let f = doc
            .add_function(
                ScopeRef::Global,
                Type::function_of(Type::int(), vec![]),
                "g",
                P,
            )
            .unwrap();
        let body_frame = doc.fresh_frame(Some(doc.global_frame()));
        let local = doc
            .add_function_local(f, body_frame, Type::int(), "tmp", Some(Expression::int(1, P)), P)
            .unwrap();
        let mut body = Block::new(body_frame);
        body.variables.push(local);
        body.push(Statement::Expr(Expression::assign(
            AssignOp::Assign,
            Expression::ident("tmp", P),
            Expression::int(2, P),
            P,
        )));
        body.push(Statement::Return(Some(Expression::ident("tmp", P))));
        doc.set_function_body(f, body).unwrap();
        check_function(&mut doc, f);
        assert!(doc.errors().is_empty(), "{:?}", doc.errors());
        assert!(doc.functions[f].changes.is_empty());
        assert!(doc.functions[f].depends.is_empty());
    }

    #[test]
    fn missing_return_is_reported() {
        let mut doc = Document::new();
        let f = doc
            .add_function(
                ScopeRef::Global,
                Type::function_of(Type::int(), vec![]),
                "h",
                P,
            )
            .unwrap();
        let body_frame = doc.fresh_frame(Some(doc.global_frame()));
        doc.set_function_body(f, Block::new(body_frame)).unwrap();
        check_function(&mut doc, f);
        assert_eq!(doc.errors().len(), 1);
    }

    #[test]
    fn side_effects_seen_through_calls() {
        let (mut doc, f, _) = doc_with_counter_fn();
        check_function(&mut doc, f);
        let f_uid = doc.functions[f].uid;
        let call = Expression::call(Expression::resolved_ident("f", f_uid, P), vec![], P);
        assert!(has_side_effects(&doc, &call));
        assert!(!has_side_effects(&doc, &Expression::int(1, P)));
    }
}
