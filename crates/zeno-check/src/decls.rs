//! Declaration checking: variables, typedefs, progress measures, IO
//! declarations, and gantt charts.

use zeno_ir::diagnostic::DiagnosticKind;
use zeno_ir::document::Document;
use zeno_ir::expression::{ExprKind, Expression};
use zeno_ir::position::Position;
use zeno_ir::symbol::{FrameId, SymbolId, VariableId};
use zeno_ir::types::{Type, TypeKind};

use crate::eval::ConstEvaluator;
use crate::exprs::{self, Ctx};

/// Resolve and type the expressions embedded in a declared type (array
/// sizes, range and scalar-set bounds) and validate its qualifier placement.
pub(crate) fn check_type(doc: &mut Document, frame: FrameId, ty: &mut Type, pos: Position) -> bool {
    let mut ok = true;
    for e in ty.exprs_mut() {
        ok &= exprs::check(doc, frame, e, Ctx::General);
    }
    // Re-borrow immutably for the judgement on the typed expressions.
    if ok {
        for e in ty.exprs() {
            if !e.ty.is_integral() {
                doc.add_error(
                    e.pos,
                    DiagnosticKind::TypeMismatch {
                        expected: "int".into(),
                        found: e.ty.to_string(),
                    },
                );
                ok = false;
            }
        }
    }
    if !ty.quals_valid() {
        doc.add_error(pos, DiagnosticKind::InvalidType(ty.to_string()));
        ok = false;
    }
    for f in ty.fields_mut() {
        ok &= check_type(doc, frame, &mut f.ty, pos);
    }
    ok
}

pub(crate) fn check_variable(doc: &mut Document, var: VariableId) {
    let uid = doc.variables[var].uid;
    let pos = doc.symbols.symbol(uid).pos;
    let frame = doc.symbols.symbol(uid).frame;
    let mut ty = doc.symbols.type_of(uid).clone();

    let ty_ok = check_type(doc, frame, &mut ty, pos);
    if ty.is_void() || ty.is_unknown() {
        doc.add_error(
            pos,
            DiagnosticKind::InvalidType(format!(
                "'{}' cannot be declared with type '{ty}'",
                doc.symbols.name(uid)
            )),
        );
        doc.symbols.set_type(uid, ty);
        return;
    }
    doc.symbols.set_type(uid, ty.clone());
    if !ty_ok {
        return;
    }

    // Validate bounds where they are statically known.
    validate_static_bounds(doc, &ty, pos);

    let init = doc.variables[var].init.take();
    match init {
        Some(mut e) => {
            if ty.is_clock() || ty.is_channel() {
                doc.add_error(
                    pos,
                    DiagnosticKind::InvalidType(format!(
                        "'{ty}' declarations cannot have an initialiser"
                    )),
                );
                doc.variables[var].init = Some(e);
                return;
            }
            if exprs::check(doc, frame, &mut e, Ctx::General) {
                check_initializer(doc, &ty, &e);
            }
            doc.variables[var].init = Some(e);
        }
        None => {
            if ty.is_constant() && !ty.is_channel() {
                doc.add_error(
                    pos,
                    DiagnosticKind::InvalidType(format!(
                        "constant '{}' must have an initialiser",
                        doc.symbols.name(uid)
                    )),
                );
            }
        }
    }
}

fn validate_static_bounds(doc: &mut Document, ty: &Type, pos: Position) {
    let eval = ConstEvaluator::new(doc);
    let mut reports: Vec<DiagnosticKind> = Vec::new();
    collect_bound_defects(&eval, ty, &mut reports);
    for kind in reports {
        doc.add_error(pos, kind);
    }
}

fn collect_bound_defects(eval: &ConstEvaluator, ty: &Type, out: &mut Vec<DiagnosticKind>) {
    if let Some((lo, hi)) = ty.range_bounds() {
        if let (Some(lo), Some(hi)) = (eval.eval_int(lo), eval.eval_int(hi)) {
            if lo > hi {
                out.push(DiagnosticKind::InvalidType(format!(
                    "empty range [{lo},{hi}]"
                )));
            }
        }
    }
    if let Some(size) = ty.array_size() {
        if let Some(n) = eval.eval_int(size) {
            if n <= 0 {
                out.push(DiagnosticKind::InvalidType(format!("array size {n}")));
            }
        }
    }
    for i in 0..ty.size() {
        collect_bound_defects(eval, ty.get(i), out);
    }
}

/// Initializer compatibility, with list literals matched structurally
/// against arrays and records.
fn check_initializer(doc: &mut Document, target: &Type, init: &Expression) {
    if let ExprKind::List = init.kind {
        if target.is_array() {
            let elem = target.unfolded().get(0).clone();
            if let Some(size) = target
                .array_size()
                .and_then(|s| ConstEvaluator::new(doc).eval_int(s))
            {
                if init.sub.len() as i64 > size {
                    doc.add_error(
                        init.pos,
                        DiagnosticKind::InvalidType(format!(
                            "too many elements: array of {size}, {} given",
                            init.sub.len()
                        )),
                    );
                    return;
                }
            }
            for sub in &init.sub {
                check_initializer(doc, &elem, sub);
            }
            return;
        }
        if target.is_record() {
            let unfolded = target.unfolded().clone();
            if unfolded.size() != init.sub.len() {
                doc.add_error(
                    init.pos,
                    DiagnosticKind::TypeMismatch {
                        expected: target.to_string(),
                        found: init.ty.to_string(),
                    },
                );
                return;
            }
            for (i, sub) in init.sub.iter().enumerate() {
                check_initializer(doc, unfolded.get(i), sub);
            }
            return;
        }
    }
    if !target.compatible(&init.ty) {
        doc.add_error(
            init.pos,
            DiagnosticKind::TypeMismatch {
                expected: target.to_string(),
                found: init.ty.to_string(),
            },
        );
        return;
    }
    // Range targets reject statically out-of-range constants.
    let (bounds, value) = {
        let eval = ConstEvaluator::new(doc);
        (eval.bounds_of(target), eval.eval_int(init))
    };
    if let (Some((lo, hi)), Some(v)) = (bounds, value) {
        if v < lo || v > hi {
            doc.add_error(
                init.pos,
                DiagnosticKind::InvalidType(format!("value {v} is out of range [{lo},{hi}]")),
            );
        }
    }
}

/// Typedefs: validate the definition and reject self-referential names.
pub(crate) fn check_typedef(doc: &mut Document, sym: SymbolId) {
    let pos = doc.symbols.symbol(sym).pos;
    let frame = doc.symbols.symbol(sym).frame;
    let name = doc.symbols.name(sym).to_string();
    let mut ty = doc.symbols.type_of(sym).clone();
    check_type(doc, frame, &mut ty, pos);
    if ty.kind() == TypeKind::Typename && typename_mentions(ty.get(0), &name) {
        doc.add_error(pos, DiagnosticKind::CyclicType(name));
    }
    doc.symbols.set_type(sym, ty);
}

fn typename_mentions(ty: &Type, name: &str) -> bool {
    if ty.kind() == TypeKind::Typename && ty.name.as_deref() == Some(name) {
        return true;
    }
    (0..ty.size()).any(|i| typename_mentions(ty.get(i), name))
}

pub(crate) fn check_progress(doc: &mut Document, frame: FrameId, tpl_progress: (Option<usize>, usize)) {
    let (tpl, idx) = tpl_progress;
    let mut p = match tpl {
        Some(t) => doc.templates[t].decls.progress[idx].clone(),
        None => doc.globals.progress[idx].clone(),
    };
    if let Some(guard) = &mut p.guard {
        if exprs::check(doc, frame, guard, Ctx::General) && !guard.ty.is_integral() {
            doc.add_error(
                guard.pos,
                DiagnosticKind::TypeMismatch {
                    expected: "bool".into(),
                    found: guard.ty.to_string(),
                },
            );
        }
    }
    if exprs::check(doc, frame, &mut p.measure, Ctx::General) && !p.measure.ty.is_arithmetic() {
        doc.add_error(
            p.measure.pos,
            DiagnosticKind::TypeMismatch {
                expected: "int".into(),
                found: p.measure.ty.to_string(),
            },
        );
    }
    match tpl {
        Some(t) => doc.templates[t].decls.progress[idx] = p,
        None => doc.globals.progress[idx] = p,
    }
}

pub(crate) fn check_io_decl(doc: &mut Document, frame: FrameId, tpl_iodecl: (Option<usize>, usize)) {
    let (tpl, idx) = tpl_iodecl;
    let mut io = match tpl {
        Some(t) => doc.templates[t].decls.iodecl[idx].clone(),
        None => doc.globals.iodecl[idx].clone(),
    };
    for e in &mut io.param {
        exprs::check(doc, frame, e, Ctx::General);
    }
    for e in io.inputs.iter_mut().chain(io.outputs.iter_mut()) {
        if exprs::check(doc, frame, e, Ctx::General) && !e.ty.is_channel() && !e.ty.is_array() {
            doc.add_error(
                e.pos,
                DiagnosticKind::TypeMismatch {
                    expected: "chan".into(),
                    found: e.ty.to_string(),
                },
            );
        }
    }
    for e in &mut io.csp {
        exprs::check(doc, frame, e, Ctx::General);
    }
    match tpl {
        Some(t) => doc.templates[t].decls.iodecl[idx] = io,
        None => doc.globals.iodecl[idx] = io,
    }
}

pub(crate) fn check_gantt(doc: &mut Document, tpl_gantt: (Option<usize>, usize)) {
    let (tpl, idx) = tpl_gantt;
    let mut g = match tpl {
        Some(t) => doc.templates[t].decls.gantt[idx].clone(),
        None => doc.globals.gantt[idx].clone(),
    };
    for entry in &mut g.mapping {
        let frame = entry.parameters;
        if exprs::check(doc, frame, &mut entry.predicate, Ctx::General)
            && !entry.predicate.ty.is_integral()
        {
            doc.add_error(
                entry.predicate.pos,
                DiagnosticKind::TypeMismatch {
                    expected: "bool".into(),
                    found: entry.predicate.ty.to_string(),
                },
            );
        }
        if exprs::check(doc, frame, &mut entry.mapping, Ctx::General)
            && !entry.mapping.ty.is_integral()
        {
            doc.add_error(
                entry.mapping.pos,
                DiagnosticKind::TypeMismatch {
                    expected: "int".into(),
                    found: entry.mapping.ty.to_string(),
                },
            );
        }
    }
    match tpl {
        Some(t) => doc.templates[t].decls.gantt[idx] = g,
        None => doc.globals.gantt[idx] = g,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeno_ir::builder::{Builder, ScopeRef};
    use zeno_ir::types::Qualifier;

    const P: Position = Position::UNKNOWN;

    #[test]
    fn constant_without_initialiser_is_an_error() {
        let mut doc = Document::new();
        let v = doc
            .add_variable(
                ScopeRef::Global,
                Type::int().prefixed(Qualifier::Const),
                "k",
                None,
                P,
            )
            .unwrap();
        check_variable(&mut doc, v);
        assert_eq!(doc.errors().len(), 1);
    }

    #[test]
    fn initialiser_must_match_type() {
        let mut doc = Document::new();
        let v = doc
            .add_variable(
                ScopeRef::Global,
                Type::bool_(),
                "b",
                Some(Expression::double(0.5, P)),
                P,
            )
            .unwrap();
        check_variable(&mut doc, v);
        assert!(!doc.errors().is_empty());
    }

    #[test]
    fn clock_initialiser_is_rejected() {
        let mut doc = Document::new();
        let v = doc
            .add_variable(
                ScopeRef::Global,
                Type::clock(),
                "x",
                Some(Expression::int(0, P)),
                P,
            )
            .unwrap();
        check_variable(&mut doc, v);
        assert_eq!(doc.errors().len(), 1);
    }

    #[test]
    fn list_initialiser_matches_array_shape() {
        let mut doc = Document::new();
        let arr = Type::array_of(Type::int(), Expression::int(2, P));
        let good = doc
            .add_variable(
                ScopeRef::Global,
                arr.clone(),
                "a",
                Some(Expression::list(
                    vec![Expression::int(1, P), Expression::int(2, P)],
                    P,
                )),
                P,
            )
            .unwrap();
        check_variable(&mut doc, good);
        assert!(doc.errors().is_empty(), "{:?}", doc.errors());

        let bad = doc
            .add_variable(
                ScopeRef::Global,
                arr,
                "b",
                Some(Expression::list(
                    vec![
                        Expression::int(1, P),
                        Expression::int(2, P),
                        Expression::int(3, P),
                    ],
                    P,
                )),
                P,
            )
            .unwrap();
        check_variable(&mut doc, bad);
        assert_eq!(doc.errors().len(), 1);
    }

    #[test]
    fn range_initialiser_out_of_bounds() {
        let mut doc = Document::new();
        let ty = Type::range(Type::int(), Expression::int(0, P), Expression::int(3, P));
        let v = doc
            .add_variable(ScopeRef::Global, ty, "r", Some(Expression::int(9, P)), P)
            .unwrap();
        check_variable(&mut doc, v);
        assert_eq!(doc.errors().len(), 1);
    }

    #[test]
    fn array_size_must_be_positive_when_static() {
        let mut doc = Document::new();
        let ty = Type::array_of(Type::int(), Expression::int(0, P));
        let v = doc.add_variable(ScopeRef::Global, ty, "a", None, P).unwrap();
        check_variable(&mut doc, v);
        assert_eq!(doc.errors().len(), 1);
    }

    #[test]
    fn misplaced_qualifier_is_invalid_type() {
        let mut doc = Document::new();
        let v = doc
            .add_variable(
                ScopeRef::Global,
                Type::int().prefixed(Qualifier::Urgent),
                "u",
                None,
                P,
            )
            .unwrap();
        check_variable(&mut doc, v);
        assert!(matches!(
            doc.errors()[0].kind,
            DiagnosticKind::InvalidType(_)
        ));
    }

    #[test]
    fn self_referential_typedef_is_cyclic() {
        let mut doc = Document::new();
        // typedef struct { T next; } T — built as a typename mentioning itself
        let inner = Type::typename("T", Type::int());
        let def = Type::record_of(vec![("next".into(), inner)]);
        let td = doc.add_typedef(ScopeRef::Global, def, "T", P).unwrap();
        check_typedef(&mut doc, td);
        assert!(doc
            .errors()
            .iter()
            .any(|e| matches!(e.kind, DiagnosticKind::CyclicType(_))));
    }
}
