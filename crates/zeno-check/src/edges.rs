//! Location and edge checking: invariants, rate extraction, guards,
//! synchronisations, select enumeration, and the global model flags.

use zeno_ir::diagnostic::DiagnosticKind;
use zeno_ir::document::{Document, EdgeEnd, Rate};
use zeno_ir::expression::{BinaryOp, ExprKind, Expression, SyncKind, UnaryOp, Value};
use zeno_ir::position::Position;
use zeno_ir::symbol::TemplateId;
use zeno_ir::types::Qualifier;

use crate::eval::ConstEvaluator;
use crate::exprs::{self, Ctx};
use crate::stmts;

/// Whether any node of the expression is clock-typed. Clock differences
/// lose their clock type under promotion, so containment is the right test
/// for "this comparison constrains a clock".
fn contains_clock(e: &Expression) -> bool {
    e.ty.is_clock() || e.sub.iter().any(contains_clock)
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct GuardInfo {
    pub has_clock: bool,
    pub has_strict_lower_bound: bool,
}

/// Scan a typed guard for clock constraints.
pub(crate) fn analyze_guard(e: &Expression) -> GuardInfo {
    let mut info = GuardInfo::default();
    scan_guard(e, &mut info);
    info
}

fn scan_guard(e: &Expression, info: &mut GuardInfo) {
    if let ExprKind::Binary(op) = &e.kind {
        if op.is_comparison() {
            let (l, r) = (&e.sub[0], &e.sub[1]);
            let (cl, cr) = (contains_clock(l), contains_clock(r));
            if cl || cr {
                info.has_clock = true;
                let strict_lower =
                    (*op == BinaryOp::Gt && cl && !cr) || (*op == BinaryOp::Lt && cr && !cl);
                info.has_strict_lower_bound |= strict_lower;
            }
        }
    }
    for sub in &e.sub {
        scan_guard(sub, info);
    }
}

// -----------------------------------------------------------------
// Locations
// -----------------------------------------------------------------

enum InvariantAtom {
    Keep(Expression),
    Rate(Rate),
}

/// Split a typed invariant into kept constraints and extracted clock rates,
/// reporting lower bounds and other defects. Returns false when the
/// invariant was malformed; the caller then leaves it untouched.
fn split_invariant(
    doc: &mut Document,
    e: Expression,
    atoms: &mut Vec<InvariantAtom>,
    strict: &mut bool,
) -> bool {
    if let ExprKind::Binary(BinaryOp::And) = &e.kind {
        let mut sub = e.sub.into_iter();
        let (l, r) = (sub.next().unwrap(), sub.next().unwrap());
        let ok = split_invariant(doc, l, atoms, strict);
        return split_invariant(doc, r, atoms, strict) && ok;
    }
    if let ExprKind::Binary(op) = &e.kind {
        if op.is_comparison() {
            let rate_left = matches!(e.sub[0].kind, ExprKind::Unary(UnaryOp::Rate));
            let rate_right = matches!(e.sub[1].kind, ExprKind::Unary(UnaryOp::Rate));
            if rate_left || rate_right {
                if *op != BinaryOp::Eq {
                    doc.add_error(
                        e.pos,
                        DiagnosticKind::BadRate("rates can only be constrained with '=='".into()),
                    );
                    return false;
                }
                let (rate_node, value) = if rate_left {
                    (&e.sub[0], &e.sub[1])
                } else {
                    (&e.sub[1], &e.sub[0])
                };
                let Some(clock) = rate_node.sub[0].symbol() else {
                    doc.add_error(
                        e.pos,
                        DiagnosticKind::BadRate("rate must apply to a declared clock".into()),
                    );
                    return false;
                };
                atoms.push(InvariantAtom::Rate(Rate {
                    clock,
                    expr: value.clone(),
                }));
                return true;
            }
            let (cl, cr) = (contains_clock(&e.sub[0]), contains_clock(&e.sub[1]));
            if cl || cr {
                // Only upper bounds on clocks are invariants.
                let upper = (cl && matches!(op, BinaryOp::Le | BinaryOp::Lt))
                    || (cr && matches!(op, BinaryOp::Ge | BinaryOp::Gt));
                if !upper {
                    doc.add_error(
                        e.pos,
                        DiagnosticKind::BadInvariant(
                            "only upper bounds on clocks are allowed in invariants".into(),
                        ),
                    );
                    return false;
                }
                *strict |= matches!(op, BinaryOp::Lt | BinaryOp::Gt);
                atoms.push(InvariantAtom::Keep(e));
                return true;
            }
        }
    }
    if e.ty.is_integral() {
        atoms.push(InvariantAtom::Keep(e));
        return true;
    }
    doc.add_error(
        e.pos,
        DiagnosticKind::BadInvariant(format!("'{e}' is not a conjunction of constraints")),
    );
    false
}

fn conjunction(mut atoms: Vec<Expression>) -> Option<Expression> {
    let first = if atoms.is_empty() {
        return None;
    } else {
        atoms.remove(0)
    };
    Some(atoms.into_iter().fold(first, |acc, e| {
        let pos = acc.pos.merge(e.pos);
        let mut node = Expression::binary(BinaryOp::And, acc, e, pos);
        node.ty = zeno_ir::types::Type::bool_();
        node
    }))
}

pub(crate) fn check_location(doc: &mut Document, tpl: TemplateId, loc: usize) {
    let frame = doc.templates[tpl].decls.frame;
    let uid = doc.templates[tpl].locations[loc].uid;
    let urgent = doc.symbols.type_of(uid).has(Qualifier::Urgent);
    let pos = doc.symbols.symbol(uid).pos;

    if let Some(mut inv) = doc.templates[tpl].locations[loc].invariant.take() {
        if exprs::check(doc, frame, &mut inv, Ctx::Invariant) {
            if urgent {
                doc.add_error(
                    pos,
                    DiagnosticKind::BadInvariant(
                        "urgent locations cannot have invariants".into(),
                    ),
                );
            }
            let mut atoms = Vec::new();
            let mut strict = false;
            if split_invariant(doc, inv.clone(), &mut atoms, &mut strict) {
                if strict {
                    doc.has_strict_invariants = true;
                }
                let mut rates = Vec::new();
                let mut kept = Vec::new();
                for atom in atoms {
                    match atom {
                        InvariantAtom::Keep(e) => kept.push(e),
                        InvariantAtom::Rate(r) => rates.push(r),
                    }
                }
                if rates.is_empty() {
                    doc.templates[tpl].locations[loc].invariant = Some(inv);
                } else {
                    for r in &rates {
                        let zero = ConstEvaluator::new(doc)
                            .eval(&r.expr)
                            .and_then(|v| v.as_int())
                            == Some(0);
                        if zero {
                            doc.stops_clock = true;
                        }
                    }
                    doc.templates[tpl].locations[loc].invariant = conjunction(kept);
                    doc.templates[tpl].locations[loc].rates = rates;
                }
            } else {
                doc.templates[tpl].locations[loc].invariant = Some(inv);
            }
        } else {
            doc.templates[tpl].locations[loc].invariant = Some(inv);
        }
    }

    if let Some(mut er) = doc.templates[tpl].locations[loc].exp_rate.take() {
        if exprs::check(doc, frame, &mut er, Ctx::General) && !er.ty.is_arithmetic() {
            doc.add_error(
                er.pos,
                DiagnosticKind::BadRate(format!(
                    "exponential rate has type '{}'",
                    er.ty
                )),
            );
        }
        doc.templates[tpl].locations[loc].exp_rate = Some(er);
    }

    if let Some(mut cr) = doc.templates[tpl].locations[loc].cost_rate.take() {
        if exprs::check(doc, frame, &mut cr, Ctx::General) && !cr.ty.is_arithmetic() {
            doc.add_error(
                cr.pos,
                DiagnosticKind::BadRate(format!("cost rate has type '{}'", cr.ty)),
            );
        }
        doc.templates[tpl].locations[loc].cost_rate = Some(cr);
    }
}

// -----------------------------------------------------------------
// Edges
// -----------------------------------------------------------------

pub(crate) fn check_edge(doc: &mut Document, tpl: TemplateId, edge: usize) {
    let decl_frame = doc.templates[tpl].decls.frame;
    let frame = doc.templates[tpl].edges[edge].select.unwrap_or(decl_frame);

    enumerate_select(doc, tpl, edge);

    let src_urgent = match doc.templates[tpl].edges[edge].src {
        EdgeEnd::Location(i) => {
            let uid = doc.templates[tpl].locations[i].uid;
            doc.symbols.type_of(uid).has(Qualifier::Urgent)
        }
        EdgeEnd::Branchpoint(_) => false,
    };
    if src_urgent {
        doc.has_urgent_transition = true;
    }

    let mut info = GuardInfo::default();
    if let Some(mut guard) = doc.templates[tpl].edges[edge].guard.take() {
        if exprs::check(doc, frame, &mut guard, Ctx::Guard) {
            if !guard.ty.is_integral() {
                doc.add_error(
                    guard.pos,
                    DiagnosticKind::BadGuard(format!("guard has type '{}'", guard.ty)),
                );
            } else if stmts::has_side_effects(doc, &guard) {
                doc.add_error(
                    guard.pos,
                    DiagnosticKind::BadGuard("guards must be free of side effects".into()),
                );
            } else {
                info = analyze_guard(&guard);
                if info.has_strict_lower_bound && doc.templates[tpl].edges[edge].controllable {
                    doc.has_strict_lower_bound_on_controllable_edges = true;
                }
            }
        }
        doc.templates[tpl].edges[edge].guard = Some(guard);
    }

    if let Some(mut sync) = doc.templates[tpl].edges[edge].sync.take() {
        if exprs::check(doc, frame, &mut sync, Ctx::General) {
            if let ExprKind::Sync(kind) = &sync.kind {
                let chan_ty = sync.sub[0].ty.clone();
                let urgent_chan = chan_ty.has(Qualifier::Urgent);
                let broadcast = chan_ty.has(Qualifier::Broadcast);
                if urgent_chan {
                    doc.has_urgent_transition = true;
                    if info.has_clock {
                        doc.add_error(
                            sync.pos,
                            DiagnosticKind::BadGuard(
                                "clock guards are not allowed on urgent synchronisations"
                                    .into(),
                            ),
                        );
                    }
                }
                if broadcast {
                    doc.sync_used = 2;
                    if *kind == SyncKind::Recv && info.has_clock {
                        doc.has_guard_on_recv_broadcast = true;
                    }
                } else {
                    doc.sync_used = 1;
                }
            } else {
                doc.add_error(
                    sync.pos,
                    DiagnosticKind::BadSync(format!("'{sync}' is not a synchronisation")),
                );
            }
        }
        doc.templates[tpl].edges[edge].sync = Some(sync);
    }

    if let Some(mut assign) = doc.templates[tpl].edges[edge].assign.take() {
        if exprs::check(doc, frame, &mut assign, Ctx::General) {
            warn_effect_free_pieces(doc, &assign);
        }
        doc.templates[tpl].edges[edge].assign = Some(assign);
    }

    if let Some(mut prob) = doc.templates[tpl].edges[edge].prob.take() {
        if exprs::check(doc, frame, &mut prob, Ctx::Probability) {
            if !prob.ty.is_arithmetic() {
                doc.add_error(
                    prob.pos,
                    DiagnosticKind::BadProbability(format!(
                        "probability has type '{}'",
                        prob.ty
                    )),
                );
            } else if stmts::has_side_effects(doc, &prob) {
                doc.add_error(
                    prob.pos,
                    DiagnosticKind::BadProbability(
                        "probability weights must be free of side effects".into(),
                    ),
                );
            } else if let Some(v) = ConstEvaluator::new(doc).eval(&prob) {
                let negative = match v {
                    Value::Int(n) => n < 0,
                    Value::Double(d) => d < 0.0,
                    Value::Bool(_) => false,
                };
                if negative {
                    doc.add_error(
                        prob.pos,
                        DiagnosticKind::BadProbability(
                            "probability weights must be non-negative".into(),
                        ),
                    );
                }
            }
        }
        doc.templates[tpl].edges[edge].prob = Some(prob);
    }
}

/// Every comma-separated piece of an assignment label should do something.
fn warn_effect_free_pieces(doc: &mut Document, e: &Expression) {
    if let ExprKind::Comma = e.kind {
        warn_effect_free_pieces(doc, &e.sub[0]);
        warn_effect_free_pieces(doc, &e.sub[1]);
        return;
    }
    if !matches!(e.kind, ExprKind::Assign(_) | ExprKind::Call) {
        doc.add_warning(
            e.pos,
            DiagnosticKind::BadAssignment(format!("'{e}' has no effect")),
        );
    }
}

fn enumerate_select(doc: &mut Document, tpl: TemplateId, edge: usize) {
    doc.templates[tpl].edges[edge].select_values.clear();
    let Some(select) = doc.templates[tpl].edges[edge].select else {
        return;
    };
    let binders: Vec<_> = doc.symbols.frame_symbols(select).to_vec();
    let mut values = Vec::with_capacity(binders.len());
    let mut defects: Vec<(Position, String)> = Vec::new();
    for sym in binders {
        let ty = doc.symbols.type_of(sym).clone();
        let pos = doc.symbols.symbol(sym).pos;
        match ConstEvaluator::new(doc).domain_size(&ty) {
            Some(n) => values.push(n),
            None => defects.push((
                pos,
                format!(
                    "select binder '{}' has no enumerable domain",
                    doc.symbols.name(sym)
                ),
            )),
        }
    }
    for (pos, msg) in defects {
        doc.add_error(pos, DiagnosticKind::BadSelect(msg));
    }
    doc.templates[tpl].edges[edge].select_values = values;
}
