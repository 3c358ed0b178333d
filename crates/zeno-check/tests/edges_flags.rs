//! Global flag derivation: broadcast receiver guards, stopwatches, urgency,
//! priorities, and the supported-methods toggles.

mod common;

use common::*;
use zeno_check::check_document;
use zeno_ir::builder::{Builder, ScopeRef};
use zeno_ir::diagnostic::DiagnosticKind;
use zeno_ir::document::{Document, EdgeEnd, PrioritySep};
use zeno_ir::expression::{BinaryOp, Expression, UnaryOp};
use zeno_ir::types::Type;

#[test]
fn broadcast_receiver_with_clock_guard() {
    let mut doc = Document::new();
    global_clock(&mut doc, "t");
    global_chan(&mut doc, "c", true, false);
    let (tpl, e) = bare_template(&mut doc, "R");
    doc.add_guard(tpl, e, gt(ident("t"), int(0))).unwrap();
    doc.add_sync(tpl, e, recv("c")).unwrap();
    system(&mut doc, tpl, "r");

    assert!(check_document(&mut doc), "{:?}", doc.errors());
    assert!(doc.has_guard_on_recv_broadcast);
    assert_eq!(doc.sync_used, 2);
}

#[test]
fn broadcast_sender_does_not_set_the_flag() {
    let mut doc = Document::new();
    global_clock(&mut doc, "t");
    global_chan(&mut doc, "c", true, false);
    let (tpl, e) = bare_template(&mut doc, "S");
    doc.add_guard(tpl, e, gt(ident("t"), int(0))).unwrap();
    doc.add_sync(tpl, e, send("c")).unwrap();
    system(&mut doc, tpl, "s");

    check_document(&mut doc);
    assert!(!doc.has_guard_on_recv_broadcast);
}

#[test]
fn stopwatch_invariant_extracts_a_zero_rate() {
    let mut doc = Document::new();
    global_clock(&mut doc, "x");
    let params = doc.fresh_frame(Some(doc.global_frame()));
    let t = doc.add_template("W", params, P, true, "", "").unwrap();
    // invariant x' == 0
    let inv = Expression::binary(
        BinaryOp::Eq,
        Expression::unary(UnaryOp::Rate, ident("x"), P),
        int(0),
        P,
    );
    let l0 = doc
        .add_location(t, "L0", false, false, Some(inv), None, P)
        .unwrap();
    doc.set_init(t, l0).unwrap();
    system(&mut doc, t, "w");

    assert!(check_document(&mut doc), "{:?}", doc.errors());
    assert!(doc.stops_clock);
    let loc = &doc.templates[t].locations[l0];
    assert_eq!(loc.rates.len(), 1);
    // the rate equation is no longer part of the invariant
    assert!(loc.invariant.is_none());
    // stopwatches rule out exact symbolic analysis
    assert!(!doc.supported_methods.symbolic);
    assert!(doc.supported_methods.stochastic);
}

#[test]
fn strict_invariant_sets_flag_and_clears_stochastic() {
    let mut doc = Document::new();
    global_clock(&mut doc, "x");
    let params = doc.fresh_frame(Some(doc.global_frame()));
    let t = doc.add_template("T", params, P, true, "", "").unwrap();
    let inv = Expression::binary(BinaryOp::Lt, ident("x"), int(5), P);
    let l0 = doc
        .add_location(t, "L0", false, false, Some(inv), None, P)
        .unwrap();
    doc.set_init(t, l0).unwrap();
    system(&mut doc, t, "t");

    assert!(check_document(&mut doc), "{:?}", doc.errors());
    assert!(doc.has_strict_invariants);
    assert!(!doc.supported_methods.stochastic);
    assert!(doc.supported_methods.symbolic);
}

#[test]
fn lower_bound_invariant_is_rejected() {
    let mut doc = Document::new();
    global_clock(&mut doc, "x");
    let params = doc.fresh_frame(Some(doc.global_frame()));
    let t = doc.add_template("T", params, P, true, "", "").unwrap();
    let inv = Expression::binary(BinaryOp::Gt, ident("x"), int(5), P);
    let l0 = doc
        .add_location(t, "L0", false, false, Some(inv), None, P)
        .unwrap();
    doc.set_init(t, l0).unwrap();
    system(&mut doc, t, "t");

    assert!(!check_document(&mut doc));
    assert!(doc
        .errors()
        .iter()
        .any(|e| matches!(e.kind, DiagnosticKind::BadInvariant(_))));
}

#[test]
fn urgent_channel_and_urgent_location_set_urgency() {
    let mut doc = Document::new();
    global_chan(&mut doc, "u", false, true);
    let (tpl, e) = bare_template(&mut doc, "T");
    doc.add_sync(tpl, e, send("u")).unwrap();
    system(&mut doc, tpl, "t");
    check_document(&mut doc);
    assert!(doc.has_urgent_transition);

    // urgent source location, no sync at all
    let mut doc2 = Document::new();
    let params = doc2.fresh_frame(Some(doc2.global_frame()));
    let t = doc2.add_template("U", params, P, true, "", "").unwrap();
    let l0 = doc2
        .add_location(t, "L0", true, false, None, None, P)
        .unwrap();
    let l1 = doc2
        .add_location(t, "L1", false, false, None, None, P)
        .unwrap();
    doc2.set_init(t, l0).unwrap();
    doc2.add_edge(t, EdgeEnd::Location(l0), EdgeEnd::Location(l1), false, "", P)
        .unwrap();
    system(&mut doc2, t, "u");
    check_document(&mut doc2);
    assert!(doc2.has_urgent_transition);
}

#[test]
fn clock_guard_on_urgent_sync_is_rejected() {
    let mut doc = Document::new();
    global_clock(&mut doc, "x");
    global_chan(&mut doc, "u", false, true);
    let (tpl, e) = bare_template(&mut doc, "T");
    doc.add_guard(tpl, e, gt(ident("x"), int(1))).unwrap();
    doc.add_sync(tpl, e, send("u")).unwrap();
    system(&mut doc, tpl, "t");
    assert!(!check_document(&mut doc));
    assert!(doc
        .errors()
        .iter()
        .any(|e| matches!(e.kind, DiagnosticKind::BadGuard(_))));
}

#[test]
fn urgent_location_with_invariant_is_rejected() {
    let mut doc = Document::new();
    global_clock(&mut doc, "x");
    let params = doc.fresh_frame(Some(doc.global_frame()));
    let t = doc.add_template("T", params, P, true, "", "").unwrap();
    let inv = Expression::binary(BinaryOp::Le, ident("x"), int(2), P);
    let l0 = doc
        .add_location(t, "L0", true, false, Some(inv), None, P)
        .unwrap();
    doc.set_init(t, l0).unwrap();
    system(&mut doc, t, "t");
    assert!(!check_document(&mut doc));
}

#[test]
fn chan_priorities_demand_channels_and_clear_stochastic() {
    let mut doc = Document::new();
    global_chan(&mut doc, "a", false, false);
    global_chan(&mut doc, "b", false, false);
    doc.add_variable(ScopeRef::Global, Type::int(), "n", None, P)
        .unwrap();
    let (tpl, _) = bare_template(&mut doc, "T");
    system(&mut doc, tpl, "t");

    doc.begin_chan_priority(ident("a"));
    doc.add_chan_priority(PrioritySep::Strict, ident("b")).unwrap();
    doc.add_chan_priority(PrioritySep::Tie, ident("n")).unwrap();

    assert!(!check_document(&mut doc));
    assert!(doc
        .errors()
        .iter()
        .any(|e| matches!(e.kind, DiagnosticKind::BadPriorityList(_))));
    assert!(!doc.supported_methods.stochastic);
    assert!(doc.has_priority_declaration());
}

#[test]
fn proc_priority_must_name_a_process() {
    let mut doc = Document::new();
    let (tpl, _) = bare_template(&mut doc, "T");
    system(&mut doc, tpl, "t");
    doc.set_proc_priority("t", 1);
    doc.set_proc_priority("ghost", 2);
    assert!(!check_document(&mut doc));
    assert!(doc
        .errors()
        .iter()
        .any(|e| matches!(e.kind, DiagnosticKind::NoSuchProcess(ref n) if n == "ghost")));
}

#[test]
fn select_domains_are_enumerated() {
    let mut doc = Document::new();
    let (tpl, e) = bare_template(&mut doc, "T");
    let select = doc.fresh_frame(Some(doc.templates[tpl].decls.frame));
    doc.add_parameter(
        select,
        Type::range(Type::int(), int(0), int(3)),
        "i",
        P,
    )
    .unwrap();
    doc.add_parameter(
        select,
        Type::range(Type::int(), int(1), int(2)),
        "j",
        P,
    )
    .unwrap();
    doc.add_select(tpl, e, select).unwrap();
    doc.add_guard(
        tpl,
        e,
        gt(ident("i"), ident("j")),
    )
    .unwrap();
    system(&mut doc, tpl, "t");
    assert!(check_document(&mut doc), "{:?}", doc.errors());
    assert_eq!(doc.templates[tpl].edges[e].select_values, vec![4, 2]);
}

#[test]
fn dynamic_templates_restrict_parameters_and_methods() {
    let mut doc = Document::new();
    let params = doc.fresh_frame(Some(doc.global_frame()));
    doc.add_parameter(params, Type::int(), "id", P).unwrap();
    let t = doc.add_dynamic_template("Spawned", params, P).unwrap();
    let l0 = doc
        .add_location(t, "L0", false, false, None, None, P)
        .unwrap();
    doc.set_init(t, l0).unwrap();
    assert!(check_document(&mut doc), "{:?}", doc.errors());
    assert!(!doc.supported_methods.symbolic);
    assert!(!doc.supported_methods.concrete);
    assert!(doc.supported_methods.stochastic);

    // clock parameters are not allowed on dynamic templates
    let mut doc2 = Document::new();
    let params2 = doc2.fresh_frame(Some(doc2.global_frame()));
    doc2.add_parameter(params2, Type::clock(), "x", P).unwrap();
    let t2 = doc2.add_dynamic_template("Bad", params2, P).unwrap();
    let l0 = doc2
        .add_location(t2, "L0", false, false, None, None, P)
        .unwrap();
    doc2.set_init(t2, l0).unwrap();
    assert!(!check_document(&mut doc2));
    assert!(matches!(
        doc2.errors()[0].kind,
        DiagnosticKind::InvalidType(_)
    ));
}

#[test]
fn guards_must_be_side_effect_free() {
    let mut doc = Document::new();
    doc.add_variable(ScopeRef::Global, Type::int(), "n", None, P)
        .unwrap();
    let (tpl, e) = bare_template(&mut doc, "T");
    doc.add_guard(
        tpl,
        e,
        Expression::assign(
            zeno_ir::expression::AssignOp::Assign,
            ident("n"),
            int(1),
            P,
        ),
    )
    .unwrap();
    system(&mut doc, tpl, "t");
    assert!(!check_document(&mut doc));
    assert!(doc
        .errors()
        .iter()
        .any(|e| matches!(e.kind, DiagnosticKind::BadGuard(_))));
}
