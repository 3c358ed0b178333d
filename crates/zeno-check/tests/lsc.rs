//! LSC scenarios: simregions, prechart cuts, and chart consistency.

mod common;

use common::*;
use zeno_check::{check_document, cut_in_prechart, cut_is_consistent};
use zeno_ir::builder::Builder;
use zeno_ir::diagnostic::DiagnosticKind;
use zeno_ir::document::{Cut, Document, Simregion};
use zeno_ir::symbol::TemplateId;

/// An LSC chart over two instance lines with three messages:
/// m1@y=1 (prechart), m2@y=2 (prechart), m3@y=3 (main chart).
fn chart() -> (Document, TemplateId) {
    let mut doc = Document::new();
    // a trivial TA template backing the LSC instances
    let (backing, _) = bare_template(&mut doc, "B");
    let backing_uid = doc.templates[backing].uid;
    let i0 = doc.add_lsc_instance("i0", backing_uid, vec![], P).unwrap();
    let i1 = doc.add_lsc_instance("i1", backing_uid, vec![], P).unwrap();

    let params = doc.fresh_frame(Some(doc.global_frame()));
    let t = doc
        .add_template("Chart", params, P, false, "LSC", "invariant")
        .unwrap();
    let l0 = doc.add_instance_line(t, i0).unwrap();
    let l1 = doc.add_instance_line(t, i1).unwrap();
    doc.add_message(t, l0, l1, 1, None, true, P).unwrap();
    doc.add_message(t, l1, l0, 2, None, true, P).unwrap();
    doc.add_message(t, l0, l1, 3, None, false, P).unwrap();
    (doc, t)
}

fn region_of_message(doc: &Document, tpl: TemplateId, msg: usize) -> Simregion {
    doc.templates[tpl]
        .simregions()
        .into_iter()
        .find(|r| r.message == Some(msg))
        .unwrap()
}

#[test]
fn prechart_cut_membership() {
    let (mut doc, t) = chart();
    assert!(check_document(&mut doc), "{:?}", doc.errors());
    assert!(doc.templates[t].has_prechart);

    let r1 = region_of_message(&doc, t, 0);
    let r2 = region_of_message(&doc, t, 1);
    let r3 = region_of_message(&doc, t, 2);

    let mut pre = Cut::new(0);
    pre.add(r1);
    pre.add(r2.clone());
    assert!(cut_in_prechart(&doc.templates[t], &pre));

    let mut crossing = Cut::new(1);
    crossing.add(r2);
    crossing.add(r3);
    assert!(!cut_in_prechart(&doc.templates[t], &crossing));
}

#[test]
fn cuts_must_be_antichains() {
    let (mut doc, t) = chart();
    check_document(&mut doc);
    let r1 = region_of_message(&doc, t, 0);
    let r2 = region_of_message(&doc, t, 1);

    // m1 precedes m2 on shared instance lines, so together they are
    // not a consistent horizontal slice.
    let mut stacked = Cut::new(0);
    stacked.add(r1.clone());
    stacked.add(r2);
    assert!(!cut_is_consistent(&doc.templates[t], &stacked));

    let mut single = Cut::new(1);
    single.add(r1);
    assert!(cut_is_consistent(&doc.templates[t], &single));
}

#[test]
fn simregions_group_message_condition_update() {
    let (mut doc, t) = chart();
    // a condition and an update in the same logical step as m1
    doc.add_condition(t, vec![1], 1, None, true, false, P).unwrap();
    doc.add_update(t, 0, 1, None, true, P).unwrap();
    assert!(check_document(&mut doc), "{:?}", doc.errors());

    let regions = doc.templates[t].simregions();
    assert_eq!(regions.len(), 3);
    let first = &regions[0];
    assert_eq!(first.message, Some(0));
    assert_eq!(first.condition, Some(0));
    assert_eq!(first.update, Some(0));
}

#[test]
fn straddling_simregion_is_inconsistent() {
    let (mut doc, t) = chart();
    // update shares m3's step but claims to be in the prechart
    doc.add_update(t, 0, 3, None, true, P).unwrap();
    assert!(!check_document(&mut doc));
    assert!(doc
        .errors()
        .iter()
        .any(|e| matches!(e.kind, DiagnosticKind::InconsistentLsc(_))));
}

#[test]
fn lone_update_forms_its_own_region() {
    let (mut doc, t) = chart();
    doc.add_update(t, 1, 7, None, false, P).unwrap();
    check_document(&mut doc);
    let regions = doc.templates[t].simregions();
    let lone = regions
        .iter()
        .find(|r| r.update == Some(0))
        .unwrap();
    assert!(lone.message.is_none());
    assert!(lone.condition.is_none());
    assert_eq!(doc.templates[t].simregion_y(lone), Some(7));
}

#[test]
fn condition_labels_are_boolean_guards() {
    let (mut doc, t) = chart();
    let label = zeno_ir::Expression::double(0.5, P);
    doc.add_condition(t, vec![0], 1, Some(label), true, true, P)
        .unwrap();
    assert!(!check_document(&mut doc));
    assert!(doc
        .errors()
        .iter()
        .any(|e| matches!(e.kind, DiagnosticKind::BadGuard(_))));
}
