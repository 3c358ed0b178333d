//! Shared builders for the end-to-end checker tests.
#![allow(dead_code)]

use zeno_ir::builder::{Builder, ScopeRef};
use zeno_ir::document::{Document, EdgeEnd};
use zeno_ir::expression::{BinaryOp, Expression, SyncKind};
use zeno_ir::position::Position;
use zeno_ir::symbol::TemplateId;
use zeno_ir::types::{Qualifier, Type};

pub const P: Position = Position::UNKNOWN;

pub fn ident(name: &str) -> Expression {
    Expression::ident(name, P)
}

pub fn int(n: i64) -> Expression {
    Expression::int(n, P)
}

pub fn gt(l: Expression, r: Expression) -> Expression {
    Expression::binary(BinaryOp::Gt, l, r, P)
}

pub fn send(chan: &str) -> Expression {
    Expression::sync(SyncKind::Send, ident(chan), P)
}

pub fn recv(chan: &str) -> Expression {
    Expression::sync(SyncKind::Recv, ident(chan), P)
}

/// One template `P` with locations `L0, L1`, an edge `L0 -> L1` with guard
/// `x > 1` and sync `c!`, a global clock `x`, and a global channel `c`;
/// instantiated as `p = P(); system p;`.
pub fn minimal_ta() -> Document {
    let mut doc = Document::new();
    doc.add_variable(ScopeRef::Global, Type::clock(), "x", None, P)
        .unwrap();
    doc.add_variable(ScopeRef::Global, Type::channel(), "c", None, P)
        .unwrap();
    let params = doc.fresh_frame(Some(doc.global_frame()));
    let t = doc.add_template("P", params, P, true, "", "").unwrap();
    let l0 = doc
        .add_location(t, "L0", false, false, None, None, P)
        .unwrap();
    let l1 = doc
        .add_location(t, "L1", false, false, None, None, P)
        .unwrap();
    doc.set_init(t, l0).unwrap();
    let e = doc
        .add_edge(t, EdgeEnd::Location(l0), EdgeEnd::Location(l1), true, "", P)
        .unwrap();
    doc.add_guard(t, e, gt(ident("x"), int(1))).unwrap();
    doc.add_sync(t, e, send("c")).unwrap();

    let tpl_uid = doc.templates[t].uid;
    let inst = doc.add_instance("p", tpl_uid, vec![], P).unwrap();
    let inst_uid = doc.instances[inst].uid;
    doc.add_process(inst_uid, P).unwrap();
    doc
}

/// A template with two locations and one edge, returning the template id
/// and the edge index for further decoration.
pub fn bare_template(doc: &mut Document, name: &str) -> (TemplateId, usize) {
    let params = doc.fresh_frame(Some(doc.global_frame()));
    let t = doc.add_template(name, params, P, true, "", "").unwrap();
    let l0 = doc
        .add_location(t, "L0", false, false, None, None, P)
        .unwrap();
    let l1 = doc
        .add_location(t, "L1", false, false, None, None, P)
        .unwrap();
    doc.set_init(t, l0).unwrap();
    let e = doc
        .add_edge(t, EdgeEnd::Location(l0), EdgeEnd::Location(l1), false, "", P)
        .unwrap();
    (t, e)
}

pub fn system(doc: &mut Document, tpl: TemplateId, name: &str) {
    let uid = doc.templates[tpl].uid;
    let inst = doc.add_instance(name, uid, vec![], P).unwrap();
    let inst_uid = doc.instances[inst].uid;
    doc.add_process(inst_uid, P).unwrap();
}

pub fn global_clock(doc: &mut Document, name: &str) {
    doc.add_variable(ScopeRef::Global, Type::clock(), name, None, P)
        .unwrap();
}

pub fn global_chan(doc: &mut Document, name: &str, broadcast: bool, urgent: bool) {
    let mut ty = Type::channel();
    if broadcast {
        ty = ty.prefixed(Qualifier::Broadcast);
    }
    if urgent {
        ty = ty.prefixed(Qualifier::Urgent);
    }
    doc.add_variable(ScopeRef::Global, ty, name, None, P).unwrap();
}
