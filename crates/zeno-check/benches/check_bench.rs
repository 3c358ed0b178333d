use criterion::{black_box, criterion_group, criterion_main, Criterion};

use zeno_ir::builder::{Builder, ScopeRef};
use zeno_ir::document::{Document, EdgeEnd};
use zeno_ir::expression::{BinaryOp, Expression, SyncKind};
use zeno_ir::position::Position;
use zeno_ir::types::Type;

const P: Position = Position::UNKNOWN;

/// A chain automaton with `n` locations, clock guards, and syncs.
fn build_chain(n: usize) -> Document {
    let mut doc = Document::new();
    doc.add_variable(ScopeRef::Global, Type::clock(), "x", None, P)
        .unwrap();
    doc.add_variable(ScopeRef::Global, Type::channel(), "c", None, P)
        .unwrap();
    let params = doc.fresh_frame(Some(doc.global_frame()));
    let t = doc.add_template("Chain", params, P, true, "", "").unwrap();
    for i in 0..n {
        doc.add_location(t, &format!("L{i}"), false, false, None, None, P)
            .unwrap();
    }
    doc.set_init(t, 0).unwrap();
    for i in 0..n - 1 {
        let e = doc
            .add_edge(
                t,
                EdgeEnd::Location(i),
                EdgeEnd::Location(i + 1),
                true,
                "",
                P,
            )
            .unwrap();
        doc.add_guard(
            t,
            e,
            Expression::binary(
                BinaryOp::Gt,
                Expression::ident("x", P),
                Expression::int(i as i64, P),
                P,
            ),
        )
        .unwrap();
        doc.add_sync(
            t,
            e,
            Expression::sync(SyncKind::Send, Expression::ident("c", P), P),
        )
        .unwrap();
    }
    let uid = doc.templates[t].uid;
    let inst = doc.add_instance("chain", uid, vec![], P).unwrap();
    let inst_uid = doc.instances[inst].uid;
    doc.add_process(inst_uid, P).unwrap();
    doc
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_chain_100", |b| b.iter(|| build_chain(black_box(100))));
}

fn bench_check(c: &mut Criterion) {
    c.bench_function("check_chain_100", |b| {
        b.iter_batched(
            || build_chain(100),
            |mut doc| {
                zeno_check::check_document(&mut doc);
                doc
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_build, bench_check);
criterion_main!(benches);
