//! Query validation: recognized options and strategy declarations.
//!
//! The formula itself belongs to the query grammar of the front-end and is
//! kept verbatim; only its strategy usage is recognized at the token level.

use indexmap::IndexSet;

use zeno_ir::diagnostic::DiagnosticKind;
use zeno_ir::document::Document;
use zeno_ir::position::Position;

/// Options with a defined meaning; anything else is passed through to the
/// backend untouched.
pub const RECOGNIZED_OPTIONS: &[&str] = &[
    "--diagnostic",
    "--track-resources",
    "--learning-runs",
    "--discretization",
];

pub(crate) fn check_query(
    doc: &mut Document,
    idx: usize,
    declared_strategies: &mut IndexSet<String>,
) {
    let query = doc.queries[idx].clone();
    if query.formula.trim().is_empty() {
        doc.add_error(
            Position::UNKNOWN,
            DiagnosticKind::BadQuery("empty formula".into()),
        );
        return;
    }
    for opt in &query.options {
        if opt.name.starts_with("--") && !RECOGNIZED_OPTIONS.contains(&opt.name.as_str()) {
            doc.add_warning(
                Position::UNKNOWN,
                DiagnosticKind::BadQuery(format!("unrecognized option '{}'", opt.name)),
            );
        }
    }

    let tokens: Vec<&str> = query.formula.split_whitespace().collect();
    if tokens.first() == Some(&"strategy") {
        if let Some(name) = tokens.get(1) {
            declared_strategies.insert((*name).to_string());
        } else {
            doc.add_error(
                Position::UNKNOWN,
                DiagnosticKind::BadQuery("strategy declaration without a name".into()),
            );
        }
    }
    for pair in tokens.windows(2) {
        if pair[0] == "under" && !declared_strategies.contains(pair[1]) {
            doc.add_error(
                Position::UNKNOWN,
                DiagnosticKind::StrategyNotDeclared(pair[1].to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeno_ir::builder::Builder;
    use zeno_ir::document::{ModelOption, Query};

    fn query(formula: &str) -> Query {
        Query {
            formula: formula.into(),
            ..Query::default()
        }
    }

    #[test]
    fn strategies_must_be_declared_before_use() {
        let mut doc = Document::new();
        doc.add_query(query("strategy Safe = control: A[] not bad"));
        doc.add_query(query("A<> goal under Safe"));
        doc.add_query(query("A<> goal under Missing"));
        let mut declared = IndexSet::new();
        for i in 0..doc.queries.len() {
            check_query(&mut doc, i, &mut declared);
        }
        assert_eq!(doc.errors().len(), 1);
        assert!(matches!(
            doc.errors()[0].kind,
            DiagnosticKind::StrategyNotDeclared(_)
        ));
    }

    #[test]
    fn unknown_dashed_options_warn_but_pass_through() {
        let mut doc = Document::new();
        let mut q = query("A[] true");
        q.options.push(ModelOption {
            name: "--diagnostic".into(),
            value: "2".into(),
        });
        q.options.push(ModelOption {
            name: "--frobnicate".into(),
            value: "on".into(),
        });
        doc.add_query(q);
        let mut declared = IndexSet::new();
        check_query(&mut doc, 0, &mut declared);
        assert!(doc.errors().is_empty());
        assert_eq!(doc.warnings().len(), 1);
        // preserved verbatim
        assert_eq!(doc.queries[0].options.len(), 2);
    }

    #[test]
    fn empty_formula_is_an_error() {
        let mut doc = Document::new();
        doc.add_query(query("  "));
        let mut declared = IndexSet::new();
        check_query(&mut doc, 0, &mut declared);
        assert_eq!(doc.errors().len(), 1);
    }
}
