//! Property tests over generated declarations.

mod common;

use common::P;
use proptest::prelude::*;
use zeno_check::check_document;
use zeno_ir::builder::{Builder, ScopeRef};
use zeno_ir::document::Document;
use zeno_ir::proptest_generators::arb_type;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Checking a document of generated well-formed declarations never
    /// errors, and checking twice leaves errors, warnings, and symbol
    /// types exactly where the first pass put them.
    #[test]
    fn generated_declarations_check_cleanly_and_stably(
        tys in proptest::collection::vec(arb_type(), 1..8)
    ) {
        let mut doc = Document::new();
        for (i, ty) in tys.iter().enumerate() {
            // constants need initialisers, so declare only mutable shapes
            let ty = ty.stripped();
            if ty.is_constant() {
                continue;
            }
            doc.add_variable(ScopeRef::Global, ty, &format!("v{i}"), None, P).unwrap();
        }
        prop_assert!(check_document(&mut doc));
        let errors = doc.errors().len();
        let warnings = doc.warnings().len();
        let types: Vec<String> = doc
            .variables
            .iter()
            .map(|v| doc.symbols.type_of(v.uid).to_string())
            .collect();

        prop_assert!(check_document(&mut doc));
        prop_assert_eq!(doc.errors().len(), errors);
        prop_assert_eq!(doc.warnings().len(), warnings);
        let types_after: Vec<String> = doc
            .variables
            .iter()
            .map(|v| doc.symbols.type_of(v.uid).to_string())
            .collect();
        prop_assert_eq!(types, types_after);
    }

    /// Interning is stable across arbitrary insertion sequences.
    #[test]
    fn string_table_indices_are_stable(names in proptest::collection::vec("[a-z]{1,6}", 1..32)) {
        let mut doc = Document::new();
        let first: Vec<usize> = names
            .iter()
            .map(|n| doc.strings.add_string_if_new(n.clone()))
            .collect();
        let second: Vec<usize> = names
            .iter()
            .map(|n| doc.strings.add_string_if_new(n.clone()))
            .collect();
        prop_assert_eq!(first, second);
        prop_assert!(doc.strings.len() <= names.len());
    }
}
