//! Symbol-aware constant evaluation.
//!
//! The literal folder in `zeno-ir` knows nothing about declarations; this
//! evaluator additionally chases `const`-qualified variables' initializers,
//! which is what array sizes, range bounds, select domains, and rate
//! expressions need.

use indexmap::IndexSet;

use zeno_ir::document::Document;
use zeno_ir::expression::{Expression, Value};
use zeno_ir::symbol::{DeclRef, SymbolId};
use zeno_ir::types::Type;

pub(crate) struct ConstEvaluator<'a> {
    doc: &'a Document,
}

impl<'a> ConstEvaluator<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    pub fn eval(&self, expr: &Expression) -> Option<Value> {
        let mut active = IndexSet::new();
        self.eval_guarded(expr, &mut active)
    }

    fn eval_guarded(&self, expr: &Expression, active: &mut IndexSet<SymbolId>) -> Option<Value> {
        expr.eval_with(&mut |sym| self.symbol_value(sym, active))
    }

    fn symbol_value(&self, sym: SymbolId, active: &mut IndexSet<SymbolId>) -> Option<Value> {
        if !self.doc.symbols.type_of(sym).is_constant() {
            return None;
        }
        let DeclRef::Variable(v) = self.doc.symbols.decl_of(sym) else {
            return None;
        };
        let init = self.doc.variables[v].init.as_ref()?;
        // Self-referential initializers must not recurse forever.
        if !active.insert(sym) {
            return None;
        }
        let result = self.eval_guarded(init, active);
        active.shift_remove(&sym);
        result
    }

    pub fn eval_int(&self, expr: &Expression) -> Option<i64> {
        self.eval(expr).and_then(|v| v.as_int())
    }

    /// The `[lo, hi]` bounds of a bounded integral or scalar type.
    pub fn bounds_of(&self, ty: &Type) -> Option<(i64, i64)> {
        if let Some((lo, hi)) = ty.range_bounds() {
            return Some((self.eval_int(lo)?, self.eval_int(hi)?));
        }
        if let Some(size) = ty.scalar_size() {
            return Some((0, self.eval_int(size)? - 1));
        }
        None
    }

    /// Domain size of a select binder's type.
    pub fn domain_size(&self, ty: &Type) -> Option<i64> {
        let (lo, hi) = self.bounds_of(ty)?;
        (hi >= lo).then_some(hi - lo + 1)
    }
}
