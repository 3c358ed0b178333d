//! LSC checking: message/condition/update labels, simregion consistency,
//! and the cut relations used by downstream chart translation.

use zeno_ir::diagnostic::DiagnosticKind;
use zeno_ir::document::{Cut, Document, Simregion, Template};
use zeno_ir::expression::ExprKind;
use zeno_ir::symbol::TemplateId;

use crate::exprs::{self, Ctx};
use crate::stmts;

pub(crate) fn check_message(doc: &mut Document, tpl: TemplateId, idx: usize) {
    let frame = doc.templates[tpl].decls.frame;
    if let Some(mut label) = doc.templates[tpl].messages[idx].label.take() {
        if exprs::check(doc, frame, &mut label, Ctx::General) {
            let is_sync = matches!(label.kind, ExprKind::Sync(_));
            if !is_sync && !label.ty.is_channel() {
                doc.add_error(
                    label.pos,
                    DiagnosticKind::BadSync(format!("message label '{label}' is not a channel")),
                );
            }
        }
        doc.templates[tpl].messages[idx].label = Some(label);
    }
}

pub(crate) fn check_condition(doc: &mut Document, tpl: TemplateId, idx: usize) {
    let frame = doc.templates[tpl].decls.frame;
    if let Some(mut label) = doc.templates[tpl].conditions[idx].label.take() {
        if exprs::check(doc, frame, &mut label, Ctx::Guard) {
            if !label.ty.is_integral() {
                doc.add_error(
                    label.pos,
                    DiagnosticKind::BadGuard(format!("condition has type '{}'", label.ty)),
                );
            } else if stmts::has_side_effects(doc, &label) {
                doc.add_error(
                    label.pos,
                    DiagnosticKind::BadGuard("conditions must be free of side effects".into()),
                );
            }
        }
        doc.templates[tpl].conditions[idx].label = Some(label);
    }
}

pub(crate) fn check_update(doc: &mut Document, tpl: TemplateId, idx: usize) {
    let frame = doc.templates[tpl].decls.frame;
    if let Some(mut label) = doc.templates[tpl].updates[idx].label.take() {
        if exprs::check(doc, frame, &mut label, Ctx::General)
            && !matches!(label.kind, ExprKind::Assign(_) | ExprKind::Call | ExprKind::Comma)
        {
            doc.add_error(
                label.pos,
                DiagnosticKind::BadAssignment(format!("update '{label}' has no effect")),
            );
        }
        doc.templates[tpl].updates[idx].label = Some(label);
    }
}

/// Post-pass over an LSC template: simregion sanity and prechart flags.
pub(crate) fn check_lsc_template(doc: &mut Document, tpl: TemplateId) {
    let regions = doc.templates[tpl].simregions();
    let mut defects = Vec::new();
    {
        let t = &doc.templates[tpl];
        for r in &regions {
            if r.is_empty() {
                defects.push("empty simregion".to_string());
                continue;
            }
            // Parts of one logical step must agree on prechart membership.
            let mut flags = Vec::new();
            if let Some(i) = r.message {
                flags.push(t.messages[i].in_prechart);
            }
            if let Some(i) = r.condition {
                flags.push(t.conditions[i].in_prechart);
            }
            if let Some(i) = r.update {
                flags.push(t.updates[i].in_prechart);
            }
            if flags.windows(2).any(|w| w[0] != w[1]) {
                defects.push(format!(
                    "simregion at y={} straddles the prechart boundary",
                    t.simregion_y(r).unwrap_or(-1)
                ));
            }
        }
    }
    let uid_pos = doc.symbols.symbol(doc.templates[tpl].uid).pos;
    for msg in defects {
        doc.add_error(uid_pos, DiagnosticKind::InconsistentLsc(msg));
    }

    let t = &doc.templates[tpl];
    let any_prechart = t.messages.iter().any(|m| m.in_prechart)
        || t.conditions.iter().any(|c| c.in_prechart)
        || t.updates.iter().any(|u| u.in_prechart);
    doc.templates[tpl].has_prechart = any_prechart;
}

/// The simregion partial order: `a` precedes `b` when they share an
/// instance line and `a` sits strictly higher (smaller Y), or when `a` is
/// in the prechart and `b` is not.
pub fn simregion_precedes(tpl: &Template, a: &Simregion, b: &Simregion) -> bool {
    if tpl.simregion_in_prechart(a) && !tpl.simregion_in_prechart(b) {
        return true;
    }
    let (Some(ya), Some(yb)) = (tpl.simregion_y(a), tpl.simregion_y(b)) else {
        return false;
    };
    if ya >= yb {
        return false;
    }
    let lines_a = tpl.simregion_lines(a);
    tpl.simregion_lines(b).iter().any(|l| lines_a.contains(l))
}

/// A cut is consistent when its simregions form an antichain.
pub fn cut_is_consistent(tpl: &Template, cut: &Cut) -> bool {
    let rs = &cut.simregions;
    for (i, a) in rs.iter().enumerate() {
        for b in &rs[i + 1..] {
            if simregion_precedes(tpl, a, b) || simregion_precedes(tpl, b, a) {
                return false;
            }
        }
    }
    true
}

/// A cut is in the prechart iff all of its simregions are.
pub fn cut_in_prechart(tpl: &Template, cut: &Cut) -> bool {
    cut.simregions
        .iter()
        .all(|r| tpl.simregion_in_prechart(r))
}
