#![doc = include_str!("../README.md")]

//! The zeno type checker.
//!
//! A single visitor pass over the document resolves identifiers, assigns
//! types, validates TA and LSC constructs, and populates the derived fields
//! (clock rates, select domains, function effects, global flags, supported
//! methods). Errors and warnings accumulate on the document; checking
//! continues past independent defects so callers see a batch per run.

mod decls;
mod edges;
mod eval;
mod exprs;
mod lsc;
mod queries;
mod stmts;

pub use lsc::{cut_in_prechart, cut_is_consistent, simregion_precedes};
pub use queries::RECOGNIZED_OPTIONS;

use indexmap::IndexSet;
use tracing::debug;

use zeno_ir::diagnostic::DiagnosticKind;
use zeno_ir::document::Document;
use zeno_ir::expression::Expression;
use zeno_ir::symbol::{FunctionId, SymbolId, TemplateId, VariableId};
use zeno_ir::types::{Qualifier, Type};
use zeno_ir::visitor::{walk, DocumentVisitor};

use exprs::Ctx;

/// Type-check the document. Returns true when the pass added no errors.
pub fn check_document(doc: &mut Document) -> bool {
    let before = doc.errors().len();
    let mut checker = TypeChecker::default();
    walk(doc, &mut checker);
    let added = doc.errors().len() - before;
    debug!(errors = added, warnings = doc.warnings().len(), "checked document");
    added == 0
}

#[derive(Default)]
struct TypeChecker {
    declared_strategies: IndexSet<String>,
}

#[derive(Clone, Copy)]
enum InstanceRef {
    Plain(usize),
    Lsc(usize),
    Process(usize),
}

impl TypeChecker {
    fn check_instance_arguments(&mut self, doc: &mut Document, target: InstanceRef) {
        let inst = match target {
            InstanceRef::Plain(i) => &doc.instances[i],
            InstanceRef::Lsc(i) => &doc.lsc_instances[i],
            InstanceRef::Process(i) => doc.processes.get_index(i).unwrap().1,
        };
        let pairs: Vec<(SymbolId, Expression)> = inst
            .mapping
            .iter()
            .map(|(s, e)| (*s, e.clone()))
            .collect();
        let frame = doc.global_frame();
        let mut checked = Vec::with_capacity(pairs.len());
        for (param, mut arg) in pairs {
            if !exprs::check(doc, frame, &mut arg, Ctx::General) {
                checked.push((param, arg));
                continue;
            }
            let param_ty = doc.symbols.type_of(param).clone();
            let pos = arg.pos;
            if param_ty.is_reference() {
                let target = param_ty.unfolded().get(0).clone();
                if arg.ref_to_symbol().is_none()
                    || !target.stripped().same(&arg.ty.stripped())
                {
                    doc.add_error(
                        pos,
                        DiagnosticKind::TypeMismatch {
                            expected: param_ty.to_string(),
                            found: arg.ty.to_string(),
                        },
                    );
                }
            } else if !param_ty.compatible(&arg.ty) {
                doc.add_error(
                    pos,
                    DiagnosticKind::TypeMismatch {
                        expected: param_ty.to_string(),
                        found: arg.ty.to_string(),
                    },
                );
            }
            checked.push((param, arg));
        }
        let inst = match target {
            InstanceRef::Plain(i) => &mut doc.instances[i],
            InstanceRef::Lsc(i) => &mut doc.lsc_instances[i],
            InstanceRef::Process(i) => doc.processes.get_index_mut(i).unwrap().1,
        };
        for (param, arg) in checked {
            inst.mapping.insert(param, arg);
        }
    }

    fn check_update_expression(&mut self, doc: &mut Document, expr: Option<Expression>) -> Option<Expression> {
        let frame = doc.global_frame();
        expr.map(|mut e| {
            exprs::check(doc, frame, &mut e, Ctx::General);
            e
        })
    }

    fn derive_supported_methods(&self, doc: &mut Document) {
        let mut hybrid = false;
        for v in &doc.variables {
            if type_has_hybrid(doc.symbols.type_of(v.uid)) {
                hybrid = true;
                break;
            }
        }
        let has_dynamic_templates = doc.has_dynamic_templates();
        let has_priority_declaration = doc.has_priority_declaration();
        let has_strict_invariants = doc.has_strict_invariants;
        let stops_clock = doc.stops_clock;
        let m = &mut doc.supported_methods;
        if has_dynamic_templates {
            m.symbolic = false;
            m.concrete = false;
        }
        if stops_clock || hybrid {
            m.symbolic = false;
        }
        if has_priority_declaration || has_strict_invariants {
            m.stochastic = false;
        }
    }
}

fn type_has_hybrid(ty: &Type) -> bool {
    if ty.has(Qualifier::Hybrid) {
        return true;
    }
    ty.fields().iter().any(|f| type_has_hybrid(&f.ty))
}

fn is_lsc_template(doc: &Document, tpl: TemplateId) -> bool {
    let t = &doc.templates[tpl];
    !t.instance_lines.is_empty()
        || !t.messages.is_empty()
        || !t.conditions.is_empty()
        || !t.updates.is_empty()
}

impl DocumentVisitor for TypeChecker {
    fn visit_typedef(&mut self, doc: &mut Document, symbol: SymbolId) {
        decls::check_typedef(doc, symbol);
    }

    fn visit_variable(&mut self, doc: &mut Document, var: VariableId) {
        decls::check_variable(doc, var);
    }

    fn visit_function(&mut self, doc: &mut Document, func: FunctionId) {
        stmts::check_function(doc, func);
    }

    fn visit_template_before(&mut self, doc: &mut Document, tpl: TemplateId) -> bool {
        let pos = doc.symbols.symbol(doc.templates[tpl].uid).pos;
        let name = doc.symbols.name(doc.templates[tpl].uid).to_string();

        // Parameter types are declarations too.
        let params: Vec<SymbolId> = doc
            .symbols
            .frame_symbols(doc.templates[tpl].parameters)
            .to_vec();
        let param_frame = doc.templates[tpl].parameters;
        for p in &params {
            let p_pos = doc.symbols.symbol(*p).pos;
            let mut ty = doc.symbols.type_of(*p).clone();
            decls::check_type(doc, param_frame, &mut ty, p_pos);
            doc.symbols.set_type(*p, ty);
        }

        if doc.templates[tpl].dynamic {
            for p in &params {
                let ty = doc.symbols.type_of(*p);
                if ty.is_reference() || !(ty.is_integral() || ty.is_double()) {
                    let ty = ty.to_string();
                    doc.add_error(
                        pos,
                        DiagnosticKind::InvalidType(format!(
                            "dynamic template '{name}' takes by-value int, bool, or double \
                             parameters, found '{ty}'"
                        )),
                    );
                }
            }
        }

        if doc.templates[tpl].is_ta && !doc.templates[tpl].locations.is_empty() {
            match doc.templates[tpl].init {
                Some(init) => {
                    let is_location = doc.templates[tpl]
                        .locations
                        .iter()
                        .any(|l| l.uid == init);
                    if !is_location {
                        doc.add_error(
                            pos,
                            DiagnosticKind::InvalidType(format!(
                                "initial location of '{name}' is not one of its locations"
                            )),
                        );
                    }
                }
                None => {
                    doc.add_error(
                        pos,
                        DiagnosticKind::InvalidType(format!(
                            "template '{name}' has no initial location"
                        )),
                    );
                }
            }
        }
        true
    }

    fn visit_location(&mut self, doc: &mut Document, tpl: TemplateId, location: usize) {
        edges::check_location(doc, tpl, location);
    }

    fn visit_edge(&mut self, doc: &mut Document, tpl: TemplateId, edge: usize) {
        edges::check_edge(doc, tpl, edge);
    }

    fn visit_progress(&mut self, doc: &mut Document, tpl: Option<TemplateId>, progress: usize) {
        let frame = match tpl {
            Some(t) => doc.templates[t].decls.frame,
            None => doc.global_frame(),
        };
        decls::check_progress(doc, frame, (tpl, progress));
    }

    fn visit_io_decl(&mut self, doc: &mut Document, tpl: Option<TemplateId>, iodecl: usize) {
        let frame = match tpl {
            Some(t) => doc.templates[t].decls.frame,
            None => doc.global_frame(),
        };
        decls::check_io_decl(doc, frame, (tpl, iodecl));
    }

    fn visit_gantt(&mut self, doc: &mut Document, tpl: Option<TemplateId>, gantt: usize) {
        decls::check_gantt(doc, (tpl, gantt));
    }

    fn visit_message(&mut self, doc: &mut Document, tpl: TemplateId, message: usize) {
        lsc::check_message(doc, tpl, message);
    }

    fn visit_condition(&mut self, doc: &mut Document, tpl: TemplateId, condition: usize) {
        lsc::check_condition(doc, tpl, condition);
    }

    fn visit_update(&mut self, doc: &mut Document, tpl: TemplateId, update: usize) {
        lsc::check_update(doc, tpl, update);
    }

    fn visit_template_after(&mut self, doc: &mut Document, tpl: TemplateId) {
        if is_lsc_template(doc, tpl) {
            lsc::check_lsc_template(doc, tpl);
        }
        for i in 0..doc.templates[tpl].dynamic_evals.len() {
            let frame = doc.templates[tpl].decls.frame;
            let mut e = doc.templates[tpl].dynamic_evals[i].clone();
            exprs::check(doc, frame, &mut e, Ctx::General);
            doc.templates[tpl].dynamic_evals[i] = e;
        }
    }

    fn visit_instance(&mut self, doc: &mut Document, instance: usize) {
        self.check_instance_arguments(doc, InstanceRef::Plain(instance));
    }

    fn visit_process(&mut self, doc: &mut Document, process: usize) {
        self.check_instance_arguments(doc, InstanceRef::Process(process));
    }

    fn visit_query(&mut self, doc: &mut Document, query: usize) {
        queries::check_query(doc, query, &mut self.declared_strategies);
    }

    fn visit_document_after(&mut self, doc: &mut Document) {
        for i in 0..doc.lsc_instances.len() {
            self.check_instance_arguments(doc, InstanceRef::Lsc(i));
        }

        let before = doc.before_update.take();
        doc.before_update = self.check_update_expression(doc, before);
        let after = doc.after_update.take();
        doc.after_update = self.check_update_expression(doc, after);

        check_chan_priorities(doc);
        check_proc_priorities(doc);
        self.derive_supported_methods(doc);
    }
}

fn channel_like(ty: &Type) -> bool {
    if ty.is_channel() {
        return true;
    }
    if ty.is_array() {
        return channel_like(ty.unfolded().get(0));
    }
    false
}

fn check_chan_priorities(doc: &mut Document) {
    let frame = doc.global_frame();
    for i in 0..doc.chan_priorities.len() {
        let mut decl = doc.chan_priorities[i].clone();
        let mut exprs_in_decl: Vec<&mut Expression> = Vec::new();
        exprs_in_decl.push(&mut decl.head);
        for (_, e) in &mut decl.tail {
            exprs_in_decl.push(e);
        }
        for e in exprs_in_decl {
            if exprs::check(doc, frame, e, Ctx::General) && !channel_like(&e.ty) {
                doc.add_error(
                    e.pos,
                    DiagnosticKind::BadPriorityList(format!(
                        "'{e}' is not a channel or channel array"
                    )),
                );
            }
        }
        doc.chan_priorities[i] = decl;
    }
}

fn check_proc_priorities(doc: &mut Document) {
    let names: Vec<String> = doc.proc_priority.keys().cloned().collect();
    for name in names {
        if doc.process(&name).is_none() {
            doc.add_error(
                zeno_ir::position::Position::UNKNOWN,
                DiagnosticKind::NoSuchProcess(name),
            );
        }
    }
}
