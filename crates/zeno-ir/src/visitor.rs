//! Traversal over the document in a fixed order.
//!
//! The visitor is a capability set with default no-ops, parameterized on the
//! mutable document; passes override the hooks they care about and receive
//! stable indices rather than references, so they may read and write any
//! part of the document from inside a hook.

use crate::document::Document;
use crate::symbol::{FunctionId, SymbolId, TemplateId, VariableId};

#[allow(unused_variables)]
pub trait DocumentVisitor {
    fn visit_document_before(&mut self, doc: &mut Document) {}
    fn visit_document_after(&mut self, doc: &mut Document) {}

    fn visit_typedef(&mut self, doc: &mut Document, symbol: SymbolId) {}
    fn visit_variable(&mut self, doc: &mut Document, var: VariableId) {}
    fn visit_function(&mut self, doc: &mut Document, func: FunctionId) {}

    /// Returning false skips the template's interior (locations, edges,
    /// local declarations, LSC entities) but not `visit_template_after`.
    fn visit_template_before(&mut self, doc: &mut Document, tpl: TemplateId) -> bool {
        true
    }
    fn visit_template_after(&mut self, doc: &mut Document, tpl: TemplateId) {}

    fn visit_location(&mut self, doc: &mut Document, tpl: TemplateId, location: usize) {}
    fn visit_edge(&mut self, doc: &mut Document, tpl: TemplateId, edge: usize) {}
    fn visit_progress(&mut self, doc: &mut Document, tpl: Option<TemplateId>, progress: usize) {}
    fn visit_io_decl(&mut self, doc: &mut Document, tpl: Option<TemplateId>, iodecl: usize) {}
    fn visit_gantt(&mut self, doc: &mut Document, tpl: Option<TemplateId>, gantt: usize) {}

    fn visit_instance_line(&mut self, doc: &mut Document, tpl: TemplateId, line: usize) {}
    fn visit_message(&mut self, doc: &mut Document, tpl: TemplateId, message: usize) {}
    fn visit_condition(&mut self, doc: &mut Document, tpl: TemplateId, condition: usize) {}
    fn visit_update(&mut self, doc: &mut Document, tpl: TemplateId, update: usize) {}

    fn visit_instance(&mut self, doc: &mut Document, instance: usize) {}
    fn visit_process(&mut self, doc: &mut Document, process: usize) {}
    fn visit_query(&mut self, doc: &mut Document, query: usize) {}
}

/// Walk the whole document: globals, then each template (locations, edges,
/// functions, LSC entities), then instances, processes, and queries.
pub fn walk(doc: &mut Document, visitor: &mut dyn DocumentVisitor) {
    visitor.visit_document_before(doc);

    for i in 0..doc.globals.typedefs.len() {
        visitor.visit_typedef(doc, doc.globals.typedefs[i]);
    }
    for i in 0..doc.globals.variables.len() {
        visitor.visit_variable(doc, doc.globals.variables[i]);
    }
    for i in 0..doc.globals.functions.len() {
        visitor.visit_function(doc, doc.globals.functions[i]);
    }
    for i in 0..doc.globals.progress.len() {
        visitor.visit_progress(doc, None, i);
    }
    for i in 0..doc.globals.iodecl.len() {
        visitor.visit_io_decl(doc, None, i);
    }
    for i in 0..doc.globals.gantt.len() {
        visitor.visit_gantt(doc, None, i);
    }

    for tpl in 0..doc.templates.len() {
        if visitor.visit_template_before(doc, tpl) {
            for i in 0..doc.templates[tpl].decls.typedefs.len() {
                visitor.visit_typedef(doc, doc.templates[tpl].decls.typedefs[i]);
            }
            for i in 0..doc.templates[tpl].decls.variables.len() {
                visitor.visit_variable(doc, doc.templates[tpl].decls.variables[i]);
            }
            for i in 0..doc.templates[tpl].locations.len() {
                visitor.visit_location(doc, tpl, i);
            }
            for i in 0..doc.templates[tpl].edges.len() {
                visitor.visit_edge(doc, tpl, i);
            }
            for i in 0..doc.templates[tpl].decls.functions.len() {
                visitor.visit_function(doc, doc.templates[tpl].decls.functions[i]);
            }
            for i in 0..doc.templates[tpl].decls.progress.len() {
                visitor.visit_progress(doc, Some(tpl), i);
            }
            for i in 0..doc.templates[tpl].decls.iodecl.len() {
                visitor.visit_io_decl(doc, Some(tpl), i);
            }
            for i in 0..doc.templates[tpl].decls.gantt.len() {
                visitor.visit_gantt(doc, Some(tpl), i);
            }
            for i in 0..doc.templates[tpl].instance_lines.len() {
                visitor.visit_instance_line(doc, tpl, i);
            }
            for i in 0..doc.templates[tpl].messages.len() {
                visitor.visit_message(doc, tpl, i);
            }
            for i in 0..doc.templates[tpl].conditions.len() {
                visitor.visit_condition(doc, tpl, i);
            }
            for i in 0..doc.templates[tpl].updates.len() {
                visitor.visit_update(doc, tpl, i);
            }
        }
        visitor.visit_template_after(doc, tpl);
    }

    for i in 0..doc.instances.len() {
        visitor.visit_instance(doc, i);
    }
    for i in 0..doc.processes.len() {
        visitor.visit_process(doc, i);
    }
    for i in 0..doc.queries.len() {
        visitor.visit_query(doc, i);
    }

    visitor.visit_document_after(doc);
}
