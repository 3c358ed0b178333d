//! Template instantiation: partial application of parameters, restriction
//! analysis, and process registration.
//!
//! Parameters and arguments are flattened into each new instance, so
//! re-instantiating a partial instance composes associatively.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::builder::BuildError;
use crate::diagnostic::DiagnosticKind;
use crate::document::{Document, Instance};
use crate::expression::Expression;
use crate::position::Position;
use crate::symbol::{DeclRef, InstanceId, SymbolId, TemplateId};
use crate::types::Type;

/// Substitution rounds when chasing bound parameters through the mapping.
const SUBSTITUTION_LIMIT: usize = 8;

/// Parameters of `tpl` that transitively determine an array size or range
/// bound in any of the template's declared types.
///
/// The closure steps through `const` locals: when a size expression reads a
/// constant whose initializer reads a parameter, that parameter is
/// restricted too.
pub fn restricted_parameters(doc: &Document, tpl: TemplateId) -> IndexSet<SymbolId> {
    let t = &doc.templates[tpl];
    let params: IndexSet<SymbolId> = doc
        .symbols
        .frame_symbols(t.parameters)
        .iter()
        .copied()
        .collect();

    let mut size_syms = IndexSet::new();
    for &p in doc.symbols.frame_symbols(t.parameters) {
        doc.symbols.type_of(p).collect_size_symbols(&mut size_syms);
    }
    for &v in &t.decls.variables {
        let uid = doc.variables[v].uid;
        doc.symbols.type_of(uid).collect_size_symbols(&mut size_syms);
    }
    for &td in &t.decls.typedefs {
        doc.symbols.type_of(td).collect_size_symbols(&mut size_syms);
    }

    let mut restricted = IndexSet::new();
    let mut seen = IndexSet::new();
    let mut work: Vec<SymbolId> = size_syms.into_iter().collect();
    while let Some(s) = work.pop() {
        if !seen.insert(s) {
            continue;
        }
        if params.contains(&s) {
            restricted.insert(s);
            continue;
        }
        if let DeclRef::Variable(v) = doc.symbols.decl_of(s) {
            if doc.symbols.type_of(s).is_constant() {
                if let Some(init) = &doc.variables[v].init {
                    let mut more = IndexSet::new();
                    init.collect_free_symbols(&mut more);
                    work.extend(more);
                }
            }
        }
    }
    // Keep parameter order for stable diagnostics.
    params.into_iter().filter(|p| restricted.contains(p)).collect()
}

struct Source {
    template: TemplateId,
    parameters: Vec<SymbolId>,
    unbound: usize,
    mapping: IndexMap<SymbolId, Expression>,
}

fn resolve_source(doc: &Document, source: SymbolId) -> Option<Source> {
    match doc.symbols.decl_of(source) {
        DeclRef::Template(t) => {
            let parameters: Vec<SymbolId> =
                doc.symbols.frame_symbols(doc.templates[t].parameters).to_vec();
            Some(Source {
                template: t,
                unbound: parameters.len(),
                parameters,
                mapping: IndexMap::new(),
            })
        }
        DeclRef::Instance(i) => source_from_instance(doc, &doc.instances[i]),
        DeclRef::LscInstance(i) => source_from_instance(doc, &doc.lsc_instances[i]),
        _ => None,
    }
}

fn source_from_instance(doc: &Document, inst: &Instance) -> Option<Source> {
    Some(Source {
        template: inst.template,
        parameters: doc.symbols.frame_symbols(inst.parameters).to_vec(),
        unbound: inst.unbound,
        mapping: inst.mapping.clone(),
    })
}

/// Substitute the mapping into an expression until it stabilizes, so bound
/// parameters referenced by other bound arguments disappear.
fn saturate(expr: &Expression, mapping: &IndexMap<SymbolId, Expression>) -> Expression {
    let mut current = expr.clone();
    for _ in 0..SUBSTITUTION_LIMIT {
        let next = current.substitute(mapping);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

pub(crate) fn add_instance(
    doc: &mut Document,
    name: &str,
    source: SymbolId,
    arguments: Vec<Expression>,
    pos: Position,
    lsc: bool,
) -> Result<InstanceId, BuildError> {
    let src = match resolve_source(doc, source) {
        Some(s) => s,
        None => {
            let src_name = doc.symbols.name(source).to_string();
            doc.add_error(pos, DiagnosticKind::NotATemplate(src_name.clone()));
            return Err(BuildError::NotATemplate(src_name));
        }
    };
    if arguments.len() > src.unbound {
        let src_name = doc.symbols.name(source).to_string();
        doc.add_error(
            pos,
            DiagnosticKind::InvalidType(format!(
                "'{src_name}' takes {} arguments, {} given",
                src.unbound,
                arguments.len()
            )),
        );
        return Err(BuildError::TooManyArguments(src_name));
    }

    let id = if lsc {
        doc.lsc_instances.len()
    } else {
        doc.instances.len()
    };
    let decl = if lsc {
        DeclRef::LscInstance(id)
    } else {
        DeclRef::Instance(id)
    };
    let uid = match doc
        .symbols
        .add_symbol(doc.global_frame(), name, Type::process(), pos, decl)
    {
        Ok(uid) => uid,
        Err(dup) => {
            doc.add_error(pos, DiagnosticKind::DuplicateDefinition(dup.name.clone()));
            return Err(BuildError::Duplicate(dup.name));
        }
    };

    // New parameter frame: remaining unbound symbols first, then the newly
    // bound ones, then parameters bound by earlier partial applications.
    let bound = arguments.len();
    let frame = doc.symbols.fresh_frame(None);
    let order = src.parameters[bound..src.unbound]
        .iter()
        .chain(&src.parameters[..bound])
        .chain(&src.parameters[src.unbound..]);
    for &p in order {
        // Parameter symbols are shared, never re-declared; a collision here
        // means the source frame was already inconsistent.
        doc.symbols
            .adopt(frame, p)
            .map_err(|d| BuildError::Duplicate(d.name))?;
    }

    let mut mapping: IndexMap<SymbolId, Expression> = IndexMap::new();
    for (&p, arg) in src.parameters[..bound].iter().zip(&arguments) {
        mapping.insert(p, arg.clone());
    }
    mapping.extend(src.mapping.clone());

    let restricted = restricted_parameters(doc, src.template);
    for &p in &restricted {
        let Some(arg) = mapping.get(&p) else { continue };
        let saturated = saturate(arg, &mapping);
        let mut free = IndexSet::new();
        saturated.collect_free_symbols(&mut free);
        let violates = free.iter().any(|&s| {
            doc.symbols.decl_of(s) == DeclRef::Parameter && !mapping.contains_key(&s)
        });
        if violates {
            let pname = doc.symbols.name(p).to_string();
            doc.add_error(pos, DiagnosticKind::RestrictionViolation(pname));
        }
    }

    let instance = Instance {
        uid,
        template: src.template,
        parameters: frame,
        unbound: src.unbound - bound,
        arguments: mapping.len(),
        mapping,
        restricted,
    };
    debug!(
        name,
        template = doc.symbols.name(doc.templates[src.template].uid),
        unbound = instance.unbound,
        bound = instance.arguments,
        "instantiated template"
    );
    if lsc {
        doc.lsc_instances.push(instance);
    } else {
        doc.instances.push(instance);
    }
    doc.modified = true;
    Ok(id)
}

pub(crate) fn add_process(
    doc: &mut Document,
    source: SymbolId,
    pos: Position,
) -> Result<(), BuildError> {
    let name = doc.symbols.name(source).to_string();
    let instance = match doc.symbols.decl_of(source) {
        DeclRef::Instance(i) => doc.instances[i].clone(),
        DeclRef::LscInstance(i) => doc.lsc_instances[i].clone(),
        DeclRef::Template(t) => {
            // A parameterless template may enter the system directly.
            let tpl = &doc.templates[t];
            Instance {
                uid: source,
                template: t,
                parameters: tpl.parameters,
                unbound: doc.symbols.frame_size(tpl.parameters),
                arguments: 0,
                mapping: IndexMap::new(),
                restricted: restricted_parameters(doc, t),
            }
        }
        _ => {
            doc.add_error(pos, DiagnosticKind::NotAProcess(name.clone()));
            return Err(BuildError::NotAProcess(name));
        }
    };
    if instance.unbound > 0 {
        doc.add_error(pos, DiagnosticKind::NotAProcess(name.clone()));
        return Err(BuildError::NotAProcess(name));
    }
    debug!(name = %name, "registered process");
    doc.processes.insert(name, instance);
    doc.modified = true;
    Ok(())
}
