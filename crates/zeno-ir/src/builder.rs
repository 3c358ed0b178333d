//! The contract between syntactic front-ends and the IR.
//!
//! Front-ends drive a flat sequence of declarative calls; each call records
//! one element in the document. Only hard-structural violations (duplicate
//! names, dangling indices) are rejected at call time — and also recorded on
//! the document — while all semantic checks are deferred to `zeno-check`.

use thiserror::Error;

use crate::diagnostic::DiagnosticKind;
use crate::document::{
    Branchpoint, ChanPriority, Condition, Declarations, Document, Edge, EdgeEnd, Gantt,
    InstanceLine, IoDecl, Location, Message, PrioritySep, Progress, Query, Template, Update,
};
use crate::expression::Expression;
use crate::instantiation;
use crate::position::Position;
use crate::statement::Block;
use crate::symbol::{
    DeclRef, FrameId, FunctionId, InstanceId, SymbolId, TemplateId, VariableId,
};
use crate::types::{Qualifier, Type};

/// Where a declaration lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRef {
    Global,
    Template(TemplateId),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("duplicate definition of '{0}'")]
    Duplicate(String),
    #[error("'{0}' is not a template")]
    NotATemplate(String),
    #[error("'{0}' is not a process")]
    NotAProcess(String),
    #[error("no such process '{0}'")]
    NoSuchProcess(String),
    #[error("too many arguments for '{0}'")]
    TooManyArguments(String),
    #[error("no channel priority declaration in progress")]
    NoPriorityHead,
    #[error("invalid {0} index")]
    BadIndex(&'static str),
}

/// The complete front-end contract. Implemented by [`Document`].
pub trait Builder {
    fn fresh_frame(&mut self, parent: Option<FrameId>) -> FrameId;
    fn add_position(&mut self, position: u32, offset: u32, line: u32, path: &str);

    fn add_parameter(
        &mut self,
        frame: FrameId,
        ty: Type,
        name: &str,
        pos: Position,
    ) -> Result<SymbolId, BuildError>;

    fn add_variable(
        &mut self,
        scope: ScopeRef,
        ty: Type,
        name: &str,
        init: Option<Expression>,
        pos: Position,
    ) -> Result<VariableId, BuildError>;

    fn add_function_local(
        &mut self,
        func: FunctionId,
        frame: FrameId,
        ty: Type,
        name: &str,
        init: Option<Expression>,
        pos: Position,
    ) -> Result<VariableId, BuildError>;

    fn add_typedef(
        &mut self,
        scope: ScopeRef,
        definition: Type,
        name: &str,
        pos: Position,
    ) -> Result<SymbolId, BuildError>;

    fn add_function(
        &mut self,
        scope: ScopeRef,
        ty: Type,
        name: &str,
        pos: Position,
    ) -> Result<FunctionId, BuildError>;

    fn set_function_body(&mut self, func: FunctionId, body: Block) -> Result<(), BuildError>;

    fn add_template(
        &mut self,
        name: &str,
        parameters: FrameId,
        pos: Position,
        is_ta: bool,
        kind: &str,
        mode: &str,
    ) -> Result<TemplateId, BuildError>;

    fn add_dynamic_template(
        &mut self,
        name: &str,
        parameters: FrameId,
        pos: Position,
    ) -> Result<TemplateId, BuildError>;

    fn add_location(
        &mut self,
        tpl: TemplateId,
        name: &str,
        urgent: bool,
        committed: bool,
        invariant: Option<Expression>,
        exp_rate: Option<Expression>,
        pos: Position,
    ) -> Result<usize, BuildError>;

    fn set_cost_rate(
        &mut self,
        tpl: TemplateId,
        location: usize,
        rate: Expression,
    ) -> Result<(), BuildError>;

    fn set_init(&mut self, tpl: TemplateId, location: usize) -> Result<(), BuildError>;

    fn add_branchpoint(
        &mut self,
        tpl: TemplateId,
        name: &str,
        pos: Position,
    ) -> Result<usize, BuildError>;

    #[allow(clippy::too_many_arguments)]
    fn add_edge(
        &mut self,
        tpl: TemplateId,
        src: EdgeEnd,
        dst: EdgeEnd,
        controllable: bool,
        actname: &str,
        pos: Position,
    ) -> Result<usize, BuildError>;

    fn add_select(
        &mut self,
        tpl: TemplateId,
        edge: usize,
        frame: FrameId,
    ) -> Result<(), BuildError>;
    fn add_guard(&mut self, tpl: TemplateId, edge: usize, guard: Expression)
        -> Result<(), BuildError>;
    fn add_sync(&mut self, tpl: TemplateId, edge: usize, sync: Expression)
        -> Result<(), BuildError>;
    fn add_assign(
        &mut self,
        tpl: TemplateId,
        edge: usize,
        assign: Expression,
    ) -> Result<(), BuildError>;
    fn add_probability(
        &mut self,
        tpl: TemplateId,
        edge: usize,
        prob: Expression,
    ) -> Result<(), BuildError>;

    fn add_dynamic_eval(&mut self, tpl: TemplateId, expr: Expression) -> Result<usize, BuildError>;

    // LSC construction
    fn add_instance_line(
        &mut self,
        tpl: TemplateId,
        instance: InstanceId,
    ) -> Result<usize, BuildError>;
    #[allow(clippy::too_many_arguments)]
    fn add_message(
        &mut self,
        tpl: TemplateId,
        src: usize,
        dst: usize,
        y: i32,
        label: Option<Expression>,
        in_prechart: bool,
        pos: Position,
    ) -> Result<usize, BuildError>;
    #[allow(clippy::too_many_arguments)]
    fn add_condition(
        &mut self,
        tpl: TemplateId,
        anchors: Vec<usize>,
        y: i32,
        label: Option<Expression>,
        in_prechart: bool,
        hot: bool,
        pos: Position,
    ) -> Result<usize, BuildError>;
    #[allow(clippy::too_many_arguments)]
    fn add_update(
        &mut self,
        tpl: TemplateId,
        anchor: usize,
        y: i32,
        label: Option<Expression>,
        in_prechart: bool,
        pos: Position,
    ) -> Result<usize, BuildError>;
    fn set_prechart(&mut self, tpl: TemplateId, has_prechart: bool) -> Result<(), BuildError>;

    // Instantiation
    fn add_instance(
        &mut self,
        name: &str,
        source: SymbolId,
        arguments: Vec<Expression>,
        pos: Position,
    ) -> Result<InstanceId, BuildError>;
    fn add_lsc_instance(
        &mut self,
        name: &str,
        source: SymbolId,
        arguments: Vec<Expression>,
        pos: Position,
    ) -> Result<InstanceId, BuildError>;
    fn add_process(&mut self, source: SymbolId, pos: Position) -> Result<(), BuildError>;
    fn remove_process(&mut self, name: &str) -> Result<(), BuildError>;

    // Queries and priorities
    fn add_query(&mut self, query: Query);
    fn begin_chan_priority(&mut self, head: Expression);
    fn add_chan_priority(&mut self, sep: PrioritySep, expr: Expression)
        -> Result<(), BuildError>;
    fn set_proc_priority(&mut self, name: &str, priority: i32);

    // Miscellaneous declarations
    fn add_progress_measure(
        &mut self,
        scope: ScopeRef,
        guard: Option<Expression>,
        measure: Expression,
    );
    fn add_io_decl(&mut self, scope: ScopeRef, decl: IoDecl);
    fn add_gantt(&mut self, scope: ScopeRef, gantt: Gantt);
    fn set_before_update(&mut self, expr: Expression);
    fn set_after_update(&mut self, expr: Expression);
}

impl Document {
    fn scope_decls(&mut self, scope: ScopeRef) -> &mut Declarations {
        match scope {
            ScopeRef::Global => &mut self.globals,
            ScopeRef::Template(t) => &mut self.templates[t].decls,
        }
    }

    fn scope_frame(&self, scope: ScopeRef) -> FrameId {
        match scope {
            ScopeRef::Global => self.globals.frame,
            ScopeRef::Template(t) => self.templates[t].decls.frame,
        }
    }

    /// Declare a symbol, recording a duplicate-definition error or a
    /// shadowing warning on the document as appropriate.
    fn declare(
        &mut self,
        frame: FrameId,
        name: &str,
        ty: Type,
        pos: Position,
        decl: DeclRef,
        warn_shadow: bool,
    ) -> Result<SymbolId, BuildError> {
        if warn_shadow && self.symbols.shadow_of(frame, name).is_some() {
            self.add_warning(pos, DiagnosticKind::ShadowsAVariable(name.to_string()));
        }
        match self.symbols.add_symbol(frame, name, ty, pos, decl) {
            Ok(id) => {
                self.modified = true;
                Ok(id)
            }
            Err(dup) => {
                self.add_error(pos, DiagnosticKind::DuplicateDefinition(dup.name.clone()));
                Err(BuildError::Duplicate(dup.name))
            }
        }
    }

    fn edge_mut(&mut self, tpl: TemplateId, edge: usize) -> Result<&mut Edge, BuildError> {
        self.templates
            .get_mut(tpl)
            .ok_or(BuildError::BadIndex("template"))?
            .edges
            .get_mut(edge)
            .ok_or(BuildError::BadIndex("edge"))
    }

    fn new_template(
        &mut self,
        name: &str,
        parameters: FrameId,
        pos: Position,
        is_ta: bool,
        dynamic: bool,
        kind: &str,
        mode: &str,
    ) -> Result<TemplateId, BuildError> {
        let id = self.templates.len();
        let uid = self.declare(
            self.globals.frame,
            name,
            Type::process(),
            pos,
            DeclRef::Template(id),
            false,
        )?;
        let decl_frame = self.symbols.fresh_frame(Some(parameters));
        self.templates.push(Template {
            uid,
            parameters,
            decls: Declarations::new(decl_frame),
            init: None,
            locations: Vec::new(),
            branchpoints: Vec::new(),
            edges: Vec::new(),
            is_ta,
            dynamic,
            dyn_index: self.dynamic_templates.len(),
            dynamic_evals: Vec::new(),
            instance_lines: Vec::new(),
            messages: Vec::new(),
            conditions: Vec::new(),
            updates: Vec::new(),
            kind: kind.to_string(),
            mode: mode.to_string(),
            has_prechart: false,
        });
        if dynamic {
            self.dynamic_templates.push(id);
        }
        Ok(id)
    }
}

impl Builder for Document {
    fn fresh_frame(&mut self, parent: Option<FrameId>) -> FrameId {
        self.symbols.fresh_frame(parent)
    }

    fn add_position(&mut self, position: u32, offset: u32, line: u32, path: &str) {
        self.positions.add(position, offset, line, path);
    }

    fn add_parameter(
        &mut self,
        frame: FrameId,
        ty: Type,
        name: &str,
        pos: Position,
    ) -> Result<SymbolId, BuildError> {
        self.declare(frame, name, ty, pos, DeclRef::Parameter, false)
    }

    fn add_variable(
        &mut self,
        scope: ScopeRef,
        ty: Type,
        name: &str,
        init: Option<Expression>,
        pos: Position,
    ) -> Result<VariableId, BuildError> {
        let frame = self.scope_frame(scope);
        let uid = self.declare(frame, name, ty, pos, DeclRef::None, true)?;
        let id = self.new_variable(uid, init);
        self.scope_decls(scope).variables.push(id);
        Ok(id)
    }

    fn add_function_local(
        &mut self,
        func: FunctionId,
        frame: FrameId,
        ty: Type,
        name: &str,
        init: Option<Expression>,
        pos: Position,
    ) -> Result<VariableId, BuildError> {
        if func >= self.functions.len() {
            return Err(BuildError::BadIndex("function"));
        }
        let uid = self.declare(frame, name, ty, pos, DeclRef::None, true)?;
        let id = self.new_variable(uid, init);
        self.functions[func].variables.push(id);
        Ok(id)
    }

    fn add_typedef(
        &mut self,
        scope: ScopeRef,
        definition: Type,
        name: &str,
        pos: Position,
    ) -> Result<SymbolId, BuildError> {
        let frame = self.scope_frame(scope);
        let ty = Type::typename(name, definition);
        let uid = self.declare(frame, name, ty, pos, DeclRef::Typedef, false)?;
        self.scope_decls(scope).typedefs.push(uid);
        Ok(uid)
    }

    fn add_function(
        &mut self,
        scope: ScopeRef,
        ty: Type,
        name: &str,
        pos: Position,
    ) -> Result<FunctionId, BuildError> {
        let frame = self.scope_frame(scope);
        let uid = self.declare(frame, name, ty, pos, DeclRef::None, false)?;
        let id = self.new_function(uid);
        self.scope_decls(scope).functions.push(id);
        Ok(id)
    }

    fn set_function_body(&mut self, func: FunctionId, body: Block) -> Result<(), BuildError> {
        self.functions
            .get_mut(func)
            .ok_or(BuildError::BadIndex("function"))?
            .body = Some(body);
        Ok(())
    }

    fn add_template(
        &mut self,
        name: &str,
        parameters: FrameId,
        pos: Position,
        is_ta: bool,
        kind: &str,
        mode: &str,
    ) -> Result<TemplateId, BuildError> {
        self.new_template(name, parameters, pos, is_ta, false, kind, mode)
    }

    fn add_dynamic_template(
        &mut self,
        name: &str,
        parameters: FrameId,
        pos: Position,
    ) -> Result<TemplateId, BuildError> {
        self.new_template(name, parameters, pos, true, true, "", "")
    }

    fn add_location(
        &mut self,
        tpl: TemplateId,
        name: &str,
        urgent: bool,
        committed: bool,
        invariant: Option<Expression>,
        exp_rate: Option<Expression>,
        pos: Position,
    ) -> Result<usize, BuildError> {
        if tpl >= self.templates.len() {
            return Err(BuildError::BadIndex("template"));
        }
        let index = self.templates[tpl].locations.len();
        let mut ty = Type::location();
        if urgent {
            ty = ty.prefixed(Qualifier::Urgent);
        }
        if committed {
            ty = ty.prefixed(Qualifier::Committed);
        }
        let frame = self.templates[tpl].decls.frame;
        let uid = self.declare(frame, name, ty, pos, DeclRef::Location(tpl, index), false)?;
        let name_expr = Expression::resolved_ident(name, uid, pos);
        self.templates[tpl].locations.push(Location {
            uid,
            name: name_expr,
            invariant,
            exp_rate,
            cost_rate: None,
            nr: index as u32,
            rates: Vec::new(),
        });
        Ok(index)
    }

    fn set_cost_rate(
        &mut self,
        tpl: TemplateId,
        location: usize,
        rate: Expression,
    ) -> Result<(), BuildError> {
        self.templates
            .get_mut(tpl)
            .ok_or(BuildError::BadIndex("template"))?
            .locations
            .get_mut(location)
            .ok_or(BuildError::BadIndex("location"))?
            .cost_rate = Some(rate);
        Ok(())
    }

    fn set_init(&mut self, tpl: TemplateId, location: usize) -> Result<(), BuildError> {
        let t = self
            .templates
            .get_mut(tpl)
            .ok_or(BuildError::BadIndex("template"))?;
        let uid = t
            .locations
            .get(location)
            .ok_or(BuildError::BadIndex("location"))?
            .uid;
        t.init = Some(uid);
        Ok(())
    }

    fn add_branchpoint(
        &mut self,
        tpl: TemplateId,
        name: &str,
        pos: Position,
    ) -> Result<usize, BuildError> {
        if tpl >= self.templates.len() {
            return Err(BuildError::BadIndex("template"));
        }
        let index = self.templates[tpl].branchpoints.len();
        let frame = self.templates[tpl].decls.frame;
        let uid = self.declare(
            frame,
            name,
            Type::location(),
            pos,
            DeclRef::Branchpoint(tpl, index),
            false,
        )?;
        self.templates[tpl].branchpoints.push(Branchpoint {
            uid,
            nr: index as u32,
        });
        Ok(index)
    }

    fn add_edge(
        &mut self,
        tpl: TemplateId,
        src: EdgeEnd,
        dst: EdgeEnd,
        controllable: bool,
        actname: &str,
        _pos: Position,
    ) -> Result<usize, BuildError> {
        let t = self
            .templates
            .get_mut(tpl)
            .ok_or(BuildError::BadIndex("template"))?;
        for end in [src, dst] {
            match end {
                EdgeEnd::Location(i) if i >= t.locations.len() => {
                    return Err(BuildError::BadIndex("location"));
                }
                EdgeEnd::Branchpoint(i) if i >= t.branchpoints.len() => {
                    return Err(BuildError::BadIndex("branchpoint"));
                }
                _ => {}
            }
        }
        let index = t.edges.len();
        t.edges.push(Edge {
            nr: index as u32,
            controllable,
            actname: actname.to_string(),
            src,
            dst,
            select: None,
            guard: None,
            assign: None,
            sync: None,
            prob: None,
            select_values: Vec::new(),
        });
        self.modified = true;
        Ok(index)
    }

    fn add_select(
        &mut self,
        tpl: TemplateId,
        edge: usize,
        frame: FrameId,
    ) -> Result<(), BuildError> {
        self.edge_mut(tpl, edge)?.select = Some(frame);
        Ok(())
    }

    fn add_guard(
        &mut self,
        tpl: TemplateId,
        edge: usize,
        guard: Expression,
    ) -> Result<(), BuildError> {
        self.edge_mut(tpl, edge)?.guard = Some(guard);
        Ok(())
    }

    fn add_sync(
        &mut self,
        tpl: TemplateId,
        edge: usize,
        sync: Expression,
    ) -> Result<(), BuildError> {
        self.edge_mut(tpl, edge)?.sync = Some(sync);
        Ok(())
    }

    fn add_assign(
        &mut self,
        tpl: TemplateId,
        edge: usize,
        assign: Expression,
    ) -> Result<(), BuildError> {
        self.edge_mut(tpl, edge)?.assign = Some(assign);
        Ok(())
    }

    fn add_probability(
        &mut self,
        tpl: TemplateId,
        edge: usize,
        prob: Expression,
    ) -> Result<(), BuildError> {
        self.edge_mut(tpl, edge)?.prob = Some(prob);
        Ok(())
    }

    fn add_dynamic_eval(&mut self, tpl: TemplateId, expr: Expression) -> Result<usize, BuildError> {
        let t = self
            .templates
            .get_mut(tpl)
            .ok_or(BuildError::BadIndex("template"))?;
        t.dynamic_evals.push(expr);
        Ok(t.dynamic_evals.len() - 1)
    }

    fn add_instance_line(
        &mut self,
        tpl: TemplateId,
        instance: InstanceId,
    ) -> Result<usize, BuildError> {
        if instance >= self.lsc_instances.len() {
            return Err(BuildError::BadIndex("instance"));
        }
        let t = self
            .templates
            .get_mut(tpl)
            .ok_or(BuildError::BadIndex("template"))?;
        let nr = t.instance_lines.len() as u32;
        t.instance_lines.push(InstanceLine { instance, nr });
        let uid = self.lsc_instances[instance].uid;
        self.symbols
            .set_decl(uid, DeclRef::InstanceLine(tpl, nr as usize));
        Ok(nr as usize)
    }

    fn add_message(
        &mut self,
        tpl: TemplateId,
        src: usize,
        dst: usize,
        y: i32,
        label: Option<Expression>,
        in_prechart: bool,
        _pos: Position,
    ) -> Result<usize, BuildError> {
        let t = self
            .templates
            .get_mut(tpl)
            .ok_or(BuildError::BadIndex("template"))?;
        if src >= t.instance_lines.len() || dst >= t.instance_lines.len() {
            return Err(BuildError::BadIndex("instance line"));
        }
        let nr = t.messages.len() as u32;
        t.messages.push(Message {
            nr,
            y,
            src,
            dst,
            label,
            in_prechart,
        });
        Ok(nr as usize)
    }

    fn add_condition(
        &mut self,
        tpl: TemplateId,
        anchors: Vec<usize>,
        y: i32,
        label: Option<Expression>,
        in_prechart: bool,
        hot: bool,
        _pos: Position,
    ) -> Result<usize, BuildError> {
        let t = self
            .templates
            .get_mut(tpl)
            .ok_or(BuildError::BadIndex("template"))?;
        if anchors.iter().any(|&a| a >= t.instance_lines.len()) {
            return Err(BuildError::BadIndex("instance line"));
        }
        let nr = t.conditions.len() as u32;
        t.conditions.push(Condition {
            nr,
            y,
            anchors,
            label,
            in_prechart,
            hot,
        });
        Ok(nr as usize)
    }

    fn add_update(
        &mut self,
        tpl: TemplateId,
        anchor: usize,
        y: i32,
        label: Option<Expression>,
        in_prechart: bool,
        _pos: Position,
    ) -> Result<usize, BuildError> {
        let t = self
            .templates
            .get_mut(tpl)
            .ok_or(BuildError::BadIndex("template"))?;
        if anchor >= t.instance_lines.len() {
            return Err(BuildError::BadIndex("instance line"));
        }
        let nr = t.updates.len() as u32;
        t.updates.push(Update {
            nr,
            y,
            anchor,
            label,
            in_prechart,
        });
        Ok(nr as usize)
    }

    fn set_prechart(&mut self, tpl: TemplateId, has_prechart: bool) -> Result<(), BuildError> {
        self.templates
            .get_mut(tpl)
            .ok_or(BuildError::BadIndex("template"))?
            .has_prechart = has_prechart;
        Ok(())
    }

    fn add_instance(
        &mut self,
        name: &str,
        source: SymbolId,
        arguments: Vec<Expression>,
        pos: Position,
    ) -> Result<InstanceId, BuildError> {
        instantiation::add_instance(self, name, source, arguments, pos, false)
    }

    fn add_lsc_instance(
        &mut self,
        name: &str,
        source: SymbolId,
        arguments: Vec<Expression>,
        pos: Position,
    ) -> Result<InstanceId, BuildError> {
        instantiation::add_instance(self, name, source, arguments, pos, true)
    }

    fn add_process(&mut self, source: SymbolId, pos: Position) -> Result<(), BuildError> {
        instantiation::add_process(self, source, pos)
    }

    fn remove_process(&mut self, name: &str) -> Result<(), BuildError> {
        if self.processes.shift_remove(name).is_none() {
            self.add_error(
                Position::UNKNOWN,
                DiagnosticKind::NoSuchProcess(name.to_string()),
            );
            return Err(BuildError::NoSuchProcess(name.to_string()));
        }
        self.modified = true;
        Ok(())
    }

    fn add_query(&mut self, query: Query) {
        self.queries.push(query);
    }

    fn begin_chan_priority(&mut self, head: Expression) {
        self.has_priorities = true;
        self.chan_priorities.push(ChanPriority {
            head,
            tail: Vec::new(),
        });
    }

    fn add_chan_priority(
        &mut self,
        sep: PrioritySep,
        expr: Expression,
    ) -> Result<(), BuildError> {
        self.chan_priorities
            .last_mut()
            .ok_or(BuildError::NoPriorityHead)?
            .tail
            .push((sep, expr));
        Ok(())
    }

    fn set_proc_priority(&mut self, name: &str, priority: i32) {
        self.has_priorities = true;
        self.proc_priority.insert(name.to_string(), priority);
    }

    fn add_progress_measure(
        &mut self,
        scope: ScopeRef,
        guard: Option<Expression>,
        measure: Expression,
    ) {
        self.scope_decls(scope)
            .progress
            .push(Progress { guard, measure });
    }

    fn add_io_decl(&mut self, scope: ScopeRef, decl: IoDecl) {
        self.scope_decls(scope).iodecl.push(decl);
    }

    fn add_gantt(&mut self, scope: ScopeRef, gantt: Gantt) {
        self.scope_decls(scope).gantt.push(gantt);
    }

    fn set_before_update(&mut self, expr: Expression) {
        self.before_update = Some(expr);
    }

    fn set_after_update(&mut self, expr: Expression) {
        self.after_update = Some(expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticKind;

    const P: Position = Position::UNKNOWN;

    #[test]
    fn duplicate_global_variable_is_one_error() {
        let mut doc = Document::new();
        doc.add_variable(ScopeRef::Global, Type::int(), "a", None, P)
            .unwrap();
        let err = doc
            .add_variable(ScopeRef::Global, Type::int(), "a", None, P)
            .unwrap_err();
        assert_eq!(err, BuildError::Duplicate("a".into()));
        assert_eq!(doc.errors().len(), 1);
        assert!(matches!(
            doc.errors()[0].kind,
            DiagnosticKind::DuplicateDefinition(_)
        ));
        // first declaration survives
        assert_eq!(doc.globals.variables.len(), 1);
    }

    #[test]
    fn template_local_shadowing_warns() {
        let mut doc = Document::new();
        doc.add_variable(ScopeRef::Global, Type::int(), "x", None, P)
            .unwrap();
        let params = doc.fresh_frame(Some(doc.global_frame()));
        let t = doc.add_template("T", params, P, true, "", "").unwrap();
        doc.add_variable(ScopeRef::Template(t), Type::bool_(), "x", None, P)
            .unwrap();
        assert_eq!(doc.warnings().len(), 1);
        assert!(matches!(
            doc.warnings()[0].kind,
            DiagnosticKind::ShadowsAVariable(_)
        ));
        assert!(doc.errors().is_empty());
    }

    #[test]
    fn edges_validate_their_endpoints() {
        let mut doc = Document::new();
        let params = doc.fresh_frame(Some(doc.global_frame()));
        let t = doc.add_template("T", params, P, true, "", "").unwrap();
        let l0 = doc
            .add_location(t, "L0", false, false, None, None, P)
            .unwrap();
        let err = doc
            .add_edge(t, EdgeEnd::Location(l0), EdgeEnd::Location(7), true, "", P)
            .unwrap_err();
        assert_eq!(err, BuildError::BadIndex("location"));
        let e = doc
            .add_edge(t, EdgeEnd::Location(l0), EdgeEnd::Location(l0), true, "", P)
            .unwrap();
        assert_eq!(doc.templates[t].edges[e].src.location(), Some(l0));
        assert_eq!(doc.templates[t].edges[e].src.branchpoint(), None);
    }

    #[test]
    fn chan_priority_requires_head() {
        let mut doc = Document::new();
        let c = Expression::ident("c", P);
        assert_eq!(
            doc.add_chan_priority(PrioritySep::Strict, c.clone()),
            Err(BuildError::NoPriorityHead)
        );
        doc.begin_chan_priority(c.clone());
        doc.add_chan_priority(PrioritySep::Strict, c).unwrap();
        assert!(doc.has_priority_declaration());
        assert_eq!(doc.chan_priorities[0].tail.len(), 1);
    }

    #[test]
    fn dynamic_templates_are_listed_separately() {
        let mut doc = Document::new();
        let p1 = doc.fresh_frame(Some(doc.global_frame()));
        let p2 = doc.fresh_frame(Some(doc.global_frame()));
        doc.add_template("Static", p1, P, true, "", "").unwrap();
        let d = doc.add_dynamic_template("Spawned", p2, P).unwrap();
        assert_eq!(doc.dynamic_templates, vec![d]);
        assert_eq!(doc.dynamic_template("Spawned"), Some(d));
        assert_eq!(doc.dynamic_template("Static"), None);
        assert_eq!(doc.find_template("Spawned"), None);
        assert!(doc.has_dynamic_templates());

        assert_eq!(doc.require_dynamic_template("Spawned", P), Some(d));
        assert!(doc.require_dynamic_template("Nope", P).is_none());
        assert!(matches!(
            doc.errors()[0].kind,
            DiagnosticKind::UnknownDynamicTemplate(_)
        ));
    }
}
