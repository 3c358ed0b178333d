//! The in-memory model: globals, templates, instances, processes, queries.
//!
//! All containers are append-only so indices handed out while building stay
//! valid for the document's lifetime. The one exception is
//! `remove_process`, which runs only before type checking and addresses
//! processes by name.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::diagnostic::{Diagnostic, DiagnosticKind, Severity};
use crate::expression::Expression;
use crate::intern::StringTable;
use crate::position::{Position, Positions};
use crate::statement::Block;
use crate::symbol::{
    DeclRef, FrameId, FunctionId, InstanceId, SymbolId, SymbolTable, TemplateId, VariableId,
};

/// Which analysis semantics the model still admits. All true by default;
/// the checker clears flags as it sees violating constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedMethods {
    pub symbolic: bool,
    pub stochastic: bool,
    pub concrete: bool,
}

impl Default for SupportedMethods {
    fn default() -> Self {
        SupportedMethods {
            symbolic: true,
            stochastic: true,
            concrete: true,
        }
    }
}

/// A declared variable: its symbol plus the optional initializer.
#[derive(Debug, Clone)]
pub struct Variable {
    pub uid: SymbolId,
    pub init: Option<Expression>,
}

/// A user-defined function. `changes` and `depends` are derived by the
/// checker.
#[derive(Debug, Clone)]
pub struct Function {
    pub uid: SymbolId,
    pub body: Option<Block>,
    /// Locals of the body and all nested blocks, flattened.
    pub variables: Vec<VariableId>,
    pub changes: IndexSet<SymbolId>,
    pub depends: IndexSet<SymbolId>,
}

/// A progress measure: `measure` must increase whenever `guard` holds.
#[derive(Debug, Clone)]
pub struct Progress {
    pub guard: Option<Expression>,
    pub measure: Expression,
}

/// Input/output declaration for an instance.
#[derive(Debug, Clone, Default)]
pub struct IoDecl {
    pub instance_name: String,
    pub param: Vec<Expression>,
    pub inputs: Vec<Expression>,
    pub outputs: Vec<Expression>,
    pub csp: Vec<Expression>,
}

/// One `bool expr -> int expr` entry of a gantt chart, expandable over its
/// select parameters.
#[derive(Debug, Clone)]
pub struct GanttEntry {
    pub parameters: FrameId,
    pub predicate: Expression,
    pub mapping: Expression,
}

#[derive(Debug, Clone)]
pub struct Gantt {
    pub name: String,
    pub parameters: FrameId,
    pub mapping: Vec<GanttEntry>,
}

/// Declarations shared by the global scope and each template.
#[derive(Debug, Clone)]
pub struct Declarations {
    pub frame: FrameId,
    pub variables: Vec<VariableId>,
    pub functions: Vec<FunctionId>,
    pub typedefs: Vec<SymbolId>,
    pub progress: Vec<Progress>,
    pub iodecl: Vec<IoDecl>,
    pub gantt: Vec<Gantt>,
}

impl Declarations {
    pub fn new(frame: FrameId) -> Self {
        Declarations {
            frame,
            variables: Vec::new(),
            functions: Vec::new(),
            typedefs: Vec::new(),
            progress: Vec::new(),
            iodecl: Vec::new(),
            gantt: Vec::new(),
        }
    }
}

/// A clock rate factored out of an invariant by the checker.
#[derive(Debug, Clone)]
pub struct Rate {
    pub clock: SymbolId,
    pub expr: Expression,
}

/// A location. Urgency and committedness are qualifiers on the symbol's
/// location type. The `rates` list is populated by the checker; until then
/// rate expressions are part of the invariant.
#[derive(Debug, Clone)]
pub struct Location {
    pub uid: SymbolId,
    pub name: Expression,
    pub invariant: Option<Expression>,
    pub exp_rate: Option<Expression>,
    pub cost_rate: Option<Expression>,
    pub nr: u32,
    pub rates: Vec<Rate>,
}

/// A pseudo-location joining edges that share source, guard, and sync.
#[derive(Debug, Clone)]
pub struct Branchpoint {
    pub uid: SymbolId,
    pub nr: u32,
}

/// An edge endpoint: exactly one of location or branchpoint, by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEnd {
    Location(usize),
    Branchpoint(usize),
}

impl EdgeEnd {
    pub fn location(&self) -> Option<usize> {
        match self {
            EdgeEnd::Location(i) => Some(*i),
            EdgeEnd::Branchpoint(_) => None,
        }
    }

    pub fn branchpoint(&self) -> Option<usize> {
        match self {
            EdgeEnd::Branchpoint(i) => Some(*i),
            EdgeEnd::Location(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub nr: u32,
    pub controllable: bool,
    pub actname: String,
    pub src: EdgeEnd,
    pub dst: EdgeEnd,
    /// Frame for the non-deterministic select binders.
    pub select: Option<FrameId>,
    pub guard: Option<Expression>,
    pub assign: Option<Expression>,
    pub sync: Option<Expression>,
    pub prob: Option<Expression>,
    /// Domain size per select binder, enumerated by the checker.
    pub select_values: Vec<i64>,
}

/// An LSC instance line, derived from an LSC instance.
#[derive(Debug, Clone)]
pub struct InstanceLine {
    pub instance: InstanceId,
    pub nr: u32,
}

/// An LSC message between two instance lines.
#[derive(Debug, Clone)]
pub struct Message {
    pub nr: u32,
    /// Vertical coordinate; simregions group entities sharing it.
    pub y: i32,
    pub src: usize,
    pub dst: usize,
    pub label: Option<Expression>,
    pub in_prechart: bool,
}

/// An LSC condition anchored on one or more instance lines.
#[derive(Debug, Clone)]
pub struct Condition {
    pub nr: u32,
    pub y: i32,
    pub anchors: Vec<usize>,
    pub label: Option<Expression>,
    pub in_prechart: bool,
    pub hot: bool,
}

/// An LSC update anchored on an instance line.
#[derive(Debug, Clone)]
pub struct Update {
    pub nr: u32,
    pub y: i32,
    pub anchor: usize,
    pub label: Option<Expression>,
    pub in_prechart: bool,
}

/// A single logical LSC step: at most one message, condition, and update,
/// each slot explicitly optional. A simregion with all slots empty is
/// rejected by the checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simregion {
    pub nr: usize,
    pub message: Option<usize>,
    pub condition: Option<usize>,
    pub update: Option<usize>,
}

impl Simregion {
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.condition.is_none() && self.update.is_none()
    }
}

/// A horizontally consistent set of simregions.
#[derive(Debug, Clone, Default)]
pub struct Cut {
    pub nr: usize,
    pub simregions: Vec<Simregion>,
}

impl Cut {
    pub fn new(nr: usize) -> Self {
        Cut {
            nr,
            simregions: Vec::new(),
        }
    }

    pub fn add(&mut self, s: Simregion) {
        self.simregions.push(s);
    }

    pub fn contains(&self, s: &Simregion) -> bool {
        self.simregions.iter().any(|r| r == s)
    }

    /// Set equality, ignoring order.
    pub fn equals(&self, other: &Cut) -> bool {
        self.simregions.len() == other.simregions.len()
            && self.simregions.iter().all(|s| other.contains(s))
    }
}

/// A (possibly partial) application of a template.
///
/// `parameters` lists unbound symbols first; `mapping` binds the rest.
/// Partial instances compose associatively because parameters and arguments
/// are flattened rather than nested.
#[derive(Debug, Clone)]
pub struct Instance {
    pub uid: SymbolId,
    pub template: TemplateId,
    pub parameters: FrameId,
    pub unbound: usize,
    pub arguments: usize,
    pub mapping: IndexMap<SymbolId, Expression>,
    /// Parameters that transitively determine an array size.
    pub restricted: IndexSet<SymbolId>,
}

/// A parametric automaton, or for LSCs a scenario chart.
#[derive(Debug, Clone)]
pub struct Template {
    pub uid: SymbolId,
    pub parameters: FrameId,
    pub decls: Declarations,
    pub init: Option<SymbolId>,
    pub locations: Vec<Location>,
    pub branchpoints: Vec<Branchpoint>,
    pub edges: Vec<Edge>,
    pub is_ta: bool,
    pub dynamic: bool,
    pub dyn_index: usize,
    pub dynamic_evals: Vec<Expression>,
    // LSC storage
    pub instance_lines: Vec<InstanceLine>,
    pub messages: Vec<Message>,
    pub conditions: Vec<Condition>,
    pub updates: Vec<Update>,
    pub kind: String,
    pub mode: String,
    pub has_prechart: bool,
}

impl Template {
    /// The Y coordinate shared by a simregion's present parts.
    pub fn simregion_y(&self, s: &Simregion) -> Option<i32> {
        s.message
            .map(|i| self.messages[i].y)
            .or_else(|| s.condition.map(|i| self.conditions[i].y))
            .or_else(|| s.update.map(|i| self.updates[i].y))
    }

    /// A simregion is in the prechart iff all present parts are.
    pub fn simregion_in_prechart(&self, s: &Simregion) -> bool {
        let mut any = false;
        let mut all = true;
        if let Some(i) = s.message {
            any = true;
            all &= self.messages[i].in_prechart;
        }
        if let Some(i) = s.condition {
            any = true;
            all &= self.conditions[i].in_prechart;
        }
        if let Some(i) = s.update {
            any = true;
            all &= self.updates[i].in_prechart;
        }
        any && all
    }

    /// Instance lines a simregion touches.
    pub fn simregion_lines(&self, s: &Simregion) -> IndexSet<usize> {
        let mut lines = IndexSet::new();
        if let Some(i) = s.message {
            lines.insert(self.messages[i].src);
            lines.insert(self.messages[i].dst);
        }
        if let Some(i) = s.condition {
            lines.extend(self.conditions[i].anchors.iter().copied());
        }
        if let Some(i) = s.update {
            lines.insert(self.updates[i].anchor);
        }
        lines
    }

    /// Group messages, conditions, and updates into simregions: entities at
    /// the same Y coordinate sharing an instance line form one logical step.
    pub fn simregions(&self) -> Vec<Simregion> {
        let mut regions: Vec<Simregion> = self
            .messages
            .iter()
            .enumerate()
            .map(|(i, _)| Simregion {
                nr: 0,
                message: Some(i),
                condition: None,
                update: None,
            })
            .collect();
        for (i, c) in self.conditions.iter().enumerate() {
            let slot = regions.iter_mut().find(|r| {
                r.condition.is_none()
                    && self.simregion_y(r) == Some(c.y)
                    && self
                        .simregion_lines(r)
                        .iter()
                        .any(|l| c.anchors.contains(l))
            });
            match slot {
                Some(r) => r.condition = Some(i),
                None => regions.push(Simregion {
                    nr: 0,
                    message: None,
                    condition: Some(i),
                    update: None,
                }),
            }
        }
        for (i, u) in self.updates.iter().enumerate() {
            let slot = regions.iter_mut().find(|r| {
                r.update.is_none()
                    && self.simregion_y(r) == Some(u.y)
                    && self.simregion_lines(r).contains(&u.anchor)
            });
            match slot {
                Some(r) => r.update = Some(i),
                None => regions.push(Simregion {
                    nr: 0,
                    message: None,
                    condition: None,
                    update: Some(i),
                }),
            }
        }
        regions.sort_by_key(|r| self.simregion_y(r));
        for (nr, r) in regions.iter_mut().enumerate() {
            r.nr = nr;
        }
        regions
    }

    /// The condition anchored on `line` at the given Y coordinate.
    pub fn condition_at(&self, line: usize, y: i32) -> Option<usize> {
        self.conditions
            .iter()
            .position(|c| c.y == y && c.anchors.contains(&line))
    }

    /// The update anchored on `line` at the given Y coordinate.
    pub fn update_at(&self, line: usize, y: i32) -> Option<usize> {
        self.updates
            .iter()
            .position(|u| u.y == y && u.anchor == line)
    }
}

/// Separator in a channel priority declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrioritySep {
    /// `,` — same priority level.
    Tie,
    /// `<` — the following expressions have strictly higher priority.
    Strict,
}

/// `head` followed by (separator, expression) pairs; each `<` starts a new
/// strictly-higher priority level.
#[derive(Debug, Clone)]
pub struct ChanPriority {
    pub head: Expression,
    pub tail: Vec<(PrioritySep, Expression)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectationType {
    Symbolic,
    Probability,
    NumericValue,
    ErrorValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    True,
    False,
    MaybeTrue,
    MaybeFalse,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub value: String,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    pub value_type: ExpectationType,
    pub status: QueryStatus,
    pub value: String,
    pub resources: Vec<Resource>,
}

impl Default for Expectation {
    fn default() -> Self {
        Expectation {
            value_type: ExpectationType::Symbolic,
            status: QueryStatus::Unknown,
            value: String::new(),
            resources: Vec::new(),
        }
    }
}

/// A verification query: the formula stays a verbatim string for the
/// query grammar; only options and strategy usage are validated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Query {
    pub formula: String,
    pub comment: String,
    pub options: Vec<ModelOption>,
    pub expectation: Expectation,
    pub location: String,
}

/// The root container. Field layout mirrors the data model in SPEC_FULL.md;
/// arenas are append-only.
#[derive(Debug, Clone)]
pub struct Document {
    pub symbols: SymbolTable,
    pub globals: Declarations,
    pub variables: Vec<Variable>,
    pub functions: Vec<Function>,
    pub templates: Vec<Template>,
    pub dynamic_templates: Vec<TemplateId>,
    pub instances: Vec<Instance>,
    pub lsc_instances: Vec<Instance>,
    pub processes: IndexMap<String, Instance>,
    pub queries: Vec<Query>,
    pub chan_priorities: Vec<ChanPriority>,
    pub proc_priority: IndexMap<String, i32>,
    pub model_options: Vec<ModelOption>,
    pub before_update: Option<Expression>,
    pub after_update: Option<Expression>,
    pub strings: StringTable,
    pub positions: Positions,
    pub supported_methods: SupportedMethods,

    // Global flags derived while building and checking.
    pub has_urgent_transition: bool,
    pub has_priorities: bool,
    pub has_strict_invariants: bool,
    pub stops_clock: bool,
    pub has_strict_lower_bound_on_controllable_edges: bool,
    pub has_guard_on_recv_broadcast: bool,
    /// 0 = none, 1 = handshake, 2 = broadcast observed.
    pub sync_used: i32,
    pub modified: bool,

    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Document {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        let global_frame = symbols.fresh_frame(None);
        Document {
            symbols,
            globals: Declarations::new(global_frame),
            variables: Vec::new(),
            functions: Vec::new(),
            templates: Vec::new(),
            dynamic_templates: Vec::new(),
            instances: Vec::new(),
            lsc_instances: Vec::new(),
            processes: IndexMap::new(),
            queries: Vec::new(),
            chan_priorities: Vec::new(),
            proc_priority: IndexMap::new(),
            model_options: Vec::new(),
            before_update: None,
            after_update: None,
            strings: StringTable::new(),
            positions: Positions::new(),
            supported_methods: SupportedMethods::default(),
            has_urgent_transition: false,
            has_priorities: false,
            has_strict_invariants: false,
            stops_clock: false,
            has_strict_lower_bound_on_controllable_edges: false,
            has_guard_on_recv_broadcast: false,
            sync_used: 0,
            modified: false,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn global_frame(&self) -> FrameId {
        self.globals.frame
    }

    pub fn find_template(&self, name: &str) -> Option<TemplateId> {
        self.templates.iter().position(|t| {
            self.symbols.name(t.uid) == name && !t.dynamic
        })
    }

    pub fn dynamic_template(&self, name: &str) -> Option<TemplateId> {
        self.dynamic_templates
            .iter()
            .copied()
            .find(|&t| self.symbols.name(self.templates[t].uid) == name)
    }

    pub fn has_dynamic_templates(&self) -> bool {
        !self.dynamic_templates.is_empty()
    }

    /// Dynamic-template lookup for spawn expressions; a miss is recorded as
    /// an error on the document.
    pub fn require_dynamic_template(
        &mut self,
        name: &str,
        pos: Position,
    ) -> Option<TemplateId> {
        let found = self.dynamic_template(name);
        if found.is_none() {
            self.add_error(pos, DiagnosticKind::UnknownDynamicTemplate(name.to_string()));
        }
        found
    }

    pub fn process(&self, name: &str) -> Option<&Instance> {
        self.processes.get(name)
    }

    pub fn has_priority_declaration(&self) -> bool {
        self.has_priorities || !self.chan_priorities.is_empty() || !self.proc_priority.is_empty()
    }

    pub fn proc_priority(&self, name: &str) -> Option<i32> {
        self.proc_priority.get(name).copied()
    }

    // -----------------------------------------------------------------
    // Diagnostics sink
    // -----------------------------------------------------------------

    pub fn add_error(&mut self, position: Position, kind: DiagnosticKind) {
        self.errors.push(Diagnostic::error(position, kind));
    }

    pub fn add_warning(&mut self, position: Position, kind: DiagnosticKind) {
        self.warnings.push(Diagnostic::warning(position, kind));
    }

    pub fn add_diagnostic(&mut self, diag: Diagnostic) {
        match diag.severity {
            Severity::Error => self.errors.push(diag),
            Severity::Warning => self.warnings.push(diag),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn clear_warnings(&mut self) {
        self.warnings.clear();
    }

    // -----------------------------------------------------------------
    // Arena helpers shared by the builder and the instantiation engine
    // -----------------------------------------------------------------

    pub(crate) fn new_variable(&mut self, uid: SymbolId, init: Option<Expression>) -> VariableId {
        let id = self.variables.len();
        self.variables.push(Variable { uid, init });
        self.symbols.set_decl(uid, DeclRef::Variable(id));
        id
    }

    pub(crate) fn new_function(&mut self, uid: SymbolId) -> FunctionId {
        let id = self.functions.len();
        self.functions.push(Function {
            uid,
            body: None,
            variables: Vec::new(),
            changes: IndexSet::new(),
            depends: IndexSet::new(),
        });
        self.symbols.set_decl(uid, DeclRef::Function(id));
        id
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use crate::types::Type;

    fn lsc_template(doc: &mut Document) -> Template {
        let params = doc.symbols.fresh_frame(Some(doc.global_frame()));
        let frame = doc.symbols.fresh_frame(Some(doc.global_frame()));
        let uid = doc
            .symbols
            .add_symbol(
                doc.global_frame(),
                "Chart",
                Type::process(),
                Position::UNKNOWN,
                DeclRef::None,
            )
            .unwrap();
        Template {
            uid,
            parameters: params,
            decls: Declarations::new(frame),
            init: None,
            locations: Vec::new(),
            branchpoints: Vec::new(),
            edges: Vec::new(),
            is_ta: false,
            dynamic: false,
            dyn_index: 0,
            dynamic_evals: Vec::new(),
            instance_lines: Vec::new(),
            messages: Vec::new(),
            conditions: Vec::new(),
            updates: Vec::new(),
            kind: "LSC".into(),
            mode: "invariant".into(),
            has_prechart: true,
        }
    }

    #[test]
    fn simregions_group_by_y_and_shared_line() {
        let mut doc = Document::new();
        let mut t = lsc_template(&mut doc);
        t.instance_lines.push(InstanceLine { instance: 0, nr: 0 });
        t.instance_lines.push(InstanceLine { instance: 0, nr: 1 });
        t.messages.push(Message {
            nr: 0,
            y: 1,
            src: 0,
            dst: 1,
            label: None,
            in_prechart: true,
        });
        // same Y, anchored on the message's destination line: same region
        t.conditions.push(Condition {
            nr: 0,
            y: 1,
            anchors: vec![1],
            label: None,
            in_prechart: true,
            hot: false,
        });
        // different Y: own region
        t.updates.push(Update {
            nr: 0,
            y: 2,
            anchor: 0,
            label: None,
            in_prechart: false,
        });
        let regions = t.simregions();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].message, Some(0));
        assert_eq!(regions[0].condition, Some(0));
        assert_eq!(regions[0].update, None);
        assert_eq!(regions[1].update, Some(0));
        assert!(t.simregion_in_prechart(&regions[0]));
        assert!(!t.simregion_in_prechart(&regions[1]));
    }

    #[test]
    fn empty_simregion_contributes_nothing() {
        let mut doc = Document::new();
        let t = lsc_template(&mut doc);
        let empty = Simregion {
            nr: 0,
            message: None,
            condition: None,
            update: None,
        };
        assert!(empty.is_empty());
        assert_eq!(t.simregion_y(&empty), None);
        assert!(!t.simregion_in_prechart(&empty));
        assert!(t.simregion_lines(&empty).is_empty());
    }

    #[test]
    fn query_records_round_trip_through_serde() {
        let q = Query {
            formula: "A[] not deadlock".into(),
            comment: "basic safety".into(),
            options: vec![ModelOption {
                name: "--diagnostic".into(),
                value: "1".into(),
            }],
            expectation: Expectation {
                value_type: ExpectationType::Symbolic,
                status: QueryStatus::True,
                value: String::new(),
                resources: vec![Resource {
                    name: "time".into(),
                    value: "10".into(),
                    unit: Some("s".into()),
                }],
            },
            location: "model.xml".into(),
        };
        let json = serde_json::to_string(&q).unwrap();
        let back: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(q, back);
    }

    #[test]
    fn cut_equality_ignores_order() {
        let a = Simregion {
            nr: 0,
            message: Some(0),
            condition: None,
            update: None,
        };
        let b = Simregion {
            nr: 1,
            message: Some(1),
            condition: None,
            update: None,
        };
        let mut c1 = Cut::new(0);
        c1.add(a.clone());
        c1.add(b.clone());
        let mut c2 = Cut::new(1);
        c2.add(b);
        c2.add(a);
        assert!(c1.equals(&c2));
    }
}
