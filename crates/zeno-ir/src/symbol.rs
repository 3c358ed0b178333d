//! Symbols, lexical frames, and the arena that owns both.

use indexmap::IndexMap;
use thiserror::Error;

use crate::position::Position;
use crate::types::Type;

pub type SymbolId = usize;
pub type FrameId = usize;
pub type TemplateId = usize;
pub type VariableId = usize;
pub type FunctionId = usize;
pub type InstanceId = usize;

/// Back-reference from a symbol to its domain object: stable typed indices
/// into the document's arenas, never pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclRef {
    None,
    Variable(VariableId),
    Function(FunctionId),
    Location(TemplateId, usize),
    Branchpoint(TemplateId, usize),
    Template(TemplateId),
    Instance(InstanceId),
    LscInstance(InstanceId),
    InstanceLine(TemplateId, usize),
    /// Template/function parameters and select/quantifier binders.
    Parameter,
    Typedef,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    /// The frame the symbol was declared in.
    pub frame: FrameId,
    pub pos: Position,
    pub decl: DeclRef,
}

/// An ordered, append-only set of symbols with optional lexical parent.
///
/// A frame may also list symbols declared elsewhere (instance parameter
/// frames share the template's parameter symbols); `Symbol::frame` always
/// names the declaring frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub parent: Option<FrameId>,
    symbols: Vec<SymbolId>,
    by_name: IndexMap<String, SymbolId>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("duplicate definition of '{name}'")]
pub struct DuplicateName {
    pub name: String,
    pub previous: SymbolId,
}

/// Arena owning every symbol and frame of one document.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    frames: Vec<Frame>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_frame(&mut self, parent: Option<FrameId>) -> FrameId {
        debug_assert!(parent.map(|p| p < self.frames.len()).unwrap_or(true));
        let id = self.frames.len();
        self.frames.push(Frame {
            parent,
            symbols: Vec::new(),
            by_name: IndexMap::new(),
        });
        id
    }

    /// Declare a new symbol in `frame`. Fails when the name already exists
    /// locally; shadowing of outer frames is the caller's concern.
    pub fn add_symbol(
        &mut self,
        frame: FrameId,
        name: impl Into<String>,
        ty: Type,
        pos: Position,
        decl: DeclRef,
    ) -> Result<SymbolId, DuplicateName> {
        let name = name.into();
        if let Some(&previous) = self.frames[frame].by_name.get(&name) {
            return Err(DuplicateName { name, previous });
        }
        let id = self.symbols.len();
        self.symbols.push(Symbol {
            name: name.clone(),
            ty,
            frame,
            pos,
            decl,
        });
        self.frames[frame].symbols.push(id);
        self.frames[frame].by_name.insert(name, id);
        Ok(id)
    }

    /// List an existing symbol in another frame without re-declaring it.
    pub fn adopt(&mut self, frame: FrameId, sym: SymbolId) -> Result<(), DuplicateName> {
        let name = self.symbols[sym].name.clone();
        if let Some(&previous) = self.frames[frame].by_name.get(&name) {
            return Err(DuplicateName { name, previous });
        }
        self.frames[frame].symbols.push(sym);
        self.frames[frame].by_name.insert(name, sym);
        Ok(())
    }

    pub fn local(&self, frame: FrameId, name: &str) -> Option<SymbolId> {
        self.frames[frame].by_name.get(name).copied()
    }

    /// Search the frame chain, innermost first.
    pub fn resolve(&self, frame: FrameId, name: &str) -> Option<SymbolId> {
        let mut f = Some(frame);
        while let Some(id) = f {
            if let Some(sym) = self.local(id, name) {
                return Some(sym);
            }
            f = self.frames[id].parent;
        }
        None
    }

    /// The nearest declaration the given name would shadow, ignoring the
    /// frame itself. Used for the shadowing warning.
    pub fn shadow_of(&self, frame: FrameId, name: &str) -> Option<SymbolId> {
        self.frames[frame]
            .parent
            .and_then(|p| self.resolve(p, name))
    }

    pub fn frame_symbols(&self, frame: FrameId) -> &[SymbolId] {
        &self.frames[frame].symbols
    }

    pub fn frame_size(&self, frame: FrameId) -> usize {
        self.frames[frame].symbols.len()
    }

    pub fn parent(&self, frame: FrameId) -> Option<FrameId> {
        self.frames[frame].parent
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.symbols[id].name
    }

    pub fn type_of(&self, id: SymbolId) -> &Type {
        &self.symbols[id].ty
    }

    pub fn decl_of(&self, id: SymbolId) -> DeclRef {
        self.symbols[id].decl
    }

    pub fn set_type(&mut self, id: SymbolId, ty: Type) {
        self.symbols[id].ty = ty;
    }

    pub fn set_decl(&mut self, id: SymbolId, decl: DeclRef) {
        self.symbols[id].decl = decl;
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        SymbolTable::new()
    }

    #[test]
    fn add_and_resolve_local() {
        let mut t = table();
        let g = t.fresh_frame(None);
        let x = t
            .add_symbol(g, "x", Type::clock(), Position::UNKNOWN, DeclRef::None)
            .unwrap();
        assert_eq!(t.resolve(g, "x"), Some(x));
        assert_eq!(t.resolve(g, "y"), None);
        assert_eq!(t.frame_size(g), 1);
    }

    #[test]
    fn duplicate_in_same_frame_is_rejected() {
        let mut t = table();
        let g = t.fresh_frame(None);
        let first = t
            .add_symbol(g, "a", Type::int(), Position::UNKNOWN, DeclRef::None)
            .unwrap();
        let err = t
            .add_symbol(g, "a", Type::int(), Position::UNKNOWN, DeclRef::None)
            .unwrap_err();
        assert_eq!(err.previous, first);
        assert_eq!(t.frame_size(g), 1);
    }

    #[test]
    fn resolution_prefers_innermost() {
        let mut t = table();
        let g = t.fresh_frame(None);
        let inner = t.fresh_frame(Some(g));
        let outer_x = t
            .add_symbol(g, "x", Type::int(), Position::UNKNOWN, DeclRef::None)
            .unwrap();
        let inner_x = t
            .add_symbol(inner, "x", Type::bool_(), Position::UNKNOWN, DeclRef::None)
            .unwrap();
        assert_eq!(t.resolve(inner, "x"), Some(inner_x));
        assert_eq!(t.resolve(g, "x"), Some(outer_x));
        assert_eq!(t.shadow_of(inner, "x"), Some(outer_x));
        assert_eq!(t.shadow_of(g, "x"), None);
    }

    #[test]
    fn adopt_shares_symbols_between_frames() {
        let mut t = table();
        let g = t.fresh_frame(None);
        let params = t.fresh_frame(None);
        let n = t
            .add_symbol(params, "N", Type::int(), Position::UNKNOWN, DeclRef::Parameter)
            .unwrap();
        let copy = t.fresh_frame(Some(g));
        t.adopt(copy, n).unwrap();
        assert_eq!(t.resolve(copy, "N"), Some(n));
        // the declaring frame is unchanged
        assert_eq!(t.symbol(n).frame, params);
    }
}
