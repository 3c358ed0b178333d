//! The structural type algebra.
//!
//! Types are trees over atomic and compound kinds. Array sizes and range
//! bounds are expressions, so types and expressions are mutually recursive;
//! the cycle is broken with owned children rather than shared pointers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expression::Expression;
use crate::symbol::SymbolId;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// Not yet assigned by the checker. Never survives a successful pass.
    Unknown,
    Void,
    Clock,
    Bool,
    Int,
    Double,
    Channel,
    Scalar,
    String,
    Process,
    /// The type of location symbols; urgency/committedness are qualifiers.
    Location,
    /// Bounded integral type `base[lo, hi]`; bounds are expressions.
    Range,
    /// `elem[size]`; the size is an expression.
    Array,
    /// Ordered labeled fields.
    Record,
    /// Reference parameter type.
    Ref,
    /// `fields[0]` is the result, the rest are parameters.
    Function,
    /// A named type; `fields[0]` holds the definition, unfolded lazily.
    Typename,
}

/// Prefix qualifiers. Validity depends on the kind they are applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Qualifier {
    Const,
    Urgent,
    Broadcast,
    Committed,
    Meta,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Qualifiers {
    pub constant: bool,
    pub urgent: bool,
    pub broadcast: bool,
    pub committed: bool,
    pub meta: bool,
    pub hybrid: bool,
}

impl Qualifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn any(&self) -> bool {
        self.constant || self.urgent || self.broadcast || self.committed || self.meta || self.hybrid
    }

    pub fn has(&self, q: Qualifier) -> bool {
        match q {
            Qualifier::Const => self.constant,
            Qualifier::Urgent => self.urgent,
            Qualifier::Broadcast => self.broadcast,
            Qualifier::Committed => self.committed,
            Qualifier::Meta => self.meta,
            Qualifier::Hybrid => self.hybrid,
        }
    }

    fn set(&mut self, q: Qualifier) {
        match q {
            Qualifier::Const => self.constant = true,
            Qualifier::Urgent => self.urgent = true,
            Qualifier::Broadcast => self.broadcast = true,
            Qualifier::Committed => self.committed = true,
            Qualifier::Meta => self.meta = true,
            Qualifier::Hybrid => self.hybrid = true,
        }
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, word) in [
            (self.constant, "const"),
            (self.urgent, "urgent"),
            (self.broadcast, "broadcast"),
            (self.committed, "committed"),
            (self.meta, "meta"),
            (self.hybrid, "hybrid"),
        ] {
            if on {
                write!(f, "{word} ")?;
            }
        }
        Ok(())
    }
}

/// A labeled sub-type: record field, function parameter, or anonymous child.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub label: Option<String>,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    kind: TypeKind,
    pub quals: Qualifiers,
    fields: Vec<Field>,
    exprs: Vec<Expression>,
    /// Typename and scalar-set identity.
    pub name: Option<String>,
}

impl Default for Type {
    fn default() -> Self {
        Type::unknown()
    }
}

impl Type {
    fn bare(kind: TypeKind) -> Self {
        Type {
            kind,
            quals: Qualifiers::none(),
            fields: Vec::new(),
            exprs: Vec::new(),
            name: None,
        }
    }

    pub fn unknown() -> Self {
        Type::bare(TypeKind::Unknown)
    }

    pub fn void() -> Self {
        Type::bare(TypeKind::Void)
    }

    pub fn clock() -> Self {
        Type::bare(TypeKind::Clock)
    }

    pub fn bool_() -> Self {
        Type::bare(TypeKind::Bool)
    }

    pub fn int() -> Self {
        Type::bare(TypeKind::Int)
    }

    pub fn double() -> Self {
        Type::bare(TypeKind::Double)
    }

    pub fn channel() -> Self {
        Type::bare(TypeKind::Channel)
    }

    pub fn string() -> Self {
        Type::bare(TypeKind::String)
    }

    pub fn process() -> Self {
        Type::bare(TypeKind::Process)
    }

    pub fn location() -> Self {
        Type::bare(TypeKind::Location)
    }

    /// Scalar sets are nominal: two sets with different names never compare
    /// equal, regardless of size.
    pub fn scalar(name: impl Into<String>, size: Expression) -> Self {
        let mut t = Type::bare(TypeKind::Scalar);
        t.name = Some(name.into());
        t.exprs = vec![size];
        t
    }

    pub fn range(base: Type, lo: Expression, hi: Expression) -> Self {
        let mut t = Type::bare(TypeKind::Range);
        t.fields = vec![Field {
            label: None,
            ty: base,
        }];
        t.exprs = vec![lo, hi];
        t
    }

    pub fn array_of(elem: Type, size: Expression) -> Self {
        let mut t = Type::bare(TypeKind::Array);
        t.fields = vec![Field {
            label: None,
            ty: elem,
        }];
        t.exprs = vec![size];
        t
    }

    pub fn record_of(fields: Vec<(String, Type)>) -> Self {
        let mut t = Type::bare(TypeKind::Record);
        t.fields = fields
            .into_iter()
            .map(|(label, ty)| Field {
                label: Some(label),
                ty,
            })
            .collect();
        t
    }

    pub fn ref_to(target: Type) -> Self {
        let mut t = Type::bare(TypeKind::Ref);
        t.fields = vec![Field {
            label: None,
            ty: target,
        }];
        t
    }

    pub fn function_of(result: Type, params: Vec<(Option<String>, Type)>) -> Self {
        let mut t = Type::bare(TypeKind::Function);
        t.fields.push(Field {
            label: None,
            ty: result,
        });
        t.fields
            .extend(params.into_iter().map(|(label, ty)| Field { label, ty }));
        t
    }

    /// The synthesized type of a list literal: unlabeled ordered fields.
    pub fn list_of(elements: Vec<Type>) -> Self {
        let mut t = Type::bare(TypeKind::Record);
        t.fields = elements
            .into_iter()
            .map(|ty| Field { label: None, ty })
            .collect();
        t
    }

    pub fn typename(name: impl Into<String>, definition: Type) -> Self {
        let mut t = Type::bare(TypeKind::Typename);
        t.name = Some(name.into());
        t.fields = vec![Field {
            label: None,
            ty: definition,
        }];
        t
    }

    // -----------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Chase typename indirections without touching qualifiers or ranges.
    pub fn unfolded(&self) -> &Type {
        let mut t = self;
        while t.kind == TypeKind::Typename {
            t = &t.fields[0].ty;
        }
        t
    }

    /// The kind after unfolding typenames and ranges.
    pub fn base_kind(&self) -> TypeKind {
        let mut t = self.unfolded();
        while t.kind == TypeKind::Range {
            t = t.fields[0].ty.unfolded();
        }
        t.kind
    }

    pub fn is(&self, kind: TypeKind) -> bool {
        self.unfolded().kind == kind
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == TypeKind::Unknown
    }

    pub fn is_void(&self) -> bool {
        self.is(TypeKind::Void)
    }

    pub fn is_clock(&self) -> bool {
        self.is(TypeKind::Clock)
    }

    pub fn is_double(&self) -> bool {
        self.is(TypeKind::Double)
    }

    pub fn is_channel(&self) -> bool {
        self.is(TypeKind::Channel)
    }

    pub fn is_scalar(&self) -> bool {
        self.base_kind() == TypeKind::Scalar
    }

    pub fn is_array(&self) -> bool {
        self.is(TypeKind::Array)
    }

    pub fn is_record(&self) -> bool {
        self.is(TypeKind::Record)
    }

    pub fn is_function(&self) -> bool {
        self.is(TypeKind::Function)
    }

    pub fn is_process(&self) -> bool {
        self.is(TypeKind::Process)
    }

    pub fn is_reference(&self) -> bool {
        self.is(TypeKind::Ref)
    }

    /// Bool, int, or a bounded range over them.
    pub fn is_integral(&self) -> bool {
        matches!(self.base_kind(), TypeKind::Bool | TypeKind::Int)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integral() || self.is_double()
    }

    /// Constness is structural: a record is constant when every field is.
    pub fn is_constant(&self) -> bool {
        if self.quals.constant {
            return true;
        }
        let t = self.unfolded();
        match t.kind {
            TypeKind::Record => !t.fields.is_empty() && t.fields.iter().all(|f| f.ty.is_constant()),
            TypeKind::Array | TypeKind::Range => t.fields[0].ty.is_constant(),
            _ => t.quals.constant,
        }
    }

    /// Number of sub-types: record fields, function result + parameters,
    /// or one for array/range/ref/typename wrappers.
    pub fn size(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, i: usize) -> &Type {
        &self.fields[i].ty
    }

    pub fn label(&self, i: usize) -> Option<&str> {
        self.fields[i].label.as_deref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Embedded size/bound expressions of this node (array size, range and
    /// scalar bounds). Mutable access is for checker passes that resolve and
    /// type the embedded expressions in place.
    pub fn exprs(&self) -> &[Expression] {
        &self.exprs
    }

    pub fn exprs_mut(&mut self) -> &mut [Expression] {
        &mut self.exprs
    }

    pub fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    /// Index of a record field (or labeled function parameter) by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.unfolded()
            .fields
            .iter()
            .position(|f| f.label.as_deref() == Some(name))
    }

    pub fn array_size(&self) -> Option<&Expression> {
        let t = self.unfolded();
        match t.kind {
            TypeKind::Array => t.exprs.first(),
            _ => None,
        }
    }

    pub fn range_bounds(&self) -> Option<(&Expression, &Expression)> {
        let t = self.unfolded();
        match t.kind {
            TypeKind::Range => Some((&t.exprs[0], &t.exprs[1])),
            _ => None,
        }
    }

    pub fn scalar_size(&self) -> Option<&Expression> {
        let t = self.unfolded();
        match t.kind {
            TypeKind::Scalar => t.exprs.first(),
            _ => None,
        }
    }

    /// Result type of a function type.
    pub fn result(&self) -> &Type {
        debug_assert!(self.is_function());
        self.unfolded().get(0)
    }

    /// Parameter types of a function type.
    pub fn parameters(&self) -> &[Field] {
        debug_assert!(self.is_function());
        &self.unfolded().fields[1..]
    }

    // -----------------------------------------------------------------
    // Construction from existing types
    // -----------------------------------------------------------------

    pub fn prefixed(mut self, q: Qualifier) -> Type {
        self.quals.set(q);
        self
    }

    pub fn has(&self, q: Qualifier) -> bool {
        self.quals.has(q)
    }

    /// The same type with all top-level qualifiers removed.
    pub fn stripped(&self) -> Type {
        let mut t = self.clone();
        t.quals = Qualifiers::none();
        t
    }

    /// Whether the qualifier set is legal for this kind.
    pub fn quals_valid(&self) -> bool {
        let base = self.base_kind();
        let q = &self.quals;
        let mut ok = true;
        if q.urgent {
            ok &= matches!(base, TypeKind::Channel | TypeKind::Location);
        }
        if q.broadcast {
            ok &= base == TypeKind::Channel;
        }
        if q.committed {
            ok &= base == TypeKind::Location;
        }
        if q.constant || q.meta {
            ok &= !matches!(
                base,
                TypeKind::Clock
                    | TypeKind::Channel
                    | TypeKind::Void
                    | TypeKind::Process
                    | TypeKind::Location
            );
        }
        if q.hybrid {
            ok &= base == TypeKind::Clock;
        }
        ok
    }

    /// Structural equality modulo typename unfolding. Qualifiers matter.
    pub fn same(&self, other: &Type) -> bool {
        let a = self.unfolded();
        let b = other.unfolded();
        if self.quals != other.quals || a.kind != b.kind {
            return false;
        }
        match a.kind {
            TypeKind::Scalar => a.name == b.name,
            _ => {
                a.fields.len() == b.fields.len()
                    && a.exprs.len() == b.exprs.len()
                    && a.fields.iter().zip(&b.fields).all(|(x, y)| {
                        x.label == y.label && x.ty.same(&y.ty) && x.ty.quals == y.ty.quals
                    })
                    && a.exprs.iter().zip(&b.exprs).all(|(x, y)| x == y)
            }
        }
    }

    /// Assignment compatibility: unfolds typenames and ranges, lets the
    /// arithmetic kinds mix, and compares compound types structurally.
    pub fn compatible(&self, other: &Type) -> bool {
        let a = self.unfolded();
        let b = other.unfolded();
        match (a.base_kind(), b.base_kind()) {
            (TypeKind::Bool | TypeKind::Int | TypeKind::Double, _) if b.is_arithmetic() => true,
            (TypeKind::Clock, _) if b.is_arithmetic() => true,
            (TypeKind::Clock, TypeKind::Clock) => true,
            (TypeKind::Scalar, TypeKind::Scalar) => a.scalar_identity() == b.scalar_identity(),
            (TypeKind::Channel, TypeKind::Channel) => true,
            (TypeKind::Record, TypeKind::Record) => {
                let (ra, rb) = (a.unfolded(), b.unfolded());
                ra.fields.len() == rb.fields.len()
                    && ra
                        .fields
                        .iter()
                        .zip(&rb.fields)
                        .all(|(x, y)| x.ty.compatible(&y.ty))
            }
            (TypeKind::Array, TypeKind::Array) => {
                a.unfolded().get(0).compatible(b.unfolded().get(0))
                    && a.array_size() == b.array_size()
            }
            (TypeKind::Process, TypeKind::Process) => true,
            (TypeKind::String, TypeKind::String) => true,
            _ => false,
        }
    }

    fn scalar_identity(&self) -> Option<&str> {
        let mut t = self.unfolded();
        while t.kind == TypeKind::Range {
            t = t.fields[0].ty.unfolded();
        }
        t.name.as_deref()
    }

    /// Rebuild the type with embedded expressions substituted.
    pub fn substitute(&self, map: &IndexMap<SymbolId, Expression>) -> Type {
        Type {
            kind: self.kind,
            quals: self.quals,
            name: self.name.clone(),
            fields: self
                .fields
                .iter()
                .map(|f| Field {
                    label: f.label.clone(),
                    ty: f.ty.substitute(map),
                })
                .collect(),
            exprs: self.exprs.iter().map(|e| e.substitute(map)).collect(),
        }
    }

    /// Collect the free symbols of every embedded size/bound expression,
    /// recursively through sub-types.
    pub fn collect_size_symbols(&self, out: &mut indexmap::IndexSet<SymbolId>) {
        for e in &self.exprs {
            e.collect_free_symbols(out);
        }
        for f in &self.fields {
            f.ty.collect_size_symbols(out);
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.quals)?;
        match self.kind {
            TypeKind::Unknown => write!(f, "?"),
            TypeKind::Void => write!(f, "void"),
            TypeKind::Clock => write!(f, "clock"),
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::Int => write!(f, "int"),
            TypeKind::Double => write!(f, "double"),
            TypeKind::Channel => write!(f, "chan"),
            TypeKind::String => write!(f, "string"),
            TypeKind::Process => write!(f, "process"),
            TypeKind::Location => write!(f, "location"),
            TypeKind::Scalar => match (&self.name, self.exprs.first()) {
                (Some(n), _) => write!(f, "{n}"),
                (None, Some(size)) => write!(f, "scalar[{size}]"),
                (None, None) => write!(f, "scalar"),
            },
            TypeKind::Range => {
                write!(
                    f,
                    "{}[{},{}]",
                    self.fields[0].ty, self.exprs[0], self.exprs[1]
                )
            }
            TypeKind::Array => write!(f, "{}[{}]", self.fields[0].ty, self.exprs[0]),
            TypeKind::Record => {
                write!(f, "struct {{ ")?;
                for field in &self.fields {
                    match &field.label {
                        Some(l) => write!(f, "{} {l}; ", field.ty)?,
                        None => write!(f, "{}; ", field.ty)?,
                    }
                }
                write!(f, "}}")
            }
            TypeKind::Ref => write!(f, "{}&", self.fields[0].ty),
            TypeKind::Function => {
                write!(f, "{}(", self.fields[0].ty)?;
                for (i, p) in self.fields[1..].iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p.ty)?;
                }
                write!(f, ")")
            }
            TypeKind::Typename => match &self.name {
                Some(n) => write!(f, "{n}"),
                None => write!(f, "{}", self.fields[0].ty),
            },
        }
    }
}
