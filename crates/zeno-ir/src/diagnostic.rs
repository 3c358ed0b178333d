//! Error and warning records accumulated on the document.

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::{Position, Positions, ResolvedPosition};

/// The semantic error taxonomy. Builder-path and checker-path reports both
/// use these kinds; front-ends may add their own through the builder.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum DiagnosticKind {
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("'{0}' has no member '{1}'")]
    HasNoMember(String, String),
    #[error("'{0}' is not a structure")]
    IsNotAStruct(String),
    #[error("duplicate definition of '{0}'")]
    DuplicateDefinition(String),
    #[error("invalid type: {0}")]
    InvalidType(String),
    #[error("no such process '{0}'")]
    NoSuchProcess(String),
    #[error("'{0}' is not a template")]
    NotATemplate(String),
    #[error("'{0}' is not a process")]
    NotAProcess(String),
    #[error("strategy '{0}' is not declared")]
    StrategyNotDeclared(String),
    #[error("unknown dynamic template '{0}'")]
    UnknownDynamicTemplate(String),
    #[error("declaration of '{0}' shadows a variable")]
    ShadowsAVariable(String),
    #[error("could not load library '{0}'")]
    CouldNotLoadLibrary(String),
    #[error("could not load function '{0}'")]
    CouldNotLoadFunction(String),
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("bad guard: {0}")]
    BadGuard(String),
    #[error("bad invariant: {0}")]
    BadInvariant(String),
    #[error("bad assignment: {0}")]
    BadAssignment(String),
    #[error("bad synchronisation: {0}")]
    BadSync(String),
    #[error("argument for '{0}' must not depend on free process parameters")]
    RestrictionViolation(String),
    #[error("cyclic type definition '{0}'")]
    CyclicType(String),
    #[error("bad channel priority list: {0}")]
    BadPriorityList(String),
    #[error("bad query: {0}")]
    BadQuery(String),
    #[error("inconsistent LSC: {0}")]
    InconsistentLsc(String),
    #[error("bad probability: {0}")]
    BadProbability(String),
    #[error("bad select: {0}")]
    BadSelect(String),
    #[error("bad rate: {0}")]
    BadRate(String),
}

impl DiagnosticKind {
    /// The translation key, `$`-prefixed per the message-template convention.
    pub fn key(&self) -> &'static str {
        use DiagnosticKind::*;
        match self {
            UnknownIdentifier(_) => "$UnknownIdentifier",
            HasNoMember(_, _) => "$HasNoMember",
            IsNotAStruct(_) => "$IsNotAStruct",
            DuplicateDefinition(_) => "$DuplicateDefinition",
            InvalidType(_) => "$InvalidType",
            NoSuchProcess(_) => "$NoSuchProcess",
            NotATemplate(_) => "$NotATemplate",
            NotAProcess(_) => "$NotAProcess",
            StrategyNotDeclared(_) => "$StrategyNotDeclared",
            UnknownDynamicTemplate(_) => "$UnknownDynamicTemplate",
            ShadowsAVariable(_) => "$ShadowsAVariable",
            CouldNotLoadLibrary(_) => "$CouldNotLoadLibrary",
            CouldNotLoadFunction(_) => "$CouldNotLoadFunction",
            TypeMismatch { .. } => "$TypeMismatch",
            BadGuard(_) => "$BadGuard",
            BadInvariant(_) => "$BadInvariant",
            BadAssignment(_) => "$BadAssignment",
            BadSync(_) => "$BadSync",
            RestrictionViolation(_) => "$RestrictionViolation",
            CyclicType(_) => "$CyclicType",
            BadPriorityList(_) => "$BadPriorityList",
            BadQuery(_) => "$BadQuery",
            InconsistentLsc(_) => "$InconsistentLsc",
            BadProbability(_) => "$BadProbability",
            BadSelect(_) => "$BadSelect",
            BadRate(_) => "$BadRate",
        }
    }

    /// Ordered substitution parameters for the message template.
    pub fn params(&self) -> Vec<String> {
        use DiagnosticKind::*;
        match self {
            HasNoMember(a, b) => vec![a.clone(), b.clone()],
            TypeMismatch { expected, found } => vec![expected.clone(), found.clone()],
            UnknownIdentifier(a) | IsNotAStruct(a) | DuplicateDefinition(a) | InvalidType(a)
            | NoSuchProcess(a) | NotATemplate(a) | NotAProcess(a) | StrategyNotDeclared(a)
            | UnknownDynamicTemplate(a) | ShadowsAVariable(a) | CouldNotLoadLibrary(a)
            | CouldNotLoadFunction(a) | BadGuard(a) | BadInvariant(a) | BadAssignment(a)
            | BadSync(a) | RestrictionViolation(a) | CyclicType(a) | BadPriorityList(a)
            | BadQuery(a) | InconsistentLsc(a) | BadProbability(a) | BadSelect(a) | BadRate(a) => {
                vec![a.clone()]
            }
        }
    }

    /// Message template: `$Key %1% %2% …` with positional parameters.
    pub fn template(&self) -> String {
        let mut s = self.key().to_string();
        for i in 1..=self.params().len() {
            s.push_str(&format!(" %{i}%"));
        }
        s
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// One accumulated error or warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub position: Position,
    pub kind: DiagnosticKind,
    /// Free-form context, e.g. the template or declaration being checked.
    pub context: Option<String>,
}

impl Diagnostic {
    pub fn error(position: Position, kind: DiagnosticKind) -> Self {
        Self {
            severity: Severity::Error,
            position,
            kind,
            context: None,
        }
    }

    pub fn warning(position: Position, kind: DiagnosticKind) -> Self {
        Self {
            severity: Severity::Warning,
            position,
            kind,
            context: None,
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Human-readable message with parameters substituted.
    pub fn expanded(&self) -> String {
        self.kind.to_string()
    }

    /// File/line/column of the report, via the document's position map.
    pub fn resolve(&self, positions: &Positions) -> Option<ResolvedPosition> {
        positions.resolve(self.position.start)
    }

    /// Attach source text so miette can render a highlighted snippet.
    pub fn with_source(&self, source: &str, filename: &str) -> SpannedDiagnostic {
        let span = if self.position.is_unknown() {
            None
        } else {
            Some(SourceSpan::new(
                (self.position.start as usize).into(),
                (self.position.end - self.position.start) as usize,
            ))
        };
        SpannedDiagnostic {
            src: NamedSource::new(filename, source.to_owned()),
            message: self.expanded(),
            span,
        }
    }
}

/// A diagnostic enriched with source context for pretty CLI rendering.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("{message}")]
pub struct SpannedDiagnostic {
    #[source_code]
    pub src: NamedSource<String>,
    pub message: String,
    #[label("here")]
    pub span: Option<SourceSpan>,
}
