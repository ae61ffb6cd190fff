use crate::{LoopKey, Position, ResetOptions};
use serde::Serialize;
use swc_core::common::{DUMMY_SP, Span, util::take::Take};
use swc_core::ecma::ast::{BlockStmt, EmptyStmt, Stmt};

/// Shape of an instrumented loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    /// `while (test) body`
    PreTest,
    /// `do body while (test)`
    PostTest,
    /// `for (;;)`, `for (x in y)`, `for (x of y)`
    Iterating(Iteration),
}

/// Flavor of an iterating loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Iteration {
    Indexed,
    In,
    Of,
}

impl LoopKind {
    /// Loop kind of `stmt`, if it is a loop
    pub fn of(stmt: &Stmt) -> Option<Self> {
        match stmt {
            Stmt::While(_) => Some(Self::PreTest),
            Stmt::DoWhile(_) => Some(Self::PostTest),
            Stmt::For(_) => Some(Self::Iterating(Iteration::Indexed)),
            Stmt::ForIn(_) => Some(Self::Iterating(Iteration::In)),
            Stmt::ForOf(_) => Some(Self::Iterating(Iteration::Of)),
            _ => None,
        }
    }

    /// ESTree node name, as used in diagnostics
    pub fn syntax_name(&self) -> &'static str {
        match self {
            Self::PreTest => "WhileStatement",
            Self::PostTest => "DoWhileStatement",
            Self::Iterating(Iteration::Indexed) => "ForStatement",
            Self::Iterating(Iteration::In) => "ForInStatement",
            Self::Iterating(Iteration::Of) => "ForOfStatement",
        }
    }
}

/// Where the reset call of a loop was inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionContext {
    /// Block, function body, script or module top level
    Sequence,
    /// Body of a `case`/`default` clause
    SwitchArm,
    /// Unbraced `if`/`else` arm, promoted to a block
    BranchArm,
}

/// An instrumented loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopSite {
    pub key: LoopKey,
    pub file: String,
    pub kind: LoopKind,
    pub context: InsertionContext,
    /// Position in the transformed code; source of the key
    pub generated: Position,
    /// Position reported to diagnostics (source-map resolved when possible)
    pub original: Position,
}

impl LoopSite {
    pub fn new(
        file: &str,
        kind: LoopKind,
        context: InsertionContext,
        generated: Position,
        original: Position,
    ) -> Self {
        Self {
            key: LoopKey::new(file, generated),
            file: file.to_string(),
            kind,
            context,
            generated,
            original,
        }
    }

    /// Argument of the emitted `reset` call
    pub fn reset_options(&self) -> ResetOptions {
        ResetOptions {
            key: self.key.to_string(),
            file: self.file.clone(),
            line: self.original.line,
            column: self.original.column,
        }
    }
}

/// Mutable view of a loop statement
pub(crate) struct LoopParts<'a> {
    pub(crate) kind: LoopKind,
    pub(crate) span: Span,
    pub(crate) body: &'a mut Box<Stmt>,
}

pub(crate) fn loop_parts(stmt: &mut Stmt) -> Option<LoopParts<'_>> {
    let (kind, span, body) = match stmt {
        Stmt::While(s) => (LoopKind::PreTest, s.span, &mut s.body),
        Stmt::DoWhile(s) => (LoopKind::PostTest, s.span, &mut s.body),
        Stmt::For(s) => (LoopKind::Iterating(Iteration::Indexed), s.span, &mut s.body),
        Stmt::ForIn(s) => (LoopKind::Iterating(Iteration::In), s.span, &mut s.body),
        Stmt::ForOf(s) => (LoopKind::Iterating(Iteration::Of), s.span, &mut s.body),
        _ => return None,
    };

    Some(LoopParts { kind, span, body })
}

/// Make `guard` the first statement of a loop body, wrapping a bare body in a block
pub(crate) fn prepend_to_body(body: &mut Box<Stmt>, guard: Stmt) {
    if let Stmt::Block(block) = &mut **body {
        block.stmts.insert(0, guard);
        return;
    }

    let original = std::mem::replace(&mut **body, Stmt::Empty(EmptyStmt { span: DUMMY_SP }));
    **body = block_of(vec![guard, original]);
}

pub(crate) fn block_of(stmts: Vec<Stmt>) -> Stmt {
    Stmt::Block(BlockStmt {
        span: DUMMY_SP,
        stmts,
        ..<BlockStmt as Take>::dummy()
    })
}
