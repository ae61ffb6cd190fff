//! Tree walk that inserts reset and guard calls around every loop
//!
//! Each loop gets two edits:
//! - body: the guard check becomes the first statement of its (block) body;
//! - parent: the reset call is inserted right before the loop in the
//!   enclosing statement sequence.
//!
//! Sequences (blocks, function bodies, script and module top levels, case
//! bodies) take the reset call directly. An unbraced `if`/`else` arm holding a
//! loop is first promoted to a block. A loop anywhere else (labeled or `with`
//! body) aborts the whole transform.

use super::loops::{self, InsertionContext, LoopKind, LoopSite};
use super::snippet::Snippets;
use super::syntax::position_of;
use crate::{PositionResolver, TransformError};
use swc_core::common::{DUMMY_SP, SourceMap, Spanned};
use swc_core::ecma::ast::{
    EmptyStmt, IfStmt, LabeledStmt, ModuleItem, Stmt, SwitchCase, WithStmt,
};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

/// Item of a statement sequence that may hold a loop
pub(crate) trait SequenceItem: Sized {
    fn as_stmt_mut(&mut self) -> Option<&mut Stmt>;
    fn from_stmt(stmt: Stmt) -> Self;
}

impl SequenceItem for Stmt {
    fn as_stmt_mut(&mut self) -> Option<&mut Stmt> {
        Some(self)
    }

    fn from_stmt(stmt: Stmt) -> Self {
        stmt
    }
}

impl SequenceItem for ModuleItem {
    fn as_stmt_mut(&mut self) -> Option<&mut Stmt> {
        match self {
            ModuleItem::Stmt(stmt) => Some(stmt),
            ModuleItem::ModuleDecl(_) => None,
        }
    }

    fn from_stmt(stmt: Stmt) -> Self {
        ModuleItem::Stmt(stmt)
    }
}

pub(crate) struct LoopProtector<'a> {
    cm: &'a SourceMap,
    file: &'a str,
    snippets: Snippets<'a>,
    resolver: Option<&'a dyn PositionResolver>,
    sites: Vec<LoopSite>,
    error: Option<TransformError>,
}

impl<'a> LoopProtector<'a> {
    pub(crate) fn new(
        cm: &'a SourceMap,
        file: &'a str,
        snippets: Snippets<'a>,
        resolver: Option<&'a dyn PositionResolver>,
    ) -> Self {
        Self {
            cm,
            file,
            snippets,
            resolver,
            sites: Vec::new(),
            error: None,
        }
    }

    /// Instrumented loops in visit order, or the first error met
    pub(crate) fn finish(self) -> Result<Vec<LoopSite>, TransformError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.sites),
        }
    }

    fn protect_sequence<T>(&mut self, items: &mut Vec<T>, context: InsertionContext)
    where
        T: SequenceItem + VisitMutWith<Self>,
    {
        let mut protected = Vec::with_capacity(items.len());

        for mut item in items.drain(..) {
            if self.error.is_none() {
                let reset = item
                    .as_stmt_mut()
                    .and_then(|stmt| self.protect_loop(stmt, context));
                if let Some(reset) = reset {
                    protected.push(T::from_stmt(reset));
                }
                item.visit_mut_children_with(self);
            }
            protected.push(item);
        }

        *items = protected;
    }

    /// Apply the body edit to `stmt` if it is a loop, returning its reset call
    fn protect_loop(&mut self, stmt: &mut Stmt, context: InsertionContext) -> Option<Stmt> {
        let parts = loops::loop_parts(stmt)?;

        let generated = position_of(self.cm, parts.span.lo);
        let original = self
            .resolver
            .and_then(|resolver| resolver.original_position_for(generated))
            .unwrap_or(generated);
        let site = LoopSite::new(self.file, parts.kind, context, generated, original);

        let snippets = self
            .snippets
            .guard(&site.key)
            .and_then(|guard| self.snippets.reset(&site).map(|reset| (guard, reset)));
        let (guard, reset) = match snippets {
            Ok(snippets) => snippets,
            Err(err) => {
                self.error = Some(err);
                return None;
            }
        };

        loops::prepend_to_body(parts.body, guard);

        tracing::trace!(
            key = %site.key,
            kind = parts.kind.syntax_name(),
            context = ?context,
            "protected loop"
        );
        self.sites.push(site);

        Some(reset)
    }

    /// Promote an unbraced `if`/`else` arm holding a loop to a block
    fn protect_arm(&mut self, arm: &mut Box<Stmt>) {
        if LoopKind::of(&**arm).is_none() {
            arm.visit_mut_with(self);
            return;
        }

        let lp = std::mem::replace(&mut **arm, Stmt::Empty(EmptyStmt { span: DUMMY_SP }));
        let mut stmts = vec![lp];
        self.protect_sequence(&mut stmts, InsertionContext::BranchArm);
        **arm = loops::block_of(stmts);
    }

    /// Fail the transform if `body` is a loop under an unsupported parent
    fn reject_loop_body(&mut self, parent: &'static str, body: &Stmt) -> bool {
        if LoopKind::of(body).is_none() {
            return false;
        }

        if self.error.is_none() {
            let position = position_of(self.cm, body.span().lo);
            self.error = Some(TransformError::UnsupportedParent {
                parent,
                file: self.file.to_string(),
                line: position.line,
                column: position.column,
            });
        }
        true
    }
}

impl VisitMut for LoopProtector<'_> {
    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        self.protect_sequence(stmts, InsertionContext::Sequence);
    }

    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        self.protect_sequence(items, InsertionContext::Sequence);
    }

    fn visit_mut_switch_case(&mut self, case: &mut SwitchCase) {
        case.test.visit_mut_with(self);
        self.protect_sequence(&mut case.cons, InsertionContext::SwitchArm);
    }

    fn visit_mut_if_stmt(&mut self, node: &mut IfStmt) {
        node.test.visit_mut_with(self);
        self.protect_arm(&mut node.cons);
        if let Some(alt) = &mut node.alt {
            self.protect_arm(alt);
        }
    }

    fn visit_mut_labeled_stmt(&mut self, node: &mut LabeledStmt) {
        if !self.reject_loop_body("LabeledStatement", &node.body) {
            node.visit_mut_children_with(self);
        }
    }

    fn visit_mut_with_stmt(&mut self, node: &mut WithStmt) {
        if !self.reject_loop_body("WithStatement", &node.body) {
            node.visit_mut_children_with(self);
        }
    }
}
