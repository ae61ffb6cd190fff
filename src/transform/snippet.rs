//! Statements emitted around each loop

use super::loops::LoopSite;
use super::syntax::parse_statement;
use crate::{LoopKey, TransformError};
use swc_core::ecma::ast::{Stmt, WhileStmt};

/// Builds the reset and guard statements for one alias
pub(crate) struct Snippets<'a> {
    alias: &'a str,
}

impl<'a> Snippets<'a> {
    pub(crate) fn new(alias: &'a str) -> Self {
        Self { alias }
    }

    /// `ALIAS.reset({"key":…,"file":…,"line":…,"column":…});`
    pub(crate) fn reset(&self, site: &LoopSite) -> Result<Stmt, TransformError> {
        let options = serde_json::to_string(&site.reset_options())?;
        let code = format!("{}.reset({});", self.alias, options);

        parse_statement(&code).ok_or_else(|| self.invalid_alias())
    }

    /// `if (ALIAS.guard(KEY)) break;`
    pub(crate) fn guard(&self, key: &LoopKey) -> Result<Stmt, TransformError> {
        let key = serde_json::to_string(key.as_str())?;
        // `break` only parses inside a loop
        let code = format!("while (true) if ({}.guard({})) break;", self.alias, key);

        match parse_statement(&code) {
            Some(Stmt::While(WhileStmt { body, .. })) if matches!(*body, Stmt::If(_)) => Ok(*body),
            _ => Err(self.invalid_alias()),
        }
    }

    fn invalid_alias(&self) -> TransformError {
        TransformError::InvalidAlias(self.alias.to_string())
    }
}

const RESERVED_WORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Whether `alias` is a dotted identifier path such as `loopProtect` or `globalThis.__lp`
///
/// The first segment must be a plain binding name; later segments are property
/// names and may be reserved words (`lp.for`).
pub(crate) fn is_valid_alias(alias: &str) -> bool {
    fn is_identifier(segment: &str) -> bool {
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c == '_' || c == '$' || c.is_alphabetic() => {}
            _ => return false,
        }
        chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
    }

    let Some(root) = alias.split('.').next() else {
        return false;
    };

    alias.split('.').all(is_identifier)
        && !RESERVED_WORDS.contains(&root)
        && parse_statement(&format!("{alias};")).is_some()
}
