//! Loop instrumentation
//!
//! Rewrites every `while`, `do-while`, `for`, `for-in` and `for-of` loop of a
//! compilation unit so that it reports to a [`GuardRegistry`](crate::GuardRegistry)
//! reachable under `alias`:
//!
//! ```js
//! loopProtect.reset({"key":"foo:2:0","file":"foo","line":2,"column":0});
//! for (var i = 0; i < 100; i++) {
//!   if (loopProtect.guard("foo:2:0")) break;
//!   console.log(i)
//! }
//! ```
//!
//! Instrumentation is all-or-nothing: if any loop cannot be instrumented the
//! transform fails and no code is returned.

mod loops;
mod snippet;
mod syntax;
mod visitor;

pub use loops::{InsertionContext, Iteration, LoopKind, LoopSite};

use crate::{InputSourceMap, PositionResolver, TransformError};
use snippet::Snippets;
use swc_core::ecma::visit::VisitMutWith;
use visitor::LoopProtector;

/// Transformer input
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Identifier (or dotted path) under which the guard registry is reachable
    pub alias: String,
    /// File identifier used in keys and diagnostics
    pub file: String,
    /// JavaScript source to instrument
    pub code: String,
    /// Source map of a prior transform stage `code` is layered on (JSON)
    pub source_map: Option<String>,
    /// Produce an output source map even without an input map
    pub emit_source_map: bool,
}

impl TransformOptions {
    pub fn new(alias: impl Into<String>, file: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            file: file.into(),
            code: code.into(),
            source_map: None,
            emit_source_map: false,
        }
    }

    /// Builder: set the input source map
    pub fn with_source_map(mut self, source_map: impl Into<String>) -> Self {
        self.source_map = Some(source_map.into());
        self
    }

    /// Builder: request an output source map
    pub fn with_emit_source_map(mut self, emit: bool) -> Self {
        self.emit_source_map = emit;
        self
    }
}

/// Transformer output
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Instrumented source
    pub code: String,
    /// Output source map (JSON), composed onto the input map when one was given
    pub source_map: Option<String>,
    /// Instrumented loops, in source order of their reset calls
    pub loops: Vec<LoopSite>,
}

/// Instruments the loops of one compilation unit
#[derive(Debug)]
pub struct Transformer {
    alias: String,
    file: String,
    code: String,
    input_map: Option<InputSourceMap>,
    emit_source_map: bool,
}

impl Transformer {
    /// Validate the alias and decode the input source map
    pub fn new(options: TransformOptions) -> Result<Self, TransformError> {
        if !snippet::is_valid_alias(&options.alias) {
            return Err(TransformError::InvalidAlias(options.alias));
        }

        let input_map = options
            .source_map
            .as_deref()
            .map(InputSourceMap::from_json)
            .transpose()?;

        Ok(Self {
            alias: options.alias,
            file: options.file,
            code: options.code,
            input_map,
            emit_source_map: options.emit_source_map,
        })
    }

    /// Parse, instrument and print the unit
    pub fn transform(&self) -> Result<TransformOutput, TransformError> {
        let mut unit = syntax::parse_program(&self.file, &self.code)?;

        let resolver = self
            .input_map
            .as_ref()
            .map(|map| map as &dyn PositionResolver);
        let mut protector =
            LoopProtector::new(&unit.cm, &self.file, Snippets::new(&self.alias), resolver);
        unit.program.visit_mut_with(&mut protector);
        let loops = protector.finish()?;

        let with_source_map = self.emit_source_map || self.input_map.is_some();
        let printed = syntax::print_program(&unit, with_source_map)?;

        let source_map = match (printed.source_map, &self.input_map) {
            (Some(output), Some(input)) => Some(input.compose(&output)?),
            (Some(output), None) => Some(
                String::from_utf8(output).map_err(|e| TransformError::SourceMap(e.to_string()))?,
            ),
            (None, _) => None,
        };

        tracing::debug!(file = %self.file, loops = loops.len(), "instrumented loops");

        Ok(TransformOutput {
            code: printed.code,
            source_map,
            loops,
        })
    }
}

/// Instrument `code` in one call
pub fn protect_loops(
    alias: &str,
    file: &str,
    code: &str,
) -> Result<TransformOutput, TransformError> {
    Transformer::new(TransformOptions::new(alias, file, code))?.transform()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;
    use crate::assert_protected;
    use crate::testing::squash_whitespace;

    #[test]
    fn protects_top_level_loop() {
        let output = assert_protected!(
            r#"console.log("hi")
for (var i = 0; i < 100; i++) {console.log(i)}
console.log("yo")"#,
            r#"console.log("hi");
loopProtect.reset({"key":"foo:2:0","file":"foo","line":2,"column":0});
for (var i = 0; i < 100; i++) {
  if (loopProtect.guard("foo:2:0")) break;
  console.log(i);
}
console.log("yo");"#
        );

        assert_eq!(output.loops.len(), 1);
        let site = &output.loops[0];
        assert_eq!(site.kind, LoopKind::Iterating(Iteration::Indexed));
        assert_eq!(site.context, InsertionContext::Sequence);
        assert_eq!(site.generated, Position::new(2, 0));
    }

    #[test]
    fn protects_nested_loops_independently() {
        let output = assert_protected!(
            r#"for (var i = 0; i < 100; i++) {
  for (var j = 0; j < 100; j++) {
    console.log(i, j)
  }
}"#,
            r#"loopProtect.reset({"key":"foo:1:0","file":"foo","line":1,"column":0});
for (var i = 0; i < 100; i++) {
  if (loopProtect.guard("foo:1:0")) break;
  loopProtect.reset({"key":"foo:2:2","file":"foo","line":2,"column":2});
  for (var j = 0; j < 100; j++) {
    if (loopProtect.guard("foo:2:2")) break;
    console.log(i, j);
  }
}"#
        );

        let keys: Vec<_> = output.loops.iter().map(|site| site.key.as_str()).collect();
        assert_eq!(keys, vec!["foo:1:0", "foo:2:2"]);
    }

    #[test]
    fn promotes_unbraced_if_arm() {
        let output = assert_protected!(
            "if (true)\n  for (var i = 0; i < 100; i++) console.log(i)\n",
            r#"if (true) {
  loopProtect.reset({"key":"foo:2:2","file":"foo","line":2,"column":2});
  for (var i = 0; i < 100; i++) {
    if (loopProtect.guard("foo:2:2")) break;
    console.log(i);
  }
}"#
        );

        assert_eq!(output.loops[0].context, InsertionContext::BranchArm);
    }

    #[test]
    fn promotes_only_the_looping_arm() {
        assert_protected!(
            "if (a) b(); else while (c) d();",
            r#"if (a) b(); else {
  loopProtect.reset({"key":"foo:1:17","file":"foo","line":1,"column":17});
  while (c) {
    if (loopProtect.guard("foo:1:17")) break;
    d();
  }
}"#
        );
    }

    #[test]
    fn protects_switch_arm() {
        let output = assert_protected!(
            r#"switch (1) {
  case 1:
    for (var i = 0; i < 100; i ++) 1
}"#,
            r#"switch (1) {
  case 1:
    loopProtect.reset({"key":"foo:3:4","file":"foo","line":3,"column":4});
    for (var i = 0; i < 100; i++) {
      if (loopProtect.guard("foo:3:4")) break;
      1;
    }
}"#
        );

        assert_eq!(output.loops[0].context, InsertionContext::SwitchArm);
    }

    #[test]
    fn protects_braced_else_arm() {
        assert_protected!(
            r#"if (true) {
  console.log('yay')
} else {
  for (var i = 0; i < 100; i ++) {}
}"#,
            r#"if (true) {
  console.log('yay');
} else {
  loopProtect.reset({"key":"foo:4:2","file":"foo","line":4,"column":2});
  for (var i = 0; i < 100; i++) {
    if (loopProtect.guard("foo:4:2")) break;
  }
}"#
        );
    }

    #[test]
    fn protects_every_loop_shape() {
        let output = assert_protected!(
            "for (k in o) {}\nfor (v of xs) y(v)",
            r#"loopProtect.reset({"key":"foo:1:0","file":"foo","line":1,"column":0});
for (k in o) {
  if (loopProtect.guard("foo:1:0")) break;
}
loopProtect.reset({"key":"foo:2:0","file":"foo","line":2,"column":0});
for (v of xs) {
  if (loopProtect.guard("foo:2:0")) break;
  y(v);
}"#
        );

        let kinds: Vec<_> = output.loops.iter().map(|site| site.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LoopKind::Iterating(Iteration::In),
                LoopKind::Iterating(Iteration::Of),
            ]
        );
    }

    #[test]
    fn protects_do_while_body() {
        let output = protect_loops("loopProtect", "foo", "do x(); while (a)").unwrap();
        let code = squash_whitespace(&output.code);

        assert!(code.starts_with(
            r#"loopProtect.reset({"key":"foo:1:0","file":"foo","line":1,"column":0});"#
        ));
        assert!(code.contains(r#"do{if(loopProtect.guard("foo:1:0"))break;x();}while(a)"#));
        assert_eq!(output.loops[0].kind, LoopKind::PostTest);
    }

    #[test]
    fn protects_loops_inside_functions() {
        assert_protected!(
            "function f() {\n  while (true) {}\n}",
            r#"function f() {
  loopProtect.reset({"key":"foo:2:2","file":"foo","line":2,"column":2});
  while (true) {
    if (loopProtect.guard("foo:2:2")) break;
  }
}"#
        );
    }

    #[test]
    fn protects_unbraced_loop_in_loop() {
        assert_protected!(
            "while (a) while (b) c();",
            r#"loopProtect.reset({"key":"foo:1:0","file":"foo","line":1,"column":0});
while (a) {
  if (loopProtect.guard("foo:1:0")) break;
  loopProtect.reset({"key":"foo:1:10","file":"foo","line":1,"column":10});
  while (b) {
    if (loopProtect.guard("foo:1:10")) break;
    c();
  }
}"#
        );
    }

    #[test]
    fn protects_module_top_level() {
        assert_protected!(
            "import x from 'x';\nwhile (x) {}",
            r#"import x from 'x';
loopProtect.reset({"key":"foo:2:0","file":"foo","line":2,"column":0});
while (x) {
  if (loopProtect.guard("foo:2:0")) break;
}"#
        );
    }

    #[test]
    fn leaves_loop_free_code_untouched() {
        let output = assert_protected!("let a = 1;\nif (a) { a++ }", "let a = 1; if (a) { a++; }");
        assert!(output.loops.is_empty());
    }

    #[test]
    fn rejects_labeled_loop() {
        let err = protect_loops("loopProtect", "foo", "a();\nouter: for (;;) { break outer; }")
            .unwrap_err();

        assert!(err.is_unsupported_parent());
        match err {
            TransformError::UnsupportedParent {
                parent,
                file,
                line,
                column,
            } => {
                assert_eq!(parent, "LabeledStatement");
                assert_eq!(file, "foo");
                assert_eq!((line, column), (2, 7));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_loop_in_with_body() {
        let err = protect_loops("loopProtect", "foo", "with (o) while (a) {}").unwrap_err();
        assert!(matches!(
            err,
            TransformError::UnsupportedParent {
                parent: "WithStatement",
                ..
            }
        ));
    }

    #[test]
    fn unsupported_parent_fails_even_after_good_loops() {
        let result = protect_loops(
            "loopProtect",
            "foo",
            "while (a) {}\nfunction f() { l: while (b) {} }",
        );
        assert!(result.unwrap_err().is_unsupported_parent());
    }

    #[test]
    fn propagates_parse_errors() {
        let err = protect_loops("loopProtect", "foo", "while (").unwrap_err();
        assert!(err.is_collaborator_failure());
    }

    #[test]
    fn rejects_invalid_alias() {
        let err = Transformer::new(TransformOptions::new("lp; evil()", "foo", "")).unwrap_err();
        assert!(matches!(err, TransformError::InvalidAlias(_)));
    }

    #[test]
    fn keys_are_stable_across_runs() {
        let code = "while (a) {}\nfor (;;) { do {} while (b) }";
        let first = protect_loops("lp", "unit.js", code).unwrap();
        let second = protect_loops("lp", "unit.js", code).unwrap();

        assert_eq!(first.code, second.code);
        assert_eq!(first.loops, second.loops);
        for site in &first.loops {
            assert_eq!(
                site.key.as_str(),
                format!("unit.js:{}:{}", site.generated.line, site.generated.column)
            );
        }
    }

    #[test]
    fn resolves_diagnostics_through_source_map() {
        // Line 1 col 0 -> orig.js line 10 col 4; line 2 unmapped
        let map = r#"{"version":3,"sources":["orig.js"],"names":[],"mappings":"AASI"}"#;
        let options = TransformOptions::new("lp", "bundle.js", "while (a) {}\nwhile (b) {}")
            .with_source_map(map);
        let output = Transformer::new(options).unwrap().transform().unwrap();

        let mapped = &output.loops[0];
        assert_eq!(mapped.key.as_str(), "bundle.js:1:0");
        assert_eq!(mapped.original, Position::new(10, 4));
        assert!(output.code.contains(r#""line": 10"#) || output.code.contains(r#""line":10"#));

        let fallback = &output.loops[1];
        assert_eq!(fallback.key.as_str(), "bundle.js:2:0");
        assert_eq!(fallback.original, Position::new(2, 0));
    }

    #[test]
    fn resolves_loops_after_astral_characters() {
        // Line 1 col 0 -> orig.js 1:0; line 1 col 7 (UTF-16) -> orig.js 1:4
        let map = r#"{"version":3,"sources":["orig.js"],"names":[],"mappings":"AAAA,OAAI"}"#;
        let options =
            TransformOptions::new("lp", "bundle.js", "/*😀*/ while (a) {}").with_source_map(map);
        let output = Transformer::new(options).unwrap().transform().unwrap();

        let site = &output.loops[0];
        assert_eq!(site.generated, Position::new(1, 7));
        assert_eq!(site.key.as_str(), "bundle.js:1:7");
        assert_eq!(site.original, Position::new(1, 4));
    }

    #[test]
    fn rejects_reserved_word_alias_without_loops() {
        for alias in ["if", "true", "for.lp"] {
            let err = Transformer::new(TransformOptions::new(alias, "foo", "a = 1;")).unwrap_err();
            assert!(matches!(err, TransformError::InvalidAlias(_)), "alias {alias}");
        }
    }

    #[test]
    fn composes_output_source_map_onto_input() {
        let map = r#"{"version":3,"sources":["orig.js"],"names":[],"mappings":"AASI"}"#;
        let options = TransformOptions::new("lp", "bundle.js", "while (a) {}").with_source_map(map);
        let output = Transformer::new(options).unwrap().transform().unwrap();

        let json = output.source_map.expect("Should emit a source map");
        let composed = sourcemap::SourceMap::from_slice(json.as_bytes()).unwrap();
        assert_eq!(composed.get_source(0), Some("orig.js"));
    }

    #[test]
    fn emits_source_map_only_when_asked() {
        let plain = protect_loops("lp", "foo", "while (a) {}").unwrap();
        assert!(plain.source_map.is_none());

        let options = TransformOptions::new("lp", "foo", "while (a) {}").with_emit_source_map(true);
        let output = Transformer::new(options).unwrap().transform().unwrap();
        assert!(output.source_map.is_some());
    }
}
