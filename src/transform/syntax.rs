//! Parser and printer glue (swc)

use crate::{Position, TransformError};
use swc_core::common::comments::SingleThreadedComments;
use swc_core::common::sync::Lrc;
use swc_core::common::{BytePos, DUMMY_SP, FileName, SourceMap, Span, Spanned};
use swc_core::ecma::ast::{EsVersion, Program, Stmt};
use swc_core::ecma::codegen::text_writer::JsWriter;
use swc_core::ecma::codegen::{Config, Emitter, Node};
use swc_core::ecma::parser::{Parser, StringInput, Syntax, lexer::Lexer};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

/// A parsed compilation unit together with what is needed to print it back
pub(crate) struct ParsedUnit {
    pub(crate) cm: Lrc<SourceMap>,
    pub(crate) comments: SingleThreadedComments,
    pub(crate) program: Program,
}

/// Printed code and, when requested, its source map as JSON
pub(crate) struct Printed {
    pub(crate) code: String,
    pub(crate) source_map: Option<Vec<u8>>,
}

/// Parse a script or module; recoverable parser errors are treated as fatal
pub(crate) fn parse_program(file: &str, code: &str) -> Result<ParsedUnit, TransformError> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Custom(file.to_string()).into(), code.to_string());
    let comments = SingleThreadedComments::default();

    let lexer = Lexer::new(
        Syntax::Es(Default::default()),
        EsVersion::latest(),
        StringInput::from(&*fm),
        Some(&comments),
    );
    let mut parser = Parser::new_from(lexer);

    let program = parser
        .parse_program()
        .map_err(|err| parse_error(&cm, file, err.span(), &err.kind().msg()))?;

    if let Some(err) = parser.take_errors().into_iter().next() {
        return Err(parse_error(&cm, file, err.span(), &err.kind().msg()));
    }

    Ok(ParsedUnit {
        cm,
        comments,
        program,
    })
}

/// Parse a single generated statement, stripped of spans
///
/// Returns `None` if `code` is not exactly one valid statement.
pub(crate) fn parse_statement(code: &str) -> Option<Stmt> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Anon.into(), code.to_string());

    let lexer = Lexer::new(
        Syntax::Es(Default::default()),
        EsVersion::latest(),
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);

    let script = parser.parse_script().ok()?;
    if !parser.take_errors().is_empty() || script.body.len() != 1 {
        return None;
    }

    let mut stmt = script.body.into_iter().next()?;
    // Spans point into the throwaway source map; they must not reach the printer
    stmt.visit_mut_with(&mut DropSpan);
    Some(stmt)
}

/// Regenerate source text from an edited unit
pub(crate) fn print_program(
    unit: &ParsedUnit,
    with_source_map: bool,
) -> Result<Printed, TransformError> {
    let mut code = Vec::new();
    let mut mappings = Vec::new();

    {
        let wr = JsWriter::new(
            unit.cm.clone(),
            "\n",
            &mut code,
            with_source_map.then_some(&mut mappings),
        );
        let mut emitter = Emitter {
            cfg: Config::default(),
            cm: unit.cm.clone(),
            comments: Some(&unit.comments),
            wr,
        };
        unit.program
            .emit_with(&mut emitter)
            .map_err(TransformError::Print)?;
    }

    let source_map = if with_source_map {
        let map = unit.cm.build_source_map(&mut mappings);
        let mut json = Vec::new();
        map.to_writer(&mut json)
            .map_err(|e| TransformError::SourceMap(e.to_string()))?;
        Some(json)
    } else {
        None
    };

    let code = String::from_utf8(code).map_err(|e| TransformError::Print(std::io::Error::other(e)))?;

    Ok(Printed { code, source_map })
}

/// Line/column of a byte position, in the coordinates of the parsed code
///
/// Columns count UTF-16 code units, as source maps and JS engines do.
pub(crate) fn position_of(cm: &SourceMap, pos: BytePos) -> Position {
    let loc = cm.lookup_char_pos(pos);
    let src: &str = &loc.file.src;
    let offset = pos.0.saturating_sub(loc.file.start_pos.0) as usize;

    let column = match src.get(..offset) {
        Some(prefix) => {
            let line_start = prefix.rfind('\n').map_or(0, |i| i + 1);
            prefix[line_start..].chars().map(char::len_utf16).sum()
        }
        None => loc.col.0,
    };

    Position::new(loc.line as u32, column as u32)
}

fn parse_error(cm: &SourceMap, file: &str, span: Span, message: &str) -> TransformError {
    let position = if span.is_dummy() {
        Position::new(0, 0)
    } else {
        position_of(cm, span.lo)
    };

    TransformError::Parse {
        file: file.to_string(),
        line: position.line,
        column: position.column,
        message: message.to_string(),
    }
}

struct DropSpan;

impl VisitMut for DropSpan {
    fn visit_mut_span(&mut self, span: &mut Span) {
        *span = DUMMY_SP;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::squash_whitespace;

    #[test]
    fn round_trips_code() {
        let unit = parse_program("foo", "let a = 1;\nwhile (a) { a--; }\n").unwrap();
        let printed = print_program(&unit, false).unwrap();
        assert_eq!(
            squash_whitespace(&printed.code),
            "leta=1;while(a){a--;}"
        );
        assert!(printed.source_map.is_none());
    }

    #[test]
    fn reports_parse_error_position() {
        let err = match parse_program("bad.js", "let a = 1;\nthis is not valid javascript") {
            Err(err) => err,
            Ok(_) => panic!("Invalid script should fail to parse"),
        };
        match err {
            TransformError::Parse { file, line, .. } => {
                assert_eq!(file, "bad.js");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn counts_columns_in_utf16_units() {
        let code = "/*😀*/ while (a) {}\né; for (;;) {}";
        let unit = parse_program("foo", code).unwrap();
        let body: Vec<Span> = match &unit.program {
            Program::Script(script) => script.body.iter().map(|stmt| stmt.span()).collect(),
            Program::Module(module) => module.body.iter().map(|item| item.span()).collect(),
        };

        assert_eq!(body.len(), 3);
        assert_eq!(position_of(&unit.cm, body[0].lo), Position::new(1, 7));
        assert_eq!(position_of(&unit.cm, body[2].lo), Position::new(2, 3));
    }

    #[test]
    fn parses_single_statement_only() {
        assert!(parse_statement("a.reset({});").is_some());
        assert!(parse_statement("a(); b();").is_none());
        assert!(parse_statement("a.reset(").is_none());
    }

    #[test]
    fn emits_source_map_on_request() {
        let unit = parse_program("foo", "while (x) {}").unwrap();
        let printed = print_program(&unit, true).unwrap();
        let json = printed.source_map.expect("Should emit a source map");
        assert!(sourcemap::SourceMap::from_slice(&json).is_ok());
    }
}
