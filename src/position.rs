//! Loop positions, keys and source-map resolution
//!
//! A loop site lives in two coordinate spaces:
//! - the *generated* space, i.e. the code handed to the transformer, which
//!   yields the loop key;
//! - the *original* space, reached through an optional input source map,
//!   which only feeds diagnostics.
//!
//! Distinct original positions can collapse onto one generated position (and
//! vice versa), so keys are never derived from the source map.

use crate::TransformError;
use serde::{Deserialize, Serialize};

/// Line/column pair. Lines are 1-based, columns are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Identity of a loop site: `file:line:column` in generated coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoopKey(String);

impl LoopKey {
    pub fn new(file: &str, generated: Position) -> Self {
        Self(format!("{}:{}", file, generated))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LoopKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LoopKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<LoopKey> for String {
    fn from(key: LoopKey) -> Self {
        key.0
    }
}

/// Maps a generated position back to original source coordinates
pub trait PositionResolver {
    /// Returns `None` when the generated line has no mapping at or before `generated`
    fn original_position_for(&self, generated: Position) -> Option<Position>;
}

/// Source map describing a prior transform stage the input code is layered on
#[derive(Debug, Clone)]
pub struct InputSourceMap {
    map: sourcemap::SourceMap,
}

impl InputSourceMap {
    /// Decode a JSON (v3) source map
    pub fn from_json(json: &str) -> Result<Self, TransformError> {
        let map = sourcemap::SourceMap::from_slice(json.as_bytes())
            .map_err(|e| TransformError::SourceMap(e.to_string()))?;
        Ok(Self { map })
    }

    /// Layer the map produced by this transform on top of the input map
    ///
    /// The result maps instrumented code straight to the original sources.
    pub(crate) fn compose(&self, output: &[u8]) -> Result<String, TransformError> {
        let output = sourcemap::SourceMap::from_slice(output)
            .map_err(|e| TransformError::SourceMap(e.to_string()))?;

        let mut composed = self.map.clone();
        composed.adjust_mappings(&output);

        let mut json = Vec::new();
        composed
            .to_writer(&mut json)
            .map_err(|e| TransformError::SourceMap(e.to_string()))?;

        String::from_utf8(json).map_err(|e| TransformError::SourceMap(e.to_string()))
    }
}

impl PositionResolver for InputSourceMap {
    fn original_position_for(&self, generated: Position) -> Option<Position> {
        // sourcemap lines are 0-based
        let line = generated.line.checked_sub(1)?;
        let token = self.map.lookup_token(line, generated.column)?;

        // lookup_token falls back to earlier lines; only same-line mappings count
        if token.get_dst_line() != line || token.get_source().is_none() {
            return None;
        }

        Some(Position::new(token.get_src_line() + 1, token.get_src_col()))
    }
}
