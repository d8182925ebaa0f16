//! Core data model: positions, node metadata, significance, node
//! types, the `ASTNode` itself, and the per-file/per-grammar result
//! envelopes built on top of it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorKind};

/// A 1-based line, 0-based column position into a source file's codepoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// The position one past the start of the file.
    pub const fn start_of_file() -> Self {
        Self { line: 1, column: 0 }
    }
}

/// Closed enumeration of normalized node kinds. New variants
/// are additive only: callers must not exhaustively match without a
/// wildcard arm.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    File,
    Module,
    Namespace,
    Import,
    Export,
    Class,
    Interface,
    Function,
    Method,
    Constructor,
    Property,
    Variable,
    Parameter,
    Block,
    Statement,
    Expression,
    Comment,
    Error,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "FILE",
            NodeType::Module => "MODULE",
            NodeType::Namespace => "NAMESPACE",
            NodeType::Import => "IMPORT",
            NodeType::Export => "EXPORT",
            NodeType::Class => "CLASS",
            NodeType::Interface => "INTERFACE",
            NodeType::Function => "FUNCTION",
            NodeType::Method => "METHOD",
            NodeType::Constructor => "CONSTRUCTOR",
            NodeType::Property => "PROPERTY",
            NodeType::Variable => "VARIABLE",
            NodeType::Parameter => "PARAMETER",
            NodeType::Block => "BLOCK",
            NodeType::Statement => "STATEMENT",
            NodeType::Expression => "EXPRESSION",
            NodeType::Comment => "COMMENT",
            NodeType::Error => "ERROR",
        }
    }
}

/// Discrete, ordered significance level. `Ord` follows
/// MINIMAL < LOW < MEDIUM < HIGH < CRITICAL so `sig >= Significance::Medium`
/// reads naturally as a downstream filter threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Significance {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl Significance {
    /// One level down, saturating at `Minimal`.
    pub fn lower(self) -> Self {
        match self {
            Significance::Critical => Significance::High,
            Significance::High => Significance::Medium,
            Significance::Medium => Significance::Low,
            Significance::Low | Significance::Minimal => Significance::Minimal,
        }
    }

    /// One level up, saturating at `Critical`.
    pub fn raise(self) -> Self {
        match self {
            Significance::Minimal => Significance::Low,
            Significance::Low => Significance::Medium,
            Significance::Medium => Significance::High,
            Significance::High | Significance::Critical => Significance::Critical,
        }
    }
}

/// Per-node enrichment data. Empty collections are permitted;
/// `#[serde(skip_serializing_if)]` on optional/empty fields keeps absent
/// fields omitted from the serialized form rather than emitted as nulls.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub language_specific: HashMap<String, serde_json::Value>,
}

/// One node in the per-file forest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AstNode {
    pub id: String,
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub file_path: String,
    pub start: Position,
    pub end: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    pub metadata: NodeMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub significance: Significance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,
}

impl AstNode {
    /// `start <= end`.
    pub fn has_valid_span(&self) -> bool {
        self.start <= self.end
    }
}

/// Per-file statistics gathered while running the pipeline.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_nodes: usize,
    pub nodes_by_type: HashMap<String, usize>,
    pub nodes_by_significance: HashMap<String, usize>,
    pub elapsed_ms: u64,
    pub peak_memory_delta_bytes: i64,
    pub nodes_per_second: f64,
}

/// The output of the per-file pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileResult {
    pub file_path: String,
    pub language: String,
    pub success: bool,
    pub nodes: Vec<AstNode>,
    pub errors: Vec<FileError>,
    pub file_hash: String,
    pub processing_stats: ProcessingStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_path: Option<String>,
}

/// A serializable projection of [`EngineError`] attached to a `FileResult`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl FileError {
    pub fn from_engine_error(error: &EngineError) -> Self {
        let position = match error {
            EngineError::Syntax { position, .. } => {
                Some(Position::new(position.line, position.column))
            }
            _ => None,
        };
        Self {
            kind: error.kind(),
            message: error.to_string(),
            position,
        }
    }
}

/// On-disk record for a cached grammar artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrammarRecord {
    pub language: String,
    pub version: String,
    pub expected_hash: Option<String>,
    pub actual_hash: String,
    pub source_url: String,
    pub downloaded_at: String,
    pub last_verified_at: String,
    pub artifact_path: String,
}
