//! Serializer (C9)
//!
//! Versioned JSON persistence for a [`FileResult`]: a schema-tagged
//! envelope written atomically (write to `path.tmp`, `fsync`, `rename`
//! over the destination) with a semver-keyed migration registry for
//! reading documents written by older schema versions. Exposes
//! `serialize_node`/`deserialize_node` and `serialize_file`/`deserialize_file`
//! as the inverse pair external readers build against, each tagged with
//! its own `$schema` URI.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{AstNode, FileError, FileResult, ProcessingStats};

/// The schema version this build writes and the highest it can decode.
pub const CURRENT_SCHEMA_VERSION: &str = "1.0.0";

/// `$schema` tag for a single serialized node document.
pub const NODE_SCHEMA_URI: &str = "https://ast-core-engine.dev/schema/ast-node.json";

/// `$schema` tag for a whole serialized file document.
pub const DOCUMENT_SCHEMA_URI: &str = "https://ast-core-engine.dev/schema/file-result.json";

/// One [`AstNode`] tagged with the schema it conforms to, serializable on
/// its own (e.g. for streaming node-by-node output).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SerializedNode {
    #[serde(rename = "$schema")]
    pub schema: String,
    #[serde(flatten)]
    pub node: AstNode,
}

/// File-level metadata accompanying a serialized document: the content
/// hash the nodes were derived from, how many nodes it holds, and the
/// pipeline's processing stats.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SerializedFileMetadata {
    pub file_hash: String,
    pub node_count: usize,
    pub stats: ProcessingStats,
}

/// On-disk envelope for a whole [`FileResult`]: a schema URI and version
/// tag wrapping the node forest and file metadata, so `deserialize` can
/// detect and migrate older documents before handing back a [`FileResult`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SerializedDocument {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub schema_version: String,
    pub file_path: String,
    pub language: String,
    pub success: bool,
    pub nodes: Vec<SerializedNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FileError>,
    pub metadata: SerializedFileMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_path: Option<String>,
    pub serialized_at: String,
}

type Migration = fn(serde_json::Value) -> serde_json::Value;

/// Registered migrations, consulted in ascending order. Each entry
/// upgrades a document in-place from the version it's keyed by to the
/// next. Empty for now: this is the crate's first schema version.
fn migrations() -> Vec<(Version, Migration)> {
    Vec::new()
}

/// Wrap one node as a standalone schema-tagged document.
pub fn serialize_node(node: &AstNode) -> SerializedNode {
    SerializedNode {
        schema: NODE_SCHEMA_URI.to_string(),
        node: node.clone(),
    }
}

/// Recover an [`AstNode`] from a standalone node document.
pub fn deserialize_node(bytes: &[u8]) -> EngineResult<AstNode> {
    let document: SerializedNode = serde_json::from_slice(bytes)?;
    Ok(document.node)
}

/// Build the full envelope for `result`.
pub fn serialize_file(result: &FileResult) -> SerializedDocument {
    SerializedDocument {
        schema: DOCUMENT_SCHEMA_URI.to_string(),
        schema_version: CURRENT_SCHEMA_VERSION.to_string(),
        file_path: result.file_path.clone(),
        language: result.language.clone(),
        success: result.success,
        nodes: result.nodes.iter().map(serialize_node).collect(),
        errors: result.errors.clone(),
        metadata: SerializedFileMetadata {
            file_hash: result.file_hash.clone(),
            node_count: result.nodes.len(),
            stats: result.processing_stats.clone(),
        },
        serialized_path: result.serialized_path.clone(),
        serialized_at: now_iso8601(),
    }
}

/// Recover a [`FileResult`] from a full document.
pub fn deserialize_file(bytes: &[u8]) -> EngineResult<FileResult> {
    deserialize(bytes)
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Validate a [`FileResult`] before it's written: every node must resolve
/// its `parent`/`children` references within the same file and have a
/// non-empty id.
pub fn validate(result: &FileResult) -> EngineResult<()> {
    let mut offenders = Vec::new();
    let ids: std::collections::HashSet<&str> =
        result.nodes.iter().map(|n| n.id.as_str()).collect();

    for node in &result.nodes {
        if node.id.is_empty() {
            offenders.push(format!("node at {:?} has an empty id", node.start));
        }
        if !node.has_valid_span() {
            offenders.push(format!("node {} has start > end", node.id));
        }
        if let Some(parent) = &node.parent {
            if !ids.contains(parent.as_str()) {
                offenders.push(format!("node {} references missing parent {}", node.id, parent));
            }
        }
        for child in &node.children {
            if !ids.contains(child.as_str()) {
                offenders.push(format!("node {} references missing child {}", node.id, child));
            }
        }
    }

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(EngineError::SerializationValidation { offenders })
    }
}

/// Serialize `result` to `path` atomically: write to a sibling `.tmp`
/// file, `fsync`, then rename over the destination. The file ends with a
/// trailing newline.
pub fn serialize_to_file(result: &FileResult, path: &Path) -> EngineResult<()> {
    let document = serialize_file(result);
    let mut bytes = serde_json::to_vec_pretty(&document)?;
    bytes.push(b'\n');

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| crate::error::io_error(parent, e))?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path).map_err(|e| crate::error::io_error(&tmp_path, e))?;
        file.write_all(&bytes)
            .map_err(|e| crate::error::io_error(&tmp_path, e))?;
        file.sync_all().map_err(|e| crate::error::io_error(&tmp_path, e))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| crate::error::io_error(path, e))?;
    Ok(())
}

/// Deserialize a document from `path`, migrating it forward if it was
/// written by an older version of this crate.
pub fn deserialize_from_file(path: &Path) -> EngineResult<FileResult> {
    let bytes = fs::read(path).map_err(|e| crate::error::io_error(path, e))?;
    deserialize(&bytes)
}

pub fn deserialize(bytes: &[u8]) -> EngineResult<FileResult> {
    let mut value: serde_json::Value = serde_json::from_slice(bytes)?;
    let found_str = value
        .get("schema_version")
        .and_then(|v| v.as_str())
        .unwrap_or("0.0.0")
        .to_string();
    let found = Version::parse(&found_str).map_err(|_| EngineError::SchemaMigration {
        found: found_str.clone(),
        supported: CURRENT_SCHEMA_VERSION.to_string(),
    })?;
    let supported = Version::parse(CURRENT_SCHEMA_VERSION).expect("valid semver constant");

    if found > supported {
        return Err(EngineError::SchemaMigration {
            found: found_str,
            supported: CURRENT_SCHEMA_VERSION.to_string(),
        });
    }

    for (version, migrate) in migrations() {
        if found < version {
            value = migrate(value);
        }
    }

    let document: SerializedDocument = serde_json::from_value(value)?;
    Ok(FileResult {
        file_path: document.file_path,
        language: document.language,
        success: document.success,
        nodes: document.nodes.into_iter().map(|n| n.node).collect(),
        errors: document.errors,
        file_hash: document.metadata.file_hash,
        processing_stats: document.metadata.stats,
        serialized_path: document.serialized_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProcessingStats;

    fn sample_result() -> FileResult {
        FileResult {
            file_path: "a.rs".to_string(),
            language: "rust".to_string(),
            success: true,
            nodes: Vec::new(),
            errors: Vec::new(),
            file_hash: "deadbeef".to_string(),
            processing_stats: ProcessingStats::default(),
            serialized_path: None,
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.json");
        let result = sample_result();
        serialize_to_file(&result, &path).unwrap();
        let back = deserialize_from_file(&path).unwrap();
        assert_eq!(back.file_path, result.file_path);
        assert_eq!(back.file_hash, result.file_hash);
    }

    #[test]
    fn written_file_ends_with_a_newline() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.json");
        serialize_to_file(&sample_result(), &path).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert_eq!(*bytes.last().unwrap(), b'\n');
    }

    #[test]
    fn document_carries_the_schema_tag_and_file_metadata() {
        let document = serialize_file(&sample_result());
        assert_eq!(document.schema, DOCUMENT_SCHEMA_URI);
        assert_eq!(document.metadata.file_hash, "deadbeef");
        assert_eq!(document.metadata.node_count, 0);
    }

    #[test]
    fn rejects_a_future_schema_version() {
        let mut document = serde_json::to_value(serialize_file(&sample_result())).unwrap();
        document["schema_version"] = serde_json::json!("99.0.0");
        let bytes = serde_json::to_vec(&document).unwrap();
        let err = deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SchemaMigrationError);
    }

    #[test]
    fn validate_rejects_dangling_parent_reference() {
        use crate::types::{AstNode, NodeMetadata, NodeType, Position, Significance};
        let mut result = sample_result();
        result.nodes.push(AstNode {
            id: "n1".to_string(),
            node_type: NodeType::Function,
            name: None,
            file_path: "a.rs".to_string(),
            start: Position::new(1, 0),
            end: Position::new(1, 1),
            parent: Some("missing".to_string()),
            children: Vec::new(),
            metadata: NodeMetadata::default(),
            source_text: None,
            signature: None,
            significance: Significance::Medium,
            complexity: None,
        });
        let err = validate(&result).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SerializationValidationError);
    }

    #[test]
    fn serialize_node_round_trips_through_its_own_envelope() {
        use crate::types::{NodeMetadata, NodeType, Position, Significance};
        let node = AstNode {
            id: "n1".to_string(),
            node_type: NodeType::Function,
            name: Some("f".to_string()),
            file_path: "a.rs".to_string(),
            start: Position::new(1, 0),
            end: Position::new(1, 5),
            parent: None,
            children: Vec::new(),
            metadata: NodeMetadata::default(),
            source_text: None,
            signature: None,
            significance: Significance::High,
            complexity: Some(1),
        };
        let document = serialize_node(&node);
        let bytes = serde_json::to_vec(&document).unwrap();
        let back = deserialize_node(&bytes).unwrap();
        assert_eq!(back, node);
    }
}
