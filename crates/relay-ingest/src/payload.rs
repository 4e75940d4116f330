use relay_domain::{DataKind, Flag, Segment};
use relay_store::{Dataset, Item};
use serde::Deserialize;

use crate::error::IngestError;

/// Body of a `put` SSE event: `{path:"/", data:{flags:{...}, segments:{...}}}`.
#[derive(Debug, Deserialize)]
pub struct PutBody {
    pub path: String,
    pub data: Dataset,
}

/// Body of a `patch` SSE event: `{path:"/flags/<key>"|"/segments/<key>", data:<item>}`.
/// `data` is left as raw JSON and decoded per the kind recovered from `path`,
/// since a flag and a segment don't share a shape.
#[derive(Debug, Deserialize)]
pub struct PatchBody {
    pub path: String,
    pub data: serde_json::Value,
}

/// Body of a `delete` SSE event: `{path, version}`.
#[derive(Debug, Deserialize)]
pub struct DeleteBody {
    pub path: String,
    pub version: u64,
}

/// Split a `/flags/<key>` or `/segments/<key>` path into its kind and key.
/// A bare `/` is the `put` path and is handled separately by the caller; any
/// other shape is not addressable and is rejected.
pub fn parse_item_path(path: &str) -> Result<(DataKind, &str), IngestError> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if let Some(key) = trimmed.strip_prefix("flags/") {
        if key.is_empty() {
            return Err(IngestError::MalformedEvent(format!("empty flag key in path '{path}'")));
        }
        return Ok((DataKind::Flags, key));
    }
    if let Some(key) = trimmed.strip_prefix("segments/") {
        if key.is_empty() {
            return Err(IngestError::MalformedEvent(format!("empty segment key in path '{path}'")));
        }
        return Ok((DataKind::Segments, key));
    }
    Err(IngestError::MalformedEvent(format!("unaddressable path '{path}'")))
}

/// Decode a `patch` event's `data` field into a store [`Item`] given the
/// kind recovered from its path.
pub fn decode_patch_item(kind: DataKind, data: serde_json::Value) -> Result<Item, IngestError> {
    match kind {
        DataKind::Flags => {
            let flag: Flag = serde_json::from_value(data).map_err(|e| IngestError::MalformedEvent(e.to_string()))?;
            Ok(Item::Flag(flag))
        }
        DataKind::Segments => {
            let segment: Segment = serde_json::from_value(data).map_err(|e| IngestError::MalformedEvent(e.to_string()))?;
            Ok(Item::Segment(segment))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flag_path() {
        let (kind, key) = parse_item_path("/flags/abc").unwrap();
        assert_eq!(kind, DataKind::Flags);
        assert_eq!(key, "abc");
    }

    #[test]
    fn parses_segment_path() {
        let (kind, key) = parse_item_path("/segments/xyz").unwrap();
        assert_eq!(kind, DataKind::Segments);
        assert_eq!(key, "xyz");
    }

    #[test]
    fn rejects_root_path() {
        assert!(parse_item_path("/").is_err());
    }

    #[test]
    fn rejects_unknown_prefix() {
        assert!(parse_item_path("/widgets/abc").is_err());
    }
}
