use relay_domain::DataKind;
use relay_store::{Dataset, Item};
use serde::Serialize;

/// Outgoing body of a `put` frame: `{path:"/", data:{flags:{...}, segments:{...}}}`.
#[derive(Debug, Serialize)]
pub struct PutPayload {
    pub path: &'static str,
    pub data: Dataset,
}

impl PutPayload {
    pub fn full(dataset: Dataset) -> Self {
        PutPayload { path: "/", data: dataset }
    }
}

/// Outgoing body of a `patch` frame.
#[derive(Debug, Serialize)]
pub struct PatchPayload {
    pub path: String,
    pub data: Item,
}

/// Outgoing body of a `delete` frame.
#[derive(Debug, Serialize)]
pub struct DeletePayload {
    pub path: String,
    pub version: u64,
}

pub fn item_path(kind: DataKind, key: &str) -> String {
    format!("/{}/{}", kind.path_segment(), key)
}
