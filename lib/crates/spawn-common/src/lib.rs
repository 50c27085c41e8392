pub mod history;
pub mod manifest;

pub use history::{Connection, SpawnRecord};
pub use manifest::{AgentDef, CloudDef, Manifest, ManifestError, MatrixStatus, is_manifest_key};
