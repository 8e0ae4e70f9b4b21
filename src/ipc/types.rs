use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One line of the stdin protocol. `params` defaults to JSON null so
/// parameter-less methods can omit it.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything that survives between requests: the selected workspace
/// directory and its open database handle.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
