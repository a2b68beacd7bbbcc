//! Project records cached for the signed-in user

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A project as returned by `GET /api/projects`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub trade: Option<String>,
}
