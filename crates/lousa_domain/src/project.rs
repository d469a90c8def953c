use derive_more::derive::Display;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Display, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ProjectId(Uuid);

impl ProjectId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn into_string(&self) -> String {
        self.0.to_string()
    }

    pub fn parse(value: impl ToString) -> Result<Self, Error> {
        Ok(Self(
            Uuid::parse_str(&value.to_string()).map_err(Error::InvalidId)?,
        ))
    }
}

/// Name of a project's vector-store collection. Created lazily on the first
/// ingest and never reassigned afterwards.
#[derive(Debug, Display, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CollectionHandle(String);

impl CollectionHandle {
    pub fn for_project(project_id: &ProjectId) -> Self {
        Self(format!("project_{project_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A teacher's workspace. Owns its documents, conversations, generated files
/// and at most one vector-store collection.
#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: Uuid,
    pub name: String,
    pub subject: Option<String>,
    pub collection_handle: Option<CollectionHandle>,
}

impl Project {
    pub fn new(owner_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: ProjectId::generate(),
            owner_id,
            name: name.into(),
            subject: None,
            collection_handle: None,
        }
    }

    pub fn test() -> Self {
        Self::new(Uuid::new_v4(), "Historia do Brasil").subject("Historia")
    }
}
