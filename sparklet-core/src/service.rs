//! Sparklet records, publishing workflow and AI generation
//!
//! Storage and generation are traits so the host can plug in files, a
//! document database or an HTTP model endpoint. Unlike engine failures,
//! every error here reaches the caller so it can be shown and retried.

use crate::definition::{DefinitionError, SparkletDefinition};
use crate::store::StoreError;
use indexmap::IndexMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info};

/// Length of generated record ids
pub const ID_LENGTH: usize = 20;
const COPY_SUFFIX: &str = " (Copy)";
const UNTITLED: &str = "Untitled Sparklet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Draft,
    Pending,
    Published,
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishStatus::Draft => "draft",
            PublishStatus::Pending => "pending",
            PublishStatus::Published => "published",
        };
        write!(f, "{}", name)
    }
}

/// Stored Sparklet: denormalized metadata plus the definition JSON text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkletRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub definition: String,
    pub owner: String,
    pub status: PublishStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl SparkletRecord {
    pub fn is_owned_by(&self, identity: &str) -> bool {
        self.owner == identity
    }

    /// Copy title/description/icon from the definition's own metadata
    fn sync_metadata(&mut self, definition: &SparkletDefinition) {
        if let Some(title) = &definition.title {
            self.title = title.clone();
        }
        if let Some(description) = &definition.description {
            self.description = description.clone();
        }
        if let Some(icon) = &definition.icon {
            self.icon = icon.clone();
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Sparklet '{0}' not found")]
    NotFound(String),

    #[error("'{identity}' does not own sparklet '{id}'")]
    Forbidden { id: String, identity: String },

    #[error("Cannot move sparklet from {from} to {to}")]
    InvalidTransition {
        from: PublishStatus,
        to: PublishStatus,
    },

    #[error("Invalid definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Record storage
pub trait SparkletRepository {
    fn get(&self, id: &str) -> Result<Option<SparkletRecord>, StoreError>;
    fn put(&mut self, record: SparkletRecord) -> Result<(), StoreError>;
    fn delete(&mut self, id: &str) -> Result<bool, StoreError>;
    fn list(&self) -> Result<Vec<SparkletRecord>, StoreError>;

    fn list_published(&self) -> Result<Vec<SparkletRecord>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|record| record.status == PublishStatus::Published)
            .collect())
    }

    fn list_owned(&self, identity: &str) -> Result<Vec<SparkletRecord>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|record| record.is_owned_by(identity))
            .collect())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryRepository {
    records: IndexMap<String, SparkletRecord>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SparkletRepository for MemoryRepository {
    fn get(&self, id: &str) -> Result<Option<SparkletRecord>, StoreError> {
        Ok(self.records.get(id).cloned())
    }

    fn put(&mut self, record: SparkletRecord) -> Result<(), StoreError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.shift_remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<SparkletRecord>, StoreError> {
        Ok(self.records.values().cloned().collect())
    }
}

/// A candidate definition plus a one or two sentence change summary
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSparklet {
    pub definition: serde_json::Value,
    pub summary: String,
}

/// `generate(vision) -> { definition, summary }`. `base` is the current
/// definition when refining an existing Sparklet.
pub trait SparkletGenerator {
    fn generate(
        &self,
        vision: &str,
        base: Option<&serde_json::Value>,
    ) -> anyhow::Result<GeneratedSparklet>;
}

pub struct SparkletService<R: SparkletRepository, G: SparkletGenerator> {
    repository: R,
    generator: G,
}

impl<R: SparkletRepository, G: SparkletGenerator> SparkletService<R, G> {
    pub fn new(repository: R, generator: G) -> Self {
        SparkletService {
            repository,
            generator,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Published sparklets plus the caller's own, each id once
    pub fn list_visible(&self, identity: &str) -> ServiceResult<Vec<SparkletRecord>> {
        let mut visible: IndexMap<String, SparkletRecord> = IndexMap::new();
        for record in self
            .repository
            .list_published()?
            .into_iter()
            .chain(self.repository.list_owned(identity)?)
        {
            visible.entry(record.id.clone()).or_insert(record);
        }
        Ok(visible.into_values().collect())
    }

    pub fn get(&self, id: &str) -> ServiceResult<SparkletRecord> {
        self.repository
            .get(id)?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    /// The serialized definition
    pub fn definition(&self, id: &str) -> ServiceResult<String> {
        Ok(self.get(id)?.definition)
    }

    /// Replace the definition, keeping the record's title/description/icon
    /// in step with the definition's own metadata
    pub fn update_definition(
        &mut self,
        id: &str,
        identity: &str,
        json: &str,
    ) -> ServiceResult<SparkletRecord> {
        let mut record = self.owned(id, identity)?;
        let definition = SparkletDefinition::from_json(json)?;

        record.definition = json.to_string();
        record.sync_metadata(&definition);
        record.updated_at = now_ms();
        self.repository.put(record.clone())?;
        debug!(id = %record.id, "Updated definition");
        Ok(record)
    }

    /// Store a hand-authored definition as a new draft
    pub fn create(&mut self, identity: &str, json: &str) -> ServiceResult<SparkletRecord> {
        let definition = SparkletDefinition::from_json(json)?;
        let record = new_record(identity, json.to_string(), &definition);
        self.repository.put(record.clone())?;
        info!(id = %record.id, title = %record.title, "Created sparklet");
        Ok(record)
    }

    /// Generate a new draft from a natural-language vision. Returns the
    /// record and the generator's summary.
    pub fn create_from_vision(
        &mut self,
        identity: &str,
        vision: &str,
    ) -> ServiceResult<(SparkletRecord, String)> {
        let generated = self.generate(vision, None)?;
        let definition = SparkletDefinition::from_value(generated.definition.clone())?;

        let record = new_record(identity, generated.definition.to_string(), &definition);
        self.repository.put(record.clone())?;
        info!(id = %record.id, title = %record.title, "Generated sparklet");
        Ok((record, generated.summary))
    }

    /// Ask the generator to revise an existing definition. Nothing is
    /// stored unless generation and validation both succeed.
    pub fn refine(
        &mut self,
        id: &str,
        identity: &str,
        vision: &str,
    ) -> ServiceResult<(SparkletRecord, String)> {
        let record = self.owned(id, identity)?;
        let base: serde_json::Value = serde_json::from_str(&record.definition)
            .map_err(|e| ServiceError::InvalidDefinition(DefinitionError::Json(e)))?;

        let generated = self.generate(vision, Some(&base))?;
        SparkletDefinition::from_value(generated.definition.clone())?;
        let updated = self.update_definition(id, identity, &generated.definition.to_string())?;
        Ok((updated, generated.summary))
    }

    /// Copy a sparklet under a new id as the caller's draft, with
    /// " (Copy)" added to the record title and the definition's title
    pub fn duplicate(&mut self, id: &str, identity: &str) -> ServiceResult<SparkletRecord> {
        let source = self.get(id)?;
        let title = format!("{}{}", source.title, COPY_SUFFIX);

        let mut definition: serde_json::Value = serde_json::from_str(&source.definition)
            .map_err(|e| ServiceError::InvalidDefinition(DefinitionError::Json(e)))?;
        if let Some(map) = definition.as_object_mut() {
            let inner = map
                .get("title")
                .and_then(|t| t.as_str())
                .map(|t| format!("{}{}", t, COPY_SUFFIX))
                .unwrap_or_else(|| title.clone());
            map.insert("title".to_string(), serde_json::Value::from(inner));
        }

        let now = now_ms();
        let record = SparkletRecord {
            id: new_id(),
            title,
            definition: definition.to_string(),
            owner: identity.to_string(),
            status: PublishStatus::Draft,
            created_at: now,
            updated_at: now,
            ..source
        };
        self.repository.put(record.clone())?;
        info!(from = %id, id = %record.id, "Duplicated sparklet");
        Ok(record)
    }

    /// draft -> pending
    pub fn submit_for_review(&mut self, id: &str, identity: &str) -> ServiceResult<SparkletRecord> {
        let record = self.owned(id, identity)?;
        self.transition(record, PublishStatus::Pending)
    }

    /// pending -> published (moderation)
    pub fn publish(&mut self, id: &str) -> ServiceResult<SparkletRecord> {
        let record = self.get(id)?;
        self.transition(record, PublishStatus::Published)
    }

    /// pending/published -> draft
    pub fn unpublish(&mut self, id: &str, identity: &str) -> ServiceResult<SparkletRecord> {
        let record = self.owned(id, identity)?;
        self.transition(record, PublishStatus::Draft)
    }

    /// Owners only
    pub fn delete(&mut self, id: &str, identity: &str) -> ServiceResult<()> {
        self.owned(id, identity)?;
        self.repository.delete(id)?;
        info!(id = %id, "Deleted sparklet");
        Ok(())
    }

    fn transition(&mut self, mut record: SparkletRecord, to: PublishStatus) -> ServiceResult<SparkletRecord> {
        let allowed = matches!(
            (record.status, to),
            (PublishStatus::Draft, PublishStatus::Pending)
                | (PublishStatus::Pending, PublishStatus::Published)
                | (PublishStatus::Pending, PublishStatus::Draft)
                | (PublishStatus::Published, PublishStatus::Draft)
        );
        if !allowed {
            return Err(ServiceError::InvalidTransition {
                from: record.status,
                to,
            });
        }

        debug!(id = %record.id, from = %record.status, %to, "Status change");
        record.status = to;
        record.updated_at = now_ms();
        self.repository.put(record.clone())?;
        Ok(record)
    }

    fn owned(&self, id: &str, identity: &str) -> ServiceResult<SparkletRecord> {
        let record = self.get(id)?;
        if !record.is_owned_by(identity) {
            return Err(ServiceError::Forbidden {
                id: id.to_string(),
                identity: identity.to_string(),
            });
        }
        Ok(record)
    }

    fn generate(&self, vision: &str, base: Option<&serde_json::Value>) -> ServiceResult<GeneratedSparklet> {
        self.generator
            .generate(vision, base)
            .map_err(|e| ServiceError::Generation(format!("{:#}", e)))
    }
}

fn new_record(identity: &str, definition_json: String, definition: &SparkletDefinition) -> SparkletRecord {
    let now = now_ms();
    let mut record = SparkletRecord {
        id: new_id(),
        title: UNTITLED.to_string(),
        description: String::new(),
        icon: String::new(),
        definition: definition_json,
        owner: identity.to_string(),
        status: PublishStatus::Draft,
        created_at: now,
        updated_at: now,
    };
    record.sync_metadata(definition);
    record
}

/// Random alphanumeric record id
pub fn new_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(char::from)
        .collect()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
