//! Pending write operations
//!
//! A [`PendingOperation`] is a write intent against a named collection and
//! document id that has not yet been confirmed by the remote store. Callers
//! describe the intent with a [`NewOperation`]; the queue validates it,
//! assigns an [`OperationId`] and journals it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Key/value body of a create or update
pub type Payload = serde_json::Map<String, serde_json::Value>;

const ID_SUFFIX_LEN: usize = 9;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Unique identifier of a pending operation
///
/// Generated as `{unix_millis}-{random base36 suffix}` so ids sort roughly by
/// creation time and stay unique across reloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Generate a fresh id for the given instant
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
            .collect();
        Self(format!("{}-{}", now.timestamp_millis(), suffix))
    }

    /// Wrap an existing id string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of write carried by an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    /// Whether this kind must carry a payload
    pub fn requires_payload(&self) -> bool {
        matches!(self, OperationKind::Create | OperationKind::Update)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(OperationKind::Create),
            "update" => Ok(OperationKind::Update),
            "delete" => Ok(OperationKind::Delete),
            _ => Err(ValidationError::InvalidKind(s.to_string())),
        }
    }
}

/// A write intent as described by the caller, before it is queued
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub kind: OperationKind,
    pub collection: String,
    pub document_id: String,
    pub payload: Option<Payload>,
    pub origin_id: Option<String>,
}

impl NewOperation {
    /// Describe a document creation
    pub fn create(
        collection: impl Into<String>,
        document_id: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            kind: OperationKind::Create,
            collection: collection.into(),
            document_id: document_id.into(),
            payload: Some(payload),
            origin_id: None,
        }
    }

    /// Describe a document update
    pub fn update(
        collection: impl Into<String>,
        document_id: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            kind: OperationKind::Update,
            collection: collection.into(),
            document_id: document_id.into(),
            payload: Some(payload),
            origin_id: None,
        }
    }

    /// Describe a document deletion
    pub fn delete(collection: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            collection: collection.into(),
            document_id: document_id.into(),
            payload: None,
            origin_id: None,
        }
    }

    /// Attach the actor issuing the write
    pub fn with_origin(mut self, origin_id: impl Into<String>) -> Self {
        self.origin_id = Some(origin_id.into());
        self
    }

    /// Replace the payload (mainly useful for building invalid requests in tests)
    pub fn with_payload(mut self, payload: Option<Payload>) -> Self {
        self.payload = payload;
        self
    }

    /// Check the payload/kind contract
    ///
    /// Create and Update need a non-empty payload; Delete must not carry one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.collection.trim().is_empty() {
            return Err(ValidationError::EmptyCollection);
        }
        if self.document_id.trim().is_empty() {
            return Err(ValidationError::EmptyDocumentId);
        }

        let kind = self.kind.as_str().to_string();
        match (self.kind.requires_payload(), &self.payload) {
            (true, None) => Err(ValidationError::MissingPayload { kind }),
            (true, Some(payload)) if payload.is_empty() => {
                Err(ValidationError::EmptyPayload { kind })
            }
            (false, Some(_)) => Err(ValidationError::UnexpectedPayload { kind }),
            _ => Ok(()),
        }
    }
}

/// A queued write intent awaiting replay against the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub collection: String,
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
    #[serde(default)]
    pub origin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl PendingOperation {
    /// Validate a new operation and stamp it with a fresh id
    pub fn from_new(op: NewOperation, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        op.validate()?;
        Ok(Self {
            id: OperationId::generate(now),
            kind: op.kind,
            collection: op.collection,
            document_id: op.document_id,
            payload: op.payload,
            enqueued_at: now,
            attempts: 0,
            origin_id: op.origin_id,
            last_attempt_at: None,
        })
    }

    /// Record a replay attempt
    pub fn record_attempt(&mut self, now: DateTime<Utc>) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_attempt_at = Some(now);
    }

    /// `collection/document_id`, for logging
    pub fn target(&self) -> String {
        format!("{}/{}", self.collection, self.document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Payload {
        let mut p = Payload::new();
        p.insert("confirmed".to_string(), json!(42));
        p
    }

    #[test]
    fn test_operation_id_format() {
        let now = Utc::now();
        let id = OperationId::generate(now);
        let (millis, suffix) = id.as_str().split_once('-').unwrap();
        assert_eq!(millis, now.timestamp_millis().to_string());
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_operation_ids_are_unique() {
        let now = Utc::now();
        let ids: std::collections::HashSet<_> =
            (0..500).map(|_| OperationId::generate(now)).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("create".parse::<OperationKind>().unwrap(), OperationKind::Create);
        assert_eq!("UPDATE".parse::<OperationKind>().unwrap(), OperationKind::Update);
        assert_eq!("Delete".parse::<OperationKind>().unwrap(), OperationKind::Delete);
        assert!(matches!(
            "upsert".parse::<OperationKind>(),
            Err(ValidationError::InvalidKind(_))
        ));
    }

    #[test]
    fn test_validate_payload_rules() {
        assert!(NewOperation::create("attendance", "w1", payload()).validate().is_ok());
        assert!(NewOperation::update("attendance", "w1", payload()).validate().is_ok());
        assert!(NewOperation::delete("attendance", "w1").validate().is_ok());

        let missing = NewOperation::create("attendance", "w1", payload()).with_payload(None);
        assert!(matches!(
            missing.validate(),
            Err(ValidationError::MissingPayload { .. })
        ));

        let empty = NewOperation::update("attendance", "w1", Payload::new());
        assert!(matches!(
            empty.validate(),
            Err(ValidationError::EmptyPayload { .. })
        ));

        let extra = NewOperation::delete("attendance", "w1").with_payload(Some(payload()));
        assert!(matches!(
            extra.validate(),
            Err(ValidationError::UnexpectedPayload { .. })
        ));
    }

    #[test]
    fn test_validate_target() {
        let op = NewOperation::delete("", "w1");
        assert_eq!(op.validate(), Err(ValidationError::EmptyCollection));

        let op = NewOperation::delete("menus", "  ");
        assert_eq!(op.validate(), Err(ValidationError::EmptyDocumentId));
    }

    #[test]
    fn test_from_new_starts_at_zero_attempts() {
        let now = Utc::now();
        let op = PendingOperation::from_new(
            NewOperation::create("menus", "m1", payload()).with_origin("coordinator-7"),
            now,
        )
        .unwrap();
        assert_eq!(op.attempts, 0);
        assert_eq!(op.enqueued_at, now);
        assert_eq!(op.origin_id.as_deref(), Some("coordinator-7"));
        assert!(op.last_attempt_at.is_none());
        assert_eq!(op.target(), "menus/m1");
    }

    #[test]
    fn test_journal_format_is_camel_case() {
        let op = PendingOperation::from_new(NewOperation::delete("menus", "m1"), Utc::now())
            .unwrap();
        let value = serde_json::to_value(&op).unwrap();
        assert!(value.get("documentId").is_some());
        assert!(value.get("enqueuedAt").is_some());
        assert_eq!(value["kind"], json!("delete"));
        assert!(value.get("payload").is_none());

        let back: PendingOperation = serde_json::from_value(value).unwrap();
        assert_eq!(back, op);
    }
}
