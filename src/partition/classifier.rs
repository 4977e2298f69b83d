//! Request classification.
//!
//! Maps the attributes a request carries at issue time to a partition.
//! Mappings come from configuration tables; requestor numbering depends on
//! how the system was assembled, so no numeric ranges are assumed here.

use std::collections::HashMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::partition::{ConfigError, PartitionId, DEFAULT_PARTITION};

/// Metadata available on a request when it is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAttributes {
    /// Identifier of the requesting port (CPU data side, walker, ...).
    #[serde(default)]
    pub requestor_id: Option<u32>,

    /// Quality-of-service or software-assigned label.
    #[serde(default)]
    pub tag: Option<String>,
}

impl RequestAttributes {
    pub fn from_requestor(requestor_id: u32) -> Self {
        Self {
            requestor_id: Some(requestor_id),
            tag: None,
        }
    }

    pub fn from_tag(tag: impl Into<String>) -> Self {
        Self {
            requestor_id: None,
            tag: Some(tag.into()),
        }
    }
}

/// Derives a partition from request attributes.
///
/// Must be a pure function of its input. Attributes that match nothing
/// resolve to [`DEFAULT_PARTITION`].
pub trait PartitionClassifier: Debug + Send + Sync {
    fn classify(&self, attrs: &RequestAttributes) -> PartitionId;
}

/// Puts every request in the default partition.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl PartitionClassifier for DefaultClassifier {
    fn classify(&self, _attrs: &RequestAttributes) -> PartitionId {
        DEFAULT_PARTITION
    }
}

/// Table lookup: tag first, then requestor id.
#[derive(Debug, Clone, Default)]
pub struct TableClassifier {
    by_tag: HashMap<String, PartitionId>,
    by_requestor: HashMap<u32, PartitionId>,
}

impl TableClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ConfigError> {
        let mut classifier = Self::new();
        for entry in &config.tags {
            classifier.insert_tag(entry.tag.clone(), entry.partition_id)?;
        }
        for group in &config.requestor_groups {
            for &requestor in &group.requestors {
                classifier.insert_requestor(requestor, group.partition_id)?;
            }
        }
        Ok(classifier)
    }

    pub fn insert_tag(&mut self, tag: String, id: PartitionId) -> Result<(), ConfigError> {
        if self.by_tag.contains_key(&tag) {
            return Err(ConfigError::DuplicateClassifierKey(format!("tag {tag:?}")));
        }
        self.by_tag.insert(tag, id);
        Ok(())
    }

    pub fn insert_requestor(&mut self, requestor: u32, id: PartitionId) -> Result<(), ConfigError> {
        if self.by_requestor.insert(requestor, id).is_some() {
            return Err(ConfigError::DuplicateClassifierKey(format!(
                "requestor {requestor}"
            )));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty() && self.by_requestor.is_empty()
    }
}

impl PartitionClassifier for TableClassifier {
    fn classify(&self, attrs: &RequestAttributes) -> PartitionId {
        let by_tag = attrs.tag.as_ref().and_then(|tag| self.by_tag.get(tag));
        let by_requestor = attrs
            .requestor_id
            .and_then(|requestor| self.by_requestor.get(&requestor));

        match by_tag.or(by_requestor) {
            Some(&id) => id,
            None => {
                debug!(
                    requestor_id = ?attrs.requestor_id,
                    tag = ?attrs.tag,
                    "Unclassified request, using default partition"
                );
                DEFAULT_PARTITION
            }
        }
    }
}

/// Build the classifier described by `config`.
pub fn build_classifier(config: &ClassifierConfig) -> Result<Box<dyn PartitionClassifier>, ConfigError> {
    let table = TableClassifier::from_config(config)?;
    if table.is_empty() {
        Ok(Box::new(DefaultClassifier))
    } else {
        Ok(Box::new(table))
    }
}
