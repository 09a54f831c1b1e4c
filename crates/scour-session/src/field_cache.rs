//! Concurrent field-name -> metadata cache, one instance per active
//! index/session. No eviction; entries are overwritten on refresh and
//! the whole cache is discarded on index switch.

use parking_lot::RwLock;
use scour_core::{FieldLookup, FieldMetadata, FieldType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::traits::CapsResponse;

#[derive(Clone)]
pub struct FieldCache {
    inner: Arc<RwLock<HashMap<String, FieldMetadata>>>,
}

impl FieldCache {
    /// A fresh cache, seeded with the built-in index fields.
    pub fn new() -> Self {
        let mut map = HashMap::new();
        let builtin = FieldMetadata {
            field_type: FieldType::Keyword,
            searchable: true,
            aggregatable: true,
            active: true,
        };
        map.insert("_id".to_string(), builtin);
        map.insert("_index".to_string(), builtin);
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    pub fn get(&self, field: &str) -> Option<FieldMetadata> {
        self.inner.read().get(field).copied()
    }

    pub fn set(&self, field: impl Into<String>, meta: FieldMetadata) {
        self.inner.write().insert(field.into(), meta);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.inner.read().contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Absorb a bulk field-capabilities response. A field reported under
    /// several mapping types resolves to the lexicographically smallest
    /// type name, so refreshes are deterministic.
    pub fn absorb_capabilities(&self, caps: &CapsResponse) {
        let mut inner = self.inner.write();
        for (field, by_type) in caps {
            let Some(type_name) = by_type.keys().min() else {
                continue;
            };
            let cap = &by_type[type_name];
            inner.insert(
                field.clone(),
                FieldMetadata {
                    field_type: FieldType::from_caps_name(type_name),
                    searchable: cap.searchable,
                    aggregatable: cap.aggregatable,
                    active: true,
                },
            );
        }
        debug!(fields = caps.len(), total = inner.len(), "absorbed field capabilities");
    }
}

impl Default for FieldCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldLookup for FieldCache {
    fn lookup(&self, field: &str) -> Option<FieldMetadata> {
        self.get(field)
    }
}
