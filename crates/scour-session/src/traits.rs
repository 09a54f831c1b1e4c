//! Boundaries to the search backend. The session core never performs
//! network I/O itself; hosts provide these collaborators.

use scour_core::{Document, FieldCapability, SearchQuery};
use std::collections::HashMap;

use crate::errors::Result;

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub documents: Vec<Document>,
    pub total: u64,
}

/// Field-capabilities response: field name -> type name -> capability.
pub type CapsResponse = HashMap<String, HashMap<String, FieldCapability>>;

/// Executes a compiled query against one index pattern.
///
/// A throttling response from the backend must surface as
/// [`SessionError::Throttled`](crate::SessionError::Throttled) so the
/// session can back off and retry.
#[async_trait::async_trait]
pub trait SearchExecutor: Send + Sync + 'static {
    async fn execute(&self, index: &str, query: &SearchQuery) -> Result<SearchPage>;
}

/// Fetches per-field type/searchable/aggregatable capabilities for a
/// field glob.
#[async_trait::async_trait]
pub trait FieldCapabilitiesProvider: Send + Sync + 'static {
    async fn field_caps(&self, glob: &str) -> Result<CapsResponse>;
}

/// Lists index names matching a glob. Hosts use this to pick the index
/// string passed to [`SearchExecutor::execute`].
#[async_trait::async_trait]
pub trait IndexLister: Send + Sync + 'static {
    async fn list_indices(&self, glob: &str) -> Result<Vec<String>>;
}
