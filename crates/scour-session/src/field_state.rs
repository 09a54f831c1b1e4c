//! Display/selection state for the fields of the current index.
//!
//! One coarse read-write lock guards the whole struct so the
//! "selected is a subset of discovered" invariant stays atomic across
//! related mutations. No I/O happens under the lock.

use parking_lot::RwLock;
use scour_core::Document;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct Inner {
    discovered: HashSet<String>,
    selected: HashSet<String>,
    /// Display order of the selected fields; append on select, remove in
    /// place on unselect.
    order: Vec<String>,
    current_filter: String,
    /// Cached result of the current filter over unselected fields.
    filtered: Vec<String>,
}

impl Inner {
    fn recompute_filtered(&mut self) {
        let needle = self.current_filter.to_lowercase();
        let mut out: Vec<String> = self
            .discovered
            .iter()
            .filter(|f| !self.selected.contains(*f))
            .filter(|f| needle.is_empty() || f.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        out.sort();
        self.filtered = out;
    }

    fn check_invariants(&self) {
        debug_assert!(self.selected.is_subset(&self.discovered));
        debug_assert_eq!(self.order.len(), self.selected.len());
        debug_assert!(self.order.iter().all(|f| self.selected.contains(f)));
    }
}

#[derive(Clone, Default)]
pub struct FieldState {
    inner: Arc<RwLock<Inner>>,
}

impl FieldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union the field names seen across a batch of documents into the
    /// discovered set. A batch that changes nothing is a no-op; otherwise
    /// the set is replaced and selections referring to vanished fields
    /// are dropped.
    pub fn update_from_documents(&self, docs: &[Document]) {
        let mut next: HashSet<String> = HashSet::new();
        for doc in docs {
            next.extend(doc.keys().cloned());
        }
        let mut inner = self.inner.write();
        if next == inner.discovered {
            return;
        }
        debug!(fields = next.len(), "discovered field set changed");
        inner.discovered = next;
        let discovered = inner.discovered.clone();
        inner.selected.retain(|f| discovered.contains(f));
        inner.order.retain(|f| discovered.contains(f));
        inner.recompute_filtered();
        inner.check_invariants();
    }

    /// Select a discovered field for display. Selecting an unknown field
    /// is a no-op; selecting twice is idempotent.
    pub fn select_field(&self, field: &str) {
        let mut inner = self.inner.write();
        if !inner.discovered.contains(field) || inner.selected.contains(field) {
            return;
        }
        inner.selected.insert(field.to_string());
        inner.order.push(field.to_string());
        inner.recompute_filtered();
        inner.check_invariants();
    }

    pub fn unselect_field(&self, field: &str) {
        let mut inner = self.inner.write();
        if !inner.selected.remove(field) {
            return;
        }
        inner.order.retain(|f| f != field);
        inner.recompute_filtered();
        inner.check_invariants();
    }

    /// Swap the field with its neighbor in display order. Returns whether
    /// a swap happened; boundaries and unselected fields are no-ops.
    pub fn move_field(&self, field: &str, up: bool) -> bool {
        let mut inner = self.inner.write();
        let Some(idx) = inner.order.iter().position(|f| f == field) else {
            return false;
        };
        let swap_with = if up {
            if idx == 0 {
                return false;
            }
            idx - 1
        } else {
            if idx + 1 >= inner.order.len() {
                return false;
            }
            idx + 1
        };
        inner.order.swap(idx, swap_with);
        true
    }

    /// Store a case-insensitive substring filter and return the matching
    /// unselected discovered fields, sorted. An empty filter matches all.
    pub fn apply_filter(&self, substring: &str) -> Vec<String> {
        let mut inner = self.inner.write();
        inner.current_filter = substring.to_string();
        inner.recompute_filtered();
        inner.filtered.clone()
    }

    /// The cached result of the last applied filter.
    pub fn filtered_fields(&self) -> Vec<String> {
        self.inner.read().filtered.clone()
    }

    pub fn is_field_selected(&self, field: &str) -> bool {
        self.inner.read().selected.contains(field)
    }

    /// Defensive copy of the display order.
    pub fn ordered_selected_fields(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    pub fn discovered_fields(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut out: Vec<String> = inner.discovered.iter().cloned().collect();
        out.sort();
        out
    }
}
