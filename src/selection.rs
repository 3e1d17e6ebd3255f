//! Seleção de itens para submissão em lote.
//!
//! [`SelectionSet`] guarda apenas pertinência: um id selecionado não precisa
//! estar na página ou no filtro atual. [`PaginatedList`] é a lista paginada
//! com seleção usada por todas as telas de ação em lote; uma nova busca
//! (`replace_rows`) sempre limpa a seleção, porque os ids antigos podem
//! apontar para linhas obsoletas.

use std::collections::HashSet;

use crate::api::CandidateItem;
use crate::job::ItemId;

/// The user's chosen items for the next submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: HashSet<ItemId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`; returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &ItemId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    /// Clear the selection if it already covers exactly `visible`, otherwise
    /// replace it with `visible`.
    pub fn select_all<'a>(&mut self, visible: impl IntoIterator<Item = &'a ItemId>) {
        let visible: HashSet<ItemId> = visible.into_iter().cloned().collect();
        if self.ids == visible {
            self.ids.clear();
        } else {
            self.ids = visible;
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_selected(&self, id: &ItemId) -> bool {
        self.ids.contains(id)
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sorted copy of the selected ids.
    pub fn ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// Row types that carry an item identifier.
pub trait Identified {
    fn item_id(&self) -> &ItemId;
}

impl Identified for CandidateItem {
    fn item_id(&self) -> &ItemId {
        &self.id
    }
}

impl Identified for ItemId {
    fn item_id(&self) -> &ItemId {
        self
    }
}

/// Ordered rows, split into fixed-size pages, with a selection.
#[derive(Debug, Clone)]
pub struct PaginatedList<T> {
    rows: Vec<T>,
    page_size: usize,
    page: usize,
    selection: SelectionSet,
}

impl<T> PaginatedList<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            rows: Vec::new(),
            page_size: page_size.max(1),
            page: 1,
            selection: SelectionSet::new(),
        }
    }

    /// Install the result of a new search: back to page 1, selection cleared.
    pub fn replace_rows(&mut self, rows: Vec<T>) {
        self.rows = rows;
        self.page = 1;
        self.selection.clear();
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Current page, 1-based.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Zero for an empty list.
    pub fn page_count(&self) -> usize {
        self.rows.len().div_ceil(self.page_size)
    }

    /// Jump to `page`, clamped to the valid range.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.page_count().max(1));
    }

    pub fn next_page(&mut self) -> bool {
        if self.page < self.page_count() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    pub fn page_rows(&self) -> &[T] {
        let start = ((self.page - 1) * self.page_size).min(self.rows.len());
        let end = (start + self.page_size).min(self.rows.len());
        &self.rows[start..end]
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }
}

impl<T: Identified> PaginatedList<T> {
    /// Toggle a row of this list. `None` when no row has that id.
    pub fn toggle(&mut self, id: &ItemId) -> Option<bool> {
        if !self.rows.iter().any(|r| r.item_id() == id) {
            return None;
        }
        Some(self.selection.toggle(id))
    }

    /// Select-all control over every row of the list, not only the page.
    pub fn toggle_all(&mut self) {
        self.selection
            .select_all(self.rows.iter().map(Identified::item_id));
    }

    pub fn selected_rows(&self) -> Vec<&T> {
        self.rows
            .iter()
            .filter(|r| self.selection.is_selected(r.item_id()))
            .collect()
    }

    /// Selected ids in row order, ready for submission.
    pub fn selected_ids(&self) -> Vec<ItemId> {
        self.selected_rows()
            .into_iter()
            .map(|r| r.item_id().clone())
            .collect()
    }
}
