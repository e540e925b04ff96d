//! Agenda navigation and section-edit validation.
//!
//! Pages are ordered by `position`; soft-deleted pages stay in the list the
//! push source delivers but are skipped by everything here. Positions of live
//! pages are expected to be unique and dense from zero.

#[cfg(test)]
#[path = "agenda_test.rs"]
mod agenda_test;

use serde::{Deserialize, Serialize};

use crate::model::AgendaPage;

/// Upper bound on section display names, in characters.
pub const MAX_PAGE_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgendaError {
    #[error("section name must not be empty")]
    EmptyName,
    #[error("section name too long ({len} chars, max {max})")]
    NameTooLong { len: usize, max: usize },
    #[error("unknown agenda page: {0}")]
    UnknownPage(String),
    #[error("position {position} out of range for {len} sections")]
    PositionOutOfRange { position: u32, len: usize },
    #[error("duplicate section position {0}")]
    DuplicatePosition(u32),
    #[error("section positions not dense: expected {expected}, found {found}")]
    PositionGap { expected: u32, found: u32 },
}

/// New position assigned to a page by a reorder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePosition {
    pub page_id: String,
    pub position: u32,
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// Live pages in agenda order.
#[must_use]
pub fn navigable_pages(pages: &[AgendaPage]) -> Vec<&AgendaPage> {
    let mut live: Vec<&AgendaPage> = pages.iter().filter(|p| !p.is_deleted()).collect();
    live.sort_by_key(|p| p.position);
    live
}

#[must_use]
pub fn first_page(pages: &[AgendaPage]) -> Option<&AgendaPage> {
    pages.iter().filter(|p| !p.is_deleted()).min_by_key(|p| p.position)
}

/// Live page with the given id.
#[must_use]
pub fn find_page<'a>(pages: &'a [AgendaPage], page_id: &str) -> Option<&'a AgendaPage> {
    pages.iter().find(|p| p.id == page_id && !p.is_deleted())
}

#[must_use]
pub fn next_page_id<'a>(pages: &'a [AgendaPage], current: &str) -> Option<&'a str> {
    let live = navigable_pages(pages);
    let index = live.iter().position(|p| p.id == current)?;
    live.get(index + 1).map(|p| p.id.as_str())
}

#[must_use]
pub fn previous_page_id<'a>(pages: &'a [AgendaPage], current: &str) -> Option<&'a str> {
    let live = navigable_pages(pages);
    let index = live.iter().position(|p| p.id == current)?;
    let previous = index.checked_sub(1)?;
    live.get(previous).map(|p| p.id.as_str())
}

/// Sum of expected durations over live pages.
#[must_use]
pub fn total_expected_seconds(pages: &[AgendaPage]) -> u64 {
    pages
        .iter()
        .filter(|p| !p.is_deleted())
        .map(|p| u64::from(p.expected_duration_seconds))
        .sum()
}

/// Verify live positions are unique and dense from zero.
///
/// # Errors
///
/// Returns the first duplicate or gap found in agenda order.
pub fn check_positions(pages: &[AgendaPage]) -> Result<(), AgendaError> {
    let mut expected = 0u32;
    for page in navigable_pages(pages) {
        if page.position < expected {
            return Err(AgendaError::DuplicatePosition(page.position));
        }
        if page.position > expected {
            return Err(AgendaError::PositionGap { expected, found: page.position });
        }
        expected += 1;
    }
    Ok(())
}

// =============================================================================
// EDITS
// =============================================================================

/// Trim and bound a section name.
///
/// # Errors
///
/// [`AgendaError::EmptyName`] for blank names and
/// [`AgendaError::NameTooLong`] past [`MAX_PAGE_NAME_LEN`] characters.
pub fn validate_name(name: &str) -> Result<String, AgendaError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AgendaError::EmptyName);
    }
    let len = trimmed.chars().count();
    if len > MAX_PAGE_NAME_LEN {
        return Err(AgendaError::NameTooLong { len, max: MAX_PAGE_NAME_LEN });
    }
    Ok(trimmed.to_owned())
}

/// Position a newly added section takes: the end of the agenda.
#[must_use]
pub fn next_position(pages: &[AgendaPage]) -> u32 {
    u32::try_from(navigable_pages(pages).len()).unwrap_or(u32::MAX)
}

/// Move `page_id` to `new_position` and return the dense reassignment of every
/// live page.
///
/// # Errors
///
/// [`AgendaError::UnknownPage`] if the page is missing or deleted and
/// [`AgendaError::PositionOutOfRange`] past the end of the agenda.
pub fn reorder(pages: &[AgendaPage], page_id: &str, new_position: u32) -> Result<Vec<PagePosition>, AgendaError> {
    let mut live = navigable_pages(pages);
    let from = live
        .iter()
        .position(|p| p.id == page_id)
        .ok_or_else(|| AgendaError::UnknownPage(page_id.to_owned()))?;
    let to = usize::try_from(new_position).unwrap_or(usize::MAX);
    if to >= live.len() {
        return Err(AgendaError::PositionOutOfRange { position: new_position, len: live.len() });
    }

    let moved = live.remove(from);
    live.insert(to, moved);

    Ok(live
        .into_iter()
        .zip(0u32..)
        .map(|(page, position)| PagePosition { page_id: page.id.clone(), position })
        .collect())
}
