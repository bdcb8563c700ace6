use crate::model::PageToken;
use std::collections::HashSet;
use tracing::warn;

/// Pagination bookkeeping for one run. Moves forward only.
#[derive(Debug, Default)]
pub struct PaginationCursor {
    cursor: Option<String>,
    has_more: bool,
    consumed: HashSet<String>,
}

impl PaginationCursor {
    /// Cursor continuing after a page the caller already holds.
    pub fn resume(token: PageToken) -> Self {
        let mut cursor = Self::default();
        cursor.advance(token);
        cursor
    }

    /// Record the token returned with the latest page. A cursor that was
    /// already consumed ends pagination instead of looping.
    pub fn advance(&mut self, token: PageToken) {
        match token.cursor {
            Some(next) if token.has_more && self.consumed.contains(&next) => {
                warn!("Remote returned an already consumed cursor {}; stopping", next);
                self.cursor = None;
                self.has_more = false;
            }
            Some(next) if token.has_more => {
                self.cursor = Some(next);
                self.has_more = true;
            }
            _ => {
                self.cursor = None;
                self.has_more = false;
            }
        }
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Cursor for the next fetch; marks it consumed.
    pub fn take(&mut self) -> Option<String> {
        let cursor = self.cursor.take();
        if let Some(c) = &cursor {
            self.consumed.insert(c.clone());
        }
        cursor
    }

    /// Stop paginating, e.g. after an empty page.
    pub fn finish(&mut self) {
        self.cursor = None;
        self.has_more = false;
    }
}
