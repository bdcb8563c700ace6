//! Scripted in-memory client used by the runner tests.

use super::RelationshipClient;
use crate::error::ClientError;
use crate::model::{MutationKind, Page, PageToken, RelationshipEntity, Tier};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

pub fn entity(n: usize) -> RelationshipEntity {
    RelationshipEntity {
        id: format!("id-{n}"),
        username: format!("user{n}"),
        display_name: format!("User {n}"),
        tier: Tier::Ordinary,
        newsletter_id: None,
    }
}

pub fn entities(range: std::ops::Range<usize>) -> Vec<RelationshipEntity> {
    range.map(entity).collect()
}

#[derive(Default)]
struct Inner {
    pages: HashMap<Option<String>, VecDeque<Result<Page, ClientError>>>,
    failures: HashMap<String, VecDeque<ClientError>>,
    hanging: HashSet<String>,
    list_calls: Vec<Option<String>>,
    mutate_calls: Vec<String>,
}

#[derive(Default)]
pub struct MockClient {
    inner: Mutex<Inner>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `entities` for `cursor`, followed by `next`.
    pub fn with_page(
        self,
        cursor: Option<&str>,
        entities: Vec<RelationshipEntity>,
        next: PageToken,
    ) -> Self {
        self.push_page(cursor, Ok(Page { entities, next }));
        self
    }

    pub fn with_page_error(self, cursor: Option<&str>, err: ClientError) -> Self {
        self.push_page(cursor, Err(err));
        self
    }

    /// Make the next `times` mutations of `id` fail with `err`.
    pub fn failing(self, id: &str, err: ClientError, times: usize) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            let queue = inner.failures.entry(id.to_string()).or_default();
            for _ in 0..times {
                queue.push_back(err.clone());
            }
        }
        self
    }

    /// Mutations of `id` never resolve.
    pub fn hanging(self, id: &str) -> Self {
        self.inner.lock().unwrap().hanging.insert(id.to_string());
        self
    }

    pub fn list_calls(&self) -> Vec<Option<String>> {
        self.inner.lock().unwrap().list_calls.clone()
    }

    pub fn mutate_calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().mutate_calls.clone()
    }

    pub fn attempts_for(&self, id: &str) -> usize {
        self.mutate_calls().iter().filter(|c| *c == id).count()
    }

    fn push_page(&self, cursor: Option<&str>, page: Result<Page, ClientError>) {
        self.inner
            .lock()
            .unwrap()
            .pages
            .entry(cursor.map(str::to_string))
            .or_default()
            .push_back(page);
    }
}

#[async_trait]
impl RelationshipClient for MockClient {
    async fn list_page(&self, cursor: Option<&str>) -> Result<Page, ClientError> {
        let mut inner = self.inner.lock().unwrap();
        let key = cursor.map(str::to_string);
        inner.list_calls.push(key.clone());
        match inner.pages.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| Ok(Page::default())),
            None => Ok(Page::default()),
        }
    }

    async fn mutate(
        &self,
        entity: &RelationshipEntity,
        _kind: MutationKind,
    ) -> Result<(), ClientError> {
        let scripted = {
            let mut inner = self.inner.lock().unwrap();
            inner.mutate_calls.push(entity.id.clone());
            if inner.hanging.contains(&entity.id) {
                None
            } else {
                Some(inner.failures.get_mut(&entity.id).and_then(VecDeque::pop_front))
            }
        };

        match scripted {
            Some(Some(err)) => Err(err),
            Some(None) => Ok(()),
            None => std::future::pending().await,
        }
    }
}
