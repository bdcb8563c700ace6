mod graphql;
#[cfg(test)]
pub mod mock;
mod payload;

pub use graphql::GraphqlClient;

use crate::config::Config;
use crate::error::{ClientError, ConfigError};
use crate::model::{MutationKind, Page, RelationshipEntity};
use async_trait::async_trait;
use std::sync::Arc;

/// Which remote list a bulk run walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    /// Accounts `username` follows
    Following { username: String },
    /// Accounts following `username`
    Followers { username: String },
}

impl ListSource {
    pub fn for_kind(kind: MutationKind, own: &str, target: Option<&str>) -> Self {
        match kind {
            MutationKind::Unfollow => ListSource::Following {
                username: own.to_string(),
            },
            MutationKind::Follow => ListSource::Followers {
                username: target.unwrap_or(own).to_string(),
            },
        }
    }
}

/// Remote side of a bulk run.
///
/// `list_page` is never called while another call to it is outstanding, and
/// `mutate` must tolerate being invoked twice for the same entity.
#[async_trait]
pub trait RelationshipClient: Send + Sync {
    /// Fetch one page. `None` requests the first page.
    async fn list_page(&self, cursor: Option<&str>) -> Result<Page, ClientError>;

    /// Apply one relationship change. The entity's tier selects the payload.
    async fn mutate(
        &self,
        entity: &RelationshipEntity,
        kind: MutationKind,
    ) -> Result<(), ClientError>;
}

/// Create the GraphQL-backed client for `source`, reading the session cookie
/// from the configured environment variable.
pub fn create_client(
    config: &Config,
    source: ListSource,
) -> Result<Arc<dyn RelationshipClient>, ConfigError> {
    let session = std::env::var(&config.session_env)
        .map_err(|_| ConfigError::MissingSession(config.session_env.clone()))?;

    Ok(Arc::new(GraphqlClient::new(
        config.endpoint.clone(),
        session,
        source,
        config.page_size,
    )))
}
