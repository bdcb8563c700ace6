use super::{payload, ListSource, RelationshipClient};
use crate::error::ClientError;
use crate::model::{MutationKind, Page, PageToken, RelationshipEntity, Tier};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

/// First-page `from` value the platform expects.
const FIRST_PAGE: &str = "0";

pub struct GraphqlClient {
    http: Client,
    endpoint: String,
    session: String,
    source: ListSource,
    page_size: usize,
}

impl GraphqlClient {
    pub fn new(endpoint: String, session: String, source: ListSource, page_size: usize) -> Self {
        Self {
            http: Client::new(),
            endpoint,
            session,
            source,
            page_size,
        }
    }

    async fn post(&self, body: &Value) -> Result<Value, ClientError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(COOKIE, &self.session)
            .json(body)
            .send()
            .await?;

        check_status(resp.status())?;

        let value: Value = resp.json().await?;
        let value = unbatch(value);
        check_graphql_errors(&value)?;
        Ok(value)
    }
}

#[async_trait]
impl RelationshipClient for GraphqlClient {
    async fn list_page(&self, cursor: Option<&str>) -> Result<Page, ClientError> {
        let from = cursor.unwrap_or(FIRST_PAGE);
        let (body, connection) = match &self.source {
            ListSource::Following { username } => (
                payload::following_list(username, from, self.page_size),
                "followingUserConnection",
            ),
            ListSource::Followers { username } => (
                payload::followers_list(username, from, self.page_size),
                "followersUserConnection",
            ),
        };

        debug!("Fetching {} page from {}", connection, from);
        let value = self.post(&body).await?;
        parse_page(&value, connection)
    }

    async fn mutate(
        &self,
        entity: &RelationshipEntity,
        kind: MutationKind,
    ) -> Result<(), ClientError> {
        let (body, field) = match (kind, entity.tier, entity.newsletter_id.as_deref()) {
            (MutationKind::Unfollow, _, _) => (payload::unfollow_user(&entity.id), "unfollowUser"),
            (MutationKind::Follow, Tier::Privileged, Some(newsletter_id)) => (
                payload::subscribe_newsletter(newsletter_id),
                "subscribeNewsletterV3",
            ),
            (MutationKind::Follow, _, _) => (payload::follow_user(&entity.id), "followUser"),
        };

        let value = self.post(&body).await?;
        check_mutation(&value, field, kind)
    }
}

fn check_status(status: StatusCode) -> Result<(), ClientError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ClientError::Fatal(format!("HTTP {}: session rejected", status)))
        }
        StatusCode::TOO_MANY_REQUESTS => Err(ClientError::Network("HTTP 429: rate limited".into())),
        s if !s.is_success() => Err(ClientError::Network(format!("HTTP {}", s))),
        _ => Ok(()),
    }
}

/// Mutations are sent as one-element batches; unwrap them so every response
/// is handled as a single object.
fn unbatch(value: Value) -> Value {
    match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    }
}

fn check_graphql_errors(value: &Value) -> Result<(), ClientError> {
    let Some(errors) = value.get("errors").and_then(Value::as_array) else {
        return Ok(());
    };
    let Some(first) = errors.first() else {
        return Ok(());
    };

    let message = first
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown GraphQL error")
        .to_string();
    let lower = message.to_lowercase();

    if ["unauthorized", "not authenticated", "forbidden", "not logged in"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        Err(ClientError::Fatal(message))
    } else if lower.contains("already") {
        Err(ClientError::Rejected(message))
    } else {
        Err(ClientError::Network(message))
    }
}

fn parse_page(value: &Value, connection: &str) -> Result<Page, ClientError> {
    let user = value.pointer("/data/userResult").unwrap_or(&Value::Null);
    if user.get("__typename").and_then(Value::as_str) != Some("User") {
        return Err(ClientError::Fatal("account not found".into()));
    }

    let conn = user.get(connection).unwrap_or(&Value::Null);
    let entities = conn
        .get("users")
        .and_then(Value::as_array)
        .map(|users| users.iter().filter_map(parse_entity).collect())
        .unwrap_or_default();

    let next = match conn
        .pointer("/pagingInfo/next/from")
        .and_then(Value::as_str)
        .filter(|from| !from.is_empty())
    {
        Some(from) => PageToken::next(from),
        None => PageToken::exhausted(),
    };

    Ok(Page { entities, next })
}

/// Only `User` nodes can be mutated; publications are skipped.
fn parse_entity(node: &Value) -> Option<RelationshipEntity> {
    if node.get("__typename").and_then(Value::as_str) != Some("User") {
        return None;
    }
    let id = node.get("id").and_then(Value::as_str)?.to_string();
    let text = |key: &str| {
        node.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let tier = if node.get("membership").map_or(false, |m| !m.is_null()) {
        Tier::Privileged
    } else {
        Tier::Ordinary
    };

    Some(RelationshipEntity {
        id,
        username: text("username"),
        display_name: text("name"),
        tier,
        newsletter_id: node
            .pointer("/newsletterV3/id")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn check_mutation(value: &Value, field: &str, kind: MutationKind) -> Result<(), ClientError> {
    let result = value
        .get("data")
        .and_then(|d| d.get(field))
        .unwrap_or(&Value::Null);

    match result {
        Value::Null => Err(ClientError::Network(format!("{} returned no payload", field))),
        Value::Bool(false) => Err(ClientError::Network(format!("{} returned false", field))),
        Value::Bool(true) => Ok(()),
        edge => match edge.pointer("/viewerEdge/isFollowing").and_then(Value::as_bool) {
            Some(following) if following == (kind == MutationKind::Unfollow) => Err(
                ClientError::Network(format!("{} did not change the relationship", field)),
            ),
            _ => Ok(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn following_response(users: Value, next: Value) -> Value {
        json!({
            "data": {
                "userResult": {
                    "__typename": "User",
                    "id": "me",
                    "followingUserConnection": {
                        "pagingInfo": { "next": next },
                        "users": users,
                    }
                }
            }
        })
    }

    #[test]
    fn test_parse_page_skips_non_user_nodes() {
        let value = following_response(
            json!([
                { "__typename": "User", "id": "u1", "name": "Ada", "username": "ada", "membership": null },
                { "__typename": "Collection", "id": "c1", "name": "Pub" },
                {
                    "__typename": "User", "id": "u2", "name": "Bo", "username": "bo",
                    "membership": { "tier": "MEMBER" },
                    "newsletterV3": { "id": "n2" }
                }
            ]),
            json!({ "from": "25", "limit": 25 }),
        );

        let page = parse_page(&value, "followingUserConnection").unwrap();

        assert_eq!(page.entities.len(), 2);
        assert_eq!(page.entities[0].tier, Tier::Ordinary);
        assert_eq!(page.entities[1].tier, Tier::Privileged);
        assert_eq!(page.entities[1].newsletter_id.as_deref(), Some("n2"));
        assert_eq!(page.next, PageToken::next("25"));
    }

    #[test]
    fn test_parse_page_without_next_is_exhausted() {
        let value = following_response(json!([]), Value::Null);
        let page = parse_page(&value, "followingUserConnection").unwrap();

        assert!(page.entities.is_empty());
        assert_eq!(page.next, PageToken::exhausted());
    }

    #[test]
    fn test_parse_page_unknown_account_is_fatal() {
        let value = json!({ "data": { "userResult": { "__typename": "NotFound" } } });
        let err = parse_page(&value, "followingUserConnection").unwrap_err();
        assert!(matches!(err, ClientError::Fatal(_)));
    }

    #[test]
    fn test_unbatch_takes_first_element() {
        let value = unbatch(json!([{ "data": { "unfollowUser": null } }]));
        assert!(value.get("data").is_some());
    }

    #[test]
    fn test_graphql_error_classification() {
        let auth = json!({ "errors": [{ "message": "Not authenticated" }] });
        let already = json!({ "errors": [{ "message": "User is already followed" }] });
        let other = json!({ "errors": [{ "message": "Internal failure" }] });

        assert!(matches!(check_graphql_errors(&auth), Err(ClientError::Fatal(_))));
        assert!(matches!(
            check_graphql_errors(&already),
            Err(ClientError::Rejected(_))
        ));
        assert!(matches!(
            check_graphql_errors(&other),
            Err(ClientError::Network(_))
        ));
        assert!(check_graphql_errors(&json!({ "data": {} })).is_ok());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            check_status(StatusCode::UNAUTHORIZED),
            Err(ClientError::Fatal(_))
        ));
        assert!(matches!(
            check_status(StatusCode::TOO_MANY_REQUESTS),
            Err(ClientError::Network(_))
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY),
            Err(ClientError::Network(_))
        ));
        assert!(check_status(StatusCode::OK).is_ok());
    }

    #[test]
    fn test_check_mutation_outcomes() {
        let done = json!({ "data": { "unfollowUser": { "viewerEdge": { "isFollowing": false } } } });
        let unchanged = json!({ "data": { "unfollowUser": { "viewerEdge": { "isFollowing": true } } } });
        let missing = json!({ "data": { "unfollowUser": null } });
        let subscribed = json!({ "data": { "subscribeNewsletterV3": true } });

        assert!(check_mutation(&done, "unfollowUser", MutationKind::Unfollow).is_ok());
        assert!(check_mutation(&unchanged, "unfollowUser", MutationKind::Unfollow).is_err());
        assert!(matches!(
            check_mutation(&missing, "unfollowUser", MutationKind::Unfollow),
            Err(ClientError::Network(_))
        ));
        assert!(
            check_mutation(&subscribed, "subscribeNewsletterV3", MutationKind::Follow).is_ok()
        );
    }
}
