use serde::{Deserialize, Serialize};

/// Membership tier of an account. Privileged accounts may need a different
/// mutation payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Ordinary,
    Privileged,
}

/// One account node from a relationship list page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEntity {
    pub id: String,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub newsletter_id: Option<String>,
}

impl RelationshipEntity {
    /// Label used in status lines: `@username`, or the display name when the
    /// handle is missing.
    pub fn label(&self) -> String {
        if self.username.is_empty() {
            self.display_name.clone()
        } else {
            format!("@{}", self.username)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Follow,
    Unfollow,
}

impl MutationKind {
    /// Present participle for progress lines ("Unfollowing @x…").
    pub fn progressive(&self) -> &'static str {
        match self {
            MutationKind::Follow => "Following",
            MutationKind::Unfollow => "Unfollowing",
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            MutationKind::Follow => "follow",
            MutationKind::Unfollow => "unfollow",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.verb())
    }
}

/// Pagination handle returned with every page. `cursor == None` with
/// `has_more == false` means the list is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageToken {
    pub cursor: Option<String>,
    pub has_more: bool,
}

impl PageToken {
    pub fn exhausted() -> Self {
        Self::default()
    }

    pub fn next(cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            has_more: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub entities: Vec<RelationshipEntity>,
    pub next: PageToken,
}
