use serde_json::{json, Value};

const USER_FOLLOW_ROW: &str = "fragment UserFollowRow_user on User {
  __typename
  id
  name
  username
  membership {
    tier
    __typename
    id
  }
  newsletterV3 {
    id
    __typename
  }
}";

pub fn following_list(username: &str, from: &str, limit: usize) -> Value {
    let query = format!(
        "query UserFollowingUsersList($username: ID, $id: ID, $paging: PagingOptions) {{
  userResult(username: $username, id: $id) {{
    __typename
    ... on User {{
      id
      followingUserConnection(paging: $paging) {{
        pagingInfo {{ next {{ from limit __typename }} __typename }}
        users {{ ...UserFollowRow_user __typename }}
        __typename
      }}
      __typename
    }}
  }}
}}

{fragment}",
        fragment = USER_FOLLOW_ROW
    );

    json!({
        "operationName": "UserFollowingUsersList",
        "variables": {
            "username": username,
            "paging": { "from": from, "limit": limit },
        },
        "query": query,
    })
}

pub fn followers_list(username: &str, from: &str, limit: usize) -> Value {
    let query = format!(
        "query UserFollowers($username: ID, $id: ID, $paging: PagingOptions) {{
  userResult(username: $username, id: $id) {{
    __typename
    ... on User {{
      id
      followersUserConnection(paging: $paging) {{
        pagingInfo {{ next {{ from limit __typename }} __typename }}
        users {{ ...UserFollowRow_user __typename }}
        __typename
      }}
      __typename
    }}
  }}
}}

{fragment}",
        fragment = USER_FOLLOW_ROW
    );

    json!({
        "operationName": "UserFollowers",
        "variables": {
            "username": username,
            "paging": { "from": from, "limit": limit },
        },
        "query": query,
    })
}

pub fn unfollow_user(target_user_id: &str) -> Value {
    json!([{
        "operationName": "UnfollowUserMutation",
        "variables": { "targetUserId": target_user_id },
        "query": "mutation UnfollowUserMutation($targetUserId: ID!) {
  unfollowUser(targetUserId: $targetUserId) {
    __typename
    id
    viewerEdge { __typename isFollowing }
  }
}",
    }])
}

pub fn follow_user(target_user_id: &str) -> Value {
    json!([{
        "operationName": "FollowUserMutation",
        "variables": { "targetUserId": target_user_id },
        "query": "mutation FollowUserMutation($targetUserId: ID!) {
  followUser(targetUserId: $targetUserId) {
    __typename
    id
    viewerEdge { __typename isFollowing }
  }
}",
    }])
}

pub fn subscribe_newsletter(newsletter_id: &str) -> Value {
    json!({
        "operationName": "SubscribeNewsletterV3Mutation",
        "variables": { "newsletterV3Id": newsletter_id, "shouldRecordConsent": false },
        "query": "mutation SubscribeNewsletterV3Mutation($newsletterV3Id: ID!, $shouldRecordConsent: Boolean) {
  subscribeNewsletterV3(newsletterV3Id: $newsletterV3Id, shouldRecordConsent: $shouldRecordConsent)
}",
    })
}
