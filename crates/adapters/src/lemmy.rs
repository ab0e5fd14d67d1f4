//! Lemmy forum client adapter
//!
//! One authenticated session against the bot's home instance, speaking the
//! Lemmy HTTP API: community resolution, post creation, feature toggling,
//! and a poll-based realization of the subscription surface.

use async_trait::async_trait;
use feed_herald_domain::{
    AllowListEntry, ForumClient, ForumError, ForumId, ObservedPost, PostDraft, PostId, PostStream,
};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Mutex;

const PAGE_LIMIT: u32 = 50;

/// Connection settings for the home instance
pub struct LemmyConfig {
    /// Home instance host, e.g. "programming.dev"
    pub instance: String,
    /// Bot account name
    pub username: String,
    pub password: SecretString,
    /// Per-instance forums whose posts the subscription surfaces
    pub allow_list: Vec<AllowListEntry>,
}

/// Lemmy HTTP API client
pub struct LemmyClient {
    client: Client,
    base_url: String,
    config: LemmyConfig,
    /// "slug@instance" keys derived from the allow list
    allowed: HashSet<String>,
    /// JWT of the current session; None until the first login or after a 401
    session: Mutex<Option<SecretString>>,
    /// High-water mark over observed post ids; None until the first poll
    seen_up_to: Mutex<Option<i64>>,
}

impl LemmyClient {
    pub fn new(config: LemmyConfig) -> Self {
        let base_url = format!("https://{}", config.instance);
        Self::with_base_url(config, base_url)
    }

    pub fn with_base_url(config: LemmyConfig, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        let allowed = config
            .allow_list
            .iter()
            .flat_map(|entry| {
                entry
                    .forums
                    .iter()
                    .map(|slug| format!("{}@{}", slug, entry.instance))
            })
            .collect();

        Self {
            client,
            base_url,
            config,
            allowed,
            session: Mutex::new(None),
            seen_up_to: Mutex::new(None),
        }
    }

    /// Session token, logging in first when there is none.
    async fn jwt(&self) -> Result<SecretString, ForumError> {
        let mut session = self.session.lock().await;
        if let Some(jwt) = session.as_ref() {
            return Ok(jwt.clone());
        }

        let response = self
            .client
            .post(format!("{}/api/v3/user/login", self.base_url))
            .json(&LoginRequest {
                username_or_email: &self.config.username,
                password: self.config.password.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| ForumError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            return Err(ForumError::Auth(format!("login rejected: {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ForumError::Api(format!("login failed: {status}: {body}")));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ForumError::Api(e.to_string()))?;
        let jwt = login
            .jwt
            .ok_or_else(|| ForumError::Auth("login returned no token".to_string()))?;

        let jwt = SecretString::from(jwt);
        *session = Some(jwt.clone());
        tracing::info!(instance = %self.config.instance, user = %self.config.username, "Logged in");
        Ok(jwt)
    }

    /// Map an unsuccessful response to an error; a 401 also drops the
    /// session so the next call logs in again.
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, ForumError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            *self.session.lock().await = None;
            return Err(ForumError::Auth("session rejected".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ForumError::Api(format!("{status}: {body}")));
        }
        Ok(response)
    }

    /// "slug@host" identity of a community, using the home instance when the
    /// actor id is absent or unparseable.
    fn community_key(&self, community: &Community) -> String {
        let host = community
            .actor_id
            .as_deref()
            .and_then(host_of)
            .unwrap_or(self.config.instance.as_str());
        format!("{}@{}", community.name, host)
    }
}

fn host_of(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split('/').next()?;
    (!host.is_empty()).then_some(host)
}

#[async_trait]
impl ForumClient for LemmyClient {
    async fn resolve_forum(&self, slug: &str, instance: &str) -> Result<ForumId, ForumError> {
        let jwt = self.jwt().await?;
        let name = if instance == self.config.instance {
            slug.to_string()
        } else {
            format!("{slug}@{instance}")
        };

        let response = self
            .client
            .get(format!("{}/api/v3/community", self.base_url))
            .query(&[("name", name.as_str())])
            .bearer_auth(jwt.expose_secret())
            .send()
            .await
            .map_err(|e| ForumError::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ForumError::UnknownForum(name));
        }
        let response = self.check(response).await?;

        let community: CommunityResponse = response
            .json()
            .await
            .map_err(|e| ForumError::Api(e.to_string()))?;
        Ok(ForumId(community.community_view.community.id))
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<(), ForumError> {
        let jwt = self.jwt().await?;

        let response = self
            .client
            .post(format!("{}/api/v3/post", self.base_url))
            .bearer_auth(jwt.expose_secret())
            .json(&CreatePostRequest {
                name: &draft.title,
                community_id: draft.forum_id.0,
                url: draft.url.as_deref(),
                body: draft.body.as_deref(),
            })
            .send()
            .await
            .map_err(|e| ForumError::Network(e.to_string()))?;

        self.check(response).await?;
        Ok(())
    }

    async fn set_featured(&self, post_id: PostId, featured: bool) -> Result<(), ForumError> {
        let jwt = self.jwt().await?;

        let response = self
            .client
            .post(format!("{}/api/v3/post/feature", self.base_url))
            .bearer_auth(jwt.expose_secret())
            .json(&FeaturePostRequest {
                post_id: post_id.0,
                featured,
                feature_type: "Community",
            })
            .send()
            .await
            .map_err(|e| ForumError::Network(e.to_string()))?;

        self.check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl PostStream for LemmyClient {
    /// Posts that appeared in allow-listed forums since the previous call.
    ///
    /// The first call only primes the high-water mark so posts predating
    /// this process are not replayed.
    async fn poll_new_posts(&self) -> Result<Vec<ObservedPost>, ForumError> {
        let jwt = self.jwt().await?;

        let limit = PAGE_LIMIT.to_string();
        let response = self
            .client
            .get(format!("{}/api/v3/post/list", self.base_url))
            .query(&[
                ("type_", "Subscribed"),
                ("sort", "New"),
                ("limit", limit.as_str()),
            ])
            .bearer_auth(jwt.expose_secret())
            .send()
            .await
            .map_err(|e| ForumError::Network(e.to_string()))?;
        let response = self.check(response).await?;

        let listing: PostListResponse = response
            .json()
            .await
            .map_err(|e| ForumError::Api(e.to_string()))?;

        let newest = listing.posts.iter().map(|pv| pv.post.id).max();

        let mut seen_up_to = self.seen_up_to.lock().await;
        let Some(mark) = *seen_up_to else {
            *seen_up_to = newest.or(Some(0));
            return Ok(Vec::new());
        };

        let mut observed: Vec<ObservedPost> = listing
            .posts
            .into_iter()
            .filter(|pv| pv.post.id > mark)
            .filter(|pv| self.allowed.contains(&self.community_key(&pv.community)))
            .map(|pv| ObservedPost {
                post_id: PostId(pv.post.id),
                url: pv.post.url,
                title: pv.post.name,
                creator_name: pv.creator.name,
            })
            .collect();
        // Oldest first, so handlers see posts in publication order.
        observed.sort_by_key(|p| p.post_id.0);

        if let Some(newest) = newest {
            *seen_up_to = Some(mark.max(newest));
        }
        Ok(observed)
    }
}

// Wire types for the Lemmy HTTP API

#[derive(Serialize)]
struct LoginRequest<'a> {
    username_or_email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    jwt: Option<String>,
}

#[derive(Deserialize)]
struct CommunityResponse {
    community_view: CommunityView,
}

#[derive(Deserialize)]
struct CommunityView {
    community: Community,
}

#[derive(Deserialize)]
struct Community {
    id: i64,
    name: String,
    actor_id: Option<String>,
}

#[derive(Serialize)]
struct CreatePostRequest<'a> {
    name: &'a str,
    community_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

#[derive(Serialize)]
struct FeaturePostRequest {
    post_id: i64,
    featured: bool,
    feature_type: &'static str,
}

#[derive(Deserialize)]
struct PostListResponse {
    posts: Vec<PostView>,
}

#[derive(Deserialize)]
struct PostView {
    post: Post,
    creator: Person,
    community: Community,
}

#[derive(Deserialize)]
struct Post {
    id: i64,
    name: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct Person {
    name: String,
}
