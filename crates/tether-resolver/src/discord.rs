use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use tether_types::{ChannelRef, ResolvedChannel};

use crate::{ChannelResolver, ResolveError};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolves channels against the Discord REST API with a bot token.
///
/// Guild channels take two calls (channel, then guild for the owner). A DM
/// channel is addressed by its recipient's account id, so resolving it only
/// checks that the account still exists.
pub struct DiscordResolver {
    client: Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    guild_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GuildPayload {
    owner_id: String,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

impl DiscordResolver {
    pub fn new(token: &str) -> Result<Self, ResolveError> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    pub fn with_api_base(token: &str, api_base: &str) -> Result<Self, ResolveError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bot {}", token))
            .map_err(|_| ResolveError::Unauthorized("token contains invalid header characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("DiscordBot (tether, ", env!("CARGO_PKG_VERSION"), ")")),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ResolveError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// GET `path`, treating 403/404 as "gone".
    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ResolveError> {
        let url = format!("{}/{}", self.api_base, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ResolveError::Network(e.to_string()))?;

        handle_response(response).await
    }

    async fn resolve_guild_channel(&self, channel_id: &str) -> Result<Option<ResolvedChannel>, ResolveError> {
        let Some(channel) = self.fetch::<ChannelPayload>(&format!("channels/{}", channel_id)).await? else {
            return Ok(None);
        };

        // Group DMs and other guildless channels cannot be attached to a guild
        let Some(guild_id) = channel.guild_id else {
            debug!("Channel {} has no guild", channel_id);
            return Ok(None);
        };

        let Some(guild) = self.fetch::<GuildPayload>(&format!("guilds/{}", guild_id)).await? else {
            return Ok(None);
        };

        Ok(Some(ResolvedChannel {
            guild_id,
            owner_id: guild.owner_id,
        }))
    }

    async fn resolve_direct(&self, user_id: &str) -> Result<Option<ResolvedChannel>, ResolveError> {
        let user = self.fetch::<UserPayload>(&format!("users/{}", user_id)).await?;
        Ok(user.map(|u| ResolvedChannel::direct(&u.id)))
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<Option<T>, ResolveError> {
    let status = response.status();

    if status.is_success() {
        return response
            .json()
            .await
            .map(Some)
            .map_err(|e| ResolveError::Decode(e.to_string()));
    }

    let message = match response.json::<ErrorPayload>().await {
        Ok(err) => err.message,
        Err(_) => "Unknown error".to_string(),
    };

    match status {
        // 403 is what we get once the bot has been removed from the guild
        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
            debug!("Resolver got {}: {}", status, message);
            Ok(None)
        }
        StatusCode::UNAUTHORIZED => Err(ResolveError::Unauthorized(message)),
        StatusCode::TOO_MANY_REQUESTS => Err(ResolveError::RateLimited),
        _ => Err(ResolveError::Api {
            status: status.as_u16(),
            message,
        }),
    }
}

#[async_trait]
impl ChannelResolver for DiscordResolver {
    async fn resolve(&self, channel: &ChannelRef) -> Result<Option<ResolvedChannel>, ResolveError> {
        if channel.is_dm {
            self.resolve_direct(&channel.id).await
        } else {
            self.resolve_guild_channel(&channel.id).await
        }
    }
}

impl fmt::Debug for DiscordResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordResolver")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn resolver(server: &MockServer) -> DiscordResolver {
        DiscordResolver::with_api_base("secret", &server.uri()).unwrap()
    }

    #[tokio::test]
    async fn resolves_guild_channel_and_owner() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/100"))
            .and(header("authorization", "Bot secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "100", "type": 0, "guild_id": "7"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/guilds/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "7", "owner_id": "55"})))
            .mount(&server)
            .await;

        let resolved = resolver(&server).await.resolve(&ChannelRef::guild("100")).await.unwrap();
        assert_eq!(
            resolved,
            Some(ResolvedChannel {
                guild_id: "7".into(),
                owner_id: "55".into()
            })
        );
    }

    #[tokio::test]
    async fn missing_or_forbidden_channels_are_gone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/404"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Unknown Channel", "code": 10003})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/channels/403"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Missing Access", "code": 50001})))
            .mount(&server)
            .await;

        let r = resolver(&server).await;
        assert_eq!(r.resolve(&ChannelRef::guild("404")).await.unwrap(), None);
        assert_eq!(r.resolve(&ChannelRef::guild("403")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn guildless_channel_is_gone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "9", "type": 3})))
            .mount(&server)
            .await;

        let r = resolver(&server).await;
        assert_eq!(r.resolve(&ChannelRef::guild("9")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn dm_resolves_through_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/31"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "31", "username": "bob"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/32"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Unknown User"})))
            .mount(&server)
            .await;

        let r = resolver(&server).await;
        assert_eq!(r.resolve(&ChannelRef::dm("31")).await.unwrap(), Some(ResolvedChannel::direct("31")));
        assert_eq!(r.resolve(&ChannelRef::dm("32")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn transport_level_failures_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/1"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/channels/2"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "401: Unauthorized"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/channels/3"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/channels/4"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let r = resolver(&server).await;
        assert!(matches!(r.resolve(&ChannelRef::guild("1")).await, Err(ResolveError::RateLimited)));
        assert!(matches!(r.resolve(&ChannelRef::guild("2")).await, Err(ResolveError::Unauthorized(_))));
        assert!(matches!(
            r.resolve(&ChannelRef::guild("3")).await,
            Err(ResolveError::Api { status: 502, .. })
        ));
        assert!(matches!(r.resolve(&ChannelRef::guild("4")).await, Err(ResolveError::Decode(_))));
    }

    #[test]
    fn debug_output_hides_token() {
        let r = DiscordResolver::new("very-secret").unwrap();
        let out = format!("{:?}", r);
        assert!(!out.contains("very-secret"));
        assert!(out.contains(DEFAULT_API_BASE));
    }
}
