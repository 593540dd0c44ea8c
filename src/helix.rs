use std::time::Duration;

use ::serde::{Deserialize, Serialize};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    StatusCode,
};

use crate::lookup::{FailureKind, LookupResult, LookupUser, UserLookup};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
    pub display_name: String,
}

impl From<User> for LookupUser {
    fn from(user: User) -> Self {
        Self {
            display_name: user.display_name,
            id: user.id,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
struct OAuth {
    access_token: String,

    #[serde(default)]
    client_id: String,

    #[serde(default)]
    bearer_token: String,
}

impl OAuth {
    async fn create(client_id: &str, client_secret: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(!client_id.is_empty(), "twitch client id was empty");
        anyhow::ensure!(!client_secret.is_empty(), "twitch client secret was empty");

        #[derive(Serialize)]
        struct Query<'a> {
            client_id: &'a str,
            client_secret: &'a str,
            grant_type: &'a str,
        }

        let query = Query {
            client_id,
            client_secret,
            grant_type: "client_credentials",
        };

        let mut resp: Self = reqwest::Client::new()
            .post("https://id.twitch.tv/oauth2/token")
            .header("user-agent", USER_AGENT)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        resp.client_id = client_id.to_string();
        resp.bearer_token = format!("Bearer {}", resp.access_token);

        Ok(resp)
    }
}

#[derive(Deserialize)]
struct Resp<T> {
    data: Vec<T>,
}

#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
    base: String,
}

impl Client {
    const BASE: &'static str = "https://api.twitch.tv/helix";
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub async fn create(client_id: &str, client_secret: &str) -> anyhow::Result<Self> {
        let oauth = OAuth::create(client_id, client_secret).await?;
        let client = reqwest::ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(Self::TIMEOUT)
            .default_headers(
                [
                    ("client-id", &*oauth.client_id),
                    ("authorization", &oauth.bearer_token),
                ]
                .into_iter()
                .map(|(k, v)| Ok((HeaderName::from_static(k), HeaderValue::from_str(v)?)))
                .collect::<anyhow::Result<HeaderMap>>()?,
            )
            .build()?;

        Ok(Self {
            client,
            base: Self::BASE.to_string(),
        })
    }

    pub async fn get_users_by_login(
        &self,
        login: &str,
    ) -> Result<(StatusCode, Vec<User>), reqwest::Error> {
        self.get_response("users", [("login", login)]).await
    }

    async fn get_response<T>(
        &self,
        ep: &str,
        query: impl Serialize + Send,
    ) -> Result<(StatusCode, Vec<T>), reqwest::Error>
    where
        T: for<'de> Deserialize<'de> + Send,
    {
        let resp = self
            .client
            .get(&format!("{}/{ep}", self.base))
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Ok((status, vec![]));
        }

        let resp: Resp<T> = resp.json().await?;
        Ok((status, resp.data))
    }
}

#[async_trait::async_trait]
impl UserLookup for Client {
    async fn lookup(&self, login: &str) -> LookupResult {
        match self.get_users_by_login(login).await {
            Ok((status, users)) => LookupResult::Response {
                status: status.as_u16(),
                users: users.into_iter().map(Into::into).collect(),
            },
            Err(err) => LookupResult::Failed(classify(&err)),
        }
    }
}

fn classify(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() {
        FailureKind::Io
    } else {
        FailureKind::Other(err.to_string())
    }
}

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
