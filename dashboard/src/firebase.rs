use anyhow::Context;
use chrono::Utc;
use climate_common::{
    store::{collection_entries, last_entries, path_segments},
    CredentialError, OrderedEntries, ServiceAccount, Store, StoreError,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

const TOKEN_SCOPES: &str = "https://www.googleapis.com/auth/firebase.database \
                            https://www.googleapis.com/auth/userinfo.email";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3_600;
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Realtime Database reached over its REST interface.
pub struct FirebaseStore {
    base_url: String,
    client: Client,
    tokens: TokenSource,
}

struct TokenSource {
    account: ServiceAccount,
    key: EncodingKey,
    cached: Mutex<Option<AccessToken>>,
}

struct AccessToken {
    value: String,
    expires_at: i64,
}

#[derive(Debug, Serialize)]
struct GrantClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl FirebaseStore {
    /// Fails only on configuration problems; no request is made here.
    pub fn connect(database_url: &str, account: ServiceAccount) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("climate-dashboard")
            .build()
            .context("build reqwest client")?;
        Self::with_client(database_url, account, client)
    }

    pub fn with_client(
        database_url: &str,
        account: ServiceAccount,
        client: Client,
    ) -> anyhow::Result<Self> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|_| CredentialError::InvalidPrivateKey)?;

        Ok(Self {
            base_url: database_url.trim_end_matches('/').to_string(),
            client,
            tokens: TokenSource {
                account,
                key,
                cached: Mutex::new(None),
            },
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn account(&self) -> &ServiceAccount {
        &self.tokens.account
    }

    fn url_for(&self, path: &str) -> Result<String, StoreError> {
        rest_url(&self.base_url, path)
    }
}

fn rest_url(base_url: &str, path: &str) -> Result<String, StoreError> {
    let segments = path_segments(path)?;
    Ok(format!("{base_url}/{}.json", segments.join("/")))
}

impl TokenSource {
    async fn access_token(&self, client: &Client) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached
            .as_ref()
            .filter(|token| token.expires_at - TOKEN_REFRESH_MARGIN_SECS > now)
        {
            return Ok(token.value.clone());
        }

        let claims = GrantClaims {
            iss: &self.account.client_email,
            scope: TOKEN_SCOPES,
            aud: &self.account.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|err| StoreError::Auth(format!("sign token grant: {err}")))?;

        let response = client
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("token endpoint answered {status}: {body}")));
        }

        let grant: TokenResponse = response
            .json()
            .await
            .map_err(|err| StoreError::Auth(format!("unreadable token response: {err}")))?;

        debug!("obtained access token for {}", self.account.client_email);
        let expires_at = now + grant.expires_in.unwrap_or(TOKEN_LIFETIME_SECS);
        let value = grant.access_token;
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at,
        });
        Ok(value)
    }
}

impl Store for FirebaseStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let url = self.url_for(path)?;
        let token = self.tokens.access_token(&self.client).await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;

        let value = decode(response).await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn read_ordered(&self, path: &str, limit: usize) -> Result<OrderedEntries, StoreError> {
        let url = self.url_for(path)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let token = self.tokens.access_token(&self.client).await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[("orderBy", "\"$key\"".to_string()), ("limitToLast", limit.to_string())])
            .send()
            .await
            .map_err(transport)?;

        // The server selects by plain lexicographic key order, so for
        // variable-length keys (`k9` vs `k10`) its set can differ from
        // `MemoryStore`'s. The selected set is re-sorted locally.
        let value = decode(response).await?;
        Ok(last_entries(collection_entries(value), limit))
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let url = self.url_for(path)?;
        let token = self.tokens.access_token(&self.client).await?;

        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(&value)
            .send()
            .await
            .map_err(transport)?;

        decode(response).await.map(|_| ())
    }
}

async fn decode(response: Response) -> Result<Value, StoreError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Auth(body));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|err| StoreError::Decode(err.to_string()))
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}
