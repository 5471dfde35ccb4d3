use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Secret holding the whole service-account JSON document.
pub const SECRET_BLOB: &str = "FIREBASE_CREDENTIALS";

/// Service-account JSON key and the secret that carries it on its own.
pub const SECRET_FIELDS: [(&str, &str); 9] = [
    ("type", "FIREBASE_TYPE"),
    ("project_id", "FIREBASE_PROJECT_ID"),
    ("private_key", "FIREBASE_PRIVATE_KEY"),
    ("client_email", "FIREBASE_CLIENT_EMAIL"),
    ("token_uri", "FIREBASE_TOKEN_URI"),
    ("auth_uri", "FIREBASE_AUTH_URI"),
    (
        "auth_provider_x509_cert_url",
        "FIREBASE_AUTH_PROVIDER_X509_CERT_URL",
    ),
    ("client_x509_cert_url", "FIREBASE_CLIENT_X509_CERT_URL"),
    ("client_id", "FIREBASE_CLIENT_ID"),
];

const SERVICE_ACCOUNT_TYPE: &str = "service_account";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("missing required credential secrets: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("credential secret is not a valid JSON object: {0}")]
    Malformed(String),
    #[error("unsupported credential type '{0}', expected 'service_account'")]
    WrongType(String),
    #[error("service account private key is not a PEM private key")]
    InvalidPrivateKey,
}

/// Service-account credential, identical whichever secret layout supplied it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    #[serde(rename = "type")]
    pub account_type: String,
    pub project_id: String,
    pub private_key: String,
    pub client_email: String,
    pub token_uri: String,
    pub auth_uri: String,
    pub auth_provider_x509_cert_url: String,
    pub client_x509_cert_url: String,
    pub client_id: String,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("account_type", &self.account_type)
            .field("project_id", &self.project_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Prefers the single JSON blob; falls back to the nine discrete secrets.
    pub fn from_secrets<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(SECRET_BLOB).filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Self::from_blob(&raw),
            None => Self::from_fields(lookup),
        }
    }

    pub fn from_blob(raw: &str) -> Result<Self, CredentialError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|err| CredentialError::Malformed(err.to_string()))?;
        let Some(object) = value.as_object() else {
            return Err(CredentialError::Malformed("expected a JSON object".to_string()));
        };

        Self::assemble(|key, _| match object.get(key) {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        })
    }

    pub fn from_fields<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::assemble(|_, secret| lookup(secret))
    }

    fn assemble<F>(field: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str, &str) -> Option<String>,
    {
        let mut values = Vec::with_capacity(SECRET_FIELDS.len());
        let mut missing = Vec::new();

        for (key, secret) in SECRET_FIELDS {
            match field(key, secret).filter(|value| !value.trim().is_empty()) {
                Some(value) => values.push(value),
                None => missing.push(secret.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(CredentialError::Missing(missing));
        }

        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();
        let account = Self {
            account_type: next(),
            project_id: next(),
            private_key: next(),
            client_email: next(),
            token_uri: next(),
            auth_uri: next(),
            auth_provider_x509_cert_url: next(),
            client_x509_cert_url: next(),
            client_id: next(),
        };

        account.normalized()
    }

    fn normalized(mut self) -> Result<Self, CredentialError> {
        if self.account_type != SERVICE_ACCOUNT_TYPE {
            return Err(CredentialError::WrongType(self.account_type));
        }

        // Secret stores frequently keep the PEM on one line with literal "\n".
        self.private_key = self.private_key.replace("\\n", "\n");
        let key = self.private_key.trim();
        if !key.starts_with("-----BEGIN") || !key.contains("PRIVATE KEY-----") {
            return Err(CredentialError::InvalidPrivateKey);
        }

        Ok(self)
    }
}
