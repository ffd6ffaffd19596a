//! JSON handlers for the mailbox API
//!
//! Handlers are transport-agnostic: they take already-extracted request
//! parameters and return a status code plus a JSON body, which the hosting
//! HTTP layer serves together with [`CORS_HEADERS`].

use crate::config::Config;
use crate::error::IngestError;
use crate::mailbox::Mailbox;
use crate::store::KvStore;
use crate::types::MailId;
use serde_json::{Value, json};
use tracing::{error, warn};

/// Headers attached to every response, including `OPTIONS` preflights
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS"),
    (
        "Access-Control-Allow-Headers",
        "Content-Type, Authorization, X-Auth-Token",
    ),
    ("Access-Control-Max-Age", "86400"),
];

/// Status code and JSON body of a handled request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    #[must_use]
    pub const fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// `{ "result": false, "error": message }`
    #[must_use]
    pub fn failure(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "result": false, "error": message }),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Authentication material presented by a request
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    /// `epin` query parameter
    pub epin: Option<&'a str>,

    /// `X-Auth-Token` header
    pub auth_token: Option<&'a str>,

    /// `Authorization` header
    pub authorization: Option<&'a str>,
}

impl Credentials<'_> {
    fn token(&self) -> Option<&str> {
        self.auth_token.or_else(|| {
            self.authorization
                .map(|value| value.strip_prefix("Bearer ").unwrap_or(value))
        })
    }
}

/// Result of checking credentials against the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Nothing configured, every request is accepted
    Open,
    Valid,
    Invalid(&'static str),
}

/// Compare presented credentials with the configured secrets
#[must_use]
pub fn validate_auth(config: &Config, credentials: &Credentials<'_>) -> AuthOutcome {
    if !config.auth_enabled() {
        return AuthOutcome::Open;
    }
    if let Some(epin) = &config.epin
        && credentials.epin != Some(epin.as_str())
    {
        return AuthOutcome::Invalid("Invalid epin");
    }
    if let Some(token) = &config.auth_token
        && credentials.token() != Some(token.as_str())
    {
        return AuthOutcome::Invalid("Invalid auth token");
    }
    AuthOutcome::Valid
}

/// Existing clients do not always send credentials, so a failed check is
/// only logged and the request proceeds.
fn check_auth(config: &Config, credentials: &Credentials<'_>) {
    if let AuthOutcome::Invalid(reason) = validate_auth(config, credentials) {
        warn!(reason, "Auth validation failed");
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// `GET /api/mails?email&limit&epin`
pub async fn list_mails<S: KvStore + ?Sized>(
    store: &S,
    config: &Config,
    email: Option<&str>,
    limit: Option<&str>,
    credentials: &Credentials<'_>,
) -> ApiResponse {
    check_auth(config, credentials);

    let Some(email) = present(email) else {
        return ApiResponse::failure(400, "Email parameter required");
    };
    let limit = limit
        .and_then(|l| l.trim().parse::<usize>().ok())
        .unwrap_or(config.default_list_limit);

    match Mailbox::new(store, config).inbox(email).await {
        Ok(mut inbox) => {
            inbox.truncate(limit);
            ApiResponse::ok(json!({
                "result": true,
                "first_id": inbox.first().map(|entry| entry.id.clone()),
                "mails": inbox,
            }))
        }
        Err(e) => {
            error!(error = %e, "Get mails error");
            ApiResponse::failure(500, "Failed to get mails")
        }
    }
}

/// `GET /api/mails/{id}?email&epin`, marks the mail read
pub async fn get_mail<S: KvStore + ?Sized>(
    store: &S,
    config: &Config,
    id: &str,
    email: Option<&str>,
    credentials: &Credentials<'_>,
) -> ApiResponse {
    check_auth(config, credentials);

    let Some(email) = present(email) else {
        return ApiResponse::failure(400, "Email parameter required");
    };

    match Mailbox::new(store, config)
        .open_mail(&MailId::new(id), email)
        .await
    {
        Ok(Some(mail)) => ApiResponse::ok(json!({
            "result": true,
            "id": mail.id,
            "from": mail.from,
            "to": mail.to,
            "subject": mail.subject,
            "text": mail.text,
            "html": mail.html,
            "timestamp": mail.timestamp,
        })),
        Ok(None) => ApiResponse::failure(404, "Mail not found"),
        Err(e) => {
            error!(error = %e, id, "Get mail error");
            ApiResponse::failure(500, "Failed to get mail")
        }
    }
}

/// `DELETE /api/mails` with form fields `email`, `first_id`, `epin`
pub async fn delete_mail<S: KvStore + ?Sized>(
    store: &S,
    config: &Config,
    email: Option<&str>,
    first_id: Option<&str>,
    credentials: &Credentials<'_>,
) -> ApiResponse {
    check_auth(config, credentials);

    let (Some(email), Some(first_id)) = (present(email), present(first_id)) else {
        return ApiResponse::failure(400, "Email and first_id required");
    };

    match Mailbox::new(store, config)
        .delete_mail(email, &MailId::new(first_id))
        .await
    {
        Ok(()) => ApiResponse::ok(json!({ "result": true })),
        Err(e) => {
            error!(error = %e, first_id, "Delete mail error");
            ApiResponse::failure(500, "Delete failed")
        }
    }
}

/// `GET /api/test-code?email`: latest code entry and latest mail
pub async fn test_code<S: KvStore + ?Sized>(
    store: &S,
    config: &Config,
    email: Option<&str>,
) -> ApiResponse {
    let Some(email) = present(email) else {
        return ApiResponse {
            status: 400,
            body: json!({ "error": "Email parameter required" }),
        };
    };

    let mailbox = Mailbox::new(store, config);
    let lookup = async {
        let latest_code = mailbox.latest_code(email).await?;
        let inbox = mailbox.inbox(email).await?;
        let latest_mail = match inbox.first() {
            Some(entry) => mailbox.mail(&entry.id).await?,
            None => None,
        };
        Ok::<_, IngestError>((latest_code, inbox.len(), latest_mail))
    };

    match lookup.await {
        Ok((latest_code, mail_count, latest_mail)) => ApiResponse::ok(json!({
            "email": email,
            "latestCode": latest_code,
            "mailCount": mail_count,
            "latestMail": latest_mail.map(|mail| json!({
                "id": mail.id,
                "subject": mail.subject,
                "text": mail.text,
                "verificationCode": mail.verification_code,
                "timestamp": mail.timestamp,
            })),
        })),
        Err(e) => {
            error!(error = %e, "Test code API error");
            ApiResponse {
                status: 500,
                body: json!({ "error": "Internal server error" }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(epin: Option<&str>, token: Option<&str>) -> Config {
        Config {
            epin: epin.map(String::from),
            auth_token: token.map(String::from),
            ..Config::default()
        }
    }

    #[test]
    fn test_auth_open_when_unconfigured() {
        let outcome = validate_auth(&config(None, None), &Credentials::default());
        assert_eq!(outcome, AuthOutcome::Open);
    }

    #[test]
    fn test_auth_epin() {
        let cfg = config(Some("secret"), None);
        let good = Credentials {
            epin: Some("secret"),
            ..Credentials::default()
        };
        let bad = Credentials {
            epin: Some("nope"),
            ..Credentials::default()
        };
        assert_eq!(validate_auth(&cfg, &good), AuthOutcome::Valid);
        assert_eq!(validate_auth(&cfg, &bad), AuthOutcome::Invalid("Invalid epin"));
    }

    #[test]
    fn test_auth_token_sources() {
        let cfg = config(None, Some("tok"));
        let header = Credentials {
            auth_token: Some("tok"),
            ..Credentials::default()
        };
        let bearer = Credentials {
            authorization: Some("Bearer tok"),
            ..Credentials::default()
        };
        let missing = Credentials::default();
        assert_eq!(validate_auth(&cfg, &header), AuthOutcome::Valid);
        assert_eq!(validate_auth(&cfg, &bearer), AuthOutcome::Valid);
        assert_eq!(
            validate_auth(&cfg, &missing),
            AuthOutcome::Invalid("Invalid auth token")
        );
    }

    #[test]
    fn test_failure_body() {
        let response = ApiResponse::failure(404, "Mail not found");
        assert!(!response.is_success());
        assert_eq!(response.body["result"], false);
        assert_eq!(response.body["error"], "Mail not found");
    }
}
