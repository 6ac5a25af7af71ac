//! GitHub OAuth web flow

use reqwest::{header, Client, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::config::GithubConfig;
use crate::models::{UserError, UserResult};

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const API_URL: &str = "https://api.github.com";
const SCOPES: &str = "read:user user:email";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubEmail {
    pub email: String,
    pub primary: bool,
    pub verified: bool,
}

/// The parts of a GitHub account we keep
#[derive(Debug, Clone, PartialEq)]
pub struct GithubIdentity {
    pub github_id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

/// Primary verified address, else any verified one.
pub fn select_primary_email(emails: &[GithubEmail]) -> Option<String> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .map(|e| e.email.clone())
}

pub struct GithubClient {
    http: Client,
    config: GithubConfig,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> UserResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("root-things-user-service/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { http, config })
    }

    pub fn authorize_url(&self, state: &str) -> UserResult<String> {
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("scope", SCOPES),
            ("state", state),
        ];
        if let Some(redirect) = &self.config.redirect_url {
            params.push(("redirect_uri", redirect.as_str()));
        }

        let url = Url::parse_with_params(AUTHORIZE_URL, &params)
            .map_err(|e| UserError::Github(format!("Invalid authorize URL: {}", e)))?;
        Ok(url.to_string())
    }

    /// Trade the callback `code` for an access token
    pub async fn exchange_code(&self, code: &str) -> UserResult<String> {
        let mut form = vec![
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
        ];
        if let Some(redirect) = &self.config.redirect_url {
            form.push(("redirect_uri", redirect.as_str()));
        }

        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .header(header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response {
            TokenResponse {
                access_token: Some(token),
                ..
            } => Ok(token),
            TokenResponse {
                error,
                error_description,
                ..
            } => Err(UserError::Github(
                error_description
                    .or(error)
                    .unwrap_or_else(|| "No access token returned".to_string()),
            )),
        }
    }

    async fn api_get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        access_token: &str,
    ) -> UserResult<T> {
        let value = self
            .http
            .get(format!("{}{}", API_URL, path))
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }

    pub async fn fetch_user(&self, access_token: &str) -> UserResult<GithubUser> {
        self.api_get("/user", access_token).await
    }

    pub async fn fetch_emails(&self, access_token: &str) -> UserResult<Vec<GithubEmail>> {
        self.api_get("/user/emails", access_token).await
    }

    /// Run the whole callback exchange and resolve a usable identity.
    pub async fn fetch_identity(&self, code: &str) -> UserResult<GithubIdentity> {
        let token = self.exchange_code(code).await?;
        let user = self.fetch_user(&token).await?;

        let email = match user.email.clone().filter(|e| !e.is_empty()) {
            Some(email) => email,
            None => select_primary_email(&self.fetch_emails(&token).await?).ok_or_else(|| {
                UserError::Github("GitHub account has no verified email".to_string())
            })?,
        };

        Ok(identity_from(user, email))
    }
}

fn identity_from(user: GithubUser, email: String) -> GithubIdentity {
    GithubIdentity {
        github_id: user.id.to_string(),
        name: user
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(user.login),
        email,
        avatar_url: user.avatar_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client(redirect_url: Option<&str>) -> GithubClient {
        GithubClient::new(GithubConfig {
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            redirect_url: redirect_url.map(str::to_string),
        })
        .unwrap()
    }

    fn email(address: &str, primary: bool, verified: bool) -> GithubEmail {
        GithubEmail {
            email: address.to_string(),
            primary,
            verified,
        }
    }

    #[test]
    fn test_authorize_url() {
        let url = client(None).authorize_url("state-abc").unwrap();
        let parsed = Url::parse(&url).unwrap();

        assert_eq!(parsed.host_str(), Some("github.com"));
        assert_eq!(parsed.path(), "/login/oauth/authorize");

        let params: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(
            params,
            vec![
                ("client_id".to_string(), "client-123".to_string()),
                ("scope".to_string(), "read:user user:email".to_string()),
                ("state".to_string(), "state-abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_authorize_url_with_redirect() {
        let url = client(Some("https://rootthings.dev/api/auth/github/callback"))
            .authorize_url("s")
            .unwrap();
        let parsed = Url::parse(&url).unwrap();

        let redirect = parsed
            .query_pairs()
            .find(|(k, _)| k == "redirect_uri")
            .map(|(_, v)| v.into_owned());
        assert_eq!(
            redirect.as_deref(),
            Some("https://rootthings.dev/api/auth/github/callback")
        );
    }

    #[test]
    fn test_select_primary_email() {
        let emails = vec![
            email("old@example.com", false, true),
            email("main@example.com", true, true),
        ];
        assert_eq!(
            select_primary_email(&emails).as_deref(),
            Some("main@example.com")
        );
    }

    #[test]
    fn test_unverified_primary_is_skipped() {
        let emails = vec![
            email("main@example.com", true, false),
            email("backup@example.com", false, true),
        ];
        assert_eq!(
            select_primary_email(&emails).as_deref(),
            Some("backup@example.com")
        );

        assert_eq!(select_primary_email(&[email("x@example.com", true, false)]), None);
        assert_eq!(select_primary_email(&[]), None);
    }

    #[test]
    fn test_identity_falls_back_to_login() {
        let user = GithubUser {
            id: 42,
            login: "octocat".to_string(),
            name: Some("  ".to_string()),
            email: None,
            avatar_url: Some("https://avatars.githubusercontent.com/u/42".to_string()),
        };

        let identity = identity_from(user, "octo@example.com".to_string());
        assert_eq!(identity.github_id, "42");
        assert_eq!(identity.name, "octocat");
        assert_eq!(identity.email, "octo@example.com");
    }

    #[test]
    fn test_token_error_response() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"error":"bad_verification_code","error_description":"The code passed is incorrect or expired."}"#,
        )
        .unwrap();
        assert!(response.access_token.is_none());
        assert_eq!(response.error.as_deref(), Some("bad_verification_code"));
    }
}
