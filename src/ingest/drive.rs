//! Google Drive access over its v3 REST API.
//!
//! Auth uses the installed-app OAuth flow: the service hands out an
//! authorization URL, the operator pastes the code back, and the
//! exchanged access token lives in memory for the session.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

const OAUTH_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// client_id/client_secret from a downloaded OAuth client config, which
/// nests them under either "installed" or "web".
#[derive(Clone, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct ClientConfigFile {
    installed: Option<ClientCredentials>,
    web: Option<ClientCredentials>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "webViewLink", default)]
    pub web_view_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    credentials: ClientCredentials,
}

impl DriveClient {
    pub fn new(credentials: ClientCredentials) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("failed to build Drive HTTP client")?;
        Ok(Self { http, credentials })
    }

    /// Load client credentials from a downloaded OAuth config JSON.
    pub fn load_credentials(path: &std::path::Path) -> Result<ClientCredentials> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read credentials file {}", path.display()))?;
        let config: ClientConfigFile =
            serde_json::from_str(&raw).context("invalid OAuth client config")?;
        config
            .installed
            .or(config.web)
            .context("OAuth config has neither 'installed' nor 'web' section")
    }

    /// URL the operator opens in a browser to grant read-only access.
    pub fn authorization_url(&self) -> Result<String> {
        let mut url = Url::parse(OAUTH_AUTH_URL).context("invalid OAuth endpoint")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("redirect_uri", REDIRECT_URI)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPE)
            .append_pair("access_type", "offline");
        Ok(url.to_string())
    }

    /// Exchange a pasted authorization code for an access token.
    pub async fn exchange_code(&self, authorization_code: &str) -> Result<String> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", authorization_code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", REDIRECT_URI),
        ];
        let response = self
            .http
            .post(OAUTH_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .context("token exchange request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("token exchange failed ({status}): {body}");
        }
        let token: TokenResponse = response.json().await.context("invalid token response")?;
        Ok(token.access_token)
    }

    /// List all PDFs visible to the token, optionally inside one folder.
    pub async fn list_pdfs(
        &self,
        access_token: &str,
        folder_id: Option<&str>,
    ) -> Result<Vec<DriveFile>> {
        let mut query = "mimeType='application/pdf' and trashed=false".to_string();
        if let Some(folder) = folder_id {
            query.push_str(&format!(" and '{folder}' in parents"));
        }

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .http
                .get(DRIVE_FILES_URL)
                .bearer_auth(access_token)
                .query(&[
                    ("q", query.as_str()),
                    ("fields", "nextPageToken, files(id, name, webViewLink)"),
                    ("pageSize", "100"),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await.context("file list request failed")?;
            if !response.status().is_success() {
                bail!("file listing returned {}", response.status());
            }
            let page: FileListResponse =
                response.json().await.context("invalid file list response")?;
            files.extend(page.files);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(files)
    }

    /// Download a file's raw bytes.
    pub async fn download(&self, access_token: &str, file_id: &str) -> Result<Vec<u8>> {
        let url = format!("{DRIVE_FILES_URL}/{file_id}?alt=media");
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("file download request failed")?;
        if !response.status().is_success() {
            bail!("file download returned {}", response.status());
        }
        let bytes = response.bytes().await.context("failed to read file body")?;
        Ok(bytes.to_vec())
    }
}
