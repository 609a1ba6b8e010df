//! レジストリ認証処理
//!
//! Docker Registry v2 の `/v2/` エンドポイントに対して認証情報を検証し、
//! Bollard の DockerCredentials に変換します。
//! Bearer トークン方式のレジストリ（Docker Hub, GCR, Quay など）はトークン発行まで確認します。

use crate::error::{BuildError, BuildResult};
use bollard::auth::DockerCredentials;
use dockerbuilder_config::RegistryCredentials;
use reqwest::StatusCode;
use reqwest::header::WWW_AUTHENTICATE;
use std::collections::HashMap;

/// `index.docker.io/v1/` の実際の API エンドポイント
const DOCKER_HUB_API: &str = "https://registry-1.docker.io";

/// レジストリ認証を管理
#[derive(Debug, Clone, Default)]
pub struct RegistryAuth {
    client: reqwest::Client,
}

/// `WWW-Authenticate` ヘッダーのチャレンジ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChallenge {
    Basic,
    Bearer { realm: String, service: Option<String> },
}

impl RegistryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// 認証情報を検証し、Docker Engine に渡す形式で返す
    pub async fn login(&self, credentials: &RegistryCredentials) -> BuildResult<DockerCredentials> {
        let server = credentials.server.as_str();
        let (Some(username), Some(password)) =
            (credentials.username.as_deref(), credentials.password.as_deref())
        else {
            return Err(BuildError::auth(
                server,
                "DEIS_REGISTRY_USERNAME and DEIS_REGISTRY_PASSWORD are required",
            ));
        };

        let endpoint = api_endpoint(server);
        tracing::info!("Logging in to {} as {}", endpoint, username);

        let response = self
            .client
            .get(format!("{}/v2/", endpoint))
            .basic_auth(username, Some(password))
            .send()
            .await
            .map_err(|e| BuildError::auth(server, e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED => {
                let challenge = response
                    .headers()
                    .get(WWW_AUTHENTICATE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_challenge);

                match challenge {
                    Some(AuthChallenge::Bearer { realm, service }) => {
                        self.request_token(server, &realm, service.as_deref(), username, password)
                            .await?;
                    }
                    _ => return Err(BuildError::auth(server, "invalid username or password")),
                }
            }
            status => {
                return Err(BuildError::auth(
                    server,
                    format!("unexpected response from registry: {}", status),
                ));
            }
        }

        tracing::debug!("Login succeeded for {}", server);

        Ok(DockerCredentials {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            serveraddress: Some(server.to_string()),
            ..Default::default()
        })
    }

    /// Bearer トークンの発行で認証情報を確認
    async fn request_token(
        &self,
        server: &str,
        realm: &str,
        service: Option<&str>,
        username: &str,
        password: &str,
    ) -> BuildResult<()> {
        let mut query = vec![("account", username)];
        if let Some(service) = service {
            query.push(("service", service));
        }

        let response = self
            .client
            .get(realm)
            .query(&query)
            .basic_auth(username, Some(password))
            .send()
            .await
            .map_err(|e| BuildError::auth(server, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(BuildError::auth(server, "invalid username or password"))
        } else {
            Err(BuildError::auth(
                server,
                format!("token endpoint returned {}", status),
            ))
        }
    }
}

/// ログイン先のアドレスを v2 API のベース URL に変換
///
/// # Examples
/// - `https://index.docker.io/v1/` -> `https://registry-1.docker.io`
/// - `quay.io` -> `https://quay.io`
/// - `http://10.0.0.5:5555/` -> `http://10.0.0.5:5555`
pub fn api_endpoint(server: &str) -> String {
    let (scheme, rest) = if let Some(rest) = server.strip_prefix("https://") {
        ("https", rest)
    } else if let Some(rest) = server.strip_prefix("http://") {
        ("http", rest)
    } else {
        ("https", server)
    };

    let host = rest.split('/').next().unwrap_or_default();
    if host == "docker.io" || host.ends_with(".docker.io") {
        return DOCKER_HUB_API.to_string();
    }

    format!("{}://{}", scheme, host)
}

/// `WWW-Authenticate` ヘッダーを解析
pub fn parse_challenge(header: &str) -> Option<AuthChallenge> {
    let header = header.trim();
    let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));

    if scheme.eq_ignore_ascii_case("basic") {
        return Some(AuthChallenge::Basic);
    }
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let params: HashMap<String, String> = params
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().trim_matches('"').to_string()))
        .collect();

    Some(AuthChallenge::Bearer {
        realm: params.get("realm")?.clone(),
        service: params.get("service").cloned(),
    })
}
