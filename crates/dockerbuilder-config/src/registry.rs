//! レジストリの場所と prefix の導出

use crate::error::{ConfigError, Result};
use std::fmt;
use std::str::FromStr;

/// Docker Hub のログイン先（`DEIS_REGISTRY_HOSTNAME` 未設定時）
pub const DEFAULT_LOGIN_SERVER: &str = "https://index.docker.io/v1/";

/// `DEIS_REGISTRY_LOCATION`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryLocation {
    /// クラスタ内レジストリ（ログイン不要）
    #[default]
    OnCluster,
    OffCluster,
    Ecr,
    Gcr,
}

impl RegistryLocation {
    pub fn requires_login(&self) -> bool {
        !matches!(self, RegistryLocation::OnCluster)
    }
}

impl FromStr for RegistryLocation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "on-cluster" => Ok(Self::OnCluster),
            "off-cluster" => Ok(Self::OffCluster),
            "ecr" => Ok(Self::Ecr),
            "gcr" => Ok(Self::Gcr),
            other => Err(ConfigError::InvalidRegistryLocation(other.to_string())),
        }
    }
}

impl fmt::Display for RegistryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OnCluster => "on-cluster",
            Self::OffCluster => "off-cluster",
            Self::Ecr => "ecr",
            Self::Gcr => "gcr",
        };
        f.write_str(s)
    }
}

/// レジストリのアドレス情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySettings {
    pub location: RegistryLocation,
    /// `DEIS_REGISTRY_HOSTNAME`（スキーム付きのままでよい）
    pub hostname: String,
    pub organization: String,
    pub gcs_project_id: String,
    pub service_host: String,
    pub service_port: String,
}

impl RegistrySettings {
    /// スキームを除いたホスト名
    pub fn bare_hostname(&self) -> &str {
        let host = self.hostname.as_str();
        host.strip_prefix("https://")
            .or_else(|| host.strip_prefix("http://"))
            .unwrap_or(host)
    }

    /// イメージ名の前に付けるレジストリ prefix
    ///
    /// - off-cluster: `host/organization`（空のセグメントは省略。host が空なら Docker Hub）
    /// - ecr: `host`
    /// - gcr: `host/project-id`
    /// - on-cluster: `service_host:service_port`
    pub fn registry_prefix(&self) -> String {
        match self.location {
            RegistryLocation::OffCluster => [self.bare_hostname(), self.organization.as_str()]
                .iter()
                .filter(|segment| !segment.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join("/"),
            RegistryLocation::Ecr => self.bare_hostname().to_string(),
            RegistryLocation::Gcr => format!("{}/{}", self.bare_hostname(), self.gcs_project_id),
            RegistryLocation::OnCluster => {
                format!("{}:{}", self.service_host, self.service_port)
            }
        }
    }

    /// ロケーションごとの必須設定がそろっているか確認
    ///
    /// off-cluster は host・organization とも省略できる（Docker Hub）
    pub fn validate(&self) -> Result<()> {
        let required: Vec<(&'static str, &str)> = match self.location {
            RegistryLocation::OnCluster => vec![
                ("DEIS_REGISTRY_SERVICE_HOST", self.service_host.as_str()),
                ("DEIS_REGISTRY_SERVICE_PORT", self.service_port.as_str()),
            ],
            RegistryLocation::OffCluster => vec![],
            RegistryLocation::Ecr => vec![("DEIS_REGISTRY_HOSTNAME", self.bare_hostname())],
            RegistryLocation::Gcr => vec![
                ("DEIS_REGISTRY_HOSTNAME", self.bare_hostname()),
                ("DEIS_REGISTRY_GCS_PROJ_ID", self.gcs_project_id.as_str()),
            ],
        };

        match required.into_iter().find(|(_, value)| value.is_empty()) {
            Some((key, _)) => Err(ConfigError::MissingVar(key)),
            None => Ok(()),
        }
    }

    /// ログイン先のサーバーアドレス
    pub fn login_server(&self) -> &str {
        if self.hostname.is_empty() {
            DEFAULT_LOGIN_SERVER
        } else {
            &self.hostname
        }
    }
}

/// レジストリのログイン情報
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

// パスワードをログに出さない
impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}
