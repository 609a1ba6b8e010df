//! dockerbuilder のジョブ設定
//!
//! 環境変数はプロセス起動時に一度だけ読み込み、`JobConfig` としてパイプラインに渡す。

pub mod build_args;
pub mod error;
pub mod image;
pub mod registry;

pub use build_args::BuildArguments;
pub use error::*;
pub use image::{ImageReference, RegistryTarget};
pub use registry::{RegistryCredentials, RegistryLocation, RegistrySettings};

use std::path::PathBuf;
use std::time::Duration;

/// ビルドコンテキストの既定ディレクトリ
pub const DEFAULT_CONTEXT_DIR: &str = "/app";
/// ダウンロードしたアーカイブの保存先
pub const DEFAULT_ARTIFACT_PATH: &str = "apptar";
/// オブジェクトストレージの認証情報マウント先
pub const DEFAULT_OBJECTSTORE_CREDS_DIR: &str = "/var/run/secrets/deis/objectstore/creds/";
/// minio 用の bucket ファイルを書く作業ディレクトリ
pub const DEFAULT_SCRATCH_DIR: &str = "/tmp/objectstore";
/// 失敗時に終了を遅らせる秒数
pub const DEFAULT_EXIT_DELAY_SECS: u64 = 3;

/// オブジェクトストレージのバックエンドを上書きしうる AWS CLI/SDK の環境変数
pub const DEFAULT_SANITIZED_ENV: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_CA_BUNDLE",
    "AWS_CLI_AUTO_PROMPT",
    "AWS_CLI_FILE_ENCODING",
    "AWS_CONFIG_FILE",
    "AWS_DATA_PATH",
    "AWS_DEFAULT_OUTPUT",
    "AWS_DEFAULT_REGION",
    "AWS_EC2_METADATA_DISABLED",
    "AWS_MAX_ATTEMPTS",
    "AWS_METADATA_SERVICE_NUM_ATTEMPTS",
    "AWS_METADATA_SERVICE_TIMEOUT",
    "AWS_PAGER",
    "AWS_PROFILE",
    "AWS_REGION",
    "AWS_RETRY_MODE",
    "AWS_ROLE_ARN",
    "AWS_ROLE_SESSION_NAME",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_SHARED_CREDENTIALS_FILE",
    "AWS_STS_REGIONAL_ENDPOINTS",
    "AWS_WEB_IDENTITY_TOKEN_FILE",
];

/// ファイルシステム上の既定パス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub context_dir: PathBuf,
    pub artifact_path: PathBuf,
    pub objectstore_creds_dir: PathBuf,
    pub scratch_dir: PathBuf,
}

impl Default for JobPaths {
    fn default() -> Self {
        Self {
            context_dir: PathBuf::from(DEFAULT_CONTEXT_DIR),
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            objectstore_creds_dir: PathBuf::from(DEFAULT_OBJECTSTORE_CREDS_DIR),
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
        }
    }
}

impl JobPaths {
    pub fn manifest_path(&self) -> PathBuf {
        self.context_dir.join("Dockerfile")
    }
}

/// 1回のビルド・プッシュジョブの設定
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// `TAR_PATH`: オブジェクトキーまたは URL
    pub tar_path: Option<String>,
    /// `BUILDER_STORAGE`
    pub storage: Option<String>,
    /// objstorage 実行時に取り除く環境変数
    pub sanitize_env: Vec<String>,
    pub registry: RegistrySettings,
    pub credentials: RegistryCredentials,
    pub image: ImageReference,
    pub build_args: BuildArguments,
    pub debug: bool,
    pub exit_delay: Duration,
    pub paths: JobPaths,
}

impl JobConfig {
    /// プロセスの環境変数から読み込み
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の key/value ソースから読み込み
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let image_name = get("IMG_NAME").ok_or(ConfigError::MissingVar("IMG_NAME"))?;
        let image = ImageReference::parse(&image_name)?;

        let location = match get("DEIS_REGISTRY_LOCATION") {
            Some(v) => v.parse()?,
            None => RegistryLocation::default(),
        };

        let registry = RegistrySettings {
            location,
            hostname: get("DEIS_REGISTRY_HOSTNAME").unwrap_or_default(),
            organization: get("DEIS_REGISTRY_ORGANIZATION").unwrap_or_default(),
            gcs_project_id: get("DEIS_REGISTRY_GCS_PROJ_ID").unwrap_or_default(),
            service_host: get("DEIS_REGISTRY_SERVICE_HOST").unwrap_or_default(),
            service_port: get("DEIS_REGISTRY_SERVICE_PORT").unwrap_or_default(),
        };
        registry.validate()?;

        let credentials = RegistryCredentials {
            server: registry.login_server().to_string(),
            username: get("DEIS_REGISTRY_USERNAME"),
            password: get("DEIS_REGISTRY_PASSWORD"),
        };

        let build_args = match get("DOCKER_BUILD_ARGS") {
            Some(raw) => BuildArguments::from_json(&raw)?,
            None => BuildArguments::default(),
        };

        let preserve: Vec<String> = get("BUILDER_PRESERVE_ENV")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let sanitize_env = DEFAULT_SANITIZED_ENV
            .iter()
            .filter(|var| !preserve.iter().any(|p| p == *var))
            .map(|var| var.to_string())
            .collect();

        let exit_delay = match get("DOCKERBUILDER_EXIT_DELAY_SECS") {
            Some(v) => Duration::from_secs(v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DOCKERBUILDER_EXIT_DELAY_SECS",
                value: v.clone(),
            })?),
            None => Duration::from_secs(DEFAULT_EXIT_DELAY_SECS),
        };

        let config = Self {
            tar_path: get("TAR_PATH"),
            storage: get("BUILDER_STORAGE"),
            sanitize_env,
            registry,
            credentials,
            image,
            build_args,
            debug: get("DEIS_DEBUG").is_some_and(|v| is_truthy(&v)),
            exit_delay,
            paths: JobPaths::default(),
        };

        tracing::debug!(
            "Loaded job config: image={}, registry={}",
            config.image,
            config.registry.location
        );

        Ok(config)
    }

    /// ビルド・プッシュ先
    pub fn target(&self) -> RegistryTarget {
        RegistryTarget::new(self.registry.registry_prefix(), self.image.clone())
    }
}

/// `DEIS_DEBUG` の真偽判定（`true` / `1`）
pub fn is_truthy(value: &str) -> bool {
    matches!(value, "true" | "1")
}
