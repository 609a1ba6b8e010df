use dockerbuilder_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to retrieve artifact {source_path}: {message}")]
    Retrieval {
        source_path: String,
        message: String,
    },

    #[error("Failed to stage build context at {path}: {message}")]
    Stage { path: PathBuf, message: String },

    #[error("Registry login failed for {registry}: {message}")]
    Auth { registry: String, message: String },

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    pub(crate) fn retrieval(source_path: &str, message: impl Into<String>) -> Self {
        BuildError::Retrieval {
            source_path: source_path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn stage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        BuildError::Stage {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn auth(registry: &str, message: impl Into<String>) -> Self {
        BuildError::Auth {
            registry: registry.to_string(),
            message: message.into(),
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::Retrieval {
                source_path,
                message,
            } => {
                format!(
                    "アプリケーションのアーカイブを取得できませんでした: {}\n\
                     {}\n\
                     \n\
                     TAR_PATH とオブジェクトストレージの認証情報を確認してください。",
                    source_path, message
                )
            }
            BuildError::Stage { path, message } => {
                format!(
                    "ビルドコンテキストを準備できませんでした: {}\n\
                     {}\n\
                     \n\
                     アーカイブが gzip 圧縮の tar で、ルートに Dockerfile を含むか確認してください。",
                    path.display(),
                    message
                )
            }
            BuildError::Auth { registry, message } => {
                format!(
                    "レジストリへのログインに失敗しました: {}\n\
                     {}\n\
                     \n\
                     DEIS_REGISTRY_USERNAME / DEIS_REGISTRY_PASSWORD を確認してください。",
                    registry, message
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
