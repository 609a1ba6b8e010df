use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("必須の環境変数が設定されていません: {0}")]
    MissingVar(&'static str),

    #[error("イメージ名は name:tag 形式で指定してください: {0}")]
    InvalidImageName(String),

    #[error("不正なイメージタグ: {0}")]
    InvalidTag(String),

    #[error("不正なレジストリロケーション: {0} (on-cluster, off-cluster, ecr, gcr のいずれか)")]
    InvalidRegistryLocation(String),

    #[error("DOCKER_BUILD_ARGS の解析に失敗しました: {0}")]
    InvalidBuildArgs(String),

    #[error("{key} の値が不正です: {value}")]
    InvalidValue { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
