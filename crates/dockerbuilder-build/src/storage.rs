//! オブジェクトストレージのバックエンドごとの規約
//!
//! ダウンロード自体は `objstorage` CLI が行う。バックエンドによって
//! bucket / container 名の渡し方が異なるので、その差分だけをここで吸収する。

use crate::error::{BuildError, BuildResult};
use std::path::{Path, PathBuf};

/// `objstorage` CLI
pub const OBJSTORAGE_BIN: &str = "objstorage";

const BUCKET_FILE: &str = "builder-bucket";
const CONTAINER_FILE: &str = "builder-container";
/// minio のアプリ用 bucket 名
const MINIO_BUCKET: &str = "git";

pub trait ObjectStore: Send + Sync {
    /// `--storage-type` に渡す名前
    fn storage_type(&self) -> &str;

    /// `objstorage` に渡す環境変数を用意する
    fn prepare_env(&self) -> BuildResult<Vec<(String, PathBuf)>>;
}

/// s3 / gcs など: 認証情報ディレクトリの bucket ファイルを使う
pub struct BucketStore {
    storage_type: String,
    creds_dir: PathBuf,
}

impl ObjectStore for BucketStore {
    fn storage_type(&self) -> &str {
        &self.storage_type
    }

    fn prepare_env(&self) -> BuildResult<Vec<(String, PathBuf)>> {
        Ok(vec![(
            "BUCKET_FILE".to_string(),
            self.creds_dir.join(BUCKET_FILE),
        )])
    }
}

/// minio: bucket 名を書いたファイルを作業ディレクトリに用意する
pub struct MinioStore {
    scratch_dir: PathBuf,
}

impl ObjectStore for MinioStore {
    fn storage_type(&self) -> &str {
        "minio"
    }

    fn prepare_env(&self) -> BuildResult<Vec<(String, PathBuf)>> {
        let dir = self.scratch_dir.join("minio");
        let bucket_file = dir.join(BUCKET_FILE);
        let write_failed = |e: std::io::Error| {
            BuildError::retrieval(
                &bucket_file.display().to_string(),
                format!("cannot write minio bucket file: {}", e),
            )
        };

        std::fs::create_dir_all(&dir).map_err(write_failed)?;
        std::fs::write(&bucket_file, MINIO_BUCKET).map_err(write_failed)?;

        Ok(vec![("BUCKET_FILE".to_string(), bucket_file)])
    }
}

/// azure / swift: bucket に加えて container 名のファイルを渡す
pub struct ContainerStore {
    storage_type: String,
    creds_dir: PathBuf,
}

impl ObjectStore for ContainerStore {
    fn storage_type(&self) -> &str {
        &self.storage_type
    }

    fn prepare_env(&self) -> BuildResult<Vec<(String, PathBuf)>> {
        Ok(vec![
            (
                "BUCKET_FILE".to_string(),
                self.creds_dir.join(BUCKET_FILE),
            ),
            (
                "CONTAINER_FILE".to_string(),
                self.creds_dir.join(CONTAINER_FILE),
            ),
        ])
    }
}

/// `BUILDER_STORAGE` に対応するバックエンドを選ぶ
pub fn object_store_for(
    storage_type: &str,
    creds_dir: &Path,
    scratch_dir: &Path,
) -> BuildResult<Box<dyn ObjectStore>> {
    let store: Box<dyn ObjectStore> = match storage_type {
        "" => {
            return Err(BuildError::Config(
                dockerbuilder_config::ConfigError::MissingVar("BUILDER_STORAGE"),
            ));
        }
        "minio" => Box::new(MinioStore {
            scratch_dir: scratch_dir.to_path_buf(),
        }),
        "azure" | "swift" => Box::new(ContainerStore {
            storage_type: storage_type.to_string(),
            creds_dir: creds_dir.to_path_buf(),
        }),
        other => Box::new(BucketStore {
            storage_type: other.to_string(),
            creds_dir: creds_dir.to_path_buf(),
        }),
    };

    Ok(store)
}
