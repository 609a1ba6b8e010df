//! アプリケーションのソースアーカイブ取得
//!
//! 取得元の優先順位:
//! 1. `TAR_PATH` 未設定 → 取得しない（コンテキストは配置済み）
//! 2. オブジェクトストレージの認証情報がマウントされている → `objstorage` CLI でダウンロード
//! 3. それ以外 → `TAR_PATH` を URL として HTTP で取得

use crate::error::{BuildError, BuildResult};
use crate::storage::{OBJSTORAGE_BIN, ObjectStore, object_store_for};
use dockerbuilder_config::JobConfig;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub struct ArtifactRetriever {
    client: reqwest::Client,
    objstorage_bin: PathBuf,
}

impl Default for ArtifactRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactRetriever {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            objstorage_bin: PathBuf::from(OBJSTORAGE_BIN),
        }
    }

    /// HTTP クライアントを指定して作成
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            objstorage_bin: PathBuf::from(OBJSTORAGE_BIN),
        }
    }

    /// `objstorage` の実行ファイルを指定して作成
    pub fn with_objstorage_bin(objstorage_bin: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            objstorage_bin: objstorage_bin.into(),
        }
    }

    /// アーカイブを取得し、保存先のパスを返す
    ///
    /// 取得しなかった場合は `None`
    pub async fn retrieve(&self, config: &JobConfig) -> BuildResult<Option<PathBuf>> {
        let Some(tar_path) = config.tar_path.as_deref() else {
            tracing::debug!("TAR_PATH not set, assuming a pre-staged build context");
            return Ok(None);
        };

        let dest = &config.paths.artifact_path;

        if config.paths.objectstore_creds_dir.exists() {
            let store = object_store_for(
                config.storage.as_deref().unwrap_or_default(),
                &config.paths.objectstore_creds_dir,
                &config.paths.scratch_dir,
            )?;
            self.fetch_object(store.as_ref(), tar_path, dest, &config.sanitize_env)
                .await?;
        } else {
            self.fetch_url(tar_path, dest).await?;
        }

        tracing::debug!("download tar file complete");
        Ok(Some(dest.clone()))
    }

    /// `objstorage` でオブジェクトをダウンロード
    pub async fn fetch_object(
        &self,
        store: &dyn ObjectStore,
        object: &str,
        dest: &Path,
        sanitize_env: &[String],
    ) -> BuildResult<()> {
        tracing::info!(
            "Downloading {} from {} object storage",
            object,
            store.storage_type()
        );

        let mut cmd = self.objstorage_command(store, object, dest, sanitize_env)?;
        let output = cmd.output().await.map_err(|e| {
            BuildError::retrieval(
                object,
                format!(
                    "{} の実行に失敗しました: {}",
                    self.objstorage_bin.display(),
                    e
                ),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::retrieval(
                object,
                format!("objstorage exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(())
    }

    /// サニタイズ済みの環境で `objstorage ... download` を組み立てる
    ///
    /// ワーカー自身の環境変数は変更せず、子プロセスの環境からだけ取り除く
    pub fn objstorage_command(
        &self,
        store: &dyn ObjectStore,
        object: &str,
        dest: &Path,
        sanitize_env: &[String],
    ) -> BuildResult<Command> {
        let mut cmd = Command::new(&self.objstorage_bin);
        cmd.arg(format!("--storage-type={}", store.storage_type()))
            .arg("download")
            .arg(object)
            .arg(dest);

        for var in sanitize_env {
            cmd.env_remove(var);
        }
        for (key, value) in store.prepare_env()? {
            cmd.env(key, value);
        }

        Ok(cmd)
    }

    /// HTTP(S) で取得して保存
    pub async fn fetch_url(&self, url: &str, dest: &Path) -> BuildResult<()> {
        tracing::info!("Downloading {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BuildError::retrieval(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BuildError::retrieval(url, format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| BuildError::retrieval(url, e.to_string()))?;

        tokio::fs::write(dest, &body)
            .await
            .map_err(|e| BuildError::retrieval(url, format!("{}: {}", dest.display(), e)))?;

        tracing::debug!("Wrote {} bytes to {}", body.len(), dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stager::Stager;
    use dockerbuilder_config::{BuildArguments, JobPaths};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::collections::HashMap;
    use std::ffi::OsStr;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config_for(dir: &Path, tar_path: Option<String>) -> JobConfig {
        let mut config = JobConfig::from_lookup(|key| match key {
            "IMG_NAME" => Some("myapp:v1".to_string()),
            "DEIS_REGISTRY_SERVICE_HOST" => Some("10.0.0.5".to_string()),
            "DEIS_REGISTRY_SERVICE_PORT" => Some("5555".to_string()),
            _ => None,
        })
        .unwrap();
        config.tar_path = tar_path;
        config.paths = JobPaths {
            context_dir: dir.join("app"),
            artifact_path: dir.join("apptar"),
            objectstore_creds_dir: dir.join("creds"),
            scratch_dir: dir.join("scratch"),
        };
        config
    }

    fn gzip_tar(files: &[(&str, &str)]) -> Vec<u8> {
        let mut data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut data, Compression::default());
            let mut builder = tar::Builder::new(encoder);
            for (name, content) in files {
                let mut header = tar::Header::new_gnu();
                header.set_size(content.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder
                    .append_data(&mut header, name, content.as_bytes())
                    .unwrap();
            }
            builder.into_inner().unwrap().finish().unwrap();
        }
        data
    }

    /// プロキシ設定に影響されないクライアント
    fn local_retriever() -> ArtifactRetriever {
        ArtifactRetriever::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
    }

    /// 1 回だけ応答する HTTP サーバー
    async fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let header = format!(
                "{}\r\nContent-Length: {}\r\nContent-Type: application/gzip\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            );
            socket.write_all(header.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/apps/myapp.tar.gz", addr)
    }

    #[tokio::test]
    async fn test_skip_without_tar_path() {
        let temp_dir = tempdir().unwrap();
        let config = config_for(temp_dir.path(), None);

        let result = ArtifactRetriever::new().retrieve(&config).await.unwrap();
        assert!(result.is_none());
        assert!(!config.paths.artifact_path.exists());
    }

    #[tokio::test]
    async fn test_http_fallback_populates_context() {
        let temp_dir = tempdir().unwrap();
        let files = [
            ("Dockerfile", "FROM python:3\nCMD python app.py"),
            ("app.py", "print('hello')"),
            ("lib/util.py", "X = 1"),
        ];
        let url = serve_once("HTTP/1.1 200 OK", gzip_tar(&files)).await;
        let config = config_for(temp_dir.path(), Some(url));

        let archive = local_retriever()
            .retrieve(&config)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(archive, config.paths.artifact_path);

        let stager = Stager::new(&config.paths.context_dir);
        stager.extract(&archive).unwrap();

        for (name, content) in files {
            let path = config.paths.context_dir.join(name);
            assert_eq!(std::fs::read_to_string(path).unwrap(), content);
        }

        // 以降の ARG 追記も動くこと
        stager.stage(None, &BuildArguments::default()).unwrap();
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let temp_dir = tempdir().unwrap();
        let url = serve_once("HTTP/1.1 404 Not Found", b"missing".to_vec()).await;
        let config = config_for(temp_dir.path(), Some(url));

        let result = local_retriever().retrieve(&config).await;
        assert!(matches!(result, Err(BuildError::Retrieval { .. })));
        assert!(!config.paths.artifact_path.exists());
    }

    #[tokio::test]
    async fn test_unreachable_url() {
        let temp_dir = tempdir().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/app.tar.gz", addr);
        let result = local_retriever()
            .fetch_url(&url, &temp_dir.path().join("apptar"))
            .await;
        assert!(matches!(result, Err(BuildError::Retrieval { .. })));
    }

    #[test]
    fn test_objstorage_command_sanitizes_env() {
        let temp_dir = tempdir().unwrap();
        let store = object_store_for("s3", Path::new("/creds"), temp_dir.path()).unwrap();
        let sanitize = vec!["AWS_PROFILE".to_string(), "AWS_SECRET_ACCESS_KEY".to_string()];

        let cmd = ArtifactRetriever::new()
            .objstorage_command(
                store.as_ref(),
                "home/myapp/tar/1.tar.gz",
                Path::new("apptar"),
                &sanitize,
            )
            .unwrap();
        let std_cmd = cmd.as_std();

        let args: Vec<&OsStr> = std_cmd.get_args().collect();
        assert_eq!(
            args,
            vec![
                OsStr::new("--storage-type=s3"),
                OsStr::new("download"),
                OsStr::new("home/myapp/tar/1.tar.gz"),
                OsStr::new("apptar"),
            ]
        );

        let envs: HashMap<&OsStr, Option<&OsStr>> = std_cmd.get_envs().collect();
        assert_eq!(envs.get(OsStr::new("AWS_PROFILE")), Some(&None));
        assert_eq!(envs.get(OsStr::new("AWS_SECRET_ACCESS_KEY")), Some(&None));
        assert_eq!(
            envs.get(OsStr::new("BUCKET_FILE")),
            Some(&Some(OsStr::new("/creds/builder-bucket")))
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_object_storage_download() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("creds")).unwrap();

        // 引数と BUCKET_FILE の中身を保存先に書き出すだけの objstorage
        let fake = temp_dir.path().join("objstorage");
        std::fs::write(
            &fake,
            "#!/bin/sh\nprintf '%s %s %s' \"$1\" \"$3\" \"$(cat \"$BUCKET_FILE\")\" > \"$4\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = config_for(temp_dir.path(), Some("home/myapp/tar/1.tar.gz".to_string()));
        config.storage = Some("minio".to_string());

        let archive = ArtifactRetriever::with_objstorage_bin(&fake)
            .retrieve(&config)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(archive).unwrap(),
            "--storage-type=minio home/myapp/tar/1.tar.gz git"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_object_storage_failure() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("creds")).unwrap();

        let fake = temp_dir.path().join("objstorage");
        std::fs::write(&fake, "#!/bin/sh\necho 'access denied' >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = config_for(temp_dir.path(), Some("home/myapp/tar/1.tar.gz".to_string()));
        config.storage = Some("s3".to_string());

        let result = ArtifactRetriever::with_objstorage_bin(&fake)
            .retrieve(&config)
            .await;
        match result {
            Err(BuildError::Retrieval { message, .. }) => assert!(message.contains("access denied")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_object_storage_requires_backend() {
        let temp_dir = tempdir().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("creds")).unwrap();
        let config = config_for(temp_dir.path(), Some("home/myapp/tar/1.tar.gz".to_string()));

        let result = ArtifactRetriever::new().retrieve(&config).await;
        assert!(matches!(result, Err(BuildError::Config(_))));
    }
}
