//! ビルドコンテキストの準備
//!
//! アーカイブを展開し、Dockerfile の末尾にビルド引数の `ARG` 宣言を追記します。
//! Dockerfile 側で宣言されていない引数（`PORT` など）もビルド時に解決できるようにするためです。

use crate::error::{BuildError, BuildResult};
use dockerbuilder_config::BuildArguments;
use flate2::read::GzDecoder;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const MANIFEST_NAME: &str = "Dockerfile";

pub struct Stager {
    context_dir: PathBuf,
}

impl Stager {
    pub fn new(context_dir: impl Into<PathBuf>) -> Self {
        Self {
            context_dir: context_dir.into(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.context_dir.join(MANIFEST_NAME)
    }

    /// アーカイブがあれば展開し、Dockerfile にビルド引数を追記
    pub fn stage(
        &self,
        archive: Option<&Path>,
        build_args: &BuildArguments,
    ) -> BuildResult<PathBuf> {
        if let Some(archive) = archive {
            self.extract(archive)?;
            tracing::debug!("extracting tar file complete");
        }

        let manifest = self.manifest_path();
        Self::inject_build_args(&manifest, build_args)?;
        Ok(manifest)
    }

    /// tar.gz をコンテキストディレクトリに展開
    pub fn extract(&self, archive: &Path) -> BuildResult<()> {
        let file = File::open(archive)
            .map_err(|e| BuildError::stage(archive, format!("cannot open archive: {}", e)))?;

        std::fs::create_dir_all(&self.context_dir)?;

        let mut tar = tar::Archive::new(GzDecoder::new(file));
        tar.set_preserve_permissions(true);
        tar.unpack(&self.context_dir)
            .map_err(|e| BuildError::stage(archive, format!("corrupt archive: {}", e)))?;

        Ok(())
    }

    /// 既存の内容は変更せず、改行と `ARG <name>` 行を追記
    pub fn inject_build_args(manifest: &Path, build_args: &BuildArguments) -> BuildResult<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(manifest)
            .map_err(|e| BuildError::stage(manifest, format!("cannot open Dockerfile: {}", e)))?;

        let mut writer = BufWriter::new(file);
        // 末尾に改行がない Dockerfile でも新しい行から書き始める
        writer.write_all(b"\n")?;
        for name in build_args.keys() {
            writeln!(writer, "ARG {}", name)?;
        }
        writer.flush()?;

        if !build_args.is_empty() {
            tracing::debug!("Injected {} build args into {}", build_args.len(), manifest.display());
        }

        Ok(())
    }
}
