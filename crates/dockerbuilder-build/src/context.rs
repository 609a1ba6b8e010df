use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::Path;
use tar::Builder;

pub struct ContextBuilder;

impl ContextBuilder {
    /// ビルドコンテキストのディレクトリを tar.gz アーカイブにまとめる
    ///
    /// Dockerfile はステージ済みのものがディレクトリ直下にある前提
    pub fn pack(context_dir: &Path) -> BuildResult<Vec<u8>> {
        tracing::debug!("Packing build context from: {}", context_dir.display());

        if !context_dir.is_dir() {
            return Err(BuildError::stage(
                context_dir,
                "build context is not a directory",
            ));
        }

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);
            tar.follow_symlinks(false);

            tar.append_dir_all(".", context_dir)?;
            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context packed: {} bytes", archive_data.len());
        Self::check_context_size(archive_data.len());

        Ok(archive_data)
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "ビルドコンテキストが大きすぎます（{}MB）",
                size / 1024 / 1024
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_pack_context() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("Dockerfile"), "FROM alpine\nARG PORT\n").unwrap();
        fs::write(temp_dir.path().join("main.go"), "package main").unwrap();
        let subdir = temp_dir.path().join("static");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("index.html"), "<html></html>").unwrap();

        let archive = ContextBuilder::pack(temp_dir.path()).unwrap();
        assert!(!archive.is_empty());

        let extract_dir = tempdir().unwrap();
        let decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(archive));
        tar::Archive::new(decoder).unpack(extract_dir.path()).unwrap();

        assert_eq!(
            fs::read_to_string(extract_dir.path().join("Dockerfile")).unwrap(),
            "FROM alpine\nARG PORT\n"
        );
        assert!(extract_dir.path().join("static/index.html").exists());
    }

    #[test]
    fn test_pack_missing_dir() {
        let temp_dir = tempdir().unwrap();
        let result = ContextBuilder::pack(&temp_dir.path().join("nope"));
        assert!(matches!(result, Err(BuildError::Stage { .. })));
    }
}
