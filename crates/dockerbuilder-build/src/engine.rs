//! ビルド・プッシュを実行するエンジンの抽象

use crate::error::BuildResult;
use crate::stream::StreamChunk;
use async_trait::async_trait;
use dockerbuilder_config::{BuildArguments, RegistryCredentials};
use futures_util::stream::LocalBoxStream;
use std::path::Path;

/// ビルド要求
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub context_dir: &'a Path,
    /// レジストリ込みのフルタグ
    pub tag: &'a str,
    pub build_args: &'a BuildArguments,
}

/// イメージのビルドとプッシュを行うエンジン
///
/// どちらも進捗チャンクのストリームを返し、成否の判定は呼び出し側が行う。
#[async_trait(?Send)]
pub trait ImageEngine {
    /// レジストリにログインし、以降のビルド・プッシュで認証情報を使う
    async fn login(&mut self, credentials: &RegistryCredentials) -> BuildResult<()>;

    fn build<'a>(
        &'a self,
        request: BuildRequest<'a>,
    ) -> BuildResult<LocalBoxStream<'a, StreamChunk>>;

    /// `repository`（タグなし）の `tag` をプッシュ
    fn push<'a>(&'a self, repository: &'a str, tag: &'a str) -> LocalBoxStream<'a, StreamChunk>;
}
