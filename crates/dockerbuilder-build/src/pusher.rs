//! イメージプッシュ処理
//!
//! ビルドしたイメージをコンテナレジストリにプッシュします。

use crate::stream::{ProgressMessage, StreamChunk};
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::models::PushImageInfo;
use futures_util::stream::{LocalBoxStream, StreamExt};

/// イメージプッシュを実行するハンドラ
pub struct ImagePusher {
    docker: Docker,
}

impl ImagePusher {
    /// 新しい ImagePusher を作成
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// イメージをレジストリにプッシュし、進捗をストリームで返す
    ///
    /// # Arguments
    /// * `image` - イメージ名（レジストリ込み、タグなし）
    /// * `tag` - イメージタグ
    pub fn push_stream<'a>(
        &'a self,
        image: &'a str,
        tag: &'a str,
        credentials: Option<DockerCredentials>,
    ) -> LocalBoxStream<'a, StreamChunk> {
        tracing::info!("Pushing {}:{}", image, tag);

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> {
            tag: tag.to_string(),
        };

        #[allow(deprecated)]
        let stream = self.docker.push_image(image, Some(options), credentials);

        stream
            .map(|item| match item {
                Ok(info) => StreamChunk::Decoded(info.into()),
                Err(e) => StreamChunk::from(e),
            })
            .boxed_local()
    }
}

impl From<PushImageInfo> for ProgressMessage {
    #[allow(deprecated)]
    fn from(info: PushImageInfo) -> Self {
        Self {
            status: info.status,
            progress: info.progress,
            error: info.error,
            ..Default::default()
        }
    }
}
