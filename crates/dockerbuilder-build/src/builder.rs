use crate::stager::MANIFEST_NAME;
use crate::stream::{ErrorDetail, ProgressMessage, StreamChunk};
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::models::BuildInfo;
use bytes::Bytes;
use futures_util::stream::{LocalBoxStream, StreamExt};
use http_body_util::{Either, Full};
use std::collections::HashMap;

pub struct ImageBuilder {
    docker: Docker,
}

impl ImageBuilder {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// イメージをビルドし、進捗をストリームで返す
    pub fn build_stream<'a>(
        &'a self,
        context_data: Vec<u8>,
        tag: &'a str,
        build_args: HashMap<String, String>,
        credentials: Option<HashMap<String, DockerCredentials>>,
    ) -> LocalBoxStream<'a, StreamChunk> {
        tracing::info!("Building image: {}", tag);

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions::<String> {
            dockerfile: MANIFEST_NAME.to_string(),
            t: tag.to_string(),
            buildargs: build_args,
            rm: true,      // 中間コンテナを削除
            forcerm: true, // ビルド失敗時も中間コンテナを削除
            pull: true,    // ベースイメージを常にpull
            ..Default::default()
        };

        tracing::debug!("Build options: {:?}", options);

        let body = Full::new(Bytes::from(context_data));

        #[allow(deprecated)]
        let stream = self
            .docker
            .build_image(options, credentials, Some(Either::Left(body)));

        stream
            .map(|item| match item {
                Ok(info) => StreamChunk::Decoded(info.into()),
                Err(e) => StreamChunk::from(e),
            })
            .boxed_local()
    }
}

impl From<BuildInfo> for ProgressMessage {
    #[allow(deprecated)]
    fn from(info: BuildInfo) -> Self {
        Self {
            id: info.id,
            stream: info.stream,
            status: info.status,
            progress: info.progress,
            error: info.error,
            error_detail: info.error_detail.map(|detail| ErrorDetail {
                message: detail.message,
            }),
            message: None,
        }
    }
}
