//! Docker Engine によるビルド・プッシュ

use crate::auth::RegistryAuth;
use crate::builder::ImageBuilder;
use crate::context::ContextBuilder;
use crate::engine::{BuildRequest, ImageEngine};
use crate::error::BuildResult;
use crate::pusher::ImagePusher;
use crate::stream::StreamChunk;
use async_trait::async_trait;
use bollard::Docker;
use bollard::auth::DockerCredentials;
use dockerbuilder_config::RegistryCredentials;
use futures_util::stream::LocalBoxStream;
use std::collections::HashMap;

pub struct DockerEngine {
    builder: ImageBuilder,
    pusher: ImagePusher,
    auth: RegistryAuth,
    credentials: Option<DockerCredentials>,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self {
            builder: ImageBuilder::new(docker.clone()),
            pusher: ImagePusher::new(docker),
            auth: RegistryAuth::new(),
            credentials: None,
        }
    }

    /// ローカルの Docker デーモンに接続
    pub fn connect() -> BuildResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::new(docker))
    }

    /// ベースイメージの pull 用に X-Registry-Config 形式で渡す
    fn build_credentials(&self) -> Option<HashMap<String, DockerCredentials>> {
        self.credentials.as_ref().map(|creds| {
            let server = creds.serveraddress.clone().unwrap_or_default();
            HashMap::from([(server, creds.clone())])
        })
    }
}

#[async_trait(?Send)]
impl ImageEngine for DockerEngine {
    async fn login(&mut self, credentials: &RegistryCredentials) -> BuildResult<()> {
        let creds = self.auth.login(credentials).await?;
        self.credentials = Some(creds);
        Ok(())
    }

    fn build<'a>(
        &'a self,
        request: BuildRequest<'a>,
    ) -> BuildResult<LocalBoxStream<'a, StreamChunk>> {
        let context_data = ContextBuilder::pack(request.context_dir)?;
        if !request.build_args.is_empty() {
            tracing::debug!("Build args: {:?}", request.build_args);
        }

        Ok(self.builder.build_stream(
            context_data,
            request.tag,
            request.build_args.to_map(),
            self.build_credentials(),
        ))
    }

    fn push<'a>(&'a self, repository: &'a str, tag: &'a str) -> LocalBoxStream<'a, StreamChunk> {
        self.pusher
            .push_stream(repository, tag, self.credentials.clone())
    }
}
