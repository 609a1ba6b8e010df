//! ビルド・プッシュのパイプライン
//!
//! 取得 → 展開 → (ログイン) → ビルド → プッシュ の順に実行する。
//! ビルドが失敗した場合はプッシュしない。

use crate::engine::{BuildRequest, ImageEngine};
use crate::error::BuildResult;
use crate::interpreter::{JobOutcome, StreamInterpreter};
use crate::retriever::ArtifactRetriever;
use crate::stager::Stager;
use colored::Colorize;
use dockerbuilder_config::JobConfig;
use std::io::Write;

pub struct Pipeline<E: ImageEngine, W: Write> {
    config: JobConfig,
    engine: E,
    retriever: ArtifactRetriever,
    out: W,
}

impl<E: ImageEngine, W: Write> Pipeline<E, W> {
    pub fn new(config: JobConfig, engine: E, out: W) -> Self {
        Self {
            config,
            engine,
            retriever: ArtifactRetriever::new(),
            out,
        }
    }

    pub fn with_retriever(mut self, retriever: ArtifactRetriever) -> Self {
        self.retriever = retriever;
        self
    }

    #[cfg(test)]
    pub(crate) fn engine(&self) -> &E {
        &self.engine
    }

    #[cfg(test)]
    pub(crate) fn into_parts(self) -> (E, W) {
        (self.engine, self.out)
    }

    /// パイプライン全体を実行
    ///
    /// 取得・展開・ログインの失敗は `Err`、ビルド・プッシュの失敗は `JobOutcome::Failure` を返す
    pub async fn run(&mut self) -> BuildResult<JobOutcome> {
        let archive = self.retriever.retrieve(&self.config).await?;

        let stager = Stager::new(&self.config.paths.context_dir);
        stager.stage(archive.as_deref(), &self.config.build_args)?;

        let target = self.config.target();
        if self.config.registry.location.requires_login() {
            self.engine.login(&self.config.credentials).await?;
        }

        let full_tag = target.full_tag();
        let request = BuildRequest {
            context_dir: &self.config.paths.context_dir,
            tag: &full_tag,
            build_args: &self.config.build_args,
        };

        let outcome = {
            let stream = self.engine.build(request)?;
            StreamInterpreter::new(&mut self.out, true, self.config.debug)
                .interpret(stream)
                .await
        };
        if let JobOutcome::Failure { message } = &outcome {
            tracing::error!("Build failed for {}: {}", full_tag, message);
            return Ok(outcome);
        }
        tracing::info!("Successfully built: {}", full_tag);

        writeln!(self.out, "Pushing to registry")?;
        self.out.flush()?;

        let repository = target.repository();
        let outcome = {
            let stream = self.engine.push(&repository, target.tag());
            StreamInterpreter::new(&mut self.out, false, self.config.debug)
                .interpret(stream)
                .await
        };

        match &outcome {
            JobOutcome::Success => {
                tracing::info!("{} {}", "Pushed".green(), full_tag.cyan());
            }
            JobOutcome::Failure { message } => {
                tracing::error!("Push failed for {}: {}", full_tag, message);
            }
        }

        Ok(outcome)
    }
}
