use clap::Parser;
use colored::Colorize;
use dockerbuilder_build::{BuildError, DockerEngine, JobOutcome, Pipeline};
use dockerbuilder_config::{
    DEFAULT_ARTIFACT_PATH, DEFAULT_CONTEXT_DIR, DEFAULT_OBJECTSTORE_CREDS_DIR,
    DEFAULT_SCRATCH_DIR, JobConfig, JobPaths, is_truthy,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dockerbuilder")]
#[command(about = "アプリケーションのアーカイブからイメージをビルドし、レジストリにプッシュします", long_about = None)]
#[command(version)]
struct Cli {
    /// デバッグ出力を有効にする（DEIS_DEBUG と同等）
    #[arg(long)]
    debug: bool,

    /// ビルドコンテキストを展開するディレクトリ
    #[arg(long, default_value = DEFAULT_CONTEXT_DIR)]
    context_dir: PathBuf,

    /// 取得したアーカイブの保存先
    #[arg(long, default_value = DEFAULT_ARTIFACT_PATH)]
    artifact: PathBuf,

    /// オブジェクトストレージの認証情報ディレクトリ
    #[arg(long, default_value = DEFAULT_OBJECTSTORE_CREDS_DIR)]
    objectstore_creds: PathBuf,

    /// オブジェクトストレージ用の作業ディレクトリ
    #[arg(long, default_value = DEFAULT_SCRATCH_DIR)]
    scratch_dir: PathBuf,
}

impl Cli {
    fn paths(&self) -> JobPaths {
        JobPaths {
            context_dir: self.context_dir.clone(),
            artifact_path: self.artifact.clone(),
            objectstore_creds_dir: self.objectstore_creds.clone(),
            scratch_dir: self.scratch_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let debug = cli.debug || std::env::var("DEIS_DEBUG").is_ok_and(|v| is_truthy(&v));
    init_tracing(debug);

    match run(&cli).await {
        Ok((JobOutcome::Success, _)) => Ok(()),
        Ok((outcome, exit_delay)) => {
            eprintln!("{} イメージのビルドまたはプッシュに失敗しました", "Error:".red().bold());
            // ログが収集される前にコンテナが終了しないよう待つ
            tokio::time::sleep(exit_delay).await;
            std::process::exit(outcome.exit_code());
        }
        Err(e) => {
            let message = match e.downcast_ref::<BuildError>() {
                Some(build_error) => build_error.user_message(),
                None => format!("{:#}", e),
            };
            eprintln!("{} {}", "Error:".red().bold(), message);
            std::process::exit(1);
        }
    }
}

/// ログは stderr に出力し、stdout はビルドの進捗専用にする
fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();
}

async fn run(cli: &Cli) -> anyhow::Result<(JobOutcome, Duration)> {
    let mut config = JobConfig::from_env().map_err(BuildError::from)?;
    config.debug |= cli.debug;
    config.paths = cli.paths();
    let exit_delay = config.exit_delay;

    tracing::info!("Building {} from {}", config.image, config.paths.context_dir.display());

    let engine = DockerEngine::connect()?;
    let mut pipeline = Pipeline::new(config, engine, std::io::stdout());
    let outcome = pipeline.run().await?;

    Ok((outcome, exit_delay))
}
