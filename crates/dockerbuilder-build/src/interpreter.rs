//! 進捗ストリームの読み取りと成否判定

use crate::stream::{ProgressEvent, StreamChunk};
use futures_util::{Stream, StreamExt};
use std::io::Write;

/// ジョブ（ビルドまたはプッシュ）の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure { message: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }

    /// プロセスの終了コード
    pub fn exit_code(&self) -> i32 {
        match self {
            JobOutcome::Success => 0,
            JobOutcome::Failure { .. } => 1,
        }
    }
}

/// ストリームを最後まで読み、出力しながら成否を判定する
///
/// エラーを見つけても途中で打ち切らず、残りのチャンクをすべて読み切る。
pub struct StreamInterpreter<W: Write> {
    out: W,
    /// `stream` フィールドのテキストを出力する（ビルド用）
    decode: bool,
    debug: bool,
}

impl<W: Write> StreamInterpreter<W> {
    pub fn new(out: W, decode: bool, debug: bool) -> Self {
        Self { out, decode, debug }
    }

    pub async fn interpret<S>(&mut self, stream: S) -> JobOutcome
    where
        S: Stream<Item = StreamChunk>,
    {
        futures_util::pin_mut!(stream);

        let mut errors: Vec<String> = Vec::new();
        let mut chunks = 0usize;

        while let Some(chunk) = stream.next().await {
            chunks += 1;
            match ProgressEvent::from(chunk) {
                ProgressEvent::Error(message) => {
                    tracing::error!("{}", message);
                    self.write_line(message.as_bytes());
                    errors.push(message);
                }
                ProgressEvent::Progress(message) => {
                    if self.decode {
                        if let Some(text) = &message.stream {
                            // UTF-8 のバイト列をそのまま書き出す
                            self.write(text.as_bytes());
                        }
                    } else if self.debug {
                        match serde_json::to_vec(&message) {
                            Ok(json) => self.write_line(&json),
                            Err(e) => tracing::debug!("Failed to serialize event: {}", e),
                        }
                    }
                }
            }
            if let Err(e) = self.out.flush() {
                tracing::warn!("Failed to flush output: {}", e);
            }
        }

        tracing::debug!("Stream closed after {} chunks", chunks);

        if errors.is_empty() {
            JobOutcome::Success
        } else {
            JobOutcome::Failure {
                message: errors.join("\n"),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, bytes: &[u8]) {
        if let Err(e) = self.out.write_all(bytes) {
            tracing::warn!("Failed to write output: {}", e);
        }
    }

    fn write_line(&mut self, bytes: &[u8]) {
        self.write(bytes);
        self.write(b"\n");
    }
}
