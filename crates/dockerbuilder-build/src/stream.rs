//! ビルド・プッシュの進捗ストリーム
//!
//! Docker Engine の進捗は通常 JSON オブジェクトとしてデコード済みで届きますが、
//! エラー応答などは未デコードのバイト列として届くことがあります。
//! 未デコードのチャンクはスキーマに沿って厳密に解析し、解釈できないものはエラーとして扱います。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// エンジンから届く 1 チャンク
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// 未デコードのペイロード
    Raw(Vec<u8>),
    Decoded(ProgressMessage),
    /// 通信エラーなど、エンジンクライアント側の失敗
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 進捗メッセージ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// ビルドログのテキスト
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        default,
        rename = "errorDetail",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_detail: Option<ErrorDetail>,
    /// Engine API のエラー応答 (`{"message": "..."}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressMessage {
    pub fn text(stream: impl Into<String>) -> Self {
        Self {
            stream: Some(stream.into()),
            ..Default::default()
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// エラー内容（テキストより優先）
    pub fn error_message(&self) -> Option<String> {
        self.error
            .clone()
            .or_else(|| self.error_detail.as_ref().and_then(|d| d.message.clone()))
            .or_else(|| self.message.clone())
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<bollard::errors::Error> for StreamChunk {
    fn from(error: bollard::errors::Error) -> Self {
        match error {
            // エラー応答の本文は未デコードのまま解釈に回す
            bollard::errors::Error::DockerResponseServerError { message, .. } => {
                StreamChunk::Raw(message.into_bytes())
            }
            other => StreamChunk::Failed(other.to_string()),
        }
    }
}

/// 1 チャンクを解析した結果
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Error(String),
    Progress(ProgressMessage),
}

impl From<StreamChunk> for ProgressEvent {
    fn from(chunk: StreamChunk) -> Self {
        match chunk {
            StreamChunk::Raw(bytes) => match decode_raw(&bytes) {
                Ok(message) => Self::from_message(message),
                Err(reason) => {
                    tracing::debug!("Unrecognized stream payload: {}", reason);
                    ProgressEvent::Error(String::from_utf8_lossy(&bytes).trim_end().to_string())
                }
            },
            StreamChunk::Decoded(message) => Self::from_message(message),
            StreamChunk::Failed(message) => ProgressEvent::Error(message),
        }
    }
}

impl ProgressEvent {
    fn from_message(message: ProgressMessage) -> Self {
        match message.error_message() {
            Some(error) => ProgressEvent::Error(error),
            None => ProgressEvent::Progress(message),
        }
    }
}

/// 未デコードのペイロードを厳密に解析
///
/// JSON オブジェクトで、既知のフィールドを 1 つ以上含む場合のみ受け付ける
pub fn decode_raw(bytes: &[u8]) -> Result<ProgressMessage, String> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("payload is not a JSON object".to_string());
    }

    let message: ProgressMessage = serde_json::from_value(value).map_err(|e| e.to_string())?;
    if message.is_empty() {
        return Err("payload has no known fields".to_string());
    }

    Ok(message)
}
