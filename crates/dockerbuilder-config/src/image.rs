//! イメージ名とプッシュ先の組み立て

use crate::error::{ConfigError, Result};
use std::fmt;

/// `IMG_NAME` で渡される `name:tag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub name: String,
    pub tag: String,
}

impl ImageReference {
    /// 最初の `:` で名前とタグに分割
    ///
    /// # Examples
    /// - `myapp:git-abc123` -> `("myapp", "git-abc123")`
    /// - `myapp` -> エラー（タグなし）
    /// - `myapp:v1:extra` -> エラー（`:` が2つ）
    pub fn parse(image: &str) -> Result<Self> {
        let (name, tag) = image
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidImageName(image.to_string()))?;

        if name.is_empty() || tag.is_empty() || tag.contains(':') {
            return Err(ConfigError::InvalidImageName(image.to_string()));
        }

        validate_tag(tag)?;

        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// タグのバリデーション
///
/// Docker タグの制約:
/// - 128文字以下
/// - 英数字、ピリオド、ハイフン、アンダースコアのみ
/// - 先頭はピリオドまたはハイフンではない
fn validate_tag(tag: &str) -> Result<()> {
    if tag.len() > 128 {
        return Err(ConfigError::InvalidTag(format!(
            "Tag too long ({} characters, max 128)",
            tag.len()
        )));
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(ConfigError::InvalidTag(tag.to_string()));
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '.' && *c != '-' && *c != '_')
    {
        return Err(ConfigError::InvalidTag(format!(
            "Invalid character '{}' in tag: {}",
            c, tag
        )));
    }

    Ok(())
}

/// ビルド・プッシュ先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTarget {
    /// レジストリ prefix（空なら Docker Hub）
    pub prefix: String,
    pub image: ImageReference,
}

impl RegistryTarget {
    pub fn new(prefix: impl Into<String>, image: ImageReference) -> Self {
        Self {
            prefix: prefix.into(),
            image,
        }
    }

    /// タグなしのリポジトリ名 (`registry/org/name`)
    pub fn repository(&self) -> String {
        if self.prefix.is_empty() {
            self.image.name.clone()
        } else {
            format!("{}/{}", self.prefix, self.image.name)
        }
    }

    pub fn tag(&self) -> &str {
        &self.image.tag
    }

    /// ビルド時に付けるフルタグ
    pub fn full_tag(&self) -> String {
        format!("{}:{}", self.repository(), self.image.tag)
    }
}
