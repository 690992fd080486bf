//! 自动翻译站点白名单
//!
//! 站点按 origin（协议 + 主机 + 端口）归一化存储，可选地持久化到会话存储

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use url::Url;

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::storage::session::SessionStore;

/// 白名单更新请求
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AutoTranslateUpdate {
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub disabled: Vec<String>,
}

/// 将 URL 归一化为 origin
///
/// 没有协议的输入按 `https://` 处理；不透明 origin（如 `data:`）会被拒绝。
pub fn normalize_origin(input: &str) -> TranslationResult<String> {
    let trimmed = input.trim();
    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{}", trimmed))?,
        Err(e) => return Err(e.into()),
    };

    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(TranslationError::Parse(format!("无法确定站点来源: {}", input)));
    }

    Ok(origin.ascii_serialization())
}

/// 按 origin 归一化的白名单
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginAllowlist {
    origins: BTreeSet<String>,
}

impl OriginAllowlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 URL 列表创建，无效项记录警告后跳过
    pub fn from_pages(pages: &[String]) -> Self {
        let mut allowlist = Self::new();
        allowlist.apply(&AutoTranslateUpdate {
            enabled: pages.to_vec(),
            disabled: Vec::new(),
        });
        allowlist
    }

    /// 应用更新：先加入 enabled，再移除 disabled
    ///
    /// 返回被跳过的无效条目数量。
    pub fn apply(&mut self, update: &AutoTranslateUpdate) -> usize {
        let mut skipped = 0;

        for page in &update.enabled {
            match normalize_origin(page) {
                Ok(origin) => {
                    self.origins.insert(origin);
                }
                Err(e) => {
                    tracing::warn!("跳过无效的自动翻译站点 {}: {}", page, e);
                    skipped += 1;
                }
            }
        }

        for page in &update.disabled {
            match normalize_origin(page) {
                Ok(origin) => {
                    self.origins.remove(&origin);
                }
                Err(e) => {
                    tracing::warn!("跳过无效的自动翻译站点 {}: {}", page, e);
                    skipped += 1;
                }
            }
        }

        skipped
    }

    /// URL 所在站点是否在白名单中
    pub fn contains(&self, url: &str) -> bool {
        normalize_origin(url)
            .map(|origin| self.origins.contains(&origin))
            .unwrap_or(false)
    }

    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.origins.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// 合并会话存储中保存的白名单
    pub fn load(&mut self, store: &dyn SessionStore) -> TranslationResult<()> {
        if let Some(raw) = store.get(constants::ALLOWLIST_KEY) {
            let saved: Vec<String> = serde_json::from_str(&raw)?;
            self.origins.extend(saved);
        }
        Ok(())
    }

    /// 保存到会话存储
    pub fn save(&self, store: &dyn SessionStore) -> TranslationResult<()> {
        let raw = serde_json::to_string(&self.origins)?;
        store.set(constants::ALLOWLIST_KEY, &raw)
    }
}
