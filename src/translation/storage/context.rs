//! 翻译上下文
//!
//! `(provider, source_lang, target_lang)` 三元组及其稳定的哈希标识。
//! 所有缓存读写都以上下文标识为键，切换上下文后迟到的响应只会写入不再被读取的条目。

use std::fmt;

use blake3::Hasher;

/// 上下文标识（blake3 摘要的前 16 个十六进制字符）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(String);

impl ContextId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 翻译上下文
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationContext {
    pub provider: String,
    pub source_lang: String,
    pub target_lang: String,
    id: ContextId,
}

impl TranslationContext {
    pub fn new(provider: &str, source_lang: &str, target_lang: &str) -> Self {
        let mut hasher = Hasher::new();
        // 用分隔符避免 ("ab", "c") 与 ("a", "bc") 碰撞
        for part in [provider, source_lang, target_lang] {
            hasher.update(part.as_bytes());
            hasher.update(&[0]);
        }
        let digest = hasher.finalize().to_hex();

        Self {
            provider: provider.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            id: ContextId(digest.as_str()[..16].to_string()),
        }
    }

    pub fn id(&self) -> &ContextId {
        &self.id
    }
}

impl fmt::Display for TranslationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{} ({})",
            self.provider, self.source_lang, self.target_lang, self.id
        )
    }
}
