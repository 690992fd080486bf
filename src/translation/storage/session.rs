//! 会话存储
//!
//! 持久化缓存层和白名单都通过 [`SessionStore`] 访问外部的会话级键值存储。
//! 存储不需要事务保证，写入失败由调用方决定是否吞掉。

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::translation::error::{TranslationError, TranslationResult};

/// 会话级键值存储
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> TranslationResult<()>;
}

/// 内存会话存储
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> TranslationResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// 以 JSON 文件保存的会话存储
///
/// 每次写入都会重写整个文件。
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    entries: RefCell<HashMap<String, String>>,
}

impl FileSessionStore {
    /// 打开存储文件，不存在时从空存储开始
    pub fn open<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            HashMap::new()
        };

        tracing::debug!("打开会话存储 {} ({} 条)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(&self) -> TranslationResult<()> {
        let content = serde_json::to_string_pretty(&*self.entries.borrow())?;
        std::fs::write(&self.path, content).map_err(|e| {
            TranslationError::Persistence(format!("写入 {} 失败: {}", self.path.display(), e))
        })
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> TranslationResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.write_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert!(store.get("k").is_none());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileSessionStore::open(&path).unwrap();
        store.set("trans:abc:def", "你好").unwrap();
        drop(store);

        let reopened = FileSessionStore::open(&path).unwrap();
        assert_eq!(reopened.get("trans:abc:def").as_deref(), Some("你好"));
    }

    #[test]
    fn test_file_store_write_failure_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path().join("missing").join("session.json")).unwrap();
        assert!(matches!(
            store.set("k", "v"),
            Err(TranslationError::Persistence(_))
        ));
    }
}
