//! 缓存系统集成测试
//!
//! 易失层、按内容哈希的持久层以及持久层失败时的行为

use std::rc::Rc;

use live_translate::translation::storage::cache::persistent_key;
use live_translate::translation::{
    FileSessionStore, MemorySessionStore, SessionStore, TranslationContext,
};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{test_config, FailingStore, TestEnvironment};

#[tokio::test]
async fn test_persistent_entries_use_content_hash_keys() {
    let store = Rc::new(MemorySessionStore::new());
    let mut env = TestEnvironment::with_store("<p>Hello world</p>", test_config(), store.clone());
    env.start().await;

    let context = TranslationContext::new("mock", "en", "fr");
    let key = persistent_key("Hello world", &context);
    assert!(key.starts_with(&format!("trans:{}:", context.id())));
    assert_eq!(store.get(&key).as_deref(), Some("Hello world_fr"));
    assert_eq!(env.orchestrator.cache().get_stats().persistent_writes, 1);
}

/// 同一会话存储上的第二个文档不再请求翻译服务
#[tokio::test]
async fn test_session_store_shared_between_documents() {
    let store: Rc<dyn SessionStore> = Rc::new(MemorySessionStore::new());

    let mut first = TestEnvironment::with_store("<p>Shared sentence</p>", test_config(), store.clone());
    first.start().await;
    assert_eq!(first.translator.call_count(), 1);

    let mut second =
        TestEnvironment::with_store("<div>Shared sentence</div>", test_config(), store);
    second.start().await;
    assert_eq!(second.translator.call_count(), 0);
    assert_eq!(second.page.text("div", 0), "Shared sentence_fr");

    let stats = second.orchestrator.cache().get_stats();
    assert_eq!(stats.persistent_hits, 1);
    assert_eq!(stats.misses, 0);
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    {
        let store = Rc::new(FileSessionStore::open(&path).unwrap());
        let mut env = TestEnvironment::with_store("<p>Persistent text</p>", test_config(), store);
        env.start().await;
        env.orchestrator.stop_auto_translation();
        assert_eq!(env.translator.call_count(), 1);
    }

    let store = Rc::new(FileSessionStore::open(&path).unwrap());
    let mut env = TestEnvironment::with_store("<p>Persistent text</p>", test_config(), store);
    env.start().await;
    assert_eq!(env.translator.call_count(), 0);
    assert_eq!(env.page.text("p", 0), "Persistent text_fr");
}

#[tokio::test]
async fn test_disabled_persistence_writes_nothing() {
    let store = Rc::new(MemorySessionStore::new());
    let mut config = test_config();
    config.persistent_cache_enabled = false;

    let mut env = TestEnvironment::with_store("<p>Hello world</p>", config, store.clone());
    env.start().await;

    assert_eq!(env.page.text("p", 0), "Hello world_fr");
    assert!(store.is_empty());
    assert_eq!(env.orchestrator.cache().pending_writes(), 0);
}

/// 持久层写入失败不影响翻译结果，也不向外报告错误
#[tokio::test]
async fn test_failing_store_is_swallowed() {
    let mut env = TestEnvironment::with_store(
        "<p>First line</p><p>Second line</p>",
        test_config(),
        Rc::new(FailingStore),
    );
    env.start().await;

    assert_eq!(env.page.text("p", 0), "First line_fr");
    assert_eq!(env.page.text("p", 1), "Second line_fr");

    let summary = env.orchestrator.retranslate().await.unwrap();
    assert_eq!(summary.cache_hits, 2);
    assert_eq!(summary.persisted, 0);

    let stats = env.orchestrator.cache().get_stats();
    assert_eq!(stats.persistence_failures, 2);
    assert_eq!(stats.persistent_writes, 0);
}

#[tokio::test]
async fn test_stop_clears_volatile_tier_only() {
    let store = Rc::new(MemorySessionStore::new());
    let mut env = TestEnvironment::with_store("<p>Hello world</p>", test_config(), store.clone());
    env.start().await;
    assert_eq!(env.orchestrator.cache().volatile_len(), 1);

    env.orchestrator.stop_auto_translation();
    assert_eq!(env.orchestrator.cache().volatile_len(), 0);
    assert_eq!(store.len(), 1);

    // 重新启动时由持久层提供译文
    env.start().await;
    assert_eq!(env.translator.call_count(), 1);
    assert_eq!(env.page.text("p", 0), "Hello world_fr");
}

/// 切换上下文后，旧上下文的条目不会被读到
#[tokio::test]
async fn test_contexts_do_not_share_entries() {
    let store = Rc::new(MemorySessionStore::new());
    let mut env = TestEnvironment::with_store("<p>Hello world</p>", test_config(), store.clone());
    env.start().await;

    let mut config = test_config();
    config.provider = "other".to_string();
    env.orchestrator.update_config(config).await.unwrap();

    assert_eq!(env.translator.call_count(), 2);
    assert_eq!(store.len(), 2);
}
