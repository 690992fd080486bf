//! 翻译管道集成测试
//!
//! 从收集到回写、再到还原的端到端流程

use std::rc::Rc;

use live_translate::translation::core::engine::{EngineConfig, PassTarget, TranslationEngine};
use live_translate::translation::pipeline::batch::pack_by;
use live_translate::translation::{
    Batcher, DisplayOptions, DomReflector, FragmentRegistry, MockMode, MockTranslator,
    TextCollector, TranslationCache, TranslationContext,
};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{test_config, AssertionHelper, TestEnvironment, TestPage};

const ARTICLE: &str = r#"<html><head><title>News</title></head><body>
<h1>  Breaking news  </h1>
<p title="summary">Hello <b>brave</b> new world</p>
<pre>fn main() {}</pre>
<ul><li>First item</li><li>Second item</li></ul>
<p>   </p>
<p>2024</p>
</body></html>"#;

/// 收集规则：空白和无字母文本、排除标签中的文本都不收集
#[test]
fn test_collect_example_leaves() {
    let page = TestPage::parse("<body><p>Hello</p><div>  </div><code>42</code><p>World!</p></body>");

    let fragments = TextCollector::new().collect(&page.root()).unwrap();
    let texts: Vec<&str> = fragments.iter().map(|f| f.normalized()).collect();
    assert_eq!(texts, vec!["Hello", "World!"]);
}

#[test]
fn test_pack_example() {
    let batches = pack_by(vec![4usize, 4, 4], 10, |len| *len);
    let groups: Vec<Vec<usize>> = batches.into_iter().map(|b| b.items).collect();
    assert_eq!(groups, vec![vec![4, 4], vec![4]]);
}

/// 任意长度序列打包后都不超过上限，除非是单独的超长项
#[test]
fn test_pack_never_exceeds_limit() {
    let mut seed: u64 = 42;
    for limit in [1usize, 5, 10, 64, 500] {
        let lengths: Vec<usize> = (0..200)
            .map(|_| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((seed >> 33) % 80) as usize
            })
            .collect();

        let batches = pack_by(lengths.clone(), limit, |len| *len);
        let flattened: Vec<usize> = batches.iter().flat_map(|b| b.items.clone()).collect();
        assert_eq!(flattened, lengths, "顺序和内容必须保持不变");

        for batch in &batches {
            assert!(
                batch.total_chars <= limit || batch.items.len() == 1,
                "上限 {} 下出现 {} 字符的多项批次",
                limit,
                batch.total_chars
            );
        }
    }
}

#[test]
fn test_batcher_counts_code_points() {
    let page = TestPage::parse("<p>héllo😀</p><p>naïve</p>");
    let mut registry = FragmentRegistry::new();
    let fragments = registry.register_all(TextCollector::new().collect(&page.root()).unwrap());

    let mut batcher = Batcher::new(11);
    let batches = batcher.pack(fragments);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].total_chars, 11);
}

#[tokio::test]
async fn test_start_translates_and_stop_restores_document() {
    let mut env = TestEnvironment::new(ARTICLE);
    let before = env.page.html();

    env.start().await;
    assert!(env.orchestrator.is_enabled());
    assert_eq!(env.page.text("h1", 0), "  Breaking news_fr  ");
    assert_eq!(env.page.text("li", 1), "Second item_fr");
    assert_eq!(env.page.text("pre", 0), "fn main() {}");
    assert_eq!(env.page.text("p", 2), "2024");

    // 默认显示原文悬停，原有属性被替换
    assert_eq!(
        env.page.attr("p", 0, "title").as_deref(),
        Some("Hello brave new world")
    );

    let restored = env.orchestrator.stop_auto_translation();
    assert!(restored > 0);
    assert!(!env.orchestrator.is_enabled());
    assert_eq!(env.page.html(), before);
    assert!(env.orchestrator.registry().is_empty());
    assert_eq!(env.orchestrator.cache().volatile_len(), 0);
}

#[tokio::test]
async fn test_identical_text_costs_one_request() {
    let mut env = TestEnvironment::new("<p>Same words</p><div><span>Same words</span></div>");
    env.start().await;

    assert_eq!(env.translator.call_count(), 1);
    assert_eq!(env.translator.sent_texts(), vec!["Same words"]);
    assert_eq!(env.page.text("p", 0), "Same words_fr");
    assert_eq!(env.page.text("span", 0), "Same words_fr");
}

#[tokio::test]
async fn test_context_round_trip_needs_no_new_requests() {
    let mut env = TestEnvironment::new("<p>Good morning</p><p>Good night</p>");
    env.start().await;
    assert_eq!(env.translator.call_count(), 1);

    let mut german = test_config();
    german.target_lang = "de".to_string();
    env.orchestrator.update_config(german).await.unwrap();
    assert_eq!(env.translator.call_count(), 2);
    assert_eq!(env.page.text("p", 0), "Good morning_de");

    env.orchestrator.update_config(test_config()).await.unwrap();
    assert_eq!(env.translator.call_count(), 2);
    assert_eq!(env.page.text("p", 0), "Good morning_fr");
    assert_eq!(env.page.text("p", 1), "Good night_fr");
}

#[tokio::test]
async fn test_display_change_reapplies_without_requests() {
    let mut env = TestEnvironment::new("<p title=\"keep\">Hello world</p>");
    env.start().await;

    let mut config = test_config();
    config.show_translation_inline = false;
    config.show_original_on_hover = false;
    config.show_translation_on_hover = true;
    env.orchestrator.update_config(config).await.unwrap();

    assert_eq!(env.translator.call_count(), 1);
    assert_eq!(env.page.text("p", 0), "Hello world");
    assert_eq!(env.page.attr("p", 0, "title").as_deref(), Some("Hello world_fr"));

    env.orchestrator.stop_auto_translation();
    assert_eq!(env.page.attr("p", 0, "title").as_deref(), Some("keep"));
}

/// 一个批次失败：另一个批次照常缓存和回写，整个过程报告错误
#[tokio::test]
async fn test_failed_batch_is_isolated() {
    let page = TestPage::parse("<p>Good text</p><p>boom here</p>");
    let mut registry = FragmentRegistry::new();
    let fragments = registry.register_all(TextCollector::new().collect(&page.root()).unwrap());

    let translator = MockTranslator::new(MockMode::FailOn("boom".to_string()));
    let config = EngineConfig {
        max_chars_per_batch: 10,
        ..EngineConfig::default()
    };
    let mut engine = TranslationEngine::new(Rc::new(translator.clone()), config);
    let context = TranslationContext::new("mock", "en", "fr");
    let mut cache = TranslationCache::new();
    let mut reflector = DomReflector::new();

    let result = engine
        .run_pass(
            &fragments,
            &context,
            PassTarget {
                registry: &registry,
                cache: &mut cache,
                reflector: &mut reflector,
                display: DisplayOptions {
                    inline: true,
                    original_on_hover: false,
                    translation_on_hover: false,
                },
            },
        )
        .await;

    AssertionHelper::assert_batch_failures(result, 1, 2);
    assert_eq!(translator.call_count(), 2);
    assert_eq!(page.text("p", 0), "Good text_fr");
    assert_eq!(page.text("p", 1), "boom here");
    assert_eq!(cache.peek(&fragments[0], &context), Some("Good text_fr"));
    assert_eq!(cache.peek(&fragments[1], &context), None);
    assert_eq!(engine.get_stats().batches_failed, 1);
}

#[tokio::test]
async fn test_start_survives_failing_initial_pass() {
    let translator = MockTranslator::new(MockMode::Error("offline".to_string()));
    let mut env = TestEnvironment::with_translator("<p>Hello</p>", test_config(), translator);

    env.start().await;
    assert!(env.orchestrator.is_enabled());
    assert_eq!(env.page.text("p", 0), "Hello");

    let err = env.orchestrator.retranslate().await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_target_language_text_is_left_alone() {
    let mut config = test_config();
    config.target_lang = "ja".to_string();
    let mut env = TestEnvironment::with_config("<p>こんにちは</p><p>Hello</p>", config);
    env.start().await;

    assert_eq!(env.translator.sent_texts(), vec!["Hello"]);
    assert_eq!(env.page.text("p", 0), "こんにちは");
}
