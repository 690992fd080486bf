// 集成测试公共模块
//
// 提供测试页面、测试环境和断言辅助工具

use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData, RcDom};

use live_translate::parsers::html::dom::{find_nodes, get_node_attr, html_to_dom, walk_tree};
use live_translate::parsers::html::serializer::serialize_document;
use live_translate::translation::{
    ManualChangeSource, ManualVisibilitySource, MockMode, MockTranslator, Orchestrator,
    SessionStore, TranslationConfig, TranslationError, TranslationResult,
};

/// 测试页面
pub struct TestPage {
    pub dom: RcDom,
}

impl TestPage {
    pub fn parse(html: &str) -> Self {
        let dom = html_to_dom(html.as_bytes(), "utf-8").expect("测试 HTML 应当可以解析");
        Self { dom }
    }

    pub fn root(&self) -> Handle {
        self.dom.document.clone()
    }

    /// 第 `index` 个 `tag` 元素
    pub fn element(&self, tag: &str, index: usize) -> Handle {
        find_nodes(&self.dom.document, &[tag])
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("页面中没有第 {} 个 <{}>", index, tag))
    }

    /// 元素的完整文本内容
    pub fn text(&self, tag: &str, index: usize) -> String {
        text_content(&self.element(tag, index))
    }

    pub fn attr(&self, tag: &str, index: usize, name: &str) -> Option<String> {
        get_node_attr(&self.element(tag, index), name)
    }

    /// 序列化后的整个文档
    pub fn html(&self) -> String {
        let bytes = serialize_document(&self.dom.document, "utf-8").expect("序列化不应失败");
        String::from_utf8(bytes).expect("序列化结果应为 UTF-8")
    }
}

/// 子树中所有文本节点的拼接
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    walk_tree(node, &mut |n| {
        if let NodeData::Text { contents } = &n.data {
            text.push_str(&contents.borrow());
        }
    });
    text
}

/// 测试用配置：英语 → 法语，模拟服务
pub fn test_config() -> TranslationConfig {
    let mut config = TranslationConfig::default_with_lang("fr", Some("en"));
    config.provider = "mock".to_string();
    config
}

/// 测试环境：页面 + 编排器 + 可在外部驱动的模拟组件
pub struct TestEnvironment {
    pub page: TestPage,
    pub translator: MockTranslator,
    pub changes: ManualChangeSource,
    pub visibility: ManualVisibilitySource,
    pub orchestrator: Orchestrator,
}

impl TestEnvironment {
    pub fn new(html: &str) -> Self {
        Self::with_config(html, test_config())
    }

    pub fn with_config(html: &str, config: TranslationConfig) -> Self {
        Self::build(html, config, MockTranslator::new(MockMode::Suffix), None)
    }

    pub fn with_translator(html: &str, config: TranslationConfig, translator: MockTranslator) -> Self {
        Self::build(html, config, translator, None)
    }

    pub fn with_store(html: &str, config: TranslationConfig, store: Rc<dyn SessionStore>) -> Self {
        Self::build(html, config, MockTranslator::new(MockMode::Suffix), Some(store))
    }

    fn build(
        html: &str,
        config: TranslationConfig,
        translator: MockTranslator,
        store: Option<Rc<dyn SessionStore>>,
    ) -> Self {
        let page = TestPage::parse(html);
        let changes = ManualChangeSource::new();
        let visibility = ManualVisibilitySource::new();

        let mut orchestrator = Orchestrator::new(
            page.root(),
            config,
            Rc::new(translator.clone()),
            Box::new(changes.clone()),
            Box::new(visibility.clone()),
        )
        .expect("测试配置应当有效");

        if let Some(store) = store {
            orchestrator = orchestrator
                .with_session_store(store)
                .expect("会话存储应当可用");
        }

        Self {
            page,
            translator,
            changes,
            visibility,
            orchestrator,
        }
    }

    pub async fn start(&mut self) {
        self.orchestrator
            .start_auto_translation()
            .await
            .expect("启动自动翻译不应失败");
    }
}

/// 始终写入失败的会话存储
#[derive(Default)]
pub struct FailingStore;

impl SessionStore for FailingStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, key: &str, _value: &str) -> TranslationResult<()> {
        Err(TranslationError::Persistence(format!("存储已满: {}", key)))
    }
}

/// 断言辅助工具
pub struct AssertionHelper;

impl AssertionHelper {
    /// 断言结果是包含指定失败数的批次失败
    pub fn assert_batch_failures<T: std::fmt::Debug>(
        result: TranslationResult<T>,
        expected_failed: usize,
        expected_total: usize,
    ) {
        match result {
            Err(TranslationError::BatchFailures { failed, total, .. }) => {
                assert_eq!(failed, expected_failed, "失败批次数");
                assert_eq!(total, expected_total, "批次总数");
            }
            other => panic!("期望批次失败，得到 {:?}", other),
        }
    }
}
