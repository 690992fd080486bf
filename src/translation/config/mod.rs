//! 翻译配置管理模块
//!
//! 提供配置文件、环境变量和默认值的统一管理，以及自动翻译站点白名单

pub mod allowlist;
pub mod manager;

// 重新导出主要类型
pub use allowlist::{normalize_origin, AutoTranslateUpdate, OriginAllowlist};
pub use manager::{ConfigManager, DisplayOptions, TranslationConfig};

/// 配置常量
pub mod constants {
    // 批次处理相关
    pub const DEFAULT_MAX_CHARS_PER_BATCH: usize = 5000;
    pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

    // 调度相关
    pub const DEFAULT_DEBOUNCE_MS: u64 = 250;
    pub const DEFAULT_VISIBILITY_MARGIN: f64 = 0.5;

    // 重试相关
    pub const DEFAULT_MAX_RETRY_ATTEMPTS: usize = 3;
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
    pub const MAX_RETRY_ATTEMPTS: usize = 10;
    pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

    // 默认语言设置
    pub const DEFAULT_PROVIDER: &str = "deeplx";
    pub const DEFAULT_SOURCE_LANG: &str = "auto";
    pub const DEFAULT_TARGET_LANG: &str = "zh";

    // 持久化缓存键前缀
    pub const PERSISTENT_KEY_PREFIX: &str = "trans";

    // 白名单在会话存储中的键
    pub const ALLOWLIST_KEY: &str = "live-translate:auto-translate-pages";

    // 悬停注释写入的属性
    pub const HOVER_ATTR: &str = "title";

    // 不翻译其中文本的元素（脚本、样式、代码、原始输入）
    pub const EXCLUDED_TAGS: &[&str] = &[
        "script", "style", "noscript", "code", "pre", "kbd", "samp", "var", "textarea", "input",
    ];

    // 行内元素，不作为父分组
    pub const INLINE_TAGS: &[&str] = &[
        "a", "abbr", "b", "bdi", "bdo", "cite", "data", "dfn", "em", "font", "i", "label", "mark",
        "q", "s", "small", "span", "strong", "sub", "sup", "time", "u",
    ];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "live-translate.toml",
        ".live-translate.toml",
        "live-translate.json",
        "~/.config/live-translate/config.toml",
        "/etc/live-translate/config.toml",
    ];
}

/// 是否存在任一配置文件
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}

/// 加载配置，失败时回退到默认配置
pub fn load_translation_config() -> TranslationConfig {
    match ConfigManager::new() {
        Ok(manager) => manager.get_config().clone(),
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            TranslationConfig::default()
        }
    }
}
