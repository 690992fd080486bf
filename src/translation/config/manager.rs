//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::storage::context::TranslationContext;

/// 翻译配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 翻译上下文
    pub provider: String,
    pub source_lang: String,
    pub target_lang: String,

    // 显示方式
    pub traffic_save_mode: bool,
    pub show_translation_inline: bool,
    pub show_original_on_hover: bool,
    pub show_translation_on_hover: bool,

    /// 自动翻译的站点（按 origin 归一化）
    pub always_translate_pages: Vec<String>,

    // 批次与调度
    pub max_chars_per_batch: usize,
    pub debounce_ms: u64,
    pub visibility_margin: f64,
    pub max_concurrent_requests: usize,

    // 缓存
    pub persistent_cache_enabled: bool,

    // 重试
    pub retry_enabled: bool,
    pub max_retry_attempts: usize,
    pub retry_delay_ms: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: constants::DEFAULT_PROVIDER.to_string(),
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),

            traffic_save_mode: false,
            show_translation_inline: true,
            show_original_on_hover: true,
            show_translation_on_hover: false,

            always_translate_pages: Vec::new(),

            max_chars_per_batch: constants::DEFAULT_MAX_CHARS_PER_BATCH,
            debounce_ms: constants::DEFAULT_DEBOUNCE_MS,
            visibility_margin: constants::DEFAULT_VISIBILITY_MARGIN,
            max_concurrent_requests: constants::DEFAULT_MAX_CONCURRENT_REQUESTS,

            persistent_cache_enabled: true,

            retry_enabled: false,
            max_retry_attempts: constants::DEFAULT_MAX_RETRY_ATTEMPTS,
            retry_delay_ms: constants::DEFAULT_RETRY_DELAY_MS,
        }
    }
}

/// 翻译结果的显示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub inline: bool,
    pub original_on_hover: bool,
    pub translation_on_hover: bool,
}

impl DisplayOptions {
    /// 是否需要写入悬停注释
    pub fn has_hover(&self) -> bool {
        self.original_on_hover || self.translation_on_hover
    }
}

impl TranslationConfig {
    /// 创建带指定语言的默认配置
    pub fn default_with_lang(target_lang: &str, source_lang: Option<&str>) -> Self {
        let mut config = Self::default();
        config.target_lang = target_lang.to_string();
        if let Some(source) = source_lang {
            config.source_lang = source.to_string();
        }
        config
    }

    /// 当前配置对应的翻译上下文
    pub fn context(&self) -> TranslationContext {
        TranslationContext::new(&self.provider, &self.source_lang, &self.target_lang)
    }

    /// 当前配置对应的显示方式
    pub fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            inline: self.show_translation_inline,
            original_on_hover: self.show_original_on_hover,
            translation_on_hover: self.show_translation_on_hover,
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.provider.trim().is_empty() {
            return Err(TranslationError::Config("翻译服务提供方不能为空".to_string()));
        }

        if self.target_lang.trim().is_empty() {
            return Err(TranslationError::Config("目标语言不能为空".to_string()));
        }

        if self.max_chars_per_batch == 0 {
            return Err(TranslationError::Config("批次字符上限不能为0".to_string()));
        }

        if self.max_concurrent_requests == 0 {
            return Err(TranslationError::Config("最大并发数不能为0".to_string()));
        }

        if !(0.0..=10.0).contains(&self.visibility_margin) {
            return Err(TranslationError::Config(format!(
                "可见性预加载边距超出范围: {}",
                self.visibility_margin
            )));
        }

        if self.retry_enabled && self.max_retry_attempts == 0 {
            return Err(TranslationError::Config("启用重试时重试次数不能为0".to_string()));
        }

        if self.max_retry_attempts > constants::MAX_RETRY_ATTEMPTS {
            return Err(TranslationError::Config(format!(
                "重试次数不能超过 {}: {}",
                constants::MAX_RETRY_ATTEMPTS,
                self.max_retry_attempts
            )));
        }

        Ok(())
    }

    /// 应用环境变量覆盖（使用类型安全环境变量系统）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, translation, EnvVar};

        macro_rules! override_with {
            ($var:ty, $apply:expr) => {
                match <$var>::get_explicit() {
                    Some(Ok(value)) => $apply(value),
                    Some(Err(e)) => tracing::warn!("忽略无效的环境变量: {}", e),
                    None => {}
                }
            };
        }

        override_with!(translation::Provider, |v| self.provider = v);
        override_with!(translation::SourceLang, |v| self.source_lang = v);
        override_with!(translation::TargetLang, |v| {
            self.target_lang = v;
            tracing::info!("环境变量覆盖目标语言: {}", self.target_lang);
        });
        override_with!(translation::TrafficSaveMode, |v| self.traffic_save_mode = v);
        override_with!(translation::MaxCharsPerBatch, |v| self.max_chars_per_batch = v);
        override_with!(translation::Debounce, |v: Duration| {
            self.debounce_ms = v.as_millis() as u64
        });
        override_with!(translation::MaxConcurrentRequests, |v| {
            self.max_concurrent_requests = v
        });
        override_with!(cache::PersistentEnabled, |v| self.persistent_cache_enabled = v);
    }

    /// 防抖窗口
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: TranslationConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> TranslationResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 使用已有配置创建（不读取文件和环境变量）
    pub fn with_config(config: TranslationConfig) -> TranslationResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 查找并加载配置文件
    fn load_config() -> TranslationResult<TranslationConfig> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(TranslationConfig::default())
    }

    /// 从指定文件加载配置（TOML 或 JSON）
    pub fn load_from_file(path: &str) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::Config(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".toml") {
            toml::from_str(&content)
                .map_err(|e| TranslationError::Config(format!("解析TOML配置失败: {}", e)))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::Config(format!("解析JSON配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::Config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
