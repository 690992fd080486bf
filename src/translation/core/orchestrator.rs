//! 自动翻译编排器
//!
//! 一个编排器只服务一个文档上下文，独占该文档的片段注册表、缓存、回写器和两个观察器。
//! 所有状态只在页面所在的单线程上修改；挂起点只有翻译服务调用和持久层写入。
//!
//! ```text
//! Idle ──start_auto_translation──▶ Active
//!   ▲                                 │
//!   └──────stop_auto_translation──────┘
//! ```
//!
//! 活动期间，结构变化和可见性通知把片段标记为脏，防抖窗口结束后对脏集合执行恰好一次翻译过程。

use std::collections::HashSet;
use std::rc::Rc;

use markup5ever_rcdom::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, Instant};

use crate::translation::config::{normalize_origin, AutoTranslateUpdate, OriginAllowlist, TranslationConfig};
use crate::translation::core::engine::{EngineConfig, EngineStats, PassSummary, PassTarget, TranslationEngine};
use crate::translation::core::reflector::DomReflector;
use crate::translation::core::translator::Translator;
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::observe::change::{ChangeSource, ChangeWatcher, MutationRecord};
use crate::translation::observe::scheduler::PassScheduler;
use crate::translation::observe::visibility::{RootMargin, VisibilitySource, VisibilityWatcher};
use crate::translation::pipeline::collector::TextCollector;
use crate::translation::pipeline::fragment::{FragmentRef, FragmentRegistry, NodeKey};
use crate::translation::storage::cache::TranslationCache;
use crate::translation::storage::context::TranslationContext;
use crate::translation::storage::session::{MemorySessionStore, SessionStore};

/// 引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Active,
}

/// 发给运行中编排器的命令
#[derive(Debug, Clone)]
pub enum ControlCommand {
    Stop,
    UpdateConfig(TranslationConfig),
}

/// 运行中编排器的控制句柄
#[derive(Debug, Clone)]
pub struct ControlHandle {
    sender: UnboundedSender<ControlCommand>,
}

impl ControlHandle {
    /// 请求停止；编排器已退出时返回 false
    pub fn stop(&self) -> bool {
        self.sender.send(ControlCommand::Stop).is_ok()
    }

    pub fn update_config(&self, config: TranslationConfig) -> bool {
        self.sender.send(ControlCommand::UpdateConfig(config)).is_ok()
    }
}

/// 自动翻译编排器
pub struct Orchestrator {
    root: Handle,
    config: TranslationConfig,
    context: TranslationContext,
    state: EngineState,
    collector: TextCollector,
    registry: FragmentRegistry,
    cache: TranslationCache,
    reflector: DomReflector,
    engine: TranslationEngine,
    changes: ChangeWatcher,
    visibility: VisibilityWatcher,
    scheduler: PassScheduler,
    allowlist: OriginAllowlist,
    session: Rc<dyn SessionStore>,
    control: Option<UnboundedReceiver<ControlCommand>>,
}

impl Orchestrator {
    /// 为一个文档根节点创建编排器
    ///
    /// 会话存储默认是进程内存储，按内容哈希的缓存层因此在同一会话中始终可用。
    pub fn new(
        root: Handle,
        config: TranslationConfig,
        translator: Rc<dyn Translator>,
        changes: Box<dyn ChangeSource>,
        visibility: Box<dyn VisibilitySource>,
    ) -> TranslationResult<Self> {
        config.validate()?;

        let session: Rc<dyn SessionStore> = Rc::new(MemorySessionStore::new());
        let margin = RootMargin {
            viewport_ratio: config.visibility_margin,
        };

        Ok(Self {
            root,
            context: config.context(),
            state: EngineState::Idle,
            collector: TextCollector::new(),
            registry: FragmentRegistry::new(),
            cache: TranslationCache::with_store(session.clone(), config.persistent_cache_enabled),
            reflector: DomReflector::new(),
            engine: TranslationEngine::new(translator, EngineConfig::from_config(&config)),
            changes: ChangeWatcher::new(changes),
            visibility: VisibilityWatcher::new(visibility, margin),
            scheduler: PassScheduler::new(config.debounce()),
            allowlist: OriginAllowlist::from_pages(&config.always_translate_pages),
            session,
            control: None,
            config,
        })
    }

    /// 使用外部会话存储（持久缓存层和白名单）
    ///
    /// 只能在启动前调用；存储中已保存的白名单会合并进来。
    pub fn with_session_store(mut self, store: Rc<dyn SessionStore>) -> TranslationResult<Self> {
        if self.is_enabled() {
            return Err(TranslationError::Internal(
                "自动翻译运行中不能更换会话存储".to_string(),
            ));
        }

        self.allowlist.load(store.as_ref())?;
        self.cache = TranslationCache::with_store(store.clone(), self.config.persistent_cache_enabled);
        self.session = store;
        Ok(self)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == EngineState::Active
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn context(&self) -> &TranslationContext {
        &self.context
    }

    pub fn registry(&self) -> &FragmentRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn reflector(&self) -> &DomReflector {
        &self.reflector
    }

    pub fn engine_stats(&self) -> &EngineStats {
        self.engine.get_stats()
    }

    pub fn allowlist(&self) -> &OriginAllowlist {
        &self.allowlist
    }

    /// 等待执行的脏片段数
    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    /// 下一次翻译过程的截止时间
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// 启动自动翻译
    ///
    /// 收集或订阅失败时返回错误并保持 Idle；初始翻译过程失败只记录日志。
    pub async fn start_auto_translation(&mut self) -> TranslationResult<()> {
        if self.is_enabled() {
            tracing::debug!("自动翻译已在运行");
            return Ok(());
        }

        let fragments = self.collector.collect(&self.root).map_err(|e| {
            tracing::error!("启动自动翻译失败: {}", e);
            e
        })?;

        if let Err(e) = self.changes.start(&self.root) {
            tracing::error!("订阅结构变化失败: {}", e);
            return Err(e);
        }

        if self.config.traffic_save_mode {
            if let Err(e) = self.visibility.start() {
                tracing::error!("订阅可见性变化失败: {}", e);
                self.changes.stop();
                return Err(e);
            }
        }

        let registered = self.registry.register_all(fragments);
        self.state = EngineState::Active;
        tracing::info!(
            "自动翻译已启动: {} 个片段，{}{}",
            registered.len(),
            self.context,
            if self.config.traffic_save_mode { "，节省流量模式" } else { "" }
        );

        let relevant = if self.config.traffic_save_mode {
            self.visibility.watch(&registered)
        } else {
            registered
        };

        if !relevant.is_empty() {
            if let Err(e) = self.translate(&relevant).await {
                tracing::warn!("初始翻译未完全成功: {}", e);
            }
        }

        Ok(())
    }

    /// 停止自动翻译并还原所有改动，返回还原的片段数
    pub fn stop_auto_translation(&mut self) -> usize {
        if !self.is_enabled() {
            return 0;
        }

        let restored = self.reflector.restore_all();
        self.changes.stop();
        self.visibility.unwatch();
        self.scheduler.clear();
        self.registry.clear();
        self.cache.clear_volatile();
        self.cache.flush_persistent();
        self.state = EngineState::Idle;

        tracing::info!("自动翻译已停止，还原 {} 个片段", restored);
        restored
    }

    /// 更新配置
    ///
    /// 运行中切换上下文或显示方式时，先还原已回写的片段，再对当前相关片段重新翻译和回写；
    /// 切换节省流量模式会重启引擎。
    pub async fn update_config(&mut self, config: TranslationConfig) -> TranslationResult<()> {
        config.validate()?;

        let previous = std::mem::replace(&mut self.config, config);
        self.engine.set_config(EngineConfig::from_config(&self.config));
        self.scheduler.set_debounce(self.config.debounce());
        self.visibility.set_margin(RootMargin {
            viewport_ratio: self.config.visibility_margin,
        });
        self.cache.set_persistent_enabled(self.config.persistent_cache_enabled);
        if previous.always_translate_pages != self.config.always_translate_pages {
            let kept: HashSet<String> = self
                .config
                .always_translate_pages
                .iter()
                .filter_map(|page| normalize_origin(page).ok())
                .collect();
            let disabled = previous
                .always_translate_pages
                .iter()
                .filter(|page| matches!(normalize_origin(page), Ok(origin) if !kept.contains(&origin)))
                .cloned()
                .collect();

            self.allowlist.apply(&AutoTranslateUpdate {
                enabled: self.config.always_translate_pages.clone(),
                disabled,
            });
            self.save_allowlist();
        }

        let context = self.config.context();
        let context_changed = context != self.context;
        self.context = context;

        if !self.is_enabled() {
            return Ok(());
        }

        if previous.traffic_save_mode != self.config.traffic_save_mode {
            tracing::info!("节省流量模式已切换，重启自动翻译");
            self.stop_auto_translation();
            return self.start_auto_translation().await;
        }

        let display_changed = previous.display_options() != self.config.display_options();
        if context_changed || display_changed {
            tracing::info!("翻译上下文已切换: {}", self.context);
            self.reflector.restore_all();
            let relevant = self.relevant_fragments();
            self.translate(&relevant).await?;
        }

        Ok(())
    }

    /// 对当前相关片段显式执行一次翻译过程
    pub async fn retranslate(&mut self) -> TranslationResult<PassSummary> {
        if !self.is_enabled() {
            return Err(TranslationError::Internal("自动翻译未启动".to_string()));
        }

        let relevant = self.relevant_fragments();
        self.translate(&relevant).await
    }

    /// 当前相关的片段：全部片段，节省流量模式下只有已进入可见范围的分组
    fn relevant_fragments(&self) -> Vec<FragmentRef> {
        if self.config.traffic_save_mode {
            self.visibility.visible_fragments(&self.registry)
        } else {
            self.registry.all()
        }
    }

    async fn translate(&mut self, fragments: &[FragmentRef]) -> TranslationResult<PassSummary> {
        let display = self.config.display_options();
        self.engine
            .run_pass(
                fragments,
                &self.context,
                PassTarget {
                    registry: &self.registry,
                    cache: &mut self.cache,
                    reflector: &mut self.reflector,
                    display,
                },
            )
            .await
    }

    /// 取出所有已到达的通知并标记脏片段，返回标记的片段数
    pub fn process_notifications(&mut self) -> usize {
        let mut dirty = Vec::new();

        while let Some(records) = self.changes.try_next() {
            dirty.extend(self.handle_changes(records));
        }
        while let Some(elements) = self.visibility.try_next() {
            dirty.extend(self.visibility.process(elements, &self.registry));
        }

        let count = dirty.len();
        self.scheduler.mark_dirty(dirty, Instant::now());
        count
    }

    /// 处理一批结构变化，返回需要翻译的片段
    fn handle_changes(&mut self, records: Vec<MutationRecord>) -> Vec<FragmentRef> {
        let outcome = self.changes.process(records, &mut self.registry);

        if !outcome.removed.is_empty() {
            self.reflector.restore(&outcome.removed);

            let keys: Vec<NodeKey> = outcome.removed.iter().map(|f| f.key()).collect();
            self.cache.forget_nodes(&keys);
            self.scheduler.discard(&keys);
            if self.config.traffic_save_mode {
                self.visibility.forget(&outcome.removed, &self.registry);
            }
            self.refresh_groups(&outcome.removed);
        }

        if self.config.traffic_save_mode {
            self.visibility.watch(&outcome.added)
        } else {
            outcome.added
        }
    }

    /// 移除片段后，重建仍在文档中的分组的悬停注释
    fn refresh_groups(&mut self, removed: &[FragmentRef]) {
        if !self.config.display_options().has_hover() {
            return;
        }

        let mut survivors = Vec::new();
        let mut seen = HashSet::new();
        for fragment in removed {
            let group = fragment.group();
            if !seen.insert(group.key()) {
                continue;
            }
            survivors.extend(
                self.registry
                    .in_group(group)
                    .into_iter()
                    .filter(|f| self.reflector.is_applied(f.key())),
            );
        }

        if !survivors.is_empty() {
            self.reflector.apply(
                &survivors,
                &self.registry,
                &self.cache,
                &self.context,
                self.config.display_options(),
            );
        }
    }

    /// 等待防抖窗口结束并执行一次翻译过程
    ///
    /// 没有待处理的片段时立即返回 `Ok(None)`。
    pub async fn flush(&mut self) -> TranslationResult<Option<PassSummary>> {
        loop {
            self.process_notifications();

            let Some(deadline) = self.scheduler.deadline() else {
                return Ok(None);
            };

            if let Some(due) = self.scheduler.take_due(Instant::now()) {
                return self.run_dirty(due).await.map(Some);
            }

            sleep_until(deadline).await;
        }
    }

    /// 反复 flush 直到没有待处理的片段，返回执行的翻译过程数
    ///
    /// 遇到失败的翻译过程时立即返回该错误。
    pub async fn run_until_idle(&mut self) -> TranslationResult<usize> {
        let mut passes = 0;
        while self.flush().await?.is_some() {
            passes += 1;
        }
        Ok(passes)
    }

    async fn run_dirty(&mut self, dirty: Vec<FragmentRef>) -> TranslationResult<PassSummary> {
        if !self.is_enabled() {
            return Ok(PassSummary::default());
        }

        let fragments: Vec<FragmentRef> = dirty
            .into_iter()
            .filter(|f| self.registry.contains(f.key()))
            .collect();
        self.translate(&fragments).await
    }

    /// 创建控制句柄，供 [`Orchestrator::run`] 接收命令
    pub fn control_handle(&mut self) -> ControlHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.control = Some(receiver);
        ControlHandle { sender }
    }

    /// 事件循环：持续处理通知、防抖计时和控制命令，直到引擎停止
    ///
    /// 翻译过程失败只记录日志，循环继续。
    pub async fn run(&mut self) -> TranslationResult<()> {
        let Some(mut control) = self.control.take() else {
            return Err(TranslationError::Internal(
                "运行前需要先创建控制句柄".to_string(),
            ));
        };

        while self.is_enabled() {
            let deadline = self.scheduler.deadline();

            tokio::select! {
                command = control.recv() => match command {
                    Some(ControlCommand::UpdateConfig(config)) => {
                        if let Err(e) = self.update_config(config).await {
                            tracing::warn!("更新配置失败: {}", e);
                        }
                    }
                    Some(ControlCommand::Stop) | None => {
                        self.stop_auto_translation();
                    }
                },
                Some(records) = self.changes.next() => {
                    let dirty = self.handle_changes(records);
                    self.scheduler.mark_dirty(dirty, Instant::now());
                }
                Some(elements) = self.visibility.next() => {
                    let dirty = self.visibility.process(elements, &self.registry);
                    self.scheduler.mark_dirty(dirty, Instant::now());
                }
                _ = wait_until(deadline) => {
                    if let Some(due) = self.scheduler.take_due(Instant::now()) {
                        if let Err(e) = self.run_dirty(due).await {
                            helpers::log_error(&e);
                        }
                    }
                }
            }
        }

        self.control = Some(control);
        Ok(())
    }

    /// 更新自动翻译站点白名单，返回被跳过的无效条目数
    ///
    /// 白名单写入会话存储；写入失败只记录日志。
    pub fn set_auto_translating_pages(&mut self, update: AutoTranslateUpdate) -> usize {
        let skipped = self.allowlist.apply(&update);
        self.config.always_translate_pages = self.allowlist.origins().map(str::to_string).collect();
        self.save_allowlist();
        skipped
    }

    fn save_allowlist(&self) {
        if let Err(e) = self.allowlist.save(self.session.as_ref()) {
            tracing::warn!("保存自动翻译站点失败: {}", e);
        }
    }

    pub fn should_auto_translate(&self, url: &str) -> bool {
        self.allowlist.contains(url)
    }

    /// URL 所在站点在白名单中时启动自动翻译，返回是否启动
    pub async fn auto_start(&mut self, url: &str) -> TranslationResult<bool> {
        if !self.should_auto_translate(url) {
            return Ok(false);
        }
        self.start_auto_translation().await?;
        Ok(true)
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
