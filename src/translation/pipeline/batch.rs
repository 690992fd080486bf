//! 翻译批次打包模块
//!
//! 将待翻译的文本按字符上限贪心打包成有序批次，每个批次对应一次翻译服务调用。
//!
//! ## 算法
//!
//! 1. 按输入顺序遍历，长度按**码点**计算（emoji 等多字节字符只算一个）
//! 2. 当前批次非空且加入下一项会超过上限时，先结束当前批次
//! 3. 自身就超过上限的单项单独成为一个批次，不做拆分
//!
//! ## 保证
//!
//! - 输入顺序在批次之间和批次内部都保持不变
//! - 每个输入项恰好出现在一个批次中
//! - 除无法避免的超大单项批次外，没有批次超过上限
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use live_translate::translation::pipeline::batch::Batcher;
//!
//! let mut batcher = Batcher::new(5000);
//! let batches = batcher.pack(fragments);
//! println!("生成 {} 个批次", batches.len());
//! ```

use crate::translation::pipeline::fragment::FragmentRef;

/// 翻译批次
///
/// 一组按原顺序排列的待翻译项，以及打包时统计的码点总数。
#[derive(Debug, Clone)]
pub struct Batch<T> {
    /// 批次序号（从 0 开始，按生成顺序）
    pub id: usize,
    /// 包含的项，保持输入顺序
    pub items: Vec<T>,
    /// 码点总数
    pub total_chars: usize,
    /// 批次类型
    pub batch_type: BatchType,
}

/// 批次类型
///
/// - `Standard`: 总长度不超过上限
/// - `Oversize`: 单项自身就超过上限，单独成批
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchType {
    Standard,
    Oversize,
}

impl<T> Batch<T> {
    fn new(id: usize, items: Vec<T>, total_chars: usize, max_chars: usize) -> Self {
        let batch_type = if total_chars > max_chars {
            BatchType::Oversize
        } else {
            BatchType::Standard
        };

        Self {
            id,
            items,
            total_chars,
            batch_type,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 批次摘要，用于日志
    pub fn summary(&self) -> String {
        format!(
            "批次 #{}: {} 项, {} 字符{}",
            self.id,
            self.items.len(),
            self.total_chars,
            if self.batch_type == BatchType::Oversize {
                " (超长单项)"
            } else {
                ""
            }
        )
    }
}

/// 按长度函数贪心打包
pub fn pack_by<T, I, F>(items: I, max_chars: usize, len: F) -> Vec<Batch<T>>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> usize,
{
    let mut batches = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut current_len = 0usize;

    for item in items {
        let item_len = len(&item);

        if !current.is_empty() && current_len + item_len > max_chars {
            let id = batches.len();
            batches.push(Batch::new(id, std::mem::take(&mut current), current_len, max_chars));
            current_len = 0;
        }

        current.push(item);
        current_len += item_len;
    }

    if !current.is_empty() {
        let id = batches.len();
        batches.push(Batch::new(id, current, current_len, max_chars));
    }

    batches
}

/// 码点长度
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// 片段批次打包器
pub struct Batcher {
    max_chars_per_batch: usize,
    stats: BatchStats,
}

/// 打包统计
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub input_items: usize,
    pub output_batches: usize,
    pub oversize_batches: usize,
    pub total_chars: usize,
}

impl BatchStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 平均批次大小（字符）
    pub fn average_batch_chars(&self) -> f32 {
        if self.output_batches == 0 {
            0.0
        } else {
            self.total_chars as f32 / self.output_batches as f32
        }
    }

    fn record<T>(&mut self, batches: &[Batch<T>]) {
        for batch in batches {
            self.input_items += batch.items.len();
            self.output_batches += 1;
            self.total_chars += batch.total_chars;
            if batch.batch_type == BatchType::Oversize {
                self.oversize_batches += 1;
            }
        }
    }
}

impl Batcher {
    pub fn new(max_chars_per_batch: usize) -> Self {
        Self {
            max_chars_per_batch,
            stats: BatchStats::default(),
        }
    }

    pub fn max_chars_per_batch(&self) -> usize {
        self.max_chars_per_batch
    }

    /// 按规范化文本长度打包片段
    pub fn pack(&mut self, fragments: Vec<FragmentRef>) -> Vec<Batch<FragmentRef>> {
        self.pack_items(fragments, |fragment| fragment.char_len())
    }

    /// 打包任意项并记录统计
    pub fn pack_items<T, F>(&mut self, items: Vec<T>, len: F) -> Vec<Batch<T>>
    where
        F: Fn(&T) -> usize,
    {
        let batches = pack_by(items, self.max_chars_per_batch, len);
        self.stats.record(&batches);

        for batch in batches.iter().filter(|b| b.batch_type == BatchType::Oversize) {
            tracing::warn!(
                "文本长度 {} 超过批次上限 {}，单独发送",
                batch.total_chars,
                self.max_chars_per_batch
            );
        }

        batches
    }

    pub fn get_stats(&self) -> &BatchStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}
