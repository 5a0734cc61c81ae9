use crate::types::Endpoint;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;

/// 创建一轮测速使用的进度条
/// `visible` 为 false 时返回隐藏的进度条 (quiet 模式与测试)
pub fn round_progress(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("Testing proxies {percent:>3}% [{bar:40.cyan/blue}] {msg}")
        .map(|s| s.progress_chars("// "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// 去重并保留首次出现的顺序
pub fn dedup_endpoints<I>(endpoints: I) -> Vec<Endpoint>
where
    I: IntoIterator<Item = Endpoint>,
{
    let mut seen = HashSet::new();
    endpoints
        .into_iter()
        .filter(|e| seen.insert(e.clone()))
        .collect()
}

/// Sort `(item, speed)` pairs fastest first.
pub fn sort_by_speed_desc<T>(items: &mut [(T, f64)]) {
    items.sort_by(|a, b| b.1.total_cmp(&a.1));
}
