// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 操作员可见的输出
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use crate::aggregate::{AggregateStats, DetectionEvent};

mod overlay;
pub use self::overlay::{FontError, OverlayRenderer, OverlayShape};

mod snapshot;
pub use self::snapshot::{SnapshotError, SnapshotOutput};

/// 实时统计摘要，例如 `总数 3 | 人员 2 车辆 1 摩托车 0 自行车 0 动物 0`
pub fn status_line(stats: &AggregateStats) -> String {
  let parts: Vec<String> = stats
    .counts()
    .iter()
    .map(|(category, count)| format!("{} {}", category.label_zh(), count))
    .collect();
  format!("总数 {} | {}", stats.total(), parts.join(" "))
}

pub fn event_line(event: &DetectionEvent) -> String {
  format!(
    "#{} {} {} {} {:.0}%",
    event.id,
    event.timestamp.format("%H:%M:%S"),
    event.category.icon(),
    event.category.label_zh(),
    event.confidence * 100.0
  )
}
