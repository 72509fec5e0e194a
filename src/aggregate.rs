// 该文件是 Shanan （山南西风） 项目的一部分。
// src/aggregate.rs - 检测结果汇总与事件记录
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

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::{
  category::{CategoryCounts, DetectionCategory},
  detection::{DetectionResult, RelativeBox},
};

pub const DEFAULT_EVENT_CAPACITY: usize = 10;

/// 累计计数，total 始终等于各类别之和
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateStats {
  counts: CategoryCounts,
  total: u64,
  last_update: Option<DateTime<Utc>>,
}

impl AggregateStats {
  pub fn count(&self, category: DetectionCategory) -> u64 {
    self.counts.get(category)
  }

  pub fn counts(&self) -> &CategoryCounts {
    &self.counts
  }

  pub fn total(&self) -> u64 {
    self.total
  }

  pub fn last_update(&self) -> Option<DateTime<Utc>> {
    self.last_update
  }
}

/// 一条历史检测记录
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
  pub id: u64,
  pub category: DetectionCategory,
  pub confidence: f32,
  pub timestamp: DateTime<Utc>,
  pub bbox: Option<RelativeBox>,
}

/// 汇总器：唯一可以修改统计与事件记录的地方
#[derive(Debug)]
pub struct DetectionAggregator {
  stats: AggregateStats,
  events: VecDeque<DetectionEvent>,
  capacity: usize,
  next_event_id: u64,
}

impl Default for DetectionAggregator {
  fn default() -> Self {
    Self::new(DEFAULT_EVENT_CAPACITY)
  }
}

impl DetectionAggregator {
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      stats: AggregateStats::default(),
      events: VecDeque::with_capacity(capacity),
      capacity,
      next_event_id: 0,
    }
  }

  pub fn stats(&self) -> &AggregateStats {
    &self.stats
  }

  /// 最近的事件在前
  pub fn events(&self) -> impl ExactSizeIterator<Item = &DetectionEvent> {
    self.events.iter()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// 将一个周期的结果并入统计，每个成功周期恰好调用一次
  pub fn apply(&mut self, result: &DetectionResult, at: DateTime<Utc>) {
    for (category, count) in result.counts.iter() {
      self.stats.counts.add(category, count);
    }
    self.stats.total = self.stats.counts.sum();
    self.stats.last_update = Some(at);

    for item in &result.boxes {
      self.next_event_id += 1;
      self.events.push_front(DetectionEvent {
        id: self.next_event_id,
        category: item.category,
        confidence: item.confidence,
        timestamp: at,
        bbox: Some(item.bbox),
      });
    }
    self.events.truncate(self.capacity);
  }

  /// 清零全部计数并清空事件记录
  pub fn reset(&mut self) {
    self.stats = AggregateStats::default();
    self.events.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::DetectionBox;

  fn result_with(category: DetectionCategory, n: usize) -> DetectionResult {
    let boxes = (0..n)
      .map(|i| {
        DetectionBox::new(
          category,
          0.5 + i as f32 / 100.0,
          RelativeBox::new(0.1, 0.1, 0.2, 0.2),
        )
      })
      .collect();
    DetectionResult::from_boxes(boxes)
  }

  #[test]
  fn counters_accumulate_and_total_matches_sum() {
    let mut agg = DetectionAggregator::default();
    let now = Utc::now();
    agg.apply(&result_with(DetectionCategory::Human, 2), now);
    agg.apply(&result_with(DetectionCategory::Vehicle, 3), now);
    agg.apply(&result_with(DetectionCategory::Human, 1), now);

    let stats = agg.stats();
    assert_eq!(stats.count(DetectionCategory::Human), 3);
    assert_eq!(stats.count(DetectionCategory::Vehicle), 3);
    assert_eq!(stats.total(), stats.counts().sum());
    assert_eq!(stats.total(), 6);
    assert_eq!(stats.last_update(), Some(now));
  }

  #[test]
  fn event_log_is_bounded_and_newest_first() {
    let mut agg = DetectionAggregator::default();
    let now = Utc::now();
    for _ in 0..7 {
      agg.apply(&result_with(DetectionCategory::Animal, 3), now);
    }
    assert_eq!(agg.events().len(), DEFAULT_EVENT_CAPACITY);

    let ids: Vec<u64> = agg.events().map(|event| event.id).collect();
    assert!(ids.windows(2).all(|pair| pair[0] > pair[1]));
    assert_eq!(ids[0], 21);
  }

  #[test]
  fn statistics_drive_counters_not_box_count() {
    let mut agg = DetectionAggregator::default();
    let mut result = result_with(DetectionCategory::Human, 1);
    result.counts.set(DetectionCategory::Human, 4);
    agg.apply(&result, Utc::now());
    assert_eq!(agg.stats().total(), 4);
    assert_eq!(agg.events().len(), 1);
  }

  #[test]
  fn reset_clears_everything() {
    let mut agg = DetectionAggregator::default();
    agg.apply(&result_with(DetectionCategory::Bicycle, 4), Utc::now());
    agg.reset();
    assert_eq!(agg.stats(), &AggregateStats::default());
    assert_eq!(agg.events().len(), 0);
  }

  #[test]
  fn empty_result_only_stamps_time() {
    let mut agg = DetectionAggregator::default();
    let now = Utc::now();
    agg.apply(&DetectionResult::default(), now);
    assert_eq!(agg.stats().total(), 0);
    assert_eq!(agg.stats().last_update(), Some(now));
    assert_eq!(agg.events().len(), 0);
  }
}
