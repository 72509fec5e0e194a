// 该文件是 Shanan （山南西风） 项目的一部分。
// src/category.rs - 检测类别定义
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

use std::fmt;

/// 检测类别（固定集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetectionCategory {
  Human,
  Vehicle,
  Motorcycle,
  Bicycle,
  Animal,
}

impl DetectionCategory {
  pub const ALL: [DetectionCategory; 5] = [
    DetectionCategory::Human,
    DetectionCategory::Vehicle,
    DetectionCategory::Motorcycle,
    DetectionCategory::Bicycle,
    DetectionCategory::Animal,
  ];

  /// 稳定标识，同时也是检测服务统计字段的名称
  pub fn id(self) -> &'static str {
    match self {
      DetectionCategory::Human => "human",
      DetectionCategory::Vehicle => "car",
      DetectionCategory::Motorcycle => "motorcycle",
      DetectionCategory::Bicycle => "bicycle",
      DetectionCategory::Animal => "animal",
    }
  }

  pub fn label_en(self) -> &'static str {
    match self {
      DetectionCategory::Human => "Human",
      DetectionCategory::Vehicle => "Vehicle",
      DetectionCategory::Motorcycle => "Motorcycle",
      DetectionCategory::Bicycle => "Bicycle",
      DetectionCategory::Animal => "Animal",
    }
  }

  pub fn label_zh(self) -> &'static str {
    match self {
      DetectionCategory::Human => "人员",
      DetectionCategory::Vehicle => "车辆",
      DetectionCategory::Motorcycle => "摩托车",
      DetectionCategory::Bicycle => "自行车",
      DetectionCategory::Animal => "动物",
    }
  }

  /// 边框与标签底色
  pub fn color(self) -> [u8; 3] {
    match self {
      DetectionCategory::Human => [239, 68, 68],
      DetectionCategory::Vehicle => [59, 130, 246],
      DetectionCategory::Motorcycle => [245, 158, 11],
      DetectionCategory::Bicycle => [16, 185, 129],
      DetectionCategory::Animal => [139, 92, 246],
    }
  }

  pub fn icon(self) -> &'static str {
    match self {
      DetectionCategory::Human => "🚶",
      DetectionCategory::Vehicle => "🚗",
      DetectionCategory::Motorcycle => "🏍",
      DetectionCategory::Bicycle => "🚲",
      DetectionCategory::Animal => "🐾",
    }
  }

  /// 解析检测服务返回的类别名，兼容常见别名
  pub fn from_wire(name: &str) -> Option<Self> {
    match name.trim().to_ascii_lowercase().as_str() {
      "human" | "person" => Some(DetectionCategory::Human),
      "car" | "vehicle" | "truck" | "bus" => Some(DetectionCategory::Vehicle),
      "motorcycle" | "motorbike" => Some(DetectionCategory::Motorcycle),
      "bicycle" | "bike" => Some(DetectionCategory::Bicycle),
      "animal" => Some(DetectionCategory::Animal),
      _ => None,
    }
  }

  pub(crate) fn index(self) -> usize {
    self as usize
  }
}

impl fmt::Display for DetectionCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label_en())
  }
}

/// 按类别计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts([u64; 5]);

impl CategoryCounts {
  pub fn get(&self, category: DetectionCategory) -> u64 {
    self.0[category.index()]
  }

  pub fn set(&mut self, category: DetectionCategory, value: u64) {
    self.0[category.index()] = value;
  }

  pub fn add(&mut self, category: DetectionCategory, value: u64) {
    let slot = &mut self.0[category.index()];
    *slot = slot.saturating_add(value);
  }

  pub fn sum(&self) -> u64 {
    self.0.iter().fold(0u64, |acc, v| acc.saturating_add(*v))
  }

  pub fn iter(&self) -> impl Iterator<Item = (DetectionCategory, u64)> + '_ {
    DetectionCategory::ALL
      .iter()
      .map(move |category| (*category, self.get(*category)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wire_names_resolve_with_aliases() {
    assert_eq!(DetectionCategory::from_wire("person"), Some(DetectionCategory::Human));
    assert_eq!(DetectionCategory::from_wire("Car"), Some(DetectionCategory::Vehicle));
    assert_eq!(DetectionCategory::from_wire("vehicle"), Some(DetectionCategory::Vehicle));
    assert_eq!(DetectionCategory::from_wire("boat"), None);
  }

  #[test]
  fn ids_round_trip_through_wire_names() {
    for category in DetectionCategory::ALL {
      assert_eq!(DetectionCategory::from_wire(category.id()), Some(category));
    }
  }

  #[test]
  fn counts_sum_every_category() {
    let mut counts = CategoryCounts::default();
    counts.add(DetectionCategory::Human, 2);
    counts.add(DetectionCategory::Animal, 3);
    counts.add(DetectionCategory::Human, 1);
    assert_eq!(counts.get(DetectionCategory::Human), 3);
    assert_eq!(counts.sum(), 6);
  }
}
