// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detection.rs - 检测结果定义
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

use std::time::Duration;

use crate::category::{CategoryCounts, DetectionCategory};

/// 相对坐标边框，各字段均为帧宽/高的比例 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl RelativeBox {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    let unit = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
    Self {
      x: unit(x),
      y: unit(y),
      width: unit(width),
      height: unit(height),
    }
  }

  /// 换算为像素坐标 (x, y, w, h)
  pub fn to_pixels(&self, width: u32, height: u32) -> (f32, f32, f32, f32) {
    let (w, h) = (width as f32, height as f32);
    (self.x * w, self.y * h, self.width * w, self.height * h)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionBox {
  pub category: DetectionCategory,
  pub confidence: f32,
  pub bbox: RelativeBox,
}

impl DetectionBox {
  pub fn new(category: DetectionCategory, confidence: f32, bbox: RelativeBox) -> Self {
    let confidence = if confidence.is_finite() {
      confidence.clamp(0.0, 1.0)
    } else {
      0.0
    };
    Self {
      category,
      confidence,
      bbox,
    }
  }

  /// 四舍五入的置信度百分比
  pub fn confidence_percent(&self) -> u32 {
    (self.confidence * 100.0).round() as u32
  }
}

/// 一个采样周期的完整结果，只在该周期内存在
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
  pub boxes: Vec<DetectionBox>,
  pub counts: CategoryCounts,
  pub total: u64,
  pub processing_time: Option<Duration>,
}

impl DetectionResult {
  /// 由检测框推导计数
  pub fn from_boxes(boxes: Vec<DetectionBox>) -> Self {
    let mut counts = CategoryCounts::default();
    for item in &boxes {
      counts.add(item.category, 1);
    }
    Self {
      total: counts.sum(),
      boxes,
      counts,
      processing_time: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn relative_box_scales_to_surface() {
    let bbox = RelativeBox::new(0.5, 0.5, 0.1, 0.1);
    let (x, y, w, h) = bbox.to_pixels(1280, 720);
    assert_eq!((x.round(), y.round()), (640.0, 360.0));
    assert_eq!((w.round(), h.round()), (128.0, 72.0));
  }

  #[test]
  fn values_are_clamped_to_unit_range() {
    let bbox = RelativeBox::new(-0.2, 1.4, f32::NAN, 0.3);
    assert_eq!(bbox, RelativeBox::new(0.0, 1.0, 0.0, 0.3));
    let item = DetectionBox::new(DetectionCategory::Animal, 1.7, bbox);
    assert_eq!(item.confidence, 1.0);
  }

  #[test]
  fn confidence_percent_rounds() {
    let bbox = RelativeBox::new(0.0, 0.0, 0.1, 0.1);
    let item = DetectionBox::new(DetectionCategory::Human, 0.875, bbox);
    assert_eq!(item.confidence_percent(), 88);
    assert_eq!(DetectionBox::new(DetectionCategory::Human, 0.9, bbox).confidence_percent(), 90);
  }

  #[test]
  fn counts_derived_from_boxes() {
    let bbox = RelativeBox::new(0.0, 0.0, 0.1, 0.1);
    let result = DetectionResult::from_boxes(vec![
      DetectionBox::new(DetectionCategory::Human, 0.9, bbox),
      DetectionBox::new(DetectionCategory::Human, 0.8, bbox),
      DetectionBox::new(DetectionCategory::Bicycle, 0.7, bbox),
    ]);
    assert_eq!(result.counts.get(DetectionCategory::Human), 2);
    assert_eq!(result.total, 3);
  }
}
