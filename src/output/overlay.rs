// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/overlay.rs - 检测结果叠加层绘制
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::{
  category::DetectionCategory,
  detection::{DetectionBox, DetectionResult},
  frame::Geometry,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_TEXT_HEIGHT: u32 = 22;
const LABEL_CHAR_WIDTH: f32 = 10.0; // 无字体时的估算宽度
const LABEL_PADDING: i32 = 4;
const BOX_THICKNESS: u32 = 2;
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Error, Debug)]
pub enum FontError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的字体文件")]
  InvalidFont,
}

/// 已绘制的图元，按绘制顺序记录
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayShape {
  Rect {
    category: DetectionCategory,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
  },
  Label {
    category: DetectionCategory,
    text: String,
    x: i32,
    y: i32,
  },
}

/// 透明叠加层，尺寸与视频原始像素尺寸一致
pub struct OverlayRenderer {
  surface: RgbaImage,
  shapes: Vec<OverlayShape>,
  font: Option<FontArc>,
  font_scale: PxScale,
}

impl Default for OverlayRenderer {
  fn default() -> Self {
    Self {
      surface: RgbaImage::new(0, 0),
      shapes: Vec::new(),
      font: None,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }
}

impl OverlayRenderer {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn load_font(path: &Path) -> Result<FontArc, FontError> {
    let data = std::fs::read(path)?;
    FontArc::try_from_vec(data).map_err(|_| FontError::InvalidFont)
  }

  pub fn surface(&self) -> &RgbaImage {
    &self.surface
  }

  pub fn shapes(&self) -> &[OverlayShape] {
    &self.shapes
  }

  pub fn rect_count(&self) -> usize {
    self
      .shapes
      .iter()
      .filter(|shape| matches!(shape, OverlayShape::Rect { .. }))
      .count()
  }

  pub fn geometry(&self) -> Geometry {
    Geometry::new(self.surface.width(), self.surface.height())
  }

  /// 清空叠加层；尺寸与当前视频不一致时重新分配
  pub fn clear(&mut self, geometry: Geometry) {
    if self.geometry() == geometry {
      self.surface.pixels_mut().for_each(|p| *p = TRANSPARENT);
    } else {
      self.surface = RgbaImage::from_pixel(geometry.width, geometry.height, TRANSPARENT);
    }
    self.shapes.clear();
  }

  /// 重绘整层：先清空，再按结果顺序逐个绘制边框与标签
  pub fn render(&mut self, result: &DetectionResult, geometry: Geometry) {
    self.clear(geometry);
    if !geometry.is_playable() {
      return;
    }
    for item in &result.boxes {
      self.draw_box(item, geometry);
    }
  }

  fn draw_box(&mut self, item: &DetectionBox, geometry: Geometry) {
    let (px, py, pw, ph) = item.bbox.to_pixels(geometry.width, geometry.height);
    let x = (px.round() as i32).clamp(0, geometry.width as i32 - 1);
    let y = (py.round() as i32).clamp(0, geometry.height as i32 - 1);
    let width = (pw.round() as u32).clamp(1, geometry.width - x as u32);
    let height = (ph.round() as u32).clamp(1, geometry.height - y as u32);

    let [r, g, b] = item.category.color();
    let color = Rgba([r, g, b, 255]);

    // 边框加粗
    for t in 0..BOX_THICKNESS {
      if width <= 2 * t || height <= 2 * t {
        break;
      }
      let rect = Rect::at(x + t as i32, y + t as i32).of_size(width - 2 * t, height - 2 * t);
      draw_hollow_rect_mut(&mut self.surface, rect, color);
    }
    self.shapes.push(OverlayShape::Rect {
      category: item.category,
      x,
      y,
      width,
      height,
    });

    let text = format!("{} {}%", item.category.label_en(), item.confidence_percent());
    let (text_width, text_height) = match &self.font {
      Some(font) => text_size(self.font_scale, font, &text),
      None => (
        (text.chars().count() as f32 * LABEL_CHAR_WIDTH) as u32,
        LABEL_TEXT_HEIGHT,
      ),
    };
    let label_width = (text_width + 2 * LABEL_PADDING as u32).min(geometry.width - x as u32);
    let label_height = (text_height + LABEL_PADDING as u32).min(geometry.height);

    // 标签放在边框上方，顶部放不下时贴在框内
    let label_x = x;
    let mut label_y = y - label_height as i32;
    if label_y < 0 {
      label_y = y;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width.max(1), label_height.max(1));
    draw_filled_rect_mut(&mut self.surface, rect, color);
    if let Some(font) = &self.font {
      draw_text_mut(
        &mut self.surface,
        TEXT_COLOR,
        label_x + LABEL_PADDING,
        label_y + LABEL_PADDING / 2,
        self.font_scale,
        font,
        &text,
      );
    }
    self.shapes.push(OverlayShape::Label {
      category: item.category,
      text,
      x: label_x,
      y: label_y,
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::RelativeBox;

  fn single(category: DetectionCategory, bbox: RelativeBox, confidence: f32) -> DetectionResult {
    DetectionResult::from_boxes(vec![DetectionBox::new(category, confidence, bbox)])
  }

  #[test]
  fn relative_box_lands_on_pixel_grid() {
    let mut overlay = OverlayRenderer::default();
    let result = single(
      DetectionCategory::Human,
      RelativeBox::new(0.5, 0.5, 0.1, 0.1),
      0.9,
    );
    overlay.render(&result, Geometry::new(1280, 720));

    assert_eq!(
      overlay.shapes()[0],
      OverlayShape::Rect {
        category: DetectionCategory::Human,
        x: 640,
        y: 360,
        width: 128,
        height: 72,
      }
    );
    let [r, g, b] = DetectionCategory::Human.color();
    assert_eq!(*overlay.surface().get_pixel(640, 400), Rgba([r, g, b, 255]));
    assert_eq!(overlay.surface().get_pixel(700, 400)[3], 0);
  }

  #[test]
  fn label_shows_rounded_percentage_above_box() {
    let mut overlay = OverlayRenderer::default();
    let result = single(
      DetectionCategory::Vehicle,
      RelativeBox::new(0.5, 0.5, 0.2, 0.2),
      0.876,
    );
    overlay.render(&result, Geometry::new(200, 100));
    match &overlay.shapes()[1] {
      OverlayShape::Label { text, y, .. } => {
        assert_eq!(text, "Vehicle 88%");
        assert!(*y < 50);
      }
      other => panic!("unexpected shape {:?}", other),
    }
  }

  #[test]
  fn empty_result_clears_previous_drawing() {
    let mut overlay = OverlayRenderer::default();
    let geometry = Geometry::new(64, 64);
    overlay.render(
      &single(
        DetectionCategory::Animal,
        RelativeBox::new(0.1, 0.1, 0.5, 0.5),
        0.5,
      ),
      geometry,
    );
    assert_eq!(overlay.rect_count(), 1);

    overlay.render(&DetectionResult::default(), geometry);
    assert_eq!(overlay.rect_count(), 0);
    assert!(overlay.surface().pixels().all(|p| p[3] == 0));
  }

  #[test]
  fn surface_follows_video_geometry() {
    let mut overlay = OverlayRenderer::default();
    overlay.render(&DetectionResult::default(), Geometry::new(320, 240));
    assert_eq!(overlay.geometry(), Geometry::new(320, 240));
    overlay.render(&DetectionResult::default(), Geometry::new(640, 480));
    assert_eq!(overlay.surface().dimensions(), (640, 480));
  }

  #[test]
  fn boxes_draw_in_result_order() {
    let mut overlay = OverlayRenderer::default();
    let bbox = RelativeBox::new(0.2, 0.2, 0.5, 0.5);
    let result = DetectionResult::from_boxes(vec![
      DetectionBox::new(DetectionCategory::Human, 0.9, bbox),
      DetectionBox::new(DetectionCategory::Bicycle, 0.8, bbox),
    ]);
    overlay.render(&result, Geometry::new(100, 100));
    let order: Vec<_> = overlay
      .shapes()
      .iter()
      .filter_map(|shape| match shape {
        OverlayShape::Rect { category, .. } => Some(*category),
        _ => None,
      })
      .collect();
    assert_eq!(order, vec![DetectionCategory::Human, DetectionCategory::Bicycle]);

    // 后绘制的覆盖先绘制的
    let [r, g, b] = DetectionCategory::Bicycle.color();
    assert_eq!(*overlay.surface().get_pixel(20, 50), Rgba([r, g, b, 255]));
  }
}
