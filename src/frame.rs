// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 视频帧与几何尺寸定义
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

use image::RgbImage;

/// 视频像素尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
  pub width: u32,
  pub height: u32,
}

impl Geometry {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  /// 宽高均非零时才可用于采样
  pub fn is_playable(&self) -> bool {
    self.width > 0 && self.height > 0
  }
}

/// 一帧 RGB 视频图像
#[derive(Debug, Clone)]
pub struct VideoFrame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒，相对于会话开始）
  pub timestamp_ms: u64,
}

impl VideoFrame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  pub fn geometry(&self) -> Geometry {
    Geometry::new(self.image.width(), self.image.height())
  }
}
