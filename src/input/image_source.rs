// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/image_source.rs - 静态图片输入源
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

use std::time::Instant;

use image::{ImageReader, RgbImage};
use tracing::info;

use super::{CaptureDevice, CaptureError};
use crate::frame::{Geometry, VideoFrame};

/// 把一张图片当作实时画面重复输出，用于离线演示
pub struct ImageSource {
  image: RgbImage,
  frame_index: u64,
  start_time: Instant,
  running: bool,
}

impl ImageSource {
  pub const SCHEME: &'static str = "image";

  pub fn open(path: &str) -> Result<Self, CaptureError> {
    let image = ImageReader::open(path)
      .map_err(|e| CaptureError::Unavailable(format!("无法打开图片 {}: {}", path, e)))?
      .decode()
      .map_err(|e| CaptureError::Unavailable(format!("无法解码图片 {}: {}", path, e)))?;

    info!("图片输入源已打开: {}", path);
    Ok(Self::from_image(image.into()))
  }

  pub fn from_image(image: RgbImage) -> Self {
    Self {
      image,
      frame_index: 0,
      start_time: Instant::now(),
      running: true,
    }
  }
}

impl CaptureDevice for ImageSource {
  fn geometry(&self) -> Option<Geometry> {
    Some(Geometry::new(self.image.width(), self.image.height()))
  }

  fn read_frame(&mut self) -> Result<VideoFrame, CaptureError> {
    if !self.running {
      return Err(CaptureError::Frame("输入源已停止".to_string()));
    }
    let frame = VideoFrame::new(
      self.image.clone(),
      self.frame_index,
      self.start_time.elapsed().as_millis() as u64,
    );
    self.frame_index += 1;
    Ok(frame)
  }

  fn active_tracks(&self) -> usize {
    usize::from(self.running)
  }

  fn stop(&mut self) {
    self.running = false;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn replays_same_image_with_increasing_index() {
    let mut source = ImageSource::from_image(RgbImage::new(8, 4));
    let a = source.read_frame().unwrap();
    let b = source.read_frame().unwrap();
    assert_eq!(a.index + 1, b.index);
    assert_eq!(b.geometry(), Geometry::new(8, 4));
  }

  #[test]
  fn stop_releases_track() {
    let mut source = ImageSource::from_image(RgbImage::new(2, 2));
    assert_eq!(source.active_tracks(), 1);
    source.stop();
    source.stop();
    assert_eq!(source.active_tracks(), 0);
    assert!(source.read_frame().is_err());
  }
}
