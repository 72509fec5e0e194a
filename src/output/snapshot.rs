// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/snapshot.rs - 保存叠加后的画面
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

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbaImage, imageops};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::VideoFrame};

#[derive(Error, Debug)]
pub enum SnapshotError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 将当前画面与叠加层合成后写入文件
pub struct SnapshotOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for SnapshotOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SnapshotOutput {
  type Error = SnapshotError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SnapshotError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }
    Ok(Self::new(uri.path()))
  }
}

impl SnapshotOutput {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn compose(frame: &VideoFrame, overlay: &RgbaImage) -> RgbaImage {
    let mut base = DynamicImage::ImageRgb8(frame.image.clone()).to_rgba8();
    imageops::overlay(&mut base, overlay, 0, 0);
    base
  }

  pub fn save(&self, frame: &VideoFrame, overlay: &RgbaImage) -> Result<(), SnapshotError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let image = Self::compose(frame, overlay);
    // JPEG 不支持透明通道
    DynamicImage::ImageRgba8(image).to_rgb8().save(&self.path)?;
    debug!("保存画面到文件: {}", self.path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use image::{Rgb, Rgba, RgbImage};

  use super::*;

  #[test]
  fn overlay_pixels_replace_frame_pixels() {
    let frame = VideoFrame::new(RgbImage::from_pixel(4, 4, Rgb([10, 10, 10])), 0, 0);
    let mut overlay = RgbaImage::new(4, 4);
    overlay.put_pixel(1, 1, Rgba([255, 0, 0, 255]));

    let composed = SnapshotOutput::compose(&frame, &overlay);
    assert_eq!(*composed.get_pixel(1, 1), Rgba([255, 0, 0, 255]));
    assert_eq!(*composed.get_pixel(0, 0), Rgba([10, 10, 10, 255]));
  }

  #[test]
  fn saves_into_nested_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snap").join("latest.png");
    let output = SnapshotOutput::new(&path);
    let frame = VideoFrame::new(RgbImage::new(8, 8), 0, 0);
    output.save(&frame, &RgbaImage::new(8, 8)).unwrap();
    assert!(path.exists());
  }

  #[test]
  fn scheme_must_match() {
    let url = Url::parse("folder:///tmp/out").unwrap();
    assert!(matches!(
      SnapshotOutput::from_url(&url),
      Err(SnapshotError::SchemeMismatch(_))
    ));
  }
}
