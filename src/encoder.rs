// 该文件是 Shanan （山南西风） 项目的一部分。
// src/encoder.rs - 采样帧编码
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

use image::{ExtendedColorType, codecs::jpeg::JpegEncoder};
use thiserror::Error;

use crate::frame::{Geometry, VideoFrame};

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Error, Debug)]
pub enum EncodeError {
  /// 视频尚未报告尺寸，本周期跳过
  #[error("视频尚未就绪")]
  NotReady,
  #[error("图像编码错误: {0}")]
  Image(#[from] image::ImageError),
}

/// 可传输的 JPEG 负载
#[derive(Debug, Clone)]
pub struct EncodedFrame {
  pub bytes: Vec<u8>,
  pub geometry: Geometry,
  pub frame_index: u64,
}

impl EncodedFrame {
  pub const MIME: &'static str = "image/jpeg";
}

#[derive(Debug, Clone)]
pub struct FrameEncoder {
  quality: u8,
}

impl Default for FrameEncoder {
  fn default() -> Self {
    Self::new(DEFAULT_JPEG_QUALITY)
  }
}

impl FrameEncoder {
  pub fn new(quality: u8) -> Self {
    Self {
      quality: quality.clamp(1, 100),
    }
  }

  pub fn quality(&self) -> u8 {
    self.quality
  }

  /// 按帧原始像素尺寸编码为 JPEG；没有可用画面时返回 NotReady
  pub fn encode(&self, frame: Option<&VideoFrame>) -> Result<EncodedFrame, EncodeError> {
    let frame = frame.ok_or(EncodeError::NotReady)?;
    let geometry = frame.geometry();
    if !geometry.is_playable() {
      return Err(EncodeError::NotReady);
    }

    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, self.quality);
    encoder.encode(
      frame.image.as_raw(),
      geometry.width,
      geometry.height,
      ExtendedColorType::Rgb8,
    )?;

    Ok(EncodedFrame {
      bytes,
      geometry,
      frame_index: frame.index,
    })
  }
}
