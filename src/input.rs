// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 采集设备输入
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

use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{
  FromUrl,
  frame::{Geometry, VideoFrame},
};

mod image_source;
pub use self::image_source::ImageSource;

#[cfg(feature = "v4l2_input")]
mod v4l2_source;
#[cfg(feature = "v4l2_input")]
pub use self::v4l2_source::V4l2Source;

#[derive(Error, Debug)]
pub enum CaptureError {
  /// 权限被拒绝或设备不可用，不再细分
  #[error("采集设备不可用: {0}")]
  Unavailable(String),
  #[error("采集帧失败: {0}")]
  Frame(String),
}

/// 采集请求参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
  /// 期望分辨率（仅作提示，设备可返回其它尺寸）
  pub width_hint: u32,
  pub height_hint: u32,
  pub audio: bool,
}

impl Default for CaptureRequest {
  fn default() -> Self {
    Self {
      width_hint: 1280,
      height_hint: 720,
      audio: false,
    }
  }
}

/// 一个已获取的采集设备
pub trait CaptureDevice {
  /// 设备当前报告的尺寸，未知时返回 None
  fn geometry(&self) -> Option<Geometry>;

  fn read_frame(&mut self) -> Result<VideoFrame, CaptureError>;

  /// 仍在运行的轨道数
  fn active_tracks(&self) -> usize;

  /// 停止所有轨道，可重复调用
  fn stop(&mut self);
}

/// 采集设备的打开方式
pub trait CaptureBackend {
  fn open(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureDevice>, CaptureError>;
}

/// 根据 URL 选择采集后端
///
/// - `v4l:///dev/video0`：V4L2 摄像头
/// - `image:///path/to/file.jpg`：以静态图片模拟实时画面
#[derive(Debug, Clone)]
pub struct UrlCaptureBackend {
  url: Url,
}

const V4L_SCHEME: &str = "v4l";

impl FromUrl for UrlCaptureBackend {
  type Error = CaptureError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      V4L_SCHEME | ImageSource::SCHEME => Ok(Self { url: url.clone() }),
      other => {
        error!("不支持的采集来源: {}", other);
        Err(CaptureError::Unavailable(format!(
          "不支持的 URI 方案 '{}'",
          other
        )))
      }
    }
  }
}

impl CaptureBackend for UrlCaptureBackend {
  fn open(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureDevice>, CaptureError> {
    match self.url.scheme() {
      #[cfg(feature = "v4l2_input")]
      V4L_SCHEME => {
        let path = if self.url.path().is_empty() {
          "/dev/video0"
        } else {
          self.url.path()
        };
        Ok(Box::new(V4l2Source::open(path, request)?))
      }
      ImageSource::SCHEME => Ok(Box::new(ImageSource::open(self.url.path())?)),
      other => Err(CaptureError::Unavailable(format!(
        "采集后端未启用: {}",
        other
      ))),
    }
  }
}
