// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/v4l2_source.rs - V4L2 摄像头输入源
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

use std::pin::Pin;
use std::time::Instant;

use image::RgbImage;
use tracing::{info, warn};
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use super::{CaptureDevice, CaptureError, CaptureRequest};
use crate::frame::{Geometry, VideoFrame};

const STREAM_BUFFERS: u32 = 4;

/// V4L2 摄像头输入源
///
/// Stream 需要引用 Device，因此用 Pin<Box<Device>> 固定设备地址。
pub struct V4l2Source {
  /// 捕获流，先于 device 释放
  stream: Option<Stream<'static>>,
  device: Pin<Box<Device>>,
  device_path: String,
  frame_index: u64,
  width: u32,
  height: u32,
  start_time: Instant,
}

impl V4l2Source {
  /// 打开设备并按请求的分辨率协商 YUYV 格式
  pub fn open(device_path: &str, request: &CaptureRequest) -> Result<Self, CaptureError> {
    let unavailable = |e: std::io::Error| {
      CaptureError::Unavailable(format!("无法打开设备 {}: {}", device_path, e))
    };

    let device = Box::pin(Device::with_path(device_path).map_err(unavailable)?);

    let mut format = device.format().map_err(unavailable)?;
    format.width = request.width_hint;
    format.height = request.height_hint;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format).map_err(unavailable)?;

    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(CaptureError::Unavailable(format!(
        "设备 {} 不支持 YUYV 格式",
        device_path
      )));
    }

    let mut source = Self {
      stream: None,
      device,
      device_path: device_path.to_string(),
      frame_index: 0,
      width: format.width,
      height: format.height,
      start_time: Instant::now(),
    };

    // SAFETY: device 被 Pin<Box> 固定在堆上不会移动；stream 与 device 同属一个结构体，
    // 并且在 stop()/Drop 中先于 device 被释放。
    let device_ref: &Device = &source.device;
    let stream = unsafe {
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, STREAM_BUFFERS)
        .map_err(unavailable)?
    };
    source.stream = Some(stream);

    info!(
      "V4L2 设备已打开: {} {}x{}",
      source.device_path, source.width, source.height
    );
    Ok(source)
  }

  /// 将 YUYV 格式转换为 RGB
  fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);

    for chunk in yuyv.chunks_exact(4) {
      let y0 = chunk[0] as f32;
      let u = chunk[1] as f32 - 128.0;
      let y1 = chunk[2] as f32;
      let v = chunk[3] as f32 - 128.0;

      for y in [y0, y1] {
        let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
        let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
        let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
        rgb.extend_from_slice(&[r, g, b]);
      }
    }

    rgb
  }
}

impl CaptureDevice for V4l2Source {
  fn geometry(&self) -> Option<Geometry> {
    self
      .stream
      .as_ref()
      .map(|_| Geometry::new(self.width, self.height))
  }

  fn read_frame(&mut self) -> Result<VideoFrame, CaptureError> {
    let stream = self
      .stream
      .as_mut()
      .ok_or_else(|| CaptureError::Frame("捕获流已停止".to_string()))?;

    let (buffer, _meta) = stream
      .next()
      .map_err(|e| CaptureError::Frame(format!("无法捕获帧: {}", e)))?;

    let rgb = Self::yuyv_to_rgb(buffer, self.width, self.height);
    let image = RgbImage::from_raw(self.width, self.height, rgb)
      .ok_or_else(|| CaptureError::Frame("无法创建 RGB 图像".to_string()))?;

    let frame = VideoFrame::new(
      image,
      self.frame_index,
      self.start_time.elapsed().as_millis() as u64,
    );
    self.frame_index += 1;
    Ok(frame)
  }

  fn active_tracks(&self) -> usize {
    usize::from(self.stream.is_some())
  }

  fn stop(&mut self) {
    if self.stream.take().is_some() {
      warn!("V4L2 捕获流已停止: {}", self.device_path);
    }
  }
}

impl Drop for V4l2Source {
  fn drop(&mut self) {
    // 确保 stream 在 device 之前被 drop
    self.stream.take();
  }
}
