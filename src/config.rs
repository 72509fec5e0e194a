// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 流水线配置
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

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::{
  aggregate::DEFAULT_EVENT_CAPACITY, encoder::DEFAULT_JPEG_QUALITY, input::CaptureRequest,
  scheduler::DEFAULT_SAMPLE_INTERVAL,
};

/// 采样流水线配置
#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// 采集请求（分辨率提示，无音频）
  pub capture: CaptureRequest,
  /// 采样周期
  pub sample_interval: Duration,
  /// 启动后是否立即采样
  pub sampling_enabled: bool,
  /// JPEG 质量 (1-100)
  pub jpeg_quality: u8,
  /// 事件记录容量
  pub event_capacity: usize,
  /// 检测请求超时，None 表示使用网络栈默认值
  pub request_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      capture: CaptureRequest::default(),
      sample_interval: DEFAULT_SAMPLE_INTERVAL,
      sampling_enabled: true,
      jpeg_quality: DEFAULT_JPEG_QUALITY,
      event_capacity: DEFAULT_EVENT_CAPACITY,
      request_timeout: None,
    }
  }
}

/// 监控任务配置
#[derive(Debug, Clone)]
pub struct MonitorConfig {
  pub pipeline: PipelineConfig,
  /// 采集来源，例如 `v4l:///dev/video0`
  pub capture_url: Url,
  /// 检测服务根地址
  pub endpoint: Url,
  /// 标签字体文件
  pub font: Option<PathBuf>,
  /// 每个周期后保存合成画面，例如 `image:///tmp/cctv/latest.png`
  pub snapshot: Option<Url>,
  /// 处理指定数量的周期后退出
  pub max_cycles: Option<usize>,
}
