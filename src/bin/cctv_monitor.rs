// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/cctv_monitor.rs - 摄像头采样检测监控
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
use std::sync::{Arc, mpsc};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shanan_cctv::{
  FromUrl,
  client::HttpDetectionClient,
  config::{MonitorConfig, PipelineConfig},
  input::{CaptureRequest, UrlCaptureBackend},
  output::{OverlayRenderer, SnapshotOutput},
  pipeline::Pipeline,
  task::{MonitorTask, spawn_stdin_commands},
};

/// 摄像头采样检测监控参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 采集来源（v4l:///dev/video0 或 image:///path/to/frame.jpg）
  #[arg(long, value_name = "SOURCE", default_value = "v4l:///dev/video0")]
  pub input: Url,
  /// 检测服务根地址
  #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:8000/")]
  pub endpoint: Url,
  /// 采样周期（毫秒）
  #[arg(long, value_name = "MS", default_value = "2000")]
  pub interval_ms: u64,
  /// 期望采集宽度
  #[arg(long, default_value = "1280")]
  pub width: u32,
  /// 期望采集高度
  #[arg(long, default_value = "720")]
  pub height: u32,
  /// JPEG 质量 (1-100)
  #[arg(long, default_value = "80")]
  pub quality: u8,
  /// 启动时不采样，之后可用 toggle 指令开启
  #[arg(long)]
  pub paused: bool,
  /// 检测请求超时（毫秒）
  #[arg(long, value_name = "MS")]
  pub timeout_ms: Option<u64>,
  /// 标签字体文件（TTF/OTF）
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
  /// 保存叠加后画面，例如 image:///tmp/cctv/latest.png
  #[arg(long, value_name = "OUTPUT")]
  pub snapshot: Option<Url>,
  /// 处理指定数量的周期后退出
  #[arg(long, value_name = "COUNT")]
  pub max_cycles: Option<usize>,
}

impl From<Args> for MonitorConfig {
  fn from(args: Args) -> Self {
    MonitorConfig {
      pipeline: PipelineConfig {
        capture: CaptureRequest {
          width_hint: args.width,
          height_hint: args.height,
          audio: false,
        },
        sample_interval: Duration::from_millis(args.interval_ms),
        sampling_enabled: !args.paused,
        jpeg_quality: args.quality,
        request_timeout: args.timeout_ms.map(Duration::from_millis),
        ..PipelineConfig::default()
      },
      capture_url: args.input,
      endpoint: args.endpoint,
      font: args.font,
      snapshot: args.snapshot,
      max_cycles: args.max_cycles,
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let config = MonitorConfig::from(Args::parse());

  info!("采集来源: {}", config.capture_url);
  info!("检测服务: {}", config.endpoint);
  info!("采样周期: {:?}", config.pipeline.sample_interval);

  let backend = UrlCaptureBackend::from_url(&config.capture_url)?;
  let client = HttpDetectionClient::new(&config.endpoint, config.pipeline.request_timeout)?;
  info!("检测接口: {}", client.endpoint());

  let mut overlay = OverlayRenderer::default();
  if let Some(path) = &config.font {
    overlay = overlay.with_font(OverlayRenderer::load_font(path)?);
  }

  let snapshot = config
    .snapshot
    .as_ref()
    .map(SnapshotOutput::from_url)
    .transpose()?;
  if let Some(snapshot) = &snapshot {
    info!("画面保存至: {}", snapshot.path().display());
  }

  let pipeline = Pipeline::new(backend, Arc::new(client), &config.pipeline).with_overlay(overlay);

  let (tx, rx) = mpsc::channel();
  spawn_stdin_commands(tx);
  info!("指令: toggle(t) reset(r) start stop stats(s) quit(q)");

  MonitorTask::default()
    .with_snapshot(snapshot)
    .with_max_cycles(config.max_cycles)
    .run(pipeline, rx)?;

  Ok(())
}
