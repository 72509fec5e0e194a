// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 采样检测流水线
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

use std::panic::{self, AssertUnwindSafe};
use std::sync::{
  Arc,
  mpsc::{self, Receiver, RecvTimeoutError, Sender},
};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
  aggregate::{AggregateStats, DetectionAggregator, DetectionEvent},
  client::{Detect, DetectError},
  config::PipelineConfig,
  detection::DetectionResult,
  encoder::{EncodeError, FrameEncoder},
  frame::Geometry,
  input::{CaptureBackend, CaptureError},
  output::OverlayRenderer,
  scheduler::{CycleId, SampleScheduler, Tick},
  stream::{SessionId, StreamController, StreamError},
};

/// 工作线程回传的周期结果，带有发起时的会话与周期编号
struct CycleOutcome {
  session: SessionId,
  cycle: CycleId,
  geometry: Geometry,
  result: Result<DetectionResult, DetectError>,
}

/// 一次 tick 做了什么
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
  Idle,
  NotDue,
  /// 上一个周期仍在进行
  Skipped,
  /// 视频尚无可用画面
  NotReady,
  Issued(CycleId),
}

/// 周期结果的处理方式
#[derive(Debug)]
pub enum CycleStatus {
  Applied { cycle: CycleId, detections: usize },
  Failed { cycle: CycleId, error: DetectError },
  /// 会话已停止或已重启，结果被丢弃
  Stale { cycle: CycleId },
}

pub struct Pipeline<B> {
  stream: StreamController<B>,
  scheduler: SampleScheduler,
  encoder: FrameEncoder,
  client: Arc<dyn Detect>,
  overlay: OverlayRenderer,
  aggregator: DetectionAggregator,
  tx: Sender<CycleOutcome>,
  rx: Receiver<CycleOutcome>,
}

impl<B: CaptureBackend> Pipeline<B> {
  pub fn new(backend: B, client: Arc<dyn Detect>, config: &PipelineConfig) -> Self {
    let (tx, rx) = mpsc::channel();
    Self {
      stream: StreamController::new(backend, config.capture),
      scheduler: SampleScheduler::new(config.sample_interval, config.sampling_enabled),
      encoder: FrameEncoder::new(config.jpeg_quality),
      client,
      overlay: OverlayRenderer::default(),
      aggregator: DetectionAggregator::new(config.event_capacity),
      tx,
      rx,
    }
  }

  pub fn with_overlay(mut self, overlay: OverlayRenderer) -> Self {
    self.overlay = overlay;
    self
  }

  pub fn stream(&self) -> &StreamController<B> {
    &self.stream
  }

  pub fn scheduler(&self) -> &SampleScheduler {
    &self.scheduler
  }

  pub fn overlay(&self) -> &OverlayRenderer {
    &self.overlay
  }

  pub fn stats(&self) -> &AggregateStats {
    self.aggregator.stats()
  }

  pub fn events(&self) -> impl ExactSizeIterator<Item = &DetectionEvent> {
    self.aggregator.events()
  }

  pub fn is_active(&self) -> bool {
    self.stream.is_active()
  }

  /// 获取设备并启动采样定时器
  pub fn start(&mut self, now: Instant) -> Result<SessionId, StreamError> {
    let session = self.stream.start()?;
    self.scheduler.arm(now);
    Ok(session)
  }

  /// 取消定时器并释放设备；在途请求的结果到达后会被丢弃
  pub fn stop(&mut self) {
    self.scheduler.cancel();
    self.stream.stop();
  }

  pub fn set_sampling(&mut self, enabled: bool, now: Instant) {
    self.scheduler.set_enabled(enabled, now);
    info!("采样已{}", if enabled { "启用" } else { "停用" });
  }

  pub fn toggle_sampling(&mut self, now: Instant) -> bool {
    let enabled = !self.scheduler.is_enabled();
    self.set_sampling(enabled, now);
    enabled
  }

  /// 清零统计与事件记录，叠加层保持不变
  pub fn reset(&mut self) {
    self.aggregator.reset();
    info!("统计已重置");
  }

  /// 从设备读取一帧到播放区域
  pub fn pump_frame(&mut self) -> Result<(), CaptureError> {
    self.stream.pump_frame()
  }

  pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
    self.scheduler.time_until_due(now)
  }

  /// 推进定时器，到期时编码当前画面并在工作线程中发起检测
  pub fn tick(&mut self, now: Instant) -> TickOutcome {
    let cycle = match self.scheduler.poll(now) {
      Tick::Idle => return TickOutcome::Idle,
      Tick::NotDue => return TickOutcome::NotDue,
      Tick::Skipped => return TickOutcome::Skipped,
      Tick::Fire(cycle) => cycle,
    };

    let Some(session) = self.stream.session_id().filter(|_| self.stream.is_active()) else {
      self.scheduler.complete(cycle);
      return TickOutcome::Idle;
    };

    let captured_at = self
      .stream
      .surface()
      .current_frame()
      .map_or(0, |f| f.timestamp_ms);
    let frame = match self.encoder.encode(self.stream.surface().current_frame()) {
      Ok(frame) => frame,
      Err(EncodeError::NotReady) => {
        self.scheduler.complete(cycle);
        return TickOutcome::NotReady;
      }
      Err(e) => {
        warn!("帧编码失败: {}", e);
        self.scheduler.complete(cycle);
        return TickOutcome::NotReady;
      }
    };

    let client = self.client.clone();
    let tx = self.tx.clone();
    let geometry = frame.geometry;
    let spawned = thread::Builder::new()
      .name("cctv-detect".to_string())
      .spawn(move || {
        // 无论检测成功、失败还是 panic，都必须回传结果以释放在途标记
        let result = panic::catch_unwind(AssertUnwindSafe(|| client.detect(&frame)))
          .unwrap_or_else(|cause| Err(DetectError::Malformed(panic_message(&*cause))));
        // 接收端随流水线一起释放，此时结果已无意义
        let _ = tx.send(CycleOutcome {
          session,
          cycle,
          geometry,
          result,
        });
      });

    match spawned {
      Ok(_) => {
        debug!(
          "周期 {:?} 已发起 ({}x{}, 帧时间 {}ms)",
          cycle, geometry.width, geometry.height, captured_at
        );
        TickOutcome::Issued(cycle)
      }
      Err(e) => {
        warn!("无法启动检测线程: {}", e);
        self.scheduler.complete(cycle);
        TickOutcome::NotReady
      }
    }
  }

  /// 处理所有已到达的周期结果，不阻塞
  pub fn poll_outcomes(&mut self) -> Vec<CycleStatus> {
    let mut statuses = Vec::new();
    while let Ok(outcome) = self.rx.try_recv() {
      statuses.push(self.apply_outcome(outcome));
    }
    statuses
  }

  /// 最多等待 timeout，处理一个周期结果
  pub fn wait_outcome(&mut self, timeout: Duration) -> Option<CycleStatus> {
    match self.rx.recv_timeout(timeout) {
      Ok(outcome) => Some(self.apply_outcome(outcome)),
      Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
    }
  }

  fn apply_outcome(&mut self, outcome: CycleOutcome) -> CycleStatus {
    let CycleOutcome {
      session,
      cycle,
      geometry,
      result,
    } = outcome;
    self.scheduler.complete(cycle);

    if !self.stream.is_active() || self.stream.session_id() != Some(session) {
      debug!("周期 {:?} 的结果已过期，丢弃", cycle);
      return CycleStatus::Stale { cycle };
    }

    match result {
      Ok(result) => {
        // 叠加层与汇总在同一步中更新
        let geometry = self.stream.geometry().unwrap_or(geometry);
        self.overlay.render(&result, geometry);
        self.aggregator.apply(&result, Utc::now());
        if let Some(elapsed) = result.processing_time {
          debug!("周期 {:?} 服务端耗时: {:.2?}", cycle, elapsed);
        }
        CycleStatus::Applied {
          cycle,
          detections: result.boxes.len(),
        }
      }
      Err(error) => {
        debug!("周期 {:?} 检测失败 ({}): {}", cycle, error.kind(), error);
        CycleStatus::Failed { cycle, error }
      }
    }
  }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> String {
  let detail = cause
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| cause.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "未知原因".to_string());
  format!("检测线程异常退出: {}", detail)
}
