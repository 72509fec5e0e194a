// 该文件是 Shanan （山南西风） 项目的一部分。
// src/scheduler.rs - 采样调度（单飞行保证）
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

use std::time::{Duration, Instant};

use tracing::debug;

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(2000);

/// 采样周期编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CycleId(u64);

/// 一次 poll 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
  /// 定时器未运行（未启用或会话未激活）
  Idle,
  /// 尚未到下一个周期
  NotDue,
  /// 到期但上一个周期尚未完成，本次直接跳过
  Skipped,
  /// 到期，调用方应开始新周期并在结束时调用 complete()
  Fire(CycleId),
}

/// 固定周期的采样调度器
///
/// 到期时若已有周期在途则整次跳过，不排队也不延后。在途标记只由本结构体设置与清除。
#[derive(Debug)]
pub struct SampleScheduler {
  interval: Duration,
  enabled: bool,
  running: bool,
  next_due: Option<Instant>,
  in_flight: Option<CycleId>,
  next_cycle: u64,
  skipped: u64,
}

impl SampleScheduler {
  pub fn new(interval: Duration, enabled: bool) -> Self {
    Self {
      interval: interval.max(Duration::from_millis(1)),
      enabled,
      running: false,
      next_due: None,
      in_flight: None,
      next_cycle: 0,
      skipped: 0,
    }
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub fn is_running(&self) -> bool {
    self.running && self.enabled
  }

  pub fn in_flight(&self) -> Option<CycleId> {
    self.in_flight
  }

  pub fn skipped(&self) -> u64 {
    self.skipped
  }

  /// 会话激活后启动定时器，第一次触发在一个周期之后
  pub fn arm(&mut self, now: Instant) {
    self.running = true;
    self.next_due = Some(now + self.interval);
  }

  /// 取消定时器；在途周期保留，由 complete() 清除
  pub fn cancel(&mut self) {
    self.running = false;
    self.next_due = None;
  }

  pub fn set_enabled(&mut self, enabled: bool, now: Instant) {
    if self.enabled == enabled {
      return;
    }
    self.enabled = enabled;
    if enabled && self.running {
      self.next_due = Some(now + self.interval);
    }
  }

  /// 距离下一次到期的时间，用于事件循环等待
  pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
    if !self.is_running() {
      return None;
    }
    self.next_due.map(|due| due.saturating_duration_since(now))
  }

  pub fn poll(&mut self, now: Instant) -> Tick {
    if !self.is_running() {
      return Tick::Idle;
    }
    let Some(due) = self.next_due else {
      return Tick::Idle;
    };
    if now < due {
      return Tick::NotDue;
    }

    // 跳过错过的整周期，保持固定节拍
    let interval = self.interval.as_nanos();
    let periods = (now - due).as_nanos() / interval + 1;
    let offset = Duration::from_nanos(u64::try_from(periods * interval).unwrap_or(u64::MAX));
    self.next_due = Some(due.checked_add(offset).unwrap_or(now + self.interval));

    if let Some(cycle) = self.in_flight {
      self.skipped += 1;
      debug!("周期 {:?} 仍在进行，跳过本次采样", cycle);
      return Tick::Skipped;
    }

    // 先置位再发起网络请求
    self.next_cycle += 1;
    let cycle = CycleId(self.next_cycle);
    self.in_flight = Some(cycle);
    Tick::Fire(cycle)
  }

  /// 周期结束（成功、失败或过期）时清除在途标记
  pub fn complete(&mut self, cycle: CycleId) {
    if self.in_flight == Some(cycle) {
      self.in_flight = None;
    }
  }
}

impl Default for SampleScheduler {
  fn default() -> Self {
    Self::new(DEFAULT_SAMPLE_INTERVAL, true)
  }
}
