// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 监控任务主循环
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

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::{
  input::CaptureBackend,
  output::{SnapshotOutput, event_line, status_line},
  pipeline::{CycleStatus, Pipeline},
};

/// 两次取帧之间的最长等待
const FRAME_WAIT: Duration = Duration::from_millis(33);
/// 连续取帧失败达到该次数后打印警告
const FRAME_ERROR_WARN_EVERY: u64 = 30;

/// 操作员指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
  ToggleSampling,
  Reset,
  Start,
  Stop,
  Stats,
  Quit,
}

impl OperatorCommand {
  pub fn parse(line: &str) -> Option<Self> {
    match line.trim().to_ascii_lowercase().as_str() {
      "t" | "toggle" => Some(OperatorCommand::ToggleSampling),
      "r" | "reset" => Some(OperatorCommand::Reset),
      "start" => Some(OperatorCommand::Start),
      "stop" => Some(OperatorCommand::Stop),
      "s" | "stats" => Some(OperatorCommand::Stats),
      "q" | "quit" | "exit" => Some(OperatorCommand::Quit),
      _ => None,
    }
  }
}

/// 在后台线程读取标准输入中的指令
pub fn spawn_stdin_commands(tx: Sender<OperatorCommand>) {
  thread::spawn(move || {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
      let Ok(line) = line else {
        break;
      };
      match OperatorCommand::parse(&line) {
        Some(command) => {
          if tx.send(command).is_err() {
            break;
          }
        }
        None if line.trim().is_empty() => {}
        None => warn!("未知指令: {}", line.trim()),
      }
    }
  });
}

/// 持续运行的监控任务
#[derive(Default)]
pub struct MonitorTask {
  snapshot: Option<SnapshotOutput>,
  max_cycles: Option<usize>,
}

impl MonitorTask {
  pub fn with_snapshot(mut self, snapshot: Option<SnapshotOutput>) -> Self {
    self.snapshot = snapshot;
    self
  }

  pub fn with_max_cycles(mut self, max_cycles: Option<usize>) -> Self {
    self.max_cycles = max_cycles;
    self
  }

  pub fn run<B: CaptureBackend>(
    self,
    mut pipeline: Pipeline<B>,
    commands: Receiver<OperatorCommand>,
  ) -> anyhow::Result<()> {
    info!("开始监控任务...");
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
    })?;

    pipeline.start(Instant::now())?;

    let mut finished_cycles = 0usize;
    let mut frame_errors = 0u64;
    loop {
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }

      match commands.try_recv() {
        Ok(OperatorCommand::Quit) => {
          info!("操作员请求退出");
          break;
        }
        Ok(command) => self.handle_command(&mut pipeline, command),
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
      }

      if pipeline.is_active() {
        match pipeline.pump_frame() {
          Ok(()) => frame_errors = 0,
          Err(e) => {
            frame_errors += 1;
            if frame_errors % FRAME_ERROR_WARN_EVERY == 1 {
              warn!("取帧失败 ({} 次): {}", frame_errors, e);
            }
          }
        }
      }

      pipeline.tick(Instant::now());

      let wait = pipeline
        .time_until_due(Instant::now())
        .map_or(FRAME_WAIT, |due| due.min(FRAME_WAIT));
      if let Some(status) = pipeline.wait_outcome(wait) {
        self.report(&pipeline, &status);
        if !matches!(status, CycleStatus::Stale { .. }) {
          finished_cycles += 1;
        }
      }
      for status in pipeline.poll_outcomes() {
        self.report(&pipeline, &status);
        if !matches!(status, CycleStatus::Stale { .. }) {
          finished_cycles += 1;
        }
      }

      if self.max_cycles.is_some_and(|n| finished_cycles >= n) {
        info!("达到指定周期数 {}, 退出任务循环", finished_cycles);
        break;
      }
    }

    pipeline.stop();
    info!("任务完成，退出: {}", status_line(pipeline.stats()));
    Ok(())
  }

  fn handle_command<B: CaptureBackend>(
    &self,
    pipeline: &mut Pipeline<B>,
    command: OperatorCommand,
  ) {
    match command {
      OperatorCommand::ToggleSampling => {
        pipeline.toggle_sampling(Instant::now());
      }
      OperatorCommand::Reset => pipeline.reset(),
      OperatorCommand::Start => {
        if let Err(e) = pipeline.start(Instant::now()) {
          error!("{}", e);
        }
      }
      OperatorCommand::Stop => {
        pipeline.stop();
        info!("采集已停止");
      }
      OperatorCommand::Stats => {
        info!("{}", status_line(pipeline.stats()));
        for event in pipeline.events() {
          info!("  {}", event_line(event));
        }
      }
      OperatorCommand::Quit => {}
    }
  }

  fn report<B: CaptureBackend>(&self, pipeline: &Pipeline<B>, status: &CycleStatus) {
    let CycleStatus::Applied { cycle, detections } = status else {
      return;
    };
    info!(
      "周期 {:?}: 检测到 {} 个目标 | {}",
      cycle,
      detections,
      status_line(pipeline.stats())
    );

    if let Some(snapshot) = &self.snapshot
      && let Some(frame) = pipeline.stream().surface().current_frame()
      && let Err(e) = snapshot.save(frame, pipeline.overlay().surface())
    {
      warn!("保存画面失败: {}", e);
    }
  }
}
