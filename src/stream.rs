// 该文件是 Shanan （山南西风） 项目的一部分。
// src/stream.rs - 采集会话控制
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
use tracing::{debug, error, info};

use crate::{
  frame::{Geometry, VideoFrame},
  input::{CaptureBackend, CaptureDevice, CaptureError, CaptureRequest},
};

#[derive(Error, Debug)]
pub enum StreamError {
  /// 需要同步告知操作员
  #[error("摄像头不可用: {0}")]
  Capability(#[from] CaptureError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
  Idle,
  Requesting,
  Active,
}

/// 会话标识，每次成功 start() 递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

/// 播放区域：保存最近一帧画面，尺寸在第一帧到达前未知
#[derive(Debug, Default)]
pub struct VideoSurface {
  current: Option<VideoFrame>,
  attached: bool,
}

impl VideoSurface {
  pub fn is_attached(&self) -> bool {
    self.attached
  }

  /// 只有收到非空画面后才有尺寸
  pub fn geometry(&self) -> Option<Geometry> {
    self
      .current
      .as_ref()
      .map(VideoFrame::geometry)
      .filter(Geometry::is_playable)
  }

  pub fn current_frame(&self) -> Option<&VideoFrame> {
    self.current.as_ref()
  }

  fn attach(&mut self) {
    self.attached = true;
    self.current = None;
  }

  fn present(&mut self, frame: VideoFrame) {
    if self.attached {
      self.current = Some(frame);
    }
  }

  fn detach(&mut self) {
    self.attached = false;
    self.current = None;
  }
}

struct StreamSession {
  id: SessionId,
  device: Box<dyn CaptureDevice>,
}

/// 独占采集设备的控制器
pub struct StreamController<B> {
  backend: B,
  request: CaptureRequest,
  state: StreamState,
  session: Option<StreamSession>,
  surface: VideoSurface,
  next_session: u64,
}

impl<B: CaptureBackend> StreamController<B> {
  pub fn new(backend: B, request: CaptureRequest) -> Self {
    Self {
      backend,
      request,
      state: StreamState::Idle,
      session: None,
      surface: VideoSurface::default(),
      next_session: 0,
    }
  }

  pub fn state(&self) -> StreamState {
    self.state
  }

  pub fn is_active(&self) -> bool {
    self.state == StreamState::Active
  }

  pub fn session_id(&self) -> Option<SessionId> {
    self.session.as_ref().map(|session| session.id)
  }

  /// 会话尺寸：优先使用播放区域上报的尺寸
  pub fn geometry(&self) -> Option<Geometry> {
    self.surface.geometry().or_else(|| {
      self
        .session
        .as_ref()
        .and_then(|session| session.device.geometry())
        .filter(Geometry::is_playable)
    })
  }

  pub fn surface(&self) -> &VideoSurface {
    &self.surface
  }

  pub fn active_tracks(&self) -> usize {
    self
      .session
      .as_ref()
      .map(|session| session.device.active_tracks())
      .unwrap_or(0)
  }

  /// 获取设备并挂到播放区域；已有会话时直接返回该会话
  pub fn start(&mut self) -> Result<SessionId, StreamError> {
    if let Some(session) = &self.session {
      debug!("会话已在运行: {:?}", session.id);
      return Ok(session.id);
    }

    self.state = StreamState::Requesting;
    info!(
      "请求采集设备: {}x{}",
      self.request.width_hint, self.request.height_hint
    );

    match self.backend.open(&self.request) {
      Ok(device) => {
        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.session = Some(StreamSession { id, device });
        self.surface.attach();
        self.state = StreamState::Active;
        info!("采集会话已建立: {:?}", id);
        Ok(id)
      }
      Err(e) => {
        self.state = StreamState::Idle;
        error!("无法获取采集设备: {}", e);
        Err(StreamError::Capability(e))
      }
    }
  }

  /// 从设备读取一帧送到播放区域
  pub fn pump_frame(&mut self) -> Result<(), CaptureError> {
    let Some(session) = self.session.as_mut() else {
      return Ok(());
    };
    let frame = session.device.read_frame()?;
    self.surface.present(frame);
    Ok(())
  }

  /// 停止全部轨道并释放设备，任何状态下都可调用
  pub fn stop(&mut self) {
    if let Some(mut session) = self.session.take() {
      session.device.stop();
      info!("采集会话已释放: {:?}", session.id);
    }
    self.surface.detach();
    self.state = StreamState::Idle;
  }
}

impl<B> Drop for StreamController<B> {
  fn drop(&mut self) {
    if let Some(mut session) = self.session.take() {
      session.device.stop();
    }
  }
}
