// 该文件是 Shanan （山南西风） 项目的一部分。
// src/client.rs - 远程检测服务客户端
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

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl,
  category::{CategoryCounts, DetectionCategory},
  detection::{DetectionBox, DetectionResult, RelativeBox},
  encoder::EncodedFrame,
};

pub const DETECT_PATH: &str = "api/cctv/detect";
const FORM_FIELD: &str = "file";
const FORM_FILENAME: &str = "frame.jpg";
const BOUNDARY: &str = "----shanan-cctv-frame-boundary";

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("网络传输错误: {0}")]
  Transport(String),
  #[error("检测服务拒绝请求: {0}")]
  Rejected(String),
  #[error("检测服务响应格式错误: {0}")]
  Malformed(String),
}

impl DetectError {
  pub fn kind(&self) -> &'static str {
    match self {
      DetectError::Transport(_) => "transport",
      DetectError::Rejected(_) => "rejected",
      DetectError::Malformed(_) => "malformed",
    }
  }
}

/// 对一帧执行检测；实现需可在工作线程中调用
pub trait Detect: Send + Sync {
  fn detect(&self, frame: &EncodedFrame) -> Result<DetectionResult, DetectError>;
}

/// 通过 HTTP multipart 调用 `POST /api/cctv/detect`
pub struct HttpDetectionClient {
  endpoint: Url,
  agent: ureq::Agent,
}

impl FromUrl for HttpDetectionClient {
  type Error = DetectError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    Self::new(url, None)
  }
}

impl HttpDetectionClient {
  /// `base` 为服务根地址，例如 `http://127.0.0.1:8000/`
  pub fn new(base: &Url, timeout: Option<Duration>) -> Result<Self, DetectError> {
    match base.scheme() {
      "http" | "https" => {}
      other => {
        return Err(DetectError::Transport(format!(
          "不支持的 URI 方案 '{}'",
          other
        )));
      }
    }

    let mut base = base.clone();
    if !base.path().ends_with('/') {
      base.set_path(&format!("{}/", base.path()));
    }
    let endpoint = base
      .join(DETECT_PATH)
      .map_err(|e| DetectError::Transport(e.to_string()))?;

    let mut builder = ureq::AgentBuilder::new();
    if let Some(timeout) = timeout {
      builder = builder.timeout(timeout);
    }

    Ok(Self {
      endpoint,
      agent: builder.build(),
    })
  }

  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }
}

impl Detect for HttpDetectionClient {
  fn detect(&self, frame: &EncodedFrame) -> Result<DetectionResult, DetectError> {
    let body = multipart_body(&frame.bytes);
    let response = self
      .agent
      .post(self.endpoint.as_str())
      .set(
        "Content-Type",
        &format!("multipart/form-data; boundary={}", BOUNDARY),
      )
      .send_bytes(&body);

    let response = match response {
      Ok(response) => response,
      Err(ureq::Error::Status(code, response)) => {
        return Err(DetectError::Rejected(format!(
          "HTTP {} {}",
          code,
          response.status_text()
        )));
      }
      Err(ureq::Error::Transport(e)) => return Err(DetectError::Transport(e.to_string())),
    };

    let text = response
      .into_string()
      .map_err(|e| DetectError::Transport(e.to_string()))?;
    parse_response(&text)
  }
}

fn multipart_body(jpeg: &[u8]) -> Vec<u8> {
  let head = format!(
    "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"{n}\"\r\n\
     Content-Type: {m}\r\n\r\n",
    b = BOUNDARY,
    f = FORM_FIELD,
    n = FORM_FILENAME,
    m = EncodedFrame::MIME,
  );
  let tail = format!("\r\n--{}--\r\n", BOUNDARY);

  let mut body = Vec::with_capacity(head.len() + jpeg.len() + tail.len());
  body.extend_from_slice(head.as_bytes());
  body.extend_from_slice(jpeg);
  body.extend_from_slice(tail.as_bytes());
  body
}

#[derive(Deserialize, Debug)]
struct WireResponse {
  success: bool,
  #[serde(default)]
  statistics: Option<WireStatistics>,
  #[serde(default)]
  detections: Vec<WireDetection>,
  #[serde(default)]
  processing_time_ms: Option<f64>,
  #[serde(default)]
  message: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct WireStatistics {
  human: u64,
  car: u64,
  motorcycle: u64,
  bicycle: u64,
  animal: u64,
}

#[derive(Deserialize, Debug)]
struct WireDetection {
  #[serde(rename = "type")]
  kind: String,
  confidence: f32,
  bbox: WireBox,
}

#[derive(Deserialize, Debug)]
struct WireBox {
  x: f32,
  y: f32,
  width: f32,
  height: f32,
}

/// 解析检测服务的 JSON 响应
pub fn parse_response(text: &str) -> Result<DetectionResult, DetectError> {
  let wire: WireResponse =
    serde_json::from_str(text).map_err(|e| DetectError::Malformed(e.to_string()))?;

  if !wire.success {
    return Err(DetectError::Rejected(
      wire.message.unwrap_or_else(|| "success=false".to_string()),
    ));
  }

  let boxes: Vec<DetectionBox> = wire
    .detections
    .into_iter()
    .filter_map(|item| match DetectionCategory::from_wire(&item.kind) {
      Some(category) => Some(DetectionBox::new(
        category,
        item.confidence,
        RelativeBox::new(item.bbox.x, item.bbox.y, item.bbox.width, item.bbox.height),
      )),
      None => {
        debug!("忽略未知类别: {}", item.kind);
        None
      }
    })
    .collect();

  let mut result = match wire.statistics {
    Some(stats) => {
      let mut counts = CategoryCounts::default();
      counts.set(DetectionCategory::Human, stats.human);
      counts.set(DetectionCategory::Vehicle, stats.car);
      counts.set(DetectionCategory::Motorcycle, stats.motorcycle);
      counts.set(DetectionCategory::Bicycle, stats.bicycle);
      counts.set(DetectionCategory::Animal, stats.animal);
      DetectionResult {
        total: counts.sum(),
        boxes,
        counts,
        processing_time: None,
      }
    }
    None => DetectionResult::from_boxes(boxes),
  };

  result.processing_time = wire
    .processing_time_ms
    .filter(|ms| ms.is_finite() && *ms >= 0.0)
    .and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok());

  Ok(result)
}

#[cfg(test)]
mod tests {
  use std::io::{Read, Write};
  use std::net::{TcpListener, TcpStream};
  use std::thread::{self, JoinHandle};

  use super::*;

  #[test]
  fn parses_successful_response() {
    let text = r#"{
      "success": true,
      "statistics": {"human": 1, "car": 2, "motorcycle": 0, "bicycle": 0, "animal": 0, "total": 3},
      "detections": [
        {"type": "human", "confidence": 0.9,
         "bbox": {"x": 0.1, "y": 0.1, "width": 0.2, "height": 0.2}},
        {"type": "car", "confidence": 0.75,
         "bbox": {"x": 0.5, "y": 0.4, "width": 0.3, "height": 0.2}},
        {"type": "car", "confidence": 0.6,
         "bbox": {"x": 0.0, "y": 0.6, "width": 0.3, "height": 0.2}}
      ],
      "processing_time_ms": 42.5
    }"#;
    let result = parse_response(text).unwrap();
    assert_eq!(result.boxes.len(), 3);
    assert_eq!(result.boxes[0].category, DetectionCategory::Human);
    assert_eq!(result.counts.get(DetectionCategory::Vehicle), 2);
    assert_eq!(result.total, 3);
    let elapsed = result.processing_time.unwrap();
    assert!((elapsed.as_secs_f64() * 1000.0 - 42.5).abs() < 1e-3);
  }

  #[test]
  fn success_false_is_rejected() {
    let err = parse_response(r#"{"success": false, "message": "model offline"}"#).unwrap_err();
    assert_eq!(err.kind(), "rejected");
  }

  #[test]
  fn garbage_is_malformed() {
    assert_eq!(parse_response("<html>").unwrap_err().kind(), "malformed");
    assert_eq!(
      parse_response(r#"{"success": true, "detections": [{"type": "human"}]}"#)
        .unwrap_err()
        .kind(),
      "malformed"
    );
  }

  #[test]
  fn missing_statistics_falls_back_to_boxes() {
    let text = r#"{"success": true, "detections": [
      {"type": "person", "confidence": 0.8,
       "bbox": {"x": 0.1, "y": 0.1, "width": 0.1, "height": 0.1}},
      {"type": "ufo", "confidence": 0.8,
       "bbox": {"x": 0.1, "y": 0.1, "width": 0.1, "height": 0.1}}
    ]}"#;
    let result = parse_response(text).unwrap();
    assert_eq!(result.boxes.len(), 1);
    assert_eq!(result.counts.get(DetectionCategory::Human), 1);
    assert_eq!(result.total, 1);
    assert!(result.processing_time.is_none());
  }

  #[test]
  fn unrepresentable_processing_time_is_dropped() {
    let text = r#"{"success": true, "detections": [], "processing_time_ms": 1e30}"#;
    let result = parse_response(text).unwrap();
    assert!(result.boxes.is_empty());
    assert!(result.processing_time.is_none());

    let text = r#"{"success": true, "detections": [], "processing_time_ms": -3.0}"#;
    assert!(parse_response(text).unwrap().processing_time.is_none());
  }

  #[test]
  fn endpoint_joins_detect_path() {
    let base = Url::parse("http://127.0.0.1:8000/backend").unwrap();
    let client = HttpDetectionClient::new(&base, None).unwrap();
    assert_eq!(
      client.endpoint().as_str(),
      "http://127.0.0.1:8000/backend/api/cctv/detect"
    );
  }

  #[test]
  fn non_http_base_is_refused() {
    let base = Url::parse("ftp://example.com/").unwrap();
    assert!(HttpDetectionClient::from_url(&base).is_err());
  }

  #[test]
  fn multipart_body_wraps_payload() {
    let body = multipart_body(b"JPEG");
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("name=\"file\"; filename=\"frame.jpg\""));
    assert!(text.contains("Content-Type: image/jpeg\r\n\r\nJPEG\r\n"));
    assert!(text.ends_with(&format!("--{}--\r\n", BOUNDARY)));
  }

  /// 只应答一次的本地 HTTP 服务，返回收到的完整请求
  fn serve_once(status: &'static str, body: &'static str) -> (Url, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
    let handle = thread::spawn(move || {
      let (mut socket, _) = listener.accept().unwrap();
      let request = read_request(&mut socket);
      let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        status,
        body.len(),
        body
      );
      socket.write_all(response.as_bytes()).unwrap();
      socket.flush().unwrap();
      String::from_utf8_lossy(&request).into_owned()
    });
    (base, handle)
  }

  fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
      let n = socket.read(&mut buf).unwrap();
      if n == 0 {
        return request;
      }
      request.extend_from_slice(&buf[..n]);

      let Some(split) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
        continue;
      };
      let head = String::from_utf8_lossy(&request[..split]).to_ascii_lowercase();
      let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
      if request.len() >= split + 4 + length {
        return request;
      }
    }
  }

  fn sample_frame() -> EncodedFrame {
    EncodedFrame {
      bytes: b"\xff\xd8JPEG\xff\xd9".to_vec(),
      geometry: crate::frame::Geometry::new(4, 4),
      frame_index: 0,
    }
  }

  fn stub_client(base: &Url) -> HttpDetectionClient {
    HttpDetectionClient::new(base, Some(Duration::from_secs(5))).unwrap()
  }

  #[test]
  fn posts_multipart_frame_to_detect_path() {
    let (base, server) = serve_once(
      "200 OK",
      r#"{"success": true, "detections": [
        {"type": "human", "confidence": 0.9,
         "bbox": {"x": 0.1, "y": 0.1, "width": 0.2, "height": 0.2}}
      ]}"#,
    );
    let result = stub_client(&base).detect(&sample_frame()).unwrap();
    assert_eq!(result.boxes.len(), 1);

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /api/cctv/detect HTTP/1.1\r\n"));
    assert!(request.contains(&format!("multipart/form-data; boundary={}", BOUNDARY)));
    assert!(request.contains("name=\"file\"; filename=\"frame.jpg\""));
    assert!(request.contains("JPEG"));
  }

  #[test]
  fn server_error_status_is_rejected() {
    let (base, server) = serve_once("500 Internal Server Error", r#"{"detail": "boom"}"#);
    let err = stub_client(&base).detect(&sample_frame()).unwrap_err();
    assert_eq!(err.kind(), "rejected");
    assert!(err.to_string().contains("500"));
    server.join().unwrap();
  }

  #[test]
  fn success_false_over_http_is_rejected() {
    let (base, server) = serve_once("200 OK", r#"{"success": false}"#);
    let err = stub_client(&base).detect(&sample_frame()).unwrap_err();
    assert_eq!(err.kind(), "rejected");
    server.join().unwrap();
  }

  #[test]
  fn refused_connection_is_transport_error() {
    let port = TcpListener::bind("127.0.0.1:0")
      .unwrap()
      .local_addr()
      .unwrap()
      .port();
    let base = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
    let err = stub_client(&base).detect(&sample_frame()).unwrap_err();
    assert_eq!(err.kind(), "transport");
  }
}
