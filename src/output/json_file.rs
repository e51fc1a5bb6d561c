// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/json_file.rs - 以 JSON Lines 形式保存检测结果
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::Path,
  sync::Mutex,
};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbaFrame,
  model::{BoundingBox, DetectResult},
  output::Render,
};

const STDOUT_PATH: &str = "-";

#[derive(Error, Debug)]
pub enum JsonFileOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("输出锁已损坏")]
  Poisoned,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
  frame: u64,
  width: usize,
  height: usize,
  detections: &'a [BoundingBox],
}

struct Sink {
  writer: Box<dyn Write + Send>,
  frame_counter: u64,
}

/// 每帧一行 JSON；路径为 `-` 时写到标准输出
pub struct JsonFileOutput {
  sink: Mutex<Sink>,
}

impl FromUrlWithScheme for JsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonFileOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let path = url.path();
    if path == STDOUT_PATH || path == "/-" {
      return Ok(Self::from_writer(std::io::stdout()));
    }
    Self::create(path)
  }
}

impl JsonFileOutput {
  pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, JsonFileOutputError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    warn!("保存检测结果到文件: {}", path.display());
    Ok(Self::from_writer(BufWriter::new(file)))
  }

  pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
    Self {
      sink: Mutex::new(Sink {
        writer: Box::new(writer),
        frame_counter: 0,
      }),
    }
  }
}

impl Render<RgbaFrame, DetectResult> for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn render_result(&self, frame: &RgbaFrame, result: &DetectResult) -> Result<(), Self::Error> {
    let mut sink = self
      .sink
      .lock()
      .map_err(|_| JsonFileOutputError::Poisoned)?;
    sink.frame_counter += 1;
    let record = FrameRecord {
      frame: sink.frame_counter,
      width: frame.width(),
      height: frame.height(),
      detections: &result.items,
    };
    serde_json::to_writer(&mut sink.writer, &record)?;
    sink.writer.write_all(b"\n")?;
    sink.writer.flush()?;
    debug!("已写入第 {} 帧结果", record.frame);
    Ok(())
  }
}
