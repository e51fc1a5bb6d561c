// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine/replay.rs - 回放已记录的原始输出张量
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

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, engine::InferenceEngine, frame::Tensor};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("记录中没有任何输出张量")]
  Empty,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Recording {
  One(Tensor),
  Many(Vec<Tensor>),
}

/// 依次循环返回预先记录的输出张量，不执行任何计算
#[derive(Debug, Clone)]
pub struct ReplayEngine {
  outputs: Vec<Tensor>,
  cursor: usize,
}

impl FromUrlWithScheme for ReplayEngine {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayEngine {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ReplayError::SchemeMismatch);
    }
    Self::from_json_file(url.path())
  }
}

impl ReplayEngine {
  pub fn new(outputs: Vec<Tensor>) -> Result<Self, ReplayError> {
    if outputs.is_empty() {
      return Err(ReplayError::Empty);
    }
    Ok(Self { outputs, cursor: 0 })
  }

  /// 记录文件为单个张量 `{"shape": [..], "data": [..]}` 或其数组
  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
    let path = path.as_ref();
    info!("加载输出记录: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let outputs = match serde_json::from_str(&content)? {
      Recording::One(tensor) => vec![tensor],
      Recording::Many(tensors) => tensors,
    };
    debug!("共 {} 个输出张量", outputs.len());
    Self::new(outputs)
  }
}

impl InferenceEngine for ReplayEngine {
  type Error = ReplayError;

  fn run(&mut self, input: &Tensor) -> Result<Tensor, Self::Error> {
    debug!("回放第 {} 个输出, 输入形状 {:?}", self.cursor, input.shape());
    let output = self.outputs[self.cursor].clone();
    self.cursor = (self.cursor + 1) % self.outputs.len();
    Ok(output)
  }
}
