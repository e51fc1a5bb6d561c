// 该文件是 Beifeng （北风） 项目的一部分。
// src/config.rs - 检测参数配置
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_OBJECT_LIMIT: usize = 20;

/// 配置错误，均在张量处理开始前报告
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("{name} 必须位于 [0, 1] 区间, 实际为 {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
  #[error("模型类别表为空")]
  EmptyLabels,
  #[error("声明的类别数 {declared} 与类别名称数量 {labels} 不一致")]
  ClassCountMismatch { declared: usize, labels: usize },
  #[error("网络输入尺寸无效: {width}x{height}")]
  InvalidNetworkSize { width: usize, height: usize },
  #[error("输出行数不能为 0")]
  ZeroOutputRows,
  #[error("未知的输出布局: {0}")]
  UnknownLayout(String),
}

#[derive(Error, Debug)]
pub enum ConfigLoadError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("配置无效: {0}")]
  Invalid(#[from] ConfigError),
}

/// 每次调用（或每个会话）可调的检测参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
  pub min_confidence: f32,
  pub iou_threshold: f32,
  pub object_limit: usize,
}

impl Default for DetectConfig {
  fn default() -> Self {
    Self {
      min_confidence: DEFAULT_MIN_CONFIDENCE,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      object_limit: DEFAULT_OBJECT_LIMIT,
    }
  }
}

impl DetectConfig {
  pub fn with_min_confidence(mut self, value: f32) -> Self {
    self.min_confidence = value;
    self
  }

  pub fn with_iou_threshold(mut self, value: f32) -> Self {
    self.iou_threshold = value;
    self
  }

  pub fn with_object_limit(mut self, value: usize) -> Self {
    self.object_limit = value;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    check_unit("min_confidence", self.min_confidence)?;
    check_unit("iou_threshold", self.iou_threshold)?;
    Ok(())
  }

  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
    let path = path.as_ref();
    info!("加载配置文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let config: DetectConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
  }
}

pub(crate) fn check_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
  // NaN 不落在任何区间内
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(ConfigError::ThresholdOutOfRange { name, value })
  }
}
