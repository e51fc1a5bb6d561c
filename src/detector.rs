// 该文件是 Beifeng （北风） 项目的一部分。
// src/detector.rs - 检测流水线：预处理 -> 推理 -> 解码 -> 抑制
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
use tracing::{debug, info};

use crate::{
  config::{ConfigError, DetectConfig},
  decode::{DecodeError, decode_tensor},
  engine::InferenceEngine,
  frame::{PixelBuffer, RgbaFrame},
  model::{DetectResult, Model, ModelDescriptor},
  preprocess::{PreprocessError, preprocess},
  suppress::suppress,
};

#[derive(Error, Debug)]
pub enum DetectError<E: std::error::Error + 'static> {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("预处理错误: {0}")]
  Preprocess(#[from] PreprocessError),
  #[error("推理错误: {0}")]
  Engine(#[source] E),
  #[error("解码错误: {0}")]
  Decode(#[from] DecodeError),
}

/// 单个模型实例上的检测器
///
/// 模型描述与推理引擎在加载时确定；检测参数可以随时替换，每次调用前都会校验。
pub struct Detector<E> {
  engine: E,
  model: ModelDescriptor,
  config: DetectConfig,
}

impl<E: InferenceEngine> Detector<E> {
  pub fn new(engine: E, model: ModelDescriptor, config: DetectConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    Ok(Self {
      engine,
      model,
      config,
    })
  }

  pub fn model(&self) -> &ModelDescriptor {
    &self.model
  }

  pub fn config(&self) -> &DetectConfig {
    &self.config
  }

  pub fn set_config(&mut self, config: DetectConfig) -> Result<(), ConfigError> {
    config.validate()?;
    self.config = config;
    Ok(())
  }

  pub fn into_engine(self) -> E {
    self.engine
  }

  pub fn detect(&mut self, pixels: PixelBuffer<'_>) -> Result<DetectResult, DetectError<E::Error>> {
    let config = self.config;
    self.detect_with(pixels, &config)
  }

  /// 使用单次调用的参数执行检测
  pub fn detect_with(
    &mut self,
    pixels: PixelBuffer<'_>,
    config: &DetectConfig,
  ) -> Result<DetectResult, DetectError<E::Error>> {
    config.validate()?;

    let input = preprocess(
      pixels,
      self.model.network_width(),
      self.model.network_height(),
    )?;

    debug!("执行推理, 输入 {}", self.model.input_name());
    let output = self.engine.run(&input).map_err(DetectError::Engine)?;
    debug!(
      "获取输出 {}, 形状 {:?}",
      self.model.output_name(),
      output.shape()
    );

    let candidates = decode_tensor(&output, &self.model, config.min_confidence)?;
    let boxes = suppress(&candidates, config.object_limit, config.iou_threshold);
    info!(
      "检测到 {} 个物体 (候选 {})",
      boxes.len(),
      candidates.len()
    );

    Ok(boxes.into())
  }
}

impl<E: InferenceEngine> Model for Detector<E> {
  type Input = RgbaFrame;
  type Output = DetectResult;
  type Error = DetectError<E::Error>;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input.as_pixels())
  }
}
