// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine.rs - 推理引擎接口
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
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Tensor,
  model::{ModelDescriptor, ModelDescriptorBuilder},
};

/// 给定已知形状的归一化输入，返回已知形状的原始输出
///
/// 执行缓冲区是单一可变资源，`&mut self` 保证同一实例同时只处理一个请求；
/// 并发请求需要各自持有独立实例。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  fn run(&mut self, input: &Tensor) -> Result<Tensor, Self::Error>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
  type Error = E::Error;

  fn run(&mut self, input: &Tensor) -> Result<Tensor, Self::Error> {
    (**self).run(input)
  }
}

mod replay;
pub use self::replay::{ReplayEngine, ReplayError};

#[cfg(feature = "backend_tract")]
mod tract;
#[cfg(feature = "backend_tract")]
pub use self::tract::{TractEngine, TractEngineBuilder, TractError};

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("回放引擎错误: {0}")]
  Replay(#[from] ReplayError),
  #[cfg(feature = "backend_tract")]
  #[error("tract 引擎错误: {0}")]
  Tract(#[from] TractError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 按 URL 方案选择的推理引擎
pub enum EngineWrapper {
  Replay(ReplayEngine),
  #[cfg(feature = "backend_tract")]
  Tract(TractEngine),
}

impl EngineWrapper {
  /// 从模型文件读取的模型描述；回放记录不携带元数据，返回默认构建器
  pub fn model_descriptor(url: &Url) -> Result<ModelDescriptorBuilder, EngineError> {
    match url.scheme() {
      ReplayEngine::SCHEME => Ok(ModelDescriptor::builder()),
      #[cfg(feature = "backend_tract")]
      TractEngineBuilder::SCHEME => Ok(TractEngineBuilder::from_url(url)?.descriptor()?),
      other => Err(EngineError::SchemeMismatch(other.to_string())),
    }
  }

  /// tract 引擎需要在加载时固定输入尺寸
  #[cfg_attr(not(feature = "backend_tract"), allow(unused_variables))]
  pub fn from_url_with_size(url: &Url, width: usize, height: usize) -> Result<Self, EngineError> {
    match url.scheme() {
      ReplayEngine::SCHEME => Ok(EngineWrapper::Replay(ReplayEngine::from_url(url)?)),
      #[cfg(feature = "backend_tract")]
      TractEngineBuilder::SCHEME => {
        let engine = TractEngineBuilder::from_url(url)?
          .input_size(width, height)
          .build()?;
        Ok(EngineWrapper::Tract(engine))
      }
      other => Err(EngineError::SchemeMismatch(other.to_string())),
    }
  }
}

impl InferenceEngine for EngineWrapper {
  type Error = EngineError;

  fn run(&mut self, input: &Tensor) -> Result<Tensor, Self::Error> {
    match self {
      EngineWrapper::Replay(engine) => engine.run(input).map_err(EngineError::from),
      #[cfg(feature = "backend_tract")]
      EngineWrapper::Tract(engine) => engine.run(input).map_err(EngineError::from),
    }
  }
}
