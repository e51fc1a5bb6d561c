// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine/tract.rs - 基于 tract 的 ONNX 推理后端
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
use tract_onnx::pb;
use tract_onnx::prelude::*;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  engine::InferenceEngine,
  frame::{FrameError, RGB_CHANNELS, Tensor},
  model::{DEFAULT_NETWORK_SIZE, ModelDescriptor, ModelDescriptorBuilder},
};

/// 模型元数据中保存类别名称的键
const LABELS_METADATA_KEY: &str = "names";

#[derive(Error, Debug)]
pub enum TractError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("推理错误: {0}")]
  RunError(String),
  #[error("输入形状 {actual:?} 与模型输入 {expected:?} 不一致")]
  InputShapeMismatch {
    expected: [usize; 4],
    actual: [usize; 4],
  },
  #[error("模型没有输出")]
  NoOutput,
  #[error("输出维度 {0} 超过 4")]
  OutputRank(usize),
  #[error("帧错误: {0}")]
  Frame(#[from] FrameError),
}

pub struct TractEngineBuilder {
  model_path: String,
  width: usize,
  height: usize,
}

impl FromUrlWithScheme for TractEngineBuilder {
  const SCHEME: &'static str = "tract";
}

impl FromUrl for TractEngineBuilder {
  type Error = TractError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TractError::SchemeMismatch);
    }
    Ok(TractEngineBuilder {
      model_path: url.path().to_string(),
      width: DEFAULT_NETWORK_SIZE,
      height: DEFAULT_NETWORK_SIZE,
    })
  }
}

impl TractEngineBuilder {
  pub fn input_size(mut self, width: usize, height: usize) -> Self {
    self.width = width;
    self.height = height;
    self
  }

  /// 读取模型文件中的类别名称、输入输出名称与网络输入尺寸
  pub fn descriptor(&self) -> Result<ModelDescriptorBuilder, TractError> {
    let proto = tract_onnx::onnx()
      .proto_model_for_path(&self.model_path)
      .map_err(|e| {
        error!("读取模型元数据失败: {}", e);
        TractError::ModelLoadError(e.to_string())
      })?;
    Ok(describe_proto(&proto))
  }

  pub fn build(self) -> Result<TractEngine, TractError> {
    info!("加载模型文件: {}", self.model_path);
    let shape = [1, self.height, self.width, RGB_CHANNELS];
    let plan = tract_onnx::onnx()
      .model_for_path(&self.model_path)
      .and_then(|model| {
        model.with_input_fact(
          0,
          InferenceFact::dt_shape(f32::datum_type(), tvec!(shape[0], shape[1], shape[2], shape[3])),
        )
      })
      .and_then(|model| model.into_optimized())
      .and_then(|model| model.into_runnable())
      .map_err(|e| {
        error!("模型加载失败: {}", e);
        TractError::ModelLoadError(e.to_string())
      })?;
    info!("模型加载完成, 输入形状 {:?}", shape);

    Ok(TractEngine { plan, shape })
  }
}

fn describe_proto(proto: &pb::ModelProto) -> ModelDescriptorBuilder {
  let mut builder = ModelDescriptor::builder();

  match proto
    .metadata_props
    .iter()
    .find(|entry| entry.key == LABELS_METADATA_KEY)
  {
    Some(entry) => builder = builder.label_metadata(&entry.value),
    None => warn!("模型元数据中没有类别名称"),
  }

  let Some(graph) = proto.graph.as_ref() else {
    return builder;
  };

  // 旧版导出会把权重也列为图输入
  let input = graph
    .input
    .iter()
    .find(|input| !graph.initializer.iter().any(|init| init.name == input.name));
  if let Some(input) = input {
    builder = builder.input_name(input.name.as_str());
    match network_size(&input_dims(input)) {
      Some((width, height)) => builder = builder.network_size(width, height),
      None => warn!("无法从模型输入 {} 推断网络尺寸", input.name),
    }
  }
  if let Some(output) = graph.output.first() {
    builder = builder.output_name(output.name.as_str());
  }
  builder
}

/// 输入张量各维的静态大小，动态维度为 `None`
fn input_dims(input: &pb::ValueInfoProto) -> Vec<Option<i64>> {
  let Some(pb::type_proto::Value::TensorType(tensor)) =
    input.r#type.as_ref().and_then(|t| t.value.as_ref())
  else {
    return Vec::new();
  };
  tensor
    .shape
    .as_ref()
    .map(|shape| {
      shape
        .dim
        .iter()
        .map(|dim| match &dim.value {
          Some(pb::tensor_shape_proto::dimension::Value::DimValue(v)) => Some(*v),
          _ => None,
        })
        .collect()
    })
    .unwrap_or_default()
}

/// 从 NCHW 或 NHWC 的静态输入形状得到 `(width, height)`
fn network_size(dims: &[Option<i64>]) -> Option<(usize, usize)> {
  let channels = RGB_CHANNELS as i64;
  let (height, width) = match *dims {
    [_, Some(c), Some(h), Some(w)] if c == channels => (h, w),
    [_, Some(h), Some(w), Some(c)] if c == channels => (h, w),
    _ => return None,
  };
  let width = usize::try_from(width).ok().filter(|&w| w > 0)?;
  let height = usize::try_from(height).ok().filter(|&h| h > 0)?;
  Some((width, height))
}

pub struct TractEngine {
  plan: TypedRunnableModel<TypedModel>,
  shape: [usize; 4],
}

impl InferenceEngine for TractEngine {
  type Error = TractError;

  fn run(&mut self, input: &Tensor) -> Result<Tensor, Self::Error> {
    if input.shape() != self.shape {
      return Err(TractError::InputShapeMismatch {
        expected: self.shape,
        actual: input.shape(),
      });
    }

    let [n, h, w, c] = self.shape;
    let array = tract_ndarray::Array4::from_shape_vec((n, h, w, c), input.as_slice().to_vec())
      .map_err(|e| TractError::RunError(e.to_string()))?;

    debug!("执行模型推理");
    let outputs = self
      .plan
      .run(tvec!(array.into_tensor().into()))
      .map_err(|e| TractError::RunError(e.to_string()))?;

    let output = outputs.first().ok_or(TractError::NoOutput)?;
    let view = output
      .to_array_view::<f32>()
      .map_err(|e| TractError::RunError(e.to_string()))?;

    let dims = view.shape();
    if dims.len() > 4 {
      return Err(TractError::OutputRank(dims.len()));
    }
    // 不足四维时在前面补 1
    let mut shape = [1usize; 4];
    shape[4 - dims.len()..].copy_from_slice(dims);
    debug!("模型输出形状: {:?}", shape);

    Ok(Tensor::new(shape, view.iter().copied().collect())?)
  }
}
