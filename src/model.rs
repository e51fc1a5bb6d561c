// 该文件是 Beifeng （北风） 项目的一部分。
// src/model.rs - 模型描述与检测结果
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

use serde::Serialize;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 检测框几何信息，坐标空间与模型输出一致（x, y 为左上角）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BoundingBoxDimensions {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl BoundingBoxDimensions {
  pub fn x_max(&self) -> f32 {
    self.x + self.width
  }

  pub fn y_max(&self) -> f32 {
    self.y + self.height
  }

  /// 由矩形边界计算的面积，与交集面积使用同一组运算
  pub fn area(&self) -> f32 {
    (self.x_max() - self.x) * (self.y_max() - self.y)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundingBox {
  pub dimensions: BoundingBoxDimensions,
  /// 经过 sigmoid 的目标置信度
  pub confidence: f32,
  pub label: String,
  pub label_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectResult {
  pub items: Box<[BoundingBox]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, BoundingBox> {
    self.items.iter()
  }
}

impl From<Vec<BoundingBox>> for DetectResult {
  fn from(items: Vec<BoundingBox>) -> Self {
    DetectResult {
      items: items.into_boxed_slice(),
    }
  }
}

mod descriptor;
mod labels;
pub use self::descriptor::{
  DEFAULT_NETWORK_SIZE, ModelDescriptor, ModelDescriptorBuilder, OutputLayout, ROW_HEADER_LEN,
};
pub use self::labels::parse_label_names;
