// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/descriptor.rs - 模型描述（加载时确定，之后只读）
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

use std::str::FromStr;

use tracing::{debug, error};

use crate::config::ConfigError;
use crate::model::parse_label_names;

/// 每行固定的前缀字段数: cx, cy, w, h, objectness
pub const ROW_HEADER_LEN: usize = 5;
pub const DEFAULT_NETWORK_SIZE: usize = 416;

const DEFAULT_INPUT_NAME: &str = "images";
const DEFAULT_OUTPUT_NAME: &str = "output";

/// 原始输出张量的内存布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLayout {
  /// `[rows][5 + C]`，每个锚点一行连续存放
  #[default]
  RowMajor,
  /// `[5 + C][rows]`，同一字段的所有锚点连续存放
  FieldMajor,
}

impl OutputLayout {
  /// 第 `row` 行第 `field` 个字段在扁平输出中的下标
  #[inline]
  pub fn index(self, row: usize, field: usize, rows: usize, row_len: usize) -> usize {
    match self {
      OutputLayout::RowMajor => row * row_len + field,
      OutputLayout::FieldMajor => field * rows + row,
    }
  }
}

impl FromStr for OutputLayout {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "row" | "row-major" => Ok(OutputLayout::RowMajor),
      "field" | "field-major" => Ok(OutputLayout::FieldMajor),
      other => Err(ConfigError::UnknownLayout(other.to_string())),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
  input_name: String,
  output_name: String,
  network_width: usize,
  network_height: usize,
  class_names: Box<[String]>,
  output_rows: Option<usize>,
  layout: OutputLayout,
}

impl ModelDescriptor {
  pub fn builder() -> ModelDescriptorBuilder {
    ModelDescriptorBuilder::default()
  }

  pub fn input_name(&self) -> &str {
    &self.input_name
  }

  pub fn output_name(&self) -> &str {
    &self.output_name
  }

  pub fn network_width(&self) -> usize {
    self.network_width
  }

  pub fn network_height(&self) -> usize {
    self.network_height
  }

  pub fn class_names(&self) -> &[String] {
    &self.class_names
  }

  pub fn class_count(&self) -> usize {
    self.class_names.len()
  }

  /// 单行字段数 `5 + C`
  pub fn row_len(&self) -> usize {
    ROW_HEADER_LEN + self.class_count()
  }

  pub fn output_rows(&self) -> Option<usize> {
    self.output_rows
  }

  pub fn layout(&self) -> OutputLayout {
    self.layout
  }
}

pub struct ModelDescriptorBuilder {
  input_name: String,
  output_name: String,
  network_width: usize,
  network_height: usize,
  class_names: Vec<String>,
  class_count: Option<usize>,
  output_rows: Option<usize>,
  layout: OutputLayout,
}

impl Default for ModelDescriptorBuilder {
  fn default() -> Self {
    Self {
      input_name: DEFAULT_INPUT_NAME.to_string(),
      output_name: DEFAULT_OUTPUT_NAME.to_string(),
      network_width: DEFAULT_NETWORK_SIZE,
      network_height: DEFAULT_NETWORK_SIZE,
      class_names: Vec::new(),
      class_count: None,
      output_rows: None,
      layout: OutputLayout::default(),
    }
  }
}

impl ModelDescriptorBuilder {
  pub fn input_name(mut self, name: impl Into<String>) -> Self {
    self.input_name = name.into();
    self
  }

  pub fn output_name(mut self, name: impl Into<String>) -> Self {
    self.output_name = name.into();
    self
  }

  pub fn network_size(mut self, width: usize, height: usize) -> Self {
    self.network_width = width;
    self.network_height = height;
    self
  }

  pub fn network_width(mut self, width: usize) -> Self {
    self.network_width = width;
    self
  }

  pub fn network_height(mut self, height: usize) -> Self {
    self.network_height = height;
    self
  }

  pub fn class_names<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.class_names = names.into_iter().map(Into::into).collect();
    self
  }

  /// 从模型元数据字符串（如 `"['person', 'car']"`）解析类别名称
  pub fn label_metadata(self, metadata: &str) -> Self {
    self.class_names(parse_label_names(metadata))
  }

  /// 额外声明的类别数，`build` 时与类别名称数量核对
  pub fn class_count(mut self, count: usize) -> Self {
    self.class_count = Some(count);
    self
  }

  pub fn output_rows(mut self, rows: usize) -> Self {
    self.output_rows = Some(rows);
    self
  }

  pub fn layout(mut self, layout: OutputLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn build(self) -> Result<ModelDescriptor, ConfigError> {
    if self.class_names.is_empty() {
      error!("模型类别表为空");
      return Err(ConfigError::EmptyLabels);
    }
    if let Some(count) = self.class_count
      && count != self.class_names.len()
    {
      error!(
        "类别数 {} 与类别名称数量 {} 不一致",
        count,
        self.class_names.len()
      );
      return Err(ConfigError::ClassCountMismatch {
        declared: count,
        labels: self.class_names.len(),
      });
    }
    if self.network_width == 0 || self.network_height == 0 {
      return Err(ConfigError::InvalidNetworkSize {
        width: self.network_width,
        height: self.network_height,
      });
    }
    if self.output_rows == Some(0) {
      return Err(ConfigError::ZeroOutputRows);
    }

    debug!(
      "模型描述: 输入 {} {}x{}, 输出 {}, {} 个类别, 布局 {:?}",
      self.input_name,
      self.network_width,
      self.network_height,
      self.output_name,
      self.class_names.len(),
      self.layout
    );

    Ok(ModelDescriptor {
      input_name: self.input_name,
      output_name: self.output_name,
      network_width: self.network_width,
      network_height: self.network_height,
      class_names: self.class_names.into_boxed_slice(),
      output_rows: self.output_rows,
      layout: self.layout,
    })
  }
}
