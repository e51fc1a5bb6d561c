// 该文件是 Beifeng （北风） 项目的一部分。
// src/decode.rs - 原始输出解码：置信度过滤与类别选择
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
use tracing::{debug, error};

use crate::{
  config::{ConfigError, check_unit},
  frame::Tensor,
  model::{BoundingBox, BoundingBoxDimensions, ModelDescriptor, OutputLayout, ROW_HEADER_LEN},
};

const OBJECTNESS_FIELD: usize = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
  #[error("解码参数无效: {0}")]
  Config(#[from] ConfigError),
  #[error("模型类别表为空")]
  EmptyLabels,
  #[error("输出长度 {actual} 不足 {rows} 行 x {row_len} 字段")]
  OutputTooShort {
    rows: usize,
    row_len: usize,
    actual: usize,
  },
  #[error("输出长度 {len} 不能整除行长度 {row_len}")]
  RowsNotDerivable { len: usize, row_len: usize },
  #[error("输出长度 {len} 与 {rows} 行 x {row_len} 字段不一致")]
  RowCountMismatch {
    rows: usize,
    row_len: usize,
    len: usize,
  },
  #[error("类别索引 {index} 超出类别表范围 {count}，模型与元数据不匹配")]
  ClassOutOfBounds { index: usize, count: usize },
}

/// 数值稳定的 logistic 函数，等价于 `e^x / (1 + e^x)`
#[inline]
pub fn sigmoid(x: f32) -> f32 {
  if x >= 0.0 {
    1.0 / (1.0 + (-x).exp())
  } else {
    let k = x.exp();
    k / (1.0 + k)
  }
}

/// 在 `[0, count)` 范围内找出得分最高的类别，相同得分保留最先出现的索引
fn best_class(score: impl Fn(usize) -> f32, count: usize) -> (usize, f32) {
  let mut best = (0, score(0));
  for class in 1..count {
    let value = score(class);
    if value > best.1 {
      best = (class, value);
    }
  }
  best
}

/// 解码扁平输出张量
///
/// 每行字段为 `[x, y, w, h, objectness, class_0 .. class_{C-1}]`，C 为类别名称数量。
/// objectness 经过 sigmoid；几何字段与类别得分原样使用。
pub fn decode(
  output: &[f32],
  rows: usize,
  class_names: &[String],
  layout: OutputLayout,
  min_confidence: f32,
) -> Result<Vec<BoundingBox>, DecodeError> {
  decode_rows(output, rows, class_names.len(), class_names, layout, min_confidence)
}

/// 与 [`decode`] 相同，但类别数单独给出；类别索引越界视为模型与元数据不匹配
pub fn decode_rows(
  output: &[f32],
  rows: usize,
  class_count: usize,
  class_names: &[String],
  layout: OutputLayout,
  min_confidence: f32,
) -> Result<Vec<BoundingBox>, DecodeError> {
  check_unit("min_confidence", min_confidence)?;
  if class_count == 0 {
    return Err(DecodeError::EmptyLabels);
  }
  let row_len = ROW_HEADER_LEN.saturating_add(class_count);
  match rows.checked_mul(row_len) {
    Some(needed) if needed <= output.len() => {}
    _ => {
      error!(
        "输出长度不足: 期望 {} 行 x {} 字段, 实际 {}",
        rows,
        row_len,
        output.len()
      );
      return Err(DecodeError::OutputTooShort {
        rows,
        row_len,
        actual: output.len(),
      });
    }
  }

  let field = |row: usize, field: usize| output[layout.index(row, field, rows, row_len)];
  let mut boxes = Vec::new();

  for row in 0..rows {
    let confidence = sigmoid(field(row, OBJECTNESS_FIELD));
    // 取反比较让 NaN 同样被过滤
    if !(confidence >= min_confidence) {
      continue;
    }

    let dimensions = BoundingBoxDimensions {
      x: field(row, 0),
      y: field(row, 1),
      width: field(row, 2),
      height: field(row, 3),
    };

    let (class_index, max_class) = best_class(|c| field(row, ROW_HEADER_LEN + c), class_count);
    let max_score = confidence * max_class;
    if !(max_score >= min_confidence) {
      continue;
    }

    let label = class_names
      .get(class_index)
      .ok_or(DecodeError::ClassOutOfBounds {
        index: class_index,
        count: class_names.len(),
      })?;

    boxes.push(BoundingBox {
      dimensions,
      confidence,
      label: label.clone(),
      label_index: class_index,
    });
  }

  debug!("解码 {} 行, 保留 {} 个候选框", rows, boxes.len());
  Ok(boxes)
}

/// 按模型描述解码输出张量；描述中未给出行数时由输出长度推导
///
/// 给定行数时输出长度必须恰好为 `rows * row_len`。
pub fn decode_tensor(
  output: &Tensor,
  model: &ModelDescriptor,
  min_confidence: f32,
) -> Result<Vec<BoundingBox>, DecodeError> {
  check_unit("min_confidence", min_confidence)?;
  let row_len = model.row_len();
  let rows = match model.output_rows() {
    Some(rows) => {
      if rows.checked_mul(row_len) != Some(output.len()) {
        error!(
          "输出长度 {} 与 {} 行 x {} 字段不一致",
          output.len(),
          rows,
          row_len
        );
        return Err(DecodeError::RowCountMismatch {
          rows,
          row_len,
          len: output.len(),
        });
      }
      rows
    }
    None => {
      if output.len() % row_len != 0 {
        return Err(DecodeError::RowsNotDerivable {
          len: output.len(),
          row_len,
        });
      }
      output.len() / row_len
    }
  };

  decode(
    output.as_slice(),
    rows,
    model.class_names(),
    model.layout(),
    min_confidence,
  )
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;

  fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_sigmoid() {
    assert_eq!(sigmoid(0.0), 0.5);
    assert_relative_eq!(sigmoid(2.0), 2f32.exp() / (1.0 + 2f32.exp()), epsilon = 1e-6);
    assert_relative_eq!(sigmoid(-3.0), (-3f32).exp() / (1.0 + (-3f32).exp()), epsilon = 1e-6);
    assert_eq!(sigmoid(200.0), 1.0);
    assert_eq!(sigmoid(-200.0), 0.0);
    assert!(sigmoid(f32::NAN).is_nan());
  }

  #[test]
  fn test_single_row_emitted() {
    // objectness 0 -> 0.5, 最佳类别 0.6, 0.5 * 0.6 = 0.3 >= 0.25
    let row = [10.0, 20.0, 30.0, 40.0, 0.0, 0.1, 0.6, 0.2];
    let boxes = decode(&row, 1, &names(&["a", "b", "c"]), OutputLayout::RowMajor, 0.25).unwrap();
    assert_eq!(boxes.len(), 1);
    let b = &boxes[0];
    assert_eq!(b.confidence, 0.5);
    assert_eq!(b.label, "b");
    assert_eq!(b.label_index, 1);
    assert_eq!(
      b.dimensions,
      BoundingBoxDimensions {
        x: 10.0,
        y: 20.0,
        width: 30.0,
        height: 40.0
      }
    );
  }

  #[test]
  fn test_low_objectness_and_low_score_dropped() {
    let rows = [
      // sigmoid(-5) < 0.25
      0.0, 0.0, 1.0, 1.0, -5.0, 1.0, //
      // 0.5 * 0.4 = 0.2 < 0.25
      0.0, 0.0, 1.0, 1.0, 0.0, 0.4,
    ];
    let boxes = decode(&rows, 2, &names(&["a"]), OutputLayout::RowMajor, 0.25).unwrap();
    assert!(boxes.is_empty());
  }

  #[test]
  fn test_tie_keeps_first_class() {
    let row = [0.0, 0.0, 1.0, 1.0, 5.0, 0.7, 0.9, 0.9];
    let boxes = decode(&row, 1, &names(&["a", "b", "c"]), OutputLayout::RowMajor, 0.25).unwrap();
    assert_eq!(boxes[0].label_index, 1);
  }

  #[test]
  fn test_nan_never_emitted() {
    let row = [0.0, 0.0, 1.0, 1.0, f32::NAN, 1.0, 0.0, 0.0, 1.0, 1.0, 5.0, f32::NAN];
    let boxes = decode(&row, 2, &names(&["a"]), OutputLayout::RowMajor, 0.25).unwrap();
    assert!(boxes.is_empty());
  }

  #[test]
  fn test_field_major_layout() {
    // 两行，每行 6 个字段，按字段存放
    let output = [
      1.0, 2.0, // x
      3.0, 4.0, // y
      5.0, 6.0, // w
      7.0, 8.0, // h
      -9.0, 9.0, // objectness
      1.0, 1.0, // class 0
    ];
    let boxes = decode(&output, 2, &names(&["only"]), OutputLayout::FieldMajor, 0.25).unwrap();
    assert_eq!(boxes.len(), 1);
    assert_eq!(
      boxes[0].dimensions,
      BoundingBoxDimensions {
        x: 2.0,
        y: 4.0,
        width: 6.0,
        height: 8.0
      }
    );
  }

  #[test]
  fn test_class_out_of_bounds() {
    let row = [0.0, 0.0, 1.0, 1.0, 5.0, 0.1, 0.9];
    assert_eq!(
      decode_rows(&row, 1, 2, &names(&["a"]), OutputLayout::RowMajor, 0.25).unwrap_err(),
      DecodeError::ClassOutOfBounds { index: 1, count: 1 }
    );
  }

  #[test]
  fn test_output_too_short() {
    assert!(matches!(
      decode(&[0.0; 5], 1, &names(&["a"]), OutputLayout::RowMajor, 0.25),
      Err(DecodeError::OutputTooShort { .. })
    ));
    assert_eq!(
      decode(&[], 0, &[], OutputLayout::RowMajor, 0.25).unwrap_err(),
      DecodeError::EmptyLabels
    );
  }

  #[test]
  fn test_huge_row_count_rejected() {
    assert!(matches!(
      decode(&[0.0; 12], usize::MAX / 6 + 2, &names(&["a"]), OutputLayout::RowMajor, 0.25),
      Err(DecodeError::OutputTooShort { .. })
    ));
    assert!(matches!(
      decode_rows(&[0.0; 12], 2, usize::MAX, &names(&["a"]), OutputLayout::FieldMajor, 0.25),
      Err(DecodeError::OutputTooShort { .. })
    ));
  }

  #[test]
  fn test_threshold_validated_before_decoding() {
    let row = [0.0, 0.0, 1.0, 1.0, 5.0, 0.9];
    for bad in [-1.0, 1.5, f32::NAN] {
      assert!(matches!(
        decode(&row, 1, &names(&["a"]), OutputLayout::RowMajor, bad),
        Err(DecodeError::Config(ConfigError::ThresholdOutOfRange {
          name: "min_confidence",
          ..
        }))
      ));
    }
    assert_eq!(
      decode(&row, 1, &names(&["a"]), OutputLayout::RowMajor, 0.0)
        .unwrap()
        .len(),
      1
    );
  }

  #[test]
  fn test_emitted_boxes_meet_threshold() {
    let classes = names(&["a", "b", "c", "d"]);
    let row_len = ROW_HEADER_LEN + classes.len();
    let rows = 500;
    // 线性同余序列生成 objectness 与类别得分
    let mut state = 0x2545_f491_u32;
    let mut next = move || {
      state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
      (state >> 8) as f32 / (1u32 << 24) as f32
    };
    let mut output = Vec::with_capacity(rows * row_len);
    for row in 0..rows {
      output.extend([row as f32, 0.0, 4.0, 4.0, next() * 12.0 - 6.0]);
      output.extend((0..classes.len()).map(|_| next()));
    }

    for min_confidence in [0.0, 0.1, 0.25, 0.5, 0.8] {
      let boxes = decode(&output, rows, &classes, OutputLayout::RowMajor, min_confidence).unwrap();
      for b in &boxes {
        let row = &output[b.dimensions.x as usize * row_len..][..row_len];
        let scores = &row[ROW_HEADER_LEN..];
        let max_class = scores.iter().copied().fold(f32::MIN, f32::max);
        assert_eq!(scores[b.label_index], max_class);
        assert_eq!(b.confidence, sigmoid(row[OBJECTNESS_FIELD]));
        assert!(b.confidence >= min_confidence);
        assert!(b.confidence * max_class >= min_confidence);
      }
      let expected = (0..rows)
        .filter(|&r| {
          let row = &output[r * row_len..][..row_len];
          let confidence = sigmoid(row[OBJECTNESS_FIELD]);
          let max_class = row[ROW_HEADER_LEN..].iter().copied().fold(f32::MIN, f32::max);
          confidence >= min_confidence && confidence * max_class >= min_confidence
        })
        .count();
      assert_eq!(boxes.len(), expected);
    }
  }

  #[test]
  fn test_decode_tensor_derives_rows() {
    let model = ModelDescriptor::builder()
      .class_names(["a", "b"])
      .build()
      .unwrap();
    let data = vec![
      0.0, 0.0, 2.0, 2.0, 3.0, 0.9, 0.1, //
      5.0, 5.0, 2.0, 2.0, 3.0, 0.2, 0.8,
    ];
    let tensor = Tensor::new([1, 1, 2, 7], data).unwrap();
    let boxes = decode_tensor(&tensor, &model, 0.25).unwrap();
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[1].label, "b");

    let ragged = Tensor::new([1, 1, 1, 8], vec![0.0; 8]).unwrap();
    assert!(matches!(
      decode_tensor(&ragged, &model, 0.25),
      Err(DecodeError::RowsNotDerivable { .. })
    ));
  }

  #[test]
  fn test_pinned_rows_require_exact_length() {
    let model = ModelDescriptor::builder()
      .class_names(["a"])
      .output_rows(2)
      .layout(OutputLayout::FieldMajor)
      .build()
      .unwrap();
    // 实际有三行，只有第三行 (x = 100) 可信
    let data = vec![
      0.0, 50.0, 100.0, // x
      0.0, 0.0, 0.0, // y
      10.0, 10.0, 10.0, // w
      10.0, 10.0, 10.0, // h
      -9.0, -9.0, 9.0, // objectness
      1.0, 1.0, 1.0, // class
    ];
    let longer = Tensor::new([1, 1, 6, 3], data).unwrap();
    assert_eq!(
      decode_tensor(&longer, &model, 0.25).unwrap_err(),
      DecodeError::RowCountMismatch {
        rows: 2,
        row_len: 6,
        len: 18
      }
    );

    let shorter = Tensor::new([1, 1, 1, 6], vec![0.0; 6]).unwrap();
    assert!(matches!(
      decode_tensor(&shorter, &model, 0.25),
      Err(DecodeError::RowCountMismatch { .. })
    ));

    let exact = Tensor::new([1, 1, 6, 2], vec![0.0; 12]).unwrap();
    assert!(decode_tensor(&exact, &model, 0.25).unwrap().is_empty());
  }
}
