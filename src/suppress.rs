// 该文件是 Beifeng （北风） 项目的一部分。
// src/suppress.rs - 贪心非极大值抑制
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

use tracing::debug;

use crate::model::{BoundingBox, BoundingBoxDimensions};

/// 计算两个轴对齐矩形的 IoU
///
/// 任一矩形面积不为正时结果为 0。
pub fn iou(a: &BoundingBoxDimensions, b: &BoundingBoxDimensions) -> f32 {
  let area_a = a.area();
  if !(area_a > 0.0) {
    return 0.0;
  }
  let area_b = b.area();
  if !(area_b > 0.0) {
    return 0.0;
  }

  let min_x = a.x.max(b.x);
  let min_y = a.y.max(b.y);
  let max_x = a.x_max().min(b.x_max());
  let max_y = a.y_max().min(b.y_max());

  let intersection = (max_x - min_x).max(0.0) * (max_y - min_y).max(0.0);
  intersection / (area_a + area_b - intersection)
}

impl BoundingBoxDimensions {
  pub fn iou(&self, other: &BoundingBoxDimensions) -> f32 {
    iou(self, other)
  }
}

/// 是否应当被更高置信度的框抑制
///
/// 完全重合（IoU 为 1）的框在阈值取 1.0 时同样被抑制。
#[inline]
fn overlaps(overlap: f32, threshold: f32) -> bool {
  overlap > threshold || overlap >= 1.0
}

/// 贪心 NMS
///
/// 按置信度降序（稳定排序）依次选取仍然有效的框，并使其后与之 IoU 超过阈值的框失效，
/// 结果达到 `limit` 个时停止。输入不会被修改。
pub fn suppress(boxes: &[BoundingBox], limit: usize, iou_threshold: f32) -> Vec<BoundingBox> {
  let mut results = Vec::new();
  if limit == 0 || boxes.is_empty() {
    return results;
  }

  let mut sorted: Vec<&BoundingBox> = boxes.iter().collect();
  sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut active = vec![true; sorted.len()];
  // 当前位置之后仍然有效的框数量
  let mut remaining = sorted.len();

  for i in 0..sorted.len() {
    if !active[i] {
      continue;
    }
    active[i] = false;
    remaining -= 1;

    let best = sorted[i];
    results.push(best.clone());
    if results.len() >= limit || remaining == 0 {
      break;
    }

    for j in (i + 1)..sorted.len() {
      if !active[j] {
        continue;
      }
      if overlaps(iou(&best.dimensions, &sorted[j].dimensions), iou_threshold) {
        active[j] = false;
        remaining -= 1;
        if remaining == 0 {
          break;
        }
      }
    }

    if remaining == 0 {
      break;
    }
  }

  debug!(
    "NMS: 输入 {} 个候选框, 保留 {} 个",
    boxes.len(),
    results.len()
  );
  results
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;

  fn dims(x: f32, y: f32, width: f32, height: f32) -> BoundingBoxDimensions {
    BoundingBoxDimensions {
      x,
      y,
      width,
      height,
    }
  }

  fn bbox(d: BoundingBoxDimensions, confidence: f32, label_index: usize) -> BoundingBox {
    BoundingBox {
      dimensions: d,
      confidence,
      label: format!("class{label_index}"),
      label_index,
    }
  }

  #[test]
  fn test_iou_basic() {
    let a = dims(0.0, 0.0, 10.0, 10.0);
    let b = dims(5.0, 0.0, 10.0, 10.0);
    assert_relative_eq!(iou(&a, &b), 50.0 / 150.0);
    assert_eq!(iou(&a, &b), iou(&b, &a));
    assert_eq!(iou(&a, &a), 1.0);
    assert_eq!(iou(&a, &dims(20.0, 20.0, 5.0, 5.0)), 0.0);
  }

  #[test]
  fn test_iou_identical_fractional() {
    let a = dims(0.1, 0.7, 0.2, 0.3);
    assert_eq!(a.iou(&a), 1.0);
  }

  #[test]
  fn test_iou_degenerate() {
    let a = dims(0.0, 0.0, 10.0, 10.0);
    assert_eq!(iou(&a, &dims(0.0, 0.0, 0.0, 10.0)), 0.0);
    assert_eq!(iou(&dims(0.0, 0.0, -3.0, 10.0), &a), 0.0);
  }

  #[test]
  fn test_identical_boxes_keep_best() {
    let d = dims(10.0, 10.0, 20.0, 20.0);
    let boxes = [bbox(d, 0.7, 0), bbox(d, 0.9, 1)];
    let result = suppress(&boxes, 20, 0.45);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].confidence, 0.9);
  }

  #[test]
  fn test_limit_zero_and_empty() {
    let boxes = [bbox(dims(0.0, 0.0, 1.0, 1.0), 0.9, 0)];
    assert!(suppress(&boxes, 0, 0.45).is_empty());
    assert!(suppress(&[], 5, 0.45).is_empty());
  }

  #[test]
  fn test_limit_enforced_and_order() {
    let boxes: Vec<BoundingBox> = (0..10)
      .map(|i| bbox(dims(i as f32 * 100.0, 0.0, 10.0, 10.0), 0.1 * i as f32, i))
      .collect();
    let result = suppress(&boxes, 3, 0.45);
    assert_eq!(
      result.iter().map(|b| b.label_index).collect::<Vec<_>>(),
      vec![9, 8, 7]
    );
  }

  #[test]
  fn test_stable_on_equal_confidence() {
    let boxes = [
      bbox(dims(0.0, 0.0, 10.0, 10.0), 0.5, 0),
      bbox(dims(100.0, 0.0, 10.0, 10.0), 0.5, 1),
      bbox(dims(200.0, 0.0, 10.0, 10.0), 0.5, 2),
    ];
    let result = suppress(&boxes, 10, 0.45);
    assert_eq!(
      result.iter().map(|b| b.label_index).collect::<Vec<_>>(),
      vec![0, 1, 2]
    );
  }

  #[test]
  fn test_threshold_edges() {
    let a = bbox(dims(0.0, 0.0, 10.0, 10.0), 0.9, 0);
    let touching = bbox(dims(9.0, 0.0, 10.0, 10.0), 0.8, 1);
    let same = bbox(dims(0.0, 0.0, 10.0, 10.0), 0.7, 2);

    // 阈值 0：任何正重叠都被抑制
    assert_eq!(suppress(&[a.clone(), touching.clone()], 10, 0.0).len(), 1);
    // 阈值 1：只抑制完全重合的框
    let result = suppress(&[a.clone(), touching.clone(), same.clone()], 10, 1.0);
    assert_eq!(
      result.iter().map(|b| b.label_index).collect::<Vec<_>>(),
      vec![0, 1]
    );
  }

  #[test]
  fn test_chain_suppression_uses_survivors_only() {
    // b 被 a 抑制后不再抑制 c
    let a = bbox(dims(0.0, 0.0, 10.0, 10.0), 0.9, 0);
    let b = bbox(dims(4.0, 0.0, 10.0, 10.0), 0.8, 1);
    let c = bbox(dims(8.0, 0.0, 10.0, 10.0), 0.7, 2);
    let result = suppress(&[c, b, a], 10, 0.3);
    assert_eq!(
      result.iter().map(|b| b.label_index).collect::<Vec<_>>(),
      vec![0, 2]
    );
  }

  #[test]
  fn test_idempotent() {
    let boxes: Vec<BoundingBox> = (0..12)
      .map(|i| {
        let offset = (i % 4) as f32 * 3.0 + (i / 4) as f32 * 50.0;
        bbox(dims(offset, offset, 10.0, 10.0), 1.0 - 0.05 * i as f32, i)
      })
      .collect();
    let once = suppress(&boxes, 20, 0.45);
    let twice = suppress(&once, 20, 0.45);
    assert_eq!(once, twice);
    assert!(once.len() <= 20);
  }
  /// 不做提前退出的朴素贪心 NMS
  fn greedy_reference(boxes: &[BoundingBox], limit: usize, iou_threshold: f32) -> Vec<BoundingBox> {
    let mut sorted = boxes.to_vec();
    sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<BoundingBox> = Vec::new();
    for candidate in sorted {
      if kept.len() >= limit {
        break;
      }
      let suppressed = kept
        .iter()
        .any(|k| overlaps(iou(&k.dimensions, &candidate.dimensions), iou_threshold));
      if !suppressed {
        kept.push(candidate);
      }
    }
    kept
  }

  #[test]
  fn test_matches_plain_greedy() {
    let mut state = 0x9e37_79b9_u32;
    let mut next = move |modulo: u32| {
      state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
      (state >> 8) % modulo
    };
    for round in 0..20 {
      let count = 5 + round * 4;
      let boxes: Vec<BoundingBox> = (0..count as usize)
        .map(|i| {
          // 坐标落在小网格上，制造大量重叠与完全重合的框
          let d = dims(
            next(8) as f32 * 2.5,
            next(8) as f32 * 2.5,
            5.0 + next(4) as f32 * 2.5,
            5.0 + next(4) as f32 * 2.5,
          );
          // 置信度量化到 10 档，存在大量相同值
          bbox(d, next(10) as f32 / 10.0, i)
        })
        .collect();
      for threshold in [0.0, 0.2, 0.45, 0.7, 1.0] {
        for limit in [1, 3, 10, 100] {
          assert_eq!(
            suppress(&boxes, limit, threshold),
            greedy_reference(&boxes, limit, threshold),
            "round {round}, threshold {threshold}, limit {limit}"
          );
        }
      }
    }
  }
}
