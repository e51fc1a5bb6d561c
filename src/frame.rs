// 该文件是 Beifeng （北风） 项目的一部分。
// src/frame.rs - RGBA 帧与浮点张量定义
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const RGBA_CHANNELS: usize = 4;
pub const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("帧宽度不能为 0")]
  ZeroWidth,
  #[error("像素数量 {samples} 不是宽度 {width} 的整数倍")]
  RaggedRows { samples: usize, width: usize },
  #[error("张量形状 {shape:?} 需要 {expected} 个元素, 实际为 {actual}")]
  ShapeMismatch {
    shape: [usize; 4],
    expected: usize,
    actual: usize,
  },
  #[error("张量形状 {shape:?} 的元素数量溢出")]
  ShapeOverflow { shape: [usize; 4] },
}

/// 采集得到的 RGBA 帧，按行优先存放
#[derive(Debug, Clone)]
pub struct RgbaFrame {
  samples: Box<[[u8; RGBA_CHANNELS]]>,
  width: usize,
}

impl RgbaFrame {
  pub fn new(samples: Vec<[u8; RGBA_CHANNELS]>, width: usize) -> Result<Self, FrameError> {
    check_rows(samples.len(), width)?;
    Ok(Self {
      samples: samples.into_boxed_slice(),
      width,
    })
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.samples.len() / self.width
  }

  pub fn as_pixels(&self) -> PixelBuffer<'_> {
    PixelBuffer {
      samples: &self.samples,
      width: self.width,
    }
  }
}

#[cfg(feature = "read_image_file")]
impl From<image::RgbaImage> for RgbaFrame {
  fn from(image: image::RgbaImage) -> Self {
    let width = image.width() as usize;
    let samples: Vec<[u8; RGBA_CHANNELS]> = image.pixels().map(|p| p.0).collect();
    // image 保证非空图像的像素数量等于 width * height
    Self {
      samples: samples.into_boxed_slice(),
      width: width.max(1),
    }
  }
}

/// 借用的只读像素视图，仅在一次预处理调用期间有效
#[derive(Debug, Clone, Copy)]
pub struct PixelBuffer<'a> {
  samples: &'a [[u8; RGBA_CHANNELS]],
  width: usize,
}

impl<'a> PixelBuffer<'a> {
  pub fn new(samples: &'a [[u8; RGBA_CHANNELS]], width: usize) -> Result<Self, FrameError> {
    check_rows(samples.len(), width)?;
    Ok(Self { samples, width })
  }

  pub fn samples(&self) -> &'a [[u8; RGBA_CHANNELS]] {
    self.samples
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.samples.len() / self.width
  }
}

fn check_rows(samples: usize, width: usize) -> Result<(), FrameError> {
  if width == 0 {
    return Err(FrameError::ZeroWidth);
  }
  if samples % width != 0 {
    return Err(FrameError::RaggedRows { samples, width });
  }
  Ok(())
}

/// 四维浮点张量
///
/// 输入侧为 NHWC（batch=1, height, width, channel=3）；输出侧的形状由推理引擎决定，
/// 解码时只按一维切片访问。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TensorRepr")]
pub struct Tensor {
  shape: [usize; 4],
  data: Box<[f32]>,
}

#[derive(Deserialize)]
struct TensorRepr {
  shape: [usize; 4],
  data: Vec<f32>,
}

impl TryFrom<TensorRepr> for Tensor {
  type Error = FrameError;

  fn try_from(repr: TensorRepr) -> Result<Self, Self::Error> {
    Tensor::new(repr.shape, repr.data)
  }
}

impl Tensor {
  pub fn new(shape: [usize; 4], data: Vec<f32>) -> Result<Self, FrameError> {
    let expected = shape
      .iter()
      .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
      .ok_or(FrameError::ShapeOverflow { shape })?;
    if expected != data.len() {
      return Err(FrameError::ShapeMismatch {
        shape,
        expected,
        actual: data.len(),
      });
    }
    Ok(Self {
      shape,
      data: data.into_boxed_slice(),
    })
  }

  pub fn shape(&self) -> [usize; 4] {
    self.shape
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pixel_buffer_height() {
    let samples = vec![[0u8; 4]; 12];
    let pixels = PixelBuffer::new(&samples, 4).unwrap();
    assert_eq!(pixels.height(), 3);
  }

  #[test]
  fn test_pixel_buffer_rejects_ragged() {
    let samples = vec![[0u8; 4]; 10];
    assert_eq!(
      PixelBuffer::new(&samples, 4).unwrap_err(),
      FrameError::RaggedRows {
        samples: 10,
        width: 4
      }
    );
    assert_eq!(
      RgbaFrame::new(samples, 0).unwrap_err(),
      FrameError::ZeroWidth
    );
  }

  #[test]
  fn test_tensor_shape_checked() {
    assert!(Tensor::new([1, 2, 2, 3], vec![0.0; 12]).is_ok());
    assert!(Tensor::new([1, 2, 2, 3], vec![0.0; 11]).is_err());
  }

  #[test]
  fn test_tensor_deserialize_validates() {
    let ok: Tensor = serde_json::from_str(r#"{"shape":[1,1,1,2],"data":[0.5,1.0]}"#).unwrap();
    assert_eq!(ok.as_slice(), &[0.5, 1.0]);
    let bad = serde_json::from_str::<Tensor>(r#"{"shape":[1,1,1,3],"data":[0.5,1.0]}"#);
    assert!(bad.is_err());
  }

  #[test]
  fn test_tensor_shape_overflow_rejected() {
    let huge = serde_json::from_str::<Tensor>(
      r#"{"shape":[4294967296,4294967296,1,1],"data":[]}"#,
    );
    assert!(huge.is_err());
    let shape = [usize::MAX, 2, 1, 1];
    assert_eq!(
      Tensor::new(shape, Vec::new()).unwrap_err(),
      FrameError::ShapeOverflow { shape }
    );
  }
}
