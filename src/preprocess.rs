// 该文件是 Beifeng （北风） 项目的一部分。
// src/preprocess.rs - 输入预处理：居中裁剪与归一化
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
use tracing::debug;

use crate::frame::{FrameError, PixelBuffer, RGB_CHANNELS, Tensor};

pub const IMAGE_MEAN: f32 = 0.0;
pub const IMAGE_STD: f32 = 255.0;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PreprocessError {
  #[error("裁剪尺寸无效: {width}x{height}")]
  EmptyTarget { width: usize, height: usize },
  #[error("裁剪尺寸 {target_width}x{target_height} 超出采集尺寸 {width}x{height}")]
  TargetTooLarge {
    target_width: usize,
    target_height: usize,
    width: usize,
    height: usize,
  },
  #[error("帧错误: {0}")]
  Frame(#[from] FrameError),
}

/// 源图像中的居中裁剪窗口（像素单位）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
  pub left: usize,
  pub top: usize,
  pub width: usize,
  pub height: usize,
}

/// 计算居中裁剪窗口，多余的行列按向下取整平分到两侧
pub fn crop_window(
  captured_width: usize,
  captured_height: usize,
  target_width: usize,
  target_height: usize,
) -> Result<CropWindow, PreprocessError> {
  if target_width == 0 || target_height == 0 {
    return Err(PreprocessError::EmptyTarget {
      width: target_width,
      height: target_height,
    });
  }
  if captured_width == 0 {
    return Err(FrameError::ZeroWidth.into());
  }
  if target_width > captured_width || target_height > captured_height {
    return Err(PreprocessError::TargetTooLarge {
      target_width,
      target_height,
      width: captured_width,
      height: captured_height,
    });
  }

  Ok(CropWindow {
    left: (captured_width - target_width) / 2,
    top: (captured_height - target_height) / 2,
    width: target_width,
    height: target_height,
  })
}

/// 将采集帧居中裁剪为 `target_width x target_height`，丢弃 alpha 通道并归一化到 [0, 1]
///
/// 输出为 NHWC 布局 `[1, target_height, target_width, 3]`，不做任何缩放插值。
pub fn preprocess(
  pixels: PixelBuffer<'_>,
  target_width: usize,
  target_height: usize,
) -> Result<Tensor, PreprocessError> {
  let window = crop_window(pixels.width(), pixels.height(), target_width, target_height)?;
  debug!(
    "裁剪窗口: 源 {}x{}, 偏移 ({}, {}), 尺寸 {}x{}",
    pixels.width(),
    pixels.height(),
    window.left,
    window.top,
    window.width,
    window.height
  );

  let samples = pixels.samples();
  let stride = pixels.width();
  let mut values = Vec::with_capacity(window.width * window.height * RGB_CHANNELS);

  for row in samples
    .chunks_exact(stride)
    .skip(window.top)
    .take(window.height)
  {
    for color in &row[window.left..window.left + window.width] {
      for &channel in &color[..RGB_CHANNELS] {
        values.push((channel as f32 - IMAGE_MEAN) / IMAGE_STD);
      }
    }
  }

  let tensor = Tensor::new([1, window.height, window.width, RGB_CHANNELS], values)?;
  Ok(tensor)
}
