// 该文件是 Beifeng （北风） 项目的一部分。
// src/input.rs - 图像输入
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

use crate::{FromUrl, frame::RgbaFrame};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  #[cfg_attr(not(feature = "read_image_file"), allow(unused_variables))]
  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl Iterator for InputWrapper {
  type Item = RgbaFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match *self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(ref mut input) => input.next(),
    }
  }
}

/// 按顺序串联多个输入源
pub struct InputChain {
  inputs: std::vec::IntoIter<InputWrapper>,
  current: Option<InputWrapper>,
}

impl InputChain {
  pub fn from_urls<'a>(urls: impl IntoIterator<Item = &'a url::Url>) -> Result<Self, InputError> {
    let inputs = urls
      .into_iter()
      .map(InputWrapper::from_url)
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self {
      inputs: inputs.into_iter(),
      current: None,
    })
  }
}

impl Iterator for InputChain {
  type Item = RgbaFrame;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if let Some(frame) = self.current.as_mut().and_then(Iterator::next) {
        return Some(frame);
      }
      self.current = Some(self.inputs.next()?);
    }
  }
}
