// 该文件是 Beifeng （北风） 项目的一部分。
// src/output.rs - 检测结果输出
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

use crate::{FromUrl, FromUrlWithScheme, frame::RgbaFrame, model::DetectResult};

/// 消费检测结果；绘制、记录等都在检测流水线之外完成
pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

mod json_file;
mod log_output;
pub use self::json_file::{JsonFileOutput, JsonFileOutputError};
pub use self::log_output::LogOutput;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("JSON 输出错误: {0}")]
  JsonFileOutputError(#[from] JsonFileOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  JsonFileOutput(JsonFileOutput),
  LogOutput(LogOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      JsonFileOutput::SCHEME => {
        let output = JsonFileOutput::from_url(url)?;
        Ok(OutputWrapper::JsonFileOutput(output))
      }
      LogOutput::SCHEME => {
        let Ok(output) = LogOutput::from_url(url);
        Ok(OutputWrapper::LogOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl Render<RgbaFrame, DetectResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbaFrame, result: &DetectResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::JsonFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::LogOutput(output) => {
        let Ok(()) = output.render_result(frame, result);
        Ok(())
      }
    }
  }
}
