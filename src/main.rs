// 该文件是 Beifeng （北风） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use beifeng::{
  DetectConfig, Detector, FromUrl,
  engine::EngineWrapper,
  input::InputChain,
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};

fn load_config(args: &args::Args) -> Result<DetectConfig> {
  let mut config = match &args.config {
    Some(path) => DetectConfig::from_json_file(path)?,
    None => DetectConfig::default(),
  };
  if let Some(value) = args.confidence {
    config.min_confidence = value;
  }
  if let Some(value) = args.iou {
    config.iou_threshold = value;
  }
  if let Some(value) = args.limit {
    config.object_limit = value;
  }
  config.validate()?;
  Ok(config)
}

fn load_labels(args: &args::Args) -> Result<Option<String>> {
  match (&args.labels, &args.labels_file) {
    (Some(labels), _) => Ok(Some(labels.clone())),
    (None, Some(path)) => std::fs::read_to_string(path)
      .map(Some)
      .with_context(|| format!("无法读取类别文件: {}", path.display())),
    (None, None) => Ok(None),
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("推理引擎: {}", args.model);
  info!("输入来源: {:?}", args.input.iter().map(|u| u.as_str()).collect::<Vec<_>>());
  info!("输出路径: {}", args.output);

  let config = load_config(&args)?;
  info!(
    "置信度阈值: {}, NMS 阈值: {}, 最多 {} 个对象",
    config.min_confidence, config.iou_threshold, config.object_limit
  );

  // 模型文件提供的描述在前，命令行参数覆盖
  let mut builder = EngineWrapper::model_descriptor(&args.model)?.layout(args.layout);
  if let Some(labels) = load_labels(&args)? {
    builder = builder.label_metadata(&labels);
  }
  if let Some(width) = args.network_width {
    builder = builder.network_width(width);
  }
  if let Some(height) = args.network_height {
    builder = builder.network_height(height);
  }
  if let Some(rows) = args.rows {
    builder = builder.output_rows(rows);
  }
  let model = builder
    .build()
    .context("模型描述无效")?;
  info!("共 {} 个类别", model.class_count());

  let engine =
    EngineWrapper::from_url_with_size(&args.model, model.network_width(), model.network_height())?;
  let detector = Detector::new(engine, model, config)?;

  let input = InputChain::from_urls(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let frame_number = (args.max_frames > 0).then_some(args.max_frames);
  ContinuousTask::default()
    .with_frame_number(frame_number)
    .with_interrupt_handler(true)
    .run_task(input, detector, output)?;

  Ok(())
}
