// 该文件是 Beifeng （北风） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use beifeng::model::OutputLayout;
use clap::Parser;
use url::Url;

/// Beifeng 检测后处理参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理引擎
  /// - replay:///path/to/output.json  回放记录的原始输出
  /// - tract:///path/to/model.onnx    ONNX 模型（需要 backend_tract 特性）
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 模型元数据中的类别名称，例如 "['person', 'car']"；覆盖模型文件中的 names
  #[arg(long, value_name = "METADATA", conflicts_with = "labels_file")]
  pub labels: Option<String>,

  /// 包含类别元数据的文件
  #[arg(long, value_name = "FILE")]
  pub labels_file: Option<PathBuf>,

  /// 输入来源，可重复，例如 image:///path/to/frame.png
  #[arg(long, value_name = "SOURCE", required = true)]
  pub input: Vec<Url>,

  /// 输出，json:///path/to/out.json、json:- 或 log:
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,

  /// 网络输入宽度，缺省时取模型输入形状，无法推断时为 416
  #[arg(long, value_name = "PIXELS")]
  pub network_width: Option<usize>,

  /// 网络输入高度，缺省时取模型输入形状，无法推断时为 416
  #[arg(long, value_name = "PIXELS")]
  pub network_height: Option<usize>,

  /// 输出布局: row 或 field
  #[arg(long, default_value = "row", value_name = "LAYOUT")]
  pub layout: OutputLayout,

  /// 期望的输出行数，缺省时由输出长度推导
  #[arg(long, value_name = "ROWS")]
  pub rows: Option<usize>,

  /// JSON 配置文件，命令行参数优先
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub iou: Option<f32>,

  /// 每帧最多保留的检测框数量
  #[arg(long, value_name = "COUNT")]
  pub limit: Option<usize>,

  /// 最大处理帧数，0 表示无限制
  #[arg(long, default_value_t = 0, value_name = "COUNT")]
  pub max_frames: usize,
}
