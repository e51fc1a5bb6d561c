// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/labels.rs - 模型元数据中的类别名称解析
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

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static QUOTED_TOKEN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"'([^']*)'").expect("静态正则表达式无效"));

/// 解析元数据中单引号包裹的类别名称
///
/// 同时兼容列表形式 `['person', 'car']` 与字典形式 `{0: 'person', 1: 'car'}`，
/// 顺序即类别索引。
pub fn parse_label_names(metadata: &str) -> Vec<String> {
  let names: Vec<String> = QUOTED_TOKEN
    .captures_iter(metadata)
    .map(|cap| cap[1].to_string())
    .collect();
  debug!("解析到 {} 个类别名称", names.len());
  names
}
