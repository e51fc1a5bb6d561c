// 该文件是 Beifeng （北风） 项目的一部分。
// src/task.rs - 检测任务调度
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

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use anyhow::Context;
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一帧
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 逐帧处理全部输入，可限制帧数，收到 Ctrl-C 后在当前帧结束时退出
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理函数；每个进程只能安装一次
  pub fn with_interrupt_handler(mut self, enabled: bool) -> Self {
    self.handle_interrupt = enabled;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let stop = Arc::new(AtomicBool::new(false));
    if self.handle_interrupt {
      let flag = stop.clone();
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        flag.store(true, Ordering::SeqCst);
      })
      .context("无法设置 Ctrl-C 处理函数")?;
    }

    let mut frame_index = 0usize;
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);
      let now = std::time::Instant::now();
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if stop.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, convert::Infallible};

  use super::*;

  struct Doubler;

  impl Model for Doubler {
    type Input = u32;
    type Output = u32;
    type Error = Infallible;

    fn infer(&mut self, input: &u32) -> Result<u32, Infallible> {
      Ok(input * 2)
    }
  }

  #[derive(Default)]
  struct Collect(RefCell<Vec<(u32, u32)>>);

  #[derive(Debug, thiserror::Error)]
  #[error("never")]
  struct Never;

  impl Render<u32, u32> for &Collect {
    type Error = Never;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), Never> {
      self.0.borrow_mut().push((*frame, *result));
      Ok(())
    }
  }

  #[test]
  fn test_one_shot_uses_first_frame() {
    let sink = Collect::default();
    OneShotTask.run_task(vec![3, 4].into_iter(), Doubler, &sink).unwrap();
    assert_eq!(*sink.0.borrow(), vec![(3, 6)]);
  }

  #[test]
  fn test_one_shot_without_frames() {
    let sink = Collect::default();
    assert!(
      OneShotTask
        .run_task(std::iter::empty(), Doubler, &sink)
        .is_err()
    );
  }

  #[test]
  fn test_continuous_frame_limit() {
    let sink = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(1..10, Doubler, &sink)
      .unwrap();
    assert_eq!(*sink.0.borrow(), vec![(1, 2), (2, 4)]);
  }
}
