// 该文件是 Xunying （寻影） 项目的一部分。
// src/task.rs - 检测任务
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

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

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

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始检测...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("检测完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一输入重复检测，统计平均耗时并确认每次结果一致
pub struct RepeatShotTask {
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat_times: 100 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times.max(1);
    self
  }
}

impl<
  F,
  D: PartialEq,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始检测...");
    let mut times = Vec::with_capacity(self.repeat_times);
    let mut first: Option<D> = None;
    for i in 0..self.repeat_times {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})检测完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);

      match &first {
        None => first = Some(result),
        Some(expected) if *expected != result => {
          warn!("第 {} 次检测结果与首次不一致", i);
          anyhow::bail!("重复检测结果不一致 (第 {} 次)", i);
        }
        Some(_) => {}
      }
    }

    // 前两次包含模型加载与预热
    let skip = if times.len() > 2 { 2 } else { 0 };
    let measured = &times[skip..];
    warn!(
      "平均检测时间: {:.2?}",
      measured.iter().sum::<Duration>() / measured.len() as u32
    );

    if let Some(result) = first {
      output.render_result(&frame, &result)?;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::Cell, convert::Infallible};

  use super::*;

  struct Counter<'a> {
    calls: &'a Cell<usize>,
    drift: bool,
  }

  impl Model for Counter<'_> {
    type Input = u32;
    type Output = u32;
    type Error = std::io::Error;

    fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
      self.calls.set(self.calls.get() + 1);
      if self.drift {
        Ok(*input + self.calls.get() as u32)
      } else {
        Ok(*input * 2)
      }
    }
  }

  struct Sink<'a> {
    rendered: &'a Cell<Option<u32>>,
  }

  impl Render<u32, u32> for Sink<'_> {
    type Error = Infallible;

    fn render_result(&self, _frame: &u32, result: &u32) -> Result<(), Self::Error> {
      self.rendered.set(Some(*result));
      Ok(())
    }
  }

  #[test]
  fn one_shot_renders_first_frame() {
    let calls = Cell::new(0);
    let rendered = Cell::new(None);
    OneShotTask
      .run_task(
        [21u32, 99].into_iter(),
        Counter {
          calls: &calls,
          drift: false,
        },
        Sink {
          rendered: &rendered,
        },
      )
      .unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(rendered.get(), Some(42));
  }

  #[test]
  fn one_shot_without_input_fails() {
    let calls = Cell::new(0);
    let rendered = Cell::new(None);
    let result = OneShotTask.run_task(
      std::iter::empty::<u32>(),
      Counter {
        calls: &calls,
        drift: false,
      },
      Sink {
        rendered: &rendered,
      },
    );
    assert!(result.is_err());
  }

  #[test]
  fn repeat_shot_runs_every_iteration() {
    let calls = Cell::new(0);
    let rendered = Cell::new(None);
    RepeatShotTask::default()
      .with_repeat_times(5)
      .run_task(
        [3u32].into_iter(),
        Counter {
          calls: &calls,
          drift: false,
        },
        Sink {
          rendered: &rendered,
        },
      )
      .unwrap();
    assert_eq!(calls.get(), 5);
    assert_eq!(rendered.get(), Some(6));
  }

  #[test]
  fn repeat_shot_detects_drift() {
    let calls = Cell::new(0);
    let rendered = Cell::new(None);
    let result = RepeatShotTask::default().with_repeat_times(3).run_task(
      [3u32].into_iter(),
      Counter {
        calls: &calls,
        drift: true,
      },
      Sink {
        rendered: &rendered,
      },
    );
    assert!(result.is_err());
    assert_eq!(rendered.get(), None);
  }
}
