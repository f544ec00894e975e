// 该文件是 Xunying （寻影） 项目的一部分。
// src/model/provider.rs - 模型生命周期
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

use std::{convert::Infallible, sync::OnceLock, time::Instant};

use tracing::{error, info};

use crate::model::{BuildModel, EmbeddingModel};

/// 向检测器提供已加载模型，`init` 可重复调用，只在首次调用时加载
pub trait ModelProvider {
  type Model: EmbeddingModel;
  type Error: std::error::Error + Send + Sync + 'static;

  fn init(&self) -> Result<&Self::Model, Self::Error>;

  /// 释放已加载的模型，之后再次 `init` 会重新加载
  fn shutdown(&mut self) {}
}

/// 首次使用时加载模型，之后只读共享
pub struct LazyModelProvider<B: BuildModel> {
  builder: B,
  model: OnceLock<B::Model>,
}

impl<B: BuildModel> LazyModelProvider<B> {
  pub fn new(builder: B) -> Self {
    Self {
      builder,
      model: OnceLock::new(),
    }
  }

  pub fn is_loaded(&self) -> bool {
    self.model.get().is_some()
  }
}

impl<B: BuildModel> ModelProvider for LazyModelProvider<B> {
  type Model = B::Model;
  type Error = B::Error;

  fn init(&self) -> Result<&Self::Model, Self::Error> {
    if let Some(model) = self.model.get() {
      return Ok(model);
    }

    let now = Instant::now();
    let model = self.builder.build().inspect_err(|e| {
      error!("模型加载失败: {}", e);
    })?;
    info!("模型加载完成，耗时: {:.2?}", now.elapsed());
    Ok(self.model.get_or_init(|| model))
  }

  fn shutdown(&mut self) {
    if self.model.take().is_some() {
      info!("模型已释放");
    }
  }
}

/// 直接持有已构建的模型
pub struct Preloaded<M> {
  model: M,
}

impl<M: EmbeddingModel> Preloaded<M> {
  pub fn new(model: M) -> Self {
    Self { model }
  }
}

impl<M: EmbeddingModel> ModelProvider for Preloaded<M> {
  type Model = M;
  type Error = Infallible;

  fn init(&self) -> Result<&Self::Model, Self::Error> {
    Ok(&self.model)
  }
}
