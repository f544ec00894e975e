// 该文件是 Xunying （寻影） 项目的一部分。
// src/class.rs - 目标类别定义
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

use std::sync::Arc;

use crate::frame::Image;

/// 一个目标类别：名称加上按顺序排列的参考图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
  name: String,
  images: Vec<Image>,
}

impl Class {
  pub fn new(name: impl Into<String>, images: Vec<Image>) -> Self {
    Self {
      name: name.into(),
      images,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn images(&self) -> &[Image] {
    &self.images
  }

  /// 没有参考图像的类别永远不会被检测到
  pub fn is_evaluable(&self) -> bool {
    !self.images.is_empty()
  }

  pub fn into_shared(self) -> Arc<Class> {
    Arc::new(self)
  }
}

/// 检测时使用的类别列表，顺序即输出顺序
pub type ClassList = Vec<Arc<Class>>;
