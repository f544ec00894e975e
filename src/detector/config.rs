// 该文件是 Xunying （寻影） 项目的一部分。
// src/detector/config.rs - 检测参数
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

/// 像素相似度阈值，严格大于才视为命中
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;
/// 空间离散度阈值（像素），严格小于才视为聚集
pub const DEFAULT_SPREAD_THRESHOLD: f64 = 15.0;
/// 嵌入网格单元对应的像素边长
pub const DEFAULT_STRIDE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
  pub similarity_threshold: f32,
  pub spread_threshold: f64,
  pub stride: u32,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
      spread_threshold: DEFAULT_SPREAD_THRESHOLD,
      stride: DEFAULT_STRIDE,
    }
  }
}

impl DetectorConfig {
  pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
    self.similarity_threshold = threshold;
    self
  }

  pub fn with_spread_threshold(mut self, threshold: f64) -> Self {
    self.spread_threshold = threshold;
    self
  }

  pub fn with_stride(mut self, stride: u32) -> Self {
    self.stride = stride;
    self
  }

  pub fn validate(&self) -> Result<(), String> {
    if !self.similarity_threshold.is_finite() {
      return Err(format!("相似度阈值必须为有限值: {}", self.similarity_threshold));
    }
    if !self.spread_threshold.is_finite() || self.spread_threshold <= 0.0 {
      return Err(format!("离散度阈值必须为正的有限值: {}", self.spread_threshold));
    }
    if self.stride == 0 {
      return Err("步长不能为 0".to_string());
    }
    Ok(())
  }

  /// 覆盖 width x height 像素所需的网格尺寸
  pub fn grid_extent(&self, width: u32, height: u32) -> (usize, usize) {
    (
      width.div_ceil(self.stride) as usize,
      height.div_ceil(self.stride) as usize,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let config = DetectorConfig::default();
    assert_eq!(config.similarity_threshold, 0.8);
    assert_eq!(config.spread_threshold, 15.0);
    assert_eq!(config.stride, 1);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn invalid_values_are_rejected() {
    assert!(DetectorConfig::default().with_stride(0).validate().is_err());
    assert!(
      DetectorConfig::default()
        .with_similarity_threshold(f32::NAN)
        .validate()
        .is_err()
    );
    assert!(
      DetectorConfig::default()
        .with_spread_threshold(0.0)
        .validate()
        .is_err()
    );
  }

  #[test]
  fn grid_extent_rounds_up() {
    let config = DetectorConfig::default().with_stride(4);
    assert_eq!(config.grid_extent(8, 9), (2, 3));
    assert_eq!(DetectorConfig::default().grid_extent(5, 7), (5, 7));
  }
}
