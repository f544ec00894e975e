// 该文件是 Xunying （寻影） 项目的一部分。
// src/model/pixel.rs - 像素颜色嵌入
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

//! 不依赖外部权重的嵌入：每个像素的特征是窗口内归一化 RGB 的均值。
//! 步长恒为 1，网格尺寸与图像一致。

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Image,
  model::{BuildModel, EmbeddingGrid, GridError, Model, normalize_nhwc},
};

const PIXEL_CHANNELS: usize = 3;
const PIXEL_MAX_RADIUS: u32 = 16;

#[derive(Error, Debug)]
pub enum PixelEmbeddingError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("参数 {0} 无效: {1}")]
  InvalidParameter(String, String),
  #[error("图像尺寸无效: {0}x{1}")]
  EmptyImage(u32, u32),
  #[error("嵌入网格错误: {0}")]
  GridError(#[from] GridError),
}

#[derive(Debug, Clone, Default)]
pub struct PixelEmbeddingBuilder {
  radius: u32,
}

impl FromUrlWithScheme for PixelEmbeddingBuilder {
  const SCHEME: &'static str = "pixel";
}

impl FromUrl for PixelEmbeddingBuilder {
  type Error = PixelEmbeddingError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(PixelEmbeddingError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    let mut builder = PixelEmbeddingBuilder::default();
    for (k, v) in url.query_pairs() {
      if k == "radius" {
        let radius = v
          .parse::<u32>()
          .map_err(|e| PixelEmbeddingError::InvalidParameter(k.to_string(), e.to_string()))?;
        builder = builder.radius(radius);
      }
    }

    if builder.radius > PIXEL_MAX_RADIUS {
      return Err(PixelEmbeddingError::InvalidParameter(
        "radius".to_string(),
        format!("不能超过 {}", PIXEL_MAX_RADIUS),
      ));
    }

    Ok(builder)
  }
}

impl PixelEmbeddingBuilder {
  pub fn radius(mut self, radius: u32) -> Self {
    self.radius = radius;
    self
  }
}

impl BuildModel for PixelEmbeddingBuilder {
  type Model = PixelEmbedding;
  type Error = PixelEmbeddingError;

  fn build(&self) -> Result<Self::Model, Self::Error> {
    info!("使用像素颜色嵌入, 窗口半径: {}", self.radius);
    Ok(PixelEmbedding {
      radius: self.radius,
    })
  }
}

#[derive(Debug, Clone)]
pub struct PixelEmbedding {
  radius: u32,
}

impl PixelEmbedding {
  pub fn new(radius: u32) -> Self {
    Self { radius }
  }
}

impl Model for PixelEmbedding {
  type Input = Image;
  type Output = EmbeddingGrid;
  type Error = PixelEmbeddingError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (width, height) = input.dimensions();
    if input.is_empty() {
      return Err(PixelEmbeddingError::EmptyImage(width, height));
    }

    let normalized = normalize_nhwc(input);
    if self.radius == 0 {
      return Ok(EmbeddingGrid::from_hwc(
        width as usize,
        height as usize,
        PIXEL_CHANNELS,
        normalized,
      )?);
    }

    debug!("窗口平均: {}x{}, 半径 {}", width, height, self.radius);
    let (w, h, r) = (width as usize, height as usize, self.radius as usize);
    let mut data = vec![0f32; normalized.len()];
    for y in 0..h {
      for x in 0..w {
        let (y0, y1) = (y.saturating_sub(r), (y + r).min(h - 1));
        let (x0, x1) = (x.saturating_sub(r), (x + r).min(w - 1));
        let count = ((y1 - y0 + 1) * (x1 - x0 + 1)) as f32;
        let out = (y * w + x) * PIXEL_CHANNELS;
        for wy in y0..=y1 {
          for wx in x0..=x1 {
            let src = (wy * w + wx) * PIXEL_CHANNELS;
            for c in 0..PIXEL_CHANNELS {
              data[out + c] += normalized[src + c];
            }
          }
        }
        for c in 0..PIXEL_CHANNELS {
          data[out + c] /= count;
        }
      }
    }

    Ok(EmbeddingGrid::from_hwc(w, h, PIXEL_CHANNELS, data)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn grid_matches_image_shape() {
    let image = Image::filled(4, 3, [255, 0, 0, 255]);
    let grid = PixelEmbedding::new(0).infer(&image).unwrap();
    assert_eq!((grid.width(), grid.height(), grid.channels()), (4, 3, 3));
    let v = grid.vector(3, 2).unwrap();
    assert!((v[0] - (255.0 / 127.0 - 1.0)).abs() < 1e-6);
    assert_eq!(v[1], -1.0);
    assert_eq!(v[2], -1.0);
  }

  #[test]
  fn window_average_smooths_edges() {
    // 左列白色，右列黑色
    let image = Image::from_fn(2, 1, |x, _| if x == 0 { [254; 4] } else { [0; 4] });
    let grid = PixelEmbedding::new(1).infer(&image).unwrap();
    let left = grid.vector(0, 0).unwrap();
    let right = grid.vector(1, 0).unwrap();
    // 两个像素的窗口都覆盖整张图像
    assert_eq!(left, right);
    assert!(left[0].abs() < 1e-6);
  }

  #[test]
  fn empty_image_is_rejected() {
    let err = PixelEmbedding::new(0).infer(&Image::new(0, 2)).unwrap_err();
    assert!(matches!(err, PixelEmbeddingError::EmptyImage(0, 2)));
  }

  #[test]
  fn builder_reads_radius_from_query() {
    let url = Url::parse("pixel://?radius=2").unwrap();
    let builder = PixelEmbeddingBuilder::from_url(&url).unwrap();
    assert_eq!(builder.radius, 2);

    let url = Url::parse("pixel://?radius=abc").unwrap();
    assert!(matches!(
      PixelEmbeddingBuilder::from_url(&url),
      Err(PixelEmbeddingError::InvalidParameter(..))
    ));

    let url = Url::parse("pixel://?radius=99").unwrap();
    assert!(PixelEmbeddingBuilder::from_url(&url).is_err());
  }
}
