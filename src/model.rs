// 该文件是 Xunying （寻影） 项目的一部分。
// src/model.rs - 嵌入模型
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

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Image, PixelSource},
};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 图像到稠密嵌入网格的模型
pub trait EmbeddingModel:
  Model<Input = Image, Output = EmbeddingGrid, Error = <Self as EmbeddingModel>::EmbedError>
{
  type EmbedError: std::error::Error + Send + Sync + 'static;

  fn embed(&self, image: &Image) -> Result<EmbeddingGrid, Self::EmbedError> {
    self.infer(image)
  }
}

impl<M, E> EmbeddingModel for M
where
  M: Model<Input = Image, Output = EmbeddingGrid, Error = E>,
  E: std::error::Error + Send + Sync + 'static,
{
  type EmbedError = E;
}

/// 由配置构建模型，模型加载的耗时部分都在 `build` 里
pub trait BuildModel {
  type Model: EmbeddingModel;
  type Error: std::error::Error + Send + Sync + 'static;

  fn build(&self) -> Result<Self::Model, Self::Error>;
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GridError {
  #[error("嵌入数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("嵌入通道数不能为 0")]
  NoChannels,
}

/// 按 (x, y, channel) 存储的嵌入网格，内部为 HWC 排布
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingGrid {
  width: usize,
  height: usize,
  channels: usize,
  data: Box<[f32]>,
}

impl EmbeddingGrid {
  pub fn from_hwc(
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<f32>,
  ) -> Result<Self, GridError> {
    if channels == 0 {
      return Err(GridError::NoChannels);
    }
    let expected = width * height * channels;
    if data.len() != expected {
      return Err(GridError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }
    Ok(Self {
      width,
      height,
      channels,
      data: data.into_boxed_slice(),
    })
  }

  /// 由 CHW 排布的数据构建网格
  pub fn from_chw(
    width: usize,
    height: usize,
    channels: usize,
    data: &[f32],
  ) -> Result<Self, GridError> {
    if channels == 0 {
      return Err(GridError::NoChannels);
    }
    let plane = width * height;
    let expected = plane * channels;
    if data.len() != expected {
      return Err(GridError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    let mut hwc = vec![0f32; expected];
    for c in 0..channels {
      for idx in 0..plane {
        hwc[idx * channels + c] = data[c * plane + idx];
      }
    }
    Self::from_hwc(width, height, channels, hwc)
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  /// 网格单元 (x, y) 处的特征向量，越界时返回 None
  pub fn vector(&self, x: usize, y: usize) -> Option<&[f32]> {
    if x >= self.width || y >= self.height {
      return None;
    }
    let start = (y * self.width + x) * self.channels;
    Some(&self.data[start..start + self.channels])
  }
}

/// 像素值线性映射到约 [-1, 1]，必须与模型训练时的归一化保持一致
pub fn normalize_value(value: u8) -> f32 {
  value as f32 / 127.0 - 1.0
}

/// 归一化后的 NHWC 数据（批大小为 1，仅 RGB 三通道）
pub fn normalize_nhwc<P: PixelSource>(source: &P) -> Vec<f32> {
  let (width, height) = (source.width(), source.height());
  let mut data = Vec::with_capacity(3 * width as usize * height as usize);
  for y in 0..height {
    for x in 0..width {
      let [r, g, b, _] = source.pixel(x, y);
      data.extend([normalize_value(r), normalize_value(g), normalize_value(b)]);
    }
  }
  data
}

/// 归一化后的 NCHW 数据（批大小为 1，仅 RGB 三通道）
pub fn normalize_nchw<P: PixelSource>(source: &P) -> Vec<f32> {
  let (width, height) = (source.width() as usize, source.height() as usize);
  let plane = width * height;
  let mut data = vec![0f32; 3 * plane];
  for y in 0..height {
    for x in 0..width {
      let px = source.pixel(x as u32, y as u32);
      let idx = y * width + x;
      for c in 0..3 {
        data[c * plane + idx] = normalize_value(px[c]);
      }
    }
  }
  data
}

mod pixel;
pub use self::pixel::{PixelEmbedding, PixelEmbeddingBuilder, PixelEmbeddingError};

#[cfg(feature = "model_onnx")]
mod onnx;
#[cfg(feature = "model_onnx")]
pub use self::onnx::{OnnxEmbedding, OnnxEmbeddingBuilder, OnnxEmbeddingError, TensorLayout};

pub mod provider;
pub use self::provider::{LazyModelProvider, ModelProvider, Preloaded};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("像素嵌入模型错误: {0}")]
  PixelEmbeddingError(#[from] PixelEmbeddingError),
  #[cfg(feature = "model_onnx")]
  #[error("ONNX 嵌入模型错误: {0}")]
  OnnxEmbeddingError(#[from] OnnxEmbeddingError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 根据 URL 方案选择的模型构建器
#[derive(Debug, Clone)]
pub enum ModelBuilderWrapper {
  Pixel(PixelEmbeddingBuilder),
  #[cfg(feature = "model_onnx")]
  Onnx(OnnxEmbeddingBuilder),
}

impl FromUrl for ModelBuilderWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      PixelEmbeddingBuilder::SCHEME => Ok(ModelBuilderWrapper::Pixel(
        PixelEmbeddingBuilder::from_url(url)?,
      )),
      #[cfg(feature = "model_onnx")]
      OnnxEmbeddingBuilder::SCHEME => Ok(ModelBuilderWrapper::Onnx(
        OnnxEmbeddingBuilder::from_url(url)?,
      )),
      other => Err(ModelError::SchemeMismatch(other.to_string())),
    }
  }
}

pub enum ModelWrapper {
  Pixel(PixelEmbedding),
  #[cfg(feature = "model_onnx")]
  Onnx(OnnxEmbedding),
}

impl Model for ModelWrapper {
  type Input = Image;
  type Output = EmbeddingGrid;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      ModelWrapper::Pixel(model) => model.infer(input).map_err(ModelError::from),
      #[cfg(feature = "model_onnx")]
      ModelWrapper::Onnx(model) => model.infer(input).map_err(ModelError::from),
    }
  }
}

impl BuildModel for ModelBuilderWrapper {
  type Model = ModelWrapper;
  type Error = ModelError;

  fn build(&self) -> Result<Self::Model, Self::Error> {
    match self {
      ModelBuilderWrapper::Pixel(builder) => Ok(ModelWrapper::Pixel(builder.build()?)),
      #[cfg(feature = "model_onnx")]
      ModelBuilderWrapper::Onnx(builder) => Ok(ModelWrapper::Onnx(builder.build()?)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

  /// 通过提供者泛型地取得模型并嵌入，错误装箱后跨线程传递
  fn embed_through<P: ModelProvider>(provider: &P, image: &Image) -> Result<EmbeddingGrid, BoxError> {
    let model = provider.init().map_err(|e| Box::new(e) as BoxError)?;
    model.embed(image).map_err(|e| Box::new(e) as BoxError)
  }

  #[test]
  fn embedding_errors_box_through_generic_providers() {
    let lazy = LazyModelProvider::new(PixelEmbeddingBuilder::default());
    let grid = embed_through(&lazy, &Image::filled(2, 1, [127, 127, 127, 255])).unwrap();
    assert_eq!((grid.width(), grid.height()), (2, 1));

    let err = embed_through(&Preloaded::new(PixelEmbedding::new(0)), &Image::new(0, 0)).unwrap_err();
    assert!(err.downcast_ref::<PixelEmbeddingError>().is_some());
  }

  #[test]
  fn normalization_maps_to_unit_range() {
    assert_eq!(normalize_value(0), -1.0);
    assert_eq!(normalize_value(127), 0.0);
    assert!((normalize_value(255) - (255.0 / 127.0 - 1.0)).abs() < 1e-6);
  }

  #[test]
  fn grid_vector_is_hwc() {
    // 2x1 网格，2 通道
    let grid = EmbeddingGrid::from_hwc(2, 1, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(grid.vector(0, 0), Some(&[1.0, 2.0][..]));
    assert_eq!(grid.vector(1, 0), Some(&[3.0, 4.0][..]));
    assert_eq!(grid.vector(2, 0), None);
    assert_eq!(grid.vector(0, 1), None);
  }

  #[test]
  fn chw_is_transposed_into_hwc() {
    // 通道 0: [1, 2], 通道 1: [10, 20]
    let grid = EmbeddingGrid::from_chw(2, 1, 2, &[1.0, 2.0, 10.0, 20.0]).unwrap();
    assert_eq!(grid.vector(0, 0), Some(&[1.0, 10.0][..]));
    assert_eq!(grid.vector(1, 0), Some(&[2.0, 20.0][..]));
  }

  #[test]
  fn grid_rejects_bad_shapes() {
    assert_eq!(
      EmbeddingGrid::from_hwc(2, 2, 3, vec![0.0; 11]),
      Err(GridError::LengthMismatch {
        expected: 12,
        actual: 11
      })
    );
    assert_eq!(
      EmbeddingGrid::from_hwc(2, 2, 0, vec![]),
      Err(GridError::NoChannels)
    );
  }

  #[test]
  fn nchw_and_nhwc_agree() {
    let image = Image::from_fn(3, 2, |x, y| [x as u8 * 40, y as u8 * 90, 200, 255]);
    let nhwc = normalize_nhwc(&image);
    let nchw = normalize_nchw(&image);
    let plane = 6;
    for idx in 0..plane {
      for c in 0..3 {
        assert_eq!(nhwc[idx * 3 + c], nchw[c * plane + idx]);
      }
    }
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("tflite:///model.tflite").unwrap();
    assert!(matches!(
      ModelBuilderWrapper::from_url(&url),
      Err(ModelError::SchemeMismatch(s)) if s == "tflite"
    ));
  }
}
