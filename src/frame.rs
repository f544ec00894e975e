// 该文件是 Xunying （寻影） 项目的一部分。
// src/frame.rs - RGBA 图像定义
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

pub const RGBA_CHANNELS: usize = 4;

/// 不透明白色，掩码中被命中的像素
pub const MASK_ON: [u8; RGBA_CHANNELS] = [255, 255, 255, 255];
/// 透明黑色，图像的默认像素
pub const MASK_OFF: [u8; RGBA_CHANNELS] = [0, 0, 0, 0];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImageError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 像素访问能力，解码器适配器只需实现该特征即可接入检测流程
pub trait PixelSource {
  fn width(&self) -> u32;
  fn height(&self) -> u32;
  /// 返回 (x, y) 处的 RGBA 像素，调用方保证坐标在图像范围内
  fn pixel(&self, x: u32, y: u32) -> [u8; RGBA_CHANNELS];

  fn is_empty(&self) -> bool {
    self.width() == 0 || self.height() == 0
  }
}

/// 行优先存储的 RGBA8 图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl Image {
  /// 创建全透明图像
  pub fn new(width: u32, height: u32) -> Self {
    let size = RGBA_CHANNELS * (width as usize) * (height as usize);
    Self {
      width,
      height,
      data: vec![0u8; size].into_boxed_slice(),
    }
  }

  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ImageError> {
    let expected = RGBA_CHANNELS * (width as usize) * (height as usize);
    if data.len() != expected {
      return Err(ImageError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  /// 以函数逐像素生成图像
  pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
  where
    F: FnMut(u32, u32) -> [u8; RGBA_CHANNELS],
  {
    let mut image = Self::new(width, height);
    for y in 0..height {
      for x in 0..width {
        image.set_pixel(x, y, f(x, y));
      }
    }
    image
  }

  /// 纯色图像
  pub fn filled(width: u32, height: u32, rgba: [u8; RGBA_CHANNELS]) -> Self {
    Self::from_fn(width, height, |_, _| rgba)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  fn index(&self, x: u32, y: u32) -> usize {
    ((y as usize) * (self.width as usize) + (x as usize)) * RGBA_CHANNELS
  }

  pub fn pixel(&self, x: u32, y: u32) -> [u8; RGBA_CHANNELS] {
    let idx = self.index(x, y);
    let mut rgba = [0u8; RGBA_CHANNELS];
    rgba.copy_from_slice(&self.data[idx..idx + RGBA_CHANNELS]);
    rgba
  }

  pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; RGBA_CHANNELS]) {
    let idx = self.index(x, y);
    self.data[idx..idx + RGBA_CHANNELS].copy_from_slice(&rgba);
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn as_raw(&self) -> &[u8] {
    &self.data
  }

  /// 统计不透明像素数量，掩码中即为命中的像素
  pub fn count_opaque(&self) -> usize {
    self
      .data
      .chunks_exact(RGBA_CHANNELS)
      .filter(|px| px[3] != 0)
      .count()
  }
}

impl PixelSource for Image {
  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn pixel(&self, x: u32, y: u32) -> [u8; RGBA_CHANNELS] {
    Image::pixel(self, x, y)
  }
}

impl AsRef<[u8]> for Image {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

impl AsMut<[u8]> for Image {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

#[cfg(feature = "image")]
impl From<image::RgbaImage> for Image {
  fn from(image: image::RgbaImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

#[cfg(feature = "image")]
impl From<image::RgbImage> for Image {
  fn from(image: image::RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self::from_fn(width, height, |x, y| {
      let [r, g, b] = image.get_pixel(x, y).0;
      [r, g, b, 255]
    })
  }
}

#[cfg(feature = "image")]
impl From<&Image> for image::RgbaImage {
  fn from(image: &Image) -> Self {
    image::ImageBuffer::from_fn(image.width, image.height, |x, y| {
      image::Rgba(image.pixel(x, y))
    })
  }
}
