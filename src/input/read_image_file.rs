// 该文件是 Xunying （寻影） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Image, url_file_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Image is empty: {0}x{1}")]
  EmptyImage(u32, u32),
}

/// 解码图像文件，统一转换为 RGBA
pub fn decode_image_file(path: &Path) -> Result<Image, ImageFileInputError> {
  let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
  let image = Image::from(decoded.into_rgba8());
  let (width, height) = image.dimensions();
  if image.is_empty() {
    return Err(ImageFileInputError::EmptyImage(width, height));
  }
  debug!("读取图像 {}: {}x{}", path.display(), width, height);
  Ok(image)
}

pub struct ImageFileInput {
  image: Option<Image>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let image = decode_image_file(&url_file_path(url)?)?;
    Ok(ImageFileInput { image: Some(image) })
  }
}

impl ImageFileInput {
  pub fn from_image(image: Image) -> Self {
    Self { image: Some(image) }
  }
}

impl Iterator for ImageFileInput {
  type Item = Image;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_png_as_rgba() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in.png");
    image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]))
      .save(&path)
      .unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    let image = input.next().unwrap();
    assert_eq!(image.dimensions(), (3, 2));
    assert_eq!(image.pixel(2, 1), [10, 20, 30, 255]);
    assert!(input.next().is_none());
  }

  #[test]
  fn path_with_space_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("my photo.png");
    image::RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]))
      .save(&path)
      .unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    assert!(url.path().contains("%20"));
    let image = ImageFileInput::from_url(&url).unwrap().next().unwrap();
    assert_eq!(image.pixel(1, 1), [1, 2, 3, 255]);
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("video:///tmp/a.mp4").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }

  #[test]
  fn missing_file_is_io_error() {
    let url = Url::parse("image:///no/such/file.png").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::IoError(_))
    ));
  }
}
