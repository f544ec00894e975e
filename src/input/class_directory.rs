// 该文件是 Xunying （寻影） 项目的一部分。
// src/input/class_directory.rs - 从目录加载类别参考图像
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

//! 目录结构：每个子目录是一个类别，子目录名即类别名，
//! 其中的图像文件按文件名排序后作为参考图像。

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  class::{Class, ClassList},
  input::{ImageFileInputError, decode_image_file, has_image_extension},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum ClassDirectoryError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("参考图像 {} 读取失败: {}", .0.display(), .1)]
  ImageError(PathBuf, ImageFileInputError),
  #[error("类别目录名无效: {}", .0.display())]
  InvalidName(PathBuf),
}

pub struct ClassDirectoryInput {
  classes: ClassList,
}

impl FromUrlWithScheme for ClassDirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ClassDirectoryInput {
  type Error = ClassDirectoryError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ClassDirectoryError::SchemeMismatch);
    }

    // ?only=car,person 只加载列出的类别
    let only: Option<Vec<String>> = url
      .query_pairs()
      .find(|(k, _)| k == "only")
      .map(|(_, v)| v.split(',').map(|s| s.trim().to_string()).collect());

    Self::load(&url_file_path(url)?, only.as_deref())
  }
}

impl ClassDirectoryInput {
  pub fn load(root: &Path, only: Option<&[String]>) -> Result<Self, ClassDirectoryError> {
    info!("加载类别目录: {}", root.display());
    let class_dirs = sorted_entries(root)?
      .into_iter()
      .filter(|p| p.is_dir())
      .collect::<Vec<_>>();

    let mut classes = Vec::with_capacity(class_dirs.len());
    for dir in class_dirs {
      let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ClassDirectoryError::InvalidName(dir.clone()))?
        .to_string();

      if only.is_some_and(|names| !names.contains(&name)) {
        debug!("跳过类别 {}", name);
        continue;
      }

      let mut images = Vec::new();
      for path in sorted_entries(&dir)? {
        if !path.is_file() || !has_image_extension(&path) {
          debug!("忽略非图像文件: {}", path.display());
          continue;
        }
        let image =
          decode_image_file(&path).map_err(|e| ClassDirectoryError::ImageError(path.clone(), e))?;
        images.push(image);
      }

      if images.is_empty() {
        warn!("类别 {} 没有参考图像，将不会被检测到", name);
      }
      info!("类别 {}: {} 张参考图像", name, images.len());
      classes.push(Class::new(name, images).into_shared());
    }

    Ok(Self { classes })
  }

  pub fn classes(&self) -> &ClassList {
    &self.classes
  }

  pub fn into_classes(self) -> ClassList {
    self.classes
  }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
  let mut entries = std::fs::read_dir(dir)?
    .map(|entry| entry.map(|e| e.path()))
    .collect::<Result<Vec<_>, _>>()?;
  entries.sort();
  Ok(entries)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write_png(path: &Path, rgb: [u8; 3]) {
    image::RgbImage::from_pixel(2, 2, image::Rgb(rgb))
      .save(path)
      .unwrap();
  }

  #[test]
  fn loads_classes_in_name_order() {
    let root = tempfile::tempdir().unwrap();
    let person = root.path().join("person");
    let car = root.path().join("car");
    std::fs::create_dir(&person).unwrap();
    std::fs::create_dir(&car).unwrap();
    write_png(&car.join("b.png"), [0, 0, 200]);
    write_png(&car.join("a.png"), [200, 0, 0]);
    std::fs::write(car.join("notes.txt"), "not an image").unwrap();
    write_png(&person.join("p.png"), [0, 200, 0]);
    std::fs::write(root.path().join("stray.png"), "ignored").unwrap();

    let url = Url::parse(&format!("folder://{}", root.path().display())).unwrap();
    let classes = ClassDirectoryInput::from_url(&url).unwrap().into_classes();

    let names: Vec<_> = classes.iter().map(|c| c.name()).collect();
    assert_eq!(names, ["car", "person"]);
    assert_eq!(classes[0].images().len(), 2);
    assert_eq!(classes[0].images()[0].pixel(0, 0), [200, 0, 0, 255]);
    assert_eq!(classes[1].images().len(), 1);
  }

  #[test]
  fn non_ascii_root_is_decoded() {
    let root = tempfile::tempdir().unwrap();
    let library = root.path().join("类别");
    let cone = library.join("路锥");
    std::fs::create_dir_all(&cone).unwrap();
    write_png(&cone.join("参考.png"), [240, 120, 10]);

    let url = Url::parse(&format!("folder://{}", library.display())).unwrap();
    let classes = ClassDirectoryInput::from_url(&url).unwrap().into_classes();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].name(), "路锥");
    assert_eq!(classes[0].images().len(), 1);
  }

  #[test]
  fn empty_class_directory_yields_class_without_images() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("ghost")).unwrap();
    let input = ClassDirectoryInput::load(root.path(), None).unwrap();
    assert_eq!(input.classes().len(), 1);
    assert!(!input.classes()[0].is_evaluable());
  }

  #[test]
  fn only_filter_selects_classes() {
    let root = tempfile::tempdir().unwrap();
    for name in ["a", "b", "c"] {
      std::fs::create_dir(root.path().join(name)).unwrap();
    }
    let url = Url::parse(&format!("folder://{}?only=c,a", root.path().display())).unwrap();
    let classes = ClassDirectoryInput::from_url(&url).unwrap().into_classes();
    let names: Vec<_> = classes.iter().map(|c| c.name()).collect();
    assert_eq!(names, ["a", "c"]);
  }

  #[test]
  fn corrupt_reference_image_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("broken");
    std::fs::create_dir(&dir).unwrap();
    std::fs::write(dir.join("x.png"), b"definitely not png").unwrap();
    assert!(matches!(
      ClassDirectoryInput::load(root.path(), None),
      Err(ClassDirectoryError::ImageError(..))
    ));
  }
}
