// 该文件是 Xunying （寻影） 项目的一部分。
// src/input.rs - 图像与类别输入
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

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError, decode_image_file};

#[cfg(feature = "read_image_file")]
mod class_directory;
#[cfg(feature = "read_image_file")]
pub use self::class_directory::{ClassDirectoryError, ClassDirectoryInput};

/// 可被解码为图像的文件扩展名
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "webp"];

pub fn has_image_extension(path: &std::path::Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      IMAGE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
    })
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::*;

  #[test]
  fn image_extensions_are_case_insensitive() {
    assert!(has_image_extension(Path::new("a/b/cat.PNG")));
    assert!(has_image_extension(Path::new("dog.jpeg")));
    assert!(!has_image_extension(Path::new("notes.txt")));
    assert!(!has_image_extension(Path::new("README")));
  }
}
