// 该文件是 Xunying （寻影） 项目的一部分。
// src/output/draw.rs - 检测掩码可视化
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

use image::{Rgba, RgbaImage};
use imageproc::{
  drawing::{draw_cross_mut, draw_hollow_rect_mut},
  rect::Rect,
};

use crate::{
  detector::{DetectResult, DetectedObject},
  frame::Image,
};

// 掩码着色
const MASK_ALPHA: f32 = 0.45;
const MASK_PALETTE: [[u8; 3]; 6] = [
  [255, 64, 64],  // 红色
  [64, 200, 64],  // 绿色
  [64, 96, 255],  // 蓝色
  [255, 200, 0],  // 黄色
  [200, 64, 255], // 紫色
  [0, 200, 200],  // 青色
];

pub struct Draw {
  alpha: f32,
  palette: Vec<[u8; 3]>,
  draw_bounds: bool,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      alpha: MASK_ALPHA,
      palette: MASK_PALETTE.to_vec(),
      draw_bounds: true,
    }
  }
}

/// 掩码中不透明像素的包围框 (x_min, y_min, x_max, y_max)，全空时返回 None
pub fn mask_bounds(mask: &Image) -> Option<(u32, u32, u32, u32)> {
  let (width, height) = mask.dimensions();
  let mut bounds: Option<(u32, u32, u32, u32)> = None;
  for y in 0..height {
    for x in 0..width {
      if mask.pixel(x, y)[3] == 0 {
        continue;
      }
      bounds = Some(match bounds {
        None => (x, y, x, y),
        Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
      });
    }
  }
  bounds
}

impl Draw {
  pub fn with_alpha(mut self, alpha: f32) -> Self {
    self.alpha = alpha.clamp(0.0, 1.0);
    self
  }

  pub fn with_bounds(mut self, draw_bounds: bool) -> Self {
    self.draw_bounds = draw_bounds;
    self
  }

  pub fn color_for(&self, index: usize) -> [u8; 3] {
    self.palette[index % self.palette.len()]
  }

  fn draw_detection(&self, canvas: &mut RgbaImage, det: &DetectedObject, color: [u8; 3]) {
    let mask = det.mask();
    let (width, height) = mask.dimensions();

    for y in 0..height.min(canvas.height()) {
      for x in 0..width.min(canvas.width()) {
        if mask.pixel(x, y)[3] == 0 {
          continue;
        }
        let px = canvas.get_pixel_mut(x, y);
        for c in 0..3 {
          let blended = px[c] as f32 * (1.0 - self.alpha) + color[c] as f32 * self.alpha;
          px[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
        px[3] = 255;
      }
    }

    let outline = Rgba([color[0], color[1], color[2], 255]);
    if self.draw_bounds
      && let Some((x0, y0, x1, y1)) = mask_bounds(mask)
    {
      let rect = Rect::at(x0 as i32, y0 as i32).of_size(x1 - x0 + 1, y1 - y0 + 1);
      draw_hollow_rect_mut(canvas, rect, outline);
    }

    let (cx, cy) = det.mean_location();
    draw_cross_mut(canvas, outline, cx.round() as i32, cy.round() as i32);
  }

  /// 在输入图像上叠加所有检测掩码
  pub fn draw_overlay(&self, frame: &Image, result: &DetectResult) -> RgbaImage {
    let mut canvas = RgbaImage::from(frame);
    for (index, det) in result.iter().enumerate() {
      self.draw_detection(&mut canvas, det, self.color_for(index));
    }
    canvas
  }
}

/// 单个掩码转为可保存的图像
pub fn mask_image(det: &DetectedObject) -> RgbaImage {
  RgbaImage::from(det.mask())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::MASK_ON;

  #[test]
  fn bounds_of_mask() {
    let mut mask = Image::new(5, 4);
    assert_eq!(mask_bounds(&mask), None);
    mask.set_pixel(1, 2, MASK_ON);
    mask.set_pixel(3, 1, MASK_ON);
    assert_eq!(mask_bounds(&mask), Some((1, 1, 3, 2)));
  }

  #[test]
  fn palette_wraps() {
    let draw = Draw::default();
    assert_eq!(draw.color_for(0), draw.color_for(MASK_PALETTE.len()));
  }

  #[test]
  fn empty_result_leaves_frame_untouched() {
    let frame = Image::filled(3, 3, [12, 34, 56, 255]);
    let canvas = Draw::default().draw_overlay(&frame, &DetectResult::default());
    assert_eq!(canvas.get_pixel(1, 1).0, [12, 34, 56, 255]);
  }
}
