// 该文件是 Xunying （寻影） 项目的一部分。
// src/detector.rs - 基于参考图像的目标检测
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

//! 对每个类别的每张参考图像，逐像素比较输入与参考的嵌入向量，
//! 收集相似度超过阈值的像素，命中像素在空间上足够聚集即视为检测到该类别。
//! 同一类别中离散度最小的参考图像胜出。

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  class::{Class, ClassList},
  cluster::Cluster,
  frame::{Image, MASK_ON},
  model::{EmbeddingGrid, EmbeddingModel, Model, ModelProvider},
  similarity::{Similarity, cosine_similarity},
};

mod config;
pub use self::config::{
  DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_SPREAD_THRESHOLD, DEFAULT_STRIDE, DetectorConfig,
};

mod report;
pub use self::report::{
  ClassReport, ClassStatus, DetectResult, DetectedObject, DetectionReport, ReferenceOutcome,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
  "网格 {grid_width}x{grid_height} 无法覆盖图像 {image_width}x{image_height} (步长 {stride})"
)]
pub struct GridShapeError {
  pub grid_width: usize,
  pub grid_height: usize,
  pub image_width: u32,
  pub image_height: u32,
  pub stride: u32,
}

/// 中止整个检测调用的错误
#[derive(Error, Debug)]
pub enum DetectError {
  #[error("模型加载失败: {0}")]
  ModelLoad(#[source] BoxError),
  #[error("输入图像尺寸无效: {0}x{1}")]
  InvalidImage(u32, u32),
  #[error("输入图像嵌入失败: {0}")]
  Embedding(#[source] BoxError),
  #[error("输入图像嵌入网格尺寸不匹配: {0}")]
  GridShape(#[from] GridShapeError),
  #[error("检测配置无效: {0}")]
  InvalidConfig(String),
}

/// 单张参考图像的错误，只影响该参考图像
#[derive(Error, Debug)]
pub enum ReferenceError {
  #[error("参考图像尺寸无效: {0}x{1}")]
  EmptyImage(u32, u32),
  #[error("参考图像嵌入失败: {0}")]
  Embedding(#[source] BoxError),
  #[error("参考图像嵌入网格尺寸不匹配: {0}")]
  GridShape(#[from] GridShapeError),
  #[error("嵌入通道数不一致: 输入 {input}, 参考 {reference}")]
  ChannelMismatch { input: usize, reference: usize },
}

/// 扫描阶段的命中像素
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMatch {
  pub x: u32,
  pub y: u32,
  pub similarity: f32,
}

struct Scan {
  matches: Vec<PixelMatch>,
  indeterminate: usize,
}

struct Candidate {
  reference_index: usize,
  cluster: Cluster,
  matches: Vec<PixelMatch>,
}

pub struct Detector<P> {
  provider: P,
  config: DetectorConfig,
  classes: ClassList,
}

impl<P: ModelProvider> Detector<P> {
  pub fn new(provider: P) -> Self {
    Self {
      provider,
      config: DetectorConfig::default(),
      classes: Vec::new(),
    }
  }

  pub fn with_config(mut self, config: DetectorConfig) -> Self {
    self.config = config;
    self
  }

  /// 作为 `Model` 使用时检测的类别
  pub fn with_classes(mut self, classes: ClassList) -> Self {
    self.classes = classes;
    self
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn classes(&self) -> &[Arc<Class>] {
    &self.classes
  }

  /// 释放模型，下次检测时重新加载
  pub fn shutdown(&mut self) {
    self.provider.shutdown();
  }

  /// 检测结果按输入类别顺序排列，未检测到的类别不出现
  pub fn detect(
    &self,
    image: &Image,
    classes: &[Arc<Class>],
  ) -> Result<Vec<DetectedObject>, DetectError> {
    Ok(self.detect_with_report(image, classes)?.into_detections())
  }

  pub fn detect_with_report(
    &self,
    image: &Image,
    classes: &[Arc<Class>],
  ) -> Result<DetectionReport, DetectError> {
    self.config.validate().map_err(DetectError::InvalidConfig)?;

    let (width, height) = image.dimensions();
    if image.is_empty() {
      error!("输入图像尺寸无效: {}x{}", width, height);
      return Err(DetectError::InvalidImage(width, height));
    }

    let model = self
      .provider
      .init()
      .map_err(|e| DetectError::ModelLoad(Box::new(e)))?;

    info!("开始检测: 图像 {}x{}, 类别数 {}", width, height, classes.len());
    let grid = model.embed(image).map_err(|e| {
      error!("输入图像嵌入失败: {}", e);
      DetectError::Embedding(Box::new(e))
    })?;
    self.check_grid(&grid, width, height)?;

    let mut report = DetectionReport::default();
    for class in classes {
      let class_report = self.evaluate_class(model, image, &grid, class);
      match &class_report.detection {
        Some(det) => info!(
          "检测到 {}: 相似度 {:.4}, 像素 {}, 离散度 {:.3}",
          class.name(),
          det.similarity(),
          det.pixel_count(),
          det.spread()
        ),
        None => debug!("未检测到 {}: {:?}", class.name(), class_report.status()),
      }
      report.classes.push(class_report);
    }

    Ok(report)
  }

  fn check_grid(
    &self,
    grid: &EmbeddingGrid,
    width: u32,
    height: u32,
  ) -> Result<(), GridShapeError> {
    let (need_w, need_h) = self.config.grid_extent(width, height);
    if grid.width() < need_w || grid.height() < need_h {
      return Err(GridShapeError {
        grid_width: grid.width(),
        grid_height: grid.height(),
        image_width: width,
        image_height: height,
        stride: self.config.stride,
      });
    }
    Ok(())
  }

  fn evaluate_class<M: EmbeddingModel>(
    &self,
    model: &M,
    image: &Image,
    grid: &EmbeddingGrid,
    class: &Arc<Class>,
  ) -> ClassReport {
    let mut best: Option<Candidate> = None;
    let mut references = Vec::with_capacity(class.images().len());

    for (index, reference) in class.images().iter().enumerate() {
      let scan = match self.scan_reference(model, image, grid, reference) {
        Ok(scan) => scan,
        Err(e) => {
          warn!("类别 {} 的第 {} 张参考图像被跳过: {}", class.name(), index, e);
          references.push(ReferenceOutcome::Failed {
            reason: e.to_string(),
          });
          continue;
        }
      };

      if scan.indeterminate > 0 {
        warn!(
          "类别 {} 的第 {} 张参考图像有 {} 个像素相似度无法确定",
          class.name(),
          index,
          scan.indeterminate
        );
      }

      let indeterminate = scan.indeterminate;
      let Some(cluster) = Cluster::from_points(scan.matches.iter().map(|m| (m.x, m.y))) else {
        debug!("类别 {} 参考 {}: 无命中像素", class.name(), index);
        references.push(ReferenceOutcome::NoMatch { indeterminate });
        continue;
      };

      debug!(
        "类别 {} 参考 {}: 命中 {} 像素, 质心 ({:.2}, {:.2}), 离散度 {:.3}",
        class.name(),
        index,
        cluster.count,
        cluster.centroid.0,
        cluster.centroid.1,
        cluster.spread
      );

      if !cluster.is_consistent(self.config.spread_threshold) {
        references.push(ReferenceOutcome::Scattered {
          cluster,
          indeterminate,
        });
        continue;
      }

      if best
        .as_ref()
        .is_none_or(|b| cluster.spread < b.cluster.spread)
      {
        best = Some(Candidate {
          reference_index: index,
          cluster,
          matches: scan.matches,
        });
      }
      references.push(ReferenceOutcome::Consistent {
        cluster,
        indeterminate,
      });
    }

    let detection = best.map(|candidate| self.build_detection(class, image, candidate));
    ClassReport {
      class: Arc::clone(class),
      references,
      detection,
    }
  }

  fn scan_reference<M: EmbeddingModel>(
    &self,
    model: &M,
    image: &Image,
    grid: &EmbeddingGrid,
    reference: &Image,
  ) -> Result<Scan, ReferenceError> {
    if reference.is_empty() {
      let (w, h) = reference.dimensions();
      return Err(ReferenceError::EmptyImage(w, h));
    }

    let ref_grid = model
      .embed(reference)
      .map_err(|e| ReferenceError::Embedding(Box::new(e)))?;

    let (width, height) = image.dimensions();
    self.check_grid(&ref_grid, width, height)?;
    if ref_grid.channels() != grid.channels() {
      return Err(ReferenceError::ChannelMismatch {
        input: grid.channels(),
        reference: ref_grid.channels(),
      });
    }

    // 每个网格单元只计算一次，再展开到它覆盖的像素
    let (cells_w, cells_h) = self.config.grid_extent(width, height);
    let mut cells = Vec::with_capacity(cells_w * cells_h);
    for gy in 0..cells_h {
      for gx in 0..cells_w {
        let similarity = match (grid.vector(gx, gy), ref_grid.vector(gx, gy)) {
          (Some(a), Some(b)) => cosine_similarity(a, b),
          _ => Similarity::Indeterminate,
        };
        cells.push(similarity);
      }
    }

    let stride = self.config.stride;
    let threshold = self.config.similarity_threshold;
    let mut scan = Scan {
      matches: Vec::new(),
      indeterminate: 0,
    };
    for x in 0..width {
      for y in 0..height {
        let cell = cells[(y / stride) as usize * cells_w + (x / stride) as usize];
        match cell {
          Similarity::Score(similarity) if cell.exceeds(threshold) => {
            scan.matches.push(PixelMatch { x, y, similarity });
          }
          Similarity::Score(_) => {}
          Similarity::Indeterminate => scan.indeterminate += 1,
        }
      }
    }

    Ok(scan)
  }

  fn build_detection(&self, class: &Arc<Class>, image: &Image, candidate: Candidate) -> DetectedObject {
    let (width, height) = image.dimensions();
    let mut mask = Image::new(width, height);
    let mut similarity = f32::NEG_INFINITY;
    for m in &candidate.matches {
      mask.set_pixel(m.x, m.y, MASK_ON);
      similarity = similarity.max(m.similarity);
    }

    DetectedObject::new(
      Arc::clone(class),
      mask,
      similarity,
      candidate.reference_index,
      candidate.cluster,
    )
  }
}

impl<P: ModelProvider> Model for Detector<P> {
  type Input = Image;
  type Output = DetectResult;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input, &self.classes).map(DetectResult::from)
  }
}
