// 该文件是 Xunying （寻影） 项目的一部分。
// src/detector/report.rs - 检测结果与逐类报告
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

use crate::{class::Class, cluster::Cluster, frame::Image};

/// 一个被检测到的类别，创建后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedObject {
  class: Arc<Class>,
  mask: Image,
  similarity: f32,
  reference_index: usize,
  cluster: Cluster,
}

impl DetectedObject {
  pub(crate) fn new(
    class: Arc<Class>,
    mask: Image,
    similarity: f32,
    reference_index: usize,
    cluster: Cluster,
  ) -> Self {
    Self {
      class,
      mask,
      similarity,
      reference_index,
      cluster,
    }
  }

  pub fn class(&self) -> &Arc<Class> {
    &self.class
  }

  pub fn name(&self) -> &str {
    self.class.name()
  }

  /// 与输入同尺寸，命中像素为不透明白色，其余透明
  pub fn mask(&self) -> &Image {
    &self.mask
  }

  /// 胜出参考图像中命中像素的最大相似度
  pub fn similarity(&self) -> f32 {
    self.similarity
  }

  /// 胜出的参考图像在类别中的序号
  pub fn reference_index(&self) -> usize {
    self.reference_index
  }

  /// 掩码像素的平均位置
  pub fn mean_location(&self) -> (f64, f64) {
    self.cluster.centroid
  }

  pub fn spread(&self) -> f64 {
    self.cluster.spread
  }

  pub fn pixel_count(&self) -> usize {
    self.cluster.count
  }
}

/// 检测模型的输出
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectedObject]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectedObject> {
    self.items.iter()
  }
}

impl From<Vec<DetectedObject>> for DetectResult {
  fn from(items: Vec<DetectedObject>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

/// 单张参考图像的比对结果
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceOutcome {
  /// 参考图像无法参与比对（嵌入失败、尺寸无效等）
  Failed { reason: String },
  /// 没有任何像素超过相似度阈值
  NoMatch { indeterminate: usize },
  /// 有命中像素，但空间上过于分散
  Scattered { cluster: Cluster, indeterminate: usize },
  /// 命中像素聚集
  Consistent { cluster: Cluster, indeterminate: usize },
}

impl ReferenceOutcome {
  pub fn is_failed(&self) -> bool {
    matches!(self, ReferenceOutcome::Failed { .. })
  }

  /// 相似度无法确定的像素数
  pub fn indeterminate(&self) -> usize {
    match self {
      ReferenceOutcome::Failed { .. } => 0,
      ReferenceOutcome::NoMatch { indeterminate }
      | ReferenceOutcome::Scattered { indeterminate, .. }
      | ReferenceOutcome::Consistent { indeterminate, .. } => *indeterminate,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassStatus {
  Detected,
  NotDetected,
  /// 所有参考图像都因错误未能比对
  Skipped,
}

#[derive(Debug, Clone)]
pub struct ClassReport {
  pub class: Arc<Class>,
  pub references: Vec<ReferenceOutcome>,
  pub detection: Option<DetectedObject>,
}

impl ClassReport {
  pub fn status(&self) -> ClassStatus {
    if self.detection.is_some() {
      ClassStatus::Detected
    } else if !self.references.is_empty() && self.references.iter().all(|r| r.is_failed()) {
      ClassStatus::Skipped
    } else {
      ClassStatus::NotDetected
    }
  }
}

/// 一次检测调用的完整报告，类别顺序与输入一致
#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
  pub classes: Vec<ClassReport>,
}

impl DetectionReport {
  pub fn detections(&self) -> impl Iterator<Item = &DetectedObject> {
    self.classes.iter().filter_map(|c| c.detection.as_ref())
  }

  pub fn into_detections(self) -> Vec<DetectedObject> {
    self
      .classes
      .into_iter()
      .filter_map(|c| c.detection)
      .collect()
  }

  pub fn status_of(&self, name: &str) -> Option<ClassStatus> {
    self
      .classes
      .iter()
      .find(|c| c.class.name() == name)
      .map(ClassReport::status)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn report(references: Vec<ReferenceOutcome>) -> ClassReport {
    ClassReport {
      class: Class::new("car", vec![]).into_shared(),
      references,
      detection: None,
    }
  }

  #[test]
  fn all_failed_references_mean_skipped() {
    let r = report(vec![
      ReferenceOutcome::Failed {
        reason: "a".to_string(),
      },
      ReferenceOutcome::Failed {
        reason: "b".to_string(),
      },
    ]);
    assert_eq!(r.status(), ClassStatus::Skipped);
  }

  #[test]
  fn partial_failure_is_not_detected() {
    let r = report(vec![
      ReferenceOutcome::Failed {
        reason: "a".to_string(),
      },
      ReferenceOutcome::NoMatch { indeterminate: 3 },
    ]);
    assert_eq!(r.status(), ClassStatus::NotDetected);
    assert_eq!(r.references[1].indeterminate(), 3);
  }

  #[test]
  fn class_without_references_is_not_detected() {
    assert_eq!(report(vec![]).status(), ClassStatus::NotDetected);
  }
}
