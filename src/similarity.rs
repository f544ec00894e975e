// 该文件是 Xunying （寻影） 项目的一部分。
// src/similarity.rs - 嵌入向量相似度
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

/// 两个嵌入向量的相似度，`1 - 余弦距离`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Similarity {
  Score(f32),
  /// 零向量、长度不一致或出现非有限值，无法给出相似度
  Indeterminate,
}

impl Similarity {
  pub fn score(self) -> Option<f32> {
    match self {
      Similarity::Score(s) => Some(s),
      Similarity::Indeterminate => None,
    }
  }

  /// 严格大于阈值才算命中，无法确定的结果永不命中
  pub fn exceeds(self, threshold: f32) -> bool {
    matches!(self, Similarity::Score(s) if s > threshold)
  }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Similarity {
  if a.len() != b.len() || a.is_empty() {
    return Similarity::Indeterminate;
  }

  let (mut dot, mut norm_a, mut norm_b) = (0f32, 0f32, 0f32);
  for (x, y) in a.iter().zip(b) {
    dot += x * y;
    norm_a += x * x;
    norm_b += y * y;
  }

  let denom = norm_a.sqrt() * norm_b.sqrt();
  if !denom.is_finite() || norm_a.sqrt() < f32::EPSILON || norm_b.sqrt() < f32::EPSILON {
    return Similarity::Indeterminate;
  }

  let score = dot / denom;
  if score.is_finite() {
    Similarity::Score(score)
  } else {
    Similarity::Indeterminate
  }
}
