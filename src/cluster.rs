// 该文件是 Xunying （寻影） 项目的一部分。
// src/cluster.rs - 命中像素的空间聚集度
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

/// 一组命中像素的空间统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cluster {
  pub centroid: (f64, f64),
  /// 到质心距离的标准差除以 sqrt(样本数)
  pub spread: f64,
  pub count: usize,
}

impl Cluster {
  /// 集合为空时返回 None，即"不一致"
  pub fn from_points<I>(points: I) -> Option<Self>
  where
    I: IntoIterator<Item = (u32, u32)>,
    I::IntoIter: Clone,
  {
    let points = points.into_iter();
    let (mut sum_x, mut sum_y, mut count) = (0f64, 0f64, 0usize);
    for (x, y) in points.clone() {
      sum_x += x as f64;
      sum_y += y as f64;
      count += 1;
    }
    if count == 0 {
      return None;
    }

    let n = count as f64;
    let centroid = (sum_x / n, sum_y / n);
    let squared: f64 = points
      .map(|(x, y)| {
        let (dx, dy) = (x as f64 - centroid.0, y as f64 - centroid.1);
        dx * dx + dy * dy
      })
      .sum();
    let spread = (squared / n).sqrt() / n.sqrt();

    Some(Self {
      centroid,
      spread,
      count,
    })
  }

  pub fn is_consistent(&self, spread_threshold: f64) -> bool {
    self.spread < spread_threshold
  }
}

/// 空集合直接判为不一致
pub fn is_consistent<I>(points: I, spread_threshold: f64) -> bool
where
  I: IntoIterator<Item = (u32, u32)>,
  I::IntoIter: Clone,
{
  Cluster::from_points(points).is_some_and(|c| c.is_consistent(spread_threshold))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_set_is_not_consistent() {
    assert_eq!(Cluster::from_points(Vec::<(u32, u32)>::new()), None);
    assert!(!is_consistent(Vec::new(), f64::INFINITY));
  }

  #[test]
  fn two_by_two_block() {
    let cluster = Cluster::from_points(vec![(0, 0), (1, 0), (0, 1), (1, 1)]).unwrap();
    assert_eq!(cluster.centroid, (0.5, 0.5));
    assert_eq!(cluster.count, 4);
    // 每个点到质心的平方距离都是 0.5
    let expected = 0.5f64.sqrt() / 2.0;
    assert!((cluster.spread - expected).abs() < 1e-12);
    assert!(cluster.is_consistent(15.0));
  }

  #[test]
  fn single_point_has_zero_spread() {
    let cluster = Cluster::from_points([(7, 3)]).unwrap();
    assert_eq!(cluster.centroid, (7.0, 3.0));
    assert_eq!(cluster.spread, 0.0);
  }

  #[test]
  fn more_samples_tighten_spread() {
    // 同样的两端点，样本越多归一化后的离散度越小
    let sparse = Cluster::from_points([(0, 0), (100, 0)]).unwrap();
    let dense = Cluster::from_points(
      std::iter::repeat_n([(0u32, 0u32), (100, 0)], 50).flatten(),
    )
    .unwrap();
    assert!((sparse.spread - 50.0 / 2f64.sqrt()).abs() < 1e-9);
    assert!(dense.spread < sparse.spread);
    assert!(!sparse.is_consistent(15.0));
    assert!(dense.is_consistent(15.0));
  }

  #[test]
  fn threshold_is_strict() {
    let cluster = Cluster::from_points([(0, 0), (2, 0)]).unwrap();
    // 标准差 1, 样本 2
    let spread = 1.0 / 2f64.sqrt();
    assert!((cluster.spread - spread).abs() < 1e-12);
    assert!(!cluster.is_consistent(cluster.spread));
  }
}
