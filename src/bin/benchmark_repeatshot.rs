// 该文件是 Xunying （寻影） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复检测基准
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use xunying::{
  FromUrl,
  detector::{
    DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_SPREAD_THRESHOLD, DEFAULT_STRIDE, Detector,
    DetectorConfig,
  },
  input::{ClassDirectoryInput, ImageFileInput},
  model::{LazyModelProvider, ModelBuilderWrapper},
  output::OutputWrapper,
  task::{RepeatShotTask, Task},
};

/// 寻影重复检测基准
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 嵌入模型，例如 pixel://?radius=1 或 onnx:///path/model.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///path/input.png
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 类别目录，每个子目录是一个类别，例如 folder:///path/classes
  #[arg(long, value_name = "CLASSES")]
  pub classes: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 相似度阈值
  #[arg(long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD, value_name = "THRESHOLD")]
  pub similarity_threshold: f32,
  /// 离散度阈值
  #[arg(long, default_value_t = DEFAULT_SPREAD_THRESHOLD, value_name = "THRESHOLD")]
  pub spread_threshold: f64,
  /// 像素到嵌入网格的步长
  #[arg(long, default_value_t = DEFAULT_STRIDE, value_name = "STRIDE")]
  pub stride: u32,
  /// 重复检测次数
  #[arg(long, default_value_t = 100, value_name = "COUNT")]
  pub repeat: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("类别目录: {}", args.classes);
  info!("输出路径: {}", args.output);
  info!("重复次数: {}", args.repeat);

  let config = DetectorConfig::default()
    .with_similarity_threshold(args.similarity_threshold)
    .with_spread_threshold(args.spread_threshold)
    .with_stride(args.stride);
  config.validate().map_err(anyhow::Error::msg)?;

  let builder = ModelBuilderWrapper::from_url(&args.model)?;
  let classes = ClassDirectoryInput::from_url(&args.classes)?.into_classes();
  let detector = Detector::new(LazyModelProvider::new(builder))
    .with_config(config)
    .with_classes(classes);
  let input = ImageFileInput::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  RepeatShotTask::default()
    .with_repeat_times(args.repeat)
    .run_task(input, detector, output)?;

  Ok(())
}
