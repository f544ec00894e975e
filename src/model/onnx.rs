// 该文件是 Xunying （寻影） 项目的一部分。
// src/model/onnx.rs - ONNX 嵌入模型
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

use std::sync::Mutex;

use ort::{session::Session, value::Tensor};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Image,
  model::{BuildModel, EmbeddingGrid, GridError, Model, normalize_nchw, normalize_nhwc},
  url_file_path,
};

const ONNX_INPUT_CHANNELS: usize = 3;
const ONNX_OUTPUT_RANK: usize = 4;

#[derive(Error, Debug)]
pub enum OnnxEmbeddingError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("输出形状无效: {0:?}")]
  OutputShape(Vec<i64>),
  #[error("图像尺寸无效: {0}x{1}")]
  EmptyImage(u32, u32),
  #[error("嵌入网格错误: {0}")]
  GridError(#[from] GridError),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
}

impl From<std::io::Error> for OnnxEmbeddingError {
  fn from(err: std::io::Error) -> Self {
    OnnxEmbeddingError::ModelLoadError(err)
  }
}

/// 输入与输出张量的排布
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
  #[default]
  Nhwc,
  Nchw,
}

impl std::str::FromStr for TensorLayout {
  type Err = OnnxEmbeddingError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "nhwc" => Ok(TensorLayout::Nhwc),
      "nchw" => Ok(TensorLayout::Nchw),
      other => Err(OnnxEmbeddingError::ModelPathError(format!(
        "未知的张量排布: {}",
        other
      ))),
    }
  }
}

#[derive(Debug, Clone)]
pub struct OnnxEmbeddingBuilder {
  model_path: String,
  layout: TensorLayout,
}

impl FromUrlWithScheme for OnnxEmbeddingBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxEmbeddingBuilder {
  type Error = OnnxEmbeddingError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxEmbeddingError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut layout = TensorLayout::default();
    for (k, v) in url.query_pairs() {
      if k == "layout" {
        layout = v.parse()?;
      }
    }

    Ok(OnnxEmbeddingBuilder {
      model_path: url_file_path(url)?.to_string_lossy().into_owned(),
      layout,
    })
  }
}

impl OnnxEmbeddingBuilder {
  pub fn layout(mut self, layout: TensorLayout) -> Self {
    self.layout = layout;
    self
  }
}

impl BuildModel for OnnxEmbeddingBuilder {
  type Model = OnnxEmbedding;
  type Error = OnnxEmbeddingError;

  fn build(&self) -> Result<Self::Model, Self::Error> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()?.commit_from_memory(&model_data)?;

    let input_name = match session.inputs.first() {
      Some(input) => input.name.clone(),
      None => {
        error!("模型没有输入");
        return Err(OnnxEmbeddingError::ModelInvalid("模型没有输入".to_string()));
      }
    };
    let output_name = match session.outputs.first() {
      Some(output) => output.name.clone(),
      None => {
        error!("模型没有输出");
        return Err(OnnxEmbeddingError::ModelInvalid("模型没有输出".to_string()));
      }
    };
    debug!("模型输入: {}, 模型输出: {}", input_name, output_name);
    info!("模型加载完成");

    Ok(OnnxEmbedding {
      session: Mutex::new(session),
      input_name,
      output_name,
      layout: self.layout,
    })
  }
}

pub struct OnnxEmbedding {
  session: Mutex<Session>,
  input_name: String,
  output_name: String,
  layout: TensorLayout,
}

impl Model for OnnxEmbedding {
  type Input = Image;
  type Output = EmbeddingGrid;
  type Error = OnnxEmbeddingError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (width, height) = input.dimensions();
    if input.is_empty() {
      return Err(OnnxEmbeddingError::EmptyImage(width, height));
    }

    let (w, h) = (width as usize, height as usize);
    let (shape, data) = match self.layout {
      TensorLayout::Nhwc => (vec![1, h, w, ONNX_INPUT_CHANNELS], normalize_nhwc(input)),
      TensorLayout::Nchw => (vec![1, ONNX_INPUT_CHANNELS, h, w], normalize_nchw(input)),
    };

    debug!("设置模型输入: {:?}", shape);
    let tensor = Tensor::from_array((shape, data))?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| OnnxEmbeddingError::SessionPoisoned)?;
    debug!("执行模型推理");
    let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

    let value = outputs
      .get(self.output_name.as_str())
      .ok_or_else(|| OnnxEmbeddingError::ModelInvalid(format!("缺少输出 {}", self.output_name)))?;
    let (out_shape, out_data) = value.try_extract_tensor::<f32>()?;
    let dims: Vec<i64> = out_shape.iter().copied().collect();
    debug!("模型输出形状: {:?}", dims);

    if dims.len() != ONNX_OUTPUT_RANK || dims[0] != 1 || dims.iter().any(|&d| d <= 0) {
      error!("模型输出形状无效: {:?}", dims);
      return Err(OnnxEmbeddingError::OutputShape(dims));
    }

    let grid = match self.layout {
      TensorLayout::Nhwc => {
        let (gh, gw, gc) = (dims[1] as usize, dims[2] as usize, dims[3] as usize);
        EmbeddingGrid::from_hwc(gw, gh, gc, out_data.to_vec())?
      }
      TensorLayout::Nchw => {
        let (gc, gh, gw) = (dims[1] as usize, dims[2] as usize, dims[3] as usize);
        EmbeddingGrid::from_chw(gw, gh, gc, out_data)?
      }
    };

    Ok(grid)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_reads_path_and_layout() {
    let url = Url::parse("onnx:///opt/models/dino.onnx?layout=nchw").unwrap();
    let builder = OnnxEmbeddingBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/opt/models/dino.onnx");
    assert_eq!(builder.layout, TensorLayout::Nchw);
  }

  #[test]
  fn builder_rejects_unknown_layout() {
    let url = Url::parse("onnx:///m.onnx?layout=hwnc").unwrap();
    assert!(OnnxEmbeddingBuilder::from_url(&url).is_err());
  }

  #[test]
  fn missing_model_file_is_a_load_error() {
    let url = Url::parse("onnx:///definitely/not/here.onnx").unwrap();
    let err = OnnxEmbeddingBuilder::from_url(&url)
      .unwrap()
      .build()
      .err()
      .unwrap();
    assert!(matches!(err, OnnxEmbeddingError::ModelLoadError(_)));
  }
}
