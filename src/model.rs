// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/model.rs - 模型
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

use thiserror::Error;

use crate::tensor::{Tensor, TensorError};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum NetworkError {
  #[error("尚未设置网络输入")]
  NoInput,
  #[error("模型路径无效: {0}")]
  InvalidPath(String),
  #[error("网络加载失败: {0}")]
  Load(String),
  #[error("前向推理失败: {0}")]
  Forward(String),
  #[error("网络输出错误: {0}")]
  Output(#[from] TensorError),
  #[cfg(feature = "opencv")]
  #[error("OpenCV 错误: {0}")]
  OpenCv(#[from] opencv::Error),
}

/// 推理运行时句柄
///
/// 句柄内部持有执行状态，不可重入；`&mut self` 保证同一时刻只有一次前向推理。
pub trait Network {
  fn set_input(&mut self, blob: Tensor) -> Result<(), NetworkError>;
  fn forward(&mut self) -> Result<Tensor, NetworkError>;
}

impl<N: Network + ?Sized> Network for Box<N> {
  fn set_input(&mut self, blob: Tensor) -> Result<(), NetworkError> {
    (**self).set_input(blob)
  }

  fn forward(&mut self) -> Result<Tensor, NetworkError> {
    (**self).forward()
  }
}

/// 像素坐标下的边框，不裁剪到帧范围内
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
  pub left: i32,
  pub top: i32,
  pub right: i32,
  pub bottom: i32,
}

impl PixelBox {
  /// 归一化坐标 [x_min, y_min, x_max, y_max] 按帧宽高缩放并向零截断
  pub fn from_normalized(bbox: [f32; 4], width: u32, height: u32) -> Self {
    let (w, h) = (width as f64, height as f64);
    Self {
      left: (bbox[0] as f64 * w) as i32,
      top: (bbox[1] as f64 * h) as i32,
      right: (bbox[2] as f64 * w) as i32,
      bottom: (bbox[3] as f64 * h) as i32,
    }
  }
}

#[derive(Debug, Clone)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: PixelBox,
}

#[derive(Debug, Clone)]
pub struct DetectResult<T> {
  pub items: Box<[DetectItem<T>]>,
}

impl<T> DetectResult<T> {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

impl<T> Default for DetectResult<T> {
  fn default() -> Self {
    Self {
      items: Box::new([]),
    }
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  /// 越界的类别编号返回 `None`
  fn from_label_id(id: u32) -> Option<Self>;
}

mod label;
pub use self::label::{VOC_CLASSES, VocLabel};

mod mobilenet_ssd;
pub use self::mobilenet_ssd::{
  BLOB_PARAMS, CONFIDENCE_THRESHOLD, DecodeError, DetectError, DetectionRow, DetectionTable,
  InitError, MODEL_TOPOLOGY_FILE, MODEL_WEIGHTS_FILE, MobileNetSsd, MobileNetSsdBuilder,
  TABLE_COLUMNS, decode_table,
};

#[cfg(feature = "opencv")]
mod opencv_net;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(feature = "opencv")]
pub use self::opencv_net::OpenCvNet;
