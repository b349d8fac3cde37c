// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/tensor.rs - 稠密浮点张量
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

#[derive(Error, Debug)]
pub enum TensorError {
  #[error("数据长度不匹配: 形状 {shape:?} 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
}

/// 行优先存储的稠密 f32 张量
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  shape: Box<[usize]>,
  data: Box<[f32]>,
}

impl Tensor {
  pub fn zeros(shape: &[usize]) -> Self {
    let size = shape.iter().product();
    Self {
      shape: shape.into(),
      data: vec![0.0f32; size].into_boxed_slice(),
    }
  }

  pub fn from_vec(shape: &[usize], data: Vec<f32>) -> Result<Self, TensorError> {
    let expected: usize = shape.iter().product();
    if data.len() != expected {
      return Err(TensorError::LengthMismatch {
        shape: shape.to_vec(),
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      shape: shape.into(),
      data: data.into_boxed_slice(),
    })
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  /// 元素总数
  pub fn total(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn into_data(self) -> Box<[f32]> {
    self.data
  }
}

impl AsRef<[f32]> for Tensor {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

impl AsMut<[f32]> for Tensor {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zeros_has_product_size() {
    let tensor = Tensor::zeros(&[1, 3, 4, 5]);
    assert_eq!(tensor.total(), 60);
    assert_eq!(tensor.shape(), &[1, 3, 4, 5]);
  }

  #[test]
  fn from_vec_rejects_wrong_length() {
    let err = Tensor::from_vec(&[2, 7], vec![0.0; 13]).unwrap_err();
    match err {
      TensorError::LengthMismatch {
        expected, actual, ..
      } => {
        assert_eq!(expected, 14);
        assert_eq!(actual, 13);
      }
    }
  }
}
