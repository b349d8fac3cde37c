// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/model/opencv_net.rs - OpenCV DNN 推理后端
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

use std::path::Path;

use opencv::{
  core::{CV_32F, Mat, Scalar},
  dnn,
  prelude::*,
};
use tracing::debug;

use crate::{
  model::{Network, NetworkError},
  tensor::Tensor,
};

/// 由 Caffe 模型文件加载的 OpenCV DNN 网络
pub struct OpenCvNet {
  net: dnn::Net,
}

fn path_str(path: &Path) -> Result<&str, NetworkError> {
  path
    .to_str()
    .ok_or_else(|| NetworkError::InvalidPath(path.display().to_string()))
}

impl OpenCvNet {
  pub fn from_caffe(topology: &Path, weights: &Path) -> Result<Self, NetworkError> {
    let net = dnn::read_net_from_caffe(path_str(topology)?, path_str(weights)?)?;
    if net.empty()? {
      return Err(NetworkError::Load(format!(
        "网络为空: {}",
        topology.display()
      )));
    }
    debug!("OpenCV 网络层数: {}", net.get_layer_names()?.len());
    Ok(Self { net })
  }
}

impl Network for OpenCvNet {
  fn set_input(&mut self, blob: Tensor) -> Result<(), NetworkError> {
    let sizes = blob
      .shape()
      .iter()
      .map(|&d| d as i32)
      .collect::<Vec<_>>();
    let mut mat = Mat::new_nd_with_default(&sizes, CV_32F, Scalar::all(0.0))?;
    mat.data_typed_mut::<f32>()?.copy_from_slice(blob.as_ref());

    self.net.set_input(&mat, "", 1.0, Scalar::default())?;
    Ok(())
  }

  fn forward(&mut self) -> Result<Tensor, NetworkError> {
    let output = self.net.forward_single("")?;
    let shape = output
      .mat_size()
      .iter()
      .map(|&d| d as usize)
      .collect::<Vec<_>>();
    let data = output.data_typed::<f32>()?.to_vec();
    Ok(Tensor::from_vec(&shape, data)?)
  }
}
