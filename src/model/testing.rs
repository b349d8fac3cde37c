// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/model/testing.rs - 测试用的脚本化网络
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

use std::sync::{Arc, Mutex};

use crate::{
  model::{Network, NetworkError},
  tensor::Tensor,
};

/// 总是返回同一个输出张量的网络，并记录每次输入的形状
pub struct ScriptedNetwork {
  output: Option<Tensor>,
  pending: bool,
  inputs: Arc<Mutex<Vec<Vec<usize>>>>,
}

impl ScriptedNetwork {
  pub fn returning(output: Tensor) -> Self {
    Self {
      output: Some(output),
      pending: false,
      inputs: Arc::default(),
    }
  }

  /// 前向推理总是失败
  pub fn failing() -> Self {
    Self {
      output: None,
      pending: false,
      inputs: Arc::default(),
    }
  }

  pub fn inputs(&self) -> Arc<Mutex<Vec<Vec<usize>>>> {
    self.inputs.clone()
  }
}

impl Network for ScriptedNetwork {
  fn set_input(&mut self, blob: Tensor) -> Result<(), NetworkError> {
    self.inputs.lock().unwrap().push(blob.shape().to_vec());
    self.pending = true;
    Ok(())
  }

  fn forward(&mut self) -> Result<Tensor, NetworkError> {
    if !self.pending {
      return Err(NetworkError::NoInput);
    }
    self.pending = false;
    self
      .output
      .clone()
      .ok_or_else(|| NetworkError::Forward("scripted failure".into()))
  }
}
