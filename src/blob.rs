// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/blob.rs - 网络输入 blob 构造
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

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

use crate::{frame::RGB_CHANNELS, tensor::Tensor};

#[derive(Error, Debug)]
pub enum BlobError {
  #[error("空帧无法构造 blob: {0}x{1}")]
  EmptyFrame(u32, u32),
}

/// blob 构造参数
///
/// 每个通道先减均值再乘缩放因子：`(pixel - mean) * scale`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobParams {
  pub width: u32,
  pub height: u32,
  pub scale: f32,
  pub mean: [f32; 3],
  pub swap_rb: bool,
}

impl BlobParams {
  /// 输出张量形状 (N, C, H, W)
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.height as usize, self.width as usize]
  }
}

/// 将 RGB 帧转换为 NCHW 浮点 blob
///
/// 直接拉伸到目标尺寸，不保持宽高比也不做 letterbox。
pub fn blob_from_image(image: &RgbImage, params: &BlobParams) -> Result<Tensor, BlobError> {
  let (src_w, src_h) = image.dimensions();
  if src_w == 0 || src_h == 0 {
    return Err(BlobError::EmptyFrame(src_w, src_h));
  }

  let resized = if (src_w, src_h) == (params.width, params.height) {
    image.clone()
  } else {
    image::imageops::resize(image, params.width, params.height, FilterType::Triangle)
  };
  debug!(
    "blob 构造: {}x{} -> {}x{}",
    src_w, src_h, params.width, params.height
  );

  let mut tensor = Tensor::zeros(&params.shape());
  let plane = params.width as usize * params.height as usize;
  let data = tensor.as_mut();

  for (x, y, pixel) in resized.enumerate_pixels() {
    let idx = y as usize * params.width as usize + x as usize;
    for c in 0..RGB_CHANNELS {
      let src_c = if params.swap_rb { RGB_CHANNELS - 1 - c } else { c };
      let value = pixel[src_c] as f32;
      data[c * plane + idx] = (value - params.mean[c]) * params.scale;
    }
  }

  Ok(tensor)
}
