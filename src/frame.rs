// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/frame.rs - 帧定义与颜色空间归一化
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

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage, RgbaImage};

pub const RGB_CHANNELS: usize = 3;
pub const RGBA_CHANNELS: usize = 4;

/// 转换为三通道 RGB 帧
///
/// 摄像头通常交付带 alpha 的四通道帧，网络只接受三通道。
/// 已经是 RGB 的帧原样移出，不发生拷贝。
pub trait IntoRgbImage {
  fn into_rgb_image(self) -> RgbImage;
}

impl IntoRgbImage for RgbImage {
  fn into_rgb_image(self) -> RgbImage {
    self
  }
}

impl IntoRgbImage for RgbaImage {
  fn into_rgb_image(self) -> RgbImage {
    let (width, height) = self.dimensions();
    let mut data = Vec::with_capacity(width as usize * height as usize * RGB_CHANNELS);
    for chunk in self.as_raw().chunks_exact(RGBA_CHANNELS) {
      data.extend_from_slice(&chunk[..RGB_CHANNELS]);
    }

    // 长度由 chunks_exact 保证
    ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, data)
      .unwrap_or_else(|| RgbImage::new(width, height))
  }
}

impl IntoRgbImage for DynamicImage {
  fn into_rgb_image(self) -> RgbImage {
    match self {
      DynamicImage::ImageRgb8(image) => image,
      DynamicImage::ImageRgba8(image) => image.into_rgb_image(),
      other => other.to_rgb8(),
    }
  }
}
