// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/input/v4l2_input.rs - V4L2 摄像头输入
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

use image::RgbaImage;
use thiserror::Error;
use tracing::{error, info};
use url::Url;
use v4l::{
  FourCC,
  buffer::Type,
  io::{mmap::Stream, traits::CaptureStream},
  prelude::*,
  video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  utils::{decoded_path, query_value},
};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const BUFFER_COUNT: u32 = 4;

#[derive(Error, Debug)]
pub enum V4l2InputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("参数错误: {0}")]
  InvalidParameter(String),
  #[error("设备错误: {0}")]
  Device(#[from] std::io::Error),
  #[error("设备不支持 YUYV 格式, 实际格式: {0}")]
  UnsupportedFormat(String),
}

/// V4L2 摄像头，以 YUYV 采集并转换为 RGBA 帧
///
/// `v4l2:///dev/video0?width=640&height=480`
pub struct V4l2Input {
  // stream 必须先于 device 释放
  stream: Stream<'static>,
  _device: Device,
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for V4l2Input {
  const SCHEME: &'static str = "v4l2";
}

fn dimension(url: &Url, key: &str, default: u32) -> Result<u32, V4l2InputError> {
  match query_value(url, key) {
    Some(v) => v
      .parse()
      .map_err(|_| V4l2InputError::InvalidParameter(format!("{}={}", key, v))),
    None => Ok(default),
  }
}

impl FromUrl for V4l2Input {
  type Error = V4l2InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(V4l2InputError::SchemeMismatch);
    }

    let path = decoded_path(url);
    let device = Device::with_path(&path)?;

    let mut format = device.format()?;
    format.width = dimension(url, "width", DEFAULT_WIDTH)?;
    format.height = dimension(url, "height", DEFAULT_HEIGHT)?;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format)?;

    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(V4l2InputError::UnsupportedFormat(format.fourcc.to_string()));
    }

    info!(
      "打开摄像头 {}: {}x{} {}",
      path.display(),
      format.width,
      format.height,
      format.fourcc
    );

    let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;

    Ok(V4l2Input {
      stream,
      _device: device,
      width: format.width,
      height: format.height,
    })
  }
}

/// 将 YUYV 格式转换为 RGBA
pub(crate) fn yuyv_to_rgba(yuyv: &[u8], width: u32, height: u32) -> Option<RgbaImage> {
  let mut rgba = Vec::with_capacity((width * height * 4) as usize);

  for chunk in yuyv.chunks_exact(4) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgba.extend_from_slice(&[r, g, b, 255]);
    }
  }

  rgba.truncate((width * height * 4) as usize);
  RgbaImage::from_raw(width, height, rgba)
}

impl Iterator for V4l2Input {
  type Item = RgbaImage;

  fn next(&mut self) -> Option<Self::Item> {
    match self.stream.next() {
      Ok((buffer, meta)) => {
        let used = (meta.bytesused as usize).min(buffer.len());
        let frame = yuyv_to_rgba(&buffer[..used], self.width, self.height);
        if frame.is_none() {
          error!("帧数据不完整: {} 字节", used);
        }
        frame
      }
      Err(e) => {
        error!("无法捕获帧: {}", e);
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gray_yuyv_converts_to_gray_rgba() {
    let yuyv = [128u8, 128, 128, 128].repeat(2);
    let image = yuyv_to_rgba(&yuyv, 2, 2).unwrap();
    for pixel in image.pixels() {
      assert_eq!(pixel.0, [128, 128, 128, 255]);
    }
  }

  #[test]
  fn short_buffer_is_rejected() {
    assert!(yuyv_to_rgba(&[0u8; 4], 4, 4).is_none());
  }
}
