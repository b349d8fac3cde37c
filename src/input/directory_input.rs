// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/input/directory_input.rs - 目录图像序列输入
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

use std::path::PathBuf;

use image::{ImageReader, RgbaImage};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::has_image_extension,
  utils::{decoded_path, query_flag},
};

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("目录中没有图像文件: {0}")]
  Empty(PathBuf),
}

/// 按文件名顺序回放目录中的图像，模拟摄像头帧流
///
/// `folder:///path/to/frames?loop` 会无限循环回放。读取失败的文件被跳过。
pub struct DirectoryInput {
  files: Vec<PathBuf>,
  cursor: usize,
  looping: bool,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch);
    }

    let directory = decoded_path(url);
    let mut files = std::fs::read_dir(&directory)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| path.is_file() && has_image_extension(path))
      .collect::<Vec<_>>();
    files.sort();

    if files.is_empty() {
      return Err(DirectoryInputError::Empty(directory));
    }
    info!("目录 {} 中共 {} 帧", directory.display(), files.len());

    Ok(DirectoryInput {
      files,
      cursor: 0,
      looping: query_flag(url, "loop"),
    })
  }
}

impl DirectoryInput {
  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

impl Iterator for DirectoryInput {
  type Item = RgbaImage;

  fn next(&mut self) -> Option<Self::Item> {
    // 最多尝试一整轮，避免全部损坏时在循环模式下空转
    for _ in 0..self.files.len() {
      if self.cursor >= self.files.len() {
        if !self.looping {
          return None;
        }
        self.cursor = 0;
      }

      let path = &self.files[self.cursor];
      self.cursor += 1;

      match ImageReader::open(path).and_then(|r| r.with_guessed_format()) {
        Ok(reader) => match reader.decode() {
          Ok(image) => {
            debug!("读取帧: {}", path.display());
            return Some(image.to_rgba8());
          }
          Err(e) => warn!("无法解码 {}: {}", path.display(), e),
        },
        Err(e) => warn!("无法打开 {}: {}", path.display(), e),
      }
    }
    None
  }
}
