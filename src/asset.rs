// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/asset.rs - 内置模型文件的首次拷贝
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum AssetError {
  #[error("内置资源不存在: {0}")]
  Missing(PathBuf),
  #[error("资源拷贝失败 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// 将打包的资源文件拷贝到可写目录，供推理运行时按路径读取
pub struct AssetProvider {
  bundle_dir: PathBuf,
  storage_dir: PathBuf,
}

impl AssetProvider {
  pub fn new(bundle_dir: impl Into<PathBuf>, storage_dir: impl Into<PathBuf>) -> Self {
    Self {
      bundle_dir: bundle_dir.into(),
      storage_dir: storage_dir.into(),
    }
  }

  pub fn storage_dir(&self) -> &Path {
    &self.storage_dir
  }

  /// 拷贝单个资源，返回拷贝后的绝对路径
  pub fn provide(&self, file_name: &str) -> Result<PathBuf, AssetError> {
    let source = self.bundle_dir.join(file_name);
    if !source.is_file() {
      return Err(AssetError::Missing(source));
    }

    std::fs::create_dir_all(&self.storage_dir).map_err(|source| AssetError::Io {
      path: self.storage_dir.clone(),
      source,
    })?;

    let target = self.storage_dir.join(file_name);
    let bytes = std::fs::copy(&source, &target).map_err(|source| AssetError::Io {
      path: target.clone(),
      source,
    })?;
    debug!("资源 {} 已拷贝 {} 字节", file_name, bytes);

    let target = std::path::absolute(&target).map_err(|source| AssetError::Io {
      path: target.clone(),
      source,
    })?;
    info!("资源就绪: {}", target.display());
    Ok(target)
  }

  /// 拷贝失败时只记录日志并返回空路径
  ///
  /// 随后的模型加载会因空路径报告初始化错误。
  pub fn provide_or_empty(&self, file_name: &str) -> PathBuf {
    self.provide(file_name).unwrap_or_else(|e| {
      error!("资源拷贝失败: {}", e);
      PathBuf::new()
    })
  }
}
