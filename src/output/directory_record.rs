// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::Mutex;

use chrono::{DateTime, Datelike, Utc};
use image::RgbImage;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, WithLabel},
  output::Render,
  utils::{decoded_path, query_flag, query_value},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("未知的记录方式: {0}")]
  UnknownRecord(String),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 与帧图像同名的检测记录旁车文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
  /// `.txt`，标签以类别名称记录
  Name,
  /// `.txt`，标签以类别编号记录
  Id,
  Json,
}

impl Record {
  fn parse(kind: &str) -> Result<Self, DirectoryRecordOutputError> {
    match kind {
      "name" => Ok(Record::Name),
      "id" => Ok(Record::Id),
      "json" => Ok(Record::Json),
      other => Err(DirectoryRecordOutputError::UnknownRecord(other.to_string())),
    }
  }

  fn text_lines<T: WithLabel>(&self, result: &DetectResult<T>) -> String {
    result
      .items
      .iter()
      .map(|item| {
        let name = match self {
          Record::Id => item.kind.to_label_id().to_string(),
          _ => item.kind.to_label_str(),
        };
        format!(
          "{}, {:.4}, {}, {}, {}, {}",
          name, item.score, item.bbox.left, item.bbox.top, item.bbox.right, item.bbox.bottom
        )
      })
      .collect::<Vec<_>>()
      .join("\n")
  }

  pub fn record<T: WithLabel>(
    &self,
    result: &DetectResult<T>,
    image_path: &Path,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      Record::Name | Record::Id => {
        std::fs::write(image_path.with_extension("txt"), self.text_lines(result))?;
      }
      Record::Json => {
        let items = result
          .items
          .iter()
          .map(|item| {
            json!({
              "label": item.kind.to_label_str(),
              "class_id": item.kind.to_label_id(),
              "score": item.score,
              "bbox": [item.bbox.left, item.bbox.top, item.bbox.right, item.bbox.bottom],
            })
          })
          .collect::<Vec<_>>();
        let body = serde_json::to_string_pretty(&json!({ "detections": items }))?;
        std::fs::write(image_path.with_extension("json"), body)?;
      }
    }
    Ok(())
  }
}

/// 按日期分目录保存叠加后的帧
///
/// `folder:///var/ssdlens?record=json&always`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: Option<Record>,
  frame_counter: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = query_value(uri, "record")
      .map(|kind| Record::parse(&kind))
      .transpose()?;
    let always = query_flag(uri, "always");
    let directory = decoded_path(uri);

    info!(
      "记录输出目录: {} (记录: {:?}, 总是保存: {})",
      directory.display(),
      record,
      always
    );

    Ok(DirectoryRecordOutput {
      directory,
      record,
      frame_counter: Mutex::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counter
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl<T: WithLabel> Render<RgbImage, DetectResult<T>> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &DetectResult<T>) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("无检测结果，跳过保存");
      return Ok(());
    }

    let path = self.frame_path(Utc::now())?;
    frame.save(&path)?;
    if let Some(record) = &self.record {
      record.record(result, &path)?;
    }
    debug!("保存帧: {}", path.display());

    Ok(())
  }
}
