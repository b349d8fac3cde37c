// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::Parser;
use tracing::info;
use url::Url;

use crate::{
  FromUrl,
  asset::AssetProvider,
  input::InputWrapper,
  model::{InitError, MobileNetSsd, MobileNetSsdBuilder, Network, NetworkError},
  output::OutputWrapper,
};

/// SSDLens 参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型目录，例如 ssd:///opt/models?prototxt=a.prototxt
  #[arg(long, value_name = "MODEL", required_unless_present = "assets")]
  pub model: Option<Url>,

  /// 内置模型文件目录，首次运行时拷贝到数据目录后加载
  #[arg(long, value_name = "DIR", conflicts_with = "model")]
  pub assets: Option<PathBuf>,

  /// 可写数据目录
  #[arg(long, value_name = "DIR", default_value = "data")]
  pub data_dir: PathBuf,

  /// 输入来源
  /// - 图片: image:///path/to/frame.jpg
  /// - 目录: folder:///path/to/frames?loop
  /// - 摄像头: v4l2:///dev/video0?width=640&height=480
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// - 图片: image:///path/to/out.png
  /// - 目录: folder:///path/to/records?record=json&always
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 最大处理帧数，不指定则处理到输入结束
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

impl Args {
  pub fn model_builder(&self) -> Result<MobileNetSsdBuilder, InitError> {
    match (&self.model, &self.assets) {
      (Some(model), _) => {
        info!("模型目录: {}", model);
        MobileNetSsdBuilder::from_url(model)
      }
      (None, Some(assets)) => {
        info!(
          "从 {} 提供模型到 {}",
          assets.display(),
          self.data_dir.display()
        );
        let provider = AssetProvider::new(assets, &self.data_dir);
        Ok(MobileNetSsdBuilder::from_provider(&provider))
      }
      // clap 已保证二者之一存在
      (None, None) => Err(InitError::MissingFile(PathBuf::new())),
    }
  }

  /// 依次创建模型、输入和输出；模型加载成功后才打开输入设备
  pub fn open<N, F>(
    &self,
    load: F,
  ) -> anyhow::Result<(MobileNetSsd<N>, InputWrapper, OutputWrapper)>
  where
    N: Network,
    F: FnOnce(&Path, &Path) -> Result<N, NetworkError>,
  {
    let model = self.model_builder()?.build_with(load)?;
    info!("输入来源: {}", self.input);
    let input = InputWrapper::from_url(&self.input)?;
    info!("输出路径: {}", self.output);
    let output = OutputWrapper::from_url(&self.output)?;
    Ok((model, input, output))
  }
}
