// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/model/mobilenet_ssd.rs - MobileNet-SSD 检测模型
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  asset::AssetProvider,
  blob::{BlobError, BlobParams, blob_from_image},
  model::{DetectItem, DetectResult, Model, Network, NetworkError, PixelBox, VocLabel, WithLabel},
  tensor::Tensor,
  utils::{decoded_path, query_value},
};

pub const MODEL_TOPOLOGY_FILE: &str = "MobileNetSSD_deploy.prototxt";
pub const MODEL_WEIGHTS_FILE: &str = "MobileNetSSD_deploy.caffemodel";

pub const BLOB_PARAMS: BlobParams = BlobParams {
  width: 300,
  height: 300,
  scale: 0.007843,
  mean: [127.5, 127.5, 127.5],
  swap_rb: false,
};

/// 置信度严格大于该值的检测才会保留
pub const CONFIDENCE_THRESHOLD: f32 = 0.2;
/// [batch, class, confidence, x_min, y_min, x_max, y_max]
pub const TABLE_COLUMNS: usize = 7;

#[derive(Error, Debug)]
pub enum InitError {
  #[error("模型文件不存在: {0}")]
  MissingFile(PathBuf),
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("网络初始化失败: {0}")]
  Network(#[from] NetworkError),
}

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("检测表元素数 {0} 不是 7 的整数倍")]
  RaggedTable(usize),
}

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("预处理错误: {0}")]
  Blob(#[from] BlobError),
  #[error("推理错误: {0}")]
  Network(#[from] NetworkError),
  #[error("解码错误: {0}")]
  Decode(#[from] DecodeError),
}

/// 网络原始输出按 7 列重新解释得到的检测表
#[derive(Debug, Clone)]
pub struct DetectionTable {
  data: Box<[f32]>,
}

/// 检测表中的一行
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionRow([f32; TABLE_COLUMNS]);

impl DetectionRow {
  pub fn batch_index(&self) -> f32 {
    self.0[0]
  }

  /// 类别编号，向零截断；可能为负
  pub fn class_id(&self) -> i64 {
    self.0[1] as i64
  }

  pub fn confidence(&self) -> f32 {
    self.0[2]
  }

  /// 归一化坐标 [x_min, y_min, x_max, y_max]
  pub fn bbox(&self) -> [f32; 4] {
    [self.0[3], self.0[4], self.0[5], self.0[6]]
  }
}

impl TryFrom<Tensor> for DetectionTable {
  type Error = DecodeError;

  fn try_from(tensor: Tensor) -> Result<Self, Self::Error> {
    let total = tensor.total();
    if total % TABLE_COLUMNS != 0 {
      return Err(DecodeError::RaggedTable(total));
    }
    Ok(Self {
      data: tensor.into_data(),
    })
  }
}

impl DetectionTable {
  pub fn rows(&self) -> usize {
    self.data.len() / TABLE_COLUMNS
  }

  pub fn iter(&self) -> impl Iterator<Item = DetectionRow> + '_ {
    self.data.chunks_exact(TABLE_COLUMNS).map(|chunk| {
      let mut row = [0.0f32; TABLE_COLUMNS];
      row.copy_from_slice(chunk);
      DetectionRow(row)
    })
  }
}

/// 按行顺序过滤并缩放检测表，不排序也不做 NMS
///
/// 类别编号越界的行被跳过，不影响同一帧中的其它检测。
pub fn decode_table<T: WithLabel>(
  table: &DetectionTable,
  width: u32,
  height: u32,
) -> DetectResult<T> {
  let mut items = Vec::new();

  for (index, row) in table.iter().enumerate() {
    let score = row.confidence();
    if score.is_nan() || score <= CONFIDENCE_THRESHOLD {
      continue;
    }

    let class_id = row.class_id();
    let kind = match u32::try_from(class_id).ok().and_then(T::from_label_id) {
      Some(kind) => kind,
      None => {
        warn!("第 {} 行类别编号越界: {}, 跳过该检测", index, class_id);
        continue;
      }
    };

    items.push(DetectItem {
      kind,
      score,
      bbox: PixelBox::from_normalized(row.bbox(), width, height),
    });
  }

  debug!("检测表 {} 行, 保留 {} 个检测", table.rows(), items.len());

  DetectResult {
    items: items.into_boxed_slice(),
  }
}

pub struct MobileNetSsd<N> {
  network: N,
}

impl<N: Network> MobileNetSsd<N> {
  pub fn new(network: N) -> Self {
    Self { network }
  }

  pub fn detect(&mut self, frame: &RgbImage) -> Result<DetectResult<VocLabel>, DetectError> {
    let (width, height) = frame.dimensions();

    let blob = blob_from_image(frame, &BLOB_PARAMS)?;

    debug!("设置模型输入");
    self.network.set_input(blob)?;

    debug!("执行模型推理");
    let output = self.network.forward()?;
    debug!("模型输出形状: {:?}", output.shape());

    let table = DetectionTable::try_from(output)?;
    Ok(decode_table(&table, width, height))
  }
}

impl<N: Network> Model for MobileNetSsd<N> {
  type Input = RgbImage;
  type Output = DetectResult<VocLabel>;
  type Error = DetectError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input)
  }
}

#[derive(Debug, Clone)]
pub struct MobileNetSsdBuilder {
  topology: PathBuf,
  weights: PathBuf,
}

impl FromUrlWithScheme for MobileNetSsdBuilder {
  const SCHEME: &'static str = "ssd";
}

impl FromUrl for MobileNetSsdBuilder {
  type Error = InitError;

  /// `ssd:///path/to/models?prototxt=a.prototxt&caffemodel=b.caffemodel`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(InitError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    let directory = decoded_path(url);
    let topology = query_value(url, "prototxt").unwrap_or_else(|| MODEL_TOPOLOGY_FILE.into());
    let weights = query_value(url, "caffemodel").unwrap_or_else(|| MODEL_WEIGHTS_FILE.into());

    Ok(Self::from_paths(
      directory.join(topology),
      directory.join(weights),
    ))
  }
}

impl MobileNetSsdBuilder {
  pub fn from_paths(topology: impl Into<PathBuf>, weights: impl Into<PathBuf>) -> Self {
    Self {
      topology: topology.into(),
      weights: weights.into(),
    }
  }

  /// 先把内置模型拷贝到可写目录；拷贝失败时得到空路径，由 `build` 报告
  pub fn from_provider(provider: &AssetProvider) -> Self {
    Self::from_paths(
      provider.provide_or_empty(MODEL_TOPOLOGY_FILE),
      provider.provide_or_empty(MODEL_WEIGHTS_FILE),
    )
  }

  pub fn topology(&self) -> &Path {
    &self.topology
  }

  pub fn weights(&self) -> &Path {
    &self.weights
  }

  fn check_files(&self) -> Result<(), InitError> {
    for path in [&self.topology, &self.weights] {
      if !path.is_file() {
        return Err(InitError::MissingFile(path.clone()));
      }
    }
    Ok(())
  }

  /// 用给定的运行时加载函数创建模型
  pub fn build_with<N, F>(self, load: F) -> Result<MobileNetSsd<N>, InitError>
  where
    N: Network,
    F: FnOnce(&Path, &Path) -> Result<N, NetworkError>,
  {
    self.check_files()?;

    info!("加载模型结构: {}", self.topology.display());
    info!("加载模型权重: {}", self.weights.display());
    let network = load(&self.topology, &self.weights)?;
    info!("模型加载完成");

    Ok(MobileNetSsd::new(network))
  }

  #[cfg(feature = "opencv")]
  pub fn build(self) -> Result<MobileNetSsd<crate::model::OpenCvNet>, InitError> {
    self.build_with(crate::model::OpenCvNet::from_caffe)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::testing::ScriptedNetwork;

  fn row(class: f32, score: f32, bbox: [f32; 4]) -> [f32; 7] {
    [0.0, class, score, bbox[0], bbox[1], bbox[2], bbox[3]]
  }

  fn table(rows: &[[f32; 7]]) -> DetectionTable {
    let data: Vec<f32> = rows.iter().flatten().copied().collect();
    let tensor = Tensor::from_vec(&[1, 1, rows.len(), 7], data).unwrap();
    DetectionTable::try_from(tensor).unwrap()
  }

  #[test]
  fn fourteen_elements_are_two_rows() {
    let t = table(&[row(7.0, 0.9, [0.1; 4]), row(15.0, 0.1, [0.2; 4])]);
    assert_eq!(t.rows(), 2);
    assert_eq!(t.iter().count(), 2);
  }

  #[test]
  fn ragged_table_is_a_decode_error() {
    let tensor = Tensor::from_vec(&[15], vec![0.0; 15]).unwrap();
    assert!(matches!(
      DetectionTable::try_from(tensor),
      Err(DecodeError::RaggedTable(15))
    ));
  }

  #[test]
  fn threshold_is_strict() {
    let t = table(&[
      row(7.0, 0.2, [0.1, 0.1, 0.5, 0.5]),
      row(7.0, 0.19, [0.1, 0.1, 0.5, 0.5]),
      row(7.0, 0.0, [0.1, 0.1, 0.5, 0.5]),
      row(7.0, f32::NAN, [0.1, 0.1, 0.5, 0.5]),
      row(7.0, 0.2001, [0.1, 0.1, 0.5, 0.5]),
    ]);
    let result: DetectResult<VocLabel> = decode_table(&t, 640, 480);
    assert_eq!(result.len(), 1);
    assert_eq!(result.items[0].score, 0.2001);
  }

  #[test]
  fn rows_keep_table_order_and_overlaps() {
    let t = table(&[
      row(15.0, 0.3, [0.1, 0.1, 0.5, 0.5]),
      row(15.0, 0.9, [0.11, 0.1, 0.5, 0.5]),
      row(8.0, 0.5, [0.0, 0.0, 1.0, 1.0]),
    ]);
    let result: DetectResult<VocLabel> = decode_table(&t, 100, 100);
    let names: Vec<_> = result.items.iter().map(|i| i.kind.name()).collect();
    assert_eq!(names, ["person", "person", "cat"]);
  }

  #[test]
  fn out_of_range_class_skips_only_that_row() {
    let t = table(&[
      row(21.0, 0.9, [0.1; 4]),
      row(-1.0, 0.9, [0.1; 4]),
      row(7.9, 0.9, [0.1, 0.1, 0.5, 0.5]),
    ]);
    let result: DetectResult<VocLabel> = decode_table(&t, 640, 480);
    assert_eq!(result.len(), 1);
    // 7.9 向零截断为 7
    assert_eq!(result.items[0].kind.name(), "car");
  }

  #[test]
  fn coordinates_scale_to_frame() {
    let t = table(&[row(7.0, 0.9, [0.1, 0.1, 0.5, 0.5])]);
    let result: DetectResult<VocLabel> = decode_table(&t, 640, 480);
    assert_eq!(
      result.items[0].bbox,
      PixelBox {
        left: 64,
        top: 48,
        right: 320,
        bottom: 240
      }
    );
  }

  #[test]
  fn detect_feeds_fixed_size_blob() {
    let output = Tensor::from_vec(&[1, 1, 1, 7], row(7.0, 0.9, [0.1, 0.1, 0.5, 0.5]).to_vec())
      .unwrap();
    let network = ScriptedNetwork::returning(output);
    let inputs = network.inputs();
    let mut model = MobileNetSsd::new(network);

    let result = model.infer(&RgbImage::new(1920, 1080)).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.items[0].bbox.right, 960);
    assert_eq!(inputs.lock().unwrap().as_slice(), &[vec![1, 3, 300, 300]]);
  }

  #[test]
  fn forward_failure_is_reported_as_network_error() {
    let network = ScriptedNetwork::failing();
    let inputs = network.inputs();
    let mut model = MobileNetSsd::new(network);

    let result = model.detect(&RgbImage::new(64, 48));
    assert!(matches!(
      result,
      Err(DetectError::Network(NetworkError::Forward(_)))
    ));
    // 输入已经设置，失败发生在前向推理
    assert_eq!(inputs.lock().unwrap().len(), 1);
  }

  #[test]
  fn builder_from_url_uses_default_file_names() {
    let url = Url::parse("ssd:///opt/models%20dir").unwrap();
    let builder = MobileNetSsdBuilder::from_url(&url).unwrap();
    assert_eq!(
      builder.topology(),
      Path::new("/opt/models dir/MobileNetSSD_deploy.prototxt")
    );
    assert_eq!(
      builder.weights(),
      Path::new("/opt/models dir/MobileNetSSD_deploy.caffemodel")
    );
  }

  #[test]
  fn builder_from_url_overrides() {
    let url = Url::parse("ssd:///m?prototxt=a.prototxt&caffemodel=b.bin").unwrap();
    let builder = MobileNetSsdBuilder::from_url(&url).unwrap();
    assert_eq!(builder.topology(), Path::new("/m/a.prototxt"));
    assert_eq!(builder.weights(), Path::new("/m/b.bin"));

    let wrong = Url::parse("yolo26:///m").unwrap();
    assert!(matches!(
      MobileNetSsdBuilder::from_url(&wrong),
      Err(InitError::SchemeMismatch { .. })
    ));
  }

  #[test]
  fn build_fails_on_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(MODEL_TOPOLOGY_FILE), b"").unwrap();

    let builder = MobileNetSsdBuilder::from_paths(
      dir.path().join(MODEL_TOPOLOGY_FILE),
      dir.path().join(MODEL_WEIGHTS_FILE),
    );
    let result = builder.build_with(|_, _| Ok(ScriptedNetwork::failing()));
    assert!(matches!(result, Err(InitError::MissingFile(p)) if p.ends_with(MODEL_WEIGHTS_FILE)));
  }

  #[test]
  fn failed_provisioning_leads_to_init_error() {
    let bundle = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    let provider = AssetProvider::new(bundle.path(), storage.path());

    let builder = MobileNetSsdBuilder::from_provider(&provider);
    assert_eq!(builder.topology(), Path::new(""));
    assert!(matches!(
      builder.build_with(|_, _| Ok(ScriptedNetwork::failing())),
      Err(InitError::MissingFile(_))
    ));
  }

  #[test]
  fn runtime_load_error_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(MODEL_TOPOLOGY_FILE), b"garbage").unwrap();
    std::fs::write(dir.path().join(MODEL_WEIGHTS_FILE), b"garbage").unwrap();

    let builder = MobileNetSsdBuilder::from_paths(
      dir.path().join(MODEL_TOPOLOGY_FILE),
      dir.path().join(MODEL_WEIGHTS_FILE),
    );
    let result = builder
      .build_with::<ScriptedNetwork, _>(|_, _| Err(NetworkError::Load("bad prototxt".into())));
    assert!(matches!(result, Err(InitError::Network(NetworkError::Load(_)))));
  }
}
