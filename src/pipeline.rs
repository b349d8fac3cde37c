// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/pipeline.rs - 逐帧检测与叠加绘制
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

use image::RgbImage;
use tracing::{debug, error};

use crate::{
  frame::IntoRgbImage,
  model::{DetectResult, MobileNetSsd, Network, VocLabel},
  output::draw::Draw,
};

/// 帧检测流水线
///
/// 颜色归一化 → blob 构造 → 前向推理 → 检测表解码 → 叠加绘制。
/// 单帧内的任何失败都只记录日志，原样返回输入帧，不影响后续帧。
pub struct FrameDetectionPipeline<N> {
  model: MobileNetSsd<N>,
  draw: Draw,
  frame_index: u64,
  failures: u64,
}

impl<N: Network> FrameDetectionPipeline<N> {
  pub fn new(model: MobileNetSsd<N>) -> Self {
    Self {
      model,
      draw: Draw::default(),
      frame_index: 0,
      failures: 0,
    }
  }

  /// 已处理的帧数
  pub fn frames(&self) -> u64 {
    self.frame_index
  }

  /// 处理失败、原样返回的帧数
  pub fn failures(&self) -> u64 {
    self.failures
  }

  pub fn process<F: IntoRgbImage>(&mut self, frame: F) -> RgbImage {
    self.process_with_result(frame).0
  }

  /// 同 `process`，并返回本帧绘制的检测结果；失败时结果为空
  pub fn process_with_result<F: IntoRgbImage>(
    &mut self,
    frame: F,
  ) -> (RgbImage, DetectResult<VocLabel>) {
    let mut frame = frame.into_rgb_image();
    self.frame_index += 1;

    match self.model.detect(&frame) {
      Ok(result) => {
        debug!("第 {} 帧: {} 个检测", self.frame_index, result.len());
        self.draw.draw_on_image(&mut frame, &result);
        (frame, result)
      }
      Err(e) => {
        self.failures += 1;
        error!("第 {} 帧处理失败, 原样输出: {}", self.frame_index, e);
        (frame, DetectResult::default())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{model::testing::ScriptedNetwork, output::draw::label_text, tensor::Tensor};
  use image::{Rgb, Rgba, RgbaImage};

  fn pipeline(rows: &[[f32; 7]]) -> FrameDetectionPipeline<ScriptedNetwork> {
    let data: Vec<f32> = rows.iter().flatten().copied().collect();
    let output = Tensor::from_vec(&[1, 1, rows.len(), 7], data).unwrap();
    FrameDetectionPipeline::new(MobileNetSsd::new(ScriptedNetwork::returning(output)))
  }

  fn gray(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([90, 90, 90]))
  }

  #[test]
  fn car_end_to_end() {
    let mut pipeline = pipeline(&[[0.0, 7.0, 0.9, 0.1, 0.1, 0.5, 0.5]]);
    let (frame, result) = pipeline.process_with_result(gray(640, 480));

    assert_eq!(frame.dimensions(), (640, 480));
    assert_eq!(result.len(), 1);
    let item = &result.items[0];
    assert_eq!(
      (item.bbox.left, item.bbox.top, item.bbox.right, item.bbox.bottom),
      (64, 48, 320, 240)
    );
    assert_eq!(label_text(item), "car: 0.9");

    // 右下角与下边缘为绿色，框内部保持原样
    assert_eq!(*frame.get_pixel(320, 240), Rgb([0, 255, 0]));
    assert_eq!(*frame.get_pixel(200, 240), Rgb([0, 255, 0]));
    assert_eq!(*frame.get_pixel(200, 150), Rgb([90, 90, 90]));
  }

  #[test]
  fn low_confidence_draws_nothing() {
    let mut pipeline = pipeline(&[
      [0.0, 7.0, 0.2, 0.1, 0.1, 0.5, 0.5],
      [0.0, 15.0, 0.05, 0.0, 0.0, 1.0, 1.0],
    ]);
    let input = gray(64, 48);
    let (frame, result) = pipeline.process_with_result(input.clone());

    assert!(result.is_empty());
    assert_eq!(frame, input);
  }

  #[test]
  fn failure_returns_the_same_buffer_untouched() {
    let mut pipeline =
      FrameDetectionPipeline::new(MobileNetSsd::new(ScriptedNetwork::failing()));
    let input = gray(640, 480);
    let expected = input.clone();
    let ptr = input.as_raw().as_ptr();

    let frame = pipeline.process(input);

    assert_eq!(frame.as_raw().as_ptr(), ptr);
    assert_eq!(frame, expected);
    assert_eq!(pipeline.failures(), 1);
    assert_eq!(pipeline.frames(), 1);
  }

  #[test]
  fn ragged_output_is_contained() {
    let output = Tensor::from_vec(&[10], vec![0.9; 10]).unwrap();
    let mut pipeline =
      FrameDetectionPipeline::new(MobileNetSsd::new(ScriptedNetwork::returning(output)));
    let input = gray(32, 32);

    let frame = pipeline.process(input.clone());
    assert_eq!(frame, input);
    assert_eq!(pipeline.failures(), 1);
  }

  #[test]
  fn empty_frame_is_contained() {
    let mut pipeline = pipeline(&[[0.0, 7.0, 0.9, 0.1, 0.1, 0.5, 0.5]]);
    let frame = pipeline.process(RgbImage::new(0, 0));
    assert_eq!(frame.dimensions(), (0, 0));
    assert_eq!(pipeline.failures(), 1);
  }

  #[test]
  fn rgba_frames_are_normalized() {
    let mut pipeline = pipeline(&[[0.0, 7.0, 0.9, 0.1, 0.1, 0.5, 0.5]]);
    let rgba = RgbaImage::from_pixel(640, 480, Rgba([90, 90, 90, 255]));

    let frame = pipeline.process(rgba);
    assert_eq!(frame.dimensions(), (640, 480));
    assert_eq!(*frame.get_pixel(320, 240), Rgb([0, 255, 0]));
    assert_eq!(*frame.get_pixel(600, 400), Rgb([90, 90, 90]));
  }

  #[test]
  fn invalid_class_is_skipped_but_frame_still_annotated() {
    let mut pipeline = pipeline(&[
      [0.0, 42.0, 0.9, 0.0, 0.0, 0.2, 0.2],
      [0.0, 7.0, 0.9, 0.1, 0.1, 0.5, 0.5],
    ]);
    let (frame, result) = pipeline.process_with_result(gray(640, 480));
    assert_eq!(result.len(), 1);
    assert_eq!(pipeline.failures(), 0);
    assert_eq!(*frame.get_pixel(320, 240), Rgb([0, 255, 0]));
  }

  #[test]
  fn huge_boxes_are_drawn_without_panicking() {
    let mut pipeline = pipeline(&[
      [0.0, 7.0, 0.9, -1e9, -1e9, 1e9, 1e9],
      [0.0, 15.0, 0.8, -1e5, -1e5, 1e5, 1e5],
    ]);
    let input = gray(640, 480);

    let (frame, result) = pipeline.process_with_result(input.clone());

    assert_eq!(result.len(), 2);
    assert_eq!(result.items[0].bbox.left, i32::MIN);
    assert_eq!(result.items[0].bbox.right, i32::MAX);
    // 所有边都在图像外
    assert_eq!(frame, input);
    assert_eq!(pipeline.failures(), 0);
  }
}
