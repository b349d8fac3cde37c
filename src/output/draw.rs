// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};

use crate::model::{DetectItem, DetectResult, PixelBox, WithLabel};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 28.0;
const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]); // 绿色
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]); // 黑色

/// 标签文本的渲染尺寸
///
/// `height` 为基线以上的高度，`baseline` 为基线以下的深度。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextExtent {
  pub width: i32,
  pub height: i32,
  pub baseline: i32,
}

/// 叠加绘制的目标表面，坐标均为包含端点的像素坐标
pub trait OverlayCanvas {
  fn draw_outline(&mut self, top_left: (i32, i32), bottom_right: (i32, i32), color: Rgb<u8>);
  fn draw_filled(&mut self, top_left: (i32, i32), bottom_right: (i32, i32), color: Rgb<u8>);
  fn text_extent(&self, text: &str) -> TextExtent;
  /// `origin` 为文本基线的左端
  fn draw_text(&mut self, origin: (i32, i32), text: &str, color: Rgb<u8>);
}

/// 两个角点之间（含端点）的矩形，裁剪到图像四周外扩一像素的范围内
///
/// 外扩的一像素保证落在图像外的边不会被画进图像。矩形与图像无交集时返回 `None`。
fn clipped_rect(a: (i32, i32), b: (i32, i32), width: u32, height: u32) -> Option<Rect> {
  let (x0, x1) = (a.0.min(b.0) as i64, a.0.max(b.0) as i64);
  let (y0, y1) = (a.1.min(b.1) as i64, a.1.max(b.1) as i64);
  let (w, h) = (width as i64, height as i64);
  if x1 < 0 || y1 < 0 || x0 >= w || y0 >= h {
    return None;
  }

  let (x0, x1) = (x0.max(-1), x1.min(w));
  let (y0, y1) = (y0.max(-1), y1.min(h));
  Some(Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32))
}

/// 在 RGB 图像上原地绘制
pub struct ImageCanvas<'a> {
  image: &'a mut RgbImage,
  font: &'a FontArc,
  scale: PxScale,
}

impl<'a> ImageCanvas<'a> {
  pub fn new(image: &'a mut RgbImage, font: &'a FontArc, scale: PxScale) -> Self {
    Self { image, font, scale }
  }
}

impl OverlayCanvas for ImageCanvas<'_> {
  fn draw_outline(&mut self, top_left: (i32, i32), bottom_right: (i32, i32), color: Rgb<u8>) {
    let (width, height) = self.image.dimensions();
    if let Some(rect) = clipped_rect(top_left, bottom_right, width, height) {
      draw_hollow_rect_mut(&mut *self.image, rect, color);
    }
  }

  fn draw_filled(&mut self, top_left: (i32, i32), bottom_right: (i32, i32), color: Rgb<u8>) {
    let (width, height) = self.image.dimensions();
    if let Some(rect) = clipped_rect(top_left, bottom_right, width, height) {
      draw_filled_rect_mut(&mut *self.image, rect, color);
    }
  }

  fn text_extent(&self, text: &str) -> TextExtent {
    let (width, _) = text_size(self.scale, self.font, text);
    let scaled = self.font.as_scaled(self.scale);
    TextExtent {
      width: width as i32,
      height: scaled.ascent().round() as i32,
      baseline: (-scaled.descent()).round() as i32,
    }
  }

  fn draw_text(&mut self, origin: (i32, i32), text: &str, color: Rgb<u8>) {
    // 完全在图像外的文本不绘制，imageproc 内部的坐标加法也不会溢出
    let extent = self.text_extent(text);
    let (x, y) = (origin.0 as i64, origin.1 as i64);
    let (width, height) = self.image.dimensions();
    if x + (extent.width as i64) < 0
      || x >= width as i64
      || y + (extent.baseline as i64) < 0
      || y - (extent.height as i64) >= height as i64
    {
      return;
    }

    // imageproc 以文本框顶端定位，字形基线在顶端下方 ascent 处
    let ascent = extent.height;
    draw_text_mut(
      &mut *self.image,
      color,
      origin.0,
      origin.1 - ascent,
      self.scale,
      self.font,
      text,
    );
  }
}

/// 标签文本：类别名与未经舍入的置信度
pub fn label_text<T: WithLabel>(item: &DetectItem<T>) -> String {
  format!("{}: {}", item.kind.to_label_str(), item.score)
}

pub struct Draw {
  font: FontArc,
  scale: PxScale,
}

impl Default for Draw {
  fn default() -> Self {
    let font_data: &'static [u8] = include_bytes!("../../assets/DejaVuSans.ttf"); // default font
    let font = FontArc::try_from_slice(font_data).expect("无法加载嵌入的字体文件");

    Self {
      font,
      scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }
}

impl Draw {
  /// 按检测顺序绘制：边框、标签背景、标签文本
  pub fn draw_detections<T: WithLabel, C: OverlayCanvas>(
    &self,
    canvas: &mut C,
    result: &DetectResult<T>,
  ) {
    for item in result.items.iter() {
      let PixelBox {
        left,
        top,
        right,
        bottom,
      } = item.bbox;

      canvas.draw_outline((left, top), (right, bottom), BOX_COLOR);

      let label = label_text(item);
      let extent = canvas.text_extent(&label);

      // 标签背景紧贴边框左上角上方
      canvas.draw_filled(
        (left, top.saturating_sub(extent.height)),
        (left.saturating_add(extent.width), top.saturating_add(extent.baseline)),
        BOX_COLOR,
      );
      canvas.draw_text((left, top), &label, TEXT_COLOR);
    }
  }

  pub fn draw_on_image<T: WithLabel>(&self, image: &mut RgbImage, result: &DetectResult<T>) {
    let mut canvas = ImageCanvas::new(image, &self.font, self.scale);
    self.draw_detections(&mut canvas, result);
  }
}
