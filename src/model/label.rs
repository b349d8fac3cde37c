// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/model/label.rs - PASCAL VOC 类别表
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

use super::WithLabel;

/// MobileNet-SSD 输出的类别名称，下标即类别编号，0 为背景
pub static VOC_CLASSES: [&str; 21] = [
  "background",
  "plane",
  "bicycle",
  "bird",
  "boat",
  "bottle",
  "bus",
  "car",
  "cat",
  "chair",
  "cow",
  "dining table",
  "dog",
  "horse",
  "motorbike",
  "person",
  "potted plant",
  "sheep",
  "sofa",
  "train",
  "tv/monitor",
];

/// 经过范围检查的 VOC 类别编号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocLabel(u8);

impl VocLabel {
  pub fn name(&self) -> &'static str {
    VOC_CLASSES[self.0 as usize]
  }
}

impl WithLabel for VocLabel {
  fn to_label_str(&self) -> String {
    self.name().to_string()
  }

  fn to_label_id(&self) -> u32 {
    self.0 as u32
  }

  fn from_label_id(id: u32) -> Option<Self> {
    if (id as usize) < VOC_CLASSES.len() {
      Some(VocLabel(id as u8))
    } else {
      None
    }
  }
}
