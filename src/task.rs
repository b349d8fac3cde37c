// 该文件是 SSDLens （识物镜） 项目的一部分。
// src/task.rs - 任务运行方式
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

use std::{
  sync::mpsc::{Receiver, channel},
  thread,
  time::{Duration, Instant},
};

use anyhow::Context;
use image::RgbImage;
use tracing::{info, warn};

use crate::{
  frame::IntoRgbImage,
  model::{DetectResult, Network, VocLabel},
  output::Render,
  pipeline::FrameDetectionPipeline,
};

pub trait Task<I, N, O>: Sized {
  type Error;
  fn run_task(
    self,
    input: I,
    pipeline: FrameDetectionPipeline<N>,
    output: O,
  ) -> Result<(), Self::Error>;
}

/// 只处理第一帧
pub struct OneShotTask;

impl<F, RE, I, N, O> Task<I, N, O> for OneShotTask
where
  F: IntoRgbImage,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  N: Network,
  O: Render<RgbImage, DetectResult<VocLabel>, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    mut pipeline: FrameDetectionPipeline<N>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let (frame, result) = pipeline.process_with_result(frame);
    let elapsed = now.elapsed();
    info!("推理完成，{} 个检测，耗时: {:.2?}", result.len(), elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧反复推理，统计平均耗时
pub struct RepeatShotTask {
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat_times: 1000 }
  }
}

impl RepeatShotTask {
  /// 前两次视为预热，不计入平均耗时
  const WARMUP: usize = 2;

  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times;
    self
  }
}

impl<F, RE, I, N, O> Task<I, N, O> for RepeatShotTask
where
  F: IntoRgbImage,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  N: Network,
  O: Render<RgbImage, DetectResult<VocLabel>, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    mut pipeline: FrameDetectionPipeline<N>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input
      .next()
      .ok_or_else(|| anyhow::anyhow!("没有输入帧"))?
      .into_rgb_image();
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat_times);
    for i in 0..self.repeat_times {
      let now = Instant::now();
      let (annotated, result) = pipeline.process_with_result(frame.clone());
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&annotated, &result)?;
      info!("({})渲染完成，耗时: {:.2?}", i, now.elapsed());
      times.push(elapsed);
    }

    if times.len() > Self::WARMUP {
      let measured = &times[Self::WARMUP..];
      warn!(
        "平均推理时间: {:.2?}",
        measured.iter().sum::<Duration>() / measured.len() as u32
      );
    }
    if pipeline.failures() > 0 {
      warn!("{} / {} 次处理失败", pipeline.failures(), pipeline.frames());
    }

    Ok(())
  }
}

/// 滚动帧率统计，每个统计窗口结束时给出该窗口内的平均帧率
#[derive(Debug)]
pub struct FpsMeter {
  window: Duration,
  started: Instant,
  frames: u32,
}

impl FpsMeter {
  pub fn new(window: Duration, now: Instant) -> Self {
    Self {
      window,
      started: now,
      frames: 0,
    }
  }

  /// 记录一帧；窗口结束时返回帧率并开始新窗口
  pub fn tick(&mut self, now: Instant) -> Option<f64> {
    self.frames += 1;
    let elapsed = now.saturating_duration_since(self.started);
    if elapsed < self.window {
      return None;
    }

    let fps = self.frames as f64 / elapsed.as_secs_f64();
    self.started = now;
    self.frames = 0;
    Some(fps)
  }
}

/// 持续处理输入流，直到输入结束、达到指定帧数或收到中断信号
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  fn run_until<F, RE, I, N, O>(
    &self,
    input: I,
    pipeline: &mut FrameDetectionPipeline<N>,
    output: &O,
    stop: &Receiver<()>,
  ) -> Result<usize, RE>
  where
    F: IntoRgbImage,
    I: Iterator<Item = F>,
    N: Network,
    O: Render<RgbImage, DetectResult<VocLabel>, Error = RE>,
  {
    let mut frame_index = 0;
    let mut now = Instant::now();
    let mut fps = FpsMeter::new(Duration::from_secs(1), now);
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);
      let (frame, result) = pipeline.process_with_result(frame);
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if let Some(rate) = fps.tick(now) {
        info!("帧率: {:.1} fps", rate);
      }
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if stop.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }
    Ok(frame_index)
  }
}

impl<F, RE, I, N, O> Task<I, N, O> for ContinuousTask
where
  F: IntoRgbImage,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  N: Network,
  O: Render<RgbImage, DetectResult<VocLabel>, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    mut pipeline: FrameDetectionPipeline<N>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .context("无法设置中断信号处理")?;

    let frames = self.run_until(input, &mut pipeline, &output, &rx)?;

    info!(
      "任务完成，共 {} 帧，失败 {} 帧，退出",
      frames,
      pipeline.failures()
    );
    Ok(())
  }
}
