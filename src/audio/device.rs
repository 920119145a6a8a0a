// Device output - Drives click renderers from the default CPAL output stream
//
// Every player gets its own stream, so closing a player releases the device.
// The callback renders f32 internally and converts to the device format
// (F32, I16 or U16) while writing the output buffer.

use super::PlayerError;
use super::click::ClickRenderer;
use super::player::RendererSink;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::any::Any;

/// Renderer sink backed by the default output device
pub struct CpalSink {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl CpalSink {
    pub fn new() -> Result<Self, PlayerError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(PlayerError::NoDevice)?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| PlayerError::Stream(e.to_string()))?;
        let sample_format = supported_config.sample_format();

        log::info!(
            "Audio device: {} ({:?}, {} Hz, {} channels)",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_format,
            supported_config.sample_rate().0,
            supported_config.channels()
        );

        Ok(Self {
            device,
            config: supported_config.into(),
            sample_format,
        })
    }

    fn build_stream<T>(&self, mut renderer: ClickRenderer) -> Result<Stream, PlayerError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let channels = self.config.channels as usize;
        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // No allocations, no I/O, no locks
                    renderer.render(data, channels, |sample| T::from_sample(sample));
                },
                |err| log::warn!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| PlayerError::Stream(e.to_string()))
    }
}

impl RendererSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn attach(&mut self, renderer: ClickRenderer) -> Result<Option<Box<dyn Any>>, PlayerError> {
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(renderer),
            SampleFormat::I16 => self.build_stream::<i16>(renderer),
            SampleFormat::U16 => self.build_stream::<u16>(renderer),
            other => return Err(PlayerError::UnsupportedFormat(format!("{other:?}"))),
        }?;

        stream
            .play()
            .map_err(|e| PlayerError::Stream(e.to_string()))?;
        log::debug!("Output stream started");
        Ok(Some(Box::new(stream)))
    }
}
