// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use tracing::{error, info};

use super::mixer::AudioMixer;
use super::AudioError;
use crate::playsync::CancelHandle;

/// The default output device, driven by an [`AudioMixer`]. The stream lives
/// on its own thread until the output is dropped.
pub struct Output {
    mixer: AudioMixer,
    cancel_handle: CancelHandle,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cpal output ({} channels at {}Hz)",
            self.mixer.num_channels(),
            self.mixer.sample_rate()
        )
    }
}

impl Output {
    /// Opens the default output device at the given sample rate.
    pub fn open(sample_rate: u32) -> Result<Output, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Device(e.to_string()))?;
        let num_channels = supported.channels();
        let sample_format = supported.sample_format();

        let mixer = AudioMixer::new(num_channels, sample_rate);
        let cancel_handle = CancelHandle::new();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        // cpal streams can't move between threads, so the stream is created,
        // played and kept alive on the output thread.
        let output_thread = {
            let mixer = mixer.clone();
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                let config = cpal::StreamConfig {
                    channels: num_channels,
                    sample_rate: sample_rate as cpal::SampleRate,
                    buffer_size: cpal::BufferSize::Default,
                };

                let stream_result = match sample_format {
                    cpal::SampleFormat::F32 => device.build_output_stream(
                        &config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            mixer.process_into_output(data);
                        },
                        |err| error!("CPAL output stream error: {}", err),
                        None,
                    ),
                    cpal::SampleFormat::I16 => {
                        let mut scratch = Vec::new();
                        device.build_output_stream(
                            &config,
                            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                                scratch.resize(data.len(), 0.0f32);
                                mixer.process_into_output(&mut scratch);
                                for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                                    *dst = i16::from_sample(*src);
                                }
                            },
                            |err| error!("CPAL output stream error: {}", err),
                            None,
                        )
                    }
                    other => {
                        let _ = ready_tx.send(Err(AudioError::UnsupportedFormat(other.to_string())));
                        return;
                    }
                };

                let stream = match stream_result {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AudioError::Device(e.to_string())));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::Device(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until the output is dropped.
                cancel_handle.wait(Arc::new(AtomicBool::new(false)));
            })
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = output_thread.join();
                return Err(AudioError::Device(
                    "output thread exited before the stream started".to_string(),
                ));
            }
        }

        info!(
            channels = num_channels,
            sample_rate,
            format = %sample_format,
            "CPAL output stream started"
        );
        Ok(Output {
            mixer,
            cancel_handle,
            output_thread: Some(output_thread),
        })
    }

    /// The mixer feeding this output. Sinks created from it play on the device.
    pub fn mixer(&self) -> &AudioMixer {
        &self.mixer
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.cancel_handle.cancel();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}
