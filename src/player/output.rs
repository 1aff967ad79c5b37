//! Audio output devices.
//!
//! The engine renders samples through a pull callback; an
//! `OutputDevice` owns the device handle and drives that callback on
//! the device's own clock. `ManualOutput` lets tests drive the
//! callback deterministically without hardware.

use std::sync::{Arc, Mutex};

use crate::error::Result;

/// Fills the buffer with the next mono 24 kHz samples to play.
pub type RenderFn = Box<dyn FnMut(&mut [i16]) + Send>;

/// An audio sink with scoped acquisition: the device handle is taken
/// on `start` and released on `stop` (and on drop).
pub trait OutputDevice: Send {
    fn start(&mut self, render: RenderFn) -> Result<()>;
    fn stop(&mut self);
}

/// Test output: holds the render callback and plays nothing until the
/// paired handle pumps it.
pub struct ManualOutput {
    slot: Arc<Mutex<Option<RenderFn>>>,
}

/// Drives a `ManualOutput` from test code, standing in for the device
/// clock.
#[derive(Clone)]
pub struct ManualHandle {
    slot: Arc<Mutex<Option<RenderFn>>>,
}

impl ManualOutput {
    pub fn new() -> (Self, ManualHandle) {
        let slot = Arc::new(Mutex::new(None));
        (
            Self {
                slot: Arc::clone(&slot),
            },
            ManualHandle { slot },
        )
    }
}

impl OutputDevice for ManualOutput {
    fn start(&mut self, render: RenderFn) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(render);
        Ok(())
    }

    fn stop(&mut self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl ManualHandle {
    /// Render the next `count` samples, as the device callback would.
    /// Returns silence when the device is stopped.
    pub fn pump(&self, count: usize) -> Vec<i16> {
        let mut buffer = vec![0i16; count];
        if let Some(render) = self
            .slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_mut()
        {
            render(&mut buffer);
        }
        buffer
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

#[cfg(feature = "cpal-audio")]
pub use cpal_output::{CpalOutput, list_output_devices};

#[cfg(feature = "cpal-audio")]
mod cpal_output {
    use super::{OutputDevice, RenderFn};
    use crate::defaults::SAMPLE_RATE;
    use crate::error::{BookvoxError, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::{Arc, Mutex};

    /// Run a closure with stderr temporarily redirected to /dev/null.
    ///
    /// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL
    /// triggers when probing audio backends. The messages are harmless
    /// but confusing to users.
    ///
    /// # Safety
    /// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2
    /// (stderr). Safe as long as no other thread is concurrently
    /// manipulating fd 2.
    fn with_suppressed_stderr<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        unsafe {
            let saved_fd = libc::dup(2);
            let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
            if saved_fd >= 0 && devnull >= 0 {
                libc::dup2(devnull, 2);
                libc::close(devnull);
            }

            let result = f();

            if saved_fd >= 0 {
                libc::dup2(saved_fd, 2);
                libc::close(saved_fd);
            }

            result
        }
    }

    /// Preferred device names for GNOME/PipeWire environments.
    const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

    fn is_preferred_device(name: &str) -> bool {
        let lower = name.to_lowercase();
        PREFERRED_DEVICES
            .iter()
            .any(|pref| lower.contains(&pref.to_lowercase()))
    }

    /// List available output devices, preferred ones marked
    /// "\[recommended\]".
    pub fn list_output_devices() -> Result<Vec<String>> {
        let devices = with_suppressed_stderr(|| {
            let host = cpal::default_host();
            host.output_devices()
                .map(|d| d.collect::<Vec<_>>())
                .map_err(|e| BookvoxError::DeviceUnavailable {
                    message: format!("Failed to enumerate output devices: {e}"),
                })
        })?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                if is_preferred_device(&name) {
                    names.push(format!("{name} [recommended]"));
                } else {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    fn find_device(device_name: Option<&str>) -> Result<cpal::Device> {
        with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let devices =
                    host.output_devices()
                        .map_err(|e| BookvoxError::DeviceUnavailable {
                            message: format!("Failed to enumerate output devices: {e}"),
                        })?;
                for device in devices {
                    if let Ok(dev_name) = device.name()
                        && dev_name == name
                    {
                        return Ok(device);
                    }
                }
                return Err(BookvoxError::AudioDeviceNotFound {
                    device: name.to_string(),
                });
            }

            // Prefer PipeWire/PulseAudio so GNOME's device selection
            // is respected.
            if let Ok(devices) = host.output_devices() {
                for device in devices {
                    if let Ok(name) = device.name()
                        && is_preferred_device(&name)
                    {
                        return Ok(device);
                    }
                }
            }
            host.default_output_device()
                .ok_or_else(|| BookvoxError::AudioDeviceNotFound {
                    device: "default".to_string(),
                })
        })
    }

    /// Wrapper for cpal::Stream to make it Send.
    ///
    /// SAFETY: The stream is only touched from the engine's control
    /// thread; the Option it sits in is never shared across threads.
    struct SendableStream(cpal::Stream);

    unsafe impl Send for SendableStream {}

    /// Real audio output through CPAL.
    ///
    /// Plays 16-bit PCM at 24 kHz mono. Tries the preferred format
    /// first (i16/24kHz/mono), then f32 at the same shape, then the
    /// device's native config with software conversion (channel
    /// duplication + resampling).
    pub struct CpalOutput {
        device_name: Option<String>,
        stream: Option<SendableStream>,
    }

    impl CpalOutput {
        pub fn new(device_name: Option<&str>) -> Self {
            Self {
                device_name: device_name.map(str::to_string),
                stream: None,
            }
        }

        fn build_stream(device: &cpal::Device, render: RenderFn) -> Result<cpal::Stream> {
            let preferred_config = cpal::StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(SAMPLE_RATE),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_callback = |err| {
                eprintln!("bookvox: audio stream error: {err}");
            };

            // Shared so each attempted format can take its own clone;
            // only the stream that builds keeps pulling from it.
            let render = Arc::new(Mutex::new(render));

            // Try i16/24kHz/mono — zero-copy path with PipeWire/Pulse.
            {
                let render = Arc::clone(&render);
                if let Ok(stream) = device.build_output_stream(
                    &preferred_config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        if let Ok(mut render) = render.lock() {
                            render(data);
                        }
                    },
                    err_callback,
                    None,
                ) {
                    return Ok(stream);
                }
            }

            // Try f32/24kHz/mono — for devices that only expose floats.
            {
                let render = Arc::clone(&render);
                let mut scratch: Vec<i16> = Vec::new();
                if let Ok(stream) = device.build_output_stream(
                    &preferred_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        scratch.resize(data.len(), 0);
                        if let Ok(mut render) = render.lock() {
                            render(&mut scratch);
                        }
                        for (out, &s) in data.iter_mut().zip(&scratch) {
                            *out = s as f32 / i16::MAX as f32;
                        }
                    },
                    err_callback,
                    None,
                ) {
                    return Ok(stream);
                }
            }

            Self::build_stream_native(device, render)
        }

        /// Play at the device's native config, duplicating channels
        /// and repeating samples to cover the rate difference.
        fn build_stream_native(
            device: &cpal::Device,
            render: Arc<Mutex<RenderFn>>,
        ) -> Result<cpal::Stream> {
            let default_config =
                device
                    .default_output_config()
                    .map_err(|e| BookvoxError::DeviceUnavailable {
                        message: format!("Failed to query default output config: {e}"),
                    })?;

            let native_rate = default_config.sample_rate().0;
            let channels = default_config.channels() as usize;
            let step = SAMPLE_RATE as f64 / native_rate as f64;
            let stream_config: cpal::StreamConfig = default_config.clone().into();

            eprintln!(
                "bookvox: using native audio format ({}ch/{}Hz/{:?}), converting in software",
                channels,
                native_rate,
                default_config.sample_format(),
            );

            let err_callback = |err| {
                eprintln!("bookvox: audio stream error: {err}");
            };

            if default_config.sample_format() != cpal::SampleFormat::F32 {
                return Err(BookvoxError::DeviceUnavailable {
                    message: format!(
                        "Unsupported native sample format: {:?}. \
                         Try specifying a device with --device.",
                        default_config.sample_format()
                    ),
                });
            }

            let mut acc = 1.0f64;
            let mut current = 0i16;
            let mut one = [0i16; 1];
            device
                .build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let Ok(mut render) = render.lock() else {
                            data.fill(0.0);
                            return;
                        };
                        for frame in data.chunks_mut(channels) {
                            // Pull a new source sample each time the
                            // accumulated source position crosses one.
                            acc += step;
                            while acc >= 1.0 {
                                one[0] = 0;
                                render(&mut one);
                                current = one[0];
                                acc -= 1.0;
                            }
                            let value = current as f32 / i16::MAX as f32;
                            frame.fill(value);
                        }
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| BookvoxError::DeviceUnavailable {
                    message: format!("Failed to build native output stream: {e}"),
                })
        }
    }

    impl OutputDevice for CpalOutput {
        fn start(&mut self, render: RenderFn) -> Result<()> {
            if self.stream.is_some() {
                return Ok(());
            }
            let device = find_device(self.device_name.as_deref())?;
            let stream = with_suppressed_stderr(|| Self::build_stream(&device, render))?;
            stream.play().map_err(|e| BookvoxError::DeviceUnavailable {
                message: format!("Failed to start audio stream: {e}"),
            })?;
            self.stream = Some(SendableStream(stream));
            Ok(())
        }

        fn stop(&mut self) {
            if let Some(stream) = self.stream.take()
                && let Err(e) = stream.0.pause()
            {
                eprintln!("bookvox: failed to pause audio stream: {e}");
            }
        }
    }

}
