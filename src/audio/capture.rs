//! Live audio capture using CPAL (Cross-Platform Audio Library).

use crate::audio::source::{BlockSource, SourceEvent, Tap};
use crate::defaults;
use crate::error::{Result, TrillcastError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
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

/// Keep JACK from auto-starting a server while CPAL probes backends.
///
/// # Safety
/// Modifies environment variables; call at startup before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Device name patterns that are never capture inputs.
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

/// Check if a device name should be filtered out.
fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

/// Resolve an audio host by name, or the platform default.
fn select_host(host_name: Option<&str>) -> Result<cpal::Host> {
    let Some(wanted) = host_name else {
        return Ok(cpal::default_host());
    };

    let id = cpal::available_hosts()
        .into_iter()
        .find(|id| id.name().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| TrillcastError::AudioDeviceNotFound {
            device: format!("host '{}'", wanted),
        })?;

    cpal::host_from_id(id).map_err(|e| TrillcastError::AudioCapture {
        message: format!("Audio host '{}' unavailable: {}", wanted, e),
    })
}

/// Names of the audio hosts compiled into this build.
pub fn list_hosts() -> Vec<String> {
    cpal::available_hosts()
        .into_iter()
        .map(|id| id.name().to_string())
        .collect()
}

/// List input devices on a host, skipping outputs that show up as inputs.
///
/// The host's default input is marked with "\[default\]".
pub fn list_devices(host_name: Option<&str>) -> Result<Vec<String>> {
    let host = select_host(host_name)?;
    let (default_name, devices) = with_suppressed_stderr(|| {
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        (default_name, host.input_devices())
    });
    let devices = devices.map_err(|e| TrillcastError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if default_name.as_deref() == Some(name.as_str()) {
                device_names.push(format!("{} [default]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Find an input device by exact name, or the host default.
fn find_device(host: &cpal::Host, device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| match device_name {
        Some(name) => {
            let devices = host
                .input_devices()
                .map_err(|e| TrillcastError::AudioCapture {
                    message: format!("Failed to enumerate devices: {}", e),
                })?;

            devices
                .into_iter()
                .find(|dev| dev.name().is_ok_and(|n| n == name))
                .ok_or_else(|| TrillcastError::AudioDeviceNotFound {
                    device: name.to_string(),
                })
        }
        None => host
            .default_input_device()
            .ok_or_else(|| TrillcastError::AudioDeviceNotFound {
                device: "default".to_string(),
            }),
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: The stream is only touched from the thread that owns the
/// `CpalBlockSource`, through the Mutex wrapper.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Live capture source.
///
/// Opens the device at the configured rate and channel count (f32 first, i16
/// as a fallback) and frames every callback into each subscriber's block size.
/// Frames are never blocked on: when a subscriber's queue is full the block is
/// dropped and the next one carries `input_overflow`.
pub struct CpalBlockSource {
    device: cpal::Device,
    stream: Mutex<Option<SendableStream>>,
    taps: Arc<Mutex<Vec<Tap>>>,
    sample_rate: u32,
    channels: u16,
}

impl CpalBlockSource {
    /// Open an input device.
    ///
    /// # Errors
    /// Returns `AudioDeviceNotFound` when the host or device does not exist.
    pub fn new(
        host_name: Option<&str>,
        device_name: Option<&str>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self> {
        let host = select_host(host_name)?;
        let device = find_device(&host, device_name)?;

        if let Ok(name) = device.name() {
            info!(device = %name, sample_rate, channels, "opened input device");
        }

        Ok(Self {
            device,
            stream: Mutex::new(None),
            taps: Arc::new(Mutex::new(Vec::new())),
            sample_rate,
            channels,
        })
    }

    fn build_stream(&self) -> Result<cpal::Stream> {
        let config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: self.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let taps = Arc::clone(&self.taps);
        let f32_attempt = self.device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut taps) = taps.lock() {
                    for tap in taps.iter_mut() {
                        tap.push_nonblocking(data);
                    }
                }
            },
            stream_error_handler(Arc::clone(&self.taps)),
            None,
        );

        let f32_error = match f32_attempt {
            Ok(stream) => return Ok(stream),
            Err(e) => e,
        };
        debug!("f32 input stream rejected ({}), trying i16", f32_error);

        let taps = Arc::clone(&self.taps);
        let mut scratch: Vec<f32> = Vec::new();
        self.device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    scratch.extend(data.iter().map(|&s| s as f32 / 32768.0));
                    if let Ok(mut taps) = taps.lock() {
                        for tap in taps.iter_mut() {
                            tap.push_nonblocking(&scratch);
                        }
                    }
                },
                stream_error_handler(Arc::clone(&self.taps)),
                None,
            )
            .map_err(|e| TrillcastError::AudioCapture {
                message: format!(
                    "Device does not support {} Hz / {} channel(s): {}",
                    self.sample_rate, self.channels, e
                ),
            })
    }
}

/// Error callback: a vanished device ends every subscription, anything else is
/// logged and capture carries on.
fn stream_error_handler(
    taps: Arc<Mutex<Vec<Tap>>>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| match err {
        cpal::StreamError::DeviceNotAvailable => {
            error!("audio device is no longer available");
            if let Ok(mut taps) = taps.lock() {
                for tap in taps.iter() {
                    tap.fail("audio device is no longer available");
                }
                taps.clear();
            }
        }
        other => warn!("audio stream error: {}", other),
    }
}

impl BlockSource for CpalBlockSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn subscribe(&mut self, block_size: usize) -> Receiver<SourceEvent> {
        let (tap, rx) = Tap::new(block_size, self.channels, defaults::BLOCK_QUEUE_LEN);
        match self.taps.lock() {
            Ok(mut taps) => taps.push(tap),
            Err(poisoned) => poisoned.into_inner().push(tap),
        }
        rx
    }

    fn start(&mut self) -> Result<()> {
        let mut stream_guard = self.stream.lock().map_err(|e| TrillcastError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;
        if stream_guard.is_some() {
            return Ok(());
        }

        let stream = with_suppressed_stderr(|| self.build_stream())?;
        stream.play().map_err(|e| TrillcastError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        *stream_guard = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut stream_guard = self.stream.lock().map_err(|e| TrillcastError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;

        if let Some(sendable_stream) = stream_guard.take() {
            sendable_stream
                .0
                .pause()
                .map_err(|e| TrillcastError::AudioCapture {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
        }

        // Dropping the taps disconnects every subscriber
        if let Ok(mut taps) = self.taps.lock() {
            taps.clear();
        }
        Ok(())
    }
}
