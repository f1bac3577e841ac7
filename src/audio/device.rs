use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, warn};

use super::{AudioError, AudioOutput, SharedScheduler, ToneScheduler, DEFAULT_SAMPLE_RATE};

/// How long `resume()` waits for the audio thread to open the device
const START_TIMEOUT: Duration = Duration::from_secs(2);

/// Device info with display name and internal name for selection
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// User-friendly display name
    pub display_name: String,
    /// Internal name used for device selection (cpal name)
    pub internal_name: String,
}

/// Commands sent to the audio thread
enum AudioCommand {
    Start {
        device: Option<String>,
        reply: Sender<Result<u32, String>>,
    },
    Shutdown,
}

/// Sound card output. The cpal stream is not Send, so it lives on its own
/// thread; this handle only holds the command channel and the scheduler the
/// stream callback renders from.
pub struct DeviceOutput {
    command_tx: Sender<AudioCommand>,
    scheduler: SharedScheduler,
    device_name: Option<String>,
    running: bool,
}

impl DeviceOutput {
    /// Spawn the audio thread. The device itself is opened lazily on the
    /// first `resume()`.
    pub fn new(device_name: Option<String>) -> Self {
        let (command_tx, command_rx) = bounded::<AudioCommand>(16);
        let scheduler = ToneScheduler::shared(DEFAULT_SAMPLE_RATE);
        let scheduler_clone = SharedScheduler::clone(&scheduler);

        thread::spawn(move || audio_thread(command_rx, scheduler_clone));

        Self {
            command_tx,
            scheduler,
            device_name,
            running: false,
        }
    }

    /// List available audio output devices
    pub fn list_output_devices() -> Vec<DeviceInfo> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| {
                devices
                    .filter_map(|d| {
                        d.name().ok().map(|name| DeviceInfo {
                            display_name: name.clone(),
                            internal_name: name,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl AudioOutput for DeviceOutput {
    fn scheduler(&self) -> &SharedScheduler {
        &self.scheduler
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.running {
            return Ok(());
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.command_tx
            .send(AudioCommand::Start {
                device: self.device_name.clone(),
                reply: reply_tx,
            })
            .map_err(|_| AudioError::Unavailable("Audio thread not responding".to_string()))?;

        match reply_rx.recv_timeout(START_TIMEOUT) {
            Ok(Ok(sample_rate)) => {
                info!(target: "audio", "Output running at {} Hz", sample_rate);
                self.running = true;
                Ok(())
            }
            Ok(Err(e)) => Err(AudioError::Unavailable(e)),
            Err(_) => Err(AudioError::Unavailable("Audio thread not responding".to_string())),
        }
    }
}

impl Drop for DeviceOutput {
    fn drop(&mut self) {
        let _ = self.command_tx.send(AudioCommand::Shutdown);
    }
}

/// Audio thread that owns the cpal Stream (not Send)
fn audio_thread(command_rx: Receiver<AudioCommand>, scheduler: SharedScheduler) {
    let mut output_stream: Option<Stream> = None;

    loop {
        match command_rx.recv() {
            Ok(AudioCommand::Start { device, reply }) => {
                debug!(target: "audio", "Starting output on device {:?}", device);
                output_stream = None;

                let result = create_output_stream(device.as_deref(), SharedScheduler::clone(&scheduler))
                    .and_then(|(stream, rate)| {
                        stream.play().map_err(|e| e.to_string())?;
                        Ok((stream, rate))
                    });

                match result {
                    Ok((stream, rate)) => {
                        output_stream = Some(stream);
                        let _ = reply.send(Ok(rate));
                    }
                    Err(e) => {
                        error!(target: "audio", "Failed to start audio output: {}", e);
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Ok(AudioCommand::Shutdown) | Err(_) => {
                drop(output_stream.take());
                break;
            }
        }
    }
}

/// Open the named (or default) output device and bind its callback to the scheduler
fn create_output_stream(
    device_name: Option<&str>,
    scheduler: SharedScheduler,
) -> Result<(Stream, u32), String> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        let devices: Vec<_> = host.output_devices().map_err(|e| e.to_string())?.collect();

        devices
            .iter()
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .cloned()
            .or_else(|| {
                warn!(target: "audio", "Output device '{}' not found, using default", name);
                host.default_output_device()
            })
            .ok_or_else(|| format!("Output device '{}' not found", name))?
    } else {
        host.default_output_device()
            .ok_or_else(|| "No default output device".to_string())?
    };

    let config = device.default_output_config().map_err(|e| e.to_string())?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    // Nothing is queued while the device is closed, so the clock can be rescaled safely
    scheduler.lock().set_sample_rate(sample_rate);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_output_stream::<f32>(&device, &config.into(), scheduler, channels),
        cpal::SampleFormat::I16 => build_output_stream::<i16>(&device, &config.into(), scheduler, channels),
        cpal::SampleFormat::U16 => build_output_stream::<u16>(&device, &config.into(), scheduler, channels),
        _ => return Err("Unsupported output sample format".to_string()),
    }?;

    Ok((stream, sample_rate))
}

fn build_output_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    scheduler: SharedScheduler,
    channels: usize,
) -> Result<Stream, String> {
    let mut mix: Vec<f32> = Vec::new();

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                mix.resize(data.len(), 0.0);
                scheduler.lock().render_interleaved(&mut mix, channels);
                for (out, sample) in data.iter_mut().zip(mix.iter()) {
                    *out = <T as cpal::FromSample<f32>>::from_sample_(*sample);
                }
            },
            |err| error!(target: "audio", "Output stream error: {}", err),
            None,
        )
        .map_err(|e| e.to_string())?;

    Ok(stream)
}
