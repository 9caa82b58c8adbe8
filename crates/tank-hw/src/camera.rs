//! V4L2 camera feeder via the `v4l` crate.
//!
//! A capture thread keeps only the most recent decoded frame. Readers get the
//! newest frame captured since their previous read; frames captured while the
//! control loop is busy acting are dropped.

use std::path::Path;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tank_core::{Frame, FrameSource};
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use crate::frame;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Packed RGB24 (3 bytes/pixel).
    Rgb24,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        if fourcc == FourCC::new(b"YUYV") {
            Some(PixelFormat::Yuyv)
        } else if fourcc == FourCC::new(b"RGB3") {
            Some(PixelFormat::Rgb24)
        } else {
            None
        }
    }

    fn decode(self, buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, frame::DecodeError> {
        match self {
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, width, height),
            PixelFormat::Rgb24 => frame::rgb24_copy(buf, width, height),
        }
    }
}

#[derive(Default)]
struct Slot {
    latest: Option<Frame>,
    /// Bumped for every captured frame.
    generation: u64,
    /// Generation handed out by the last `read`.
    delivered: u64,
    active: bool,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    fresh: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, frame: Frame) {
        let mut slot = self.lock();
        slot.latest = Some(frame);
        slot.generation += 1;
        self.fresh.notify_all();
    }

    fn deactivate(&self) -> bool {
        let mut slot = self.lock();
        let was_active = slot.active;
        slot.active = false;
        slot.latest = None;
        self.fresh.notify_all();
        was_active
    }
}

/// Latest-frame camera feeder backed by a V4L2 device.
pub struct CameraFeeder {
    device_path: String,
    width: u32,
    height: u32,
    shared: Arc<Shared>,
    capture: Mutex<Option<JoinHandle<()>>>,
}

impl CameraFeeder {
    /// Describe a feeder for `device_path` (e.g. "/dev/video0"). The device is
    /// opened by [`FrameSource::start`].
    pub fn new(device_path: &str, width: u32, height: u32) -> Self {
        Self {
            device_path: device_path.to_string(),
            width,
            height,
            shared: Arc::new(Shared::default()),
            capture: Mutex::new(None),
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    fn open(&self) -> Result<(Device, u32, u32, PixelFormat), CameraError> {
        let device_path = self.device_path.as_str();
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;
        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = self.width;
        fmt.height = self.height;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let pixel_format = PixelFormat::from_fourcc(negotiated.fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV or RGB3)",
                negotiated.fourcc
            ))
        })?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        Ok((device, negotiated.width, negotiated.height, pixel_format))
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

fn capture_loop(
    device: Device,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    shared: Arc<Shared>,
) {
    let mut stream = match MmapStream::with_buffers(&device, BufType::VideoCapture, 4) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "failed to create mmap stream");
            shared.deactivate();
            return;
        }
    };

    tracing::info!("camera capture started");
    while shared.lock().active {
        let (buf, meta) = match stream.next() {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(error = %e, "failed to dequeue buffer; ending stream");
                shared.deactivate();
                break;
            }
        };

        let decoded = pixel_format
            .decode(buf, width, height)
            .map_err(|e| e.to_string())
            .and_then(|rgb| Frame::new(rgb, width, height, meta.sequence).map_err(|e| e.to_string()));
        match decoded {
            Ok(frame) => shared.publish(frame),
            Err(e) => tracing::warn!(seq = meta.sequence, error = %e, "dropping undecodable frame"),
        }
    }
    tracing::info!("camera capture stopped");
}

impl FrameSource for CameraFeeder {
    type Error = CameraError;

    fn start(&self) -> Result<(), CameraError> {
        let mut capture = self.capture.lock().unwrap_or_else(PoisonError::into_inner);
        if capture.is_some() {
            tracing::debug!(device = %self.device_path, "camera already started");
            return Ok(());
        }

        let (device, width, height, pixel_format) = self.open()?;
        {
            let mut slot = self.shared.lock();
            *slot = Slot {
                active: true,
                ..Slot::default()
            };
        }

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("tank-camera".into())
            .spawn(move || capture_loop(device, width, height, pixel_format, shared))
            .map_err(|e| {
                self.shared.deactivate();
                CameraError::Spawn(e)
            })?;
        *capture = Some(handle);
        Ok(())
    }

    fn stop(&self) {
        if self.shared.deactivate() {
            tracing::info!(device = %self.device_path, "stopping camera");
        }
        let handle = self
            .capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("camera capture thread panicked");
            }
        }
    }

    fn read(&self) -> Option<Frame> {
        let mut slot = self.shared.lock();
        loop {
            if !slot.active {
                return None;
            }
            if slot.generation > slot.delivered {
                if let Some(frame) = slot.latest.take() {
                    slot.delivered = slot.generation;
                    return Some(frame);
                }
            }
            slot = self
                .shared
                .fresh
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
