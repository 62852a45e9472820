//! Packet capture via libpcap.
//!
//! The capture handle is opened on the caller's thread so that a missing
//! device or unsupported link type fails startup, then frames are read on a
//! dedicated thread and handed to the [`Recorder`] one at a time.

pub mod decode;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pcap::{Active, Capture, Linktype};

use crate::config::{self, CaptureOptions};
use crate::core::Recorder;
use crate::error::RecorderError;

/// Manages a background packet capture thread.
/// Implements Drop to signal the thread on panic/exit.
pub struct CaptureEngine {
    device: String,
    shutdown: Arc<AtomicBool>,
    capture_thread: Option<std::thread::JoinHandle<()>>,
}

impl CaptureEngine {
    /// Open `options.device` and start feeding frames to `recorder`.
    pub fn start(options: &CaptureOptions, recorder: Arc<Recorder>) -> Result<Self, RecorderError> {
        let cap = open_capture(&options.device)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let device = options.device.clone();

        let thread = std::thread::Builder::new()
            .name("pcap-capture".into())
            .spawn(move || {
                if let Err(e) = run_capture_loop(cap, &recorder, &shutdown_clone) {
                    tracing::error!("Capture loop on \"{device}\" exited: {e}");
                }
            })?;

        tracing::info!("Capturing network traffic on \"{}\"", options.device);
        Ok(Self {
            device: options.device.clone(),
            shutdown,
            capture_thread: Some(thread),
        })
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Stop the loop and wait for the capture thread. Returns within one
    /// read timeout.
    pub fn join(mut self) {
        self.stop();
        if let Some(thread) = self.capture_thread.take() {
            if thread.join().is_err() {
                tracing::error!("Capture thread for \"{}\" panicked", self.device);
            }
        }
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        tracing::debug!("Closing capture device: \"{}\"", self.device);
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn open_capture(device: &str) -> Result<Capture<Active>, RecorderError> {
    tracing::debug!("Opening device for packet capture: \"{device}\"");

    let cap = Capture::from_device(device)?
        .promisc(true)
        .snaplen(config::CAPTURE_SNAPLEN)
        .buffer_size(config::CAPTURE_BUFFER_SIZE)
        .timeout(config::CAPTURE_READ_TIMEOUT_MS)
        .immediate_mode(true)
        .open()?;

    let link_type = cap.get_datalink();
    if link_type != Linktype::ETHERNET {
        let name = link_type
            .get_name()
            .unwrap_or_else(|_| link_type.0.to_string());
        return Err(RecorderError::Capture(format!(
            "unexpected link type for device \"{device}\": expected EN10MB but was {name}"
        )));
    }

    Ok(cap)
}

/// Read frames until shutdown or a hard capture error. Read timeouts only
/// give the loop a chance to check the shutdown flag.
fn run_capture_loop(
    mut cap: Capture<Active>,
    recorder: &Recorder,
    shutdown: &AtomicBool,
) -> Result<(), pcap::Error> {
    while !shutdown.load(Ordering::Relaxed) {
        match cap.next_packet() {
            Ok(packet) => {
                let truncated = packet.header.caplen < packet.header.len;
                recorder.handle_frame(packet.data, truncated);
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => return Err(e),
        }
    }

    match cap.stats() {
        Ok(stats) => tracing::info!(
            "Capture stopped: {} received, {} dropped, {} dropped by interface",
            stats.received,
            stats.dropped,
            stats.if_dropped
        ),
        Err(e) => tracing::info!("Capture stopped (stats unavailable: {e})"),
    }
    Ok(())
}
