/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use crate::acquisition::frame::{FrameEvent, FrameInfo, FrameSink, RxDataFormat, SinkSlot};
use crate::connection::backend::blocking::{InFlight, blocking};
use crate::connection::port::{RadarProtocol, RadarSession, parse_port_list};
use crate::error::{Error, Result};
use log::{debug, error, info, warn};
use std::ffi::{CString, c_char, c_int, c_void};
use std::ptr;

const PORT_LIST_SIZE: usize = 256;

// The library keeps a single frame callback for the whole process.
static FRAME_SINK: SinkSlot = SinkSlot::new();

/// Mirrors `Frame_Info_t` from the vendor's `EndpointRadarBase.h`, field for field:
/// `const float* sample_data; uint32_t frame_number; uint32_t num_chirps;
/// uint8_t num_rx_antennas; uint32_t num_samples_per_chirp; uint8_t rx_mask;
/// uint8_t adc_resolution; uint8_t interleaved_rx; Rx_Data_Format_t data_format;`
#[repr(C)]
struct RawFrameInfo {
    sample_data: *const f32,
    frame_number: u32,
    num_chirps: u32,
    num_rx_antennas: u8,
    num_samples_per_chirp: u32,
    rx_mask: u8,
    adc_resolution: u8,
    interleaved_rx: u8,
    data_format: c_int,
}

type DataFrameCallback = unsafe extern "C" fn(
    context: *mut c_void,
    protocol_handle: i32,
    endpoint: u8,
    frame_info: *const RawFrameInfo,
);

#[link(name = "ComLib")]
unsafe extern "C" {
    fn com_get_port_list(port_list: *mut c_char, buffer_size: usize) -> c_int;
    fn protocol_connect(port: *const c_char) -> i32;
    fn protocol_disconnect(protocol_handle: i32);
    fn protocol_get_num_endpoints(protocol_handle: i32) -> c_int;
    fn ep_radar_base_is_compatible_endpoint(protocol_handle: i32, endpoint: u8) -> i32;
    fn ep_radar_base_set_callback_data_frame(
        callback: Option<DataFrameCallback>,
        context: *mut c_void,
    );
    fn ep_radar_base_set_automatic_frame_trigger(
        protocol_handle: i32,
        endpoint: u8,
        trigger_interval_us: u32,
    ) -> i32;
    fn ep_radar_base_get_frame_data(protocol_handle: i32, endpoint: u8, wait_for_data: u8) -> i32;
}

impl RawFrameInfo {
    /// # Safety
    /// `sample_data` must point to at least as many values as the metadata describes.
    unsafe fn to_frame(&self) -> Option<FrameInfo> {
        let mut frame = FrameInfo {
            sample_data: vec![],
            frame_number: self.frame_number,
            num_chirps: self.num_chirps,
            num_rx_antennas: self.num_rx_antennas,
            num_samples_per_chirp: self.num_samples_per_chirp,
            rx_mask: self.rx_mask,
            adc_resolution: self.adc_resolution,
            interleaved_rx: self.interleaved_rx,
            data_format: RxDataFormat::from_raw(self.data_format)?,
        };

        let len = frame.expected_len();
        if !self.sample_data.is_null() && len > 0 {
            frame.sample_data = unsafe { std::slice::from_raw_parts(self.sample_data, len) }.to_vec();
        }
        Some(frame)
    }
}

// Runs on whichever thread the library delivers frames from. The context
// pointer is always null; the sink lives in FRAME_SINK.
unsafe extern "C" fn received_frame_data(
    _context: *mut c_void,
    protocol_handle: i32,
    endpoint: u8,
    frame_info: *const RawFrameInfo,
) {
    if frame_info.is_null() {
        return;
    }

    let Some(frame) = (unsafe { (*frame_info).to_frame() }) else {
        warn!("Dropping frame with unknown data format");
        return;
    };

    if let Err(e) = FRAME_SINK.forward_blocking(FrameEvent {
        handle: protocol_handle,
        endpoint,
        frame,
    }) {
        warn!("Frame from handle {} lost: {}", protocol_handle, e);
    }
}

fn check_status(call: &'static str, status: i32) -> Result<()> {
    if status != 0 {
        error!("{} returned status {}", call, status);
        return Err(Error::Device { call, status });
    }
    Ok(())
}

/// Binding to the vendor communication library.
#[derive(Debug, Default)]
pub struct ComLibProtocol;

impl ComLibProtocol {
    pub fn new() -> Self {
        ComLibProtocol
    }
}

#[async_trait::async_trait]
impl RadarProtocol for ComLibProtocol {
    fn name(&self) -> &str {
        "ComLib"
    }

    async fn list_ports(&mut self) -> Result<Vec<String>> {
        let (count, buffer) = blocking(|| {
            let mut buffer = vec![0 as c_char; PORT_LIST_SIZE];
            let count = unsafe { com_get_port_list(buffer.as_mut_ptr(), buffer.len()) };
            (count, buffer)
        })
        .await?;

        if count <= 0 {
            return Ok(vec![]);
        }

        let bytes: Vec<u8> = buffer
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        let raw = String::from_utf8_lossy(&bytes);
        debug!("com_get_port_list reported {} port(s): {}", count, raw);

        let mut ports = parse_port_list(&raw);
        ports.truncate(count as usize);
        Ok(ports)
    }

    async fn connect(&mut self, port: &str) -> Result<Box<dyn RadarSession>> {
        let c_port = CString::new(port)
            .map_err(|_| Error::Config(format!("port name {:?} contains a NUL byte", port)))?;

        let handle = blocking(move || unsafe { protocol_connect(c_port.as_ptr()) }).await?;
        if handle < 0 {
            return Err(Error::Device {
                call: "protocol_connect",
                status: handle,
            });
        }

        info!("Opened {} with protocol handle {}", port, handle);
        Ok(Box::new(ComLibSession::new(handle, port)))
    }
}

/// An open ComLib session. Every library call goes through `calls`, so no two
/// run at once and teardown can wait for one whose caller was cancelled.
pub struct ComLibSession {
    handle: i32,
    port: String,
    calls: InFlight<c_int>,
    callback_registered: bool,
    connected: bool,
}

impl ComLibSession {
    fn new(handle: i32, port: &str) -> Self {
        ComLibSession {
            handle,
            port: port.to_string(),
            calls: InFlight::new(),
            callback_registered: false,
            connected: true,
        }
    }

    /// Must not run while a library call is outstanding.
    fn release_callback(&mut self) {
        if self.callback_registered {
            FRAME_SINK.clear();
            unsafe { ep_radar_base_set_callback_data_frame(None, ptr::null_mut()) };
            self.callback_registered = false;
        }
    }
}

#[async_trait::async_trait]
impl RadarSession for ComLibSession {
    fn handle(&self) -> i32 {
        self.handle
    }

    fn port_name(&self) -> &str {
        &self.port
    }

    async fn num_endpoints(&mut self) -> Result<u8> {
        let handle = self.handle;
        let count = self
            .calls
            .run(move || unsafe { protocol_get_num_endpoints(handle) })
            .await?;
        if count < 0 {
            return Err(Error::Device {
                call: "protocol_get_num_endpoints",
                status: count,
            });
        }
        Ok(u8::try_from(count).unwrap_or(u8::MAX))
    }

    async fn is_radar_base_endpoint(&mut self, endpoint: u8) -> Result<bool> {
        let handle = self.handle;
        let status = self
            .calls
            .run(move || unsafe { ep_radar_base_is_compatible_endpoint(handle, endpoint) })
            .await?;
        Ok(status == 0)
    }

    fn set_frame_callback(&mut self, sink: FrameSink) {
        FRAME_SINK.install(sink);
        if self.callback_registered {
            return;
        }
        unsafe { ep_radar_base_set_callback_data_frame(Some(received_frame_data), ptr::null_mut()) };
        self.callback_registered = true;
    }

    async fn set_automatic_frame_trigger(&mut self, endpoint: u8, interval_us: u32) -> Result<()> {
        let handle = self.handle;
        let status = self
            .calls
            .run(move || unsafe {
                ep_radar_base_set_automatic_frame_trigger(handle, endpoint, interval_us)
            })
            .await?;
        check_status("ep_radar_base_set_automatic_frame_trigger", status)
    }

    async fn get_frame_data(&mut self, endpoint: u8, wait_for_data: bool) -> Result<()> {
        let handle = self.handle;
        let status = self
            .calls
            .run(move || unsafe {
                ep_radar_base_get_frame_data(handle, endpoint, wait_for_data as u8)
            })
            .await?;
        check_status("ep_radar_base_get_frame_data", status)
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(status) = self.calls.settle().await {
            debug!("Abandoned call on session {} ended with {}", self.handle, status);
        }
        self.release_callback();
        if !self.connected {
            return Ok(());
        }

        let handle = self.handle;
        self.calls
            .run(move || {
                unsafe { protocol_disconnect(handle) };
                0
            })
            .await?;
        self.connected = false;
        Ok(())
    }
}

impl Drop for ComLibSession {
    fn drop(&mut self) {
        if !self.callback_registered && !self.connected {
            return;
        }
        // Frames arriving from here on are dropped by the trampoline.
        if self.callback_registered {
            FRAME_SINK.clear();
        }

        let handle = self.handle;
        let (unregister, disconnect) = (self.callback_registered, self.connected);
        let teardown = move || unsafe {
            if unregister {
                ep_radar_base_set_callback_data_frame(None, ptr::null_mut());
            }
            if disconnect {
                protocol_disconnect(handle);
            }
        };

        match self.calls.take() {
            Some(task) if !task.is_finished() => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        let _ = task.await;
                        if let Err(e) = blocking(teardown).await {
                            warn!("Deferred teardown of session {} failed: {}", handle, e);
                        }
                    });
                }
                Err(_) => warn!(
                    "Session {} dropped during a library call outside a runtime, leaving it open",
                    handle
                ),
            },
            _ => teardown(),
        }
    }
}
