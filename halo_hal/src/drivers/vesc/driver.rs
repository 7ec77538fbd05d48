//! VESC driver implementation.

use super::DRIVER_NAME;
use super::packet::{self, MAX_FRAME_LEN, Payload, START_LONG, START_SHORT, VescValues};
use super::transport::{SerialTransport, Transport};
use halo_common::hal::config::{DriverConfig, PositionSource, VescConfig};
use halo_common::hal::driver::{DriverDiagnostics, HalError, MotorDriver};
use halo_common::hal::types::TelemetrySample;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// VESC driver implementing the `MotorDriver` trait.
///
/// Without an injected transport, `init()` opens the serial port named in
/// the `[driver.vesc]` table.
pub struct VescDriver {
    transport: Option<Box<dyn Transport>>,
    config: VescConfig,
    diagnostics: DriverDiagnostics,
    initialized: bool,
}

impl VescDriver {
    /// Create a driver that opens its serial port on `init()`.
    pub fn new() -> Self {
        Self {
            transport: None,
            config: VescConfig::default(),
            diagnostics: DriverDiagnostics::default(),
            initialized: false,
        }
    }

    /// Create a driver over an existing transport.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport: Some(transport),
            ..Self::new()
        }
    }

    fn transport(&mut self) -> Result<&mut Box<dyn Transport>, HalError> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }
        self.transport.as_mut().ok_or(HalError::NotInitialized)
    }

    fn send_payload(&mut self, payload: &[u8]) -> Result<(), HalError> {
        let frame = packet::encode(payload)?;
        self.transport()?.send(&frame)
    }

    /// Send a request and wait for one reply frame.
    ///
    /// Unread input is flushed first so a reply that missed an earlier
    /// deadline is never taken for this one.
    fn request(&mut self, payload: &[u8]) -> Result<Payload, HalError> {
        self.transport()?.flush_input()?;
        self.send_payload(payload)?;

        let timeout_ms = self.config.timeout_ms;
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let transport = self.transport()?;
        let mut rx: heapless::Vec<u8, MAX_FRAME_LEN> = heapless::Vec::new();
        let mut chunk = [0u8; 64];

        loop {
            skip_to_frame_start(&mut rx);
            if let Some((reply, _)) = packet::decode(&rx)? {
                return Ok(reply);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(HalError::Timeout(timeout_ms));
            }
            let n = transport.recv(&mut chunk, remaining)?;
            if n == 0 {
                continue;
            }
            rx.extend_from_slice(&chunk[..n]).map_err(|_| {
                HalError::MalformedResponse(format!("reply exceeds {MAX_FRAME_LEN} bytes"))
            })?;
        }
    }

    fn to_sample(&self, values: &VescValues) -> TelemetrySample {
        let raw = TelemetrySample {
            motor_current_amps: values.motor_current_a,
            rotational_speed_rpm: f64::from(values.erpm) / f64::from(self.config.pole_pairs),
            encoder_position_counts: match self.config.position_source {
                PositionSource::Tachometer => Some(i64::from(values.tachometer)),
                PositionSource::None => None,
            },
        };
        self.config.calibration.apply(raw)
    }
}

/// Drop line noise ahead of the first start byte.
fn skip_to_frame_start(rx: &mut heapless::Vec<u8, MAX_FRAME_LEN>) {
    let start = rx
        .iter()
        .position(|&b| b == START_SHORT || b == START_LONG)
        .unwrap_or(rx.len());
    if start > 0 {
        debug!(skipped = start, "Discarding bytes before frame start");
        let len = rx.len();
        rx.copy_within(start.., 0);
        rx.truncate(len - start);
    }
}

impl Default for VescDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorDriver for VescDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, config: &DriverConfig) -> Result<(), HalError> {
        let vesc = &config.vesc;
        vesc.validate()
            .map_err(|e| HalError::InitFailed(e.to_string()))?;
        if self.transport.is_none() {
            let serial = SerialTransport::open(&vesc.port, vesc.baud)?;
            self.transport = Some(Box::new(serial));
        }
        info!(
            port = %vesc.port.display(),
            baud = vesc.baud,
            pole_pairs = vesc.pole_pairs,
            "VESC driver initialized"
        );
        self.config = vesc.clone();
        self.diagnostics = DriverDiagnostics::default();
        self.initialized = true;
        Ok(())
    }

    fn read_telemetry(&mut self) -> Result<TelemetrySample, HalError> {
        self.diagnostics.reads += 1;
        let result = self
            .request(&packet::get_values_request())
            .and_then(|reply| Ok(VescValues::parse(&reply)?));
        match result {
            Ok(values) => {
                if values.fault_code != 0 {
                    warn!(fault = values.fault_code, "VESC reports fault");
                }
                let sample = self.to_sample(&values);
                debug!(
                    current = sample.motor_current_amps,
                    rpm = sample.rotational_speed_rpm,
                    "VESC telemetry"
                );
                Ok(sample)
            }
            Err(e) => {
                self.diagnostics.read_failures += 1;
                Err(e)
            }
        }
    }

    fn write_current(&mut self, amps: f64) -> Result<(), HalError> {
        self.diagnostics.writes += 1;
        match self.send_payload(&packet::set_current_request(amps)) {
            Ok(()) => {
                self.diagnostics.last_written_amps = Some(amps);
                Ok(())
            }
            Err(e) => {
                self.diagnostics.write_failures += 1;
                Err(e)
            }
        }
    }

    fn shutdown(&mut self) -> Result<(), HalError> {
        info!("Shutting down VESC driver");
        self.initialized = false;
        self.transport = None;
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        Some(self.diagnostics.clone())
    }
}
