//! VESC UART packet codec.
//!
//! Frame layout (all multi-byte fields big-endian):
//!
//! ```text
//! short: 0x02 | len:u8      | payload | crc:u16 | 0x03
//! long:  0x03 | len:u16     | payload | crc:u16 | 0x03
//! ```
//!
//! The CRC is CRC-16/XMODEM over the payload only.

use heapless::Vec;
use thiserror::Error;

use halo_common::hal::driver::HalError;

/// Start byte of a frame with a one-byte length.
pub const START_SHORT: u8 = 0x02;
/// Start byte of a frame with a two-byte length.
pub const START_LONG: u8 = 0x03;
/// End-of-frame byte.
pub const END: u8 = 0x03;

/// Largest payload this codec accepts.
pub const MAX_PAYLOAD_LEN: usize = 512;
/// Largest encoded frame.
pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + 6;

/// Decoded payload buffer.
pub type Payload = Vec<u8, MAX_PAYLOAD_LEN>;
/// Encoded frame buffer.
pub type Frame = Vec<u8, MAX_FRAME_LEN>;

/// `COMM_GET_VALUES` command id.
pub const COMM_GET_VALUES: u8 = 4;
/// `COMM_SET_CURRENT` command id.
pub const COMM_SET_CURRENT: u8 = 6;

/// Bytes of a `COMM_GET_VALUES` reply up to and including the fault code.
const GET_VALUES_MIN_LEN: usize = 54;

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Payload is empty
    #[error("empty payload")]
    Empty,

    /// Payload exceeds `MAX_PAYLOAD_LEN`
    #[error("payload of {0} bytes exceeds {MAX_PAYLOAD_LEN}")]
    TooLong(usize),

    /// First byte is not a start byte
    #[error("invalid start byte 0x{0:02x}")]
    BadStart(u8),

    /// Frame does not end with the end byte
    #[error("invalid end byte 0x{0:02x}")]
    BadEnd(u8),

    /// Checksum does not match the payload
    #[error("crc mismatch: frame 0x{expected:04x}, computed 0x{actual:04x}")]
    CrcMismatch {
        /// CRC carried in the frame
        expected: u16,
        /// CRC computed over the payload
        actual: u16,
    },

    /// Reply carries a different command id
    #[error("unexpected command id {0}")]
    UnexpectedCommand(u8),

    /// Reply shorter than its command requires
    #[error("payload too short: need {needed} bytes, got {got}")]
    ShortPayload {
        /// Required length
        needed: usize,
        /// Received length
        got: usize,
    },
}

impl From<PacketError> for HalError {
    fn from(e: PacketError) -> Self {
        HalError::MalformedResponse(e.to_string())
    }
}

/// CRC-16/XMODEM (poly 0x1021, init 0).
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |mut crc, &byte| {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
        crc
    })
}

/// Wrap a payload in a frame.
pub fn encode(payload: &[u8]) -> Result<Frame, PacketError> {
    if payload.is_empty() {
        return Err(PacketError::Empty);
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(PacketError::TooLong(payload.len()));
    }

    let overflow = |_| PacketError::TooLong(payload.len());
    let mut frame = Frame::new();
    if let Ok(len) = u8::try_from(payload.len()) {
        frame.push(START_SHORT).map_err(overflow)?;
        frame.push(len).map_err(overflow)?;
    } else {
        let len = payload.len() as u16;
        frame.push(START_LONG).map_err(overflow)?;
        frame
            .extend_from_slice(&len.to_be_bytes())
            .map_err(|_| PacketError::TooLong(payload.len()))?;
    }
    frame
        .extend_from_slice(payload)
        .map_err(|_| PacketError::TooLong(payload.len()))?;
    frame
        .extend_from_slice(&crc16(payload).to_be_bytes())
        .map_err(|_| PacketError::TooLong(payload.len()))?;
    frame.push(END).map_err(overflow)?;
    Ok(frame)
}

/// Try to decode one frame from the front of `buf`.
///
/// Returns `Ok(None)` while the frame is still incomplete, otherwise the
/// payload and the number of bytes consumed.
pub fn decode(buf: &[u8]) -> Result<Option<(Payload, usize)>, PacketError> {
    let Some(&start) = buf.first() else {
        return Ok(None);
    };
    let (header_len, payload_len) = match start {
        START_SHORT => match buf.get(1) {
            Some(&len) => (2, usize::from(len)),
            None => return Ok(None),
        },
        START_LONG => match buf.get(1..3) {
            Some(&[hi, lo]) => (3, usize::from(u16::from_be_bytes([hi, lo]))),
            _ => return Ok(None),
        },
        other => return Err(PacketError::BadStart(other)),
    };
    if payload_len == 0 {
        return Err(PacketError::Empty);
    }
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(PacketError::TooLong(payload_len));
    }

    let frame_len = header_len + payload_len + 3;
    if buf.len() < frame_len {
        return Ok(None);
    }

    let body = &buf[header_len..header_len + payload_len];
    let crc_at = header_len + payload_len;
    let expected = u16::from_be_bytes([buf[crc_at], buf[crc_at + 1]]);
    let actual = crc16(body);
    if expected != actual {
        return Err(PacketError::CrcMismatch { expected, actual });
    }
    let end = buf[frame_len - 1];
    if end != END {
        return Err(PacketError::BadEnd(end));
    }

    let payload = Payload::from_slice(body).map_err(|_| PacketError::TooLong(payload_len))?;
    Ok(Some((payload, frame_len)))
}

/// Payload requesting the realtime values.
#[inline]
pub const fn get_values_request() -> [u8; 1] {
    [COMM_GET_VALUES]
}

/// Payload commanding motor current, in milliamps on the wire.
pub fn set_current_request(amps: f64) -> [u8; 5] {
    let milliamps = (amps * 1000.0).round() as i32;
    let [a, b, c, d] = milliamps.to_be_bytes();
    [COMM_SET_CURRENT, a, b, c, d]
}

/// Realtime values reported by `COMM_GET_VALUES`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VescValues {
    /// MOSFET temperature [°C]
    pub temp_fet_c: f64,
    /// Motor temperature [°C]
    pub temp_motor_c: f64,
    /// Motor (phase) current [A]
    pub motor_current_a: f64,
    /// Battery current [A]
    pub input_current_a: f64,
    /// Duty cycle [-1, 1]
    pub duty_cycle: f64,
    /// Electrical RPM
    pub erpm: i32,
    /// Supply voltage [V]
    pub input_voltage_v: f64,
    /// Commutation tachometer
    pub tachometer: i32,
    /// Absolute tachometer
    pub tachometer_abs: i32,
    /// Fault code, 0 = none
    pub fault_code: u8,
}

impl VescValues {
    /// Parse a `COMM_GET_VALUES` reply payload.
    pub fn parse(payload: &[u8]) -> Result<Self, PacketError> {
        let mut r = Reader::new(payload);
        let id = r.u8()?;
        if id != COMM_GET_VALUES {
            return Err(PacketError::UnexpectedCommand(id));
        }
        if payload.len() < GET_VALUES_MIN_LEN {
            return Err(PacketError::ShortPayload {
                needed: GET_VALUES_MIN_LEN,
                got: payload.len(),
            });
        }

        let temp_fet_c = f64::from(r.i16()?) / 10.0;
        let temp_motor_c = f64::from(r.i16()?) / 10.0;
        let motor_current_a = f64::from(r.i32()?) / 100.0;
        let input_current_a = f64::from(r.i32()?) / 100.0;
        r.skip(8)?; // id, iq
        let duty_cycle = f64::from(r.i16()?) / 1000.0;
        let erpm = r.i32()?;
        let input_voltage_v = f64::from(r.i16()?) / 10.0;
        r.skip(16)?; // amp hours, watt hours
        let tachometer = r.i32()?;
        let tachometer_abs = r.i32()?;
        let fault_code = r.u8()?;

        Ok(Self {
            temp_fet_c,
            temp_motor_c,
            motor_current_a,
            input_current_a,
            duty_cycle,
            erpm,
            input_voltage_v,
            tachometer,
            tachometer_abs,
            fault_code,
        })
    }

    /// Encode as a reply payload, the way the controller firmware sends it.
    #[cfg(test)]
    pub(crate) fn to_payload(&self) -> Payload {
        let mut p = Payload::new();
        let mut put = |bytes: &[u8]| {
            p.extend_from_slice(bytes).unwrap();
        };
        put(&[COMM_GET_VALUES]);
        put(&((self.temp_fet_c * 10.0).round() as i16).to_be_bytes());
        put(&((self.temp_motor_c * 10.0).round() as i16).to_be_bytes());
        put(&((self.motor_current_a * 100.0).round() as i32).to_be_bytes());
        put(&((self.input_current_a * 100.0).round() as i32).to_be_bytes());
        put(&[0; 8]);
        put(&((self.duty_cycle * 1000.0).round() as i16).to_be_bytes());
        put(&self.erpm.to_be_bytes());
        put(&((self.input_voltage_v * 10.0).round() as i16).to_be_bytes());
        put(&[0; 16]);
        put(&self.tachometer.to_be_bytes());
        put(&self.tachometer_abs.to_be_bytes());
        put(&[self.fault_code]);
        p
    }
}

/// Big-endian cursor over a payload.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], PacketError> {
        let end = self.pos + N;
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or(PacketError::ShortPayload {
                needed: end,
                got: self.buf.len(),
            })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn skip(&mut self, n: usize) -> Result<(), PacketError> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(PacketError::ShortPayload {
                needed: end,
                got: self.buf.len(),
            });
        }
        self.pos = end;
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take::<1>()?[0])
    }

    fn i16(&mut self) -> Result<i16, PacketError> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    fn i32(&mut self) -> Result<i32, PacketError> {
        Ok(i32::from_be_bytes(self.take()?))
    }
}
