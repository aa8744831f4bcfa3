#![no_std]

// FT2232 expander board, interface A.
pub const DEVICE_VENDOR_ID: u16 = 0x0403;
pub const DEVICE_PRODUCT_ID: u16 = 0x6010;

pub const USB_INTERFACE: u8 = 0;
pub const USB_OUT_ENDPOINT: u8 = 0x02;
pub const USB_IN_ENDPOINT: u8 = 0x81;

pub const FTDI_DEVICE_OUT_REQTYPE: u8 = 0x40;
pub const SIO_SET_BITMODE_REQUEST: u8 = 0x0B;
pub const BITMODE_RESET: u8 = 0x00;
pub const BITMODE_MPSSE: u8 = 0x02;

/// Every bulk IN packet from the FTDI starts with two modem status bytes.
pub const FTDI_STATUS_LEN: usize = 2;

// MPSSE command vocabulary (AN_108).
pub const MPSSE_SET_LOW_BYTE: u8 = 0x80;
pub const MPSSE_GET_LOW_BYTE: u8 = 0x81;
pub const MPSSE_SET_HIGH_BYTE: u8 = 0x82;
pub const MPSSE_GET_HIGH_BYTE: u8 = 0x83;
pub const MPSSE_SET_CLOCK_DIVISOR: u8 = 0x86;
pub const MPSSE_CLOCK_BYTES_OUT_FALLING: u8 = 0x11;

/// Clock base of the FT2232D MPSSE engine, divided by `(1 + divisor) * 2`.
pub const MPSSE_BASE_CLOCK_HZ: u32 = 12_000_000;
pub const MPSSE_CLOCK_HZ: u32 = 3_000_000;
pub const MPSSE_CLOCK_DIVISOR: u16 = (MPSSE_BASE_CLOCK_HZ / (2 * MPSSE_CLOCK_HZ) - 1) as u16;

/// Largest transfer a single clock out command can describe.
pub const MPSSE_MAX_TRANSFER: usize = u16::MAX as usize + 1;

//    GPIOL3, GPIOL2, GPIOL1, GPIOL0, TMS/CS, TDO/DI, TDI/DO, TCK/SK
//DIR In    , In    , In    , In    , Out   , In    , Out   , Out
pub const PIN_DIRECTIONS: u8 = 0x0B;
pub const PIN_VALUES: u8 = 0x00;

pub const GPIO_READ_TIMEOUT_MS: u64 = 500;
pub const USB_WRITE_TIMEOUT_MS: u64 = 1000;

pub const BYTES_PER_LED: usize = 3;
/// Pixels on the strip this controller was built for.
pub const DEFAULT_STRIP_HEIGHT: usize = 95;

pub const SERIAL_DEVICE: &str = "/dev/ttyUSB0";
pub const SERIAL_BAUD_RATE: u32 = 38_400;
pub const GATEWAY_RESPONSE_LEN: usize = 2048;

pub const GATEWAY_FRAME_LEN: usize = 13;
pub const GATEWAY_PACKET_LENGTH: u8 = 0x0C;
pub const GATEWAY_PACKET_TYPE: u8 = 0x1A;

pub const GATEWAY_RESET_FRAME: &[u8; 14] = &[13, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
pub const GATEWAY_STATUS_FRAME: &[u8; 14] = &[13, 0, 0, 0x01, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// Clients start long-polling from this id, so the broadcaster must start elsewhere.
pub const CLIENT_INITIAL_STATUS_ID: u64 = 0;
pub const INITIAL_STATUS_ID: u64 = 1;

pub const MAX_UPLOAD_BYTES: usize = 1_048_576;
