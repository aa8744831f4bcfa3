use std::time::Duration;

use bitblt_blade_shared::{
	BITMODE_MPSSE,
	BITMODE_RESET,
	FTDI_DEVICE_OUT_REQTYPE,
	FTDI_STATUS_LEN,
	GPIO_READ_TIMEOUT_MS,
	MPSSE_CLOCK_BYTES_OUT_FALLING,
	MPSSE_CLOCK_DIVISOR,
	MPSSE_GET_HIGH_BYTE,
	MPSSE_GET_LOW_BYTE,
	MPSSE_MAX_TRANSFER,
	MPSSE_SET_CLOCK_DIVISOR,
	MPSSE_SET_HIGH_BYTE,
	MPSSE_SET_LOW_BYTE,
	PIN_DIRECTIONS,
	PIN_VALUES,
	SIO_SET_BITMODE_REQUEST,
	USB_IN_ENDPOINT,
	USB_INTERFACE,
	USB_OUT_ENDPOINT,
	USB_WRITE_TIMEOUT_MS,
};
use rusb::{DeviceHandle, GlobalContext};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Bulk endpoints of an opened bridge.
pub trait UsbLink: Send {
	fn write_bulk(&mut self, data: &[u8]) -> Result<()>;

	/// Reads one packet, failing with [`Error::TransportTimeout`] if none arrives in time.
	fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;
}

/// Interface A of the FT2232 on the expander board, claimed through libusb.
pub struct RusbLink {
	handle: DeviceHandle<GlobalContext>,
}

impl RusbLink {
	/// Opens the first bridge matching the ids and switches it to MPSSE mode.
	///
	/// Returns `Ok(None)` if no such device is plugged in.
	pub fn open(vendor_id: u16, product_id: u16) -> Result<Option<Self>> {
		let Some(mut handle) = rusb::open_device_with_vid_pid(vendor_id, product_id) else {
			return Ok(None);
		};

		if handle.kernel_driver_active(USB_INTERFACE).unwrap_or(false) {
			debug!("detaching kernel driver from interface {USB_INTERFACE}");
			handle.detach_kernel_driver(USB_INTERFACE)?;
		}
		handle.claim_interface(USB_INTERFACE)?;

		let timeout = Duration::from_millis(USB_WRITE_TIMEOUT_MS);
		for mode in [BITMODE_RESET, BITMODE_MPSSE] {
			handle.write_control(
				FTDI_DEVICE_OUT_REQTYPE,
				SIO_SET_BITMODE_REQUEST,
				PIN_DIRECTIONS as u16 | ((mode as u16) << 8),
				USB_INTERFACE as u16,
				&[],
				timeout,
			)?;
		}

		Ok(Some(Self { handle }))
	}
}

impl UsbLink for RusbLink {
	fn write_bulk(&mut self, data: &[u8]) -> Result<()> {
		let timeout = Duration::from_millis(USB_WRITE_TIMEOUT_MS);
		let mut written = 0;
		while written < data.len() {
			written += self.handle.write_bulk(USB_OUT_ENDPOINT, &data[written..], timeout)?;
		}
		Ok(())
	}

	fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
		match self.handle.read_bulk(USB_IN_ENDPOINT, buf, timeout) {
			Ok(n) => Ok(n),
			Err(rusb::Error::Timeout) => Err(Error::TransportTimeout),
			Err(e) => Err(e.into()),
		}
	}
}

/// MPSSE command layer over a bridge that may not exist.
///
/// Without a link every operation returns immediately with an empty result.
pub struct Mpsse {
	link: Option<Box<dyn UsbLink>>,
}

impl Mpsse {
	/// Finds the bridge over libusb. A missing or unusable device leaves the transport
	/// unavailable for the rest of the process.
	pub fn open(vendor_id: u16, product_id: u16) -> Self {
		let link = match RusbLink::open(vendor_id, product_id) {
			Ok(Some(link)) => link,
			Ok(None) => {
				warn!("no MPSSE bridge {vendor_id:04x}:{product_id:04x} found, strip disabled");
				return Self::unavailable();
			}
			Err(e) => {
				warn!("failed to open MPSSE bridge {vendor_id:04x}:{product_id:04x}: {e}");
				return Self::unavailable();
			}
		};

		match Self::with_link(Box::new(link)) {
			Ok(mpsse) => mpsse,
			Err(e) => {
				warn!("failed to program MPSSE clock: {e}");
				Self::unavailable()
			}
		}
	}

	/// Wraps an already opened link and programs the clock divisor.
	pub fn with_link(mut link: Box<dyn UsbLink>) -> Result<Self> {
		let [lo, hi] = MPSSE_CLOCK_DIVISOR.to_le_bytes();
		link.write_bulk(&[MPSSE_SET_CLOCK_DIVISOR, lo, hi])?;
		info!("MPSSE bridge ready, clock divisor {MPSSE_CLOCK_DIVISOR}");

		Ok(Self { link: Some(link) })
	}

	pub fn unavailable() -> Self {
		Self { link: None }
	}

	pub fn is_available(&self) -> bool {
		self.link.is_some()
	}

	fn write(&mut self, command: &[u8]) -> Result<()> {
		match self.link.as_mut() {
			Some(link) => link.write_bulk(command),
			None => Ok(()),
		}
	}

	/// Direction bit 1 means output.
	pub fn set_low_byte(&mut self, value: u8, direction: u8) -> Result<()> {
		self.write(&[MPSSE_SET_LOW_BYTE, value, direction])
	}

	pub fn set_high_byte(&mut self, value: u8, direction: u8) -> Result<()> {
		self.write(&[MPSSE_SET_HIGH_BYTE, value, direction])
	}

	pub fn read_low_byte(&mut self) -> Result<Option<u8>> {
		self.read_gpio(MPSSE_GET_LOW_BYTE)
	}

	pub fn read_high_byte(&mut self) -> Result<Option<u8>> {
		self.read_gpio(MPSSE_GET_HIGH_BYTE)
	}

	fn read_gpio(&mut self, command: u8) -> Result<Option<u8>> {
		let Some(link) = self.link.as_mut() else {
			return Ok(None);
		};

		link.write_bulk(&[command])?;

		let mut buf = [0u8; FTDI_STATUS_LEN + 1];
		match link.read_bulk(&mut buf, Duration::from_millis(GPIO_READ_TIMEOUT_MS)) {
			Ok(n) if n > FTDI_STATUS_LEN => Ok(Some(buf[FTDI_STATUS_LEN])),
			Ok(_) => Ok(None),
			Err(Error::TransportTimeout) => {
				debug!("GPIO read 0x{command:02x} timed out");
				Ok(None)
			}
			Err(e) => Err(e),
		}
	}

	/// CS, clock and data as outputs driven low; GPIOL0-3 kept as inputs.
	pub fn init_pins(&mut self) -> Result<()> {
		self.set_low_byte(PIN_VALUES, PIN_DIRECTIONS)
	}

	/// Clocks `data` out on the falling edge, re-asserting the pin setup first.
	pub fn clock_out(&mut self, data: &[u8]) -> Result<()> {
		if self.link.is_none() {
			return Ok(());
		}
		if data.is_empty() || data.len() > MPSSE_MAX_TRANSFER {
			return Err(Error::TransferLength(data.len()));
		}

		self.init_pins()?;

		let [lo, hi] = ((data.len() - 1) as u16).to_le_bytes();
		let mut command = Vec::with_capacity(data.len() + 3);
		command.extend_from_slice(&[MPSSE_CLOCK_BYTES_OUT_FALLING, lo, hi]);
		command.extend_from_slice(data);

		self.write(&command)
	}
}
