use std::{
	io::{self, Read, Write},
	sync::{Arc, Mutex, PoisonError},
	thread,
	time::Duration,
};

use bitblt_blade_shared::{
	GATEWAY_FRAME_LEN,
	GATEWAY_PACKET_LENGTH,
	GATEWAY_PACKET_TYPE,
	GATEWAY_RESET_FRAME,
	GATEWAY_RESPONSE_LEN,
	GATEWAY_STATUS_FRAME,
	SERIAL_BAUD_RATE,
};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info, warn};

use crate::{status::StatusBroadcaster, Error, Result};

/// Serial line to the gateway.
pub trait GatewayPort: Read + Write + Send {
	/// Drops anything the gateway sent that has not been read yet.
	fn clear_input(&mut self) -> io::Result<()>;

	/// Drops anything queued for the gateway that has not gone out yet.
	fn clear_output(&mut self) -> io::Result<()>;
}

impl GatewayPort for Box<dyn SerialPort> {
	fn clear_input(&mut self) -> io::Result<()> {
		Ok(self.clear(ClearBuffer::Input)?)
	}

	fn clear_output(&mut self) -> io::Result<()> {
		Ok(self.clear(ClearBuffer::Output)?)
	}
}

/// Lays out a blind command. Only the unit id, unit code and command vary; the
/// trailing signal strength byte is always zero because nothing is received.
pub fn build_frame(unit_id: u16, unit_code: u8, command: u8) -> [u8; GATEWAY_FRAME_LEN] {
	let [id_hi, id_lo] = unit_id.to_be_bytes();
	[
		GATEWAY_PACKET_LENGTH,
		GATEWAY_PACKET_TYPE,
		0x00, // sub type
		0x00, // sequence number
		0x00,
		id_hi,
		id_lo,
		unit_code,
		command,
		0x00,
		0x00,
		0x00,
		0x00, // rssi
	]
}

/// Resets the gateway and asks for its status. The reply is read and discarded.
fn handshake(port: &mut dyn GatewayPort, settle: Duration) -> Result<()> {
	port.clear_input()?;
	port.clear_output()?;
	port.write_all(GATEWAY_RESET_FRAME)?;
	thread::sleep(settle);
	port.clear_input()?;

	port.write_all(GATEWAY_STATUS_FRAME)?;
	let mut response = [0u8; GATEWAY_RESPONSE_LEN];
	match port.read(&mut response) {
		Ok(n) => debug!("gateway answered status query with {n} bytes"),
		Err(e) if e.kind() == io::ErrorKind::TimedOut => warn!("gateway did not answer status query"),
		Err(e) => return Err(e.into()),
	}

	Ok(())
}

/// Write-only command channel to the blind gateway.
pub struct RfGateway {
	port: Mutex<Option<Box<dyn GatewayPort>>>,
	available: bool,
	status: Arc<StatusBroadcaster>,
}

impl RfGateway {
	/// Opens the serial device at 38400 8N1 and runs the startup handshake.
	///
	/// Any failure leaves the gateway unavailable for the rest of the process.
	pub fn open(serial_device: &str, settle: Duration, status: Arc<StatusBroadcaster>) -> Self {
		let port = serialport::new(serial_device, SERIAL_BAUD_RATE)
			.data_bits(DataBits::Eight)
			.parity(Parity::None)
			.stop_bits(StopBits::One)
			.flow_control(FlowControl::None)
			.timeout(Duration::from_millis(500))
			.open();

		match port {
			Ok(port) => Self::with_port(Box::new(port), settle, status),
			Err(e) => {
				warn!("opening gateway \"{serial_device}\": {e}");
				Self::unavailable(status)
			}
		}
	}

	pub fn with_port(mut port: Box<dyn GatewayPort>, settle: Duration, status: Arc<StatusBroadcaster>) -> Self {
		match handshake(port.as_mut(), settle) {
			Ok(()) => {
				info!("blind gateway ready");
				Self {
					port: Mutex::new(Some(port)),
					available: true,
					status,
				}
			}
			Err(e) => {
				warn!("gateway handshake failed: {e}");
				Self::unavailable(status)
			}
		}
	}

	pub fn unavailable(status: Arc<StatusBroadcaster>) -> Self {
		Self {
			port: Mutex::new(None),
			available: false,
			status,
		}
	}

	pub fn is_available(&self) -> bool {
		self.available
	}

	/// Sends one command frame without waiting for an acknowledgement.
	pub fn send_command(&self, unit_id: u16, unit_code: u8, command: u8) -> Result<()> {
		let frame = build_frame(unit_id, unit_code, command);

		let sent = match self.port.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
			Some(port) => port.write_all(&frame).map_err(Error::from),
			None => Err(Error::Unavailable("blind gateway")),
		};

		match sent {
			Ok(()) => {
				debug!(?frame, "blind command sent");
				self.status
					.publish(format!("Info: Blind command ({unit_id},{unit_code},{command})"));
				Ok(())
			}
			Err(e) => {
				warn!("blind command ({unit_id},{unit_code},{command}) failed: {e}");
				self.status.publish(format!("Error: {e}"));
				Err(e)
			}
		}
	}
}
