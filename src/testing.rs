//! In-memory stand-ins for the bridge and the serial gateway.

use std::{
	collections::VecDeque,
	io::{self, Read, Write},
	sync::{Arc, Mutex},
	time::{Duration, Instant},
};

use bitblt_blade_shared::MPSSE_CLOCK_BYTES_OUT_FALLING;

use crate::{mpsse::UsbLink, rfx::GatewayPort, Error, Result};

#[derive(Clone, Default)]
pub(crate) struct RecordingLink {
	writes: Arc<Mutex<Vec<(Instant, Vec<u8>)>>>,
	reads: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl RecordingLink {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
		self.writes.lock().unwrap().iter().map(|(_, data)| data.clone()).collect()
	}

	pub(crate) fn clear(&self) {
		self.writes.lock().unwrap().clear();
	}

	pub(crate) fn queue_read(&self, packet: &[u8]) {
		self.reads.lock().unwrap().push_back(packet.to_vec());
	}

	/// Payloads of every clock out command, with the time each was written.
	pub(crate) fn columns(&self) -> Vec<(Instant, Vec<u8>)> {
		self.writes
			.lock()
			.unwrap()
			.iter()
			.filter(|(_, data)| data.first() == Some(&MPSSE_CLOCK_BYTES_OUT_FALLING))
			.map(|(at, data)| (*at, data[3..].to_vec()))
			.collect()
	}
}

impl UsbLink for RecordingLink {
	fn write_bulk(&mut self, data: &[u8]) -> Result<()> {
		self.writes.lock().unwrap().push((Instant::now(), data.to_vec()));
		Ok(())
	}

	fn read_bulk(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
		let Some(packet) = self.reads.lock().unwrap().pop_front() else {
			return Err(Error::TransportTimeout);
		};
		let n = packet.len().min(buf.len());
		buf[..n].copy_from_slice(&packet[..n]);
		Ok(n)
	}
}

/// Serial gateway that records frames and answers reads from a fixed response.
#[derive(Clone, Default)]
pub(crate) struct RecordingPort {
	pub(crate) written: Arc<Mutex<Vec<Vec<u8>>>>,
	pub(crate) clears: Arc<Mutex<usize>>,
	pub(crate) output_clears: Arc<Mutex<usize>>,
	pub(crate) response: Vec<u8>,
	pub(crate) fail_writes: bool,
}

impl RecordingPort {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn frames(&self) -> Vec<Vec<u8>> {
		self.written.lock().unwrap().clone()
	}
}

impl Read for RecordingPort {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if self.response.is_empty() {
			return Err(io::ErrorKind::TimedOut.into());
		}
		let n = self.response.len().min(buf.len());
		buf[..n].copy_from_slice(&self.response[..n]);
		Ok(n)
	}
}

impl Write for RecordingPort {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		if self.fail_writes {
			return Err(io::ErrorKind::BrokenPipe.into());
		}
		self.written.lock().unwrap().push(buf.to_vec());
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl GatewayPort for RecordingPort {
	fn clear_input(&mut self) -> io::Result<()> {
		*self.clears.lock().unwrap() += 1;
		Ok(())
	}

	fn clear_output(&mut self) -> io::Result<()> {
		*self.output_clears.lock().unwrap() += 1;
		Ok(())
	}
}
