//! Control core for the BitBltBlade: a WS2801 light scythe clocked out through an
//! FT2232 MPSSE bridge, and a serial RFXtrx gateway that moves radio blinds.
//!
//! Every operation is reachable from many threads at once through a shared
//! [`Controller`]. Status changes are delivered to long-polling observers by the
//! [`StatusBroadcaster`].

use std::{io, time::Duration};

use bitblt_blade_shared::{
	DEFAULT_STRIP_HEIGHT,
	DEVICE_PRODUCT_ID,
	DEVICE_VENDOR_ID,
	MAX_UPLOAD_BYTES,
	SERIAL_DEVICE,
};

pub mod column;
pub mod control;
pub mod mpsse;
pub mod rfx;
pub mod status;
pub mod strip;
#[cfg(feature = "tokio")]
pub mod tokio;

#[cfg(test)]
mod testing;

pub use column::{decode, ChannelOrder, Column, Image, Pixel};
pub use control::{Availability, Command, Controller};
pub use mpsse::{Mpsse, RusbLink, UsbLink};
pub use rfx::{build_frame, GatewayPort, RfGateway};
pub use status::{StatusBroadcaster, StatusEvent};
pub use strip::StripDriver;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0} not found")]
	DeviceAbsent(&'static str),
	#[error("{0} is unavailable")]
	Unavailable(&'static str),
	#[error("image scales to {width}x{height}, nothing to show")]
	DegenerateImage { width: u32, height: u32 },
	#[error("No image loaded")]
	NoImageLoaded,
	#[error("timed out reading from the bridge")]
	TransportTimeout,
	#[error("cannot clock out {0} bytes in one transfer")]
	TransferLength(usize),
	#[error("File too big ({0} bytes)")]
	UploadTooLarge(usize),
	#[error("invalid interval {0}")]
	InvalidInterval(f64),
	#[error("invalid value for field \"{field}\": {value:?}")]
	InvalidField { field: &'static str, value: String },
	#[error("Unexpected command")]
	UnexpectedCommand,
	#[error(transparent)]
	Usb(#[from] rusb::Error),
	#[error(transparent)]
	Serial(#[from] serialport::Error),
	#[error(transparent)]
	Io(#[from] io::Error),
	#[error(transparent)]
	Image(#[from] image::ImageError),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[cfg(feature = "tokio")]
	#[error(transparent)]
	Join(#[from] ::tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone)]
pub struct Config {
	/// Pixels in one column of the strip.
	pub strip_height: usize,
	pub channel_order: ChannelOrder,
	/// Delay between columns during playback.
	pub column_interval: Duration,

	pub usb_vendor_id: u16,
	pub usb_product_id: u16,

	pub serial_device: String,
	/// Pause between the gateway reset frame and the status query.
	pub gateway_settle: Duration,

	pub max_upload_bytes: usize,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			strip_height: DEFAULT_STRIP_HEIGHT,
			// the WS2801 strip on the blade has red and blue swapped
			channel_order: ChannelOrder::BGR,
			column_interval: Duration::from_millis(50),

			usb_vendor_id: DEVICE_VENDOR_ID,
			usb_product_id: DEVICE_PRODUCT_ID,

			serial_device: SERIAL_DEVICE.to_string(),
			gateway_settle: Duration::from_secs(1),

			max_upload_bytes: MAX_UPLOAD_BYTES,
		}
	}
}
