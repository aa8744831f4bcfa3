use std::{
	sync::{Arc, Mutex, MutexGuard, PoisonError},
	thread,
	time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
	column::{self, ChannelOrder, Column, Image, Pixel},
	mpsse::Mpsse,
	status::StatusBroadcaster,
	Error,
	Result,
};

/// The bridge and the column it last showed, always locked together.
struct Device {
	transport: Mpsse,
	buffer: Column,
}

impl Device {
	fn push(&mut self, column: &Column) -> Result<()> {
		self.transport.clock_out(&column.to_bytes())
	}
}

/// Owns the light scythe: the stored image, the live column and playback timing.
pub struct StripDriver {
	height: usize,
	order: ChannelOrder,
	/// Fixed at construction; the bridge is never reopened.
	available: bool,

	device: Mutex<Device>,
	image: Mutex<Option<Arc<Image>>>,
	interval: Mutex<Duration>,

	status: Arc<StatusBroadcaster>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StripDriver {
	pub fn new(
		transport: Mpsse,
		height: usize,
		order: ChannelOrder,
		interval: Duration,
		status: Arc<StatusBroadcaster>,
	) -> Self {
		Self {
			height,
			order,
			available: transport.is_available(),

			device: Mutex::new(Device {
				transport,
				buffer: Column::black(height),
			}),
			image: Mutex::new(None),
			interval: Mutex::new(interval),

			status,
		}
	}

	pub fn height(&self) -> usize {
		self.height
	}

	pub fn is_available(&self) -> bool {
		self.available
	}

	pub fn interval(&self) -> Duration {
		*lock(&self.interval)
	}

	pub fn image(&self) -> Option<Arc<Image>> {
		lock(&self.image).clone()
	}

	/// A copy of the column currently shown on the strip.
	pub fn buffer(&self) -> Column {
		lock(&self.device).buffer.clone()
	}

	fn report_error(&self, error: &Error) {
		warn!("{error}");
		self.status.publish(format!("Error: {error}"));
	}

	/// Decodes and stores a new image. A failed decode keeps the previous one.
	pub fn load_image(&self, bytes: &[u8]) -> Result<usize> {
		match column::decode(bytes, self.height, self.order) {
			Ok(image) => {
				let width = image.width();
				*lock(&self.image) = Some(Arc::new(image));
				info!("image loaded with {width} columns");
				self.status.publish(format!("Image loaded with {width} columns"));
				Ok(width)
			}
			Err(e) => {
				self.report_error(&e);
				Err(e)
			}
		}
	}

	/// Applies from the next playback on.
	pub fn set_interval(&self, seconds: f64) -> Result<()> {
		let interval = match Duration::try_from_secs_f64(seconds) {
			Ok(interval) => interval,
			Err(_) => {
				let e = Error::InvalidInterval(seconds);
				self.report_error(&e);
				return Err(e);
			}
		};

		*lock(&self.interval) = interval;
		self.status.publish(format!("Info: Interval set to {seconds:.6} s"));
		Ok(())
	}

	/// Shows every column of the stored image in turn, then blanks the strip.
	///
	/// Blocks the caller for the whole run; other strip commands wait for it to finish.
	pub fn play(&self) -> Result<()> {
		let Some(image) = self.image() else {
			let e = Error::NoImageLoaded;
			self.report_error(&e);
			return Err(e);
		};
		let interval = self.interval();

		let mut device = lock(&self.device);
		self.status.publish("Info: Playing image");
		info!(columns = image.width(), ?interval, "playing image");

		if let Err(e) = Self::run(&mut device, &image, interval) {
			self.report_error(&e);
			return Err(e);
		}

		debug!("playback finished");
		Ok(())
	}

	fn run(device: &mut Device, image: &Image, interval: Duration) -> Result<()> {
		for column in image.columns() {
			device.buffer.clone_from(column);
			device.push(column)?;
			thread::sleep(interval);
		}

		device.buffer.fill(Pixel::BLACK);
		let black = device.buffer.clone();
		device.push(&black)
	}

	/// Sets one pixel, or the whole strip when `pixel_index` is outside the strip,
	/// and shows the result immediately.
	pub fn set_color(&self, red: u8, green: u8, blue: u8, pixel_index: i64) -> Result<()> {
		let pixel = self.order.apply([red, green, blue]);

		let mut device = lock(&self.device);
		let single = match usize::try_from(pixel_index) {
			Ok(index) if index < self.height => device.buffer.set(index, pixel),
			_ => {
				device.buffer.fill(pixel);
				false
			}
		};

		let column = device.buffer.clone();
		let pushed = device.push(&column);
		drop(device);

		if let Err(e) = pushed {
			self.report_error(&e);
			return Err(e);
		}

		if single {
			self.status
				.publish(format!("Info: Showing ({red},{green},{blue}) on pixel {pixel_index}"));
		} else {
			self.status.publish(format!("Info: Showing ({red},{green},{blue})"));
		}
		Ok(())
	}
}
