use std::{collections::HashMap, sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
	mpsse::Mpsse,
	rfx::RfGateway,
	status::{StatusBroadcaster, StatusEvent},
	strip::StripDriver,
	Config,
	Error,
	Result,
};

/// Which pieces of hardware were found at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
	pub strip: bool,
	pub gateway: bool,
}

/// One user request, as decoded from a submitted form.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	LoadImage(Vec<u8>),
	SetInterval(f64),
	Play,
	Blind { unit_id: u16, unit_code: u8, command: u8 },
	SetColor { red: u8, green: u8, blue: u8, pixel: i64 },
}

fn field<'a>(form: &'a HashMap<String, Vec<u8>>, name: &str) -> Option<&'a [u8]> {
	form.get(name).map(Vec::as_slice)
}

fn parse<T: std::str::FromStr>(form: &HashMap<String, Vec<u8>>, name: &'static str) -> Result<T> {
	let raw = field(form, name).unwrap_or_default();
	let text = String::from_utf8_lossy(raw);
	text.trim().parse().map_err(|_| Error::InvalidField {
		field: name,
		value: text.into_owned(),
	})
}

impl Command {
	/// Picks the first matching operation, in the order the control page submits them.
	pub fn from_form(form: &HashMap<String, Vec<u8>>) -> Result<Self> {
		let has = |name: &str| form.contains_key(name);

		if let Some(image) = field(form, "imagefile") {
			Ok(Self::LoadImage(image.to_vec()))
		} else if has("interval") {
			Ok(Self::SetInterval(parse(form, "interval")?))
		} else if has("play") {
			Ok(Self::Play)
		} else if has("blind") && has("unit") && has("command") {
			Ok(Self::Blind {
				unit_id: parse(form, "unit")?,
				unit_code: parse(form, "blind")?,
				command: parse(form, "command")?,
			})
		} else if has("red") && has("green") && has("blue") && has("pixel") {
			Ok(Self::SetColor {
				red: parse(form, "red")?,
				green: parse(form, "green")?,
				blue: parse(form, "blue")?,
				pixel: parse(form, "pixel")?,
			})
		} else {
			Err(Error::UnexpectedCommand)
		}
	}
}

/// Everything the control surface can do, shared by all connection threads.
pub struct Controller {
	status: Arc<StatusBroadcaster>,
	strip: StripDriver,
	gateway: RfGateway,
	max_upload_bytes: usize,
}

impl Controller {
	/// Opens both devices. Missing hardware is reported and leaves that part inert.
	pub fn open(config: &Config) -> Self {
		let status = Arc::new(StatusBroadcaster::new());
		let transport = Mpsse::open(config.usb_vendor_id, config.usb_product_id);
		let gateway = RfGateway::open(&config.serial_device, config.gateway_settle, status.clone());

		Self::new(config, transport, gateway, status)
	}

	pub fn new(config: &Config, transport: Mpsse, gateway: RfGateway, status: Arc<StatusBroadcaster>) -> Self {
		let strip = StripDriver::new(
			transport,
			config.strip_height,
			config.channel_order,
			config.column_interval,
			status.clone(),
		);

		let controller = Self {
			status,
			strip,
			gateway,
			max_upload_bytes: config.max_upload_bytes,
		};
		controller.report_absent_devices();
		controller
	}

	fn report_absent_devices(&self) {
		let availability = self.availability();
		info!(?availability, "controller ready");

		if !availability.strip {
			self.status.publish(format!("Error: {}", Error::DeviceAbsent("LED strip bridge")));
		}
		if !availability.gateway {
			self.status.publish(format!("Error: {}", Error::DeviceAbsent("blind gateway")));
		}
	}

	pub fn availability(&self) -> Availability {
		Availability {
			strip: self.strip.is_available(),
			gateway: self.gateway.is_available(),
		}
	}

	pub fn status(&self) -> &Arc<StatusBroadcaster> {
		&self.status
	}

	pub fn strip(&self) -> &StripDriver {
		&self.strip
	}

	pub fn load_image(&self, bytes: &[u8]) -> Result<usize> {
		if bytes.len() > self.max_upload_bytes {
			let e = Error::UploadTooLarge(bytes.len());
			warn!("{e}");
			self.status.publish("Error: File too big");
			return Err(e);
		}
		self.strip.load_image(bytes)
	}

	pub fn set_interval(&self, seconds: f64) -> Result<()> {
		self.strip.set_interval(seconds)
	}

	pub fn play(&self) -> Result<()> {
		self.strip.play()
	}

	pub fn set_color(&self, red: u8, green: u8, blue: u8, pixel_index: i64) -> Result<()> {
		self.strip.set_color(red, green, blue, pixel_index)
	}

	pub fn send_blind_command(&self, unit_id: u16, unit_code: u8, command: u8) -> Result<()> {
		self.gateway.send_command(unit_id, unit_code, command)
	}

	/// Blocks until the status id differs from `last_seen`.
	pub fn get_status(&self, last_seen: u64) -> StatusEvent {
		self.status.wait_for_change(last_seen)
	}

	pub fn get_status_timeout(&self, last_seen: u64, timeout: Duration) -> Option<StatusEvent> {
		self.status.wait_for_change_timeout(last_seen, timeout)
	}

	pub fn execute(&self, command: Command) -> Result<()> {
		match command {
			Command::LoadImage(bytes) => self.load_image(&bytes).map(|_| ()),
			Command::SetInterval(seconds) => self.set_interval(seconds),
			Command::Play => self.play(),
			Command::Blind {
				unit_id,
				unit_code,
				command,
			} => self.send_blind_command(unit_id, unit_code, command),
			Command::SetColor {
				red,
				green,
				blue,
				pixel,
			} => self.set_color(red, green, blue, pixel),
		}
	}

	/// Decodes and runs a submitted form. Every failure is also published as a status.
	pub fn submit_form(&self, form: &HashMap<String, Vec<u8>>) -> Result<()> {
		let command = match Command::from_form(form) {
			Ok(command) => command,
			Err(e) => {
				warn!("rejected form: {e}");
				self.status.publish(format!("Error: {e}"));
				return Err(e);
			}
		};
		self.execute(command)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{RecordingLink, RecordingPort};

	fn form(fields: &[(&str, &str)]) -> HashMap<String, Vec<u8>> {
		fields
			.iter()
			.map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
			.collect()
	}

	fn controller() -> (Controller, RecordingLink, RecordingPort) {
		let link = RecordingLink::new();
		let port = RecordingPort::new();
		let status = Arc::new(StatusBroadcaster::new());
		let config = Config {
			strip_height: 8,
			..Config::default()
		};

		let controller = Controller::new(
			&config,
			Mpsse::with_link(Box::new(link.clone())).unwrap(),
			RfGateway::with_port(Box::new(port.clone()), Duration::ZERO, status.clone()),
			status,
		);
		(controller, link, port)
	}

	#[test]
	fn form_precedence() {
		assert_eq!(
			Command::from_form(&form(&[("interval", "0.5"), ("play", "")])).unwrap(),
			Command::SetInterval(0.5)
		);
		assert_eq!(
			Command::from_form(&form(&[("play", "1"), ("red", "1")])).unwrap(),
			Command::Play
		);
		assert_eq!(
			Command::from_form(&form(&[("blind", "3"), ("unit", "300"), ("command", "2")])).unwrap(),
			Command::Blind {
				unit_id: 300,
				unit_code: 3,
				command: 2
			}
		);
		assert_eq!(
			Command::from_form(&form(&[("red", "255"), ("green", "0"), ("blue", "7"), ("pixel", "-1")]))
				.unwrap(),
			Command::SetColor {
				red: 255,
				green: 0,
				blue: 7,
				pixel: -1
			}
		);
		assert_eq!(
			Command::from_form(&form(&[("imagefile", "raw"), ("interval", "1")])).unwrap(),
			Command::LoadImage(b"raw".to_vec())
		);
	}

	#[test]
	fn form_rejects_incomplete_or_oversized_fields() {
		assert!(matches!(
			Command::from_form(&form(&[("red", "1"), ("green", "2")])),
			Err(Error::UnexpectedCommand)
		));
		assert!(matches!(
			Command::from_form(&form(&[("blind", "3"), ("unit", "70000"), ("command", "2")])),
			Err(Error::InvalidField { field: "unit", .. })
		));
		assert!(matches!(
			Command::from_form(&form(&[("red", "256"), ("green", "0"), ("blue", "0"), ("pixel", "0")])),
			Err(Error::InvalidField { field: "red", .. })
		));
	}

	#[test]
	fn unexpected_form_is_published() {
		let (controller, _link, _port) = controller();

		assert!(controller.submit_form(&form(&[("dance", "1")])).is_err());
		assert_eq!(controller.status().current().text, "Error: Unexpected command");
	}

	#[test]
	fn submit_form_drives_hardware() {
		let (controller, link, port) = controller();
		link.clear();

		controller
			.submit_form(&form(&[("red", "0"), ("green", "0"), ("blue", "255"), ("pixel", "99")]))
			.unwrap();
		controller
			.submit_form(&form(&[("blind", "4"), ("unit", "513"), ("command", "1")]))
			.unwrap();

		let columns = link.columns();
		assert_eq!(columns.len(), 1);
		// blue goes out first on the swapped strip
		assert_eq!(columns[0].1, [255u8, 0, 0].repeat(8));

		assert_eq!(port.frames().last().unwrap(), &[0x0C, 0x1A, 0, 0, 0, 2, 1, 4, 1, 0, 0, 0, 0]);
		assert_eq!(controller.status().current().text, "Info: Blind command (513,4,1)");
	}

	#[test]
	fn availability_answers_during_playback() {
		let (controller, _link, _port) = controller();
		let controller = Arc::new(controller);
		let image = image::RgbImage::from_pixel(20, 8, image::Rgb([1, 2, 3]));
		let mut bytes = std::io::Cursor::new(Vec::new());
		image::DynamicImage::ImageRgb8(image)
			.write_to(&mut bytes, image::ImageFormat::Png)
			.unwrap();
		controller.load_image(bytes.get_ref()).unwrap();
		controller.set_interval(0.05).unwrap();

		let player = {
			let controller = controller.clone();
			std::thread::spawn(move || controller.play().unwrap())
		};
		std::thread::sleep(Duration::from_millis(30));

		let (tx, rx) = std::sync::mpsc::channel();
		{
			let controller = controller.clone();
			std::thread::spawn(move || tx.send(controller.availability()).unwrap());
		}
		assert_eq!(
			rx.recv_timeout(Duration::from_millis(200)),
			Ok(Availability {
				strip: true,
				gateway: true
			})
		);

		player.join().unwrap();
	}

	#[test]
	fn oversized_upload_keeps_previous_image() {
		let (controller, _link, _port) = controller();
		let too_big = vec![0u8; controller.max_upload_bytes + 1];

		assert!(matches!(controller.load_image(&too_big), Err(Error::UploadTooLarge(_))));
		assert_eq!(controller.status().current().text, "Error: File too big");
		assert!(controller.strip().image().is_none());
	}

	#[test]
	fn degraded_mode_is_reported_once() {
		let status = Arc::new(StatusBroadcaster::new());
		let start = status.current_id();
		let controller = Controller::new(
			&Config::default(),
			Mpsse::unavailable(),
			RfGateway::unavailable(status.clone()),
			status,
		);

		assert_eq!(
			controller.availability(),
			Availability {
				strip: false,
				gateway: false
			}
		);
		assert_eq!(controller.status().current_id(), start + 2);
		assert_eq!(controller.status().current().text, "Error: blind gateway not found");

		controller.set_color(1, 1, 1, 0).unwrap();
		assert!(controller.send_blind_command(1, 1, 1).is_err());
		assert!(controller.play().is_err());
	}
}
