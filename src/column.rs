use bitblt_blade_shared::BYTES_PER_LED;
use image::{imageops::FilterType, DynamicImage};

use crate::{Error, Result};

/// Which source channel (0 = red, 1 = green, 2 = blue) goes out in each byte slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOrder(pub [usize; 3]);

impl ChannelOrder {
	pub const RGB: Self = Self([0, 1, 2]);
	pub const BGR: Self = Self([2, 1, 0]);

	pub fn apply(&self, rgb: [u8; 3]) -> Pixel {
		let [a, b, c] = self.0;
		Pixel([rgb[a], rgb[b], rgb[c]])
	}
}

impl Default for ChannelOrder {
	fn default() -> Self {
		Self::RGB
	}
}

/// Three bytes already in device channel order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pixel(pub [u8; 3]);

impl Pixel {
	pub const BLACK: Self = Self([0; 3]);
}

/// One vertical slice of the strip, bottom pixel first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column(Vec<Pixel>);

impl Column {
	pub fn black(height: usize) -> Self {
		Self::filled(height, Pixel::BLACK)
	}

	pub fn filled(height: usize, pixel: Pixel) -> Self {
		Self(vec![pixel; height])
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn pixels(&self) -> &[Pixel] {
		&self.0
	}

	/// Returns `false` if `index` is past the top of the column.
	pub fn set(&mut self, index: usize, pixel: Pixel) -> bool {
		match self.0.get_mut(index) {
			Some(slot) => {
				*slot = pixel;
				true
			}
			None => false,
		}
	}

	pub fn fill(&mut self, pixel: Pixel) {
		self.0.fill(pixel);
	}

	/// The bytes clocked out for this column.
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut bytes = Vec::with_capacity(self.0.len() * BYTES_PER_LED);
		for pixel in &self.0 {
			bytes.extend_from_slice(&pixel.0);
		}
		bytes
	}
}

/// Columns left to right, all of the same height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
	columns: Vec<Column>,
}

impl Image {
	pub fn columns(&self) -> &[Column] {
		&self.columns
	}

	pub fn width(&self) -> usize {
		self.columns.len()
	}
}

/// Decodes an encoded bitmap and resamples it to `height` rows.
///
/// The scale factor is the floor of `original height / height`, and the width is divided
/// by that same integer factor, so the aspect ratio is only kept approximately.
pub fn decode(bytes: &[u8], height: usize, order: ChannelOrder) -> Result<Image> {
	let image = image::load_from_memory(bytes)?;
	from_image(&image, height, order)
}

pub fn from_image(image: &DynamicImage, height: usize, order: ChannelOrder) -> Result<Image> {
	let target_height = u32::try_from(height).unwrap_or(u32::MAX);
	let scale = if target_height == 0 { 0 } else { image.height() / target_height };
	let target_width = if scale == 0 { 0 } else { image.width() / scale };

	if target_width == 0 || target_height == 0 {
		return Err(Error::DegenerateImage {
			width: target_width,
			height: target_height,
		});
	}

	let rgb = image
		.resize_exact(target_width, target_height, FilterType::Nearest)
		.to_rgb8();

	let columns = (0..target_width)
		.map(|x| {
			// the strip's data input is at the bottom, so the bottom row goes out first
			let pixels = (0..target_height)
				.rev()
				.map(|y| order.apply(rgb.get_pixel(x, y).0))
				.collect();
			Column(pixels)
		})
		.collect();

	Ok(Image { columns })
}
