use std::{env, fs};

use bitblt_blade::{Config, Controller};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env().add_directive("bitblt_blade=debug".parse()?))
		.init();

	let controller = Controller::open(&Config::default());
	info!(availability = ?controller.availability(), "opened devices");

	// light the bottom pixel white, then the whole strip dim blue
	controller.set_color(255, 255, 255, 0)?;
	controller.set_color(0, 0, 32, -1)?;

	let Some(path) = env::args().nth(1) else {
		info!("pass an image path to play it");
		return Ok(());
	};

	let bytes = fs::read(&path)?;
	controller.load_image(&bytes)?;
	controller.set_interval(0.02)?;
	controller.play()?;

	info!(status = %controller.status().current().text, "done");

	Ok(())
}
