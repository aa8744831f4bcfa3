use std::{sync::Arc, time::Duration};

use bitblt_blade::{tokio::wait_for_change_timeout, Config, Controller};
use bitblt_blade_shared::CLIENT_INITIAL_STATUS_ID;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

	let controller = Arc::new(tokio::task::spawn_blocking(|| Controller::open(&Config::default())).await?);

	let status = controller.status().clone();
	let poller = tokio::spawn(async move {
		let mut seen = CLIENT_INITIAL_STATUS_ID;
		while let Some(event) = wait_for_change_timeout(status.clone(), seen, Duration::from_secs(5)).await? {
			info!("Status = {}", event.to_json()?);
			seen = event.id;
		}
		info!("no status change for 5 s");
		Ok::<_, bitblt_blade::Error>(())
	});

	for pixel in 0..8 {
		let controller = controller.clone();
		tokio::task::spawn_blocking(move || controller.set_color(0, 64, 0, pixel)).await??;
		tokio::time::sleep(Duration::from_millis(250)).await;
	}
	let blinds = controller.clone();
	tokio::task::spawn_blocking(move || blinds.send_blind_command(0x0001, 1, 0)).await?.ok();

	poller.await??;

	Ok(())
}
