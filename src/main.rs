use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tracing::{Level, info, warn};

use dualsense_triggers::config::{Config, DEFAULT_CONFIG_FILE};
use dualsense_triggers::dualsense::hid::HidapiBackend;
use dualsense_triggers::dualsense::{DeviceSession, find_first_controller};
use dualsense_triggers::settings::{ControllerProfile, resolve_profile};
use dualsense_triggers::{Error, InputPoller, diagnostics};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
    smol::block_on(run())
}

async fn run() -> anyhow::Result<()> {
    let config = Config::load_or_default(DEFAULT_CONFIG_FILE)
        .with_context(|| format!("loading {DEFAULT_CONFIG_FILE}"))?;
    let backend = Arc::new(HidapiBackend::new().context("initialising hidapi")?);

    let identity = match find_first_controller(backend.as_ref()).await {
        Ok(identity) => identity,
        Err(Error::DeviceNotFound) => {
            warn!("no DualSense found");
            let report = diagnostics::report(backend.as_ref()).await?;
            println!("{report}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        serial = identity.serial_number(),
        connection = %identity.connection_type(),
        "using controller"
    );

    // no persisted profiles yet, every controller starts from the defaults
    let profiles: HashMap<String, ControllerProfile> = HashMap::new();
    let profile = resolve_profile(&profiles, identity.serial_number(), config.defaults);

    let session = Arc::new(DeviceSession::with_config(backend, identity, config.session));
    if config.auto_apply {
        session
            .apply_effects(&profile.trigger)
            .await
            .context("applying trigger effects")?;
    }

    let mut poller = InputPoller::with_config(session.clone(), config.poller);
    let deadzone = profile.deadzone;
    poller.on_change(move |state| {
        let left = deadzone.apply(state.left_stick);
        let right = deadzone.apply(state.right_stick);
        info!(
            lx = left.x,
            ly = left.y,
            rx = right.x,
            ry = right.y,
            l2 = state.triggers.left,
            r2 = state.triggers.right,
            "input"
        );
    });
    poller.start().await?;

    println!("Polling, press Enter to quit");
    smol::unblock(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)
    })
    .await?;

    poller.stop().await;
    Ok(())
}
