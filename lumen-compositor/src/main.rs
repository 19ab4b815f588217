//! Lumen reference compositor.
//!
//! A minimal consumer of `lumen-display`: loads the TOML configuration,
//! brings up one headless output per configured display (or a single
//! default), arranges the layout, creates the seat, and drives frame
//! ticks on a `calloop` event loop while draining server notifications.

mod headless;

use headless::HeadlessBackend;
use lumen_core::config::CompositorConfig;
use lumen_core::error::CoreError;
use lumen_core::logging;
use lumen_display::output::{OutputDescription, OutputMode};
use lumen_display::wire::events::ModeFlag;
use lumen_display::{DisplayServer, OutputId};

use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use std::path::PathBuf;
use std::time::Duration;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

struct Compositor {
    server: DisplayServer,
    outputs: Vec<OutputId>,
}

fn parse_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => config = args.next().map(PathBuf::from),
            "--help" | "-h" => {
                println!("usage: lumen-compositor [--config <path>]");
                std::process::exit(0);
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(1);
            }
        }
    }
    config
}

fn load_config(path: Option<PathBuf>) -> Result<CompositorConfig, CoreError> {
    match path {
        Some(path) => Ok(CompositorConfig::load(&path)?),
        None => {
            let default = PathBuf::from("lumen.toml");
            if default.exists() {
                Ok(CompositorConfig::load(&default)?)
            } else {
                Ok(CompositorConfig::default())
            }
        }
    }
}

fn setup_outputs(server: &mut DisplayServer, config: &CompositorConfig) -> Vec<OutputId> {
    let mut outputs = Vec::new();

    if config.outputs.is_empty() {
        let id = create_headless_output(server, "HEADLESS-1");
        server.layout_add_auto(id);
        outputs.push(id);
        return outputs;
    }

    for output_config in &config.outputs {
        let id = create_headless_output(server, &output_config.name);
        server.output_set_transform(id, output_config.transform);
        server.output_set_scale(id, output_config.scale);
        match output_config.position() {
            Some((x, y)) => server.layout_add(id, x, y),
            None => server.layout_add_auto(id),
        }
        outputs.push(id);
    }
    outputs
}

fn create_headless_output(server: &mut DisplayServer, name: &str) -> OutputId {
    let id = server.create_output(
        OutputDescription {
            name: name.to_string(),
            make: "Lumen".to_string(),
            model: "Headless".to_string(),
            ..Default::default()
        },
        Box::new(HeadlessBackend::default()),
    );
    server.output_mut(id).unwrap().add_mode(OutputMode {
        width: 1920,
        height: 1080,
        refresh: 60000,
        flags: ModeFlag::PREFERRED,
    });
    if !server.output_set_mode(id, 0) {
        tracing::warn!(output = name, "backend refused the initial mode");
    }
    server.output_enable(id, true);
    server.output_create_global(id);
    id
}

fn run() -> Result<(), CoreError> {
    let config = load_config(parse_args())?;
    logging::init_logging(&config.logging)?;

    let mut server = DisplayServer::new();
    let _seat = server.create_seat(config.seat.name.clone());
    let outputs = setup_outputs(&mut server, &config);
    tracing::info!(
        seat = %config.seat.name,
        outputs = outputs.len(),
        "compositor up"
    );

    let mut compositor = Compositor { server, outputs };

    let mut event_loop: EventLoop<'_, Compositor> =
        EventLoop::try_new().map_err(|e| CoreError::generic(e.to_string()))?;

    event_loop
        .handle()
        .insert_source(
            Timer::from_duration(FRAME_INTERVAL),
            |_deadline, _, compositor: &mut Compositor| {
                for id in compositor.outputs.clone() {
                    compositor.server.output_make_current(id);
                    compositor.server.output_swap_buffers(id);
                }
                for notification in compositor.server.drain_notifications() {
                    tracing::debug!(?notification, "server notification");
                }
                TimeoutAction::ToDuration(FRAME_INTERVAL)
            },
        )
        .map_err(|e| CoreError::generic(e.to_string()))?;

    event_loop
        .run(None, &mut compositor, |_| {})
        .map_err(|e| CoreError::generic(e.to_string()))?;
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        logging::init_minimal_logging();
        tracing::error!(%err, "compositor failed");
        std::process::exit(1);
    }
}
