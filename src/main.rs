use anyhow::{Context, Result};
use clap::Parser;
use clockcast::{
    cli::{validate_device, Args},
    config::Settings,
    create_scheduler, create_shared_status,
    event_loop::{EngineMessage, EventLoop},
    handle_device_list,
    ingest::RemoteIngest,
    logging,
    midi::ports,
    router::FanOutRouter,
    sink::{
        BoundedWriter, HeadlessPeripheral, MeshMode, MeshSink, Sink, UdpMeshLink, UsbDeviceSink,
        WiredSerialSink, WirelessSink,
    },
    ui::{map_input_line, run_status_display, InputAction},
    Scheduler, SharedStatus, ThreadScheduler,
};
use crossbeam::channel::{self, Sender};
use dialoguer::{theme::ColorfulTheme, Select};
use midir::MidiInputConnection;
use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const VIRTUAL_PORT_NAME: &str = "clockcast";

/// Everything the sinks need kept alive for the life of the process.
struct SinkSet {
    mesh: Arc<MeshSink>,
    wireless: Arc<WirelessSink>,
    wired: Arc<WiredSerialSink>,
    usb: Arc<UsbDeviceSink>,
    mesh_link: Option<Arc<UdpMeshLink>>,
    _inputs: Vec<MidiInputConnection<()>>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_ports {
        list_available_ports();
        return Ok(());
    }

    let mut settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    args.apply(&mut settings);
    settings.validate()?;

    initialize_logging(&settings.log.level);

    if args.select_ports {
        settings.wired.port = Some(select_wired_port()?);
    }
    if let Some(port) = &settings.wired.port {
        if let Err(error_msg) = validate_device(port, &handle_device_list()) {
            log::warn!("{}", error_msg);
        }
    }

    let scheduler = create_scheduler();
    let status = create_shared_status(settings.tempo_bpm);
    let running = Arc::new(AtomicBool::new(true));

    let sinks = build_sinks(&settings)?;
    let router = Arc::new(
        FanOutRouter::new(vec![
            sinks.mesh.clone() as Arc<dyn Sink>,
            sinks.wireless.clone(),
            sinks.wired.clone(),
            sinks.usb.clone(),
        ])
        .with_slow_send_warning(settings.slow_send_warning()),
    );

    let (message_tx, message_rx) = channel::unbounded();
    let ingest = Arc::new(RemoteIngest::new(
        router.clone(),
        settings.clock_source,
        message_tx.clone(),
    ));
    if let Some(link) = &sinks.mesh_link {
        let ingest = ingest.clone();
        link.start_receiver(move |bytes| ingest.on_frame(bytes))
            .context("starting mesh receiver")?;
    }

    let mut event_loop = EventLoop::new(
        settings.schedule(),
        settings.clock_source,
        router.clone(),
        status.clone(),
        message_rx,
    )
    .with_usb_inbound(sinks.usb.clone());

    let engine_running = running.clone();
    let engine = scheduler
        .spawn("clock-loop", move || event_loop.run(&engine_running))
        .context("starting clock loop")?;

    if !args.no_ui {
        spawn_status_display(&scheduler, status.clone(), router.clone(), running.clone())?;
    }
    spawn_console_input(&scheduler, message_tx)?;

    log::info!("Application running");
    println!("Enter: start | s: stop | c: continue | q: quit");

    if engine.join().is_err() {
        log::error!("Clock loop panicked");
    }
    running.store(false, Ordering::SeqCst);
    if let Some(link) = &sinks.mesh_link {
        link.shutdown();
    }
    log::info!(
        "Shutting down: {} events routed, {} mesh frames received ({} relayed)",
        status.events_routed(),
        ingest.received(),
        ingest.relayed()
    );
    Ok(())
}

fn initialize_logging(level: &str) {
    match logging::init_logger(level) {
        Ok(path) => log::info!("Logging to {}", path.display()),
        Err(e) => {
            logging::init_fallback(level);
            log::warn!("File logging unavailable ({}), logging to stderr", e);
        }
    }
    log::info!("Application starting");
}

fn list_available_ports() {
    println!("MIDI output ports:");
    for port in handle_device_list() {
        println!("  - {}", port);
    }
    println!("MIDI input ports:");
    for port in ports::list_input_ports().unwrap_or_default() {
        println!("  - {}", port);
    }
}

fn select_wired_port() -> Result<String> {
    let devices = handle_device_list();
    anyhow::ensure!(!devices.is_empty(), "no MIDI output ports available");

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Wired MIDI output")
        .items(&devices)
        .default(0)
        .interact()?;
    Ok(devices[selection].clone())
}

/// Brings up every enabled sink. A sink whose hardware is missing stays
/// registered but disconnected, so the router skips it.
fn build_sinks(settings: &Settings) -> Result<SinkSet> {
    let depth = settings.router.queue_depth;
    let timeout = settings.write_timeout();
    let mut inputs = Vec::new();

    let mesh = Arc::new(MeshSink::new(settings.mesh_config()));
    let mut mesh_link = None;
    if settings.mesh.mode == MeshMode::Off {
        log::info!("Mesh disabled");
    } else {
        match UdpMeshLink::bind(settings.mesh.port) {
            Ok(link) => {
                let link = Arc::new(link);
                mesh.initialize(link.clone())?;
                for peer in settings.mesh_peers()? {
                    mesh.add_peer(peer)?;
                }
                mesh_link = Some(link);
            }
            Err(e) => log::warn!("Mesh link unavailable: {}", e),
        }
    }

    let wireless = Arc::new(WirelessSink::new(settings.gatt_config()));
    if settings.wireless.enabled {
        wireless.initialize(Arc::new(HeadlessPeripheral))?;
    }

    let wired = Arc::new(WiredSerialSink::new());
    if settings.wired.enabled {
        let port = settings
            .wired
            .port
            .clone()
            .or_else(|| handle_device_list().into_iter().next());
        match port.map(|p| ports::open_output(&p)) {
            Some(Ok(stream)) => {
                let writer = BoundedWriter::spawn("wired", stream, depth, timeout)?;
                wired.initialize(Box::new(writer));
            }
            Some(Err(e)) => log::warn!("Wired output unavailable: {}", e),
            None => log::info!("No wired MIDI output port found"),
        }
    }

    let usb = Arc::new(UsbDeviceSink::new());
    if settings.usb.enabled {
        let (inbound_tx, inbound_rx) = channel::bounded(depth);
        let opened = match (&settings.usb.port, settings.usb.virtual_port) {
            (Some(port), _) => ports::open_output(port)
                .map(|out| (out, ports::open_input(port, inbound_tx))),
            (None, true) => ports::open_virtual_output(VIRTUAL_PORT_NAME)
                .map(|out| (out, ports::open_virtual_input(VIRTUAL_PORT_NAME, inbound_tx))),
            (None, false) => Err(ports::PortError::NotFound("no USB port configured".into())),
        };
        match opened {
            Ok((stream, input)) => {
                let writer = BoundedWriter::spawn("usb", stream, depth, timeout)?;
                match input {
                    Ok(connection) => inputs.push(connection),
                    Err(e) => log::warn!("USB inbound unavailable: {}", e),
                }
                usb.initialize(Box::new(writer), Some(inbound_rx));
            }
            Err(e) => log::warn!("USB MIDI unavailable: {}", e),
        }
    }

    Ok(SinkSet {
        mesh,
        wireless,
        wired,
        usb,
        mesh_link,
        _inputs: inputs,
    })
}

fn spawn_status_display(
    scheduler: &ThreadScheduler,
    status: SharedStatus,
    router: Arc<FanOutRouter>,
    running: Arc<AtomicBool>,
) -> Result<()> {
    scheduler
        .spawn("status-display", move || {
            run_status_display(status, router, running)
        })
        .context("starting status display")?;
    Ok(())
}

/// Stdin stays open until EOF; a closed stdin (daemon use) only stops
/// reading, it never stops the clock.
fn spawn_console_input(scheduler: &ThreadScheduler, tx: Sender<EngineMessage>) -> Result<()> {
    scheduler
        .spawn("console-input", move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let message = match map_input_line(&line) {
                    Some(InputAction::Transport(command)) => EngineMessage::Transport(command),
                    Some(InputAction::Quit) => EngineMessage::Shutdown,
                    None => {
                        log::debug!("Ignoring console input '{}'", line);
                        continue;
                    }
                };
                if tx.send(message).is_err() || message == EngineMessage::Shutdown {
                    break;
                }
            }
            log::debug!("Console input closed");
        })
        .context("starting console input")?;
    Ok(())
}
