use super::progress::{create_bar_progress, create_beat_progress, create_transport_spinner};
use crate::router::FanOutRouter;
use crate::sink::SinkId;
use crate::state::EngineStatus;
use indicatif::{MultiProgress, ProgressDrawTarget};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

pub fn render_status_line(status: &EngineStatus, connectivity: &[(SinkId, bool)]) -> String {
    let transport = if status.is_running() {
        "RUNNING"
    } else {
        "STOPPED"
    };
    let sinks = connectivity
        .iter()
        .map(|(id, up)| format!("{}:{}", id, if *up { "up" } else { "down" }))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{} | {} BPM | {} | routed {}",
        transport,
        status.tempo(),
        sinks,
        status.events_routed()
    )
}

/// Redraws the status bars every 100 ms until `running` is cleared.
pub fn run_status_display(
    status: Arc<EngineStatus>,
    router: Arc<FanOutRouter>,
    running: Arc<AtomicBool>,
) {
    let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
    let tick_pb = multi_progress.add(create_beat_progress());
    let beat_pb = multi_progress.add(create_bar_progress());
    let transport_pb = multi_progress.add(create_transport_spinner());

    while running.load(Ordering::SeqCst) {
        tick_pb.set_position(u64::from(status.tick_in_beat()));
        beat_pb.set_position(u64::from(status.beat()));
        beat_pb.set_message(format!("bar {}", status.bar()));
        transport_pb.set_message(render_status_line(&status, &router.connectivity()));
        transport_pb.tick();

        thread::sleep(REFRESH_INTERVAL);
    }

    tick_pb.finish_and_clear();
    beat_pb.finish_and_clear();
    transport_pb.finish_and_clear();
    debug!("Status display stopped");
}
