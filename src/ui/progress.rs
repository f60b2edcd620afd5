use crate::midi::{BEATS_PER_BAR, TICKS_PER_BEAT};
use indicatif::{ProgressBar, ProgressStyle};

pub fn create_beat_progress() -> ProgressBar {
    let pb = ProgressBar::new(u64::from(TICKS_PER_BEAT));
    let style = ProgressStyle::default_bar()
        .template("{prefix:.bold} [{bar:40.cyan}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("⣀⣤⣦⣶⣷⣿ ");
    pb.set_style(style);
    pb.set_prefix("Tick");
    pb
}

pub fn create_bar_progress() -> ProgressBar {
    let pb = ProgressBar::new(u64::from(BEATS_PER_BAR));
    let style = ProgressStyle::default_bar()
        .template("{prefix:.bold} [{bar:20.white/black}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▊ ");
    pb.set_style(style);
    pb.set_prefix("Beat");
    pb
}

pub fn create_transport_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{prefix:.bold.dim} {spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_prefix("Transport");
    pb
}
