use crate::transport::TransportCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Transport(TransportCommand),
    Quit,
}

/// A bare Enter (or a space) means start, like the play key on a sequencer.
pub fn map_input_line(line: &str) -> Option<InputAction> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty() {
        return Some(InputAction::Transport(TransportCommand::Start));
    }

    match trimmed.trim().to_ascii_lowercase().as_str() {
        "start" | "play" => Some(InputAction::Transport(TransportCommand::Start)),
        "s" | "stop" => Some(InputAction::Transport(TransportCommand::Stop)),
        "c" | "continue" => Some(InputAction::Transport(TransportCommand::Continue)),
        "q" | "quit" | "exit" => Some(InputAction::Quit),
        _ => None,
    }
}
