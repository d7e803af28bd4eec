use core::fmt;

use spin::Mutex;

use crate::error::KernelError;

/// Kernel initialization status tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed(KernelError),
}

/// Kernel component status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub status: InitStatus,
}

impl ComponentStatus {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            status: InitStatus::NotStarted,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, InitStatus::Completed)
    }
}

pub const MAX_COMPONENTS: usize = 8;

/// Fixed-capacity list of boot components in registration order.
#[derive(Debug, Clone, Copy)]
pub struct StatusBoard {
    components: [ComponentStatus; MAX_COMPONENTS],
    len: usize,
}

impl StatusBoard {
    pub const fn new() -> Self {
        Self {
            components: [ComponentStatus::new(""); MAX_COMPONENTS],
            len: 0,
        }
    }

    /// Returns false when the board is full.
    pub fn register(&mut self, name: &'static str) -> bool {
        if self.len == MAX_COMPONENTS {
            return false;
        }
        self.components[self.len] = ComponentStatus::new(name);
        self.len += 1;
        true
    }

    pub fn update(&mut self, name: &str, status: InitStatus) {
        if let Some(comp) = self.components[..self.len].iter_mut().find(|c| c.name == name) {
            comp.status = status;
        }
    }

    pub fn get(&self, name: &str) -> Option<InitStatus> {
        self.iter().find(|c| c.name == name).map(|c| c.status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentStatus> {
        self.components[..self.len].iter()
    }

    pub fn all_ready(&self) -> bool {
        self.len > 0 && self.iter().all(ComponentStatus::is_complete)
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

static INIT_STATUS: Mutex<StatusBoard> = Mutex::new(StatusBoard::new());

/// Snapshot of the board the last boot published.
pub fn get_all_statuses() -> StatusBoard {
    *INIT_STATUS.lock()
}

pub(crate) fn publish(board: &StatusBoard) {
    *INIT_STATUS.lock() = *board;
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::NotStarted => write!(f, "Not Started"),
            InitStatus::InProgress => write!(f, "In Progress"),
            InitStatus::Completed => write!(f, "Completed"),
            InitStatus::Failed(err) => write!(f, "Failed: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_tracks_components_in_order() {
        let mut board = StatusBoard::new();
        assert!(!board.all_ready());
        board.register("Heap");
        board.register("Timer");
        board.update("Heap", InitStatus::Completed);
        assert!(!board.all_ready());
        board.update("Timer", InitStatus::Completed);
        assert!(board.all_ready());

        let names: Vec<_> = board.iter().map(|c| c.name).collect();
        assert_eq!(names, ["Heap", "Timer"]);
    }

    #[test]
    fn board_is_bounded() {
        let mut board = StatusBoard::new();
        for _ in 0..MAX_COMPONENTS {
            assert!(board.register("x"));
        }
        assert!(!board.register("overflow"));
    }

    #[test]
    fn published_board_is_readable() {
        let mut board = StatusBoard::new();
        board.register("Heap");
        board.update("Heap", InitStatus::Failed(KernelError::OutOfMemory));
        publish(&board);

        let seen = get_all_statuses();
        assert_eq!(seen.get("Heap"), Some(InitStatus::Failed(KernelError::OutOfMemory)));
        assert_eq!(seen.iter().count(), 1);
        assert!(!seen.all_ready());
    }

    #[test]
    fn status_text() {
        assert_eq!(InitStatus::InProgress.to_string(), "In Progress");
        assert_eq!(
            InitStatus::Failed(KernelError::OutOfMemory).to_string(),
            "Failed: out of memory"
        );
    }
}
