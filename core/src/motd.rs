//! MOTD (Message of the Day) loading

use tracing::{info, warn};

/// MOTD lines loaded once at startup.
#[derive(Debug, Default)]
pub struct Motd {
    lines: Vec<String>,
}

impl Motd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the MOTD from a file. A missing file is not an error, the MOTD
    /// simply stays empty and clients get ERR_NOMOTD.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
                info!("loaded MOTD from {} ({} lines)", path, lines.len());
                Self { lines }
            }
            Err(e) => {
                warn!("MOTD file {} not readable: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}
