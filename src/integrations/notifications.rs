use log::info;

/// Out-of-band notices emitted for operator visibility (e.g. a user being
/// granted a new role, or an election being finalized). Injected so the core
/// never depends on a specific delivery channel.
pub trait Notifications: Send + Sync {
    fn emit_line(&self, line: &str);
}

/// Logs notices at `info` level. The only implementation this crate ships;
/// a production deployment wanting email/SMS/webhook delivery would supply
/// its own [`Notifications`] and still go through this trait.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifications;

impl Notifications for LogNotifications {
    fn emit_line(&self, line: &str) {
        info!(target: "notifications", "{line}");
    }
}

#[cfg(test)]
pub struct RecordingNotifications(pub std::sync::Mutex<Vec<String>>);

#[cfg(test)]
impl Default for RecordingNotifications {
    fn default() -> Self {
        Self(std::sync::Mutex::new(Vec::new()))
    }
}

#[cfg(test)]
impl Notifications for RecordingNotifications {
    fn emit_line(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_string());
    }
}
