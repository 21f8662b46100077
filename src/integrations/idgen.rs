use uuid::Uuid;

/// Generates opaque unique identifiers, e.g. for ballot confirmations.
/// Injected so tests can substitute a deterministic implementation.
pub trait UniqueIdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl UniqueIdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
pub struct SequentialIdGenerator(pub std::sync::atomic::AtomicU64);

#[cfg(test)]
impl UniqueIdGenerator for SequentialIdGenerator {
    fn generate(&self) -> String {
        let next = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        format!("test-confirmation-{next}")
    }
}
