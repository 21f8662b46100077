//! Small injected collaborators the core depends on as interfaces rather
//! than concrete implementations, so that deterministic substitutes can be
//! used in tests.

pub mod clock;
pub mod idgen;
pub mod notifications;
pub mod password;

pub use clock::{Clock, SystemClock};
pub use idgen::{UniqueIdGenerator, UuidGenerator};
pub use notifications::{LogNotifications, Notifications};
pub use password::{Argon2PasswordUtil, PasswordUtil};
