//! Process lifecycle.
//!
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build subsystems → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal or fatal panic → Stop accepting → Drain requests → Close probes → Exit
//! ```

pub mod panic;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use panic::PanicResponder;
pub use shutdown::Shutdown;
pub use startup::StartupError;
