//! # Port Adapters
//!
//! tokio-backed implementations of the lifecycle core's driven ports.
//!
//! | Port | Adapter |
//! |------|---------|
//! | `PeerRegistry` | [`UartRegistry`] |
//! | `ResendTimer` | [`TokioResendTimer`] |
//! | `AdminChannel` | [`UnixAdminChannel`] |
//! | `ProcessRegistry` | [`ProcFsRegistry`] |
//! | `Pacer` | [`TokioPacer`] |

pub mod admin_socket;
pub mod pacer;
pub mod process;
pub mod resend_timer;
pub mod uart;

pub use admin_socket::UnixAdminChannel;
pub use pacer::TokioPacer;
pub use process::ProcFsRegistry;
pub use resend_timer::TokioResendTimer;
pub use uart::{JoinPolicy, UartRegistry};
