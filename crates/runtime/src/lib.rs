//! flowdev runtime - dev server lifecycle and request forwarding
//!
//! During development the front-end bundle is served by an external Node.js
//! dev server. This crate owns that server for the lifetime of the
//! application:
//!
//! - **Driver**: locating Node.js and validating the project
//! - **Process**: launching the server behind a [`DevServerLauncher`]
//! - **Readiness**: watching output (or probing) until the server compiled
//! - **Registry**: the single-server slot with start, stop and restart reuse
//! - **Proxy**: forwarding asset requests to `localhost:<port>`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  DevServerRegistry  │  start / stop / detach / forward
//! └──────────┬──────────┘
//!            │ owns
//! ┌──────────▼──────────┐     ┌───────────┐
//! │   DevServerHandle   │────▶│ port file │  restart reuse
//! │  ┌───────────────┐  │     └───────────┘
//! │  │ process       │  │  DevServerLauncher
//! │  └───────────────┘  │
//! │  ┌───────────────┐  │
//! │  │ readiness     │  │  output patterns or probe
//! │  └───────────────┘  │
//! └─────────────────────┘
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod port;
pub mod process;
pub mod proxy;
pub mod readiness;
pub mod registry;

pub use config::DevServerConfig;
pub use driver::{get_node_executable, validate_project};
pub use error::{Error, Result};
pub use process::{
	ChildProcess, CommandLauncher, DevServerLauncher, DevServerProcess, KillFuture, LaunchRequest,
	NodeLauncher, OutputStream,
};
pub use proxy::{ProxyRequest, ProxyResponse};
pub use readiness::{Readiness, ReadySignal};
pub use registry::{DevServerHandle, DevServerRegistry};
