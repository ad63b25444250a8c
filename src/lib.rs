//! HostView - Embeddable Out-of-Process Browser View Orchestration
//!
//! This crate embeds a browser engine control inside a host application's
//! rendering surface as an opaque web view instance the host can navigate,
//! script, and composite into its own frame.
//!
//! # Features
//!
//! - **Instance Orchestration**: one dedicated execution thread per view,
//!   owning the engine's asynchronous lifecycle end to end
//! - **Navigation Policy**: allow/deny/hook pattern interception plus a
//!   private in-page call scheme
//! - **Offscreen Capture**: snapshot and continuous GPU-capture pipelines
//!   into a double-buffered RGBA frame store
//! - **Input Forwarding**: compositor-routed and window-routed delivery
//!
//! # Architecture
//!
//! ```text
//! Host ──▶ WebView ──▶ Command Queue ──▶ Execution Thread ──▶ Engine
//!            │                               │
//!            ▼                               ▼
//!      ┌───────────┐                 ┌───────────────┐
//!      │  Outbox   │◀────────────────│ Init Machine   │
//!      └─────┬─────┘                 │ Policy Engine  │
//!            │                       │ Capture Paths  │
//!            ▼                       └───────┬───────┘
//!      Tagged events                         ▼
//!      (polled)                      Double-buffered frames
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hostview::engine::StubEngine;
//! use hostview::{InstanceConfig, WebView};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (engine, _handle) = StubEngine::new();
//!     let config = InstanceConfig::builder()
//!         .host_object("BrowserPanel")
//!         .size(1280, 720)
//!         .build();
//!
//!     let view = WebView::create(config, engine)?;
//!     view.navigate("https://example.com")?;
//!
//!     while let Some(event) = view.poll_message() {
//!         println!("event: {}", event);
//!     }
//!
//!     view.destroy();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod capture;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod host;
pub mod input;
pub mod instance;
pub mod outbox;
pub mod policy;

mod registry;

// Re-exports for convenience
pub use capture::CaptureMode;
pub use command::Command;
pub use config::InstanceConfig;
pub use error::{Error, Result};
pub use host::InstanceHandle;
pub use input::{KeyEvent, KeyPhase, PointerEvent, PointerPhase};
pub use instance::WebView;
pub use outbox::EventTag;
pub use policy::{NavigationPolicy, CALL_SCHEME};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
