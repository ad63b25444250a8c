//! Browser engine boundary
//!
//! The browser engine, windowing system, and compositor are external
//! collaborators. This module specifies them as traits; the orchestration
//! core only ever talks to these interfaces. A scripted in-process stub
//! backend lives in [`stub`] and backs the test suite and headless use.

pub mod interface;
pub mod stub;

pub use interface::{
    BrowserControl, CaptureSession, Completion, Compositor, CompositionController,
    ControlEventHandler, ControlSettings, Controller, Cookie, Environment, EnvironmentOptions,
    FrameDisposition, FramePayload, FrameSink, HostWindow, NavigationDecision, PointerInput,
    PointerInputKind, VisualHandle, WebEngine, WindowId, WindowMessage, WindowOptions,
};
pub use stub::{StubEngine, StubHandle};
