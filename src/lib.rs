// Entity model and frames
pub mod entity;

// Delta encoding between successive frames
pub mod delta;

// Live and recorded frame sources
pub mod source;

// Simulation state machine and ticking
pub mod simulation;

// Per-connection streaming sessions
pub mod session;

// Scenario registry
pub mod scenario;

// Configuration
pub mod config;

// HTTP and WebSocket APIs
pub mod api;
