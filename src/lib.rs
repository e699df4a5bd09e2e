// Library interface for pitwall
// The binary and the integration tests both go through these modules

pub mod analysis;
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use analysis::{
    AnalysisConfig, AnalysisFacade, AnalysisRequest, AnalysisResult, TraceAnalyzer,
};
pub use config::AppConfig;
pub use errors::PitwallError;
pub use telemetry::{
    LapRecord, SessionData, SessionInfo, TelemetrySource, TelemetryTrace, load_session_jsonl,
};
