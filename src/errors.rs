// Error types for pitwall

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum PitwallError {
    // Requests referencing data that is not in the session
    #[snafu(display("No lap {lap_number} found for driver {driver}"))]
    LapNotFound { driver: String, lap_number: u32 },
    #[snafu(display("No laps found for driver {driver}"))]
    DriverNotFound { driver: String },
    #[snafu(display("Invalid analysis request: {reason}"))]
    InvalidRequest { reason: String },

    // Errors while loading a session from a telemetry source
    #[snafu(display("Error reading session file"))]
    SourceIOError { source: io::Error },
    #[snafu(display("Session file does not contain a session record"))]
    MissingSessionInfo,

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // Errors for the result writer
    #[snafu(display("Error writing analysis result"))]
    WriterError { source: io::Error },
    #[snafu(display("Error serializing analysis result"))]
    ResultSerializeError { source: serde_json::Error },
}

impl PitwallError {
    /// Whether the error means the request referenced a driver or lap that
    /// does not exist in the session.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PitwallError::LapNotFound { .. } | PitwallError::DriverNotFound { .. }
        )
    }
}
