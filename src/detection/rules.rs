//! Detection thresholds and marker strings

/// Confidence above this = critical
pub const CRITICAL_CONFIDENCE: f64 = 95.0;

/// Confidence above this = high
pub const HIGH_CONFIDENCE: f64 = 85.0;

/// Confidence above this = medium, anything lower is low
pub const MEDIUM_CONFIDENCE: f64 = 75.0;

/// Simulated confidence range (percent)
pub const MIN_CONFIDENCE: f64 = 70.0;
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Simulated inference latency range (ms)
pub const MIN_ANALYSIS_MS: i32 = 50;
pub const MAX_ANALYSIS_MS: i32 = 250;

pub const MODEL_NAME: &str = "ThreatDetectionCNN";
pub const MODEL_VERSION: &str = "1.0.0";
pub const SCANNER_VERSION: &str = "1.0.0";

/// Byte strings commonly found in droppers, loaders and offensive tooling.
/// Matched case-insensitively.
pub const SUSPICIOUS_MARKERS: &[&str] = &[
    // PowerShell abuse
    "invoke-expression",
    "iex(",
    "frombase64string",
    "downloadstring",
    "net.webclient",
    "-encodedcommand",
    // Credential theft
    "mimikatz",
    "sekurlsa",
    "lsadump",
    // Injection APIs
    "virtualallocex",
    "writeprocessmemory",
    "createremotethread",
    // Persistence
    "currentversion\\run",
    "schtasks",
    // C2 frameworks
    "meterpreter",
    "cobalt",
];
