use crate::render::notify::ScanRequest;

#[derive(Debug, Clone)]
pub enum AppEvent {
    StreamDelta { stream: u64, text: String },
    StreamEnd { stream: u64 },
    Scan(ScanRequest),
    FlushTemplates { ticket: u64 },
    Diagnostic(String),
}
