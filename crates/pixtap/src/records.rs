//! Singer-style message framing for the `images` stream.
//!
//! The extract command speaks the Singer tap protocol on stdout: one
//! `SCHEMA` message describing the stream, then one `RECORD` message per
//! rendered image. Everything human-facing goes to stderr instead.

use std::io::Write;

use serde::Serialize;

/// Stream name for rendered images.
const STREAM: &str = "images";

/// One rendered image record.
#[derive(Debug, Serialize)]
pub(crate) struct ImageRecord {
    /// Base64-encoded WebP file.
    pub(crate) image_data: String,
    /// App installation id.
    pub(crate) installation_id: String,
    /// When false, show application immediately.
    pub(crate) background: bool,
}

/// Build the SCHEMA message for the `images` stream.
pub(crate) fn schema_message() -> serde_json::Value {
    serde_json::json!({
        "type": "SCHEMA",
        "stream": STREAM,
        "key_properties": [],
        "schema": {
            "type": "object",
            "properties": {
                "image_data": {
                    "type": ["string", "null"],
                    "description": "Base64-encoded WebP file",
                },
                "installation_id": {
                    "type": ["string", "null"],
                    "description": "App installation ID",
                },
                "background": {
                    "type": ["boolean", "null"],
                    "description": "When false, show application immediately",
                },
            },
        },
    })
}

/// Build the RECORD message for one rendered image.
pub(crate) fn record_message(record: &ImageRecord) -> serde_json::Value {
    serde_json::json!({
        "type": "RECORD",
        "stream": STREAM,
        "record": record,
    })
}

/// Write a message as one JSON line.
pub(crate) fn write_message(
    writer: &mut impl Write,
    message: &serde_json::Value,
) -> std::io::Result<()> {
    writeln!(writer, "{message}")
}
