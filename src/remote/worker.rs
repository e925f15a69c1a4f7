// ABOUTME: Blocking request/response serving over arbitrary byte streams
// ABOUTME: Backs worker child processes that talk envelopes on stdio

use std::io::{Read, Write};

use tracing::debug;

use super::error::Result;
use super::UnitService;
use crate::envelope::Envelope;

/// Serve exactly one request envelope from `reader` and write the response
/// to `writer`. Command-level failures become `failed` envelopes; only
/// framing and transport faults surface as errors.
pub fn serve_stream<R, W>(service: &UnitService, reader: &mut R, writer: &mut W) -> Result<()>
where
    R: Read,
    W: Write,
{
    let request = Envelope::read(reader)?;
    debug!(
        workspace = service.workspace().name(),
        "worker request received"
    );
    let response = service.handle(&request);
    response.write_to(writer)?;
    Ok(())
}

/// Entry point for a worker child process: one request on stdin, one
/// response on stdout.
pub fn serve_stdio(service: &UnitService) -> Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve_stream(service, &mut stdin.lock(), &mut stdout.lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Payload;
    use crate::meta::{Meta, MetaValue};
    use crate::remote::{CMD_RUN, KEY_COMMAND, KEY_STATUS, KEY_TASK_META, KEY_TASK_PATH, STATUS_FILLED};
    use crate::runner::SequentialRunner;
    use crate::task::FnTask;
    use crate::workspace::Workspace;
    use serde_json::Value;
    use std::sync::Arc;

    #[test]
    fn test_serves_one_request_over_in_memory_streams() {
        let ws = Workspace::builder("worker")
            .task(FnTask::source("double", |meta| {
                let n = meta.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
                Ok((n * 2).into())
            }))
            .build();
        let service = UnitService::new(Arc::new(ws), Arc::new(SequentialRunner::new()), 1);

        let request = Envelope::new(
            Meta::new()
                .with(KEY_COMMAND, CMD_RUN)
                .with(KEY_TASK_PATH, "double")
                .with(KEY_TASK_META, Meta::new().with("n", 21)),
            Payload::empty(),
        );

        let wire = request.to_bytes().unwrap();
        let mut reader = wire.as_slice();
        let mut response_wire = Vec::new();
        serve_stream(&service, &mut reader, &mut response_wire).unwrap();

        let response = Envelope::from_bytes(&response_wire).unwrap();
        assert_eq!(
            response.meta().get(KEY_STATUS).and_then(MetaValue::as_str),
            Some(STATUS_FILLED)
        );
        let value: Value = serde_json::from_slice(response.payload().as_bytes()).unwrap();
        assert_eq!(value, Value::from(42));
    }

    #[test]
    fn test_garbage_input_is_a_framing_error() {
        let ws = Workspace::builder("worker").build();
        let service = UnitService::new(Arc::new(ws), Arc::new(SequentialRunner::new()), 1);

        let mut reader = &b"not an envelope at all"[..];
        let mut sink = Vec::new();
        assert!(serve_stream(&service, &mut reader, &mut sink).is_err());
    }
}
