//! Scriptable [`ProcessRunner`] for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ProcessError, ProcessOutput, ProcessRequest, ProcessRunner};

type Handler = dyn Fn(&ProcessRequest) -> Result<ProcessOutput, ProcessError> + Send + Sync;

/// Test double that answers every request through a scripted handler and
/// records the requests it receives.
pub struct MockRunner {
    handler: Box<Handler>,
    calls: Mutex<Vec<ProcessRequest>>,
}

impl MockRunner {
    /// Answer every request by calling `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ProcessRequest) -> Result<ProcessOutput, ProcessError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with a copy of `output`.
    #[must_use]
    pub fn with_output(output: ProcessOutput) -> Self {
        Self::new(move |_| Ok(output.clone()))
    }

    /// Answer requests with the given outputs in order, repeating the last
    /// one once the script runs out.
    #[must_use]
    pub fn with_outputs(outputs: Vec<ProcessOutput>) -> Self {
        assert!(!outputs.is_empty(), "script must contain at least one output");
        let next = Mutex::new(0_usize);
        Self::new(move |_| {
            let mut index = next.lock().expect("script index lock poisoned");
            let output = outputs[(*index).min(outputs.len() - 1)].clone();
            *index += 1;
            Ok(output)
        })
    }

    /// Requests received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProcessRequest> {
        self.calls.lock().expect("call log lock poisoned").clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("call log lock poisoned").len()
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, ProcessError> {
        let response = (self.handler)(&request);
        self.calls
            .lock()
            .expect("call log lock poisoned")
            .push(request);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let runner = MockRunner::with_output(ProcessOutput {
            code: Some(0),
            stdout: b"ok".to_vec(),
            stderr: Vec::new(),
        });

        let output = runner
            .run(ProcessRequest::new("pixlet").arg("render"))
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(runner.call_count(), 1);
        assert_eq!(runner.calls()[0].args, vec!["render"]);
    }

    #[tokio::test]
    async fn test_mock_script_repeats_last_output() {
        let runner = MockRunner::with_outputs(vec![
            ProcessOutput {
                code: Some(1),
                stderr: b"boom".to_vec(),
                ..ProcessOutput::default()
            },
            ProcessOutput {
                code: Some(0),
                ..ProcessOutput::default()
            },
        ]);

        assert!(!runner.run(ProcessRequest::new("x")).await.unwrap().success());
        assert!(runner.run(ProcessRequest::new("x")).await.unwrap().success());
        assert!(runner.run(ProcessRequest::new("x")).await.unwrap().success());
    }
}
