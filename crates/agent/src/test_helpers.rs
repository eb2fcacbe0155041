//! Shared test helpers.

use std::sync::Mutex;

use versa_core::error::GeneratorError;
use versa_core::generator::{
    GenerationRequest, GenerationResponse, Generator, StreamChunk, Usage,
};

/// A mock generator that returns a sequence of scripted responses.
///
/// Each call returns the next response in the queue and records the prompt
/// it was given. Panics if more calls are made than responses provided.
pub struct ScriptedGenerator {
    responses: Vec<String>,
    fail: bool,
    call_count: Mutex<usize>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            fail: false,
            call_count: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A generator whose every call fails with an API error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::<String>::new())
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        let mut count = self.call_count.lock().unwrap();
        self.prompts.lock().unwrap().push(request.prompt.clone());
        *count += 1;

        if self.fail {
            return Err(GeneratorError::ApiError {
                status_code: 500,
                message: "scripted failure".into(),
            });
        }

        match self.responses.get(*count - 1) {
            Some(text) => Ok(text.clone()),
            None => panic!(
                "ScriptedGenerator: no more responses (call #{}, have {})",
                *count,
                self.responses.len()
            ),
        }
    }
}

#[async_trait::async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GeneratorError> {
        Ok(GenerationResponse {
            text: self.next(&request)?,
            model: "mock-model".into(),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        })
    }

    /// Streams the scripted response one word at a time.
    async fn stream(
        &self,
        request: GenerationRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<StreamChunk, GeneratorError>>, GeneratorError>
    {
        let text = self.next(&request)?;
        let pieces: Vec<String> = text.split_inclusive(' ').map(String::from).collect();

        let (tx, rx) = tokio::sync::mpsc::channel(pieces.len() + 1);
        for piece in pieces {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(piece),
                    done: false,
                    usage: None,
                }))
                .await;
        }
        let _ = tx
            .send(Ok(StreamChunk {
                content: None,
                done: true,
                usage: None,
            }))
            .await;
        Ok(rx)
    }
}
