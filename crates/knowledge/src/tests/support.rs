//! Shared fakes for scenario tests.

use async_trait::async_trait;
use grounded_core::AppResult;
use grounded_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::sync::{Arc, Mutex};

pub const RUST_DOC: &str = "Rust enforces memory safety through ownership. Every value in Rust has a single owner variable. \
When the owner goes out of scope the value is dropped and its memory is freed. \
Borrowing lets code reference a value without taking ownership of it. \
The borrow checker verifies that references never outlive the data they point to. \
Mutable borrowing is exclusive, so two mutable references to the same value cannot coexist.";

pub const BREAD_DOC: &str = "Sourdough bread rises with a wild yeast starter. \
Bakers feed the starter flour and water every day. \
A long cold fermentation gives the loaf a sour flavour and an open crumb. \
The dough is baked in a hot covered pot to trap steam.";

/// Corpus text with both documents under their own source headers.
pub fn corpus() -> String {
    format!(
        "### Source: rust-book\n{}\n\n### Source: bread-notes\n{}\n",
        RUST_DOC, BREAD_DOC
    )
}

/// Answers every prompt with a fixed sentence and keeps the prompts.
#[derive(Default)]
pub struct EchoLlm {
    pub prompts: Mutex<Vec<String>>,
}

impl EchoLlm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl LlmClient for EchoLlm {
    fn provider_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(LlmResponse {
            content: "Ownership gives every value one owner [rust-book].".to_string(),
            model: request.model.clone(),
            usage: LlmUsage::default(),
            done: true,
        })
    }
}
