use tokio::sync::mpsc;

/// Progress note emitted by a multi-step tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressNote {
    pub tool: String,
    pub message: String,
}

/// Per-invocation context handed to executors.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    caller: Option<String>,
    progress: Option<mpsc::UnboundedSender<ProgressNote>>,
}

impl ToolContext {
    pub fn new(caller: Option<String>) -> Self {
        Self { caller, progress: None }
    }

    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<ProgressNote>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Identity of the user the run acts for, forwarded as a header.
    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    pub fn progress(&self, tool: &str, message: impl Into<String>) {
        if let Some(tx) = &self.progress {
            // Receiver gone means nobody is listening; nothing to do.
            let _ = tx.send(ProgressNote {
                tool: tool.to_string(),
                message: message.into(),
            });
        }
    }
}
