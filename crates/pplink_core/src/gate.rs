//! Confirmation gates for destructive steps.

use std::io::{BufRead, Write};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// What the operator is asked to approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub step: String,
    pub description: String,
    /// Resources the step will touch, one per line in the prompt.
    pub resources: Vec<String>,
}

impl ConfirmationRequest {
    pub fn new(step: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            description: description.into(),
            resources: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }
}

/// Decides whether a destructive step may proceed.
pub trait ConfirmationGate: Send + Sync {
    /// `Ok(true)` to proceed, `Ok(false)` to skip the step.
    fn confirm(&self, request: &ConfirmationRequest) -> CoreResult<bool>;
}

/// Approves everything without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForceGate;

impl ConfirmationGate for ForceGate {
    fn confirm(&self, request: &ConfirmationRequest) -> CoreResult<bool> {
        debug!("Auto-confirming '{}'", request.step);
        Ok(true)
    }
}

/// Interactive yes/no prompt.
///
/// Only `y` or `yes` (any case) approves. Anything else, including end of
/// input, declines.
pub struct PromptGate<R, W> {
    io: Mutex<(R, W)>,
}

impl<R: BufRead, W: Write> PromptGate<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }
}

impl PromptGate<std::io::BufReader<std::io::Stdin>, std::io::Stderr> {
    /// Prompt on stderr, read from stdin.
    pub fn stdio() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stderr())
    }
}

impl<R, W> ConfirmationGate for PromptGate<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn confirm(&self, request: &ConfirmationRequest) -> CoreResult<bool> {
        let mut io = self.io.lock();
        let (reader, writer) = &mut *io;

        writeln!(writer)?;
        writeln!(writer, "⚠️  {}", request.description)?;
        for resource in &request.resources {
            writeln!(writer, "   • {}", resource)?;
        }
        write!(writer, "Proceed with '{}'? [y/N] ", request.step)?;
        writer.flush()?;

        let mut answer = String::new();
        let read = reader.read_line(&mut answer)?;
        if read == 0 {
            writeln!(writer)?;
            return Ok(false);
        }

        let answer = answer.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}

/// Gate that answers from a script and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedGate {
    answers: Mutex<std::collections::VecDeque<CoreResult<bool>>>,
    default_answer: bool,
    asked: RwLock<Vec<ConfirmationRequest>>,
}

impl ScriptedGate {
    /// Gate that gives `answer` whenever the script is empty.
    pub fn new(answer: bool) -> Self {
        Self {
            default_answer: answer,
            ..Default::default()
        }
    }

    pub fn then_answer(self, answer: bool) -> Self {
        self.answers.lock().push_back(Ok(answer));
        self
    }

    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.answers.lock().push_back(Err(CoreError::Gate(message.into())));
        self
    }

    /// Requests seen so far.
    pub fn asked(&self) -> Vec<ConfirmationRequest> {
        self.asked.read().clone()
    }
}

impl ConfirmationGate for ScriptedGate {
    fn confirm(&self, request: &ConfirmationRequest) -> CoreResult<bool> {
        self.asked.write().push(request.clone());
        self.answers
            .lock()
            .pop_front()
            .unwrap_or(Ok(self.default_answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn request() -> ConfirmationRequest {
        ConfirmationRequest::new("delete-environment", "Delete Power Platform environment")
            .with_resources(vec!["Fabrikam-Tst (env-123)".to_string()])
    }

    #[test]
    fn test_prompt_accepts_yes() {
        for input in ["y\n", "Y\n", "yes\n", "  YES \n"] {
            let gate = PromptGate::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
            assert!(gate.confirm(&request()).unwrap(), "input {:?}", input);
        }
    }

    #[test]
    fn test_prompt_declines_everything_else() {
        for input in ["n\n", "\n", "yep\n", ""] {
            let gate = PromptGate::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
            assert!(!gate.confirm(&request()).unwrap(), "input {:?}", input);
        }
    }

    #[test]
    fn test_prompt_lists_resources() {
        let gate = PromptGate::new(Cursor::new(b"n\n".to_vec()), Vec::new());
        gate.confirm(&request()).unwrap();
        let io = gate.io.lock();
        let rendered = String::from_utf8_lossy(&io.1);
        assert!(rendered.contains("Fabrikam-Tst (env-123)"));
        assert!(rendered.contains("[y/N]"));
    }

    #[test]
    fn test_scripted_gate_records() {
        let gate = ScriptedGate::new(true).then_answer(false);
        assert!(!gate.confirm(&request()).unwrap());
        assert!(gate.confirm(&request()).unwrap());
        assert_eq!(gate.asked().len(), 2);
    }
}
