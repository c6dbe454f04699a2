use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryBankError {
    #[error("failed to spawn memory-bank server: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to talk to memory-bank server: {0}")]
    Io(#[source] std::io::Error),
    #[error("memory-bank server exited with {status}: {stderr}")]
    Tool {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("memory-bank server returned malformed JSON: {0}")]
    Protocol(#[source] serde_json::Error),
}

/// One tool invocation on the wire.
#[derive(Serialize)]
struct ToolRequest<'a> {
    name: &'a str,
    arguments: Value,
}

/// Client for the external document-memory service.
///
/// Each call spawns the server process, writes a single JSON tool request
/// on its stdin and reads the JSON response from stdout. Nothing here is
/// on the playback path; callers that only want best-effort recording use
/// the `try_` variants, which log failures and move on.
pub struct MemoryBank {
    program: OsString,
    server_script: PathBuf,
    bank_dir: PathBuf,
}

impl MemoryBank {
    /// Standard client running the server script under `node`.
    pub fn new(server_script: impl Into<PathBuf>, bank_dir: impl Into<PathBuf>) -> Self {
        Self::with_program("node", server_script, bank_dir)
    }

    /// Client with an explicit interpreter, mainly for tests.
    pub fn with_program(
        program: impl Into<OsString>,
        server_script: impl Into<PathBuf>,
        bank_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            server_script: server_script.into(),
            bank_dir: bank_dir.into(),
        }
    }

    pub fn bank_dir(&self) -> &Path {
        &self.bank_dir
    }

    /// Creates a fresh document structure for the given goal.
    pub fn initialize(&self, goal: &str) -> Result<Value, MemoryBankError> {
        self.call(
            "initialize_memory_bank",
            json!({
                "goal": goal,
                "location": self.bank_dir,
            }),
        )
    }

    /// Replaces the content of one document.
    pub fn update_document(
        &self,
        document_type: &str,
        content: &str,
    ) -> Result<Value, MemoryBankError> {
        self.call(
            "update_document",
            json!({
                "documentType": document_type,
                "content": content,
            }),
        )
    }

    /// Searches the stored documents.
    pub fn query(&self, query: &str) -> Result<Value, MemoryBankError> {
        self.call("query_memory_bank", json!({ "query": query }))
    }

    /// Best-effort variant of [`update_document`](Self::update_document).
    pub fn try_update_document(&self, document_type: &str, content: &str) {
        if let Err(e) = self.update_document(document_type, content) {
            log::warn!("memory bank update ({document_type}) failed: {e}");
        }
    }

    /// Best-effort variant of [`initialize`](Self::initialize).
    pub fn try_initialize(&self, goal: &str) {
        if let Err(e) = self.initialize(goal) {
            log::warn!("memory bank initialize failed: {e}");
        }
    }

    fn call(&self, name: &str, arguments: Value) -> Result<Value, MemoryBankError> {
        let request =
            serde_json::to_vec(&ToolRequest { name, arguments }).map_err(MemoryBankError::Protocol)?;

        let mut child = Command::new(&self.program)
            .arg(&self.server_script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(MemoryBankError::Spawn)?;

        // Write the request and close stdin so the server sees EOF
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&request).map_err(MemoryBankError::Io)?;
        }

        let output = child.wait_with_output().map_err(MemoryBankError::Io)?;

        if !output.status.success() {
            return Err(MemoryBankError::Tool {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(MemoryBankError::Protocol)
    }
}
