//! Shared test infrastructure: scripted external tools, canned toxicity scores and
//! fixture builders.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

use ioctriage::artifact::Artifact;
use ioctriage::config::{self, Config};
use ioctriage::pipeline::Orchestrator;
use ioctriage::store::{MemorySink, ScanSink};
use ioctriage::tools::{ToolError, ToolInvocation, ToolOutput, ToolRunner};
use ioctriage::toxicity::{ToxicityError, ToxicityScorer};

type Handler = Box<dyn Fn(&ToolInvocation) -> Result<ToolOutput, ToolError> + Send + Sync>;

/// Answers signature invocations (`yara`) and archive invocations (anything else)
/// from separate handlers and records every call.
pub struct ScriptedTools {
    signature: Handler,
    archive: Handler,
    calls: Mutex<Vec<ToolInvocation>>,
}

impl ScriptedTools {
    pub fn new() -> Self {
        Self {
            signature: Box::new(|_| Ok(exit(1, ""))),
            archive: Box::new(|_| Ok(exit(0, ""))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_signature(
        mut self,
        handler: impl Fn(&ToolInvocation) -> Result<ToolOutput, ToolError> + Send + Sync + 'static,
    ) -> Self {
        self.signature = Box::new(handler);
        self
    }

    pub fn with_archive(
        mut self,
        handler: impl Fn(&ToolInvocation) -> Result<ToolOutput, ToolError> + Send + Sync + 'static,
    ) -> Self {
        self.archive = Box::new(handler);
        self
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn archive_calls(&self) -> Vec<ToolInvocation> {
        self.calls()
            .into_iter()
            .filter(|inv| !is_signature(inv))
            .collect()
    }
}

impl ToolRunner for ScriptedTools {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(invocation.clone());
        if is_signature(invocation) {
            (self.signature)(invocation)
        } else {
            (self.archive)(invocation)
        }
    }
}

fn is_signature(invocation: &ToolInvocation) -> bool {
    invocation.program.file_name().and_then(|n| n.to_str()) == Some("yara")
}

pub fn exit(code: i32, stdout: &str) -> ToolOutput {
    ToolOutput {
        code: Some(code),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

/// Signature handler reporting `rules` as matches.
pub fn yara_matches(
    rules: &'static [&'static str],
) -> impl Fn(&ToolInvocation) -> Result<ToolOutput, ToolError> + Send + Sync + 'static {
    move |inv| {
        let target = inv
            .args
            .last()
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stdout: String = rules.iter().map(|r| format!("{r} {target}\n")).collect();
        Ok(exit(0, &stdout))
    }
}

/// Archive handler that renders a minimal report tree into the `-o` directory.
pub fn aleapp_report(inv: &ToolInvocation) -> Result<ToolOutput, ToolError> {
    let pos = inv.args.iter().position(|a| a == "-o").expect("-o flag");
    let html = PathBuf::from(&inv.args[pos + 1])
        .join("ALEAPP_Reports_2025-03-01_Sat_120000")
        .join("_HTML");
    std::fs::create_dir_all(&html).expect("report dir");
    std::fs::write(html.join("index.html"), "<html></html>").expect("index");
    std::fs::write(html.join("Installed Apps.html"), "<html></html>").expect("entry");
    Ok(exit(0, "Processes completed."))
}

pub fn aleapp_timeout(_inv: &ToolInvocation) -> Result<ToolOutput, ToolError> {
    Err(ToolError::Timeout {
        program: "python3".into(),
        elapsed: Duration::from_secs(600),
    })
}

pub enum FixedScore {
    Score(f64),
    Unavailable,
}

impl ToxicityScorer for FixedScore {
    fn score(&self, _artifact: &Artifact) -> Result<f64, ToxicityError> {
        match self {
            FixedScore::Score(score) => Ok(*score),
            FixedScore::Unavailable => Err(ToxicityError::Malformed("service unavailable".into())),
        }
    }
}

/// Embedded defaults with every filesystem location moved under `root`.
pub fn test_config(root: &Path) -> Config {
    let mut cfg = config::load_config(None).expect("config").config;
    cfg.intake.upload_dir = root.join("uploads");
    cfg.signature.binary = "yara".into();
    cfg.signature.rules_path = root.join("rules.yar");
    cfg.archive.python = PathBuf::from("/opt/venv/bin/python3");
    cfg.archive.script = PathBuf::from("/opt/ALEAPP/aleapp.py");
    cfg.archive.reports_root = root.join("reports");
    cfg
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub tools: Arc<ScriptedTools>,
    pub sink: Arc<MemorySink>,
}

pub fn harness(cfg: &Config, tools: ScriptedTools, score: FixedScore) -> Harness {
    let tools = Arc::new(tools);
    let sink = Arc::new(MemorySink::default());
    let orchestrator =
        Orchestrator::from_config(cfg, tools.clone(), Arc::new(score), sink.clone() as Arc<dyn ScanSink>)
            .expect("orchestrator");
    Harness {
        orchestrator,
        tools,
        sink,
    }
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}

/// SQLite fixture with one `messages(body)` table.
pub fn message_db(path: &Path, bodies: &[&str]) {
    let conn = Connection::open(path).expect("open fixture db");
    conn.execute_batch("CREATE TABLE messages (id INTEGER PRIMARY KEY, body TEXT);")
        .expect("schema");
    for body in bodies {
        conn.execute("INSERT INTO messages (body) VALUES (?1)", [body])
            .expect("insert");
    }
}
