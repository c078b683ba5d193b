// 外部コマンドによる画像説明バックエンド

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::vision::{DescribeError, ImageDescriber, build_prompt};

/// Exit code (EX_TEMPFAIL) a backend uses to report a rate limit.
pub const EXIT_RATE_LIMITED: i32 = 75;

/// Environment variable carrying the prompt to the backend program.
pub const PROMPT_ENV: &str = "PDF_A11Y_PROMPT";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs an external program per image.
///
/// The base64 image is written to stdin, the prompt is passed in
/// `PDF_A11Y_PROMPT`, and the description is read from stdout. The program
/// must be available in PATH or given by absolute path.
#[derive(Debug, Clone)]
pub struct CommandDescriber {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDescriber {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// `argv[0]` is the program. Returns `None` for an empty argv.
    pub fn from_argv(argv: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec(), timeout))
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<ExitStatus, DescribeError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    reap(child);
                    return Err(DescribeError::Timeout(self.timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    reap(child);
                    return Err(DescribeError::Unavailable(format!(
                        "failed to wait for {}: {e}",
                        self.program
                    )));
                }
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        buf
    })
}

impl ImageDescriber for CommandDescriber {
    fn describe(&self, image_base64: &str, context: Option<&str>) -> Result<String, DescribeError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(PROMPT_ENV, build_prompt(context))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DescribeError::Unavailable(format!("failed to execute {}: {e}", self.program))
            })?;

        // stdinへの書き込みとstdout/stderrの読み出しは別スレッド（パイプ詰まり防止）
        let input = image_base64.as_bytes().to_vec();
        let stdin = child.stdin.take();
        let writer = thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(&input);
            }
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait_with_timeout(&mut child)?;
        let _ = writer.join();
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();

        debug!(program = %self.program, status = ?status.code(), "vision command finished");

        match status.code() {
            Some(0) => {}
            Some(EXIT_RATE_LIMITED) => return Err(DescribeError::RateLimited(stderr)),
            code => {
                return Err(DescribeError::Unavailable(format!(
                    "{} failed (exit code {}): {}",
                    self.program,
                    code.map_or_else(|| "unknown".to_string(), |c| c.to_string()),
                    stderr
                )));
            }
        }

        let text = String::from_utf8(stdout)
            .map_err(|_| DescribeError::InvalidResponse("output is not UTF-8".to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(DescribeError::InvalidResponse("empty output".to_string()));
        }
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "command"
    }

    /// プログラムが起動できるかを確認する（起動後すぐに終了させる）。
    fn check_connection(&self) -> Result<(), DescribeError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                DescribeError::Unavailable(format!("failed to execute {}: {e}", self.program))
            })?;
        reap(&mut child);
        Ok(())
    }

    // プログラム自体がモデルなので起動できれば利用可能
    fn check_model(&self) -> Result<(), DescribeError> {
        Ok(())
    }
}

/// 子プロセスを強制終了し、ゾンビが残らないよう回収する。
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
