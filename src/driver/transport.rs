//! Byte transports between the client library and a driver.
//!
//! - `SubprocessTransport` - a driver executable on piped stdin/stdout
//! - `InProcessTransport` - a dispatcher task on an in-memory pipe, used
//!   for tests and embedding; no subprocess involved

use crate::error::{DbmiError, DbmiResult};
use crate::protocol::PROTOCOL_VERSION;
use crate::server::{Backend, Dispatcher};
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, BufReader, DuplexStream, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Size of the in-memory pipe used by `InProcessTransport`.
const DUPLEX_CAPACITY: usize = 64 * 1024;

/// A bidirectional byte stream to one driver, plus control over the
/// driver's lifetime.
#[async_trait]
pub trait DriverTransport: AsyncRead + AsyncWrite + Unpin + Send {
    /// Stop the driver and release both pipes. Calling it again is a no-op.
    async fn terminate(&mut self) -> io::Result<()>;

    /// True while the driver is still running.
    fn is_running(&mut self) -> bool;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

fn closed_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "driver pipe is closed")
}

/// Driver running as a child process.
pub struct SubprocessTransport {
    command: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
}

impl SubprocessTransport {
    /// Spawn `program` with `args`, piping stdin and stdout. The driver's
    /// stderr is inherited so its diagnostics reach the user.
    pub fn spawn(program: &str, args: &[String]) -> DbmiResult<Self> {
        let command = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DbmiError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(BufReader::new);
        if stdin.is_none() || stdout.is_none() {
            return Err(DbmiError::protocol(format!(
                "driver '{}' started without pipes",
                command
            )));
        }
        info!("Started driver process {:?}: {}", child.id(), command);

        Ok(Self {
            command,
            child: Some(child),
            stdin,
            stdout,
        })
    }

    /// OS process id, `None` once the process has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }
}

impl AsyncRead for SubprocessTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().stdout.as_mut() {
            Some(stdout) => Pin::new(stdout).poll_read(cx, buf),
            None => Poll::Ready(Err(closed_pipe())),
        }
    }
}

impl AsyncWrite for SubprocessTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut().stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_write(cx, buf),
            None => Poll::Ready(Err(closed_pipe())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_flush(cx),
            None => Poll::Ready(Err(closed_pipe())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

#[async_trait]
impl DriverTransport for SubprocessTransport {
    async fn terminate(&mut self) -> io::Result<()> {
        // Closing stdin first lets a well-behaved driver see EOF.
        self.stdin = None;
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if child.try_wait()?.is_none() {
            debug!("Killing driver process {:?}", child.id());
            match child.start_kill() {
                Ok(()) => {}
                // Exited between try_wait and kill.
                Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
                Err(e) => return Err(e),
            }
        }
        let status = child.wait().await?;
        info!("Driver '{}' exited with {}", self.command, status);
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn describe(&self) -> String {
        format!("process {:?} ({})", self.id(), self.command)
    }
}

/// Driver served by a task in this process.
pub struct InProcessTransport {
    stream: Option<DuplexStream>,
    task: Option<JoinHandle<DbmiResult<()>>>,
}

impl InProcessTransport {
    /// Serve `backend` on a background task.
    pub fn spawn<B>(backend: B) -> Self
    where
        B: Backend + 'static,
    {
        Self::spawn_with_version(backend, PROTOCOL_VERSION)
    }

    /// Serve `backend`, announcing `version` at the handshake.
    pub fn spawn_with_version<B>(backend: B, version: i32) -> Self
    where
        B: Backend + 'static,
    {
        let (client, server) = tokio::io::duplex(DUPLEX_CAPACITY);
        let task = tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(server);
            Dispatcher::new(backend)
                .with_version(version)
                .serve(reader, writer)
                .await
        });
        Self {
            stream: Some(client),
            task: Some(task),
        }
    }
}

impl AsyncRead for InProcessTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_read(cx, buf),
            None => Poll::Ready(Err(closed_pipe())),
        }
    }
}

impl AsyncWrite for InProcessTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut().stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_write(cx, buf),
            None => Poll::Ready(Err(closed_pipe())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_flush(cx),
            None => Poll::Ready(Err(closed_pipe())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

#[async_trait]
impl DriverTransport for InProcessTransport {
    async fn terminate(&mut self) -> io::Result<()> {
        self.stream = None;
        if let Some(task) = self.task.take() {
            task.abort();
            // Cancelled or finished; either way the dispatcher is gone.
            let _ = task.await;
        }
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn describe(&self) -> String {
        "in-process driver".to_string()
    }
}
