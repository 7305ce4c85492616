// ABOUTME: Scripted transport double for gateway tests.
// ABOUTME: Records every call and replays canned command output.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether::ssh::{Authenticator, Error, Result, Transport, TransportSession};
use tether::types::HostSpec;

/// Everything the gateway asked the transport to do.
#[derive(Debug, Clone, Default)]
pub struct Calls {
    /// `(address, port, timeout)` per `open`.
    pub opens: Vec<(String, u16, Option<Duration>)>,
    /// `(session id, username, auth method)` per `login`.
    pub logins: Vec<(usize, String, &'static str)>,
    /// `(session id, timeout)` per `set_timeout`.
    pub timeouts: Vec<(usize, Option<Duration>)>,
    /// `(session id, command)` per `exec_streaming`.
    pub execs: Vec<(usize, String)>,
    /// Session ids that were closed.
    pub closes: Vec<usize>,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.opens.len()
            + self.logins.len()
            + self.timeouts.len()
            + self.execs.len()
            + self.closes.len()
    }
}

#[derive(Debug, Clone)]
struct Script {
    chunks: Vec<String>,
    exit_status: Option<u32>,
    hang: bool,
}

#[derive(Debug, Default)]
struct State {
    calls: Calls,
    scripts: HashMap<String, Script>,
    reject_logins: bool,
    fail_open: Option<String>,
    next_session: usize,
}

/// Transport double whose sessions replay scripted output.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// `command` yields `chunks`, then ends with `exit_status`.
    pub fn script(self, command: &str, chunks: &[&str], exit_status: u32) -> Self {
        self.insert(command, chunks, Some(exit_status), false)
    }

    /// `command` yields `chunks`, then ends without an exit status, as a
    /// process killed by a signal with no portable number does.
    pub fn killed(self, command: &str, chunks: &[&str]) -> Self {
        self.insert(command, chunks, None, false)
    }

    /// `command` yields `chunks`, then never produces anything else.
    pub fn hanging(self, command: &str, chunks: &[&str]) -> Self {
        self.insert(command, chunks, None, true)
    }

    pub fn reject_logins(self) -> Self {
        self.state.lock().unwrap().reject_logins = true;
        self
    }

    pub fn fail_open(self, message: &str) -> Self {
        self.state.lock().unwrap().fail_open = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }

    fn insert(self, command: &str, chunks: &[&str], exit_status: Option<u32>, hang: bool) -> Self {
        self.state.lock().unwrap().scripts.insert(
            command.to_string(),
            Script {
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                exit_status,
                hang,
            },
        );
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Session = MockSession;

    async fn open(&self, host: &HostSpec, timeout: Option<Duration>) -> Result<MockSession> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .opens
            .push((host.address().to_string(), host.port(), timeout));
        if let Some(message) = &state.fail_open {
            return Err(Error::Connection(message.clone()));
        }
        state.next_session += 1;
        Ok(MockSession {
            id: state.next_session,
            state: Arc::clone(&self.state),
            timeout,
            pending: VecDeque::new(),
            script: None,
            exit_status: None,
            closed: false,
        })
    }
}

/// Session handed out by [`MockTransport`].
#[derive(Debug)]
pub struct MockSession {
    id: usize,
    state: Arc<Mutex<State>>,
    timeout: Option<Duration>,
    pending: VecDeque<String>,
    script: Option<Script>,
    exit_status: Option<u32>,
    closed: bool,
}

impl MockSession {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl TransportSession for MockSession {
    async fn login(&mut self, username: &str, auth: &Authenticator) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .logins
            .push((self.id, username.to_string(), auth.method()));
        Ok(!state.reject_logins)
    }

    fn is_connected(&self) -> bool {
        !self.closed
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
        self.state
            .lock()
            .unwrap()
            .calls
            .timeouts
            .push((self.id, timeout));
    }

    async fn exec_streaming(&mut self, command: &str) -> Result<()> {
        let script = {
            let mut state = self.state.lock().unwrap();
            state.calls.execs.push((self.id, command.to_string()));
            state.scripts.get(command).cloned()
        };
        let script = script
            .ok_or_else(|| Error::CommandFailed(format!("unscripted command: {}", command)))?;
        self.pending = script.chunks.iter().cloned().collect();
        self.exit_status = None;
        self.script = Some(script);
        Ok(())
    }

    async fn next_chunk(&mut self) -> Result<Option<String>> {
        if let Some(chunk) = self.pending.pop_front() {
            return Ok(Some(chunk));
        }
        let Some(script) = self.script.take() else {
            return Err(Error::NoChannel);
        };
        if script.hang {
            std::future::pending::<()>().await;
        }
        self.exit_status = script.exit_status;
        Ok(None)
    }

    fn exit_status(&self) -> Option<u32> {
        self.exit_status
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.state.lock().unwrap().calls.closes.push(self.id);
        Ok(())
    }
}
