// ABOUTME: In-memory scripted remote implementing Remote and Connector for pipeline tests.
// ABOUTME: Simulates releases/ directories and the current symlink, and records every command.

use async_trait::async_trait;
use hoist::config::ServerConfig;
use hoist::logs::LogSink;
use hoist::pulse::PULSE_COMMAND;
use hoist::ssh::{self, CommandOutput, Connector, Remote};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Notify;

pub const COMMIT: &str = "3f786850e387550fdab836ed7e6dc881de23001b";

pub const UBUNTU: &str = "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\nPRETTY_NAME=\"Ubuntu 24.04 LTS\"\n";

/// Forces commands containing `pattern` to exit with `exit_code`.
#[derive(Debug, Clone)]
struct FailRule {
    pattern: String,
    exit_code: u32,
    stderr: String,
}

/// Observable state of the fake host, shared by the connector and every remote it opens.
#[derive(Debug)]
pub struct HostState {
    pub commands: Vec<String>,
    pub connects: usize,
    pub ends: usize,
    pub dirs: BTreeSet<String>,
    pub links: BTreeMap<String, String>,
    pub uploads: BTreeMap<String, Vec<u8>>,
    pub os_release: Option<String>,
    pub uid: String,
    pub pulse_output: String,
    pub refuse_connect: bool,
    pub fail_end: bool,
    /// Commands containing this string return a transport error.
    pub transport_error_on: Option<String>,
    fail_rules: Vec<FailRule>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            connects: 0,
            ends: 0,
            dirs: BTreeSet::new(),
            links: BTreeMap::new(),
            uploads: BTreeMap::new(),
            os_release: Some(UBUNTU.to_string()),
            uid: "1000".to_string(),
            pulse_output: "{\"cpu\": 12.5, \"memory\": 40, \"disk\": 55, \"uptime\": 120}\n"
                .to_string(),
            refuse_connect: false,
            fail_end: false,
            transport_error_on: None,
            fail_rules: Vec::new(),
        }
    }
}

/// Pauses `connect` until released, so tests can hold an operation in flight.
#[derive(Debug, Default)]
pub struct ConnectGate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<HostState>>,
    gate: Option<Arc<ConnectGate>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gate(mut self, gate: Arc<ConnectGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, HostState> {
        self.state.lock()
    }

    /// Make every command containing `pattern` exit with `exit_code`.
    pub fn fail_on(&self, pattern: &str, exit_code: u32) {
        self.state.lock().fail_rules.push(FailRule {
            pattern: pattern.to_string(),
            exit_code,
            stderr: format!("simulated failure of {pattern}\n"),
        });
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Target of `<root>/current`, if the link exists.
    pub fn current(&self, root: &str) -> Option<String> {
        self.state.lock().links.get(&format!("{root}/current")).cloned()
    }

    pub fn release_dirs(&self, root: &str) -> Vec<String> {
        let prefix = format!("{root}/releases/");
        self.state
            .lock()
            .dirs
            .iter()
            .filter_map(|d| d.strip_prefix(&prefix).map(str::to_string))
            .filter(|d| !d.contains('/'))
            .collect()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Remote = FakeRemote;

    async fn connect(&self, server: &ServerConfig) -> ssh::Result<FakeRemote> {
        {
            let mut state = self.state.lock();
            state.connects += 1;
            if state.refuse_connect {
                return Err(ssh::Error::Connection(format!(
                    "{}:{} refused the connection",
                    server.host, server.port
                )));
            }
        }
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(FakeRemote {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeRemote {
    state: Arc<Mutex<HostState>>,
}

impl FakeRemote {
    fn run(&self, command: &str) -> ssh::Result<CommandOutput> {
        let mut state = self.state.lock();
        state.commands.push(command.to_string());

        if let Some(pattern) = &state.transport_error_on
            && command.contains(pattern.as_str())
        {
            return Err(ssh::Error::ChannelClosed);
        }
        if let Some(rule) = state
            .fail_rules
            .iter()
            .find(|r| command.contains(&r.pattern))
        {
            return Ok(output(rule.exit_code, "", &rule.stderr));
        }
        Ok(simulate(&mut state, command))
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        self.run(command)
    }

    async fn exec_stream(&self, command: &str, sink: &LogSink) -> ssh::Result<u32> {
        let out = self.run(command)?;
        sink.stdout(out.stdout).await;
        sink.stderr(out.stderr).await;
        Ok(out.exit_code)
    }

    async fn put_buffer(&self, data: &[u8], remote_path: &str) -> ssh::Result<()> {
        self.state
            .lock()
            .uploads
            .insert(remote_path.to_string(), data.to_vec());
        Ok(())
    }

    async fn end(&self) -> ssh::Result<()> {
        let mut state = self.state.lock();
        state.ends += 1;
        if state.fail_end {
            return Err(ssh::Error::ChannelClosed);
        }
        Ok(())
    }
}

fn output(exit_code: u32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

fn unquote(word: &str) -> String {
    word.trim_matches('\'').to_string()
}

/// Interpret the commands the pipelines issue. Anything unrecognised succeeds silently.
fn simulate(state: &mut HostState, command: &str) -> CommandOutput {
    let words: Vec<&str> = command.split_whitespace().collect();

    if command == PULSE_COMMAND {
        return output(0, &state.pulse_output.clone(), "");
    }

    match words.as_slice() {
        ["mkdir", "-p", path] => {
            state.dirs.insert(unquote(path));
            output(0, "", "")
        }
        ["git", "clone", .., dest] | ["tar", "-xzf", _, "-C", dest] => {
            let dest = unquote(dest);
            state.dirs.insert(dest.clone());
            state.dirs.insert(format!("{dest}/.populated"));
            output(0, "Cloning...\n", "")
        }
        ["test", "-d", path] => {
            let code = if state.dirs.contains(&unquote(path)) { 0 } else { 1 };
            output(code, "", "")
        }
        ["readlink", path] => match state.links.get(&unquote(path)) {
            Some(target) => output(0, &format!("{target}\n"), ""),
            None => output(1, "", ""),
        },
        ["ls", "-1", dir, ..] => {
            let prefix = format!("{}/", unquote(dir));
            let children: Vec<String> = state
                .dirs
                .iter()
                .filter_map(|d| d.strip_prefix(&prefix))
                .filter(|d| !d.contains('/'))
                .map(str::to_string)
                .collect();
            if children.is_empty() && !state.dirs.contains(&unquote(dir)) {
                return output(2, "", "No such file or directory\n");
            }
            output(0, &(children.join("\n") + "\n"), "")
        }
        ["git", "-C", _, "rev-parse", "HEAD", ..] => output(0, &format!("{COMMIT}\n"), ""),
        ["cat", "/etc/os-release"] => match &state.os_release {
            Some(content) => output(0, content, ""),
            None => output(1, "", "cat: /etc/os-release: No such file or directory\n"),
        },
        ["id", "-u"] => output(0, &format!("{}\n", state.uid), ""),
        ["cd", root, "&&", "ln", "-sfn", target, _, "&&", "mv", "-Tf", _, link] => {
            state
                .links
                .insert(format!("{}/{}", unquote(root), unquote(link)), unquote(target));
            output(0, "", "")
        }
        _ => output(0, "", ""),
    }
}
