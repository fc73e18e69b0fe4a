//! Shared fixtures for the workspace integration tests.

#![allow(dead_code)]

use rcon::packet::MAX_DATAGRAM_SIZE;
use rcon::Packet;
use shared::{parse_servers, ServerConfig};
use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const SECRET: &str = "s3cr3t";

/// How the mock endpoint deviates from a well-behaved server.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Commands that are recorded but never answered.
    pub ignore: Vec<String>,
    /// Push a server message before every command response.
    pub interleave_messages: bool,
    /// Answer the first command with a login demand instead of a response.
    pub demand_login_once: bool,
    /// Drop every datagram, including logins.
    pub silent: bool,
}

#[derive(Debug, Default)]
struct Recorded {
    logins: usize,
    commands: Vec<(u8, String)>,
    acks: Vec<u8>,
    pushed: Vec<u8>,
}

/// In-process BattlEye RCon endpoint on `127.0.0.1:0`.
pub struct MockServer {
    pub addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(behavior: Behavior) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        let task = tokio::spawn(serve(socket, behavior, Arc::clone(&recorded)));

        Self {
            addr,
            recorded,
            task,
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn logins(&self) -> usize {
        self.recorded.lock().unwrap().logins
    }

    /// Every command received, keep-alives included as empty strings.
    pub fn commands(&self) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .commands
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }

    pub fn sequences(&self) -> Vec<u8> {
        self.recorded
            .lock()
            .unwrap()
            .commands
            .iter()
            .map(|(seq, _)| *seq)
            .collect()
    }

    pub fn acks(&self) -> Vec<u8> {
        self.recorded.lock().unwrap().acks.clone()
    }

    /// Sequence numbers of the server messages pushed so far.
    pub fn pushed(&self) -> Vec<u8> {
        self.recorded.lock().unwrap().pushed.clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(socket: UdpSocket, behavior: Behavior, recorded: Arc<Mutex<Recorded>>) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    let mut next_message: u8 = 0;
    let mut login_demanded = false;

    while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
        if behavior.silent {
            continue;
        }

        let Ok(packet) = Packet::decode(&buf[..len]) else {
            continue;
        };

        let mut replies = Vec::new();
        match packet {
            Packet::Login(secret) => {
                recorded.lock().unwrap().logins += 1;
                replies.push(Packet::login_response(&secret[..] == SECRET.as_bytes()));
            }
            Packet::Command { seq, payload } => {
                let command = String::from_utf8_lossy(&payload).into_owned();
                recorded.lock().unwrap().commands.push((seq, command.clone()));

                if behavior.demand_login_once && !login_demanded {
                    login_demanded = true;
                    replies.push(Packet::login_response(false));
                } else if !behavior.ignore.contains(&command) {
                    if behavior.interleave_messages && !command.is_empty() {
                        replies.push(Packet::message(next_message, "RCon admin #0 logged in"));
                        recorded.lock().unwrap().pushed.push(next_message);
                        next_message = next_message.wrapping_add(1);
                    }
                    replies.push(Packet::Command { seq, payload });
                }
            }
            Packet::Message { seq, .. } => {
                recorded.lock().unwrap().acks.push(seq);
            }
        }

        for reply in replies {
            let _ = socket.send_to(&reply.encode(), peer).await;
        }
    }
}

/// Lays out a server installation whose BattlEye config points at `rcon`.
pub fn server_with_rcon(base_dir: &Path, rcon: SocketAddr, max_players: u32) -> ServerConfig {
    server_with_battleye(base_dir, rcon, max_players, false)
}

pub fn server_with_battleye(
    base_dir: &Path,
    rcon: SocketAddr,
    max_players: u32,
    restrict_rcon: bool,
) -> ServerConfig {
    let battleye = base_dir.join("battleye");
    std::fs::create_dir_all(&battleye).unwrap();
    std::fs::write(
        battleye.join("BEServer_x64_active_1a2b.cfg"),
        format!(
            "RConPassword {}\nRestrictRCon {}\nRConIP {}\nRConPort {}\n",
            SECRET,
            u8::from(restrict_rcon),
            rcon.ip(),
            rcon.port()
        ),
    )
    .unwrap();
    std::fs::write(
        base_dir.join("serverDZ.cfg"),
        format!("hostname = \"Test\";\nmaxPlayers = {};\n", max_players),
    )
    .unwrap();

    server(base_dir, "[]")
}

/// Parses a single server named `test` rooted at `base_dir`.
pub fn server(base_dir: &Path, mods: &str) -> ServerConfig {
    let json = format!(
        r#"{{"test": {{"basedir": {:?}, "mods": {}}}}}"#,
        base_dir.display().to_string(),
        mods
    );
    parse_servers(&json).unwrap().remove("test").unwrap()
}

#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}
