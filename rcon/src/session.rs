//! Authenticated RCon session over one UDP socket.
//!
//! A [`Session`] owns the socket together with a spawned listener task. The
//! listener receives every datagram, routes command responses to the request
//! waiting on that sequence number, acknowledges unsolicited server messages and
//! fans them out to subscribers. Foreground requests are serialized so only one
//! command is in flight at a time.

use bytes::Bytes;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::{broadcast, oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::countdown::{Countdown, Step};
use crate::error::{RconError, RconResult};
use crate::packet::{Packet, Reply, MAX_DATAGRAM_SIZE};

/// Player target that addresses everyone on the server.
pub const ALL_PLAYERS: i32 = -1;

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Capacity of the unsolicited message fan-out before slow subscribers lag.
const MESSAGE_BACKLOG: usize = 64;

/// An unsolicited message pushed by the server (chat, log events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    pub seq: u8,
    pub text: String,
}

/// Result of a best-effort kick sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KickReport {
    /// Number of kick commands attempted.
    pub attempted: u32,
    /// Slots whose kick could not be delivered.
    pub failed: Vec<u32>,
}

impl KickReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// How the listener resolved an outstanding command.
#[derive(Debug)]
enum Outcome {
    Response(String),
    /// The server asked for the secret again instead of answering.
    AuthRequired,
    Failed(io::Error),
}

#[derive(Debug)]
enum LoginOutcome {
    Accepted,
    Rejected,
    Failed(io::Error),
}

/// A command waiting for its (possibly fragmented) response.
struct PendingRequest {
    sequence: u64,
    parts: Vec<Option<Bytes>>,
    reply: oneshot::Sender<Outcome>,
}

/// State shared between the foreground session and its listener task.
struct Shared {
    socket: UdpSocket,
    remote: SocketAddr,
    running: AtomicBool,
    authenticated: AtomicBool,
    stop: Notify,
    pending: StdMutex<HashMap<u8, PendingRequest>>,
    login: StdMutex<Option<oneshot::Sender<LoginOutcome>>>,
    last_message: StdMutex<Option<u8>>,
    messages: broadcast::Sender<ServerMessage>,
}

impl Shared {
    async fn send(&self, packet: &Packet) -> io::Result<()> {
        self.socket.send(&packet.encode()).await?;
        Ok(())
    }

    fn take_pending(&self, seq: u8) -> Option<PendingRequest> {
        self.pending.lock().ok()?.remove(&seq)
    }

    /// Resolves every outstanding request and login with `make_outcome`.
    fn resolve_all(&self, make_outcome: impl Fn() -> Outcome) {
        if let Ok(mut pending) = self.pending.lock() {
            for (_, request) in pending.drain() {
                let _ = request.reply.send(make_outcome());
            }
        }
    }

    fn fail_all(&self, error: &io::Error) {
        let kind = error.kind();
        let text = error.to_string();

        self.resolve_all(|| Outcome::Failed(io::Error::new(kind, text.clone())));

        if let Some(waiter) = self.login.lock().ok().and_then(|mut login| login.take()) {
            let _ = waiter.send(LoginOutcome::Failed(io::Error::new(kind, text.clone())));
        }
    }

    async fn dispatch(&self, packet: Packet) {
        match packet {
            Packet::Login(status) => self.handle_login(&status),
            Packet::Command { seq, payload } => self.handle_response(seq, payload),
            Packet::Message { seq, payload } => self.handle_message(seq, payload).await,
        }
    }

    fn handle_login(&self, status: &[u8]) {
        let waiter = self.login.lock().ok().and_then(|mut login| login.take());

        if let Some(waiter) = waiter {
            let outcome = if status.first() == Some(&0x01) {
                LoginOutcome::Accepted
            } else {
                LoginOutcome::Rejected
            };
            let _ = waiter.send(outcome);
            return;
        }

        // A login packet nobody asked for: the server forgot this client.
        if self.authenticated.swap(false, Ordering::AcqRel) {
            warn!("{} reset the RCon session, login required", self.remote);
        }
        self.resolve_all(|| Outcome::AuthRequired);
    }

    fn handle_response(&self, seq: u8, payload: Bytes) {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };

        let Some(request) = pending.get_mut(&seq) else {
            debug!("Ignoring response for unknown sequence {}", seq);
            return;
        };

        let body = match Reply::parse(payload) {
            Reply::Complete(body) => body,
            Reply::Fragment { total, index, data } => {
                if request.parts.is_empty() {
                    request.parts = vec![None; total as usize];
                }

                let index = index as usize;
                if index >= request.parts.len() {
                    warn!(
                        "Fragment {} out of range for {} parts of request #{}",
                        index,
                        request.parts.len(),
                        request.sequence
                    );
                    return;
                }
                request.parts[index] = Some(data);

                if request.parts.iter().any(Option::is_none) {
                    return;
                }

                request.parts.iter().flatten().flat_map(|part| part.iter().copied()).collect()
            }
        };

        if let Some(request) = pending.remove(&seq) {
            let text = String::from_utf8_lossy(&body).into_owned();
            let _ = request.reply.send(Outcome::Response(text));
        }
    }

    async fn handle_message(&self, seq: u8, payload: Bytes) {
        if let Err(e) = self.send(&Packet::ack(seq)).await {
            warn!("Failed to acknowledge server message {}: {}", seq, e);
        }

        // The server repeats a message until it sees the acknowledgement.
        let duplicate = self
            .last_message
            .lock()
            .map(|mut last| last.replace(seq) == Some(seq))
            .unwrap_or(false);
        if duplicate {
            return;
        }

        let text = String::from_utf8_lossy(&payload).into_owned();
        info!("[{}] {}", self.remote, text);
        let _ = self.messages.send(ServerMessage { seq, text });
    }
}

/// Receives datagrams until the session stops.
async fn listen(shared: Arc<Shared>) {
    let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

    while shared.running.load(Ordering::Acquire) {
        tokio::select! {
            _ = shared.stop.notified() => break,
            result = shared.socket.recv(&mut buffer) => match result {
                Ok(len) => match Packet::decode(&buffer[..len]) {
                    Ok(packet) => shared.dispatch(packet).await,
                    Err(e) => warn!("Discarding datagram from {}: {}", shared.remote, e),
                },
                Err(e) => {
                    warn!("Error receiving from {}: {}", shared.remote, e);
                    shared.fail_all(&e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
        }
    }

    debug!("Listener for {} stopped", shared.remote);
}

/// An authenticated RCon session.
///
/// Dropping the session stops the listener and releases the socket; call
/// [`Session::close`] to wait for the listener to finish.
pub struct Session {
    shared: Arc<Shared>,
    secret: String,
    timeout: Duration,
    /// Next logical sequence number. Holding the guard is what makes a request
    /// the only one in flight.
    sequence: Mutex<u64>,
    listener: Option<JoinHandle<()>>,
}

impl Session {
    /// Opens a session to `host:port` and logs in with `secret`.
    ///
    /// `timeout` bounds the login handshake and every later request.
    pub async fn connect(
        host: &str,
        port: u16,
        secret: &str,
        timeout: Duration,
    ) -> RconResult<Self> {
        let remote = first_address(host, lookup_host((host, port)), timeout).await?;

        let local = if remote.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;

        let (messages, _) = broadcast::channel(MESSAGE_BACKLOG);
        let shared = Arc::new(Shared {
            socket,
            remote,
            running: AtomicBool::new(true),
            authenticated: AtomicBool::new(false),
            stop: Notify::new(),
            pending: StdMutex::new(HashMap::new()),
            login: StdMutex::new(None),
            last_message: StdMutex::new(None),
            messages,
        });

        let listener = tokio::spawn(listen(Arc::clone(&shared)));

        let session = Session {
            shared,
            secret: secret.to_string(),
            timeout,
            sequence: Mutex::new(0),
            listener: Some(listener),
        };

        {
            let _guard = session.sequence.lock().await;
            session.login().await?;
        }

        info!("RCon session established with {}", remote);
        Ok(session)
    }

    pub fn remote(&self) -> SocketAddr {
        self.shared.remote
    }

    pub fn is_authenticated(&self) -> bool {
        self.shared.authenticated.load(Ordering::Acquire)
    }

    /// Sequence number of the most recently issued command, if any.
    pub async fn last_sequence(&self) -> Option<u64> {
        self.sequence.lock().await.checked_sub(1)
    }

    /// Receiver for unsolicited server messages from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.shared.messages.subscribe()
    }

    /// Runs a raw command and returns its (reassembled) response.
    pub async fn run(&self, command: &str) -> RconResult<String> {
        self.request(command).await
    }

    /// Sends an empty command so the server does not expire the session.
    pub async fn keep_alive(&self) -> RconResult<()> {
        self.request("").await.map(|_| ())
    }

    pub async fn say(&self, player: impl Display, message: &str) -> RconResult<String> {
        self.run(&format!("say {} {}", player, message)).await
    }

    /// Sends a message to every player.
    pub async fn broadcast(&self, message: &str) -> RconResult<String> {
        self.say(ALL_PLAYERS, message).await
    }

    pub async fn kick(&self, player: impl Display, reason: Option<&str>) -> RconResult<String> {
        let command = match reason {
            Some(reason) => format!("kick {} {}", player, reason),
            None => format!("kick {}", player),
        };
        self.run(&command).await
    }

    /// Kicks every slot from `0` to `max_slots`, occupied or not.
    ///
    /// Failures are logged and recorded; the sweep always covers every slot.
    pub async fn kick_all(&self, max_slots: u32, reason: Option<&str>) -> KickReport {
        let mut report = KickReport::default();

        for slot in 0..max_slots {
            report.attempted += 1;

            if let Err(e) = self.kick(slot, reason).await {
                log_sweep_failure(&format!("Could not kick player slot {}", slot), &e);
                report.failed.push(slot);
            }
        }

        report
    }

    /// Runs a countdown, broadcasting or keeping the session alive once per tick.
    ///
    /// Returns `false` if any tick could not be delivered. Tick failures never
    /// cut the countdown short.
    pub async fn countdown(&self, countdown: &Countdown) -> bool {
        if countdown.total_seconds == 0 {
            return true;
        }

        let mut ticker = interval(countdown.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut delivered = true;

        for tick in 0..countdown.total_seconds {
            ticker.tick().await;

            let result = match countdown.step(tick) {
                Step::Broadcast(message) => {
                    debug!("Countdown: {}", message);
                    self.broadcast(&message).await.map(|_| ())
                }
                Step::KeepAlive => self.keep_alive().await,
            };

            if let Err(e) = result {
                let context = format!(
                    "Countdown tick with {}s remaining failed",
                    countdown.remaining(tick)
                );
                log_sweep_failure(&context, &e);
                delivered = false;
            }
        }

        // Let the final second run out before returning.
        ticker.tick().await;
        delivered
    }

    pub async fn shutdown(&self) -> RconResult<String> {
        self.run("#shutdown").await
    }

    /// Stops the listener and releases the socket.
    pub async fn close(mut self) {
        self.stop();

        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }

        info!("RCon session with {} closed", self.shared.remote);
    }

    fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.stop.notify_one();
    }

    async fn request(&self, command: &str) -> RconResult<String> {
        let mut next = self.sequence.lock().await;

        if !self.is_authenticated() {
            self.login().await?;
        }

        match self.exchange(&mut next, command).await? {
            Outcome::Response(text) => Ok(text),
            Outcome::AuthRequired => {
                self.login().await?;

                match self.exchange(&mut next, command).await? {
                    Outcome::Response(text) => Ok(text),
                    _ => Err(RconError::Authentication(
                        "server demanded login again after re-authentication".to_string(),
                    )),
                }
            }
            Outcome::Failed(e) => Err(RconError::Connection(e)),
        }
    }

    /// Sends one command and waits for its response. Caller holds the
    /// sequence lock.
    async fn exchange(&self, next: &mut u64, command: &str) -> RconResult<Outcome> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(RconError::Closed);
        }

        let sequence = *next;
        *next += 1;
        let seq = (sequence % 256) as u8;

        let (reply, response) = oneshot::channel();
        if let Ok(mut pending) = self.shared.pending.lock() {
            pending.insert(
                seq,
                PendingRequest {
                    sequence,
                    parts: Vec::new(),
                    reply,
                },
            );
        }

        let packet = if command.is_empty() {
            Packet::keep_alive(seq)
        } else {
            Packet::command(seq, command)
        };

        if let Err(e) = self.shared.send(&packet).await {
            self.shared.take_pending(seq);
            return Err(e.into());
        }
        debug!("-> #{} {:?}", sequence, command);

        match timeout(self.timeout, response).await {
            Ok(Ok(Outcome::Failed(e))) => Err(RconError::Connection(e)),
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(RconError::Closed),
            Err(_) => {
                self.shared.take_pending(seq);
                Err(RconError::Timeout(self.timeout))
            }
        }
    }

    /// Presents the secret. Caller holds the sequence lock, so at most one
    /// login is outstanding.
    async fn login(&self) -> RconResult<()> {
        let (waiter, outcome) = oneshot::channel();
        if let Ok(mut login) = self.shared.login.lock() {
            *login = Some(waiter);
        }

        self.shared.send(&Packet::login(&self.secret)).await?;

        match timeout(self.timeout, outcome).await {
            Ok(Ok(LoginOutcome::Accepted)) => {
                self.shared.authenticated.store(true, Ordering::Release);
                debug!("Logged in to {}", self.shared.remote);
                Ok(())
            }
            Ok(Ok(LoginOutcome::Rejected)) => Err(RconError::Authentication(format!(
                "{} rejected the RCon password",
                self.shared.remote
            ))),
            Ok(Ok(LoginOutcome::Failed(e))) => Err(RconError::Connection(e)),
            Ok(Err(_)) => Err(RconError::Closed),
            Err(_) => {
                if let Ok(mut login) = self.shared.login.lock() {
                    login.take();
                }
                Err(RconError::Timeout(self.timeout))
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();

        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Sweeps carry on past every failure; only the log level differs.
fn log_sweep_failure(context: &str, e: &RconError) {
    if e.is_transient() {
        warn!("{}: {}", context, e);
    } else {
        error!("{}: {}", context, e);
    }
}

/// First address yielded by `lookup`, which must finish within `deadline`.
async fn first_address<F, I>(host: &str, lookup: F, deadline: Duration) -> RconResult<SocketAddr>
where
    F: IntoFuture<Output = io::Result<I>>,
    I: Iterator<Item = SocketAddr>,
{
    let mut addrs = timeout(deadline, lookup)
        .await
        .map_err(|_| RconError::Timeout(deadline))??;

    addrs.next().ok_or_else(|| {
        RconError::Connection(io::Error::new(
            io::ErrorKind::NotFound,
            format!("cannot resolve {}", host),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    const SECRET: &str = "hunter2";

    /// Minimal scripted endpoint: accepts [`SECRET`] and hands every other
    /// datagram to `respond`.
    async fn spawn_endpoint<F>(respond: F) -> SocketAddr
    where
        F: Fn(Packet) -> Vec<Packet> + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM_SIZE];
            while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
                let packet = Packet::decode(&buf[..len]).unwrap();
                let replies = match &packet {
                    Packet::Login(secret) => {
                        vec![Packet::login_response(&secret[..] == SECRET.as_bytes())]
                    }
                    _ => respond(packet),
                };
                for reply in replies {
                    socket.send_to(&reply.encode(), peer).await.unwrap();
                }
            }
        });

        addr
    }

    fn echo(packet: Packet) -> Vec<Packet> {
        match packet {
            Packet::Command { seq, payload } => vec![Packet::Command { seq, payload }],
            _ => vec![],
        }
    }

    async fn connect(addr: SocketAddr) -> RconResult<Session> {
        Session::connect(
            &addr.ip().to_string(),
            addr.port(),
            SECRET,
            Duration::from_millis(500),
        )
        .await
    }

    #[tokio::test]
    async fn test_connect_and_run() {
        let addr = spawn_endpoint(echo).await;
        let session = assert_ok!(connect(addr).await);

        assert!(session.is_authenticated());
        assert_eq!(session.last_sequence().await, None);
        assert_eq!(assert_ok!(session.run("players").await), "players");
        assert_eq!(session.last_sequence().await, Some(0));

        session.close().await;
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let addr = spawn_endpoint(echo).await;
        let result = Session::connect(
            &addr.ip().to_string(),
            addr.port(),
            "wrong",
            Duration::from_millis(500),
        )
        .await;

        assert!(matches!(result, Err(RconError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_fragments_reassembled_in_index_order() {
        let addr = spawn_endpoint(|packet| match packet {
            Packet::Command { seq, .. } => vec![
                Packet::fragment(seq, 3, 2, b"gamma"),
                Packet::fragment(seq, 3, 0, b"alpha "),
                Packet::fragment(seq, 3, 1, b"beta "),
            ],
            _ => vec![],
        })
        .await;
        let session = assert_ok!(connect(addr).await);

        assert_eq!(assert_ok!(session.run("bans").await), "alpha beta gamma");
    }

    #[tokio::test]
    async fn test_unanswered_command_times_out() {
        let addr = spawn_endpoint(|_| vec![]).await;
        let session = assert_ok!(connect(addr).await);

        let result = session.run("players").await;
        assert!(matches!(result, Err(RconError::Timeout(_))));
        assert!(assert_err!(session.run("players").await).is_transient());
    }

    #[tokio::test]
    async fn test_reauthenticates_after_server_reset() {
        let resets = Arc::new(StdMutex::new(1u32));
        let pending_resets = Arc::clone(&resets);

        let addr = spawn_endpoint(move |packet| match packet {
            Packet::Command { seq, payload } => {
                let mut left = pending_resets.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    vec![Packet::login_response(false)]
                } else {
                    vec![Packet::Command { seq, payload }]
                }
            }
            _ => vec![],
        })
        .await;
        let session = assert_ok!(connect(addr).await);

        assert_eq!(assert_ok!(session.run("players").await), "players");
        assert!(session.is_authenticated());
        assert_eq!(*resets.lock().unwrap(), 0);
        // First attempt and the retry each consumed a sequence number.
        assert_eq!(session.last_sequence().await, Some(1));
    }

    #[tokio::test]
    async fn test_server_message_is_acknowledged_and_published() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let session_task = tokio::spawn(async move {
            let session = connect(addr).await.unwrap();
            let mut messages = session.subscribe();
            let message = messages.recv().await.unwrap();
            session.close().await;
            message
        });

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
        assert!(matches!(Packet::decode(&buf[..len]), Ok(Packet::Login(_))));
        socket
            .send_to(&Packet::login_response(true).encode(), peer)
            .await
            .unwrap();

        // Give the client time to subscribe before the message arrives.
        tokio::time::sleep(Duration::from_millis(50)).await;
        socket
            .send_to(&Packet::message(9, "Player #1 connected").encode(), peer)
            .await
            .unwrap();

        let (len, _) = socket.recv_from(&mut buf).await.unwrap();
        assert_eq!(Packet::decode(&buf[..len]).unwrap(), Packet::ack(9));

        let message = session_task.await.unwrap();
        assert_eq!(message.seq, 9);
        assert_eq!(message.text, "Player #1 connected");
    }

    #[tokio::test]
    async fn test_kick_formats() {
        let addr = spawn_endpoint(echo).await;
        let session = assert_ok!(connect(addr).await);

        assert_eq!(assert_ok!(session.kick(3, None).await), "kick 3");
        assert_eq!(
            assert_ok!(session.kick(4, Some("Server restart.")).await),
            "kick 4 Server restart."
        );
        assert_eq!(assert_ok!(session.broadcast("hello").await), "say -1 hello");
        assert_eq!(assert_ok!(session.shutdown().await), "#shutdown");
    }

    #[tokio::test]
    async fn test_closed_session_rejects_requests() {
        let addr = spawn_endpoint(echo).await;
        let session = assert_ok!(connect(addr).await);

        session.stop();
        assert!(matches!(session.run("players").await, Err(RconError::Closed)));
    }

    #[tokio::test]
    async fn test_sweeps_continue_on_closed_session() {
        let addr = spawn_endpoint(echo).await;
        let session = assert_ok!(connect(addr).await);
        session.stop();

        let report = session.kick_all(3, None).await;
        assert_eq!(report.attempted, 3);
        assert_eq!(report.failed, vec![0, 1, 2]);

        let countdown = Countdown::new("{}", 2).with_tick(Duration::from_millis(5));
        assert!(!session.countdown(&countdown).await);
    }

    #[tokio::test]
    async fn test_stalled_resolution_times_out() {
        let stalled = std::future::pending::<io::Result<std::vec::IntoIter<SocketAddr>>>();
        let result = first_address("dayz.invalid", stalled, Duration::from_millis(50)).await;

        assert!(matches!(result, Err(RconError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_resolution_without_addresses() {
        let empty = async { Ok(Vec::<SocketAddr>::new().into_iter()) };
        let result = first_address("dayz.invalid", empty, Duration::from_millis(50)).await;

        assert!(matches!(result, Err(RconError::Connection(_))));
    }
}
