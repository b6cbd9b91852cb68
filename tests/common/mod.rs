//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use prince_x_userbot::commands::CommandHandler;
use prince_x_userbot::config::{AUTH_KEY_LEN, BotConfig, SessionString};
use prince_x_userbot::lifecycle::LifecycleMessage;
use prince_x_userbot::services::{CompletionBackend, CompletionError, Uptime};
use prince_x_userbot::telegram::{Conversation, MessageRef, TelegramError, UserInfo};

pub const TRIGGER: MessageRef = MessageRef(100);
pub const OWNER: i64 = 4242;
pub const ADMIN: i64 = 5151;

/// One outbound write observed by the fake chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reply(MessageRef, String),
    Edit(MessageRef, String),
}

/// In-memory chat recording every write.
pub struct FakeConversation {
    pub outgoing: bool,
    pub sender: Option<UserInfo>,
    pub me: Option<UserInfo>,
    pub fail_writes: bool,
    actions: Mutex<Vec<Action>>,
    next_id: Mutex<i32>,
}

impl FakeConversation {
    /// A command typed by the account owner.
    pub fn outgoing() -> Self {
        let me = UserInfo {
            id: OWNER,
            first_name: "Prince".to_owned(),
        };
        Self {
            outgoing: true,
            sender: Some(me.clone()),
            me: Some(me),
            fail_writes: false,
            actions: Mutex::new(Vec::new()),
            next_id: Mutex::new(TRIGGER.0 + 1),
        }
    }

    /// A command sent by someone else.
    pub fn incoming(sender_id: i64, name: &str) -> Self {
        Self {
            outgoing: false,
            sender: Some(UserInfo {
                id: sender_id,
                first_name: name.to_owned(),
            }),
            ..Self::outgoing()
        }
    }

    /// Fails every "who am I" call.
    pub fn without_identity(mut self) -> Self {
        self.me = None;
        self
    }

    /// Fails every write.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<(MessageRef, String)> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Edit(target, text) => Some((target, text)),
                Action::Reply(..) => None,
            })
            .collect()
    }

    /// Text of the last write, whatever its kind.
    pub fn last_text(&self) -> String {
        match self.actions().last() {
            Some(Action::Reply(_, text) | Action::Edit(_, text)) => text.clone(),
            None => String::new(),
        }
    }
}

#[async_trait]
impl Conversation for FakeConversation {
    fn trigger(&self) -> MessageRef {
        TRIGGER
    }

    fn is_outgoing(&self) -> bool {
        self.outgoing
    }

    fn sender_id(&self) -> Option<i64> {
        self.sender.as_ref().map(|s| s.id)
    }

    async fn sender(&self) -> Result<UserInfo, TelegramError> {
        self.sender
            .clone()
            .ok_or_else(|| TelegramError::Invocation("no sender".to_owned()))
    }

    async fn reply(&self, text: &str) -> Result<MessageRef, TelegramError> {
        if self.fail_writes {
            return Err(TelegramError::Connection("offline".to_owned()));
        }
        let mut next_id = self.next_id.lock().unwrap();
        let id = MessageRef(*next_id);
        *next_id += 1;
        self.actions
            .lock()
            .unwrap()
            .push(Action::Reply(id, text.to_owned()));
        Ok(id)
    }

    async fn edit(&self, message: MessageRef, text: &str) -> Result<(), TelegramError> {
        if self.fail_writes {
            return Err(TelegramError::Connection("offline".to_owned()));
        }
        self.actions
            .lock()
            .unwrap()
            .push(Action::Edit(message, text.to_owned()));
        Ok(())
    }

    async fn whoami(&self) -> Result<UserInfo, TelegramError> {
        self.me
            .clone()
            .ok_or_else(|| TelegramError::Connection("connection reset".to_owned()))
    }
}

/// Completion backend returning a canned answer and counting calls.
pub struct FakeCompletion {
    pub answer: Result<String, u16>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCompletion {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Ok(answer.to_owned()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for FakeCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push(prompt.to_owned());
        match &self.answer {
            Ok(answer) => Ok(answer.clone()),
            Err(status) => Err(CompletionError::Status(
                reqwest::StatusCode::from_u16(*status).unwrap(),
            )),
        }
    }
}

pub fn session_string() -> String {
    SessionString {
        dc_id: 2,
        address: "149.154.167.51:443".parse().unwrap(),
        auth_key: [9u8; AUTH_KEY_LEN],
    }
    .encode()
}

/// Configuration with an owner and one admin, plus extra variables.
pub fn config_with(extra: &[(&'static str, &str)]) -> BotConfig {
    let mut env: HashMap<&'static str, String> = HashMap::from([
        ("API_ID", "12345".to_owned()),
        ("API_HASH", "abc123".to_owned()),
        ("SESSION_STRING", session_string()),
        ("OWNER_ID", OWNER.to_string()),
        ("ADMIN_IDS", ADMIN.to_string()),
    ]);
    for (key, value) in extra {
        env.insert(*key, (*value).to_owned());
    }
    BotConfig::from_lookup(|key| env.get(key).cloned()).unwrap()
}

/// Handler wired to the given completion backend.
pub fn handler_with(
    config: BotConfig,
    completion: Arc<dyn CompletionBackend>,
) -> (CommandHandler, mpsc::Receiver<LifecycleMessage>) {
    let (tx, rx) = mpsc::channel(4);
    let handler = CommandHandler::new(Arc::new(config), completion, Uptime::start(), tx).unwrap();
    (handler, rx)
}

/// Serves exactly one HTTP request with a canned response.
///
/// Returns the base URL and a handle yielding the raw request text.
pub async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (format!("http://{addr}/v1"), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
