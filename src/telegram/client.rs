//! Telegram client wrapper built on grammers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use grammers_client::client::UpdatesConfiguration;
use grammers_client::message::Message;
use grammers_client::update::Update;
use grammers_client::{Client, InvocationError, SenderPool, SignInError, sender};
use grammers_session::Session;
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::conversation::{Conversation, MessageRef, UserInfo};
use crate::config::{BotConfig, SessionString, SessionStringError};

/// Capacity of the channel carrying new messages to the dispatcher.
const INCOMING_CAPACITY: usize = 64;

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Not authorized. The session string is expired or revoked.")]
    NotAuthorized,

    #[error("Bot sign in failed: {0}")]
    SignInFailed(String),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Chat {0} not found among dialogs")]
    ChatNotFound(i64),

    #[error("Message {0} is not known in this chat")]
    UnknownMessage(i32),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        let err_str = err.to_string();

        if (err_str.contains("FLOOD_WAIT") || err_str.contains("flood"))
            && let Some(seconds) = extract_flood_wait_seconds(&err_str)
        {
            return Self::FloodWait(seconds);
        }

        Self::Invocation(err_str)
    }
}

impl From<SessionStringError> for TelegramError {
    fn from(err: SessionStringError) -> Self {
        Self::Session(err.to_string())
    }
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["FLOOD_WAIT_", "flood wait "];

    for pattern in patterns {
        if let Some(idx) = err_msg
            .to_ascii_lowercase()
            .find(&pattern.to_ascii_lowercase())
        {
            let start = idx + pattern.len();
            let num_str: String = err_msg[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// High-level Telegram client wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// New messages, until taken by the dispatcher.
    incoming: Mutex<Option<mpsc::Receiver<Message>>>,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects the userbot using the configured string session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be imported, the connection
    /// fails, or the session is no longer authorized.
    pub async fn connect(config: &BotConfig) -> Result<Self, TelegramError> {
        info!(
            "Connecting to Telegram ({} on port {})...",
            config.connection.mode, config.connection.port
        );

        let imported = config.credentials.session()?;
        let session = open_session(&config.session_path).await?;
        import_string_session(&session, &imported, config.connection.port).await?;

        let bot = Self::start(session, config.credentials.api_id, true);

        if !bot.is_authorized().await? {
            return Err(TelegramError::NotAuthorized);
        }

        info!("Connected to Telegram (DC {})", imported.dc_id);
        Ok(bot)
    }

    /// Connects the assistant bot with a bot token.
    ///
    /// The assistant uses its own session file next to the userbot's and
    /// does not listen for updates.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or sign in fails.
    pub async fn connect_assistant(
        config: &BotConfig,
        bot_token: &str,
    ) -> Result<Self, TelegramError> {
        let path = config.session_path.with_extension("bot.session");
        let session = open_session(&path).await?;
        let bot = Self::start(session, config.credentials.api_id, false);

        if !bot.is_authorized().await? {
            debug!("Signing in assistant bot...");
            bot.client
                .bot_sign_in(bot_token, &config.credentials.api_hash)
                .await
                .map_err(|e| match e {
                    SignInError::Other(e) => TelegramError::from(e),
                    e => TelegramError::SignInFailed(e.to_string()),
                })?;
        }

        Ok(bot)
    }

    fn start(session: Arc<SqliteSession>, api_id: i32, listen: bool) -> Self {
        let SenderPool {
            runner,
            updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let incoming = if listen {
            let (tx, rx) = mpsc::channel(INCOMING_CAPACITY);
            let mut stream = client.stream_updates(
                updates,
                UpdatesConfiguration {
                    catch_up: false,
                    ..Default::default()
                },
            );
            tokio::spawn(async move {
                loop {
                    match stream.next().await {
                        Ok(Update::NewMessage(message)) => {
                            if tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Update stream ended: {}", e);
                            break;
                        }
                    }
                }
            });
            Some(rx)
        } else {
            None
        };

        Self {
            client,
            handle: handle.thin,
            incoming: Mutex::new(incoming),
            _pool_task: pool_task,
        }
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Takes the stream of new messages. Returns `None` after the first call.
    pub async fn take_incoming(&self) -> Option<mpsc::Receiver<Message>> {
        self.incoming.lock().await.take()
    }

    /// Fetches the logged-in account.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn whoami(&self) -> Result<UserInfo, TelegramError> {
        let request = tl::functions::users::GetUsers {
            id: vec![tl::enums::InputUser::UserSelf],
        };

        let users = self.client.invoke(&request).await?;
        match users.into_iter().next() {
            Some(tl::enums::User::User(user)) => Ok(UserInfo {
                id: user.id,
                first_name: user.first_name.unwrap_or_default(),
            }),
            Some(tl::enums::User::Empty(user)) => Ok(UserInfo {
                id: user.id,
                first_name: String::new(),
            }),
            None => Err(TelegramError::Invocation("users.getUsers returned nothing".to_owned())),
        }
    }

    /// Sends a plain text message to a chat given by its Bot API style ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat is not among the account's dialogs or
    /// sending fails.
    pub async fn send_to_chat(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await? {
            let peer = dialog.peer();
            if peer.id().bot_api_dialog_id() == chat_id {
                self.client.send_message(peer, text).await?;
                return Ok(());
            }
        }
        Err(TelegramError::ChatNotFound(chat_id))
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot").finish_non_exhaustive()
    }
}

async fn open_session(path: &Path) -> Result<Arc<SqliteSession>, TelegramError> {
    let session = SqliteSession::open(path)
        .await
        .map_err(|e| TelegramError::Session(e.to_string()))?;
    Ok(Arc::new(session))
}

/// Writes the string session's auth key and address into the session
/// storage, making its data center the home one.
async fn import_string_session(
    session: &SqliteSession,
    imported: &SessionString,
    port: u16,
) -> Result<(), TelegramError> {
    let mut option = session.dc_option(imported.dc_id).ok_or_else(|| {
        TelegramError::Session(format!("unknown data center {}", imported.dc_id))
    })?;

    match imported.address_with_port(port) {
        SocketAddr::V4(addr) => {
            option.ipv4 = addr;
            option.ipv6.set_port(port);
        }
        SocketAddr::V6(addr) => {
            option.ipv6 = addr;
            option.ipv4.set_port(port);
        }
    }
    option.auth_key = Some(imported.auth_key);

    session.set_dc_option(&option).await;
    session.set_home_dc_id(imported.dc_id).await;
    debug!("Imported string session for DC {}", imported.dc_id);
    Ok(())
}

/// A new message wrapped for command handlers.
pub struct TelegramConversation {
    bot: Arc<TelegramBot>,
    trigger: Message,
    /// Messages sent as replies, kept so they can be edited.
    sent: Mutex<HashMap<i32, Message>>,
}

impl TelegramConversation {
    pub fn new(bot: Arc<TelegramBot>, trigger: Message) -> Self {
        Self {
            bot,
            trigger,
            sent: Mutex::new(HashMap::new()),
        }
    }

    /// Text of the triggering message.
    pub fn text(&self) -> &str {
        self.trigger.text()
    }
}

#[async_trait]
impl Conversation for TelegramConversation {
    fn trigger(&self) -> MessageRef {
        MessageRef(self.trigger.id())
    }

    fn is_outgoing(&self) -> bool {
        self.trigger.outgoing()
    }

    fn sender_id(&self) -> Option<i64> {
        self.trigger.sender().map(|peer| peer.id().bare_id())
    }

    async fn sender(&self) -> Result<UserInfo, TelegramError> {
        if self.trigger.outgoing() {
            return self.bot.whoami().await;
        }

        let peer = self
            .trigger
            .sender()
            .ok_or_else(|| TelegramError::Invocation("message has no sender".to_owned()))?;
        Ok(UserInfo {
            id: peer.id().bare_id(),
            first_name: peer.name().unwrap_or_default().to_owned(),
        })
    }

    async fn reply(&self, text: &str) -> Result<MessageRef, TelegramError> {
        let sent = self.trigger.reply(text).await?;
        let id = sent.id();
        self.sent.lock().await.insert(id, sent);
        Ok(MessageRef(id))
    }

    async fn edit(&self, message: MessageRef, text: &str) -> Result<(), TelegramError> {
        if message == self.trigger() {
            self.trigger.edit(text).await?;
            return Ok(());
        }

        let sent = self.sent.lock().await;
        let target = sent
            .get(&message.0)
            .ok_or(TelegramError::UnknownMessage(message.0))?;
        target.edit(text).await?;
        Ok(())
    }

    async fn whoami(&self) -> Result<UserInfo, TelegramError> {
        self.bot.whoami().await
    }
}
