use crate::error::Result;
use crate::mysql_client::{MysqlClient, QueryOutcome};
use crate::proxy::{CustomErrorSlot, ProxyLink};

/// The chain's terminal link: owns the real connection handle and forwards every operation to
/// it. Grounded on the original's `CONNECTION_PROXY` base case, where the innermost proxy holds
/// the native `MYSQL*` and every call is a one-line delegation.
pub struct TerminalLink {
    handle: Option<Box<dyn MysqlClient>>,
    errors: CustomErrorSlot,
}

impl TerminalLink {
    pub fn new(handle: Box<dyn MysqlClient>) -> Self {
        TerminalLink {
            handle: Some(handle),
            errors: CustomErrorSlot::new(),
        }
    }

    fn handle_mut(&mut self) -> Result<&mut dyn MysqlClient> {
        self.handle
            .as_deref_mut()
            .ok_or(crate::error::Error::NoConnection)
    }
}

impl ProxyLink for TerminalLink {
    fn query(&mut self, sql: &str) -> Result<QueryOutcome> {
        self.handle_mut()?.query(sql)
    }

    fn real_query(&mut self, sql: &str) -> Result<QueryOutcome> {
        self.handle_mut()?.real_query(sql)
    }

    fn ping(&mut self) -> Result<()> {
        self.handle_mut()?.ping()
    }

    fn autocommit(&mut self, enabled: bool) -> Result<()> {
        self.handle_mut()?.autocommit(enabled)
    }

    fn change_user(&mut self, user: &str, password: &str, database: &str) -> Result<()> {
        self.handle_mut()?.change_user(user, password, database)
    }

    fn select_db(&mut self, database: &str) -> Result<()> {
        self.handle_mut()?.select_db(database)
    }

    fn set_character_set(&mut self, charset: &str) -> Result<()> {
        self.handle_mut()?.set_character_set(charset)
    }

    fn close(&mut self) -> Result<()> {
        match self.handle.as_mut() {
            Some(h) => h.close(),
            None => Ok(()),
        }
    }

    fn error(&self) -> Option<String> {
        if let Some((sentinel, message)) = self.errors.take() {
            return Some(format!("{} {}", sentinel.code(), message));
        }
        self.handle.as_ref().and_then(|h| h.error())
    }

    fn error_code(&self) -> u32 {
        self.handle.as_ref().map(|h| h.error_code()).unwrap_or(0)
    }

    fn sqlstate(&self) -> String {
        if let Some((sentinel, _)) = self.errors.take() {
            return sentinel.code().to_string();
        }
        self.handle
            .as_ref()
            .map(|h| h.sqlstate().to_string())
            .unwrap_or_else(|| "00000".to_string())
    }

    fn has_open_transaction(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| h.has_open_transaction())
            .unwrap_or(false)
    }

    /// The terminal link is always the bottom of the chain; it never takes a successor, so every
    /// call here hits the already-linked invariant.
    fn set_next(&mut self, _next: Box<dyn ProxyLink>) -> Result<()> {
        Err(crate::error::Error::AlreadyLinked)
    }

    /// Takes the held handle, leaving this link empty. Used by `FailoverProxyLink` when swapping
    /// in a freshly-failed-over connection (spec §4.8 "handle replacement").
    fn move_handle(&mut self) -> Option<Box<dyn MysqlClient>> {
        self.handle.take()
    }

    fn set_connection(&mut self, handle: Box<dyn MysqlClient>) {
        self.handle = Some(handle);
    }
}
