mod terminal;
mod failover_proxy;

pub use terminal::TerminalLink;
pub use failover_proxy::FailoverProxyLink;

use crate::error::{Result, Sentinel};
use crate::mysql_client::QueryOutcome;
use parking_lot::Mutex;

/// One link in the chain-of-responsibility wrapping a real connection handle (spec §4.3 /
/// §4.8).
///
/// Grounded on the original's `CONNECTION_PROXY`: every non-intercepting operation is a plain
/// forward to the next link. `FailoverProxyLink` is the one link in this crate that actually
/// intercepts; everything else just needs somewhere to delegate to, which is what
/// [`TerminalLink`] is for.
///
/// Only the subset of operations the failover layer needs to observe or rewrite is modeled here
/// (spec §1 explicitly scopes statement preparation/execution/binding and result iteration out —
/// those stay on whatever native handle a `MysqlClient` implementation wraps).
pub trait ProxyLink: Send {
    fn query(&mut self, sql: &str) -> Result<QueryOutcome>;
    fn real_query(&mut self, sql: &str) -> Result<QueryOutcome>;
    fn ping(&mut self) -> Result<()>;
    fn autocommit(&mut self, enabled: bool) -> Result<()>;
    fn change_user(&mut self, user: &str, password: &str, database: &str) -> Result<()>;
    fn select_db(&mut self, database: &str) -> Result<()>;
    fn set_character_set(&mut self, charset: &str) -> Result<()>;
    fn close(&mut self) -> Result<()>;

    /// Last error message. A link with a pending [`CustomErrorSlot`] entry answers from there
    /// before ever asking the next link (spec §4.8: "a link with a pending custom message answers
    /// from it exactly once, then forwards again").
    fn error(&self) -> Option<String>;
    fn error_code(&self) -> u32;
    fn sqlstate(&self) -> String;

    fn has_open_transaction(&self) -> bool;

    /// Links a successor onto this node. Every link in this crate is fully assembled by its
    /// constructor, so by the time a caller can reach a live `ProxyLink` it already has whatever
    /// successor it will ever have — `set_next` therefore always finds a node already linked and
    /// returns `Error::AlreadyLinked`, leaving the existing chain untouched (spec §4.3 / §7 item
    /// 4, grounded on `CONNECTION_PROXY::set_next_proxy`'s `throw std::runtime_error("There is
    /// already a next proxy present!")` guard).
    fn set_next(&mut self, next: Box<dyn ProxyLink>) -> Result<()>;

    /// Takes the handle held by the terminal link at the bottom of the chain, walking through
    /// any intermediate links. Used when swapping in a freshly-failed-over connection.
    fn move_handle(&mut self) -> Option<Box<dyn crate::mysql_client::MysqlClient>>;

    /// Installs a new handle at the terminal link at the bottom of the chain.
    fn set_connection(&mut self, handle: Box<dyn crate::mysql_client::MysqlClient>);
}

/// A one-shot error override a link can arm to surface a sentinel SQLSTATE to the caller on the
/// very next `error()`/`error_code()`/`sqlstate()` poll, then fall back to forwarding (spec
/// §4.8, grounded on `CONNECTION_PROXY::has_custom_error_message`).
#[derive(Default)]
pub struct CustomErrorSlot {
    pending: Mutex<Option<(Sentinel, String)>>,
}

impl CustomErrorSlot {
    pub fn new() -> Self {
        CustomErrorSlot {
            pending: Mutex::new(None),
        }
    }

    pub fn arm(&self, sentinel: Sentinel, message: impl Into<String>) {
        *self.pending.lock() = Some((sentinel, message.into()));
    }

    /// Takes the pending entry, if any is armed. Leaves the slot empty either way — the override
    /// is surfaced exactly once.
    pub fn take(&self) -> Option<(Sentinel, String)> {
        self.pending.lock().take()
    }

    pub fn is_armed(&self) -> bool {
        self.pending.lock().is_some()
    }
}
