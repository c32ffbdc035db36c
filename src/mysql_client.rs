use crate::error::Result;

/// Outcome of a statement issued through the proxy chain. Statement preparation and result-set
/// iteration are out of scope (spec §1): this only carries what the engines and tests need to
/// observe that a call went through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutcome {
    pub affected_rows: u64,
}

/// The native database handle: a physical connection to one cluster instance.
///
/// This is the `Handle` of spec §3: owned by exactly one `ProxyLink` at a time, destroyed on
/// link destruction or explicit discard. Only the interface matters here (spec §1) — this crate
/// never implements the MySQL wire protocol.
pub trait MysqlClient: Send {
    fn query(&mut self, sql: &str) -> Result<QueryOutcome>;

    fn real_query(&mut self, sql: &str) -> Result<QueryOutcome> {
        self.query(sql)
    }

    fn ping(&mut self) -> Result<()>;

    fn autocommit(&mut self, enabled: bool) -> Result<()>;

    fn change_user(&mut self, user: &str, password: &str, database: &str) -> Result<()>;

    fn select_db(&mut self, database: &str) -> Result<()>;

    fn set_character_set(&mut self, charset: &str) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// The live native error, if any (post-failover-sentinel fallback, spec §4.3).
    fn error(&self) -> Option<String>;

    fn error_code(&self) -> u32;

    fn sqlstate(&self) -> &str;

    /// Whether a transaction is currently open on this handle. Consulted at the moment a
    /// network-class failure is observed to decide between `08S02`/`08S01` and `08007`.
    fn has_open_transaction(&self) -> bool;
}
