use std::{
    collections::HashMap,
    fmt,
    ops::{Deref, DerefMut},
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use log::debug;

use crate::{
    Error, Statement,
    error::ExtendResult,
    handles::{Backend, ColumnMetadata, Value},
    options::ConnectionOptions,
};

/// Identifies a statement within its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementId(pub u64);

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The row a cursor currently points to, published under the name of the cursor, so positioned
/// `UPDATE` and `DELETE` statements of other statements can refer to it.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorSnapshot {
    /// Name of the cursor the snapshot belongs to.
    pub cursor_name: String,
    pub catalog: String,
    pub table: String,
    pub columns: Vec<ColumnMetadata>,
    /// Values of the current row, one per column.
    pub row: Vec<Value>,
    /// A positioned `DELETE` removed the row. The cursor must re-synchronize on its next scroll.
    pub pending_reset: bool,
}

impl CursorSnapshot {
    /// Indices of the columns identifying a row. Empty if no unique index is known.
    pub fn key_columns(&self) -> Vec<usize> {
        key_columns(&self.columns)
    }
}

/// Indices of the primary key columns, or if there are none, of the unique key columns.
pub(crate) fn key_columns(columns: &[ColumnMetadata]) -> Vec<usize> {
    let primary: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, column)| column.primary_key)
        .map(|(index, _)| index)
        .collect();
    if !primary.is_empty() {
        return primary;
    }
    columns
        .iter()
        .enumerate()
        .filter(|(_, column)| column.unique_key)
        .map(|(index, _)| index)
        .collect()
}

/// State shared by all statements of a connection.
struct Session<B> {
    backend: B,
    /// Statement whose result is currently read from the wire.
    streamer: Option<StatementId>,
    /// Cursor names explicitly set by the application.
    cursor_names: HashMap<StatementId, String>,
    snapshots: HashMap<StatementId, CursorSnapshot>,
}

/// A connection to the database server. Statements borrow the connection they are allocated on.
///
/// Only one statement may stream a result over the connection at any time. Every other operation
/// requiring a round trip first makes the streaming statement cache the rest of its result.
pub struct Connection<B: Backend> {
    session: Mutex<Session<B>>,
    options: ConnectionOptions,
    next_statement_id: AtomicU64,
}

impl<B: Backend> Connection<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, ConnectionOptions::default())
    }

    pub fn with_options(backend: B, options: ConnectionOptions) -> Self {
        Connection {
            session: Mutex::new(Session {
                backend,
                streamer: None,
                cursor_names: HashMap::new(),
                snapshots: HashMap::new(),
            }),
            options,
            next_statement_id: AtomicU64::new(1),
        }
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Allocates a new statement on this connection.
    pub fn allocate_statement(&self) -> Statement<'_, B> {
        let id = StatementId(self.next_statement_id.fetch_add(1, Ordering::Relaxed));
        Statement::new(self, id)
    }

    /// Acquires the connection for the duration of one exchange with the server.
    ///
    /// The lock is not reentrant. A statement must not hold it while calling into another
    /// statement of the same connection.
    pub fn lock(&self) -> ConnectionGuard<'_, B> {
        ConnectionGuard {
            // A panic while holding the lock leaves no invariant of the session broken, which the
            // next call could not cope with.
            session: self.session.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Consumes the connection and returns the backend.
    pub fn into_backend(self) -> B {
        self.session
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .backend
    }
}

/// Scoped access to the connection. Dereferences to the backend.
pub struct ConnectionGuard<'c, B> {
    session: MutexGuard<'c, Session<B>>,
}

impl<B: Backend> ConnectionGuard<'_, B> {
    pub fn current_streamer(&self) -> Option<StatementId> {
        self.session.streamer
    }

    /// Makes the streaming statement, if any, cache the rest of its result and frees the streamer
    /// slot.
    pub fn force_materialize_streamer(&mut self) -> Result<(), Error> {
        if let Some(streamer) = self.session.streamer {
            let cached = self
                .session
                .backend
                .cache_rest_of_stream()
                .backend_call("cache_rest_of_stream")?;
            debug!("Statement {streamer} cached the remaining {cached} rows of its result.");
            self.session.streamer = None;
        }
        Ok(())
    }

    /// Like [`Self::force_materialize_streamer`], but leaves the stream of `statement` alone.
    pub fn drain_other_streamer(&mut self, statement: StatementId) -> Result<(), Error> {
        match self.session.streamer {
            Some(streamer) if streamer != statement => self.force_materialize_streamer(),
            _ => Ok(()),
        }
    }

    pub(crate) fn set_streamer(&mut self, statement: StatementId) {
        self.session.streamer = Some(statement);
    }

    /// Frees the streamer slot, if it is held by `statement`.
    pub(crate) fn release_streamer(&mut self, statement: StatementId) {
        if self.session.streamer == Some(statement) {
            self.session.streamer = None;
        }
    }

    /// Registers `name` as cursor name of `statement`. Names are unique per connection and compared
    /// case-insensitively.
    pub(crate) fn claim_cursor_name(
        &mut self,
        statement: StatementId,
        name: &str,
    ) -> Result<(), Error> {
        let taken = self
            .session
            .cursor_names
            .iter()
            .any(|(&owner, other)| owner != statement && other.eq_ignore_ascii_case(name));
        if taken {
            return Err(Error::InvalidCursorName(name.to_owned()));
        }
        self.session
            .cursor_names
            .insert(statement, name.to_owned());
        if let Some(snapshot) = self.session.snapshots.get_mut(&statement) {
            snapshot.cursor_name = name.to_owned();
        }
        Ok(())
    }

    pub(crate) fn release_cursor_name(&mut self, statement: StatementId) {
        self.session.cursor_names.remove(&statement);
    }

    pub(crate) fn publish_snapshot(&mut self, statement: StatementId, snapshot: CursorSnapshot) {
        self.session.snapshots.insert(statement, snapshot);
    }

    pub(crate) fn discard_snapshot(&mut self, statement: StatementId) {
        self.session.snapshots.remove(&statement);
    }

    /// Row image published under the cursor name `name`.
    pub fn snapshot(&self, name: &str) -> Option<&CursorSnapshot> {
        self.session
            .snapshots
            .values()
            .find(|snapshot| snapshot.cursor_name.eq_ignore_ascii_case(name))
    }

    /// Marks the cursor `name` for re-synchronization after its current row has been deleted.
    pub(crate) fn mark_for_reset(&mut self, name: &str) {
        if let Some(snapshot) = self
            .session
            .snapshots
            .values_mut()
            .find(|snapshot| snapshot.cursor_name.eq_ignore_ascii_case(name))
        {
            snapshot.pending_reset = true;
        }
    }

    /// `true` if the cursor of `statement` has been marked for reset. Clears the mark.
    pub(crate) fn take_reset(&mut self, statement: StatementId) -> bool {
        self.session
            .snapshots
            .get_mut(&statement)
            .is_some_and(|snapshot| std::mem::take(&mut snapshot.pending_reset))
    }

    /// Puts back a mark taken with [`Self::take_reset`], after the re-synchronization failed.
    pub(crate) fn restore_reset(&mut self, statement: StatementId) {
        if let Some(snapshot) = self.session.snapshots.get_mut(&statement) {
            snapshot.pending_reset = true;
        }
    }
}

impl<B> Deref for ConnectionGuard<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.session.backend
    }
}

impl<B> DerefMut for ConnectionGuard<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.session.backend
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        handles::ColumnMetadata,
        sys::SqlDataType,
    };

    use super::key_columns;

    #[test]
    fn primary_key_wins_over_unique_key() {
        let columns = [
            ColumnMetadata::new("code", SqlDataType::Varchar, "t").unique_key(),
            ColumnMetadata::new("id", SqlDataType::Integer, "t").primary_key(),
            ColumnMetadata::new("v", SqlDataType::Integer, "t"),
        ];

        assert_eq!(vec![1], key_columns(&columns));
    }

    #[test]
    fn no_key() {
        let columns = [ColumnMetadata::new("v", SqlDataType::Integer, "t")];

        assert!(key_columns(&columns).is_empty());
    }
}
