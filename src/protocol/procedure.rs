//! Procedure numbers.
//!
//! Numbers are grouped in families by their hundreds digit. The values are
//! fixed: existing driver executables depend on them.

use std::fmt;

/// Procedure family, derived from the number's hundreds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Version,
    Database,
    Cursor,
    Transaction,
    Table,
    Index,
}

/// A numbered driver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    Version,

    CloseDatabase,
    CreateDatabase,
    DeleteDatabase,
    FindDatabase,
    ListDatabases,
    OpenDatabase,
    ShutdownDriver,

    CloseCursor,
    Delete,
    Fetch,
    Insert,
    OpenInsertCursor,
    OpenSelectCursor,
    OpenUpdateCursor,
    Update,
    Rows,
    SelectCatVal,
    BindUpdate,
    BindInsert,

    ExecuteImmediate,
    BeginTransaction,
    CommitTransaction,

    CreateTable,
    DescribeTable,
    DropTable,
    ListTables,
    AddColumn,
    DropColumn,
    GrantOnTable,

    CreateIndex,
    ListIndexes,
    DropIndex,
}

impl Procedure {
    pub const ALL: [Procedure; 33] = [
        Procedure::Version,
        Procedure::CloseDatabase,
        Procedure::CreateDatabase,
        Procedure::DeleteDatabase,
        Procedure::FindDatabase,
        Procedure::ListDatabases,
        Procedure::OpenDatabase,
        Procedure::ShutdownDriver,
        Procedure::CloseCursor,
        Procedure::Delete,
        Procedure::Fetch,
        Procedure::Insert,
        Procedure::OpenInsertCursor,
        Procedure::OpenSelectCursor,
        Procedure::OpenUpdateCursor,
        Procedure::Update,
        Procedure::Rows,
        Procedure::SelectCatVal,
        Procedure::BindUpdate,
        Procedure::BindInsert,
        Procedure::ExecuteImmediate,
        Procedure::BeginTransaction,
        Procedure::CommitTransaction,
        Procedure::CreateTable,
        Procedure::DescribeTable,
        Procedure::DropTable,
        Procedure::ListTables,
        Procedure::AddColumn,
        Procedure::DropColumn,
        Procedure::GrantOnTable,
        Procedure::CreateIndex,
        Procedure::ListIndexes,
        Procedure::DropIndex,
    ];

    /// Wire number of the procedure.
    pub const fn code(self) -> i32 {
        match self {
            Procedure::Version => 999,

            Procedure::CloseDatabase => 101,
            Procedure::CreateDatabase => 102,
            Procedure::DeleteDatabase => 103,
            Procedure::FindDatabase => 104,
            Procedure::ListDatabases => 105,
            Procedure::OpenDatabase => 106,
            Procedure::ShutdownDriver => 107,

            Procedure::CloseCursor => 201,
            Procedure::Delete => 202,
            Procedure::Fetch => 203,
            Procedure::Insert => 204,
            Procedure::OpenInsertCursor => 205,
            Procedure::OpenSelectCursor => 206,
            Procedure::OpenUpdateCursor => 207,
            Procedure::Update => 208,
            Procedure::Rows => 209,
            Procedure::SelectCatVal => 210,
            Procedure::BindUpdate => 220,
            Procedure::BindInsert => 221,

            Procedure::ExecuteImmediate => 301,
            Procedure::BeginTransaction => 302,
            Procedure::CommitTransaction => 303,

            Procedure::CreateTable => 401,
            Procedure::DescribeTable => 402,
            Procedure::DropTable => 403,
            Procedure::ListTables => 404,
            Procedure::AddColumn => 405,
            Procedure::DropColumn => 406,
            Procedure::GrantOnTable => 407,

            Procedure::CreateIndex => 701,
            Procedure::ListIndexes => 702,
            Procedure::DropIndex => 703,
        }
    }

    /// Look up a procedure by wire number.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.code() == code)
    }

    pub fn family(self) -> Family {
        match self.code() {
            999 => Family::Version,
            100..=199 => Family::Database,
            200..=299 => Family::Cursor,
            300..=399 => Family::Transaction,
            400..=499 => Family::Table,
            _ => Family::Index,
        }
    }

    /// Procedures that only make sense against an open database.
    pub fn needs_open_database(self) -> bool {
        matches!(
            self.family(),
            Family::Cursor | Family::Transaction | Family::Table | Family::Index
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Procedure::Version => "VERSION",
            Procedure::CloseDatabase => "CLOSE_DATABASE",
            Procedure::CreateDatabase => "CREATE_DATABASE",
            Procedure::DeleteDatabase => "DELETE_DATABASE",
            Procedure::FindDatabase => "FIND_DATABASE",
            Procedure::ListDatabases => "LIST_DATABASES",
            Procedure::OpenDatabase => "OPEN_DATABASE",
            Procedure::ShutdownDriver => "SHUTDOWN_DRIVER",
            Procedure::CloseCursor => "CLOSE_CURSOR",
            Procedure::Delete => "DELETE",
            Procedure::Fetch => "FETCH",
            Procedure::Insert => "INSERT",
            Procedure::OpenInsertCursor => "OPEN_INSERT_CURSOR",
            Procedure::OpenSelectCursor => "OPEN_SELECT_CURSOR",
            Procedure::OpenUpdateCursor => "OPEN_UPDATE_CURSOR",
            Procedure::Update => "UPDATE",
            Procedure::Rows => "ROWS",
            Procedure::SelectCatVal => "SELECT_CATVAL",
            Procedure::BindUpdate => "BIND_UPDATE",
            Procedure::BindInsert => "BIND_INSERT",
            Procedure::ExecuteImmediate => "EXECUTE_IMMEDIATE",
            Procedure::BeginTransaction => "BEGIN_TRANSACTION",
            Procedure::CommitTransaction => "COMMIT_TRANSACTION",
            Procedure::CreateTable => "CREATE_TABLE",
            Procedure::DescribeTable => "DESCRIBE_TABLE",
            Procedure::DropTable => "DROP_TABLE",
            Procedure::ListTables => "LIST_TABLES",
            Procedure::AddColumn => "ADD_COLUMN",
            Procedure::DropColumn => "DROP_COLUMN",
            Procedure::GrantOnTable => "GRANT_ON_TABLE",
            Procedure::CreateIndex => "CREATE_INDEX",
            Procedure::ListIndexes => "LIST_INDEXES",
            Procedure::DropIndex => "DROP_INDEX",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}
