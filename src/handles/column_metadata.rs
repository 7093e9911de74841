use crate::sys::SqlDataType;

/// Indicates whether a column might hold `NULL`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Nullability {
    /// Indicates that we do not know whether the column is Nullable or not.
    #[default]
    Unknown,
    /// The column may hold NULL values.
    Nullable,
    /// The column can not hold NULL values.
    NoNulls,
}

/// Describes a result column as reported by the backend. This is what an implementation row
/// descriptor holds.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ColumnMetadata {
    /// Column label, as used in the select list.
    pub name: String,
    /// Name of the column in its base table. Empty for expressions.
    pub org_name: String,
    /// Name of the base table. Empty for expressions.
    pub org_table: String,
    /// Schema (database) of the base table.
    pub catalog: String,
    pub sql_type: SqlDataType,
    pub column_size: usize,
    pub decimal_digits: i16,
    /// Maximum length of a value in bytes.
    pub octet_length: usize,
    pub nullability: Nullability,
    pub unsigned: bool,
    /// Column is part of the primary key of its base table.
    pub primary_key: bool,
    /// Column is part of a unique index of its base table.
    pub unique_key: bool,
}

impl ColumnMetadata {
    /// Column `name` of type `sql_type` belonging to `table`.
    pub fn new(name: &str, sql_type: SqlDataType, table: &str) -> Self {
        ColumnMetadata {
            name: name.to_owned(),
            org_name: name.to_owned(),
            org_table: table.to_owned(),
            sql_type,
            octet_length: default_octet_length(sql_type),
            nullability: Nullability::Nullable,
            ..ColumnMetadata::default()
        }
    }

    pub fn with_catalog(mut self, catalog: &str) -> Self {
        self.catalog = catalog.to_owned();
        self
    }

    pub fn with_octet_length(mut self, octet_length: usize) -> Self {
        self.octet_length = octet_length;
        self.column_size = octet_length;
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullability = Nullability::NoNulls;
        self
    }

    pub fn unique_key(mut self) -> Self {
        self.unique_key = true;
        self
    }

    /// `true` if this column identifies a row of its base table, alone or together with the
    /// other key columns.
    pub fn is_key(&self) -> bool {
        self.primary_key || self.unique_key
    }
}

fn default_octet_length(sql_type: SqlDataType) -> usize {
    match sql_type {
        SqlDataType::Bit | SqlDataType::TinyInt => 1,
        SqlDataType::SmallInt => 2,
        SqlDataType::Integer | SqlDataType::Real => 4,
        SqlDataType::BigInt | SqlDataType::Float | SqlDataType::Double => 8,
        SqlDataType::Date => 10,
        SqlDataType::Time => 8,
        SqlDataType::Timestamp => 26,
        _ => 255,
    }
}
