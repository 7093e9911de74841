//! Descriptor records, describing how parameters and result columns map to application buffers.

use crate::{
    buffers::RowBuffer,
    sys::{CDataType, SqlDataType},
};

/// Direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamIo {
    #[default]
    Input,
    Output,
    InputOutput,
}

impl ParamIo {
    pub fn is_input(self) -> bool {
        matches!(self, ParamIo::Input | ParamIo::InputOutput)
    }

    pub fn is_output(self) -> bool {
        matches!(self, ParamIo::Output | ParamIo::InputOutput)
    }
}

/// How the application describes a parameter it binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamBinding {
    /// Type of the values in the application buffer. [`CDataType::Default`] picks the type
    /// matching `sql_type`.
    pub c_type: CDataType,
    /// Type the server expects.
    pub sql_type: SqlDataType,
    /// Maximum number of characters or digits.
    pub column_size: usize,
    pub decimal_digits: i16,
    pub io: ParamIo,
}

impl ParamBinding {
    /// Input parameter without size restrictions.
    pub fn input(c_type: CDataType, sql_type: SqlDataType) -> Self {
        ParamBinding {
            c_type,
            sql_type,
            column_size: 0,
            decimal_digits: 0,
            io: ParamIo::Input,
        }
    }

    pub fn output(c_type: CDataType, sql_type: SqlDataType) -> Self {
        ParamBinding {
            io: ParamIo::Output,
            ..Self::input(c_type, sql_type)
        }
    }

    pub fn with_io(mut self, io: ParamIo) -> Self {
        self.io = io;
        self
    }

    pub fn with_size(mut self, column_size: usize, decimal_digits: i16) -> Self {
        self.column_size = column_size;
        self.decimal_digits = decimal_digits;
        self
    }

    /// C type with [`CDataType::Default`] resolved.
    pub fn resolved_c_type(&self) -> CDataType {
        self.c_type.resolve(self.sql_type, false)
    }
}

/// Application and implementation parameter descriptor record of one parameter marker.
#[derive(Debug)]
pub(crate) struct ParamRecord {
    pub binding: ParamBinding,
    pub buffer: Box<dyn RowBuffer>,
    /// `false` once the statement has been reset. The buffer is kept, but never read.
    pub in_use: bool,
    /// Bytes sent with put data for the current row.
    pub dae_length: usize,
    /// Put data reported `NULL` for the current row.
    pub dae_null: bool,
}

impl ParamRecord {
    pub fn new(binding: ParamBinding, buffer: Box<dyn RowBuffer>) -> Self {
        ParamRecord {
            binding,
            buffer,
            in_use: true,
            dae_length: 0,
            dae_null: false,
        }
    }

    /// `true` if the value of `row` is sent at execution time.
    pub fn is_data_at_exec(&self, row: usize) -> bool {
        self.binding.io.is_input()
            && self
                .buffer
                .indicator_at(row)
                .is_some_and(|indicator| indicator.is_data_at_exec())
    }

    pub fn clear_dae(&mut self) {
        self.dae_length = 0;
        self.dae_null = false;
    }
}

/// Application row descriptor record of one result column.
#[derive(Debug)]
pub(crate) struct ColumnRecord {
    pub c_type: CDataType,
    pub buffer: Box<dyn RowBuffer>,
    pub in_use: bool,
    /// Precision and scale of [`CDataType::Numeric`] targets.
    pub precision: u8,
    pub scale: i8,
}

/// Outcome of a single parameter row of the last execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStatus {
    Success,
    SuccessWithInfo,
    Error,
    /// The row has not been executed, e.g. because it is ignored.
    Unused,
    /// The row belongs to a failed bulk operation. It is unknown whether it has been applied.
    DiagUnavailable,
}

/// State of a single row of the current row set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Success,
    SuccessWithInfo,
    Error,
    /// The row set ended before this row.
    NoRow,
    Updated,
    Deleted,
    Added,
}
