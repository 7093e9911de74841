//! Application buffers. A buffer holds the values of one parameter or column for every row of a
//! parameter array or row set.

mod fixed_sized;
mod indicator;
mod row_buffer;

pub use self::{
    fixed_sized::{Bit, FixedSized},
    indicator::Indicator,
    row_buffer::{ColumnBuffer, RowBuffer, StridedBuffer},
};
