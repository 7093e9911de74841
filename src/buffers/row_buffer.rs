use std::fmt::Debug;

use super::{FixedSized, Indicator};

/// Application memory bound to one parameter or result column, holding an element (and
/// optionally a length/indicator) for each row of a parameter array or row set.
///
/// All access is bounds checked against element size and array size. Accessors return `None` for
/// rows outside of the buffer.
pub trait RowBuffer: Debug {
    /// Octet length of a single element.
    fn element_size(&self) -> usize;

    /// Number of rows the buffer has room for.
    fn array_size(&self) -> usize;

    fn element_at(&self, row: usize) -> Option<&[u8]>;

    fn element_at_mut(&mut self, row: usize) -> Option<&mut [u8]>;

    /// `None` if no indicator is bound, or `row` is out of bounds.
    fn indicator_at(&self, row: usize) -> Option<Indicator>;

    /// `false` if no indicator is bound, or `row` is out of bounds.
    fn set_indicator(&mut self, row: usize, indicator: Indicator) -> bool;

    fn has_indicator(&self) -> bool;

    fn clone_box(&self) -> Box<dyn RowBuffer>;
}

impl dyn RowBuffer + '_ {
    /// Fixed sized value in `row`. `None` for `NULL` or out of bounds access.
    pub fn value<T: FixedSized>(&self, row: usize) -> Option<T> {
        if self.indicator_at(row).is_some_and(Indicator::is_null) {
            return None;
        }
        T::read_from(self.element_at(row)?)
    }

    /// Writes a fixed sized value into `row` and sets its indicator. `None` writes `NULL`.
    pub fn set_value<T: FixedSized>(&mut self, row: usize, value: Option<T>) -> bool {
        match value {
            Some(value) => {
                let written = self
                    .element_at_mut(row)
                    .is_some_and(|element| value.write_to(element));
                self.set_indicator(row, Indicator::Length(T::SIZE));
                written
            }
            None => self.set_indicator(row, Indicator::Null),
        }
    }

    /// Variable sized value in `row`, with the length taken from its indicator. Text without a
    /// length indicator is expected to be zero terminated. `None` for `NULL` or out of bounds
    /// access.
    pub fn bytes(&self, row: usize) -> Option<&[u8]> {
        let element = self.element_at(row)?;
        let len = match self.indicator_at(row) {
            Some(Indicator::Null) => return None,
            Some(Indicator::Length(len)) => len.min(element.len()),
            _ => element
                .iter()
                .position(|&byte| byte == 0)
                .unwrap_or(element.len()),
        };
        Some(&element[..len])
    }

    /// Writes `bytes` into `row`, truncating them to the element size. `None` writes `NULL`.
    pub fn set_bytes(&mut self, row: usize, bytes: Option<&[u8]>) -> bool {
        match bytes {
            Some(bytes) => {
                let Some(element) = self.element_at_mut(row) else {
                    return false;
                };
                let len = bytes.len().min(element.len());
                element[..len].copy_from_slice(&bytes[..len]);
                element[len..].fill(0);
                self.set_indicator(row, Indicator::Length(bytes.len()));
                true
            }
            None => self.set_indicator(row, Indicator::Null),
        }
    }
}

impl Clone for Box<dyn RowBuffer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Column-wise binding: elements of one column are stored back to back.
#[derive(Debug, Clone)]
pub struct ColumnBuffer {
    values: Vec<u8>,
    element_size: usize,
    indicators: Option<Vec<isize>>,
}

impl ColumnBuffer {
    /// Zeroed buffer with an indicator for each row. Indicators start out as `NULL`.
    pub fn new(element_size: usize, array_size: usize) -> Self {
        ColumnBuffer {
            values: vec![0; element_size * array_size],
            element_size,
            indicators: Some(vec![Indicator::Null.to_isize(); array_size]),
        }
    }

    /// Zeroed buffer without indicators. Values are always considered present.
    pub fn without_indicators(element_size: usize, array_size: usize) -> Self {
        ColumnBuffer {
            values: vec![0; element_size * array_size],
            element_size,
            indicators: None,
        }
    }

    /// Buffer for `array_size` values of a fixed sized type.
    pub fn for_type<T: FixedSized>(array_size: usize) -> Self {
        Self::new(T::SIZE, array_size)
    }

    /// Buffer holding `values`, with `None` representing `NULL`.
    pub fn from_values<T: FixedSized>(values: &[Option<T>]) -> Self {
        let mut buffer = Self::for_type::<T>(values.len());
        let dyn_buffer: &mut dyn RowBuffer = &mut buffer;
        for (row, value) in values.iter().enumerate() {
            dyn_buffer.set_value(row, *value);
        }
        buffer
    }

    /// Buffer holding `texts`, each element `max_len` bytes long. Longer texts are truncated, yet
    /// their indicator reports the complete length.
    pub fn from_text(max_len: usize, texts: &[Option<&str>]) -> Self {
        let mut buffer = Self::new(max_len, texts.len());
        let dyn_buffer: &mut dyn RowBuffer = &mut buffer;
        for (row, text) in texts.iter().enumerate() {
            dyn_buffer.set_bytes(row, text.map(str::as_bytes));
        }
        buffer
    }

    /// Buffer of UTF-16 text, each element holding `max_chars` code units.
    pub fn from_wide_text(max_chars: usize, texts: &[Option<&str>]) -> Self {
        let mut buffer = Self::new(max_chars * 2, texts.len());
        let dyn_buffer: &mut dyn RowBuffer = &mut buffer;
        for (row, text) in texts.iter().enumerate() {
            let bytes = text.map(|text| {
                text.encode_utf16()
                    .flat_map(u16::to_ne_bytes)
                    .collect::<Vec<u8>>()
            });
            dyn_buffer.set_bytes(row, bytes.as_deref());
        }
        buffer
    }

    /// Sets the raw indicator of every row.
    pub fn with_indicators(mut self, indicators: &[Indicator]) -> Self {
        self.indicators = Some(indicators.iter().map(|ind| ind.to_isize()).collect());
        self
    }
}

impl RowBuffer for ColumnBuffer {
    fn element_size(&self) -> usize {
        self.element_size
    }

    fn array_size(&self) -> usize {
        if self.element_size == 0 {
            self.indicators.as_ref().map_or(0, Vec::len)
        } else {
            self.values.len() / self.element_size
        }
    }

    fn element_at(&self, row: usize) -> Option<&[u8]> {
        if row >= self.array_size() {
            return None;
        }
        let start = row * self.element_size;
        self.values.get(start..start + self.element_size)
    }

    fn element_at_mut(&mut self, row: usize) -> Option<&mut [u8]> {
        if row >= self.array_size() {
            return None;
        }
        let start = row * self.element_size;
        self.values.get_mut(start..start + self.element_size)
    }

    fn indicator_at(&self, row: usize) -> Option<Indicator> {
        self.indicators
            .as_ref()?
            .get(row)
            .map(|&ind| Indicator::from_isize(ind))
    }

    fn set_indicator(&mut self, row: usize, indicator: Indicator) -> bool {
        match self.indicators.as_mut().and_then(|inds| inds.get_mut(row)) {
            Some(target) => {
                *target = indicator.to_isize();
                true
            }
            None => false,
        }
    }

    fn has_indicator(&self) -> bool {
        self.indicators.is_some()
    }

    fn clone_box(&self) -> Box<dyn RowBuffer> {
        Box::new(self.clone())
    }
}

/// Row-wise binding: each row is a record of `stride` bytes holding the value at `value_offset`
/// and optionally the indicator at `indicator_offset`.
#[derive(Debug, Clone)]
pub struct StridedBuffer {
    bytes: Vec<u8>,
    stride: usize,
    value_offset: usize,
    element_size: usize,
    indicator_offset: Option<usize>,
}

impl StridedBuffer {
    /// `None` if value or indicator would not fit into a record of `stride` bytes.
    pub fn new(
        array_size: usize,
        stride: usize,
        value_offset: usize,
        element_size: usize,
        indicator_offset: Option<usize>,
    ) -> Option<Self> {
        if value_offset + element_size > stride {
            return None;
        }
        if let Some(offset) = indicator_offset {
            if offset + size_of::<isize>() > stride {
                return None;
            }
        }
        Some(StridedBuffer {
            bytes: vec![0; stride * array_size],
            stride,
            value_offset,
            element_size,
            indicator_offset,
        })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    fn field(&self, row: usize, offset: usize, len: usize) -> Option<&[u8]> {
        if row >= self.array_size() {
            return None;
        }
        let start = row * self.stride + offset;
        self.bytes.get(start..start + len)
    }

    fn field_mut(&mut self, row: usize, offset: usize, len: usize) -> Option<&mut [u8]> {
        if row >= self.array_size() {
            return None;
        }
        let start = row * self.stride + offset;
        self.bytes.get_mut(start..start + len)
    }
}

impl RowBuffer for StridedBuffer {
    fn element_size(&self) -> usize {
        self.element_size
    }

    fn array_size(&self) -> usize {
        self.bytes.len().checked_div(self.stride).unwrap_or(0)
    }

    fn element_at(&self, row: usize) -> Option<&[u8]> {
        self.field(row, self.value_offset, self.element_size)
    }

    fn element_at_mut(&mut self, row: usize) -> Option<&mut [u8]> {
        self.field_mut(row, self.value_offset, self.element_size)
    }

    fn indicator_at(&self, row: usize) -> Option<Indicator> {
        let raw = self.field(row, self.indicator_offset?, size_of::<isize>())?;
        Some(Indicator::from_isize(isize::from_ne_bytes(raw.try_into().ok()?)))
    }

    fn set_indicator(&mut self, row: usize, indicator: Indicator) -> bool {
        let Some(offset) = self.indicator_offset else {
            return false;
        };
        match self.field_mut(row, offset, size_of::<isize>()) {
            Some(raw) => {
                raw.copy_from_slice(&indicator.to_isize().to_ne_bytes());
                true
            }
            None => false,
        }
    }

    fn has_indicator(&self) -> bool {
        self.indicator_offset.is_some()
    }

    fn clone_box(&self) -> Box<dyn RowBuffer> {
        Box::new(self.clone())
    }
}
