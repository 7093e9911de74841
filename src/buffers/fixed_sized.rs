use crate::sys::{CDataType, Date, Interval, Numeric, Time, Timestamp};

/// New type wrapping u8 and binding as `CDataType::Bit`.
///
/// If rust would guarantee the representation of `bool` to be an `u8`, `bool` would be the obvious
/// choice instead. Alas it is not and someday on some platform `bool` might be something else than
/// a `u8` so let's use this new type instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Ord, PartialOrd)]
pub struct Bit(pub u8);

impl Bit {
    /// Maps `true` to `1` and `false` to `0`.
    pub fn from_bool(boolean: bool) -> Self {
        if boolean { Bit(1) } else { Bit(0) }
    }

    /// Any value other than `0` is `true`.
    pub fn as_bool(self) -> bool {
        self.0 != 0
    }
}

/// A plain old value with a fixed size representation in application buffers.
pub trait FixedSized: Copy + Default {
    /// C type used to bind buffers of this type.
    const C_DATA_TYPE: CDataType;
    /// Size of the representation in bytes.
    const SIZE: usize;

    /// Reads a value from the first [`Self::SIZE`] bytes of `bytes`. `None` if `bytes` is too
    /// short.
    fn read_from(bytes: &[u8]) -> Option<Self>;

    /// Writes the value into the first [`Self::SIZE`] bytes of `target`. `false` if `target` is too
    /// short.
    fn write_to(&self, target: &mut [u8]) -> bool;
}

macro_rules! impl_fixed_sized {
    ($t:ty, $c_data_type:expr) => {
        impl FixedSized for $t {
            const C_DATA_TYPE: CDataType = $c_data_type;
            const SIZE: usize = std::mem::size_of::<$t>();

            fn read_from(bytes: &[u8]) -> Option<Self> {
                let raw = bytes.get(..Self::SIZE)?.try_into().ok()?;
                Some(<$t>::from_ne_bytes(raw))
            }

            fn write_to(&self, target: &mut [u8]) -> bool {
                match target.get_mut(..Self::SIZE) {
                    Some(target) => {
                        target.copy_from_slice(&self.to_ne_bytes());
                        true
                    }
                    None => false,
                }
            }
        }
    };
}

impl_fixed_sized!(i8, CDataType::STinyInt);
impl_fixed_sized!(u8, CDataType::UTinyInt);
impl_fixed_sized!(i16, CDataType::SShort);
impl_fixed_sized!(u16, CDataType::UShort);
impl_fixed_sized!(i32, CDataType::SLong);
impl_fixed_sized!(u32, CDataType::ULong);
impl_fixed_sized!(i64, CDataType::SBigInt);
impl_fixed_sized!(u64, CDataType::UBigInt);
impl_fixed_sized!(f32, CDataType::Float);
impl_fixed_sized!(f64, CDataType::Double);

impl FixedSized for Bit {
    const C_DATA_TYPE: CDataType = CDataType::Bit;
    const SIZE: usize = 1;

    fn read_from(bytes: &[u8]) -> Option<Self> {
        bytes.first().map(|&byte| Bit(byte))
    }

    fn write_to(&self, target: &mut [u8]) -> bool {
        match target.first_mut() {
            Some(byte) => {
                *byte = self.0;
                true
            }
            None => false,
        }
    }
}

/// Sequential access to the fields of a C struct stored in a byte slice.
struct Fields<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Fields<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Fields { bytes, offset: 0 }
    }

    fn take<T: FixedSized>(&mut self) -> Option<T> {
        let value = T::read_from(self.bytes.get(self.offset..)?)?;
        self.offset += T::SIZE;
        Some(value)
    }
}

struct FieldsMut<'a> {
    bytes: &'a mut [u8],
    offset: usize,
    complete: bool,
}

impl<'a> FieldsMut<'a> {
    fn new(bytes: &'a mut [u8]) -> Self {
        FieldsMut {
            bytes,
            offset: 0,
            complete: true,
        }
    }

    fn put<T: FixedSized>(&mut self, value: T) -> &mut Self {
        let written = match self.bytes.get_mut(self.offset..) {
            Some(rest) => value.write_to(rest),
            None => false,
        };
        self.complete &= written;
        self.offset += T::SIZE;
        self
    }
}

impl FixedSized for Date {
    const C_DATA_TYPE: CDataType = CDataType::Date;
    const SIZE: usize = Date::SIZE;

    fn read_from(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes);
        Some(Date {
            year: fields.take()?,
            month: fields.take()?,
            day: fields.take()?,
        })
    }

    fn write_to(&self, target: &mut [u8]) -> bool {
        let mut fields = FieldsMut::new(target);
        fields.put(self.year).put(self.month).put(self.day);
        fields.complete
    }
}

impl FixedSized for Time {
    const C_DATA_TYPE: CDataType = CDataType::Time;
    const SIZE: usize = Time::SIZE;

    fn read_from(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes);
        Some(Time {
            hour: fields.take()?,
            minute: fields.take()?,
            second: fields.take()?,
        })
    }

    fn write_to(&self, target: &mut [u8]) -> bool {
        let mut fields = FieldsMut::new(target);
        fields.put(self.hour).put(self.minute).put(self.second);
        fields.complete
    }
}

impl FixedSized for Timestamp {
    const C_DATA_TYPE: CDataType = CDataType::Timestamp;
    const SIZE: usize = Timestamp::SIZE;

    fn read_from(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes);
        Some(Timestamp {
            year: fields.take()?,
            month: fields.take()?,
            day: fields.take()?,
            hour: fields.take()?,
            minute: fields.take()?,
            second: fields.take()?,
            fraction: fields.take()?,
        })
    }

    fn write_to(&self, target: &mut [u8]) -> bool {
        let mut fields = FieldsMut::new(target);
        fields
            .put(self.year)
            .put(self.month)
            .put(self.day)
            .put(self.hour)
            .put(self.minute)
            .put(self.second)
            .put(self.fraction);
        fields.complete
    }
}

impl FixedSized for Numeric {
    const C_DATA_TYPE: CDataType = CDataType::Numeric;
    const SIZE: usize = Numeric::SIZE;

    fn read_from(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes);
        let precision = fields.take()?;
        let scale = fields.take()?;
        let sign = fields.take()?;
        let val = bytes.get(3..Numeric::SIZE)?.try_into().ok()?;
        Some(Numeric {
            precision,
            scale,
            sign,
            val,
        })
    }

    fn write_to(&self, target: &mut [u8]) -> bool {
        let Some(target) = target.get_mut(..Numeric::SIZE) else {
            return false;
        };
        target[0] = self.precision;
        target[1] = self.scale as u8;
        target[2] = self.sign;
        target[3..].copy_from_slice(&self.val);
        true
    }
}

impl FixedSized for Interval {
    const C_DATA_TYPE: CDataType = CDataType::IntervalHourToSecond;
    const SIZE: usize = Interval::SIZE;

    fn read_from(bytes: &[u8]) -> Option<Self> {
        let mut fields = Fields::new(bytes);
        let sign: u32 = fields.take()?;
        Some(Interval {
            negative: sign != 0,
            hour: fields.take()?,
            minute: fields.take()?,
            second: fields.take()?,
            fraction: fields.take()?,
        })
    }

    fn write_to(&self, target: &mut [u8]) -> bool {
        let mut fields = FieldsMut::new(target);
        fields
            .put(u32::from(self.negative))
            .put(self.hour)
            .put(self.minute)
            .put(self.second)
            .put(self.fraction);
        fields.complete
    }
}
