/// Assembles encoded messages for use in tests.
///
/// This writes the wire format directly, independent of the encoder in the
/// main crate, so that decoder tests do not depend on encoder correctness.
///
/// ```
/// use tagwire_testing::WireBuilder;
///
/// let buf = WireBuilder::new()
///     .varint(1, 300)
///     .string(2, "hi")
///     .finish();
/// assert_eq!(buf, [0x08, 0xac, 0x02, 0x12, 0x02, 0x68, 0x69]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct WireBuilder {
    buf: Vec<u8>,
}

const VARINT: u64 = 0;
const FIXED64: u64 = 1;
const LENGTH_DELIMITED: u64 = 2;
const FIXED32: u64 = 5;

impl WireBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_varint(&mut self, mut val: u64) {
        while val >= 0x80 {
            self.buf.push((val as u8) | 0x80);
            val >>= 7;
        }
        self.buf.push(val as u8);
    }

    fn tag(mut self, number: u32, wire_type: u64) -> Self {
        self.push_varint(((number as u64) << 3) | wire_type);
        self
    }

    /// Append a varint with no tag.
    pub fn raw_varint(mut self, val: u64) -> Self {
        self.push_varint(val);
        self
    }

    /// Append raw bytes with no tag.
    pub fn raw_bytes(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn varint(self, number: u32, val: u64) -> Self {
        self.tag(number, VARINT).raw_varint(val)
    }

    /// Append a ZigZag-encoded signed varint field.
    pub fn sint64(self, number: u32, val: i64) -> Self {
        self.varint(number, ((val << 1) ^ (val >> 63)) as u64)
    }

    pub fn fixed32(mut self, number: u32, val: u32) -> Self {
        self = self.tag(number, FIXED32);
        self.buf.extend(val.to_le_bytes());
        self
    }

    pub fn fixed64(mut self, number: u32, val: u64) -> Self {
        self = self.tag(number, FIXED64);
        self.buf.extend(val.to_le_bytes());
        self
    }

    pub fn float(self, number: u32, val: f32) -> Self {
        self.fixed32(number, val.to_bits())
    }

    pub fn double(self, number: u32, val: f64) -> Self {
        self.fixed64(number, val.to_bits())
    }

    /// Append a length-delimited field.
    pub fn bytes(self, number: u32, bytes: &[u8]) -> Self {
        self.tag(number, LENGTH_DELIMITED)
            .raw_varint(bytes.len() as u64)
            .raw_bytes(bytes)
    }

    pub fn string(self, number: u32, val: &str) -> Self {
        self.bytes(number, val.as_bytes())
    }

    /// Append an embedded message field.
    pub fn message(self, number: u32, message: WireBuilder) -> Self {
        self.bytes(number, &message.finish())
    }

    /// Append a packed run of varints.
    pub fn packed_varints(self, number: u32, vals: &[u64]) -> Self {
        let body = vals
            .iter()
            .fold(WireBuilder::new(), |body, &val| body.raw_varint(val));
        self.bytes(number, &body.finish())
    }

    /// Append a packed run of 4-byte values.
    pub fn packed_fixed32(self, number: u32, vals: &[u32]) -> Self {
        let body: Vec<u8> = vals.iter().flat_map(|val| val.to_le_bytes()).collect();
        self.bytes(number, &body)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
