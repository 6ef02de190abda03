use crate::error::CodecError;
use crate::message::Message;

/// The 3-bit wire types carried in the low bits of every tag.
pub mod wire_type {
    pub const VARINT: u32           = 0;
    pub const FIXED64: u32          = 1;
    pub const LENGTH_DELIMITED: u32 = 2;
    pub const START_GROUP: u32      = 3;
    pub const END_GROUP: u32        = 4;
    pub const FIXED32: u32          = 5;
}

/// Deepest nesting of submessages and groups a [`Reader`] will follow.
pub const RECURSION_LIMIT: usize = 100;

/// A protobuf byte buffer meant for reading.
///
/// Example usage:
///
/// ```
/// let mut reader = protoweave_runtime::Reader::new(&[8, 150, 1]);
/// assert_eq!(reader.uint32(), Ok(8));
/// assert_eq!(reader.uint32(), Ok(150));
/// ```
///
pub struct Reader<'a> {
    data:  &'a [u8],
    index: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    /// Create a new Reader over the provided byte slice.
    pub fn new(data: &'a [u8]) -> Reader<'a> {
        Reader { data, index: 0, depth: 0 }
    }

    /// Retrieves the underlying byte slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Retrieves the current index into the underlying byte slice.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Resolves the end offset of a message that starts at the current index.
    /// `None` means the message runs to the end of the buffer.
    pub fn end(&self, length: Option<usize>) -> Result<usize, CodecError> {
        match length {
            None => Ok(self.data.len()),
            Some(len) => {
                let end = self
                    .index
                    .checked_add(len)
                    .ok_or(CodecError::LengthOverflow(len))?;
                if end > self.data.len() {
                    Err(CodecError::LengthOverflow(len))
                } else {
                    Ok(end)
                }
            }
        }
    }

    fn read_byte(&mut self) -> Result<u8, CodecError> {
        match self.data.get(self.index) {
            Some(&byte) => {
                self.index += 1;
                Ok(byte)
            }
            None => Err(CodecError::Truncated),
        }
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.index + len > self.data.len() {
            return Err(CodecError::Truncated);
        }
        let value = &self.data[self.index..self.index + len];
        self.index += len;
        Ok(value)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_slice(N)?);
        Ok(out)
    }

    /// Reads a base-128 varint of at most ten bytes.
    pub fn varint64(&mut self) -> Result<u64, CodecError> {
        let mut result: u64 = 0;
        for shift in (0..70).step_by(7) {
            let byte = self.read_byte()?;
            if shift == 63 && byte > 1 {
                return Err(CodecError::InvalidVarint);
            }
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(CodecError::InvalidVarint)
    }

    pub fn uint32(&mut self) -> Result<u32, CodecError> {
        Ok(self.varint64()? as u32)
    }

    /// Negative values arrive sign-extended to ten bytes; truncation recovers them.
    pub fn int32(&mut self) -> Result<i32, CodecError> {
        Ok(self.varint64()? as i32)
    }

    pub fn sint32(&mut self) -> Result<i32, CodecError> {
        let value = self.varint64()? as u32;
        Ok(((value >> 1) as i32) ^ -((value & 1) as i32))
    }

    pub fn uint64(&mut self) -> Result<u64, CodecError> {
        self.varint64()
    }

    pub fn int64(&mut self) -> Result<i64, CodecError> {
        Ok(self.varint64()? as i64)
    }

    pub fn sint64(&mut self) -> Result<i64, CodecError> {
        let value = self.varint64()?;
        Ok(((value >> 1) as i64) ^ -((value & 1) as i64))
    }

    pub fn bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.varint64()? != 0)
    }

    pub fn fixed32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn sfixed32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn fixed64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn sfixed64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn float(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn double(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Reads a length prefix and checks that the announced bytes are present.
    pub fn length(&mut self) -> Result<usize, CodecError> {
        let len = self.uint32()? as usize;
        self.end(Some(len))?;
        Ok(len)
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.length()?;
        Ok(self.read_slice(len)?.to_vec())
    }

    pub fn string(&mut self) -> Result<String, CodecError> {
        String::from_utf8(self.bytes()?).map_err(|_| CodecError::InvalidUtf8)
    }

    fn descend(&mut self) -> Result<(), CodecError> {
        if self.depth >= RECURSION_LIMIT {
            return Err(CodecError::RecursionLimit(RECURSION_LIMIT));
        }
        self.depth += 1;
        Ok(())
    }

    /// Reads a length-delimited submessage by recursing into its decoder.
    pub fn message<M: Message>(&mut self) -> Result<M, CodecError> {
        let len = self.length()?;
        self.descend()?;
        let message = M::decode(self, Some(len));
        self.depth -= 1;
        message
    }

    /// Skips the value of an unknown field whose tag has just been read.
    /// Groups are skipped up to the end-group tag of the same field number.
    pub fn skip_field(&mut self, tag: u32) -> Result<(), CodecError> {
        match tag & 7 {
            wire_type::VARINT => {
                self.varint64()?;
            }
            wire_type::FIXED64 => {
                self.read_slice(8)?;
            }
            wire_type::LENGTH_DELIMITED => {
                let len = self.length()?;
                self.read_slice(len)?;
            }
            wire_type::START_GROUP => {
                self.descend()?;
                let skipped = self.skip_group(tag >> 3);
                self.depth -= 1;
                skipped?;
            }
            wire_type::FIXED32 => {
                self.read_slice(4)?;
            }
            other => return Err(CodecError::InvalidWireType(other)),
        }
        Ok(())
    }

    fn skip_group(&mut self, field: u32) -> Result<(), CodecError> {
        loop {
            let tag = self.uint32()?;
            if tag & 7 == wire_type::END_GROUP {
                if tag >> 3 != field {
                    return Err(CodecError::GroupMismatch {
                        expected: field,
                        found:    tag >> 3,
                    });
                }
                return Ok(());
            }
            self.skip_field(tag)?;
        }
    }
}

/// A protobuf byte buffer meant for writing.
///
/// Length-delimited children are written with [`Writer::fork`] and
/// [`Writer::ldelim`]: the child is written in place and its varint length is
/// spliced in at the fork point once the child is complete.
///
/// ```
/// let mut writer = protoweave_runtime::Writer::new();
/// writer.uint32(10).fork();
/// writer.uint32(8).int32(1);
/// writer.ldelim();
/// assert_eq!(writer.finish(), [10, 2, 8, 1]);
/// ```
///
#[derive(Default)]
pub struct Writer {
    data:  Vec<u8>,
    forks: Vec<usize>,
}

fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

impl Writer {
    pub fn new() -> Writer {
        Writer::default()
    }

    /// Retrieves the bytes written so far, including any open forks.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn varint64(&mut self, value: u64) -> &mut Self {
        encode_varint(value, &mut self.data);
        self
    }

    pub fn uint32(&mut self, value: u32) -> &mut Self {
        self.varint64(u64::from(value))
    }

    pub fn int32(&mut self, value: i32) -> &mut Self {
        self.varint64(value as i64 as u64)
    }

    pub fn sint32(&mut self, value: i32) -> &mut Self {
        self.varint64(((value << 1) ^ (value >> 31)) as u32 as u64)
    }

    pub fn uint64(&mut self, value: u64) -> &mut Self {
        self.varint64(value)
    }

    pub fn int64(&mut self, value: i64) -> &mut Self {
        self.varint64(value as u64)
    }

    pub fn sint64(&mut self, value: i64) -> &mut Self {
        self.varint64(((value << 1) ^ (value >> 63)) as u64)
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.varint64(u64::from(value))
    }

    pub fn fixed32(&mut self, value: u32) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn sfixed32(&mut self, value: i32) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn fixed64(&mut self, value: u64) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn sfixed64(&mut self, value: i64) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn float(&mut self, value: f32) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn double(&mut self, value: f64) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.varint64(value.len() as u64);
        self.data.extend_from_slice(value);
        self
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    /// Starts a length-delimited child at the current position.
    pub fn fork(&mut self) -> &mut Self {
        self.forks.push(self.data.len());
        self
    }

    /// Closes the innermost open fork by inserting the child's length in front
    /// of it. Forks opened earlier sit at lower offsets, so they stay valid.
    pub fn ldelim(&mut self) -> &mut Self {
        if let Some(start) = self.forks.pop() {
            let len = self.data.len() - start;
            let child = self.data.split_off(start);
            encode_varint(len as u64, &mut self.data);
            self.data.extend_from_slice(&child);
        }
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

#[test]
fn read_uint32() {
    let read = |bytes| Reader::new(bytes).uint32();
    assert_eq!(read(&[]), Err(CodecError::Truncated));
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[1]), Ok(1));
    assert_eq!(read(&[127]), Ok(127));
    assert_eq!(read(&[128]), Err(CodecError::Truncated));
    assert_eq!(read(&[128, 1]), Ok(128));
    assert_eq!(read(&[150, 1]), Ok(150));
    assert_eq!(read(&[255, 255, 255, 255, 15]), Ok(4294967295));
}

#[test]
fn read_int32_negative() {
    let read = |bytes| Reader::new(bytes).int32();
    assert_eq!(
        read(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Ok(-1)
    );
    assert_eq!(
        read(&[0x80, 0x80, 0x80, 0x80, 0xF8, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Ok(i32::MIN)
    );
}

#[test]
fn read_sint() {
    let read = |bytes| Reader::new(bytes).sint32();
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[1]), Ok(-1));
    assert_eq!(read(&[2]), Ok(1));
    assert_eq!(read(&[3]), Ok(-2));
    assert_eq!(read(&[127]), Ok(-64));
    assert_eq!(read(&[255, 255, 255, 255, 15]), Ok(i32::MIN));

    let read = |bytes| Reader::new(bytes).sint64();
    assert_eq!(read(&[4]), Ok(2));
    assert_eq!(
        read(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Ok(i64::MIN)
    );
}

#[test]
fn read_varint64_limits() {
    let read = |bytes| Reader::new(bytes).uint64();
    assert_eq!(
        read(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Ok(u64::MAX)
    );
    assert_eq!(
        read(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02]),
        Err(CodecError::InvalidVarint)
    );
    assert_eq!(
        read(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Err(CodecError::InvalidVarint)
    );
}

#[test]
fn read_fixed() {
    assert_eq!(Reader::new(&[1, 0, 0, 0]).fixed32(), Ok(1));
    assert_eq!(Reader::new(&[0xFF, 0xFF, 0xFF, 0xFF]).sfixed32(), Ok(-1));
    assert_eq!(Reader::new(&[1, 0, 0]).fixed32(), Err(CodecError::Truncated));
    assert_eq!(Reader::new(&[0, 0, 0, 0, 0, 0, 0xF0, 0x3F]).double(), Ok(1.0));
    assert_eq!(Reader::new(&[0, 0, 0x80, 0x3F]).float(), Ok(1.0));
}

#[test]
fn read_string() {
    let read = |bytes| Reader::new(bytes).string();
    assert_eq!(read(&[0]), Ok(String::new()));
    assert_eq!(read(&[4, 240, 159, 141, 149]), Ok("🍕".to_string()));
    assert_eq!(read(&[5, 240, 159, 141, 149]), Err(CodecError::LengthOverflow(5)));
    assert_eq!(read(&[2, 0xC3, 0x28]), Err(CodecError::InvalidUtf8));
}

#[test]
fn skip_unknown_values() {
    // varint, fixed64, length-delimited, group 1 { varint }, fixed32, then a marker
    let mut reader = Reader::new(&[
        0x96, 0x01,
        1, 2, 3, 4, 5, 6, 7, 8,
        3, 9, 9, 9,
        0x08, 0x01, 0x0C,
        1, 2, 3, 4,
        42,
    ]);
    assert_eq!(reader.skip_field(wire_type::VARINT), Ok(()));
    assert_eq!(reader.skip_field(wire_type::FIXED64), Ok(()));
    assert_eq!(reader.skip_field(wire_type::LENGTH_DELIMITED), Ok(()));
    assert_eq!(reader.skip_field(1 << 3 | wire_type::START_GROUP), Ok(()));
    assert_eq!(reader.skip_field(wire_type::FIXED32), Ok(()));
    assert_eq!(reader.uint32(), Ok(42));
    assert_eq!(reader.skip_field(7), Err(CodecError::InvalidWireType(7)));
    assert_eq!(reader.skip_field(wire_type::END_GROUP), Err(CodecError::InvalidWireType(4)));
}

#[test]
fn group_end_must_match_its_start() {
    // group 2 closed by an end-group tag for field 3
    let mut reader = Reader::new(&[0x08, 0x01, 0x1C]);
    assert_eq!(
        reader.skip_field(2 << 3 | wire_type::START_GROUP),
        Err(CodecError::GroupMismatch { expected: 2, found: 3 })
    );
}

#[test]
fn deep_groups_hit_the_recursion_limit() {
    let data: Vec<u8> = [0x9b, 0x06].repeat(200_000);
    let mut reader = Reader::new(&data);
    let tag = reader.uint32().unwrap();
    assert_eq!(
        reader.skip_field(tag),
        Err(CodecError::RecursionLimit(RECURSION_LIMIT))
    );

    let mut nested = vec![0x9b, 0x06].repeat(RECURSION_LIMIT - 1);
    nested.extend([0x9c, 0x06].repeat(RECURSION_LIMIT - 1));
    let mut reader = Reader::new(&nested);
    let tag = reader.uint32().unwrap();
    assert_eq!(reader.skip_field(tag), Ok(()));
    assert_eq!(reader.index(), nested.len());
}

#[test]
fn write_varints() {
    let write = |f: &dyn Fn(&mut Writer)| {
        let mut writer = Writer::new();
        f(&mut writer);
        writer.finish()
    };
    assert_eq!(write(&|w| { w.uint32(0); }), [0]);
    assert_eq!(write(&|w| { w.uint32(150); }), [150, 1]);
    assert_eq!(write(&|w| { w.int32(-1); }), [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
    assert_eq!(write(&|w| { w.sint32(-1); }), [1]);
    assert_eq!(write(&|w| { w.sint32(1); }), [2]);
    assert_eq!(write(&|w| { w.sint64(i64::MIN); }), [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
    assert_eq!(write(&|w| { w.bool(true); }), [1]);
    assert_eq!(write(&|w| { w.string("🍕"); }), [4, 240, 159, 141, 149]);
}

#[test]
fn write_read_sequence() {
    let mut writer = Writer::new();
    writer
        .int64(-5)
        .sint64(-5)
        .fixed64(7)
        .sfixed32(-7)
        .float(1.5)
        .double(-2.25)
        .bytes(&[1, 2, 3]);
    let data = writer.finish();

    let mut reader = Reader::new(&data);
    assert_eq!(reader.int64(), Ok(-5));
    assert_eq!(reader.sint64(), Ok(-5));
    assert_eq!(reader.fixed64(), Ok(7));
    assert_eq!(reader.sfixed32(), Ok(-7));
    assert_eq!(reader.float(), Ok(1.5));
    assert_eq!(reader.double(), Ok(-2.25));
    assert_eq!(reader.bytes(), Ok(vec![1, 2, 3]));
    assert_eq!(reader.index(), data.len());
}

#[test]
fn nested_forks_compose() {
    let mut writer = Writer::new();
    writer.uint32(10).fork();
    writer.uint32(18).fork();
    writer.uint32(26).fork();
    // 200 bytes so the innermost length needs a two-byte varint
    writer.bytes(&[7u8; 200]);
    writer.ldelim();
    writer.ldelim();
    writer.ldelim();
    let data = writer.finish();

    let mut reader = Reader::new(&data);
    assert_eq!(reader.uint32(), Ok(10));
    let outer = reader.length().unwrap();
    assert_eq!(outer, data.len() - 3);
    assert_eq!(reader.uint32(), Ok(18));
    let middle = reader.length().unwrap();
    assert_eq!(reader.uint32(), Ok(26));
    let inner = reader.length().unwrap();
    assert_eq!(inner, 202);
    assert_eq!(middle, inner + 3);
    assert_eq!(reader.bytes().unwrap().len(), 200);
    assert_eq!(reader.index(), data.len());
}

#[test]
fn ldelim_without_fork_is_a_no_op() {
    let mut writer = Writer::new();
    writer.uint32(1).ldelim();
    assert_eq!(writer.finish(), [1]);
}
