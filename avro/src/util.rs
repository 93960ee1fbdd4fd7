// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::{AvroResult, error::Details};
use std::{
    io::{ErrorKind, Read, Write},
    sync::{
        Once,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Maximum number of bytes that can be allocated when decoding
/// Avro-encoded values. This is a protection against ill-formed
/// data, whose length field might be interpreted as enormous.
/// See max_allocation_bytes to change this limit.
pub const DEFAULT_MAX_ALLOCATION_BYTES: usize = 512 * 1024 * 1024;
static MAX_ALLOCATION_BYTES: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_ALLOCATION_BYTES);
static MAX_ALLOCATION_BYTES_ONCE: Once = Once::new();

pub(crate) fn read_long<R: Read + ?Sized>(reader: &mut R) -> AvroResult<i64> {
    zag_i64(reader)
}

/// Read a long, or `None` if the reader is exhausted before its first byte.
///
/// Running out of bytes after the first one is still an error.
pub(crate) fn try_read_long<R: Read + ?Sized>(reader: &mut R) -> AvroResult<Option<i64>> {
    let mut first = [0u8; 1];
    loop {
        match reader.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Details::ReadVariableIntegerBytes(e).into()),
        }
    }
    let z = if first[0] >> 7 == 0 {
        u64::from(first[0])
    } else {
        let rest = decode_variable(reader)?;
        let shifted = rest.checked_shl(7).ok_or(Details::IntegerOverflow)?;
        if shifted >> 7 != rest {
            return Err(Details::IntegerOverflow.into());
        }
        u64::from(first[0] & 0x7F) | shifted
    };
    Ok(Some(unzag(z)))
}

/// Consume a long without decoding it.
pub(crate) fn skip_long<R: Read + ?Sized>(reader: &mut R) -> AvroResult<()> {
    let mut buf = [0u8; 1];
    for _ in 0..10 {
        reader
            .read_exact(&mut buf)
            .map_err(Details::ReadVariableIntegerBytes)?;
        if buf[0] >> 7 == 0 {
            return Ok(());
        }
    }
    Err(Details::IntegerOverflow.into())
}

pub(crate) fn zig_i32<W: Write + ?Sized>(n: i32, buffer: &mut W) -> AvroResult<usize> {
    zig_i64(n as i64, buffer)
}

pub(crate) fn zig_i64<W: Write + ?Sized>(n: i64, writer: &mut W) -> AvroResult<usize> {
    encode_variable(((n << 1) ^ (n >> 63)) as u64, writer)
}

pub(crate) fn zag_i32<R: Read + ?Sized>(reader: &mut R) -> AvroResult<i32> {
    let i = zag_i64(reader)?;
    i32::try_from(i).map_err(|e| Details::ZagI32(e, i).into())
}

pub(crate) fn zag_i64<R: Read + ?Sized>(reader: &mut R) -> AvroResult<i64> {
    let z = decode_variable(reader)?;
    Ok(unzag(z))
}

fn unzag(z: u64) -> i64 {
    if z & 0x1 == 0 {
        (z >> 1) as i64
    } else {
        !(z >> 1) as i64
    }
}

fn encode_variable<W: Write + ?Sized>(mut z: u64, writer: &mut W) -> AvroResult<usize> {
    let mut buffer = [0u8; 10];
    let mut i: usize = 0;
    loop {
        if z <= 0x7F {
            buffer[i] = (z & 0x7F) as u8;
            i += 1;
            break;
        } else {
            buffer[i] = (0x80 | (z & 0x7F)) as u8;
            i += 1;
            z >>= 7;
        }
    }
    writer
        .write_all(&buffer[..i])
        .map_err(Details::WriteBytes)?;
    Ok(i)
}

fn decode_variable<R: Read + ?Sized>(reader: &mut R) -> AvroResult<u64> {
    let mut i = 0u64;
    let mut buf = [0u8; 1];

    let mut j = 0;
    loop {
        if j > 9 {
            // if j * 7 > 64
            return Err(Details::IntegerOverflow.into());
        }
        reader
            .read_exact(&mut buf[..])
            .map_err(Details::ReadVariableIntegerBytes)?;
        i |= (u64::from(buf[0] & 0x7F)) << (j * 7);
        if (buf[0] >> 7) == 0 {
            break;
        } else {
            j += 1;
        }
    }

    Ok(i)
}

/// Read into `buf` until it is full or the reader is exhausted.
///
/// Returns the number of bytes read.
pub(crate) fn read_up_to<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Set a new maximum number of bytes that can be allocated when decoding data.
/// Once called, the limit cannot be changed.
///
/// **NOTE** This function must be called before decoding **any** data. The
/// library leverages [`std::sync::Once`](https://doc.rust-lang.org/std/sync/struct.Once.html)
/// to set the limit either when calling this method, or when decoding for
/// the first time.
pub fn max_allocation_bytes(num_bytes: usize) -> usize {
    MAX_ALLOCATION_BYTES_ONCE.call_once(|| {
        MAX_ALLOCATION_BYTES.store(num_bytes, Ordering::Release);
    });
    MAX_ALLOCATION_BYTES.load(Ordering::Acquire)
}

pub fn safe_len(len: usize) -> AvroResult<usize> {
    let max_bytes = max_allocation_bytes(DEFAULT_MAX_ALLOCATION_BYTES);

    if len <= max_bytes {
        Ok(len)
    } else {
        Err(Details::MemoryAllocation {
            desired: len,
            maximum: max_bytes,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    type TestResult = anyhow::Result<()>;

    #[test]
    fn test_zigzag() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        zig_i32(42i32, &mut a).unwrap();
        zig_i64(42i64, &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zig_i64() {
        let mut s = Vec::new();

        zig_i64(0, &mut s).unwrap();
        assert_eq!(s, [0]);

        s.clear();
        zig_i64(-1, &mut s).unwrap();
        assert_eq!(s, [1]);

        s.clear();
        zig_i64(1, &mut s).unwrap();
        assert_eq!(s, [2]);

        s.clear();
        zig_i64(-64, &mut s).unwrap();
        assert_eq!(s, [127]);

        s.clear();
        zig_i64(64, &mut s).unwrap();
        assert_eq!(s, [128, 1]);

        s.clear();
        zig_i64(i64::MAX, &mut s).unwrap();
        assert_eq!(s, [254, 255, 255, 255, 255, 255, 255, 255, 255, 1]);

        s.clear();
        zig_i64(i64::MIN, &mut s).unwrap();
        assert_eq!(s, [255, 255, 255, 255, 255, 255, 255, 255, 255, 1]);
    }

    #[test]
    fn test_zag_round_trip() -> TestResult {
        for n in [0, 1, -1, 63, -64, 64, 1 << 40, i64::MIN, i64::MAX] {
            let mut s = Vec::new();
            zig_i64(n, &mut s)?;
            assert_eq!(zag_i64(&mut s.as_slice())?, n);
            assert_eq!(try_read_long(&mut s.as_slice())?, Some(n));
        }
        Ok(())
    }

    #[test]
    fn test_try_read_long_on_empty_input() -> TestResult {
        let empty: &[u8] = &[];
        assert_eq!(try_read_long(&mut &*empty)?, None);

        // a continuation bit with nothing after it is not a clean end
        let cut: &[u8] = &[0x80];
        assert!(try_read_long(&mut &*cut).is_err());
        Ok(())
    }

    #[test]
    fn test_skip_long() -> TestResult {
        let mut s = Vec::new();
        zig_i64(1 << 40, &mut s)?;
        s.push(0x2a);
        let mut reader = s.as_slice();
        skip_long(&mut reader)?;
        assert_eq!(reader, [0x2a]);
        Ok(())
    }

    #[test]
    fn test_overflow() {
        let causes_left_shift_overflow: &[u8] = &[0xe1; 11];
        assert!(decode_variable(&mut &*causes_left_shift_overflow).is_err());
        assert!(try_read_long(&mut &*causes_left_shift_overflow).is_err());
    }

    #[test]
    fn test_zag_i32_out_of_range() {
        let mut s = Vec::new();
        zig_i64(i64::from(i32::MAX) + 1, &mut s).unwrap();
        let err: Error = zag_i32(&mut s.as_slice()).unwrap_err();
        assert!(matches!(err.details(), Details::ZagI32(..)));
    }

    #[test]
    fn test_read_up_to() -> TestResult {
        let data = [1u8, 2, 3];
        let mut buf = [0u8; 16];
        assert_eq!(read_up_to(&mut &data[..], &mut buf)?, 3);
        assert_eq!(&buf[..3], &data);
        Ok(())
    }

    #[test]
    fn test_safe_len() -> TestResult {
        assert_eq!(42usize, safe_len(42usize)?);
        assert!(safe_len(1024 * 1024 * 1024).is_err());

        Ok(())
    }
}
