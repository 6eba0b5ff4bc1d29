//! Default byte codec for `application/octet-stream`.
use std::io;
use std::io::prelude::*;

use crate::content::{unsupported, Assembler, ByteCallback, ByteSource, Disassembler, Value};
use crate::error::Result;
use crate::media::read_bytes;
use crate::types::TypeDescriptor;

const ASSEMBLER_SHAPES: &[&str] = &["Vec<u8>", "ByteSource", "ByteCallback"];
const DISASSEMBLER_SHAPES: &[&str] = &["Vec<u8>", "ByteSource"];

/// Passes raw bytes, byte streams and byte callbacks through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct OctetCodec;

impl Assembler for OctetCodec {
    fn assemble(&self, value: Value, ty: &TypeDescriptor, sink: &mut dyn Write) -> Result<()> {
        let value = match value.downcast::<Vec<u8>>() {
            Ok(bytes) => {
                sink.write_all(&bytes)?;
                return Ok(());
            }
            Err(value) => value,
        };
        let value = match value.downcast::<ByteSource>() {
            Ok(mut source) => {
                io::copy(&mut *source, sink)?;
                return Ok(());
            }
            Err(value) => value,
        };
        match value.downcast::<ByteCallback>() {
            Ok(callback) => Ok(callback.call(sink)?),
            Err(_) => Err(unsupported("octet assembler", ty, ASSEMBLER_SHAPES)),
        }
    }
}

impl Disassembler for OctetCodec {
    fn disassemble(&self, source: ByteSource, ty: &TypeDescriptor) -> Result<Value> {
        if ty.is::<Vec<u8>>() {
            Ok(Box::new(read_bytes(source)?))
        } else if ty.is::<ByteSource>() {
            Ok(Box::new(source))
        } else {
            Err(unsupported("octet disassembler", ty, DISASSEMBLER_SHAPES))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::content::{downcast, value};
    use crate::error::Error;
    use proptest::prelude::*;

    fn assemble(v: Value, ty: TypeDescriptor) -> Result<Vec<u8>> {
        let mut out = vec![];
        OctetCodec.assemble(v, &ty, &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_assemble_shapes() {
        assert_eq!(
            assemble(value(b"abc".to_vec()), TypeDescriptor::of::<Vec<u8>>()).unwrap(),
            b"abc"
        );
        let source: ByteSource = Box::new(&b"stream"[..]);
        assert_eq!(
            assemble(value(source), TypeDescriptor::of::<ByteSource>()).unwrap(),
            b"stream"
        );
        let callback = ByteCallback::new(|sink| sink.write_all(b"called"));
        assert_eq!(
            assemble(value(callback), TypeDescriptor::of::<ByteCallback>()).unwrap(),
            b"called"
        );
    }

    #[test]
    fn test_assemble_unsupported() {
        let err = assemble(value(12i32), TypeDescriptor::of::<i32>()).unwrap_err();
        match err {
            Error::Unsupported { allowed, .. } => {
                assert_eq!(allowed, "Vec<u8>, ByteSource, ByteCallback")
            }
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn test_disassemble_stream_passthrough() {
        let source: ByteSource = Box::new(&b"passthrough"[..]);
        let v = OctetCodec
            .disassemble(source, &TypeDescriptor::of::<ByteSource>())
            .unwrap();
        let mut source = downcast::<ByteSource>(v).unwrap();
        let mut out = String::new();
        source.read_to_string(&mut out).unwrap();
        assert_eq!(out, "passthrough");
    }

    #[test]
    fn test_disassemble_unsupported() {
        let source: ByteSource = Box::new(&b""[..]);
        assert!(matches!(
            OctetCodec.disassemble(source, &TypeDescriptor::of::<String>()),
            Err(Error::Unsupported { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_bytes_round_trip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let out = assemble(value(data.clone()), TypeDescriptor::of::<Vec<u8>>()).unwrap();
            let source: ByteSource = Box::new(io::Cursor::new(out));
            let v = OctetCodec.disassemble(source, &TypeDescriptor::of::<Vec<u8>>()).unwrap();
            prop_assert_eq!(downcast::<Vec<u8>>(v).unwrap(), data);
        }
    }
}
