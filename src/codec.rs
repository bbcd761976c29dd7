use serde::{Deserialize, Serialize};

/// The pluggable serializer of the framework.
///
/// Implementations hold no per-call state; anything mutable (say, a cipher)
/// belongs behind inner mutability.
pub trait Codec: Default + Send + Sync + Sized + 'static {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, ()>;

    /// Serialize `msg` appending into `buf`, and return the size written
    fn encode_into<T: Serialize>(&self, msg: &T, buf: &mut Vec<u8>) -> Result<usize, ()>;

    fn decode<'a, T: Deserialize<'a>>(&self, buf: &'a [u8]) -> Result<T, ()>;
}

/// MessagePack codec, the default for both the call header and user payloads.
#[derive(Default)]
pub struct MsgpCodec();

impl Codec for MsgpCodec {
    #[inline(always)]
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, ()> {
        let mut buf = Vec::new();
        self.encode_into(msg, &mut buf)?;
        Ok(buf)
    }

    fn encode_into<T: Serialize>(&self, msg: &T, buf: &mut Vec<u8>) -> Result<usize, ()> {
        let before = buf.len();
        match rmp_serde::encode::write_named(buf, msg) {
            Ok(()) => Ok(buf.len() - before),
            Err(e) => {
                log::error!("msgpack serialize failed: {}", e);
                Err(())
            }
        }
    }

    #[inline(always)]
    fn decode<'a, T: Deserialize<'a>>(&self, buf: &'a [u8]) -> Result<T, ()> {
        rmp_serde::decode::from_slice(buf).map_err(|e| {
            log::warn!("msgpack deserialize failed: {}", e);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_derive::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Default, PartialEq, Debug)]
    struct Login {
        name: String,
        pwd: String,
    }

    #[test]
    fn test_msgp_roundtrip() {
        let codec = MsgpCodec::default();
        let msg = Login { name: "alice".to_string(), pwd: "pw".to_string() };
        let buf = codec.encode(&msg).expect("encode");
        let back: Login = codec.decode(&buf).expect("decode");
        assert_eq!(back, msg);
    }

    #[test]
    fn test_msgp_encode_into_appends() {
        let codec = MsgpCodec::default();
        let msg = Login { name: "bob".to_string(), pwd: "secret".to_string() };
        let mut buf = b"prefix".to_vec();
        let written = codec.encode_into(&msg, &mut buf).expect("encode_into");
        assert_eq!(buf.len(), "prefix".len() + written);
        let back: Login = codec.decode(&buf["prefix".len()..]).expect("decode");
        assert_eq!(back, msg);
    }

    #[test]
    fn test_msgp_rejects_garbage() {
        let codec = MsgpCodec::default();
        let buf = codec.encode(&Login::default()).expect("encode");
        // truncated document
        assert!(codec.decode::<Login>(&buf[..buf.len() - 1]).is_err());
        // 0xc1 is reserved and never valid
        assert!(codec.decode::<Login>(&[0xc1, 0xc1]).is_err());
    }
}
