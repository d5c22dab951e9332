//! Borsh decoding modes for on-chain account data

use {
    crate::error::StakePoolClientError,
    borsh::BorshDeserialize,
    std::io::{self, Read},
};

/// Reader over a byte slice that remembers whether a read ran off the end,
/// so short buffers can be told apart from bad discriminants.
struct SliceReader<'a> {
    data: &'a [u8],
    exhausted: bool,
}

impl Read for SliceReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !buf.is_empty() && self.data.is_empty() {
            self.exhausted = true;
        }
        let len = buf.len().min(self.data.len());
        let (head, tail) = self.data.split_at(len);
        buf[..len].copy_from_slice(head);
        self.data = tail;
        Ok(len)
    }
}

fn deserialize_prefix<T: BorshDeserialize>(data: &[u8]) -> Result<(T, usize), StakePoolClientError> {
    let mut reader = SliceReader {
        data,
        exhausted: false,
    };
    match T::deserialize_reader(&mut reader) {
        Ok(value) => Ok((value, reader.data.len())),
        Err(err) if reader.exhausted => Err(StakePoolClientError::DecodeError(format!(
            "{} ({} bytes available)",
            err,
            data.len()
        ))),
        Err(err) => Err(StakePoolClientError::SchemaMismatch(err.to_string())),
    }
}

/// Deserializes something and allows for incomplete reading. Trailing bytes
/// past the known layout are ignored, so newer on-chain layouts that only
/// append fields still decode.
pub fn try_from_slice_unchecked<T: BorshDeserialize>(
    data: &[u8],
) -> Result<T, StakePoolClientError> {
    deserialize_prefix(data).map(|(value, _)| value)
}

/// Deserializes something and requires every byte to be consumed
pub fn try_from_slice_strict<T: BorshDeserialize>(data: &[u8]) -> Result<T, StakePoolClientError> {
    let (value, remaining) = deserialize_prefix(data)?;
    if remaining != 0 {
        return Err(StakePoolClientError::SchemaMismatch(format!(
            "{} trailing bytes",
            remaining
        )));
    }
    Ok(value)
}
