/// A byte buffer over either a borrowed read-only slice or a borrowed writable slice.
#[derive(Debug)]
pub enum Buffer<'a> {
    Immutable(&'a [u8]),
    Mutable(&'a mut [u8]),
}

impl<'a> Buffer<'a> {
    /// Wrap a read-only slice, checking it holds at least `minimum` bytes.
    pub fn view(
        name: &'static str,
        minimum: usize,
        bytes: &'a [u8],
    ) -> crate::error::Result<Self> {
        check_len(name, minimum, bytes.len())?;
        Ok(Self::Immutable(bytes))
    }

    /// Wrap a writable slice, checking it holds at least `minimum` bytes.
    pub fn view_mut(
        name: &'static str,
        minimum: usize,
        bytes: &'a mut [u8],
    ) -> crate::error::Result<Self> {
        check_len(name, minimum, bytes.len())?;
        Ok(Self::Mutable(bytes))
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Immutable(bytes) => bytes,
            Buffer::Mutable(bytes) => bytes,
        }
    }

    /// Writes to a read-only buffer are a programming error and panic.
    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        match self {
            Buffer::Immutable(_) => panic!("write operation called on readonly buffer"),
            Buffer::Mutable(bytes) => bytes,
        }
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }

    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes(self.read_array(offset))
    }

    pub fn read_array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let bytes = self.as_slice();
        core::array::from_fn(|i| bytes[offset + i])
    }

    pub fn write_u8(&mut self, offset: usize, val: u8) {
        self.as_slice_mut()[offset] = val;
    }

    pub fn write_u16(&mut self, offset: usize, val: u16) {
        self.write_array(offset, val.to_be_bytes());
    }

    pub fn write_array<const N: usize>(&mut self, offset: usize, vals: [u8; N]) {
        self.as_slice_mut()[offset..offset + N].copy_from_slice(&vals);
    }

    /// Copy `vals` into the buffer starting at `offset`, truncating to the space available.
    pub fn write_slice(&mut self, offset: usize, vals: &[u8]) {
        let bytes = self.as_slice_mut();
        let end = std::cmp::min(bytes.len(), offset + vals.len());
        bytes[offset..end].copy_from_slice(&vals[..end - offset]);
    }
}

fn check_len(name: &'static str, minimum: usize, provided: usize) -> crate::error::Result<()> {
    if provided >= minimum {
        Ok(())
    } else {
        Err(crate::error::Error::InsufficientPacketBuffer(
            name, minimum, provided,
        ))
    }
}
