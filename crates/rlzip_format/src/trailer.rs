/// The 20-byte member trailer, all fields little-endian.
///
/// | Bytes | Field                                        |
/// |-------|----------------------------------------------|
/// | 0-3   | CRC32 of the uncompressed data               |
/// | 4-11  | uncompressed data size                       |
/// | 12-19 | member size (header + stream + this trailer) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Trailer([u8; Trailer::SIZE]);

impl Trailer {
    pub const SIZE: usize = 20;

    pub fn new() -> Self {
        Self([0; Self::SIZE])
    }

    pub fn from_bytes(data: [u8; Trailer::SIZE]) -> Self {
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8; Trailer::SIZE] {
        &self.0
    }

    pub fn data_crc(&self) -> u32 {
        u32::from_le_bytes(self.0[0..4].try_into().expect("4-byte slice"))
    }

    pub fn set_data_crc(&mut self, crc: u32) {
        self.0[0..4].copy_from_slice(&crc.to_le_bytes());
    }

    pub fn data_size(&self) -> u64 {
        u64::from_le_bytes(self.0[4..12].try_into().expect("8-byte slice"))
    }

    pub fn set_data_size(&mut self, size: u64) {
        self.0[4..12].copy_from_slice(&size.to_le_bytes());
    }

    pub fn member_size(&self) -> u64 {
        u64::from_le_bytes(self.0[12..20].try_into().expect("8-byte slice"))
    }

    pub fn set_member_size(&mut self, size: u64) {
        self.0[12..20].copy_from_slice(&size.to_le_bytes());
    }
}
