/// Read `width` bits starting `offset` bits into `bytes`, counting from the
/// most significant bit of the first byte, as a big-endian integer.
///
/// Returns `None` when the field runs past the end of `bytes` or is wider
/// than 64 bits.
pub(crate) fn read_bits(bytes: &[u8], offset: u64, width: u64) -> Option<u64> {
    if width > 64 {
        return None;
    }
    let end = offset.checked_add(width)?;
    if end > (bytes.len() as u64) * 8 {
        return None;
    }
    let mut value = 0u64;
    let mut bit = offset;
    while bit < end {
        let byte = bytes[(bit / 8) as usize];
        let within = bit % 8;
        // Take as many bits as remain in this byte, up to the field end.
        let take = (8 - within).min(end - bit);
        let shifted = u64::from(byte) >> (8 - within - take);
        let mask = (1u64 << take) - 1;
        value = (value << take) | (shifted & mask);
        bit += take;
    }
    Some(value)
}
