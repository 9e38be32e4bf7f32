#![no_main]

use bitstream::BitReader;
use libfuzzer_sys::fuzz_target;

// The first half of the input picks operations, the second half is read.
fuzz_target!(|data: &[u8]| {
    let (ops, body) = data.split_at(data.len() / 2);
    let mut reader = BitReader::new(body);

    for &op in ops.iter().take(512) {
        let before = reader.bits_remaining();
        let ok = match op % 8 {
            0 => reader.read_u8_aligned().is_ok(),
            1 => reader.read_u64_aligned().is_ok(),
            2 => reader.read_varu64().is_ok(),
            3 => reader.read_u16_aligned().is_ok(),
            4 => reader.read_varu32().is_ok(),
            5 => reader.read_vars64().is_ok(),
            6 => reader.read_f32_aligned().is_ok(),
            _ => reader.read_bytes_aligned(usize::from(op / 8)).is_ok(),
        };
        assert!(reader.bits_remaining() <= before);
        assert_eq!(reader.bit_position() % 8, 0);
        if !ok && reader.is_empty() {
            break;
        }
    }
});
