#![no_main]

use libfuzzer_sys::fuzz_target;
use rmi::RmiFlags;

fuzz_target!(|data: &[u8]| {
    for &raw in data {
        if let Ok(flags) = RmiFlags::decode(raw) {
            assert_eq!(flags.encode(), raw);
        }
    }
});
