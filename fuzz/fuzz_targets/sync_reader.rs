#![no_main]

use libfuzzer_sys::fuzz_target;
use sync::{CrySync, Quat, Vec3};
use wire::Limits;

const NAMES: [&str; 4] = ["a", "pos", "state", "value"];

fuzz_target!(|data: &[u8]| {
    let Some((&script_len, rest)) = data.split_first() else {
        return;
    };
    let (script, payload) = rest.split_at(usize::from(script_len).min(rest.len()));
    let Ok(mut sync) = CrySync::reader(payload, &Limits::for_testing()) else {
        return;
    };

    let mut open = 0usize;
    for &op in script {
        let name = NAMES[usize::from(op >> 6)];
        let _ = match op % 8 {
            0 => sync.sync(name, &mut 0u32),
            1 => sync.sync(name, &mut String::new()),
            2 => sync.sync(name, &mut Vec3::ZERO),
            3 => sync.sync_or(name, &mut Quat::IDENTITY, Quat::IDENTITY),
            4 => sync.begin_group(name).map(|()| open += 1),
            5 => match sync.begin_optional_group(name, false) {
                Ok(true) => {
                    open += 1;
                    Ok(())
                }
                other => other.map(|_| ()),
            },
            6 if open > 0 => sync.end_group().map(|()| open -= 1),
            _ => sync.sync(name, &mut false),
        };
    }
    assert_eq!(sync.depth(), open);
});
