#![no_main]

use libfuzzer_sys::fuzz_target;
use signoff_model::SheetLayout;

/// Keep individual inputs bounded; the loader's own ZIP-bomb caps protect
/// against decompression blowups, this guards the harness itself.
const MAX_INPUT_BYTES: usize = 1 << 20;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    // Vary the layout so header-row arithmetic near zero gets exercised.
    let selector = data[0];
    let layout = SheetLayout::new(
        u32::from(selector >> 4) + 1,
        if selector & 1 == 0 { "Name" } else { "이름" },
    );

    // Arbitrary bytes must produce Ok or a typed error, never a panic.
    let _ = signoff_xlsx::load_roster(data, &layout);
});
