#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut image = data.to_vec();
    match trip_fix_pie::clear_pie_flag_in(&mut image) {
        // Exactly one d_val may change, and only by losing DF_1_PIE.
        Ok(entry) => {
            let changed = image.iter().zip(data).filter(|(a, b)| a != b).count();
            assert!(changed >= 1 && changed <= 8);
            assert!(entry.offset + 8 <= image.len());
        }
        Err(_) => assert_eq!(image, data),
    }
});
