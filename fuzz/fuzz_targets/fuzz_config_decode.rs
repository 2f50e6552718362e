#![no_main]

use libfuzzer_sys::fuzz_target;
use trip::codec;

fuzz_target!(|data: &[u8]| {
    let Ok(blob) = std::str::from_utf8(data) else {
        return;
    };

    // Whatever decodes must survive a second trip through the codec
    // unchanged (dropped names aside).
    if let Ok(decoded) = codec::decode(blob) {
        let again = codec::decode(&codec::encode(&decoded.configuration))
            .expect("re-encoding a decoded configuration must decode");
        assert!(again.dropped.is_empty());
        assert_eq!(again.configuration.debug, decoded.configuration.debug);
        let (a, b) = (again.configuration.table, decoded.configuration.table);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.rules().iter().zip(b.rules()) {
            assert_eq!(x.name(), y.name());
            assert_eq!(x.chance().to_bits(), y.chance().to_bits());
            assert_eq!(x.errno(), y.errno());
        }
    }
});
