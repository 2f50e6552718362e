#![no_main]

use libfuzzer_sys::fuzz_target;
use trip::FaultRule;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(rules) = FaultRule::parse_list(text, 1.0) {
        for rule in rules {
            assert!(rule.chance() > 0.0 && rule.chance() <= 1.0);
            assert!(rule.errno() == 0 || rule.function().allows(rule.errno()));
        }
    }
});
