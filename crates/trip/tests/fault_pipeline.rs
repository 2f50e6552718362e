//! End-to-end: command-line rules through the wire format into decisions.

use trip::{
    Chance, Configuration, Decision, FaultRule, FaultTable, Injector, LaggedFibonacci, REGISTRY,
    codec, registry,
};

fn configuration(rules: &str, debug: bool) -> Configuration {
    let rules = FaultRule::parse_list(rules, 1.0).expect("valid rules");
    Configuration::new(FaultTable::from_rules(rules).expect("fits"), debug)
}

fn decoded_injector(config: &Configuration, seed: u64) -> Injector {
    let decoded = codec::decode(&codec::encode(config)).expect("decodes");
    assert!(decoded.dropped.is_empty());
    Injector::new(
        decoded.configuration,
        Chance::new(LaggedFibonacci::from_seed(seed, 1_700_000_000)),
    )
}

fn plausible(name: &str) -> Vec<i32> {
    registry::lookup(name).expect("registered").codes().collect()
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn rules_survive_the_exec_boundary() {
    let config = configuration("open:0.5:ENOENT,malloc:0.01,write:EIO", true);
    let injector = decoded_injector(&config, 11);

    assert!(injector.is_debug());
    assert_eq!(injector.table(), &config.table);
}

#[test]
fn explicit_error_is_always_reported() {
    let injector = decoded_injector(&configuration("write:1:EIO", false), 12);
    let write = plausible("write");
    for _ in 0..1_000 {
        assert_eq!(injector.decide("write", &write), Decision::Fire(libc::EIO));
    }
}

#[test]
fn malloc_always_fails_with_enomem() {
    let injector = decoded_injector(&configuration("malloc:1.0", false), 13);
    let malloc = plausible("malloc");
    for _ in 0..1_000 {
        assert_eq!(injector.decide("malloc", &malloc), Decision::Fire(libc::ENOMEM));
    }
}

#[test]
fn untouched_functions_pass_through() {
    let injector = decoded_injector(&configuration("open,malloc", false), 14);
    for function in REGISTRY
        .iter()
        .filter(|f| f.name != "open" && f.name != "malloc")
    {
        let codes: Vec<i32> = function.codes().collect();
        assert_eq!(injector.decide(function.name, &codes), Decision::NoFire);
    }
}

#[test]
fn rare_faults_are_rare() {
    let injector = decoded_injector(&configuration("read:0.01", false), 15);
    let read = plausible("read");
    let fired = (0..10_000)
        .filter(|_| injector.decide("read", &read) != Decision::NoFire)
        .count();
    // Mean 100, sd just under 10.
    assert!((50..=150).contains(&fired), "fired {fired} times");
}
