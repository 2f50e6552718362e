//! The failure-decision engine.

use std::env;

use tracing::debug;

use crate::chance::{Chance, ChanceSource};
use crate::codec::{self, CONFIG_ENV, Configuration};
use crate::error::CodecError;
use crate::table::FaultTable;

/// Outcome of [`Injector::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Fail the call and report this `errno`.
    Fire(i32),
    /// Let the call through to the real implementation.
    NoFire,
}

/// Decoded configuration plus the chance source it draws from.
///
/// One `Injector` exists per process (see [`crate::InjectorCell`]); it is
/// never mutated after construction apart from the generator state inside
/// the chance source.
#[derive(Debug)]
pub struct Injector<C = Chance> {
    configuration: Configuration,
    chance: C,
}

impl Injector<Chance> {
    /// An injector that never fires.
    pub fn disabled() -> Self {
        Self::new(Configuration::default(), Chance::from_process())
    }

    /// Decodes `blob` and seeds a fresh generator for this process.
    ///
    /// Returns the injector and the names of any functions the blob
    /// mentioned that this build does not know.
    pub fn from_blob(blob: &str) -> Result<(Self, Vec<String>), CodecError> {
        let decoded = codec::decode(blob)?;
        Ok((
            Self::new(decoded.configuration, Chance::from_process()),
            decoded.dropped,
        ))
    }

    /// Builds the injector from [`CONFIG_ENV`]. A missing variable yields a
    /// disabled injector.
    pub fn from_env() -> Result<(Self, Vec<String>), CodecError> {
        match env::var_os(CONFIG_ENV) {
            None => Ok((Self::disabled(), Vec::new())),
            Some(raw) => {
                let blob = raw.into_string().map_err(|_| CodecError::NotUtf8)?;
                Self::from_blob(&blob)
            }
        }
    }
}

impl<C: ChanceSource> Injector<C> {
    pub fn new(configuration: Configuration, chance: C) -> Self {
        Self {
            configuration,
            chance,
        }
    }

    pub fn table(&self) -> &FaultTable {
        &self.configuration.table
    }

    pub fn is_debug(&self) -> bool {
        self.configuration.debug
    }

    /// Decides whether a call to `function` fails.
    ///
    /// Rules naming `function` are tried in table order. Each one consumes a
    /// draw; the first whose draw falls within its chance fires and ends the
    /// scan. A firing rule without an explicit error picks one of
    /// `plausible` uniformly (modulo bias accepted).
    pub fn decide(&self, function: &str, plausible: &[i32]) -> Decision {
        debug!(function, "intercepting");

        for rule in self.configuration.table.rules_for(function) {
            debug!(function, "probing");
            // Duplicate rules do not compound: with chances P then Q, the
            // second effectively fires with (1 - P) * Q.
            if self.chance.draw() > rule.chance() {
                continue;
            }

            let errno = if rule.errno() != 0 {
                rule.errno()
            } else if plausible.is_empty() {
                0
            } else {
                plausible[(self.chance.next_u64() % plausible.len() as u64) as usize]
            };

            debug!(function, errno, "tripping");
            return Decision::Fire(errno);
        }

        debug!(function, "forgiving");
        Decision::NoFire
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chance::LaggedFibonacci;
    use crate::registry::{self, Interceptable};
    use crate::rule::FaultRule;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays scripted raw outputs.
    struct Scripted(RefCell<VecDeque<u64>>);

    impl Scripted {
        fn new(values: impl IntoIterator<Item = u64>) -> Self {
            Self(RefCell::new(values.into_iter().collect()))
        }

        fn remaining(&self) -> usize {
            self.0.borrow().len()
        }
    }

    impl ChanceSource for Scripted {
        fn next_u64(&self) -> u64 {
            self.0.borrow_mut().pop_front().expect("script exhausted")
        }
    }

    /// Raw output whose draw is `u`.
    fn raw(u: f64) -> u64 {
        ((u * (1u64 << 53) as f64) as u64) << 11
    }

    fn function(name: &str) -> &'static Interceptable {
        registry::lookup(name).unwrap()
    }

    fn injector<C: ChanceSource>(rules: &[(&str, f64, i32)], chance: C) -> Injector<C> {
        let table = FaultTable::from_rules(
            rules
                .iter()
                .map(|&(name, p, e)| FaultRule::new(function(name), p, e).unwrap()),
        )
        .unwrap();
        Injector::new(Configuration::new(table, false), chance)
    }

    fn seeded(seed: u64) -> Chance {
        Chance::new(LaggedFibonacci::from_seed(seed, 1_700_000_000))
    }

    #[test]
    fn certain_rule_always_fires() {
        let inj = injector(&[("open", 1.0, libc::ENOENT)], seeded(1));
        let open: Vec<i32> = function("open").codes().collect();
        for _ in 0..10_000 {
            assert_eq!(inj.decide("open", &open), Decision::Fire(libc::ENOENT));
        }
    }

    #[test]
    fn absent_functions_never_fire() {
        let inj = injector(&[("open", 1.0, 0)], seeded(2));
        let read: Vec<i32> = function("read").codes().collect();
        for _ in 0..1000 {
            assert_eq!(inj.decide("read", &read), Decision::NoFire);
        }
    }

    #[test]
    fn absent_functions_consume_no_draws() {
        let script = Scripted::new(std::iter::empty());
        let inj = injector(&[("open", 0.5, 0)], script);
        assert_eq!(inj.decide("close", &[libc::EBADF]), Decision::NoFire);
    }

    #[test]
    fn implicit_error_comes_from_plausible_set() {
        let inj = injector(&[("malloc", 1.0, 0)], seeded(3));
        let malloc = function("malloc");
        let plausible: Vec<i32> = malloc.codes().collect();
        for _ in 0..1000 {
            match inj.decide("malloc", &plausible) {
                Decision::Fire(e) => assert!(malloc.allows(e)),
                Decision::NoFire => panic!("certain rule did not fire"),
            }
        }
    }

    #[test]
    fn implicit_error_covers_the_whole_set() {
        let inj = injector(&[("rename", 1.0, 0)], seeded(4));
        let plausible: Vec<i32> = function("rename").codes().collect();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            if let Decision::Fire(e) = inj.decide("rename", &plausible) {
                seen.insert(e);
            }
        }
        assert_eq!(seen.len(), plausible.len());
    }

    #[test]
    fn empty_plausible_set_reports_zero() {
        let inj = injector(&[("open", 1.0, 0)], seeded(5));
        assert_eq!(inj.decide("open", &[]), Decision::Fire(0));
    }

    #[test]
    fn first_firing_rule_wins() {
        // First rule misses (0.9 > 0.5), second fires (0.1 <= 0.5).
        let script = Scripted::new([raw(0.9), raw(0.1)]);
        let inj = injector(&[("open", 0.5, libc::EACCES), ("open", 0.5, libc::ENOENT)], script);
        assert_eq!(inj.decide("open", &[]), Decision::Fire(libc::ENOENT));
        assert_eq!(inj.chance.remaining(), 0);
    }

    #[test]
    fn scanning_stops_after_a_hit() {
        let script = Scripted::new([raw(0.1), raw(0.0)]);
        let inj = injector(&[("open", 0.5, libc::EACCES), ("open", 1.0, libc::ENOENT)], script);
        assert_eq!(inj.decide("open", &[]), Decision::Fire(libc::EACCES));
        assert_eq!(inj.chance.remaining(), 1);
    }

    #[test]
    fn draw_equal_to_chance_fires() {
        let script = Scripted::new([raw(0.5)]);
        let inj = injector(&[("open", 0.5, libc::EPERM)], script);
        assert_eq!(inj.decide("open", &[]), Decision::Fire(libc::EPERM));
    }

    #[test]
    fn implicit_error_uses_one_extra_draw() {
        let script = Scripted::new([raw(0.0), 5]);
        let inj = injector(&[("close", 1.0, 0)], script);
        let plausible = [10, 20, 30];
        // 5 % 3 == 2
        assert_eq!(inj.decide("close", &plausible), Decision::Fire(30));
    }

    #[test]
    fn half_chance_fires_about_half_the_time() {
        let inj = injector(&[("open", 0.5, libc::ENOENT)], seeded(6));
        let open: Vec<i32> = function("open").codes().collect();
        let fired = (0..10_000)
            .filter(|_| inj.decide("open", &open) == Decision::Fire(libc::ENOENT))
            .count();
        // Five standard deviations is 250.
        assert!((4_750..=5_250).contains(&fired), "fired {fired} times");
    }

    #[test]
    fn from_blob_reports_dropped_names() {
        let blob = format!(
            "Dnope{gs}0x1p+0{gs}0{rs}",
            gs = codec::GROUP_SEPARATOR,
            rs = codec::RECORD_SEPARATOR
        );
        let (inj, dropped) = Injector::from_blob(&blob).unwrap();
        assert!(inj.is_debug());
        assert!(inj.table().is_empty());
        assert_eq!(dropped, ["nope"]);
    }
}
