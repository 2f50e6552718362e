//! # trip
//!
//! Probabilistic fault injection for C-library calls.
//!
//! `trip` makes selected libc functions in a target program fail with a given
//! probability and `errno`, so that the target's error paths actually run. The
//! system has two halves that share this crate:
//!
//! - the **bootstrap** (`trip` binary) parses rules such as
//!   `open:0.5:ENOENT,malloc:0.01`, encodes them with [`codec`] and replaces
//!   itself with the target command via [`relaunch`];
//! - the **interposition object** (`libtrip_preload.so`) is preloaded into the
//!   target, decodes the rules once into an [`Injector`] and asks it, on every
//!   intercepted call, whether to fail.
//!
//! ```
//! use trip::{Configuration, FaultRule, FaultTable, codec};
//!
//! let rules = FaultRule::parse_list("open:0.5:ENOENT,malloc:0.01", 1.0).unwrap();
//! let config = Configuration::new(FaultTable::from_rules(rules).unwrap(), false);
//! let blob = codec::encode(&config);
//! assert_eq!(codec::decode(&blob).unwrap().configuration, config);
//! ```

pub mod chance;
pub mod codec;
pub mod context;
pub mod engine;
pub mod error;
pub mod hexfloat;
pub mod registry;
pub mod relaunch;
pub mod rule;
pub mod table;

pub use chance::{Chance, ChanceSource, LaggedFibonacci};
pub use codec::{CONFIG_ENV, Configuration, Decoded};
pub use context::InjectorCell;
pub use engine::{Decision, Injector};
pub use error::{CodecError, RelaunchError, RuleError, TableFull};
pub use registry::{Errno, Interceptable, REGISTRY};
pub use rule::FaultRule;
pub use table::{FaultTable, MAX_RULES};
