//! Bootstrap: parse the rules and replace ourselves with the target.

use std::ffi::{OsStr, OsString};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};
use trip::relaunch;
use trip::{Configuration, FaultRule, FaultTable};
use trip_config::TripConfig;

/// The positional arguments, split into rules and command.
#[derive(Debug, PartialEq)]
pub struct Invocation {
    pub rules: Vec<String>,
    pub command: Vec<OsString>,
}

impl Invocation {
    /// `SPEC [--] COMMAND...` or `SPEC SPEC... -- COMMAND...`.
    ///
    /// A `--` only ends the rules when everything before it is a rule;
    /// otherwise it belongs to the command.
    pub fn split(args: &[OsString]) -> Result<Self> {
        let terminator = args
            .iter()
            .position(|a| a == "--")
            .filter(|&at| args[..at].iter().all(|a| is_rule_list(a)));
        let (rules, command) = match terminator {
            Some(at) => (&args[..at], &args[at + 1..]),
            None if args.is_empty() => (args, args),
            None => (&args[..1], &args[1..]),
        };

        if rules.is_empty() {
            bail!("no fault rules given (try `trip --help`)");
        }
        if command.is_empty() {
            bail!("no command to run (try `trip --help`)");
        }

        let rules = rules
            .iter()
            .map(|rule| utf8(rule).map(str::to_string))
            .collect::<Result<_>>()?;

        Ok(Self {
            rules,
            command: command.to_vec(),
        })
    }
}

fn is_rule_list(arg: &OsStr) -> bool {
    arg.to_str()
        .is_some_and(|text| FaultRule::parse_list(text, 1.0).is_ok())
}

fn utf8(arg: &OsStr) -> Result<&str> {
    arg.to_str()
        .with_context(|| format!("fault rule {arg:?} is not valid UTF-8"))
}

/// Builds the fault table from every rule argument, in order.
pub fn fault_table(rules: &[String], default_chance: f64) -> Result<FaultTable> {
    let mut table = FaultTable::new();
    for argument in rules {
        for rule in FaultRule::parse_list(argument, default_chance)? {
            debug!(
                function = rule.name(),
                chance = rule.chance(),
                errno = rule.errno(),
                "rule"
            );
            table.push(rule)?;
        }
    }
    if table.is_empty() {
        bail!("no fault rules given (try `trip --help`)");
    }
    Ok(table)
}

pub fn run(config: &TripConfig, invocation: &Invocation, debug: bool) -> Result<()> {
    let table = fault_table(&invocation.rules, config.faults.default_chance)?;
    let configuration = Configuration::new(table, debug || config.log.trace_target);

    let exe = relaunch::current_exe()?;
    let preload = relaunch::locate_preload(
        &exe,
        config.preload.library.as_deref(),
        &config.preload.library_name,
    )?;

    info!(
        program = %invocation.command[0].to_string_lossy(),
        rules = configuration.table.len(),
        "tripping"
    );

    match relaunch::relaunch(&configuration, &preload, &invocation.command)? {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn single_rule_then_command() {
        let inv = Invocation::split(&args(&["open:0.5", "ls", "-l"])).unwrap();
        assert_eq!(inv.rules, ["open:0.5"]);
        assert_eq!(inv.command, args(&["ls", "-l"]));
    }

    #[test]
    fn several_rules_before_separator() {
        let inv = Invocation::split(&args(&["open", "malloc:0.1", "--", "ls", "--", "x"])).unwrap();
        assert_eq!(inv.rules, ["open", "malloc:0.1"]);
        assert_eq!(inv.command, args(&["ls", "--", "x"]));
    }

    #[test]
    fn separator_inside_the_command_is_kept() {
        let inv = Invocation::split(&args(&["socket:1", "grep", "--", "hi", "/tmp/f"])).unwrap();
        assert_eq!(inv.rules, ["socket:1"]);
        assert_eq!(inv.command, args(&["grep", "--", "hi", "/tmp/f"]));
    }

    #[test]
    fn invalid_rule_before_separator_is_still_reported() {
        let inv = Invocation::split(&args(&["nosuchfn", "--", "ls"])).unwrap();
        assert_eq!(inv.rules, ["nosuchfn"]);
        let err = fault_table(&inv.rules, 1.0).unwrap_err();
        assert!(err.to_string().contains("unknown function"), "{err}");
    }

    #[test]
    fn missing_parts_are_errors() {
        assert!(Invocation::split(&[]).is_err());
        assert!(Invocation::split(&args(&["open"])).is_err());
        assert!(Invocation::split(&args(&["open", "--"])).is_err());
        assert!(Invocation::split(&args(&["--", "ls"])).is_err());
    }

    #[test]
    fn table_keeps_argument_order() {
        let rules = vec!["open:0.5,read".to_string(), "open:ENOENT".to_string()];
        let table = fault_table(&rules, 0.25).unwrap();
        let summary: Vec<_> = table
            .rules()
            .iter()
            .map(|r| (r.name(), r.chance()))
            .collect();
        assert_eq!(summary, [("open", 0.5), ("read", 0.25), ("open", 0.25)]);
    }

    #[test]
    fn invalid_rules_fail_the_table() {
        let err = fault_table(&["open:2".to_string()], 1.0).unwrap_err();
        assert!(err.to_string().contains("greater than 1"), "{err}");
    }

    #[test]
    fn commas_alone_are_no_rules() {
        assert!(fault_table(&[",,".to_string()], 1.0).is_err());
    }
}
