//! Replacing the bootstrap with the target command.
//!
//! The child gets a minimal environment: the preload directive and the encoded
//! configuration, nothing else. The program itself is looked up in the
//! bootstrap's own `PATH`.

#![allow(unsafe_code)]

use std::convert::Infallible;
use std::env;
use std::ffi::{CStr, CString, OsStr, OsString};
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::ptr;

use tracing::debug;

use crate::codec::{self, CONFIG_ENV, Configuration};
use crate::error::RelaunchError;

/// Variable telling the dynamic loader what to preload.
pub const PRELOAD_ENV: &str = "LD_PRELOAD";

/// File name of the interposition object, as produced by the build.
pub const PRELOAD_LIBRARY: &str = "libtrip_preload.so";

/// Longest executable path accepted from `/proc/self/exe`.
pub const SELF_PATH_LIMIT: usize = 64 * 1024;

const SELF_EXE: &CStr = c"/proc/self/exe";

/// Returns true when this process already runs under a trip configuration.
pub fn configuration_present() -> bool {
    env::var_os(CONFIG_ENV).is_some()
}

/// Absolute path of the running executable, independent of `argv[0]`.
pub fn current_exe() -> Result<PathBuf, RelaunchError> {
    read_link(SELF_EXE, libc::PATH_MAX as usize, SELF_PATH_LIMIT).map_err(|err| match err {
        ReadLinkError::Os(source) => RelaunchError::SelfPath {
            path: "/proc/self/exe",
            source,
        },
        ReadLinkError::TooLong => RelaunchError::SelfPathTooLong {
            limit: SELF_PATH_LIMIT,
        },
    })
}

#[derive(Debug)]
enum ReadLinkError {
    Os(io::Error),
    TooLong,
}

/// `readlink(2)` with a buffer that doubles while the target fills it.
fn read_link(path: &CStr, initial: usize, limit: usize) -> Result<PathBuf, ReadLinkError> {
    let mut size = initial.clamp(1, limit);
    loop {
        let mut buf = vec![0u8; size];
        // SAFETY: `path` is NUL-terminated and `buf` is writable for `size` bytes.
        let written = unsafe { libc::readlink(path.as_ptr(), buf.as_mut_ptr().cast(), size) };
        let Ok(written) = usize::try_from(written) else {
            return Err(ReadLinkError::Os(io::Error::last_os_error()));
        };
        // A full buffer may mean truncation.
        if written < size {
            buf.truncate(written);
            return Ok(PathBuf::from(OsString::from_vec(buf)));
        }
        if size >= limit {
            return Err(ReadLinkError::TooLong);
        }
        size = (size * 2).min(limit);
    }
}

/// Finds the interposition object: `library` if given, otherwise `file_name`
/// beside `exe`.
pub fn locate_preload(
    exe: &Path,
    library: Option<&Path>,
    file_name: &str,
) -> Result<PathBuf, RelaunchError> {
    let path = match library {
        Some(path) => path.to_path_buf(),
        None => exe
            .parent()
            .ok_or_else(|| RelaunchError::NoParentDirectory(exe.to_path_buf()))?
            .join(file_name),
    };
    if !path.is_file() {
        return Err(RelaunchError::PreloadMissing { path });
    }
    Ok(path)
}

/// The child's complete environment.
pub fn child_environment(
    configuration: &Configuration,
    preload: &Path,
) -> Result<Vec<CString>, RelaunchError> {
    let blob = codec::encode(configuration);
    Ok(vec![
        assignment(PRELOAD_ENV, preload.as_os_str())?,
        assignment(CONFIG_ENV, OsStr::new(&blob))?,
    ])
}

fn assignment(name: &str, value: &OsStr) -> Result<CString, RelaunchError> {
    let mut bytes = Vec::with_capacity(name.len() + 1 + value.len());
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(b'=');
    bytes.extend_from_slice(value.as_bytes());
    c_string(bytes)
}

fn c_string(bytes: Vec<u8>) -> Result<CString, RelaunchError> {
    CString::new(bytes).map_err(|err| {
        RelaunchError::InteriorNul(String::from_utf8_lossy(&err.into_vec()).into_owned())
    })
}

/// Replaces the process image with `command`, run under `environment`.
///
/// Only returns on failure.
pub fn exec(command: &[OsString], environment: &[CString]) -> Result<Infallible, RelaunchError> {
    let Some(program) = command.first() else {
        return Err(RelaunchError::EmptyCommand);
    };

    let argv = command
        .iter()
        .map(|arg| c_string(arg.as_bytes().to_vec()))
        .collect::<Result<Vec<_>, _>>()?;
    let argv_ptrs: Vec<*const libc::c_char> = argv
        .iter()
        .map(|arg| arg.as_ptr())
        .chain(std::iter::once(ptr::null()))
        .collect();
    let envp_ptrs: Vec<*const libc::c_char> = environment
        .iter()
        .map(|var| var.as_ptr())
        .chain(std::iter::once(ptr::null()))
        .collect();

    debug!(program = %program.to_string_lossy(), args = command.len(), "exec");

    // SAFETY: every pointer refers to a live NUL-terminated string owned by
    // `argv` or `environment`, and both arrays end with a null pointer.
    unsafe {
        libc::execvpe(argv_ptrs[0], argv_ptrs.as_ptr(), envp_ptrs.as_ptr());
    }

    Err(RelaunchError::Exec {
        program: program.to_string_lossy().into_owned(),
        source: io::Error::last_os_error(),
    })
}

/// Encodes `configuration` and execs `command` with `preload` loaded.
pub fn relaunch(
    configuration: &Configuration,
    preload: &Path,
    command: &[OsString],
) -> Result<Infallible, RelaunchError> {
    let environment = child_environment(configuration, preload)?;
    debug!(
        preload = %preload.display(),
        rules = configuration.table.len(),
        "relaunching"
    );
    exec(command, &environment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::FaultRule;
    use crate::table::FaultTable;
    use std::fs;
    use std::os::unix::fs::symlink;

    fn c_path(path: &Path) -> CString {
        CString::new(path.as_os_str().as_bytes()).unwrap()
    }

    #[test]
    fn current_exe_matches_std() {
        assert_eq!(current_exe().unwrap(), env::current_exe().unwrap());
    }

    #[test]
    fn read_link_grows_its_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let target = "t".repeat(100);
        let link = dir.path().join("link");
        symlink(&target, &link).unwrap();

        let resolved = read_link(&c_path(&link), 4, 1024).unwrap();
        assert_eq!(resolved, PathBuf::from(target));
    }

    #[test]
    fn read_link_respects_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");
        symlink("x".repeat(100), &link).unwrap();

        assert!(matches!(
            read_link(&c_path(&link), 4, 64),
            Err(ReadLinkError::TooLong)
        ));
        // Exactly filling the final buffer is still ambiguous.
        assert!(matches!(
            read_link(&c_path(&link), 4, 100),
            Err(ReadLinkError::TooLong)
        ));
        assert!(read_link(&c_path(&link), 4, 101).is_ok());
    }

    #[test]
    fn read_link_reports_os_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            read_link(&c_path(&missing), 16, 64),
            Err(ReadLinkError::Os(_))
        ));
    }

    #[test]
    fn preload_is_found_next_to_the_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("trip");
        let library = dir.path().join(PRELOAD_LIBRARY);
        fs::write(&library, b"").unwrap();

        assert_eq!(locate_preload(&exe, None, PRELOAD_LIBRARY).unwrap(), library);
    }

    #[test]
    fn preload_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let library = dir.path().join("custom.so");
        fs::write(&library, b"").unwrap();

        let found = locate_preload(Path::new("/nonexistent/trip"), Some(&library), PRELOAD_LIBRARY);
        assert_eq!(found.unwrap(), library);
    }

    #[test]
    fn missing_preload_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate_preload(&dir.path().join("trip"), None, PRELOAD_LIBRARY).unwrap_err();
        assert!(matches!(err, RelaunchError::PreloadMissing { .. }));
    }

    #[test]
    fn environment_has_exactly_two_entries() {
        let table = FaultTable::from_rules(FaultRule::parse_list("open:0.5", 1.0).unwrap()).unwrap();
        let configuration = Configuration::new(table, true);
        let env = child_environment(&configuration, Path::new("/opt/trip/libtrip_preload.so"))
            .unwrap();

        assert_eq!(env.len(), 2);
        assert_eq!(env[0].to_str().unwrap(), "LD_PRELOAD=/opt/trip/libtrip_preload.so");
        let expected = format!("{CONFIG_ENV}={}", codec::encode(&configuration));
        assert_eq!(env[1].to_str().unwrap(), expected);
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(exec(&[], &[]), Err(RelaunchError::EmptyCommand)));
    }

    #[test]
    fn nul_in_arguments_is_rejected() {
        let command = [OsString::from("true"), OsString::from("a\0b")];
        assert!(matches!(
            exec(&command, &[]),
            Err(RelaunchError::InteriorNul(_))
        ));
    }

    #[test]
    fn failed_exec_returns_the_os_error() {
        let command = [OsString::from("/nonexistent/definitely/not/here")];
        match exec(&command, &[]) {
            Err(RelaunchError::Exec { program, source }) => {
                assert_eq!(program, "/nonexistent/definitely/not/here");
                assert_eq!(source.raw_os_error(), Some(libc::ENOENT));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
