//! # trip-preload
//!
//! The interposition object. Loaded into the target through `LD_PRELOAD`, it
//! exports a replacement for every function in the trip registry. Each
//! replacement asks the process-wide [`Injector`] whether to fail; if so it
//! sets `errno` and returns the function's failure value without calling the
//! real function, otherwise it forwards the call unchanged to the next
//! definition of the symbol (`dlsym(RTLD_NEXT, ...)`).
//!
//! ## Re-entrancy
//!
//! Deciding allocates, takes locks and, in debug mode, writes to stderr. All
//! of that goes through the very functions this object replaces. A
//! thread-local busy flag marks the time spent inside trip; calls arriving
//! while it is set skip the engine and go straight to the real function.
//!
//! Resolving a real symbol calls `dlsym`, which must not itself allocate
//! through an unresolved wrapper. glibc satisfies this on the success path.

#![allow(unsafe_code)]

use std::cell::Cell;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use tracing::debug;
use tracing_subscriber::EnvFilter;
use trip::{Decision, Injector, InjectorCell};

static INJECTOR: InjectorCell = InjectorCell::new();

thread_local! {
    static BUSY: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running trip's own code.
struct Busy;

impl Busy {
    /// Returns `None` if the thread is already inside trip.
    fn enter() -> Option<Self> {
        BUSY.try_with(|busy| {
            if busy.replace(true) {
                None
            } else {
                Some(Busy)
            }
        })
        .ok()
        .flatten()
    }
}

impl Drop for Busy {
    fn drop(&mut self) {
        let _ = BUSY.try_with(|busy| busy.set(false));
    }
}

/// Lazily resolved address of the real definition of a symbol.
struct RealSymbol {
    /// NUL-terminated.
    name: &'static str,
    address: AtomicPtr<c_void>,
}

impl RealSymbol {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            address: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// The next definition after this object. Aborts if there is none.
    fn resolve(&self) -> *mut c_void {
        let cached = self.address.load(Ordering::Acquire);
        if !cached.is_null() {
            return cached;
        }
        // SAFETY: `name` is NUL-terminated; RTLD_NEXT is valid from a
        // shared object.
        let address = unsafe { libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr().cast()) };
        if address.is_null() {
            unresolved(self.name);
        }
        // Racing resolvers store the same address.
        self.address.store(address, Ordering::Release);
        address
    }
}

/// Reports a missing real symbol and aborts.
///
/// Writes through the raw syscall so a failure to resolve `write` itself
/// cannot recurse.
fn unresolved(name: &str) -> ! {
    let name = name.trim_end_matches('\0');
    // SAFETY: dlerror returns null or a NUL-terminated string owned by libdl.
    let reason = unsafe {
        let text = libc::dlerror();
        if text.is_null() {
            &b"symbol not found"[..]
        } else {
            std::ffi::CStr::from_ptr(text).to_bytes()
        }
    };
    let parts: [&[u8]; 5] = [b"trip: cannot resolve ", name.as_bytes(), b": ", reason, b"\n"];
    for part in parts {
        // SAFETY: `part` is a live byte slice.
        unsafe {
            libc::syscall(libc::SYS_write, libc::STDERR_FILENO, part.as_ptr(), part.len());
        }
    }
    // SAFETY: abort never returns and has no preconditions.
    unsafe { libc::abort() }
}

/// The process's injector, decoded from the environment on first use.
///
/// Must be called with the busy flag held.
fn injector() -> &'static Injector {
    INJECTOR.get_or_init(|| match Injector::from_env() {
        Ok((injector, dropped)) => {
            if injector.is_debug() {
                install_subscriber();
            }
            for name in dropped {
                debug!(function = %name, "ignoring unknown function");
            }
            debug!(rules = injector.table().len(), "configured");
            injector
        }
        Err(err) => {
            eprintln!("trip: {err}");
            // SAFETY: abort never returns and has no preconditions.
            unsafe { libc::abort() }
        }
    })
}

fn install_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new("trip=debug,trip_preload=debug"))
        .with_target(false)
        .without_time()
        .try_init();
}

/// Asks the engine about one call. Nested calls never fail.
fn decide(function: &'static str, plausible: &[libc::c_int]) -> Decision {
    match Busy::enter() {
        Some(_busy) => injector().decide(function, plausible),
        None => Decision::NoFire,
    }
}

fn set_errno(errno: libc::c_int) {
    // SAFETY: __errno_location always returns this thread's errno slot.
    unsafe {
        *libc::__errno_location() = errno;
    }
}

/// Shared body of every wrapper.
///
/// `call` receives the real function's address and must invoke it with the
/// original arguments.
fn intercept<R>(
    function: &'static str,
    plausible: &[libc::c_int],
    real: &RealSymbol,
    sentinel: R,
    call: impl FnOnce(*mut c_void) -> R,
) -> R {
    match decide(function, plausible) {
        Decision::Fire(errno) => {
            set_errno(errno);
            sentinel
        }
        Decision::NoFire => {
            let address = {
                let _busy = Busy::enter();
                real.resolve()
            };
            call(address)
        }
    }
}

macro_rules! interpose {
    ($(
        fn $name:ident ( $( $arg:ident : $ty:ty ),* ) -> $ret:ty = $fail:expr ;
            [ $( $err:ident ),* $(,)? ] ;
    )*) => {
        $(
            #[doc = concat!("Fault-injecting replacement for `", stringify!($name), "`.")]
            ///
            /// # Safety
            ///
            /// Same contract as the C library function it replaces.
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name( $( $arg : $ty ),* ) -> $ret {
                type Real = unsafe extern "C" fn( $( $ty ),* ) -> $ret;
                static REAL: RealSymbol = RealSymbol::new(concat!(stringify!($name), "\0"));
                const PLAUSIBLE: &[libc::c_int] = &[ $( libc::$err ),* ];

                intercept(stringify!($name), PLAUSIBLE, &REAL, $fail, |address| {
                    // SAFETY: `address` is the next definition of this very
                    // symbol, which has signature `Real`.
                    unsafe {
                        let real = std::mem::transmute::<*mut c_void, Real>(address);
                        real( $( $arg ),* )
                    }
                })
            }
        )*
    };
}

#[cfg(not(test))]
trip::for_each_interceptable!(interpose);
