//! The fixed set of interceptable functions.
//!
//! Every function `trip` can fail is declared exactly once, in
//! [`for_each_interceptable!`]. That table is expanded twice: here, into the
//! read-only [`REGISTRY`] used to validate user input, and in `trip-preload`,
//! into the exported wrappers that replace the real symbols. Each entry names
//! the C signature, the value the function returns on failure, and the
//! `errno` values a real implementation may plausibly report.

/// Expands `$callback! { ... }` with the full interception table.
///
/// Each entry has the shape
///
/// ```text
/// fn name(arg: Type, ...) -> Ret = sentinel; [EXXX, EYYY];
/// ```
///
/// Types and error names are written as paths into the `libc` crate, so any
/// crate expanding the table must depend on `libc`.
#[macro_export]
macro_rules! for_each_interceptable {
    ($callback:ident) => {
        $callback! {
            // File I/O
            fn open(path: *const libc::c_char, flags: libc::c_int, mode: libc::mode_t) -> libc::c_int = -1;
                [EACCES, EEXIST, EINTR, EISDIR, ELOOP, EMFILE, ENAMETOOLONG, ENFILE, ENOENT, ENOMEM, ENOSPC, ENOTDIR, EPERM, EROFS];
            fn openat(dirfd: libc::c_int, path: *const libc::c_char, flags: libc::c_int, mode: libc::mode_t) -> libc::c_int = -1;
                [EACCES, EBADF, EEXIST, EINTR, EISDIR, ELOOP, EMFILE, ENAMETOOLONG, ENFILE, ENOENT, ENOMEM, ENOSPC, ENOTDIR, EPERM, EROFS];
            fn open64(path: *const libc::c_char, flags: libc::c_int, mode: libc::mode_t) -> libc::c_int = -1;
                [EACCES, EEXIST, EINTR, EISDIR, ELOOP, EMFILE, ENAMETOOLONG, ENFILE, ENOENT, ENOMEM, ENOSPC, ENOTDIR, EPERM, EROFS];
            fn creat(path: *const libc::c_char, mode: libc::mode_t) -> libc::c_int = -1;
                [EACCES, EEXIST, EINTR, EISDIR, EMFILE, ENFILE, ENOENT, ENOSPC, EROFS];
            fn close(fd: libc::c_int) -> libc::c_int = -1;
                [EBADF, EINTR, EIO, ENOSPC, EDQUOT];
            fn read(fd: libc::c_int, buf: *mut libc::c_void, count: libc::size_t) -> libc::ssize_t = -1;
                [EAGAIN, EBADF, EFAULT, EINTR, EINVAL, EIO, EISDIR];
            fn write(fd: libc::c_int, buf: *const libc::c_void, count: libc::size_t) -> libc::ssize_t = -1;
                [EAGAIN, EBADF, EDQUOT, EFAULT, EFBIG, EINTR, EINVAL, EIO, ENOSPC, EPIPE];
            fn pread(fd: libc::c_int, buf: *mut libc::c_void, count: libc::size_t, offset: libc::off_t) -> libc::ssize_t = -1;
                [EBADF, EINTR, EINVAL, EIO, ESPIPE];
            fn pwrite(fd: libc::c_int, buf: *const libc::c_void, count: libc::size_t, offset: libc::off_t) -> libc::ssize_t = -1;
                [EBADF, EDQUOT, EFBIG, EINTR, EIO, ENOSPC, ESPIPE];
            fn lseek(fd: libc::c_int, offset: libc::off_t, whence: libc::c_int) -> libc::off_t = -1;
                [EBADF, EINVAL, ENXIO, EOVERFLOW, ESPIPE];
            fn fsync(fd: libc::c_int) -> libc::c_int = -1;
                [EBADF, EDQUOT, EINTR, EIO, ENOSPC, EROFS];
            fn fdatasync(fd: libc::c_int) -> libc::c_int = -1;
                [EBADF, EDQUOT, EINTR, EIO, ENOSPC, EROFS];
            fn ftruncate(fd: libc::c_int, length: libc::off_t) -> libc::c_int = -1;
                [EBADF, EFBIG, EINTR, EINVAL, EIO, EPERM];
            fn dup(oldfd: libc::c_int) -> libc::c_int = -1;
                [EBADF, EMFILE];
            fn dup2(oldfd: libc::c_int, newfd: libc::c_int) -> libc::c_int = -1;
                [EBADF, EBUSY, EINTR, EMFILE];
            fn pipe(fds: *mut libc::c_int) -> libc::c_int = -1;
                [EFAULT, EMFILE, ENFILE];

            // Filesystem
            fn unlink(path: *const libc::c_char) -> libc::c_int = -1;
                [EACCES, EBUSY, EIO, EISDIR, ELOOP, ENAMETOOLONG, ENOENT, ENOMEM, ENOTDIR, EPERM, EROFS];
            fn rename(oldpath: *const libc::c_char, newpath: *const libc::c_char) -> libc::c_int = -1;
                [EACCES, EBUSY, EDQUOT, EINVAL, EISDIR, ELOOP, EMLINK, ENOENT, ENOSPC, ENOTDIR, ENOTEMPTY, EPERM, EROFS, EXDEV];
            fn mkdir(path: *const libc::c_char, mode: libc::mode_t) -> libc::c_int = -1;
                [EACCES, EDQUOT, EEXIST, ELOOP, EMLINK, ENAMETOOLONG, ENOENT, ENOMEM, ENOSPC, ENOTDIR, EPERM, EROFS];
            fn rmdir(path: *const libc::c_char) -> libc::c_int = -1;
                [EACCES, EBUSY, EINVAL, ELOOP, ENOENT, ENOTDIR, ENOTEMPTY, EPERM, EROFS];
            fn chdir(path: *const libc::c_char) -> libc::c_int = -1;
                [EACCES, EIO, ELOOP, ENAMETOOLONG, ENOENT, ENOTDIR];
            fn access(path: *const libc::c_char, mode: libc::c_int) -> libc::c_int = -1;
                [EACCES, EIO, ELOOP, ENAMETOOLONG, ENOENT, ENOTDIR, EROFS];
            fn symlink(target: *const libc::c_char, linkpath: *const libc::c_char) -> libc::c_int = -1;
                [EACCES, EDQUOT, EEXIST, EIO, ELOOP, ENOENT, ENOSPC, ENOTDIR, EPERM, EROFS];
            fn link(oldpath: *const libc::c_char, newpath: *const libc::c_char) -> libc::c_int = -1;
                [EACCES, EDQUOT, EEXIST, EIO, EMLINK, ENOENT, ENOSPC, EPERM, EROFS, EXDEV];
            fn chmod(path: *const libc::c_char, mode: libc::mode_t) -> libc::c_int = -1;
                [EACCES, EIO, ELOOP, ENOENT, ENOTDIR, EPERM, EROFS];
            fn opendir(name: *const libc::c_char) -> *mut libc::DIR = ::std::ptr::null_mut();
                [EACCES, EMFILE, ENFILE, ENOENT, ENOMEM, ENOTDIR];

            // Standard I/O
            fn fopen(path: *const libc::c_char, mode: *const libc::c_char) -> *mut libc::FILE = ::std::ptr::null_mut();
                [EACCES, EINVAL, EISDIR, EMFILE, ENFILE, ENOENT, ENOMEM, ENOSPC, EROFS];
            fn fopen64(path: *const libc::c_char, mode: *const libc::c_char) -> *mut libc::FILE = ::std::ptr::null_mut();
                [EACCES, EINVAL, EISDIR, EMFILE, ENFILE, ENOENT, ENOMEM, ENOSPC, EROFS];
            fn fclose(stream: *mut libc::FILE) -> libc::c_int = -1;
                [EBADF, EIO, ENOSPC];
            fn fflush(stream: *mut libc::FILE) -> libc::c_int = -1;
                [EBADF, EIO, ENOSPC];

            // Memory
            fn malloc(size: libc::size_t) -> *mut libc::c_void = ::std::ptr::null_mut();
                [ENOMEM];
            fn calloc(nmemb: libc::size_t, size: libc::size_t) -> *mut libc::c_void = ::std::ptr::null_mut();
                [ENOMEM];
            fn realloc(ptr: *mut libc::c_void, size: libc::size_t) -> *mut libc::c_void = ::std::ptr::null_mut();
                [ENOMEM];
            fn mmap(addr: *mut libc::c_void, len: libc::size_t, prot: libc::c_int, flags: libc::c_int, fd: libc::c_int, offset: libc::off_t) -> *mut libc::c_void = libc::MAP_FAILED;
                [EACCES, EAGAIN, EBADF, EINVAL, ENFILE, ENODEV, ENOMEM, EPERM];
            fn munmap(addr: *mut libc::c_void, len: libc::size_t) -> libc::c_int = -1;
                [EINVAL];

            // Processes
            fn fork() -> libc::pid_t = -1;
                [EAGAIN, ENOMEM];
            fn kill(pid: libc::pid_t, sig: libc::c_int) -> libc::c_int = -1;
                [EINVAL, EPERM, ESRCH];

            // Sockets
            fn socket(domain: libc::c_int, ty: libc::c_int, protocol: libc::c_int) -> libc::c_int = -1;
                [EACCES, EAFNOSUPPORT, EINVAL, EMFILE, ENFILE, ENOBUFS, ENOMEM, EPROTONOSUPPORT];
            fn bind(fd: libc::c_int, addr: *const libc::sockaddr, len: libc::socklen_t) -> libc::c_int = -1;
                [EACCES, EADDRINUSE, EADDRNOTAVAIL, EBADF, EINVAL, ENOTSOCK];
            fn listen(fd: libc::c_int, backlog: libc::c_int) -> libc::c_int = -1;
                [EADDRINUSE, EBADF, ENOTSOCK, EOPNOTSUPP];
            fn accept(fd: libc::c_int, addr: *mut libc::sockaddr, len: *mut libc::socklen_t) -> libc::c_int = -1;
                [EAGAIN, EBADF, ECONNABORTED, EINTR, EINVAL, EMFILE, ENFILE, ENOBUFS, ENOMEM, EPERM, EPROTO];
            fn connect(fd: libc::c_int, addr: *const libc::sockaddr, len: libc::socklen_t) -> libc::c_int = -1;
                [EACCES, EADDRINUSE, EADDRNOTAVAIL, EAGAIN, ECONNREFUSED, EINTR, ENETUNREACH, ETIMEDOUT];
            fn send(fd: libc::c_int, buf: *const libc::c_void, len: libc::size_t, flags: libc::c_int) -> libc::ssize_t = -1;
                [EAGAIN, EBADF, ECONNRESET, EINTR, EMSGSIZE, ENOBUFS, ENOMEM, ENOTCONN, EPIPE];
            fn recv(fd: libc::c_int, buf: *mut libc::c_void, len: libc::size_t, flags: libc::c_int) -> libc::ssize_t = -1;
                [EAGAIN, EBADF, ECONNREFUSED, EINTR, ENOMEM, ENOTCONN];
        }
    };
}

/// A named `errno` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno {
    pub name: &'static str,
    pub code: i32,
}

/// A function `trip` knows how to intercept.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Interceptable {
    pub name: &'static str,
    /// Errors a real implementation may report, in declaration order.
    pub errors: &'static [Errno],
}

impl Interceptable {
    /// Resolves an error name (`ENOENT`, `enoent`) or a decimal code against
    /// this function's plausible set.
    pub fn errno_by_name(&self, name: &str) -> Option<Errno> {
        if let Ok(code) = name.parse::<i32>() {
            return self.errors.iter().copied().find(|e| e.code == code);
        }
        self.errors
            .iter()
            .copied()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Returns true if `code` is in the plausible set.
    pub fn allows(&self, code: i32) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// The plausible codes as plain integers.
    pub fn codes(&self) -> impl Iterator<Item = i32> + '_ {
        self.errors.iter().map(|e| e.code)
    }
}

macro_rules! registry_table {
    ($(
        fn $name:ident ( $( $arg:ident : $ty:ty ),* ) -> $ret:ty = $fail:expr ;
            [ $( $err:ident ),* $(,)? ] ;
    )*) => {
        /// Every interceptable function, in table order.
        pub static REGISTRY: &[Interceptable] = &[
            $(
                Interceptable {
                    name: stringify!($name),
                    errors: &[ $( Errno { name: stringify!($err), code: libc::$err } ),* ],
                },
            )*
        ];
    };
}

crate::for_each_interceptable!(registry_table);

/// Looks up a function by its exact C name.
pub fn lookup(name: &str) -> Option<&'static Interceptable> {
    REGISTRY.iter().find(|f| f.name == name)
}

/// Returns the symbolic name of `code` if any registered function lists it.
pub fn errno_name(code: i32) -> Option<&'static str> {
    REGISTRY
        .iter()
        .flat_map(|f| f.errors.iter())
        .find(|e| e.code == code)
        .map(|e| e.name)
}
