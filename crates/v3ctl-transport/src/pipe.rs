//! Windows named-pipe client side.

use std::fs::{File, OpenOptions};
use std::io;
use std::iter;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::AsRawHandle;
use std::path::Path;
use std::time::Duration;

use windows_sys::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_PIPE_BUSY, ERROR_SEM_TIMEOUT};
use windows_sys::Win32::System::Pipes::{
    SetNamedPipeHandleState, WaitNamedPipeW, PIPE_READMODE_MESSAGE,
};

fn wide(path: &Path) -> Vec<u16> {
    path.as_os_str()
        .encode_wide()
        .chain(iter::once(0))
        .collect()
}

/// Wait up to `timeout` for a free instance of the pipe.
///
/// `Ok(false)` means the pipe does not exist yet or stayed busy.
pub(crate) fn wait_available(path: &Path, timeout: Duration) -> io::Result<bool> {
    let name = wide(path);
    // 0 would select the server's default wait.
    let millis = u32::try_from(timeout.as_millis())
        .unwrap_or(u32::MAX)
        .max(1);

    // SAFETY: `name` is a NUL-terminated UTF-16 string that outlives the call.
    let ok = unsafe { WaitNamedPipeW(name.as_ptr(), millis) };
    if ok != 0 {
        return Ok(true);
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error().map(|code| code as u32) {
        Some(ERROR_FILE_NOT_FOUND) | Some(ERROR_SEM_TIMEOUT) => Ok(false),
        _ => Err(err),
    }
}

pub(crate) fn open(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

/// Another client grabbed the instance between wait and open.
pub(crate) fn is_busy(err: &io::Error) -> bool {
    err.raw_os_error().map(|code| code as u32) == Some(ERROR_PIPE_BUSY)
}

/// Switch the client handle to message-mode reads so one read is one frame.
pub(crate) fn set_message_mode(file: &File) -> io::Result<()> {
    let mode = PIPE_READMODE_MESSAGE;
    // SAFETY: the handle is open for the lifetime of `file`; `mode` is a valid
    // pointer and the two optional arguments are allowed to be null.
    let ok = unsafe {
        SetNamedPipeHandleState(
            file.as_raw_handle() as _,
            &mode,
            std::ptr::null(),
            std::ptr::null(),
        )
    };
    if ok == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
