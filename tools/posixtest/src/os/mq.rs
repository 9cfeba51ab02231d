//! POSIX message queues.

use std::ffi::CString;
use std::mem;
use std::time::Duration;

use super::errno::{Errno, SysResult, cvt};
use super::time;

/// Attributes reported by `mq_getattr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MqInfo {
    pub max_messages: i64,
    pub message_size: i64,
    pub current_messages: i64,
}

/// An open message queue descriptor. Closed on drop.
#[derive(Debug)]
pub struct MessageQueue {
    mqd: libc::mqd_t,
}

fn c_name(name: &str) -> SysResult<CString> {
    CString::new(name).map_err(|_| Errno::EINVAL)
}

impl MessageQueue {
    /// Creates `name` with room for `capacity` messages of `message_size`
    /// bytes, failing with `EEXIST` if it exists.
    pub fn create_exclusive(name: &str, capacity: i64, message_size: i64) -> SysResult<Self> {
        Self::create_with(name, libc::O_CREAT | libc::O_EXCL, capacity, message_size)
    }

    /// Creates `name` or opens it if it exists. The attributes only apply
    /// when the queue is created.
    pub fn create(name: &str, capacity: i64, message_size: i64) -> SysResult<Self> {
        Self::create_with(name, libc::O_CREAT, capacity, message_size)
    }

    /// Opens an existing queue, failing with `ENOENT` if there is none.
    pub fn open(name: &str) -> SysResult<Self> {
        let name = c_name(name)?;
        // SAFETY: `name` is a valid C string; no O_CREAT, so no variadics.
        let mqd = unsafe { libc::mq_open(name.as_ptr(), libc::O_RDWR) };
        Ok(Self { mqd: cvt(mqd)? })
    }

    fn create_with(
        name: &str,
        flags: libc::c_int,
        capacity: i64,
        message_size: i64,
    ) -> SysResult<Self> {
        let name = c_name(name)?;
        // SAFETY: mq_attr is plain old data; glibc has private padding fields.
        let mut attr: libc::mq_attr = unsafe { mem::zeroed() };
        attr.mq_maxmsg = capacity as _;
        attr.mq_msgsize = message_size as _;
        let mode: libc::mode_t = 0o600;
        // SAFETY: `name` and `attr` are valid for the call; the variadic
        // arguments match what mq_open reads when O_CREAT is set.
        let mqd = unsafe {
            libc::mq_open(
                name.as_ptr(),
                flags | libc::O_RDWR,
                mode,
                &mut attr as *mut libc::mq_attr,
            )
        };
        Ok(Self { mqd: cvt(mqd)? })
    }

    /// Removes `name`. Open descriptors stay usable until closed.
    pub fn unlink(name: &str) -> SysResult<()> {
        let name = c_name(name)?;
        // SAFETY: `name` is a valid C string.
        cvt(unsafe { libc::mq_unlink(name.as_ptr()) }).map(drop)
    }

    pub fn info(&self) -> SysResult<MqInfo> {
        // SAFETY: mq_attr is plain old data.
        let mut attr: libc::mq_attr = unsafe { mem::zeroed() };
        // SAFETY: `mqd` is open; `attr` is a valid out-pointer.
        cvt(unsafe { libc::mq_getattr(self.mqd, &mut attr) })?;
        Ok(MqInfo {
            max_messages: attr.mq_maxmsg as i64,
            message_size: attr.mq_msgsize as i64,
            current_messages: attr.mq_curmsgs as i64,
        })
    }

    pub fn send(&self, message: &[u8], priority: u32) -> SysResult<()> {
        // SAFETY: `message` is valid for reads of its length.
        cvt(unsafe { libc::mq_send(self.mqd, message.as_ptr().cast(), message.len(), priority) })
            .map(drop)
    }

    /// Fails with `ETIMEDOUT` if the queue stays full for `timeout`.
    pub fn send_timeout(&self, message: &[u8], priority: u32, timeout: Duration) -> SysResult<()> {
        let deadline = time::deadline_after(timeout)?;
        // SAFETY: as in `send`; `deadline` outlives the call.
        cvt(unsafe {
            libc::mq_timedsend(
                self.mqd,
                message.as_ptr().cast(),
                message.len(),
                priority,
                &deadline,
            )
        })
        .map(drop)
    }

    /// Receives into `buf`; returns the message length and priority.
    ///
    /// Fails with `ETIMEDOUT` if the queue stays empty for `timeout`.
    pub fn receive_timeout(&self, buf: &mut [u8], timeout: Duration) -> SysResult<(usize, u32)> {
        let deadline = time::deadline_after(timeout)?;
        let mut priority = 0;
        // SAFETY: `buf` is valid for writes of its length; `deadline` outlives the call.
        let len = unsafe {
            libc::mq_timedreceive(
                self.mqd,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &mut priority,
                &deadline,
            )
        };
        if len < 0 {
            return Err(Errno::last());
        }
        Ok((len.unsigned_abs(), priority))
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        // SAFETY: `mqd` came from a successful mq_open.
        unsafe { libc::mq_close(self.mqd) };
    }
}
