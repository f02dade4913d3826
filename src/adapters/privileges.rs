use crate::domain::ports::Privileges;
use std::io;
use std::path::Path;

/// 透過 libc 操作目前程序的身分
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPrivileges;

#[cfg(unix)]
fn check(rc: libc::c_int) -> io::Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
impl Privileges for SystemPrivileges {
    fn effective_uid(&self) -> u32 {
        unsafe { libc::geteuid() }
    }

    fn chown(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()> {
        std::os::unix::fs::chown(path, Some(uid), Some(gid))
    }

    fn drop_to(&self, uid: u32, gid: u32) -> io::Result<()> {
        // 順序不可調換：先清掉附加群組與 gid，放棄 root 之後就改不了了
        check(unsafe { libc::setgroups(0, std::ptr::null()) })?;
        check(unsafe { libc::setgid(gid) })?;
        check(unsafe { libc::setuid(uid) })?;

        let (real, effective) = unsafe { (libc::getuid(), libc::geteuid()) };
        if real != uid || effective != uid {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("uid is {}/{} after switching to {}", real, effective, uid),
            ));
        }
        if unsafe { libc::setuid(0) } == 0 {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "root privileges could be regained after the switch",
            ));
        }
        Ok(())
    }
}

#[cfg(not(unix))]
impl Privileges for SystemPrivileges {
    fn effective_uid(&self) -> u32 {
        u32::MAX
    }

    fn chown(&self, _path: &Path, _uid: u32, _gid: u32) -> io::Result<()> {
        Ok(())
    }

    fn drop_to(&self, _uid: u32, _gid: u32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "switching users is only supported on unix",
        ))
    }
}
