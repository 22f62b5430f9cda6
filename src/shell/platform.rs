//! Platform checks.

/// Whether bakery runs with an effective uid of 0.
///
/// Mounting and `chroot` need this unless the build's `command_wrapper`
/// elevates each command (`sudo {{.Command}}`).
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid() has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn matches_id_u() {
        let output = std::process::Command::new("id").arg("-u").output().unwrap();
        let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
        assert_eq!(is_elevated(), uid == "0");
    }
}
