//! Binaries that are never run, and flags that are refused for otherwise
//! permitted binaries.

/// Rejected whenever they are the command being run, with or without a
/// directory prefix.
pub const PRIVILEGED_COMMANDS: &[&str] = &[
    // ──── Privilege escalation ────
    "sudo", "su", "doas", "runuser",
    // ──── Permissions ────
    "chown", "chmod", "chgrp", "chattr", "setfacl",
    // ──── Mount and filesystems ────
    "mount", "umount", "fsck", "mkfs", "fdisk", "parted", "lsblk",
    // ──── Firewall ────
    "iptables", "ip6tables", "ufw", "firewall-cmd", "pfctl",
    // ──── Services ────
    "systemctl", "service", "init", "systemd", "launchctl",
    // ──── Scheduling ────
    "crontab", "at", "batch", "anacron",
    // ──── Users ────
    "passwd", "usermod", "useradd", "userdel", "chpasswd", "groupmod", "groupadd", "groupdel",
    "newusers",
    // ──── Package managers ────
    "apt", "apt-get", "yum", "dnf", "pacman", "zypper", "brew", "pip", "npm", "gem", "cargo",
    // ──── Monitoring ────
    "htop", "iotop", "nethogs", "tcpdump", "wireshark", "strace", "dtrace", "sysctl", "dmesg",
    // ──── Kernel ────
    "modprobe", "insmod", "rmmod", "lsmod", "depmod",
    // ──── Crypto ────
    "gpg", "ssh-keygen", "openssl", "certbot",
];

/// Flags refused per command. A flag matches when it occurs anywhere in the
/// space-joined argument list, so `rm` also rejects arguments such as
/// `notes-final.txt` that merely contain `-f`.
pub const DANGEROUS_COMMAND_FLAGS: &[(&str, &[&str])] = &[
    ("rm", &["-rf", "--recursive --force", "-r", "--recursive", "-f", "--force"]),
    ("chmod", &["777", "a+rwx", "+x", "4777", "2777", "1777"]),
    ("find", &["-exec", "-delete", "-execdir"]),
    ("xargs", &["-I", "--replace", "-0"]),
    ("tar", &["--absolute-names", "--no-same-owner"]),
    ("crontab", &["-r", "-e"]),
    ("at", &["-f"]),
    ("mail", &["-s"]),
    ("wall", &[]),
    ("write", &[]),
    ("talk", &[]),
];

pub fn is_privileged(command_name: &str) -> bool {
    PRIVILEGED_COMMANDS.contains(&command_name)
}

/// The first refused flag found in `joined_args` for `command_name`.
pub fn find_dangerous_flag(command_name: &str, joined_args: &str) -> Option<&'static str> {
    DANGEROUS_COMMAND_FLAGS
        .iter()
        .find(|(name, _)| *name == command_name)
        .and_then(|(_, flags)| flags.iter().copied().find(|flag| joined_args.contains(flag)))
}
