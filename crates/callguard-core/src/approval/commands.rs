//! Command tables used by the risk classifier.
//!
//! All names are lowercase; the classifier lowercases the command word
//! before looking it up.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Commands that are always disabled, whatever their arguments.
pub static CRITICAL_COMMANDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // Disk formatting and wiping
        "format",
        "cipher",
        // Privilege escalation
        "sudo",
        "su",
        "doas",
        "runas",
        "gsudo",
        "psexec",
        // Ownership takeover
        "takeown",
        // Kernel modules and firewall
        "insmod",
        "modprobe",
        "rmmod",
        "iptables",
        "ip6tables",
        "nftables",
        // Arbitrary code
        "eval",
        "exec",
    ]
    .into_iter()
    .collect()
});

/// Paths that make a recursive forced deletion critical.
pub static SYSTEM_PATHS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "/", "/*", "~", "~/*", "/usr", "/etc", "/bin", "/sbin", "/boot", "/lib", "/lib64",
        "/var", "/root", "/home", "/opt", "/dev", "/proc", "/sys",
    ]
    .into_iter()
    .collect()
});

/// Anything below these directories is a system path too.
pub const SYSTEM_PATH_PREFIXES: &[&str] = &[
    "/usr/", "/etc/", "/bin/", "/sbin/", "/boot/", "/dev/", "/proc/", "/sys/",
];

/// `rm` targets that are critical even without `-rf`.
pub const CRITICAL_RM_TARGETS: &[&str] = &[
    "/etc/passwd",
    "/etc/shadow",
    "/etc/sudoers",
    "/etc/hosts",
    "/boot/",
    "/sys/",
    "/proc/",
    "/dev/",
    "/bin/",
    "/sbin/",
    "/usr/bin/",
    "/usr/sbin/",
    "/lib/",
    "/lib64/",
];

/// `chmod` modes granting world write or setuid/setgid.
pub static DANGEROUS_CHMOD_MODES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    ["777", "776", "775", "0777", "+s", "u+s", "g+s", "a+s"]
        .into_iter()
        .collect()
});

/// Windows ACL grants to Everyone, matched case-insensitively.
pub const EVERYONE_GRANTS: &[&str] = &["everyone:f", "*s-1-1-0:(oi)(ci)f"];

pub static PACKAGE_MANAGERS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "npm", "yarn", "pnpm", "pip", "pip3", "gem", "cargo", "go", "apt", "apt-get", "yum",
        "dnf", "zypper", "pacman", "brew", "choco", "scoop", "winget",
    ]
    .into_iter()
    .collect()
});

pub const INSTALL_SUBCOMMANDS: &[&str] = &["install", "add", "i"];

/// Commands that need permission whatever their arguments.
pub static HIGH_RISK_COMMANDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // Network access
        "curl",
        "wget",
        "nc",
        "netcat",
        "ncat",
        "telnet",
        "ssh",
        "scp",
        "rsync",
        "ftp",
        "sftp",
        "tftp",
        "socat",
        // Shell state
        "alias",
        "function",
        "source",
        ".",
        // Process control
        "kill",
        "killall",
        "pkill",
        "taskkill",
        "pskill",
        // Service managers
        "systemctl",
        "service",
        "launchctl",
        "sc",
        // Deletion that is not already critical
        "rm",
        // Containers and infrastructure
        "docker",
        "podman",
        "kubectl",
        "helm",
        "terraform",
        "vagrant",
        // Cloud CLIs
        "aws",
        "gcloud",
        "az",
        "oci",
        "ibmcloud",
        // Users and groups
        "useradd",
        "usermod",
        "userdel",
        "groupadd",
        "passwd",
        "chpasswd",
        // Scheduled tasks
        "crontab",
        "at",
        "schtasks",
        // Windows registry and management
        "reg",
        "regedit",
        "regsvr32",
        "wmic",
        "net",
        "netsh",
        "certutil",
        "bitsadmin",
        // DNS lookups can exfiltrate data
        "dig",
        "nslookup",
        "host",
        // macOS system settings
        "pmset",
        "csrutil",
    ]
    .into_iter()
    .collect()
});

pub static INTERPRETERS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "sh", "bash", "zsh", "fish", "ksh", "csh", "tcsh", "dash", "python", "python2",
        "python3", "ruby", "perl", "php", "node", "nodejs", "deno", "bun", "lua", "tcl",
        "powershell", "pwsh",
    ]
    .into_iter()
    .collect()
});

pub const SCRIPT_EXTENSIONS: &[&str] = &[".sh", ".py", ".rb", ".pl", ".ps1", ".bat", ".cmd"];

pub const ENVIRONMENT_SETTERS: &[&str] = &["export", "setx", "set"];

/// Commands that run the command given in their arguments.
pub const COMMAND_WRAPPERS: &[&str] = &[
    "env", "command", "builtin", "nohup", "nice", "time", "timeout", "xargs", "stdbuf",
    "ionice", "setsid",
];

/// Variables that change what programs get loaded.
pub const SENSITIVE_VARIABLES: &[&str] = &[
    "PATH",
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "PYTHONPATH",
    "NODE_PATH",
    "PERL5LIB",
    "RUBYLIB",
];

/// Destinations that make `mv`/`cp` need permission, matched lowercase.
pub const SENSITIVE_LOCATIONS: &[&str] = &[
    "/etc/",
    "/usr/",
    "/bin/",
    "/sbin/",
    "c:\\windows",
    "c:\\program",
];

pub const ARCHIVE_EXTRACTORS: &[&str] = &["tar", "unzip", "7z"];

/// Commands a pipe must not feed into.
pub static PIPE_SINKS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "sh", "bash", "zsh", "python", "perl", "ruby", "node", "curl", "wget", "nc", "netcat",
    ]
    .into_iter()
    .collect()
});

/// Read-only commands that never need permission.
pub static READ_ONLY_COMMANDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // System information
        "ls",
        "dir",
        "pwd",
        "whoami",
        "id",
        "hostname",
        "uname",
        "date",
        "uptime",
        "df",
        "du",
        "free",
        "top",
        "htop",
        "ps",
        "jobs",
        "which",
        "whereis",
        "type",
        "file",
        "stat",
        "wc",
        "head",
        "tail",
        // File reading
        "cat",
        "less",
        "more",
        "nl",
        "od",
        "strings",
        "echo",
    ]
    .into_iter()
    .collect()
});

pub const FIND_ACTION_FLAGS: &[&str] = &["-exec", "-execdir", "-ok", "-okdir", "-delete"];

/// Git subcommands that only read the repository.
pub static SAFE_GIT_SUBCOMMANDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "status",
        "diff",
        "log",
        "show",
        "branch",
        "remote",
        "rev-parse",
        "ls-files",
        "ls-tree",
        "cat-file",
        "describe",
        "shortlog",
        "blame",
        "reflog",
    ]
    .into_iter()
    .collect()
});

/// Global git flags that do not change what a subcommand does.
pub const HARMLESS_GIT_FLAGS: &[&str] = &["--no-pager", "--no-optional-locks", "-P"];

/// `git branch` flags that modify branches.
pub const BRANCH_MUTATING_FLAGS: &[&str] = &[
    "-d", "-D", "--delete", "-m", "-M", "--move", "-c", "-C", "--copy", "-f", "--force",
];

pub const SCRIPT_RUNNERS: &[&str] = &["npm", "yarn", "pnpm"];

/// npm lifecycle scripts that run during installs.
pub const LIFECYCLE_SCRIPTS: &[&str] = &["preinstall", "postinstall", "prepare", "prepublish"];

pub const BUILD_TOOLS: &[&str] = &["make", "gradle", "mvn", "cargo"];

pub const BUILD_TARGETS: &[&str] = &["build", "compile", "test", "check", "clean"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_lowercase() {
        for table in [
            &*CRITICAL_COMMANDS,
            &*HIGH_RISK_COMMANDS,
            &*INTERPRETERS,
            &*PIPE_SINKS,
            &*READ_ONLY_COMMANDS,
        ] {
            for name in table {
                assert_eq!(*name, name.to_lowercase());
            }
        }
    }

    #[test]
    fn safe_and_risky_tables_do_not_overlap() {
        for name in READ_ONLY_COMMANDS.iter() {
            assert!(!CRITICAL_COMMANDS.contains(name), "{name} is critical");
            assert!(!HIGH_RISK_COMMANDS.contains(name), "{name} is high risk");
        }
    }

    #[test]
    fn pipe_sinks_are_interpreters_or_network_tools() {
        for name in PIPE_SINKS.iter() {
            assert!(INTERPRETERS.contains(name) || HIGH_RISK_COMMANDS.contains(name));
        }
    }
}
