//! Cisco IOS XR.
//!
//! Configuration is staged in a target buffer and only applied by
//! `commit`; `abort` discards it and leaves configuration mode.
//!
//! ```text
//! RP/0/RP0/CPU0:xr#               # privilege_exec
//! RP/0/RP0/CPU0:xr(config)#       # configuration
//! RP/0/RP0/CPU0:xr(config-bgp)#   # configuration sub-mode
//! ```

use crate::platform::{PlatformDefinition, PrivilegeLevel};

const HOST: &str = r"[\w.\-@/:]{1,63}";

pub fn platform() -> PlatformDefinition {
    let privilege_exec = PrivilegeLevel::new("privilege_exec", &format!(r"(?m)^{HOST}#\s?$"))
        .unwrap()
        .with_not_contains("(config");

    let configuration = PrivilegeLevel::new(
        "configuration",
        &format!(r"(?m)^{HOST}\(config[\w.\-@/:+]{{0,63}}\)#\s?$"),
    )
    .unwrap()
    .with_parent("privilege_exec")
    .with_escalate("configure terminal")
    .with_deescalate("end");

    PlatformDefinition::new("cisco_iosxr", "ios_xr")
        .with_privilege(privilege_exec)
        .with_privilege(configuration)
        .with_exec_privilege("privilege_exec")
        .with_config_privilege("configuration")
        .with_failure_pattern("% Invalid input detected")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% This command is not authorized")
        .with_failure_pattern("% Failed to commit")
        .with_commit("commit", "abort")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 512")
        .with_terminal_size(512, 24)
}
